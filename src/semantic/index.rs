//! Positional embedding table and cosine-similarity ranking.
//!
//! Row `i` of an [`EmbeddingTable`] is the embedding of row `i` of the corpus
//! it was built from. Lookups are positional, never by id.

use rayon::prelude::*;
use serde::Serialize;

use crate::corpus::CorpusRecord;
use crate::semantic::embeddings::{Embedder, EmbeddingError};

/// One row of the table.
#[derive(Debug, Clone)]
pub struct TableEntry {
    /// Id of the corpus record at the same position
    pub id: i64,
    pub embedding: Vec<f32>,
}

/// Embeddings of a corpus, in corpus order.
#[derive(Debug, Clone)]
pub struct EmbeddingTable {
    entries: Vec<TableEntry>,
    dimensions: usize,
    model_id: [u8; 32],
}

/// A ranked corpus record.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarityResult {
    pub record: CorpusRecord,
    /// Cosine similarity in [-1.0, 1.0]
    pub score: f32,
}

#[derive(Debug, thiserror::Error)]
pub enum RankError {
    #[error("query text is empty")]
    EmptyQuery,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("embedding dimension mismatch: table has {expected}, query has {got}; reload the corpus and model together")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("embedding table was built by a different model; reload the corpus and model together")]
    ModelMismatch,

    #[error("embedding table ({table} rows) does not match corpus ({corpus} rows)")]
    TableOutOfSync { table: usize, corpus: usize },

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
}

impl EmbeddingTable {
    /// Embed every description of `corpus`, preserving row order.
    pub fn initialize(
        corpus: &[CorpusRecord],
        embedder: &dyn Embedder,
    ) -> Result<Self, RankError> {
        let dimensions = embedder.dimensions();
        let texts: Vec<String> = corpus.iter().map(|r| r.description.clone()).collect();
        let vectors = embedder.embed_batch(&texts)?;

        if vectors.len() != corpus.len() {
            return Err(RankError::TableOutOfSync {
                table: vectors.len(),
                corpus: corpus.len(),
            });
        }

        let mut entries = Vec::with_capacity(corpus.len());
        for (record, embedding) in corpus.iter().zip(vectors) {
            if embedding.len() != dimensions {
                return Err(RankError::DimensionMismatch {
                    expected: dimensions,
                    got: embedding.len(),
                });
            }
            entries.push(TableEntry {
                id: record.id,
                embedding,
            });
        }

        Ok(Self {
            entries,
            dimensions,
            model_id: embedder.model_id(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[TableEntry] {
        &self.entries
    }

    /// Cosine score of `query` against every row, in row order.
    fn scores(&self, query: &[f32]) -> Vec<f32> {
        let query_norm = l2_norm(query);
        self.entries
            .par_iter()
            .map(|entry| cosine_similarity(query, query_norm, &entry.embedding))
            .collect()
    }
}

/// Rank `corpus` against `query_text`, best first.
///
/// `embedder` must be the instance that built `table`.
pub fn rank(
    embedder: &dyn Embedder,
    query_text: &str,
    top_n: usize,
    table: &EmbeddingTable,
    corpus: &[CorpusRecord],
) -> Result<Vec<SimilarityResult>, RankError> {
    if top_n == 0 {
        return Err(RankError::InvalidArgument(
            "top_n must be a positive integer".to_string(),
        ));
    }

    if query_text.trim().is_empty() {
        return Err(RankError::EmptyQuery);
    }

    let in_sync = table.len() == corpus.len()
        && table
            .entries
            .iter()
            .zip(corpus)
            .all(|(entry, record)| entry.id == record.id);
    if !in_sync {
        return Err(RankError::TableOutOfSync {
            table: table.len(),
            corpus: corpus.len(),
        });
    }

    if corpus.is_empty() {
        return Ok(vec![]);
    }

    if embedder.model_id() != table.model_id {
        return Err(RankError::ModelMismatch);
    }

    let query = embedder.embed(query_text)?;
    if query.len() != table.dimensions {
        return Err(RankError::DimensionMismatch {
            expected: table.dimensions,
            got: query.len(),
        });
    }

    let scores = table.scores(&query);

    let mut order: Vec<usize> = (0..scores.len()).collect();
    // sort_by is stable, so equal scores keep corpus order
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order.truncate(top_n);

    Ok(order
        .into_iter()
        .map(|idx| SimilarityResult {
            record: corpus[idx].clone(),
            score: scores[idx],
        })
        .collect())
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Zero when either vector has zero norm.
fn cosine_similarity(query: &[f32], query_norm: f32, target: &[f32]) -> f32 {
    let target_norm = l2_norm(target);
    if query_norm == 0.0 || target_norm == 0.0 {
        return 0.0;
    }

    let dot: f32 = query.iter().zip(target.iter()).map(|(a, b)| a * b).sum();
    let score = dot / (query_norm * target_norm);
    if score.is_nan() {
        0.0
    } else {
        score.clamp(-1.0, 1.0)
    }
}
