//! Process-wide recommendation engine.
//!
//! Owns the (embedder, corpus, embedding table) triple:
//! - Built lazily on first use, then shared read-only between queries
//! - Rebuilt off to the side on reload and published by replacing the `Arc`
//! - Readers that already hold a snapshot keep using it until they drop it

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::SemanticConfig;
use crate::corpus::{self, CorpusRecord};
use crate::semantic::embeddings::{Embedder, EmbeddingError, EmbeddingModel};
use crate::semantic::index::{rank, EmbeddingTable, RankError, SimilarityResult};
use crate::source::{DataSource, DataSourceError};

/// Produces the embedder a snapshot is built with.
pub type EmbedderLoader =
    Box<dyn Fn() -> Result<Arc<dyn Embedder>, EmbeddingError> + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Data source error: {0}")]
    DataSource(#[from] DataSourceError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Rank(#[from] RankError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// One immutable, internally consistent engine state.
pub struct EngineSnapshot {
    embedder: Arc<dyn Embedder>,
    corpus: Vec<CorpusRecord>,
    table: EmbeddingTable,
    generation: u64,
    loaded_at: DateTime<Utc>,
}

impl EngineSnapshot {
    #[cfg(test)]
    pub fn corpus(&self) -> &[CorpusRecord] {
        &self.corpus
    }

    #[cfg(test)]
    pub fn table(&self) -> &EmbeddingTable {
        &self.table
    }

    #[cfg(test)]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn recommend(&self, query: &str, top_n: usize) -> Result<Vec<SimilarityResult>, RankError> {
        rank(self.embedder.as_ref(), query, top_n, &self.table, &self.corpus)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub initialized: bool,
    pub model: Option<String>,
    pub dimensions: Option<usize>,
    pub corpus_size: usize,
    pub generation: u64,
    pub loaded_at: Option<DateTime<Utc>>,
}

pub struct RecommendationEngine {
    source: Arc<dyn DataSource>,
    loader: EmbedderLoader,
    current: RwLock<Option<Arc<EngineSnapshot>>>,
    /// Serializes builds; never held by readers.
    build_lock: Mutex<()>,
    generation: AtomicU64,
}

impl RecommendationEngine {
    pub fn new(source: Arc<dyn DataSource>, loader: EmbedderLoader) -> Self {
        Self {
            source,
            loader,
            current: RwLock::new(None),
            build_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Engine backed by a fastembed model cached under `base_path/models`.
    pub fn with_fastembed(
        source: Arc<dyn DataSource>,
        config: &SemanticConfig,
        base_path: PathBuf,
    ) -> Self {
        let model_name = config.model.clone();

        let loader: EmbedderLoader = Box::new(move || {
            let model = EmbeddingModel::new(&model_name, base_path.clone())?;
            Ok(Arc::new(model) as Arc<dyn Embedder>)
        });

        Self::new(source, loader)
    }

    #[cfg(test)]
    pub fn is_initialized(&self) -> bool {
        self.current
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Current snapshot, building it on first use.
    pub fn snapshot(&self) -> Result<Arc<EngineSnapshot>, EngineError> {
        if let Some(snapshot) = self.current()? {
            return Ok(snapshot);
        }

        let _build = self
            .build_lock
            .lock()
            .map_err(|e| EngineError::Internal(format!("Lock poisoned: {}", e)))?;

        // another caller may have finished the build while we waited
        if let Some(snapshot) = self.current()? {
            return Ok(snapshot);
        }

        let snapshot = Arc::new(self.build(None)?);
        self.publish(snapshot.clone())?;
        Ok(snapshot)
    }

    /// Rank the corpus against a free-text description.
    pub fn recommend(
        &self,
        query: &str,
        top_n: usize,
    ) -> Result<Vec<SimilarityResult>, EngineError> {
        // reject bad input before paying for a warm-up
        if top_n == 0 {
            return Err(RankError::InvalidArgument(
                "top_n must be a positive integer".to_string(),
            )
            .into());
        }
        if query.trim().is_empty() {
            return Err(RankError::EmptyQuery.into());
        }

        let snapshot = self.snapshot()?;
        Ok(snapshot.recommend(query, top_n)?)
    }

    /// Re-read the corpus and rebuild the table, then swap it in.
    ///
    /// With `reload_model` the embedder is recreated as well. On failure the
    /// previous snapshot stays published.
    pub fn reload(&self, reload_model: bool) -> Result<Arc<EngineSnapshot>, EngineError> {
        let _build = self
            .build_lock
            .lock()
            .map_err(|e| EngineError::Internal(format!("Lock poisoned: {}", e)))?;

        let embedder = if reload_model {
            None
        } else {
            self.current()?.map(|s| s.embedder.clone())
        };

        let snapshot = match self.build(embedder) {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                log::error!("reload failed, keeping previous snapshot: {}", e);
                return Err(e);
            }
        };

        self.publish(snapshot.clone())?;
        Ok(snapshot)
    }

    pub fn status(&self) -> EngineStatus {
        match self.current().ok().flatten() {
            Some(s) => EngineStatus {
                initialized: true,
                model: Some(s.embedder.name().to_string()),
                dimensions: Some(s.table.dimensions()),
                corpus_size: s.corpus.len(),
                generation: s.generation,
                loaded_at: Some(s.loaded_at),
            },
            None => EngineStatus {
                initialized: false,
                model: None,
                dimensions: None,
                corpus_size: 0,
                generation: 0,
                loaded_at: None,
            },
        }
    }

    fn current(&self) -> Result<Option<Arc<EngineSnapshot>>, EngineError> {
        let guard = self
            .current
            .read()
            .map_err(|e| EngineError::Internal(format!("Lock poisoned: {}", e)))?;
        Ok(guard.clone())
    }

    fn publish(&self, snapshot: Arc<EngineSnapshot>) -> Result<(), EngineError> {
        let mut guard = self
            .current
            .write()
            .map_err(|e| EngineError::Internal(format!("Lock poisoned: {}", e)))?;
        *guard = Some(snapshot);
        Ok(())
    }

    fn build(&self, embedder: Option<Arc<dyn Embedder>>) -> Result<EngineSnapshot, EngineError> {
        let started = Instant::now();

        let embedder = match embedder {
            Some(embedder) => embedder,
            None => (self.loader)()?,
        };

        let corpus = corpus::load(self.source.as_ref())?;
        let table = EmbeddingTable::initialize(&corpus, embedder.as_ref())?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        log::info!(
            "recommendation engine ready: generation {}, {} records, model '{}' ({} dims) in {:.1?}",
            generation,
            corpus.len(),
            embedder.name(),
            table.dimensions(),
            started.elapsed()
        );

        Ok(EngineSnapshot {
            embedder,
            corpus,
            table,
            generation,
            loaded_at: Utc::now(),
        })
    }
}
