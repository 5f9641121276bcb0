//! Description-based movie recommendations.
//!
//! # Architecture
//!
//! - `embeddings`: The `Embedder` capability and its fastembed implementation
//! - `index`: Positional embedding table and cosine-similarity ranking
//! - `service`: Lazily built, swappable engine shared by all queries

pub mod embeddings;
mod index;
mod service;

pub use index::{RankError, SimilarityResult};
pub use service::{EngineError, EngineStatus, RecommendationEngine};

#[cfg(test)]
pub use embeddings::{Embedder, EmbeddingError, EmbeddingModel};
#[cfg(test)]
pub use index::{rank, EmbeddingTable};
#[cfg(test)]
pub use service::EmbedderLoader;

/// Default embedding model (384 dims)
pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";

/// Default number of recommendations returned
pub const DEFAULT_TOP_N: usize = 3;
