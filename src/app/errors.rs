use crate::semantic::{EngineError, RankError};
use crate::source::DataSourceError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("customer {0} not found")]
    CustomerNotFound(i64),

    #[error("{0}")]
    EmptyQuery(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    ModelMismatch(String),

    #[error("data source error: {0}")]
    DataSource(#[from] DataSourceError),

    #[error("recommendation engine error: {0}")]
    Engine(String),

    #[error("unexpected error: {0:?}")]
    Other(#[from] anyhow::Error),
}

impl From<RankError> for AppError {
    fn from(err: RankError) -> Self {
        match err {
            RankError::EmptyQuery => AppError::EmptyQuery(err.to_string()),
            RankError::InvalidArgument(message) => AppError::InvalidArgument(message),
            RankError::DimensionMismatch { .. } | RankError::ModelMismatch => {
                AppError::ModelMismatch(err.to_string())
            }
            RankError::TableOutOfSync { .. } | RankError::Embedding(_) => {
                AppError::Engine(err.to_string())
            }
        }
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::DataSource(e) => AppError::DataSource(e),
            EngineError::Rank(e) => e.into(),
            EngineError::Embedding(_) | EngineError::Internal(_) => {
                AppError::Engine(err.to_string())
            }
        }
    }
}
