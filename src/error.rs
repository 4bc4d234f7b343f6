use crate::llm::BackendError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Aggregation error: {0}")]
    Aggregation(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl From<polars::error::PolarsError> for AssistantError {
    fn from(err: polars::error::PolarsError) -> Self {
        AssistantError::Polars(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AssistantError>;
