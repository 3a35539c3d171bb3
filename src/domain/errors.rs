use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the chart core.
///
/// Only the unknown-identifier variants are hard failures; everything else
/// leaves the previous state intact.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChartError {
    #[error("invalid range: {0}")]
    InvalidRange(String),
    #[error("unknown indicator: {0}")]
    UnknownIndicator(String),
    #[error("unknown metric: {0}")]
    UnknownMetric(String),
    #[error("unknown timeframe: {0}")]
    UnknownTimeframe(String),
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },
    #[error("missing input: {0}")]
    MissingInput(String),
    #[error("load failed: {0}")]
    Load(#[from] LoadError),
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for ChartError {
    fn from(err: serde_json::Error) -> Self {
        ChartError::Config(err.to_string())
    }
}

/// Failure reported by a [`DataLoader`](crate::domain::market_data::DataLoader).
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum LoadError {
    #[error("network error: {0}")]
    Network(String),
    #[error("loader rejected request: {0}")]
    Rejected(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

pub type ChartResult<T> = Result<T, ChartError>;
pub type LoadResult<T> = Result<T, LoadError>;
