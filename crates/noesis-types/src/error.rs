//! Engine-wide error type.

use thiserror::Error;

/// The single error type returned by fallible engine operations.
///
/// Soft failures (a parse error that has a documented fallback, a missing
/// plugin) are not represented here — those degrade to a default inline and
/// never become an `Err`. This type is reserved for failures that actually
/// abort the current operation.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("serialization error: {source}")]
    Serialization {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("processing error: {0}")]
    ProcessingError(String),

    #[error("memory error: {0}")]
    MemoryError(String),

    #[error("lock error: {0}")]
    LockError(String),

    #[error("HTTP error: {0}")]
    HttpError(String),

    /// A step, plugin, or sub-graph invocation failed outright. The string
    /// becomes the `step_outputs[i].error` text surfaced to callers.
    #[error("execution error: {0}")]
    ExecutionError(String),

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(error: serde_json::Error) -> Self {
        EngineError::Serialization {
            source: Box::new(error),
        }
    }
}

impl From<anyhow::Error> for EngineError {
    fn from(error: anyhow::Error) -> Self {
        EngineError::Other(error.to_string())
    }
}

/// Result type used throughout the engine crates.
pub type Result<T> = std::result::Result<T, EngineError>;
