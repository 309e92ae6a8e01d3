//! Error types for the extraction engine.
//!
//! Extraction misses are never errors: they surface as `None` or empty
//! strings. Only configuration problems and store I/O reach this type.

/// Errors that can occur while configuring the engine or writing records.
#[derive(thiserror::Error, Debug)]
pub enum AtlasError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

pub type AtlasResult<T> = Result<T, AtlasError>;
