use thiserror::Error;

/// Errors that can occur during reference code operations.
///
/// Sequence-width overflow is not an error: the width grows instead.
#[derive(Error, Debug)]
pub enum CodeError {
    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid code format: {0}")]
    InvalidFormat(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
