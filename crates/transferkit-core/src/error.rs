//! Error types for transferkit

use thiserror::Error;

/// Result type alias using TransferError
pub type Result<T> = std::result::Result<T, TransferError>;

/// Error type alias for convenience
pub type Error = TransferError;

/// Exit codes for CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const NOT_FOUND: i32 = 2;
    pub const INVALID_INPUT: i32 = 3;
}

/// Main error type for transferkit
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Content not found: {0}")]
    ContentNotFound(String),

    #[error("Provider error: {0}")]
    Provider(#[from] crate::llm::ProviderError),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl TransferError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ContentNotFound(_) => exit_codes::NOT_FOUND,
            Self::InvalidInput(_) | Self::Config(_) => exit_codes::INVALID_INPUT,
            _ => exit_codes::GENERAL_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            TransferError::ContentNotFound("c1".into()).exit_code(),
            exit_codes::NOT_FOUND
        );
        assert_eq!(
            TransferError::InvalidInput("bad".into()).exit_code(),
            exit_codes::INVALID_INPUT
        );
        assert_eq!(
            TransferError::Cache("down".into()).exit_code(),
            exit_codes::GENERAL_ERROR
        );
    }
}
