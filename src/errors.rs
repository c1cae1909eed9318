//! Error types for ctxbudget
//!
//! Budgeting itself never fails: counting, validation, truncation and
//! compression always return a best-effort result. These errors cover the
//! setup surfaces only (configuration, tokenizer loading) and the fallible
//! tokenizer capability that the counter absorbs.

use thiserror::Error;

/// Main error type for ctxbudget setup surfaces
#[derive(Error, Debug)]
pub enum ContextError {
    /// Tokenizer could not be constructed
    #[error("Failed to load tokenizer: {0}")]
    TokenizerLoad(String),

    /// Tokenizer failed on a specific input
    #[error("Tokenization failed: {0}")]
    Tokenization(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for ctxbudget operations
pub type Result<T> = std::result::Result<T, ContextError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ContextError::ConfigError("safety_margin_pct must be below 1.0".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("safety_margin_pct"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "tokenizer.json");
        let err: ContextError = io.into();
        assert!(matches!(err, ContextError::IoError(_)));
        assert!(err.to_string().contains("tokenizer.json"));
    }
}
