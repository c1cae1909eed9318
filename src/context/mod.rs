//! Context management module
//!
//! Handles token counting, context window fitting, and history compression.

pub mod compressor;
pub mod counter;
pub mod manager;
pub mod strategy;
pub mod tokenizer;
mod truncation;

// Re-export commonly used types
pub use compressor::{
    CompressionConfig, CompressionStats, HistoryCompressor, RESULT_TRUNCATED_MARKER,
};
pub use counter::{TokenCounter, TokenEstimate};
pub use manager::ContextManager;
pub use strategy::{FallbackReason, StrategyFallback, TruncationStrategy, UnknownStrategy};
pub use tokenizer::Tokenize;
pub use truncation::{CONTENT_TRUNCATED_MARKER, HEAVILY_TRUNCATED_MARKER};

#[cfg(feature = "hf-tokenizer")]
pub use tokenizer::HfTokenizer;
