//! ctxbudget - context-window budgeting for chat completions
//!
//! Fits an ordered chat history into a model's context window before it is
//! sent for inference.
//!
//! # Architecture
//!
//! - **budget**: derives the prompt budget from a context size
//! - **context**: token counting, truncation strategies, history compression
//! - **config**: TOML configuration for the tunables
//!
//! ```text
//! messages ──► HistoryCompressor (optional) ──► ContextManager ──► (messages', ContextUsage)
//!                                                   │
//!                                             TokenCounter ◄── Tokenize (host-supplied)
//! ```
//!
//! Everything here is synchronous and free of shared mutable state; one
//! [`ContextManager`] can serve concurrent requests.

pub mod budget;
pub mod config;
pub mod context;
pub mod errors;
pub mod types;

// Re-export commonly used types
pub use budget::{BudgetConfig, ContextBudget, ContextUsage};
pub use config::{Config, TruncationConfig};
pub use context::{
    CompressionConfig, CompressionStats, ContextManager, FallbackReason, HistoryCompressor,
    StrategyFallback, TokenCounter, TokenEstimate, Tokenize, TruncationStrategy,
};
pub use errors::{ContextError, Result};
pub use types::{Content, ContentPart, ImageUrl, InputAudio, Message, Role};

#[cfg(feature = "hf-tokenizer")]
pub use context::HfTokenizer;
