//! Context budget types
//! Derives the prompt/completion split of a model's context window

pub mod types;

pub use types::{BudgetConfig, ContextBudget, ContextUsage};
