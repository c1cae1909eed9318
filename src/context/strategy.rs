//! Truncation strategy selector
//!
//! A closed decision table: each variant names the algorithm the
//! [`ContextManager`](crate::context::ContextManager) runs over an
//! over-budget history. There is no runtime state behind it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Algorithm used to shrink an over-budget message list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TruncationStrategy {
    /// Drop the oldest messages regardless of role
    SlidingWindow,

    /// Keep every system message, drop the oldest of the rest
    KeepSystemSliding,

    /// Keep system messages, the first exchange and the latest messages
    MiddleOut,

    /// Summarize older turns; needs an external LLM call and therefore
    /// runs as [`TruncationStrategy::KeepSystemSliding`]
    #[default]
    Summarize,
}

impl TruncationStrategy {
    pub const ALL: [TruncationStrategy; 4] = [
        TruncationStrategy::SlidingWindow,
        TruncationStrategy::KeepSystemSliding,
        TruncationStrategy::MiddleOut,
        TruncationStrategy::Summarize,
    ];

    /// Canonical snake_case name
    pub fn name(&self) -> &'static str {
        match self {
            TruncationStrategy::SlidingWindow => "sliding_window",
            TruncationStrategy::KeepSystemSliding => "keep_system_sliding",
            TruncationStrategy::MiddleOut => "middle_out",
            TruncationStrategy::Summarize => "summarize",
        }
    }

    /// Parse a strategy name, degrading unknown names to `KeepSystemSliding`
    pub fn parse_lenient(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            tracing::warn!(
                strategy = %name,
                fallback = TruncationStrategy::KeepSystemSliding.name(),
                "Unknown truncation strategy"
            );
            TruncationStrategy::KeepSystemSliding
        })
    }

    /// Strategy that can actually run synchronously, plus the reason when
    /// it differs from the one requested
    pub fn resolve(self) -> (TruncationStrategy, Option<StrategyFallback>) {
        match self {
            TruncationStrategy::Summarize => {
                let fallback = StrategyFallback {
                    requested: TruncationStrategy::Summarize,
                    applied: TruncationStrategy::KeepSystemSliding,
                    reason: FallbackReason::SummarizationUnavailable,
                };
                (fallback.applied, Some(fallback))
            }
            other => (other, None),
        }
    }
}

impl fmt::Display for TruncationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for strategy names that match no variant
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown truncation strategy: {0}")]
pub struct UnknownStrategy(pub String);

impl FromStr for TruncationStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        TruncationStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.name() == normalized)
            .ok_or_else(|| UnknownStrategy(s.to_string()))
    }
}

impl From<String> for TruncationStrategy {
    fn from(name: String) -> Self {
        TruncationStrategy::parse_lenient(&name)
    }
}

impl From<TruncationStrategy> for String {
    fn from(strategy: TruncationStrategy) -> Self {
        strategy.name().to_string()
    }
}

/// Why a requested strategy was replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// Summarization needs an async LLM round-trip this core cannot make
    SummarizationUnavailable,
}

/// Record of a strategy substitution, surfaced in
/// [`ContextUsage`](crate::budget::ContextUsage)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyFallback {
    pub requested: TruncationStrategy,
    pub applied: TruncationStrategy,
    pub reason: FallbackReason,
}
