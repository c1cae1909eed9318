//! Budget system type definitions

use serde::{Deserialize, Serialize};

use crate::context::strategy::{StrategyFallback, TruncationStrategy};

/// Configuration for deriving a [`ContextBudget`] from a context size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Tokens reserved for the model's answer (default: 512)
    pub max_completion_tokens: usize,

    /// Fraction of the window held back as safety margin (default: 0.05)
    pub safety_margin_pct: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_completion_tokens: ContextBudget::DEFAULT_MAX_COMPLETION_TOKENS,
            safety_margin_pct: ContextBudget::DEFAULT_SAFETY_MARGIN_PCT,
        }
    }
}

/// Token budget for a single request
///
/// `max_prompt_tokens = total_context - reserved_completion - safety_margin`.
/// The value is signed and kept raw: a negative budget means every message
/// list is over budget, and consumers compare against it instead of clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBudget {
    pub total_context: usize,
    pub max_prompt_tokens: i64,
    pub reserved_completion: usize,
    pub safety_margin: usize,
}

impl ContextBudget {
    pub const DEFAULT_MAX_COMPLETION_TOKENS: usize = 512;
    pub const DEFAULT_SAFETY_MARGIN_PCT: f64 = 0.05;

    /// Derive a budget from a model's context size
    ///
    /// ```text
    /// safety_margin     = ⌊n_ctx × safety_margin_pct⌋
    /// max_prompt_tokens = n_ctx - max_completion_tokens - safety_margin
    /// ```
    pub fn from_context_size(
        n_ctx: usize,
        max_completion_tokens: usize,
        safety_margin_pct: f64,
    ) -> Self {
        let safety_margin = (n_ctx as f64 * safety_margin_pct.max(0.0)).floor() as usize;
        let max_prompt_tokens = n_ctx as i64 - max_completion_tokens as i64 - safety_margin as i64;

        Self {
            total_context: n_ctx,
            max_prompt_tokens,
            reserved_completion: max_completion_tokens,
            safety_margin,
        }
    }

    /// Budget with the default completion reserve and margin
    pub fn for_context(n_ctx: usize) -> Self {
        Self::from_context_size(
            n_ctx,
            Self::DEFAULT_MAX_COMPLETION_TOKENS,
            Self::DEFAULT_SAFETY_MARGIN_PCT,
        )
    }

    pub fn from_config(n_ctx: usize, config: &BudgetConfig) -> Self {
        Self::from_context_size(n_ctx, config.max_completion_tokens, config.safety_margin_pct)
    }

    /// Whether `prompt_tokens` is over the prompt budget
    pub fn exceeds(&self, prompt_tokens: usize) -> bool {
        prompt_tokens as i64 > self.max_prompt_tokens
    }

    /// No room for any prompt at all
    pub fn is_exhausted(&self) -> bool {
        self.max_prompt_tokens <= 0
    }

    /// `max(0, total_context - prompt_tokens - safety_margin)`
    pub fn available_for_completion(&self, prompt_tokens: usize) -> usize {
        let available =
            self.total_context as i64 - prompt_tokens as i64 - self.safety_margin as i64;
        available.max(0) as usize
    }

    /// Usage report for an untouched prompt
    pub fn usage(&self, prompt_tokens: usize) -> ContextUsage {
        ContextUsage {
            total_context: self.total_context,
            prompt_tokens,
            available_for_completion: self.available_for_completion(prompt_tokens),
            truncated: false,
            truncated_messages: 0,
            strategy_used: None,
            fallback: None,
        }
    }
}

/// Observability report produced by every validate/truncate call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextUsage {
    pub total_context: usize,
    pub prompt_tokens: usize,
    pub available_for_completion: usize,
    pub truncated: bool,
    pub truncated_messages: usize,

    /// Strategy that actually ran
    pub strategy_used: Option<TruncationStrategy>,

    /// Set when the requested strategy could not run as asked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<StrategyFallback>,
}

impl ContextUsage {
    /// Prompt share of the whole window (0.0 to 1.0+)
    pub fn utilization(&self) -> f64 {
        if self.total_context == 0 {
            return 0.0;
        }
        self.prompt_tokens as f64 / self.total_context as f64
    }

    /// Clamp a requested completion size to what the window still allows
    pub fn completion_tokens(&self, requested: usize) -> usize {
        requested.min(self.available_for_completion)
    }
}
