//! Context manager: decides whether a history fits and shrinks it if not
//!
//! Every call is a pure function of `(messages, budget, strategy)`. The
//! caller's list is never modified; results are owned clones.

use crate::budget::{ContextBudget, ContextUsage};
use crate::config::Config;
use crate::context::compressor::HistoryCompressor;
use crate::context::counter::TokenCounter;
use crate::context::strategy::TruncationStrategy;
use crate::context::truncation::ContentTruncator;
use crate::types::Message;

/// Fits chat histories into a [`ContextBudget`]
#[derive(Debug, Clone)]
pub struct ContextManager {
    counter: TokenCounter,
    budget: ContextBudget,
    default_strategy: TruncationStrategy,
}

impl ContextManager {
    /// Create new context manager using the default `Summarize` strategy
    pub fn new(counter: TokenCounter, budget: ContextBudget) -> Self {
        Self {
            counter,
            budget,
            default_strategy: TruncationStrategy::default(),
        }
    }

    /// Build a manager for a model with `n_ctx` tokens of context
    pub fn from_config(counter: TokenCounter, n_ctx: usize, config: &Config) -> Self {
        Self::new(counter, ContextBudget::from_config(n_ctx, &config.budget))
            .with_strategy(config.truncation.strategy)
    }

    /// Set strategy used by [`ContextManager::truncate_if_needed`]
    pub fn with_strategy(mut self, strategy: TruncationStrategy) -> Self {
        self.default_strategy = strategy;
        self
    }

    pub fn budget(&self) -> &ContextBudget {
        &self.budget
    }

    pub fn counter(&self) -> &TokenCounter {
        &self.counter
    }

    pub fn default_strategy(&self) -> TruncationStrategy {
        self.default_strategy
    }

    /// Usage report for `messages` as they are
    pub fn validate_messages(&self, messages: &[Message]) -> ContextUsage {
        self.budget.usage(self.estimate(messages))
    }

    /// Whether `messages` exceed the prompt budget
    pub fn needs_truncation(&self, messages: &[Message]) -> bool {
        self.budget.exceeds(self.estimate(messages))
    }

    /// Fit `messages` with the manager's default strategy
    pub fn truncate_if_needed(&self, messages: &[Message]) -> (Vec<Message>, ContextUsage) {
        self.truncate_with_strategy(messages, self.default_strategy)
    }

    /// Fit `messages` into the budget with an explicit strategy
    ///
    /// Within budget, an untouched copy comes back with `truncated = false`.
    /// Otherwise the strategy drops messages and, if that is not enough,
    /// message contents are cut down. The result may still exceed the budget
    /// when nothing more can be removed; that is logged, never an error.
    pub fn truncate_with_strategy(
        &self,
        messages: &[Message],
        strategy: TruncationStrategy,
    ) -> (Vec<Message>, ContextUsage) {
        let prompt_tokens = self.estimate(messages);
        if !self.budget.exceeds(prompt_tokens) {
            return (messages.to_vec(), self.budget.usage(prompt_tokens));
        }

        let (applied, fallback) = strategy.resolve();
        if fallback.is_some() {
            tracing::warn!(
                requested = %strategy,
                applied = %applied,
                "Summarization needs an external async LLM call and is unavailable here"
            );
        }

        tracing::debug!(
            strategy = %applied,
            prompt_tokens,
            max_prompt_tokens = self.budget.max_prompt_tokens,
            messages = messages.len(),
            "Context over budget, truncating"
        );

        let working = messages.to_vec();
        let mut result = match applied {
            TruncationStrategy::SlidingWindow => self.sliding_window(working),
            TruncationStrategy::KeepSystemSliding | TruncationStrategy::Summarize => {
                self.keep_system_sliding(working)
            }
            TruncationStrategy::MiddleOut => self.middle_out(working),
        };

        if self.needs_truncation(&result) {
            result = ContentTruncator::new(&self.counter, &self.budget).truncate(result);
        }

        let mut usage = self.budget.usage(self.estimate(&result));
        usage.truncated = true;
        usage.truncated_messages = messages.len().saturating_sub(result.len());
        usage.strategy_used = Some(applied);
        usage.fallback = fallback;

        (result, usage)
    }

    /// Optional compression pre-pass followed by truncation
    pub fn prepare_messages(
        &self,
        messages: &[Message],
        compressor: Option<&HistoryCompressor>,
    ) -> (Vec<Message>, ContextUsage) {
        match compressor {
            Some(compressor) => self.truncate_if_needed(&compressor.compress(messages)),
            None => self.truncate_if_needed(messages),
        }
    }

    /// Drop the oldest messages of any role until the rest fits
    fn sliding_window(&self, mut messages: Vec<Message>) -> Vec<Message> {
        let costs = self.message_costs(&messages);
        let limit = self.budget.max_prompt_tokens;
        let start = drop_count(&costs, 1, |raw| fits(raw, limit));

        messages.drain(..start);
        messages
    }

    /// Keep system messages; drop the oldest of the rest until they fit in
    /// what the system messages leave over
    fn keep_system_sliding(&self, messages: Vec<Message>) -> Vec<Message> {
        let (mut system, mut others): (Vec<Message>, Vec<Message>) =
            messages.into_iter().partition(Message::is_system);

        let system_tokens = self.estimate(&system) as i64;
        let limit = self.budget.max_prompt_tokens - system_tokens;
        let costs = self.message_costs(&others);
        let start = drop_count(&costs, 1, |raw| fits(raw, limit));

        others.drain(..start);
        system.extend(others);
        system
    }

    /// Keep system messages, the first non-system message and the newest
    /// messages; trim the oldest of the middle
    fn middle_out(&self, messages: Vec<Message>) -> Vec<Message> {
        if messages.len() <= 3 {
            return messages;
        }

        let (mut kept, others): (Vec<Message>, Vec<Message>) =
            messages.into_iter().partition(Message::is_system);

        let mut others = others.into_iter();
        let Some(anchor) = others.next() else {
            return kept;
        };
        kept.push(anchor);

        let mut middle: Vec<Message> = others.collect();
        let fixed = self.counter.count_messages_tokens(&kept);
        let costs = self.message_costs(&middle);
        let limit = self.budget.max_prompt_tokens;
        let start = drop_count(&costs, 1, |raw| fits(fixed + raw, limit));

        middle.drain(..start);
        kept.extend(middle);
        kept
    }

    fn message_costs(&self, messages: &[Message]) -> Vec<usize> {
        messages.iter().map(|m| self.counter.count_message_tokens(m)).collect()
    }

    fn estimate(&self, messages: &[Message]) -> usize {
        self.counter.estimate_prompt_tokens(messages, true)
    }
}

/// Whether a raw token count fits `limit` once template overhead is added
fn fits(raw_tokens: usize, limit: i64) -> bool {
    TokenCounter::apply_template_overhead(raw_tokens) as i64 <= limit
}

/// Number of leading entries to drop so the remaining suffix satisfies
/// `fits`, never leaving fewer than `min_keep` entries
fn drop_count<F>(costs: &[usize], min_keep: usize, fits: F) -> usize
where
    F: Fn(usize) -> bool,
{
    let mut remaining: usize = costs.iter().sum();
    let mut start = 0;

    while costs.len() - start > min_keep && !fits(remaining) {
        remaining -= costs[start];
        start += 1;
    }

    start
}
