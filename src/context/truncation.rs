//! Content truncation, the last resort once dropping messages is not enough
//!
//! # Algorithm
//!
//! ```text
//! tokens_to_cut = estimate(M) - max_prompt_tokens + 100
//!
//! Pass 1: candidates by size descending, latest user message last
//!   t > 10_000        keep min(10% t, 500)
//!   1_000 < t ≤ 10_000 keep min(30% t, 300)
//!   t ≤ 1_000          keep 50% t
//!
//! Pass 2 (emergency, ≤ 2·|M| rounds): collapse the largest message whose
//!   text is still over 50 tokens; stop once no such message is left.
//! ```
//!
//! Neither pass fails. If the list still does not fit, the best achievable
//! result is returned and a warning is logged.

use std::cmp::Reverse;

use crate::budget::ContextBudget;
use crate::context::counter::TokenCounter;
use crate::types::{Message, Role};

pub const CONTENT_TRUNCATED_MARKER: &str = "[... content truncated ...]";
pub const HEAVILY_TRUNCATED_MARKER: &str = "[... heavily truncated ...]";

/// Extra tokens cut beyond the bare overflow
const CUT_SAFETY_BUFFER: i64 = 100;

const LARGE_MESSAGE_TOKENS: usize = 10_000;
const MEDIUM_MESSAGE_TOKENS: usize = 1_000;
const LARGE_KEEP_CAP: usize = 500;
const MEDIUM_KEEP_CAP: usize = 300;

/// Tokens a collapsed message keeps in the emergency pass
const EMERGENCY_KEEP_TOKENS: usize = 50;

/// Shrinks message contents in place until the list fits a budget
pub(crate) struct ContentTruncator<'a> {
    counter: &'a TokenCounter,
    budget: &'a ContextBudget,
}

impl<'a> ContentTruncator<'a> {
    pub(crate) fn new(counter: &'a TokenCounter, budget: &'a ContextBudget) -> Self {
        Self { counter, budget }
    }

    pub(crate) fn truncate(&self, mut messages: Vec<Message>) -> Vec<Message> {
        let current = self.estimate(&messages);
        if !self.budget.exceeds(current) {
            return messages;
        }

        let tokens_to_cut = current as i64 - self.budget.max_prompt_tokens + CUT_SAFETY_BUFFER;
        let mut cut: i64 = 0;

        for index in self.rank_candidates(&messages) {
            if cut >= tokens_to_cut {
                break;
            }
            cut += self.shrink_message(&mut messages[index]);
        }

        if self.budget.exceeds(self.estimate(&messages)) {
            self.emergency_truncate(&mut messages);
        }

        let final_tokens = self.estimate(&messages);
        if self.budget.exceeds(final_tokens) {
            tracing::warn!(
                prompt_tokens = final_tokens,
                max_prompt_tokens = self.budget.max_prompt_tokens,
                messages = messages.len(),
                "Context could not be fully reduced, returning best effort"
            );
        }

        messages
    }

    /// Indices ordered by token size descending, with the most recent user
    /// message moved behind everything else
    fn rank_candidates(&self, messages: &[Message]) -> Vec<usize> {
        let last_user = messages.iter().rposition(|m| m.role == Role::User);

        let mut ranked: Vec<(usize, usize)> = messages
            .iter()
            .enumerate()
            .map(|(index, message)| (index, self.counter.count_message_tokens(message)))
            .collect();
        ranked.sort_by_key(|&(index, tokens)| (Some(index) == last_user, Reverse(tokens)));

        ranked.into_iter().map(|(index, _)| index).collect()
    }

    /// Apply the tiered keep ratio to one message; returns tokens saved
    fn shrink_message(&self, message: &mut Message) -> i64 {
        let text = message.text();
        let tokens = self.counter.count_tokens(&text);
        let keep = keep_tokens(tokens);
        if keep >= tokens {
            return 0;
        }

        let before = self.counter.count_message_tokens(message);
        let original = message.clone();
        let kept = self.counter.truncate_to_tokens(&text, keep);
        message.replace_text(format!("{kept}\n\n{CONTENT_TRUNCATED_MARKER}"));
        let after = self.counter.count_message_tokens(message);

        // Tiny messages can grow once the marker is appended
        if after >= before {
            *message = original;
            return 0;
        }

        tracing::debug!(tokens_before = before, tokens_after = after, "Truncated message content");
        before as i64 - after as i64
    }

    fn emergency_truncate(&self, messages: &mut [Message]) {
        let max_rounds = 2 * messages.len();

        for _ in 0..max_rounds {
            if !self.budget.exceeds(self.estimate(messages)) {
                return;
            }

            let Some((index, collapsed)) = self.next_collapse(messages) else {
                return;
            };

            tracing::debug!(index, "Emergency truncation");
            messages[index].replace_text(collapsed);
        }
    }

    /// Largest message whose text still shrinks when collapsed to 50 tokens,
    /// with its collapsed text
    ///
    /// Size is ranked by whole-message tokens, so media parts count, but
    /// only the text can be taken away.
    fn next_collapse(&self, messages: &[Message]) -> Option<(usize, String)> {
        let mut ranked: Vec<(usize, usize)> = messages
            .iter()
            .enumerate()
            .map(|(index, message)| (index, self.counter.count_message_tokens(message)))
            .collect();
        ranked.sort_by_key(|&(_, tokens)| Reverse(tokens));

        ranked.into_iter().find_map(|(index, _)| {
            let text = messages[index].text();
            let tokens = self.counter.count_tokens(&text);
            if tokens <= EMERGENCY_KEEP_TOKENS {
                return None;
            }

            let kept = self.counter.truncate_to_tokens(&text, EMERGENCY_KEEP_TOKENS);
            let collapsed = format!("{kept}\n\n{HEAVILY_TRUNCATED_MARKER}");
            (self.counter.count_tokens(&collapsed) < tokens).then_some((index, collapsed))
        })
    }

    fn estimate(&self, messages: &[Message]) -> usize {
        self.counter.estimate_prompt_tokens(messages, true)
    }
}

/// Tokens kept for a message of `tokens` size in the first pass
fn keep_tokens(tokens: usize) -> usize {
    if tokens > LARGE_MESSAGE_TOKENS {
        (tokens / 10).min(LARGE_KEEP_CAP)
    } else if tokens > MEDIUM_MESSAGE_TOKENS {
        (tokens * 3 / 10).min(MEDIUM_KEEP_CAP)
    } else {
        tokens / 2
    }
}
