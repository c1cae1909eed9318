//! Token counting against a model's tokenizer
//!
//! Measures text and chat messages with an injected [`Tokenize`] capability.
//!
//! # Algorithm
//!
//! ```text
//! message_tokens(m) = 4 + Σ part_tokens(p)
//!   text part   → |tokenize(text)|
//!   input_audio → 10
//!   image_url   → 50
//!   unknown     → 0
//!
//! estimate_prompt_tokens(M) = ⌊Σ message_tokens(m) × 1.10⌋
//! ```
//!
//! The 1.10 factor is a model-agnostic approximation of chat-template
//! markers, not an exact count.
//!
//! If the tokenizer fails, counting falls back to ⌈chars / 4⌉ per text so a
//! request is never rejected because of measurement.

use std::fmt;
use std::sync::Arc;

use crate::context::tokenizer::Tokenize;
use crate::types::{Content, ContentPart, Message};

/// Fixed per-message cost of role markers
pub const MESSAGE_OVERHEAD: usize = 4;

/// Flat estimate for an `input_audio` part
pub const AUDIO_PART_TOKENS: usize = 10;

/// Flat estimate for an `image_url` part
pub const IMAGE_PART_TOKENS: usize = 50;

/// Chat-template buffer, expressed as numerator/denominator of 1.10
const TEMPLATE_OVERHEAD_NUM: usize = 11;
const TEMPLATE_OVERHEAD_DEN: usize = 10;

/// Characters per token used when the tokenizer is unavailable
const FALLBACK_CHARS_PER_TOKEN: usize = 4;

/// Token counter over a shared tokenizer
#[derive(Clone)]
pub struct TokenCounter {
    tokenizer: Arc<dyn Tokenize>,
}

impl fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCounter").finish_non_exhaustive()
    }
}

impl TokenCounter {
    /// Create new token counter
    pub fn new(tokenizer: Arc<dyn Tokenize>) -> Self {
        Self { tokenizer }
    }

    /// Create a counter taking ownership of a tokenizer
    pub fn from_tokenizer<T: Tokenize + 'static>(tokenizer: T) -> Self {
        Self::new(Arc::new(tokenizer))
    }

    /// Count tokens in text; 0 for empty input
    pub fn count_tokens(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }

        match self.tokenizer.tokenize(text, false, true) {
            Ok(tokens) => tokens.len(),
            Err(e) => {
                tracing::warn!(error = %e, "Tokenizer failed, using character estimate");
                Self::fallback_estimate(text)
            }
        }
    }

    /// Count tokens in a single message including role overhead
    pub fn count_message_tokens(&self, message: &Message) -> usize {
        MESSAGE_OVERHEAD + self.count_content_tokens(message)
    }

    /// Count tokens in a message's content only
    pub fn count_content_tokens(&self, message: &Message) -> usize {
        match &message.content {
            None => 0,
            Some(Content::Text(text)) => self.count_tokens(text),
            Some(Content::Parts(parts)) => parts.iter().map(|p| self.count_part_tokens(p)).sum(),
        }
    }

    fn count_part_tokens(&self, part: &ContentPart) -> usize {
        match part {
            ContentPart::Text { text } => self.count_tokens(text),
            ContentPart::InputAudio { .. } => AUDIO_PART_TOKENS,
            ContentPart::ImageUrl { .. } => IMAGE_PART_TOKENS,
            ContentPart::Unknown => 0,
        }
    }

    /// Sum of message tokens over an ordered history
    ///
    /// # Complexity
    /// O(Σ n_i) where n_i = length of each message
    pub fn count_messages_tokens(&self, messages: &[Message]) -> usize {
        messages.iter().map(|m| self.count_message_tokens(m)).sum()
    }

    /// Estimate prompt tokens as sent to the model
    ///
    /// With `include_template_overhead` the raw count is scaled by 1.10 and
    /// truncated toward zero. This is an approximation of template markers,
    /// not an exact figure for any particular model.
    pub fn estimate_prompt_tokens(
        &self,
        messages: &[Message],
        include_template_overhead: bool,
    ) -> usize {
        let raw = self.count_messages_tokens(messages);
        if include_template_overhead {
            Self::apply_template_overhead(raw)
        } else {
            raw
        }
    }

    /// ⌊raw × 1.10⌋ in integer arithmetic
    pub fn apply_template_overhead(raw_tokens: usize) -> usize {
        raw_tokens * TEMPLATE_OVERHEAD_NUM / TEMPLATE_OVERHEAD_DEN
    }

    /// Cut text down to its first `max_tokens` tokens
    ///
    /// Returns the text unchanged when it already fits. Never fails; for
    /// `max_tokens == 0` the result is empty.
    pub fn truncate_to_tokens(&self, text: &str, max_tokens: usize) -> String {
        if max_tokens == 0 {
            return String::new();
        }

        let tokens = match self.tokenizer.tokenize(text, false, true) {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(error = %e, "Tokenizer failed, truncating by characters");
                return Self::fallback_truncate(text, max_tokens);
            }
        };

        if tokens.len() <= max_tokens {
            return text.to_string();
        }

        match self.tokenizer.detokenize(&tokens[..max_tokens]) {
            Ok(truncated) => truncated,
            Err(e) => {
                tracing::warn!(error = %e, "Detokenizer failed, truncating by characters");
                Self::fallback_truncate(text, max_tokens)
            }
        }
    }

    /// Estimate with detailed breakdown
    pub fn estimate_detailed(&self, messages: &[Message]) -> TokenEstimate {
        let content_tokens: usize = messages.iter().map(|m| self.count_content_tokens(m)).sum();
        let role_overhead = messages.len() * MESSAGE_OVERHEAD;
        let raw_tokens = content_tokens + role_overhead;

        TokenEstimate {
            message_count: messages.len(),
            content_tokens,
            role_overhead,
            raw_tokens,
            estimate: Self::apply_template_overhead(raw_tokens),
        }
    }

    /// ⌈chars / 4⌉, used when the tokenizer cannot be consulted
    fn fallback_estimate(text: &str) -> usize {
        let char_count = text.chars().count();
        (char_count + FALLBACK_CHARS_PER_TOKEN - 1) / FALLBACK_CHARS_PER_TOKEN
    }

    fn fallback_truncate(text: &str, max_tokens: usize) -> String {
        text.chars()
            .take(max_tokens.saturating_mul(FALLBACK_CHARS_PER_TOKEN))
            .collect()
    }
}

/// Detailed token estimate with breakdown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEstimate {
    /// Number of messages measured
    pub message_count: usize,

    /// Tokens from message content alone
    pub content_tokens: usize,

    /// Fixed role-marker cost (4 per message)
    pub role_overhead: usize,

    /// content_tokens + role_overhead
    pub raw_tokens: usize,

    /// raw_tokens × 1.10, truncated
    pub estimate: usize,
}

impl TokenEstimate {
    /// Get margin between raw count and estimate
    pub fn template_overhead(&self) -> usize {
        self.estimate.saturating_sub(self.raw_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tokenizer::test_support::{BrokenTokenizer, CharTokenizer};
    use crate::types::{ImageUrl, InputAudio, Role};

    fn counter() -> TokenCounter {
        TokenCounter::from_tokenizer(CharTokenizer)
    }

    #[test]
    fn test_count_tokens() {
        let counter = counter();
        assert_eq!(counter.count_tokens(&"a".repeat(100)), 100);
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(counter().count_tokens(""), 0);
    }

    #[test]
    fn test_message_overhead() {
        let counter = counter();
        assert_eq!(counter.count_message_tokens(&Message::user("abc")), 7);
        assert_eq!(counter.count_message_tokens(&Message::empty(Role::Assistant)), 4);
    }

    #[test]
    fn test_multimodal_parts() {
        let counter = counter();
        let msg = Message::with_parts(
            Role::User,
            vec![
                ContentPart::Text { text: "abcd".to_string() },
                ContentPart::InputAudio { input_audio: InputAudio::default() },
                ContentPart::ImageUrl { image_url: ImageUrl::default() },
                ContentPart::Unknown,
            ],
        );

        // 4 overhead + 4 text + 10 audio + 50 image + 0 unknown
        assert_eq!(counter.count_message_tokens(&msg), 68);
    }

    #[test]
    fn test_estimate_prompt_tokens() {
        let counter = counter();
        let messages: Vec<Message> = (0..3).map(|_| Message::user("a".repeat(1000))).collect();

        assert_eq!(counter.count_messages_tokens(&messages), 3012);
        assert_eq!(counter.estimate_prompt_tokens(&messages, true), 3313);
        assert_eq!(counter.estimate_prompt_tokens(&messages, false), 3012);
    }

    #[test]
    fn test_truncate_to_tokens() {
        let counter = counter();
        assert_eq!(counter.truncate_to_tokens("hello world", 5), "hello");
        assert_eq!(counter.truncate_to_tokens("hello", 10), "hello");
        assert_eq!(counter.truncate_to_tokens("hello", 0), "");
    }

    #[test]
    fn test_broken_tokenizer_falls_back() {
        let counter = TokenCounter::from_tokenizer(BrokenTokenizer);

        // 100 chars ≈ 25 tokens
        assert_eq!(counter.count_tokens(&"a".repeat(100)), 25);
        // 1 char = 1 token (ceiling division)
        assert_eq!(counter.count_tokens("a"), 1);
        // 3 tokens ≈ 12 characters
        assert_eq!(counter.truncate_to_tokens(&"b".repeat(40), 3), "b".repeat(12));
    }

    #[test]
    fn test_detailed_estimate() {
        let counter = counter();
        let messages = vec![Message::system("a".repeat(96)), Message::user("b".repeat(100))];

        let detailed = counter.estimate_detailed(&messages);

        assert_eq!(detailed.message_count, 2);
        assert_eq!(detailed.content_tokens, 196);
        assert_eq!(detailed.role_overhead, 8);
        assert_eq!(detailed.raw_tokens, 204);
        assert_eq!(detailed.estimate, 224);
        assert_eq!(detailed.template_overhead(), 20);
    }

    #[test]
    fn test_unicode_characters() {
        let counter = counter();
        assert_eq!(counter.count_tokens("日本語"), 3);
        assert_eq!(counter.truncate_to_tokens("日本語", 2), "日本");
    }

    #[test]
    fn test_counter_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TokenCounter>();
    }
}
