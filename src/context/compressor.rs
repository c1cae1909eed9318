//! History compression ahead of hard truncation
//!
//! Shrinks the older part of a conversation while the most recent messages
//! pass through verbatim.
//!
//! ```text
//! Input:  M = [m₁ … mₙ], preserve_recent = k
//! Output: compress(M[..n-k]) ++ M[n-k..]
//!
//! compress(old) applies, in order:
//!   1. whitespace normalization
//!   2. tool results over 200 tokens → first 200 tokens + marker
//!   3. assistant code blocks over 20 lines → first 5 lines + line count
//!   4. duplicate removal, latest occurrence wins (content ≥ 50 chars)
//! ```
//!
//! Output of every step is a fixed point of that step, so compressing an
//! already compressed history never increases its token count.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::context::counter::TokenCounter;
use crate::types::{Message, Role};

/// Compression defaults
pub const PRESERVE_RECENT: usize = 4;
pub const MAX_TOOL_RESULT_TOKENS: usize = 200;
pub const MAX_CODE_BLOCK_LINES: usize = 20;
pub const CODE_BLOCK_KEEP_LINES: usize = 5;
pub const DEDUP_MIN_CHARS: usize = 50;

pub const RESULT_TRUNCATED_MARKER: &str = "[... result truncated ...]";

/// Characters per token when no counter is configured
const HEURISTIC_CHARS_PER_TOKEN: usize = 4;

static EXCESS_NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static INNER_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\S) {2,}").unwrap());
static CODE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```([^\n`]*)\n(.*?)```").unwrap());
static PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Tunables for [`HistoryCompressor`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Messages at the end of the history left untouched (default: 4)
    pub preserve_recent: usize,

    /// Token cap for old tool results (default: 200)
    pub max_tool_result_tokens: usize,

    /// Code blocks longer than this are collapsed (default: 20)
    pub max_code_block_lines: usize,

    /// Lines a collapsed code block keeps (default: 5)
    pub code_block_keep_lines: usize,

    /// Shorter messages are never treated as duplicates (default: 50)
    pub dedup_min_chars: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            preserve_recent: PRESERVE_RECENT,
            max_tool_result_tokens: MAX_TOOL_RESULT_TOKENS,
            max_code_block_lines: MAX_CODE_BLOCK_LINES,
            code_block_keep_lines: CODE_BLOCK_KEEP_LINES,
            dedup_min_chars: DEDUP_MIN_CHARS,
        }
    }
}

/// Near-lossless compressor for older conversation history
#[derive(Debug, Clone, Default)]
pub struct HistoryCompressor {
    counter: Option<TokenCounter>,
    config: CompressionConfig,
}

impl HistoryCompressor {
    /// Create new history compressor; without a counter, tool results are
    /// measured at 4 characters per token
    pub fn new(counter: Option<TokenCounter>) -> Self {
        Self {
            counter,
            config: CompressionConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CompressionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    /// Compress using the configured `preserve_recent`
    pub fn compress(&self, messages: &[Message]) -> Vec<Message> {
        self.compress_with(messages, self.config.preserve_recent)
    }

    /// Compress everything except the last `preserve_recent` messages
    pub fn compress_with(&self, messages: &[Message], preserve_recent: usize) -> Vec<Message> {
        let mut messages = messages.to_vec();

        if messages.len() <= preserve_recent {
            for message in &mut messages {
                normalize_whitespace(message);
            }
            return messages;
        }

        let recent = messages.split_off(messages.len() - preserve_recent);
        let mut old = messages;

        for message in &mut old {
            normalize_whitespace(message);
        }
        for message in old.iter_mut().filter(|m| m.role == Role::Tool) {
            self.compress_tool_result(message);
        }
        for message in old.iter_mut().filter(|m| m.role == Role::Assistant) {
            self.compress_code_blocks(message);
        }
        let mut compressed = self.remove_duplicates(old);

        tracing::debug!(
            preserved = recent.len(),
            compressed = compressed.len(),
            "Compressed conversation history"
        );

        compressed.extend(recent);
        compressed
    }

    /// Cap an old tool result at `max_tool_result_tokens`
    fn compress_tool_result(&self, message: &mut Message) {
        let text = message.text();
        let limit = self.config.max_tool_result_tokens;

        let truncated = match &self.counter {
            Some(counter) => {
                if counter.count_tokens(&text) <= limit {
                    return;
                }
                counter.truncate_to_tokens(&text, limit)
            }
            None => {
                let char_count = text.chars().count();
                let estimate =
                    (char_count + HEURISTIC_CHARS_PER_TOKEN - 1) / HEURISTIC_CHARS_PER_TOKEN;
                if estimate <= limit {
                    return;
                }
                text.chars().take(limit * HEURISTIC_CHARS_PER_TOKEN).collect()
            }
        };

        message.replace_text(format!("{truncated}\n\n{RESULT_TRUNCATED_MARKER}"));
    }

    /// Collapse long fenced code blocks, keeping the fence and language tag
    fn compress_code_blocks(&self, message: &mut Message) {
        let max_lines = self.config.max_code_block_lines;
        let keep_lines = self.config.code_block_keep_lines;

        message.map_text(|text| {
            CODE_BLOCK
                .replace_all(text, |caps: &Captures| {
                    let language = &caps[1];
                    let body = &caps[2];
                    let lines: Vec<&str> = body.lines().collect();

                    if lines.len() <= max_lines {
                        return caps[0].to_string();
                    }

                    let kept = lines[..keep_lines.min(lines.len())].join("\n");
                    format!(
                        "```{language}\n{kept}\n# ... ({} lines total) ...\n```",
                        lines.len()
                    )
                })
                .into_owned()
        });
    }

    /// Drop earlier copies of repeated content, keeping the latest one
    fn remove_duplicates(&self, messages: Vec<Message>) -> Vec<Message> {
        let mut seen: HashSet<[u8; 32]> = HashSet::new();
        let mut kept = Vec::with_capacity(messages.len());

        for message in messages.into_iter().rev() {
            let text = message.text();
            if text.chars().count() < self.config.dedup_min_chars {
                kept.push(message);
                continue;
            }

            if seen.insert(content_fingerprint(&text)) {
                kept.push(message);
            } else {
                tracing::debug!(role = ?message.role, "Dropped duplicate message");
            }
        }

        kept.reverse();
        kept
    }

    /// Get compression statistics
    pub fn compression_stats(&self, before: &[Message], after: &[Message]) -> CompressionStats {
        let tokens_before = self.count_total_tokens(before);
        let tokens_after = self.count_total_tokens(after);
        let entries_before = before.len();
        let entries_after = after.len();

        let token_reduction = tokens_before.saturating_sub(tokens_after);
        let entry_reduction = entries_before.saturating_sub(entries_after);

        let token_reduction_percent = if tokens_before > 0 {
            (token_reduction as f64 / tokens_before as f64) * 100.0
        } else {
            0.0
        };

        CompressionStats {
            tokens_before,
            tokens_after,
            token_reduction,
            token_reduction_percent,
            entries_before,
            entries_after,
            entry_reduction,
        }
    }

    fn count_total_tokens(&self, messages: &[Message]) -> usize {
        match &self.counter {
            Some(counter) => counter.count_messages_tokens(messages),
            None => messages
                .iter()
                .map(|m| {
                    let chars = m.text().chars().count();
                    (chars + HEURISTIC_CHARS_PER_TOKEN - 1) / HEURISTIC_CHARS_PER_TOKEN
                })
                .sum(),
        }
    }
}

/// Collapse blank-line runs and inner space runs; leading indentation stays
fn normalize_whitespace(message: &mut Message) {
    message.map_text(|text| {
        let text = EXCESS_NEWLINES.replace_all(text, "\n\n");
        let text = INNER_SPACES.replace_all(&text, "${1} ");
        text.trim().to_string()
    });
}

/// Hash of content with case, punctuation and spacing differences removed
fn content_fingerprint(text: &str) -> [u8; 32] {
    let lowered = text.to_lowercase();
    let stripped = PUNCTUATION.replace_all(&lowered, "");
    let collapsed = WHITESPACE_RUN.replace_all(&stripped, " ");
    Sha256::digest(collapsed.trim().as_bytes()).into()
}

/// Compression statistics
#[derive(Debug, Clone)]
pub struct CompressionStats {
    pub tokens_before: usize,
    pub tokens_after: usize,
    pub token_reduction: usize,
    pub token_reduction_percent: f64,
    pub entries_before: usize,
    pub entries_after: usize,
    pub entry_reduction: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tokenizer::test_support::CharTokenizer;

    fn compressor() -> HistoryCompressor {
        HistoryCompressor::new(Some(TokenCounter::from_tokenizer(CharTokenizer)))
    }

    fn filler(count: usize) -> Vec<Message> {
        (0..count).map(|i| Message::user(format!("recent {}", i))).collect()
    }

    fn code_block(lines: usize) -> String {
        let body: Vec<String> = (1..=lines).map(|i| format!("print({})", i)).collect();
        format!("Here you go:\n```python\n{}\n```\nDone.", body.join("\n"))
    }

    #[test]
    fn test_short_history_only_normalized() {
        let compressor = compressor();
        let messages = vec![
            Message::user("  hello   world  "),
            Message::tool("x".repeat(2_000)),
        ];

        let compressed = compressor.compress(&messages);

        assert_eq!(compressed.len(), 2);
        assert_eq!(compressed[0].text(), "hello world");
        assert_eq!(compressed[1].text(), "x".repeat(2_000));
    }

    #[test]
    fn test_whitespace_normalization() {
        let mut message =
            Message::assistant("\n\nfirst\n\n\n\n\nsecond  line\n    indented    code\n");
        normalize_whitespace(&mut message);
        assert_eq!(message.text(), "first\n\nsecond line\n    indented code");
    }

    #[test]
    fn test_recent_messages_untouched() {
        let compressor = compressor();
        let mut messages = vec![Message::user("old   message")];
        messages.push(Message::tool("y".repeat(1_000)));
        messages.extend(filler(3));
        messages.push(Message::user("latest    query"));

        let compressed = compressor.compress(&messages);

        assert_eq!(compressed[0].text(), "old message");
        assert_eq!(compressed.last().unwrap().text(), "latest    query");
        assert_eq!(&compressed[compressed.len() - 4..], &messages[messages.len() - 4..]);
    }

    #[test]
    fn test_tool_result_compression() {
        let compressor = compressor();
        let mut messages = vec![Message::tool("r".repeat(1_000))];
        messages.extend(filler(4));

        let compressed = compressor.compress(&messages);
        let text = compressed[0].text();

        assert!(text.starts_with(&"r".repeat(200)));
        assert!(!text.starts_with(&"r".repeat(201)));
        assert!(text.ends_with(RESULT_TRUNCATED_MARKER));
    }

    #[test]
    fn test_tool_result_heuristic_without_counter() {
        let compressor = HistoryCompressor::new(None);
        let mut messages = vec![Message::tool("r".repeat(1_000)), Message::tool("s".repeat(800))];
        messages.extend(filler(4));

        let compressed = compressor.compress(&messages);

        // 1000 chars ≈ 250 tokens → cut to 800 chars
        assert_eq!(
            compressed[0].text(),
            format!("{}\n\n{}", "r".repeat(800), RESULT_TRUNCATED_MARKER)
        );
        // 800 chars ≈ 200 tokens → within limit
        assert_eq!(compressed[1].text(), "s".repeat(800));
    }

    #[test]
    fn test_code_block_compression() {
        let compressor = compressor();
        let mut messages = vec![Message::assistant(code_block(25))];
        messages.extend(filler(4));

        let compressed = compressor.compress(&messages);
        let expected = "Here you go:\n```python\nprint(1)\nprint(2)\nprint(3)\nprint(4)\nprint(5)\n\
                        # ... (25 lines total) ...\n```\nDone.";

        assert_eq!(compressed[0].text(), expected);
    }

    #[test]
    fn test_short_code_block_untouched() {
        let compressor = compressor();
        let mut messages = vec![Message::assistant(code_block(20))];
        messages.extend(filler(4));

        let compressed = compressor.compress(&messages);
        assert_eq!(compressed[0].text(), code_block(20));
    }

    #[test]
    fn test_code_blocks_only_for_assistant() {
        let compressor = compressor();
        let mut messages = vec![Message::user(code_block(30))];
        messages.extend(filler(4));

        let compressed = compressor.compress(&messages);
        assert_eq!(compressed[0].text(), code_block(30));
    }

    #[test]
    fn test_duplicate_removal_keeps_latest() {
        let compressor = compressor();
        let long = "The build failed because the linker could not find libssl on this host.";
        let mut messages = vec![
            Message::assistant(long),
            Message::user("ok"),
            Message::assistant(
                "the BUILD failed, because the linker could not find libssl on this host",
            ),
            Message::user("ok"),
        ];
        messages.extend(filler(4));

        let compressed = compressor.compress(&messages);

        assert_eq!(compressed.len(), 7);
        assert_eq!(compressed[0].text(), "ok");
        assert!(compressed[1].text().starts_with("the BUILD"));
        assert_eq!(compressed[2].text(), "ok");
    }

    #[test]
    fn test_fingerprint_normalization() {
        assert_eq!(
            content_fingerprint("Hello,   World!"),
            content_fingerprint("hello world")
        );
        assert_ne!(content_fingerprint("hello world"), content_fingerprint("hello there"));
    }

    #[test]
    fn test_second_pass_never_grows() {
        let compressor = compressor();
        let mut messages = vec![
            Message::tool("t".repeat(900)),
            Message::assistant(code_block(40)),
            Message::assistant("  spaced   out   text  "),
        ];
        messages.extend(filler(4));

        let once = compressor.compress(&messages);
        let twice = compressor.compress(&once);

        let counter = TokenCounter::from_tokenizer(CharTokenizer);
        assert!(counter.count_messages_tokens(&twice) <= counter.count_messages_tokens(&once));
        assert!(counter.count_messages_tokens(&once) < counter.count_messages_tokens(&messages));
    }

    #[test]
    fn test_compression_stats() {
        let compressor = compressor();
        let mut messages = vec![Message::tool("a".repeat(2_000)), Message::tool("a".repeat(2_000))];
        messages.extend(filler(4));

        let compressed = compressor.compress(&messages);
        let stats = compressor.compression_stats(&messages, &compressed);

        assert!(stats.tokens_before > stats.tokens_after);
        assert!(stats.token_reduction > 0);
        assert!(stats.token_reduction_percent > 0.0);
        assert_eq!(stats.entries_before, 6);
        assert_eq!(stats.entries_after, 5);
        assert_eq!(stats.entry_reduction, 1);
    }

    #[test]
    fn test_custom_preserve_recent() {
        let compressor = compressor();
        let messages = vec![
            Message::tool("z".repeat(500)),
            Message::tool("z".repeat(500)),
        ];

        let compressed = compressor.compress_with(&messages, 0);
        assert_eq!(compressed.len(), 1);
        assert!(compressed[0].text().ends_with(RESULT_TRUNCATED_MARKER));
    }

    #[test]
    fn test_empty_input() {
        assert!(compressor().compress(&[]).is_empty());
    }
}
