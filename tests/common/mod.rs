//! Shared helpers for integration tests

#![allow(dead_code)]

use ctxbudget::{Message, Result, Role, TokenCounter, Tokenize};

/// One token per character, so expected counts can be read off string lengths
pub struct CharTokenizer;

impl Tokenize for CharTokenizer {
    fn tokenize(&self, text: &str, _add_special: bool, _parse_special: bool) -> Result<Vec<u32>> {
        Ok(text.chars().map(|c| c as u32).collect())
    }

    fn detokenize(&self, tokens: &[u32]) -> Result<String> {
        Ok(tokens.iter().filter_map(|&t| char::from_u32(t)).collect())
    }
}

pub fn counter() -> TokenCounter {
    TokenCounter::from_tokenizer(CharTokenizer)
}

/// Message whose text is `tokens` copies of `fill`
pub fn sized(role: Role, tokens: usize, fill: char) -> Message {
    Message::new(role, fill.to_string().repeat(tokens))
}
