//! Tokenizer capability
//!
//! The budgeting core never implements a tokenizer itself. The hosting
//! runtime hands one in through [`Tokenize`]; the optional [`HfTokenizer`]
//! adapter covers HuggingFace `tokenizer.json` files.

use crate::errors::Result;

/// Tokenize/detokenize capability supplied by the host runtime
///
/// Implementations must be safe to share across request threads; the core
/// adds no locking of its own.
pub trait Tokenize: Send + Sync {
    /// Convert text into token ids
    fn tokenize(&self, text: &str, add_special: bool, parse_special: bool) -> Result<Vec<u32>>;

    /// Convert token ids back into text
    fn detokenize(&self, tokens: &[u32]) -> Result<String>;
}

#[cfg(feature = "hf-tokenizer")]
pub use hf::HfTokenizer;

#[cfg(feature = "hf-tokenizer")]
mod hf {
    use std::path::Path;
    use std::str::FromStr;

    use tokenizers::Tokenizer;

    use super::Tokenize;
    use crate::errors::{ContextError, Result};

    /// [`Tokenize`] adapter over a HuggingFace tokenizer
    ///
    /// `parse_special` has no equivalent here: added tokens declared in the
    /// tokenizer file are always recognized in input text.
    pub struct HfTokenizer {
        inner: Tokenizer,
    }

    impl HfTokenizer {
        /// Load from a `tokenizer.json` file
        pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
            let path = path.as_ref();
            if !path.exists() {
                return Err(ContextError::TokenizerLoad(format!(
                    "tokenizer file not found: {}",
                    path.display()
                )));
            }

            let inner = Tokenizer::from_file(path)
                .map_err(|e| ContextError::TokenizerLoad(e.to_string()))?;
            Ok(Self { inner })
        }

        /// Parse from the JSON contents of a `tokenizer.json`
        pub fn from_json(json: &str) -> Result<Self> {
            let inner =
                Tokenizer::from_str(json).map_err(|e| ContextError::TokenizerLoad(e.to_string()))?;
            Ok(Self { inner })
        }

        /// Wrap an already constructed tokenizer
        pub fn from_tokenizer(inner: Tokenizer) -> Self {
            Self { inner }
        }
    }

    impl Tokenize for HfTokenizer {
        fn tokenize(
            &self,
            text: &str,
            add_special: bool,
            _parse_special: bool,
        ) -> Result<Vec<u32>> {
            let encoding = self
                .inner
                .encode(text, add_special)
                .map_err(|e| ContextError::Tokenization(e.to_string()))?;
            Ok(encoding.get_ids().to_vec())
        }

        fn detokenize(&self, tokens: &[u32]) -> Result<String> {
            self.inner
                .decode(tokens, false)
                .map_err(|e| ContextError::Tokenization(e.to_string()))
        }
    }

}
