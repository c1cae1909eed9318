//! Configuration for ctxbudget
//!
//! Provides TOML-based configuration with defaults and validation. The
//! library never looks for a config file on its own; callers pass a path or
//! a string explicitly.
//!
//! ```toml
//! [budget]
//! max_completion_tokens = 512
//! safety_margin_pct = 0.05
//!
//! [truncation]
//! strategy = "summarize"
//!
//! [compression]
//! preserve_recent = 4
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::budget::BudgetConfig;
use crate::context::{CompressionConfig, TruncationStrategy};
use crate::errors::{ContextError, Result};

/// Complete configuration for ctxbudget
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub budget: BudgetConfig,
    pub truncation: TruncationConfig,
    pub compression: CompressionConfig,
}

/// Truncation behavior configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TruncationConfig {
    /// Unknown names degrade to `keep_system_sliding` with a warning
    pub strategy: TruncationStrategy,
}

impl Config {
    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| ContextError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ContextError::ConfigError(format!("Failed to read config: {}", e)))?;

        Self::from_toml_str(&contents)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let pct = self.budget.safety_margin_pct;
        if !(0.0..1.0).contains(&pct) {
            return Err(ContextError::ConfigError(format!(
                "safety_margin_pct must be in [0.0, 1.0), got {}",
                pct
            )));
        }

        if self.compression.max_tool_result_tokens == 0 {
            return Err(ContextError::ConfigError(
                "max_tool_result_tokens must be greater than 0".to_string(),
            ));
        }

        if self.compression.code_block_keep_lines > self.compression.max_code_block_lines {
            return Err(ContextError::ConfigError(
                "code_block_keep_lines must not exceed max_code_block_lines".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ContextError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }
}
