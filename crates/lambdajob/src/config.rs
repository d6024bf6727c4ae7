//! Generator configuration.
//!
//! Loaded from YAML; every key is optional and falls back to its default.
//!
//! ```yaml
//! source_extension: cs
//! output_suffix: .g.cs
//! emit_line_directives: true
//! enabled_mask_edge_threshold: 4
//! default_burst: true
//! fail_on_warnings: false
//! ```

use lambdajob_codegen::CodegenOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Extension of source files picked up by directory generation.
    pub source_extension: String,
    /// Suffix replacing the extension of generated files.
    pub output_suffix: String,
    pub emit_line_directives: bool,
    /// Enabled-bit edges up to which chunks are walked as ranges.
    pub enabled_mask_edge_threshold: u32,
    pub default_burst: bool,
    /// Treat warnings as failures.
    pub fail_on_warnings: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            source_extension: "cs".to_string(),
            output_suffix: ".g.cs".to_string(),
            emit_line_directives: true,
            enabled_mask_edge_threshold: 4,
            default_burst: true,
            fail_on_warnings: false,
        }
    }
}

impl GeneratorConfig {
    /// Load a configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let config: GeneratorConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.source_extension.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "source_extension",
                reason: "must not be empty".to_string(),
            });
        }
        if self.output_suffix.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "output_suffix",
                reason: "must not be empty".to_string(),
            });
        }
        if !(1..=64).contains(&self.enabled_mask_edge_threshold) {
            return Err(ConfigError::InvalidValue {
                key: "enabled_mask_edge_threshold",
                reason: format!("{} is outside 1..=64", self.enabled_mask_edge_threshold),
            });
        }
        Ok(())
    }

    pub fn codegen_options(&self) -> CodegenOptions {
        CodegenOptions {
            emit_line_directives: self.emit_line_directives,
            enabled_mask_edge_threshold: self.enabled_mask_edge_threshold,
            default_burst: self.default_burst,
        }
    }
}
