//! Configuration
//!
//! Every section has defaults, so an empty TOML document is a valid config.
//!
//! ```toml
//! [generation]
//! max_retries = 3
//! default_model = "gpt-4o-mini"
//!
//! [history]
//! max_backups = 10
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoundryConfig {
    /// Generation and retry settings
    pub generation: GenerationConfig,
    /// Version history settings
    pub history: HistoryConfig,
    /// Project context assembly
    pub context: ContextConfig,
    /// File listing
    pub sandbox: SandboxConfig,
    /// Log output
    pub logging: LoggingConfig,
}

impl FoundryConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With max attempts per single-shot generation
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.generation.max_retries = max_retries;
        self
    }

    /// With default model id
    #[inline]
    #[must_use]
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.generation.default_model = model.into();
        self
    }

    /// With backup retention cap
    #[inline]
    #[must_use]
    pub fn with_max_backups(mut self, max_backups: usize) -> Self {
        self.history.max_backups = max_backups;
        self
    }

    /// With history enabled or disabled
    #[inline]
    #[must_use]
    pub fn with_history(mut self, enabled: bool) -> Self {
        self.history.enabled = enabled;
        self
    }

    /// Parse from TOML text and validate
    ///
    /// # Errors
    /// `ConfigError::Parse` on malformed input, `ConfigError::Invalid` on bad values
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file and validate
    ///
    /// # Errors
    /// `ConfigError::Io` if unreadable, otherwise as [`Self::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the first offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.max_retries == 0 {
            return Err(ConfigError::Invalid {
                field: "generation.max_retries",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.generation.event_buffer == 0 {
            return Err(ConfigError::Invalid {
                field: "generation.event_buffer",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.history.max_backups == 0 {
            return Err(ConfigError::Invalid {
                field: "history.max_backups",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(ConfigError::Invalid {
                field: "generation.temperature",
                reason: format!("{} is outside 0.0..=2.0", self.generation.temperature),
            });
        }
        Ok(())
    }
}

/// Generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Total attempts per single-shot call
    pub max_retries: u32,
    /// Model used when no override is given
    pub default_model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Capacity of the streaming event channel
    pub event_buffer: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            default_model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            event_buffer: 256,
        }
    }
}

/// Version history settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Back up files before overwriting
    pub enabled: bool,
    /// Retained versions per file
    pub max_backups: usize,
    /// Directory name under the project root
    pub dir_name: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_backups: foundry_sandbox::DEFAULT_MAX_BACKUPS,
            dir_name: foundry_sandbox::DEFAULT_HISTORY_DIR.to_string(),
        }
    }
}

/// Project context settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Directory depth of the project tree
    pub tree_depth: usize,
    /// Cap on tree lines
    pub max_tree_entries: usize,
    /// Files whose content is included when present
    pub key_files: Vec<String>,
    /// Per-file character budget
    pub max_file_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            tree_depth: 2,
            max_tree_entries: 200,
            key_files: [
                "README.md",
                "package.json",
                "requirements.txt",
                "pyproject.toml",
                "Cargo.toml",
                "main.py",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            max_file_chars: 2000,
        }
    }
}

/// File listing settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Depth passed to `list_files`
    pub list_max_depth: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            list_max_depth: foundry_sandbox::DEFAULT_LIST_DEPTH,
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive; `RUST_LOG` wins when set
    pub filter: String,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_is_default() {
        let config = FoundryConfig::from_toml_str("").unwrap();
        assert_eq!(config, FoundryConfig::default());
        assert_eq!(config.generation.max_retries, 3);
        assert_eq!(config.history.max_backups, 10);
        assert_eq!(config.context.tree_depth, 2);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = FoundryConfig::from_toml_str(
            r#"
            [generation]
            max_retries = 5

            [logging]
            json = true
            "#,
        )
        .unwrap();

        assert_eq!(config.generation.max_retries, 5);
        assert_eq!(config.generation.default_model, "gpt-4o-mini");
        assert!(config.logging.json);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn zero_retries_rejected() {
        let err = FoundryConfig::from_toml_str("[generation]\nmax_retries = 0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "generation.max_retries",
                ..
            }
        ));
    }

    #[test]
    fn zero_backups_rejected() {
        let err = FoundryConfig::new().with_max_backups(0).validate().unwrap_err();
        assert!(err.to_string().contains("history.max_backups"));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = FoundryConfig::from_toml_str("[generation\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foundry.toml");
        std::fs::write(&path, "[history]\nenabled = false\n").unwrap();

        let config = FoundryConfig::load(&path).unwrap();
        assert!(!config.history.enabled);
        assert!(matches!(
            FoundryConfig::load(dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
