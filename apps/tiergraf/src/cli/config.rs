//! # Configuration
//!
//! Optional `tiergraf.toml` with defaults for rendering and filtering.
//!
//! ```toml
//! root_tier = "utterance"
//! full_html = false
//! boolean_mode = "or"
//! inverted = false
//! log_format = "json"
//! ```
//!
//! Command-line flags take precedence over every value here.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tiergraf_core::{BooleanMode, GrafError};

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "tiergraf.toml";

/// Log output format of the binary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Parse the value of `TIERGRAF_LOG_FORMAT`; anything but `json` is text.
    pub fn from_env_value(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Tier heading the hierarchy to lay out and filter.
    pub root_tier: Option<String>,

    /// Wrap HTML tables in a complete page.
    pub full_html: bool,

    pub boolean_mode: BooleanMode,

    pub inverted: bool,

    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_tier: None,
            full_html: true,
            boolean_mode: BooleanMode::And,
            inverted: false,
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self, GrafError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GrafError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
            .map_err(|e| GrafError::ConfigError(format!("{}: {}", path.display(), e)))
    }

    /// Parse TOML text.
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("Failed to parse config: {}", e))
    }

    /// The explicit file if given (it must exist), otherwise
    /// [`DEFAULT_CONFIG_FILE`] in `dir` if present, otherwise defaults.
    pub fn resolve(explicit: Option<&Path>, dir: &Path) -> Result<Self, GrafError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let default_path = dir.join(DEFAULT_CONFIG_FILE);
        if default_path.is_file() {
            return Self::load(&default_path);
        }
        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::parse("").expect("parse");
        assert_eq!(config, Config::default());
        assert!(config.full_html);
    }

    #[test]
    fn all_keys() {
        let config = Config::parse(
            r#"
            root_tier = "utterance"
            full_html = false
            boolean_mode = "or"
            inverted = true
            log_format = "json"
            "#,
        )
        .expect("parse");

        assert_eq!(config.root_tier.as_deref(), Some("utterance"));
        assert!(!config.full_html);
        assert_eq!(config.boolean_mode, BooleanMode::Or);
        assert!(config.inverted);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn unknown_key_rejected() {
        assert!(Config::parse("colour = true").is_err());
        assert!(Config::parse("boolean_mode = \"xor\"").is_err());
    }

    #[test]
    fn log_format_from_env() {
        assert_eq!(LogFormat::from_env_value("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::from_env_value("pretty"), LogFormat::Text);
    }
}
