// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Compiler Configuration
//!
//! One document configures the whole pipeline:
//! - Near-miss suggestions for unknown names
//! - Prefix of generated aliases and of transition tables
//! - Maximum query nesting depth
//! - Log filter directives
//!
//! Keys are camelCase and every key is optional.
//!
//! ## Example
//!
//! ```rust
//! use polyschema_sql_compiler::CompilerConfig;
//!
//! let config = CompilerConfig::from_yaml(
//!     "suggestions:\n  maxDistance: 1\ntransitionTablePrefix: tmp_\n",
//! )
//! .unwrap();
//! assert_eq!(config.analyzer.suggestions.max_distance, 1);
//! assert_eq!(config.lowering.transition_table_prefix, "tmp_");
//! assert_eq!(config.analyzer.auto_alias_prefix, "__auto_");
//! ```

use polyschema_sql_lowering::LoweringConfig;
use polyschema_sql_semantic::AnalyzerConfig;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Log filter used when none is configured
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Main compiler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompilerConfig {
    /// Name resolution settings
    #[serde(flatten)]
    pub analyzer: AnalyzerConfig,

    /// Plan lowering settings
    #[serde(flatten)]
    pub lowering: LoweringConfig,

    /// `tracing` filter directives, e.g. `polyschema_sql_semantic=debug`
    pub log_filter: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            analyzer: AnalyzerConfig::default(),
            lowering: LoweringConfig::default(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl CompilerConfig {
    /// Parse and validate a JSON document
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// Checks that:
    /// - Generated names have a non-empty prefix
    /// - Generated aliases cannot be mistaken for transition tables
    /// - At least one level of query nesting is allowed
    /// - The log filter parses
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.analyzer.auto_alias_prefix.is_empty() {
            return Err(ConfigError::Invalid {
                field: "autoAliasPrefix",
                reason: "must not be empty".to_string(),
            });
        }

        if self.lowering.transition_table_prefix.is_empty() {
            return Err(ConfigError::Invalid {
                field: "transitionTablePrefix",
                reason: "must not be empty".to_string(),
            });
        }

        if self.analyzer.auto_alias_prefix == self.lowering.transition_table_prefix {
            return Err(ConfigError::Invalid {
                field: "transitionTablePrefix",
                reason: "must differ from autoAliasPrefix".to_string(),
            });
        }

        if self.lowering.max_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "maxDepth",
                reason: "must be > 0".to_string(),
            });
        }

        self.env_filter().map(|_| ())
    }

    /// Build the `tracing` filter described by `log_filter`
    pub fn env_filter(&self) -> Result<EnvFilter, ConfigError> {
        EnvFilter::try_new(&self.log_filter).map_err(|e| ConfigError::LogFilter {
            filter: self.log_filter.clone(),
            reason: e.to_string(),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Malformed JSON document
    #[error("Invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed YAML document
    #[error("Invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A setting has an unusable value
    #[error("Invalid setting '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },

    /// The log filter does not parse
    #[error("Invalid log filter '{filter}': {reason}")]
    LogFilter { filter: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CompilerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.log_filter, "warn");
    }

    #[test]
    fn test_from_json() {
        let config = CompilerConfig::from_json(
            r#"{
                "suggestions": { "maxSuggestions": 3, "phonetic": false },
                "autoAliasPrefix": "_a",
                "maxDepth": 8,
                "logFilter": "polyschema_sql_lowering=debug"
            }"#,
        )
        .unwrap();

        assert_eq!(config.analyzer.suggestions.max_suggestions, 3);
        assert!(!config.analyzer.suggestions.phonetic);
        assert_eq!(config.analyzer.suggestions.max_distance, 2);
        assert_eq!(config.analyzer.auto_alias_prefix, "_a");
        assert_eq!(config.lowering.max_depth, 8);
        assert_eq!(config.lowering.transition_table_prefix, "__t");
        assert_eq!(config.log_filter, "polyschema_sql_lowering=debug");
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = CompilerConfig::from_json("{}").unwrap();
        assert_eq!(config, CompilerConfig::default());
    }

    #[test]
    fn test_malformed_documents() {
        assert!(matches!(
            CompilerConfig::from_json("{"),
            Err(ConfigError::Json(_))
        ));
        assert!(matches!(
            CompilerConfig::from_yaml("maxDepth: [1"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_validation() {
        let err = CompilerConfig::from_json(r#"{"transitionTablePrefix": ""}"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "transitionTablePrefix",
                ..
            }
        ));

        let err = CompilerConfig::from_json(r#"{"maxDepth": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "maxDepth", .. }));

        let err = CompilerConfig::from_yaml("autoAliasPrefix: x\ntransitionTablePrefix: x\n")
            .unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn test_invalid_log_filter() {
        let config = CompilerConfig {
            log_filter: "polyschema=notalevel".to_string(),
            ..CompilerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::LogFilter { .. })
        ));
    }
}
