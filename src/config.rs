//! Configuration parsing for the retry runner.
//!
//! Handles loading configuration from YAML files, with serde defaults
//! and validation.

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::path::Path;

use crate::error::{
    ConfigError, EmptyLedgerPathSnafu, ReadFileSnafu, YamlParseSnafu, ZeroBatchSizeSnafu,
};

/// Main configuration structure for retry runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the error ledger file (NDJSON of failure records).
    pub ledger_path: String,

    /// Number of failed IDs retried per migrator invocation (default: 50).
    /// Shared by all entity types.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// What the aggregate run does when one entity type's pass hits a
    /// batch-fatal migrator error (default: halt).
    #[serde(default)]
    pub on_migrator_error: FailurePolicy,
}

fn default_batch_size() -> usize {
    50
}

/// Policy for batch-fatal errors during an aggregate retry run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the whole run on the first failed entity pass. The ledger is
    /// left unclosed so the pre-run failure state survives for the next
    /// invocation.
    #[default]
    Halt,
    /// Log the failure and let the remaining entity types still attempt
    /// their retries.
    Continue,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).context(ReadFileSnafu)?;
        let config: Config = serde_yaml::from_str(&content).context(YamlParseSnafu)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(self.batch_size > 0, ZeroBatchSizeSnafu);
        ensure!(!self.ledger_path.is_empty(), EmptyLedgerPathSnafu);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_yaml_parsing() {
        let yaml = r#"
ledger_path: "migration-errors.ndjson"
batch_size: 25
on_migrator_error: continue
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.ledger_path, "migration-errors.ndjson");
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.on_migrator_error, FailurePolicy::Continue);
    }

    #[test]
    fn test_config_defaults() {
        let yaml = r#"
ledger_path: "errors.ndjson"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.on_migrator_error, FailurePolicy::Halt);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = Config {
            ledger_path: "errors.ndjson".to_string(),
            batch_size: 0,
            on_migrator_error: FailurePolicy::Halt,
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroBatchSize)
        ));
    }

    #[test]
    fn test_empty_ledger_path_rejected() {
        let config = Config {
            ledger_path: String::new(),
            batch_size: 50,
            on_migrator_error: FailurePolicy::Halt,
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyLedgerPath)
        ));
    }
}
