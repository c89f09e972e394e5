//! Error types for the retry runner.

use snafu::prelude::*;

use crate::migrator::EntityKind;

/// Errors that can occur while loading configuration.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[snafu(display("Failed to read config file: {source}"))]
    ReadFile { source: std::io::Error },

    /// Failed to parse the configuration YAML.
    #[snafu(display("Failed to parse config YAML: {source}"))]
    YamlParse { source: serde_yaml::Error },

    /// Batch size must be at least 1.
    #[snafu(display("batch_size must be greater than zero"))]
    ZeroBatchSize,

    /// Ledger path must not be empty.
    #[snafu(display("ledger_path must not be empty"))]
    EmptyLedgerPath,
}

/// Errors that can occur while reading or writing the error ledger.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LedgerError {
    /// Failed to read the ledger file.
    #[snafu(display("Failed to read ledger file {path}: {source}"))]
    ReadLedgerFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to write the ledger file.
    #[snafu(display("Failed to write ledger file {path}: {source}"))]
    WriteLedgerFile {
        path: String,
        source: std::io::Error,
    },

    /// A ledger line was not a valid failure record.
    #[snafu(display("Failed to parse ledger record at line {line}: {source}"))]
    ParseRecord {
        line: usize,
        source: serde_json::Error,
    },

    /// Failed to serialize a failure record.
    #[snafu(display("Failed to serialize failure record: {source}"))]
    SerializeRecord { source: serde_json::Error },
}

/// Errors surfaced by a batch retry pass.
///
/// Migrator errors are carried as display strings since the migrator's
/// concrete error type belongs to the caller.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RetryError {
    /// The migrator failed while fetching/transforming a batch.
    #[snafu(display("Failed to load {kind} records on batch {batch}: {message}"))]
    FetchBatch {
        kind: EntityKind,
        batch: usize,
        message: String,
    },

    /// The migrator failed while persisting a batch.
    #[snafu(display("Failed to save {kind} records on batch {batch}: {message}"))]
    PersistBatch {
        kind: EntityKind,
        batch: usize,
        message: String,
    },

    /// Ledger error.
    #[snafu(display("Ledger error: {source}"))]
    Ledger { source: LedgerError },

    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },
}

impl RetryError {
    /// The entity kind this error belongs to, if it came from a migrator call.
    pub fn entity_kind(&self) -> Option<EntityKind> {
        match self {
            RetryError::FetchBatch { kind, .. } | RetryError::PersistBatch { kind, .. } => {
                Some(*kind)
            }
            _ => None,
        }
    }
}

impl From<LedgerError> for RetryError {
    fn from(source: LedgerError) -> Self {
        RetryError::Ledger { source }
    }
}

impl From<ConfigError> for RetryError {
    fn from(source: ConfigError) -> Self {
        RetryError::Config { source }
    }
}
