//! mulligan: batch retry runner for failed data-migration records.
//!
//! This library provides the control logic for re-attempting a data
//! migration's previously failed items:
//! - Reading failed item identifiers from a persistent error ledger
//! - Slicing them into fixed-size batches and driving an entity-specific
//!   migrator over each batch
//! - Sequencing retry passes across all entity types, then finalizing
//!   the ledger
//!
//! The entity-specific fetch/transform/save logic lives behind the
//! [`EntityMigrator`] trait; callers implement it per entity type.
//!
//! # Example
//!
//! ```ignore
//! use mulligan::{Config, ErrorLedger, LogReporter, retry_entity};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mulligan::RetryError> {
//!     let config = Config::from_file("mulligan.yaml")?;
//!     let ledger = ErrorLedger::open(&config.ledger_path).await?;
//!     let migrator = ChallengeMigrator::new();
//!     let mut progress = LogReporter::default();
//!     let stats = retry_entity(&migrator, &ledger, &config, &mut progress).await?;
//!     println!("Retried {} batches", stats.batches);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod ledger;
pub mod migrator;
pub mod progress;
pub mod retry;

// Re-export main types
pub use config::{Config, FailurePolicy};
pub use error::{ConfigError, LedgerError, RetryError};
pub use ledger::{ErrorLedger, FailureRecord, ItemId};
pub use migrator::{EntityKind, EntityMigrator, MigratedBatch, RetryContext};
pub use progress::{LogReporter, ProgressReporter};
pub use retry::coordinator::{retry_all, RetryCoordinator, RetryPass};
pub use retry::{retry_entity, BatchRetryDriver, RetryStats};
