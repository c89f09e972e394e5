//! Aggregate retry coordinator.
//!
//! Runs the batch retry driver for every known entity type, strictly
//! sequentially and in a fixed order, with per-pass ledger close
//! suppressed. The ledger is closed exactly once at the end, after the
//! last pass.

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::config::{Config, FailurePolicy};
use crate::error::RetryError;
use crate::ledger::ErrorLedger;
use crate::migrator::{EntityKind, EntityMigrator};
use crate::progress::ProgressReporter;
use crate::retry::{BatchRetryDriver, RetryStats};

/// One entity type's full retry pass, with its item type erased.
///
/// Implemented for every [`EntityMigrator`] so the coordinator can hold
/// migrators for different entity types side by side.
#[async_trait]
pub trait RetryPass: Send + Sync {
    /// Which entity kind this pass retries.
    fn kind(&self) -> EntityKind;

    /// Run the full batch loop for this entity type, leaving the ledger
    /// open.
    async fn run_pass(
        &self,
        ledger: &ErrorLedger,
        batch_size: usize,
        progress: &mut dyn ProgressReporter,
    ) -> Result<RetryStats, RetryError>;
}

#[async_trait]
impl<M: EntityMigrator> RetryPass for M {
    fn kind(&self) -> EntityKind {
        EntityMigrator::kind(self)
    }

    async fn run_pass(
        &self,
        ledger: &ErrorLedger,
        batch_size: usize,
        progress: &mut dyn ProgressReporter,
    ) -> Result<RetryStats, RetryError> {
        BatchRetryDriver::new(self, ledger, batch_size)
            .defer_ledger_close()
            .run(progress)
            .await
    }
}

/// Sequences retry passes across all entity types.
pub struct RetryCoordinator<'a> {
    ledger: &'a ErrorLedger,
    batch_size: usize,
    policy: FailurePolicy,
}

impl<'a> RetryCoordinator<'a> {
    /// Create a coordinator from configuration.
    pub fn new(ledger: &'a ErrorLedger, config: &Config) -> Self {
        Self {
            ledger,
            batch_size: config.batch_size,
            policy: config.on_migrator_error,
        }
    }

    /// Run every pass to completion, one entity type at a time, then close
    /// the ledger and emit a single completion notice.
    ///
    /// A batch-fatal migrator error is handled per the configured
    /// [`FailurePolicy`]: `Halt` returns it immediately, leaving the ledger
    /// unclosed so the pre-run failure state survives; `Continue` logs it
    /// and lets the remaining entity types still attempt their retries.
    pub async fn retry_all(
        &self,
        passes: &[&dyn RetryPass],
        progress: &mut dyn ProgressReporter,
    ) -> Result<(), RetryError> {
        for pass in passes {
            let kind = pass.kind();
            info!("Starting {kind} retry pass");

            match pass.run_pass(self.ledger, self.batch_size, progress).await {
                Ok(stats) => {
                    info!(
                        "{kind} retry pass complete: {} batch(es), {} record(s) persisted",
                        stats.batches, stats.items_persisted
                    );
                }
                Err(e) => match self.policy {
                    FailurePolicy::Halt => {
                        error!("{kind} retry pass failed, halting run: {e}");
                        return Err(e);
                    }
                    FailurePolicy::Continue => {
                        warn!("{kind} retry pass failed, continuing with remaining kinds: {e}");
                    }
                },
            }
        }

        self.ledger.close().await?;
        progress.finished("All error data have been attempted to be migrated");
        info!("All error data have been attempted to be migrated");
        Ok(())
    }
}

/// Run the aggregate retry across all given entity passes.
pub async fn retry_all(
    passes: &[&dyn RetryPass],
    ledger: &ErrorLedger,
    config: &Config,
    progress: &mut dyn ProgressReporter,
) -> Result<(), RetryError> {
    RetryCoordinator::new(ledger, config)
        .retry_all(passes, progress)
        .await
}
