//! Batch retry driver.
//!
//! Drives the paginated retry loop for a single entity type: reads the
//! failed IDs from the error ledger once, slices them into fixed-size
//! batches, invokes the entity migrator per batch, and reports progress.
//! The loop ends when the migrator signals completion or no IDs remain
//! to slice.

pub mod coordinator;

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{FetchBatchSnafu, PersistBatchSnafu, RetryError};
use crate::ledger::{ErrorLedger, ItemId};
use crate::migrator::{EntityMigrator, MigratedBatch, RetryContext};
use crate::progress::ProgressReporter;

/// Statistics about one entity type's retry pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryStats {
    /// Non-empty batches handed to the migrator.
    pub batches: usize,
    /// Items fetched across all batches.
    pub items_fetched: usize,
    /// Items handed to the migrator's save step.
    pub items_persisted: usize,
}

/// Transient state for one retry pass. Lives only for the duration of a
/// single driver invocation.
struct RetrySession {
    /// Count of IDs already consumed.
    skip: usize,
    /// 1-based batch number for progress reporting.
    batch: usize,
    /// Terminal flag.
    finished: bool,
}

impl RetrySession {
    fn new() -> Self {
        Self {
            skip: 0,
            batch: 1,
            finished: false,
        }
    }

    /// The next slice of IDs, clamped to the list bounds.
    fn slice<'i>(&self, ids: &'i [ItemId], batch_size: usize) -> &'i [ItemId] {
        let start = self.skip.min(ids.len());
        let end = (self.skip + batch_size).min(ids.len());
        &ids[start..end]
    }

    fn advance(&mut self, batch_size: usize) {
        self.skip += batch_size;
        self.batch += 1;
    }
}

/// Paginated retry loop for a single entity type.
pub struct BatchRetryDriver<'a, M> {
    migrator: &'a M,
    ledger: &'a ErrorLedger,
    batch_size: usize,
    close_ledger: bool,
}

impl<'a, M: EntityMigrator> BatchRetryDriver<'a, M> {
    /// Create a standalone driver, which closes the ledger when its loop
    /// exits.
    pub fn new(migrator: &'a M, ledger: &'a ErrorLedger, batch_size: usize) -> Self {
        Self {
            migrator,
            ledger,
            batch_size,
            close_ledger: true,
        }
    }

    /// Leave the ledger open when the loop exits. Used by the aggregate
    /// coordinator, which closes the ledger once after all passes.
    pub fn defer_ledger_close(mut self) -> Self {
        self.close_ledger = false;
        self
    }

    /// Retry every ID currently recorded as failed for this entity type.
    ///
    /// The ID list is read once at session start; failures appended to the
    /// ledger during the session are not re-included in this pass. A
    /// migrator error aborts the pass immediately and is returned as a
    /// typed error; batches already persisted stay persisted.
    pub async fn run(
        &self,
        progress: &mut dyn ProgressReporter,
    ) -> Result<RetryStats, RetryError> {
        let kind = self.migrator.kind();
        let ctx = RetryContext::for_retry();
        let error_ids = self.ledger.failed_ids(kind);

        info!(
            "Retrying {} failed {kind} record(s) in batches of {}",
            error_ids.len(),
            self.batch_size
        );

        let mut session = RetrySession::new();
        let mut stats = RetryStats::default();

        while !session.finished {
            progress.batch_started(session.batch, &format!("Loading {kind}s"));

            let ids = session.slice(&error_ids, self.batch_size);
            let result = if ids.is_empty() {
                session.finished = true;
                MigratedBatch::empty()
            } else {
                debug!(batch = session.batch, "Fetching {} {kind} record(s)", ids.len());
                match self.migrator.fetch_and_migrate(ids, &ctx).await {
                    Ok(result) => {
                        session.finished = result.finished;
                        stats.batches += 1;
                        stats.items_fetched += result.items.len();
                        result
                    }
                    Err(e) => {
                        session.finished = true;
                        let message = e.to_string();
                        progress.failed(&format!(
                            "Fail to load {kind}s on batch {}",
                            session.batch
                        ));
                        return FetchBatchSnafu {
                            kind,
                            batch: session.batch,
                            message,
                        }
                        .fail();
                    }
                }
            };

            if result.items.is_empty() {
                progress.update("Done");
            }

            if !session.finished && !result.items.is_empty() {
                stats.items_persisted += result.items.len();
                if let Err(e) = self.migrator.persist(result.items, &ctx, progress).await {
                    session.finished = true;
                    let message = e.to_string();
                    progress.failed(&format!(
                        "Fail to save {kind}s on batch {}",
                        session.batch
                    ));
                    return PersistBatchSnafu {
                        kind,
                        batch: session.batch,
                        message,
                    }
                    .fail();
                }
            }

            progress.succeeded();
            session.advance(self.batch_size);
        }

        if self.close_ledger {
            self.ledger.close().await?;
        }

        info!(
            "Finished {kind} retry pass: {} batch(es), {} record(s) persisted",
            stats.batches, stats.items_persisted
        );
        Ok(stats)
    }
}

/// Retry one entity type as a standalone top-level run.
///
/// Closes the error ledger after the retry loop exits.
pub async fn retry_entity<M: EntityMigrator>(
    migrator: &M,
    ledger: &ErrorLedger,
    config: &Config,
    progress: &mut dyn ProgressReporter,
) -> Result<RetryStats, RetryError> {
    BatchRetryDriver::new(migrator, ledger, config.batch_size)
        .run(progress)
        .await
}
