//! The entity migrator seam.
//!
//! Fetching, transforming, and saving records is entity-specific work that
//! belongs to the caller. The retry driver only needs a way to hand a batch
//! of failed IDs to that logic and learn whether anything came back, so the
//! whole surface is the [`EntityMigrator`] trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ledger::ItemId;
use crate::progress::ProgressReporter;

/// A category of migrated record, each with its own migration logic and
/// its own partition in the error ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Challenge,
    Resource,
}

impl EntityKind {
    /// All known entity kinds, in aggregate retry order.
    pub const ALL: [EntityKind; 2] = [EntityKind::Challenge, EntityKind::Resource];

    /// The key this kind's failure records carry in the error ledger.
    pub fn ledger_key(&self) -> &'static str {
        match self {
            EntityKind::Challenge => "challengeId",
            EntityKind::Resource => "resourceId",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Challenge => write!(f, "challenge"),
            EntityKind::Resource => write!(f, "resource"),
        }
    }
}

/// Context threaded into every migrator call.
///
/// Replaces an ambient process-wide "currently retrying" flag: migrators
/// that relax validation or change logging during retries read it from
/// here instead of the environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryContext {
    /// True for calls made from a retry pass.
    pub retrying: bool,
}

impl RetryContext {
    /// Context for a retry pass.
    pub fn for_retry() -> Self {
        Self { retrying: true }
    }
}

/// Result of one `fetch_and_migrate` call.
#[derive(Debug, Clone)]
pub struct MigratedBatch<T> {
    /// The migrated records for this batch. The driver only inspects
    /// emptiness; the records themselves flow back into `persist`.
    pub items: Vec<T>,
    /// Migrator-reported signal that no further items of this kind remain,
    /// independent of whether the ID list was exhausted.
    pub finished: bool,
}

impl<T> MigratedBatch<T> {
    /// An empty, unfinished batch.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            finished: false,
        }
    }
}

/// Per-entity-type migration logic, consumed by the retry driver.
///
/// Implementations fetch the source records for a slice of failed IDs,
/// transform them, and persist them. Per-item failures are an internal
/// concern (typically re-appended to the error ledger); an `Err` from
/// either method is batch-fatal and aborts the whole pass for this
/// entity kind.
#[async_trait]
pub trait EntityMigrator: Send + Sync {
    /// The migrated record type handed from fetch to persist.
    type Item: Send;
    /// The migrator's own error type.
    type Error: std::error::Error + Send;

    /// Which entity kind this migrator handles.
    fn kind(&self) -> EntityKind;

    /// Fetch and transform the records for a slice of failed IDs.
    async fn fetch_and_migrate(
        &self,
        ids: &[ItemId],
        ctx: &RetryContext,
    ) -> Result<MigratedBatch<Self::Item>, Self::Error>;

    /// Persist a batch of migrated records. I/O-bound suspension point.
    async fn persist(
        &self,
        items: Vec<Self::Item>,
        ctx: &RetryContext,
        progress: &mut dyn ProgressReporter,
    ) -> Result<(), Self::Error>;
}
