//! Persistent error ledger for failed migration items.
//!
//! Records the identifiers that failed migration, partitioned by entity
//! kind, as NDJSON for easy parsing. A retry run reads the recorded IDs at
//! session start; migrators append fresh failures during processing; `close`
//! rewrites the file with only the still-failing records, truncating the
//! resolved ones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{
    LedgerError, ParseRecordSnafu, ReadLedgerFileSnafu, SerializeRecordSnafu, WriteLedgerFileSnafu,
};
use crate::migrator::EntityKind;

/// An opaque item identifier. Source systems use both string and numeric
/// IDs, so both forms round-trip through the ledger unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Number(n) => write!(f, "{n}"),
            ItemId::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for ItemId {
    fn from(n: i64) -> Self {
        ItemId::Number(n)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId::Text(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        ItemId::Text(s)
    }
}

/// A record representing one failed item in the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Entity-type ledger key, e.g. "challengeId".
    pub key: String,
    /// Identifier of the item that failed.
    pub id: ItemId,
    /// Error message describing the failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Timestamp when the failure was recorded.
    pub timestamp: DateTime<Utc>,
}

/// Persistent, queryable record of failed item identifiers.
///
/// The recorded failures are loaded once at `open` and stay fixed for the
/// run; new failures appended by migrators are buffered and written out at
/// `close`. Single-process, single-pass usage is assumed; there is no file
/// locking.
#[derive(Debug)]
pub struct ErrorLedger {
    path: PathBuf,
    recorded: Vec<FailureRecord>,
    pending: Mutex<Vec<FailureRecord>>,
    closed: AtomicBool,
}

impl ErrorLedger {
    /// Open a ledger, loading any previously recorded failures.
    ///
    /// A missing file yields an empty ledger; a malformed line is an error.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No ledger file at {}, starting empty", path.display());
                String::new()
            }
            Err(e) => {
                return Err(e).context(ReadLedgerFileSnafu {
                    path: path.display().to_string(),
                })
            }
        };

        let mut recorded = Vec::new();
        for (i, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: FailureRecord =
                serde_json::from_str(line).context(ParseRecordSnafu { line: i + 1 })?;
            recorded.push(record);
        }

        info!(
            "Opened error ledger {} with {} recorded failure(s)",
            path.display(),
            recorded.len()
        );

        Ok(Self {
            path,
            recorded,
            pending: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// All recorded failing IDs for one entity kind, in insertion order.
    ///
    /// Returns an empty list for a kind with no recorded failures.
    pub fn failed_ids(&self, kind: EntityKind) -> Vec<ItemId> {
        self.recorded
            .iter()
            .filter(|r| r.key == kind.ledger_key())
            .map(|r| r.id.clone())
            .collect()
    }

    /// Record a fresh failure, to be persisted at `close`.
    ///
    /// Called by entity migrators when an item fails again during a retry.
    pub async fn record_failure(&self, kind: EntityKind, id: ItemId, error: Option<String>) {
        if self.closed.load(Ordering::SeqCst) {
            warn!("Ignoring failure recorded after ledger close: {kind} {id}");
            return;
        }

        debug!("Recording {kind} failure: {id}");
        let record = FailureRecord {
            key: kind.ledger_key().to_string(),
            id,
            error,
            timestamp: Utc::now(),
        };
        self.pending.lock().await.push(record);
    }

    /// Finalize the ledger: rewrite the file with only the failures recorded
    /// during this run, truncating the resolved IDs.
    ///
    /// Safe to call multiple times; only the first call writes.
    pub async fn close(&self) -> Result<(), LedgerError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("Ledger already closed, skipping");
            return Ok(());
        }

        let records = std::mem::take(&mut *self.pending.lock().await);

        let mut ndjson = String::new();
        for record in &records {
            let line = serde_json::to_string(record).context(SerializeRecordSnafu)?;
            ndjson.push_str(&line);
            ndjson.push('\n');
        }

        tokio::fs::write(&self.path, ndjson)
            .await
            .context(WriteLedgerFileSnafu {
                path: self.path.display().to_string(),
            })?;

        info!(
            "Closed error ledger {}: {} still-failing record(s)",
            self.path.display(),
            records.len()
        );
        Ok(())
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ledger_path(dir: &TempDir) -> PathBuf {
        dir.path().join("errors.ndjson")
    }

    #[test]
    fn test_item_id_forms() {
        let text: ItemId = serde_json::from_str(r#""abc-123""#).unwrap();
        assert_eq!(text, ItemId::Text("abc-123".to_string()));

        let num: ItemId = serde_json::from_str("30055").unwrap();
        assert_eq!(num, ItemId::Number(30055));

        assert_eq!(serde_json::to_string(&num).unwrap(), "30055");
        assert_eq!(serde_json::to_string(&text).unwrap(), r#""abc-123""#);
    }

    #[test]
    fn test_failure_record_deserialization() {
        let json = r#"{"key":"challengeId","id":30055,"error":"timeout","timestamp":"2025-01-26T10:30:00Z"}"#;
        let record: FailureRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.key, "challengeId");
        assert_eq!(record.id, ItemId::Number(30055));
        assert_eq!(record.error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_failure_record_without_error_detail() {
        let json = r#"{"key":"resourceId","id":"res-9","timestamp":"2025-01-26T10:30:00Z"}"#;
        let record: FailureRecord = serde_json::from_str(json).unwrap();
        assert!(record.error.is_none());
    }

    #[tokio::test]
    async fn test_open_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let ledger = ErrorLedger::open(ledger_path(&dir)).await.unwrap();

        assert!(ledger.failed_ids(EntityKind::Challenge).is_empty());
        assert!(ledger.failed_ids(EntityKind::Resource).is_empty());
    }

    #[tokio::test]
    async fn test_failed_ids_preserve_order_and_kind() {
        let dir = TempDir::new().unwrap();
        let path = ledger_path(&dir);
        let content = concat!(
            r#"{"key":"challengeId","id":3,"timestamp":"2025-01-26T10:30:00Z"}"#,
            "\n",
            r#"{"key":"resourceId","id":"r-1","timestamp":"2025-01-26T10:30:01Z"}"#,
            "\n",
            r#"{"key":"challengeId","id":1,"timestamp":"2025-01-26T10:30:02Z"}"#,
            "\n",
        );
        std::fs::write(&path, content).unwrap();

        let ledger = ErrorLedger::open(&path).await.unwrap();

        assert_eq!(
            ledger.failed_ids(EntityKind::Challenge),
            vec![ItemId::Number(3), ItemId::Number(1)]
        );
        assert_eq!(
            ledger.failed_ids(EntityKind::Resource),
            vec![ItemId::from("r-1")]
        );
    }

    #[tokio::test]
    async fn test_open_rejects_malformed_line() {
        let dir = TempDir::new().unwrap();
        let path = ledger_path(&dir);
        std::fs::write(&path, "not json\n").unwrap();

        let err = ErrorLedger::open(&path).await.unwrap_err();
        assert!(matches!(err, LedgerError::ParseRecord { line: 1, .. }));
    }

    #[tokio::test]
    async fn test_open_unreadable_path_is_read_error() {
        let dir = TempDir::new().unwrap();

        // A directory is not a readable ledger file.
        let err = ErrorLedger::open(dir.path()).await.unwrap_err();
        assert!(matches!(err, LedgerError::ReadLedgerFile { .. }));
    }

    #[tokio::test]
    async fn test_close_truncates_resolved_ids() {
        let dir = TempDir::new().unwrap();
        let path = ledger_path(&dir);
        std::fs::write(
            &path,
            concat!(
                r#"{"key":"challengeId","id":1,"timestamp":"2025-01-26T10:30:00Z"}"#,
                "\n",
                r#"{"key":"challengeId","id":2,"timestamp":"2025-01-26T10:30:01Z"}"#,
                "\n",
            ),
        )
        .unwrap();

        let ledger = ErrorLedger::open(&path).await.unwrap();
        ledger
            .record_failure(EntityKind::Challenge, ItemId::Number(2), Some("still failing".into()))
            .await;
        ledger.close().await.unwrap();

        // Only the re-recorded failure survives the rewrite.
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 1);
        let record: FailureRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(record.id, ItemId::Number(2));
        assert_eq!(record.error.as_deref(), Some("still failing"));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = ledger_path(&dir);

        let ledger = ErrorLedger::open(&path).await.unwrap();
        ledger
            .record_failure(EntityKind::Resource, ItemId::from("r-1"), None)
            .await;
        ledger.close().await.unwrap();
        assert!(ledger.is_closed());

        let first = std::fs::read_to_string(&path).unwrap();

        // Second close must not rewrite (the pending buffer was drained).
        ledger.close().await.unwrap();
        let second = std::fs::read_to_string(&path).unwrap();
        assert_eq!(first, second);
        assert!(first.contains("r-1"));
    }

    #[tokio::test]
    async fn test_record_after_close_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = ledger_path(&dir);

        let ledger = ErrorLedger::open(&path).await.unwrap();
        ledger.close().await.unwrap();
        ledger
            .record_failure(EntityKind::Challenge, ItemId::Number(7), None)
            .await;

        assert!(ledger.pending.lock().await.is_empty());
    }
}
