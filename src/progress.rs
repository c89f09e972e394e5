//! Progress reporting.
//!
//! The retry driver produces human-readable status to a reporter sink:
//! batch labels, loading/done phases, success and failure marks. Reporting
//! is purely observational and has no control-flow effect.

use tracing::{error, info};

/// Sink for retry progress status.
///
/// Shaped after a terminal spinner: a batch label, a changing status line,
/// and terminal success/failure marks.
pub trait ProgressReporter: Send {
    /// A new batch is starting, e.g. `batch_started(2, "Loading challenges")`.
    fn batch_started(&mut self, batch: usize, text: &str);

    /// Update the status line for the current batch.
    fn update(&mut self, text: &str);

    /// Mark the current batch as done.
    fn succeeded(&mut self);

    /// Mark the current batch as failed.
    fn failed(&mut self, text: &str);

    /// The whole run is complete.
    fn finished(&mut self, text: &str);
}

/// Default reporter that maps progress phases onto tracing events.
#[derive(Debug, Default)]
pub struct LogReporter {
    batch: usize,
}

impl ProgressReporter for LogReporter {
    fn batch_started(&mut self, batch: usize, text: &str) {
        self.batch = batch;
        info!(batch, "{text}");
    }

    fn update(&mut self, text: &str) {
        info!(batch = self.batch, "{text}");
    }

    fn succeeded(&mut self) {
        info!(batch = self.batch, "Batch complete");
    }

    fn failed(&mut self, text: &str) {
        error!(batch = self.batch, "{text}");
    }

    fn finished(&mut self, text: &str) {
        info!("{text}");
    }
}
