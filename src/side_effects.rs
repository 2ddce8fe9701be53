//! Observability hook for best-effort operations.
//!
//! Session appends, vector persistence after a finished run and background
//! compression may fail without failing their caller. Every such discard is
//! reported to one [`FailureSink`] instead of being dropped.

use std::error::Error;
use std::sync::{Arc, Mutex};

use tracing::warn;

/// Receives failures of best-effort side effects.
pub trait FailureSink: Send + Sync {
    /// Record that `operation` failed and its error was discarded.
    fn discarded(&self, operation: &str, error: &(dyn Error + 'static));
}

/// Logs discarded failures at `warn` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl FailureSink for TracingSink {
    fn discarded(&self, operation: &str, error: &(dyn Error + 'static)) {
        warn!(operation = %operation, error = %error, "Best-effort operation failed");
    }
}

/// Keeps discarded failures in memory, for inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    entries: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingSink {
    /// Create an empty recording sink
    pub fn new() -> Self {
        Self::default()
    }

    /// `(operation, error message)` pairs recorded so far.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Operations recorded so far.
    pub fn operations(&self) -> Vec<String> {
        self.entries().into_iter().map(|(op, _)| op).collect()
    }
}

impl FailureSink for RecordingSink {
    fn discarded(&self, operation: &str, error: &(dyn Error + 'static)) {
        warn!(operation = %operation, error = %error, "Best-effort operation failed");
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((operation.to_string(), error.to_string()));
        }
    }
}

/// Report `result`'s error to `sink` and drop it.
pub(crate) fn observe<T, E>(sink: &dyn FailureSink, operation: &str, result: Result<T, E>) -> Option<T>
where
    E: Error + 'static,
{
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            sink.discarded(operation, &e);
            None
        }
    }
}
