//! Reporting of errors that must not reach the line-writing caller

use parking_lot::Mutex;
use rotolog_core::Error;
use tracing::error;

/// Sink for steady-state failures (write, flush, rotation, compression,
/// retention). Writers never see these errors.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, context: &str, err: &Error);
}

/// Reports through `tracing` at error level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, context: &str, err: &Error) {
        error!("rotolog: {}: {}", context, err);
    }
}

/// Keeps every report in memory, for assertions in tests
#[derive(Debug, Default)]
pub struct RecordingReporter {
    entries: Mutex<Vec<(String, String)>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All reports as (context, message) pairs
    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries.lock().clone()
    }

    /// Whether any report was made under `context`
    pub fn contains(&self, context: &str) -> bool {
        self.entries.lock().iter().any(|(c, _)| c == context)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, context: &str, err: &Error) {
        self.entries.lock().push((context.to_string(), err.to_string()));
    }
}
