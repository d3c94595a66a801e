//! Output adapter contract

use rotolog_core::{AdapterOptions, Result};

/// A pluggable sink for log lines.
///
/// `init` runs once before the adapter is shared; everything else may be
/// called concurrently from many writers.
pub trait OutputAdapter: Send + Sync {
    /// Apply decoded options and acquire resources
    fn init(&mut self, options: &AdapterOptions) -> Result<()>;

    /// Write one line, returning the number of bytes accepted
    fn write(&self, buf: &[u8]) -> Result<usize>;

    /// Push buffered data to the sink
    fn flush(&self);

    /// Release resources. Safe to call more than once.
    fn close(&self);
}
