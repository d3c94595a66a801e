//! rotolog logs - severity dispatcher and pluggable output adapters
//!
//! A [`Dispatcher`] drops lines tagged below the configured minimum
//! severity and forwards the rest to the installed [`OutputAdapter`].
//! Adapters are created by name through an [`AdapterRegistry`].

mod adapter;
mod console;
mod dispatcher;
pub mod file;
mod registry;
mod report;

pub use adapter::OutputAdapter;
pub use console::{ConsoleAdapter, Stream};
pub use dispatcher::{extract_level, Dispatcher, SeverityFilter};
pub use file::FileAdapter;
pub use registry::{AdapterConstructor, AdapterRegistry};
pub use report::{ErrorReporter, RecordingReporter, TracingReporter};

pub use rotolog_core::{AdapterOptions, Error, Result};
