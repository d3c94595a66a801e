//! Severity dispatcher - drops lines below the minimum severity and
//! forwards the rest to the installed output adapter

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use rotolog_core::{AdapterOptions, Result, DEFAULT_LEVEL, DEFAULT_LEVELS};
use std::collections::HashSet;
use std::io;
use std::sync::Arc;
use tracing::{error, info};

use crate::adapter::OutputAdapter;
use crate::console::ConsoleAdapter;
use crate::registry::AdapterRegistry;

/// Extract the severity tag of a line: the bytes between the first `[`
/// and the next `]`. Untagged lines yield an empty tag.
pub fn extract_level(line: &[u8]) -> &[u8] {
    let Some(open) = line.iter().position(|&b| b == b'[') else {
        return &[];
    };
    let rest = &line[open + 1..];
    match rest.iter().position(|&b| b == b']') {
        Some(close) => &rest[..close],
        None => &[],
    }
}

/// Ordered severity names plus the set currently suppressed
#[derive(Debug, Clone)]
pub struct SeverityFilter {
    levels: Vec<String>,
    minimum: String,
    suppressed: OnceCell<HashSet<String>>,
}

impl Default for SeverityFilter {
    fn default() -> Self {
        Self::new(DEFAULT_LEVELS.iter().map(|l| l.to_string()).collect(), DEFAULT_LEVEL)
    }
}

impl SeverityFilter {
    /// The suppression set is computed on first use
    pub fn new(levels: Vec<String>, minimum: &str) -> Self {
        Self {
            levels,
            minimum: minimum.to_string(),
            suppressed: OnceCell::new(),
        }
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    pub fn minimum(&self) -> &str {
        &self.minimum
    }

    /// Set the minimum severity. A name missing from the level list
    /// suppresses every listed level.
    pub fn set_minimum(&mut self, level: &str) {
        self.minimum = level.to_string();
        self.recompute();
    }

    /// Replace the ordered level list, least strict first
    pub fn set_levels(&mut self, levels: Vec<String>) {
        self.levels = levels;
        self.recompute();
    }

    /// Levels strictly below the minimum
    pub fn suppressed(&self) -> &HashSet<String> {
        self.suppressed
            .get_or_init(|| compute_suppressed(&self.levels, &self.minimum))
    }

    pub fn is_suppressed(&self, level: &[u8]) -> bool {
        match std::str::from_utf8(level) {
            Ok(level) => self.suppressed().contains(level),
            Err(_) => false,
        }
    }

    fn recompute(&mut self) {
        let cell = OnceCell::new();
        let _ = cell.set(compute_suppressed(&self.levels, &self.minimum));
        self.suppressed = cell;
    }
}

fn compute_suppressed(levels: &[String], minimum: &str) -> HashSet<String> {
    levels
        .iter()
        .take_while(|level| level.as_str() != minimum)
        .cloned()
        .collect()
}

/// Entry point for log lines
pub struct Dispatcher {
    registry: Arc<AdapterRegistry>,
    output: RwLock<Arc<dyn OutputAdapter>>,
    filter: RwLock<SeverityFilter>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(AdapterRegistry::global())
    }
}

impl Dispatcher {
    /// Create a dispatcher writing to stdout with the default levels
    pub fn new(registry: Arc<AdapterRegistry>) -> Self {
        Self::with_output(registry, Arc::new(ConsoleAdapter::default()))
    }

    /// Create a dispatcher with an already initialized adapter installed
    pub fn with_output(registry: Arc<AdapterRegistry>, output: Arc<dyn OutputAdapter>) -> Self {
        Self {
            registry,
            output: RwLock::new(output),
            filter: RwLock::new(SeverityFilter::default()),
        }
    }

    /// Build the adapter registered as `name`, initialize it with
    /// `options`, and install it.
    ///
    /// On failure the current adapter stays installed. On success the
    /// replaced adapter is returned without being closed.
    pub fn configure_output(
        &self,
        name: &str,
        options: &AdapterOptions,
    ) -> Result<Arc<dyn OutputAdapter>> {
        let mut adapter = self.registry.create(name)?;
        if let Err(e) = adapter.init(options) {
            error!("Failed to initialize output adapter '{}': {}", name, e);
            return Err(e);
        }

        let adapter: Arc<dyn OutputAdapter> = Arc::from(adapter);
        let previous = std::mem::replace(&mut *self.output.write(), adapter);
        info!("Installed output adapter: {}", name);
        Ok(previous)
    }

    pub fn set_minimum_severity(&self, level: &str) {
        self.filter.write().set_minimum(level);
    }

    pub fn set_recognized_severities<I, S>(&self, levels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter
            .write()
            .set_levels(levels.into_iter().map(Into::into).collect());
    }

    pub fn minimum_severity(&self) -> String {
        self.filter.read().minimum().to_string()
    }

    /// Whether `line` would be dropped
    pub fn is_suppressed(&self, line: &[u8]) -> bool {
        self.filter.read().is_suppressed(extract_level(line))
    }

    /// Write one line. Suppressed lines report their full length without
    /// reaching the adapter.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        if self.is_suppressed(buf) {
            return Ok(buf.len());
        }
        let output = self.output.read().clone();
        output.write(buf)
    }

    pub fn flush(&self) {
        let output = self.output.read().clone();
        output.flush();
    }

    pub fn close(&self) {
        let output = self.output.read().clone();
        output.close();
    }
}

impl io::Write for &Dispatcher {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Dispatcher::write(*self, buf).map_err(io::Error::other)
    }

    fn flush(&mut self) -> io::Result<()> {
        Dispatcher::flush(*self);
        Ok(())
    }
}

impl io::Write for Dispatcher {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(&mut &*self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::Write::flush(&mut &*self)
    }
}
