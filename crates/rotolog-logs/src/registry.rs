//! Adapter registry - maps adapter names to constructors

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rotolog_core::{Error, Result, ADAPTER_CONSOLE, ADAPTER_FILE};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::adapter::OutputAdapter;
use crate::console::ConsoleAdapter;
use crate::file::FileAdapter;
use crate::report::{ErrorReporter, TracingReporter};

/// Builds a fresh, uninitialized adapter
pub type AdapterConstructor = Arc<dyn Fn() -> Box<dyn OutputAdapter> + Send + Sync>;

static GLOBAL: Lazy<Arc<AdapterRegistry>> = Lazy::new(|| Arc::new(AdapterRegistry::with_builtins()));

/// Name -> constructor table consulted when a dispatcher configures its output
#[derive(Default)]
pub struct AdapterRegistry {
    constructors: RwLock<HashMap<String, AdapterConstructor>>,
}

impl AdapterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the console and file adapters, reporting through `tracing`
    pub fn with_builtins() -> Self {
        Self::with_reporter(Arc::new(TracingReporter))
    }

    /// Registry with the console and file adapters; file adapters report
    /// their swallowed errors to `reporter`
    pub fn with_reporter(reporter: Arc<dyn ErrorReporter>) -> Self {
        let console: AdapterConstructor =
            Arc::new(|| -> Box<dyn OutputAdapter> { Box::new(ConsoleAdapter::default()) });
        let file: AdapterConstructor = Arc::new(move || -> Box<dyn OutputAdapter> {
            Box::new(FileAdapter::with_reporter(Arc::clone(&reporter)))
        });

        let mut constructors = HashMap::new();
        constructors.insert(ADAPTER_CONSOLE.to_string(), console);
        constructors.insert(ADAPTER_FILE.to_string(), file);

        Self {
            constructors: RwLock::new(constructors),
        }
    }

    /// Process-wide registry holding the built-in adapters
    pub fn global() -> Arc<AdapterRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Register a constructor under `name`.
    ///
    /// Registering a name twice is a startup bug; callers are expected to
    /// treat the error as fatal.
    pub fn register<F>(&self, name: &str, constructor: F) -> Result<()>
    where
        F: Fn() -> Box<dyn OutputAdapter> + Send + Sync + 'static,
    {
        let mut constructors = self.constructors.write();
        if constructors.contains_key(name) {
            return Err(Error::AdapterAlreadyRegistered(name.to_string()));
        }
        constructors.insert(name.to_string(), Arc::new(constructor));
        debug!("Registered output adapter: {}", name);
        Ok(())
    }

    /// Construct a new adapter registered under `name`
    pub fn create(&self, name: &str) -> Result<Box<dyn OutputAdapter>> {
        let constructor = self
            .constructors
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownAdapter(name.to_string()))?;
        Ok(constructor())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.read().contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.read().keys().cloned().collect();
        names.sort();
        names
    }
}
