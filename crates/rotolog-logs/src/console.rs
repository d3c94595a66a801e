//! Console adapter - pass-through to stdout or stderr

use rotolog_core::{decode_options, AdapterOptions, ConsoleOptions, Result};
use std::io::{self, Write};
use tracing::warn;

use crate::adapter::OutputAdapter;

/// Standard stream a console adapter writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    fn write_all(self, buf: &[u8]) -> io::Result<()> {
        match self {
            Stream::Stdout => io::stdout().lock().write_all(buf),
            Stream::Stderr => io::stderr().lock().write_all(buf),
        }
    }

    fn flush(self) -> io::Result<()> {
        match self {
            Stream::Stdout => io::stdout().flush(),
            Stream::Stderr => io::stderr().flush(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ConsoleAdapter {
    options: ConsoleOptions,
}

impl ConsoleAdapter {
    pub fn stream(&self) -> Stream {
        if self.options.stderr {
            Stream::Stderr
        } else {
            Stream::Stdout
        }
    }
}

impl OutputAdapter for ConsoleAdapter {
    fn init(&mut self, options: &AdapterOptions) -> Result<()> {
        self.options = decode_options(options)?;
        Ok(())
    }

    fn write(&self, buf: &[u8]) -> Result<usize> {
        self.stream().write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&self) {
        if let Err(e) = self.stream().flush() {
            warn!("Failed to flush console output: {}", e);
        }
    }

    fn close(&self) {}
}
