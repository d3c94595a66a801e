//! Rotating file adapter and its background work
//!
//! The active file is rotated when its line count, byte size, or calendar
//! day crosses a threshold. Rotated files are zipped by a
//! [`CompressionPipeline`] and deleted once older than the keep window by
//! a [`RetentionSweeper`].

mod archive;
mod retention;
mod rotation;
mod writer;

pub use archive::{compress_task, zip_file, CompressionPipeline, Task};
pub use retention::{RetentionRule, RetentionSweeper};
pub use rotation::{archive_path, day_elapsed, next_midnight, rotated_path, rotation_stamp, RotationConfig};
pub use writer::FileAdapter;

use rotolog_core::{FileOptions, Result, COMPRESS_QUEUE_CAPACITY};
use std::sync::Arc;

use crate::report::ErrorReporter;

/// Threads owned by one file adapter, stopped and joined on close
pub(crate) struct BackgroundTasks {
    pipeline: CompressionPipeline,
    sweeper: RetentionSweeper,
}

impl BackgroundTasks {
    pub(crate) fn start(options: &FileOptions, reporter: &Arc<dyn ErrorReporter>) -> Result<Self> {
        let pipeline = CompressionPipeline::start(COMPRESS_QUEUE_CAPACITY, Arc::clone(reporter))?;
        let rule = RetentionRule::new(&options.filepath, options.max_keep_days);
        let sweeper = RetentionSweeper::start(rule, Arc::clone(reporter))?;
        Ok(Self { pipeline, sweeper })
    }

    pub(crate) fn pipeline(&self) -> &CompressionPipeline {
        &self.pipeline
    }

    pub(crate) fn stop(mut self) {
        self.pipeline.stop();
        self.sweeper.stop();
    }
}
