//! Background compression of rotated log files

use chrono::{DateTime, Datelike, Local, Timelike};
use crossbeam_channel::{bounded, select, Receiver, Sender, TryRecvError};
use rotolog_core::{Error, Result};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::report::ErrorReporter;

/// A deferred unit of work run by the compression worker
pub type Task = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

/// Bounded task queue drained by one worker thread
pub struct CompressionPipeline {
    queue: Sender<Task>,
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl CompressionPipeline {
    /// Spawn the worker. `capacity` bounds the number of pending tasks.
    pub fn start(capacity: usize, reporter: Arc<dyn ErrorReporter>) -> Result<Self> {
        let (queue, tasks) = bounded::<Task>(capacity);
        let (stop, stopped) = bounded::<()>(0);

        let worker = thread::Builder::new()
            .name("rotolog-compress".to_string())
            .spawn(move || run_worker(tasks, stopped, reporter))?;

        Ok(Self {
            queue,
            stop: Some(stop),
            worker: Some(worker),
        })
    }

    /// Queue a task, blocking while the queue is full
    pub fn submit(&self, task: Task) -> Result<()> {
        self.queue
            .send(task)
            .map_err(|_| Error::CompressionQueueClosed)
    }

    /// Tasks waiting to run
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Signal the worker and wait for it. A task already running is
    /// finished; queued tasks are dropped without running.
    pub fn stop(&mut self) {
        self.stop.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Compression worker panicked");
            }
        }
    }
}

impl Drop for CompressionPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(tasks: Receiver<Task>, stopped: Receiver<()>, reporter: Arc<dyn ErrorReporter>) {
    loop {
        // Stop takes priority over queued work
        if stop_requested(&stopped) {
            break;
        }
        select! {
            recv(tasks) -> task => match task {
                Ok(task) => {
                    if let Err(e) = task() {
                        reporter.report("log compression", &e);
                    }
                }
                Err(_) => break,
            },
            recv(stopped) -> _ => break,
        }
    }

    let abandoned = tasks.try_iter().count();
    if abandoned > 0 {
        warn!("Abandoned {} queued compression task(s) on shutdown", abandoned);
    }
    debug!("Compression worker stopped");
}

fn stop_requested(stopped: &Receiver<()>) -> bool {
    !matches!(stopped.try_recv(), Err(TryRecvError::Empty))
}

/// Task that zips `source` into `archive` and removes `source` afterwards.
/// On failure the source is left in place.
pub fn compress_task(archive: PathBuf, source: PathBuf) -> Task {
    Box::new(move || {
        zip_file(&archive, &source)?;
        fs::remove_file(&source)?;
        debug!("Compressed {} -> {}", source.display(), archive.display());
        Ok(())
    })
}

/// Write a single-entry deflate zip holding `source` under its base name
pub fn zip_file(archive: &Path, source: &Path) -> Result<()> {
    let metadata = fs::metadata(source)?;
    let entry_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::archive(format!("{}: no file name", source.display())))?;

    let mut options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(metadata.len() >= u32::MAX as u64);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        options = options.unix_permissions(metadata.permissions().mode());
    }
    if let Some(modified) = metadata.modified().ok().and_then(zip_time) {
        options = options.last_modified_time(modified);
    }

    let out = File::create(archive)
        .map_err(|e| Error::archive(format!("creating {}: {}", archive.display(), e)))?;
    let mut writer = ZipWriter::new(out);
    writer
        .start_file(entry_name, options)
        .map_err(|e| Error::archive(format!("{}: making header: {}", source.display(), e)))?;

    let mut input = BufReader::new(File::open(source)?);
    io::copy(&mut input, &mut writer)
        .map_err(|e| Error::archive(format!("{}: copying contents: {}", source.display(), e)))?;

    writer
        .finish()
        .map_err(|e| Error::archive(format!("finishing {}: {}", archive.display(), e)))?;
    Ok(())
}

fn zip_time(modified: std::time::SystemTime) -> Option<zip::DateTime> {
    let t: DateTime<Local> = modified.into();
    zip::DateTime::from_date_and_time(
        u16::try_from(t.year()).ok()?,
        t.month() as u8,
        t.day() as u8,
        t.hour() as u8,
        t.minute() as u8,
        t.second() as u8,
    )
    .ok()
}
