//! Retention sweep - deletes rotated and archived files past their keep window

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use crossbeam_channel::{after, bounded, select, Receiver, Sender};
use rotolog_core::{
    Result, ROTATION_TIMESTAMP_FORMAT, ROTATION_TIMESTAMP_LEN, SECONDS_PER_DAY,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

use super::rotation::next_midnight;
use crate::report::ErrorReporter;

/// Which files in the log directory belong to one log file, and how long
/// they are kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionRule {
    dir: PathBuf,
    /// `<basename>.` - prefix of rotated, uncompressed files
    rotated_prefix: String,
    /// `<stem>.` - prefix of zip archives
    archive_prefix: String,
    max_keep_days: u32,
}

impl RetentionRule {
    pub fn new(log_path: &Path, max_keep_days: u32) -> Self {
        let dir = match log_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let basename = log_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = log_path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            dir,
            rotated_prefix: format!("{}.", basename),
            archive_prefix: format!("{}.", stem),
            max_keep_days,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Rotation timestamp embedded in a file name, if the name is one of ours
    pub fn timestamp_of<'a>(&self, name: &'a str) -> Option<&'a str> {
        let offset = if name.ends_with(".zip") {
            name.starts_with(&self.archive_prefix)
                .then_some(self.archive_prefix.len())?
        } else {
            name.starts_with(&self.rotated_prefix)
                .then_some(self.rotated_prefix.len())?
        };
        name.get(offset..offset + ROTATION_TIMESTAMP_LEN)
    }

    /// Whether a file named `name` is past the keep window at `now`.
    /// Names whose timestamp does not parse are never expired.
    pub fn is_expired(&self, name: &str, now: &DateTime<Local>) -> bool {
        let Some(stamp) = self.timestamp_of(name) else {
            return false;
        };
        let Ok(naive) = NaiveDateTime::parse_from_str(stamp, ROTATION_TIMESTAMP_FORMAT) else {
            return false;
        };
        let Some(rotated_at) = Local.from_local_datetime(&naive).earliest() else {
            return false;
        };
        now.timestamp() >= rotated_at.timestamp() + i64::from(self.max_keep_days) * SECONDS_PER_DAY
    }

    /// Delete expired files in the log directory. Returns how many were
    /// removed; per-file failures go to `reporter`.
    pub fn sweep(&self, now: &DateTime<Local>, reporter: &dyn ErrorReporter) -> Result<usize> {
        let mut removed = 0;

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if !file_type.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !self.is_expired(name, now) {
                continue;
            }

            match fs::remove_file(entry.path()) {
                Ok(()) => {
                    debug!("Removed expired log file: {}", name);
                    removed += 1;
                }
                Err(e) => reporter.report("retention sweep", &e.into()),
            }
        }

        Ok(removed)
    }
}

/// Background thread running the sweep at start and after every local
/// midnight
pub struct RetentionSweeper {
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl RetentionSweeper {
    pub fn start(rule: RetentionRule, reporter: Arc<dyn ErrorReporter>) -> Result<Self> {
        let (stop, stopped) = bounded::<()>(0);

        let worker = thread::Builder::new()
            .name("rotolog-retention".to_string())
            .spawn(move || run_sweeper(rule, stopped, reporter))?;

        Ok(Self {
            stop: Some(stop),
            worker: Some(worker),
        })
    }

    /// Signal the thread and wait for it
    pub fn stop(&mut self) {
        self.stop.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Retention sweeper panicked");
            }
        }
    }
}

impl Drop for RetentionSweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_sweeper(rule: RetentionRule, stopped: Receiver<()>, reporter: Arc<dyn ErrorReporter>) {
    loop {
        let now = Local::now();
        match rule.sweep(&now, reporter.as_ref()) {
            Ok(removed) => debug!(
                "Retention sweep of {} removed {} file(s)",
                rule.dir().display(),
                removed
            ),
            Err(e) => reporter.report("retention sweep", &e),
        }

        select! {
            recv(stopped) -> _ => break,
            recv(after(until_next_midnight(&Local::now()))) -> _ => {}
        }
    }
    debug!("Retention sweeper stopped");
}

fn until_next_midnight(now: &DateTime<Local>) -> Duration {
    next_midnight(now)
        .and_then(|midnight| (midnight - *now).to_std().ok())
        .unwrap_or(Duration::from_secs(SECONDS_PER_DAY as u64))
}
