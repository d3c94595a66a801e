//! Rotating file adapter

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use rotolog_core::{AdapterOptions, Error, FileOptions, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::archive::compress_task;
use super::rotation::{archive_path, day_elapsed, rotated_path, rotation_stamp, RotationConfig};
use super::BackgroundTasks;
use crate::adapter::OutputAdapter;
use crate::report::{ErrorReporter, TracingReporter};

/// Output adapter writing to a file that rotates on line count, size, and
/// calendar day
pub struct FileAdapter {
    options: FileOptions,
    rotation: RotationConfig,
    reporter: Arc<dyn ErrorReporter>,
    state: Mutex<FileState>,
    /// Lines written to the currently open file
    current_lines: AtomicU64,
    /// Bytes written to the currently open file
    current_bytes: AtomicU64,
    opener: fn(&Path, u32) -> Result<File>,
}

/// Everything swapped during a rotation
struct FileState {
    file: Option<File>,
    /// Successful rotations, part of the rotated file name
    sequence: u64,
    /// Daily rotation happens after the midnight following this instant
    reference: DateTime<Local>,
    tasks: Option<BackgroundTasks>,
}

impl Default for FileAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl FileAdapter {
    /// Create an unopened adapter reporting through `tracing`
    pub fn new() -> Self {
        Self::with_reporter(Arc::new(TracingReporter))
    }

    /// Create an unopened adapter sending swallowed errors to `reporter`
    pub fn with_reporter(reporter: Arc<dyn ErrorReporter>) -> Self {
        let options = FileOptions::default();
        Self {
            rotation: RotationConfig::from(&options),
            options,
            reporter,
            state: Mutex::new(FileState {
                file: None,
                sequence: 0,
                reference: Local::now(),
                tasks: None,
            }),
            current_lines: AtomicU64::new(0),
            current_bytes: AtomicU64::new(0),
            opener: open_log_file,
        }
    }

    pub fn path(&self) -> &Path {
        &self.options.filepath
    }

    pub fn options(&self) -> &FileOptions {
        &self.options
    }

    pub fn current_lines(&self) -> u64 {
        self.current_lines.load(Ordering::SeqCst)
    }

    pub fn current_bytes(&self) -> u64 {
        self.current_bytes.load(Ordering::SeqCst)
    }

    /// Number of successful rotations
    pub fn rotation_count(&self) -> u64 {
        self.state.lock().sequence
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().file.is_some()
    }

    /// Apply each due trigger in turn: lines, then size, then day. Every
    /// trigger that fires rotates once, so one write may rotate up to
    /// three times.
    fn rotate_if_due(&self, state: &mut FileState) {
        if self.rotation.lines_exceeded(self.current_lines.load(Ordering::SeqCst)) {
            self.current_lines.store(0, Ordering::SeqCst);
            self.rotate(state);
        }

        if self.rotation.size_exceeded(self.current_bytes.load(Ordering::SeqCst)) {
            self.current_bytes.store(0, Ordering::SeqCst);
            self.rotate(state);
        }

        let now = Local::now();
        if day_elapsed(&state.reference, &now) {
            state.reference = now;
            self.rotate(state);
        }
    }

    /// Rename the active file aside and reopen a fresh one at the original
    /// path. A failed reopen restores the previous handle and name.
    fn rotate(&self, state: &mut FileState) {
        let path = &self.options.filepath;
        state.sequence += 1;
        let sequence = state.sequence;
        let stamp = rotation_stamp(&Local::now());
        let retired = rotated_path(path, &stamp, sequence);

        if let Err(e) = fs::rename(path, &retired) {
            state.sequence -= 1;
            self.reporter.report("file rename", &e.into());
            return;
        }

        let previous = state.file.take();
        match (self.opener)(path, self.mode()) {
            Ok(file) => {
                state.file = Some(file);
                drop(previous);
            }
            Err(e) => {
                self.reporter.report("file reopen", &e);
                state.file = previous;
                if let Err(e) = fs::rename(&retired, path) {
                    self.reporter.report("file rename", &e.into());
                }
                state.sequence -= 1;
                return;
            }
        }
        debug!("Rotated {} -> {}", path.display(), retired.display());

        if self.options.compress {
            let archive = archive_path(path, &stamp, sequence);
            let submitted = match &state.tasks {
                Some(tasks) => tasks.pipeline().submit(compress_task(archive, retired)),
                None => Err(Error::CompressionQueueClosed),
            };
            if let Err(e) = submitted {
                self.reporter.report("log compression", &e);
            }
        }
    }

    /// Rotate if due, then write. Counters move under the same lock that
    /// resets them, so they only ever count the open file.
    fn append(&self, state: &mut FileState, buf: &[u8]) -> Result<()> {
        // Closed is terminal: no rotation, no reopen
        if state.file.is_none() {
            return Err(Error::AdapterClosed);
        }
        if self.rotation.enabled {
            self.rotate_if_due(state);
        }

        let file = state.file.as_mut().ok_or(Error::AdapterClosed)?;
        file.write_all(buf)?;
        self.current_lines.fetch_add(1, Ordering::SeqCst);
        self.current_bytes.fetch_add(buf.len() as u64, Ordering::SeqCst);
        Ok(())
    }

    fn mode(&self) -> u32 {
        // Validated during init
        self.options.mode().unwrap_or(0o660)
    }
}

impl OutputAdapter for FileAdapter {
    fn init(&mut self, options: &AdapterOptions) -> Result<()> {
        let options = FileOptions::from_options(options)?;
        let mode = options.mode()?;

        let state = self.state.get_mut();
        let reuse = state.file.is_some() && options.filepath == self.options.filepath;
        if !reuse {
            state.file = Some((self.opener)(&options.filepath, mode)?);
        }

        let size = match &state.file {
            Some(file) => file.metadata()?.len(),
            None => 0,
        };
        let lines = count_lines(&options.filepath)?;
        self.current_bytes.store(size, Ordering::SeqCst);
        self.current_lines.store(lines, Ordering::SeqCst);
        state.reference = Local::now();

        let tasks = BackgroundTasks::start(&options, &self.reporter)?;
        if let Some(previous) = self.state.get_mut().tasks.replace(tasks) {
            previous.stop();
        }

        debug!(
            "Opened log file {} ({} lines, {} bytes)",
            options.filepath.display(),
            lines,
            size
        );
        self.rotation = RotationConfig::from(&options);
        self.options = options;
        Ok(())
    }

    fn write(&self, buf: &[u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut state = self.state.lock();
        if let Err(e) = self.append(&mut state, buf) {
            self.reporter.report("file write", &e);
        }
        Ok(buf.len())
    }

    fn flush(&self) {
        let state = self.state.lock();
        if let Some(file) = &state.file {
            if let Err(e) = file.sync_all() {
                self.reporter.report("file flush", &e.into());
            }
        }
    }

    fn close(&self) {
        let tasks = {
            let mut state = self.state.lock();
            state.file.take();
            state.tasks.take()
        };
        if let Some(tasks) = tasks {
            tasks.stop();
            debug!("Closed log file {}", self.options.filepath.display());
        }
    }
}

impl Drop for FileAdapter {
    fn drop(&mut self) {
        self.close();
    }
}

/// Open for append, creating the file and its parent directories
fn open_log_file(path: &Path, mode: u32) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(options.open(path)?)
}

/// Lines in an existing file; a trailing unterminated line counts
fn count_lines(path: &Path) -> Result<u64> {
    let reader = BufReader::new(File::open(path)?);
    let mut lines = 0;
    for line in reader.split(b'\n') {
        line?;
        lines += 1;
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RecordingReporter;
    use serde_json::json;
    use std::io::{self, Read};
    use std::path::PathBuf;
    use std::thread;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn open(path: &Path, extra: serde_json::Value) -> (FileAdapter, Arc<RecordingReporter>) {
        let reporter = Arc::new(RecordingReporter::new());
        let mut adapter = FileAdapter::with_reporter(reporter.clone());
        let mut options = json!({ "filepath": path });
        if let (Some(options), Some(extra)) = (options.as_object_mut(), extra.as_object()) {
            options.extend(extra.clone());
        }
        adapter.init(&options).unwrap();
        (adapter, reporter)
    }

    /// Names in `dir` other than the live file, sorted
    fn retired_files(dir: &Path, suffix: &str) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| {
                let name = p.file_name().unwrap().to_string_lossy();
                name != "app.log" && name.ends_with(suffix)
            })
            .collect();
        files.sort();
        files
    }

    fn wait_for(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        condition()
    }

    #[test]
    fn test_init_creates_file_and_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("logs").join("app.log");

        let (adapter, _) = open(&path, json!({}));
        assert!(path.exists());
        assert!(adapter.is_open());
        assert_eq!(adapter.current_lines(), 0);
        assert_eq!(adapter.current_bytes(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_init_applies_perm() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");

        let (_adapter, _) = open(&path, json!({ "perm": "0600" }));
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_init_counts_existing_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "one\ntwo\nthree").unwrap();

        let (adapter, _) = open(&path, json!({}));
        assert_eq!(adapter.current_lines(), 3);
        assert_eq!(adapter.current_bytes(), 13);
    }

    #[test]
    fn test_init_missing_path() {
        let mut adapter = FileAdapter::with_reporter(Arc::new(RecordingReporter::new()));
        let err = adapter.init(&json!({ "filepath": "" })).unwrap_err();
        assert!(matches!(err, Error::MissingPath));
        assert!(!adapter.is_open());
    }

    #[test]
    fn test_write_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let (adapter, reporter) = open(&path, json!({}));

        assert_eq!(adapter.write(b"").unwrap(), 0);
        assert_eq!(adapter.write(b"[INFO] hello\n").unwrap(), 13);
        adapter.write(b"[WARN] world\n").unwrap();
        adapter.flush();

        assert_eq!(fs::read_to_string(&path).unwrap(), "[INFO] hello\n[WARN] world\n");
        assert_eq!(adapter.current_lines(), 2);
        assert_eq!(adapter.current_bytes(), 26);
        assert!(reporter.is_empty());
    }

    #[test]
    fn test_rotate_by_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let (adapter, reporter) = open(&path, json!({ "max_lines": 3, "compress": false }));

        for i in 1..=7 {
            adapter.write(format!("line {}\n", i).as_bytes()).unwrap();
        }

        assert_eq!(adapter.rotation_count(), 2);
        assert_eq!(adapter.current_lines(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), "line 7\n");

        let retired = retired_files(dir.path(), "");
        assert_eq!(retired.len(), 2);
        let first = retired.iter().find(|p| p.to_string_lossy().ends_with("_1")).unwrap();
        let second = retired.iter().find(|p| p.to_string_lossy().ends_with("_2")).unwrap();
        assert!(first.file_name().unwrap().to_string_lossy().starts_with("app.log."));
        assert_eq!(fs::read_to_string(first).unwrap(), "line 1\nline 2\nline 3\n");
        assert_eq!(fs::read_to_string(second).unwrap(), "line 4\nline 5\nline 6\n");
        assert!(reporter.is_empty());
    }

    #[test]
    fn test_rotate_by_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let (adapter, _) = open(&path, json!({ "max_size": 10, "compress": false }));

        adapter.write(b"12345\n").unwrap();
        adapter.write(b"12345\n").unwrap();
        assert_eq!(adapter.rotation_count(), 0);
        adapter.write(b"abcde\n").unwrap();

        assert_eq!(adapter.rotation_count(), 1);
        assert_eq!(adapter.current_bytes(), 6);
        assert_eq!(fs::read_to_string(&path).unwrap(), "abcde\n");
    }

    #[test]
    fn test_triggers_fire_independently() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let (adapter, _) = open(&path, json!({ "max_lines": 1, "max_size": 1, "compress": false }));

        adapter.write(b"first\n").unwrap();
        adapter.write(b"second\n").unwrap();

        // Both the line and the size threshold rotate on the second write
        assert_eq!(adapter.rotation_count(), 2);
        assert_eq!(retired_files(dir.path(), "").len(), 2);
        assert_eq!(fs::read_to_string(&path).unwrap(), "second\n");
    }

    #[test]
    fn test_rotate_by_day() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let (adapter, _) = open(&path, json!({ "max_lines": 0, "max_size": 0, "compress": false }));

        adapter.write(b"yesterday\n").unwrap();
        assert_eq!(adapter.rotation_count(), 0);

        adapter.state.lock().reference = Local::now() - chrono::Duration::days(2);
        adapter.write(b"today\n").unwrap();
        assert_eq!(adapter.rotation_count(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), "today\n");

        adapter.write(b"still today\n").unwrap();
        assert_eq!(adapter.rotation_count(), 1);
    }

    #[test]
    fn test_rotation_disabled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let (adapter, _) = open(&path, json!({ "max_lines": 1, "rotate": false }));

        for _ in 0..5 {
            adapter.write(b"line\n").unwrap();
        }
        assert_eq!(adapter.rotation_count(), 0);
        assert_eq!(adapter.current_lines(), 5);
        assert!(retired_files(dir.path(), "").is_empty());
    }

    #[test]
    fn test_rotation_compresses() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let (adapter, reporter) = open(&path, json!({ "max_lines": 2 }));

        adapter.write(b"[INFO] one\n").unwrap();
        adapter.write(b"[INFO] two\n").unwrap();
        adapter.write(b"[INFO] three\n").unwrap();
        assert_eq!(adapter.rotation_count(), 1);

        assert!(wait_for(|| {
            retired_files(dir.path(), ".zip").len() == 1 && retired_files(dir.path(), "_1").is_empty()
        }));

        let archive = retired_files(dir.path(), ".zip").remove(0);
        let archive_name = archive.file_name().unwrap().to_string_lossy().into_owned();
        assert!(archive_name.starts_with("app."));
        assert!(archive_name.ends_with("_1.zip"));

        let mut zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        assert_eq!(zip.len(), 1);
        let mut entry = zip.by_index(0).unwrap();
        assert!(entry.name().starts_with("app.log."));
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, "[INFO] one\n[INFO] two\n");
        assert!(reporter.is_empty());
    }

    #[test]
    fn test_failed_rename_keeps_writing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let (adapter, reporter) = open(&path, json!({ "max_lines": 1, "compress": false }));

        adapter.write(b"first\n").unwrap();
        fs::remove_file(&path).unwrap();
        adapter.write(b"second\n").unwrap();

        assert!(reporter.contains("file rename"));
        assert_eq!(adapter.rotation_count(), 0);
        assert_eq!(adapter.current_lines(), 1);
        assert!(adapter.is_open());
    }

    #[test]
    fn test_failed_reopen_rolls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let (mut adapter, reporter) = open(&path, json!({ "max_lines": 1 }));

        adapter.write(b"first\n").unwrap();
        adapter.opener = |_, _| Err(io::Error::new(io::ErrorKind::Other, "no space left").into());
        adapter.write(b"second\n").unwrap();

        assert!(reporter.contains("file reopen"));
        assert!(!reporter.contains("file write"));
        assert_eq!(adapter.rotation_count(), 0);
        assert!(adapter.is_open());
        assert!(retired_files(dir.path(), "").is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
        assert_eq!(adapter.current_lines(), 1);
    }

    #[test]
    fn test_closed_adapter_never_reopens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let (adapter, reporter) = open(&path, json!({ "max_lines": 1 }));

        adapter.write(b"one\n").unwrap();
        adapter.close();
        assert_eq!(adapter.write(b"after close\n").unwrap(), 12);

        assert!(!adapter.is_open());
        assert_eq!(adapter.rotation_count(), 0);
        assert!(reporter.contains("file write"));
        assert!(!reporter.contains("log compression"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "one\n");
        assert!(retired_files(dir.path(), "").is_empty());
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let (adapter, reporter) = open(&path, json!({}));

        adapter.write(b"before\n").unwrap();
        adapter.flush();
        adapter.close();
        adapter.close();
        adapter.flush();
        assert!(!adapter.is_open());

        // Writes after close are swallowed and reported
        assert_eq!(adapter.write(b"after\n").unwrap(), 6);
        assert!(reporter.contains("file write"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "before\n");
    }

    #[test]
    fn test_reinit_reuses_handle() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let (mut adapter, _) = open(&path, json!({}));
        adapter.write(b"kept\n").unwrap();

        adapter
            .init(&json!({ "filepath": path, "max_lines": 5 }))
            .unwrap();
        assert_eq!(adapter.options().max_lines, 5);
        assert_eq!(adapter.current_lines(), 1);
        adapter.write(b"more\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "kept\nmore\n");
    }

    #[test]
    fn test_concurrent_writers_lose_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let (adapter, reporter) = open(&path, json!({ "max_lines": 50, "compress": false }));
        let adapter = Arc::new(adapter);

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let adapter = Arc::clone(&adapter);
                thread::spawn(move || {
                    for i in 0..250 {
                        adapter
                            .write(format!("[INFO] writer {} line {}\n", t, i).as_bytes())
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let live = fs::read_to_string(&path).unwrap();
        assert_eq!(live.lines().count() as u64, adapter.current_lines());
        adapter.close();

        let mut total = 0;
        for entry in fs::read_dir(dir.path()).unwrap() {
            let content = fs::read_to_string(entry.unwrap().path()).unwrap();
            for line in content.lines() {
                assert!(line.starts_with("[INFO] writer "));
                total += 1;
            }
        }
        assert_eq!(total, 1000);
        assert!(adapter.rotation_count() >= 1);
        assert!(reporter.is_empty());
    }
}
