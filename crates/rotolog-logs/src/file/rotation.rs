//! Rotation triggers and rotated file naming

use chrono::{DateTime, Duration, Local, TimeZone};
use rotolog_core::{FileOptions, ROTATION_TIMESTAMP_FORMAT};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Log rotation thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationConfig {
    /// Rotate at all
    pub enabled: bool,
    /// Maximum lines per file (0 disables)
    pub max_lines: u64,
    /// Maximum file size in bytes (0 disables)
    pub max_size_bytes: u64,
}

impl From<&FileOptions> for RotationConfig {
    fn from(options: &FileOptions) -> Self {
        Self {
            enabled: options.rotate,
            max_lines: options.max_lines,
            max_size_bytes: options.max_size,
        }
    }
}

impl RotationConfig {
    pub fn lines_exceeded(&self, current_lines: u64) -> bool {
        self.max_lines > 0 && current_lines >= self.max_lines
    }

    pub fn size_exceeded(&self, current_bytes: u64) -> bool {
        self.max_size_bytes > 0 && current_bytes >= self.max_size_bytes
    }
}

/// First local midnight after `t`
pub fn next_midnight(t: &DateTime<Local>) -> Option<DateTime<Local>> {
    let naive = t.date_naive().succ_opt()?.and_hms_opt(0, 0, 0)?;
    // Midnight can fall inside a DST gap
    Local
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| Local.from_local_datetime(&(naive + Duration::hours(1))).earliest())
}

/// True once `now` is past the midnight following `reference`
pub fn day_elapsed(reference: &DateTime<Local>, now: &DateTime<Local>) -> bool {
    match next_midnight(reference) {
        Some(midnight) => now.timestamp() > midnight.timestamp(),
        None => false,
    }
}

/// Timestamp embedded in rotated file names
pub fn rotation_stamp(now: &DateTime<Local>) -> String {
    now.format(ROTATION_TIMESTAMP_FORMAT).to_string()
}

/// `<path>.<stamp>_<seq>`
pub fn rotated_path(base: &Path, stamp: &str, sequence: u64) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(format!(".{}_{}", stamp, sequence));
    PathBuf::from(name)
}

/// `<path without extension>.<stamp>_<seq>.zip`
pub fn archive_path(base: &Path, stamp: &str, sequence: u64) -> PathBuf {
    let mut name = OsString::from(base.with_extension("").as_os_str());
    name.push(format!(".{}_{}.zip", stamp, sequence));
    PathBuf::from(name)
}
