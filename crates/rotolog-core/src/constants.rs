//! Constants and default values for rotolog

/// Registry name of the stdout/stderr adapter
pub const ADAPTER_CONSOLE: &str = "console";

/// Registry name of the rotating file adapter
pub const ADAPTER_FILE: &str = "file";

pub const LEVEL_DEBUG: &str = "DEBUG";
pub const LEVEL_INFO: &str = "INFO";
pub const LEVEL_WARN: &str = "WARN";
pub const LEVEL_ERROR: &str = "ERROR";
pub const LEVEL_FATAL: &str = "FATAL";

/// Recognized severities, least strict first
pub const DEFAULT_LEVELS: &[&str] = &[LEVEL_DEBUG, LEVEL_INFO, LEVEL_WARN, LEVEL_ERROR, LEVEL_FATAL];

/// Minimum severity a fresh dispatcher lets through
pub const DEFAULT_LEVEL: &str = LEVEL_DEBUG;

/// Default log file path
pub const DEFAULT_FILEPATH: &str = "./rotolog.log";

/// Default log file permission (octal string)
pub const DEFAULT_PERM: &str = "0660";

/// Default line count before rotation
pub const DEFAULT_MAX_LINES: u64 = 100_000;

/// Default size in bytes before rotation (500MB)
pub const DEFAULT_MAX_SIZE: u64 = 500 * 1024 * 1024;

/// Default number of days rotated files are kept
pub const DEFAULT_MAX_KEEP_DAYS: u32 = 7;

/// Pending archive jobs before rotation blocks
pub const COMPRESS_QUEUE_CAPACITY: usize = 20;

/// Timestamp layout embedded in rotated file names
pub const ROTATION_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Length of a formatted rotation timestamp
pub const ROTATION_TIMESTAMP_LEN: usize = 14;

pub const SECONDS_PER_DAY: i64 = 86_400;
