//! Configuration records for rotolog
//!
//! Adapter options reach an adapter already decoded, as a JSON value. The
//! logger config file that produces them may be written in:
//! - TOML (.toml)
//! - YAML (.yaml, .yml)
//! - JSON (.json)

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::error::{Error, Result};

/// Decoded options handed to an adapter's `init`
pub type AdapterOptions = serde_json::Value;

/// Decode a typed options record, treating `null` as "all defaults"
pub fn decode_options<T: DeserializeOwned + Default>(options: &AdapterOptions) -> Result<T> {
    if options.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(options.clone())?)
}

/// Options understood by the rotating file adapter
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FileOptions {
    /// Path of the active log file
    pub filepath: PathBuf,
    /// Octal permission string, e.g. "0660"
    pub perm: String,
    /// Rotate the file when a threshold is crossed
    pub rotate: bool,
    /// Zip rotated files in the background
    pub compress: bool,
    /// Lines before rotation (0 disables)
    pub max_lines: u64,
    /// Bytes before rotation (0 disables)
    pub max_size: u64,
    /// Days a rotated file is kept
    pub max_keep_days: u32,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            filepath: PathBuf::from(DEFAULT_FILEPATH),
            perm: DEFAULT_PERM.to_string(),
            rotate: true,
            compress: true,
            max_lines: DEFAULT_MAX_LINES,
            max_size: DEFAULT_MAX_SIZE,
            max_keep_days: DEFAULT_MAX_KEEP_DAYS,
        }
    }
}

impl FileOptions {
    /// Decode from adapter options and validate
    pub fn from_options(options: &AdapterOptions) -> Result<Self> {
        let opts: FileOptions = decode_options(options)?;
        opts.validate()?;
        Ok(opts)
    }

    pub fn validate(&self) -> Result<()> {
        if self.filepath.as_os_str().is_empty() {
            return Err(Error::MissingPath);
        }
        self.mode()?;
        Ok(())
    }

    /// Parse `perm` as octal permission bits
    pub fn mode(&self) -> Result<u32> {
        parse_perm(&self.perm)
    }
}

/// Parse an octal permission string ("0660", "660" or "0o660")
pub fn parse_perm(perm: &str) -> Result<u32> {
    let digits = perm.trim();
    let digits = digits.strip_prefix("0o").unwrap_or(digits);
    let mode = u32::from_str_radix(digits, 8)
        .map_err(|e| Error::config(format!("Invalid perm '{}': {}", perm, e)))?;
    if mode > 0o7777 {
        return Err(Error::config(format!("Invalid perm '{}': out of range", perm)));
    }
    Ok(mode)
}

/// Options understood by the console adapter
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConsoleOptions {
    /// Write to stderr instead of stdout
    pub stderr: bool,
}

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(ConfigFormat::Toml),
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "json" => Some(ConfigFormat::Json),
            _ => None,
        }
    }

    /// Detect format from file path
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// Logger configuration file (rotolog.toml/yaml/json)
#[derive(Debug, Clone, Deserialize)]
pub struct LoggerConfig {
    /// Adapter name to install
    #[serde(default = "default_output")]
    pub output: String,
    /// Minimum severity
    pub level: Option<String>,
    /// Recognized severities, least strict first
    pub levels: Option<Vec<String>>,
    /// Options passed to the adapter
    #[serde(default)]
    pub options: AdapterOptions,
}

fn default_output() -> String {
    ADAPTER_CONSOLE.to_string()
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            level: None,
            levels: None,
            options: AdapterOptions::Null,
        }
    }
}

impl LoggerConfig {
    /// Parse config content in the given format
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        let config = match format {
            ConfigFormat::Toml => toml::from_str(content)?,
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Json => serde_json::from_str(content)?,
        };
        Ok(config)
    }

    /// Load a config file, detecting its format from the extension
    pub fn load(path: &Path) -> Result<Self> {
        let format = ConfigFormat::from_path(path).ok_or_else(|| {
            Error::config(format!("Unsupported config format: {}", path.display()))
        })?;
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, format)
    }
}
