//! Error types for rotolog

/// rotolog error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unknown adapter: {0}")]
    UnknownAdapter(String),

    #[error("Adapter already registered: {0}")]
    AdapterAlreadyRegistered(String),

    #[error("File adapter options must have a filepath")]
    MissingPath,

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Archive error: {0}")]
    ArchiveError(String),

    #[error("Adapter is closed")]
    AdapterClosed,

    #[error("Compression queue is closed")]
    CompressionQueueClosed,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Result type alias for rotolog
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::ConfigError(msg.into())
    }

    pub fn archive<S: Into<String>>(msg: S) -> Self {
        Error::ArchiveError(msg.into())
    }

    /// Configuration-time errors are reported to the caller; everything
    /// else is steady-state I/O trouble that only reaches the reporter.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::UnknownAdapter(_)
                | Error::AdapterAlreadyRegistered(_)
                | Error::MissingPath
                | Error::ConfigError(_)
                | Error::JsonError(_)
                | Error::TomlError(_)
                | Error::YamlError(_)
        )
    }
}
