//! Error types for geogate.

use thiserror::Error;

/// Error type for geogate operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Country database error (open, decompress, or query)
    #[error("database error: {0}")]
    Database(String),

    /// File watch error
    #[error("watch error: {0}")]
    Watch(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<notify::Error> for Error {
    fn from(e: notify::Error) -> Self {
        Error::Watch(e.to_string())
    }
}

/// Result type alias for geogate operations.
pub type Result<T> = std::result::Result<T, Error>;
