use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Catalog error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid name pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Malformed properties {}: {reason}", path.display())]
    Properties { path: PathBuf, reason: String },

    #[error("Worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wraps an I/O failure on a storage node, keeping the node's path.
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Storage {
            path: path.into(),
            source,
        }
    }

    pub fn properties(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Properties {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
