//! Error types of the relocation engine.

use std::path::PathBuf;
use thiserror::Error;

/// Errors of the persisted alias mapping file.
///
/// A malformed file is a configuration error and stops the watcher at startup.
#[derive(Debug, Error)]
pub enum AliasStoreError {
    #[error("Failed to access mapping file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Mapping file {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize mappings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Errors while building the directory index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Library root {root} is unreadable: {source}")]
    RootUnreadable {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A failed filesystem step while handling one download.
///
/// Only aborts the file it happened on, the pass continues.
#[derive(Debug, Error)]
#[error("Failed to {action} {path}: {source}")]
pub struct RelocationError {
    pub action: &'static str,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl RelocationError {
    pub fn new(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            action,
            path: path.into(),
            source,
        }
    }
}

/// Errors returned by the watcher service operations.
#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("Unknown series `{0}`")]
    UnknownCanonical(String),

    #[error("Alias must not be empty")]
    EmptyAlias,

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    AliasStore(#[from] AliasStoreError),

    #[error("Failed to list download folder {path}: {source}")]
    DownloadFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = WatcherError> = std::result::Result<T, E>;
