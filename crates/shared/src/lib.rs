//! Shared library for the download watcher.
//!
//! This crate provides common functionality used by the relocation engine
//! and the binary:
//! - Configuration management
//! - Library folder layout and episode naming
//! - Logging infrastructure
//! - Shared data models

pub mod config;
pub mod logging;
pub mod models;
pub mod paths;

// Re-export commonly used types
pub use config::Config;
pub use logging::LogConfig;
pub use models::*;
pub use paths::{EpisodeLayout, LibraryPaths};

/// Common result type using anyhow::Error
pub type Result<T> = anyhow::Result<T>;
