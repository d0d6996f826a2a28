//! Data models for the watcher.
//!
//! This module defines the data structures shared between the relocation
//! engine and the binaries: series names, file classifications, notification
//! severities and per pass results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Normalized series name (trimmed, lower case)
///
/// Used as the lookup key for library folders and aliases. Two names are
/// equal iff their normalized forms are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SeriesName(String);

impl SeriesName {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SeriesName {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for SeriesName {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<SeriesName> for String {
    fn from(name: SeriesName) -> Self {
        name.0
    }
}

impl AsRef<str> for SeriesName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SeriesName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Season and episode information parsed from a file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub series: SeriesName,
    pub season: Option<u32>,
    pub episode: u32,
    pub extension: String,
}

/// Result of parsing one file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Parsed(ParsedName),
    Unparseable,
}

/// Severity of a user facing notification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warn => write!(f, "warn"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Severity::Info),
            "warn" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            _ => Err(anyhow::anyhow!("Invalid severity: {}", s)),
        }
    }
}

/// What happened to a single download during a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Filed into the library under its canonical name
    Moved { from: PathBuf, to: PathBuf },
    /// Series unknown, renamed with `~` until a mapping is added
    QuarantinedUnknown { series: SeriesName, notified: bool },
    /// File name did not match the grammar, renamed with `_`
    Unparseable,
    /// Series known but no season in the name, renamed with `_`
    NeedsSeason,
    /// Target already present, source renamed with `_`
    Duplicate { existing: PathBuf },
    /// A filesystem step failed, file left for the next pass
    Failed { reason: String },
}

impl FileOutcome {
    /// Short label used in logs
    pub fn label(&self) -> &'static str {
        match self {
            FileOutcome::Moved { .. } => "moved",
            FileOutcome::QuarantinedUnknown { .. } => "unknown_series",
            FileOutcome::Unparseable => "unparseable",
            FileOutcome::NeedsSeason => "needs_season",
            FileOutcome::Duplicate { .. } => "duplicate",
            FileOutcome::Failed { .. } => "failed",
        }
    }
}

/// Statistics of one relocation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassReport {
    pub deep: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// `~` files renamed back before evaluation (deep passes only)
    pub restored: usize,
    pub moved: usize,
    pub unknown_series: usize,
    pub unparseable: usize,
    pub needs_season: usize,
    pub duplicates: usize,
    pub failed: usize,
    /// Download folder listings taken during the pass
    pub scans: usize,
}

impl PassReport {
    pub fn start(deep: bool) -> Self {
        Self {
            deep,
            started_at: Utc::now(),
            finished_at: None,
            restored: 0,
            moved: 0,
            unknown_series: 0,
            unparseable: 0,
            needs_season: 0,
            duplicates: 0,
            failed: 0,
            scans: 0,
        }
    }

    pub fn record(&mut self, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Moved { .. } => self.moved += 1,
            FileOutcome::QuarantinedUnknown { .. } => self.unknown_series += 1,
            FileOutcome::Unparseable => self.unparseable += 1,
            FileOutcome::NeedsSeason => self.needs_season += 1,
            FileOutcome::Duplicate { .. } => self.duplicates += 1,
            FileOutcome::Failed { .. } => self.failed += 1,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Number of files the pass touched
    pub fn handled(&self) -> usize {
        self.moved
            + self.unknown_series
            + self.unparseable
            + self.needs_season
            + self.duplicates
            + self.failed
    }

    /// True if the pass found nothing to do
    pub fn is_idle(&self) -> bool {
        self.handled() == 0 && self.restored == 0
    }
}
