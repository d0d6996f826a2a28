//! Library path layout.
//!
//! This module provides a centralized way to manage the folders the watcher
//! works on (the two library roots and the download folder) and the naming
//! scheme of relocated episodes.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// Folder below the share root that holds both libraries
pub const SHARED_VIDEO_FOLDER_NAME: &str = "Shared Video";
/// Anime library below the shared video folder
pub const ANIME_FOLDER_NAME: &str = "Anime";
/// Series library below the shared video folder
pub const SERIES_FOLDER_NAME: &str = "Serien";
/// Download folder below the share root
pub const DOWNLOAD_FOLDER_NAME: &str = "Download";

/// The folders the watcher reads from and writes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryPaths {
    anime_dir: PathBuf,
    series_dir: PathBuf,
    download_dir: PathBuf,
}

impl LibraryPaths {
    /// Create a new LibraryPaths from explicit folders
    pub fn new(
        anime_dir: impl AsRef<Path>,
        series_dir: impl AsRef<Path>,
        download_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            anime_dir: anime_dir.as_ref().to_path_buf(),
            series_dir: series_dir.as_ref().to_path_buf(),
            download_dir: download_dir.as_ref().to_path_buf(),
        }
    }

    /// Derive all folders from the public share of the server
    ///
    /// `<root>/Shared Video/Anime`, `<root>/Shared Video/Serien` and `<root>/Download`.
    pub fn from_share_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let video_dir = root.join(SHARED_VIDEO_FOLDER_NAME);
        Self {
            anime_dir: video_dir.join(ANIME_FOLDER_NAME),
            series_dir: video_dir.join(SERIES_FOLDER_NAME),
            download_dir: root.join(DOWNLOAD_FOLDER_NAME),
        }
    }

    /// Get the anime library folder
    pub fn anime_dir(&self) -> &Path {
        &self.anime_dir
    }

    /// Get the series library folder
    pub fn series_dir(&self) -> &Path {
        &self.series_dir
    }

    /// Get the download folder
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Library roots in scan order (later roots win on equal folder names)
    pub fn library_roots(&self) -> [&Path; 2] {
        [&self.anime_dir, &self.series_dir]
    }

    /// Check that every folder exists and can be used
    ///
    /// Called once at startup, a failure here is a configuration error.
    pub fn validate(&self) -> Result<()> {
        for (label, dir) in [
            ("anime", &self.anime_dir),
            ("series", &self.series_dir),
            ("download", &self.download_dir),
        ] {
            if !dir.is_dir() {
                bail!("Could not find {} folder: {}", label, dir.display());
            }

            std::fs::read_dir(dir)
                .with_context(|| format!("Cannot read {} folder: {}", label, dir.display()))?;

            let metadata = std::fs::metadata(dir)
                .with_context(|| format!("Cannot stat {} folder: {}", label, dir.display()))?;
            if metadata.permissions().readonly() {
                bail!("{} folder is read-only: {}", label, dir.display());
            }
        }

        tracing::debug!(
            anime_dir = %self.anime_dir.display(),
            series_dir = %self.series_dir.display(),
            download_dir = %self.download_dir.display(),
            "Library folders validated"
        );

        Ok(())
    }
}

/// Naming scheme for season folders and relocated episodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeLayout {
    season_folder_prefix: String,
}

impl Default for EpisodeLayout {
    fn default() -> Self {
        Self::new("Staffel")
    }
}

impl EpisodeLayout {
    pub fn new(season_folder_prefix: impl Into<String>) -> Self {
        Self {
            season_folder_prefix: season_folder_prefix.into(),
        }
    }

    /// Get the season folder name, e.g. `Staffel 02`
    pub fn season_folder_name(&self, season: u32) -> String {
        format!("{} {:02}", self.season_folder_prefix, season)
    }

    /// Get the season folder below a series folder
    pub fn season_dir(&self, series_dir: &Path, season: u32) -> PathBuf {
        series_dir.join(self.season_folder_name(season))
    }

    /// Get the canonical episode file name, e.g. `Naruto - s01e03.mkv`
    pub fn episode_file_name(
        series_folder_name: &str,
        season: u32,
        episode: u32,
        extension: &str,
    ) -> String {
        format!(
            "{} - s{:02}e{:02}.{}",
            series_folder_name, season, episode, extension
        )
    }
}
