//! Configuration management for the download watcher.
//!
//! This module handles loading and parsing configuration from TOML files,
//! with sensible defaults for all settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::paths::LibraryPaths;

/// Default server share root, the library folders are derived from it
pub const DEFAULT_SHARE_ROOT: &str = "./server";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory settings
    pub data: DataConfig,

    /// Library and download folders
    pub library: LibraryConfig,

    /// Watcher loop settings
    #[serde(default)]
    pub watcher: WatcherConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Data directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root data directory path (mappings, logs)
    pub root_dir: String,
}

/// Library configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Folder holding one subfolder per anime series
    pub anime_dir: String,

    /// Folder holding one subfolder per live action series
    pub series_dir: String,

    /// Folder new downloads arrive in
    pub download_dir: String,

    /// Prefix of season folders, followed by the two digit season number
    #[serde(default = "default_season_folder_prefix")]
    pub season_folder_prefix: String,

    /// File extensions that are considered videos
    #[serde(default = "default_video_extensions")]
    pub video_extensions: Vec<String>,
}

/// Watcher loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Seconds between two scheduled passes
    pub interval_seconds: u64,

    /// Alias mapping file (relative to data directory or absolute)
    pub mappings_file: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log directory path (relative to data directory or absolute)
    pub log_dir: String,

    /// Default log level (trace, debug, info, warn, error)
    pub default_level: String,

    /// Enable console output
    pub console: bool,

    /// Enable file output
    pub file: bool,

    /// Enable JSON formatting for file logs
    pub json_format: bool,

    /// Number of rotated log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_log_files: usize,
}

fn default_season_folder_prefix() -> String {
    "Staffel".to_string()
}

fn default_max_log_files() -> usize {
    14
}

fn default_video_extensions() -> Vec<String> {
    vec!["mp4".to_string(), "mkv".to_string(), "avi".to_string()]
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            mappings_file: "mappings.toml".to_string(),
        }
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        let paths = LibraryPaths::from_share_root(DEFAULT_SHARE_ROOT);
        Self {
            anime_dir: paths.anime_dir().to_string_lossy().to_string(),
            series_dir: paths.series_dir().to_string_lossy().to_string(),
            download_dir: paths.download_dir().to_string_lossy().to_string(),
            season_folder_prefix: default_season_folder_prefix(),
            video_extensions: default_video_extensions(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig {
                root_dir: "appdata".to_string(),
            },
            library: LibraryConfig::default(),
            watcher: WatcherConfig::default(),
            logging: LoggingConfig {
                log_dir: "logs".to_string(),
                default_level: "info".to_string(),
                console: true,
                file: true,
                json_format: false,
                max_log_files: default_max_log_files(),
            },
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// If the file doesn't exist, returns the default configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration saved successfully"
        );

        Ok(())
    }

    /// Get the path for the data directory
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data.root_dir)
    }

    /// Get the absolute path for the log directory
    pub fn log_dir(&self) -> PathBuf {
        self.resolve_data_path(&self.logging.log_dir)
    }

    /// Get the absolute path for the alias mapping file
    pub fn mappings_path(&self) -> PathBuf {
        self.resolve_data_path(&self.watcher.mappings_file)
    }

    /// Get the configured library folders
    pub fn library_paths(&self) -> LibraryPaths {
        LibraryPaths::new(
            &self.library.anime_dir,
            &self.library.series_dir,
            &self.library.download_dir,
        )
    }

    /// Override all library folders with the layout below a server share root
    pub fn use_share_root(&mut self, share_root: impl AsRef<Path>) {
        let paths = LibraryPaths::from_share_root(share_root);
        self.library.anime_dir = paths.anime_dir().to_string_lossy().to_string();
        self.library.series_dir = paths.series_dir().to_string_lossy().to_string();
        self.library.download_dir = paths.download_dir().to_string_lossy().to_string();
    }

    fn resolve_data_path(&self, value: &str) -> PathBuf {
        let path = Path::new(value);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir().join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.data.root_dir, "appdata");
        assert_eq!(config.watcher.interval_seconds, 60);
        assert_eq!(config.library.season_folder_prefix, "Staffel");
        assert_eq!(config.library.video_extensions, vec!["mp4", "mkv", "avi"]);
        assert!(config.library.anime_dir.ends_with("Anime"));
    }

    #[test]
    fn test_save_and_load_config() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.toml");

        let mut original_config = Config::default();
        original_config.watcher.interval_seconds = 15;
        original_config.save(&config_path)?;

        assert!(config_path.exists());

        let loaded_config = Config::from_file(&config_path)?;
        assert_eq!(loaded_config.watcher.interval_seconds, 15);
        assert_eq!(
            loaded_config.library.download_dir,
            original_config.library.download_dir
        );

        Ok(())
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.data.root_dir, "appdata");
    }

    #[test]
    fn test_optional_sections_fall_back_to_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[data]
root_dir = "state"

[library]
anime_dir = "/srv/Anime"
series_dir = "/srv/Serien"
download_dir = "/srv/Download"

[logging]
log_dir = "logs"
default_level = "debug"
console = true
file = false
json_format = false
"#,
        )?;

        let config = Config::from_file(&config_path)?;
        assert_eq!(config.watcher.interval_seconds, 60);
        assert_eq!(config.library.season_folder_prefix, "Staffel");
        assert_eq!(config.mappings_path(), PathBuf::from("state/mappings.toml"));
        Ok(())
    }

    #[test]
    fn test_malformed_config_is_an_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "[library]\nanime_dir = 3\n")?;

        assert!(Config::from_file(&config_path).is_err());
        Ok(())
    }

    #[test]
    fn test_path_resolution() {
        let config = Config::default();

        assert!(config.log_dir().ends_with("appdata/logs"));
        assert!(config.mappings_path().ends_with("appdata/mappings.toml"));

        let mut config = Config::default();
        config.watcher.mappings_file = "/etc/watcher/mappings.toml".to_string();
        assert_eq!(
            config.mappings_path(),
            PathBuf::from("/etc/watcher/mappings.toml")
        );
    }

    #[test]
    fn test_use_share_root() {
        let mut config = Config::default();
        config.use_share_root("/mnt/share");

        let paths = config.library_paths();
        assert_eq!(paths.anime_dir(), Path::new("/mnt/share/Shared Video/Anime"));
        assert_eq!(paths.series_dir(), Path::new("/mnt/share/Shared Video/Serien"));
        assert_eq!(paths.download_dir(), Path::new("/mnt/share/Download"));
    }
}
