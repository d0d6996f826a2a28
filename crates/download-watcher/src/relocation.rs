//! One relocation pass over the download folder.
//!
//! The download folder doubles as the state store: a `_` in front of a file
//! name excludes it for good, a `~` parks it until its series gets a mapping
//! and a deep pass renames it back.

use shared::{Classification, EpisodeLayout, FileOutcome, PassReport, SeriesName, Severity};
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::error::{RelocationError, WatcherError};
use crate::index::{folder_name, DirectoryIndex};
use crate::notify::Notifier;
use crate::parser;

/// Permanently excluded (unparseable, no season, duplicate)
pub const EXCLUDED_MARKER: char = '_';
/// Waiting for a mapping of its series
pub const QUARANTINE_MARKER: char = '~';

/// Upper bound of stacked markers when the marked name is taken
const MAX_MARKERS: usize = 8;

/// What counts as a video and where it goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationSettings {
    pub video_extensions: Vec<String>,
    pub layout: EpisodeLayout,
}

impl Default for RelocationSettings {
    fn default() -> Self {
        Self {
            video_extensions: vec!["mp4".to_string(), "mkv".to_string(), "avi".to_string()],
            layout: EpisodeLayout::default(),
        }
    }
}

impl RelocationSettings {
    pub fn from_config(config: &shared::Config) -> Self {
        Self {
            video_extensions: config.library.video_extensions.clone(),
            layout: EpisodeLayout::new(config.library.season_folder_prefix.clone()),
        }
    }
}

/// Whether a download folder entry takes part in a pass
///
/// Markers are checked before the extension.
pub fn is_eligible(file_name: &str, video_extensions: &[String], include_quarantined: bool) -> bool {
    if file_name.starts_with(EXCLUDED_MARKER) {
        return false;
    }
    if file_name.starts_with(QUARANTINE_MARKER) && !include_quarantined {
        return false;
    }
    file_name
        .rsplit_once('.')
        .is_some_and(|(_, ext)| video_extensions.iter().any(|v| v.eq_ignore_ascii_case(ext)))
}

/// Eligible files currently in the download folder, in listing order
pub fn list_downloads(
    download_dir: &Path,
    video_extensions: &[String],
    include_quarantined: bool,
) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(download_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name();
        if is_eligible(&name.to_string_lossy(), video_extensions, include_quarantined) {
            files.push(path);
        }
    }
    Ok(files)
}

/// A single pass, created and driven by the watcher service
pub struct RelocationPass<'a> {
    download_dir: &'a Path,
    settings: &'a RelocationSettings,
    index: &'a DirectoryIndex,
    pending: &'a mut HashSet<SeriesName>,
    notifier: &'a dyn Notifier,
    report: PassReport,
}

impl<'a> RelocationPass<'a> {
    pub fn new(
        download_dir: &'a Path,
        settings: &'a RelocationSettings,
        index: &'a DirectoryIndex,
        pending: &'a mut HashSet<SeriesName>,
        notifier: &'a dyn Notifier,
        deep: bool,
    ) -> Self {
        Self {
            download_dir,
            settings,
            index,
            pending,
            notifier,
            report: PassReport::start(deep),
        }
    }

    /// Handle downloads until a listing brings no further move
    ///
    /// After every successful move the folder is listed again. A file is
    /// attempted at most once per pass.
    pub fn run(mut self) -> Result<PassReport, WatcherError> {
        if self.report.deep {
            self.pending.clear();
            self.restore_quarantined()?;
        }

        let mut attempted: HashSet<PathBuf> = HashSet::new();
        loop {
            let files: Vec<PathBuf> = self
                .list(false)?
                .into_iter()
                .filter(|file| !attempted.contains(file))
                .collect();
            self.report.scans += 1;

            if files.is_empty() {
                break;
            }
            debug!(count = files.len(), "Found files in the download folder");

            let mut moved = false;
            for file in files {
                attempted.insert(file.clone());
                let outcome = self.handle_file(&file);
                debug!(file = %file.display(), outcome = outcome.label(), "Handled download");
                self.report.record(&outcome);
                if matches!(outcome, FileOutcome::Moved { .. }) {
                    moved = true;
                    break;
                }
            }

            if !moved {
                break;
            }
        }

        self.report.finish();
        if !self.report.is_idle() {
            info!(
                deep = self.report.deep,
                restored = self.report.restored,
                moved = self.report.moved,
                unknown_series = self.report.unknown_series,
                unparseable = self.report.unparseable,
                needs_season = self.report.needs_season,
                duplicates = self.report.duplicates,
                failed = self.report.failed,
                scans = self.report.scans,
                "Relocation pass finished"
            );
        }
        Ok(self.report)
    }

    fn list(&self, include_quarantined: bool) -> Result<Vec<PathBuf>, WatcherError> {
        list_downloads(
            self.download_dir,
            &self.settings.video_extensions,
            include_quarantined,
        )
        .map_err(|source| {
            error!(path = %self.download_dir.display(), error = %source, "Could not read the download folder");
            self.notifier.notify(
                &format!(
                    "Could not read the download folder `{}`: {}",
                    self.download_dir.display(),
                    source
                ),
                Severity::Error,
            );
            WatcherError::DownloadFolder {
                path: self.download_dir.to_path_buf(),
                source,
            }
        })
    }

    /// Rename every `~` file back to its original name
    fn restore_quarantined(&mut self) -> Result<(), WatcherError> {
        for path in self.list(true)? {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                warn!(file = %path.display(), "Skipping quarantined file with a non UTF-8 name");
                continue;
            };
            let original = name.trim_start_matches(QUARANTINE_MARKER);
            if original.len() == name.len() || original.is_empty() {
                continue;
            }

            let target = path.with_file_name(original);
            if target.exists() {
                warn!(file = %name, "Original name is taken, leaving file quarantined");
                self.notifier.notify(
                    &format!("Cannot restore `{}`, `{}` already exists", name, original),
                    Severity::Error,
                );
                continue;
            }

            match fs::rename(&path, &target) {
                Ok(()) => {
                    debug!(file = %original, "Restored quarantined file");
                    self.report.restored += 1;
                }
                Err(e) => {
                    let err = RelocationError::new("restore", &path, e);
                    error!(error = %err, "Could not restore quarantined file");
                    self.notifier.notify(
                        &format!("Something went wrong while restoring `{}`: {}", name, err),
                        Severity::Error,
                    );
                }
            }
        }
        Ok(())
    }

    fn handle_file(&mut self, path: &Path) -> FileOutcome {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let index = self.index;

        let parsed = match parser::parse(&name) {
            Classification::Parsed(parsed) => parsed,
            Classification::Unparseable => {
                warn!(file = %name, "File did not match the file name pattern");
                return self.exclude(
                    path,
                    &name,
                    FileOutcome::Unparseable,
                    format!(
                        "`{}` did not match the file name pattern. Rename it to `<series> s01e01.<ext>` or move it manually",
                        name
                    ),
                );
            }
        };

        let Some(series_dir) = index.resolve(&parsed.series) else {
            return self.quarantine_unknown(path, &name, parsed.series);
        };

        let Some(season) = parsed.season else {
            warn!(file = %name, series = %parsed.series, "File has no season");
            return self.exclude(
                path,
                &name,
                FileOutcome::NeedsSeason,
                format!(
                    "`{}` does not contain a season. Add the season to the name or move it manually",
                    name
                ),
            );
        };

        self.file_episode(path, &name, series_dir, season, parsed.episode, &parsed.extension)
    }

    fn file_episode(
        &mut self,
        path: &Path,
        name: &str,
        series_dir: &Path,
        season: u32,
        episode: u32,
        extension: &str,
    ) -> FileOutcome {
        let season_dir = self.settings.layout.season_dir(series_dir, season);
        if !season_dir.is_dir() {
            if let Err(e) = fs::create_dir(&season_dir) {
                return self.fail(name, RelocationError::new("create folder", &season_dir, e));
            }
            info!(path = %season_dir.display(), "Created season folder");
        }

        let series_name = folder_name(series_dir);
        let target_name =
            EpisodeLayout::episode_file_name(&series_name, season, episode, extension);
        let target = season_dir.join(&target_name);

        match target.try_exists() {
            Ok(true) => return self.duplicate(path, name, target),
            Ok(false) => {}
            Err(e) => return self.fail(name, RelocationError::new("check", &target, e)),
        }

        for other in other_releases(&target) {
            warn!(
                file = %name,
                existing = %other.display(),
                "Episode is already filed with another extension"
            );
        }

        match move_file(path, &target) {
            Ok(()) => {
                info!(
                    file = %name,
                    series = %series_name,
                    season,
                    episode,
                    target = %target.display(),
                    "Moved file to known folder"
                );
                self.notifier.notify(
                    &format!(
                        "Moved `{}` as `{}` to `{}/{}`",
                        escape(name),
                        escape(&target_name),
                        series_name,
                        self.settings.layout.season_folder_name(season)
                    ),
                    Severity::Info,
                );
                FileOutcome::Moved {
                    from: path.to_path_buf(),
                    to: target,
                }
            }
            Err(e) => self.fail(name, RelocationError::new("move", path, e)),
        }
    }

    fn quarantine_unknown(&mut self, path: &Path, name: &str, series: SeriesName) -> FileOutcome {
        if let Err(e) = mark(path, QUARANTINE_MARKER) {
            return self.fail(name, e);
        }

        let notified = self.pending.insert(series.clone());
        if notified {
            warn!(file = %name, series = %series, "Series is not known");
            self.notifier.notify(
                &format!(
                    "Unknown series `{}`. Please add a mapping with `!map {} -> <series name on the server>`",
                    series, series
                ),
                Severity::Warn,
            );
        } else {
            debug!(file = %name, series = %series, "Unknown series already reported");
        }

        FileOutcome::QuarantinedUnknown { series, notified }
    }

    fn duplicate(&mut self, path: &Path, name: &str, existing: PathBuf) -> FileOutcome {
        warn!(file = %name, existing = %existing.display(), "File is a duplicate");
        let existing_name = folder_name(&existing);
        self.exclude(
            path,
            name,
            FileOutcome::Duplicate { existing },
            format!(
                "`{}` is already present as `{}`. Please check",
                escape(name),
                escape(&existing_name)
            ),
        )
    }

    /// Mark with `_` and report, or report the failed rename instead
    fn exclude(&mut self, path: &Path, name: &str, outcome: FileOutcome, message: String) -> FileOutcome {
        match mark(path, EXCLUDED_MARKER) {
            Ok(_) => {
                self.notifier.notify(&message, Severity::Warn);
                outcome
            }
            Err(e) => self.fail(name, e),
        }
    }

    fn fail(&mut self, name: &str, err: RelocationError) -> FileOutcome {
        error!(file = %name, error = %err, "Filesystem step failed");
        self.notifier.notify(
            &format!(
                "Something went wrong while handling `{}`: {}. Please look at the logs",
                escape(name),
                err
            ),
            Severity::Error,
        );
        FileOutcome::Failed {
            reason: err.to_string(),
        }
    }
}

/// Prefix a file name with a marker, stacking markers if that name is taken
fn mark(path: &Path, marker: char) -> Result<PathBuf, RelocationError> {
    let Some(file_name) = path.file_name() else {
        return Err(RelocationError::new(
            "rename",
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
        ));
    };

    let mut prefix = String::new();
    for _ in 0..MAX_MARKERS {
        prefix.push(marker);
        let mut candidate = OsString::from(&prefix);
        candidate.push(file_name);
        let target = path.with_file_name(candidate);

        match target.try_exists() {
            Ok(true) => continue,
            Ok(false) => {
                fs::rename(path, &target).map_err(|e| RelocationError::new("rename", path, e))?;
                debug!(from = %path.display(), to = %target.display(), "Marked file");
                return Ok(target);
            }
            Err(e) => return Err(RelocationError::new("check", &target, e)),
        }
    }

    Err(RelocationError::new(
        "rename",
        path,
        io::Error::new(
            io::ErrorKind::AlreadyExists,
            "too many marked files with the same name",
        ),
    ))
}

/// Rename, or copy and remove when the rename is refused (e.g. across filesystems)
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    let rename_err = match fs::rename(from, to) {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    if to.exists() || !from.is_file() {
        return Err(rename_err);
    }

    debug!(error = %rename_err, "Rename failed, copying instead");
    if let Err(e) = copy_new(from, to) {
        if e.kind() != io::ErrorKind::AlreadyExists {
            let _ = fs::remove_file(to);
        }
        return Err(e);
    }
    fs::remove_file(from)
}

/// Copy without ever replacing an existing file
fn copy_new(from: &Path, to: &Path) -> io::Result<()> {
    let mut source = File::open(from)?;
    let mut target = OpenOptions::new().write(true).create_new(true).open(to)?;
    io::copy(&mut source, &mut target)?;
    target.sync_all()
}

/// Files next to `target` with the same stem but another extension
fn other_releases(target: &Path) -> Vec<PathBuf> {
    let (Some(dir), Some(stem)) = (target.parent(), target.file_stem()) else {
        return Vec::new();
    };
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path != target && path.file_stem() == Some(stem))
        .collect()
}

/// Backticks would break the inline code spans of chat messages
fn escape(name: &str) -> String {
    name.replace('`', "\\`")
}
