//! Series name to library folder resolution.
//!
//! The index is a snapshot: library folders found by scanning the roots,
//! then every stored alias whose series already resolves. It is rebuilt as a
//! whole, the only incremental change is adding a single alias.

use shared::SeriesName;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::aliases::AliasEntry;
use crate::error::IndexError;

#[derive(Debug, Clone, Default)]
pub struct DirectoryIndex {
    entries: HashMap<SeriesName, PathBuf>,
    /// Aliases in the order they were added, for stable listings
    alias_order: Vec<SeriesName>,
}

impl DirectoryIndex {
    /// Scan the library roots and replay the aliases
    ///
    /// Any unreadable root fails the whole build, nothing partial is returned.
    pub fn build(roots: &[&Path], aliases: &[AliasEntry]) -> Result<Self, IndexError> {
        let mut index = Self::default();

        for root in roots {
            for (name, path) in scan_root(root)? {
                if let Some(previous) = index.entries.insert(name.clone(), path) {
                    warn!(
                        series = %name,
                        shadowed = %previous.display(),
                        "Series folder exists in more than one library"
                    );
                }
            }
        }
        let folders = index.entries.len();

        for entry in aliases {
            let alias = entry.alias();
            let canonical = entry.canonical();
            match index.resolve(&canonical).map(Path::to_path_buf) {
                Some(path) => index.insert_alias(alias, path),
                None => warn!(
                    alternative = %alias,
                    series = %canonical,
                    "Mapping points to an unknown series, skipping"
                ),
            }
        }

        info!(
            folders,
            aliases = index.alias_order.len(),
            "Directory index built"
        );
        Ok(index)
    }

    pub fn resolve(&self, name: &SeriesName) -> Option<&Path> {
        self.entries.get(name).map(PathBuf::as_path)
    }

    /// Point `alias` at the folder `canonical` resolves to
    ///
    /// Returns the folder, or `None` if `canonical` is unknown.
    pub fn add_alias(&mut self, alias: SeriesName, canonical: &SeriesName) -> Option<PathBuf> {
        let path = self.resolve(canonical)?.to_path_buf();
        self.insert_alias(alias, path.clone());
        Some(path)
    }

    fn insert_alias(&mut self, alias: SeriesName, path: PathBuf) {
        debug!(alternative = %alias, path = %path.display(), "Mapped alias");
        if !self.alias_order.contains(&alias) {
            self.alias_order.push(alias.clone());
        }
        self.entries.insert(alias, path);
    }

    /// Aliases grouped by the folder name they resolve to
    ///
    /// Keys keep the folder's own spelling. Entries equal to the folder name
    /// are left out.
    pub fn known_mappings(&self) -> BTreeMap<String, Vec<String>> {
        let mut mappings: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for alias in &self.alias_order {
            let Some(path) = self.entries.get(alias) else {
                continue;
            };
            let folder_name = folder_name(path);
            if SeriesName::new(&folder_name) == *alias {
                continue;
            }
            mappings
                .entry(folder_name)
                .or_default()
                .push(alias.to_string());
        }
        mappings
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Display name of a series folder
pub fn folder_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Immediate subdirectories of a library root
fn scan_root(root: &Path) -> Result<Vec<(SeriesName, PathBuf)>, IndexError> {
    let unreadable = |source| IndexError::RootUnreadable {
        root: root.to_path_buf(),
        source,
    };

    let mut found = Vec::new();
    for entry in std::fs::read_dir(root).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();
        if !path.is_dir() {
            continue;
        }
        let name = SeriesName::new(folder_name(&path));
        if !name.is_empty() {
            found.push((name, path));
        }
    }

    debug!(root = %root.display(), folders = found.len(), "Scanned library root");
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    struct Libraries {
        _temp_dir: TempDir,
        anime: PathBuf,
        series: PathBuf,
    }

    impl Libraries {
        fn new(anime: &[&str], series: &[&str]) -> Result<Self> {
            let temp_dir = TempDir::new()?;
            let anime_root = temp_dir.path().join("Anime");
            let series_root = temp_dir.path().join("Serien");
            for name in anime {
                std::fs::create_dir_all(anime_root.join(name))?;
            }
            for name in series {
                std::fs::create_dir_all(series_root.join(name))?;
            }
            std::fs::create_dir_all(&anime_root)?;
            std::fs::create_dir_all(&series_root)?;
            Ok(Self {
                _temp_dir: temp_dir,
                anime: anime_root,
                series: series_root,
            })
        }

        fn roots(&self) -> [&Path; 2] {
            [&self.anime, &self.series]
        }
    }

    #[test]
    fn test_build_indexes_both_roots() -> Result<()> {
        let libs = Libraries::new(&["Naruto", "One Piece"], &["Dark"])?;
        std::fs::write(libs.anime.join("notes.txt"), b"not a series")?;

        let index = DirectoryIndex::build(&libs.roots(), &[])?;

        assert_eq!(index.len(), 3);
        assert_eq!(
            index.resolve(&"naruto".into()),
            Some(libs.anime.join("Naruto").as_path())
        );
        assert_eq!(
            index.resolve(&"DARK".into()),
            Some(libs.series.join("Dark").as_path())
        );
        assert_eq!(index.resolve(&"notes.txt".into()), None);
        Ok(())
    }

    #[test]
    fn test_build_does_not_recurse() -> Result<()> {
        let libs = Libraries::new(&["Naruto/Staffel 01"], &[])?;

        let index = DirectoryIndex::build(&libs.roots(), &[])?;

        assert!(index.resolve(&"naruto".into()).is_some());
        assert!(index.resolve(&"staffel 01".into()).is_none());
        Ok(())
    }

    #[test]
    fn test_build_replays_aliases_in_order() -> Result<()> {
        let libs = Libraries::new(&["Naruto"], &[])?;
        let aliases = vec![
            AliasEntry::new(&"naruto-shippuden".into(), &"naruto".into()),
            AliasEntry::new(&"ghost".into(), &"missing series".into()),
            AliasEntry::new(&"shippuden".into(), &"naruto-shippuden".into()),
        ];

        let index = DirectoryIndex::build(&libs.roots(), &aliases)?;

        let naruto = libs.anime.join("Naruto");
        assert_eq!(index.resolve(&"naruto-shippuden".into()), Some(naruto.as_path()));
        assert_eq!(index.resolve(&"shippuden".into()), Some(naruto.as_path()));
        assert_eq!(index.resolve(&"ghost".into()), None);
        Ok(())
    }

    #[test]
    fn test_build_fails_on_unreadable_root() -> Result<()> {
        let libs = Libraries::new(&["Naruto"], &[])?;
        let missing = libs.anime.parent().unwrap().join("Missing");

        let err = DirectoryIndex::build(&[&libs.anime, &missing], &[]).unwrap_err();
        assert!(matches!(err, IndexError::RootUnreadable { root, .. } if root == missing));
        Ok(())
    }

    #[test]
    fn test_add_alias() -> Result<()> {
        let libs = Libraries::new(&["Attack on Titan"], &[])?;
        let mut index = DirectoryIndex::build(&libs.roots(), &[])?;

        assert!(index.add_alias("aot".into(), &"unknown".into()).is_none());
        assert!(index.resolve(&"aot".into()).is_none());

        let path = index.add_alias("aot".into(), &"attack on titan".into());
        assert_eq!(path, Some(libs.anime.join("Attack on Titan")));
        assert_eq!(index.resolve(&"aot".into()), path.as_deref());
        Ok(())
    }

    #[test]
    fn test_known_mappings_group_by_folder() -> Result<()> {
        let libs = Libraries::new(&["Naruto", "Attack on Titan"], &[])?;
        let aliases = vec![
            AliasEntry::new(&"shippuden".into(), &"naruto".into()),
            AliasEntry::new(&"aot".into(), &"attack on titan".into()),
            AliasEntry::new(&"naruto".into(), &"naruto".into()),
            AliasEntry::new(&"naruto-shippuden".into(), &"naruto".into()),
        ];
        let index = DirectoryIndex::build(&libs.roots(), &aliases)?;

        let mappings = index.known_mappings();

        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings["Naruto"], vec!["shippuden", "naruto-shippuden"]);
        assert_eq!(mappings["Attack on Titan"], vec!["aot"]);
        Ok(())
    }
}
