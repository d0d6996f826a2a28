//! Persisted alias mappings.
//!
//! Mappings live in a TOML file as an ordered list of tables:
//!
//! ```toml
//! [[mapping]]
//! alternative = "naruto-shippuden"
//! series = "naruto"
//! ```
//!
//! Unknown keys, on a mapping or at the top level, are kept as they are when
//! the file is rewritten.

use serde::{Deserialize, Serialize};
use shared::SeriesName;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::AliasStoreError;

/// One alias pair as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasEntry {
    /// Name as it appears in downloads
    pub alternative: String,
    /// Name of the library folder it belongs to
    pub series: String,
    #[serde(flatten)]
    pub extra: toml::Table,
}

impl AliasEntry {
    pub fn new(alias: &SeriesName, canonical: &SeriesName) -> Self {
        Self {
            alternative: alias.to_string(),
            series: canonical.to_string(),
            extra: toml::Table::new(),
        }
    }

    pub fn alias(&self) -> SeriesName {
        SeriesName::new(&self.alternative)
    }

    pub fn canonical(&self) -> SeriesName {
        SeriesName::new(&self.series)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MappingDocument {
    #[serde(flatten)]
    other: toml::Table,
    #[serde(rename = "mapping", default)]
    mappings: Vec<AliasEntry>,
}

/// File backed alias store
#[derive(Debug, Clone)]
pub struct AliasStore {
    path: PathBuf,
}

impl AliasStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all mappings in file order (a missing file has none)
    pub fn load(&self) -> Result<Vec<AliasEntry>, AliasStoreError> {
        let document = self.read_document()?;
        debug!(
            path = %self.path.display(),
            count = document.mappings.len(),
            "Loaded mappings"
        );
        Ok(document.mappings)
    }

    /// Persist one more mapping, keeping every existing entry untouched
    pub fn append(&self, entry: AliasEntry) -> Result<(), AliasStoreError> {
        let mut document = self.read_document()?;
        info!(
            alternative = %entry.alternative,
            series = %entry.series,
            "Adding a mapping"
        );
        document.mappings.push(entry);
        self.write_document(&document)
    }

    fn read_document(&self) -> Result<MappingDocument, AliasStoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No mapping file yet");
                return Ok(MappingDocument::default());
            }
            Err(source) => {
                return Err(AliasStoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        toml::from_str(&content).map_err(|source| AliasStoreError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    fn write_document(&self, document: &MappingDocument) -> Result<(), AliasStoreError> {
        let content = toml::to_string_pretty(document)?;
        let io_err = |source| AliasStoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        // Replace in one step so a crash never leaves a truncated file
        let tmp_path = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, content).map_err(io_err)?;
        std::fs::rename(&tmp_path, &self.path).map_err(io_err)?;

        info!(path = %self.path.display(), "Saved the mappings");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = AliasStore::new(temp_dir.path().join("mappings.toml"));

        assert!(store.load()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_append_and_load_keep_order() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = AliasStore::new(temp_dir.path().join("nested/mappings.toml"));

        store.append(AliasEntry::new(&"shippuden".into(), &"naruto".into()))?;
        store.append(AliasEntry::new(&"aot".into(), &"attack on titan".into()))?;
        store.append(AliasEntry::new(&"naruto-shippuden".into(), &"naruto".into()))?;

        let entries = store.load()?;
        let aliases: Vec<_> = entries.iter().map(|e| e.alternative.as_str()).collect();
        assert_eq!(aliases, vec!["shippuden", "aot", "naruto-shippuden"]);
        assert_eq!(entries[1].canonical().as_str(), "attack on titan");
        Ok(())
    }

    #[test]
    fn test_append_preserves_existing_entries_exactly() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("mappings.toml");
        std::fs::write(
            &path,
            r#"
bot_token = "secret"
main_channel = 1234

[[mapping]]
alternative = "Shingeki no Kyojin"
series = "Attack on Titan"
added_by = "operator"
"#,
        )?;
        let store = AliasStore::new(&path);
        let before = store.load()?;

        store.append(AliasEntry::new(&"bnha".into(), &"my hero academia".into()))?;

        let after = store.load()?;
        assert_eq!(after.len(), 2);
        assert_eq!(after[0], before[0]);
        assert_eq!(after[0].alternative, "Shingeki no Kyojin");
        assert_eq!(
            after[0].extra.get("added_by").and_then(|v| v.as_str()),
            Some("operator")
        );
        assert_eq!(after[0].alias().as_str(), "shingeki no kyojin");

        let raw = std::fs::read_to_string(&path)?;
        assert!(raw.contains("bot_token = \"secret\""));
        assert!(raw.contains("main_channel = 1234"));
        Ok(())
    }

    #[test]
    fn test_missing_field_is_malformed() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("mappings.toml");
        std::fs::write(&path, "[[mapping]]\nalternative = \"aot\"\n")?;

        let err = AliasStore::new(&path).load().unwrap_err();
        assert!(matches!(err, AliasStoreError::Malformed { .. }));
        Ok(())
    }

    #[test]
    fn test_append_refuses_to_overwrite_malformed_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("mappings.toml");
        std::fs::write(&path, "this is = = not toml")?;

        let store = AliasStore::new(&path);
        assert!(store
            .append(AliasEntry::new(&"a".into(), &"b".into()))
            .is_err());
        assert_eq!(std::fs::read_to_string(&path)?, "this is = = not toml");
        Ok(())
    }
}
