//! The watcher service ties the relocation engine to its shared state.
//!
//! Lock order is fixed: pass gate, then the index, then the set of reported
//! unknown series. Alias changes and rebuilds take the index write lock and
//! therefore wait for a running pass to finish.

use shared::{LibraryPaths, PassReport, SeriesName};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::aliases::{AliasEntry, AliasStore};
use crate::error::{Result, WatcherError};
use crate::index::DirectoryIndex;
use crate::notify::Notifier;
use crate::relocation::{RelocationPass, RelocationSettings};

pub struct WatcherService {
    paths: LibraryPaths,
    settings: RelocationSettings,
    aliases: AliasStore,
    notifier: Arc<dyn Notifier>,
    /// One pass at a time
    pass_gate: Mutex<()>,
    index: RwLock<DirectoryIndex>,
    /// Unknown series already reported since the last alias change
    pending: Mutex<HashSet<SeriesName>>,
}

impl WatcherService {
    /// Load the mappings and build the first index
    ///
    /// Both failures are fatal: a malformed mapping file or an unreadable
    /// library root.
    pub fn new(
        paths: LibraryPaths,
        settings: RelocationSettings,
        aliases: AliasStore,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let index = build_index(&paths, &aliases)?;
        Ok(Self {
            paths,
            settings,
            aliases,
            notifier,
            pass_gate: Mutex::new(()),
            index: RwLock::new(index),
            pending: Mutex::new(HashSet::new()),
        })
    }

    pub fn paths(&self) -> &LibraryPaths {
        &self.paths
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Run one relocation pass, waiting for a running one first
    ///
    /// A deep pass also re-admits files parked with `~`.
    pub fn trigger_pass(&self, deep: bool) -> Result<PassReport> {
        let _gate = self.pass_gate.lock().unwrap_or_else(PoisonError::into_inner);
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);

        debug!(deep, "Starting relocation pass");
        RelocationPass::new(
            self.paths.download_dir(),
            &self.settings,
            &index,
            &mut pending,
            self.notifier.as_ref(),
            deep,
        )
        .run()
    }

    /// Persist a new alias and make it resolvable right away
    ///
    /// Nothing is written if `canonical` does not resolve. Returns the
    /// library folder the alias now points to.
    pub fn add_alias(&self, alias: &str, canonical: &str) -> Result<PathBuf> {
        let alias = SeriesName::new(alias);
        let canonical = SeriesName::new(canonical);
        if alias.is_empty() {
            return Err(WatcherError::EmptyAlias);
        }

        let path = {
            let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
            if index.resolve(&canonical).is_none() {
                warn!(alternative = %alias, series = %canonical, "Refusing mapping to unknown series");
                return Err(WatcherError::UnknownCanonical(canonical.to_string()));
            }

            self.aliases.append(AliasEntry::new(&alias, &canonical))?;
            index
                .add_alias(alias.clone(), &canonical)
                .ok_or_else(|| WatcherError::UnknownCanonical(canonical.to_string()))?
        };

        self.clear_pending();
        info!(alternative = %alias, path = %path.display(), "Mapping added");
        Ok(path)
    }

    /// Rescan the libraries and replay all stored mappings
    ///
    /// On failure the previous index stays in place. Returns the number of
    /// resolvable names.
    pub fn rebuild_index(&self) -> Result<usize> {
        let count = {
            let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
            let rebuilt = build_index(&self.paths, &self.aliases)?;
            *index = rebuilt;
            index.len()
        };

        self.clear_pending();
        info!(names = count, "Directory index rebuilt");
        Ok(count)
    }

    /// Aliases grouped by the library folder they resolve to
    pub fn list_known_mappings(&self) -> BTreeMap<String, Vec<String>> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .known_mappings()
    }

    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .resolve(&SeriesName::new(name))
            .map(PathBuf::from)
    }

    fn clear_pending(&self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

fn build_index(paths: &LibraryPaths, aliases: &AliasStore) -> Result<DirectoryIndex> {
    let entries = aliases.load()?;
    Ok(DirectoryIndex::build(&paths.library_roots(), &entries)?)
}
