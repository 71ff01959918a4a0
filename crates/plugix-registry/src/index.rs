//! Merged registry index with O(1) lookup
//!
//! Documents are parsed in parallel and merged in the order they were given:
//! the first document to claim an `(interface_type, interface_name, key)`
//! triple wins. True collisions are the indexer's business; here they are only
//! logged.

use crate::document::{self, IndexFormat};
use crate::errors::RegistryError;
use crate::file_cache;
use crate::types::{InterfaceType, PluginKey, RegistryEntry};
use ahash::AHashMap;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use smallvec::SmallVec;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};

type KeyTable = AHashMap<PluginKey, RegistryEntry>;
type InterfaceTable = AHashMap<Arc<str>, KeyTable>;

/// In-memory registry index
#[derive(Debug, Clone, Default)]
pub struct RegistryIndex {
    tables: AHashMap<InterfaceType, InterfaceTable>,
    sources: SmallVec<[PathBuf; 4]>,
    /// Newest modification time among `sources`
    source_mtime: Option<SystemTime>,
    loaded_at: Option<DateTime<Utc>>,
}

impl RegistryIndex {
    /// Load one merged document or a set of per-package documents
    ///
    /// An empty path list, or a path that does not exist, yields
    /// [`RegistryError::NeedsRebuild`]. Malformed documents are
    /// [`RegistryError::Corrupt`].
    pub fn load(paths: &[PathBuf]) -> Result<Self, RegistryError> {
        if paths.is_empty() {
            return Err(RegistryError::NeedsRebuild {
                reason: "no registry index documents found".to_string(),
            });
        }

        let parsed: Vec<(Vec<RegistryEntry>, Option<SystemTime>)> = paths
            .par_iter()
            .map(|path| {
                document::read_document(path).map(|entries| (entries, file_cache::mtime(path)))
            })
            .collect::<Result<_, _>>()?;

        let mut index = RegistryIndex {
            loaded_at: Some(Utc::now()),
            ..Default::default()
        };
        for ((entries, mtime), path) in parsed.into_iter().zip(paths) {
            index.record_source(path.clone(), mtime);
            for entry in entries {
                index.insert(entry);
            }
        }

        info!(
            "Loaded {} registry entries from {} document(s)",
            index.len(),
            paths.len()
        );
        Ok(index)
    }

    /// Build an index directly from entries (first writer wins)
    pub fn from_entries(entries: impl IntoIterator<Item = RegistryEntry>) -> Self {
        let mut index = RegistryIndex {
            loaded_at: Some(Utc::now()),
            ..Default::default()
        };
        for entry in entries {
            index.insert(entry);
        }
        index
    }

    fn record_source(&mut self, path: PathBuf, mtime: Option<SystemTime>) {
        self.sources.push(path);
        self.source_mtime = match (self.source_mtime, mtime) {
            (Some(current), Some(new)) => Some(current.max(new)),
            (current, new) => current.or(new),
        };
    }

    /// Insert unless the key is already taken; returns whether it was inserted
    fn insert(&mut self, entry: RegistryEntry) -> bool {
        let keys = self
            .tables
            .entry(entry.interface_type)
            .or_default()
            .entry(entry.interface_name.clone())
            .or_default();

        if let Some(existing) = keys.get(&entry.key) {
            debug!(
                "Keeping {}/{} from package '{}', ignoring duplicate from '{}'",
                entry.interface_name, entry.key, existing.package, entry.package
            );
            return false;
        }
        keys.insert(entry.key.clone(), entry);
        true
    }

    /// Merge another index into a new one; entries already in `self` win
    pub fn merge(&self, other: &RegistryIndex) -> RegistryIndex {
        let mut merged = self.clone();
        merged.sources.extend(other.sources.iter().cloned());
        merged.source_mtime = match (self.source_mtime, other.source_mtime) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        for entry in other.iter() {
            merged.insert(entry.clone());
        }
        merged
    }

    /// O(1) lookup of a single plugin location
    pub fn lookup(
        &self,
        interface_type: InterfaceType,
        interface_name: &str,
        key: &PluginKey,
    ) -> Option<&RegistryEntry> {
        self.tables
            .get(&interface_type)?
            .get(interface_name)?
            .get(key)
    }

    /// All entries of one interface, sorted by key
    pub fn entries(&self, interface_type: InterfaceType, interface_name: &str) -> Vec<&RegistryEntry> {
        let mut entries: Vec<&RegistryEntry> = self
            .tables
            .get(&interface_type)
            .and_then(|interfaces| interfaces.get(interface_name))
            .map(|keys| keys.values().collect())
            .unwrap_or_default();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    /// Interface names registered under an interface type, sorted
    pub fn interfaces(&self, interface_type: InterfaceType) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .tables
            .get(&interface_type)
            .map(|interfaces| interfaces.keys().map(|name| &**name).collect())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }

    /// Iterate over every entry in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.tables
            .values()
            .flat_map(|interfaces| interfaces.values())
            .flat_map(|keys| keys.values())
    }

    /// Index restricted to the entries of one package
    pub fn filter_package(&self, package: &str) -> RegistryIndex {
        let mut filtered = RegistryIndex {
            sources: self.sources.clone(),
            source_mtime: self.source_mtime,
            loaded_at: self.loaded_at,
            ..Default::default()
        };
        for entry in self.iter().filter(|e| e.package.as_ref() == package) {
            filtered.insert(entry.clone());
        }
        filtered
    }

    /// Whether a source changed after this index was derived from it
    pub fn is_stale(&self, source_timestamp: SystemTime) -> bool {
        match self.source_mtime {
            Some(mtime) => source_timestamp > mtime,
            None => true,
        }
    }

    /// Compare against the current modification times of the source documents
    pub fn sources_changed(&self) -> bool {
        self.sources.is_empty()
            || self
                .sources
                .iter()
                .any(|path| file_cache::mtime(path).map_or(true, |mtime| self.is_stale(mtime)))
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    pub fn len(&self) -> usize {
        self.tables
            .values()
            .flat_map(|interfaces| interfaces.values())
            .map(|keys| keys.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the whole index as one merged document
    pub fn write_to_path(&self, path: &Path, format: IndexFormat) -> Result<(), RegistryError> {
        document::write_document(path, self.iter(), format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn reader(name: &str, package: &str) -> RegistryEntry {
        RegistryEntry::new(
            InterfaceType::Code,
            "readers",
            PluginKey::name(name),
            package,
            &format!("readers/{}.rs", name),
        )
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let _ = fs::write(&path, content);
        path
    }

    #[test]
    fn test_first_writer_wins_across_packages() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let a = write(
            temp_dir.path(),
            "a.json",
            r#"{"module_based": {"readers": {"foo": {"package": "pkgA", "relpath": "r/foo.ext"}}}}"#,
        );
        let b = write(
            temp_dir.path(),
            "b.yaml",
            "module_based:\n  readers:\n    foo: {package: pkgB, relpath: r/foo.ext}\n    bar: {package: pkgB, relpath: r/bar.ext}\n",
        );

        let Ok(index) = RegistryIndex::load(&[a, b]) else {
            panic!("both documents should load");
        };
        assert_eq!(index.len(), 2);
        assert_eq!(index.sources().len(), 2);
        assert!(index
            .lookup(InterfaceType::Code, "readers", &PluginKey::name("foo"))
            .is_some_and(|e| e.package.as_ref() == "pkgA"));
        assert!(index
            .lookup(InterfaceType::Declarative, "readers", &PluginKey::name("foo"))
            .is_none());
    }

    #[test]
    fn test_corrupt_document_fails_whole_load() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let good = write(temp_dir.path(), "good.json", "{}");
        let bad = write(temp_dir.path(), "bad.json", "{not json");
        let result = RegistryIndex::load(&[good, bad]);
        assert!(matches!(result, Err(RegistryError::Corrupt { .. })));
    }

    #[test]
    fn test_empty_path_list_needs_rebuild() {
        assert!(RegistryIndex::load(&[]).is_err_and(|e| e.needs_rebuild()));
    }

    #[test]
    fn test_merge_keeps_existing_entries() {
        let left = RegistryIndex::from_entries([reader("foo", "pkgA")]);
        let right = RegistryIndex::from_entries([reader("foo", "pkgB"), reader("bar", "pkgB")]);

        let merged = left.merge(&right);
        assert_eq!(merged.len(), 2);
        assert!(merged
            .lookup(InterfaceType::Code, "readers", &PluginKey::name("foo"))
            .is_some_and(|e| e.package.as_ref() == "pkgA"));
        // inputs untouched
        assert_eq!(left.len(), 1);
    }

    #[test]
    fn test_entries_sorted_and_filtered_by_package() {
        let index = RegistryIndex::from_entries([
            reader("zeta", "pkgA"),
            reader("alpha", "pkgB"),
            reader("mid", "pkgA"),
        ]);

        let names: Vec<String> = index
            .entries(InterfaceType::Code, "readers")
            .iter()
            .map(|e| e.key.to_string())
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);

        let only_a = index.filter_package("pkgA");
        assert_eq!(only_a.len(), 2);
        assert_eq!(index.interfaces(InterfaceType::Code), vec!["readers"]);
        assert!(index.interfaces(InterfaceType::Declarative).is_empty());
    }

    #[test]
    fn test_staleness_against_source_time() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let path = write(temp_dir.path(), "registered_plugins.json", "{}");
        let Ok(index) = RegistryIndex::load(&[path]) else {
            panic!("empty document should load");
        };

        let Some(mtime) = file_cache::mtime(&index.sources()[0]) else {
            return;
        };
        assert!(!index.is_stale(mtime));
        assert!(index.is_stale(mtime + Duration::from_secs(60)));
        assert!(!index.sources_changed());
        assert!(RegistryIndex::default().is_stale(SystemTime::now()));
    }
}
