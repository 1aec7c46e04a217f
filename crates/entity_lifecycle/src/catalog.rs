//! Durable catalog of logical entity records.
//!
//! A catalog is a single JSON object keyed by record id, rewritten wholesale
//! on every mutation. The in-memory map and the on-disk file converge before
//! any mutating call returns; that synchronous save is the only durability
//! guarantee offered. Writes go through a sibling temp file and a rename so a
//! crash mid-write cannot corrupt the previous catalog.

use crate::error::{CatalogError, CatalogResult};
use dashmap::DashMap;
use host_api::Position;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A logical entity record stored in a catalog.
///
/// Records are immutable except through explicit catalog operations; `id` is
/// the primary key and stays stable for the record's lifetime.
pub trait CatalogRecord:
    Serialize + DeserializeOwned + Clone + Send + Sync + 'static
{
    fn id(&self) -> &str;

    /// Where the record's live representation spawns.
    fn position(&self) -> Position;
}

/// JSON-file-backed collection of records, safe for concurrent readers.
pub struct CatalogStore<R> {
    path: PathBuf,
    records: DashMap<String, R>,
}

impl<R: CatalogRecord> CatalogStore<R> {
    /// Resolves the backing file under `dir` and loads it if present.
    ///
    /// A missing file yields an empty catalog. So does an unreadable or
    /// unparsable one: recovery is total-or-nothing, logged and non-fatal.
    pub fn open(dir: impl AsRef<Path>, file_name: &str) -> Self {
        let store = Self {
            path: dir.as_ref().join(file_name),
            records: DashMap::new(),
        };
        store.load();
        store
    }

    fn load(&self) {
        if !self.path.exists() {
            return;
        }
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(
                    "Starting empty: {}",
                    CatalogError::FileRead(self.path.clone(), e)
                );
                return;
            }
        };
        match serde_json::from_str::<BTreeMap<String, R>>(&contents) {
            Ok(loaded) => {
                self.records.clear();
                for (id, record) in loaded {
                    self.records.insert(id, record);
                }
                debug!(
                    "Loaded {} records from {}",
                    self.records.len(),
                    self.path.display()
                );
            }
            Err(e) => {
                warn!(
                    "Starting empty: {}",
                    CatalogError::Deserialize(self.path.clone(), e)
                );
            }
        }
    }

    /// Serializes the full catalog and replaces the backing file.
    pub fn save(&self) -> CatalogResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| CatalogError::DirectoryCreate(parent.to_path_buf(), e))?;
        }

        // Snapshot into an ordered map so the file is stable across saves.
        let snapshot: BTreeMap<String, R> = self
            .records
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| CatalogError::Serialize(self.path.clone(), e))?;

        let temp_path = self.path.with_extension("json.tmp");
        let mut file = File::create(&temp_path)
            .map_err(|e| CatalogError::FileWrite(temp_path.clone(), e))?;
        file.write_all(json.as_bytes())
            .map_err(|e| CatalogError::FileWrite(temp_path.clone(), e))?;
        file.sync_all()
            .map_err(|e| CatalogError::FileSync(temp_path.clone(), e))?;

        fs::rename(&temp_path, &self.path)
            .map_err(|e| CatalogError::FileRename(temp_path, self.path.clone(), e))?;

        debug!("Saved {} records to {}", snapshot.len(), self.path.display());
        Ok(())
    }

    /// Inserts or replaces a record and saves.
    pub fn insert(&self, record: R) -> CatalogResult<()> {
        self.records.insert(record.id().to_string(), record);
        self.save()
    }

    /// Applies `mutate` to the record and saves. Returns `false` when no such
    /// record exists.
    pub fn update<F>(&self, id: &str, mutate: F) -> CatalogResult<bool>
    where
        F: FnOnce(&mut R),
    {
        {
            let Some(mut entry) = self.records.get_mut(id) else {
                return Ok(false);
            };
            mutate(entry.value_mut());
        }
        self.save()?;
        Ok(true)
    }

    /// Removes a record and saves if anything was removed.
    pub fn remove(&self, id: &str) -> CatalogResult<Option<R>> {
        let removed = self.records.remove(id).map(|(_, record)| record);
        if removed.is_some() {
            self.save()?;
        }
        Ok(removed)
    }

    /// Drops every record and saves the empty state.
    pub fn clear(&self) -> CatalogResult<()> {
        self.records.clear();
        self.save()
    }

    pub fn get(&self, id: &str) -> Option<R> {
        self.records.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn all(&self) -> Vec<R> {
        self.records
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct LabelRecord {
        id: String,
        label: String,
        x: f64,
        y: f64,
        z: f64,
    }

    impl CatalogRecord for LabelRecord {
        fn id(&self) -> &str {
            &self.id
        }

        fn position(&self) -> Position {
            Position::new(self.x, self.y, self.z)
        }
    }

    fn record(id: &str, label: &str) -> LabelRecord {
        LabelRecord {
            id: id.to_string(),
            label: label.to_string(),
            x: 10.0,
            y: 64.0,
            z: 10.0,
        }
    }

    #[test]
    fn save_and_reload_round_trips() {
        let dir = tempdir().unwrap();
        let store: CatalogStore<LabelRecord> = CatalogStore::open(dir.path(), "labels.json");
        store.insert(record("abc123", "Welcome")).unwrap();
        store.insert(record("def456", "Goodbye")).unwrap();

        let reloaded: CatalogStore<LabelRecord> = CatalogStore::open(dir.path(), "labels.json");
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get("abc123").unwrap().label, "Welcome");
        assert_eq!(reloaded.get("def456").unwrap().label, "Goodbye");
    }

    #[test]
    fn missing_file_yields_empty_catalog() {
        let dir = tempdir().unwrap();
        let store: CatalogStore<LabelRecord> = CatalogStore::open(dir.path(), "labels.json");
        assert!(store.is_empty());
    }

    #[test]
    fn corrupt_file_yields_empty_catalog() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("labels.json"), "{not valid json").unwrap();

        let store: CatalogStore<LabelRecord> = CatalogStore::open(dir.path(), "labels.json");
        assert!(store.is_empty());
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("plugins").join("labels");
        let store: CatalogStore<LabelRecord> = CatalogStore::open(&nested, "labels.json");
        store.insert(record("abc123", "Welcome")).unwrap();
        assert!(nested.join("labels.json").exists());
    }

    #[test]
    fn save_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let store: CatalogStore<LabelRecord> = CatalogStore::open(dir.path(), "labels.json");
        store.insert(record("abc123", "Welcome")).unwrap();
        assert!(!dir.path().join("labels.json.tmp").exists());
    }

    #[test]
    fn remove_persists_the_deletion() {
        let dir = tempdir().unwrap();
        let store: CatalogStore<LabelRecord> = CatalogStore::open(dir.path(), "labels.json");
        store.insert(record("abc123", "Welcome")).unwrap();

        let removed = store.remove("abc123").unwrap();
        assert_eq!(removed.unwrap().label, "Welcome");
        assert!(store.remove("abc123").unwrap().is_none());

        let reloaded: CatalogStore<LabelRecord> = CatalogStore::open(dir.path(), "labels.json");
        assert!(reloaded.is_empty());
        // The file itself holds an empty object, not the old record.
        let contents = fs::read_to_string(reloaded.path()).unwrap();
        assert_eq!(contents.trim(), "{}");
    }

    #[test]
    fn update_mutates_and_persists() {
        let dir = tempdir().unwrap();
        let store: CatalogStore<LabelRecord> = CatalogStore::open(dir.path(), "labels.json");
        store.insert(record("abc123", "Welcome")).unwrap();

        let updated = store
            .update("abc123", |r| r.label = "Farewell".to_string())
            .unwrap();
        assert!(updated);
        assert!(!store.update("nope", |_| {}).unwrap());

        let reloaded: CatalogStore<LabelRecord> = CatalogStore::open(dir.path(), "labels.json");
        assert_eq!(reloaded.get("abc123").unwrap().label, "Farewell");
    }
}
