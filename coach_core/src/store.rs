//! Snapshot store with file locking.
//!
//! Persists the per-exercise snapshot map keyed by canonical exercise name.
//! Writes are upserts: a recomputed snapshot replaces the stored one
//! wholesale, never merges into it. Loads fall back to an empty store on
//! missing or corrupt files, since snapshots are a derived cache that can
//! always be recomputed from the journal.

use crate::{progression::normalize, Error, ProgressionSnapshot, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// On-disk snapshot table for one user
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct SnapshotStore {
    pub snapshots: HashMap<String, ProgressionSnapshot>,
}

impl SnapshotStore {
    /// Look up a snapshot by exercise name.
    ///
    /// The name is canonicalized here so lookups by raw user input hit the
    /// same key the write side produced.
    pub fn get(&self, name: &str) -> Option<&ProgressionSnapshot> {
        self.snapshots.get(&normalize(name))
    }

    /// Replace stored snapshots with freshly recomputed ones.
    ///
    /// Overwrite semantics per key; snapshots arriving here already carry
    /// canonical names, but the key is normalized again so the invariant
    /// cannot drift.
    pub fn upsert(&mut self, snapshots: Vec<ProgressionSnapshot>) {
        for snapshot in snapshots {
            self.snapshots
                .insert(normalize(&snapshot.exercise_name), snapshot);
        }
    }

    /// Load the store from a file with shared locking
    ///
    /// Returns an empty store if the file doesn't exist. If the file is
    /// corrupted, logs a warning and returns an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No snapshot store found, starting empty");
            return Ok(Self::default());
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(
                    "Unable to open snapshot store {:?}: {}. Starting empty.",
                    path,
                    e
                );
                return Ok(Self::default());
            }
        };

        if let Err(e) = file.lock_shared() {
            tracing::warn!(
                "Unable to lock snapshot store {:?}: {}. Starting empty.",
                path,
                e
            );
            return Ok(Self::default());
        }

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        if let Err(e) = reader.read_to_string(&mut contents) {
            let _ = file.unlock();
            tracing::warn!(
                "Failed to read snapshot store {:?}: {}. Starting empty.",
                path,
                e
            );
            return Ok(Self::default());
        }

        file.unlock()?;

        match serde_json::from_str::<SnapshotStore>(&contents) {
            Ok(store) => {
                tracing::debug!("Loaded {} snapshots from {:?}", store.snapshots.len(), path);
                Ok(store)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to parse snapshot store {:?}: {}. Starting empty.",
                    path,
                    e
                );
                Ok(Self::default())
            }
        }
    }

    /// Save the store to a file with exclusive locking
    ///
    /// Atomically writes by:
    /// 1. Writing to a temp file in the same directory
    /// 2. Syncing to disk
    /// 3. Renaming over the original
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp = NamedTempFile::new_in(path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "store path missing parent")
        })?)?;

        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(self)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved {} snapshots to {:?}", self.snapshots.len(), path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(name: &str, e1rm: f64) -> ProgressionSnapshot {
        ProgressionSnapshot {
            exercise_name: name.into(),
            e1rm: Some(e1rm),
            total_volume: 3000.0,
            trend_score: 0.01,
            last_performed_date: "2026-07-15".parse().unwrap(),
            sample_size: 4,
        }
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store_path = temp_dir.path().join("snapshots.json");

        let mut store = SnapshotStore::default();
        store.upsert(vec![snapshot("back squat", 140.0)]);
        store.save(&store_path).unwrap();

        let loaded = SnapshotStore::load(&store_path).unwrap();
        assert_eq!(loaded.snapshots.len(), 1);
        assert_eq!(loaded.get("back squat").unwrap().e1rm, Some(140.0));
    }

    #[test]
    fn test_lookup_normalizes_name() {
        let mut store = SnapshotStore::default();
        store.upsert(vec![snapshot("back squat", 140.0)]);

        assert!(store.get("Back Squat").is_some());
        assert!(store.get("  BACK  SQUAT  ").is_some());
        assert!(store.get("front squat").is_none());
    }

    #[test]
    fn test_upsert_replaces_not_merges() {
        let mut store = SnapshotStore::default();
        store.upsert(vec![snapshot("deadlift", 180.0)]);

        let mut fresh = snapshot("deadlift", 175.0);
        fresh.sample_size = 9;
        store.upsert(vec![fresh]);

        let stored = store.get("deadlift").unwrap();
        assert_eq!(stored.e1rm, Some(175.0));
        assert_eq!(stored.sample_size, 9);
        assert_eq!(store.snapshots.len(), 1);
    }

    #[test]
    fn test_load_missing_returns_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store_path = temp_dir.path().join("nonexistent.json");

        let store = SnapshotStore::load(&store_path).unwrap();
        assert!(store.snapshots.is_empty());
    }

    #[test]
    fn test_corrupted_store_returns_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store_path = temp_dir.path().join("corrupted.json");

        std::fs::write(&store_path, "{ invalid json }").unwrap();

        let store = SnapshotStore::load(&store_path).unwrap();
        assert!(store.snapshots.is_empty());
    }

    #[test]
    fn test_atomic_save_leaves_no_stray_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store_path = temp_dir.path().join("snapshots.json");

        SnapshotStore::default().save(&store_path).unwrap();

        assert!(store_path.exists());
        let extras: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != "snapshots.json")
            .collect();
        assert!(
            extras.is_empty(),
            "Expected only snapshots.json, found extras: {:?}",
            extras
        );
    }
}
