//! Durable CSV snapshot storage.
//!
//! Each successful poll cycle persists one flat record as a CSV file under
//! the storage directory, named with a nanosecond UTC timestamp so two
//! cycles never collide. The store is also the backend for the HTTP
//! list/download/delete operations.

use crate::encoder::FlatRecord;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write snapshot '{id}': {source}")]
    Write {
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to list storage directory '{dir}': {source}")]
    List {
        dir: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to delete snapshot '{id}': {source}")]
    Delete {
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// File-backed store of flattened weather snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
    file_prefix: String,
}

impl SnapshotStore {
    /// Create a store rooted at `dir`, creating the directory if absent.
    pub fn open(dir: impl Into<PathBuf>, file_prefix: &str) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Write {
            id: dir.display().to_string(),
            source,
        })?;
        Ok(Self {
            dir,
            file_prefix: file_prefix.to_string(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a record under a fresh time-derived identifier.
    ///
    /// The identifier embeds a nanosecond-resolution UTC timestamp, so
    /// successive cycles are guaranteed distinct names.
    pub fn persist(&self, record: &FlatRecord) -> Result<String> {
        let id = format!(
            "{}_{}.csv",
            self.file_prefix,
            Utc::now().format("%Y%m%dT%H%M%S%.9fZ")
        );
        let path = self.dir.join(&id);
        fs::write(&path, record.to_csv()).map_err(|source| StoreError::Write {
            id: id.clone(),
            source,
        })?;
        log::info!("persisted snapshot {}", id);
        Ok(id)
    }

    /// Enumerate stored identifiers, sorted by name (and thus by time).
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.dir).map_err(|source| StoreError::List {
            dir: self.dir.display().to_string(),
            source,
        })?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::List {
                dir: self.dir.display().to_string(),
                source,
            })?;
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                ids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Read back a stored record's bytes.
    ///
    /// A file deleted between `list` and `read` surfaces as `NotFound`,
    /// never a panic.
    pub fn read(&self, id: &str) -> Result<Vec<u8>> {
        let path = self.resolve(id)?;
        fs::read(&path).map_err(|_| StoreError::NotFound(id.to_string()))
    }

    /// Delete a stored record. Deleting an absent record is a success.
    pub fn delete(&self, id: &str) -> Result<()> {
        let path = self.resolve(id)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                log::info!("deleted snapshot {}", id);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Delete {
                id: id.to_string(),
                source,
            }),
        }
    }

    /// Map an identifier to its path, rejecting anything that is not a
    /// plain file name. Identifiers come straight from HTTP query params,
    /// so path separators and `..` must not escape the storage root.
    fn resolve(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(self.dir.join(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{encode, WeatherSnapshot};
    use serde_json::json;
    use tempfile::tempdir;

    fn test_record() -> FlatRecord {
        let value = json!({
            "latitude": 50.93,
            "hourly": { "rain": [0.0, 0.2], "time": ["00:00", "01:00"] }
        });
        encode(&WeatherSnapshot::from_json(&value).unwrap())
    }

    #[test]
    fn open_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("nested").join("csv");
        SnapshotStore::open(&root, "weather").unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn persist_then_read_is_lossless() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::open(dir.path(), "weather").unwrap();
        let record = test_record();

        let id = store.persist(&record).unwrap();
        assert!(id.starts_with("weather_"));
        assert!(id.ends_with(".csv"));

        let bytes = store.read(&id).unwrap();
        assert_eq!(bytes, record.to_csv().into_bytes());
    }

    #[test]
    fn successive_persists_never_collide() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::open(dir.path(), "weather").unwrap();
        let record = test_record();

        let a = store.persist(&record).unwrap();
        let b = store.persist(&record).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::open(dir.path(), "weather").unwrap();
        let id = store.persist(&test_record()).unwrap();

        store.delete(&id).unwrap();
        store.delete(&id).unwrap();
        store.delete("never_existed.csv").unwrap();
    }

    #[test]
    fn list_excludes_deleted_records() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::open(dir.path(), "weather").unwrap();
        let keep = store.persist(&test_record()).unwrap();
        let gone = store.persist(&test_record()).unwrap();

        store.delete(&gone).unwrap();
        let ids = store.list().unwrap();
        assert!(ids.contains(&keep));
        assert!(!ids.contains(&gone));
    }

    #[test]
    fn read_missing_record_is_not_found() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::open(dir.path(), "weather").unwrap();
        assert!(matches!(
            store.read("absent.csv"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn failed_delete_reports_delete_error() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::open(dir.path(), "weather").unwrap();

        // remove_file on a directory fails with something other than
        // NotFound, which must surface as a Delete error.
        fs::create_dir(dir.path().join("weather_dir.csv")).unwrap();
        let err = store.delete("weather_dir.csv").unwrap_err();

        assert!(matches!(err, StoreError::Delete { .. }));
        assert!(err.to_string().contains("failed to delete snapshot"));
    }

    #[test]
    fn path_traversal_identifiers_rejected() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::open(dir.path(), "weather").unwrap();
        for id in ["../etc/passwd", "a/b.csv", "..", ""] {
            assert!(matches!(store.read(id), Err(StoreError::NotFound(_))));
        }
    }
}
