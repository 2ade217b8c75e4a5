//! rollcall-store — Persistence for the gallery of known identities.
//!
//! One JSON record per identity, keyed by name: `<dir>/<name>.json`.
//! The whole gallery is rebuilt from disk at startup; saves overwrite
//! whatever record exists for the same name (last-write-wins).

use rollcall_core::{Gallery, Identity};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const RECORD_EXTENSION: &str = "json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to create gallery directory {dir}: {source}")]
    CreateDir {
        dir: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read gallery directory {dir}: {source}")]
    ReadDir {
        dir: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write record {path}: {source}")]
    WriteRecord {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode record for {name}: {source}")]
    EncodeRecord {
        name: String,
        source: serde_json::Error,
    },
}

/// Directory-backed store of identity records.
pub struct GalleryStore {
    dir: PathBuf,
}

impl GalleryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Rebuild the in-memory gallery from every record on disk.
    ///
    /// Malformed or unreadable records are skipped with a diagnostic;
    /// only a missing or unreadable directory is an error. A missing
    /// directory is created so first runs start with an empty gallery.
    pub fn load(&self) -> Result<Gallery, StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::CreateDir {
            dir: self.dir.clone(),
            source: e,
        })?;

        let entries = fs::read_dir(&self.dir).map_err(|e| StoreError::ReadDir {
            dir: self.dir.clone(),
            source: e,
        })?;

        let mut gallery = Gallery::new();
        for entry in entries {
            let Ok(entry) = entry else { continue };
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }

            match read_record(&path) {
                Ok(identity) => gallery.insert(identity),
                Err(reason) => {
                    tracing::warn!(path = %path.display(), %reason, "skipping unreadable identity record");
                }
            }
        }

        tracing::info!(dir = %self.dir.display(), identities = gallery.len(), "gallery loaded");
        Ok(gallery)
    }

    /// Persist one identity, overwriting any record with the same name.
    pub fn save(&self, identity: &Identity) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::CreateDir {
            dir: self.dir.clone(),
            source: e,
        })?;

        let json =
            serde_json::to_string(identity).map_err(|e| StoreError::EncodeRecord {
                name: identity.name.clone(),
                source: e,
            })?;

        let path = self.record_path(&identity.name);
        fs::write(&path, json).map_err(|e| StoreError::WriteRecord {
            path: path.clone(),
            source: e,
        })?;

        tracing::info!(name = %identity.name, path = %path.display(), "identity record saved");
        Ok(())
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{RECORD_EXTENSION}"))
    }
}

fn read_record(path: &Path) -> Result<Identity, String> {
    let raw = fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_json::from_str(&raw).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::Embedding;

    fn identity(name: &str, values: Vec<f32>) -> Identity {
        Identity {
            embedding: Embedding::new(values),
            name: name.to_string(),
            roll_number: "42".to_string(),
            section: "CS-A".to_string(),
        }
    }

    #[test]
    fn test_load_missing_dir_creates_empty_gallery() {
        let dir = tempfile::tempdir().unwrap();
        let store = GalleryStore::new(dir.path().join("faces"));
        let gallery = store.load().unwrap();
        assert!(gallery.is_empty());
        assert!(store.dir().is_dir());
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = GalleryStore::new(dir.path());

        store.save(&identity("alice", vec![0.1, 0.2])).unwrap();
        let gallery = store.load().unwrap();

        assert_eq!(gallery.len(), 1);
        let loaded = gallery.get("alice").unwrap();
        assert_eq!(loaded.roll_number, "42");
        assert_eq!(loaded.section, "CS-A");
        assert_eq!(loaded.embedding.values, vec![0.1, 0.2]);
    }

    #[test]
    fn test_reload_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = GalleryStore::new(dir.path());
        store.save(&identity("alice", vec![1.0])).unwrap();
        store.save(&identity("bob", vec![2.0])).unwrap();

        let first = store.load().unwrap();
        let second = store.load().unwrap();

        assert_eq!(first.len(), second.len());
        for identity in first.iter() {
            let other = second.get(&identity.name).unwrap();
            assert_eq!(identity.embedding, other.embedding);
            assert_eq!(identity.roll_number, other.roll_number);
            assert_eq!(identity.section, other.section);
        }
    }

    #[test]
    fn test_malformed_record_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = GalleryStore::new(dir.path());
        store.save(&identity("alice", vec![1.0])).unwrap();
        fs::write(dir.path().join("broken.json"), "{not json").unwrap();

        let gallery = store.load().unwrap();
        assert_eq!(gallery.len(), 1);
        assert!(gallery.get("alice").is_some());
    }

    #[test]
    fn test_non_record_files_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = GalleryStore::new(dir.path());
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();

        let gallery = store.load().unwrap();
        assert!(gallery.is_empty());
    }

    #[test]
    fn test_resave_overwrites_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = GalleryStore::new(dir.path());

        store.save(&identity("alice", vec![1.0])).unwrap();
        store.save(&identity("alice", vec![9.0])).unwrap();

        let gallery = store.load().unwrap();
        assert_eq!(gallery.len(), 1);
        assert_eq!(gallery.get("alice").unwrap().embedding.values, vec![9.0]);

        // Exactly one record file on disk.
        let records = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("json"))
            .count();
        assert_eq!(records, 1);
    }

    #[test]
    fn test_record_format_matches_legacy_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = GalleryStore::new(dir.path());
        store.save(&identity("alice", vec![0.5])).unwrap();

        let raw = fs::read_to_string(dir.path().join("alice.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["encoding"], serde_json::json!([0.5]));
        assert_eq!(value["name"], "alice");
        assert_eq!(value["roll_number"], "42");
        assert_eq!(value["section"], "CS-A");
    }
}
