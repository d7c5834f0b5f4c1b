//! The local model store: a versioned, file-backed, multi-collection
//! persistence layer.
//!
//! Layout on disk:
//!
//! ```text
//! <root>/
//!   manifest.json   both collections, schema-versioned
//!   .lock           fs2 advisory lock guarding every operation
//!   blobs/          one GLB file per write, referenced by manifest entries
//! ```
//!
//! The `models` collection holds at most the single current-slot record
//! (fixed id `customModel`); `uploaded_models` is the append-only history,
//! one record per completed conversion. A conversion's current-slot write
//! and history append commit together in one manifest rename, so readers
//! observe both or neither. Blob files are never overwritten once a
//! manifest references them; every write lands under a fresh filename and
//! becomes visible only through the manifest commit, so a failed commit
//! leaves the previous state fully intact. Blobs left unreferenced by a
//! commit are deleted afterwards.

use crate::error::{BridgeError, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Fixed identifier of the current-slot record.
pub const CURRENT_SLOT_ID: &str = "customModel";

/// Manifest schema version. Version 1 predates the history collection.
const SCHEMA_VERSION: u32 = 2;

const MANIFEST_FILE: &str = "manifest.json";
const LOCK_FILE: &str = ".lock";
const BLOBS_DIR: &str = "blobs";

/// A persisted model record.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredModelRecord {
    pub id: String,
    pub name: String,
    pub blob: Vec<u8>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ManifestEntry {
    name: String,
    timestamp: u64,
    blob_file: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    version: u32,
    /// Current-slot collection; holds at most the `customModel` record.
    #[serde(default)]
    models: BTreeMap<String, ManifestEntry>,
    /// Append-only history, keyed `model_<millisecond timestamp>`.
    #[serde(default)]
    uploaded_models: BTreeMap<String, ManifestEntry>,
}

/// Handle to an open store.
#[derive(Debug)]
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    /// Open the store at `root`, creating and initializing it on first use.
    ///
    /// Idempotent and safe to call concurrently from multiple processes:
    /// schema creation and version upgrades run under the exclusive lock.
    /// Environments where the root cannot be created or locked map to
    /// [`BridgeError::StoreUnavailable`].
    pub fn open_or_init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(BLOBS_DIR)).map_err(|e| unavailable(&root, e))?;

        let store = Self { root };
        let _lock = store.lock_exclusive()?;

        let mut manifest = store.read_manifest();
        if manifest.version < SCHEMA_VERSION {
            // serde defaults already materialize collections a v1 manifest
            // lacks; persisting the bump makes the upgrade one-time.
            manifest.version = SCHEMA_VERSION;
            store.commit_manifest(&manifest)?;
        }

        Ok(store)
    }

    /// Store a completed conversion: overwrite the current slot and append
    /// a history record, atomically. Returns the fresh history identifier.
    pub fn store_conversion(&self, name: &str, blob: &[u8]) -> Result<String> {
        let _lock = self.lock_exclusive()?;
        let mut manifest = self.read_manifest();

        let mut timestamp = now_ms();
        // History is append-only by identity; two conversions landing in
        // the same millisecond must not collide.
        while manifest
            .uploaded_models
            .contains_key(&history_id(timestamp))
        {
            timestamp += 1;
        }
        let id = history_id(timestamp);
        let file = blob_file(&id);

        // Both collections reference the same fresh blob file; the slot
        // switches to it only through the manifest commit below.
        self.write_blob(&file, blob)?;

        let superseded = current_blob_of(&manifest);
        manifest.models.insert(
            CURRENT_SLOT_ID.to_string(),
            ManifestEntry {
                name: name.to_string(),
                timestamp,
                blob_file: file.clone(),
            },
        );
        manifest.uploaded_models.insert(
            id.clone(),
            ManifestEntry {
                name: name.to_string(),
                timestamp,
                blob_file: file,
            },
        );
        self.commit_manifest(&manifest)?;
        self.remove_unreferenced(&manifest, superseded);

        Ok(id)
    }

    /// Overwrite the current slot only.
    pub fn put_current(&self, name: &str, blob: &[u8]) -> Result<()> {
        let _lock = self.lock_exclusive()?;
        let mut manifest = self.read_manifest();

        let mut timestamp = now_ms();
        let blobs = self.root.join(BLOBS_DIR);
        while blobs.join(current_blob_file(timestamp)).exists() {
            timestamp += 1;
        }
        let file = current_blob_file(timestamp);

        self.write_blob(&file, blob)?;
        let superseded = current_blob_of(&manifest);
        manifest.models.insert(
            CURRENT_SLOT_ID.to_string(),
            ManifestEntry {
                name: name.to_string(),
                timestamp,
                blob_file: file,
            },
        );
        self.commit_manifest(&manifest)?;
        self.remove_unreferenced(&manifest, superseded);
        Ok(())
    }

    /// Append a history record under an explicit identifier.
    pub fn append_history(&self, id: &str, name: &str, blob: &[u8]) -> Result<()> {
        let _lock = self.lock_exclusive()?;
        let mut manifest = self.read_manifest();

        self.write_blob(&blob_file(id), blob)?;
        manifest.uploaded_models.insert(
            id.to_string(),
            ManifestEntry {
                name: name.to_string(),
                timestamp: now_ms(),
                blob_file: blob_file(id),
            },
        );
        self.commit_manifest(&manifest)
    }

    /// The current-slot record, if one has ever been stored.
    pub fn get_current(&self) -> Result<Option<StoredModelRecord>> {
        let _lock = self.lock_shared()?;
        let manifest = self.read_manifest();
        self.load_record(&manifest.models, CURRENT_SLOT_ID)
    }

    /// A history record by identifier.
    pub fn get_by_id(&self, id: &str) -> Result<Option<StoredModelRecord>> {
        let _lock = self.lock_shared()?;
        let manifest = self.read_manifest();
        self.load_record(&manifest.uploaded_models, id)
    }

    /// All history records, in no guaranteed order. Callers sort by
    /// timestamp descending for most-recent-first presentation.
    pub fn list_history(&self) -> Result<Vec<StoredModelRecord>> {
        let _lock = self.lock_shared()?;
        let manifest = self.read_manifest();

        let mut records = Vec::new();
        for id in manifest.uploaded_models.keys() {
            if let Some(record) = self.load_record(&manifest.uploaded_models, id)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Promote a history record into the current slot with a fresh
    /// timestamp, as one transaction. The slot re-references the history
    /// record's blob file; no bytes are copied, so the switch is exactly
    /// the manifest commit. Returns `false` when the identifier is unknown.
    pub fn promote_to_current(&self, id: &str) -> Result<bool> {
        let _lock = self.lock_exclusive()?;
        let mut manifest = self.read_manifest();

        let Some(entry) = manifest.uploaded_models.get(id).cloned() else {
            return Ok(false);
        };
        if !self.root.join(BLOBS_DIR).join(&entry.blob_file).exists() {
            log::warn!("History blob for {} is missing", id);
            return Ok(false);
        }

        let superseded = current_blob_of(&manifest);
        manifest.models.insert(
            CURRENT_SLOT_ID.to_string(),
            ManifestEntry {
                name: entry.name,
                timestamp: now_ms(),
                blob_file: entry.blob_file,
            },
        );
        self.commit_manifest(&manifest)?;
        self.remove_unreferenced(&manifest, superseded);
        Ok(true)
    }

    fn load_record(
        &self,
        collection: &BTreeMap<String, ManifestEntry>,
        id: &str,
    ) -> Result<Option<StoredModelRecord>> {
        let Some(entry) = collection.get(id) else {
            return Ok(None);
        };
        match fs::read(self.root.join(BLOBS_DIR).join(&entry.blob_file)) {
            Ok(blob) => Ok(Some(StoredModelRecord {
                id: id.to_string(),
                name: entry.name.clone(),
                blob,
                timestamp: entry.timestamp,
            })),
            Err(e) => {
                // A record without its blob is as good as absent.
                log::warn!("Blob for record {} is unreadable: {}", id, e);
                Ok(None)
            }
        }
    }

    /// Read the manifest, treating a missing or corrupt file as empty so
    /// reads degrade to not-found rather than failing the caller.
    fn read_manifest(&self) -> Manifest {
        let path = self.root.join(MANIFEST_FILE);
        match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(manifest) => manifest,
                Err(e) => {
                    log::warn!("Store manifest is corrupt, starting empty: {}", e);
                    Manifest::default()
                }
            },
            Err(_) => Manifest::default(),
        }
    }

    /// Persist the manifest atomically: write a temp file, then rename over
    /// the live one. Readers see the old or the new manifest, never a mix.
    fn commit_manifest(&self, manifest: &Manifest) -> Result<()> {
        let tmp = self.root.join(format!("{}.tmp", MANIFEST_FILE));
        fs::write(&tmp, serde_json::to_vec_pretty(manifest)?)?;
        fs::rename(&tmp, self.root.join(MANIFEST_FILE))?;
        Ok(())
    }

    /// Delete a blob file left unreferenced by a committed manifest.
    /// Removal failure is ignored; an orphan blob has no manifest entry
    /// and can never be read back.
    fn remove_unreferenced(&self, manifest: &Manifest, blob_file: Option<String>) {
        let Some(file) = blob_file else { return };
        let referenced = manifest
            .models
            .values()
            .chain(manifest.uploaded_models.values())
            .any(|entry| entry.blob_file == file);
        if !referenced {
            let _ = fs::remove_file(self.root.join(BLOBS_DIR).join(&file));
        }
    }

    fn write_blob(&self, file_name: &str, blob: &[u8]) -> Result<()> {
        let dir = self.root.join(BLOBS_DIR);
        let tmp = dir.join(format!(".tmp-{}", file_name));
        fs::write(&tmp, blob)?;
        fs::rename(&tmp, dir.join(file_name))?;
        Ok(())
    }

    fn lock_exclusive(&self) -> Result<File> {
        let file = self.open_lock_file()?;
        file.lock_exclusive()
            .map_err(|e| unavailable(&self.root, e))?;
        Ok(file)
    }

    fn lock_shared(&self) -> Result<File> {
        let file = self.open_lock_file()?;
        file.lock_shared()
            .map_err(|e| unavailable(&self.root, e))?;
        Ok(file)
    }

    fn open_lock_file(&self) -> Result<File> {
        OpenOptions::new()
            .create(true)
            .write(true)
            .open(self.root.join(LOCK_FILE))
            .map_err(|e| unavailable(&self.root, e))
    }
}

fn unavailable(root: &Path, e: std::io::Error) -> BridgeError {
    BridgeError::StoreUnavailable(format!("{}: {}", root.display(), e))
}

fn current_blob_of(manifest: &Manifest) -> Option<String> {
    manifest
        .models
        .get(CURRENT_SLOT_ID)
        .map(|entry| entry.blob_file.clone())
}

fn history_id(timestamp: u64) -> String {
    format!("model_{}", timestamp)
}

fn blob_file(id: &str) -> String {
    format!("{}.glb", id)
}

fn current_blob_file(timestamp: u64) -> String {
    format!("{}_{}.glb", CURRENT_SLOT_ID, timestamp)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_or_init_is_idempotent() {
        let dir = tempdir().unwrap();
        let _first = ModelStore::open_or_init(dir.path()).unwrap();
        let second = ModelStore::open_or_init(dir.path()).unwrap();

        assert!(second.get_current().unwrap().is_none());
        assert!(second.list_history().unwrap().is_empty());
    }

    #[test]
    fn test_store_conversion_writes_both_collections() {
        let dir = tempdir().unwrap();
        let store = ModelStore::open_or_init(dir.path()).unwrap();

        let id = store.store_conversion("Fox", b"glb-bytes").unwrap();
        assert!(id.starts_with("model_"));

        let current = store.get_current().unwrap().unwrap();
        assert_eq!(current.name, "Fox");
        assert_eq!(current.blob, b"glb-bytes");

        let history = store.list_history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, id);
        assert_eq!(history[0].blob, b"glb-bytes");
    }

    #[test]
    fn test_current_slot_is_overwritten_history_appends() {
        let dir = tempdir().unwrap();
        let store = ModelStore::open_or_init(dir.path()).unwrap();

        let first = store.store_conversion("A", b"aaa").unwrap();
        let second = store.store_conversion("B", b"bbb").unwrap();
        assert_ne!(first, second);

        let current = store.get_current().unwrap().unwrap();
        assert_eq!(current.name, "B");

        let mut history = store.list_history().unwrap();
        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].name, "B");
        assert_eq!(history[1].name, "A");
        // Both blobs survive independently of the current slot.
        assert_eq!(store.get_by_id(&first).unwrap().unwrap().blob, b"aaa");
    }

    #[test]
    fn test_get_by_id_missing_is_none() {
        let dir = tempdir().unwrap();
        let store = ModelStore::open_or_init(dir.path()).unwrap();
        assert!(store.get_by_id("model_404").unwrap().is_none());
    }

    #[test]
    fn test_promote_to_current() {
        let dir = tempdir().unwrap();
        let store = ModelStore::open_or_init(dir.path()).unwrap();

        let id = store.store_conversion("Old", b"old-bytes").unwrap();
        store.store_conversion("New", b"new-bytes").unwrap();
        let before = store.get_current().unwrap().unwrap();
        assert_eq!(before.name, "New");

        assert!(store.promote_to_current(&id).unwrap());
        let current = store.get_current().unwrap().unwrap();
        assert_eq!(current.name, "Old");
        assert_eq!(current.blob, b"old-bytes");
        assert!(current.timestamp >= before.timestamp);

        assert!(!store.promote_to_current("model_404").unwrap());
    }

    #[test]
    fn test_failed_commit_leaves_previous_conversion_intact() {
        let dir = tempdir().unwrap();
        let store = ModelStore::open_or_init(dir.path()).unwrap();
        store.store_conversion("A", b"aaa").unwrap();

        // Occupy the manifest temp path so the next commit cannot land.
        fs::create_dir(dir.path().join("manifest.json.tmp")).unwrap();
        assert!(store.store_conversion("B", b"bbb").is_err());

        // Both collections still reflect the first conversion, bytes
        // included; nothing is half-applied.
        let current = store.get_current().unwrap().unwrap();
        assert_eq!(current.name, "A");
        assert_eq!(current.blob, b"aaa");
        assert_eq!(store.list_history().unwrap().len(), 1);

        fs::remove_dir(dir.path().join("manifest.json.tmp")).unwrap();
        let id = store.store_conversion("B", b"bbb").unwrap();
        assert_eq!(store.get_current().unwrap().unwrap().blob, b"bbb");
        assert_eq!(store.get_by_id(&id).unwrap().unwrap().blob, b"bbb");
    }

    #[test]
    fn test_superseded_current_blob_is_cleaned_up() {
        let dir = tempdir().unwrap();
        let store = ModelStore::open_or_init(dir.path()).unwrap();

        store.put_current("First", b"one").unwrap();
        store.put_current("Second", b"two").unwrap();

        assert_eq!(store.get_current().unwrap().unwrap().blob, b"two");
        // The first slot-only blob has no remaining reference.
        let blobs: Vec<_> = fs::read_dir(dir.path().join(BLOBS_DIR))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(blobs.len(), 1);
        assert!(blobs[0].starts_with(CURRENT_SLOT_ID));
    }

    #[test]
    fn test_v1_manifest_is_upgraded() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(BLOBS_DIR)).unwrap();
        fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"{"version":1,"models":{}}"#,
        )
        .unwrap();

        let store = ModelStore::open_or_init(dir.path()).unwrap();
        assert!(store.list_history().unwrap().is_empty());

        let manifest: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap())
                .unwrap();
        assert_eq!(manifest["version"], 2);
    }

    #[test]
    fn test_unavailable_root_is_store_unavailable() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("not_a_dir");
        fs::write(&file_path, b"occupied").unwrap();

        // The root path is an existing file; the store cannot initialize.
        let err = ModelStore::open_or_init(&file_path).unwrap_err();
        assert!(matches!(err, BridgeError::StoreUnavailable(_)));
    }

    #[test]
    fn test_put_current_and_append_history_separately() {
        let dir = tempdir().unwrap();
        let store = ModelStore::open_or_init(dir.path()).unwrap();

        store.put_current("Solo", b"solo").unwrap();
        assert!(store.list_history().unwrap().is_empty());

        store.append_history("model_1000", "Solo", b"solo").unwrap();
        let record = store.get_by_id("model_1000").unwrap().unwrap();
        assert_eq!(record.name, "Solo");
    }
}
