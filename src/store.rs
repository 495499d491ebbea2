//! Snapshot persistence
//!
//! One JSON file per avatar identity under the saves folder. Writes are
//! temp-then-rename so a crash never leaves a truncated file visible, and
//! read/write for the same key are serialized behind a per-key lock.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::osc::ParamValue;

/// One named parameter and its captured value
///
/// `name` is namespace-free; the transmission prefix is joined only when a
/// datagram is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRecord {
    pub name: String,
    pub value: ParamValue,
}

/// A captured parameter set for one avatar identity
///
/// The identity itself is the storage key, not part of the file content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Optional human-readable label; listings fall back to the storage key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Parameters in remote discovery order
    pub parameters: Vec<ParameterRecord>,
}

impl Snapshot {
    /// Label shown to the operator
    pub fn display_name(&self, key: &str) -> String {
        self.name.clone().unwrap_or_else(|| key.to_string())
    }
}

/// Stored file content: the canonical wrapped object, or the legacy bare
/// parameter array written by earlier versions
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredSnapshot {
    Canonical(Snapshot),
    Legacy(Vec<ParameterRecord>),
}

/// Filesystem-backed snapshot storage
///
/// Owns exclusive access to its directory; keys are sanitized avatar
/// identities and map one-to-one onto files.
pub struct SnapshotStore {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SnapshotStore {
    /// Open (creating if needed) a store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| Error::Storage(format!("create {}: {e}", dir.display())))?;
        Ok(Self {
            dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Filename-safe form of a storage key
    ///
    /// Identities are opaque strings; anything outside a conservative
    /// filename alphabet is replaced so keys can never escape the folder.
    pub fn storage_key(key: &str) -> Result<String> {
        let cleaned: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
            return Err(Error::Storage(format!("invalid snapshot key {key:?}")));
        }
        Ok(cleaned)
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        Ok(self.dir.join(format!("{}.json", Self::storage_key(key)?)))
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("key lock table poisoned");
        locks.entry(key.to_string()).or_default().clone()
    }

    /// Atomic replace: write a sibling temp file, then rename over the target
    fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp)
            .map_err(|e| Error::Storage(format!("create {}: {e}", tmp.display())))?;
        file.write_all(bytes)
            .map_err(|e| Error::Storage(format!("write {}: {e}", tmp.display())))?;
        file.sync_all()
            .map_err(|e| Error::Storage(format!("sync {}: {e}", tmp.display())))?;
        fs::rename(&tmp, path)
            .map_err(|e| Error::Storage(format!("rename to {}: {e}", path.display())))?;
        Ok(())
    }

    /// Serialize and store a snapshot, overwriting any existing entry
    pub fn write(&self, key: &str, snapshot: &Snapshot) -> Result<()> {
        let path = self.path_for(key)?;
        let bytes = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| Error::Storage(format!("serialize {key}: {e}")))?;

        let lock = self.key_lock(key);
        let _guard = lock.lock().expect("key lock poisoned");
        Self::write_atomic(&path, &bytes)
    }

    /// Read a stored snapshot back into memory
    pub fn read(&self, key: &str) -> Result<Snapshot> {
        let path = self.path_for(key)?;

        let lock = self.key_lock(key);
        let _guard = lock.lock().expect("key lock poisoned");
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(key.to_string()));
            }
            Err(e) => return Err(Error::Storage(format!("read {}: {e}", path.display()))),
        };

        match serde_json::from_slice::<StoredSnapshot>(&bytes) {
            Ok(StoredSnapshot::Canonical(snapshot)) => Ok(snapshot),
            Ok(StoredSnapshot::Legacy(parameters)) => Ok(Snapshot {
                name: None,
                parameters,
            }),
            Err(e) => Err(Error::Corrupt(format!("{key}: {e}"))),
        }
    }

    /// Enumerate stored snapshots as (key, display name) pairs
    ///
    /// Entries that fail to parse are skipped with a warning; one corrupt
    /// file must not hide the others. Keys come back in name order.
    pub fn list(&self) -> Result<Vec<(String, String)>> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| Error::Storage(format!("read {}: {e}", self.dir.display())))?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::Storage(format!("list: {e}")))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();

        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            match self.read(&key) {
                Ok(snapshot) => out.push((key.clone(), snapshot.display_name(&key))),
                Err(e) => warn!("skipping unreadable snapshot {key}: {e}"),
            }
        }
        Ok(out)
    }

    /// Duplicate stored content verbatim from one key to another
    ///
    /// Raw bytes are copied without a re-serialization round-trip, so any
    /// extra fields in the source survive. Copying a key onto itself leaves
    /// the file untouched.
    pub fn copy(&self, from: &str, to: &str) -> Result<()> {
        let src = self.path_for(from)?;
        let dst = self.path_for(to)?;
        if src == dst {
            if !src.exists() {
                return Err(Error::NotFound(from.to_string()));
            }
            return Ok(());
        }

        // Lock both keys in a stable order so concurrent copies cannot deadlock
        let (first, second) = {
            let a = Self::storage_key(from)?;
            let b = Self::storage_key(to)?;
            if a <= b {
                (self.key_lock(from), self.key_lock(to))
            } else {
                (self.key_lock(to), self.key_lock(from))
            }
        };
        let _g1 = first.lock().expect("key lock poisoned");
        let _g2 = second.lock().expect("key lock poisoned");

        let bytes = match fs::read(&src) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(from.to_string()));
            }
            Err(e) => return Err(Error::Storage(format!("read {}: {e}", src.display()))),
        };
        Self::write_atomic(&dst, &bytes)
    }

    /// Remove a stored snapshot
    pub fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;

        let lock = self.key_lock(key);
        let _guard = lock.lock().expect("key lock poisoned");
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(key.to_string()))
            }
            Err(e) => Err(Error::Storage(format!("delete {}: {e}", path.display()))),
        }
    }
}
