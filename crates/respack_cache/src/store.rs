//! Directory-backed artifact store.
//!
//! Each entry lives at `<root>/<hh>/<key>.rpc`, where `<hh>` is the first two
//! hex digits of the key. An entry file is a little-endian `u32` header length,
//! a bincode [`EntryHeader`], and the bincode-encoded artifact set. Entries
//! that fail any header check read as misses and are dropped.

use std::path::{Path, PathBuf};

use respack_common::Digest;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::artifact::ArtifactSet;
use crate::client::CacheBackend;
use crate::error::CacheError;
use crate::key::CacheKey;
use crate::manifest::StoreManifest;

/// Magic bytes identifying a store entry.
const ENTRY_MAGIC: [u8; 4] = *b"RPAC";

/// Entry layout version. Increment on breaking changes.
const ENTRY_FORMAT_VERSION: u32 = 1;

const ENTRY_EXT: &str = "rpc";

/// Header written before every entry payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryHeader {
    /// Must be `b"RPAC"`.
    pub magic: [u8; 4],
    /// Entry layout version.
    pub format_version: u32,
    /// Digest of the payload bytes.
    pub checksum: Digest,
}

/// A content store rooted at a directory.
#[derive(Debug)]
pub struct LocalStore {
    root: PathBuf,
    manifest: StoreManifest,
    limit: Option<u64>,
}

impl LocalStore {
    /// Opens or creates a store at `root`.
    pub fn open(root: &Path) -> Result<Self, CacheError> {
        std::fs::create_dir_all(root).map_err(|e| CacheError::Io {
            path: root.to_path_buf(),
            source: e,
        })?;
        let manifest = StoreManifest::load(root).unwrap_or_default();
        Ok(Self {
            root: root.to_path_buf(),
            manifest,
            limit: None,
        })
    }

    /// Caps the total entry size; older entries are evicted after each write.
    pub fn with_limit(mut self, max_bytes: Option<u64>) -> Self {
        self.limit = max_bytes;
        self
    }

    /// Store directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Configured size cap.
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Location of the entry for `key`.
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.hex_entry_path(&key.to_string())
    }

    fn hex_entry_path(&self, hex: &str) -> PathBuf {
        let shard = hex.get(..2).unwrap_or("00");
        self.root.join(shard).join(format!("{hex}.{ENTRY_EXT}"))
    }

    /// Writes `artifacts` under `key`, replacing any previous entry.
    pub fn put(&mut self, key: &CacheKey, artifacts: &ArtifactSet) -> Result<(), CacheError> {
        let payload = artifacts.encode()?;
        let header = EntryHeader {
            magic: ENTRY_MAGIC,
            format_version: ENTRY_FORMAT_VERSION,
            checksum: Digest::from_bytes(&payload),
        };
        let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;

        let header_len = header_bytes.len() as u32;
        let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
        output.extend_from_slice(&header_len.to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(&payload);

        let path = self.entry_path(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let partial = path.with_extension("partial");
        std::fs::write(&partial, &output).map_err(|e| CacheError::Io {
            path: partial.clone(),
            source: e,
        })?;
        std::fs::rename(&partial, &path).map_err(|e| CacheError::Io {
            path: path.clone(),
            source: e,
        })?;

        self.manifest.insert(&key.to_string(), output.len() as u64);
        if let Some(limit) = self.limit {
            self.enforce_limit(limit)?;
        }
        self.manifest.save(&self.root)
    }

    /// Reads the entry for `key`.
    pub fn get(&mut self, key: &CacheKey) -> Result<ArtifactSet, CacheError> {
        let path = self.entry_path(key);
        if !path.is_file() {
            return Err(CacheError::NotFound);
        }
        let hex = key.to_string();
        match read_entry(&path) {
            Some(set) => {
                if !self.manifest.touch(&hex) {
                    let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                    self.manifest.insert(&hex, size);
                }
                self.manifest.save(&self.root)?;
                Ok(set)
            }
            None => {
                warn!(path = %path.display(), "dropping corrupt cache entry");
                self.remove(key)?;
                Err(CacheError::NotFound)
            }
        }
    }

    /// Returns `true` if an entry file exists for `key`.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entry_path(key).is_file()
    }

    /// Deletes the entry for `key`; returns whether one existed.
    pub fn remove(&mut self, key: &CacheKey) -> Result<bool, CacheError> {
        let path = self.entry_path(key);
        let existed = path.is_file();
        if existed {
            std::fs::remove_file(&path).map_err(|e| CacheError::Io {
                path: path.clone(),
                source: e,
            })?;
        }
        let known = self.manifest.remove(&key.to_string()).is_some();
        if existed || known {
            self.manifest.save(&self.root)?;
        }
        Ok(existed)
    }

    /// Evicts least-recently-used entries until the total size is at most
    /// `max_bytes`; returns the number evicted.
    pub fn enforce_limit(&mut self, max_bytes: u64) -> Result<usize, CacheError> {
        let victims = self.manifest.eviction_candidates(max_bytes);
        for hex in &victims {
            let path = self.hex_entry_path(hex);
            if path.is_file() {
                std::fs::remove_file(&path).map_err(|e| CacheError::Io {
                    path: path.clone(),
                    source: e,
                })?;
            }
            self.manifest.remove(hex);
            debug!(key = %hex, "evicted cache entry");
        }
        if !victims.is_empty() {
            self.manifest.save(&self.root)?;
        }
        Ok(victims.len())
    }

    /// Number of tracked entries.
    pub fn entry_count(&self) -> usize {
        self.manifest.entries.len()
    }

    /// Total size of tracked entries in bytes.
    pub fn total_size(&self) -> u64 {
        self.manifest.total_size()
    }
}

fn read_entry(path: &Path) -> Option<ArtifactSet> {
    let raw = std::fs::read(path).ok()?;
    if raw.len() < 4 {
        return None;
    }
    let header_len = u32::from_le_bytes(raw[..4].try_into().ok()?) as usize;
    if raw.len() < 4 + header_len {
        return None;
    }
    let (header, _): (EntryHeader, usize) =
        bincode::serde::decode_from_slice(&raw[4..4 + header_len], bincode::config::standard())
            .ok()?;
    if header.magic != ENTRY_MAGIC || header.format_version != ENTRY_FORMAT_VERSION {
        return None;
    }
    let payload = &raw[4 + header_len..];
    if Digest::from_bytes(payload) != header.checksum {
        return None;
    }
    ArtifactSet::decode(payload).ok()
}

impl CacheBackend for LocalStore {
    fn fetch(&mut self, key: &CacheKey) -> Result<ArtifactSet, CacheError> {
        self.get(key)
    }

    fn store(&mut self, key: &CacheKey, artifacts: &ArtifactSet) -> Result<(), CacheError> {
        self.put(key, artifacts)
    }

    fn remove(&mut self, key: &CacheKey) -> Result<(), CacheError> {
        if LocalStore::remove(self, key)? {
            Ok(())
        } else {
            Err(CacheError::NotFound)
        }
    }

    fn describe(&self) -> String {
        format!("local cache at {}", self.root.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactDescription;

    fn key(n: u8) -> CacheKey {
        CacheKey::new(Digest::from_bytes(&[n]), Digest::from_bytes(b"params"))
    }

    fn artifacts(payload: &[u8]) -> ArtifactSet {
        let mut set = ArtifactSet::new(ArtifactDescription::new(""));
        set.add_file("texture0.png", payload.to_vec()).unwrap();
        set.update_validation();
        set
    }

    #[test]
    fn put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = LocalStore::open(dir.path()).unwrap();
        store.put(&key(1), &artifacts(b"hello")).unwrap();

        let path = store.entry_path(&key(1));
        assert!(path.starts_with(dir.path().join(&key(1).to_string()[..2])));
        assert_eq!(path.extension().unwrap(), "rpc");

        let back = store.get(&key(1)).unwrap();
        assert!(back.is_valid());
        assert_eq!(back.get("texture0.png").unwrap().as_slice(), b"hello");
    }

    #[test]
    fn missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = LocalStore::open(dir.path()).unwrap();
        assert!(store.get(&key(9)).unwrap_err().is_not_found());
    }

    #[test]
    fn corrupt_entry_reads_as_miss_and_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = LocalStore::open(dir.path()).unwrap();
        store.put(&key(1), &artifacts(b"hello")).unwrap();
        let path = store.entry_path(&key(1));
        let mut raw = std::fs::read(&path).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        std::fs::write(&path, raw).unwrap();

        assert!(store.get(&key(1)).unwrap_err().is_not_found());
        assert!(!store.contains(&key(1)));
        assert_eq!(store.entry_count(), 0);
    }

    #[test]
    fn manifest_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = LocalStore::open(dir.path()).unwrap();
            store.put(&key(1), &artifacts(b"a")).unwrap();
            store.put(&key(2), &artifacts(b"b")).unwrap();
        }
        let store = LocalStore::open(dir.path()).unwrap();
        assert_eq!(store.entry_count(), 2);
        assert!(store.total_size() > 0);
    }

    #[test]
    fn malformed_manifest_keys_never_touch_files() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("victim.rpc");
        std::fs::write(&outside, b"keep").unwrap();
        let root = dir.path().join("store");
        let mut manifest = StoreManifest::default();
        manifest.insert("x", 100);
        manifest.insert("../victim", 100);
        manifest.save(&root).unwrap();

        let mut store = LocalStore::open(&root).unwrap();
        assert_eq!(store.entry_count(), 0);
        assert_eq!(store.enforce_limit(0).unwrap(), 0);
        assert!(outside.is_file());
    }

    #[test]
    fn limit_evicts_least_recently_used() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = LocalStore::open(dir.path()).unwrap();
        store.put(&key(1), &artifacts(&[1u8; 100])).unwrap();
        store.put(&key(2), &artifacts(&[2u8; 100])).unwrap();
        store.get(&key(1)).unwrap();
        let one_entry = store.total_size() / 2;

        let mut store = store.with_limit(Some(one_entry * 2 + one_entry / 2));
        store.put(&key(3), &artifacts(&[3u8; 100])).unwrap();
        assert!(store.contains(&key(1)));
        assert!(!store.contains(&key(2)));
        assert!(store.contains(&key(3)));
    }

    #[test]
    fn remove_reports_existence() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = LocalStore::open(dir.path()).unwrap();
        store.put(&key(1), &artifacts(b"x")).unwrap();
        assert!(LocalStore::remove(&mut store, &key(1)).unwrap());
        assert!(!LocalStore::remove(&mut store, &key(1)).unwrap());
    }
}
