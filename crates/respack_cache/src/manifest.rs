//! Bookkeeping for a [`LocalStore`](crate::LocalStore).
//!
//! The manifest is stored as `manifest.json` in the store root. It records the
//! size of every entry and a monotonically increasing use counter so that the
//! store can evict least-recently-used entries when it grows past its limit.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::CacheError;
use crate::key::CacheKey;

/// Name of the manifest file within the store directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Current manifest layout version.
const MANIFEST_VERSION: u32 = 1;

/// Length of a key in hex form.
pub const KEY_HEX_LEN: usize = 2 * CacheKey::SIZE;

/// Returns `true` if `key` is the hex form of a [`CacheKey`].
pub fn is_key_hex(key: &str) -> bool {
    key.len() == KEY_HEX_LEN && key.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Per-entry bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInfo {
    /// Size of the entry file in bytes.
    pub size: u64,
    /// Value of the use counter when the entry was last read or written.
    pub last_used: u64,
}

/// Size and recency of every entry in a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreManifest {
    /// Layout version.
    pub version: u32,
    /// Use counter, bumped on every access.
    pub counter: u64,
    /// Entries keyed by the hex form of their cache key.
    pub entries: BTreeMap<String, EntryInfo>,
}

impl Default for StoreManifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            counter: 0,
            entries: BTreeMap::new(),
        }
    }
}

impl StoreManifest {
    /// Loads the manifest, returning `None` if it is missing, unparsable or
    /// from another layout version.
    ///
    /// Entries whose key is not a hex cache key are dropped.
    pub fn load(store_dir: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(store_dir.join(MANIFEST_FILE)).ok()?;
        let mut manifest = serde_json::from_str::<StoreManifest>(&content)
            .ok()
            .filter(|m| m.version == MANIFEST_VERSION)?;
        manifest.entries.retain(|key, _| {
            let valid = is_key_hex(key);
            if !valid {
                warn!(key = %key, "dropping malformed manifest entry");
            }
            valid
        });
        Some(manifest)
    }

    /// Saves the manifest, creating the store directory if needed.
    pub fn save(&self, store_dir: &Path) -> Result<(), CacheError> {
        std::fs::create_dir_all(store_dir).map_err(|e| CacheError::Io {
            path: store_dir.to_path_buf(),
            source: e,
        })?;
        let path = store_dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        std::fs::write(&path, json).map_err(|e| CacheError::Io { path, source: e })
    }

    /// Records a new or rewritten entry as most recently used.
    pub fn insert(&mut self, key: &str, size: u64) {
        self.counter += 1;
        self.entries.insert(
            key.to_string(),
            EntryInfo {
                size,
                last_used: self.counter,
            },
        );
    }

    /// Marks an entry as most recently used. Returns `false` if unknown.
    pub fn touch(&mut self, key: &str) -> bool {
        self.counter += 1;
        match self.entries.get_mut(key) {
            Some(info) => {
                info.last_used = self.counter;
                true
            }
            None => false,
        }
    }

    /// Forgets an entry.
    pub fn remove(&mut self, key: &str) -> Option<EntryInfo> {
        self.entries.remove(key)
    }

    /// Sum of all entry sizes.
    pub fn total_size(&self) -> u64 {
        self.entries.values().map(|e| e.size).sum()
    }

    /// Keys that must be evicted, oldest first, to bring the total size
    /// down to `max_bytes`.
    pub fn eviction_candidates(&self, max_bytes: u64) -> Vec<String> {
        let mut total = self.total_size();
        if total <= max_bytes {
            return Vec::new();
        }
        let mut by_age: Vec<(&String, &EntryInfo)> = self.entries.iter().collect();
        by_age.sort_by_key(|(_, info)| info.last_used);

        let mut victims = Vec::new();
        for (key, info) in by_age {
            if total <= max_bytes {
                break;
            }
            total -= info.size;
            victims.push(key.clone());
        }
        victims
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(n: u8) -> String {
        format!("{n:02x}").repeat(CacheKey::SIZE)
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = StoreManifest::default();
        m.insert(&hex(0xaa), 10);
        m.insert(&hex(0xbb), 20);
        m.save(dir.path()).unwrap();

        let loaded = StoreManifest::load(dir.path()).unwrap();
        assert_eq!(loaded, m);
        assert_eq!(loaded.total_size(), 30);
    }

    #[test]
    fn load_corrupt_json_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "not valid json {{{").unwrap();
        assert!(StoreManifest::load(dir.path()).is_none());
    }

    #[test]
    fn load_drops_malformed_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = StoreManifest::default();
        m.insert(&hex(0x1f), 10);
        m.insert("a", 20);
        m.insert(&format!("../../{}", &hex(0x2e)[6..]), 30);
        m.insert(&"zz".repeat(CacheKey::SIZE), 40);
        m.save(dir.path()).unwrap();

        let loaded = StoreManifest::load(dir.path()).unwrap();
        assert_eq!(loaded.entries.keys().collect::<Vec<_>>(), vec![&hex(0x1f)]);
        assert_eq!(loaded.total_size(), 10);
    }

    #[test]
    fn load_nonexistent_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(StoreManifest::load(dir.path()).is_none());
    }

    #[test]
    fn touch_refreshes_recency() {
        let mut m = StoreManifest::default();
        m.insert("old", 10);
        m.insert("new", 10);
        assert!(m.touch("old"));
        assert!(!m.touch("missing"));
        assert_eq!(m.eviction_candidates(10), vec!["new".to_string()]);
    }

    #[test]
    fn evicts_oldest_until_under_limit() {
        let mut m = StoreManifest::default();
        m.insert("a", 50);
        m.insert("b", 50);
        m.insert("c", 50);
        assert!(m.eviction_candidates(150).is_empty());
        assert_eq!(m.eviction_candidates(60), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(m.eviction_candidates(0).len(), 3);
    }
}
