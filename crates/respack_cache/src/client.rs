//! Build cache client used by the orchestrator.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::artifact::ArtifactSet;
use crate::error::CacheError;
use crate::key::CacheKey;
use crate::remote::RemoteCache;
use crate::store::LocalStore;

/// Storage behind a [`BuildCacheClient`].
pub trait CacheBackend: Send {
    /// Retrieves the artifacts stored under `key`.
    fn fetch(&mut self, key: &CacheKey) -> Result<ArtifactSet, CacheError>;

    /// Stores `artifacts` under `key`.
    fn store(&mut self, key: &CacheKey, artifacts: &ArtifactSet) -> Result<(), CacheError>;

    /// Removes the entry under `key`.
    fn remove(&mut self, key: &CacheKey) -> Result<(), CacheError>;

    /// Returns `false` once the backend can no longer serve requests.
    fn is_connected(&self) -> bool {
        true
    }

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Synchronous cache access keyed by [`CacheKey`].
///
/// A client without a backend is valid and simply reports itself unusable,
/// which callers treat as "cache disabled".
pub struct BuildCacheClient {
    backend: Option<Box<dyn CacheBackend>>,
    timeout_ms: u64,
}

impl BuildCacheClient {
    /// A client with no cache behind it.
    pub fn disabled() -> Self {
        Self {
            backend: None,
            timeout_ms: 0,
        }
    }

    /// A client over an arbitrary backend.
    pub fn with_backend(backend: Box<dyn CacheBackend>, timeout_ms: u64) -> Self {
        info!(cache = %backend.describe(), "using build cache");
        Self {
            backend: Some(backend),
            timeout_ms,
        }
    }

    /// A client over a [`LocalStore`] at `dir`.
    pub fn local(dir: &Path) -> Result<Self, CacheError> {
        Ok(Self::with_backend(Box::new(LocalStore::open(dir)?), 0))
    }

    /// A client connected to a cache server at `address`.
    pub fn remote(address: &str, timeout_ms: u64) -> Result<Self, CacheError> {
        let remote = RemoteCache::connect(address, timeout_ms)?;
        Ok(Self::with_backend(Box::new(remote), timeout_ms))
    }

    /// Returns `true` if a backend is present and connected.
    pub fn is_usable(&self) -> bool {
        self.backend.as_ref().is_some_and(|b| b.is_connected())
    }

    /// Request timeout in milliseconds.
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Retrieves the artifacts stored under `key`.
    ///
    /// Sets whose validation token does not match their contents are
    /// reported as [`CacheError::InvalidArtifact`].
    pub fn fetch(&mut self, key: &CacheKey) -> Result<ArtifactSet, CacheError> {
        let backend = self.backend.as_mut().ok_or(CacheError::Disabled)?;
        let artifacts = backend.fetch(key)?;
        if !artifacts.is_valid() {
            warn!(key = %key, "cached artifacts failed validation");
            return Err(CacheError::InvalidArtifact {
                reason: format!("validation token mismatch for {key}"),
            });
        }
        debug!(key = %key, files = artifacts.len(), "cache hit");
        Ok(artifacts)
    }

    /// Stores `artifacts` under `key`, stamping their validation token.
    ///
    /// An empty set is not stored and is not an error.
    pub fn store(&mut self, key: &CacheKey, mut artifacts: ArtifactSet) -> Result<(), CacheError> {
        if artifacts.is_empty() {
            debug!(key = %key, "nothing to store");
            return Ok(());
        }
        let backend = self.backend.as_mut().ok_or(CacheError::Disabled)?;
        artifacts.update_validation();
        backend.store(key, &artifacts)
    }

    /// Removes the entry under `key`.
    pub fn remove(&mut self, key: &CacheKey) -> Result<(), CacheError> {
        self.backend
            .as_mut()
            .ok_or(CacheError::Disabled)?
            .remove(key)
    }
}

impl Default for BuildCacheClient {
    fn default() -> Self {
        Self::disabled()
    }
}
