//! Content digests for change detection and cache keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 128-bit content digest computed using XXH3.
///
/// Two inputs with the same `Digest` are assumed to be identical. Equality is
/// the only operation the pipeline relies on; the value carries no security
/// guarantees.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Digest([u8; 16]);

impl Digest {
    /// Size of a digest in bytes, and of every persisted sidecar file.
    pub const SIZE: usize = 16;

    /// Computes a digest from a byte slice using XXH3-128.
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = xxhash_rust::xxh3::xxh3_128(data);
        Self(hash.to_le_bytes())
    }

    /// Wraps raw digest bytes, e.g. as read back from a sidecar file.
    pub const fn from_raw(raw: [u8; 16]) -> Self {
        Self(raw)
    }

    /// Returns the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

/// Error returned when parsing a hex digest string fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid digest '{0}': expected 32 hex characters")]
pub struct ParseDigestError(pub String);

impl FromStr for Digest {
    type Err = ParseDigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 32 || !s.is_ascii() {
            return Err(ParseDigestError(s.to_string()));
        }
        let mut raw = [0u8; 16];
        for (i, byte) in raw.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| ParseDigestError(s.to_string()))?;
        }
        Ok(Self(raw))
    }
}

/// Incremental digest computation over several inputs.
///
/// Feeding the same sequence of byte slices always yields the same digest as
/// [`Digest::from_bytes`] over their concatenation.
pub struct DigestBuilder {
    state: xxhash_rust::xxh3::Xxh3,
}

impl DigestBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            state: xxhash_rust::xxh3::Xxh3::new(),
        }
    }

    /// Appends bytes to the digest input.
    pub fn update(&mut self, data: &[u8]) {
        self.state.update(data);
    }

    /// Finishes the computation.
    pub fn finish(&self) -> Digest {
        Digest(self.state.digest128().to_le_bytes())
    }
}

impl Default for DigestBuilder {
    fn default() -> Self {
        Self::new()
    }
}
