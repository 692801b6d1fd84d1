//! Cache keys.

use std::fmt;

use respack_common::Digest;
use serde::{Deserialize, Serialize};

/// Identifies one build: the input-tree digest paired with the
/// build-parameters digest.
///
/// Two builds with equal keys are treated as interchangeable, so the
/// parameters digest must cover every setting that affects the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Digest of the input directory.
    pub primary: Digest,
    /// Digest of the build parameters.
    pub secondary: Digest,
}

impl CacheKey {
    /// Length of the wire form.
    pub const SIZE: usize = 2 * Digest::SIZE;

    /// Pairs the two digests.
    pub fn new(primary: Digest, secondary: Digest) -> Self {
        Self { primary, secondary }
    }

    /// The 32-byte wire form: primary then secondary.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[..Digest::SIZE].copy_from_slice(self.primary.as_bytes());
        out[Digest::SIZE..].copy_from_slice(self.secondary.as_bytes());
        out
    }

    /// Inverse of [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(raw: &[u8; Self::SIZE]) -> Self {
        let mut primary = [0u8; Digest::SIZE];
        let mut secondary = [0u8; Digest::SIZE];
        primary.copy_from_slice(&raw[..Digest::SIZE]);
        secondary.copy_from_slice(&raw[Digest::SIZE..]);
        Self::new(Digest::from_raw(primary), Digest::from_raw(secondary))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.primary, self.secondary)
    }
}
