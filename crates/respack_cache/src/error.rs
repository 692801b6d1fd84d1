//! Error types for cache operations.

use std::path::PathBuf;

/// Errors that can occur during hashing and cache operations.
///
/// [`CacheError::NotFound`] is an ordinary miss. [`CacheError::Timeout`] and
/// [`CacheError::ConnectionLost`] are reported to the user but never fail a
/// build; the caller falls back to rebuilding.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The requested key is not in the cache.
    #[error("item not found in cache")]
    NotFound,

    /// The cache did not answer within the configured timeout.
    #[error("cache request timed out ({timeout_ms} ms)")]
    Timeout {
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// The connection to the cache server was lost.
    #[error("connection to cache lost: {reason}")]
    ConnectionLost {
        /// Description of the failure.
        reason: String,
    },

    /// No cache is configured.
    #[error("cache is not configured")]
    Disabled,

    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A network error other than a timeout or a dropped connection.
    #[error("cache network error: {0}")]
    Network(#[source] std::io::Error),

    /// A cache entry file has an invalid or missing header.
    #[error("invalid cache entry header in {path}: {reason}")]
    InvalidHeader {
        /// The entry file path.
        path: PathBuf,
        /// Description of the header problem.
        reason: String,
    },

    /// An artifact set failed its validation check or holds an unsafe file name.
    #[error("invalid artifact set: {reason}")]
    InvalidArtifact {
        /// Description of the problem.
        reason: String,
    },

    /// The store manifest could not be parsed.
    #[error("failed to parse store manifest: {reason}")]
    ManifestParse {
        /// Description of the parse failure.
        reason: String,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// The peer sent a message that violates the protocol.
    #[error("cache protocol error: {reason}")]
    Protocol {
        /// Description of the violation.
        reason: String,
    },

    /// The cache server reported a failure.
    #[error("cache server error: {message}")]
    Server {
        /// Message sent by the server.
        message: String,
    },
}

impl CacheError {
    /// Returns `true` for an ordinary cache miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound)
    }

    /// Classifies a socket error as timeout, lost connection or other.
    pub fn from_network(err: std::io::Error, timeout_ms: u64) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => CacheError::Timeout { timeout_ms },
            ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof
            | ErrorKind::NotConnected => CacheError::ConnectionLost {
                reason: err.to_string(),
            },
            _ => CacheError::Network(err),
        }
    }
}
