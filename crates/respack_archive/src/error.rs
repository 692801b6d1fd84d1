//! Error types for archive creation and reading.

use std::path::PathBuf;

/// Errors that can occur while building or reading an archive.
///
/// Any error during [`build_archive`](crate::build_archive) aborts the whole
/// operation; no partial archive is left at the destination.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// An I/O error occurred on the given path.
    #[error("archive I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// There were no files to pack.
    #[error("no files to pack")]
    EmptyFileSet,

    /// Two different source files map to the same archive path.
    #[error("archive path '{path}' is produced by both {first} and {second}")]
    DuplicatePath {
        /// The colliding archive path.
        path: String,
        /// The first source file.
        first: PathBuf,
        /// The second source file.
        second: PathBuf,
    },

    /// A source file does not live under the base directory.
    #[error("{path} is outside the base directory {base}")]
    OutsideBase {
        /// The source file.
        path: PathBuf,
        /// The base directory.
        base: PathBuf,
    },

    /// A stored path would escape the extraction directory.
    #[error("unsafe archive path '{0}'")]
    UnsafePath(String),

    /// The archive file is malformed.
    #[error("invalid archive {path}: {reason}")]
    InvalidArchive {
        /// The archive file.
        path: PathBuf,
        /// Description of the problem.
        reason: String,
    },

    /// A codec failed to compress or decompress.
    #[error("{codec} codec failed: {reason}")]
    Codec {
        /// Codec name.
        codec: &'static str,
        /// Description of the failure.
        reason: String,
    },

    /// The compression name is not recognized.
    #[error("unknown compression '{0}' (expected none, fast, high or rfc1951)")]
    UnknownCompression(String),

    /// The requested file is not in the archive.
    #[error("file '{0}' not found in archive")]
    FileNotFound(String),

    /// A size or offset does not fit the 32-bit format.
    #[error("{0} exceeds the 4 GiB archive limit")]
    TooLarge(String),
}
