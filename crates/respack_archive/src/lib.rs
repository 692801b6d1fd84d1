//! Random-access resource archives.
//!
//! An archive is laid out as `[header][name block][file table][payload]`.
//! The name block is the NUL-terminated, sorted list of relative paths,
//! always compressed with the high-ratio codec. The file table has one
//! fixed-size entry per name, in the same order, pointing at the file's
//! bytes in the payload. Files are compressed individually and stored raw
//! whenever compression would not make them smaller.

#![warn(missing_docs)]

pub mod codec;
pub mod collect;
pub mod error;
pub mod format;
pub mod reader;
pub mod writer;

pub use codec::CompressionType;
pub use collect::{collect_files, ArchiveSource};
pub use error::ArchiveError;
pub use format::{ArchiveHeader, FileTableEntry};
pub use reader::{ArchiveEntry, ResourceArchive};
pub use writer::{build_archive, ArchiveSummary};
