//! Random-access reading and extraction.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::codec::CompressionType;
use crate::error::ArchiveError;
use crate::format::{ArchiveHeader, FileTableEntry, ENTRY_SIZE, HEADER_SIZE};

/// Listing information for one stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path inside the archive.
    pub name: String,
    /// Stored size.
    pub compressed_size: u32,
    /// Size after decompression.
    pub original_size: u32,
    /// Codec of the stored bytes.
    pub compression: CompressionType,
}

/// An opened archive.
///
/// Opening reads and validates the header, the name block and the file
/// table; file contents are read on demand.
#[derive(Debug)]
pub struct ResourceArchive {
    path: PathBuf,
    file: File,
    header: ArchiveHeader,
    names: Vec<String>,
    entries: Vec<FileTableEntry>,
}

impl ResourceArchive {
    /// Opens and validates the archive at `path`.
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let mut file = File::open(path).map_err(|e| io_err(path, e))?;
        let file_len = file.metadata().map_err(|e| io_err(path, e))?.len();
        let invalid = |reason: String| ArchiveError::InvalidArchive {
            path: path.to_path_buf(),
            reason,
        };

        if file_len < HEADER_SIZE as u64 {
            return Err(invalid(format!("file is only {file_len} bytes")));
        }
        let mut raw = [0u8; HEADER_SIZE];
        file.read_exact(&mut raw).map_err(|e| io_err(path, e))?;
        let header = ArchiveHeader::from_bytes(&raw);
        header.validate().map_err(invalid)?;
        if u64::from(header.start_packed_files) > file_len {
            return Err(invalid("tables extend past the end of the file".to_string()));
        }

        let mut names_block = vec![0u8; header.names_compressed_size as usize];
        file.seek(SeekFrom::Start(u64::from(header.start_names)))
            .and_then(|_| file.read_exact(&mut names_block))
            .map_err(|e| io_err(path, e))?;
        let names_raw = CompressionType::High
            .decompress(&names_block, header.names_original_size as usize)
            .map_err(|e| invalid(format!("name block: {e}")))?;
        let names = split_names(&names_raw).map_err(invalid)?;
        if names.len() != header.num_files as usize {
            return Err(invalid(format!(
                "{} names for {} files",
                names.len(),
                header.num_files
            )));
        }
        if names.windows(2).any(|w| w[0].as_bytes() >= w[1].as_bytes()) {
            return Err(invalid("names are not sorted and unique".to_string()));
        }

        let mut table = vec![0u8; header.file_table_size as usize];
        file.seek(SeekFrom::Start(u64::from(header.start_file_table)))
            .and_then(|_| file.read_exact(&mut table))
            .map_err(|e| io_err(path, e))?;
        let mut entries = Vec::with_capacity(names.len());
        for (chunk, name) in table.chunks_exact(ENTRY_SIZE).zip(&names) {
            let entry = FileTableEntry::from_bytes(chunk)
                .ok_or_else(|| invalid(format!("'{name}' has an unknown compression tag")))?;
            if entry.start < header.start_packed_files || entry.end() > file_len {
                return Err(invalid(format!("'{name}' points outside the payload")));
            }
            entries.push(entry);
        }

        debug!(path = %path.display(), files = names.len(), "archive opened");
        Ok(Self {
            path: path.to_path_buf(),
            file,
            header,
            names,
            entries,
        })
    }

    /// Archive file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decoded header.
    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    /// Number of stored files.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True when the archive holds no files.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// True if `name` is stored.
    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// All entries in table order.
    pub fn list(&self) -> Vec<ArchiveEntry> {
        self.names
            .iter()
            .zip(&self.entries)
            .map(|(name, entry)| ArchiveEntry {
                name: name.clone(),
                compressed_size: entry.compressed_size,
                original_size: entry.original_size,
                compression: entry.compression,
            })
            .collect()
    }

    /// Reads and decompresses one file.
    pub fn load_file(&self, name: &str) -> Result<Vec<u8>, ArchiveError> {
        let index = self
            .index_of(name)
            .ok_or_else(|| ArchiveError::FileNotFound(name.to_string()))?;
        let entry = self.entries[index];
        if entry.original_size == 0 {
            return Ok(Vec::new());
        }

        let mut stored = vec![0u8; entry.compressed_size as usize];
        let mut file = &self.file;
        file.seek(SeekFrom::Start(u64::from(entry.start)))
            .and_then(|_| file.read_exact(&mut stored))
            .map_err(|e| io_err(&self.path, e))?;
        entry.compression.decompress(&stored, entry.original_size as usize)
    }

    /// Writes every file below `dest`, creating directories as needed.
    /// Returns the number of files written.
    pub fn extract_all(&self, dest: &Path) -> Result<usize, ArchiveError> {
        for name in &self.names {
            let target = safe_join(dest, name)?;
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
            }
            let data = self.load_file(name)?;
            fs::write(&target, data).map_err(|e| io_err(&target, e))?;
        }
        Ok(self.names.len())
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.names
            .binary_search_by(|entry| entry.as_bytes().cmp(name.as_bytes()))
            .ok()
    }
}

fn split_names(raw: &[u8]) -> Result<Vec<String>, String> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let Some(body) = raw.strip_suffix(&[0u8]) else {
        return Err("name block is not NUL-terminated".to_string());
    };
    body.split(|b| *b == 0)
        .map(|name| {
            String::from_utf8(name.to_vec()).map_err(|_| "name is not valid UTF-8".to_string())
        })
        .collect()
}

fn safe_join(dest: &Path, name: &str) -> Result<PathBuf, ArchiveError> {
    let mut out = dest.to_path_buf();
    for part in name.split('/') {
        if part.is_empty() || part == "." || part == ".." || part.contains(['\\', ':']) {
            return Err(ArchiveError::UnsafePath(name.to_string()));
        }
        out.push(part);
    }
    Ok(out)
}

fn io_err(path: &Path, source: io::Error) -> ArchiveError {
    ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    }
}
