//! Archive creation.

use std::fs;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::codec::CompressionType;
use crate::collect::ArchiveSource;
use crate::error::ArchiveError;
use crate::format::{ArchiveHeader, FileTableEntry};

/// What [`build_archive`] wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Destination file.
    pub path: PathBuf,
    /// Number of stored files.
    pub files: usize,
    /// Sum of the original file sizes.
    pub original_bytes: u64,
    /// Total archive size, header and tables included.
    pub archive_bytes: u64,
    /// Files stored raw because compression did not shrink them.
    pub raw_fallbacks: usize,
}

/// Builds an archive at `archive_path` from `files`.
///
/// The list is sorted by archive path before any offset is computed.
/// Compressed bytes go to a temporary payload file next to the destination;
/// the final archive is assembled in a second temporary file and renamed
/// into place only after everything succeeded. On error both temporaries
/// are removed and an existing archive at `archive_path` is left untouched.
pub fn build_archive(files: &[ArchiveSource], archive_path: &Path) -> Result<ArchiveSummary, ArchiveError> {
    if files.is_empty() {
        return Err(ArchiveError::EmptyFileSet);
    }

    let mut sorted: Vec<&ArchiveSource> = files.iter().collect();
    sorted.sort_by(|a, b| a.relative_path.as_bytes().cmp(b.relative_path.as_bytes()));
    for pair in sorted.windows(2) {
        if pair[0].relative_path == pair[1].relative_path {
            return Err(ArchiveError::DuplicatePath {
                path: pair[0].relative_path.clone(),
                first: pair[0].absolute_path.clone(),
                second: pair[1].absolute_path.clone(),
            });
        }
    }

    let parent = match archive_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| io_err(&parent, e))?;
    let stem = archive_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive".to_string());

    let mut payload = tempfile::Builder::new()
        .prefix(&format!("{stem}_tmp_compressed_files"))
        .suffix(".bin")
        .tempfile_in(&parent)
        .map_err(|e| io_err(&parent, e))?;

    let mut entries = Vec::with_capacity(sorted.len());
    let mut offset: u64 = 0;
    let mut original_bytes: u64 = 0;
    let mut raw_fallbacks = 0usize;
    {
        let mut out = BufWriter::new(payload.as_file_mut());
        for source in &sorted {
            let data = fs::read(&source.absolute_path).map_err(|e| io_err(&source.absolute_path, e))?;
            let original_size = to_u32(data.len() as u64, &source.relative_path)?;
            original_bytes += data.len() as u64;

            let (stored, compression) = if data.is_empty() || source.compression == CompressionType::None {
                (data, CompressionType::None)
            } else {
                let packed = source.compression.compress(&data)?;
                if packed.len() >= data.len() {
                    raw_fallbacks += 1;
                    debug!(file = %source.relative_path, "compression did not help, storing raw");
                    (data, CompressionType::None)
                } else {
                    (packed, source.compression)
                }
            };

            let entry = FileTableEntry {
                start: to_u32(offset, "payload")?,
                compressed_size: to_u32(stored.len() as u64, &source.relative_path)?,
                original_size,
                compression,
            };
            if !stored.is_empty() {
                out.write_all(&stored).map_err(|e| io_err(&parent, e))?;
            }
            offset += stored.len() as u64;
            entries.push(entry);
        }
        out.flush().map_err(|e| io_err(&parent, e))?;
    }

    let mut names = Vec::new();
    for source in &sorted {
        names.extend_from_slice(source.relative_path.as_bytes());
        names.push(0);
    }
    let names_block = CompressionType::High.compress(&names)?;

    let num_files = to_u32(sorted.len() as u64, "file count")?;
    let header = ArchiveHeader::for_blocks(
        num_files,
        to_u32(names_block.len() as u64, "name block")?,
        to_u32(names.len() as u64, "name block")?,
    )
    .ok_or_else(|| ArchiveError::TooLarge("archive header".to_string()))?;

    let payload_start = u64::from(header.start_packed_files);
    to_u32(payload_start + offset, "archive")?;
    for entry in &mut entries {
        entry.start += header.start_packed_files;
    }

    let mut archive = tempfile::Builder::new()
        .prefix(&format!("{stem}_tmp_archive"))
        .tempfile_in(&parent)
        .map_err(|e| io_err(&parent, e))?;
    {
        let mut out = BufWriter::new(archive.as_file_mut());
        let write_err = |e| io_err(archive_path, e);
        out.write_all(&header.to_bytes()).map_err(write_err)?;
        out.write_all(&names_block).map_err(write_err)?;
        for entry in &entries {
            out.write_all(&entry.to_bytes()).map_err(write_err)?;
        }
        let source = payload.as_file_mut();
        source.seek(SeekFrom::Start(0)).map_err(write_err)?;
        io::copy(source, &mut out).map_err(write_err)?;
        out.flush().map_err(write_err)?;
    }
    archive.as_file().sync_all().map_err(|e| io_err(archive_path, e))?;
    archive
        .persist(archive_path)
        .map_err(|e| io_err(archive_path, e.error))?;

    let archive_bytes = payload_start + offset;
    info!(
        path = %archive_path.display(),
        files = sorted.len(),
        original_bytes,
        archive_bytes,
        "archive written"
    );
    Ok(ArchiveSummary {
        path: archive_path.to_path_buf(),
        files: sorted.len(),
        original_bytes,
        archive_bytes,
        raw_fallbacks,
    })
}

fn to_u32(value: u64, what: &str) -> Result<u32, ArchiveError> {
    u32::try_from(value).map_err(|_| ArchiveError::TooLarge(what.to_string()))
}

fn io_err(path: &Path, source: io::Error) -> ArchiveError {
    ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    }
}
