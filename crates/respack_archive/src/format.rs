//! On-disk layout of the archive header and file table.
//!
//! All integers are little-endian. The header is 36 bytes:
//!
//! | offset | field                   |
//! |--------|-------------------------|
//! | 0      | marker `RPAK`           |
//! | 4      | file count              |
//! | 8      | name block, compressed  |
//! | 12     | name block, original    |
//! | 16     | file table size         |
//! | 20     | header start            |
//! | 24     | name block start        |
//! | 28     | file table start        |
//! | 32     | payload start           |
//!
//! Each file table entry is 16 bytes: start offset, compressed size,
//! original size, compression tag followed by three zero bytes.

use crate::codec::CompressionType;

/// Archive marker.
pub const ARCHIVE_MAGIC: [u8; 4] = *b"RPAK";
/// Encoded header size in bytes.
pub const HEADER_SIZE: usize = 36;
/// Encoded file table entry size in bytes.
pub const ENTRY_SIZE: usize = 16;

/// Archive header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveHeader {
    /// Marker bytes, [`ARCHIVE_MAGIC`] for a valid archive.
    pub marker: [u8; 4],
    /// Number of files.
    pub num_files: u32,
    /// Compressed size of the name block.
    pub names_compressed_size: u32,
    /// Size of the NUL-terminated name list before compression.
    pub names_original_size: u32,
    /// `num_files * ENTRY_SIZE`.
    pub file_table_size: u32,
    /// Offset of the header, always 0.
    pub start_header: u32,
    /// Offset of the name block.
    pub start_names: u32,
    /// Offset of the file table.
    pub start_file_table: u32,
    /// Offset of the first payload byte.
    pub start_packed_files: u32,
}

impl ArchiveHeader {
    /// Builds a header for the given block sizes, chaining the block
    /// offsets one after another. Returns `None` on 32-bit overflow.
    pub fn for_blocks(num_files: u32, names_compressed_size: u32, names_original_size: u32) -> Option<Self> {
        let file_table_size = num_files.checked_mul(ENTRY_SIZE as u32)?;
        let start_header = 0u32;
        let start_names = start_header.checked_add(HEADER_SIZE as u32)?;
        let start_file_table = start_names.checked_add(names_compressed_size)?;
        let start_packed_files = start_file_table.checked_add(file_table_size)?;
        Some(Self {
            marker: ARCHIVE_MAGIC,
            num_files,
            names_compressed_size,
            names_original_size,
            file_table_size,
            start_header,
            start_names,
            start_file_table,
            start_packed_files,
        })
    }

    /// Encodes the header.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&self.marker);
        let fields = [
            self.num_files,
            self.names_compressed_size,
            self.names_original_size,
            self.file_table_size,
            self.start_header,
            self.start_names,
            self.start_file_table,
            self.start_packed_files,
        ];
        for (i, value) in fields.iter().enumerate() {
            let at = 4 + i * 4;
            out[at..at + 4].copy_from_slice(&value.to_le_bytes());
        }
        out
    }

    /// Decodes a header. The marker is not checked here.
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        let word = |i: usize| {
            let at = 4 + i * 4;
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        Self {
            marker: [bytes[0], bytes[1], bytes[2], bytes[3]],
            num_files: word(0),
            names_compressed_size: word(1),
            names_original_size: word(2),
            file_table_size: word(3),
            start_header: word(4),
            start_names: word(5),
            start_file_table: word(6),
            start_packed_files: word(7),
        }
    }

    /// Checks the marker and that the block offsets chain together.
    pub fn validate(&self) -> Result<(), String> {
        if self.marker != ARCHIVE_MAGIC {
            return Err(format!("bad marker {:02x?}", self.marker));
        }
        let expected = Self::for_blocks(self.num_files, self.names_compressed_size, self.names_original_size)
            .ok_or_else(|| "block offsets overflow".to_string())?;
        if expected != *self {
            return Err("block offsets are inconsistent".to_string());
        }
        Ok(())
    }
}

/// One file table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTableEntry {
    /// Absolute offset of the stored bytes.
    pub start: u32,
    /// Stored size.
    pub compressed_size: u32,
    /// Size after decompression.
    pub original_size: u32,
    /// Codec used for the stored bytes.
    pub compression: CompressionType,
}

impl FileTableEntry {
    /// Encodes the entry.
    pub fn to_bytes(&self) -> [u8; ENTRY_SIZE] {
        let mut out = [0u8; ENTRY_SIZE];
        out[0..4].copy_from_slice(&self.start.to_le_bytes());
        out[4..8].copy_from_slice(&self.compressed_size.to_le_bytes());
        out[8..12].copy_from_slice(&self.original_size.to_le_bytes());
        out[12] = self.compression.tag();
        out
    }

    /// Decodes an entry; `None` for an unknown compression tag.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < ENTRY_SIZE {
            return None;
        }
        let word = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        Some(Self {
            start: word(0),
            compressed_size: word(4),
            original_size: word(8),
            compression: CompressionType::from_tag(bytes[12])?,
        })
    }

    /// One past the last stored byte.
    pub fn end(&self) -> u64 {
        u64::from(self.start) + u64::from(self.compressed_size)
    }
}
