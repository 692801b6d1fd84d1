//! Wire protocol between cache clients and the cache server.
//!
//! Every message is a frame: a little-endian `u32` length followed by that
//! many bytes of bincode. A connection carries any number of request and
//! response pairs in lockstep.

use std::io::{self, Read, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactRecord;
use crate::key::CacheKey;

/// Largest frame accepted, in bytes.
pub const MAX_FRAME_LEN: u32 = 1 << 30;

/// Client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheRequest {
    /// Store artifacts under a key.
    Add {
        /// Target key.
        key: CacheKey,
        /// Artifacts to store.
        artifacts: ArtifactRecord,
    },
    /// Retrieve the artifacts under a key.
    Request {
        /// Key to look up.
        key: CacheKey,
    },
    /// Delete the entry under a key.
    Remove {
        /// Key to delete.
        key: CacheKey,
    },
    /// Report store statistics.
    Status,
}

/// Server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheResponse {
    /// The artifacts were stored.
    Added,
    /// The requested artifacts.
    Found(ArtifactRecord),
    /// No entry under the key.
    NotFound,
    /// The entry was deleted.
    Removed,
    /// Store statistics.
    Status(StoreStatus),
    /// The request failed on the server.
    Error(String),
}

/// Statistics reported by [`CacheRequest::Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStatus {
    /// Number of entries.
    pub entries: u64,
    /// Total entry size in bytes.
    pub total_bytes: u64,
    /// Configured size cap.
    pub limit_bytes: Option<u64>,
}

/// Writes one frame.
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, message: &T) -> io::Result<()> {
    let body = bincode::serde::encode_to_vec(message, bincode::config::standard())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    let len = u32::try_from(body.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_LEN)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "frame too large"))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&body)?;
    writer.flush()
}

/// Reads one frame.
pub fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R) -> io::Result<T> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes);
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {len} bytes exceeds limit"),
        ));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body)?;
    let (message, _) = bincode::serde::decode_from_slice(&body, bincode::config::standard())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactDescription;
    use respack_common::Digest;
    use std::io::Cursor;

    fn key() -> CacheKey {
        CacheKey::new(Digest::from_bytes(b"a"), Digest::from_bytes(b"b"))
    }

    #[test]
    fn frames_are_length_prefixed() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &CacheRequest::Status).unwrap();
        let len = u32::from_le_bytes(buf[..4].try_into().unwrap()) as usize;
        assert_eq!(buf.len(), 4 + len);
    }

    #[test]
    fn several_frames_on_one_stream() {
        let record = ArtifactRecord {
            description: ArtifactDescription::default(),
            files: vec![("x.png".to_string(), vec![1, 2, 3])],
            validation: None,
        };
        let mut buf = Vec::new();
        write_frame(&mut buf, &CacheRequest::Request { key: key() }).unwrap();
        write_frame(
            &mut buf,
            &CacheRequest::Add {
                key: key(),
                artifacts: record.clone(),
            },
        )
        .unwrap();

        let mut cursor = Cursor::new(buf);
        let first: CacheRequest = read_frame(&mut cursor).unwrap();
        let second: CacheRequest = read_frame(&mut cursor).unwrap();
        assert_eq!(first, CacheRequest::Request { key: key() });
        assert_eq!(
            second,
            CacheRequest::Add {
                key: key(),
                artifacts: record
            }
        );
    }

    #[test]
    fn truncated_frame_is_unexpected_eof() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &CacheResponse::Error("boom".into())).unwrap();
        buf.truncate(buf.len() - 1);
        let err = read_frame::<_, CacheResponse>(&mut Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn oversized_length_is_rejected() {
        let buf = (MAX_FRAME_LEN + 1).to_le_bytes().to_vec();
        let err = read_frame::<_, CacheResponse>(&mut Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
