//! Per-file compression codecs.
//!
//! The `fast` and `high` codecs are zstd at levels 1 and 19; the legacy
//! codec is raw deflate (RFC 1951). The older names `lz4` and `lz4hc` still
//! parse, as aliases of `fast` and `high`.

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::error::ArchiveError;

const FAST_LEVEL: i32 = 1;
const HIGH_LEVEL: i32 = 19;

/// How one file's bytes are stored. The discriminant is the on-disk tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CompressionType {
    /// Stored as-is.
    None = 0,
    /// Fast codec.
    Fast = 1,
    /// High-ratio codec.
    High = 2,
    /// Raw deflate.
    Rfc1951 = 3,
}

impl CompressionType {
    /// Decodes an on-disk tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(CompressionType::None),
            1 => Some(CompressionType::Fast),
            2 => Some(CompressionType::High),
            3 => Some(CompressionType::Rfc1951),
            _ => None,
        }
    }

    /// The on-disk tag.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Command-line name.
    pub fn name(self) -> &'static str {
        match self {
            CompressionType::None => "none",
            CompressionType::Fast => "fast",
            CompressionType::High => "high",
            CompressionType::Rfc1951 => "rfc1951",
        }
    }

    /// Compresses `data`. [`CompressionType::None`] returns a copy.
    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>, ArchiveError> {
        let codec_err = |e: std::io::Error| ArchiveError::Codec {
            codec: self.name(),
            reason: e.to_string(),
        };
        match self {
            CompressionType::None => Ok(data.to_vec()),
            CompressionType::Fast => zstd::bulk::compress(data, FAST_LEVEL).map_err(codec_err),
            CompressionType::High => zstd::bulk::compress(data, HIGH_LEVEL).map_err(codec_err),
            CompressionType::Rfc1951 => {
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
                encoder.write_all(data).map_err(codec_err)?;
                encoder.finish().map_err(codec_err)
            }
        }
    }

    /// Decompresses `data`, which must expand to exactly `original_size` bytes.
    pub fn decompress(self, data: &[u8], original_size: usize) -> Result<Vec<u8>, ArchiveError> {
        let codec_err = |reason: String| ArchiveError::Codec {
            codec: self.name(),
            reason,
        };
        let out = match self {
            CompressionType::None => data.to_vec(),
            CompressionType::Fast | CompressionType::High => {
                zstd::bulk::decompress(data, original_size).map_err(|e| codec_err(e.to_string()))?
            }
            CompressionType::Rfc1951 => {
                let mut out = Vec::with_capacity(original_size);
                DeflateDecoder::new(data)
                    .read_to_end(&mut out)
                    .map_err(|e| codec_err(e.to_string()))?;
                out
            }
        };
        if out.len() != original_size {
            return Err(codec_err(format!(
                "expanded to {} bytes, expected {original_size}",
                out.len()
            )));
        }
        Ok(out)
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CompressionType {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(CompressionType::None),
            "fast" | "lz4" => Ok(CompressionType::Fast),
            "high" | "lz4hc" => Ok(CompressionType::High),
            "rfc1951" | "deflate" => Ok(CompressionType::Rfc1951),
            _ => Err(ArchiveError::UnknownCompression(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text() -> Vec<u8> {
        b"sprite sheet descriptor line\n".repeat(200)
    }

    #[test]
    fn every_codec_shrinks_repetitive_text() {
        let data = text();
        for kind in [
            CompressionType::Fast,
            CompressionType::High,
            CompressionType::Rfc1951,
        ] {
            let packed = kind.compress(&data).unwrap();
            assert!(packed.len() < data.len(), "{kind}");
            assert_eq!(kind.decompress(&packed, data.len()).unwrap(), data);
        }
    }

    #[test]
    fn size_mismatch_is_an_error() {
        let data = text();
        let packed = CompressionType::Rfc1951.compress(&data).unwrap();
        assert!(matches!(
            CompressionType::Rfc1951.decompress(&packed, data.len() + 1),
            Err(ArchiveError::Codec { .. })
        ));
    }

    #[test]
    fn tags_and_names() {
        for kind in [
            CompressionType::None,
            CompressionType::Fast,
            CompressionType::High,
            CompressionType::Rfc1951,
        ] {
            assert_eq!(CompressionType::from_tag(kind.tag()), Some(kind));
            assert_eq!(kind.name().parse::<CompressionType>().unwrap(), kind);
        }
        assert_eq!(CompressionType::from_tag(9), None);
        assert!("brotli".parse::<CompressionType>().is_err());
    }

    #[test]
    fn legacy_names_are_aliases() {
        assert_eq!(CompressionType::Fast.name(), "fast");
        assert_eq!(CompressionType::High.to_string(), "high");
        assert_eq!("lz4".parse::<CompressionType>().unwrap(), CompressionType::Fast);
        assert_eq!("LZ4HC".parse::<CompressionType>().unwrap(), CompressionType::High);
        assert_eq!("deflate".parse::<CompressionType>().unwrap(), CompressionType::Rfc1951);
    }
}
