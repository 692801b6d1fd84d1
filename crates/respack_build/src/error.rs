//! Error types for definition loading, atlas export and the directory walk.

use std::path::PathBuf;

use respack_cache::CacheError;
use respack_config::ConfigError;
use respack_packer::PackError;

/// Errors raised while building one directory.
///
/// None of these cross the [`ResourcePacker`](crate::ResourcePacker)
/// boundary; the walk turns them into messages in the run's error set.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// An I/O error occurred on the given path.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// An image could not be decoded or encoded.
    #[error("image error in {path}: {source}")]
    Image {
        /// The image file.
        path: PathBuf,
        /// The underlying codec error.
        source: image::ImageError,
    },

    /// A PSD file could not be parsed.
    #[error("unable to load PSD {path}: {reason}")]
    Psd {
        /// The PSD file.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// A PSD layer has zero width or height.
    #[error("{path} contains empty layer {index} ({name})")]
    EmptyLayer {
        /// The PSD file.
        path: PathBuf,
        /// Layer index.
        index: usize,
        /// Layer name.
        name: String,
    },

    /// A definition source is malformed.
    #[error("invalid definition {path}: {reason}")]
    InvalidDefinition {
        /// The source file.
        path: PathBuf,
        /// Description of the problem.
        reason: String,
    },

    /// A descriptor could not be serialized.
    #[error("cannot serialize {path}: {reason}")]
    Serialization {
        /// The descriptor being written.
        path: PathBuf,
        /// Serializer message.
        reason: String,
    },

    /// A device GPU was requested without compression options.
    #[error("Cannot read compression options for GPU '{0}'")]
    MissingGpuOptions(String),

    /// The input directory does not exist.
    #[error("Input folder does not exist: '{0}'")]
    MissingInput(PathBuf),

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Cache error.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Packer error.
    #[error(transparent)]
    Pack(#[from] PackError),
}

impl BuildError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }
}
