//! Error types for configuration loading and validation.

/// Errors that can occur while loading `respack.toml` or resolving flags.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading a configuration or flags file.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// The packing algorithm selector is not one of the known values.
    #[error("unknown packing algorithm '{0}' (expected maxrect, maxrect_fast or basic)")]
    InvalidAlgorithm(String),

    /// The maximum texture size is not a power of two up to 65536.
    #[error("texture size '{0}' must be a power of two no larger than 65536")]
    InvalidTextureSize(String),

    /// The margin value is not one of 0, 1, 2, 4 or two-side.
    #[error("invalid margin '{0}' (expected 0, 1, 2, 4 or two-side)")]
    InvalidMargin(String),

    /// More than one margin token was given in one flag set.
    #[error("conflicting margin flags '{first}' and '{second}'")]
    ConflictingMargin {
        /// The token seen first.
        first: String,
        /// The token that conflicts with it.
        second: String,
    },

    /// The texture postfix contains whitespace.
    #[error("texture postfix '{0}' must not contain whitespace")]
    InvalidPostfix(String),

    /// A GPU family name is not recognized.
    #[error("unknown GPU family '{0}'")]
    UnknownGpu(String),

    /// A configuration value failed validation.
    #[error("validation error: {0}")]
    ValidationError(String),
}
