//! Build configuration for the resource packer.
//!
//! A [`BuildConfig`] is assembled once per run from defaults, an optional
//! `respack.toml` and command-line flags, then handed by value to the
//! orchestrator. Per-directory `flags.txt` token lists are parsed into
//! [`PackOverrides`] and resolved against it into a fresh [`PackSettings`].

#![warn(missing_docs)]

pub mod error;
pub mod flags;
pub mod gpu;
pub mod loader;
pub mod settings;
pub mod types;

pub use error::ConfigError;
pub use flags::{parse_texture_size, read_flags_file, PackOverrides};
pub use gpu::GpuFamily;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE_NAME};
pub use settings::{
    parse_margin, AlgorithmSelector, BuildConfig, CacheSettings, PackSettings, MAX_QUALITY,
};
pub use types::{ArchiveSection, CacheSection, MarginValue, PackSection, ProjectConfig};
