//! Incremental sprite packing.
//!
//! [`ResourcePacker`] walks an input tree of PSD, PNG and `.pngdef` sources,
//! turns each file into a [`Definition`] through a [`LoaderRegistry`], packs
//! the frames of a directory into atlas sheets with an [`AtlasJob`] and
//! writes one text descriptor per definition next to the exported textures.
//! Directories whose inputs and parameters did not change since the last run
//! are skipped, and rebuilt outputs go through the build cache.

#![warn(missing_docs)]

pub mod atlas;
pub mod definition;
pub mod error;
pub mod loaders;
pub mod orchestrator;
pub mod report;
pub mod texture;

pub use atlas::{AtlasJob, AtlasOutcome, SHARED_BASENAME};
pub use definition::{Definition, Frame};
pub use error::BuildError;
pub use loaders::{
    opaque_bounds, DefinitionLoader, LoadOptions, LoaderRegistry, PngDefLoader, PngLoader, PsdLoader,
};
pub use orchestrator::{is_ignored_file, ResourcePacker, PROCESS_DIR_NAME};
pub use report::{BuildReport, DirectoryOutcome, DirectoryReport};
pub use texture::{GpuTarget, PngTextureConverter, TextureConverter, TextureDescriptor, TextureRequest};
