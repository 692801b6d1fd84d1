//! Definition loaders, dispatched by file extension.
//!
//! The [`LoaderRegistry`] maps a lowercase extension to a
//! [`DefinitionLoader`]. Files with an extension nobody claims are copied to
//! the output verbatim by the walk.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{imageops, RgbaImage};
use respack_config::PackSettings;
use tracing::{debug, warn};

use crate::definition::{stem_of, Definition, Frame};
use crate::error::BuildError;

/// Settings a loader may consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Largest atlas edge.
    pub max_texture_size: u32,
    /// Keep cropped frame offsets.
    pub crop_alpha: bool,
    /// Name frames after PSD layers.
    pub use_layer_names: bool,
}

impl From<&PackSettings> for LoadOptions {
    fn from(settings: &PackSettings) -> Self {
        Self {
            max_texture_size: settings.max_texture_size,
            crop_alpha: settings.crop_alpha,
            use_layer_names: settings.use_layer_names,
        }
    }
}

/// Turns one source file into a [`Definition`].
pub trait DefinitionLoader: Send + Sync {
    /// Loads `path`.
    fn load(&self, path: &Path, options: &LoadOptions) -> Result<Definition, BuildError>;

    /// Sibling files consumed by loading `path`; the walk does not load
    /// or copy them on their own.
    fn claimed_sources(&self, _path: &Path) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Extension to loader map.
#[derive(Clone, Default)]
pub struct LoaderRegistry {
    loaders: BTreeMap<String, Arc<dyn DefinitionLoader>>,
}

impl LoaderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// `png`, `pngdef` and `psd`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("png", Arc::new(PngLoader));
        registry.register("pngdef", Arc::new(PngDefLoader));
        registry.register("psd", Arc::new(PsdLoader));
        registry
    }

    /// Adds or replaces the loader for `extension` (without the dot).
    pub fn register(&mut self, extension: &str, loader: Arc<dyn DefinitionLoader>) {
        self.loaders.insert(extension.to_ascii_lowercase(), loader);
    }

    /// Loader for `path`, if its extension is registered.
    pub fn loader_for(&self, path: &Path) -> Option<&dyn DefinitionLoader> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.loaders.get(&ext).map(|l| l.as_ref())
    }

    /// Registered extensions in sorted order.
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.loaders.keys().map(String::as_str)
    }

    /// Every sibling claimed by a loadable file in `files`.
    pub fn claimed_sources(&self, files: &[PathBuf]) -> BTreeSet<PathBuf> {
        files
            .iter()
            .filter_map(|f| self.loader_for(f).map(|l| l.claimed_sources(f)))
            .flatten()
            .collect()
    }
}

impl fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderRegistry")
            .field("extensions", &self.loaders.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A plain PNG: one frame covering the whole image.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngLoader;

impl DefinitionLoader for PngLoader {
    fn load(&self, path: &Path, _options: &LoadOptions) -> Result<Definition, BuildError> {
        let pixels = read_rgba(path)?;
        let (w, h) = pixels.dimensions();
        Ok(Definition::new(path, w, h, vec![Frame::new("", 0, 0, pixels)]))
    }
}

/// A `.pngdef` text file naming the frame count of its sibling `.png`
/// strip. Each frame is cropped to its non-transparent bounds.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngDefLoader;

impl DefinitionLoader for PngDefLoader {
    fn load(&self, path: &Path, _options: &LoadOptions) -> Result<Definition, BuildError> {
        let text = fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
        let invalid = |reason: &str| BuildError::InvalidDefinition {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };
        let frame_count: u32 = text
            .split_whitespace()
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| invalid("missing frame count"))?;
        if frame_count == 0 {
            return Err(invalid("frame count is zero"));
        }

        let strip = read_rgba(&path.with_extension("png"))?;
        let sprite_width = strip.width() / frame_count;
        let sprite_height = strip.height();
        if sprite_width == 0 || sprite_height == 0 {
            return Err(invalid("image is smaller than the frame count"));
        }
        debug!(
            file = %path.display(),
            frame_count,
            sprite_width,
            sprite_height,
            "loading png definition"
        );

        let frames = (0..frame_count)
            .map(|k| {
                let cell = imageops::crop_imm(&strip, k * sprite_width, 0, sprite_width, sprite_height).to_image();
                let (x, y, w, h) = opaque_bounds(&cell);
                let pixels = imageops::crop_imm(&cell, x, y, w, h).to_image();
                Frame::new("", x, y, pixels)
            })
            .collect();
        Ok(Definition::new(path, sprite_width, sprite_height, frames))
    }

    fn claimed_sources(&self, path: &Path) -> Vec<PathBuf> {
        vec![path.with_extension("png")]
    }
}

/// A layered PSD: one frame per layer at the layer's position.
#[derive(Debug, Clone, Copy, Default)]
pub struct PsdLoader;

impl DefinitionLoader for PsdLoader {
    fn load(&self, path: &Path, options: &LoadOptions) -> Result<Definition, BuildError> {
        let bytes = fs::read(path).map_err(|e| BuildError::io(path, e))?;
        let psd = psd::Psd::from_bytes(&bytes).map_err(|e| BuildError::Psd {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let (sprite_width, sprite_height) = (psd.width(), psd.height());

        let mut frames = Vec::with_capacity(psd.layers().len());
        for (index, layer) in psd.layers().iter().enumerate() {
            let layer_name = layer.name().to_string();
            let mut width = u32::from(layer.width());
            let mut height = u32::from(layer.height());
            if width == 0 || height == 0 {
                return Err(BuildError::EmptyLayer {
                    path: path.to_path_buf(),
                    index,
                    name: layer_name,
                });
            }

            if !options.crop_alpha {
                if width > options.max_texture_size || height > options.max_texture_size {
                    warn!(
                        file = %path.display(),
                        layer = index,
                        "layer is bigger than the max texture size, reduced to the sprite size"
                    );
                    width = sprite_width;
                    height = sprite_height;
                } else {
                    width = width.min(sprite_width);
                    height = height.min(sprite_height);
                }
            }

            let canvas = RgbaImage::from_raw(sprite_width, sprite_height, layer.rgba()).ok_or_else(|| {
                BuildError::Psd {
                    path: path.to_path_buf(),
                    reason: format!("layer {index} has a truncated pixel buffer"),
                }
            })?;
            let left = u32::try_from(layer.layer_left()).unwrap_or(0);
            let top = u32::try_from(layer.layer_top()).unwrap_or(0);
            let pixels = imageops::crop_imm(&canvas, left, top, width, height).to_image();
            if pixels.width() == 0 || pixels.height() == 0 {
                return Err(BuildError::EmptyLayer {
                    path: path.to_path_buf(),
                    index,
                    name: layer_name,
                });
            }

            let name = if options.use_layer_names && !layer_name.is_empty() {
                layer_name
            } else {
                format!("frame{index}")
            };
            frames.push(Frame::new(name, left, top, pixels));
        }

        if frames.is_empty() {
            return Err(BuildError::InvalidDefinition {
                path: path.to_path_buf(),
                reason: "no layers".to_string(),
            });
        }
        debug!(file = %path.display(), layers = frames.len(), name = %stem_of(path), "loaded psd");
        Ok(Definition::new(path, sprite_width, sprite_height, frames))
    }
}

fn read_rgba(path: &Path) -> Result<RgbaImage, BuildError> {
    let image = image::open(path).map_err(|source| BuildError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(image.to_rgba8())
}

/// Bounds `(x, y, w, h)` of the pixels with non-zero alpha. A fully
/// transparent image yields a single pixel at the origin.
pub fn opaque_bounds(image: &RgbaImage) -> (u32, u32, u32, u32) {
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0;
    let mut max_y = 0;
    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[3] != 0 {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }
    if min_x == u32::MAX {
        return (0, 0, 1, 1);
    }
    (min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
}
