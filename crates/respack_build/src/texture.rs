//! Texture export seam.
//!
//! A composed atlas is handed to a [`TextureConverter`] together with the
//! GPU targets it is built for. [`PngTextureConverter`] writes the atlas as
//! a PNG plus a JSON `.tex` descriptor; GPU-specific encoding belongs to
//! other converters.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use respack_config::GpuFamily;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::BuildError;

/// Version of the `.tex` descriptor format.
pub const DESCRIPTOR_VERSION: u32 = 1;

/// Extension of texture descriptors.
pub const DESCRIPTOR_EXTENSION: &str = "tex";

/// What to export an atlas for.
#[derive(Debug, Clone, Copy)]
pub struct TextureRequest<'a> {
    /// GPU targets.
    pub gpus: &'a [GpuFamily],
    /// Conversion quality.
    pub quality: u8,
    /// Compression options per GPU, from `flags.txt`.
    pub gpu_params: &'a BTreeMap<GpuFamily, Vec<String>>,
}

impl TextureRequest<'_> {
    /// Options for each requested GPU. Device GPUs must have options.
    pub fn targets(&self) -> Result<Vec<GpuTarget>, BuildError> {
        self.gpus
            .iter()
            .map(|gpu| match self.gpu_params.get(gpu) {
                Some(params) => Ok(GpuTarget {
                    gpu: gpu.name().to_string(),
                    params: params.clone(),
                }),
                None if gpu.is_device() => Err(BuildError::MissingGpuOptions(gpu.name().to_string())),
                None => Ok(GpuTarget {
                    gpu: gpu.name().to_string(),
                    params: Vec::new(),
                }),
            })
            .collect()
    }
}

/// One GPU entry in a texture descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuTarget {
    /// GPU family name.
    pub gpu: String,
    /// Compression options as given in `flags.txt`.
    pub params: Vec<String>,
}

/// Contents of a `.tex` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureDescriptor {
    /// [`DESCRIPTOR_VERSION`] at the time of writing.
    pub version: u32,
    /// Image file next to the descriptor.
    pub image: String,
    /// Atlas width.
    pub width: u32,
    /// Atlas height.
    pub height: u32,
    /// Conversion quality.
    pub quality: u8,
    /// GPU targets.
    pub gpus: Vec<GpuTarget>,
}

/// Writes a composed atlas to disk.
pub trait TextureConverter: Send + Sync {
    /// Writes `image` for `request` at `path_without_extension` and returns
    /// the files created.
    fn convert(
        &self,
        image: &RgbaImage,
        request: &TextureRequest<'_>,
        path_without_extension: &Path,
    ) -> Result<Vec<PathBuf>, BuildError>;
}

/// Writes `<name>.png` and `<name>.tex`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngTextureConverter;

impl TextureConverter for PngTextureConverter {
    fn convert(
        &self,
        image: &RgbaImage,
        request: &TextureRequest<'_>,
        path_without_extension: &Path,
    ) -> Result<Vec<PathBuf>, BuildError> {
        let gpus = request.targets()?;
        let png_path = with_suffix(path_without_extension, "png");
        image.save(&png_path).map_err(|source| BuildError::Image {
            path: png_path.clone(),
            source,
        })?;

        let descriptor = TextureDescriptor {
            version: DESCRIPTOR_VERSION,
            image: png_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            width: image.width(),
            height: image.height(),
            quality: request.quality,
            gpus,
        };
        let tex_path = with_suffix(path_without_extension, DESCRIPTOR_EXTENSION);
        let json = serde_json::to_string_pretty(&descriptor).map_err(|e| BuildError::Serialization {
            path: tex_path.clone(),
            reason: e.to_string(),
        })?;
        std::fs::write(&tex_path, json).map_err(|e| BuildError::io(&tex_path, e))?;
        debug!(texture = %tex_path.display(), width = image.width(), height = image.height(), "texture written");
        Ok(vec![png_path, tex_path])
    }
}

/// Appends `.ext` without replacing anything after a dot in the name.
fn with_suffix(path: &Path, ext: &str) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_gpu_needs_options() {
        let params = BTreeMap::new();
        let request = TextureRequest {
            gpus: &[GpuFamily::Origin, GpuFamily::Mali],
            quality: 4,
            gpu_params: &params,
        };
        let err = request.targets().unwrap_err();
        assert_eq!(err.to_string(), "Cannot read compression options for GPU 'mali'");
    }

    #[test]
    fn writes_png_and_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let mut params = BTreeMap::new();
        params.insert(GpuFamily::Mali, vec!["ETC1".to_string()]);
        let request = TextureRequest {
            gpus: &[GpuFamily::Origin, GpuFamily::Mali],
            quality: 2,
            gpu_params: &params,
        };
        let image = RgbaImage::new(16, 8);
        let files = PngTextureConverter
            .convert(&image, &request, &dir.path().join("texture0.hd"))
            .unwrap();
        assert_eq!(files, [dir.path().join("texture0.hd.png"), dir.path().join("texture0.hd.tex")]);

        let text = std::fs::read_to_string(&files[1]).unwrap();
        let descriptor: TextureDescriptor = serde_json::from_str(&text).unwrap();
        assert_eq!(descriptor.image, "texture0.hd.png");
        assert_eq!((descriptor.width, descriptor.height, descriptor.quality), (16, 8, 2));
        assert_eq!(descriptor.gpus[1].gpu, "mali");
        assert_eq!(descriptor.gpus[1].params, ["ETC1"]);
    }
}
