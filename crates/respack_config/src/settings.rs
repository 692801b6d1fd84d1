//! Resolved build settings.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use respack_packer::{MarginPolicy, PackAlgorithm};

use crate::error::ConfigError;
use crate::flags::PackOverrides;
use crate::gpu::GpuFamily;
use crate::types::ProjectConfig;

/// Highest texture conversion quality level.
pub const MAX_QUALITY: u8 = 4;

/// Fixed atlas edge used in lightmap mode.
const LIGHTMAP_TEXTURE_SIZE: u32 = 2048;

/// Which packing heuristics to try.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlgorithmSelector {
    /// All five MaxRects heuristics.
    #[default]
    MaxRect,
    /// MaxRects best-area-fit only.
    MaxRectFast,
    /// The guillotine packer only.
    Basic,
}

impl AlgorithmSelector {
    /// Heuristics this selector expands to, in the order they are tried.
    pub fn algorithms(self) -> Vec<PackAlgorithm> {
        match self {
            AlgorithmSelector::MaxRect => PackAlgorithm::MAX_RECTS.to_vec(),
            AlgorithmSelector::MaxRectFast => vec![PackAlgorithm::MaxRectsBestAreaFit],
            AlgorithmSelector::Basic => vec![PackAlgorithm::Basic],
        }
    }

    /// Selector name as written on the command line.
    pub fn name(self) -> &'static str {
        match self {
            AlgorithmSelector::MaxRect => "maxrect",
            AlgorithmSelector::MaxRectFast => "maxrect_fast",
            AlgorithmSelector::Basic => "basic",
        }
    }
}

impl fmt::Display for AlgorithmSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AlgorithmSelector {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "maxrect" => Ok(AlgorithmSelector::MaxRect),
            "maxrect_fast" => Ok(AlgorithmSelector::MaxRectFast),
            "basic" => Ok(AlgorithmSelector::Basic),
            _ => Err(ConfigError::InvalidAlgorithm(s.to_string())),
        }
    }
}

/// Parses a margin choice: `0`, `1`, `2`, `4` or `two-side`.
pub fn parse_margin(value: &str) -> Result<MarginPolicy, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "0" => Ok(MarginPolicy::OneSide(0)),
        "1" => Ok(MarginPolicy::OneSide(1)),
        "2" => Ok(MarginPolicy::OneSide(2)),
        "4" => Ok(MarginPolicy::OneSide(4)),
        "two-side" | "two_side" | "2side" => Ok(MarginPolicy::TwoSide),
        _ => Err(ConfigError::InvalidMargin(value.to_string())),
    }
}

/// Pack options in effect for one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackSettings {
    /// Sprite gutter.
    pub margin: MarginPolicy,
    /// Largest atlas edge, a power of two.
    pub max_texture_size: u32,
    /// Only square atlases.
    pub square_only: bool,
    /// One atlas set per definition.
    pub split: bool,
    /// Crop transparent borders from frames.
    pub crop_alpha: bool,
    /// Keep PSD layer names as frame names.
    pub use_layer_names: bool,
    /// Pass this directory's flag tokens on to its subdirectories.
    pub recursive_flags: bool,
    /// Compression options per GPU family.
    pub gpu_params: BTreeMap<GpuFamily, Vec<String>>,
}

impl Default for PackSettings {
    fn default() -> Self {
        Self {
            margin: MarginPolicy::DEFAULT,
            max_texture_size: respack_packer::packer::DEFAULT_MAX_SIZE,
            square_only: false,
            split: false,
            crop_alpha: true,
            use_layer_names: false,
            recursive_flags: false,
            gpu_params: BTreeMap::new(),
        }
    }
}

impl PackSettings {
    /// Returns a copy of `self` with `overrides` applied on top.
    pub fn with_overrides(&self, overrides: &PackOverrides) -> PackSettings {
        let mut gpu_params = self.gpu_params.clone();
        gpu_params.extend(
            overrides
                .gpu_params
                .iter()
                .map(|(gpu, params)| (*gpu, params.clone())),
        );
        PackSettings {
            margin: overrides.margin.unwrap_or(self.margin),
            max_texture_size: overrides.max_texture_size.unwrap_or(self.max_texture_size),
            square_only: self.square_only || overrides.square,
            split: self.split || overrides.split,
            crop_alpha: self.crop_alpha && !overrides.disable_crop_alpha,
            use_layer_names: self.use_layer_names || overrides.use_layer_names,
            recursive_flags: self.recursive_flags || overrides.recursive,
            gpu_params,
        }
    }
}

/// Where build artifacts are cached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSettings {
    /// `host:port` of a cache server.
    pub address: Option<String>,
    /// Local cache directory.
    pub directory: Option<PathBuf>,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Free-text comment stored with every artifact.
    pub comment: String,
}

impl CacheSettings {
    /// Returns `true` if either a server or a directory is configured.
    pub fn is_configured(&self) -> bool {
        self.address.is_some() || self.directory.is_some()
    }
}

/// Options for one packing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Heuristic selection.
    pub algorithm: AlgorithmSelector,
    /// GPU families textures are exported for.
    pub gpus: Vec<GpuFamily>,
    /// Texture conversion quality, 0 to [`MAX_QUALITY`].
    pub quality: u8,
    /// Appended to every atlas file name.
    pub texture_postfix: String,
    /// Remove the output tree when it changed outside the packer.
    pub clear_output: bool,
    /// Ignore stored digests and rebuild everything.
    pub force_repack: bool,
    /// Force square 2048 atlases.
    pub lightmaps: bool,
    /// Settings before any `flags.txt` is applied.
    pub pack: PackSettings,
    /// Flag tokens handed to the root directory.
    pub base_flags: Vec<String>,
    /// Cache location.
    pub cache: CacheSettings,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            algorithm: AlgorithmSelector::default(),
            gpus: vec![GpuFamily::Origin],
            quality: MAX_QUALITY,
            texture_postfix: String::new(),
            clear_output: true,
            force_repack: false,
            lightmaps: false,
            pack: PackSettings::default(),
            base_flags: Vec::new(),
            cache: CacheSettings {
                timeout_ms: 10_000,
                ..CacheSettings::default()
            },
        }
    }
}

impl BuildConfig {
    /// Builds and validates a configuration from a parsed `respack.toml`.
    pub fn from_project(project: &ProjectConfig) -> Result<Self, ConfigError> {
        let pack = &project.pack;
        let gpus = pack
            .gpus
            .iter()
            .map(|name| name.parse())
            .collect::<Result<Vec<GpuFamily>, _>>()?;
        let config = BuildConfig {
            algorithm: pack.algorithm.parse()?,
            gpus,
            quality: pack.quality,
            texture_postfix: pack.texture_postfix.clone(),
            clear_output: pack.clear_output,
            force_repack: pack.force_repack,
            lightmaps: pack.lightmaps,
            pack: PackSettings {
                margin: parse_margin(&pack.margin.as_text())?,
                max_texture_size: pack.max_texture_size,
                square_only: pack.square,
                split: pack.split,
                crop_alpha: pack.crop_alpha,
                use_layer_names: pack.use_layer_names,
                recursive_flags: pack.recursive_flags,
                gpu_params: BTreeMap::new(),
            },
            base_flags: Vec::new(),
            cache: CacheSettings {
                address: project.cache.address.clone(),
                directory: project.cache.directory.as_ref().map(PathBuf::from),
                timeout_ms: project.cache.timeout_ms,
                comment: project.cache.comment.clone(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges that the types alone do not enforce.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let size = self.pack.max_texture_size;
        if !size.is_power_of_two() || size > respack_packer::packer::MAX_SHEET_SIZE {
            return Err(ConfigError::InvalidTextureSize(
                self.pack.max_texture_size.to_string(),
            ));
        }
        if self.texture_postfix.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidPostfix(self.texture_postfix.clone()));
        }
        if self.quality > MAX_QUALITY {
            return Err(ConfigError::ValidationError(format!(
                "quality {} is out of range 0..={MAX_QUALITY}",
                self.quality
            )));
        }
        if self.gpus.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one GPU family is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Heuristics to try.
    pub fn algorithms(&self) -> Vec<PackAlgorithm> {
        self.algorithm.algorithms()
    }

    /// Resolves the settings for a directory whose active flag tokens are `tokens`.
    pub fn settings_for<S: AsRef<str>>(&self, tokens: &[S]) -> Result<PackSettings, ConfigError> {
        let overrides = PackOverrides::from_tokens(tokens)?;
        let mut settings = self.pack.with_overrides(&overrides);
        if self.lightmaps {
            settings.square_only = true;
            settings.max_texture_size = LIGHTMAP_TEXTURE_SIZE;
        }
        Ok(settings)
    }
}
