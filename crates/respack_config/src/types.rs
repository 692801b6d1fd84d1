//! Configuration types deserialized from `respack.toml`.
//!
//! Every section and field is optional; missing values fall back to the
//! defaults below. Values are validated when converted into a
//! [`BuildConfig`](crate::BuildConfig).

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};

/// The whole `respack.toml` document.
#[derive(Debug, Default, Deserialize)]
pub struct ProjectConfig {
    /// Texture packing settings.
    #[serde(default)]
    pub pack: PackSection,
    /// Build cache settings.
    #[serde(default)]
    pub cache: CacheSection,
    /// Archive creation settings.
    #[serde(default)]
    pub archive: ArchiveSection,
}

/// The `[pack]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PackSection {
    /// Algorithm selector: `maxrect`, `maxrect_fast` or `basic`.
    pub algorithm: String,
    /// Largest atlas edge in pixels.
    pub max_texture_size: u32,
    /// Sprite gutter: `0`, `1`, `2`, `4` or `"two-side"`.
    pub margin: MarginValue,
    /// Only produce square atlases.
    pub square: bool,
    /// Pack every definition into its own atlas set.
    pub split: bool,
    /// Crop fully transparent borders from frames.
    pub crop_alpha: bool,
    /// Keep PSD layer names as frame names.
    pub use_layer_names: bool,
    /// Appended to every atlas file name.
    pub texture_postfix: String,
    /// Pass a directory's `flags.txt` tokens down to its subdirectories.
    pub recursive_flags: bool,
    /// Target GPU families.
    #[serde(deserialize_with = "deserialize_string_or_vec")]
    pub gpus: Vec<String>,
    /// Texture conversion quality, 0 (fastest) to 4 (best).
    pub quality: u8,
    /// Remove the output tree when it was changed outside the packer.
    pub clear_output: bool,
    /// Ignore stored digests and rebuild everything.
    pub force_repack: bool,
    /// Square atlases with a fixed 2048 edge.
    pub lightmaps: bool,
}

impl Default for PackSection {
    fn default() -> Self {
        Self {
            algorithm: "maxrect".to_string(),
            max_texture_size: respack_packer::packer::DEFAULT_MAX_SIZE,
            margin: MarginValue::Pixels(1),
            square: false,
            split: false,
            crop_alpha: true,
            use_layer_names: false,
            texture_postfix: String::new(),
            recursive_flags: false,
            gpus: vec!["origin".to_string()],
            quality: 4,
            clear_output: true,
            force_repack: false,
            lightmaps: false,
        }
    }
}

/// The `[cache]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// `host:port` of a cache server.
    pub address: Option<String>,
    /// Local cache directory, used when no address is set.
    pub directory: Option<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Free-text comment stored with every artifact.
    pub comment: String,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            address: None,
            directory: None,
            timeout_ms: 10_000,
            comment: String::new(),
        }
    }
}

/// The `[archive]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArchiveSection {
    /// Codec name: `none`, `fast`, `high` or `rfc1951`.
    pub compression: String,
    /// Include dot-files when collecting directories.
    pub include_hidden: bool,
}

impl Default for ArchiveSection {
    fn default() -> Self {
        Self {
            compression: "high".to_string(),
            include_hidden: false,
        }
    }
}

/// A margin written either as a pixel count or as a keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarginValue {
    /// `margin = 2`
    Pixels(u64),
    /// `margin = "two-side"`
    Text(String),
}

impl MarginValue {
    /// The value as it would appear on the command line.
    pub fn as_text(&self) -> String {
        match self {
            MarginValue::Pixels(px) => px.to_string(),
            MarginValue::Text(s) => s.clone(),
        }
    }
}

impl<'de> Deserialize<'de> for MarginValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MarginVisitor;

        impl<'de> Visitor<'de> for MarginVisitor {
            type Value = MarginValue;

            fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                formatter.write_str("a pixel count or \"two-side\"")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(MarginValue::Pixels(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                u64::try_from(v)
                    .map(MarginValue::Pixels)
                    .map_err(|_| E::custom(format!("negative margin {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(MarginValue::Text(v.to_string()))
            }
        }

        deserializer.deserialize_any(MarginVisitor)
    }
}

fn deserialize_string_or_vec<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<String>, D::Error> {
    struct StringOrVec;

    impl<'de> Visitor<'de> for StringOrVec {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("a string or a list of strings")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(vec![v.to_string()])
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut vec = Vec::new();
            while let Some(val) = seq.next_element::<String>()? {
                vec.push(val);
            }
            Ok(vec)
        }
    }

    deserializer.deserialize_any(StringOrVec)
}
