//! Per-directory flag tokens.
//!
//! A source directory may contain a `flags.txt` holding space-separated
//! tokens such as `--add2pixel --tsize 1024 --split`. The tokens replace the
//! inherited set for that directory; they are parsed here into a
//! [`PackOverrides`] value.

use std::collections::BTreeMap;
use std::path::Path;

use respack_packer::packer::MAX_SHEET_SIZE;
use respack_packer::MarginPolicy;
use tracing::debug;

use crate::error::ConfigError;
use crate::gpu::GpuFamily;

/// Pack options overridden by a flag token set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackOverrides {
    /// `--add0pixel`, `--add1pixel`, `--add2pixel`, `--add4pixel` or `--add2sidepixel`.
    pub margin: Option<MarginPolicy>,
    /// `--tsize N`.
    pub max_texture_size: Option<u32>,
    /// `--square`.
    pub square: bool,
    /// `--split`.
    pub split: bool,
    /// `--disableCropAlpha`.
    pub disable_crop_alpha: bool,
    /// `--useLayerNames`.
    pub use_layer_names: bool,
    /// `--recursive`.
    pub recursive: bool,
    /// `--<gpu> <params...>`, e.g. `--PowerVR_iOS PVR4`.
    pub gpu_params: BTreeMap<GpuFamily, Vec<String>>,
}

impl PackOverrides {
    /// Parses a token list.
    ///
    /// Unknown tokens are ignored. Two different margin tokens in the same
    /// set are rejected.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Self, ConfigError> {
        let mut overrides = PackOverrides::default();
        let mut margin_token: Option<&str> = None;
        let mut i = 0;

        while i < tokens.len() {
            let token = tokens[i].as_ref();
            i += 1;

            if let Some(margin) = margin_for_token(token) {
                match margin_token {
                    Some(first) if first != token => {
                        return Err(ConfigError::ConflictingMargin {
                            first: first.to_string(),
                            second: token.to_string(),
                        });
                    }
                    _ => {
                        margin_token = Some(token);
                        overrides.margin = Some(margin);
                    }
                }
                continue;
            }

            match token {
                "--tsize" => {
                    let value = tokens.get(i).map(AsRef::as_ref).unwrap_or_default();
                    i += 1;
                    overrides.max_texture_size = Some(parse_texture_size(value)?);
                }
                "--tsize2048" => overrides.max_texture_size = Some(2048),
                "--square" => overrides.square = true,
                "--split" => overrides.split = true,
                "--disableCropAlpha" => overrides.disable_crop_alpha = true,
                "--useLayerNames" => overrides.use_layer_names = true,
                "--recursive" => overrides.recursive = true,
                other => match other.strip_prefix("--").map(str::parse::<GpuFamily>) {
                    Some(Ok(gpu)) => {
                        let mut params = Vec::new();
                        while let Some(param) = tokens.get(i).map(AsRef::as_ref) {
                            if param.starts_with("--") {
                                break;
                            }
                            params.push(param.to_string());
                            i += 1;
                        }
                        overrides.gpu_params.insert(gpu, params);
                    }
                    _ => debug!(token = other, "ignoring unknown flag token"),
                },
            }
        }
        Ok(overrides)
    }
}

fn margin_for_token(token: &str) -> Option<MarginPolicy> {
    match token {
        "--add0pixel" => Some(MarginPolicy::OneSide(0)),
        "--add1pixel" => Some(MarginPolicy::OneSide(1)),
        "--add2pixel" => Some(MarginPolicy::OneSide(2)),
        "--add4pixel" => Some(MarginPolicy::OneSide(4)),
        "--add2sidepixel" => Some(MarginPolicy::TwoSide),
        _ => None,
    }
}

/// Parses a texture size that must be a power of two no larger than
/// [`MAX_SHEET_SIZE`].
pub fn parse_texture_size(value: &str) -> Result<u32, ConfigError> {
    value
        .parse::<u32>()
        .ok()
        .filter(|size| size.is_power_of_two() && *size <= MAX_SHEET_SIZE)
        .ok_or_else(|| ConfigError::InvalidTextureSize(value.to_string()))
}

/// Reads the tokens of a `flags.txt` file.
///
/// Only the first line carries flags; anything after it is ignored.
pub fn read_flags_file(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let first_line = content.lines().next().unwrap_or_default();
    Ok(first_line.split_whitespace().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tokens_override_nothing() {
        let overrides = PackOverrides::from_tokens::<&str>(&[]).unwrap();
        assert_eq!(overrides, PackOverrides::default());
    }

    #[test]
    fn parses_common_flags() {
        let overrides = PackOverrides::from_tokens(&[
            "--add2pixel",
            "--tsize",
            "1024",
            "--split",
            "--disableCropAlpha",
            "--recursive",
        ])
        .unwrap();
        assert_eq!(overrides.margin, Some(MarginPolicy::OneSide(2)));
        assert_eq!(overrides.max_texture_size, Some(1024));
        assert!(overrides.split);
        assert!(overrides.disable_crop_alpha);
        assert!(overrides.recursive);
        assert!(!overrides.square);
    }

    #[test]
    fn gpu_flag_collects_params() {
        let overrides =
            PackOverrides::from_tokens(&["--PowerVR_iOS", "PVR4", "--mali", "ETC1", "png", "--square"])
                .unwrap();
        assert_eq!(overrides.gpu_params[&GpuFamily::PowerVrIos], vec!["PVR4"]);
        assert_eq!(overrides.gpu_params[&GpuFamily::Mali], vec!["ETC1", "png"]);
        assert!(overrides.square);
    }

    #[test]
    fn conflicting_margins_are_rejected() {
        let err = PackOverrides::from_tokens(&["--add0pixel", "--add2sidepixel"]).unwrap_err();
        assert!(matches!(err, ConfigError::ConflictingMargin { .. }));
    }

    #[test]
    fn repeated_margin_is_not_a_conflict() {
        let overrides = PackOverrides::from_tokens(&["--add4pixel", "--add4pixel"]).unwrap();
        assert_eq!(overrides.margin, Some(MarginPolicy::OneSide(4)));
    }

    #[test]
    fn bad_texture_size_is_rejected() {
        let err = PackOverrides::from_tokens(&["--tsize", "1000"]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTextureSize(v) if v == "1000"));
        let err = PackOverrides::from_tokens(&["--tsize"]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTextureSize(_)));
        let err = PackOverrides::from_tokens(&["--tsize", "2147483648"]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTextureSize(v) if v == "2147483648"));
        assert_eq!(parse_texture_size("65536").unwrap(), 65536);
        assert!(parse_texture_size("131072").is_err());
    }

    #[test]
    fn unknown_tokens_are_ignored() {
        let overrides = PackOverrides::from_tokens(&["--teapot", "stray", "--square"]).unwrap();
        assert!(overrides.square);
        assert!(overrides.gpu_params.is_empty());
    }

    #[test]
    fn reads_flags_file_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flags.txt");
        std::fs::write(&path, "--add0pixel  --split\n").unwrap();
        assert_eq!(read_flags_file(&path).unwrap(), vec!["--add0pixel", "--split"]);
    }

    #[test]
    fn flags_file_lines_after_the_first_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flags.txt");
        std::fs::write(&path, "--split\r\nnotes: --add4pixel here\n--square\n").unwrap();
        assert_eq!(read_flags_file(&path).unwrap(), vec!["--split"]);

        std::fs::write(&path, "").unwrap();
        assert!(read_flags_file(&path).unwrap().is_empty());
    }
}
