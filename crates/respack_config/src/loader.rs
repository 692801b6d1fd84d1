//! Configuration file loading and validation.

use std::path::Path;

use crate::error::ConfigError;
use crate::settings::BuildConfig;
use crate::types::ProjectConfig;

/// File name looked up in the project directory.
pub const CONFIG_FILE_NAME: &str = "respack.toml";

const COMPRESSION_NAMES: [&str; 7] = ["none", "fast", "high", "rfc1951", "lz4", "lz4hc", "deflate"];

/// Loads and validates `<project_dir>/respack.toml`.
///
/// A missing file yields the default configuration.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE_NAME);
    if !config_path.is_file() {
        return Ok(ProjectConfig::default());
    }
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates `respack.toml` content.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    BuildConfig::from_project(config)?;
    let compression = config.archive.compression.to_ascii_lowercase();
    if !COMPRESSION_NAMES.contains(&compression.as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "unknown archive compression '{}'",
            config.archive.compression
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.pack.algorithm, "maxrect");
    }

    #[test]
    fn loads_file_from_project_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[pack]\nsplit = true\n[archive]\ncompression = \"rfc1951\"\n",
        )
        .unwrap();
        let config = load_config(dir.path()).unwrap();
        assert!(config.pack.split);
        assert_eq!(config.archive.compression, "rfc1951");
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn non_power_of_two_size_errors() {
        let err = load_config_from_str("[pack]\nmax_texture_size = 1000\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTextureSize(_)));
    }

    #[test]
    fn unknown_algorithm_errors() {
        let err = load_config_from_str("[pack]\nalgorithm = \"skyline\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAlgorithm(_)));
    }

    #[test]
    fn unknown_gpu_errors() {
        let err = load_config_from_str("[pack]\ngpus = [\"voodoo\"]\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownGpu(_)));
    }

    #[test]
    fn unknown_compression_errors() {
        let err = load_config_from_str("[archive]\ncompression = \"brotli\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn legacy_compression_names_are_accepted() {
        let config = load_config_from_str("[archive]\ncompression = \"lz4hc\"\n").unwrap();
        assert_eq!(config.archive.compression, "lz4hc");
        assert!(load_config_from_str("[archive]\ncompression = \"fast\"\n").is_ok());
    }

    #[test]
    fn quality_out_of_range_errors() {
        let err = load_config_from_str("[pack]\nquality = 9\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }
}
