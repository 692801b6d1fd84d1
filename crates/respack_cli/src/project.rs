//! Locating and loading `respack.toml`.

use std::error::Error;
use std::fs;
use std::path::Path;

use respack_config::{load_config, load_config_from_str, ProjectConfig};
use tracing::debug;

use crate::GlobalArgs;

/// Loads the project configuration.
///
/// An explicit `--config` file must exist. Otherwise `respack.toml` is looked
/// up in the current directory, and its absence yields the defaults.
pub fn load_project(global: &GlobalArgs) -> Result<ProjectConfig, Box<dyn Error>> {
    match &global.config {
        Some(path) => load_file(path),
        None => {
            let dir = std::env::current_dir()?;
            debug!(dir = %dir.display(), "looking for respack.toml");
            Ok(load_config(&dir)?)
        }
    }
}

fn load_file(path: &Path) -> Result<ProjectConfig, Box<dyn Error>> {
    let content =
        fs::read_to_string(path).map_err(|e| format!("cannot read config file '{}': {e}", path.display()))?;
    debug!(file = %path.display(), "loaded configuration");
    Ok(load_config_from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global(config: Option<&Path>) -> GlobalArgs {
        GlobalArgs {
            quiet: false,
            verbose: false,
            config: config.map(Path::to_path_buf),
        }
    }

    #[test]
    fn explicit_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "[pack]\nalgorithm = \"basic\"\n").unwrap();
        let project = load_project(&global(Some(&path))).unwrap();
        assert_eq!(project.pack.algorithm, "basic");
    }

    #[test]
    fn missing_explicit_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_project(&global(Some(&dir.path().join("nope.toml")))).unwrap_err();
        assert!(err.to_string().contains("cannot read config file"));
    }

    #[test]
    fn invalid_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[pack]\nmax_texture_size = 100\n").unwrap();
        assert!(load_project(&global(Some(&path))).is_err());
    }
}
