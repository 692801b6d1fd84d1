//! `respack pack`: incremental sprite packing.
//!
//! Resolves a [`BuildConfig`] from `respack.toml` and the command line,
//! connects the configured build cache and runs the resource packer over the
//! input tree.

use std::error::Error;

use respack_build::{BuildReport, DirectoryOutcome, ResourcePacker};
use respack_cache::BuildCacheClient;
use respack_config::{parse_margin, parse_texture_size, BuildConfig, CacheSettings, ConfigError, GpuFamily};
use tracing::warn;

use crate::project::load_project;
use crate::{GlobalArgs, PackArgs};

/// Runs the `respack pack` command.
///
/// Returns exit code 0 if the build recorded no errors, 1 otherwise.
pub fn run(args: &PackArgs, global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    let project = load_project(global)?;
    let mut config = BuildConfig::from_project(&project)?;
    apply_args(&mut config, args)?;

    let cache = connect_cache(&config.cache);
    let mut packer = ResourcePacker::new(&args.input, &args.output, config).with_cache(cache);
    let report = packer.pack_resources();

    if !global.quiet {
        eprintln!("{}", summary(&report));
    }
    Ok(if report.is_success() { 0 } else { 1 })
}

/// Lays command-line options over the configuration file values.
pub fn apply_args(config: &mut BuildConfig, args: &PackArgs) -> Result<(), ConfigError> {
    if let Some(alg) = &args.alg {
        config.algorithm = alg.parse()?;
    }
    if let Some(tsize) = &args.tsize {
        config.pack.max_texture_size = parse_texture_size(tsize)?;
    }
    if let Some(margin) = &args.margin {
        config.pack.margin = parse_margin(margin)?;
    }
    config.pack.square_only |= args.square;
    config.pack.split |= args.split;
    config.pack.crop_alpha &= !args.disable_crop_alpha;
    config.pack.use_layer_names |= args.use_layer_names;
    config.pack.recursive_flags |= args.recursive;
    if let Some(postfix) = &args.postfix {
        config.texture_postfix = postfix.clone();
    }
    if !args.gpu.is_empty() {
        config.gpus = args
            .gpu
            .iter()
            .map(|name| name.parse())
            .collect::<Result<Vec<GpuFamily>, _>>()?;
    }
    if let Some(quality) = args.quality {
        config.quality = quality;
    }
    config.force_repack |= args.force;
    config.lightmaps |= args.lightmaps;

    if let Some(dir) = &args.cache {
        config.cache.directory = Some(dir.clone());
        config.cache.address = None;
    }
    if let Some(address) = &args.cache_server {
        config.cache.address = Some(address.clone());
        config.cache.directory = None;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.cache.timeout_ms = timeout_ms;
    }
    if let Some(comment) = &args.comment {
        config.cache.comment = comment.clone();
    }
    config.validate()
}

/// Opens the configured cache. A cache that cannot be reached only costs
/// the speedup, so failures fall back to building without one.
fn connect_cache(settings: &CacheSettings) -> BuildCacheClient {
    let client = if let Some(address) = &settings.address {
        BuildCacheClient::remote(address, settings.timeout_ms)
    } else if let Some(dir) = &settings.directory {
        BuildCacheClient::local(dir)
    } else {
        return BuildCacheClient::disabled();
    };
    client.unwrap_or_else(|e| {
        warn!(error = %e, "build cache unavailable, packing without it");
        BuildCacheClient::disabled()
    })
}

fn summary(report: &BuildReport) -> String {
    let status = if report.cancelled {
        "Cancelled"
    } else if report.is_success() {
        "Finished"
    } else {
        "Failed"
    };
    format!(
        "{status}: {} directories ({} rebuilt, {} from cache, {} unchanged, {} cleared), {} error(s)",
        report.directories.len(),
        report.count(DirectoryOutcome::Rebuilt),
        report.count(DirectoryOutcome::CacheHitApplied),
        report.count(DirectoryOutcome::UnchangedSkip),
        report.count(DirectoryOutcome::Cleared),
        report.errors.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cli, Command};
    use clap::Parser;
    use respack_config::AlgorithmSelector;
    use respack_packer::MarginPolicy;
    use std::path::PathBuf;

    fn pack_args(extra: &[&str]) -> PackArgs {
        let argv = ["respack", "pack", "gfx", "out"].iter().chain(extra).copied();
        match Cli::parse_from(argv).command {
            Command::Pack(args) => args,
            _ => panic!("expected Pack command"),
        }
    }

    #[test]
    fn command_line_overrides_config() {
        let mut config = BuildConfig::default();
        let args = pack_args(&[
            "--alg",
            "basic",
            "--tsize",
            "512",
            "--margin",
            "two-side",
            "--square",
            "--disable-crop-alpha",
            "--gpu",
            "mali",
            "--force",
            "--cache",
            "cache",
        ]);
        apply_args(&mut config, &args).unwrap();
        assert_eq!(config.algorithm, AlgorithmSelector::Basic);
        assert_eq!(config.pack.max_texture_size, 512);
        assert_eq!(config.pack.margin, MarginPolicy::TwoSide);
        assert!(config.pack.square_only);
        assert!(!config.pack.crop_alpha);
        assert_eq!(config.gpus, vec![GpuFamily::Mali]);
        assert!(config.force_repack);
        assert_eq!(config.cache.directory, Some(PathBuf::from("cache")));
    }

    #[test]
    fn untouched_options_keep_config_values() {
        let mut config = BuildConfig::default();
        config.pack.split = true;
        config.texture_postfix = "_hd".to_string();
        apply_args(&mut config, &pack_args(&[])).unwrap();
        assert!(config.pack.split);
        assert_eq!(config.texture_postfix, "_hd");
        assert!(config.pack.crop_alpha);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = BuildConfig::default();
        assert!(matches!(
            apply_args(&mut config, &pack_args(&["--tsize", "300"])),
            Err(ConfigError::InvalidTextureSize(_))
        ));
        let mut config = BuildConfig::default();
        assert!(apply_args(&mut config, &pack_args(&["--postfix", "a b"])).is_err());
        let mut config = BuildConfig::default();
        assert!(apply_args(&mut config, &pack_args(&["--gpu", "voodoo"])).is_err());
    }

    #[test]
    fn unreachable_server_disables_the_cache() {
        let settings = CacheSettings {
            address: Some("127.0.0.1:1".to_string()),
            timeout_ms: 200,
            ..CacheSettings::default()
        };
        assert!(!connect_cache(&settings).is_usable());
        assert!(!connect_cache(&CacheSettings::default()).is_usable());
    }

    #[test]
    fn packs_a_small_tree() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("gfx");
        std::fs::create_dir(&input).unwrap();
        std::fs::write(input.join("notes.yaml"), "a: 1\n").unwrap();
        let args = match Cli::parse_from([
            "respack",
            "pack",
            input.to_str().unwrap(),
            dir.path().join("out").to_str().unwrap(),
        ])
        .command
        {
            Command::Pack(args) => args,
            _ => panic!("expected Pack command"),
        };
        let config_path = dir.path().join("respack.toml");
        std::fs::write(&config_path, "").unwrap();
        let global = GlobalArgs {
            quiet: true,
            verbose: false,
            config: Some(config_path),
        };
        assert_eq!(run(&args, &global).unwrap(), 0);
        assert!(dir.path().join("out/notes.yaml").is_file());
    }
}
