//! Respack CLI, the command-line front end of the resource packer.
//!
//! Provides `respack pack` for incremental sprite packing, `respack archive`,
//! `respack unpack` and `respack list` for resource archives, and
//! `respack cache-server` for sharing build artifacts between machines.

#![warn(missing_docs)]

mod archive;
mod cache_server;
mod pack;
mod project;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Respack, an incremental sprite packer and resource archiver.
#[derive(Parser, Debug)]
#[command(name = "respack", version, about = "Respack resource packer")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a custom `respack.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Pack an input tree of sprites into atlases.
    Pack(PackArgs),
    /// Create a resource archive.
    Archive(ArchiveArgs),
    /// Extract every file of an archive.
    Unpack(UnpackArgs),
    /// List the contents of an archive.
    List(ListArgs),
    /// Serve a local build cache over TCP.
    CacheServer(CacheServerArgs),
}

/// Arguments for the `respack pack` subcommand.
#[derive(Parser, Debug)]
pub struct PackArgs {
    /// Input directory with PSD, PNG and `.pngdef` sources.
    pub input: PathBuf,

    /// Output directory for atlases, descriptors and copied files.
    pub output: PathBuf,

    /// Packing algorithm: `maxrect`, `maxrect_fast` or `basic`.
    #[arg(long)]
    pub alg: Option<String>,

    /// Largest atlas edge, a power of two.
    #[arg(long)]
    pub tsize: Option<String>,

    /// Sprite gutter: `0`, `1`, `2`, `4` or `two-side`.
    #[arg(long)]
    pub margin: Option<String>,

    /// Only produce square atlases.
    #[arg(long)]
    pub square: bool,

    /// Pack every definition into its own atlas set.
    #[arg(long)]
    pub split: bool,

    /// Keep transparent frame borders.
    #[arg(long)]
    pub disable_crop_alpha: bool,

    /// Keep PSD layer names as frame names.
    #[arg(long)]
    pub use_layer_names: bool,

    /// Appended to every atlas file name.
    #[arg(long)]
    pub postfix: Option<String>,

    /// Pass `flags.txt` tokens down to subdirectories.
    #[arg(long)]
    pub recursive: bool,

    /// Target GPU families.
    #[arg(long, num_args = 1..)]
    pub gpu: Vec<String>,

    /// Texture conversion quality, 0 to 4.
    #[arg(long)]
    pub quality: Option<u8>,

    /// Ignore stored digests and rebuild everything.
    #[arg(long)]
    pub force: bool,

    /// Local cache directory.
    #[arg(long, conflicts_with = "cache_server")]
    pub cache: Option<PathBuf>,

    /// Cache server address (`host:port`).
    #[arg(long)]
    pub cache_server: Option<String>,

    /// Cache request timeout in milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Comment stored with every cached artifact.
    #[arg(long)]
    pub comment: Option<String>,

    /// Square 2048 atlases for lightmaps.
    #[arg(long)]
    pub lightmaps: bool,
}

/// Arguments for the `respack archive` subcommand.
#[derive(Parser, Debug)]
pub struct ArchiveArgs {
    /// Archive file to create.
    pub archive: PathBuf,

    /// Files and directories to add.
    #[arg(required = true)]
    pub sources: Vec<PathBuf>,

    /// Directory archive paths are relative to.
    #[arg(long)]
    pub base_dir: Option<PathBuf>,

    /// Codec: `none`, `fast`, `high` or `rfc1951` (`lz4` and `lz4hc` are aliases).
    #[arg(long)]
    pub compression: Option<String>,

    /// Include dot-files.
    #[arg(long)]
    pub hidden: bool,
}

/// Arguments for the `respack unpack` subcommand.
#[derive(Parser, Debug)]
pub struct UnpackArgs {
    /// Archive to read.
    pub archive: PathBuf,

    /// Destination directory.
    pub dest: PathBuf,
}

/// Arguments for the `respack list` subcommand.
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Archive to read.
    pub archive: PathBuf,
}

/// Arguments for the `respack cache-server` subcommand.
#[derive(Parser, Debug)]
pub struct CacheServerArgs {
    /// Storage directory.
    #[arg(long)]
    pub dir: PathBuf,

    /// TCP port to listen on.
    #[arg(long, default_value_t = respack_cache::server::DEFAULT_PORT)]
    pub port: u16,

    /// Storage limit in megabytes; least recently used entries are evicted.
    #[arg(long)]
    pub max_size_mb: Option<u64>,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a custom config file.
    pub config: Option<PathBuf>,
}

impl GlobalArgs {
    /// Default log filter for these flags.
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            "error"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}

fn init_logging(global: &GlobalArgs) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(global.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };
    init_logging(&global);

    let result = match cli.command {
        Command::Pack(ref args) => pack::run(args, &global),
        Command::Archive(ref args) => archive::create(args, &global),
        Command::Unpack(ref args) => archive::unpack(args, &global),
        Command::List(ref args) => archive::list(args),
        Command::CacheServer(ref args) => cache_server::run(args),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_pack_default() {
        let cli = Cli::parse_from(["respack", "pack", "gfx", "data/gfx"]);
        match cli.command {
            Command::Pack(ref args) => {
                assert_eq!(args.input, PathBuf::from("gfx"));
                assert_eq!(args.output, PathBuf::from("data/gfx"));
                assert!(args.alg.is_none());
                assert!(args.gpu.is_empty());
                assert!(!args.force);
                assert!(args.cache.is_none());
            }
            _ => panic!("expected Pack command"),
        }
    }

    #[test]
    fn parse_pack_with_options() {
        let cli = Cli::parse_from([
            "respack",
            "pack",
            "gfx",
            "out",
            "--alg",
            "maxrect_fast",
            "--tsize",
            "1024",
            "--margin",
            "two-side",
            "--split",
            "--disable-crop-alpha",
            "--postfix",
            "_hd",
            "--gpu",
            "origin",
            "mali",
            "--quality",
            "2",
            "--cache",
            "/tmp/cache",
        ]);
        match cli.command {
            Command::Pack(ref args) => {
                assert_eq!(args.alg.as_deref(), Some("maxrect_fast"));
                assert_eq!(args.tsize.as_deref(), Some("1024"));
                assert_eq!(args.margin.as_deref(), Some("two-side"));
                assert!(args.split);
                assert!(args.disable_crop_alpha);
                assert_eq!(args.postfix.as_deref(), Some("_hd"));
                assert_eq!(args.gpu, vec!["origin", "mali"]);
                assert_eq!(args.quality, Some(2));
                assert_eq!(args.cache, Some(PathBuf::from("/tmp/cache")));
            }
            _ => panic!("expected Pack command"),
        }
    }

    #[test]
    fn cache_dir_and_server_conflict() {
        let result = Cli::try_parse_from([
            "respack",
            "pack",
            "gfx",
            "out",
            "--cache",
            "c",
            "--cache-server",
            "host:44234",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn parse_archive() {
        let cli = Cli::parse_from([
            "respack",
            "archive",
            "data.pak",
            "gfx",
            "sfx",
            "--base-dir",
            ".",
            "--compression",
            "rfc1951",
            "--hidden",
        ]);
        match cli.command {
            Command::Archive(ref args) => {
                assert_eq!(args.archive, PathBuf::from("data.pak"));
                assert_eq!(args.sources.len(), 2);
                assert_eq!(args.base_dir, Some(PathBuf::from(".")));
                assert_eq!(args.compression.as_deref(), Some("rfc1951"));
                assert!(args.hidden);
            }
            _ => panic!("expected Archive command"),
        }
    }

    #[test]
    fn archive_requires_sources() {
        assert!(Cli::try_parse_from(["respack", "archive", "data.pak"]).is_err());
    }

    #[test]
    fn parse_unpack_and_list() {
        let cli = Cli::parse_from(["respack", "unpack", "data.pak", "out"]);
        match cli.command {
            Command::Unpack(ref args) => assert_eq!(args.dest, PathBuf::from("out")),
            _ => panic!("expected Unpack command"),
        }
        let cli = Cli::parse_from(["respack", "list", "data.pak"]);
        match cli.command {
            Command::List(ref args) => assert_eq!(args.archive, PathBuf::from("data.pak")),
            _ => panic!("expected List command"),
        }
    }

    #[test]
    fn parse_cache_server_defaults() {
        let cli = Cli::parse_from(["respack", "cache-server", "--dir", "/srv/cache"]);
        match cli.command {
            Command::CacheServer(ref args) => {
                assert_eq!(args.port, respack_cache::server::DEFAULT_PORT);
                assert!(args.max_size_mb.is_none());
            }
            _ => panic!("expected CacheServer command"),
        }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::parse_from(["respack", "--verbose", "list", "a.pak"]);
        assert!(cli.verbose);
        assert!(!cli.quiet);
        let cli = Cli::parse_from(["respack", "list", "a.pak", "--quiet", "--config", "r.toml"]);
        assert!(cli.quiet);
        assert_eq!(cli.config, Some(PathBuf::from("r.toml")));
        assert!(Cli::try_parse_from(["respack", "-q", "-v", "list", "a.pak"]).is_err());
    }

    #[test]
    fn log_filter_follows_flags() {
        let global = |quiet, verbose| GlobalArgs {
            quiet,
            verbose,
            config: None,
        };
        assert_eq!(global(false, false).log_filter(), "info");
        assert_eq!(global(false, true).log_filter(), "debug");
        assert_eq!(global(true, false).log_filter(), "error");
    }
}
