//! `respack archive`, `respack unpack` and `respack list`.

use std::error::Error;

use respack_archive::{build_archive, collect_files, CompressionType, ResourceArchive};

use crate::project::load_project;
use crate::{ArchiveArgs, GlobalArgs, ListArgs, UnpackArgs};

/// Runs the `respack archive` command.
///
/// The codec comes from `--compression`, then from the `[archive]` section
/// of `respack.toml`.
pub fn create(args: &ArchiveArgs, global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    let project = load_project(global)?;
    let compression: CompressionType = args
        .compression
        .as_deref()
        .unwrap_or(&project.archive.compression)
        .parse()?;
    let include_hidden = args.hidden || project.archive.include_hidden;

    let files = collect_files(&args.sources, args.base_dir.as_deref(), include_hidden, compression)?;
    let summary = build_archive(&files, &args.archive)?;

    if !global.quiet {
        eprintln!(
            "    Archived {} files into {} ({} -> {} bytes, {} stored raw)",
            summary.files,
            summary.path.display(),
            summary.original_bytes,
            summary.archive_bytes,
            summary.raw_fallbacks
        );
    }
    Ok(0)
}

/// Runs the `respack unpack` command.
pub fn unpack(args: &UnpackArgs, global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    let archive = ResourceArchive::open(&args.archive)?;
    let count = archive.extract_all(&args.dest)?;
    if !global.quiet {
        eprintln!("   Extracted {count} files to {}", args.dest.display());
    }
    Ok(0)
}

/// Runs the `respack list` command, one line per stored file.
pub fn list(args: &ListArgs) -> Result<i32, Box<dyn Error>> {
    let archive = ResourceArchive::open(&args.archive)?;
    for entry in archive.list() {
        println!(
            "{:>10} {:>10} {:<7} {}",
            entry.original_size,
            entry.compressed_size,
            entry.compression.name(),
            entry.name
        );
    }
    Ok(0)
}
