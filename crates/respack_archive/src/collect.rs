//! Expanding command-line sources into a sorted archive file list.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::warn;

use crate::codec::CompressionType;
use crate::error::ArchiveError;

/// One file to be stored in an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSource {
    /// Path inside the archive, `/`-separated.
    pub relative_path: String,
    /// Where the bytes are read from.
    pub absolute_path: PathBuf,
    /// Preferred codec.
    pub compression: CompressionType,
}

impl ArchiveSource {
    /// Creates a source entry.
    pub fn new(relative_path: impl Into<String>, absolute_path: impl Into<PathBuf>, compression: CompressionType) -> Self {
        Self {
            relative_path: relative_path.into(),
            absolute_path: absolute_path.into(),
            compression,
        }
    }
}

/// Expands `sources` (files or directories) into a list sorted by archive path.
///
/// With a `base_dir`, every archive path is relative to it and sources
/// outside it are rejected. Without one, a file is stored under its file
/// name and a directory's contents are stored relative to that directory.
/// Hidden entries (leading `.`) are skipped unless `include_hidden` is set.
/// The same file reached twice is kept once; two different files claiming
/// one archive path is an error.
pub fn collect_files(
    sources: &[PathBuf],
    base_dir: Option<&Path>,
    include_hidden: bool,
    compression: CompressionType,
) -> Result<Vec<ArchiveSource>, ArchiveError> {
    let base = base_dir
        .map(|b| fs::canonicalize(b).map_err(|e| io_err(b, e)))
        .transpose()?;

    let mut found: Vec<(String, PathBuf)> = Vec::new();
    for source in sources {
        let canonical = fs::canonicalize(source).map_err(|e| io_err(source, e))?;
        let root = match &base {
            Some(base) => base.clone(),
            None if canonical.is_dir() => canonical.clone(),
            None => canonical.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        if !canonical.starts_with(&root) {
            return Err(ArchiveError::OutsideBase {
                path: source.clone(),
                base: root,
            });
        }
        if canonical.is_dir() {
            walk(&canonical, &root, include_hidden, &mut found)?;
        } else {
            found.push((relative_name(&canonical, &root)?, canonical));
        }
    }

    let mut by_name: BTreeMap<String, PathBuf> = BTreeMap::new();
    for (name, path) in found {
        match by_name.get(&name) {
            Some(existing) if *existing == path => {
                warn!(path = %path.display(), "file listed more than once, keeping one copy");
            }
            Some(existing) => {
                return Err(ArchiveError::DuplicatePath {
                    path: name,
                    first: existing.clone(),
                    second: path,
                });
            }
            None => {
                by_name.insert(name, path);
            }
        }
    }

    Ok(by_name
        .into_iter()
        .map(|(relative_path, absolute_path)| ArchiveSource {
            relative_path,
            absolute_path,
            compression,
        })
        .collect())
}

fn walk(dir: &Path, root: &Path, include_hidden: bool, out: &mut Vec<(String, PathBuf)>) -> Result<(), ArchiveError> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| io_err(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    for path in entries {
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if hidden && !include_hidden {
            continue;
        }
        if path.is_dir() {
            walk(&path, root, include_hidden, out)?;
        } else if path.is_file() {
            out.push((relative_name(&path, root)?, path));
        }
    }
    Ok(())
}

fn relative_name(path: &Path, root: &Path) -> Result<String, ArchiveError> {
    let rel = path.strip_prefix(root).map_err(|_| ArchiveError::OutsideBase {
        path: path.to_path_buf(),
        base: root.to_path_buf(),
    })?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        return Err(ArchiveError::UnsafePath(path.display().to_string()));
    }
    Ok(parts.join("/"))
}

fn io_err(path: &Path, source: std::io::Error) -> ArchiveError {
    ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    }
}
