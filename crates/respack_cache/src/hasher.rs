//! Content digests and their persisted sidecar files.
//!
//! A sidecar holds exactly [`Digest::SIZE`] bytes. A missing or short sidecar
//! is not an error; it means "no previous digest", which always counts as a
//! change.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use respack_common::{Digest, DigestBuilder};

use crate::error::CacheError;

const READ_CHUNK: usize = 64 * 1024;

/// Computes, persists and compares content digests.
pub struct ContentHasher;

impl ContentHasher {
    /// Digests the full content of one file.
    pub fn digest_file(path: &Path) -> Result<Digest, CacheError> {
        let io_err = |e| CacheError::Io {
            path: path.to_path_buf(),
            source: e,
        };
        let mut reader = BufReader::new(File::open(path).map_err(io_err)?);
        let mut builder = DigestBuilder::new();
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let n = reader.read(&mut buf).map_err(io_err)?;
            if n == 0 {
                break;
            }
            builder.update(&buf[..n]);
        }
        Ok(builder.finish())
    }

    /// Digests the names and contents of the files in a directory.
    ///
    /// Files are visited in sorted order of their `/`-separated path relative
    /// to `dir`, so the result depends only on names and bytes, never on
    /// timestamps or listing order. Dot-files and dot-directories are skipped
    /// unless `include_hidden` is set.
    pub fn digest_directory(
        dir: &Path,
        recursive: bool,
        include_hidden: bool,
    ) -> Result<Digest, CacheError> {
        Self::digest_directory_filtered(dir, recursive, include_hidden, |_| true)
    }

    /// Like [`digest_directory`](Self::digest_directory), visiting only
    /// entries for which `keep` returns `true`.
    pub fn digest_directory_filtered<F>(
        dir: &Path,
        recursive: bool,
        include_hidden: bool,
        keep: F,
    ) -> Result<Digest, CacheError>
    where
        F: Fn(&Path) -> bool,
    {
        let mut files = Vec::new();
        collect_files(dir, "", recursive, include_hidden, &keep, &mut files)?;
        files.sort_by(|a, b| a.0.cmp(&b.0));

        let mut builder = DigestBuilder::new();
        for (relative, path) in &files {
            builder.update(relative.as_bytes());
            builder.update(&[0]);
            builder.update(Self::digest_file(path)?.as_bytes());
        }
        Ok(builder.finish())
    }

    /// Digests an in-memory buffer such as a serialized parameter string.
    pub fn digest_buffer(data: &[u8]) -> Digest {
        Digest::from_bytes(data)
    }

    /// Reads a sidecar, returning `None` if it is missing or too short.
    pub fn read_persisted_digest(sidecar: &Path) -> Option<Digest> {
        let mut raw = [0u8; Digest::SIZE];
        File::open(sidecar).ok()?.read_exact(&mut raw).ok()?;
        Some(Digest::from_raw(raw))
    }

    /// Creates or truncates `sidecar` and writes `digest` to it.
    pub fn write_persisted_digest(sidecar: &Path, digest: &Digest) -> Result<(), CacheError> {
        std::fs::write(sidecar, digest.as_bytes()).map_err(|e| CacheError::Io {
            path: sidecar.to_path_buf(),
            source: e,
        })
    }

    /// Returns `true` on first run (no old digest) or when the digests differ.
    pub fn has_changed(old: Option<Digest>, new: Digest) -> bool {
        old != Some(new)
    }

    /// Reads the old sidecar value, writes `new`, and reports whether it changed.
    pub fn recalculate(sidecar: &Path, new: Digest) -> Result<bool, CacheError> {
        let old = Self::read_persisted_digest(sidecar);
        Self::write_persisted_digest(sidecar, &new)?;
        Ok(Self::has_changed(old, new))
    }

    /// Recomputes a directory digest into `sidecar`; returns whether it changed.
    pub fn recalculate_directory_digest(
        dir: &Path,
        sidecar: &Path,
        recursive: bool,
    ) -> Result<bool, CacheError> {
        let digest = Self::digest_directory(dir, recursive, false)?;
        Self::recalculate(sidecar, digest)
    }

    /// Recomputes a parameter-string digest into `sidecar`; returns whether it changed.
    pub fn recalculate_params_digest(params: &str, sidecar: &Path) -> Result<bool, CacheError> {
        Self::recalculate(sidecar, Self::digest_buffer(params.as_bytes()))
    }
}

fn collect_files(
    dir: &Path,
    prefix: &str,
    recursive: bool,
    include_hidden: bool,
    keep: &dyn Fn(&Path) -> bool,
    out: &mut Vec<(String, PathBuf)>,
) -> Result<(), CacheError> {
    let io_err = |e| CacheError::Io {
        path: dir.to_path_buf(),
        source: e,
    };
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if (!include_hidden && name.starts_with('.')) || !keep(&path) {
            continue;
        }
        let relative = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };
        if path.is_dir() {
            if recursive {
                collect_files(&path, &relative, recursive, include_hidden, keep, out)?;
            }
        } else if path.is_file() {
            out.push((relative, path));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn file_digest_matches_buffer_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &data).unwrap();
        assert_eq!(
            ContentHasher::digest_file(&path).unwrap(),
            ContentHasher::digest_buffer(&data)
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ContentHasher::digest_file(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, CacheError::Io { .. }));
    }

    #[test]
    fn directory_digest_tracks_content_and_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.png"), b"aaa").unwrap();
        fs::write(dir.path().join("b.png"), b"bbb").unwrap();
        let first = ContentHasher::digest_directory(dir.path(), false, false).unwrap();
        assert_eq!(
            first,
            ContentHasher::digest_directory(dir.path(), false, false).unwrap()
        );

        fs::write(dir.path().join("b.png"), b"bbc").unwrap();
        let edited = ContentHasher::digest_directory(dir.path(), false, false).unwrap();
        assert_ne!(first, edited);

        fs::rename(dir.path().join("b.png"), dir.path().join("c.png")).unwrap();
        let renamed = ContentHasher::digest_directory(dir.path(), false, false).unwrap();
        assert_ne!(edited, renamed);
    }

    #[test]
    fn recursion_and_hidden_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("top.txt"), b"x").unwrap();
        let flat = ContentHasher::digest_directory(dir.path(), false, false).unwrap();
        let deep = ContentHasher::digest_directory(dir.path(), true, false).unwrap();
        assert_eq!(flat, deep);

        fs::write(dir.path().join("sub").join("inner.txt"), b"y").unwrap();
        assert_eq!(
            flat,
            ContentHasher::digest_directory(dir.path(), false, false).unwrap()
        );
        assert_ne!(
            deep,
            ContentHasher::digest_directory(dir.path(), true, false).unwrap()
        );

        fs::write(dir.path().join(".hidden"), b"z").unwrap();
        assert_eq!(
            flat,
            ContentHasher::digest_directory(dir.path(), false, false).unwrap()
        );
        assert_ne!(
            flat,
            ContentHasher::digest_directory(dir.path(), false, true).unwrap()
        );
    }

    #[test]
    fn filter_excludes_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.png"), b"a").unwrap();
        let base = ContentHasher::digest_directory(dir.path(), false, false).unwrap();
        fs::write(dir.path().join("Thumbs.db"), b"junk").unwrap();
        let filtered = ContentHasher::digest_directory_filtered(dir.path(), false, false, |p| {
            p.file_name().is_some_and(|n| n != "Thumbs.db")
        })
        .unwrap();
        assert_eq!(base, filtered);
    }

    #[test]
    fn persisted_digest_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let sidecar = dir.path().join("dir.md5");
        let digest = ContentHasher::digest_buffer(b"params");
        ContentHasher::write_persisted_digest(&sidecar, &digest).unwrap();
        assert_eq!(fs::read(&sidecar).unwrap().len(), Digest::SIZE);
        assert_eq!(ContentHasher::read_persisted_digest(&sidecar), Some(digest));
    }

    #[test]
    fn missing_or_short_sidecar_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let sidecar = dir.path().join("params.md5");
        assert_eq!(ContentHasher::read_persisted_digest(&sidecar), None);
        fs::write(&sidecar, [1u8; 7]).unwrap();
        assert_eq!(ContentHasher::read_persisted_digest(&sidecar), None);
    }

    #[test]
    fn recalculate_reads_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let sidecar = dir.path().join("params.md5");
        assert!(ContentHasher::recalculate_params_digest("a", &sidecar).unwrap());
        assert!(!ContentHasher::recalculate_params_digest("a", &sidecar).unwrap());
        assert!(ContentHasher::recalculate_params_digest("b", &sidecar).unwrap());
        assert_eq!(
            ContentHasher::read_persisted_digest(&sidecar),
            Some(ContentHasher::digest_buffer(b"b"))
        );
    }

    #[test]
    fn has_changed_semantics() {
        let d = Digest::from_bytes(b"x");
        assert!(ContentHasher::has_changed(None, d));
        assert!(!ContentHasher::has_changed(Some(d), d));
        assert!(ContentHasher::has_changed(Some(Digest::from_bytes(b"y")), d));
    }
}
