//! Incremental, directory-by-directory resource packing.
//!
//! The walk is depth-first and single-threaded. Every directory below the
//! input root gets a mirror under the process folder holding two sidecars:
//! `dir.md5` (digest of the directory's own files) and `params.md5` (digest
//! of the packing parameter string). A directory is rebuilt when either
//! digest changed, when an ancestor was rebuilt, or when the output tree was
//! modified outside the packer. Rebuilt outputs are pushed to the build
//! cache keyed by the two digests, and a later build with the same key
//! restores them instead of packing again.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use respack_cache::{ArtifactDescription, ArtifactSet, BuildCacheClient, CacheKey, ContentHasher};
use respack_common::CancelToken;
use respack_config::{read_flags_file, BuildConfig, PackSettings};
use respack_packer::PackAlgorithm;
use tracing::{debug, info, warn};

use crate::atlas::AtlasJob;
use crate::error::BuildError;
use crate::loaders::{LoadOptions, LoaderRegistry};
use crate::report::{BuildReport, DirectoryOutcome};
use crate::texture::{PngTextureConverter, TextureConverter, TextureRequest, DESCRIPTOR_VERSION};

/// Name of the working folder created next to the input directory.
pub const PROCESS_DIR_NAME: &str = "$process";
/// Per-directory flag override file.
pub const FLAGS_FILE_NAME: &str = "flags.txt";
/// Sidecar with the digest of a directory's files.
pub const DIR_SIDECAR: &str = "dir.md5";
/// Sidecar with the digest of a directory's packing parameters.
pub const PARAMS_SIDECAR: &str = "params.md5";
/// Version recorded in every parameter string.
pub const PACKER_VERSION: &str = env!("CARGO_PKG_VERSION");
/// PSD reader version recorded in every parameter string.
pub const PSD_LIBRARY_VERSION: &str = "psd-0.3";

const IGNORED_FILES: [&str; 4] = [".DS_Store", "flags.txt", "Thumbs.db", ".gitignore"];
const SKIPPED_DIRS: [&str; 3] = [PROCESS_DIR_NAME, ".svn", ".git"];

/// `true` for files that are neither hashed, packed nor copied.
pub fn is_ignored_file(name: &str) -> bool {
    name.starts_with('.') || IGNORED_FILES.iter().any(|i| i.eq_ignore_ascii_case(name))
}

fn is_skipped_dir(name: &str) -> bool {
    name.starts_with('.') || SKIPPED_DIRS.contains(&name)
}

struct SourceFile {
    path: PathBuf,
    name: String,
    size: u64,
}

struct Listing {
    files: Vec<SourceFile>,
    dirs: Vec<(String, PathBuf)>,
}

struct Walk {
    report: BuildReport,
    output_dir_modified: bool,
    algorithms: Vec<PackAlgorithm>,
}

/// Packs an input tree of PSD/PNG sources into an output tree of atlases.
pub struct ResourcePacker {
    input: PathBuf,
    output: PathBuf,
    root: PathBuf,
    process_root: PathBuf,
    config: BuildConfig,
    cache: BuildCacheClient,
    registry: LoaderRegistry,
    converter: Box<dyn TextureConverter>,
    cancel: CancelToken,
}

impl ResourcePacker {
    /// A packer from `input` to `output`. The process folder is created
    /// next to `input`, and the cache starts disabled.
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, config: BuildConfig) -> Self {
        let input = input.into();
        let root = input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| input.clone());
        Self {
            process_root: root.join(PROCESS_DIR_NAME),
            root,
            input,
            output: output.into(),
            config,
            cache: BuildCacheClient::disabled(),
            registry: LoaderRegistry::with_defaults(),
            converter: Box::new(PngTextureConverter),
            cancel: CancelToken::new(),
        }
    }

    /// Uses `cache` for fetching and storing directory outputs.
    pub fn with_cache(mut self, cache: BuildCacheClient) -> Self {
        self.cache = cache;
        self
    }

    /// Replaces the definition loaders.
    pub fn with_registry(mut self, registry: LoaderRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replaces the texture writer.
    pub fn with_converter(mut self, converter: Box<dyn TextureConverter>) -> Self {
        self.converter = converter;
        self
    }

    /// Shares an externally owned cancel token.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops the walk when cleared.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Effective configuration.
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Working folder holding the digest sidecars.
    pub fn process_dir(&self) -> &Path {
        &self.process_root
    }

    /// Walks the input tree and brings the output tree up to date.
    ///
    /// Never fails as a whole: problems end up in the report's error set.
    pub fn pack_resources(&mut self) -> BuildReport {
        let mut walk = Walk {
            report: BuildReport::default(),
            output_dir_modified: false,
            algorithms: self.config.algorithms(),
        };
        debug!(
            input = %self.input.display(),
            output = %self.output.display(),
            gpus = ?self.config.gpus,
            "packing resources"
        );

        if !self.input.is_dir() {
            walk.report.errors.add(BuildError::MissingInput(self.input.clone()).to_string());
            return walk.report;
        }
        if self.config.texture_postfix.chars().any(char::is_whitespace) {
            walk.report.errors.add(format!(
                "Texture name postfix '{}' has whitespaces",
                self.config.texture_postfix
            ));
            return walk.report;
        }
        if let Err(e) = self.config.validate() {
            walk.report.errors.add(e.to_string());
            return walk.report;
        }

        if let Err(e) = fs::create_dir_all(&self.output) {
            walk.report
                .errors
                .add(format!("Can't create directory {}: {e}", self.output.display()));
            return walk.report;
        }
        match self.recalculate_output_digest() {
            Ok(false) => {}
            Ok(true) => {
                debug!("output not available or changed, performing full repack");
                walk.output_dir_modified = true;
                if self.config.clear_output {
                    let removed = fs::remove_dir_all(&self.output).and_then(|()| fs::create_dir_all(&self.output));
                    match removed {
                        Ok(()) => debug!(output = %self.output.display(), "removed output directory"),
                        Err(e) => {
                            walk.report
                                .errors
                                .add(format!("Can't delete directory [{}]: {e}", self.output.display()));
                        }
                    }
                }
            }
            Err(e) => {
                walk.report.errors.add(e.to_string());
                return walk.report;
            }
        }

        let input = self.input.clone();
        let output = self.output.clone();
        let tokens = self.config.base_flags.clone();
        self.pack_directory(&input, &output, &tokens, false, &mut walk);
        walk.report.cancelled = !self.cancel.is_running();

        if let Err(e) = self.recalculate_output_digest() {
            walk.report.errors.add(e.to_string());
        }
        walk.report
    }

    /// Recomputes the digest of the whole output tree and stores it in the
    /// process folder. Returns whether it differed from the stored one.
    pub fn recalculate_output_digest(&self) -> Result<bool, BuildError> {
        fs::create_dir_all(&self.process_root).map_err(|e| BuildError::io(&self.process_root, e))?;
        fs::create_dir_all(&self.output).map_err(|e| BuildError::io(&self.output, e))?;
        let changed = ContentHasher::recalculate_directory_digest(&self.output, &self.output_sidecar(), true)?;
        Ok(changed)
    }

    fn output_sidecar(&self) -> PathBuf {
        let name = self
            .input
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| "gfx".to_string());
        self.process_root.join(format!("{name}.md5"))
    }

    fn pack_directory(
        &mut self,
        input_dir: &Path,
        output_dir: &Path,
        passed_tokens: &[String],
        ancestor_modified: bool,
        walk: &mut Walk,
    ) {
        if !self.cancel.is_running() {
            return;
        }
        let started = Instant::now();
        let relative = input_dir.strip_prefix(&self.root).unwrap_or(input_dir).to_path_buf();
        let process_dir = self.process_root.join(&relative);
        if let Err(e) = fs::create_dir_all(&process_dir) {
            walk.report
                .errors
                .add(format!("Can't create directory {}: {e}", process_dir.display()));
            return;
        }
        if self.config.force_repack {
            if let Err(e) = clear_files(&process_dir) {
                warn!(dir = %process_dir.display(), error = %e, "cannot reset digests");
            }
        }
        if let Err(e) = fs::create_dir_all(output_dir) {
            walk.report
                .errors
                .add(format!("Can't create directory {}: {e}", output_dir.display()));
            return;
        }

        let flags_path = input_dir.join(FLAGS_FILE_NAME);
        let current_tokens = if flags_path.is_file() {
            match read_flags_file(&flags_path) {
                Ok(tokens) => tokens,
                Err(e) => {
                    walk.report
                        .errors
                        .add(format!("Failed to open file: {}: {e}", flags_path.display()));
                    Vec::new()
                }
            }
        } else {
            passed_tokens.to_vec()
        };
        let settings = match self.config.settings_for(&current_tokens) {
            Ok(settings) => settings,
            Err(e) => {
                walk.report.errors.add(format!("{}: {e}", input_dir.display()));
                return;
            }
        };

        let listing = match list_directory(input_dir) {
            Ok(listing) => listing,
            Err(e) => {
                walk.report.errors.add(e.to_string());
                return;
            }
        };

        let params = self.packing_params(&current_tokens, &settings, &walk.algorithms, &listing.files);
        let (input_changed, params_changed, key) = match hash_directory(input_dir, &process_dir, &params) {
            Ok(hashed) => hashed,
            Err(e) => {
                walk.report.errors.add(e.to_string());
                return;
            }
        };

        let modified = ancestor_modified || walk.output_dir_modified || input_changed || params_changed;
        let label = format!("...{}{}", std::path::MAIN_SEPARATOR, relative.display());
        let outcome = if !modified {
            info!("[{}] - [unchanged]", input_dir.display());
            Some(DirectoryOutcome::UnchangedSkip)
        } else if listing.files.is_empty() {
            info!("[{}] - empty directory. Clearing output folder", input_dir.display());
            if let Err(e) = clear_files(output_dir) {
                walk.report
                    .errors
                    .add(format!("Can't clear directory {}: {e}", output_dir.display()));
            }
            Some(DirectoryOutcome::Cleared)
        } else if self.fetch_from_cache(&key, &label, output_dir) {
            Some(DirectoryOutcome::CacheHitApplied)
        } else if let Some(packed) = self.rebuild(input_dir, output_dir, &listing, &settings, &current_tokens, walk) {
            let result = if packed > 0 { "[REPACKED]" } else { "[copied]" };
            info!(
                "[{} - {:.2} secs] - {result}",
                input_dir.display(),
                started.elapsed().as_secs_f64()
            );
            self.store_to_cache(&key, &label, output_dir);
            Some(DirectoryOutcome::Rebuilt)
        } else {
            // Cancelled mid-directory: forget the digests so the next run rebuilds it.
            let _ = fs::remove_file(process_dir.join(DIR_SIDECAR));
            let _ = fs::remove_file(process_dir.join(PARAMS_SIDECAR));
            None
        };
        let Some(outcome) = outcome else {
            return;
        };
        walk.report.record(input_dir, outcome);
        self.prune_removed_dirs(&process_dir, output_dir, &listing, walk);

        let tokens_to_pass = if settings.recursive_flags {
            current_tokens
        } else {
            passed_tokens.to_vec()
        };
        for (name, path) in &listing.dirs {
            self.pack_directory(path, &output_dir.join(name), &tokens_to_pass, modified, walk);
        }
    }

    /// Deletes the output and digest mirror of every subdirectory that was
    /// built before but no longer exists in the input. Only directories with
    /// a mirror in the process folder are touched.
    fn prune_removed_dirs(&self, process_dir: &Path, output_dir: &Path, listing: &Listing, walk: &mut Walk) {
        let Ok(entries) = fs::read_dir(process_dir) else {
            return;
        };
        for entry in entries.flatten() {
            let mirror = entry.path();
            if !mirror.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if listing.dirs.iter().any(|(dir, _)| *dir == name) {
                continue;
            }
            let stale = output_dir.join(&name);
            if stale.is_dir() {
                info!("[{}] - input removed, deleting output", stale.display());
                if let Err(e) = fs::remove_dir_all(&stale) {
                    walk.report
                        .errors
                        .add(format!("Can't delete directory [{}]: {e}", stale.display()));
                    continue;
                }
            }
            if let Err(e) = fs::remove_dir_all(&mirror) {
                warn!(dir = %mirror.display(), error = %e, "cannot remove stale digests");
            }
        }
    }

    /// Serializes everything that influences a directory's output.
    fn packing_params(
        &self,
        tokens: &[String],
        settings: &PackSettings,
        algorithms: &[PackAlgorithm],
        files: &[SourceFile],
    ) -> String {
        let mut params = tokens.join(" ");
        for gpu in &self.config.gpus {
            let _ = write!(params, "GPU = {}", gpu.name());
        }
        let _ = write!(params, "PackerVersion = {PACKER_VERSION}");
        let _ = write!(params, "LibPSDVersion = {PSD_LIBRARY_VERSION}");
        for algorithm in algorithms {
            let _ = write!(params, "PackerAlgorithm = {}", algorithm.name());
        }
        let _ = write!(
            params,
            "Settings = margin:{} size:{} square:{} split:{} crop:{} layers:{} quality:{} postfix:{} lightmaps:{}",
            settings.margin,
            settings.max_texture_size,
            settings.square_only,
            settings.split,
            settings.crop_alpha,
            settings.use_layer_names,
            self.config.quality,
            self.config.texture_postfix,
            self.config.lightmaps
        );
        for (gpu, gpu_params) in &settings.gpu_params {
            let _ = write!(params, "GPUParams = {} {}", gpu.name(), gpu_params.join(" "));
        }
        let mut total_size = 0u64;
        for file in files {
            params.push_str(&file.name);
            total_size += file.size;
        }
        let _ = write!(params, "FilesSize = {total_size}");
        let _ = write!(params, "FilesCount = {}", files.len());
        let _ = write!(params, "DescriptorVersion = {DESCRIPTOR_VERSION}");
        params
    }

    fn fetch_from_cache(&mut self, key: &CacheKey, label: &str, output_dir: &Path) -> bool {
        if !self.cache.is_usable() {
            return false;
        }
        match self.cache.fetch(key) {
            Ok(artifacts) => {
                let applied = clear_files(output_dir)
                    .map_err(|e| e.to_string())
                    .and_then(|()| artifacts.export_to_folder(output_dir).map_err(|e| e.to_string()));
                match applied {
                    Ok(_) => {
                        info!("{label} - retrieved from cache");
                        true
                    }
                    Err(e) => {
                        warn!("{label} - can't apply cached files: {e}");
                        false
                    }
                }
            }
            Err(e) => {
                info!("{label} - can't retrieve from cache: {e}");
                false
            }
        }
    }

    fn store_to_cache(&mut self, key: &CacheKey, label: &str, output_dir: &Path) {
        if !self.cache.is_usable() {
            return;
        }
        let mut artifacts = ArtifactSet::new(ArtifactDescription::new(self.config.cache.comment.clone()));
        if let Err(e) = artifacts.add_from_folder(output_dir) {
            warn!("{label} - can't collect output files: {e}");
            return;
        }
        if artifacts.is_empty() {
            info!("{label} - empty folder");
            return;
        }
        match self.cache.store(key, artifacts) {
            Ok(()) => info!("{label} - added to cache"),
            Err(e) => info!("{label} - can't add to cache: {e}"),
        }
    }

    /// Loads, packs and copies the files of one directory. Returns the
    /// number of packed definitions, or `None` if the walk was cancelled
    /// before every file was looked at.
    fn rebuild(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        listing: &Listing,
        settings: &PackSettings,
        tokens: &[String],
        walk: &mut Walk,
    ) -> Option<usize> {
        if self.config.clear_output {
            if let Err(e) = clear_files(output_dir) {
                walk.report
                    .errors
                    .add(format!("Can't clear directory {}: {e}", output_dir.display()));
            }
        }

        let paths: Vec<PathBuf> = listing.files.iter().map(|f| f.path.clone()).collect();
        let claimed = self.registry.claimed_sources(&paths);
        let options = LoadOptions::from(settings);
        let mut definitions = Vec::new();
        let mut copy_list = Vec::new();
        for path in &paths {
            if !self.cancel.is_running() {
                return None;
            }
            if claimed.contains(path) {
                continue;
            }
            match self.registry.loader_for(path) {
                Some(loader) => match loader.load(path, &options) {
                    Ok(definition) => definitions.push(definition),
                    Err(e) => {
                        walk.report.errors.add(e.to_string());
                    }
                },
                None => copy_list.push(path),
            }
        }

        if !definitions.is_empty() {
            walk.report.packer_invocations += 1;
            let job = AtlasJob {
                settings,
                algorithms: &walk.algorithms,
                texture_postfix: &self.config.texture_postfix,
                request: TextureRequest {
                    gpus: &self.config.gpus,
                    quality: self.config.quality,
                    gpu_params: &settings.gpu_params,
                },
                converter: self.converter.as_ref(),
            };
            let outcome = job.run(output_dir, &definitions);
            for error in outcome.errors {
                walk.report.errors.add(error);
            }
            info!("[{} files packed with flags: {}]", definitions.len(), tokens.join(" "));
        }

        for path in copy_list {
            let Some(name) = path.file_name() else {
                continue;
            };
            let dest = output_dir.join(name);
            if let Err(e) = fs::copy(path, &dest) {
                walk.report
                    .errors
                    .add(format!("Can't copy {} to {}: {e}", path.display(), dest.display()));
            }
        }
        debug!(dir = %input_dir.display(), definitions = definitions.len(), "directory rebuilt");
        Some(definitions.len())
    }
}

/// Hashes a directory and its parameters, persisting both sidecars.
fn hash_directory(
    input_dir: &Path,
    process_dir: &Path,
    params: &str,
) -> Result<(bool, bool, CacheKey), BuildError> {
    let dir_digest = ContentHasher::digest_directory_filtered(input_dir, false, false, |p| {
        p.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| !is_ignored_file(n))
    })?;
    let params_digest = ContentHasher::digest_buffer(params.as_bytes());
    let input_changed = ContentHasher::recalculate(&process_dir.join(DIR_SIDECAR), dir_digest)?;
    let params_changed = ContentHasher::recalculate(&process_dir.join(PARAMS_SIDECAR), params_digest)?;
    Ok((input_changed, params_changed, CacheKey::new(dir_digest, params_digest)))
}

fn list_directory(dir: &Path) -> Result<Listing, BuildError> {
    let mut entries: Vec<_> = fs::read_dir(dir)
        .map_err(|e| BuildError::io(dir, e))?
        .collect::<Result<_, _>>()
        .map_err(|e| BuildError::io(dir, e))?;
    entries.sort_by_key(|e| e.file_name());

    let mut listing = Listing {
        files: Vec::new(),
        dirs: Vec::new(),
    };
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();
        if path.is_dir() {
            if !is_skipped_dir(&name) {
                listing.dirs.push((name, path));
            }
        } else if path.is_file() && !is_ignored_file(&name) {
            let size = entry.metadata().map_err(|e| BuildError::io(&path, e))?.len();
            listing.files.push(SourceFile { path, name, size });
        }
    }
    Ok(listing)
}

/// Removes the regular files directly inside `dir`; a missing `dir` is fine.
fn clear_files(dir: &Path) -> io::Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let path = entry?.path();
        if path.is_file() {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignore_list_is_case_insensitive() {
        assert!(is_ignored_file("Thumbs.db"));
        assert!(is_ignored_file("thumbs.DB"));
        assert!(is_ignored_file("FLAGS.txt"));
        assert!(is_ignored_file(".DS_Store"));
        assert!(is_ignored_file(".anything"));
        assert!(!is_ignored_file("icon.png"));
        assert!(is_skipped_dir("$process"));
        assert!(is_skipped_dir(".git"));
        assert!(!is_skipped_dir("ui"));
    }

    #[test]
    fn listing_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.png", "flags.txt", "Thumbs.db", "notes.yaml"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::create_dir(dir.path().join(".svn")).unwrap();
        let listing = list_directory(dir.path()).unwrap();
        let names: Vec<&str> = listing.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a.png", "b.png", "notes.yaml"]);
        assert_eq!(listing.dirs.len(), 1);
        assert_eq!(listing.dirs[0].0, "sub");
    }

    #[test]
    fn params_capture_settings_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let packer = ResourcePacker::new(dir.path().join("gfx"), dir.path().join("out"), BuildConfig::default());
        let files = vec![SourceFile {
            path: PathBuf::from("icon.png"),
            name: "icon.png".to_string(),
            size: 42,
        }];
        let settings = PackSettings::default();
        let params = packer.packing_params(
            &["--add2pixel".to_string()],
            &settings,
            &[PackAlgorithm::MaxRectsBestAreaFit],
            &files,
        );
        assert!(params.starts_with("--add2pixelGPU = origin"));
        assert!(params.contains("PackerAlgorithm = maxrects-best-area"));
        assert!(params.contains("icon.pngFilesSize = 42FilesCount = 1"));
        assert!(params.ends_with(&format!("DescriptorVersion = {DESCRIPTOR_VERSION}")));

        let square = PackSettings {
            square_only: true,
            ..PackSettings::default()
        };
        assert_ne!(
            params,
            packer.packing_params(&["--add2pixel".to_string()], &square, &[PackAlgorithm::MaxRectsBestAreaFit], &files)
        );
    }

    #[test]
    fn clear_files_keeps_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("texture0.png"), b"x").unwrap();
        fs::create_dir(dir.path().join("child")).unwrap();
        fs::write(dir.path().join("child/keep.txt"), b"x").unwrap();
        clear_files(dir.path()).unwrap();
        assert!(!dir.path().join("texture0.png").exists());
        assert!(dir.path().join("child/keep.txt").exists());
        clear_files(&dir.path().join("missing")).unwrap();
    }
}
