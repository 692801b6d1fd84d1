//! Result of a packing run.

use std::path::{Path, PathBuf};

use respack_common::ErrorSet;

/// What happened to one input directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectoryOutcome {
    /// Digests matched the previous run; nothing was touched.
    UnchangedSkip,
    /// Outputs were restored from the build cache.
    CacheHitApplied,
    /// Definitions were loaded and packed, or files copied.
    Rebuilt,
    /// No packable input left; the output directory was emptied.
    Cleared,
}

/// Outcome for one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryReport {
    /// Input directory.
    pub input: PathBuf,
    /// What was done.
    pub outcome: DirectoryOutcome,
}

/// Everything a caller learns from [`ResourcePacker::pack_resources`](crate::ResourcePacker::pack_resources).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Collected errors, deduplicated.
    pub errors: ErrorSet,
    /// Per-directory outcomes in walk order.
    pub directories: Vec<DirectoryReport>,
    /// Number of directories whose definitions went through the packer.
    pub packer_invocations: usize,
    /// The walk stopped early because the cancel token was cleared.
    pub cancelled: bool,
}

impl BuildReport {
    /// `true` when no error was recorded.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Outcome recorded for `input`.
    pub fn outcome_of(&self, input: &Path) -> Option<DirectoryOutcome> {
        self.directories
            .iter()
            .find(|d| d.input == input)
            .map(|d| d.outcome)
    }

    /// How many directories ended with `outcome`.
    pub fn count(&self, outcome: DirectoryOutcome) -> usize {
        self.directories.iter().filter(|d| d.outcome == outcome).count()
    }

    pub(crate) fn record(&mut self, input: &Path, outcome: DirectoryOutcome) {
        self.directories.push(DirectoryReport {
            input: input.to_path_buf(),
            outcome,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_lookup() {
        let mut report = BuildReport::default();
        report.record(Path::new("gfx"), DirectoryOutcome::Rebuilt);
        report.record(Path::new("gfx/ui"), DirectoryOutcome::UnchangedSkip);
        report.record(Path::new("gfx/fx"), DirectoryOutcome::UnchangedSkip);
        assert_eq!(report.count(DirectoryOutcome::UnchangedSkip), 2);
        assert_eq!(report.outcome_of(Path::new("gfx")), Some(DirectoryOutcome::Rebuilt));
        assert_eq!(report.outcome_of(Path::new("nope")), None);
        assert!(report.is_success());
        report.errors.add("boom");
        assert!(!report.is_success());
    }
}
