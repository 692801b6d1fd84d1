//! The set of output files stored under one cache key.
//!
//! File contents are held behind [`Arc`] so the same blob can be shared
//! between the output writer, the local store and an in-flight request
//! without copying.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use respack_common::{Digest, DigestBuilder};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Who produced an artifact set, and when.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescription {
    /// Host that ran the build.
    pub machine_name: String,
    /// Local date and time of the build.
    pub creation_date: String,
    /// Free text supplied by the caller.
    pub comment: String,
}

impl ArtifactDescription {
    /// Describes a build happening now on this machine.
    pub fn new(comment: impl Into<String>) -> Self {
        Self {
            machine_name: machine_name(),
            creation_date: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            comment: comment.into(),
        }
    }
}

fn machine_name() -> String {
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Serializable form of an [`ArtifactSet`], used on disk and on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Build description.
    pub description: ArtifactDescription,
    /// File names and contents, sorted by name.
    pub files: Vec<(String, Vec<u8>)>,
    /// Validation token over the files.
    pub validation: Option<Digest>,
}

/// Output files of one build plus metadata.
#[derive(Debug, Clone, Default)]
pub struct ArtifactSet {
    files: BTreeMap<String, Arc<Vec<u8>>>,
    description: ArtifactDescription,
    validation: Option<Digest>,
}

impl ArtifactSet {
    /// Creates an empty set.
    pub fn new(description: ArtifactDescription) -> Self {
        Self {
            files: BTreeMap::new(),
            description,
            validation: None,
        }
    }

    /// Adds or replaces a file. `name` must be a bare file name.
    pub fn add_file(
        &mut self,
        name: impl Into<String>,
        data: impl Into<Arc<Vec<u8>>>,
    ) -> Result<(), CacheError> {
        let name = name.into();
        check_file_name(&name)?;
        self.files.insert(name, data.into());
        self.validation = None;
        Ok(())
    }

    /// Adds every regular file directly inside `dir`; returns how many.
    pub fn add_from_folder(&mut self, dir: &Path) -> Result<usize, CacheError> {
        let io_err = |e| CacheError::Io {
            path: dir.to_path_buf(),
            source: e,
        };
        let mut added = 0;
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            let data = std::fs::read(&path).map_err(|e| CacheError::Io {
                path: path.clone(),
                source: e,
            })?;
            self.add_file(name, data)?;
            added += 1;
        }
        Ok(added)
    }

    /// Writes every file into `dir`, creating it if needed; returns how many.
    pub fn export_to_folder(&self, dir: &Path) -> Result<usize, CacheError> {
        std::fs::create_dir_all(dir).map_err(|e| CacheError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        for (name, data) in &self.files {
            let path = dir.join(name);
            std::fs::write(&path, data.as_slice())
                .map_err(|e| CacheError::Io { path, source: e })?;
        }
        Ok(self.files.len())
    }

    /// Looks up a file.
    pub fn get(&self, name: &str) -> Option<&Arc<Vec<u8>>> {
        self.files.get(name)
    }

    /// Iterates files in name order.
    pub fn files(&self) -> impl Iterator<Item = (&str, &Arc<Vec<u8>>)> {
        self.files.iter().map(|(name, data)| (name.as_str(), data))
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if the set holds no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Sum of all file sizes.
    pub fn total_size(&self) -> u64 {
        self.files.values().map(|d| d.len() as u64).sum()
    }

    /// Build description.
    pub fn description(&self) -> &ArtifactDescription {
        &self.description
    }

    /// Stored validation token, if any.
    pub fn validation(&self) -> Option<Digest> {
        self.validation
    }

    /// Digest over every file name, size and content.
    pub fn compute_validation(&self) -> Digest {
        let mut builder = DigestBuilder::new();
        for (name, data) in &self.files {
            builder.update(name.as_bytes());
            builder.update(&[0]);
            builder.update(&(data.len() as u64).to_le_bytes());
            builder.update(data);
        }
        builder.finish()
    }

    /// Stores the current validation token.
    pub fn update_validation(&mut self) {
        self.validation = Some(self.compute_validation());
    }

    /// Returns `true` if the stored token matches the current files.
    pub fn is_valid(&self) -> bool {
        self.validation == Some(self.compute_validation())
    }

    /// Converts into the serializable form.
    pub fn to_record(&self) -> ArtifactRecord {
        ArtifactRecord {
            description: self.description.clone(),
            files: self
                .files
                .iter()
                .map(|(name, data)| (name.clone(), data.as_ref().clone()))
                .collect(),
            validation: self.validation,
        }
    }

    /// Rebuilds a set from its serializable form, checking file names.
    pub fn from_record(record: ArtifactRecord) -> Result<Self, CacheError> {
        let mut set = ArtifactSet::new(record.description);
        for (name, data) in record.files {
            set.add_file(name, data)?;
        }
        set.validation = record.validation;
        Ok(set)
    }

    /// Encodes the set with bincode.
    pub fn encode(&self) -> Result<Vec<u8>, CacheError> {
        bincode::serde::encode_to_vec(self.to_record(), bincode::config::standard()).map_err(|e| {
            CacheError::Serialization {
                reason: e.to_string(),
            }
        })
    }

    /// Decodes a set produced by [`encode`](Self::encode).
    pub fn decode(bytes: &[u8]) -> Result<Self, CacheError> {
        let (record, _): (ArtifactRecord, usize) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard()).map_err(|e| {
                CacheError::Serialization {
                    reason: e.to_string(),
                }
            })?;
        Self::from_record(record)
    }
}

fn check_file_name(name: &str) -> Result<(), CacheError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if bad {
        return Err(CacheError::InvalidArtifact {
            reason: format!("'{name}' is not a plain file name"),
        });
    }
    Ok(())
}
