//! JSON artifact persistence.
//!
//! Every artifact is written as a complete snapshot: serialize to a sibling
//! temp file, flush it to disk, then rename over the target. A reader never
//! observes a half-written artifact.

mod artifacts;
mod labels;

pub use artifacts::{
    category_counts, label_distribution, CollectionArtifact, FeatureArtifact, LabelArtifact,
    TrainingArtifact,
};
pub use labels::{LabelSet, LabelStore};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Error type for artifact persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A required input artifact is absent.
    #[error("Required artifact not found at {0}")]
    MissingArtifact(PathBuf),

    #[error("Failed to read artifact {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write artifact {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse artifact JSON {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize artifact: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Convenience result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Read and parse a required JSON artifact.
pub fn read_artifact<T: DeserializeOwned>(path: &Path) -> StoreResult<T> {
    if !path.is_file() {
        return Err(StoreError::MissingArtifact(path.to_path_buf()));
    }
    let body = fs::read_to_string(path)
        .map_err(|source| StoreError::Read { path: path.to_path_buf(), source })?;
    serde_json::from_str(&body)
        .map_err(|source| StoreError::Parse { path: path.to_path_buf(), source })
}

/// Read an optional JSON artifact; `Ok(None)` when the file does not exist.
pub fn read_optional_artifact<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    match read_artifact(path) {
        Ok(value) => Ok(Some(value)),
        Err(StoreError::MissingArtifact(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
pub fn write_artifact<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    let body = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &body)
}

/// Write-whole-file-then-rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let io_err = |source: std::io::Error| StoreError::Write { path: path.to_path_buf(), source };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let mut file = fs::File::create(&tmp).map_err(io_err)?;
    file.write_all(bytes).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    drop(file);

    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}
