//! Per-document artifact persistence.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use sirex_core::BatchOutput;
use tracing::debug;

use crate::error::StoreError;

/// Write a document artifact as pretty-printed JSON.
///
/// The file is written beside its final path and renamed into place, so a
/// crash never leaves a truncated artifact that a later run would resume from.
pub fn write_artifact(path: &Path, output: &BatchOutput) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(StoreError::io(parent))?;
    }
    let json = serde_json::to_string_pretty(output)?;
    let staging = partial_path(path);
    fs::write(&staging, json).map_err(StoreError::io(&staging))?;
    fs::rename(&staging, path).map_err(StoreError::io(path))?;
    debug!(path = %path.display(), records = output.records.len(), "wrote artifact");
    Ok(())
}

/// Staging path next to `path`: `<file name>.partial`.
pub(crate) fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

/// Load an artifact written by an earlier run.
pub fn read_artifact(path: &Path) -> Result<BatchOutput, StoreError> {
    let text = fs::read_to_string(path).map_err(StoreError::io(path))?;
    serde_json::from_str(&text).map_err(|source| StoreError::InvalidArtifact {
        path: path.to_path_buf(),
        source,
    })
}
