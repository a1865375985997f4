//! Utility functions for relinker
//!
//! Artifact persistence (atomic JSON writes and reads), directory root
//! validation, and byte formatting for the CLI.

use crate::error::{RelinkError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::trace;

/// Permission bits of persisted artifacts
#[cfg(unix)]
const ARTIFACT_MODE: u32 = 0o644;

/// Atomically write `value` as pretty-printed JSON
///
/// The document is written to a temporary file next to `path`, synced, and
/// renamed over `path`. Readers see either the previous artifact or the
/// complete new one, never a partial write. On Unix the artifact is created
/// with mode `0644` rather than the private mode of temporary files.
///
/// # Errors
///
/// - [`crate::RelinkError::Persist`] if the temporary file cannot be created,
///   written, synced, or renamed
/// - [`crate::RelinkError::Json`] if serialization fails
pub fn atomic_write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| RelinkError::persist(path, e))?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer
            .write_all(b"\n")
            .and_then(|_| writer.flush())
            .map_err(|e| RelinkError::persist(path, e))?;
    }
    temp.as_file()
        .sync_all()
        .map_err(|e| RelinkError::persist(path, e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp.as_file()
            .set_permissions(fs::Permissions::from_mode(ARTIFACT_MODE))
            .map_err(|e| RelinkError::persist(path, e))?;
    }
    temp.persist(path)
        .map_err(|e| RelinkError::persist(path, e.error))?;

    trace!("Persisted {:?}", path);
    Ok(())
}

/// Read a JSON document fully into memory
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Check that `path` exists and is a directory
///
/// # Errors
///
/// - [`crate::RelinkError::SourceNotFound`] if nothing exists at `path`
/// - [`crate::RelinkError::NotADirectory`] if `path` is not a directory
/// - [`crate::RelinkError::Io`] for any other stat failure
pub fn ensure_directory(path: &Path) -> Result<()> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(RelinkError::NotADirectory(path.to_path_buf())),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(RelinkError::SourceNotFound(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Remove a file, treating "already gone" as success
///
/// Returns whether a file was removed.
pub fn remove_file_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Format bytes in human-readable form
///
/// Uses binary units (1024-based).
///
/// ```rust
/// use relinker::utils::format_bytes;
///
/// assert_eq!(format_bytes(1536), "1.50 KB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}
