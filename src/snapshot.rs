//! Hardlink snapshots
//!
//! A [`Snapshot`] maps each source file to the target paths that shared its
//! identity when the snapshot was taken. It is the only state handed from the
//! snapshot phase to the restore phase, so it is persisted atomically as a
//! pretty-printed JSON object with sorted keys:
//!
//! ```json
//! {
//!   "/library/source/f.txt": [
//!     "/library/a/f.txt",
//!     "/library/b/f.txt"
//!   ]
//! }
//! ```
//!
//! Restore always loads the whole document before acting on it.

use crate::error::{RelinkError, Result};
use crate::index::InodeIndex;
use crate::types::{ProgressCallback, RelinkConfig};
use crate::utils;
use crate::walk::{FileWalker, WalkStats};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Source path to linked target paths, captured at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    entries: BTreeMap<PathBuf, Vec<PathBuf>>,
}

impl Snapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the targets linked to `source`, replacing any previous entry
    pub fn insert(&mut self, source: PathBuf, targets: Vec<PathBuf>) {
        self.entries.insert(source, targets);
    }

    /// Targets recorded for `source`
    pub fn get(&self, source: &Path) -> Option<&[PathBuf]> {
        self.entries.get(source).map(Vec::as_slice)
    }

    /// Number of source entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of (source, target) pairs
    pub fn pair_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Iterate over entries in source path order
    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &Vec<PathBuf>)> {
        self.entries.iter()
    }

    /// Iterate over every (source, target) pair in snapshot order
    pub fn pairs(&self) -> impl Iterator<Item = (&Path, &Path)> {
        self.iter().flat_map(|(source, targets)| {
            targets
                .iter()
                .map(move |target| (source.as_path(), target.as_path()))
        })
    }

    /// Persist the snapshot atomically
    ///
    /// # Errors
    ///
    /// - [`crate::RelinkError::Persist`] if the file cannot be written
    pub fn save(&self, path: &Path) -> Result<()> {
        utils::atomic_write_json(path, self)?;
        info!("Snapshot saved to {:?}", path);
        Ok(())
    }

    /// Load a snapshot fully into memory
    ///
    /// # Errors
    ///
    /// - [`crate::RelinkError::SnapshotNotFound`] if `path` does not exist
    /// - [`crate::RelinkError::Json`] if the document is not a valid snapshot
    pub fn load(path: &Path) -> Result<Self> {
        match utils::read_json(path) {
            Ok(snapshot) => Ok(snapshot),
            Err(RelinkError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                Err(RelinkError::SnapshotNotFound(path.to_path_buf()))
            }
            Err(e) => Err(e),
        }
    }
}

/// Walks the source tree and records which files have linked targets
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    walker: FileWalker,
}

impl SnapshotBuilder {
    /// Create a builder from the shared configuration
    pub fn new(config: &RelinkConfig) -> Result<Self> {
        Ok(Self {
            walker: FileWalker::new(&config.exclude_patterns)?
                .with_progress(config.progress_interval, None),
        })
    }

    /// Attach a progress callback, invoked at the configured interval
    pub fn with_progress_callback(mut self, interval: usize, callback: ProgressCallback) -> Self {
        self.walker = self.walker.with_progress(interval, Some(callback));
        self
    }

    /// Build a snapshot of `source_root` against `index`
    ///
    /// Each source file whose identity appears in the index is recorded with a
    /// copy of that bucket, minus the source path itself. Files without a
    /// linked counterpart are left out.
    ///
    /// # Errors
    ///
    /// - [`crate::RelinkError::SourceNotFound`] / [`crate::RelinkError::NotADirectory`] if
    ///   `source_root` is not an existing directory
    #[instrument(skip(self, index))]
    pub fn build(&self, source_root: &Path, index: &InodeIndex) -> Result<(Snapshot, WalkStats)> {
        let start = Instant::now();
        let mut snapshot = Snapshot::new();

        let stats = self.walker.walk(source_root, "Scanning source", |file| {
            let Some(bucket) = index.get(&file.identity) else {
                return;
            };
            let targets: Vec<PathBuf> = bucket
                .iter()
                .filter(|target| **target != file.path)
                .cloned()
                .collect();
            if targets.is_empty() {
                return;
            }
            debug!("{:?} is linked to {} target(s)", file.path, targets.len());
            snapshot.insert(file.path, targets);
        })?;

        info!(
            "Recorded {} of {} source files ({} links) in {:?}",
            snapshot.len(),
            stats.files,
            snapshot.pair_count(),
            start.elapsed()
        );
        Ok((snapshot, stats))
    }
}
