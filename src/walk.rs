//! Recursive regular-file walk shared by the indexer and the snapshot builder
//!
//! Both phases need the same traversal: every regular file under a root, with
//! its `(device, inode)` identity, skipping excluded files and tolerating
//! individual unreadable entries. Only a root that cannot be read at all stops
//! the walk.

use crate::error::{RelinkError, Result};
use crate::types::{FileIdentity, ProgressCallback, ProgressInfo};
use crate::utils;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// A regular file found during a walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedFile {
    /// Absolute path: the absolute root joined with the relative entry path
    pub path: PathBuf,
    /// Identity of the file
    pub identity: FileIdentity,
    /// Number of hardlinks to the file, counting this one
    pub link_count: u64,
}

/// Counters for one walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Regular files visited
    pub files: usize,
    /// Entries skipped because of errors
    pub errors: usize,
    /// Files skipped by exclude patterns
    pub excluded: usize,
}

/// Walker over regular files with exclude patterns and progress reporting
#[derive(Clone, Default)]
pub struct FileWalker {
    excludes: Option<GlobSet>,
    progress_interval: usize,
    progress_callback: Option<ProgressCallback>,
}

impl std::fmt::Debug for FileWalker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWalker")
            .field("excludes", &self.excludes.as_ref().map(GlobSet::len))
            .field("progress_interval", &self.progress_interval)
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl FileWalker {
    /// Create a walker that skips files matching any of `patterns`
    ///
    /// # Errors
    ///
    /// - [`crate::RelinkError::InvalidPattern`] if a pattern is not valid glob syntax
    pub fn new(patterns: &[String]) -> Result<Self> {
        let excludes = if patterns.is_empty() {
            None
        } else {
            let mut builder = GlobSetBuilder::new();
            for pattern in patterns {
                let glob = Glob::new(pattern)
                    .map_err(|e| RelinkError::InvalidPattern(format!("{}: {}", pattern, e)))?;
                builder.add(glob);
            }
            Some(
                builder
                    .build()
                    .map_err(|e| RelinkError::InvalidPattern(e.to_string()))?,
            )
        };

        Ok(Self {
            excludes,
            progress_interval: 0,
            progress_callback: None,
        })
    }

    /// Report progress every `interval` files (0 disables it)
    pub fn with_progress(mut self, interval: usize, callback: Option<ProgressCallback>) -> Self {
        self.progress_interval = interval;
        self.progress_callback = callback;
        self
    }

    fn is_excluded(&self, path: &Path) -> bool {
        match &self.excludes {
            Some(set) => {
                set.is_match(path) || path.file_name().is_some_and(|name| set.is_match(name))
            }
            None => false,
        }
    }

    /// Visit every regular file under `root` in file-name order
    ///
    /// Symbolic links are not followed and are not visited. A relative `root`
    /// is resolved against the current directory first, so every visited
    /// path is absolute and stays valid from any other working directory.
    ///
    /// # Errors
    ///
    /// - [`crate::RelinkError::SourceNotFound`] / [`crate::RelinkError::NotADirectory`] if
    ///   `root` is not an existing directory
    /// - [`crate::RelinkError::WalkDir`] if `root` itself cannot be read
    pub fn walk<F>(&self, root: &Path, operation: &str, mut visit: F) -> Result<WalkStats>
    where
        F: FnMut(WalkedFile),
    {
        utils::ensure_directory(root)?;
        let root = std::path::absolute(root)?;
        let mut stats = WalkStats::default();

        for entry in WalkDir::new(&root).follow_links(false).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(e.into()),
                Err(e) => {
                    warn!("Skipping unreadable entry during {}: {}", operation, e);
                    stats.errors += 1;
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if path.to_str().is_none() {
                warn!("Skipping non UTF-8 path {:?}", path);
                stats.errors += 1;
                continue;
            }
            if self.is_excluded(path) {
                debug!("Excluded {:?}", path);
                stats.excluded += 1;
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("Error processing file {:?}: {}", path, e);
                    stats.errors += 1;
                    continue;
                }
            };
            let identity = FileIdentity::from_metadata(&metadata)?;

            visit(WalkedFile {
                path: path.to_path_buf(),
                identity,
                link_count: link_count(&metadata),
            });
            stats.files += 1;

            if self.progress_interval > 0 && stats.files % self.progress_interval == 0 {
                info!("{}: processed {} files", operation, stats.files);
                if let Some(callback) = &self.progress_callback {
                    callback(ProgressInfo {
                        operation: operation.to_string(),
                        current_item: Some(path.to_string_lossy().into_owned()),
                        processed: stats.files,
                    });
                }
            }
        }

        Ok(stats)
    }
}

#[cfg(unix)]
fn link_count(metadata: &std::fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.nlink()
}

#[cfg(not(unix))]
fn link_count(_metadata: &std::fs::Metadata) -> u64 {
    1
}
