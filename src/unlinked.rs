//! Files that lost every hardlink
//!
//! A download that was never linked into the library (or whose library copy
//! was deleted) has a link count of one. [`UnlinkedFinder`] lists those files
//! under a root, by default only video files, so they can be linked or
//! cleaned up by hand.

use crate::error::Result;
use crate::types::{ProgressCallback, RelinkConfig, UnlinkedResult};
use crate::walk::FileWalker;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Extensions matched when none are given
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "flv", "wmv", "mpeg", "mpg", "webm",
];

/// Walks a tree and collects regular files with a single link
#[derive(Debug, Clone)]
pub struct UnlinkedFinder {
    walker: FileWalker,
    extensions: Vec<String>,
}

impl UnlinkedFinder {
    /// Create a finder for files with one of `extensions`
    ///
    /// Extensions compare case-insensitively and may carry a leading dot. An
    /// empty list matches every file.
    pub fn new(config: &RelinkConfig, extensions: &[String]) -> Result<Self> {
        let extensions = extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        Ok(Self {
            walker: FileWalker::new(&config.exclude_patterns)?
                .with_progress(config.progress_interval, None),
            extensions,
        })
    }

    /// Attach a progress callback, invoked at the configured interval
    pub fn with_progress_callback(mut self, interval: usize, callback: ProgressCallback) -> Self {
        self.walker = self.walker.with_progress(interval, Some(callback));
        self
    }

    fn matches(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
    }

    /// List every matching file under `root` whose link count is one
    ///
    /// # Errors
    ///
    /// - [`crate::RelinkError::SourceNotFound`] / [`crate::RelinkError::NotADirectory`] if
    ///   `root` is not an existing directory
    #[instrument(skip(self))]
    pub fn find(&self, root: &Path) -> Result<UnlinkedResult> {
        let start = Instant::now();
        let mut files = Vec::new();

        let stats = self.walker.walk(root, "Finding unlinked files", |file| {
            if file.link_count == 1 && self.matches(&file.path) {
                debug!("{:?} has no other links", file.path);
                files.push(file.path);
            }
        })?;

        info!("{} of {} files under {:?} are unlinked", files.len(), stats.files, root);
        Ok(UnlinkedResult {
            files,
            files_scanned: stats.files,
            errors: stats.errors,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}
