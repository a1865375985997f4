//! Inode index over the target trees
//!
//! The [`InodeIndexer`] walks every target root and groups file paths by
//! [`FileIdentity`]. The resulting [`InodeIndex`] lives for one process run;
//! it is never the authoritative artifact. An optional debug dump can be
//! written for inspection, but nothing reads it back.
//!
//! ## Example
//!
//! ```rust,no_run
//! use relinker::index::InodeIndexer;
//! use relinker::types::RelinkConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RelinkConfig {
//!     target_roots: vec![PathBuf::from("/media/movies"), PathBuf::from("/media/shows")],
//!     ..Default::default()
//! };
//! let index = InodeIndexer::new(&config)?.build(&config.target_roots)?;
//! println!("{} files across {} identities", index.file_count(), index.len());
//! # Ok(())
//! # }
//! ```

use crate::error::{RelinkError, Result};
use crate::types::{FileIdentity, ProgressCallback, RelinkConfig};
use crate::utils;
use crate::walk::{FileWalker, WalkStats};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Mapping from file identity to every indexed path sharing it
///
/// Paths within a bucket keep walk order.
#[derive(Debug, Clone, Default)]
pub struct InodeIndex {
    buckets: HashMap<FileIdentity, Vec<PathBuf>>,
    file_count: usize,
    errors: usize,
}

impl InodeIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `path` to the bucket for `identity`
    pub fn insert(&mut self, identity: FileIdentity, path: PathBuf) {
        self.buckets.entry(identity).or_default().push(path);
        self.file_count += 1;
    }

    /// Paths recorded for `identity`
    pub fn get(&self, identity: &FileIdentity) -> Option<&[PathBuf]> {
        self.buckets.get(identity).map(Vec::as_slice)
    }

    /// Number of distinct identities
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether nothing was indexed
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Number of indexed paths
    pub fn file_count(&self) -> usize {
        self.file_count
    }

    /// Files skipped while building the index
    pub fn errors(&self) -> usize {
        self.errors
    }

    /// Iterate over all buckets
    pub fn iter(&self) -> impl Iterator<Item = (&FileIdentity, &Vec<PathBuf>)> {
        self.buckets.iter()
    }

    /// Render the index with `"<device>:<inode>"` keys in identity order
    pub fn to_debug_map(&self) -> BTreeMap<String, Vec<PathBuf>> {
        let mut ordered: Vec<_> = self.iter().collect();
        ordered.sort_by_key(|(identity, _)| **identity);

        let mut map = BTreeMap::new();
        for (identity, paths) in ordered {
            map.insert(identity.to_string(), paths.clone());
        }
        map
    }

    /// Write the debug dump to `path`
    pub fn save_debug_map(&self, path: &Path) -> Result<()> {
        utils::atomic_write_json(path, &self.to_debug_map())
    }
}

/// Builds an [`InodeIndex`] from one or more target roots
#[derive(Debug, Clone)]
pub struct InodeIndexer {
    walker: FileWalker,
    debug_inode_map: Option<PathBuf>,
}

impl InodeIndexer {
    /// Create an indexer from the shared configuration
    ///
    /// # Errors
    ///
    /// - [`crate::RelinkError::InvalidPattern`] if an exclude pattern is invalid
    pub fn new(config: &RelinkConfig) -> Result<Self> {
        Ok(Self {
            walker: FileWalker::new(&config.exclude_patterns)?
                .with_progress(config.progress_interval, None),
            debug_inode_map: config.debug_inode_map.clone(),
        })
    }

    /// Attach a progress callback, invoked at the configured interval
    pub fn with_progress_callback(mut self, interval: usize, callback: ProgressCallback) -> Self {
        self.walker = self.walker.with_progress(interval, Some(callback));
        self
    }

    /// Walk `roots` and index every regular file
    ///
    /// Unreadable files are logged and skipped. Device numbers are part of
    /// the key, so roots on different filesystems never merge buckets.
    ///
    /// # Errors
    ///
    /// - [`crate::RelinkError::InvalidConfiguration`] if `roots` is empty
    /// - [`crate::RelinkError::SourceNotFound`] / [`crate::RelinkError::NotADirectory`] if a
    ///   root is not an existing directory
    #[instrument(skip(self))]
    pub fn build(&self, roots: &[PathBuf]) -> Result<InodeIndex> {
        if roots.is_empty() {
            return Err(RelinkError::invalid_config("at least one target directory is required"));
        }

        let start = Instant::now();
        let mut index = InodeIndex::new();
        let mut totals = WalkStats::default();

        for root in roots {
            let stats = self.walker.walk(root, "Indexing targets", |file| {
                index.insert(file.identity, file.path);
            })?;
            totals.files += stats.files;
            totals.errors += stats.errors;
            totals.excluded += stats.excluded;
        }
        index.errors = totals.errors;

        info!(
            "Finished building inode map for {} files ({} identities, {} skipped) in {:?}",
            totals.files,
            index.len(),
            totals.errors,
            start.elapsed()
        );

        if let Some(path) = &self.debug_inode_map {
            match index.save_debug_map(path) {
                Ok(()) => info!("Inode map saved to {:?}", path),
                Err(e) => warn!("Failed to save inode map to {:?}: {}", path, e),
            }
        }

        Ok(index)
    }
}
