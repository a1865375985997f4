//! Core data types used throughout the relinker library
//!
//! This module contains the data structures shared by the indexer, the
//! snapshot builder, and the reconciler.
//!
//! ## Overview
//!
//! - **Identity**: [`FileIdentity`] - the `(device, inode)` pair that decides
//!   whether two paths are the same file
//! - **Configuration**: [`RelinkConfig`] - every tunable, passed explicitly to
//!   each component
//! - **Restore outcomes**: [`LinkAction`], [`PairOutcome`], [`NonRestoredEntry`]
//! - **Results**: [`SnapshotResult`], [`RestoreResult`]
//! - **Callbacks**: [`ProgressCallback`], [`EventCallback`]

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{RelinkError, Result};

/// Default chunk size used when hashing file content
pub const DEFAULT_HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Default number of walked files between progress reports
pub const DEFAULT_PROGRESS_INTERVAL: usize = 1000;

/// Default file name of the non-restored report
pub const DEFAULT_NON_RESTORED_FILE: &str = "non_restored_hardlinks.json";

/// Filesystem identity of a file
///
/// Inode numbers are only unique within one device, so identity is always
/// the pair of both.
///
/// # Examples
///
/// ```rust
/// use relinker::types::FileIdentity;
///
/// let id = FileIdentity { device: 2049, inode: 131_072 };
/// assert_eq!(id.to_string(), "2049:131072");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileIdentity {
    /// Device the file lives on
    pub device: u64,
    /// Inode number within that device
    pub inode: u64,
}

impl FileIdentity {
    /// Extract the identity from already-fetched metadata
    #[cfg(unix)]
    pub fn from_metadata(metadata: &fs::Metadata) -> Result<Self> {
        use std::os::unix::fs::MetadataExt;
        Ok(Self {
            device: metadata.dev(),
            inode: metadata.ino(),
        })
    }

    /// Extract the identity from already-fetched metadata
    #[cfg(not(unix))]
    pub fn from_metadata(_metadata: &fs::Metadata) -> Result<Self> {
        Err(RelinkError::UnsupportedPlatform)
    }

    /// Stat `path` (following symlinks) and return its identity
    pub fn of(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path)?;
        Self::from_metadata(&metadata)
    }
}

impl fmt::Display for FileIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device, self.inode)
    }
}

/// Why a target was left alone during restore
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MismatchReason {
    /// Size and mtime matched but the content digests differ
    ContentMismatch,
    /// Size, mtime, or file type differ
    MetadataMismatch,
}

impl MismatchReason {
    /// Stable name, as written to the report
    pub fn as_str(&self) -> &'static str {
        match self {
            MismatchReason::ContentMismatch => "content-mismatch",
            MismatchReason::MetadataMismatch => "metadata-mismatch",
        }
    }
}

impl fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unsafe (source, target) pair recorded in the non-restored report
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NonRestoredEntry {
    /// Snapshot source path
    pub source_file: PathBuf,
    /// Target path that was left untouched
    pub target_file: PathBuf,
    /// Classification that made the pair unsafe
    pub reason: MismatchReason,
}

/// What the reconciler did (or, in a dry run, would do) with one pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    /// Target was missing and a hardlink was created
    Created,
    /// Target already shared the source's identity
    AlreadyLinked,
    /// Target was byte-identical; it was deleted and relinked
    Relinked,
    /// Target was left alone and reported
    NotRestored(MismatchReason),
    /// An unexpected I/O error stopped this pair
    Failed(String),
}

impl LinkAction {
    /// Whether this action changes the filesystem
    pub fn is_mutation(&self) -> bool {
        matches!(self, LinkAction::Created | LinkAction::Relinked)
    }
}

/// Outcome record for a single (source, target) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairOutcome {
    /// Snapshot source path
    pub source: PathBuf,
    /// Target path
    pub target: PathBuf,
    /// Decision taken for the pair
    pub action: LinkAction,
}

/// Configuration shared by every component
///
/// Built through [`crate::RelinkerBuilder`]; components receive it (or a
/// clone) at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelinkConfig {
    /// Roots walked by the inode indexer
    pub target_roots: Vec<PathBuf>,
    /// Bytes read per chunk when hashing
    pub hash_chunk_size: usize,
    /// Optional advisory dump of the inode index
    pub debug_inode_map: Option<PathBuf>,
    /// Where the non-restored report is written
    pub non_restored_path: PathBuf,
    /// Worker threads used by the reconciler (1 = sequential)
    pub parallel_workers: usize,
    /// Walked files between progress reports (0 disables them)
    pub progress_interval: usize,
    /// Glob patterns for files both walks skip
    pub exclude_patterns: Vec<String>,
    /// Classify pairs without touching the filesystem
    pub dry_run: bool,
    /// Remove an old report when a run finds nothing unsafe
    pub clear_stale_report: bool,
}

impl Default for RelinkConfig {
    fn default() -> Self {
        Self {
            target_roots: Vec::new(),
            hash_chunk_size: DEFAULT_HASH_CHUNK_SIZE,
            debug_inode_map: None,
            non_restored_path: PathBuf::from(DEFAULT_NON_RESTORED_FILE),
            parallel_workers: 1,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            exclude_patterns: Vec::new(),
            dry_run: false,
            clear_stale_report: true,
        }
    }
}

impl RelinkConfig {
    /// Check values that would make a component misbehave
    pub fn validate(&self) -> Result<()> {
        if self.hash_chunk_size == 0 {
            return Err(RelinkError::invalid_config("hash chunk size must be greater than zero"));
        }
        if self.parallel_workers == 0 {
            return Err(RelinkError::invalid_config("parallel workers must be at least 1"));
        }
        Ok(())
    }
}

/// Result of a snapshot operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotResult {
    /// Number of source files recorded in the snapshot
    pub entries: usize,
    /// Regular files seen under the source root
    pub source_files_scanned: usize,
    /// Regular files indexed under the target roots
    pub target_files_indexed: usize,
    /// Total target paths recorded across all entries
    pub links_recorded: usize,
    /// Files skipped because they could not be read
    pub errors: usize,
    /// Time taken in milliseconds
    pub duration_ms: u64,
}

/// Result of a restore operation
#[derive(Debug, Clone, Default)]
pub struct RestoreResult {
    /// Pairs read from the snapshot
    pub pairs_total: usize,
    /// Missing targets that were linked
    pub created: usize,
    /// Pairs already sharing an identity
    pub already_linked: usize,
    /// Identical copies replaced by a hardlink
    pub relinked: usize,
    /// Pairs left alone and reported
    pub not_restored: usize,
    /// Pairs that hit an unexpected I/O error
    pub failed: usize,
    /// Content digests computed
    pub hashes_computed: usize,
    /// Bytes read while computing those digests
    pub bytes_hashed: u64,
    /// Whether the run only classified pairs
    pub dry_run: bool,
    /// Report written by this run, if any
    pub report_path: Option<PathBuf>,
    /// Time taken in milliseconds
    pub duration_ms: u64,
    /// Per-pair outcomes in snapshot order
    pub outcomes: Vec<PairOutcome>,
}

impl RestoreResult {
    /// Number of pairs that changed the filesystem
    pub fn mutations(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.action.is_mutation())
            .count()
    }
}

/// Result of a search for files that lost every hardlink
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnlinkedResult {
    /// Matching files whose link count is 1, in walk order
    pub files: Vec<PathBuf>,
    /// Regular files seen under the root
    pub files_scanned: usize,
    /// Files skipped because they could not be read
    pub errors: usize,
    /// Time taken in milliseconds
    pub duration_ms: u64,
}

/// Progress callback for long-running walks
pub type ProgressCallback = Arc<dyn Fn(ProgressInfo) + Send + Sync>;

/// Per-pair outcome subscriber
pub type EventCallback = Arc<dyn Fn(&PairOutcome) + Send + Sync>;

/// Information passed to progress callbacks
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Operation being performed
    pub operation: String,
    /// Current item being processed
    pub current_item: Option<String>,
    /// Items processed so far
    pub processed: usize,
}
