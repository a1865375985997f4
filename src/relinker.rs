//! Main relinker implementation
//!
//! [`Relinker`] wires one [`RelinkConfig`] into the indexer, the snapshot
//! builder, the reconciler, and the report, and exposes the two independent
//! phases:
//!
//! - [`Relinker::snapshot`]: index the target roots, record which source
//!   files are linked where, and persist the snapshot.
//! - [`Relinker::restore`]: load a snapshot and reconcile every pair, then
//!   persist the non-restored report.
//!
//! The phases share nothing but the snapshot file, so they can run in
//! different processes at different times.
//!
//! ## Examples
//!
//! ```rust,no_run
//! use relinker::RelinkerBuilder;
//! use std::path::{Path, PathBuf};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let relinker = RelinkerBuilder::new()
//!     .target_roots(vec![PathBuf::from("/data/movies")])
//!     .build()?;
//!
//! relinker.snapshot(Path::new("/data/torrents"), Path::new("links.json"))?;
//!
//! // ... later, after the links were lost
//! let result = relinker.restore(Path::new("links.json"))?;
//! println!("{} links created, {} not restored", result.created, result.not_restored);
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::index::{InodeIndex, InodeIndexer};
use crate::reconcile::LinkReconciler;
use crate::report::{NonRestoredReport, ReportDisposition};
use crate::snapshot::{Snapshot, SnapshotBuilder};
use crate::types::*;
use crate::unlinked::UnlinkedFinder;
use crate::walk::{FileWalker, WalkStats};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, instrument};

/// Entry point for snapshot and restore operations
#[derive(Clone)]
pub struct Relinker {
    config: RelinkConfig,
    progress_callback: Option<ProgressCallback>,
    event_callback: Option<EventCallback>,
}

impl std::fmt::Debug for Relinker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relinker")
            .field("config", &self.config)
            .field("progress_callback", &self.progress_callback.is_some())
            .field("event_callback", &self.event_callback.is_some())
            .finish()
    }
}

impl Relinker {
    /// Create a relinker from a complete configuration
    ///
    /// # Errors
    ///
    /// - [`crate::RelinkError::InvalidConfiguration`] for out-of-range values
    /// - [`crate::RelinkError::InvalidPattern`] for an invalid exclude pattern
    pub fn new(config: RelinkConfig) -> Result<Self> {
        config.validate()?;
        FileWalker::new(&config.exclude_patterns)?;
        Ok(Self {
            config,
            progress_callback: None,
            event_callback: None,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &RelinkConfig {
        &self.config
    }

    /// Index every configured target root
    pub fn build_index(&self) -> Result<InodeIndex> {
        let mut indexer = InodeIndexer::new(&self.config)?;
        if let Some(callback) = &self.progress_callback {
            indexer = indexer.with_progress_callback(self.config.progress_interval, callback.clone());
        }
        indexer.build(&self.config.target_roots)
    }

    /// Build (without persisting) the snapshot of `source_root` against `index`
    pub fn create_snapshot(&self, source_root: &Path, index: &InodeIndex) -> Result<(Snapshot, WalkStats)> {
        let mut builder = SnapshotBuilder::new(&self.config)?;
        if let Some(callback) = &self.progress_callback {
            builder = builder.with_progress_callback(self.config.progress_interval, callback.clone());
        }
        builder.build(source_root, index)
    }

    /// Run the snapshot phase and persist the result to `snapshot_file`
    ///
    /// The snapshot is fully built in memory and then written atomically, so
    /// an interrupted run never leaves a partial snapshot behind.
    ///
    /// # Errors
    ///
    /// - [`crate::RelinkError::InvalidConfiguration`] if no target roots are configured
    /// - [`crate::RelinkError::SourceNotFound`] / [`crate::RelinkError::NotADirectory`] for a
    ///   bad source or target root
    /// - [`crate::RelinkError::Persist`] if the snapshot cannot be written
    #[instrument(skip(self))]
    pub fn snapshot(&self, source_root: &Path, snapshot_file: &Path) -> Result<SnapshotResult> {
        let start = Instant::now();
        // Fail on a bad source root before spending time on the targets
        crate::utils::ensure_directory(source_root)?;

        let index = self.build_index()?;
        let (snapshot, stats) = self.create_snapshot(source_root, &index)?;
        snapshot.save(snapshot_file)?;

        let result = SnapshotResult {
            entries: snapshot.len(),
            source_files_scanned: stats.files,
            target_files_indexed: index.file_count(),
            links_recorded: snapshot.pair_count(),
            errors: stats.errors + index.errors(),
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "Snapshot of {:?} complete: {} entries, {} links in {}ms",
            source_root, result.entries, result.links_recorded, result.duration_ms
        );
        Ok(result)
    }

    /// Run the restore phase from `snapshot_file`
    ///
    /// The snapshot is loaded completely before any filesystem change.
    ///
    /// # Errors
    ///
    /// - [`crate::RelinkError::SnapshotNotFound`] if the file does not exist
    /// - [`crate::RelinkError::Json`] if it is not a valid snapshot
    /// - [`crate::RelinkError::Persist`] if the report cannot be written
    #[instrument(skip(self))]
    pub fn restore(&self, snapshot_file: &Path) -> Result<RestoreResult> {
        let snapshot = Snapshot::load(snapshot_file)?;
        info!("Loaded snapshot {:?} ({} sources)", snapshot_file, snapshot.len());
        self.restore_snapshot(&snapshot)
    }

    /// Reconcile an in-memory snapshot and persist the report
    ///
    /// Dry runs never write or remove the report.
    pub fn restore_snapshot(&self, snapshot: &Snapshot) -> Result<RestoreResult> {
        let mut reconciler = LinkReconciler::new(&self.config)?;
        if let Some(callback) = &self.event_callback {
            reconciler = reconciler.with_event_callback(callback.clone());
        }

        let report = NonRestoredReport::new();
        let mut result = reconciler.reconcile(snapshot, &report)?;

        if !self.config.dry_run {
            let disposition = report.persist(
                &self.config.non_restored_path,
                self.config.clear_stale_report,
            )?;
            if let ReportDisposition::Written(path) = disposition {
                result.report_path = Some(path);
            }
        }
        Ok(result)
    }

    /// List files under `root` with a link count of one
    ///
    /// `extensions` filters by file extension; an empty list keeps every file.
    /// Configured exclude patterns apply as in the snapshot walk.
    pub fn find_unlinked(&self, root: &Path, extensions: &[String]) -> Result<UnlinkedResult> {
        let mut finder = UnlinkedFinder::new(&self.config, extensions)?;
        if let Some(callback) = &self.progress_callback {
            finder = finder.with_progress_callback(self.config.progress_interval, callback.clone());
        }
        finder.find(root)
    }
}

/// Builder for configuring a [`Relinker`]
///
/// # Examples
///
/// ```rust
/// use relinker::RelinkerBuilder;
/// use std::path::PathBuf;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let relinker = RelinkerBuilder::new()
///     .add_target_root(PathBuf::from("/data/movies"))
///     .add_target_root(PathBuf::from("/data/shows"))
///     .hash_chunk_size(1 << 20)
///     .parallel_workers(4)
///     .exclude_patterns(vec!["*.part".to_string()])
///     .build()?;
/// assert_eq!(relinker.config().target_roots.len(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct RelinkerBuilder {
    config: RelinkConfig,
    progress_callback: Option<ProgressCallback>,
    event_callback: Option<EventCallback>,
}

impl RelinkerBuilder {
    /// Create a builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the target roots
    pub fn target_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.config.target_roots = roots;
        self
    }

    /// Add one target root
    pub fn add_target_root(mut self, root: PathBuf) -> Self {
        self.config.target_roots.push(root);
        self
    }

    /// Bytes read per chunk when hashing
    pub fn hash_chunk_size(mut self, size: usize) -> Self {
        self.config.hash_chunk_size = size;
        self
    }

    /// Also dump the inode index to `path` while snapshotting
    pub fn debug_inode_map(mut self, path: Option<PathBuf>) -> Self {
        self.config.debug_inode_map = path;
        self
    }

    /// Where the non-restored report is written
    pub fn non_restored_path(mut self, path: PathBuf) -> Self {
        self.config.non_restored_path = path;
        self
    }

    /// Number of reconciler workers; use `num_cpus::get()` for one per core
    pub fn parallel_workers(mut self, workers: usize) -> Self {
        self.config.parallel_workers = workers;
        self
    }

    /// Walked files between progress reports (0 disables them)
    pub fn progress_interval(mut self, interval: usize) -> Self {
        self.config.progress_interval = interval;
        self
    }

    /// Glob patterns for files both walks skip
    pub fn exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.config.exclude_patterns = patterns;
        self
    }

    /// Classify pairs without changing anything
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    /// Remove an old report when a run finds nothing unsafe
    pub fn clear_stale_report(mut self, clear: bool) -> Self {
        self.config.clear_stale_report = clear;
        self
    }

    /// Receive walk progress
    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Receive every per-pair restore outcome
    pub fn on_event(mut self, callback: EventCallback) -> Self {
        self.event_callback = Some(callback);
        self
    }

    /// Validate the configuration and build the [`Relinker`]
    pub fn build(self) -> Result<Relinker> {
        let mut relinker = Relinker::new(self.config)?;
        relinker.progress_callback = self.progress_callback;
        relinker.event_callback = self.event_callback;
        Ok(relinker)
    }
}

impl From<RelinkConfig> for RelinkerBuilder {
    fn from(config: RelinkConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }
}
