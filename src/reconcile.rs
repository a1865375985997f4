//! Link reconciliation
//!
//! The [`LinkReconciler`] walks every (source, target) pair of a loaded
//! [`Snapshot`] and decides, in strict order:
//!
//! 1. **Missing** target: create parent directories and hardlink it.
//! 2. Target shares the source's identity: already linked, nothing to do.
//! 3. Size, mtime, or file type differ: leave it, report `metadata-mismatch`.
//! 4. Content digests differ: leave it, report `content-mismatch`.
//!    Digests match: delete the target and hardlink it to the source.
//!
//! A target is only ever deleted after its content has been proven equal to
//! the source. Cheap checks run before hashing so the common cases stay cheap.
//!
//! Pairs are independent. Any unexpected I/O error is logged and reported as
//! [`LinkAction::Failed`] for that pair while the batch continues. Since an
//! already-linked pair is a no-op, running a restore again after an
//! interruption finishes the job without redoing completed pairs.
//!
//! ## Parallelism
//!
//! With more than one worker the pairs run on a dedicated `rayon` pool of that
//! size. `create_dir_all` tolerates concurrent creators of the same directory,
//! and unsafe pairs go through the mutex-protected [`NonRestoredReport`].

use crate::error::{RelinkError, Result};
use crate::hasher::ContentHasher;
use crate::report::NonRestoredReport;
use crate::snapshot::Snapshot;
use crate::types::{
    EventCallback, FileIdentity, LinkAction, MismatchReason, PairOutcome, RelinkConfig,
    RestoreResult,
};
use rayon::prelude::*;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Hashing work shared by every worker of one run
#[derive(Debug, Default)]
struct HashCounters {
    digests: AtomicUsize,
    bytes: AtomicU64,
}

impl HashCounters {
    fn record(&self, len: u64) {
        self.digests.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(len, Ordering::Relaxed);
    }
}

/// Decides and applies the restore action for each snapshot pair
#[derive(Clone)]
pub struct LinkReconciler {
    hasher: ContentHasher,
    parallel_workers: usize,
    dry_run: bool,
    event_callback: Option<EventCallback>,
}

impl std::fmt::Debug for LinkReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkReconciler")
            .field("hasher", &self.hasher)
            .field("parallel_workers", &self.parallel_workers)
            .field("dry_run", &self.dry_run)
            .field("event_callback", &self.event_callback.is_some())
            .finish()
    }
}

impl LinkReconciler {
    /// Create a reconciler from the shared configuration
    pub fn new(config: &RelinkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            hasher: ContentHasher::new(config.hash_chunk_size)?,
            parallel_workers: config.parallel_workers,
            dry_run: config.dry_run,
            event_callback: None,
        })
    }

    /// Subscribe to per-pair outcomes as they are decided
    pub fn with_event_callback(mut self, callback: EventCallback) -> Self {
        self.event_callback = Some(callback);
        self
    }

    /// Reconcile every pair of `snapshot`
    ///
    /// Unsafe pairs are recorded in `report`; persisting it is left to the
    /// caller. Outcomes in the result keep snapshot order regardless of the
    /// worker count.
    ///
    /// # Errors
    ///
    /// - [`crate::RelinkError::ThreadPool`] if the worker pool cannot be created
    pub fn reconcile(&self, snapshot: &Snapshot, report: &NonRestoredReport) -> Result<RestoreResult> {
        let start = Instant::now();
        let pairs: Vec<(&Path, &Path)> = snapshot.pairs().collect();
        let hashes = HashCounters::default();

        info!(
            "Reconciling {} pairs from {} sources ({} worker(s){})",
            pairs.len(),
            snapshot.len(),
            self.parallel_workers,
            if self.dry_run { ", dry run" } else { "" }
        );

        let run = |&(source, target): &(&Path, &Path)| self.process_pair(source, target, report, &hashes);

        let outcomes: Vec<PairOutcome> = if self.parallel_workers > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.parallel_workers)
                .build()
                .map_err(|e| RelinkError::ThreadPool(e.to_string()))?;
            pool.install(|| pairs.par_iter().map(run).collect())
        } else {
            pairs.iter().map(run).collect()
        };

        let mut result = RestoreResult {
            pairs_total: outcomes.len(),
            dry_run: self.dry_run,
            hashes_computed: hashes.digests.load(Ordering::Relaxed),
            bytes_hashed: hashes.bytes.load(Ordering::Relaxed),
            ..Default::default()
        };
        for outcome in &outcomes {
            match outcome.action {
                LinkAction::Created => result.created += 1,
                LinkAction::AlreadyLinked => result.already_linked += 1,
                LinkAction::Relinked => result.relinked += 1,
                LinkAction::NotRestored(_) => result.not_restored += 1,
                LinkAction::Failed(_) => result.failed += 1,
            }
        }
        result.outcomes = outcomes;
        result.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Reconciliation complete: {} created, {} relinked, {} already linked, {} not restored, {} failed",
            result.created, result.relinked, result.already_linked, result.not_restored, result.failed
        );
        Ok(result)
    }

    /// Reconcile a single pair, logging and reporting its outcome
    fn process_pair(
        &self,
        source: &Path,
        target: &Path,
        report: &NonRestoredReport,
        hashes: &HashCounters,
    ) -> PairOutcome {
        let action = match self.evaluate(source, target, hashes) {
            Ok(action) => action,
            Err(e) => LinkAction::Failed(e.to_string()),
        };

        match &action {
            LinkAction::Created => info!("Created hardlink: {:?} -> {:?}", source, target),
            LinkAction::AlreadyLinked => {
                debug!("Source {:?} and target {:?} are already hardlinked, skipping", source, target)
            }
            LinkAction::Relinked => {
                info!("Deleted {:?} and created hardlink from {:?}", target, source)
            }
            LinkAction::NotRestored(reason) => {
                info!("Not restoring {:?} from {:?}: {}", target, source, reason);
                report.record(source, target, *reason);
            }
            LinkAction::Failed(message) => {
                warn!("Error processing link from {:?} to {:?}: {}", source, target, message)
            }
        }

        let outcome = PairOutcome {
            source: source.to_path_buf(),
            target: target.to_path_buf(),
            action,
        };
        if let Some(callback) = &self.event_callback {
            callback(&outcome);
        }
        outcome
    }

    fn evaluate(&self, source: &Path, target: &Path, hashes: &HashCounters) -> Result<LinkAction> {
        let source_meta = fs::metadata(source)?;

        let target_meta = match fs::symlink_metadata(target) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if self.dry_run {
                    return Ok(LinkAction::Created);
                }
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                return link_missing(source, FileIdentity::from_metadata(&source_meta)?, target);
            }
            Err(e) => return Err(e.into()),
        };

        if FileIdentity::from_metadata(&source_meta)? == FileIdentity::from_metadata(&target_meta)? {
            return Ok(LinkAction::AlreadyLinked);
        }

        if !target_meta.file_type().is_file()
            || source_meta.len() != target_meta.len()
            || source_meta.modified()? != target_meta.modified()?
        {
            return Ok(LinkAction::NotRestored(MismatchReason::MetadataMismatch));
        }

        let source_digest = self.hasher.hash_file(source)?;
        hashes.record(source_meta.len());
        let target_digest = self.hasher.hash_file(target)?;
        hashes.record(target_meta.len());

        if source_digest != target_digest {
            return Ok(LinkAction::NotRestored(MismatchReason::ContentMismatch));
        }

        if !self.dry_run {
            trace!("unlink {:?}", target);
            fs::remove_file(target)?;
            trace!("link {:?} -> {:?}", source, target);
            fs::hard_link(source, target)?;
        }
        Ok(LinkAction::Relinked)
    }
}

/// Hardlink a target that was missing when it was checked
///
/// Two sources sharing an inode list the same targets, so another worker may
/// create the link first. That counts as already linked; any other file that
/// appeared in the meantime is an error for this pair.
fn link_missing(source: &Path, source_identity: FileIdentity, target: &Path) -> Result<LinkAction> {
    trace!("link {:?} -> {:?}", source, target);
    match fs::hard_link(source, target) {
        Ok(()) => Ok(LinkAction::Created),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing = FileIdentity::from_metadata(&fs::symlink_metadata(target)?)?;
            if existing == source_identity {
                debug!("{:?} was linked by another worker", target);
                Ok(LinkAction::AlreadyLinked)
            } else {
                Err(e.into())
            }
        }
        Err(e) => Err(e.into()),
    }
}
