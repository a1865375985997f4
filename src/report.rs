//! Non-restored report
//!
//! Pairs the reconciler refuses to touch are collected here and written as a
//! JSON array once the whole batch has been processed. The report is a
//! terminal artifact for a human or a downstream tool.

use crate::error::Result;
use crate::types::{MismatchReason, NonRestoredEntry};
use crate::utils;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::info;

/// What [`NonRestoredReport::persist`] did with the report file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportDisposition {
    /// Entries were written to the path
    Written(PathBuf),
    /// No entries; a stale report from an earlier run was removed
    ClearedStale(PathBuf),
    /// No entries and nothing was written or removed
    Untouched,
}

/// Thread-safe accumulator of unsafe pairs
#[derive(Debug, Default)]
pub struct NonRestoredReport {
    entries: Mutex<Vec<NonRestoredEntry>>,
}

impl NonRestoredReport {
    /// Create an empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an unsafe pair; safe to call from several workers
    pub fn record(&self, source: &Path, target: &Path, reason: MismatchReason) {
        self.entries.lock().push(NonRestoredEntry {
            source_file: source.to_path_buf(),
            target_file: target.to_path_buf(),
            reason,
        });
    }

    /// Number of recorded entries
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Recorded entries sorted by (source, target)
    pub fn entries(&self) -> Vec<NonRestoredEntry> {
        let mut entries = self.entries.lock().clone();
        entries.sort();
        entries
    }

    /// Write the report to `path`, overwriting any previous one
    ///
    /// With no entries nothing is written; an existing file at `path` is
    /// removed when `clear_stale` is set and left alone otherwise.
    ///
    /// # Errors
    ///
    /// - [`crate::RelinkError::Persist`] if the report cannot be written
    /// - [`crate::RelinkError::Io`] if a stale report cannot be removed
    pub fn persist(&self, path: &Path, clear_stale: bool) -> Result<ReportDisposition> {
        let entries = self.entries();
        if entries.is_empty() {
            if clear_stale && utils::remove_file_if_exists(path)? {
                info!("Removed stale non-restored report {:?}", path);
                return Ok(ReportDisposition::ClearedStale(path.to_path_buf()));
            }
            info!("All hardlinks were restored successfully");
            return Ok(ReportDisposition::Untouched);
        }

        utils::atomic_write_json(path, &entries)?;
        info!("Non-restored hardlinks ({}) saved to {:?}", entries.len(), path);
        Ok(ReportDisposition::Written(path.to_path_buf()))
    }
}
