//! # Relinker - hardlink snapshots and restores
//!
//! Media libraries often keep one copy of each file and expose it in several
//! places through hardlinks. Moving data between disks, restoring a backup,
//! or a careless copy breaks those links silently and doubles the space used.
//! Relinker records which files are linked where and later puts the links
//! back, without ever deleting data it has not proven redundant.
//!
//! ## Overview
//!
//! Two independent phases share a single JSON artifact:
//!
//! - **Snapshot**: walk the target trees and group every file by its
//!   `(device, inode)` identity, then walk the source tree and record each
//!   source file together with the target paths that share its identity.
//! - **Restore**: load the snapshot and reconcile every (source, target) pair.
//!   Missing targets are linked, already-linked pairs are left alone,
//!   byte-identical copies are replaced by a hardlink, and anything else is
//!   reported instead of touched.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use relinker::RelinkerBuilder;
//! use std::path::{Path, PathBuf};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let relinker = RelinkerBuilder::new()
//!     .add_target_root(PathBuf::from("/data/library/movies"))
//!     .add_target_root(PathBuf::from("/data/library/shows"))
//!     .build()?;
//!
//! let snap = relinker.snapshot(Path::new("/data/downloads"), Path::new("links.json"))?;
//! println!("Recorded {} linked files", snap.entries);
//!
//! let restored = relinker.restore(Path::new("links.json"))?;
//! println!("Created {} links, {} left for review", restored.created, restored.not_restored);
//! # Ok(())
//! # }
//! ```
//!
//! ## Restore decisions
//!
//! | Target state | Action |
//! |---|---|
//! | missing | create parent directories, hardlink |
//! | same identity as source | nothing |
//! | size, mtime, or file type differ | report `metadata-mismatch` |
//! | same size and mtime, different digest | report `content-mismatch` |
//! | same size, mtime, and digest | delete, hardlink |
//!
//! Restore is idempotent: a second run over the same snapshot finds every
//! pair already linked.
//!
//! ## Error Handling
//!
//! Run-level failures (bad roots, missing snapshot, artifacts that cannot be
//! written) are returned as [`RelinkError`]. A single unreadable file or a
//! failing pair is logged through `tracing`, counted, and skipped.
//!
//! ## Module Organization
//!
//! - [`hasher`]: chunked SHA-256 content hashing
//! - [`index`]: inode index over the target trees
//! - [`snapshot`]: snapshot type, builder, and persistence
//! - [`reconcile`]: the per-pair restore decision procedure
//! - [`report`]: non-restored report
//! - [`unlinked`]: files whose every other hardlink is gone
//! - [`types`]: shared data types and configuration
//! - [`error`]: error types

// Public API modules
pub mod error;
pub mod hasher;
pub mod index;
pub mod reconcile;
pub mod relinker;
pub mod report;
pub mod snapshot;
pub mod types;
pub mod unlinked;
pub mod utils;
pub mod walk;

// Re-export main types for convenience
pub use error::{RelinkError, Result};
pub use hasher::ContentHasher;
pub use index::{InodeIndex, InodeIndexer};
pub use reconcile::LinkReconciler;
pub use relinker::{Relinker, RelinkerBuilder};
pub use report::{NonRestoredReport, ReportDisposition};
pub use snapshot::{Snapshot, SnapshotBuilder};
pub use types::*;
pub use unlinked::{UnlinkedFinder, VIDEO_EXTENSIONS};
