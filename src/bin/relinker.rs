//! # Relinker CLI - put broken hardlinks back
//!
//! Command-line front end for the relinker library.
//!
//! ## Usage
//! ```bash
//! # Record which source files are hardlinked into the library
//! relinker snapshot /data/downloads /data/movies /data/shows links.json
//!
//! # Later, after a move or restore broke the links
//! relinker restore links.json
//!
//! # See what would happen without touching anything
//! relinker restore links.json --dry-run
//!
//! # Videos under the downloads folder with no other link left
//! relinker unlinked /data/downloads
//! ```

use clap::{Parser, Subcommand};
use colored::*;
use humantime::format_duration;
use indicatif::{ProgressBar, ProgressStyle};
use relinker::{
    utils::format_bytes, LinkAction, PairOutcome, ProgressInfo, RelinkError, RelinkerBuilder,
    Result, DEFAULT_HASH_CHUNK_SIZE, DEFAULT_NON_RESTORED_FILE, VIDEO_EXTENSIONS,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Relinker CLI - snapshot and restore hardlinks between a source tree and its targets
#[derive(Parser)]
#[command(name = "relinker")]
#[command(version)]
#[command(about = "Snapshot hardlinks between directory trees and restore them safely")]
#[command(long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Show a progress spinner while walking directories
    #[arg(long, global = true)]
    progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record which source files are hardlinked into the target directories
    Snapshot {
        /// Source directory, one or more target directories, then the snapshot file
        #[arg(required = true, num_args = 3.., value_name = "SOURCE_DIR TARGET_DIR... SNAPSHOT_FILE")]
        paths: Vec<PathBuf>,

        /// Also write the raw inode map here for inspection
        #[arg(long, value_name = "FILE")]
        debug_inode_map: Option<PathBuf>,

        /// Skip files matching this glob (repeatable)
        #[arg(short, long, value_name = "GLOB")]
        exclude: Vec<String>,
    },

    /// Restore hardlinks recorded in a snapshot
    Restore {
        /// Snapshot file written by `relinker snapshot`
        snapshot_file: PathBuf,

        /// Where to write pairs that could not be restored safely
        non_restored_file: Option<PathBuf>,

        /// Number of pairs processed in parallel (0 = one per CPU core)
        #[arg(short, long, default_value_t = 1)]
        jobs: usize,

        /// Read size used when hashing file contents
        #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_HASH_CHUNK_SIZE)]
        chunk_size: usize,

        /// Report what would change without touching the filesystem
        #[arg(long)]
        dry_run: bool,

        /// Leave an existing report in place when nothing is unsafe
        #[arg(long)]
        keep_stale_report: bool,
    },

    /// List files that have no other hardlink left
    Unlinked {
        /// Directory to search
        root: PathBuf,

        /// Only list files with this extension (repeatable, default: common video types)
        #[arg(long = "ext", value_name = "EXT", conflicts_with = "all")]
        extensions: Vec<String>,

        /// List every unlinked file regardless of extension
        #[arg(long)]
        all: bool,

        /// Skip files matching this glob (repeatable)
        #[arg(short, long, value_name = "GLOB")]
        exclude: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Set up logging
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Disable colors if needed
    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red().bold(), e.user_message());
        if e.is_invocation_error() {
            eprintln!("{}", "Run 'relinker --help' for usage.".dimmed());
        }
        std::process::exit(1);
    }
}

/// Main command runner
fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Snapshot { paths, debug_inode_map, exclude } => {
            cmd_snapshot(paths, debug_inode_map, exclude, cli.progress)
        }
        Commands::Restore {
            snapshot_file,
            non_restored_file,
            jobs,
            chunk_size,
            dry_run,
            keep_stale_report,
        } => cmd_restore(
            snapshot_file,
            non_restored_file.unwrap_or_else(|| PathBuf::from(DEFAULT_NON_RESTORED_FILE)),
            jobs,
            chunk_size,
            dry_run,
            keep_stale_report,
            cli.progress,
        ),
        Commands::Unlinked { root, extensions, all, exclude } => {
            let extensions = if all {
                Vec::new()
            } else if extensions.is_empty() {
                VIDEO_EXTENSIONS.iter().map(|ext| ext.to_string()).collect()
            } else {
                extensions
            };
            cmd_unlinked(root, extensions, exclude, cli.progress)
        }
    }
}

/// Walk the targets, then the source, and write the snapshot
fn cmd_snapshot(
    mut paths: Vec<PathBuf>,
    debug_inode_map: Option<PathBuf>,
    exclude: Vec<String>,
    show_progress: bool,
) -> Result<()> {
    let snapshot_file = paths
        .pop()
        .ok_or_else(|| RelinkError::invalid_config("missing snapshot file"))?;
    if paths.len() < 2 {
        return Err(RelinkError::invalid_config(
            "expected a source directory and at least one target directory",
        ));
    }
    let source = paths.remove(0);

    println!("{}", "Taking hardlink snapshot...".blue().bold());

    let start = Instant::now();
    let progress = spinner(show_progress, "Indexing targets...");

    let mut builder = RelinkerBuilder::new()
        .target_roots(paths)
        .debug_inode_map(debug_inode_map.clone())
        .exclude_patterns(exclude);
    if let Some(pb) = &progress {
        builder = builder.on_progress(progress_reporter(pb.clone()));
    }
    let relinker = builder.build()?;

    let result = relinker.snapshot(&source, &snapshot_file)?;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    println!("{} Saved snapshot to {}",
        "✓".green().bold(),
        snapshot_file.display().to_string().cyan()
    );
    println!("  Target files indexed: {}", result.target_files_indexed.to_string().cyan());
    println!("  Source files scanned: {}", result.source_files_scanned.to_string().cyan());
    println!("  Linked sources: {}", result.entries.to_string().cyan());
    println!("  Links recorded: {}", result.links_recorded.to_string().cyan());
    if result.errors > 0 {
        println!("  Skipped: {} unreadable files", result.errors.to_string().yellow());
    }
    if let Some(path) = debug_inode_map {
        println!("  Inode map: {}", path.display().to_string().dimmed());
    }
    println!("  Time: {}", format_duration(start.elapsed()).to_string().cyan());

    Ok(())
}

/// Reconcile every recorded pair and write the non-restored report
#[allow(clippy::too_many_arguments)]
fn cmd_restore(
    snapshot_file: PathBuf,
    non_restored_file: PathBuf,
    jobs: usize,
    chunk_size: usize,
    dry_run: bool,
    keep_stale_report: bool,
    show_progress: bool,
) -> Result<()> {
    if dry_run {
        println!("{}", "Dry run: no files will be changed".yellow().bold());
    }
    println!("{} {}",
        "Restoring hardlinks from".blue().bold(),
        snapshot_file.display().to_string().yellow()
    );

    let workers = if jobs == 0 { num_cpus::get() } else { jobs };
    let progress = spinner(show_progress, "Restoring links...");

    let mut builder = RelinkerBuilder::new()
        .non_restored_path(non_restored_file)
        .parallel_workers(workers)
        .hash_chunk_size(chunk_size)
        .dry_run(dry_run)
        .clear_stale_report(!keep_stale_report);
    if let Some(pb) = &progress {
        let pb = pb.clone();
        builder = builder.on_event(Arc::new(move |outcome: &PairOutcome| {
            pb.set_message(format!("{}", outcome.target.display()));
        }));
    }
    let relinker = builder.build()?;

    let result = relinker.restore(&snapshot_file)?;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    for outcome in &result.outcomes {
        match &outcome.action {
            LinkAction::NotRestored(reason) => {
                println!("  {} {} ({})",
                    "!".yellow().bold(),
                    outcome.target.display(),
                    reason.to_string().yellow()
                );
            }
            LinkAction::Failed(message) => {
                println!("  {} {}: {}",
                    "✗".red().bold(),
                    outcome.target.display(),
                    message.red()
                );
            }
            _ => {}
        }
    }

    let verb = if dry_run { "Would restore" } else { "Restored" };
    println!("{} {} {} of {} links",
        "✓".green().bold(),
        verb,
        (result.created + result.relinked).to_string().green().bold(),
        result.pairs_total
    );
    println!("  Created: {}", result.created.to_string().cyan());
    println!("  Relinked: {}", result.relinked.to_string().cyan());
    println!("  Already linked: {}", result.already_linked.to_string().cyan());
    if result.hashes_computed > 0 {
        println!("  Hashed: {} in {} digests",
            format_bytes(result.bytes_hashed).cyan(),
            result.hashes_computed
        );
    }
    if result.not_restored > 0 {
        println!("  Not restored: {}", result.not_restored.to_string().yellow());
    }
    if result.failed > 0 {
        println!("  Failed: {}", result.failed.to_string().red());
    }
    if let Some(path) = &result.report_path {
        println!("  Report: {}", path.display().to_string().yellow());
    }
    println!("  Time: {}",
        format_duration(Duration::from_millis(result.duration_ms)).to_string().cyan()
    );

    Ok(())
}

/// Print every file under `root` that has no other hardlink
fn cmd_unlinked(
    root: PathBuf,
    extensions: Vec<String>,
    exclude: Vec<String>,
    show_progress: bool,
) -> Result<()> {
    let progress = spinner(show_progress, "Scanning...");

    let mut builder = RelinkerBuilder::new().exclude_patterns(exclude);
    if let Some(pb) = &progress {
        builder = builder.on_progress(progress_reporter(pb.clone()));
    }
    let relinker = builder.build()?;

    let result = relinker.find_unlinked(&root, &extensions)?;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    for path in &result.files {
        println!("{}", path.display());
    }
    eprintln!("{} unlinked of {} files scanned in {}",
        result.files.len().to_string().yellow().bold(),
        result.files_scanned,
        format_duration(Duration::from_millis(result.duration_ms))
    );
    if result.errors > 0 {
        eprintln!("  Skipped: {} unreadable files", result.errors.to_string().yellow());
    }

    Ok(())
}

/// Spinner shown while a phase runs, if requested
fn spinner(enabled: bool, message: &'static str) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message);
    Some(pb)
}

fn progress_reporter(pb: ProgressBar) -> relinker::ProgressCallback {
    Arc::new(move |info: ProgressInfo| {
        pb.set_message(format!("{}: {} files", info.operation, info.processed));
    })
}
