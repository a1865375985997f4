//! Integration tests for relinker
//!
//! Full snapshot/restore cycles over realistic library layouts.

use ::relinker::*;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A downloads tree hardlinked into two library trees
struct MediaLibrary {
    temp_dir: TempDir,
}

impl MediaLibrary {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let lib = Self { temp_dir };

        fs::create_dir_all(lib.downloads().join("complete/show.s01")).unwrap();
        fs::create_dir_all(lib.movies()).unwrap();
        fs::create_dir_all(lib.shows().join("Show/Season 1")).unwrap();

        fs::write(lib.downloads().join("complete/movie.mkv"), vec![7u8; 4096]).unwrap();
        fs::write(lib.downloads().join("complete/movie.nfo"), "<movie/>").unwrap();
        for ep in 1..=3 {
            let name = format!("show.s01e0{}.mkv", ep);
            fs::write(
                lib.downloads().join("complete/show.s01").join(&name),
                format!("episode {}", ep).repeat(100),
            )
            .unwrap();
            fs::hard_link(
                lib.downloads().join("complete/show.s01").join(&name),
                lib.shows().join("Show/Season 1").join(format!("S01E0{}.mkv", ep)),
            )
            .unwrap();
        }
        fs::hard_link(
            lib.downloads().join("complete/movie.mkv"),
            lib.movies().join("Movie (2020).mkv"),
        )
        .unwrap();
        // An unlinked download and an unlinked library file
        fs::write(lib.downloads().join("complete/sample.mkv"), "sample").unwrap();
        fs::write(lib.movies().join("poster.jpg"), "jpeg").unwrap();

        lib
    }

    fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    fn downloads(&self) -> PathBuf {
        self.root().join("downloads")
    }

    fn movies(&self) -> PathBuf {
        self.root().join("library/movies")
    }

    fn shows(&self) -> PathBuf {
        self.root().join("library/shows")
    }

    fn snapshot_file(&self) -> PathBuf {
        self.root().join("snapshot.json")
    }

    fn report_file(&self) -> PathBuf {
        self.root().join("non_restored.json")
    }

    fn builder(&self) -> RelinkerBuilder {
        RelinkerBuilder::new()
            .add_target_root(self.movies())
            .add_target_root(self.shows())
            .non_restored_path(self.report_file())
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    FileIdentity::of(a).unwrap() == FileIdentity::of(b).unwrap()
}

#[test]
fn test_snapshot_covers_multiple_target_roots() {
    let lib = MediaLibrary::new();
    let relinker = lib.builder().build().unwrap();

    let result = relinker.snapshot(&lib.downloads(), &lib.snapshot_file()).unwrap();
    assert_eq!(result.source_files_scanned, 6);
    assert_eq!(result.target_files_indexed, 5);
    assert_eq!(result.entries, 4);
    assert_eq!(result.links_recorded, 4);

    let snapshot = Snapshot::load(&lib.snapshot_file()).unwrap();
    assert_eq!(
        snapshot.get(&lib.downloads().join("complete/movie.mkv")).unwrap(),
        &[lib.movies().join("Movie (2020).mkv")]
    );
    assert!(snapshot.get(&lib.downloads().join("complete/sample.mkv")).is_none());
}

#[test]
fn test_restore_after_library_wiped() {
    let lib = MediaLibrary::new();
    let relinker = lib.builder().build().unwrap();
    relinker.snapshot(&lib.downloads(), &lib.snapshot_file()).unwrap();

    fs::remove_dir_all(lib.root().join("library")).unwrap();

    let result = relinker.restore(&lib.snapshot_file()).unwrap();
    assert_eq!(result.created, 4);
    assert_eq!(result.failed, 0);
    assert!(same_file(
        &lib.downloads().join("complete/show.s01/show.s01e02.mkv"),
        &lib.shows().join("Show/Season 1/S01E02.mkv"),
    ));
    // Unlinked library files are not part of the snapshot
    assert!(!lib.movies().join("poster.jpg").exists());
}

#[test]
fn test_restore_after_copy_broke_links() {
    let lib = MediaLibrary::new();
    let relinker = lib.builder().build().unwrap();
    relinker.snapshot(&lib.downloads(), &lib.snapshot_file()).unwrap();

    // Simulate a copy that preserved timestamps but not links
    for ep in 1..=3 {
        let src = lib.downloads().join(format!("complete/show.s01/show.s01e0{}.mkv", ep));
        let dst = lib.shows().join(format!("Show/Season 1/S01E0{}.mkv", ep));
        fs::remove_file(&dst).unwrap();
        fs::copy(&src, &dst).unwrap();
        let mtime = filetime::FileTime::from_last_modification_time(&fs::metadata(&src).unwrap());
        filetime::set_file_mtime(&dst, mtime).unwrap();
        assert!(!same_file(&src, &dst));
    }

    let result = relinker.restore(&lib.snapshot_file()).unwrap();
    assert_eq!(result.relinked, 3);
    assert_eq!(result.already_linked, 1);
    assert_eq!(result.hashes_computed, 6);
    for ep in 1..=3 {
        assert!(same_file(
            &lib.downloads().join(format!("complete/show.s01/show.s01e0{}.mkv", ep)),
            &lib.shows().join(format!("Show/Season 1/S01E0{}.mkv", ep)),
        ));
    }
}

#[test]
fn test_mixed_outcomes_in_one_run() {
    let lib = MediaLibrary::new();
    let relinker = lib.builder().build().unwrap();
    relinker.snapshot(&lib.downloads(), &lib.snapshot_file()).unwrap();

    let ep1 = lib.shows().join("Show/Season 1/S01E01.mkv");
    let ep2 = lib.shows().join("Show/Season 1/S01E02.mkv");
    fs::remove_file(lib.movies().join("Movie (2020).mkv")).unwrap();
    fs::remove_file(&ep1).unwrap();
    fs::write(&ep1, "edited by hand").unwrap();
    fs::remove_file(&ep2).unwrap();
    fs::write(&ep2, "episode 2".repeat(100).replace('2', "9")).unwrap();
    let mtime = filetime::FileTime::from_last_modification_time(
        &fs::metadata(lib.downloads().join("complete/show.s01/show.s01e02.mkv")).unwrap(),
    );
    filetime::set_file_mtime(&ep2, mtime).unwrap();

    let result = relinker.restore(&lib.snapshot_file()).unwrap();
    assert_eq!(result.pairs_total, 4);
    assert_eq!(result.created, 1);
    assert_eq!(result.already_linked, 1);
    assert_eq!(result.not_restored, 2);
    assert_eq!(result.report_path, Some(lib.report_file()));

    let entries: Vec<NonRestoredEntry> = utils::read_json(&lib.report_file()).unwrap();
    let reasons: Vec<_> = entries.iter().map(|e| (e.target_file.clone(), e.reason)).collect();
    assert_eq!(
        reasons,
        vec![
            (ep1.clone(), MismatchReason::MetadataMismatch),
            (ep2.clone(), MismatchReason::ContentMismatch),
        ]
    );
    assert_eq!(fs::read_to_string(&ep1).unwrap(), "edited by hand");
}

#[test]
fn test_restore_is_idempotent() {
    let lib = MediaLibrary::new();
    let relinker = lib.builder().build().unwrap();
    relinker.snapshot(&lib.downloads(), &lib.snapshot_file()).unwrap();
    fs::remove_dir_all(lib.shows()).unwrap();

    let first = relinker.restore(&lib.snapshot_file()).unwrap();
    assert_eq!(first.mutations(), 3);

    let second = relinker.restore(&lib.snapshot_file()).unwrap();
    assert_eq!(second.mutations(), 0);
    assert_eq!(second.already_linked, 4);
    assert_eq!(second.hashes_computed, 0);
}

#[test]
fn test_dry_run_leaves_tree_and_report_untouched() {
    let lib = MediaLibrary::new();
    relinker_snapshot(&lib);
    fs::remove_dir_all(lib.shows()).unwrap();
    fs::write(lib.report_file(), "[]").unwrap();

    let relinker = lib.builder().dry_run(true).build().unwrap();
    let result = relinker.restore(&lib.snapshot_file()).unwrap();

    assert!(result.dry_run);
    assert_eq!(result.created, 3);
    assert!(!lib.shows().exists());
    assert_eq!(fs::read_to_string(lib.report_file()).unwrap(), "[]");
}

#[test]
fn test_keep_stale_report() {
    let lib = MediaLibrary::new();
    relinker_snapshot(&lib);
    fs::write(lib.report_file(), "[]").unwrap();

    let relinker = lib.builder().clear_stale_report(false).build().unwrap();
    relinker.restore(&lib.snapshot_file()).unwrap();
    assert!(lib.report_file().exists());

    let relinker = lib.builder().build().unwrap();
    relinker.restore(&lib.snapshot_file()).unwrap();
    assert!(!lib.report_file().exists());
}

#[test]
fn test_parallel_restore_matches_sequential() {
    let lib = MediaLibrary::new();
    relinker_snapshot(&lib);
    fs::remove_dir_all(lib.root().join("library")).unwrap();

    let relinker = lib.builder().parallel_workers(4).build().unwrap();
    let result = relinker.restore(&lib.snapshot_file()).unwrap();
    assert_eq!(result.created, 4);

    let sequential = lib.builder().build().unwrap().restore(&lib.snapshot_file()).unwrap();
    assert_eq!(sequential.already_linked, 4);
    let order = |r: &RestoreResult| r.outcomes.iter().map(|o| o.target.clone()).collect::<Vec<_>>();
    assert_eq!(order(&result), order(&sequential));
}

#[test]
fn test_exclude_patterns_apply_to_both_walks() {
    let lib = MediaLibrary::new();
    let relinker = lib
        .builder()
        .exclude_patterns(vec!["*.nfo".to_string(), "**/Season 1/S01E03.mkv".to_string()])
        .build()
        .unwrap();

    let result = relinker.snapshot(&lib.downloads(), &lib.snapshot_file()).unwrap();
    assert_eq!(result.source_files_scanned, 5);
    assert_eq!(result.entries, 3);

    let snapshot = Snapshot::load(&lib.snapshot_file()).unwrap();
    assert!(snapshot
        .get(&lib.downloads().join("complete/show.s01/show.s01e03.mkv"))
        .is_none());
}

#[test]
fn test_events_and_progress_are_delivered() {
    let lib = MediaLibrary::new();
    let events = Arc::new(Mutex::new(Vec::new()));
    let progress = Arc::new(Mutex::new(Vec::new()));

    let events_sink = events.clone();
    let progress_sink = progress.clone();
    let relinker = lib
        .builder()
        .progress_interval(1)
        .on_event(Arc::new(move |outcome: &PairOutcome| {
            events_sink.lock().push(outcome.action.clone());
        }))
        .on_progress(Arc::new(move |info: ProgressInfo| {
            progress_sink.lock().push(info.operation);
        }))
        .build()
        .unwrap();

    relinker.snapshot(&lib.downloads(), &lib.snapshot_file()).unwrap();
    assert!(!progress.lock().is_empty());

    relinker.restore(&lib.snapshot_file()).unwrap();
    let events = events.lock();
    assert_eq!(events.len(), 4);
    assert!(events.iter().all(|a| *a == LinkAction::AlreadyLinked));
}

#[test]
fn test_debug_inode_map_written() {
    let lib = MediaLibrary::new();
    let dump = lib.root().join("inode_map.json");
    let relinker = lib.builder().debug_inode_map(Some(dump.clone())).build().unwrap();
    relinker.snapshot(&lib.downloads(), &lib.snapshot_file()).unwrap();

    let map: std::collections::BTreeMap<String, Vec<PathBuf>> = utils::read_json(&dump).unwrap();
    assert_eq!(map.len(), 5);
    let key = FileIdentity::of(&lib.movies().join("Movie (2020).mkv")).unwrap().to_string();
    assert_eq!(map[&key], vec![lib.movies().join("Movie (2020).mkv")]);
}

fn relinker_snapshot(lib: &MediaLibrary) {
    lib.builder()
        .build()
        .unwrap()
        .snapshot(&lib.downloads(), &lib.snapshot_file())
        .unwrap();
}

#[test]
fn test_find_unlinked_downloads() {
    let lib = MediaLibrary::new();
    let relinker = lib.builder().build().unwrap();
    let videos: Vec<String> = VIDEO_EXTENSIONS.iter().map(|ext| ext.to_string()).collect();

    let result = relinker.find_unlinked(&lib.downloads(), &videos).unwrap();
    assert_eq!(result.files_scanned, 6);
    assert_eq!(result.files, vec![lib.downloads().join("complete/sample.mkv")]);

    let everything = relinker.find_unlinked(&lib.downloads(), &[]).unwrap();
    assert_eq!(
        everything.files,
        vec![
            lib.downloads().join("complete/movie.nfo"),
            lib.downloads().join("complete/sample.mkv"),
        ]
    );

    // Losing the library copy leaves the download unlinked
    fs::remove_file(lib.movies().join("Movie (2020).mkv")).unwrap();
    let result = relinker.find_unlinked(&lib.downloads(), &videos).unwrap();
    assert_eq!(
        result.files,
        vec![
            lib.downloads().join("complete/movie.mkv"),
            lib.downloads().join("complete/sample.mkv"),
        ]
    );
}
