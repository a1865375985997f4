//! Property-based testing for relinker
//!
//! Uses proptest to check that any set of hardlinks recorded by a snapshot
//! is recovered exactly by restore, whatever happens to the targets in
//! between, and that nothing unsafe is ever overwritten.

use ::relinker::*;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// What happens to one target between snapshot and restore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Damage {
    Untouched,
    Deleted,
    CopiedBack,
    Rewritten,
    Resized,
}

fn damage_strategy() -> impl Strategy<Value = Damage> {
    prop_oneof![
        Just(Damage::Untouched),
        Just(Damage::Deleted),
        Just(Damage::CopiedBack),
        Just(Damage::Rewritten),
        Just(Damage::Resized),
    ]
}

/// Relative target paths, 0-2 directories deep
fn target_path_strategy() -> impl Strategy<Value = PathBuf> {
    (
        prop::collection::vec("[a-z]{1,6}", 0..=2),
        "[a-z]{1,8}\\.(mkv|txt)",
    )
        .prop_map(|(dirs, name)| {
            let mut path = PathBuf::new();
            for dir in dirs {
                path.push(dir);
            }
            path.join(name)
        })
}

/// Per source: content and its linked targets with their damage
fn library_strategy() -> impl Strategy<Value = Vec<(Vec<u8>, Vec<(PathBuf, Damage)>)>> {
    prop::collection::vec(
        (
            prop::collection::vec(any::<u8>(), 1..256),
            prop::collection::vec((target_path_strategy(), damage_strategy()), 1..4),
        ),
        1..6,
    )
}

fn forge_mtime(from: &Path, to: &Path) {
    let mtime = filetime::FileTime::from_last_modification_time(&fs::metadata(from).unwrap());
    filetime::set_file_mtime(to, mtime).unwrap();
}

fn flip_bytes(content: &[u8]) -> Vec<u8> {
    content.iter().map(|b| b ^ 0xff).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_restore_recovers_every_safe_link(library in library_strategy()) {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source");
        let target = temp_dir.path().join("target");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(&target).unwrap();

        // Each source links only under its own subtree
        let mut planned: BTreeMap<PathBuf, (PathBuf, Damage)> = BTreeMap::new();
        for (i, (content, targets)) in library.iter().enumerate() {
            let src = source.join(format!("src{}.bin", i));
            fs::write(&src, content).unwrap();
            for (rel, damage) in targets {
                // Duplicate paths from the strategy keep their first plan
                let dst = target.join(format!("s{}", i)).join(rel);
                if planned.contains_key(&dst) {
                    continue;
                }
                fs::create_dir_all(dst.parent().unwrap()).unwrap();
                fs::hard_link(&src, &dst).unwrap();
                planned.insert(dst, (src.clone(), *damage));
            }
        }

        let relinker = RelinkerBuilder::new()
            .add_target_root(target.clone())
            .non_restored_path(temp_dir.path().join("report.json"))
            .build()
            .unwrap();
        let snapshot_file = temp_dir.path().join("snapshot.json");
        let snap = relinker.snapshot(&source, &snapshot_file).unwrap();
        prop_assert_eq!(snap.links_recorded, planned.len());

        let mut expected_unsafe = 0;
        for (dst, (src, damage)) in &planned {
            match damage {
                Damage::Untouched => {}
                Damage::Deleted => fs::remove_file(dst).unwrap(),
                Damage::CopiedBack => {
                    fs::remove_file(dst).unwrap();
                    fs::copy(src, dst).unwrap();
                    forge_mtime(src, dst);
                }
                Damage::Rewritten => {
                    let content = fs::read(src).unwrap();
                    fs::remove_file(dst).unwrap();
                    fs::write(dst, flip_bytes(&content)).unwrap();
                    forge_mtime(src, dst);
                    expected_unsafe += 1;
                }
                Damage::Resized => {
                    let mut content = fs::read(src).unwrap();
                    content.push(0);
                    fs::remove_file(dst).unwrap();
                    fs::write(dst, content).unwrap();
                    expected_unsafe += 1;
                }
            }
        }

        let result = relinker.restore(&snapshot_file).unwrap();
        prop_assert_eq!(result.pairs_total, planned.len());
        prop_assert_eq!(result.not_restored, expected_unsafe);
        prop_assert_eq!(result.failed, 0);

        for (dst, (src, damage)) in &planned {
            let linked = FileIdentity::of(dst).unwrap() == FileIdentity::of(src).unwrap();
            match damage {
                Damage::Rewritten | Damage::Resized => {
                    prop_assert!(!linked, "unsafe target {:?} was replaced", dst);
                    prop_assert_ne!(fs::read(dst).unwrap(), fs::read(src).unwrap());
                }
                _ => prop_assert!(linked, "target {:?} was not restored", dst),
            }
        }

        // A second restore changes nothing
        let again = relinker.restore(&snapshot_file).unwrap();
        prop_assert_eq!(again.mutations(), 0);
        prop_assert_eq!(again.not_restored, expected_unsafe);
    }
}
