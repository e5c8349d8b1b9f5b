mod common;

use backup_scan_core::scan::ScanContext;
use backup_scan_core::RepairMode;
use common::*;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const PACKAGE: &str = "com.example.app";
const LOOSE_PROPS: &str = "2024-03-01-10-00-00-user_0.properties";

/// A valid backup, an orphan directory, properties without a directory and
/// an entry quarantined by an earlier pass.
fn damaged_tree(root: &Path) {
    valid_backup(root, PACKAGE, INSTANCE);
    orphan_backup(root, PACKAGE, OTHER_INSTANCE);
    write_props(&root.join(PACKAGE).join(LOOSE_PROPS), PACKAGE);
    orphan_backup(root, PACKAGE, "!-ERROR.2023-12-01-10-00-00-user_0");
}

fn strip_quarantine(names: &BTreeSet<String>) -> BTreeSet<String> {
    names
        .iter()
        .map(|name| name.trim_start_matches("!-ERROR.").to_string())
        .collect()
}

#[test]
fn test_quarantine_round_trip() {
    let tmp = tempdir().unwrap();
    let pkg = tmp.path().join(PACKAGE);
    let dir = orphan_backup(tmp.path(), PACKAGE, INSTANCE);
    let before = snapshot(tmp.path());

    let (_, renamed) = run(tmp.path(), RepairMode::Rename);
    assert_eq!(renamed.suspicious, 1);
    assert!(!dir.exists());
    assert_eq!(entries(&pkg), BTreeSet::from([format!("!-ERROR.{}", INSTANCE)]));

    let (_, undone) = run(tmp.path(), RepairMode::Undo);
    assert_eq!(undone.suspicious, 1);
    assert_eq!(snapshot(tmp.path()), before);

    // back to a normal, still damaged entry
    let (recorder, _) = run(tmp.path(), RepairMode::None);
    assert_eq!(
        recorder.invalid_set(),
        BTreeSet::from([(dir, "no-props")])
    );
}

#[test]
fn test_second_rename_pass_leaves_quarantined_entries_alone() {
    let tmp = tempdir().unwrap();
    let pkg = tmp.path().join(PACKAGE);
    damaged_tree(tmp.path());

    let (_, first) = run(tmp.path(), RepairMode::Rename);
    let after_first = snapshot(tmp.path());
    let (_, second) = run(tmp.path(), RepairMode::Rename);

    assert_eq!(first.suspicious, 2);
    assert_eq!(second.suspicious, 0);
    assert_eq!(snapshot(tmp.path()), after_first);
    assert!(entries(&pkg).contains(&format!("!-ERROR.{}", LOOSE_PROPS)));
}

#[test]
fn test_cleanup_deletes_what_rename_marks_plus_quarantined() {
    let renamed_tmp = tempdir().unwrap();
    let cleaned_tmp = tempdir().unwrap();
    damaged_tree(renamed_tmp.path());
    damaged_tree(cleaned_tmp.path());
    let original = entries(&cleaned_tmp.path().join(PACKAGE));

    run(renamed_tmp.path(), RepairMode::Rename);
    let marked: BTreeSet<String> = entries(&renamed_tmp.path().join(PACKAGE))
        .into_iter()
        .filter(|name| name.starts_with("!-ERROR."))
        .collect();

    let (recorder, cleaned) = run(cleaned_tmp.path(), RepairMode::Cleanup);
    let remaining = entries(&cleaned_tmp.path().join(PACKAGE));
    let deleted: BTreeSet<String> = original.difference(&remaining).cloned().collect();

    assert_eq!(strip_quarantine(&deleted), strip_quarantine(&marked));
    assert_eq!(deleted.len(), 3);
    assert_eq!(cleaned.suspicious, 3);
    assert_eq!(
        remaining,
        BTreeSet::from([INSTANCE.to_string(), format!("{}.properties", INSTANCE)])
    );
    assert_eq!(recorder.valid.lock().unwrap().len(), 1);
    assert!(recorder.invalid.lock().unwrap().is_empty());
}

#[test]
fn test_delete_only_removes_quarantined_entries() {
    let tmp = tempdir().unwrap();
    let pkg = tmp.path().join(PACKAGE);
    damaged_tree(tmp.path());
    let mut expected = entries(&pkg);
    expected.remove("!-ERROR.2023-12-01-10-00-00-user_0");

    let (recorder, result) = run(tmp.path(), RepairMode::Delete);

    assert_eq!(result.suspicious, 1);
    assert_eq!(entries(&pkg), expected);
    assert!(recorder.valid.lock().unwrap().is_empty());
    assert!(recorder.invalid.lock().unwrap().is_empty());
}

#[test]
fn test_undo_restores_nested_quarantined_entries() {
    let tmp = tempdir().unwrap();
    let outer = tmp.path().join("!-ERROR.archive");
    fs::create_dir_all(&outer).unwrap();
    orphan_backup(&outer, PACKAGE, &format!("!-ERROR.{}", INSTANCE));

    let (_, result) = run(tmp.path(), RepairMode::Undo);

    assert_eq!(result.suspicious, 2);
    assert!(tmp
        .path()
        .join("archive")
        .join(PACKAGE)
        .join(INSTANCE)
        .join("data.tar.zst")
        .is_file());
}

#[test]
fn test_undo_does_not_overwrite_existing_entries() {
    let tmp = tempdir().unwrap();
    let pkg = tmp.path().join(PACKAGE);
    orphan_backup(tmp.path(), PACKAGE, INSTANCE);
    orphan_backup(tmp.path(), PACKAGE, &format!("!-ERROR.{}", INSTANCE));

    let (_, result) = run(tmp.path(), RepairMode::Undo);

    assert_eq!(result.suspicious, 0);
    assert_eq!(
        entries(&pkg),
        BTreeSet::from([INSTANCE.to_string(), format!("!-ERROR.{}", INSTANCE)])
    );
}

#[test]
fn test_loose_properties_are_counted_but_kept_without_repair() {
    let tmp = tempdir().unwrap();
    let pkg = tmp.path().join(PACKAGE);
    fs::create_dir_all(&pkg).unwrap();
    write_props(&pkg.join(LOOSE_PROPS), PACKAGE);

    let (recorder, result) = run(tmp.path(), RepairMode::None);

    assert_eq!(result.suspicious, 1);
    assert!(recorder.valid.lock().unwrap().is_empty());
    assert_eq!(entries(&pkg), BTreeSet::from([LOOSE_PROPS.to_string()]));
}

#[test]
fn test_rejected_properties_are_treated_as_damaged() {
    let tmp = tempdir().unwrap();
    let pkg = tmp.path().join(PACKAGE);
    valid_backup(tmp.path(), PACKAGE, INSTANCE);

    let recorder = Recorder::rejecting();
    let result = run_with(
        tmp.path(),
        ScanContext::new(tmp.path()).with_repair_mode(RepairMode::None),
        &recorder,
    );
    assert_eq!(result.suspicious, 1);
    assert_eq!(result.valid, 0);
    assert!(pkg.join(format!("{}.properties", INSTANCE)).is_file());

    let recorder = Recorder::rejecting();
    let result = run_with(
        tmp.path(),
        ScanContext::new(tmp.path()).with_repair_mode(RepairMode::Rename),
        &recorder,
    );
    assert_eq!(result.suspicious, 1);
    assert!(pkg.join(format!("!-ERROR.{}.properties", INSTANCE)).is_file());
    assert!(pkg.join(INSTANCE).is_dir());
}

#[test]
fn test_rejected_indir_properties_report_the_directory() {
    let tmp = tempdir().unwrap();
    let dir = tmp.path().join(format!("{}@{}", PACKAGE, INSTANCE));
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("backup.properties"), "{broken").unwrap();

    let recorder = Recorder::rejecting();
    run_with(tmp.path(), ScanContext::new(tmp.path()), &recorder);

    assert_eq!(recorder.invalid_set(), BTreeSet::from([(dir, "no-props")]));
}
