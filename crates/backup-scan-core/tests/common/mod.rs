#![allow(dead_code)]

use backup_scan_core::config::{NamingConfig, ScannerConfig};
use backup_scan_core::scan::{BackupSink, InvalidBackup, InvalidReason, ScanContext, ScanResult, Scanner};
use backup_scan_core::storage::{LocalStorage, Node, Storage};
use backup_scan_core::{Error, RepairMode, SilentReporter};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use walkdir::WalkDir;

pub const INSTANCE: &str = "2024-01-01-10-00-00-user_0";
pub const OTHER_INSTANCE: &str = "2024-02-01-10-00-00-user_0";

pub fn write_props(path: &Path, package: &str) {
    fs::write(
        path,
        format!(
            r#"{{"packageName":"{}","packageLabel":"Test","versionName":"1.0","versionCode":3,"size":2048}}"#,
            package
        ),
    )
    .unwrap();
}

/// `<pkg>/<instance>/` with data and `<pkg>/<instance>.properties`.
pub fn valid_backup(root: &Path, package: &str, instance: &str) -> PathBuf {
    let dir = root.join(package).join(instance);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("data.tar.zst"), "payload").unwrap();
    let props = root.join(package).join(format!("{}.properties", instance));
    write_props(&props, package);
    props
}

/// `<pkg>/<instance>/` with data but no properties anywhere.
pub fn orphan_backup(root: &Path, package: &str, instance: &str) -> PathBuf {
    let dir = root.join(package).join(instance);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("data.tar.zst"), "payload").unwrap();
    dir
}

/// `<pkg>@<instance>/` next to `<pkg>@<instance>.properties`, directly in
/// `root`. The directory holds data unless `empty`.
pub fn flat_backup(root: &Path, package: &str, instance: &str, empty: bool) -> PathBuf {
    let dir = root.join(format!("{}@{}", package, instance));
    fs::create_dir_all(&dir).unwrap();
    if !empty {
        fs::write(dir.join("data.tar.zst"), "payload").unwrap();
    }
    let props = root.join(format!("{}@{}.properties", package, instance));
    write_props(&props, package);
    props
}

/// Records everything a pass reports.
#[derive(Default)]
pub struct Recorder {
    pub valid: Mutex<Vec<PathBuf>>,
    pub invalid: Mutex<Vec<(PathBuf, InvalidReason)>>,
    pub reject_valid: bool,
}

impl Recorder {
    pub fn rejecting() -> Self {
        Self {
            reject_valid: true,
            ..Self::default()
        }
    }

    pub fn valid_set(&self) -> BTreeSet<PathBuf> {
        self.valid.lock().unwrap().iter().cloned().collect()
    }

    pub fn invalid_set(&self) -> BTreeSet<(PathBuf, &'static str)> {
        self.invalid
            .lock()
            .unwrap()
            .iter()
            .map(|(path, reason)| (path.clone(), reason.as_str()))
            .collect()
    }
}

impl BackupSink for Recorder {
    fn on_valid(&self, properties: &Node) -> Result<(), Error> {
        if self.reject_valid {
            return Err(Error::properties(properties.path(), "rejected"));
        }
        self.valid.lock().unwrap().push(properties.path().to_path_buf());
        Ok(())
    }

    fn on_invalid(&self, candidate: InvalidBackup) {
        self.invalid
            .lock()
            .unwrap()
            .push((candidate.dir.path().to_path_buf(), candidate.reason));
    }
}

/// Local storage that counts listings per directory.
#[derive(Default)]
pub struct CountingStorage {
    inner: LocalStorage,
    pub listings: Mutex<HashMap<PathBuf, usize>>,
}

impl Storage for CountingStorage {
    fn stat(&self, path: &Path) -> io::Result<Node> {
        self.inner.stat(path)
    }

    fn list_children(&self, node: &Node) -> io::Result<Vec<Node>> {
        *self
            .listings
            .lock()
            .unwrap()
            .entry(node.path().to_path_buf())
            .or_insert(0) += 1;
        self.inner.list_children(node)
    }

    fn rename(&self, node: &Node, new_name: &str) -> io::Result<bool> {
        self.inner.rename(node, new_name)
    }

    fn delete_recursive(&self, node: &Node) -> io::Result<bool> {
        self.inner.delete_recursive(node)
    }

    fn read_to_string(&self, node: &Node) -> io::Result<String> {
        self.inner.read_to_string(node)
    }
}

pub fn scanner_config() -> ScannerConfig {
    ScannerConfig {
        worker_threads: 4,
        ..ScannerConfig::default()
    }
}

pub fn scanner_with(storage: Arc<dyn Storage>) -> Scanner {
    Scanner::new(storage, &NamingConfig::default(), &scanner_config()).unwrap()
}

pub fn run_with(root: &Path, ctx: ScanContext, sink: &dyn BackupSink) -> ScanResult {
    let scanner = scanner_with(Arc::new(LocalStorage::default()));
    let root_node = scanner.root_node(root).unwrap();
    scanner.scan(&root_node, &ctx, sink, &SilentReporter).unwrap()
}

pub fn run(root: &Path, mode: RepairMode) -> (Recorder, ScanResult) {
    let recorder = Recorder::default();
    let result = run_with(
        root,
        ScanContext::new(root).with_repair_mode(mode),
        &recorder,
    );
    (recorder, result)
}

/// Names directly inside `dir`.
pub fn entries(dir: &Path) -> BTreeSet<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

/// Every path below `root`, relative to it.
pub fn snapshot(root: &Path) -> BTreeSet<PathBuf> {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|entry| {
            entry
                .unwrap()
                .path()
                .strip_prefix(root)
                .unwrap()
                .to_path_buf()
        })
        .collect()
}
