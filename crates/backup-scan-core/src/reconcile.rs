//! Finding backups: one scan pass whose results replace the catalog.

use crate::catalog::{Catalog, ScanSession};
use crate::error::Error;
use crate::progress::ProgressReporter;
use crate::record::{Backup, RecordBuilder};
use crate::scan::{BackupSink, InvalidBackup, RepairMode, ScanContext, ScanResult, Scanner};
use crate::storage::Node;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Names of the packages installed on the device.
pub trait PackageSource: Send + Sync {
    fn installed_packages(&self) -> Vec<String>;
}

impl PackageSource for Vec<String> {
    fn installed_packages(&self) -> Vec<String> {
        self.clone()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FindRequest {
    /// Empty for all packages.
    pub package_filter: String,
    pub repair_mode: RepairMode,
    pub force_trace: bool,
}

impl FindRequest {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn package(name: &str) -> Self {
        Self {
            package_filter: name.to_string(),
            ..Self::default()
        }
    }

    pub fn is_full_scan(&self) -> bool {
        self.package_filter.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindOutcome {
    Completed,
    /// Nothing was written to the catalog.
    Failed(String),
}

impl FindOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindOutcome::Completed => "completed",
            FindOutcome::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FindReport {
    pub outcome: FindOutcome,
    /// Backups per package, pre-seeded with every installed package on a
    /// full scan.
    pub backups: BTreeMap<String, Vec<Backup>>,
    pub scan: Option<ScanResult>,
    /// Records written to the catalog.
    pub written: usize,
    pub session_id: Option<i64>,
}

impl FindReport {
    pub fn backup_count(&self) -> usize {
        self.backups.values().map(Vec::len).sum()
    }
}

/// Sink turning findings into records, grouped by package.
struct RecordCollector<'a> {
    builder: &'a dyn RecordBuilder,
    create_invalid_backups: bool,
    found: DashMap<String, Vec<Backup>, ahash::RandomState>,
    skipped_invalid: AtomicUsize,
}

impl<'a> RecordCollector<'a> {
    fn new(builder: &'a dyn RecordBuilder, create_invalid_backups: bool) -> Self {
        Self {
            builder,
            create_invalid_backups,
            found: DashMap::with_hasher(ahash::RandomState::new()),
            skipped_invalid: AtomicUsize::new(0),
        }
    }

    fn seed(&self, package_name: &str) {
        self.found.entry(package_name.to_string()).or_default();
    }

    fn add(&self, backup: Backup) {
        self.found
            .entry(backup.package_name.clone())
            .or_default()
            .push(backup);
    }

    fn into_sorted(self) -> BTreeMap<String, Vec<Backup>> {
        self.found
            .into_iter()
            .map(|(package, mut backups)| {
                backups.sort_by(|a, b| a.dir_path.cmp(&b.dir_path));
                (package, backups)
            })
            .collect()
    }
}

impl BackupSink for RecordCollector<'_> {
    fn on_valid(&self, properties: &Node) -> Result<(), Error> {
        let backup = self.builder.create_from_properties(properties)?;
        self.add(backup);
        Ok(())
    }

    fn on_invalid(&self, candidate: InvalidBackup) {
        if !self.create_invalid_backups {
            self.skipped_invalid.fetch_add(1, Ordering::Relaxed);
            return;
        }
        match self.builder.create_invalid(&candidate) {
            Some(backup) => self.add(backup),
            None => {
                debug!(
                    "no package for invalid backup {} ({})",
                    candidate.dir.path().display(),
                    candidate.reason
                );
            }
        }
    }
}

/// Runs scan passes and reconciles the catalog with what they find.
pub struct BackupFinder {
    scanner: Scanner,
    builder: Box<dyn RecordBuilder>,
    packages: Box<dyn PackageSource>,
    backup_root: PathBuf,
    create_invalid_backups: bool,
    early_empty_backups: bool,
}

impl BackupFinder {
    pub fn new(
        scanner: Scanner,
        builder: Box<dyn RecordBuilder>,
        packages: Box<dyn PackageSource>,
        backup_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            scanner,
            builder,
            packages,
            backup_root: backup_root.into(),
            create_invalid_backups: true,
            early_empty_backups: false,
        }
    }

    pub fn with_invalid_backups(mut self, create: bool) -> Self {
        self.create_invalid_backups = create;
        self
    }

    pub fn with_early_empty_backups(mut self, early: bool) -> Self {
        self.early_empty_backups = early;
        self
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    /// Scans for backups and updates `catalog`.
    ///
    /// Failures are logged and reported in [`FindReport::outcome`]. A failed
    /// pass leaves the catalog as it was, apart from the eager deletion
    /// enabled by `early_empty_backups`.
    pub fn find(
        &self,
        catalog: &dyn Catalog,
        request: &FindRequest,
        reporter: &dyn ProgressReporter,
    ) -> FindReport {
        let started_at = chrono::Utc::now().to_rfc3339();
        let start = Instant::now();
        let collector = RecordCollector::new(self.builder.as_ref(), self.create_invalid_backups);

        let installed = if request.is_full_scan() {
            self.packages.installed_packages()
        } else {
            Vec::new()
        };
        if request.is_full_scan() {
            // packages without backups must still be listed
            for package in &installed {
                collector.seed(package);
            }
            if self.early_empty_backups {
                if let Err(err) = catalog.delete_backups_of(&installed) {
                    warn!("Early removal of catalog backups failed: {}", err);
                }
            }
        } else {
            collector.seed(&request.package_filter);
        }

        let ctx = ScanContext::new(&self.backup_root)
            .with_package_filter(&request.package_filter)
            .with_repair_mode(request.repair_mode)
            .with_force_trace(request.force_trace);

        let scanned = self.scanner.scan_root(&ctx, &collector, reporter);
        let skipped = collector.skipped_invalid.load(Ordering::Relaxed);
        let backups = collector.into_sorted();

        let (outcome, scan, written) = match scanned {
            Ok(result) => match self.write_catalog(catalog, request, &installed, &backups, reporter) {
                Ok(written) => (FindOutcome::Completed, Some(result), written),
                Err(err) => {
                    error!("Writing the backup catalog failed: {}", err);
                    (FindOutcome::Failed(err.to_string()), Some(result), 0)
                }
            },
            Err(err) => {
                error!(
                    "Scan of {} failed: {}",
                    self.backup_root.display(),
                    err
                );
                (FindOutcome::Failed(err.to_string()), None, 0)
            }
        };

        let session = ScanSession {
            id: 0,
            started_at,
            completed_at: Some(chrono::Utc::now().to_rfc3339()),
            status: outcome.as_str().to_string(),
            root_path: self.backup_root.to_string_lossy().into_owned(),
            package_filter: request.package_filter.clone(),
            repair_mode: request.repair_mode.to_string(),
            processed: scan.as_ref().map_or(0, |s| s.processed as i64),
            valid: scan.as_ref().map_or(0, |s| s.valid as i64),
            invalid: scan.as_ref().map_or(0, |s| s.invalid as i64),
            suspicious: scan.as_ref().map_or(0, |s| s.suspicious as i64),
        };
        let session_id = match catalog.record_scan(&session) {
            Ok(id) => Some(id),
            Err(err) => {
                warn!("Recording the scan session failed: {}", err);
                None
            }
        };

        let report = FindReport {
            outcome,
            backups,
            scan,
            written,
            session_id,
        };
        self.log_summary(request, &report, skipped, start);
        report
    }

    fn write_catalog(
        &self,
        catalog: &dyn Catalog,
        request: &FindRequest,
        installed: &[String],
        backups: &BTreeMap<String, Vec<Backup>>,
        reporter: &dyn ProgressReporter,
    ) -> Result<usize, Error> {
        let start = Instant::now();
        reporter.on_catalog_write_start();

        let written = if request.is_full_scan() {
            let all: Vec<Backup> = backups.values().flatten().cloned().collect();
            let written = catalog.replace_all_backups(&all)?;
            let mut known: Vec<String> = backups.keys().cloned().collect();
            known.extend(installed.iter().cloned());
            known.sort();
            known.dedup();
            catalog.register_packages(&known)?;
            written
        } else {
            let mut written = 0;
            for (package, records) in backups {
                // rows of packages outside the filter are left as they are
                if !package.contains(request.package_filter.as_str()) {
                    debug!(package = %package, "not part of the requested package, skipped");
                    continue;
                }
                written += catalog.put_backups(package, records)?;
            }
            written
        };

        reporter.on_catalog_write_complete(written, start.elapsed().as_secs_f64());
        Ok(written)
    }

    fn log_summary(&self, request: &FindRequest, report: &FindReport, skipped: usize, start: Instant) {
        let scope = if request.is_full_scan() {
            "all packages".to_string()
        } else {
            format!("'{}'", request.package_filter)
        };
        info!(
            "find backups for {} {} in {:.2}s: {} packages, {} backups",
            scope,
            report.outcome.as_str(),
            start.elapsed().as_secs_f64(),
            report.backups.len(),
            report.backup_count(),
        );
        if skipped > 0 {
            info!("{} invalid backups not recorded", skipped);
        }
        if let Some(scan) = &report.scan {
            let threads: Vec<String> = scan
                .threads_used
                .iter()
                .map(|(name, count)| format!("{}={}", name, count))
                .collect();
            info!("threads used: {} [{}]", scan.threads_used.len(), threads.join(", "));
        }
    }
}
