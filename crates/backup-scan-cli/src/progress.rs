use backup_scan_core::ProgressReporter;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// CLI progress reporter using an indicatif spinner.
///
/// The number of entries in a backup tree is unknown up front, so both the
/// scan and the catalog write show a spinner with a running count.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_spinner(&self, message: String) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(80));

        let mut guard = self.lock();
        if let Some(old) = guard.take() {
            old.finish_and_clear();
        }
        *guard = Some(pb);
    }

    fn finish_bar(&self) {
        if let Some(pb) = self.lock().take() {
            pb.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_scan_start(&self, root: &str) {
        self.start_spinner(format!("Scanning {} ...", root));
    }

    fn on_scan_progress(&self, processed: usize, queued: usize) {
        if let Some(pb) = self.lock().as_ref() {
            pb.set_message(format!(
                "Scanning... {} entries processed, {} queued",
                processed, queued
            ));
        }
    }

    fn on_scan_complete(&self, processed: usize, suspicious: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  {} Scan complete: {} entries, {} suspicious in {:.2}s",
            style("✓").green(),
            processed,
            suspicious,
            duration_secs
        );
    }

    fn on_catalog_write_start(&self) {
        self.start_spinner("Writing to catalog...".to_string());
    }

    fn on_catalog_write_complete(&self, rows: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  {} Catalog write complete: {} backups in {:.2}s",
            style("✓").green(),
            rows,
            duration_secs
        );
    }
}
