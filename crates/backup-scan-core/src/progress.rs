/// Trait for reporting scan progress.
///
/// The CLI implements it with an indicatif spinner; library callers that do
/// not care pass [`SilentReporter`]. All methods have default no-op
/// implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self, _root: &str) {}
    fn on_scan_progress(&self, _processed: usize, _queued: usize) {}
    fn on_scan_complete(&self, _processed: usize, _suspicious: usize, _duration_secs: f64) {}
    fn on_catalog_write_start(&self) {}
    fn on_catalog_write_complete(&self, _rows: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
