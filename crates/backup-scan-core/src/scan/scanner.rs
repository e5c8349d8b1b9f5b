use super::pass::Pass;
use super::{BackupSink, ScanContext, ScanResult};
use crate::classify::NameClassifier;
use crate::config::{NamingConfig, ScannerConfig};
use crate::error::Error;
use crate::progress::ProgressReporter;
use crate::storage::{Node, Storage};
use glob::Pattern;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Walks a backup tree with a fixed-size worker pool.
///
/// The queue is drained in batches of `batch_size`; every batch runs on the
/// pool and completes before the next one is drawn.
pub struct Scanner {
    pub(super) storage: Arc<dyn Storage>,
    pub(super) classifier: NameClassifier,
    pub(super) naming: NamingConfig,
    pub(super) look_for_empty_backups: bool,
    ignore_patterns: Vec<Pattern>,
    batch_size: usize,
    pool: ThreadPool,
}

impl Scanner {
    pub fn new(
        storage: Arc<dyn Storage>,
        naming: &NamingConfig,
        config: &ScannerConfig,
    ) -> Result<Self, Error> {
        let ignore_patterns: Vec<Pattern> = config
            .ignore_patterns
            .iter()
            .filter_map(|glob| match Pattern::new(glob) {
                Ok(p) => Some(p),
                Err(e) => {
                    error!("Invalid glob pattern '{}': {}", glob, e);
                    None
                }
            })
            .collect();

        let pool = ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|i| format!("scan-worker-{}", i))
            .build()?;

        Ok(Self {
            storage,
            classifier: NameClassifier::new(naming)?,
            naming: naming.clone(),
            look_for_empty_backups: config.look_for_empty_backups,
            ignore_patterns,
            batch_size: config.batch_size.max(1),
            pool,
        })
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn worker_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Resolves `path` to a directory node to start a pass from.
    pub fn root_node(&self, path: &Path) -> Result<Node, Error> {
        let node = self
            .storage
            .stat(path)
            .map_err(|err| Error::storage(path, err))?;
        if !node.is_dir() {
            return Err(Error::Other(format!(
                "backup root {} is not a directory",
                path.display()
            )));
        }
        Ok(node)
    }

    pub(super) fn is_ignored(&self, node: &Node) -> bool {
        self.ignore_patterns
            .iter()
            .any(|pattern| pattern.matches_path(node.path()))
    }

    /// Runs one pass below `root`.
    ///
    /// Only a failure to list `root` itself is returned as an error; failures
    /// on single entries are logged and counted in [`ScanResult::failed`].
    pub fn scan(
        &self,
        root: &Node,
        ctx: &ScanContext,
        sink: &dyn BackupSink,
        reporter: &dyn ProgressReporter,
    ) -> Result<ScanResult, Error> {
        let start = Instant::now();
        reporter.on_scan_start(&root.path_str());

        let pass = Pass::new(self, ctx, sink);
        pass.expand(root)?;

        let mut processed = 0usize;
        loop {
            let batch = pass.queue.next_batch(self.batch_size);
            if batch.is_empty() {
                break;
            }
            processed += batch.len();
            if ctx.package_filter.is_empty() {
                debug!("batch of {} ({} queued)", batch.len(), pass.queue.len());
            }

            self.pool.install(|| {
                batch.par_iter().for_each(|node| {
                    if let Err(err) = pass.process(node) {
                        pass.failed.fetch_add(1, Ordering::Relaxed);
                        warn!(path = %pass.display_path(node), error = %err, "entry skipped");
                    }
                })
            });
            reporter.on_scan_progress(processed, pass.queue.len());
        }

        let result = ScanResult {
            repair_mode: ctx.repair_mode,
            processed,
            valid: pass.valid.load(Ordering::Relaxed),
            invalid: pass.invalid.load(Ordering::Relaxed),
            suspicious: pass.suspicious.load(Ordering::Relaxed),
            failed: pass.failed.load(Ordering::Relaxed),
            listings: pass.cache.misses(),
            duration: start.elapsed(),
            threads_used: pass
                .threads
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect(),
        };

        for (op, calls, total) in pass.timings.summary() {
            debug!(
                "scan.{}: {} calls, {:.3} ms total",
                op,
                calls,
                total.as_secs_f64() * 1000.0
            );
        }
        info!(
            "queue total ----> {} ({} valid, {} invalid, {} failed, {} listings, {} cache hits)",
            result.processed,
            result.valid,
            result.invalid,
            result.failed,
            result.listings,
            pass.cache.hits(),
        );
        if result.suspicious > 0 {
            info!("{}: {}", ctx.repair_mode.outcome_label(), result.suspicious);
        }
        reporter.on_scan_complete(
            result.processed,
            result.suspicious,
            result.duration.as_secs_f64(),
        );

        Ok(result)
    }

    /// Convenience wrapper resolving the root from `ctx.backup_root`.
    pub fn scan_root(
        &self,
        ctx: &ScanContext,
        sink: &dyn BackupSink,
        reporter: &dyn ProgressReporter,
    ) -> Result<ScanResult, Error> {
        let root = self.root_node(&ctx.backup_root)?;
        self.scan(&root, ctx, sink, reporter)
    }
}
