use super::cache::ListingCache;
use super::queue::WorkQueue;
use super::scanner::Scanner;
use super::{BackupSink, InvalidBackup, InvalidReason, RepairMode, ScanContext};
use crate::error::Error;
use crate::stats::OpTimings;
use crate::storage::Node;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// State shared by all workers during one scan pass.
pub(super) struct Pass<'a> {
    pub(super) scanner: &'a Scanner,
    pub(super) ctx: &'a ScanContext,
    pub(super) sink: &'a dyn BackupSink,
    pub(super) cache: ListingCache,
    pub(super) queue: WorkQueue,
    pub(super) suspicious: AtomicUsize,
    pub(super) failed: AtomicUsize,
    pub(super) valid: AtomicUsize,
    pub(super) invalid: AtomicUsize,
    pub(super) threads: DashMap<String, usize>,
    pub(super) timings: OpTimings,
}

impl<'a> Pass<'a> {
    pub(super) fn new(scanner: &'a Scanner, ctx: &'a ScanContext, sink: &'a dyn BackupSink) -> Self {
        Self {
            scanner,
            ctx,
            sink,
            cache: ListingCache::new(),
            queue: WorkQueue::new(),
            suspicious: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            valid: AtomicUsize::new(0),
            invalid: AtomicUsize::new(0),
            threads: DashMap::new(),
            timings: OpTimings::new(),
        }
    }

    /// Classifies one dequeued entry and acts on it.
    pub(super) fn process(&self, node: &Node) -> Result<(), Error> {
        self.note_thread();
        if self.ctx.force_trace {
            self.trace(">", node, "entry");
        }

        let mode = self.ctx.repair_mode;
        if mode.only_handles_quarantined() {
            if let Some(current) = self.handle_quarantined(node)? {
                if current.is_dir() {
                    self.expand(&current)?;
                }
            }
            return Ok(());
        }

        // quarantined entries are not classified again, so a repeated rename
        // pass leaves them alone
        if self.is_quarantined(node) {
            if mode == RepairMode::Cleanup {
                self.handle_quarantined(node)?;
            }
            return Ok(());
        }
        self.classify(node)
    }

    fn is_quarantined(&self, node: &Node) -> bool {
        node.name()
            .starts_with(self.scanner.naming.quarantine_prefix.as_str())
    }

    fn classify(&self, node: &Node) -> Result<(), Error> {
        let names = &self.scanner.classifier;
        let name = node.name();

        if names.is_package_folder(name) || names.is_backup_instance(name) {
            if !self.matches_filter(node) {
                return Ok(());
            }
            if names.is_backup_instance(name) {
                return self.scan_instance(node);
            }
            if names.looks_like_properties(node) {
                // properties without instance name, most likely a renamed backup
                self.trace(">", node, "non-instance props");
                return self.handle_props(node, None);
            }
            if node.is_dir() {
                self.trace("/", node, "package folder");
                self.expand(node)?;
            }
            return Ok(());
        }

        if node.is_dir() && !names.is_special_folder(name) {
            self.trace("F", node, "folder");
            self.expand(node)?;
        }
        Ok(())
    }

    fn scan_instance(&self, node: &Node) -> Result<(), Error> {
        let names = &self.scanner.classifier;
        self.trace("i", node, "instance");

        if names.looks_like_properties(node) {
            self.trace(">", node, "props");
            return self.handle_props(node, None);
        }
        if !node.is_dir() || names.is_special_folder(node.name()) {
            return Ok(());
        }
        // directories with a sibling properties file were filtered out on
        // expansion, so an instance directory seen here stands alone
        if !names.is_package_folder(node.name()) {
            self.handle_invalid(node, None, None);
            return Ok(());
        }

        let indir = &self.scanner.naming.indir_properties_name;
        match self.cache.find_child(self.storage(), node, indir) {
            Ok(Some(props)) => {
                self.trace(">", &props, "props indir");
                self.handle_props(&props, Some(node))
            }
            Ok(None) => {
                self.handle_invalid(node, None, None);
                Ok(())
            }
            Err(err) => {
                debug!(path = %self.display_path(node), error = %err, "cannot look into instance directory");
                self.handle_invalid(node, None, None);
                Ok(())
            }
        }
    }

    /// Hands a properties file to the sink if it describes a backup
    /// directory. `instance_dir` is set when the file was found inside the
    /// directory it describes.
    fn handle_props(&self, props: &Node, instance_dir: Option<&Node>) -> Result<(), Error> {
        let naming = &self.scanner.naming;
        let describes_dir = if props.name() == naming.indir_properties_name {
            true
        } else {
            match props.name().strip_suffix(naming.properties_suffix().as_str()) {
                Some(stem) => self
                    .find_sibling(props, stem)?
                    .filter(Node::is_dir)
                    .is_some(),
                None => false,
            }
        };
        if !describes_dir {
            self.damaged(props, "no-dir");
            return Ok(());
        }

        match self.timings.time("on_props", || self.sink.on_valid(props)) {
            Ok(()) => {
                self.valid.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                debug!(path = %self.display_path(props), error = %err, "backup properties rejected");
                let names = &self.scanner.classifier;
                match instance_dir {
                    Some(dir) => {
                        if !names.is_special_folder(dir.name()) {
                            let package = (!self.ctx.package_filter.is_empty())
                                .then(|| self.ctx.package_filter.clone());
                            self.handle_invalid(dir, Some(props), package);
                        }
                    }
                    None => {
                        if !names.is_special_file(props.name()) {
                            self.damaged(props, "damaged");
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn find_sibling(&self, node: &Node, name: &str) -> Result<Option<Node>, Error> {
        match node.parent_path() {
            Some(parent) => {
                self.cache
                    .find_child(self.storage(), &Node::directory(parent), name)
            }
            None => Ok(None),
        }
    }

    pub(super) fn handle_invalid(&self, dir: &Node, props: Option<&Node>, package: Option<String>) {
        self.report_invalid(dir, props, package, InvalidReason::NoProps);
    }

    fn handle_empty(&self, dir: &Node) {
        self.report_invalid(dir, None, None, InvalidReason::EmptyBackup);
    }

    fn report_invalid(
        &self,
        dir: &Node,
        props: Option<&Node>,
        package_name: Option<String>,
        reason: InvalidReason,
    ) {
        if self.ctx.repair_mode.repairs_damage() {
            self.damaged(dir, reason.as_str());
            return;
        }
        self.invalid.fetch_add(1, Ordering::Relaxed);
        self.sink.on_invalid(InvalidBackup {
            dir: dir.clone(),
            properties: props.cloned(),
            package_name,
            reason,
        });
    }

    /// Queues the children of `dir`. Returns `false` for an empty directory.
    pub(super) fn expand(&self, dir: &Node) -> Result<bool, Error> {
        let listing = self.list(dir)?;
        if listing.is_empty() {
            return Ok(false);
        }

        let mut children: Vec<Node> = listing
            .iter()
            .filter(|child| !self.scanner.is_ignored(child))
            .cloned()
            .collect();

        // undo and delete look at every entry
        if !self.ctx.repair_mode.only_handles_quarantined() {
            let suffix = self.scanner.naming.properties_suffix();
            let described: HashSet<&str> = listing
                .iter()
                .filter_map(|child| child.name().strip_suffix(suffix.as_str()))
                .collect();

            if self.ctx.repair_mode.repairs_damage() || self.scanner.look_for_empty_backups {
                for backup_dir in children
                    .iter()
                    .filter(|child| child.is_dir() && described.contains(child.name()))
                    .filter(|child| self.matches_filter(child))
                {
                    match self.list(backup_dir) {
                        Ok(content) if content.is_empty() => self.handle_empty(backup_dir),
                        Ok(_) => {}
                        Err(err) => {
                            debug!(path = %self.display_path(backup_dir), error = %err, "cannot check backup directory");
                        }
                    }
                }
            }

            // described directories are reached through their properties file
            children.retain(|child| !(child.is_dir() && described.contains(child.name())));
        }

        self.queue.push_children(children);
        Ok(true)
    }

    fn list(&self, dir: &Node) -> Result<Arc<Vec<Node>>, Error> {
        let (listing, spent) = self.cache.list(self.storage(), dir)?;
        if !spent.is_zero() {
            self.timings.record("list_children", spent);
        }
        Ok(listing)
    }

    fn matches_filter(&self, node: &Node) -> bool {
        self.ctx.package_filter.is_empty() || node.path_str().contains(&self.ctx.package_filter)
    }

    pub(super) fn storage(&self) -> &dyn crate::storage::Storage {
        self.scanner.storage.as_ref()
    }

    /// Path below the backup root, as shown in logs.
    pub(super) fn display_path(&self, node: &Node) -> String {
        node.path()
            .strip_prefix(&self.ctx.backup_root)
            .unwrap_or_else(|_| node.path())
            .to_string_lossy()
            .trim_start_matches('/')
            .to_string()
    }

    fn trace(&self, mark: &str, node: &Node, text: &str) {
        let scope = if self.ctx.package_filter.is_empty() {
            "all"
        } else {
            "package"
        };
        if self.ctx.force_trace {
            info!(scope, "{} {} {}", mark, self.display_path(node), text);
        } else {
            trace!(scope, "{} {} {}", mark, self.display_path(node), text);
        }
    }

    fn note_thread(&self) {
        let current = std::thread::current();
        let name = current.name().unwrap_or("unnamed");
        *self.threads.entry(name.to_string()).or_insert(0) += 1;
    }
}
