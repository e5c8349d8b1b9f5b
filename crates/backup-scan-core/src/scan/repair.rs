use super::pass::Pass;
use super::RepairMode;
use crate::error::Error;
use crate::storage::Node;
use std::sync::atomic::Ordering;
use tracing::{info, warn};

impl Pass<'_> {
    /// Damaged entry: counted always, quarantined when repairing, and
    /// removed right away by cleanup.
    pub(super) fn damaged(&self, node: &Node, reason: &str) {
        match self.ctx.repair_mode {
            RepairMode::Rename => {
                if self.quarantine(node).is_some() {
                    self.suspicious(node, reason);
                }
            }
            RepairMode::Cleanup => {
                if let Some(quarantined) = self.quarantine(node) {
                    match self.storage().delete_recursive(&quarantined) {
                        Ok(true) => self.cache.forget(&quarantined),
                        Ok(false) => {}
                        Err(err) => {
                            warn!(path = %self.display_path(&quarantined), error = %err, "cannot delete quarantined entry");
                        }
                    }
                    self.suspicious(node, reason);
                }
            }
            _ => self.suspicious(node, reason),
        }
    }

    /// Prefixes the entry with the quarantine marker. Returns the renamed
    /// entry on success.
    fn quarantine(&self, node: &Node) -> Option<Node> {
        let new_name = format!("{}{}", self.scanner.naming.quarantine_prefix, node.name());
        match self.storage().rename(node, &new_name) {
            Ok(true) => {
                let renamed = node.renamed(&new_name);
                self.cache.renamed(node, &renamed);
                Some(renamed)
            }
            Ok(false) => {
                warn!(path = %self.display_path(node), "cannot quarantine, entry gone or name taken");
                None
            }
            Err(err) => {
                warn!(path = %self.display_path(node), error = %err, "cannot quarantine");
                None
            }
        }
    }

    /// Acts on an entry carrying the quarantine marker: undo renames it
    /// back, delete and cleanup remove it. Returns the entry as it exists
    /// afterwards, `None` if it was removed.
    pub(super) fn handle_quarantined(&self, node: &Node) -> Result<Option<Node>, Error> {
        let prefix = self.scanner.naming.quarantine_prefix.as_str();
        let Some(original) = node.name().strip_prefix(prefix) else {
            return Ok(Some(node.clone()));
        };

        match self.ctx.repair_mode {
            RepairMode::Undo => {
                let restored = self
                    .storage()
                    .rename(node, original)
                    .map_err(|err| Error::storage(node.path(), err))?;
                if !restored {
                    return Ok(Some(node.clone()));
                }
                let renamed = node.renamed(original);
                self.cache.renamed(node, &renamed);
                self.suspicious(node, "undo");
                Ok(Some(renamed))
            }
            RepairMode::Delete | RepairMode::Cleanup => {
                let deleted = self
                    .storage()
                    .delete_recursive(node)
                    .map_err(|err| Error::storage(node.path(), err))?;
                if !deleted {
                    return Ok(Some(node.clone()));
                }
                self.cache.forget(node);
                self.suspicious(node, "delete");
                Ok(None)
            }
            RepairMode::None | RepairMode::Rename => Ok(Some(node.clone())),
        }
    }

    fn suspicious(&self, node: &Node, reason: &str) {
        self.suspicious.fetch_add(1, Ordering::Relaxed);
        let shown = self
            .display_path(node)
            .replace(self.scanner.naming.quarantine_prefix.as_str(), "");
        info!("? {} ({})", shown, reason);
    }
}
