//! Backup discovery and repair pass.
//!
//! A pass walks the backup tree from a root directory, classifies every
//! entry by name and shape, reports valid and invalid backups to a
//! [`BackupSink`], and optionally repairs damaged entries according to the
//! [`RepairMode`].

pub mod cache;
mod pass;
pub mod queue;
mod repair;
pub mod scanner;

pub use cache::ListingCache;
pub use queue::WorkQueue;
pub use scanner::Scanner;

use crate::error::Error;
use crate::storage::Node;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// What a pass does with damaged or quarantined entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepairMode {
    /// Report only.
    #[default]
    None,
    /// Quarantine damaged entries by prefixing their name.
    Rename,
    /// Delete quarantined entries, nothing else.
    Delete,
    /// Strip the quarantine prefix again, nothing else.
    Undo,
    /// Quarantine-and-delete new damage, delete old quarantined entries.
    Cleanup,
}

impl RepairMode {
    /// Modes that only look for the quarantine marker and skip
    /// classification.
    pub fn only_handles_quarantined(self) -> bool {
        matches!(self, RepairMode::Undo | RepairMode::Delete)
    }

    /// Modes that act on newly detected damage instead of reporting it.
    pub fn repairs_damage(self) -> bool {
        matches!(self, RepairMode::Rename | RepairMode::Cleanup)
    }

    /// Word used when reporting the suspicious counter.
    pub fn outcome_label(self) -> &'static str {
        match self {
            RepairMode::None => "suspicious",
            RepairMode::Rename => "renamed",
            RepairMode::Delete => "deleted",
            RepairMode::Undo => "undone",
            RepairMode::Cleanup => "cleaned-up",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RepairMode::None => "none",
            RepairMode::Rename => "rename",
            RepairMode::Delete => "delete",
            RepairMode::Undo => "undo",
            RepairMode::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for RepairMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepairMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(RepairMode::None),
            "ren" | "rename" => Ok(RepairMode::Rename),
            "del" | "delete" => Ok(RepairMode::Delete),
            "undo" => Ok(RepairMode::Undo),
            "cleanup" => Ok(RepairMode::Cleanup),
            other => Err(Error::Other(format!("unknown repair mode '{}'", other))),
        }
    }
}

/// Per-pass settings, fixed when the pass starts.
#[derive(Debug, Clone, Default)]
pub struct ScanContext {
    /// Substring a path must contain to be considered, empty matches all.
    pub package_filter: String,
    /// Root that display paths are made relative to.
    pub backup_root: PathBuf,
    pub repair_mode: RepairMode,
    /// Raise classification tracing from `trace` to `info`.
    pub force_trace: bool,
}

impl ScanContext {
    pub fn new(backup_root: impl Into<PathBuf>) -> Self {
        Self {
            backup_root: backup_root.into(),
            ..Self::default()
        }
    }

    pub fn with_package_filter(mut self, filter: &str) -> Self {
        self.package_filter = filter.to_string();
        self
    }

    pub fn with_repair_mode(mut self, mode: RepairMode) -> Self {
        self.repair_mode = mode;
        self
    }

    pub fn with_force_trace(mut self, force_trace: bool) -> Self {
        self.force_trace = force_trace;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvalidReason {
    /// Backup directory without a properties file.
    NoProps,
    /// Directory described by a properties file, but empty.
    EmptyBackup,
}

impl InvalidReason {
    pub fn as_str(self) -> &'static str {
        match self {
            InvalidReason::NoProps => "no-props",
            InvalidReason::EmptyBackup => "empty-backup",
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directory that looks like a backup but cannot be used as one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidBackup {
    pub dir: Node,
    pub properties: Option<Node>,
    pub package_name: Option<String>,
    pub reason: InvalidReason,
}

/// Receives the findings of a pass. Called concurrently from the worker
/// pool.
pub trait BackupSink: Send + Sync {
    /// A properties file describing a backup. An error makes the pass treat
    /// the entry as damaged.
    fn on_valid(&self, properties: &Node) -> Result<(), Error>;

    fn on_invalid(&self, candidate: InvalidBackup);
}

/// [`BackupSink`] made of two closures.
pub struct Callbacks<V, I> {
    pub on_valid: V,
    pub on_invalid: I,
}

impl<V, I> BackupSink for Callbacks<V, I>
where
    V: Fn(&Node) -> Result<(), Error> + Send + Sync,
    I: Fn(InvalidBackup) + Send + Sync,
{
    fn on_valid(&self, properties: &Node) -> Result<(), Error> {
        (self.on_valid)(properties)
    }

    fn on_invalid(&self, candidate: InvalidBackup) {
        (self.on_invalid)(candidate)
    }
}

/// Totals of one pass.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub repair_mode: RepairMode,
    /// Entries taken from the queue.
    pub processed: usize,
    pub valid: usize,
    pub invalid: usize,
    /// Entries repaired, or found damaged when not repairing.
    pub suspicious: usize,
    /// Entries whose processing failed with an error.
    pub failed: usize,
    /// Directory listings that reached the storage.
    pub listings: usize,
    pub duration: Duration,
    /// Entries processed per worker thread name.
    pub threads_used: BTreeMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repair_mode_parsing_accepts_short_forms() {
        assert_eq!("ren".parse::<RepairMode>().unwrap(), RepairMode::Rename);
        assert_eq!("DEL".parse::<RepairMode>().unwrap(), RepairMode::Delete);
        assert_eq!("cleanup".parse::<RepairMode>().unwrap(), RepairMode::Cleanup);
        assert_eq!("".parse::<RepairMode>().unwrap(), RepairMode::None);
        assert!("shred".parse::<RepairMode>().is_err());
    }

    #[test]
    fn test_repair_mode_groups() {
        assert!(RepairMode::Undo.only_handles_quarantined());
        assert!(RepairMode::Delete.only_handles_quarantined());
        assert!(!RepairMode::Cleanup.only_handles_quarantined());
        assert!(RepairMode::Rename.repairs_damage());
        assert!(RepairMode::Cleanup.repairs_damage());
        assert!(!RepairMode::None.repairs_damage());
        assert_eq!(RepairMode::Undo.outcome_label(), "undone");
    }
}
