pub mod catalog;
pub mod classify;
pub mod config;
pub mod error;
pub mod progress;
pub mod reconcile;
pub mod record;
pub mod scan;
pub mod stats;
pub mod storage;

pub use catalog::{Catalog, CatalogDb};
pub use config::AppConfig;
pub use error::Error;
pub use progress::{ProgressReporter, SilentReporter};
pub use reconcile::{BackupFinder, FindOutcome, FindReport, FindRequest, PackageSource};
pub use record::{Backup, PropertiesRecordBuilder, RecordBuilder};
pub use scan::{BackupSink, InvalidBackup, InvalidReason, RepairMode, ScanContext, ScanResult, Scanner};
pub use storage::{LocalStorage, Node, Storage};
