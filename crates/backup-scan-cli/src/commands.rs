use backup_scan_core::RepairMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "backup-scan")]
#[command(about = "Finds, validates and repairs app backups", long_about = None)]
pub struct Cli {
    /// Configuration file, defaults to ./Config.toml when present
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan the backup tree and update the catalog
    Scan {
        /// Backup root, overrides the configured one
        #[arg(long)]
        root: Option<PathBuf>,
        /// Only scan paths containing this package name
        #[arg(long, default_value = "")]
        package: String,
        /// none, rename, delete, undo or cleanup
        #[arg(long, default_value = "none")]
        repair: RepairMode,
        /// Log every classification step
        #[arg(long)]
        trace: bool,
    },
    /// List catalogued backups
    List {
        /// Show the backups of one package instead of the per-package summary
        #[arg(long)]
        package: Option<String>,
    },
    /// Show recent scan sessions
    Sessions {
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    /// Print configuration values
    PrintConfig,
    /// Truncate all catalog tables
    TruncateCatalog,
}
