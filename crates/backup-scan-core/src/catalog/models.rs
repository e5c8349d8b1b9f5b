/// One run of the backup finder.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSession {
    pub id: i64,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub status: String,
    pub root_path: String,
    pub package_filter: String,
    pub repair_mode: String,
    pub processed: i64,
    pub valid: i64,
    pub invalid: i64,
    pub suspicious: i64,
}

/// Backup counts of one package. Known packages without backups show up
/// with zero counts.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageSummary {
    pub package_name: String,
    pub backups: i64,
    pub invalid: i64,
    pub total_size: i64,
    pub latest_backup: Option<String>,
}
