//! Persistent record of the backups found by the last scans.

pub mod models;
pub mod queries;
pub mod sqlite;

pub use models::{PackageSummary, ScanSession};
pub use sqlite::CatalogDb;

use crate::error::Error;
use crate::record::Backup;

/// Where the backup finder writes its results.
pub trait Catalog {
    /// Drops all stored backups and stores `backups` instead.
    fn replace_all_backups(&self, backups: &[Backup]) -> Result<usize, Error>;

    fn delete_backups_of(&self, package_names: &[String]) -> Result<usize, Error>;

    /// Replaces the stored backups of one package.
    fn put_backups(&self, package_name: &str, backups: &[Backup]) -> Result<usize, Error>;

    /// Marks packages as known, with or without backups.
    fn register_packages(&self, package_names: &[String]) -> Result<usize, Error>;

    fn backups_of(&self, package_name: &str) -> Result<Vec<Backup>, Error>;

    fn record_scan(&self, session: &ScanSession) -> Result<i64, Error>;
}

impl Catalog for CatalogDb {
    fn replace_all_backups(&self, backups: &[Backup]) -> Result<usize, Error> {
        Ok(self.replace_all(backups)?)
    }

    fn delete_backups_of(&self, package_names: &[String]) -> Result<usize, Error> {
        Ok(self.delete_packages(package_names)?)
    }

    fn put_backups(&self, package_name: &str, backups: &[Backup]) -> Result<usize, Error> {
        Ok(self.replace_package(package_name, backups)?)
    }

    fn register_packages(&self, package_names: &[String]) -> Result<usize, Error> {
        Ok(CatalogDb::register_packages(self, package_names)?)
    }

    fn backups_of(&self, package_name: &str) -> Result<Vec<Backup>, Error> {
        Ok(self.get_backups_of(package_name)?)
    }

    fn record_scan(&self, session: &ScanSession) -> Result<i64, Error> {
        Ok(self.insert_scan_session(session)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn backup(package: &str, instance: &str, size: i64) -> Backup {
        Backup {
            package_name: package.to_string(),
            package_label: None,
            version_name: Some("1.0".to_string()),
            version_code: 1,
            profile_id: 0,
            backup_date: NaiveDate::from_ymd_opt(2024, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0)),
            size,
            persistent: false,
            note: None,
            dir_path: PathBuf::from(format!("/b/{}/{}", package, instance)),
            properties_path: Some(PathBuf::from(format!("/b/{}/{}.properties", package, instance))),
            invalid_reason: None,
        }
    }

    #[test]
    fn test_replace_all_round_trips_records() {
        let db = CatalogDb::open_in_memory().unwrap();
        let records = vec![backup("com.a", "one", 10), backup("com.b", "two", 20)];
        assert_eq!(db.replace_all_backups(&records).unwrap(), 2);

        let stored = db.backups_of("com.a").unwrap();
        assert_eq!(stored, vec![records[0].clone()]);

        db.replace_all_backups(&records[1..]).unwrap();
        assert!(db.backups_of("com.a").unwrap().is_empty());
        assert_eq!(db.get_backup_count().unwrap(), 1);
    }

    #[test]
    fn test_put_and_delete_touch_only_named_packages() {
        let db = CatalogDb::open_in_memory().unwrap();
        db.replace_all_backups(&[backup("com.a", "one", 1), backup("com.b", "two", 2)])
            .unwrap();

        db.put_backups("com.a", &[backup("com.a", "three", 3), backup("com.a", "four", 4)])
            .unwrap();
        assert_eq!(db.backups_of("com.a").unwrap().len(), 2);
        assert_eq!(db.backups_of("com.b").unwrap().len(), 1);

        assert_eq!(db.delete_backups_of(&["com.b".to_string()]).unwrap(), 1);
        assert!(db.backups_of("com.b").unwrap().is_empty());
    }

    #[test]
    fn test_summaries_include_known_packages_without_backups() {
        let db = CatalogDb::open_in_memory().unwrap();
        let mut invalid = backup("com.a", "broken", 0);
        invalid.invalid_reason = Some("no-props".to_string());
        db.replace_all_backups(&[backup("com.a", "one", 5), invalid]).unwrap();
        Catalog::register_packages(&db, &["com.a".to_string(), "com.empty".to_string()])
            .unwrap();

        let summaries = db.get_package_summaries().unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].package_name, "com.a");
        assert_eq!(summaries[0].backups, 1);
        assert_eq!(summaries[0].invalid, 1);
        assert_eq!(summaries[0].total_size, 5);
        assert_eq!(summaries[1].package_name, "com.empty");
        assert_eq!(summaries[1].backups, 0);
        assert!(summaries[1].latest_backup.is_none());
    }

    #[test]
    fn test_sessions_are_listed_newest_first() {
        let db = CatalogDb::open_in_memory().unwrap();
        for status in ["completed", "failed"] {
            db.record_scan(&ScanSession {
                id: 0,
                started_at: "2024-01-01T00:00:00Z".to_string(),
                completed_at: None,
                status: status.to_string(),
                root_path: "/b".to_string(),
                package_filter: String::new(),
                repair_mode: "none".to_string(),
                processed: 3,
                valid: 1,
                invalid: 1,
                suspicious: 0,
            })
            .unwrap();
        }
        let sessions = db.list_sessions(10).unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].status, "failed");

        db.truncate_all().unwrap();
        assert!(db.list_sessions(10).unwrap().is_empty());
    }
}
