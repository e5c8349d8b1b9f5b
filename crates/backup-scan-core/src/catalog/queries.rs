use super::models::*;
use super::sqlite::CatalogDb;
use crate::record::Backup;
use rusqlite::{params, Connection, Result, Row};
use std::path::PathBuf;
use tracing::debug;

const BACKUP_COLUMNS: &str = "package_name, package_label, version_name, version_code, \
     profile_id, backup_date, size, persistent, note, dir_path, properties_path, invalid_reason";

fn backup_from_row(row: &Row<'_>) -> Result<Backup> {
    Ok(Backup {
        package_name: row.get(0)?,
        package_label: row.get(1)?,
        version_name: row.get(2)?,
        version_code: row.get(3)?,
        profile_id: row.get(4)?,
        backup_date: row.get(5)?,
        size: row.get(6)?,
        persistent: row.get(7)?,
        note: row.get(8)?,
        dir_path: PathBuf::from(row.get::<_, String>(9)?),
        properties_path: row.get::<_, Option<String>>(10)?.map(PathBuf::from),
        invalid_reason: row.get(11)?,
    })
}

fn insert_backups(conn: &Connection, backups: &[Backup]) -> Result<usize> {
    let mut stmt = conn.prepare_cached(&format!(
        "INSERT INTO backup ({}) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        BACKUP_COLUMNS
    ))?;
    let mut count = 0;
    for backup in backups {
        count += stmt.execute(params![
            backup.package_name,
            backup.package_label,
            backup.version_name,
            backup.version_code,
            backup.profile_id,
            backup.backup_date,
            backup.size,
            backup.persistent,
            backup.note,
            backup.dir_path.to_string_lossy().into_owned(),
            backup
                .properties_path
                .as_ref()
                .map(|path| path.to_string_lossy().into_owned()),
            backup.invalid_reason,
        ])?;
    }
    Ok(count)
}

impl CatalogDb {
    // ── Backups ──────────────────────────────────────────────────

    /// Replaces every backup row in one transaction.
    pub fn replace_all(&self, backups: &[Backup]) -> Result<usize> {
        let tx = self.connection().unchecked_transaction()?;
        tx.execute("DELETE FROM backup", [])?;
        let count = insert_backups(&tx, backups)?;
        tx.commit()?;
        debug!("Replaced catalog with {} backups", count);
        Ok(count)
    }

    /// Replaces the rows of one package.
    pub fn replace_package(&self, package_name: &str, backups: &[Backup]) -> Result<usize> {
        let tx = self.connection().unchecked_transaction()?;
        tx.execute(
            "DELETE FROM backup WHERE package_name = ?1",
            params![package_name],
        )?;
        let count = insert_backups(&tx, backups)?;
        tx.commit()?;
        debug!("Replaced {} backups of {}", count, package_name);
        Ok(count)
    }

    pub fn delete_packages(&self, package_names: &[String]) -> Result<usize> {
        let tx = self.connection().unchecked_transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare_cached("DELETE FROM backup WHERE package_name = ?1")?;
            for name in package_names {
                count += stmt.execute(params![name])?;
            }
        }
        tx.commit()?;
        debug!("Deleted {} backups of {} packages", count, package_names.len());
        Ok(count)
    }

    /// Remembers package names so packages without backups stay listed.
    pub fn register_packages(&self, package_names: &[String]) -> Result<usize> {
        let now = chrono::Utc::now().to_rfc3339();
        let tx = self.connection().unchecked_transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO known_package (package_name, last_seen_at) VALUES (?1, ?2) \
                 ON CONFLICT(package_name) DO UPDATE SET last_seen_at = excluded.last_seen_at",
            )?;
            for name in package_names {
                count += stmt.execute(params![name, now])?;
            }
        }
        tx.commit()?;
        Ok(count)
    }

    pub fn get_backups_of(&self, package_name: &str) -> Result<Vec<Backup>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM backup WHERE package_name = ?1 \
             ORDER BY backup_date DESC, dir_path",
            BACKUP_COLUMNS
        ))?;
        let backups = stmt
            .query_map(params![package_name], backup_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(backups)
    }

    pub fn get_all_backups(&self) -> Result<Vec<Backup>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM backup ORDER BY package_name, backup_date DESC, dir_path",
            BACKUP_COLUMNS
        ))?;
        let backups = stmt
            .query_map([], backup_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(backups)
    }

    pub fn get_backup_count(&self) -> Result<i64> {
        self.connection()
            .query_row("SELECT COUNT(*) FROM backup", [], |row| row.get(0))
    }

    /// Per-package counts, including known packages without backups.
    pub fn get_package_summaries(&self) -> Result<Vec<PackageSummary>> {
        let mut stmt = self.connection().prepare(
            "SELECT p.package_name, \
                    COUNT(b.id) - COUNT(b.invalid_reason), \
                    COUNT(b.invalid_reason), \
                    COALESCE(SUM(b.size), 0), \
                    MAX(b.backup_date) \
             FROM (SELECT package_name FROM known_package \
                   UNION SELECT package_name FROM backup) p \
             LEFT JOIN backup b ON b.package_name = p.package_name \
             GROUP BY p.package_name \
             ORDER BY p.package_name",
        )?;
        let summaries = stmt
            .query_map([], |row| {
                Ok(PackageSummary {
                    package_name: row.get(0)?,
                    backups: row.get(1)?,
                    invalid: row.get(2)?,
                    total_size: row.get(3)?,
                    latest_backup: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(summaries)
    }

    // ── Scan Sessions ────────────────────────────────────────────

    pub fn insert_scan_session(&self, session: &ScanSession) -> Result<i64> {
        self.connection().execute(
            "INSERT INTO scan_session \
             (started_at, completed_at, status, root_path, package_filter, repair_mode, \
              processed, valid, invalid, suspicious) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                session.started_at,
                session.completed_at,
                session.status,
                session.root_path,
                session.package_filter,
                session.repair_mode,
                session.processed,
                session.valid,
                session.invalid,
                session.suspicious,
            ],
        )?;
        Ok(self.connection().last_insert_rowid())
    }

    /// Sessions newest first.
    pub fn list_sessions(&self, limit: i64) -> Result<Vec<ScanSession>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, started_at, completed_at, status, root_path, package_filter, \
                    repair_mode, processed, valid, invalid, suspicious \
             FROM scan_session ORDER BY id DESC LIMIT ?1",
        )?;
        let sessions = stmt
            .query_map(params![limit], |row| {
                Ok(ScanSession {
                    id: row.get(0)?,
                    started_at: row.get(1)?,
                    completed_at: row.get(2)?,
                    status: row.get(3)?,
                    root_path: row.get(4)?,
                    package_filter: row.get(5)?,
                    repair_mode: row.get(6)?,
                    processed: row.get(7)?,
                    valid: row.get(8)?,
                    invalid: row.get(9)?,
                    suspicious: row.get(10)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(sessions)
    }
}
