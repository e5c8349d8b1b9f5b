use rusqlite::{Connection, Result};
use tracing::debug;

const SCHEMA_VERSION: i64 = 1;

/// SQLite-backed backup catalog.
pub struct CatalogDb {
    conn: Connection,
}

impl CatalogDb {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = CatalogDb { conn };
        db.configure_pragmas()?;
        db.migrate_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = CatalogDb { conn };
        db.configure_pragmas()?;
        db.migrate_schema()?;
        Ok(db)
    }

    fn configure_pragmas(&self) -> Result<()> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA cache_size = -16000;
             PRAGMA busy_timeout = 5000;",
        )?;
        debug!("SQLite pragmas configured (WAL mode, 16MB cache)");
        Ok(())
    }

    /// Older schemas are dropped and recreated, every row can be rebuilt by
    /// the next full scan.
    fn migrate_schema(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if version != 0 && version < SCHEMA_VERSION {
            debug!(
                "Schema version {} < {}, dropping all tables and recreating",
                version, SCHEMA_VERSION
            );
            self.conn.execute_batch(
                "DROP TABLE IF EXISTS scan_session;
                 DROP TABLE IF EXISTS known_package;
                 DROP TABLE IF EXISTS backup;",
            )?;
        }

        self.conn.execute_batch(include_str!("schema.sql"))?;
        debug!("SQLite schema initialized (version {})", SCHEMA_VERSION);
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn truncate_all(&self) -> Result<()> {
        self.conn.execute_batch(
            "DELETE FROM backup;
             DELETE FROM known_package;
             DELETE FROM scan_session;",
        )?;
        debug!("All tables truncated");
        Ok(())
    }
}
