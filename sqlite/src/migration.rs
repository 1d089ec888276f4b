//! Migration lifecycle operations for the term table.
//!
//! Provides [`Migration`] for creating, dropping, seeding, and refreshing
//! the dictionary storage. All mutation operations use transactions.
//!
//! # Example
//!
//! ```no_run
//! use catalog_sqlite::Migration;
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("catalog.db").unwrap();
//! let mut migration = Migration::new(conn, "cat_").unwrap();
//!
//! migration.up().unwrap();
//! let report = migration.seed("dictionaries/").unwrap();
//! println!("{} terms from {} files", report.terms_inserted, report.files);
//!
//! let status = migration.status().unwrap();
//! assert!(status.tables_exist);
//! ```

use std::path::Path;

use catalog_db::DictionarySeed;
use rusqlite::{Connection, params};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Result, SqliteError};
use crate::schema::{document_type_of, generate_drop_sql, generate_schema_sql, validate_prefix};

/// Manages the lifecycle of the term table.
///
/// Owns its connection; use [`connection`](Self::connection) to build a
/// [`TermStore`](crate::TermStore) on top of it.
pub struct Migration {
    conn: Connection,
    prefix: String,
}

impl Migration {
    /// Creates a new migration manager for the given connection and table prefix.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::InvalidPrefix`] if the prefix contains invalid characters.
    pub fn new(conn: Connection, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        Ok(Self { conn, prefix })
    }

    /// Creates the term table and its index.
    ///
    /// Safe to call multiple times.
    pub fn up(&mut self) -> Result<()> {
        let sql = generate_schema_sql(&self.prefix)?;
        let tx = self.conn.transaction()?;
        tx.execute_batch(&sql)
            .map_err(|e| SqliteError::MigrationError(format!("failed to create tables: {e}")))?;
        tx.commit()?;
        debug!(prefix = %self.prefix, "Created term table");
        Ok(())
    }

    /// Drops the term table. Safe to call when it does not exist.
    pub fn down(&mut self) -> Result<()> {
        let sql = generate_drop_sql(&self.prefix)?;
        let tx = self.conn.transaction()?;
        tx.execute_batch(&sql)
            .map_err(|e| SqliteError::MigrationError(format!("failed to drop tables: {e}")))?;
        tx.commit()?;
        debug!(prefix = %self.prefix, "Dropped term table");
        Ok(())
    }

    /// Reports whether the table exists and how much it holds.
    pub fn status(&self) -> Result<MigrationStatus> {
        if !self.tables_exist()? {
            return Ok(MigrationStatus::default());
        }

        Ok(MigrationStatus {
            tables_exist: true,
            term_count: self.count("COUNT(*)")?,
            field_count: self.count("COUNT(DISTINCT field_path)")?,
            document_type_count: self.count("COUNT(DISTINCT document_type)")?,
        })
    }

    /// Inserts the terms of every seed file in `source_dir` in one
    /// transaction.
    ///
    /// Terms already present for a field are skipped and counted in
    /// [`SeedReport::duplicates_skipped`].
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::LoaderError`] if a seed file cannot be read,
    /// [`SqliteError::InvalidFieldPath`] for a key that is not a complete
    /// path, or [`SqliteError::DatabaseError`] if insertion fails. Nothing is
    /// written on error.
    pub fn seed(&mut self, source_dir: impl AsRef<Path>) -> Result<SeedReport> {
        let seeds = DictionarySeed::load_dir(source_dir.as_ref())?;

        let tx = self.conn.transaction()?;
        let mut report = SeedReport::default();
        {
            let mut insert = tx.prepare(&format!(
                "INSERT OR IGNORE INTO {}terms (document_type, field_path, term, url) VALUES (?1, ?2, ?3, ?4)",
                self.prefix
            ))?;
            for (file, seed) in &seeds {
                for (field_path, term) in seed.entries() {
                    let document_type = document_type_of(field_path)?;
                    let inserted =
                        insert.execute(params![document_type, field_path, term.term(), term.url()])?;
                    if inserted > 0 {
                        report.terms_inserted += 1;
                    } else {
                        report.duplicates_skipped += 1;
                    }
                }
                debug!(file = %file.display(), terms = seed.term_count(), "Seeded dictionary file");
                report.files += 1;
            }
        }
        tx.commit()?;

        info!(
            files = report.files,
            inserted = report.terms_inserted,
            skipped = report.duplicates_skipped,
            "Seeded dictionaries"
        );
        Ok(report)
    }

    /// Drops the table, recreates it, and seeds from the given directory.
    pub fn refresh(&mut self, source_dir: impl AsRef<Path>) -> Result<SeedReport> {
        self.down()?;
        self.up()?;
        self.seed(source_dir)
    }

    /// Returns a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Consumes the migration and returns the underlying connection.
    pub fn into_connection(self) -> Connection {
        self.conn
    }

    fn tables_exist(&self) -> Result<bool> {
        let table_name = format!("{}terms", self.prefix);
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [&table_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn count(&self, aggregate: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT {aggregate} FROM {}terms", self.prefix),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

/// Snapshot of the dictionary storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub tables_exist: bool,
    pub term_count: usize,
    /// Number of distinct fields with at least one term.
    pub field_count: usize,
    pub document_type_count: usize,
}

/// Outcome of [`Migration::seed`] and [`Migration::refresh`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    /// Seed files read.
    pub files: usize,
    pub terms_inserted: usize,
    /// Terms already present for their field.
    pub duplicates_skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migration() -> Migration {
        Migration::new(Connection::open_in_memory().unwrap(), "cat_").unwrap()
    }

    #[test]
    fn test_new_validates_prefix() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(Migration::new(conn, "valid_prefix_").is_ok());

        let conn = Connection::open_in_memory().unwrap();
        assert!(matches!(
            Migration::new(conn, "drop;--"),
            Err(SqliteError::InvalidPrefix(_))
        ));
    }

    #[test]
    fn test_status_on_empty_database() {
        let status = migration().status().unwrap();
        assert_eq!(status, MigrationStatus::default());
    }

    #[test]
    fn test_up_is_idempotent() {
        let mut migration = migration();
        migration.up().unwrap();
        migration.up().unwrap();
        let status = migration.status().unwrap();
        assert!(status.tables_exist);
        assert_eq!(status.term_count, 0);
    }

    #[test]
    fn test_down_removes_table() {
        let mut migration = migration();
        migration.down().unwrap();
        migration.up().unwrap();
        migration.down().unwrap();
        assert!(!migration.status().unwrap().tables_exist);
    }

    #[test]
    fn test_seed_counts_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.yaml"), "SI.CD.TSK: [SI]\nSI.CD.LIR: [I, P]\n").unwrap();
        std::fs::write(dir.path().join("b.json"), r#"{"SI.CD.TSK": ["SI", "RA"]}"#).unwrap();

        let mut migration = migration();
        migration.up().unwrap();
        let report = migration.seed(dir.path()).unwrap();
        assert_eq!(
            report,
            SeedReport {
                files: 2,
                terms_inserted: 4,
                duplicates_skipped: 1,
            }
        );

        let status = migration.status().unwrap();
        assert_eq!(status.term_count, 4);
        assert_eq!(status.field_count, 2);
        assert_eq!(status.document_type_count, 1);
    }

    #[test]
    fn test_seed_is_atomic() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.yaml"), "SI.CD.TSK: [SI]\nTSK: [bad]\n").unwrap();

        let mut migration = migration();
        migration.up().unwrap();
        assert!(matches!(
            migration.seed(dir.path()),
            Err(SqliteError::InvalidFieldPath(_))
        ));
        assert_eq!(migration.status().unwrap().term_count, 0);
    }

    #[test]
    fn test_refresh_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.yaml"), "SI.CD.TSK: [SI]\n").unwrap();

        let mut migration = migration();
        migration.up().unwrap();
        migration.seed(dir.path()).unwrap();
        let report = migration.refresh(dir.path()).unwrap();
        assert_eq!(report.terms_inserted, 1);
        assert_eq!(report.duplicates_skipped, 0);
        assert_eq!(migration.status().unwrap().term_count, 1);
    }
}
