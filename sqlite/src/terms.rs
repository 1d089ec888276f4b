//! Dictionary term access.
//!
//! [`TermStore`] reads and maintains the controlled vocabularies stored in
//! `{prefix}terms`. It also implements
//! [`DictionaryLookup`](catalog_core::DictionaryLookup), so it can be handed
//! directly to [`validate`](catalog_core::validate).
//!
//! # Example
//!
//! ```no_run
//! use catalog_sqlite::TermStore;
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("catalog.db").unwrap();
//! let store = TermStore::new(&conn, "cat_").unwrap();
//!
//! store.add_term("SI.CD.TSK", "SI", None).unwrap();
//! assert!(store.check_term("SI.CD.TSK", "SI").unwrap());
//!
//! // Case-insensitive prefix completion
//! let suggestions = store.terms("SI.OG.OGT.OGTD", Some("vil")).unwrap();
//! ```

use std::collections::{BTreeMap, HashMap};

use catalog_core::DictionaryLookup;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::schema::{document_type_of, validate_prefix};

/// A term together with its optional reference URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermEntry {
    pub term: String,
    pub url: Option<String>,
}

/// Escapes `%`, `_` and the escape character itself for a `LIKE ... ESCAPE '\'`
/// pattern, then appends the wildcard.
fn prefix_pattern(starts_with: &str) -> String {
    let mut pattern = String::with_capacity(starts_with.len() + 1);
    for c in starts_with.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Query interface over the term table.
///
/// Terms are matched exactly by [`check_term`](Self::check_term); prefix
/// filters in [`terms`](Self::terms) and
/// [`terms_with_urls`](Self::terms_with_urls) ignore ASCII case. Listings are
/// ordered by term.
pub struct TermStore<'a> {
    conn: &'a Connection,
    prefix: String,
}

impl<'a> TermStore<'a> {
    /// Creates a store for the given connection and table prefix.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::InvalidPrefix`](crate::SqliteError::InvalidPrefix)
    /// if the prefix is invalid.
    pub fn new(conn: &'a Connection, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        Ok(Self { conn, prefix })
    }

    /// Adds a term to the dictionary of `field_path`.
    ///
    /// Returns `false` if the term was already present; its URL is left
    /// unchanged. Whether the field is dictionary-backed is not checked here.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::InvalidFieldPath`](crate::SqliteError::InvalidFieldPath)
    /// if `field_path` is not a complete path.
    pub fn add_term(&self, field_path: &str, term: &str, url: Option<&str>) -> Result<bool> {
        let document_type = document_type_of(field_path)?;
        let inserted = self.conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {}terms (document_type, field_path, term, url) VALUES (?1, ?2, ?3, ?4)",
                self.prefix
            ),
            params![document_type, field_path, term, url],
        )?;
        debug!(field = %field_path, term = %term, inserted = inserted > 0, "Add term");
        Ok(inserted > 0)
    }

    /// Removes one term. Returns `false` if it did not exist.
    pub fn remove_term(&self, field_path: &str, term: &str) -> Result<bool> {
        let deleted = self.conn.execute(
            &format!(
                "DELETE FROM {}terms WHERE field_path = ?1 AND term = ?2",
                self.prefix
            ),
            params![field_path, term],
        )?;
        Ok(deleted > 0)
    }

    /// Removes every term of one field, returning how many were deleted.
    pub fn remove_all_terms(&self, field_path: &str) -> Result<usize> {
        let deleted = self.conn.execute(
            &format!("DELETE FROM {}terms WHERE field_path = ?1", self.prefix),
            [field_path],
        )?;
        debug!(field = %field_path, deleted, "Removed field dictionary");
        Ok(deleted)
    }

    /// Removes every term of every field of a document type.
    pub fn remove_all_terms_for_document_type(&self, document_type: &str) -> Result<usize> {
        let deleted = self.conn.execute(
            &format!("DELETE FROM {}terms WHERE document_type = ?1", self.prefix),
            [document_type],
        )?;
        debug!(document_type = %document_type, deleted, "Removed document type dictionaries");
        Ok(deleted)
    }

    /// Exact, case-sensitive membership test.
    pub fn check_term(&self, field_path: &str, term: &str) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            &format!(
                "SELECT EXISTS (SELECT 1 FROM {}terms WHERE field_path = ?1 AND term = ?2)",
                self.prefix
            ),
            params![field_path, term],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Terms of one field, optionally restricted to those starting with
    /// `starts_with` (ASCII case-insensitive, `%` and `_` taken literally).
    pub fn terms(&self, field_path: &str, starts_with: Option<&str>) -> Result<Vec<String>> {
        Ok(self
            .terms_with_urls(field_path, starts_with)?
            .into_iter()
            .map(|entry| entry.term)
            .collect())
    }

    /// Like [`terms`](Self::terms), with each term's URL.
    pub fn terms_with_urls(
        &self,
        field_path: &str,
        starts_with: Option<&str>,
    ) -> Result<Vec<TermEntry>> {
        let map_row = |row: &rusqlite::Row<'_>| {
            Ok(TermEntry {
                term: row.get(0)?,
                url: row.get(1)?,
            })
        };
        let rows = match starts_with {
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT term, url FROM {}terms WHERE field_path = ?1 ORDER BY term",
                    self.prefix
                ))?;
                stmt.query_map([field_path], map_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
            Some(start) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT term, url FROM {}terms WHERE field_path = ?1 AND term LIKE ?2 ESCAPE '\\' ORDER BY term",
                    self.prefix
                ))?;
                stmt.query_map(params![field_path, prefix_pattern(start)], map_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(rows)
    }

    /// Every term of a document type grouped by field path, both sorted.
    pub fn all_terms(&self, document_type: &str) -> Result<BTreeMap<String, Vec<String>>> {
        Ok(self
            .all_terms_with_urls(document_type)?
            .into_iter()
            .map(|(path, entries)| (path, entries.into_iter().map(|e| e.term).collect()))
            .collect())
    }

    /// Like [`all_terms`](Self::all_terms), with each term's URL.
    pub fn all_terms_with_urls(
        &self,
        document_type: &str,
    ) -> Result<BTreeMap<String, Vec<TermEntry>>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT field_path, term, url FROM {}terms WHERE document_type = ?1 ORDER BY field_path, term",
            self.prefix
        ))?;
        let rows = stmt.query_map([document_type], |row| {
            Ok((
                row.get::<_, String>(0)?,
                TermEntry {
                    term: row.get(1)?,
                    url: row.get(2)?,
                },
            ))
        })?;

        let mut grouped: BTreeMap<String, Vec<TermEntry>> = BTreeMap::new();
        for row in rows {
            let (path, entry) = row?;
            grouped.entry(path).or_default().push(entry);
        }
        Ok(grouped)
    }

    /// URL of one term; `None` if the term is missing or has no URL.
    pub fn term_url(&self, field_path: &str, term: &str) -> Result<Option<String>> {
        let url: Option<Option<String>> = self
            .conn
            .query_row(
                &format!(
                    "SELECT url FROM {}terms WHERE field_path = ?1 AND term = ?2",
                    self.prefix
                ),
                params![field_path, term],
                |row| row.get(0),
            )
            .optional()?;
        Ok(url.flatten())
    }

    /// Total number of stored terms.
    pub fn term_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}terms", self.prefix),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl DictionaryLookup for TermStore<'_> {
    fn term_exists(&self, field_path: &str, term: &str) -> bool {
        self.check_term(field_path, term).unwrap_or_else(|err| {
            warn!(field = %field_path, error = %err, "Dictionary lookup failed, treating term as missing");
            false
        })
    }

    fn all_terms(&self, document_type: &str) -> Option<HashMap<String, Vec<String>>> {
        match TermStore::all_terms(self, document_type) {
            Ok(terms) => Some(terms.into_iter().collect()),
            Err(err) => {
                warn!(document_type = %document_type, error = %err, "Bulk dictionary read failed");
                None
            }
        }
    }
}
