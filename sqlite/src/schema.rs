//! SQL generation for the term table with a customizable prefix.
//!
//! One table holds every controlled vocabulary:
//!
//! - `{prefix}terms` - `(document_type, field_path, term, url)`, unique on
//!   `(field_path, term)`
//!
//! The document type is stored alongside the path so that a whole document
//! type can be read or cleared with one indexed query.

use crate::error::{Result, SqliteError};

/// Validates that a table prefix contains only alphanumeric characters and underscores.
pub(crate) fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        return Err(SqliteError::InvalidPrefix(prefix.to_string()));
    }
    if !prefix.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(SqliteError::InvalidPrefix(prefix.to_string()));
    }
    Ok(())
}

/// Generates the `CREATE` statements for the term table and its index.
///
/// # Errors
///
/// Returns [`SqliteError::InvalidPrefix`] if the prefix is empty or contains
/// characters other than alphanumerics and underscores.
pub fn generate_schema_sql(prefix: &str) -> Result<String> {
    validate_prefix(prefix)?;

    let sql = format!(
        r#"
CREATE TABLE IF NOT EXISTS {prefix}terms (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_type TEXT NOT NULL,
    field_path TEXT NOT NULL,
    term TEXT NOT NULL,
    url TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (field_path, term)
);

CREATE INDEX IF NOT EXISTS idx_{prefix}terms_document_type ON {prefix}terms(document_type);
"#
    );

    Ok(sql)
}

/// Generates SQL to drop the term table.
///
/// # Errors
///
/// Returns [`SqliteError::InvalidPrefix`] if the prefix is invalid.
pub fn generate_drop_sql(prefix: &str) -> Result<String> {
    validate_prefix(prefix)?;
    Ok(format!(
        "DROP INDEX IF EXISTS idx_{prefix}terms_document_type;\nDROP TABLE IF EXISTS {prefix}terms;\n"
    ))
}

/// Document type sid of a complete field path (its first segment).
pub(crate) fn document_type_of(field_path: &str) -> Result<&str> {
    match field_path.split_once('.') {
        Some((sid, rest)) if !sid.is_empty() && !rest.is_empty() => Ok(sid),
        _ => Err(SqliteError::InvalidFieldPath(field_path.to_string())),
    }
}
