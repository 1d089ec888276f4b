//! Error types for the SQLite term store.

use thiserror::Error;

/// Errors that can occur during SQLite dictionary operations.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// Migration lifecycle operation failure.
    #[error("migration error: {0}")]
    MigrationError(String),

    /// Table prefix contains invalid characters.
    #[error("invalid prefix '{0}': must contain only alphanumeric characters and underscores")]
    InvalidPrefix(String),

    /// A field path has no document type segment.
    #[error("invalid field path '{0}': expected a complete path such as SI.CD.TSK")]
    InvalidFieldPath(String),

    /// Error reading seed files.
    #[error("loader error: {0}")]
    LoaderError(#[from] catalog_db::RegistryError),
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;
