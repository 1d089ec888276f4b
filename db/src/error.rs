//! Error types for loading definitions, seeds and configuration.

use std::path::PathBuf;

use catalog_core::SchemaError;
use thiserror::Error;

/// Errors that can occur while loading catalog files.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error in {path}: {source}")]
    JsonError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("YAML error in {path}: {source}")]
    YamlError {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// YAML serialization failure while saving.
    #[error("YAML error: {0}")]
    YamlWriteError(#[from] serde_yaml::Error),

    /// A definition was decoded but does not build into a schema.
    #[error("invalid definition of {sid}: {source}")]
    InvalidDefinition {
        sid: String,
        #[source]
        source: SchemaError,
    },

    /// Two sources define the same document type sid.
    #[error("document type {0} is defined more than once")]
    DuplicateDocumentType(String),

    /// The file extension is not `json`, `yaml` or `yml`.
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(PathBuf),

    /// All configured registry sources failed.
    #[error("no definition sources available")]
    NoSourcesAvailable,
}

/// Convenience alias for results with [`RegistryError`].
pub type Result<T> = std::result::Result<T, RegistryError>;
