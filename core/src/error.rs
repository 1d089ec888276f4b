//! Error types for schema construction and element path resolution.
//!
//! Content problems found while validating a document are *not* errors in
//! this sense: they are collected as [`ValidationError`](crate::ValidationError)
//! values inside a [`ValidationResult`](crate::ValidationResult).

use thiserror::Error;

/// Failure to map a (partial) element path onto exactly one schema element.
///
/// Returned by [`DocumentType::resolve`](crate::DocumentType::resolve) when
/// uniqueness is requested. These indicate a malformed query or a
/// schema/query mismatch and are meant to be surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// No element matches the given path.
    #[error("element not defined: {0}")]
    ElementNotDefined(String),
    /// More than one element matches the given path.
    #[error("ambiguous element path {path}, could refer to: {}", candidates.join("; "))]
    AmbiguousElementPath {
        path: String,
        candidates: Vec<String>,
    },
}

impl PathError {
    /// The path that failed to resolve.
    pub fn path(&self) -> &str {
        match self {
            Self::ElementNotDefined(path) => path,
            Self::AmbiguousElementPath { path, .. } => path,
        }
    }
}

/// Errors raised while building a [`DocumentType`](crate::DocumentType) from
/// its declarative definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Document type or element sid is empty or contains a dot.
    #[error("invalid sid '{0}': must be non-empty and must not contain '.'")]
    InvalidSid(String),
    /// Two elements share the same complete path.
    #[error("duplicate element path: {0}")]
    DuplicatePath(String),
    /// A validation or extraction pattern failed to compile.
    #[error("invalid pattern for {path}: {message}")]
    InvalidPattern { path: String, message: String },
    /// A paragraph or structured field declares simple-field attributes.
    #[error("container {path} declares simple-field attribute '{attribute}'")]
    ContainerAttribute { path: String, attribute: &'static str },
    /// A fixed-length field declares no length.
    #[error("field {0} is fixed-length but declares length 0")]
    MissingFixedLength(String),
}
