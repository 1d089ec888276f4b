//! Failures of query parsing and in-memory evaluation.
//!
//! Static-validation findings are not errors in this sense; they are
//! collected as [`ExpressionError`](crate::ExpressionError) values.

use catalog_core::PathError;
use thiserror::Error;

/// Strict-mode parse failure.
///
/// The lenient parser drops malformed fragments instead and never returns
/// one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unexpected character '{found}' at offset {offset}")]
    UnexpectedCharacter { offset: usize, found: char },
    #[error("unexpected {token} at offset {offset}, expected {expected}")]
    UnexpectedToken {
        token: String,
        offset: usize,
        expected: &'static str,
    },
    #[error("clause {0} appears more than once")]
    DuplicateClause(&'static str),
    #[error("missing document type: a FROM clause is required")]
    MissingSource,
    #[error("incomplete condition '{0}'")]
    IncompleteCondition(String),
    #[error("boolean operator {0} is not followed by a condition")]
    DanglingOperator(String),
    #[error("unmatched ')' at offset {0}")]
    UnmatchedClose(usize),
    #[error("{0} parenthesis left open")]
    UnclosedGroup(usize),
    #[error("empty parentheses at offset {0}")]
    EmptyGroup(usize),
}

/// Failure to evaluate an expression against a draft document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    /// A field reference does not resolve to exactly one element.
    #[error(transparent)]
    Path(#[from] PathError),
    /// The expression uses metafields only storage can answer.
    #[error("metafields {} can only be evaluated by storage", .0.join(", "))]
    StorageOnly(Vec<String>),
    #[error("unknown metafield {0}")]
    UnknownMetafield(String),
    #[error("expression queries {expected} but the document is of type {found}")]
    SourceMismatch { expected: String, found: String },
}
