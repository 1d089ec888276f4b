//! Query language for catalog records.
//!
//! Queries look like SQL restricted to one document type:
//!
//! ```text
//! SELECT *, CD.NCT FROM SI WHERE NCTN._as_val >= "2" AND NOT (TSK = "RA" OR SI._package_name LIKE "demo") ORDER_BY NCTN DESC
//! ```
//!
//! - [`Parser`] turns text into a [`SearchExpression`], strictly by default.
//! - [`validate_expression`] checks an expression against a
//!   [`DocumentType`](catalog_core::DocumentType) and collects every
//!   [`ExpressionError`].
//! - [`evaluate`] answers an expression against a draft
//!   [`Document`](catalog_core::Document) without storage.
//! - [`merge`] and [`SearchExpression::simplify`] combine and flatten queries.
//!
//! Field references may carry a metafield suffix (`NCT._count`, `SI._id`);
//! the [`METAFIELDS`] table says which exist, where they apply and which only
//! storage can answer.

mod ast;
mod error;
mod eval;
mod lexer;
mod merge;
mod metafield;
mod parser;
mod validate;

pub use ast::{
    BooleanOperator, Comparator, Condition, ConditionGroup, ConditionNode, OrderingTerm,
    SearchExpression, escape_literal,
};
pub use error::{EvaluationError, ParseError};
pub use eval::evaluate;
pub use lexer::{QueryLexer, Token, TokenKind};
pub use merge::{merge, simplify_group};
pub use metafield::{FieldRef, METAFIELDS, Metafield, MetafieldInfo, MetafieldScope};
pub use parser::Parser;
pub use validate::{
    ExpressionError, ExpressionValidation, QueryOptions, validate_expression, validate_query_text,
};
