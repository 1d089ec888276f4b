//! Static validation of a query against a document type.
//!
//! Every field reference is resolved through the schema and checked against
//! the metafield table, comparator rules and boolean-group structure. Like
//! document validation, findings are collected rather than raised.
//!
//! # Examples
//!
//! ```
//! use catalog_core::*;
//! use catalog_query::*;
//!
//! let def = DocumentTypeDef::new("SI", "").with_paragraph(
//!     ElementDef::paragraph("CD", "").with_field(
//!         ElementDef::structured("NCT", "")
//!             .with_field(ElementDef::simple("NCTN", "").of_type(FieldType::Int32)),
//!     ),
//! );
//! let schema = DocumentType::build(&def).unwrap();
//! let options = QueryOptions::default();
//!
//! let ok = SearchExpression::parse(r#"SELECT * FROM SI WHERE NCTN._as_val > "5""#).unwrap();
//! assert!(validate_expression(&ok, &schema, &options).is_valid);
//!
//! let bad = SearchExpression::parse(r#"SELECT * FROM SI WHERE NCTN LIKE "5""#).unwrap();
//! let result = validate_expression(&bad, &schema, &options);
//! assert!(!result.is_valid);
//! assert!(matches!(result.errors[0], ExpressionError::LikeNotAllowed(_)));
//! ```

use catalog_core::{DecimalConvention, DocumentType, FieldType, MediaKind, coerce};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::ast::{BooleanOperator, Comparator, Condition, ConditionGroup, ConditionNode, SearchExpression};
use crate::error::ParseError;
use crate::metafield::{FieldRef, Metafield, MetafieldScope};
use crate::parser::Parser;

/// A problem found in a query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    #[error("could not parse the query: {0}")]
    Parse(#[from] ParseError),
    #[error("document type {0} named in the FROM clause does not exist")]
    UnknownSource(String),
    #[error("the FROM clause names {found}, but the query is validated against {expected}")]
    SourceMismatch { expected: String, found: String },
    #[error("element {0} is not defined")]
    UnknownElement(String),
    #[error("element {path} is ambiguous, could refer to: {}", candidates.join("; "))]
    AmbiguousElement { path: String, candidates: Vec<String> },
    #[error("metafield {0} does not exist")]
    UnknownMetafield(String),
    #[error("metafield {0} can only be used on saved documents")]
    StorageOnlyMetafield(String),
    #[error("metafield {0} cannot be used on the document type")]
    MetafieldNotForDocumentType(String),
    #[error("metafield {metafield} can only be used on the document type, not on {field}")]
    MetafieldOnlyForDocumentType { metafield: String, field: String },
    #[error("metafield {metafield} cannot be used on paragraph or structured field {field}")]
    MetafieldNotForContainer { metafield: String, field: String },
    #[error("field {0} cannot have attachments, so _attachment_count does not apply")]
    MetafieldRequiresMedia(String),
    #[error("{0} is not a simple field and needs a metafield")]
    MissingMetafield(String),
    #[error("comparator {comparator} cannot be used on {field}")]
    OrderingComparatorNotAllowed { field: String, comparator: Comparator },
    #[error("LIKE can only be used on string simple fields, not on {0}")]
    LikeNotAllowed(String),
    #[error("the first condition of a group cannot start with {0}")]
    LeadingCombinator(BooleanOperator),
    #[error("condition on {0} needs AND, OR, AND NOT or OR NOT to join the previous one")]
    MissingCombinator(String),
    #[error("condition on {0} has no value to compare to")]
    EmptyLiteral(String),
    #[error("'{literal}' cannot be converted to the type of {field}")]
    UncoercibleLiteral { literal: String, field: String },
}

/// Outcome of static validation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExpressionValidation {
    pub is_valid: bool,
    pub errors: Vec<ExpressionError>,
}

impl ExpressionValidation {
    fn from_errors(errors: Vec<ExpressionError>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

/// Settings for parsing and validating queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    /// Parse with [`Parser::lenient`] instead of strictly.
    pub lenient_parsing: bool,
    /// Accept metafields only storage can answer.
    pub allow_storage_only_metafields: bool,
    /// Decimal separator used when coercing `_as_val` literals.
    pub decimal_convention: DecimalConvention,
}

impl QueryOptions {
    pub fn parser(&self) -> Parser {
        if self.lenient_parsing {
            Parser::lenient()
        } else {
            Parser::strict()
        }
    }
}

/// A field reference that passed every check.
struct ResolvedField {
    path: String,
    metafield: Option<Metafield>,
    is_root: bool,
    is_simple: bool,
}

struct Checker<'a> {
    schema: &'a DocumentType,
    options: &'a QueryOptions,
    errors: Vec<ExpressionError>,
}

impl Checker<'_> {
    fn field(&mut self, field: &str) -> Option<ResolvedField> {
        let field_ref = FieldRef::parse(field);
        let mut paths = match self.schema.resolve(field_ref.path, false) {
            Ok(paths) => paths,
            Err(err) => {
                self.errors.push(ExpressionError::UnknownElement(err.path().to_string()));
                return None;
            }
        };
        match paths.len() {
            0 => {
                self.errors
                    .push(ExpressionError::UnknownElement(field_ref.path.to_string()));
                return None;
            }
            1 => {}
            _ => {
                self.errors.push(ExpressionError::AmbiguousElement {
                    path: field_ref.path.to_string(),
                    candidates: paths,
                });
                return None;
            }
        }
        let path = paths.swap_remove(0);
        let is_root = self.schema.is_root(&path);
        let simple = self.schema.simple_field(&path);
        let before = self.errors.len();

        let metafield = match field_ref.metafield {
            None => {
                if simple.is_none() {
                    self.errors.push(ExpressionError::MissingMetafield(field.to_string()));
                }
                None
            }
            Some(name) => {
                let Some(mf) = Metafield::from_name(name) else {
                    self.errors.push(ExpressionError::UnknownMetafield(name.to_string()));
                    return None;
                };
                if mf.is_storage_only() && !self.options.allow_storage_only_metafields {
                    self.errors
                        .push(ExpressionError::StorageOnlyMetafield(mf.name().to_string()));
                }
                match (mf.scope(), is_root) {
                    (MetafieldScope::Element, true) => self
                        .errors
                        .push(ExpressionError::MetafieldNotForDocumentType(mf.name().to_string())),
                    (MetafieldScope::DocumentType, false) => {
                        self.errors.push(ExpressionError::MetafieldOnlyForDocumentType {
                            metafield: mf.name().to_string(),
                            field: field_ref.path.to_string(),
                        })
                    }
                    (MetafieldScope::Element, false)
                        if simple.is_none() && mf != Metafield::Count =>
                    {
                        self.errors.push(ExpressionError::MetafieldNotForContainer {
                            metafield: mf.name().to_string(),
                            field: field_ref.path.to_string(),
                        })
                    }
                    _ => {}
                }
                if mf == Metafield::AttachmentCount
                    && simple.is_some_and(|f| f.media == MediaKind::None)
                {
                    self.errors
                        .push(ExpressionError::MetafieldRequiresMedia(field_ref.path.to_string()));
                }
                Some(mf)
            }
        };

        (self.errors.len() == before).then(|| ResolvedField {
            is_simple: simple.is_some(),
            path,
            metafield,
            is_root,
        })
    }

    fn group(&mut self, group: &ConditionGroup) {
        for (i, child) in group.children.iter().enumerate() {
            let combinator = child.combinator();
            let leading = BooleanOperator::is_leading(combinator);
            match (i == 0, leading, combinator) {
                (true, false, Some(op)) => self.errors.push(ExpressionError::LeadingCombinator(op)),
                (false, true, _) => self.errors.push(ExpressionError::MissingCombinator(
                    match child {
                        ConditionNode::Condition(c) => c.field.clone(),
                        ConditionNode::Group(_) => "(...)".to_string(),
                    },
                )),
                _ => {}
            }
            match child {
                ConditionNode::Group(nested) => self.group(nested),
                ConditionNode::Condition(condition) => self.condition(condition),
            }
        }
    }

    fn condition(&mut self, condition: &Condition) {
        let Some(resolved) = self.field(&condition.field) else {
            return;
        };

        if condition.comparator.is_ordering() {
            let allowed = if resolved.is_root {
                resolved
                    .metafield
                    .is_some_and(|mf| mf.info().orderable_on_document)
            } else if !resolved.is_simple {
                resolved.metafield == Some(Metafield::Count)
            } else {
                true
            };
            if !allowed {
                self.errors.push(ExpressionError::OrderingComparatorNotAllowed {
                    field: condition.field.clone(),
                    comparator: condition.comparator,
                });
            }
        }

        let simple = self.schema.simple_field(&resolved.path);
        if condition.comparator == Comparator::Like {
            let string_field = simple.is_some_and(|f| f.field_type == FieldType::String);
            let plain = matches!(resolved.metafield, None | Some(Metafield::AsValue));
            if !(string_field && plain) {
                self.errors
                    .push(ExpressionError::LikeNotAllowed(condition.field.clone()));
            }
        }

        if condition.literal.is_empty() {
            self.errors
                .push(ExpressionError::EmptyLiteral(condition.field.clone()));
            return;
        }
        let coercible = match resolved.metafield {
            Some(Metafield::AsValue) => simple.is_none_or(|f| {
                coerce(&condition.literal, f, self.options.decimal_convention).is_some()
            }),
            Some(Metafield::Count | Metafield::AttachmentCount) => {
                condition.literal.trim().parse::<u64>().is_ok()
            }
            _ => true,
        };
        if !coercible {
            self.errors.push(ExpressionError::UncoercibleLiteral {
                literal: condition.literal.clone(),
                field: condition.field.clone(),
            });
        }
    }
}

/// Checks `expr` against `schema`.
pub fn validate_expression(
    expr: &SearchExpression,
    schema: &DocumentType,
    options: &QueryOptions,
) -> ExpressionValidation {
    let mut checker = Checker {
        schema,
        options,
        errors: Vec::new(),
    };

    for field in expr.select.iter().filter(|s| *s != "*") {
        checker.field(field);
    }
    if expr.source != schema.sid {
        checker.errors.push(ExpressionError::SourceMismatch {
            expected: schema.sid.clone(),
            found: expr.source.clone(),
        });
    }
    checker.group(&expr.where_clause);
    for term in &expr.order_by {
        checker.field(&term.field);
    }

    debug!(
        document_type = %schema.sid,
        errors = checker.errors.len(),
        "Validated query"
    );
    ExpressionValidation::from_errors(checker.errors)
}

impl SearchExpression {
    /// Shorthand for [`validate_expression`].
    pub fn validate(&self, schema: &DocumentType, options: &QueryOptions) -> ExpressionValidation {
        validate_expression(self, schema, options)
    }
}

/// Parses and validates query text, finding the document type named in its
/// FROM clause through `lookup`.
///
/// The parsed expression is returned whenever parsing succeeded, even if
/// validation found problems.
pub fn validate_query_text<'s>(
    text: &str,
    lookup: impl Fn(&str) -> Option<&'s DocumentType>,
    options: &QueryOptions,
) -> (ExpressionValidation, Option<SearchExpression>) {
    let expr = match options.parser().parse(text) {
        Ok(expr) => expr,
        Err(err) => return (ExpressionValidation::from_errors(vec![err.into()]), None),
    };
    let result = match lookup(&expr.source) {
        Some(schema) => validate_expression(&expr, schema, options),
        None => ExpressionValidation::from_errors(vec![ExpressionError::UnknownSource(
            expr.source.clone(),
        )]),
    };
    (result, Some(expr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::{DocumentTypeDef, ElementDef};

    fn schema() -> DocumentType {
        let def = DocumentTypeDef::new("SI", "")
            .with_paragraph(
                ElementDef::paragraph("CD", "")
                    .with_field(ElementDef::simple("TSK", ""))
                    .with_field(
                        ElementDef::structured("NCT", "")
                            .with_field(ElementDef::simple("NCTN", "").of_type(FieldType::Int32)),
                    ),
            )
            .with_paragraph(
                ElementDef::paragraph("FT", "")
                    .repeatable()
                    .with_field(ElementDef::simple("FTAN", "").with_media(MediaKind::Picture))
                    .with_field(ElementDef::simple("TSK", "")),
            );
        DocumentType::build(&def).unwrap()
    }

    fn check(text: &str) -> Vec<ExpressionError> {
        let expr = SearchExpression::parse(text).unwrap();
        validate_expression(&expr, &schema(), &QueryOptions::default()).errors
    }

    #[test]
    fn test_valid_queries() {
        for text in [
            r#"SELECT * FROM SI WHERE NCTN = "2""#,
            r#"SELECT NCTN, CD.TSK FROM SI WHERE CD.TSK LIKE "si" AND NOT NCTN._as_val >= "3""#,
            r#"SELECT * FROM SI WHERE FT._count > "1" OR FTAN._attachment_count = "0""#,
            r#"SELECT * FROM SI WHERE SI._package_name = "p" ORDER_BY NCTN DESC"#,
            r#"SELECT * FROM SI WHERE (NCTN = "1" OR NCTN = "2") AND NOT (CD.TSK = "x")"#,
        ] {
            assert_eq!(check(text), vec![], "{text}");
        }
    }

    #[test]
    fn test_unknown_and_ambiguous_elements() {
        assert_eq!(
            check(r#"SELECT * FROM SI WHERE XYZ = "1""#),
            vec![ExpressionError::UnknownElement("XYZ".into())]
        );
        assert!(matches!(
            check(r#"SELECT TSK FROM SI"#).as_slice(),
            [ExpressionError::AmbiguousElement { candidates, .. }] if candidates.len() == 2
        ));
    }

    #[test]
    fn test_source_mismatch() {
        assert!(matches!(
            check(r#"SELECT * FROM RA"#).as_slice(),
            [ExpressionError::SourceMismatch { .. }]
        ));
    }

    #[test]
    fn test_metafield_rules() {
        assert_eq!(
            check(r#"SELECT * FROM SI WHERE NCTN._bogus = "1""#),
            vec![ExpressionError::UnknownMetafield("_bogus".into())]
        );
        assert_eq!(
            check(r#"SELECT * FROM SI WHERE SI._id = "1""#),
            vec![ExpressionError::StorageOnlyMetafield("_id".into())]
        );
        assert!(matches!(
            check(r#"SELECT * FROM SI WHERE SI._count = "1""#).as_slice(),
            [ExpressionError::MetafieldNotForDocumentType(_)]
        ));
        assert!(matches!(
            check(r#"SELECT * FROM SI WHERE NCTN._package_name = "1""#).as_slice(),
            [ExpressionError::MetafieldOnlyForDocumentType { .. }]
        ));
        assert!(matches!(
            check(r#"SELECT * FROM SI WHERE CD._as_val = "1""#).as_slice(),
            [ExpressionError::MetafieldNotForContainer { .. }]
        ));
        assert!(matches!(
            check(r#"SELECT * FROM SI WHERE NCTN._attachment_count = "1""#).as_slice(),
            [ExpressionError::MetafieldRequiresMedia(_)]
        ));
        assert!(matches!(
            check(r#"SELECT * FROM SI WHERE CD.NCT = "1""#).as_slice(),
            [ExpressionError::MissingMetafield(_)]
        ));
    }

    #[test]
    fn test_author_id_needs_storage_only_allowance() {
        assert_eq!(
            check(r#"SELECT * FROM SI WHERE SI._author_id = "7""#),
            vec![ExpressionError::StorageOnlyMetafield("_author_id".into())]
        );

        let expr = SearchExpression::parse(r#"SELECT * FROM SI WHERE SI._author_id = "7""#).unwrap();
        let options = QueryOptions {
            allow_storage_only_metafields: true,
            ..QueryOptions::default()
        };
        assert!(validate_expression(&expr, &schema(), &options).is_valid);
    }

    #[test]
    fn test_storage_only_allowed_when_requested() {
        let expr =
            SearchExpression::parse(r#"SELECT * FROM SI WHERE SI._creation_date > "2020-01-01""#)
                .unwrap();
        let options = QueryOptions {
            allow_storage_only_metafields: true,
            ..QueryOptions::default()
        };
        assert!(validate_expression(&expr, &schema(), &options).is_valid);
    }

    #[test]
    fn test_comparator_rules() {
        assert!(matches!(
            check(r#"SELECT * FROM SI WHERE SI._package_name LIKE "x""#).as_slice(),
            [ExpressionError::LikeNotAllowed(_)]
        ));
        assert!(matches!(
            check(r#"SELECT * FROM SI WHERE NCTN LIKE "1""#).as_slice(),
            [ExpressionError::LikeNotAllowed(_)]
        ));
        assert!(matches!(
            check(r#"SELECT * FROM SI WHERE FT._count LIKE "1""#).as_slice(),
            [ExpressionError::LikeNotAllowed(_)]
        ));
        let options = QueryOptions {
            allow_storage_only_metafields: true,
            ..QueryOptions::default()
        };
        let expr = SearchExpression::parse(r#"SELECT * FROM SI WHERE SI._points > "1""#).unwrap();
        assert!(matches!(
            validate_expression(&expr, &schema(), &options).errors.as_slice(),
            [ExpressionError::OrderingComparatorNotAllowed { .. }]
        ));
    }

    #[test]
    fn test_group_structure() {
        let mut expr = SearchExpression::new("SI");
        expr.where_clause.push(
            Condition::new("NCTN", Comparator::Equal, "1").with_combinator(BooleanOperator::And),
        );
        expr.where_clause.push(Condition::new("CD.TSK", Comparator::Equal, "x"));
        expr.where_clause.push(
            ConditionGroup::new()
                .with_combinator(BooleanOperator::Not)
                .with_child(Condition::new("NCTN", Comparator::Equal, "2")),
        );
        let errors = validate_expression(&expr, &schema(), &QueryOptions::default()).errors;
        assert_eq!(
            errors,
            vec![
                ExpressionError::LeadingCombinator(BooleanOperator::And),
                ExpressionError::MissingCombinator("CD.TSK".into()),
                ExpressionError::MissingCombinator("(...)".into()),
            ]
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            check(r#"SELECT * FROM SI WHERE NCTN = """#),
            vec![ExpressionError::EmptyLiteral("NCTN".into())]
        );
        assert!(matches!(
            check(r#"SELECT * FROM SI WHERE NCTN._as_val = "abc""#).as_slice(),
            [ExpressionError::UncoercibleLiteral { .. }]
        ));
        assert!(matches!(
            check(r#"SELECT * FROM SI WHERE FT._count = "many""#).as_slice(),
            [ExpressionError::UncoercibleLiteral { .. }]
        ));
    }

    #[test]
    fn test_validate_query_text() {
        let schema = schema();
        let lookup = |sid: &str| (sid == "SI").then_some(&schema);
        let options = QueryOptions::default();

        let (result, expr) = validate_query_text(r#"SELECT * FROM SI WHERE NCTN = "1""#, lookup, &options);
        assert!(result.is_valid);
        assert!(expr.is_some());

        let (result, expr) = validate_query_text("SELECT * FROM RA", lookup, &options);
        assert_eq!(result.errors, vec![ExpressionError::UnknownSource("RA".into())]);
        assert!(expr.is_some());

        let (result, expr) = validate_query_text(r#"SELECT * FROM SI WHERE A ="#, lookup, &options);
        assert!(matches!(result.errors.as_slice(), [ExpressionError::Parse(_)]));
        assert!(expr.is_none());
    }
}
