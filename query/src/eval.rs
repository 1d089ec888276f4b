//! In-memory evaluation of a query against a draft document.

use std::cmp::Ordering;

use catalog_core::{DecimalConvention, Document, DocumentType, TypedValue, coerce};
use tracing::debug;

use crate::ast::{BooleanOperator, Comparator, Condition, ConditionGroup, ConditionNode, SearchExpression};
use crate::error::EvaluationError;
use crate::metafield::{FieldRef, Metafield};

/// Returns `true` if `document` satisfies the WHERE clause of `expr`.
///
/// Groups fold left to right with no operator precedence. A condition holds
/// if any value found for its field satisfies the comparator, so repeated
/// fields match existentially. An empty WHERE clause matches every document.
///
/// # Errors
///
/// Fails if the expression targets another document type, uses metafields
/// only storage can answer, or names a field that does not resolve to
/// exactly one element.
///
/// # Examples
///
/// ```
/// use catalog_core::*;
/// use catalog_query::*;
///
/// let def = DocumentTypeDef::new("SI", "").with_paragraph(
///     ElementDef::paragraph("CD", "").with_field(ElementDef::simple("TSK", "").repeatable()),
/// );
/// let schema = DocumentType::build(&def).unwrap();
/// let doc = Document::new("SI").with_content(vec![ContentNode::group(
///     "CD",
///     vec![ContentNode::text("TSK", "OA"), ContentNode::text("TSK", "RA")],
/// )]);
///
/// let expr = SearchExpression::parse(r#"SELECT * FROM SI WHERE TSK = "ra""#).unwrap();
/// assert!(evaluate(&expr, &doc, &schema, DecimalConvention::Point).unwrap());
/// ```
pub fn evaluate(
    expr: &SearchExpression,
    document: &Document,
    schema: &DocumentType,
    convention: DecimalConvention,
) -> Result<bool, EvaluationError> {
    if expr.source != document.document_type {
        return Err(EvaluationError::SourceMismatch {
            expected: expr.source.clone(),
            found: document.document_type.clone(),
        });
    }

    let mut storage_only: Vec<String> = Vec::new();
    for condition in expr.where_clause.conditions() {
        if let Some(mf) = FieldRef::parse(&condition.field)
            .metafield
            .and_then(Metafield::from_name)
            && !mf.is_in_memory()
            && !storage_only.iter().any(|n| n == mf.name())
        {
            storage_only.push(mf.name().to_string());
        }
    }
    if !storage_only.is_empty() {
        return Err(EvaluationError::StorageOnly(storage_only));
    }

    let evaluator = Evaluator {
        document,
        schema,
        convention,
    };
    let matched = evaluator.group(&expr.where_clause)?;
    debug!(
        document_type = %schema.sid,
        id = document.id.as_deref().unwrap_or("draft"),
        matched,
        "Evaluated query"
    );
    Ok(matched)
}

impl SearchExpression {
    /// Shorthand for [`evaluate`].
    pub fn matches(
        &self,
        document: &Document,
        schema: &DocumentType,
        convention: DecimalConvention,
    ) -> Result<bool, EvaluationError> {
        evaluate(self, document, schema, convention)
    }
}

struct Evaluator<'a> {
    document: &'a Document,
    schema: &'a DocumentType,
    convention: DecimalConvention,
}

impl Evaluator<'_> {
    fn group(&self, group: &ConditionGroup) -> Result<bool, EvaluationError> {
        let mut acc: Option<bool> = None;
        for child in &group.children {
            let value = match child {
                ConditionNode::Condition(condition) => self.condition(condition)?,
                ConditionNode::Group(nested) => self.group(nested)?,
            };
            acc = Some(match (acc, child.combinator()) {
                (None, Some(BooleanOperator::Not)) => !value,
                (None, _) => value,
                (Some(acc), Some(BooleanOperator::Or)) => acc || value,
                (Some(acc), Some(BooleanOperator::OrNot)) => acc || !value,
                (Some(acc), Some(BooleanOperator::AndNot | BooleanOperator::Not)) => acc && !value,
                (Some(acc), Some(BooleanOperator::And) | None) => acc && value,
            });
        }
        Ok(acc.unwrap_or(true))
    }

    fn condition(&self, condition: &Condition) -> Result<bool, EvaluationError> {
        let field_ref = FieldRef::parse(&condition.field);
        let metafield = match field_ref.metafield {
            Some(name) => Some(
                Metafield::from_name(name)
                    .ok_or_else(|| EvaluationError::UnknownMetafield(name.to_string()))?,
            ),
            None => None,
        };
        let comparator = condition.comparator;
        let literal = condition.literal.as_str();

        let result = match metafield {
            Some(Metafield::PackageName) => {
                compare_text(&self.document.package_name, comparator, literal)
            }
            Some(Metafield::AuthorId) => self
                .document
                .author_id
                .as_deref()
                .is_some_and(|id| compare_text(id, comparator, literal)),
            Some(Metafield::Count) => {
                let path = self.schema.resolve_unique(field_ref.path)?;
                compare_count(self.document.contents_at(&path).len(), comparator, literal)
            }
            Some(Metafield::AttachmentCount) => {
                let path = self.schema.resolve_unique(field_ref.path)?;
                compare_count(self.document.attachments_for(&path).count(), comparator, literal)
            }
            Some(Metafield::AsValue) => {
                let path = self.schema.resolve_unique(field_ref.path)?;
                match self
                    .schema
                    .simple_field(&path)
                    .and_then(|field| coerce(literal, field, self.convention))
                {
                    Some(target) => self
                        .document
                        .contents_as_values(self.schema, &path, self.convention)
                        .iter()
                        .any(|value| compare_typed(value, comparator, &target)),
                    None => false,
                }
            }
            Some(other) => {
                return Err(EvaluationError::StorageOnly(vec![other.name().to_string()]));
            }
            None => {
                let path = self.schema.resolve_unique(field_ref.path)?;
                self.document
                    .text_contents(&path)
                    .into_iter()
                    .any(|text| compare_text(text, comparator, literal))
            }
        };
        Ok(result)
    }
}

fn compare_ordering(ordering: Option<Ordering>, comparator: Comparator) -> bool {
    let Some(ordering) = ordering else {
        return false;
    };
    match comparator {
        Comparator::Equal => ordering == Ordering::Equal,
        Comparator::Less => ordering == Ordering::Less,
        Comparator::Greater => ordering == Ordering::Greater,
        Comparator::LessOrEqual => ordering != Ordering::Greater,
        Comparator::GreaterOrEqual => ordering != Ordering::Less,
        Comparator::Like => false,
    }
}

/// Case-insensitive on both sides; LIKE is substring containment.
fn compare_text(value: &str, comparator: Comparator, literal: &str) -> bool {
    let value = value.to_uppercase();
    let literal = literal.to_uppercase();
    match comparator {
        Comparator::Like => value.contains(&literal),
        _ => compare_ordering(Some(value.cmp(&literal)), comparator),
    }
}

fn compare_typed(value: &TypedValue, comparator: Comparator, target: &TypedValue) -> bool {
    match (value, target) {
        (TypedValue::Text(value), TypedValue::Text(target)) => compare_text(value, comparator, target),
        _ => compare_ordering(value.partial_cmp(target), comparator),
    }
}

fn compare_count(count: usize, comparator: Comparator, literal: &str) -> bool {
    match literal.trim().parse::<usize>() {
        Ok(target) => compare_ordering(Some(count.cmp(&target)), comparator),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::{ContentNode, DocumentTypeDef, ElementDef, FieldType, MediaKind};

    fn schema() -> DocumentType {
        let def = DocumentTypeDef::new("SI", "")
            .with_paragraph(
                ElementDef::paragraph("CD", "")
                    .with_field(ElementDef::simple("TSK", ""))
                    .with_field(
                        ElementDef::structured("NCT", "")
                            .repeatable()
                            .with_field(ElementDef::simple("NCTN", "").of_type(FieldType::Int32))
                            .with_field(
                                ElementDef::simple("NCTP", "").of_type(FieldType::Decimal),
                            ),
                    ),
            )
            .with_paragraph(
                ElementDef::paragraph("FT", "")
                    .with_field(ElementDef::simple("FTAN", "").with_media(MediaKind::Picture)),
            );
        DocumentType::build(&def).unwrap()
    }

    fn document() -> Document {
        let nct = |n: &str, p: &str| {
            ContentNode::group(
                "NCT",
                vec![ContentNode::text("NCTN", n), ContentNode::text("NCTP", p)],
            )
        };
        let mut doc = Document::new("SI")
            .with_content(vec![
                ContentNode::group(
                    "CD",
                    vec![ContentNode::text("TSK", "Opera d'arte"), nct("2", "1.50"), nct("10", "3")],
                ),
                ContentNode::group("FT", vec![ContentNode::text("FTAN", "front")]),
            ])
            .with_attachment("SI.FT.FTAN", "front", "front.jpg");
        doc.package_name = "museo".into();
        doc.author_id = Some("42".into());
        doc
    }

    fn eval(where_clause: &str) -> Result<bool, EvaluationError> {
        let expr = SearchExpression::parse(&format!("SELECT * FROM SI WHERE {where_clause}")).unwrap();
        evaluate(&expr, &document(), &schema(), DecimalConvention::Point)
    }

    #[test]
    fn test_plain_text_comparisons() {
        assert!(eval(r#"TSK = "OPERA D'ARTE""#).unwrap());
        assert!(eval(r#"TSK LIKE "arte""#).unwrap());
        assert!(!eval(r#"TSK LIKE "quadro""#).unwrap());
        assert!(eval(r#"NCTN = "10""#).unwrap());
        // Plain text ordering is lexicographic.
        assert!(eval(r#"NCTN < "3""#).unwrap());
    }

    #[test]
    fn test_plain_text_ordering_ignores_case() {
        assert!(eval(r#"TSK >= "opera d'arte""#).unwrap());
        assert!(eval(r#"TSK <= "opera d'arte""#).unwrap());
        assert!(eval(r#"TSK < "pittura""#).unwrap());
        assert!(!eval(r#"TSK > "pittura""#).unwrap());
    }

    #[test]
    fn test_typed_values() {
        assert!(eval(r#"NCTN._as_val > "9""#).unwrap());
        assert!(!eval(r#"NCTN._as_val > "10""#).unwrap());
        assert!(eval(r#"NCTP._as_val = "1.5""#).unwrap());
        assert!(eval(r#"NCTP._as_val >= "3.00""#).unwrap());
        assert!(!eval(r#"NCTN._as_val = "abc""#).unwrap());
    }

    #[test]
    fn test_metafields() {
        assert!(eval(r#"NCT._count = "2""#).unwrap());
        assert!(eval(r#"CD._count < "2""#).unwrap());
        assert!(eval(r#"FTAN._attachment_count = "1""#).unwrap());
        assert!(eval(r#"SI._package_name = "MUSEO""#).unwrap());
        assert!(eval(r#"SI._author_id = "42""#).unwrap());
        assert!(!eval(r#"NCT._count = "lots""#).unwrap());
    }

    #[test]
    fn test_left_to_right_fold() {
        // (true OR false) AND false, not true OR (false AND false)
        assert!(!eval(r#"NCTN = "2" OR NCTN = "7" AND TSK = "x""#).unwrap());
        assert!(eval(r#"NOT TSK = "x""#).unwrap());
        assert!(eval(r#"NCTN = "2" AND NOT TSK = "x""#).unwrap());
        assert!(eval(r#"TSK = "x" OR NOT NCTN = "99""#).unwrap());
        assert!(eval(r#"TSK = "x" OR (NCTN = "2" AND NCTN = "10")"#).unwrap());
        assert!(!eval(r#"NOT (NCTN = "2" AND NCTN = "10")"#).unwrap());
    }

    #[test]
    fn test_empty_where_matches() {
        let expr = SearchExpression::parse("SELECT * FROM SI").unwrap();
        assert!(evaluate(&expr, &document(), &schema(), DecimalConvention::Point).unwrap());
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            eval(r#"SI._creation_date > "2020-01-01" AND SI._id = "1""#),
            Err(EvaluationError::StorageOnly(names)) if names == vec!["_creation_date", "_id"]
        ));
        assert!(matches!(eval(r#"XYZ = "1""#), Err(EvaluationError::Path(_))));
        assert!(matches!(
            eval(r#"NCTN._nope = "1""#),
            Err(EvaluationError::UnknownMetafield(_))
        ));

        let expr = SearchExpression::parse("SELECT * FROM RA").unwrap();
        assert!(matches!(
            evaluate(&expr, &document(), &schema(), DecimalConvention::Point),
            Err(EvaluationError::SourceMismatch { .. })
        ));
    }

    #[test]
    fn test_comma_convention() {
        let expr = SearchExpression::parse(r#"SELECT * FROM SI WHERE NCTP._as_val = "1,5""#).unwrap();
        let mut doc = document();
        doc.content[0] = ContentNode::group(
            "CD",
            vec![ContentNode::group("NCT", vec![ContentNode::text("NCTP", "1,50")])],
        );
        assert!(evaluate(&expr, &doc, &schema(), DecimalConvention::Comma).unwrap());
    }
}
