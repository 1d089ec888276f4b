//! Document validation against a document type.
//!
//! [`validate`] walks a document once in depth-first order, checking that
//! every element is declared, that elements appear in an order the schema
//! allows, and that every simple-field value respects its field's length,
//! pattern and dictionary. Three post-passes then check media attachments,
//! fields required for saving, and assign the catalogation level.
//!
//! Findings are collected, never raised: the caller always gets the complete
//! list in a [`ValidationResult`].
//!
//! # Examples
//!
//! ```
//! use catalog_core::*;
//!
//! let def = DocumentTypeDef::new("SI", "").with_paragraph(
//!     ElementDef::paragraph("CD", "")
//!         .required_at(CatalogationLevel::I)
//!         .with_field(ElementDef::simple("TSK", "").with_length(4).required_at(CatalogationLevel::I)),
//! );
//! let dt = DocumentType::build(&def).unwrap();
//!
//! let mut doc = Document::new("SI").with_content(vec![
//!     ContentNode::group("CD", vec![ContentNode::text("TSK", "SI")]),
//! ]);
//! let result = validate(&mut doc, &dt, &StaticDictionary::default());
//! assert!(result.can_be_saved);
//! assert_eq!(result.catalogation_level, CatalogationLevel::I);
//! assert_eq!(doc.catalogation_level, CatalogationLevel::I);
//!
//! let mut long = Document::new("SI").with_content(vec![
//!     ContentNode::group("CD", vec![ContentNode::text("TSK", "TOO LONG")]),
//! ]);
//! let result = validate(&mut long, &dt, &StaticDictionary::default());
//! assert!(!result.can_be_saved);
//! assert_eq!(result.errors[0].kind, ValidationErrorKind::WrongLength);
//! ```

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::document::{ContentValue, Document};
use crate::schema::{DocumentType, ElementKind, SimpleField};
use crate::types::{CatalogationLevel, DictionaryMode};

/// Category of a content-validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    EmptyElement,
    OutOfOrderStructure,
    WrongLength,
    PatternMismatch,
    NotInDictionary,
    UnknownElement,
    MissingField,
    FieldHasNoMedia,
    NoValueForMedia,
    /// Reported by storage layers that check attachment files.
    FileNotFound,
    /// Reserved; not produced by [`validate`].
    InconsistentLevel,
}

/// One content-validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub message: String,
}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Outcome of validating one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub can_be_saved: bool,
    pub catalogation_level: CatalogationLevel,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    fn new() -> Self {
        Self {
            can_be_saved: true,
            catalogation_level: CatalogationLevel::None,
            errors: Vec::new(),
        }
    }

    fn fatal(&mut self, kind: ValidationErrorKind, message: String) {
        self.errors.push(ValidationError::new(kind, message));
        self.can_be_saved = false;
    }

    fn warning(&mut self, kind: ValidationErrorKind, message: String) {
        self.errors.push(ValidationError::new(kind, message));
    }

    /// Findings of the given kind.
    pub fn errors_of(&self, kind: ValidationErrorKind) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter().filter(move |e| e.kind == kind)
    }
}

/// Read-side access to controlled vocabularies.
///
/// Implemented by storage layers. [`validate`] asks once for the bulk
/// dictionary of the document type and falls back to per-term lookups when
/// none is available.
pub trait DictionaryLookup {
    /// Returns `true` if `term` belongs to the dictionary of `field_path`.
    fn term_exists(&self, field_path: &str, term: &str) -> bool;

    /// Every term of every field of `document_type`, keyed by complete path.
    fn all_terms(&self, _document_type: &str) -> Option<HashMap<String, Vec<String>>> {
        None
    }
}

/// In-memory dictionary, mostly for tests and embedded schemas.
///
/// # Examples
///
/// ```
/// use catalog_core::{DictionaryLookup, StaticDictionary};
///
/// let dict = StaticDictionary::default().with_terms("SI.CD.TSK", ["SI", "RA"]);
/// assert!(dict.term_exists("SI.CD.TSK", "RA"));
/// assert!(!dict.term_exists("SI.CD.TSK", "XX"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticDictionary {
    terms: HashMap<String, BTreeSet<String>>,
}

impl StaticDictionary {
    pub fn with_terms<I, S>(mut self, field_path: &str, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.terms
            .entry(field_path.to_string())
            .or_default()
            .extend(terms.into_iter().map(Into::into));
        self
    }
}

impl DictionaryLookup for StaticDictionary {
    fn term_exists(&self, field_path: &str, term: &str) -> bool {
        self.terms
            .get(field_path)
            .is_some_and(|terms| terms.contains(term))
    }

    fn all_terms(&self, document_type: &str) -> Option<HashMap<String, Vec<String>>> {
        let prefix = format!("{document_type}.");
        Some(
            self.terms
                .iter()
                .filter(|(path, _)| path.starts_with(&prefix))
                .map(|(path, terms)| (path.clone(), terms.iter().cloned().collect()))
                .collect(),
        )
    }
}

enum Vocabulary<'a> {
    Bulk(HashMap<String, Vec<String>>),
    PerTerm(&'a dyn DictionaryLookup),
}

impl Vocabulary<'_> {
    fn contains(&self, field_path: &str, term: &str) -> bool {
        match self {
            Self::Bulk(terms) => terms
                .get(field_path)
                .is_some_and(|t| t.iter().any(|t| t == term)),
            Self::PerTerm(lookup) => lookup.term_exists(field_path, term),
        }
    }
}

fn check_field_value(
    path: &str,
    value: &str,
    field: &SimpleField,
    vocabulary: &Vocabulary<'_>,
    result: &mut ValidationResult,
) {
    if value.is_empty() {
        result.fatal(
            ValidationErrorKind::EmptyElement,
            format!("field {path} is present but empty"),
        );
    }

    let length = value.chars().count();
    if field.length > 0 {
        if field.fixed_length && length != field.length {
            result.fatal(
                ValidationErrorKind::WrongLength,
                format!(
                    "field {path} must be exactly {} characters long, found {length}",
                    field.length
                ),
            );
        } else if !field.fixed_length && length > field.length {
            result.fatal(
                ValidationErrorKind::WrongLength,
                format!(
                    "field {path} is too long: {length} characters, at most {} allowed",
                    field.length
                ),
            );
        }
    }

    if let Some(pattern) = &field.validation_pattern
        && !pattern.is_match(value)
    {
        result.fatal(
            ValidationErrorKind::PatternMismatch,
            format!("field {path} does not match pattern {}", pattern.as_str()),
        );
    }

    if field.dictionary == DictionaryMode::Closed && !vocabulary.contains(path, value) {
        result.fatal(
            ValidationErrorKind::NotInDictionary,
            format!("value '{value}' of field {path} is not in its closed dictionary"),
        );
    }
}

/// Strictest level whose requirements, and those of every laxer level, are
/// all present. Levels without requirements are skipped.
fn assign_level(schema: &DocumentType, present: &BTreeSet<String>) -> CatalogationLevel {
    let satisfied = |level: CatalogationLevel| {
        schema
            .required_paths(level)
            .is_none_or(|required| required.is_subset(present))
    };
    CatalogationLevel::STRICTEST_FIRST
        .into_iter()
        .filter(|level| schema.required_paths(*level).is_some_and(|r| !r.is_empty()))
        .find(|level| {
            CatalogationLevel::STRICTEST_FIRST
                .into_iter()
                .filter(|laxer| laxer <= level)
                .all(|laxer| satisfied(laxer))
        })
        .unwrap_or(CatalogationLevel::None)
}

/// Validates `document` against `schema`.
///
/// Never stops at the first finding. The recomputed catalogation level is
/// written both to the result and to `document`, whatever the errors.
pub fn validate(
    document: &mut Document,
    schema: &DocumentType,
    dictionary: &dyn DictionaryLookup,
) -> ValidationResult {
    let vocabulary = match dictionary.all_terms(&schema.sid) {
        Some(terms) => Vocabulary::Bulk(terms),
        None => Vocabulary::PerTerm(dictionary),
    };
    let mut result = ValidationResult::new();

    let mut prev_path: Option<String> = None;
    for entry in document.flatten() {
        let Some(element) = schema.element(&entry.path) else {
            result.fatal(
                ValidationErrorKind::UnknownElement,
                format!(
                    "element {} is not declared by document type {}",
                    entry.path, schema.sid
                ),
            );
            continue;
        };

        if let Some(prev) = &prev_path
            && !schema.can_be_preceded(&entry.path, prev)
        {
            result.fatal(
                ValidationErrorKind::OutOfOrderStructure,
                format!("element {} cannot directly follow {prev}", entry.path),
            );
        }

        match (&element.kind, entry.value) {
            (ElementKind::SimpleField(field), ContentValue::Text(text)) => {
                check_field_value(&entry.path, text, field, &vocabulary, &mut result);
            }
            (ElementKind::SimpleField(_), ContentValue::Group(_)) => {
                result.fatal(
                    ValidationErrorKind::OutOfOrderStructure,
                    format!("simple field {} holds nested elements", entry.path),
                );
            }
            (_, ContentValue::Text(_)) => {
                result.fatal(
                    ValidationErrorKind::OutOfOrderStructure,
                    format!("container {} holds a text value", entry.path),
                );
            }
            (_, ContentValue::Group(children)) if children.is_empty() => {
                result.warning(
                    ValidationErrorKind::EmptyElement,
                    format!("element {} is empty", entry.path),
                );
            }
            _ => {}
        }
        prev_path = Some(entry.path);
    }

    for media in &document.media_files {
        if !schema.is_multimedia_field(&media.field_path) {
            result.fatal(
                ValidationErrorKind::FieldHasNoMedia,
                format!(
                    "file {} is attached to field {}, which does not accept attachments",
                    media.file_name, media.field_path
                ),
            );
        } else if !document
            .text_contents(&media.field_path)
            .contains(&media.value.as_str())
        {
            result.fatal(
                ValidationErrorKind::NoValueForMedia,
                format!(
                    "file {} is attached to value '{}' of field {}, but that value is not present",
                    media.file_name, media.value, media.field_path
                ),
            );
        }
    }

    for required in schema.required_fields() {
        if document.contents_at(&required.complete_path).is_empty() {
            result.fatal(
                ValidationErrorKind::MissingField,
                format!(
                    "field {} is required for saving but missing",
                    required.complete_path
                ),
            );
        }
    }

    let level = assign_level(schema, &document.present_paths());
    result.catalogation_level = level;
    document.catalogation_level = level;

    debug!(
        document_type = %schema.sid,
        document_id = ?document.id,
        can_be_saved = result.can_be_saved,
        level = %level,
        errors = result.errors.len(),
        "Validated document"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ContentNode;
    use crate::types::{DocumentTypeDef, ElementDef, MediaKind};

    fn schema() -> DocumentType {
        let def = DocumentTypeDef::new("SI", "Sito")
            .with_paragraph(
                ElementDef::paragraph("CD", "Codici")
                    .required_at(CatalogationLevel::I)
                    .with_field(
                        ElementDef::simple("TSK", "Tipo scheda")
                            .with_length(4)
                            .with_dictionary(DictionaryMode::Closed)
                            .required_at(CatalogationLevel::I)
                            .required_for_saving(),
                    )
                    .with_field(
                        ElementDef::structured("NCT", "Codice univoco")
                            .required_at(CatalogationLevel::I)
                            .with_field(
                                ElementDef::simple("NCTN", "Numero catalogo")
                                    .with_fixed_length(8)
                                    .with_validation_pattern("[0-9]+")
                                    .required_at(CatalogationLevel::I),
                            ),
                    ),
            )
            .with_paragraph(
                ElementDef::paragraph("OG", "Oggetto")
                    .required_at(CatalogationLevel::P)
                    .with_field(ElementDef::simple("OGTD", "Definizione").required_at(CatalogationLevel::P))
                    .with_field(ElementDef::simple("OGTN", "Note").repeatable()),
            )
            .with_paragraph(
                ElementDef::paragraph("FT", "Foto")
                    .repeatable()
                    .with_field(ElementDef::simple("FTAN", "Negativo").with_media(MediaKind::Picture)),
            );
        DocumentType::build(&def).unwrap()
    }

    fn dictionary() -> StaticDictionary {
        StaticDictionary::default().with_terms("SI.CD.TSK", ["SI"])
    }

    fn cd(tsk: &str, nctn: &str) -> ContentNode {
        ContentNode::group(
            "CD",
            vec![
                ContentNode::text("TSK", tsk),
                ContentNode::group("NCT", vec![ContentNode::text("NCTN", nctn)]),
            ],
        )
    }

    #[test]
    fn test_valid_document_gets_level_i() {
        let mut doc = Document::new("SI").with_content(vec![cd("SI", "00000001")]);
        let result = validate(&mut doc, &schema(), &dictionary());
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert!(result.can_be_saved);
        assert_eq!(result.catalogation_level, CatalogationLevel::I);
        assert_eq!(doc.catalogation_level, CatalogationLevel::I);
    }

    #[test]
    fn test_stricter_level_needs_laxer_requirements_too() {
        let og = ContentNode::group("OG", vec![ContentNode::text("OGTD", "villa")]);
        let mut complete = Document::new("SI").with_content(vec![cd("SI", "00000001"), og.clone()]);
        assert_eq!(
            validate(&mut complete, &schema(), &dictionary()).catalogation_level,
            CatalogationLevel::P
        );

        let mut only_p = Document::new("SI").with_content(vec![og]);
        let result = validate(&mut only_p, &schema(), &dictionary());
        assert_eq!(result.catalogation_level, CatalogationLevel::None);
        assert_eq!(result.errors_of(ValidationErrorKind::MissingField).count(), 1);
    }

    #[test]
    fn test_wrong_length_is_fatal() {
        let mut doc = Document::new("SI").with_content(vec![cd("SI", "1")]);
        let result = validate(&mut doc, &schema(), &dictionary());
        assert!(!result.can_be_saved);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ValidationErrorKind::WrongLength);
    }

    #[test]
    fn test_each_violation_is_reported() {
        let mut doc = Document::new("SI").with_content(vec![cd("XXXXX", "ABC")]);
        let result = validate(&mut doc, &schema(), &dictionary());
        let kinds: Vec<_> = result.errors.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ValidationErrorKind::WrongLength,
                ValidationErrorKind::NotInDictionary,
                ValidationErrorKind::WrongLength,
                ValidationErrorKind::PatternMismatch,
            ]
        );
    }

    #[test]
    fn test_empty_value_and_empty_container() {
        let mut doc = Document::new("SI").with_content(vec![
            cd("SI", "00000001"),
            ContentNode::group("OG", vec![ContentNode::text("OGTN", "")]),
            ContentNode::group("FT", vec![]),
        ]);
        let result = validate(&mut doc, &schema(), &dictionary());
        assert!(!result.can_be_saved);
        assert_eq!(result.errors_of(ValidationErrorKind::EmptyElement).count(), 2);

        let mut only_container = Document::new("SI")
            .with_content(vec![cd("SI", "00000001"), ContentNode::group("FT", vec![])]);
        let result = validate(&mut only_container, &schema(), &dictionary());
        assert!(result.can_be_saved);
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn test_unknown_and_out_of_order_elements() {
        let mut doc = Document::new("SI").with_content(vec![
            ContentNode::group(
                "CD",
                vec![
                    ContentNode::group("NCT", vec![ContentNode::text("NCTN", "00000001")]),
                    ContentNode::text("TSK", "SI"),
                    ContentNode::text("XYZ", "?"),
                ],
            ),
        ]);
        let result = validate(&mut doc, &schema(), &dictionary());
        assert_eq!(result.errors_of(ValidationErrorKind::OutOfOrderStructure).count(), 1);
        assert_eq!(result.errors_of(ValidationErrorKind::UnknownElement).count(), 1);
        assert!(!result.can_be_saved);
        // level is assigned regardless of errors
        assert_eq!(result.catalogation_level, CatalogationLevel::I);
    }

    #[test]
    fn test_repetitions_are_allowed_where_declared() {
        let ft = |n: &str| ContentNode::group("FT", vec![ContentNode::text("FTAN", n)]);
        let mut doc = Document::new("SI").with_content(vec![
            cd("SI", "00000001"),
            ContentNode::group(
                "OG",
                vec![ContentNode::text("OGTN", "a"), ContentNode::text("OGTN", "b")],
            ),
            ft("N1"),
            ft("N2"),
        ]);
        let result = validate(&mut doc, &schema(), &dictionary());
        assert!(result.errors.is_empty(), "{:?}", result.errors);

        let mut repeated_tsk = Document::new("SI").with_content(vec![ContentNode::group(
            "CD",
            vec![ContentNode::text("TSK", "SI"), ContentNode::text("TSK", "SI")],
        )]);
        let result = validate(&mut repeated_tsk, &schema(), &dictionary());
        assert_eq!(result.errors_of(ValidationErrorKind::OutOfOrderStructure).count(), 1);
    }

    #[test]
    fn test_media_attachments() {
        let content = vec![
            cd("SI", "00000001"),
            ContentNode::group("FT", vec![ContentNode::text("FTAN", "N1")]),
        ];
        let mut ok = Document::new("SI")
            .with_content(content.clone())
            .with_attachment("SI.FT.FTAN", "N1", "n1.jpg");
        assert!(validate(&mut ok, &schema(), &dictionary()).can_be_saved);

        let mut bad = Document::new("SI")
            .with_content(content)
            .with_attachment("SI.FT.FTAN", "N9", "n9.jpg")
            .with_attachment("SI.CD.TSK", "SI", "tsk.jpg");
        let result = validate(&mut bad, &schema(), &dictionary());
        let kinds: Vec<_> = result.errors.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![ValidationErrorKind::NoValueForMedia, ValidationErrorKind::FieldHasNoMedia]
        );
    }

    struct PerTermOnly;

    impl DictionaryLookup for PerTermOnly {
        fn term_exists(&self, field_path: &str, term: &str) -> bool {
            field_path == "SI.CD.TSK" && term == "SI"
        }
    }

    #[test]
    fn test_per_term_lookup_without_bulk_dictionary() {
        let mut good = Document::new("SI").with_content(vec![cd("SI", "00000001")]);
        assert!(validate(&mut good, &schema(), &PerTermOnly).can_be_saved);

        let mut bad = Document::new("SI").with_content(vec![cd("RA", "00000001")]);
        let result = validate(&mut bad, &schema(), &PerTermOnly);
        assert_eq!(result.errors_of(ValidationErrorKind::NotInDictionary).count(), 1);
    }

    #[test]
    fn test_schema_without_level_requirements_assigns_none() {
        let def = DocumentTypeDef::new("T", "")
            .with_paragraph(ElementDef::paragraph("P", "").with_field(ElementDef::simple("F", "")));
        let dt = DocumentType::build(&def).unwrap();
        let mut doc = Document::new("T")
            .with_content(vec![ContentNode::group("P", vec![ContentNode::text("F", "x")])]);
        let result = validate(&mut doc, &dt, &StaticDictionary::default());
        assert_eq!(result.catalogation_level, CatalogationLevel::None);
    }
}
