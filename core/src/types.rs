//! Declarative definitions for document types and their elements.
//!
//! A [`DocumentTypeDef`] is the serializable description of a catalog record
//! type: an ordered tree of paragraphs, structured fields and simple fields.
//! Definitions are plain data; [`DocumentType::build`](crate::DocumentType::build)
//! validates one and derives the lookup indices used at runtime.
//!
//! Unknown keys are rejected when decoding, so a misspelled attribute in a
//! definition file fails loudly instead of being ignored.

use serde::{Deserialize, Serialize};

/// Version of the definition format.
///
/// Embedded in every [`DefinitionBundle`](crate::DefinitionBundle) to track
/// compatibility.
pub const DEFINITION_FORMAT_VERSION: &str = "1.0.0";

/// Data type stored in a simple field.
///
/// Drives typed coercion of text values (see [`coerce`](crate::coerce)).
///
/// # Examples
///
/// ```
/// use catalog_core::FieldType;
///
/// assert_eq!(FieldType::default(), FieldType::String);
/// assert!(FieldType::Decimal.is_numeric());
/// assert!(!FieldType::Date.is_numeric());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Boolean,
    /// Unsigned 8-bit integer.
    Byte,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    /// Fixed-point decimal (currency and measures).
    Decimal,
    Date,
    Time,
    DateTime,
    /// Free text (the default).
    #[default]
    String,
}

impl FieldType {
    /// Returns `true` for types whose text form uses a decimal separator.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Byte
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::Float32
                | Self::Float64
                | Self::Decimal
        )
    }
}

/// Catalogation level at which an element is required.
///
/// Levels are ordered by strictness: `None < I < P < C`.
///
/// # Examples
///
/// ```
/// use catalog_core::CatalogationLevel;
///
/// assert!(CatalogationLevel::C > CatalogationLevel::P);
/// assert!(CatalogationLevel::I > CatalogationLevel::None);
/// assert_eq!(CatalogationLevel::STRICTEST_FIRST[0], CatalogationLevel::C);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum CatalogationLevel {
    /// Not required at any level.
    #[default]
    #[serde(rename = "none", alias = "NONE")]
    None,
    /// Inventory level.
    I,
    /// Pre-catalogue level.
    P,
    /// Catalogue level.
    C,
}

impl CatalogationLevel {
    /// All real levels, strictest first.
    pub const STRICTEST_FIRST: [CatalogationLevel; 3] = [Self::C, Self::P, Self::I];

    /// Short label used in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::I => "I",
            Self::P => "P",
            Self::C => "C",
        }
    }
}

impl std::fmt::Display for CatalogationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a field is bound to a controlled vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DictionaryMode {
    #[default]
    None,
    /// Suggested terms; any value is accepted.
    Open,
    /// Only dictionary terms are accepted.
    Closed,
}

/// Kind of multimedia file a field value may be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    None,
    Picture,
    Sound,
    Movie,
}

fn default_true() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_zero(value: &usize) -> bool {
    *value == 0
}

/// Declarative description of one element of a document type.
///
/// An element with `fields` is a container (a paragraph at top level, a
/// structured field below it); without `fields` it is a simple field. The
/// simple-field attributes are rejected on containers at build time.
///
/// # Examples
///
/// ```
/// use catalog_core::{CatalogationLevel, DictionaryMode, ElementDef, FieldType};
///
/// let nct = ElementDef::structured("NCT", "Numero catalogo generale")
///     .required_at(CatalogationLevel::I)
///     .with_field(
///         ElementDef::simple("NCTN", "Numero catalogo")
///             .of_type(FieldType::Int32)
///             .with_fixed_length(8),
///     );
/// assert!(nct.is_container());
///
/// let tsk = ElementDef::simple("TSK", "Tipo scheda")
///     .with_length(4)
///     .with_dictionary(DictionaryMode::Closed);
/// assert!(!tsk.is_container());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElementDef {
    /// Short identifier, unique among siblings (e.g. `"NCTN"`).
    pub sid: String,
    /// Human-readable label.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    /// Part of the published standard.
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub compliant: bool,
    /// May appear more than once in a document.
    #[serde(default, skip_serializing_if = "is_false")]
    pub repeatable: bool,
    /// Catalogation level at which the element is required.
    #[serde(default)]
    pub level: CatalogationLevel,
    /// Child elements; `Some` makes this element a container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<ElementDef>>,
    /// Must be filled in for the document to be saved at all.
    #[serde(default, skip_serializing_if = "is_false")]
    pub required_for_saving: bool,
    #[serde(default)]
    pub field_type: FieldType,
    /// Regular expression the whole value must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_pattern: Option<String>,
    /// Regular expression selecting the part of the value to coerce.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_pattern: Option<String>,
    /// `strftime`-style format for date and time types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime_format: Option<String>,
    /// Values always use `.` as decimal separator, whatever the caller's convention.
    #[serde(default, skip_serializing_if = "is_false")]
    pub uses_point_decimal: bool,
    /// Maximum length (or exact length when `fixed_length`); 0 means unlimited.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub length: usize,
    #[serde(default, skip_serializing_if = "is_false")]
    pub fixed_length: bool,
    #[serde(default)]
    pub dictionary: DictionaryMode,
    #[serde(default)]
    pub media: MediaKind,
    /// Values must be unique across documents (enforced by storage).
    #[serde(default, skip_serializing_if = "is_false")]
    pub unique: bool,
    /// Groups unique fields whose combined values must be unique; 0 = no group.
    #[serde(default)]
    pub uniqueness_group: u32,
}

impl ElementDef {
    fn new(sid: &str, label: &str, fields: Option<Vec<ElementDef>>) -> Self {
        Self {
            sid: sid.to_string(),
            label: label.to_string(),
            compliant: true,
            repeatable: false,
            level: CatalogationLevel::None,
            fields,
            required_for_saving: false,
            field_type: FieldType::String,
            validation_pattern: None,
            extraction_pattern: None,
            datetime_format: None,
            uses_point_decimal: false,
            length: 0,
            fixed_length: false,
            dictionary: DictionaryMode::None,
            media: MediaKind::None,
            unique: false,
            uniqueness_group: 0,
        }
    }

    /// Creates a top-level paragraph with no fields yet.
    pub fn paragraph(sid: &str, label: &str) -> Self {
        Self::new(sid, label, Some(Vec::new()))
    }

    /// Creates a structured field (a nested container) with no fields yet.
    pub fn structured(sid: &str, label: &str) -> Self {
        Self::new(sid, label, Some(Vec::new()))
    }

    /// Creates a string-typed simple field.
    pub fn simple(sid: &str, label: &str) -> Self {
        Self::new(sid, label, None)
    }

    /// Appends a child element, turning this element into a container.
    pub fn with_field(mut self, field: ElementDef) -> Self {
        self.fields.get_or_insert_with(Vec::new).push(field);
        self
    }

    pub fn repeatable(mut self) -> Self {
        self.repeatable = true;
        self
    }

    pub fn required_at(mut self, level: CatalogationLevel) -> Self {
        self.level = level;
        self
    }

    pub fn required_for_saving(mut self) -> Self {
        self.required_for_saving = true;
        self
    }

    pub fn non_compliant(mut self) -> Self {
        self.compliant = false;
        self
    }

    pub fn of_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    /// Sets a maximum length.
    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length;
        self.fixed_length = false;
        self
    }

    /// Sets an exact required length.
    pub fn with_fixed_length(mut self, length: usize) -> Self {
        self.length = length;
        self.fixed_length = true;
        self
    }

    pub fn with_validation_pattern(mut self, pattern: &str) -> Self {
        self.validation_pattern = Some(pattern.to_string());
        self
    }

    pub fn with_extraction_pattern(mut self, pattern: &str) -> Self {
        self.extraction_pattern = Some(pattern.to_string());
        self
    }

    pub fn with_datetime_format(mut self, format: &str) -> Self {
        self.datetime_format = Some(format.to_string());
        self
    }

    pub fn with_point_decimal(mut self) -> Self {
        self.uses_point_decimal = true;
        self
    }

    pub fn with_dictionary(mut self, mode: DictionaryMode) -> Self {
        self.dictionary = mode;
        self
    }

    pub fn with_media(mut self, kind: MediaKind) -> Self {
        self.media = kind;
        self
    }

    /// Marks the field unique, optionally within a uniqueness group.
    pub fn unique_in_group(mut self, group: u32) -> Self {
        self.unique = true;
        self.uniqueness_group = group;
        self
    }

    /// Returns `true` if this element holds child elements.
    pub fn is_container(&self) -> bool {
        self.fields.is_some()
    }

    /// Name of the first simple-field-only attribute set to a non-default
    /// value, if any.
    pub(crate) fn simple_attribute_in_use(&self) -> Option<&'static str> {
        if self.required_for_saving {
            Some("required_for_saving")
        } else if self.field_type != FieldType::String {
            Some("field_type")
        } else if self.validation_pattern.is_some() {
            Some("validation_pattern")
        } else if self.extraction_pattern.is_some() {
            Some("extraction_pattern")
        } else if self.datetime_format.is_some() {
            Some("datetime_format")
        } else if self.uses_point_decimal {
            Some("uses_point_decimal")
        } else if self.length != 0 || self.fixed_length {
            Some("length")
        } else if self.dictionary != DictionaryMode::None {
            Some("dictionary")
        } else if self.media != MediaKind::None {
            Some("media")
        } else if self.unique || self.uniqueness_group != 0 {
            Some("unique")
        } else {
            None
        }
    }
}

/// Declarative description of a document type.
///
/// # Examples
///
/// ```
/// use catalog_core::{DocumentTypeDef, ElementDef};
///
/// let def = DocumentTypeDef::new("SI", "Scheda di sito archeologico")
///     .with_paragraph(ElementDef::paragraph("CD", "Codici")
///         .with_field(ElementDef::simple("TSK", "Tipo scheda")));
/// assert_eq!(def.paragraphs.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentTypeDef {
    /// Document type sid, the root of every complete path (e.g. `"SI"`).
    pub sid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub compliant: bool,
    /// Author of this definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Definition version, e.g. `"1.00"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Version of the external cataloguing standard this type follows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_version: Option<String>,
    /// Documents of this type are visible to everyone by default.
    #[serde(default, skip_serializing_if = "is_false")]
    pub public_by_default: bool,
    #[serde(default)]
    pub paragraphs: Vec<ElementDef>,
}

impl DocumentTypeDef {
    pub fn new(sid: &str, label: &str) -> Self {
        Self {
            sid: sid.to_string(),
            label: label.to_string(),
            compliant: true,
            author: None,
            version: None,
            standard_version: None,
            public_by_default: false,
            paragraphs: Vec::new(),
        }
    }

    pub fn with_paragraph(mut self, paragraph: ElementDef) -> Self {
        self.paragraphs.push(paragraph);
        self
    }
}
