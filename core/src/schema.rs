//! The runtime schema model of a document type.
//!
//! [`DocumentType::build`] turns a [`DocumentTypeDef`] into an immutable tree
//! stored in an arena of [`Element`]s. Parent links are [`ElementId`] handles
//! into the arena, so ancestor walks are O(1) per step without ownership
//! cycles.
//!
//! Elements are pushed depth-first in declaration order, which makes the arena
//! index the canonical structural order used by [`DocumentType::can_be_preceded`].
//!
//! # Examples
//!
//! ```
//! use catalog_core::*;
//!
//! let def = DocumentTypeDef::new("SI", "Sito")
//!     .with_paragraph(ElementDef::paragraph("CD", "Codici")
//!         .with_field(ElementDef::structured("NCT", "Numero catalogo")
//!             .with_field(ElementDef::simple("NCTN", "Numero").with_fixed_length(8))));
//! let dt = DocumentType::build(&def).unwrap();
//!
//! assert_eq!(dt.resolve("NCTN", true).unwrap(), vec!["SI.CD.NCT.NCTN"]);
//! assert!(dt.can_be_preceded("SI.CD.NCT", "SI.CD"));
//! assert!(!dt.can_be_preceded("SI.CD", "SI.CD.NCT"));
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};

use regex::Regex;
use tracing::debug;

use crate::error::{PathError, SchemaError};
use crate::types::{
    CatalogationLevel, DictionaryMode, DocumentTypeDef, ElementDef, FieldType, MediaKind,
};

/// Handle of an element inside its [`DocumentType`] arena.
///
/// The wrapped index is also the element's position in the canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(usize);

impl ElementId {
    /// Position of the element in canonical order.
    pub fn index(self) -> usize {
        self.0
    }
}

/// A compiled regular expression together with its declared source.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    fn whole(source: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            source: source.to_string(),
            regex: Regex::new(&format!("^(?:{source})$"))?,
        })
    }

    fn partial(source: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            source: source.to_string(),
            regex: Regex::new(source)?,
        })
    }

    /// The pattern as declared in the definition.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// First match of the pattern in `text`.
    pub fn find<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.regex.find(text).map(|m| m.as_str())
    }
}

/// Leaf-specific attributes of a simple field.
#[derive(Debug, Clone)]
pub struct SimpleField {
    pub field_type: FieldType,
    /// Anchored: the whole value must match.
    pub validation_pattern: Option<Pattern>,
    /// Unanchored: the first match is the part coerced to a typed value.
    pub extraction_pattern: Option<Pattern>,
    pub datetime_format: Option<String>,
    pub uses_point_decimal: bool,
    /// Maximum length, or exact length when `fixed_length`; 0 = unlimited.
    pub length: usize,
    pub fixed_length: bool,
    pub dictionary: DictionaryMode,
    pub media: MediaKind,
    pub unique: bool,
    pub uniqueness_group: u32,
    pub required_for_saving: bool,
}

impl SimpleField {
    fn compile(def: &ElementDef, path: &str) -> Result<Self, SchemaError> {
        let invalid = |err: regex::Error| SchemaError::InvalidPattern {
            path: path.to_string(),
            message: err.to_string(),
        };
        if def.fixed_length && def.length == 0 {
            return Err(SchemaError::MissingFixedLength(path.to_string()));
        }
        Ok(Self {
            field_type: def.field_type,
            validation_pattern: def
                .validation_pattern
                .as_deref()
                .filter(|p| !p.is_empty())
                .map(Pattern::whole)
                .transpose()
                .map_err(invalid)?,
            extraction_pattern: def
                .extraction_pattern
                .as_deref()
                .filter(|p| !p.is_empty())
                .map(Pattern::partial)
                .transpose()
                .map_err(invalid)?,
            datetime_format: def.datetime_format.clone().filter(|f| !f.is_empty()),
            uses_point_decimal: def.uses_point_decimal,
            length: def.length,
            fixed_length: def.fixed_length,
            dictionary: def.dictionary,
            media: def.media,
            unique: def.unique,
            uniqueness_group: def.uniqueness_group,
            required_for_saving: def.required_for_saving,
        })
    }
}

/// Kind-specific part of an [`Element`].
#[derive(Debug, Clone)]
pub enum ElementKind {
    Paragraph,
    StructuredField,
    SimpleField(SimpleField),
}

/// One node of the schema tree.
#[derive(Debug, Clone)]
pub struct Element {
    pub id: ElementId,
    pub sid: String,
    pub label: String,
    pub compliant: bool,
    pub repeatable: bool,
    pub required_at_level: CatalogationLevel,
    /// Dot-joined sids from the document type root, e.g. `SI.CD.NCT.NCTN`.
    pub complete_path: String,
    pub parent: Option<ElementId>,
    pub children: Vec<ElementId>,
    /// `repeatable` on this element or on any ancestor below the root.
    pub can_be_repeated: bool,
    pub kind: ElementKind,
}

impl Element {
    pub fn is_container(&self) -> bool {
        !matches!(self.kind, ElementKind::SimpleField(_))
    }

    pub fn as_simple_field(&self) -> Option<&SimpleField> {
        match &self.kind {
            ElementKind::SimpleField(field) => Some(field),
            _ => None,
        }
    }
}

/// Immutable schema of one document type with its derived indices.
///
/// Safe to share between threads once built; nothing mutates it afterwards.
#[derive(Debug, Clone)]
pub struct DocumentType {
    pub sid: String,
    pub label: String,
    pub compliant: bool,
    pub author: Option<String>,
    pub version: Option<String>,
    pub standard_version: Option<String>,
    pub public_by_default: bool,
    elements: Vec<Element>,
    paragraphs: Vec<ElementId>,
    by_path: HashMap<String, ElementId>,
    simple_fields: Vec<ElementId>,
    multimedia_fields: Vec<ElementId>,
    required_fields: Vec<ElementId>,
    required_per_level: BTreeMap<CatalogationLevel, BTreeSet<String>>,
}

fn check_sid(sid: &str) -> Result<(), SchemaError> {
    if sid.trim().is_empty() || sid.contains('.') {
        return Err(SchemaError::InvalidSid(sid.to_string()));
    }
    Ok(())
}

impl DocumentType {
    /// Builds the schema model from a definition.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] for invalid sids, duplicate complete paths,
    /// patterns that do not compile, or simple-field attributes declared on a
    /// container.
    pub fn build(def: &DocumentTypeDef) -> Result<Self, SchemaError> {
        check_sid(&def.sid)?;

        let mut dt = Self {
            sid: def.sid.clone(),
            label: def.label.clone(),
            compliant: def.compliant,
            author: def.author.clone(),
            version: def.version.clone(),
            standard_version: def.standard_version.clone(),
            public_by_default: def.public_by_default,
            elements: Vec::new(),
            paragraphs: Vec::new(),
            by_path: HashMap::new(),
            simple_fields: Vec::new(),
            multimedia_fields: Vec::new(),
            required_fields: Vec::new(),
            required_per_level: BTreeMap::new(),
        };

        for paragraph in &def.paragraphs {
            let id = dt.add_element(paragraph, None, true)?;
            dt.paragraphs.push(id);
        }
        dt.build_indices();

        debug!(
            document_type = %dt.sid,
            elements = dt.elements.len(),
            simple_fields = dt.simple_fields.len(),
            "Built document type"
        );
        Ok(dt)
    }

    fn add_element(
        &mut self,
        def: &ElementDef,
        parent: Option<ElementId>,
        top_level: bool,
    ) -> Result<ElementId, SchemaError> {
        check_sid(&def.sid)?;
        let (parent_path, parent_repeated) = match parent {
            Some(p) => {
                let parent = &self.elements[p.0];
                (parent.complete_path.as_str(), parent.can_be_repeated)
            }
            None => (self.sid.as_str(), false),
        };
        let complete_path = format!("{parent_path}.{}", def.sid);
        if self.by_path.contains_key(&complete_path) {
            return Err(SchemaError::DuplicatePath(complete_path));
        }

        let kind = if top_level || def.is_container() {
            if let Some(attribute) = def.simple_attribute_in_use() {
                return Err(SchemaError::ContainerAttribute {
                    path: complete_path,
                    attribute,
                });
            }
            if top_level {
                ElementKind::Paragraph
            } else {
                ElementKind::StructuredField
            }
        } else {
            ElementKind::SimpleField(SimpleField::compile(def, &complete_path)?)
        };

        let id = ElementId(self.elements.len());
        self.by_path.insert(complete_path.clone(), id);
        self.elements.push(Element {
            id,
            sid: def.sid.clone(),
            label: def.label.clone(),
            compliant: def.compliant,
            repeatable: def.repeatable,
            required_at_level: def.level,
            complete_path,
            parent,
            children: Vec::new(),
            can_be_repeated: def.repeatable || parent_repeated,
            kind,
        });

        let mut children = Vec::new();
        for child in def.fields.iter().flatten() {
            children.push(self.add_element(child, Some(id), false)?);
        }
        self.elements[id.0].children = children;
        Ok(id)
    }

    fn build_indices(&mut self) {
        for level in CatalogationLevel::STRICTEST_FIRST {
            self.required_per_level.insert(level, BTreeSet::new());
        }
        for element in &self.elements {
            if element.required_at_level != CatalogationLevel::None {
                self.required_per_level
                    .entry(element.required_at_level)
                    .or_default()
                    .insert(element.complete_path.clone());
            }
            if let ElementKind::SimpleField(field) = &element.kind {
                self.simple_fields.push(element.id);
                if field.media != MediaKind::None {
                    self.multimedia_fields.push(element.id);
                }
                if field.required_for_saving {
                    self.required_fields.push(element.id);
                }
            }
        }
    }

    /// Looks up an element by its complete path.
    pub fn element(&self, complete_path: &str) -> Option<&Element> {
        self.by_path.get(complete_path).map(|id| &self.elements[id.0])
    }

    /// Looks up an element by handle.
    pub fn get(&self, id: ElementId) -> &Element {
        &self.elements[id.0]
    }

    /// All elements in canonical order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter()
    }

    pub fn paragraphs(&self) -> impl Iterator<Item = &Element> {
        self.paragraphs.iter().map(|id| &self.elements[id.0])
    }

    pub fn children<'a>(&'a self, element: &'a Element) -> impl Iterator<Item = &'a Element> {
        element.children.iter().map(|id| &self.elements[id.0])
    }

    pub fn parent(&self, element: &Element) -> Option<&Element> {
        element.parent.map(|id| &self.elements[id.0])
    }

    /// Ancestors of `element`, nearest first, excluding the element itself.
    pub fn ancestors<'a>(&'a self, element: &'a Element) -> impl Iterator<Item = &'a Element> {
        std::iter::successors(self.parent(element), |e| self.parent(e))
    }

    /// Returns `true` if `path` is the document type sid itself.
    pub fn is_root(&self, path: &str) -> bool {
        path == self.sid
    }

    pub fn contains(&self, complete_path: &str) -> bool {
        self.by_path.contains_key(complete_path)
    }

    pub fn simple_field(&self, complete_path: &str) -> Option<&SimpleField> {
        self.element(complete_path)
            .and_then(Element::as_simple_field)
    }

    pub fn is_simple_field(&self, complete_path: &str) -> bool {
        self.simple_field(complete_path).is_some()
    }

    /// Simple fields in canonical order.
    pub fn simple_fields(&self) -> impl Iterator<Item = &Element> {
        self.simple_fields.iter().map(|id| &self.elements[id.0])
    }

    /// Simple fields that may carry multimedia attachments.
    pub fn multimedia_fields(&self) -> impl Iterator<Item = &Element> {
        self.multimedia_fields.iter().map(|id| &self.elements[id.0])
    }

    pub fn is_multimedia_field(&self, complete_path: &str) -> bool {
        self.simple_field(complete_path)
            .is_some_and(|f| f.media != MediaKind::None)
    }

    /// Simple fields that must be filled in for a document to be saved.
    pub fn required_fields(&self) -> impl Iterator<Item = &Element> {
        self.required_fields.iter().map(|id| &self.elements[id.0])
    }

    /// Paths required at exactly `level` (not cumulative).
    pub fn required_paths(&self, level: CatalogationLevel) -> Option<&BTreeSet<String>> {
        self.required_per_level.get(&level)
    }

    pub fn required_per_level(&self) -> &BTreeMap<CatalogationLevel, BTreeSet<String>> {
        &self.required_per_level
    }

    /// Position of `complete_path` in canonical order.
    pub fn canonical_index(&self, complete_path: &str) -> Option<usize> {
        self.by_path.get(complete_path).map(|id| id.0)
    }

    /// Resolves a sid or partial path to complete paths.
    ///
    /// A candidate matches if it equals `partial_path` or ends with
    /// `"." + partial_path`. The document type sid itself is a candidate too.
    /// With `must_be_unique`, anything but exactly one match is an error.
    ///
    /// # Errors
    ///
    /// [`PathError::ElementNotDefined`] when nothing matches and
    /// [`PathError::AmbiguousElementPath`] when several do (only with
    /// `must_be_unique`).
    pub fn resolve(&self, partial_path: &str, must_be_unique: bool) -> Result<Vec<String>, PathError> {
        let suffix = format!(".{partial_path}");
        let mut paths: Vec<String> = self
            .elements
            .iter()
            .map(|e| e.complete_path.as_str())
            .filter(|p| *p == partial_path || p.ends_with(&suffix))
            .map(String::from)
            .collect();
        if self.sid == partial_path {
            paths.push(self.sid.clone());
        }

        if must_be_unique {
            match paths.len() {
                0 => return Err(PathError::ElementNotDefined(partial_path.to_string())),
                1 => {}
                _ => {
                    return Err(PathError::AmbiguousElementPath {
                        path: partial_path.to_string(),
                        candidates: paths,
                    });
                }
            }
        }
        Ok(paths)
    }

    /// Resolves a partial path that must identify exactly one element.
    pub fn resolve_unique(&self, partial_path: &str) -> Result<String, PathError> {
        let mut paths = self.resolve(partial_path, true)?;
        Ok(paths.swap_remove(0))
    }

    /// Returns `true` if, in a document, `path` may immediately follow
    /// `prev_path`.
    ///
    /// Moving forward in canonical order is always allowed. Staying on the
    /// same element is allowed only for repeatable simple fields. Moving
    /// backwards is allowed only when a repetition starts: the element or one
    /// of its ancestors is repeatable and `prev_path` lies inside it.
    pub fn can_be_preceded(&self, path: &str, prev_path: &str) -> bool {
        let (Some(&index), Some(&prev_index)) =
            (self.by_path.get(path), self.by_path.get(prev_path))
        else {
            return false;
        };
        let element = &self.elements[index.0];

        if index > prev_index {
            return true;
        }
        if index == prev_index {
            return element.repeatable && !element.is_container();
        }

        std::iter::once(element)
            .chain(self.ancestors(element))
            .any(|e| {
                e.repeatable
                    && prev_path
                        .strip_prefix(e.complete_path.as_str())
                        .is_some_and(|rest| rest.starts_with('.'))
            })
    }
}
