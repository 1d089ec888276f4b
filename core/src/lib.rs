//! Schema model, documents and validation for hierarchical catalog records.
//!
//! This crate defines the foundational types shared by every catalog layer:
//!
//! - [`DocumentTypeDef`] / [`ElementDef`]: declarative, serializable
//!   definitions of a document type as an ordered tree of paragraphs,
//!   structured fields and simple fields.
//! - [`DocumentType`]: the immutable runtime schema built from a definition,
//!   with path resolution ([`DocumentType::resolve`]) and the structural order
//!   rule ([`DocumentType::can_be_preceded`]).
//! - [`Document`]: nested `(sid, value)` content plus provenance and media
//!   attachments.
//! - [`validate`]: document validation producing a [`ValidationResult`] and
//!   assigning the [`CatalogationLevel`].
//! - [`coerce`]: conversion of field text into a [`TypedValue`] under an
//!   explicit [`DecimalConvention`].
//! - [`DefinitionBundle`]: a versioned set of definitions for distribution.
//!
//! Nothing here performs I/O. Dictionary terms are obtained through the
//! [`DictionaryLookup`] trait implemented by storage layers.
//!
//! # Example
//!
//! ```
//! use catalog_core::*;
//!
//! let def = DocumentTypeDef::new("SI", "Sito archeologico").with_paragraph(
//!     ElementDef::paragraph("CD", "Codici")
//!         .required_at(CatalogationLevel::I)
//!         .with_field(
//!             ElementDef::simple("TSK", "Tipo scheda")
//!                 .with_length(4)
//!                 .with_dictionary(DictionaryMode::Closed)
//!                 .required_at(CatalogationLevel::I),
//!         ),
//! );
//! let schema = DocumentType::build(&def).unwrap();
//! let dictionary = StaticDictionary::default().with_terms("SI.CD.TSK", ["SI"]);
//!
//! let mut doc = Document::new("SI")
//!     .with_content(vec![ContentNode::group("CD", vec![ContentNode::text("TSK", "SI")])]);
//! let result = validate(&mut doc, &schema, &dictionary);
//!
//! assert!(result.can_be_saved);
//! assert_eq!(doc.catalogation_level, CatalogationLevel::I);
//! assert_eq!(schema.resolve("TSK", true).unwrap(), vec!["SI.CD.TSK"]);
//! ```

mod coerce;
mod document;
mod error;
mod package;
mod schema;
mod types;
mod validate;

pub use coerce::{Decimal, DecimalConvention, ParseDecimalError, TypedValue, coerce};
pub use document::{ContentNode, ContentValue, Document, FlatEntry, MediaAttachment};
pub use error::{PathError, SchemaError};
pub use package::DefinitionBundle;
pub use schema::{DocumentType, Element, ElementId, ElementKind, Pattern, SimpleField};
pub use types::*;
pub use validate::{
    DictionaryLookup, StaticDictionary, ValidationError, ValidationErrorKind, ValidationResult,
    validate,
};
