//! Metafields: pseudo-fields addressed as `<path>._<name>`.
//!
//! [`METAFIELDS`] is the single table both the static validator and the
//! in-memory evaluator consult, so "what can be asked" and "what can be
//! answered" cannot drift apart. Storage-only metafields are rejected by the
//! validator unless explicitly allowed; a few of them, such as `_author_id`,
//! can still be answered from a draft that carries the value.

use serde::{Deserialize, Serialize};

use crate::ast::SearchExpression;

/// What a metafield may be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetafieldScope {
    /// Only the document type root, e.g. `SI._id`.
    DocumentType,
    /// Only schema elements, e.g. `NCTN._as_val`.
    Element,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metafield {
    Id,
    /// The field value in its declared type.
    AsValue,
    /// Number of occurrences of the element.
    Count,
    AttachmentCount,
    Points,
    Lines,
    Polygons,
    Area,
    Perimeter,
    InBox,
    InCircle,
    WithinPolygon,
    CreationDate,
    LastEditDate,
    Author,
    AuthorId,
    LastEditor,
    LastEditorId,
    Who,
    What,
    When,
    Where,
    FromWhere,
    PackageName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetafieldInfo {
    pub metafield: Metafield,
    /// Name as written in queries, with the leading underscore.
    pub name: &'static str,
    pub scope: MetafieldScope,
    /// Rejected on unsaved documents unless storage-only metafields are allowed.
    pub storage_only: bool,
    /// The in-memory evaluator can answer it from the document itself.
    pub in_memory: bool,
    /// Ordering comparators are accepted on the document type root.
    pub orderable_on_document: bool,
}

const fn info(
    metafield: Metafield,
    name: &'static str,
    scope: MetafieldScope,
    storage_only: bool,
    in_memory: bool,
    orderable_on_document: bool,
) -> MetafieldInfo {
    MetafieldInfo {
        metafield,
        name,
        scope,
        storage_only,
        in_memory,
        orderable_on_document,
    }
}

use MetafieldScope::{DocumentType as Doc, Element as El};

pub const METAFIELDS: &[MetafieldInfo] = &[
    info(Metafield::Id, "_id", Doc, true, false, true),
    info(Metafield::AsValue, "_as_val", El, false, true, false),
    info(Metafield::Count, "_count", El, false, true, false),
    info(Metafield::AttachmentCount, "_attachment_count", El, false, true, false),
    info(Metafield::Points, "_points", Doc, true, false, false),
    info(Metafield::Lines, "_lines", Doc, true, false, false),
    info(Metafield::Polygons, "_polygons", Doc, true, false, false),
    info(Metafield::Area, "_area", Doc, true, false, false),
    info(Metafield::Perimeter, "_perimeter", Doc, true, false, false),
    info(Metafield::InBox, "_in_box", Doc, true, false, false),
    info(Metafield::InCircle, "_in_circle", Doc, true, false, false),
    info(Metafield::WithinPolygon, "_within_polygon", Doc, true, false, false),
    info(Metafield::CreationDate, "_creation_date", Doc, true, false, true),
    info(Metafield::LastEditDate, "_last_edit_date", Doc, true, false, true),
    info(Metafield::Author, "_author", Doc, true, false, true),
    info(Metafield::AuthorId, "_author_id", Doc, true, true, true),
    info(Metafield::LastEditor, "_last_editor", Doc, true, false, true),
    info(Metafield::LastEditorId, "_last_editor_id", Doc, true, false, true),
    info(Metafield::Who, "_who", Doc, true, false, false),
    info(Metafield::What, "_what", Doc, true, false, false),
    info(Metafield::When, "_when", Doc, true, false, false),
    info(Metafield::Where, "_where", Doc, true, false, false),
    info(Metafield::FromWhere, "_from_where", Doc, true, false, false),
    info(Metafield::PackageName, "_package_name", Doc, false, true, true),
];

impl Metafield {
    /// Looks up a metafield by query name (`"_count"`).
    ///
    /// `_as_value` is accepted as a spelling of `_as_val`.
    pub fn from_name(name: &str) -> Option<Self> {
        if name == "_as_value" {
            return Some(Self::AsValue);
        }
        METAFIELDS
            .iter()
            .find(|i| i.name == name)
            .map(|i| i.metafield)
    }

    pub fn info(self) -> &'static MetafieldInfo {
        METAFIELDS
            .iter()
            .find(|i| i.metafield == self)
            .unwrap_or(&METAFIELDS[0])
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    pub fn scope(self) -> MetafieldScope {
        self.info().scope
    }

    pub fn is_storage_only(self) -> bool {
        self.info().storage_only
    }

    pub fn is_in_memory(self) -> bool {
        self.info().in_memory
    }
}

/// A field reference split into its element path and metafield name.
///
/// # Examples
///
/// ```
/// use catalog_query::FieldRef;
///
/// let r = FieldRef::parse("CD.NCT._count");
/// assert_eq!(r.path, "CD.NCT");
/// assert_eq!(r.metafield, Some("_count"));
///
/// assert_eq!(FieldRef::parse("NCTN").metafield, None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRef<'a> {
    pub path: &'a str,
    pub metafield: Option<&'a str>,
}

impl<'a> FieldRef<'a> {
    /// Splits at the first `"._"`.
    pub fn parse(field: &'a str) -> Self {
        match field.find("._") {
            Some(i) => Self {
                path: &field[..i],
                metafield: Some(&field[i + 1..]),
            },
            None => Self {
                path: field,
                metafield: None,
            },
        }
    }
}

impl SearchExpression {
    /// Names of the storage-only metafields used anywhere in the expression,
    /// in first-use order.
    pub fn storage_only_metafields(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        for field in self.field_refs() {
            if let Some(mf) = FieldRef::parse(field).metafield.and_then(Metafield::from_name)
                && mf.is_storage_only()
                && !names.contains(&mf.name())
            {
                names.push(mf.name());
            }
        }
        names
    }

    /// Returns `true` if only storage can answer this expression.
    pub fn is_storage_only(&self) -> bool {
        !self.storage_only_metafields().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names_are_unique_and_resolvable() {
        for entry in METAFIELDS {
            assert_eq!(Metafield::from_name(entry.name), Some(entry.metafield));
            assert_eq!(entry.metafield.info(), entry);
        }
        assert_eq!(Metafield::from_name("_as_value"), Some(Metafield::AsValue));
        assert_eq!(Metafield::from_name("_nope"), None);
    }

    #[test]
    fn test_in_memory_metafields() {
        let answerable: Vec<_> = METAFIELDS
            .iter()
            .filter(|i| i.in_memory)
            .map(|i| i.name)
            .collect();
        assert_eq!(
            answerable,
            vec!["_as_val", "_count", "_attachment_count", "_author_id", "_package_name"]
        );

        let unrestricted: Vec<_> = METAFIELDS
            .iter()
            .filter(|i| !i.storage_only)
            .map(|i| i.name)
            .collect();
        assert_eq!(
            unrestricted,
            vec!["_as_val", "_count", "_attachment_count", "_package_name"]
        );
        assert!(Metafield::AuthorId.is_storage_only());
        assert!(Metafield::AuthorId.is_in_memory());
    }

    #[test]
    fn test_field_ref_splits_at_first_metafield_marker() {
        let r = FieldRef::parse("SI._id._x");
        assert_eq!(r.path, "SI");
        assert_eq!(r.metafield, Some("_id._x"));
    }

    #[test]
    fn test_storage_only_detection() {
        let expr = SearchExpression::parse(
            r#"SELECT SI._id FROM SI WHERE NCTN._count > "1" AND SI._creation_date > "2020" ORDER_BY SI._id"#,
        )
        .unwrap();
        assert_eq!(expr.storage_only_metafields(), vec!["_id", "_creation_date"]);
        assert!(expr.is_storage_only());

        let draft = SearchExpression::parse(r#"SELECT * FROM SI WHERE NCTN._as_val = "2""#).unwrap();
        assert!(!draft.is_storage_only());
    }
}
