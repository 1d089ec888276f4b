//! Document instances: nested content conforming to a document type.
//!
//! Content is an ordered list of `(sid, value)` pairs where the value is a
//! text leaf or another ordered list. On the wire each pair is a two-element
//! JSON array:
//!
//! ```json
//! [["CD", [["TSK", "SI"], ["NCT", [["NCTN", "00000001"]]]]]]
//! ```
//!
//! # Examples
//!
//! ```
//! use catalog_core::*;
//!
//! let doc = Document::new("SI").with_content(vec![ContentNode::group(
//!     "CD",
//!     vec![
//!         ContentNode::text("TSK", "SI"),
//!         ContentNode::group("NCT", vec![ContentNode::text("NCTN", "00000001")]),
//!     ],
//! )]);
//!
//! assert_eq!(doc.text_contents("SI.CD.NCT.NCTN"), vec!["00000001"]);
//! let paths: Vec<_> = doc.flatten().into_iter().map(|e| e.path).collect();
//! assert_eq!(paths, vec!["SI.CD", "SI.CD.TSK", "SI.CD.NCT", "SI.CD.NCT.NCTN"]);
//! ```

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coerce::{DecimalConvention, TypedValue, coerce};
use crate::error::PathError;
use crate::schema::DocumentType;
use crate::types::CatalogationLevel;

/// Value of a content node: a text leaf or nested nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentValue {
    Text(String),
    Group(Vec<ContentNode>),
}

impl ContentValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&[ContentNode]> {
        match self {
            Self::Group(nodes) => Some(nodes),
            Self::Text(_) => None,
        }
    }

    /// `true` for an empty text or a group without children.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Group(nodes) => nodes.is_empty(),
        }
    }
}

/// One `(sid, value)` pair of document content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentNode(pub String, pub ContentValue);

impl ContentNode {
    pub fn text(sid: &str, value: &str) -> Self {
        Self(sid.to_string(), ContentValue::Text(value.to_string()))
    }

    pub fn group(sid: &str, children: Vec<ContentNode>) -> Self {
        Self(sid.to_string(), ContentValue::Group(children))
    }

    pub fn sid(&self) -> &str {
        &self.0
    }

    pub fn value(&self) -> &ContentValue {
        &self.1
    }
}

/// A multimedia file bound to one value of a simple field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttachment {
    /// Complete path of the field the file belongs to.
    pub field_path: String,
    /// The field value the file is attached to.
    pub value: String,
    pub file_name: String,
}

/// One entry of a flattened document.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatEntry<'a> {
    pub path: String,
    pub sid: &'a str,
    pub value: &'a ContentValue,
}

/// A catalog record of one document type.
///
/// Identity and provenance fields are carried through unchanged; only
/// [`catalogation_level`](Self::catalogation_level) is rewritten, by
/// [`validate`](crate::validate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    /// Sid of the document type, root of every content path.
    pub document_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub package_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_edit_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_editor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_editor_name: Option<String>,
    #[serde(default)]
    pub catalogation_level: CatalogationLevel,
    #[serde(default)]
    pub media_files: Vec<MediaAttachment>,
    #[serde(default)]
    pub content: Vec<ContentNode>,
}

impl Document {
    /// Creates an empty document of the given type.
    pub fn new(document_type: &str) -> Self {
        Self {
            document_type: document_type.to_string(),
            ..Self::default()
        }
    }

    pub fn with_content(mut self, content: Vec<ContentNode>) -> Self {
        self.content = content;
        self
    }

    pub fn with_attachment(mut self, field_path: &str, value: &str, file_name: &str) -> Self {
        self.media_files.push(MediaAttachment {
            field_path: field_path.to_string(),
            value: value.to_string(),
            file_name: file_name.to_string(),
        });
        self
    }

    /// Decodes a full record (metadata, media and content).
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Encodes the full record.
    pub fn to_json(&self, compact: bool) -> Result<String, serde_json::Error> {
        if compact {
            serde_json::to_string(self)
        } else {
            serde_json::to_string_pretty(self)
        }
    }

    /// Replaces the content with the decoded nested pairs.
    pub fn set_content_json(&mut self, json: &str) -> Result<(), serde_json::Error> {
        self.content = serde_json::from_str(json)?;
        Ok(())
    }

    /// Encodes the content only.
    pub fn content_json(&self, compact: bool) -> Result<String, serde_json::Error> {
        if compact {
            serde_json::to_string(&self.content)
        } else {
            serde_json::to_string_pretty(&self.content)
        }
    }

    /// Depth-first view of the content.
    ///
    /// Groups are emitted before their children; leaves are emitted once.
    pub fn flatten(&self) -> Vec<FlatEntry<'_>> {
        let mut entries = Vec::new();
        flatten_into(&self.content, &self.document_type, &mut entries);
        entries
    }

    /// Distinct complete paths present in the content.
    pub fn present_paths(&self) -> BTreeSet<String> {
        self.flatten().into_iter().map(|e| e.path).collect()
    }

    /// All values found at `complete_path`, in document order.
    ///
    /// Repeated elements, and elements below repeated containers, yield one
    /// value per occurrence. The document type root and paths of other
    /// document types yield nothing.
    pub fn contents_at(&self, complete_path: &str) -> Vec<&ContentValue> {
        let mut segments = complete_path.split('.');
        if segments.next() != Some(self.document_type.as_str()) {
            return Vec::new();
        }
        let segments: Vec<&str> = segments.collect();
        let Some((last, intermediate)) = segments.split_last() else {
            return Vec::new();
        };

        let mut level: Vec<&[ContentNode]> = vec![&self.content];
        for sid in intermediate {
            level = level
                .iter()
                .flat_map(|nodes| nodes.iter())
                .filter(|node| node.sid() == *sid)
                .filter_map(|node| node.value().as_group())
                .collect();
        }
        level
            .iter()
            .flat_map(|nodes| nodes.iter())
            .filter(|node| node.sid() == *last)
            .map(ContentNode::value)
            .collect()
    }

    /// Like [`contents_at`](Self::contents_at), resolving a partial path
    /// through the schema first.
    ///
    /// # Errors
    ///
    /// Fails if `partial_path` does not resolve to exactly one element.
    pub fn contents(
        &self,
        schema: &DocumentType,
        partial_path: &str,
    ) -> Result<Vec<&ContentValue>, PathError> {
        let path = schema.resolve_unique(partial_path)?;
        Ok(self.contents_at(&path))
    }

    /// Text values found at `complete_path`.
    pub fn text_contents(&self, complete_path: &str) -> Vec<&str> {
        self.contents_at(complete_path)
            .into_iter()
            .filter_map(ContentValue::as_text)
            .collect()
    }

    /// Values at a simple-field path converted to the field's type.
    ///
    /// When the field has an extraction pattern, only its first match in each
    /// value is converted and values without a match are skipped. Values that
    /// fail conversion are dropped.
    pub fn contents_as_values(
        &self,
        schema: &DocumentType,
        complete_path: &str,
        convention: DecimalConvention,
    ) -> Vec<TypedValue> {
        let Some(field) = schema.simple_field(complete_path) else {
            return Vec::new();
        };
        self.text_contents(complete_path)
            .into_iter()
            .filter_map(|text| match &field.extraction_pattern {
                Some(pattern) => pattern.find(text),
                None => Some(text),
            })
            .filter_map(|text| coerce(text, field, convention))
            .collect()
    }

    /// Attachments bound to the field at `field_path`.
    pub fn attachments_for<'a>(
        &'a self,
        field_path: &'a str,
    ) -> impl Iterator<Item = &'a MediaAttachment> {
        self.media_files
            .iter()
            .filter(move |m| m.field_path == field_path)
    }
}

fn flatten_into<'a>(nodes: &'a [ContentNode], parent_path: &str, out: &mut Vec<FlatEntry<'a>>) {
    for node in nodes {
        let path = format!("{parent_path}.{}", node.sid());
        out.push(FlatEntry {
            path: path.clone(),
            sid: node.sid(),
            value: node.value(),
        });
        if let ContentValue::Group(children) = node.value() {
            flatten_into(children, &path, out);
        }
    }
}
