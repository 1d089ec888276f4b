use serde::{Deserialize, Serialize};

use crate::DocumentTypeDef;

/// Serializable bundle of document type definitions.
///
/// A bundle groups several [`DocumentTypeDef`] values with version metadata
/// so that a whole catalog configuration can be shipped as one JSON or YAML
/// file.
///
/// # Examples
///
/// ```
/// use catalog_core::*;
///
/// let mut bundle = DefinitionBundle::new("2.00");
/// bundle.name = Some("archaeology".into());
/// bundle.document_types.push(DocumentTypeDef::new("SI", "Sito archeologico"));
/// bundle.document_types.push(DocumentTypeDef::new("RA", "Reperto archeologico"));
///
/// assert_eq!(bundle.document_type_count(), 2);
/// assert_eq!(bundle.format_version.as_deref(), Some(DEFINITION_FORMAT_VERSION));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionBundle {
    /// Definition format version (populated from
    /// [`DEFINITION_FORMAT_VERSION`](crate::DEFINITION_FORMAT_VERSION)).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_version: Option<String>,
    /// Bundle version.
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub document_types: Vec<DocumentTypeDef>,
}

impl DefinitionBundle {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            format_version: Some(crate::DEFINITION_FORMAT_VERSION.to_string()),
            version: version.into(),
            name: None,
            description: None,
            document_types: Vec::new(),
        }
    }

    pub fn document_type_count(&self) -> usize {
        self.document_types.len()
    }
}
