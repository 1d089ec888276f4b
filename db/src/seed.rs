//! Dictionary seed files.
//!
//! A seed maps complete field paths to their controlled vocabulary. Terms are
//! plain strings or `{ term, url }` entries:
//!
//! ```yaml
//! SI.CD.TSK: [SI, RA]
//! SI.OG.OGTD:
//!   - term: villa
//!     url: https://vocab.example.org/villa
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use catalog_core::DictionaryMode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::format::{read_file, supported_files};
use crate::registry::DocumentTypeRegistry;

/// One vocabulary entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeedTerm {
    Plain(String),
    WithUrl {
        term: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
}

impl SeedTerm {
    pub fn term(&self) -> &str {
        match self {
            Self::Plain(term) | Self::WithUrl { term, .. } => term,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Plain(_) => None,
            Self::WithUrl { url, .. } => url.as_deref(),
        }
    }
}

/// Terms per complete field path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DictionarySeed {
    pub fields: BTreeMap<String, Vec<SeedTerm>>,
}

impl DictionarySeed {
    /// Reads a JSON or YAML seed file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let seed: Self = read_file(path)?;
        debug!(file = %path.display(), terms = seed.term_count(), "Read dictionary seed");
        Ok(seed)
    }

    /// Reads every seed file in `dir`, sorted by file name.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Vec<(PathBuf, Self)>> {
        supported_files(dir.as_ref())?
            .into_iter()
            .map(|file| Self::load(&file).map(|seed| (file, seed)))
            .collect()
    }

    pub fn term_count(&self) -> usize {
        self.fields.values().map(Vec::len).sum()
    }

    /// `(field_path, term)` pairs in path order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &SeedTerm)> {
        self.fields
            .iter()
            .flat_map(|(path, terms)| terms.iter().map(move |t| (path.as_str(), t)))
    }

    /// Field paths that are not dictionary-backed simple fields of a
    /// registered document type.
    pub fn unknown_fields<'a>(&'a self, registry: &DocumentTypeRegistry) -> Vec<&'a str> {
        self.fields
            .keys()
            .map(String::as_str)
            .filter(|path| {
                registry
                    .document_type_sid_of(path)
                    .and_then(|sid| registry.get(sid))
                    .and_then(|dt| dt.simple_field(path))
                    .is_none_or(|field| field.dictionary == DictionaryMode::None)
            })
            .collect()
    }
}
