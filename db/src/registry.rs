//! Document type registry with builder pattern and fallback chains.
//!
//! Provides [`DocumentTypeRegistry`] for lookup of built schemas by sid and
//! [`RegistryBuilder`] for trying several definition sources in order.
//!
//! # Loading patterns
//!
//! ```no_run
//! use catalog_db::DocumentTypeRegistry;
//!
//! // One definition per *.json / *.yaml / *.yml file
//! let registry = DocumentTypeRegistry::from_dir("schemas/").unwrap();
//! assert!(registry.get("SI").is_some());
//!
//! // A single DefinitionBundle file
//! let registry = DocumentTypeRegistry::from_bundle("catalog.yaml").unwrap();
//!
//! // First source that loads wins
//! let registry = DocumentTypeRegistry::builder()
//!     .from_dir("/etc/catalog/schemas/")
//!     .from_bundle("catalog.yaml")
//!     .build()
//!     .unwrap();
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use catalog_core::{DefinitionBundle, DocumentType, DocumentTypeDef, Element};
use tracing::{debug, info};

use crate::error::{RegistryError, Result};
use crate::format::{read_file, supported_files};

/// Describes where a [`DocumentTypeRegistry`] was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrySource {
    /// A directory with one definition per file.
    Directory(PathBuf),
    /// A single [`DefinitionBundle`] file.
    Bundle(PathBuf),
    /// Definitions handed over in memory.
    InMemory,
    /// A fallback chain; the first source that loaded is recorded.
    Multiple {
        sources: Vec<RegistrySource>,
        loaded: Box<RegistrySource>,
    },
}

/// Built document types indexed by sid.
///
/// Schemas are immutable once built, so a registry can be shared freely
/// between threads.
#[derive(Debug)]
pub struct DocumentTypeRegistry {
    document_types: HashMap<String, DocumentType>,
    source: RegistrySource,
}

impl DocumentTypeRegistry {
    /// Returns a new [`RegistryBuilder`] for configuring a fallback chain.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Builds every definition and indexes it by sid.
    ///
    /// # Errors
    ///
    /// Fails on the first definition that does not build, or when two
    /// definitions share a sid.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = DocumentTypeDef>,
    ) -> Result<Self> {
        let mut registry = Self {
            document_types: HashMap::new(),
            source: RegistrySource::InMemory,
        };
        for def in definitions {
            registry.insert_definition(&def)?;
        }
        Ok(registry)
    }

    /// Loads one [`DocumentTypeDef`] from each `*.json`, `*.yaml` or `*.yml`
    /// file in `path`. Other files and subdirectories are ignored.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be read, a file does not decode, a
    /// definition does not build, or a sid appears twice.
    pub fn from_dir(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut definitions = Vec::new();
        for file in supported_files(path)? {
            let def: DocumentTypeDef = read_file(&file)?;
            debug!(file = %file.display(), sid = %def.sid, "Read definition");
            definitions.push(def);
        }

        let mut registry = Self::from_definitions(definitions)?;
        registry.source = RegistrySource::Directory(path.to_path_buf());
        info!(dir = %path.display(), document_types = registry.len(), "Loaded registry");
        Ok(registry)
    }

    /// Loads every definition of a [`DefinitionBundle`] file (JSON or YAML).
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or decoded, a definition does not
    /// build, or a sid appears twice.
    pub fn from_bundle(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bundle: DefinitionBundle = read_file(path)?;
        let mut registry = Self::from_definitions(bundle.document_types)?;
        registry.source = RegistrySource::Bundle(path.to_path_buf());
        info!(
            bundle = %path.display(),
            version = %bundle.version,
            document_types = registry.len(),
            "Loaded registry"
        );
        Ok(registry)
    }

    fn insert_definition(&mut self, def: &DocumentTypeDef) -> Result<()> {
        if self.document_types.contains_key(&def.sid) {
            return Err(RegistryError::DuplicateDocumentType(def.sid.clone()));
        }
        let schema =
            DocumentType::build(def).map_err(|source| RegistryError::InvalidDefinition {
                sid: def.sid.clone(),
                source,
            })?;
        self.document_types.insert(def.sid.clone(), schema);
        Ok(())
    }

    /// Adds a built document type, replacing any previous one with the same
    /// sid.
    pub fn insert(&mut self, document_type: DocumentType) {
        self.document_types
            .insert(document_type.sid.clone(), document_type);
    }

    pub fn get(&self, sid: &str) -> Option<&DocumentType> {
        self.document_types.get(sid)
    }

    pub fn contains(&self, sid: &str) -> bool {
        self.document_types.contains_key(sid)
    }

    /// Sid of the document type a complete path belongs to, if registered.
    ///
    /// # Examples
    ///
    /// ```
    /// use catalog_core::{DocumentTypeDef, ElementDef};
    /// use catalog_db::DocumentTypeRegistry;
    ///
    /// let registry = DocumentTypeRegistry::from_definitions([DocumentTypeDef::new("SI", "")
    ///     .with_paragraph(ElementDef::paragraph("CD", "").with_field(ElementDef::simple("TSK", "")))])
    /// .unwrap();
    /// assert_eq!(registry.document_type_sid_of("SI.CD.TSK"), Some("SI"));
    /// assert_eq!(registry.document_type_sid_of("RA.CD"), None);
    /// ```
    pub fn document_type_sid_of(&self, complete_path: &str) -> Option<&str> {
        let sid = complete_path.split('.').next()?;
        self.document_types
            .get_key_value(sid)
            .map(|(key, _)| key.as_str())
    }

    /// Looks up an element of any registered document type by complete path.
    pub fn element(&self, complete_path: &str) -> Option<&Element> {
        let sid = self.document_type_sid_of(complete_path)?;
        self.document_types.get(sid)?.element(complete_path)
    }

    pub fn len(&self) -> usize {
        self.document_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.document_types.is_empty()
    }

    /// Registered sids, sorted.
    pub fn sids(&self) -> Vec<&str> {
        let mut sids: Vec<&str> = self.document_types.keys().map(String::as_str).collect();
        sids.sort_unstable();
        sids
    }

    /// Registered document types, sorted by sid.
    pub fn iter(&self) -> impl Iterator<Item = &DocumentType> {
        self.sids()
            .into_iter()
            .filter_map(|sid| self.document_types.get(sid))
    }

    pub fn source(&self) -> &RegistrySource {
        &self.source
    }
}

/// Builder for constructing a [`DocumentTypeRegistry`] with a fallback chain.
///
/// Sources are tried in the order they are added. The first successful load
/// wins; if all fail, [`RegistryError::NoSourcesAvailable`] is returned.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    sources: Vec<RegistrySource>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a directory of definition files as a source.
    pub fn from_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(RegistrySource::Directory(path.into()));
        self
    }

    /// Adds a [`DefinitionBundle`] file as a source.
    pub fn from_bundle(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(RegistrySource::Bundle(path.into()));
        self
    }

    /// Attempts to load from the configured sources in order.
    pub fn build(self) -> Result<DocumentTypeRegistry> {
        for source in &self.sources {
            let result = match source {
                RegistrySource::Directory(path) => DocumentTypeRegistry::from_dir(path),
                RegistrySource::Bundle(path) => DocumentTypeRegistry::from_bundle(path),
                RegistrySource::InMemory | RegistrySource::Multiple { .. } => continue,
            };

            match result {
                Ok(mut registry) => {
                    registry.source = RegistrySource::Multiple {
                        sources: self.sources.clone(),
                        loaded: Box::new(source.clone()),
                    };
                    return Ok(registry);
                }
                Err(err) => debug!(source = ?source, error = %err, "Registry source failed"),
            }
        }

        Err(RegistryError::NoSourcesAvailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::ElementDef;

    fn definition(sid: &str) -> DocumentTypeDef {
        DocumentTypeDef::new(sid, "").with_paragraph(
            ElementDef::paragraph("CD", "").with_field(ElementDef::simple("TSK", "")),
        )
    }

    fn write_json(dir: &Path, def: &DocumentTypeDef) {
        let file = std::fs::File::create(dir.join(format!("{}.json", def.sid))).unwrap();
        serde_json::to_writer_pretty(file, def).unwrap();
    }

    fn write_yaml(dir: &Path, def: &DocumentTypeDef) {
        let file = std::fs::File::create(dir.join(format!("{}.yaml", def.sid))).unwrap();
        serde_yaml::to_writer(file, def).unwrap();
    }

    #[test]
    fn test_from_dir_mixed_formats() {
        let dir = tempfile::tempdir().unwrap();
        write_json(dir.path(), &definition("SI"));
        write_yaml(dir.path(), &definition("RA"));
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let registry = DocumentTypeRegistry::from_dir(dir.path()).unwrap();
        assert_eq!(registry.sids(), vec!["RA", "SI"]);
        assert_eq!(
            registry.source(),
            &RegistrySource::Directory(dir.path().to_path_buf())
        );
    }

    #[test]
    fn test_duplicate_sid_rejected() {
        let result = DocumentTypeRegistry::from_definitions([definition("SI"), definition("SI")]);
        assert!(matches!(result, Err(RegistryError::DuplicateDocumentType(sid)) if sid == "SI"));
    }

    #[test]
    fn test_invalid_definition_names_sid() {
        let bad = DocumentTypeDef::new("SI", "").with_paragraph(
            ElementDef::paragraph("CD", "").with_field(
                ElementDef::simple("TSK", "").with_validation_pattern("(unclosed"),
            ),
        );
        let err = DocumentTypeRegistry::from_definitions([bad]).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidDefinition { ref sid, .. } if sid == "SI"));
    }

    #[test]
    fn test_lookups() {
        let registry = DocumentTypeRegistry::from_definitions([definition("SI")]).unwrap();
        assert!(registry.contains("SI"));
        assert_eq!(registry.element("SI.CD.TSK").unwrap().sid, "TSK");
        assert!(registry.element("SI.CD.XXX").is_none());
        assert!(registry.element("RA.CD.TSK").is_none());
        assert_eq!(registry.document_type_sid_of("SI"), Some("SI"));
        assert_eq!(registry.iter().count(), 1);
    }

    #[test]
    fn test_builder_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let bundle_path = dir.path().join("bundle.json");
        let mut bundle = DefinitionBundle::new("1.0");
        bundle.document_types.push(definition("RA"));
        std::fs::write(&bundle_path, serde_json::to_string(&bundle).unwrap()).unwrap();

        let registry = DocumentTypeRegistry::builder()
            .from_dir("/nonexistent/catalog/schemas")
            .from_bundle(&bundle_path)
            .build()
            .unwrap();
        assert!(registry.contains("RA"));
        match registry.source() {
            RegistrySource::Multiple { sources, loaded } => {
                assert_eq!(sources.len(), 2);
                assert_eq!(**loaded, RegistrySource::Bundle(bundle_path.clone()));
            }
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn test_builder_all_fail() {
        let result = DocumentTypeRegistry::builder()
            .from_dir("/nonexistent/dir1/")
            .from_bundle("/nonexistent/bundle1.json")
            .build();
        assert!(matches!(result, Err(RegistryError::NoSourcesAvailable)));
        assert!(DocumentTypeRegistry::builder().build().is_err());
    }
}
