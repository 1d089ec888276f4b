//! Catalog configuration.
//!
//! A YAML file telling tools where definitions and dictionaries live and how
//! queries and numbers are read. Every key is optional.
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1.0"
//! decimal_separator: comma
//! schemas:
//!   dirs: [schemas/]
//!   bundles: [catalog.yaml]
//! dictionary:
//!   path: catalog.db
//!   prefix: cat_
//! query:
//!   lenient_parsing: false
//!   allow_storage_only_metafields: true
//! ```

use std::io::BufWriter;
use std::path::{Path, PathBuf};

use catalog_core::DecimalConvention;
use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};
use crate::registry::{DocumentTypeRegistry, RegistryBuilder};

/// Where document type definitions are loaded from, in fallback order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaSources {
    pub dirs: Vec<PathBuf>,
    pub bundles: Vec<PathBuf>,
}

/// SQLite dictionary store location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryConfig {
    pub path: PathBuf,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_prefix() -> String {
    "cat_".to_string()
}

/// Query parsing and validation switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub lenient_parsing: bool,
    pub allow_storage_only_metafields: bool,
}

/// Top-level configuration.
///
/// # Examples
///
/// ```
/// use catalog_core::DecimalConvention;
/// use catalog_db::CatalogConfig;
///
/// let config: CatalogConfig = serde_yaml::from_str("decimal_separator: comma").unwrap();
/// assert_eq!(config.decimal_separator, DecimalConvention::Comma);
/// assert!(config.dictionary.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub version: String,
    /// Decimal separator assumed for fields that do not force `.`.
    pub decimal_separator: DecimalConvention,
    pub schemas: SchemaSources,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dictionary: Option<DictionaryConfig>,
    pub query: QueryConfig,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            decimal_separator: DecimalConvention::Point,
            schemas: SchemaSources::default(),
            dictionary: None,
            query: QueryConfig::default(),
        }
    }
}

impl CatalogConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::RegistryError::IoError) if the file cannot
    /// be read, or [`YamlError`](crate::RegistryError::YamlError) if parsing
    /// fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let yaml_error = |source| RegistryError::YamlError {
            path: path.to_path_buf(),
            source,
        };
        // An empty or comment-only document decodes to null, not a map.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: serde_yaml::Value = serde_yaml::from_str(&text).map_err(yaml_error)?;
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_yaml::from_value(value).map_err(yaml_error)
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(std::fs::File::create(path)?);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// A registry builder trying every configured directory, then every
    /// bundle.
    pub fn registry_builder(&self) -> RegistryBuilder {
        let builder = self
            .schemas
            .dirs
            .iter()
            .fold(DocumentTypeRegistry::builder(), |b, dir| b.from_dir(dir));
        self.schemas
            .bundles
            .iter()
            .fold(builder, |b, bundle| b.from_bundle(bundle))
    }
}
