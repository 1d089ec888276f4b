//! Loading of catalog definitions, dictionary seeds and configuration.
//!
//! This crate is the file-system side of the catalog: it decodes
//! [`DocumentTypeDef`](catalog_core::DocumentTypeDef) files (JSON or YAML),
//! builds them into a [`DocumentTypeRegistry`], reads dictionary
//! [`DictionarySeed`] files and the YAML [`CatalogConfig`].
//!
//! # Quick start
//!
//! ```no_run
//! use catalog_db::{CatalogConfig, DocumentTypeRegistry};
//!
//! // One definition per file
//! let registry = DocumentTypeRegistry::from_dir("schemas/").unwrap();
//! if let Some(site) = registry.get("SI") {
//!     println!("SI has {} elements", site.elements().count());
//! }
//!
//! // Sources listed in a configuration file, tried in order
//! let config = CatalogConfig::load("catalog.yml").unwrap();
//! let registry = config.registry_builder().build().unwrap();
//! ```

mod config;
mod error;
mod format;
mod registry;
mod seed;

pub use config::{CatalogConfig, DictionaryConfig, QueryConfig, SchemaSources};
pub use error::{RegistryError, Result};
pub use registry::{DocumentTypeRegistry, RegistryBuilder, RegistrySource};
pub use seed::{DictionarySeed, SeedTerm};
