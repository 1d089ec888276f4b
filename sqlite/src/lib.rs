//! SQLite storage for catalog dictionaries.
//!
//! Controlled vocabularies of dictionary-backed fields live in one table,
//! `{prefix}terms`. This crate creates and seeds that table and exposes it
//! as a [`DictionaryLookup`](catalog_core::DictionaryLookup) for document
//! validation.
//!
//! # Architecture
//!
//! - **`schema`** - SQL generation with customizable table prefixes
//! - **`migration`** - Lifecycle operations (up/down/seed/refresh/status)
//! - **`terms`** - Term maintenance and lookup
//!
//! # Quick start
//!
//! ```no_run
//! use catalog_core::{Document, DocumentType, validate};
//! use catalog_sqlite::{Migration, TermStore};
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("catalog.db").unwrap();
//! let mut migration = Migration::new(conn, "cat_").unwrap();
//! migration.up().unwrap();
//! migration.seed("dictionaries/").unwrap();
//!
//! let store = TermStore::new(migration.connection(), "cat_").unwrap();
//! # let schema: DocumentType = todo!();
//! # let mut document: Document = todo!();
//! let result = validate(&mut document, &schema, &store);
//! ```
//!
//! # Table prefix customization
//!
//! Table and index names are prefixed with a configurable string, so several
//! isolated dictionary sets can share one database. Prefixes must contain
//! only alphanumeric characters and underscores.

mod error;
mod migration;
mod schema;
mod terms;

pub use error::{Result, SqliteError};
pub use migration::{Migration, MigrationStatus, SeedReport};
pub use schema::{generate_drop_sql, generate_schema_sql};
pub use terms::{TermEntry, TermStore};
