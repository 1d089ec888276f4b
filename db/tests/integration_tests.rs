//! Integration tests for catalog-db.
//!
//! These exercise the full loading workflow: definition directories and
//! bundles, the builder fallback chain, dictionary seeds and the YAML
//! configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use catalog_core::{CatalogationLevel, DictionaryMode, FieldType};
use catalog_db::{
    CatalogConfig, DictionaryConfig, DictionarySeed, DocumentTypeRegistry, RegistryError,
    RegistrySource, SchemaSources,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn fixture_schemas() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../schemas")
}

const RA_JSON: &str = r#"{
  "sid": "RA",
  "label": "Reperto archeologico",
  "paragraphs": [
    {
      "sid": "CD",
      "level": "I",
      "fields": [
        { "sid": "TSK", "length": 4, "dictionary": "closed", "level": "I" },
        { "sid": "NCT", "fields": [{ "sid": "NCTN", "field_type": "int32" }] }
      ]
    }
  ]
}"#;

const BUNDLE_YAML: &str = r#"
version: "2.00"
name: archaeology
document_types:
  - sid: SI
    paragraphs:
      - sid: CD
        fields:
          - sid: TSK
            dictionary: closed
  - sid: RA
    paragraphs:
      - sid: CD
        fields:
          - sid: TSK
"#;

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

// ---------------------------------------------------------------------------
// Directory loading
// ---------------------------------------------------------------------------

#[test]
fn test_load_fixture_directory() {
    let registry = DocumentTypeRegistry::from_dir(fixture_schemas()).unwrap();
    assert_eq!(registry.sids(), vec!["SI"]);

    let site = registry.get("SI").unwrap();
    assert_eq!(site.resolve_unique("NCTN").unwrap(), "SI.CD.NCT.NCTN");

    let nctn = site.simple_field("SI.CD.NCT.NCTN").unwrap();
    assert_eq!(nctn.field_type, FieldType::Int32);
    assert_eq!(
        site.simple_field("SI.CD.TSK").unwrap().dictionary,
        DictionaryMode::Closed
    );
    assert!(site
        .required_paths(CatalogationLevel::P)
        .unwrap()
        .contains("SI.MT"));
    assert_eq!(
        registry.source(),
        &RegistrySource::Directory(fixture_schemas())
    );
}

#[test]
fn test_mixed_formats_and_ignored_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::copy(fixture_schemas().join("SI.yaml"), dir.path().join("SI.yml")).unwrap();
    write(dir.path(), "RA.json", RA_JSON);
    write(dir.path(), "README.md", "# not a definition");
    fs::create_dir(dir.path().join("drafts")).unwrap();

    let registry = DocumentTypeRegistry::from_dir(dir.path()).unwrap();
    assert_eq!(registry.sids(), vec!["RA", "SI"]);
    assert_eq!(registry.document_type_sid_of("RA.CD.TSK"), Some("RA"));
    assert!(registry.element("RA.CD.NCT.NCTN").is_some());
    assert!(registry.element("SI.CD.NCT.NCTY").is_none());
}

#[test]
fn test_duplicate_sid_across_files() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.json", RA_JSON);
    write(dir.path(), "b.yaml", "sid: RA\n");

    let err = DocumentTypeRegistry::from_dir(dir.path()).unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateDocumentType(ref sid) if sid == "RA"));
}

#[test]
fn test_invalid_definition_names_document_type() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "bad.yaml",
        "sid: XX\nparagraphs:\n  - sid: CD\n    fields:\n      - sid: A\n        validation_pattern: \"[unclosed\"\n",
    );

    let err = DocumentTypeRegistry::from_dir(dir.path()).unwrap_err();
    match err {
        RegistryError::InvalidDefinition { sid, .. } => assert_eq!(sid, "XX"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_misspelled_attribute_reports_file() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "typo.yaml", "sid: XX\nlabell: oops\n");

    let err = DocumentTypeRegistry::from_dir(dir.path()).unwrap_err();
    assert!(matches!(err, RegistryError::YamlError { .. }));
    assert!(err.to_string().contains("typo.yaml"));
}

// ---------------------------------------------------------------------------
// Bundle loading
// ---------------------------------------------------------------------------

#[test]
fn test_load_yaml_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "catalog.yaml", BUNDLE_YAML);

    let registry = DocumentTypeRegistry::from_bundle(&path).unwrap();
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.sids(), vec!["RA", "SI"]);
    assert_eq!(registry.source(), &RegistrySource::Bundle(path));
}

#[test]
fn test_bundle_with_unsupported_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "catalog.toml", BUNDLE_YAML);

    let err = DocumentTypeRegistry::from_bundle(&path).unwrap_err();
    assert!(matches!(err, RegistryError::UnsupportedFormat(_)));
}

// ---------------------------------------------------------------------------
// Builder fallback chain
// ---------------------------------------------------------------------------

#[test]
fn test_builder_falls_back_to_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = write(dir.path(), "catalog.yaml", BUNDLE_YAML);
    let missing = dir.path().join("missing");

    let registry = DocumentTypeRegistry::builder()
        .from_dir(&missing)
        .from_bundle(&bundle)
        .build()
        .unwrap();

    assert_eq!(registry.len(), 2);
    match registry.source() {
        RegistrySource::Multiple { sources, loaded } => {
            assert_eq!(sources.len(), 2);
            assert_eq!(**loaded, RegistrySource::Bundle(bundle));
        }
        other => panic!("unexpected source: {other:?}"),
    }
}

#[test]
fn test_builder_first_source_wins() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = write(dir.path(), "catalog.yaml", BUNDLE_YAML);

    let registry = DocumentTypeRegistry::builder()
        .from_dir(fixture_schemas())
        .from_bundle(&bundle)
        .build()
        .unwrap();
    assert_eq!(registry.sids(), vec!["SI"]);
}

#[test]
fn test_builder_without_usable_source() {
    let dir = tempfile::tempdir().unwrap();
    let err = DocumentTypeRegistry::builder()
        .from_dir(dir.path().join("nope"))
        .from_bundle(dir.path().join("nope.yaml"))
        .build()
        .unwrap_err();
    assert!(matches!(err, RegistryError::NoSourcesAvailable));
}

// ---------------------------------------------------------------------------
// Dictionary seeds
// ---------------------------------------------------------------------------

#[test]
fn test_seed_against_fixture_registry() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "terms.yaml",
        r#"
SI.CD.TSK: [SI]
SI.CD.LIR: [I, P, C]
SI.OG.OGT.OGTD:
  - term: villa
    url: https://vocab.example.org/villa
  - necropoli
SI.OG.OGT.OGTT: [rustica]
RA.CD.TSK: [RA]
"#,
    );

    let registry = DocumentTypeRegistry::from_dir(fixture_schemas()).unwrap();
    let seeds = DictionarySeed::load_dir(dir.path()).unwrap();
    assert_eq!(seeds.len(), 1);

    let (_, seed) = &seeds[0];
    assert_eq!(seed.term_count(), 8);
    // OGTT has no dictionary and RA is not registered
    assert_eq!(
        seed.unknown_fields(&registry),
        vec!["RA.CD.TSK", "SI.OG.OGT.OGTT"]
    );

    let villa = seed
        .entries()
        .find(|(_, t)| t.term() == "villa")
        .map(|(_, t)| t.url());
    assert_eq!(villa, Some(Some("https://vocab.example.org/villa")));
}

// ---------------------------------------------------------------------------
// Configuration workflow
// ---------------------------------------------------------------------------

#[test]
fn test_config_save_load_build() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = write(dir.path(), "catalog.yaml", BUNDLE_YAML);
    let config_path = dir.path().join("catalog.yml");

    let config = CatalogConfig {
        schemas: SchemaSources {
            dirs: vec![dir.path().join("missing")],
            bundles: vec![bundle],
        },
        dictionary: Some(DictionaryConfig {
            path: dir.path().join("catalog.db"),
            prefix: "arch_".to_string(),
        }),
        ..CatalogConfig::default()
    };
    config.save(&config_path).unwrap();

    let loaded = CatalogConfig::load(&config_path).unwrap();
    assert_eq!(loaded, config);

    let registry = loaded.registry_builder().build().unwrap();
    assert!(registry.contains("RA"));
    assert!(registry.contains("SI"));
}

#[test]
fn test_config_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = CatalogConfig::load(dir.path().join("absent.yml")).unwrap_err();
    assert!(matches!(err, RegistryError::IoError(_)));
}
