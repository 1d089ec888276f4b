//! JSON/YAML decoding chosen by file extension.

use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::error::{RegistryError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileFormat {
    Json,
    Yaml,
}

impl FileFormat {
    pub(crate) fn of(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Some(Self::Json),
            Some("yaml" | "yml") => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// Decodes `path` as JSON or YAML according to its extension.
pub(crate) fn read_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let format =
        FileFormat::of(path).ok_or_else(|| RegistryError::UnsupportedFormat(path.to_path_buf()))?;
    let reader = BufReader::new(std::fs::File::open(path)?);
    match format {
        FileFormat::Json => serde_json::from_reader(reader).map_err(|source| RegistryError::JsonError {
            path: path.to_path_buf(),
            source,
        }),
        FileFormat::Yaml => serde_yaml::from_reader(reader).map_err(|source| RegistryError::YamlError {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Supported files directly inside `dir`, sorted by name.
pub(crate) fn supported_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && FileFormat::of(&path).is_some() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
