use std::fs;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::{Lazy, OnceCell};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{ExtractError, Result};

const BUILTIN_DICTIONARY: &str = include_str!("../../../assets/schema_dictionary.toml");

static BUILTIN: Lazy<Arc<SchemaDictionary>> = Lazy::new(|| {
    Arc::new(
        SchemaDictionary::from_toml_str(BUILTIN_DICTIONARY)
            .expect("embedded schema dictionary is valid"),
    )
});

static GLOBAL: OnceCell<Arc<SchemaDictionary>> = OnceCell::new();

#[derive(Debug, Deserialize)]
struct DictionaryFile {
    #[serde(default)]
    entry: Vec<DictionaryEntry>,
}

#[derive(Debug, Deserialize)]
struct DictionaryEntry {
    synonym: String,
    field: String,
}

/// Immutable synonym → canonical field mapping.
///
/// Entry order is significant: it is the tie-break for fuzzy header matching,
/// so the dictionary keeps the order of its source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDictionary {
    entries: IndexMap<String, String>,
}

impl SchemaDictionary {
    /// The dictionary shipped with the crate
    pub fn builtin() -> Arc<SchemaDictionary> {
        BUILTIN.clone()
    }

    pub fn from_entries<I, S, F>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, F)>,
        S: Into<String>,
        F: Into<String>,
    {
        let mut map = IndexMap::new();
        for (synonym, field) in entries {
            let synonym = synonym.into().trim().to_string();
            if synonym.is_empty() {
                continue;
            }
            // First definition of a synonym wins, keeping its original position
            map.entry(synonym).or_insert_with(|| field.into());
        }
        Self { entries: map }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: DictionaryFile = toml::from_str(content)?;
        if file.entry.is_empty() {
            return Err(ExtractError::Config(
                "schema dictionary has no entries".to_string(),
            ));
        }
        Ok(Self::from_entries(
            file.entry.into_iter().map(|e| (e.synonym, e.field)),
        ))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ExtractError::Config(format!(
                "Failed to read schema dictionary '{}': {}",
                path.display(),
                e
            ))
        })?;
        let dictionary = Self::from_toml_str(&content)?;
        info!(
            "Loaded schema dictionary from {} entries={}",
            path.display(),
            dictionary.len()
        );
        Ok(dictionary)
    }

    /// Install the process-wide dictionary. Only the first install takes effect.
    pub fn install_global(dictionary: SchemaDictionary) -> Result<Arc<SchemaDictionary>> {
        let shared = Arc::new(dictionary);
        GLOBAL
            .set(shared.clone())
            .map_err(|_| ExtractError::Config("schema dictionary already installed".to_string()))?;
        debug!("Installed global schema dictionary entries={}", shared.len());
        Ok(shared)
    }

    /// The process-wide dictionary, falling back to the built-in one
    pub fn global() -> Arc<SchemaDictionary> {
        GLOBAL.get_or_init(Self::builtin).clone()
    }

    pub fn lookup(&self, synonym: &str) -> Option<&str> {
        self.entries.get(synonym).map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(s, f)| (s.as_str(), f.as_str()))
    }

    pub fn synonyms(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
