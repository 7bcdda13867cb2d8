// YAML catalog files: a declared field schema followed by entries as flat
// name -> value maps. Reading validates entries against the schema;
// writing emits only the values entries actually hold.

use crate::collection::Collection;
use crate::document::Importer;
use crate::entry::Entry;
use crate::error::{ColligoError, Result};
use crate::schema::Field;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk shape of a catalog file.
#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    title: String,
    fields: Vec<Field>,
    #[serde(default)]
    entries: Vec<BTreeMap<String, String>>,
}

/// Parse a catalog from YAML text.
pub fn read_collection(text: &str) -> Result<Collection> {
    let file: CatalogFile = serde_yaml::from_str(text)?;
    let mut coll = Collection::new(&file.title);
    coll.begin_batch();
    for field in file.fields {
        coll.add_field(field)?;
    }
    let mut entries = Vec::with_capacity(file.entries.len());
    for (index, values) in file.entries.into_iter().enumerate() {
        let mut entry = Entry::new(0);
        for (name, value) in values {
            if !coll.has_field(&name) {
                return Err(ColligoError::Import(format!(
                    "entry {index} uses undeclared field '{name}'"
                )));
            }
            entry.set_value(&name, &value);
        }
        entries.push(entry);
    }
    coll.add_entries(entries);
    coll.end_batch();
    Ok(coll)
}

/// Serialize a collection to YAML text.
pub fn write_collection(coll: &Collection) -> Result<String> {
    let file = CatalogFile {
        title: coll.title().to_string(),
        fields: coll.fields().to_vec(),
        entries: coll
            .entries()
            .map(|e| {
                e.values()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            })
            .collect(),
    };
    Ok(serde_yaml::to_string(&file)?)
}

/// File-backed catalog importer.
pub struct YamlImporter {
    path: PathBuf,
}

impl YamlImporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        YamlImporter { path: path.into() }
    }
}

impl Importer for YamlImporter {
    fn collection(&mut self) -> Result<Collection> {
        let text = fs::read_to_string(&self.path)?;
        read_collection(&text)
    }
}

/// Write a collection to a catalog file.
pub fn save_collection(coll: &Collection, path: &Path) -> Result<()> {
    let text = write_collection(coll)?;
    fs::write(path, text)?;
    log::info!("wrote {} entries to {}", coll.entry_count(), path.display());
    Ok(())
}
