//! JSON-file record store:
//! `{ "records": [{ "id": ..., "type": "...", "fields": [{ "name": "...", "value": "..." }] }] }`.
//!
//! Unknown keys are carried through unchanged.

use notefmt_core::{Error, Record, RecordStore, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub id: Value,
    #[serde(rename = "type")]
    pub record_type: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    /// Position in the file.
    #[serde(skip)]
    index: usize,
}

impl Record for CollectionRecord {
    fn id(&self) -> String {
        match &self.id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn type_name(&self) -> &str {
        &self.record_type
    }

    fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    fn set_field(&mut self, name: &str, value: String) {
        if let Some(field) = self.fields.iter_mut().find(|f| f.name == name) {
            field.value = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Collection {
    records: Vec<CollectionRecord>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug)]
pub struct JsonCollection {
    path: PathBuf,
    collection: Collection,
    dry_run: bool,
}

impl JsonCollection {
    pub fn open(path: &Path, dry_run: bool) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut collection: Collection =
            serde_json::from_str(&text).map_err(|source| Error::Json {
                path: path.to_path_buf(),
                source,
            })?;
        for (index, record) in collection.records.iter_mut().enumerate() {
            record.index = index;
        }
        Ok(Self {
            path: path.to_path_buf(),
            collection,
            dry_run,
        })
    }

    fn save(&self) -> Result<()> {
        let mut text = serde_json::to_string_pretty(&self.collection).map_err(|source| {
            Error::Json {
                path: self.path.clone(),
                source,
            }
        })?;
        text.push('\n');
        std::fs::write(&self.path, text).map_err(|source| Error::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl RecordStore for JsonCollection {
    type Record = CollectionRecord;

    fn selected(&mut self) -> Result<Vec<CollectionRecord>> {
        Ok(self.collection.records.clone())
    }

    fn update(&mut self, changed: Vec<CollectionRecord>) -> Result<()> {
        if changed.is_empty() {
            return Ok(());
        }
        for record in changed {
            let Some(slot) = self.collection.records.get_mut(record.index) else {
                return Err(Error::Store {
                    message: format!("record {} is not part of the collection", record.id()),
                });
            };
            *slot = record;
        }
        if self.dry_run {
            tracing::info!(path = %self.path.display(), "dry run, collection not written");
            return Ok(());
        }
        self.save()
    }
}
