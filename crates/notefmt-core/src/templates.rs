//! Record-type descriptors: which transformer formats which field.
//!
//! A templates directory holds one sub-directory per record type, each with a `model.json`:
//!
//! ```json
//! { "name": "Cloze", "fields": [{ "name": "Text", "formatter": "html" }, { "name": "Extra" }] }
//! ```
//!
//! `formatter` defaults to `skip`.

use crate::error::{Error, Result};
use crate::registry::TransformerRegistry;
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

const MODEL_FILE: &str = "model.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeConfig {
    pub name: String,
    /// Field name -> transformer name, in field order.
    pub fields: IndexMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ModelFile {
    name: String,
    #[serde(default)]
    fields: Vec<ModelField>,
}

#[derive(Debug, Deserialize)]
struct ModelField {
    name: String,
    #[serde(default = "default_formatter")]
    formatter: String,
}

fn default_formatter() -> String {
    "skip".to_string()
}

/// Immutable for the duration of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformerConfig {
    types: IndexMap<String, TypeConfig>,
}

impl TransformerConfig {
    /// Checks every transformer name against `registry`.
    pub fn from_types(
        types: impl IntoIterator<Item = TypeConfig>,
        registry: &TransformerRegistry,
    ) -> Result<Self> {
        let mut config = Self::default();
        for ty in types {
            for (field, name) in &ty.fields {
                if !registry.contains(name) {
                    return Err(Error::UnknownTransformer {
                        name: name.clone(),
                        record_type: ty.name.clone(),
                        field: field.clone(),
                    });
                }
            }
            config.types.insert(ty.name.clone(), ty);
        }
        Ok(config)
    }

    /// Reads every `<dir>/<type>/model.json`, in sorted directory order. Later entries with
    /// the same type name replace earlier ones.
    pub fn load_dir(dir: &Path, registry: &TransformerRegistry) -> Result<Self> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| Error::Io { path, source }
        };

        let mut folders = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_err(dir))? {
            let entry = entry.map_err(io_err(dir))?;
            let path = entry.path();
            if !path.is_dir() || entry.file_name() == ".git" {
                continue;
            }
            folders.push(path);
        }
        folders.sort();

        let mut types = Vec::with_capacity(folders.len());
        for folder in folders {
            let path = folder.join(MODEL_FILE);
            let text = std::fs::read_to_string(&path).map_err(io_err(path.as_path()))?;
            let model: ModelFile =
                serde_json::from_str(&text).map_err(|source| Error::Json { path, source })?;
            tracing::debug!(record_type = %model.name, fields = model.fields.len(), "loaded model");
            types.push(TypeConfig {
                name: model.name,
                fields: model
                    .fields
                    .into_iter()
                    .map(|f| (f.name, f.formatter))
                    .collect(),
            });
        }
        Self::from_types(types, registry)
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeConfig> {
        self.types.values()
    }

    /// Exact match first, then the longest configured name that prefixes `record_type`.
    pub fn type_config(&self, record_type: &str) -> Result<&TypeConfig> {
        if let Some(ty) = self.types.get(record_type) {
            return Ok(ty);
        }
        self.types
            .values()
            .filter(|ty| record_type.starts_with(ty.name.as_str()))
            .max_by_key(|ty| ty.name.len())
            .ok_or_else(|| Error::MissingTypeConfig {
                record_type: record_type.to_string(),
            })
    }

    pub fn transformer_for(&self, record_type: &str, field: &str) -> Result<&str> {
        let ty = self.type_config(record_type)?;
        ty.fields
            .get(field)
            .map(String::as_str)
            .ok_or_else(|| Error::MissingFieldConfig {
                record_type: record_type.to_string(),
                field: field.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(name: &str, fields: &[(&str, &str)]) -> TypeConfig {
        TypeConfig {
            name: name.to_string(),
            fields: fields
                .iter()
                .map(|(f, t)| (f.to_string(), t.to_string()))
                .collect(),
        }
    }

    #[test]
    fn longest_prefix_wins() {
        let reg = TransformerRegistry::default_transformers();
        let config = TransformerConfig::from_types(
            [
                ty("Cloze", &[("Text", "html")]),
                ty("Cloze+", &[("Text", "plaintext")]),
            ],
            &reg,
        )
        .unwrap();
        assert_eq!(config.transformer_for("Cloze", "Text").unwrap(), "html");
        assert_eq!(config.transformer_for("Cloze+ (v2)", "Text").unwrap(), "plaintext");
        assert_eq!(config.transformer_for("Cloze-copy", "Text").unwrap(), "html");
        assert!(matches!(
            config.transformer_for("Basic", "Text"),
            Err(Error::MissingTypeConfig { .. })
        ));
        assert!(matches!(
            config.transformer_for("Cloze", "Back"),
            Err(Error::MissingFieldConfig { .. })
        ));
    }

    #[test]
    fn unknown_transformers_fail_validation() {
        let reg = TransformerRegistry::default_transformers();
        let err = TransformerConfig::from_types([ty("Basic", &[("Front", "markdown")])], &reg)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownTransformer { ref name, .. } if name == "markdown"));
    }
}
