//! Batch runner: formats every field of the selected records and persists the ones that
//! changed in a single store update.

use crate::error::{Error, Result};
use crate::registry::{Context, TransformerRegistry};
use crate::report::FieldReporter;
use crate::templates::TransformerConfig;
use std::fmt;

pub trait Record {
    /// Used in reports and errors.
    fn id(&self) -> String;
    fn type_name(&self) -> &str;
    /// Field names in the order the record type defines them.
    fn field_names(&self) -> Vec<String>;
    fn field(&self, name: &str) -> Option<&str>;
    fn set_field(&mut self, name: &str, value: String);
}

pub trait RecordStore {
    type Record: Record;

    fn selected(&mut self) -> Result<Vec<Self::Record>>;

    /// Called exactly once per successful run, with only the changed records.
    fn update(&mut self, changed: Vec<Self::Record>) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub processed: usize,
    pub updated: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.updated == 1 { "note" } else { "notes" };
        write!(f, "Updated {} {noun}!", self.updated)
    }
}

/// Formats `record` in place; returns whether any field changed. Every error is wrapped in
/// [`Error::Field`] with the record id and field name.
pub fn format_record<R: Record>(
    record: &mut R,
    config: &TransformerConfig,
    registry: &TransformerRegistry,
    ctx: &Context<'_>,
) -> Result<bool> {
    let id = record.id();
    let record_type = record.type_name().to_string();
    let mut changed = false;

    for field in record.field_names() {
        let in_field = |source: Error| Error::Field {
            record: id.clone(),
            field: field.clone(),
            source: Box::new(source),
        };
        let name = config
            .transformer_for(&record_type, &field)
            .map_err(in_field)?;
        let transformer = registry
            .get(name)
            .ok_or_else(|| Error::UnknownTransformer {
                name: name.to_string(),
                record_type: record_type.clone(),
                field: field.clone(),
            })
            .map_err(in_field)?;
        let original = record.field(&field).unwrap_or_default().to_string();

        let reporter = FieldReporter::new(ctx.reporter, &id, &field);
        let field_ctx = ctx.with_reporter(&reporter);
        let out = transformer(&original, &field_ctx).map_err(in_field)?;

        tracing::debug!(record = %id, field = %field, transformer = name, changed = out.changed);
        if out.changed {
            record.set_field(&field, out.value);
            changed = true;
        }
    }
    Ok(changed)
}

/// Any error leaves the store untouched.
pub fn run<S: RecordStore>(
    store: &mut S,
    config: &TransformerConfig,
    registry: &TransformerRegistry,
    ctx: &Context<'_>,
) -> Result<Summary> {
    let records = store.selected()?;
    let processed = records.len();

    let mut changed = Vec::new();
    for mut record in records {
        if format_record(&mut record, config, registry, ctx)? {
            changed.push(record);
        }
    }

    let summary = Summary {
        processed,
        updated: changed.len(),
    };
    store.update(changed)?;
    tracing::info!(processed, updated = summary.updated, "batch formatted");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_pluralizes() {
        let one = Summary {
            processed: 3,
            updated: 1,
        };
        assert_eq!(one.to_string(), "Updated 1 note!");
        assert_eq!(Summary::default().to_string(), "Updated 0 notes!");
        let many = Summary {
            processed: 9,
            updated: 7,
        };
        assert_eq!(many.to_string(), "Updated 7 notes!");
    }
}
