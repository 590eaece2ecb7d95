//! Main table schema resolution and insert projections

use crate::error::{IngestError, IngestResult};
use crate::ingest_mode::{DigestGenStrategy, IngestMode};
use crate::models::{DataType, DatasetDefinition, Field, SchemaDefinition, StagingDataset, Value};

use super::PlanContext;

/// Columns the plan itself populates, in the order they follow staging columns
pub(crate) fn generated_fields(mode: &IngestMode) -> Vec<Field> {
    let audit = |field: Option<&str>| field.map(|name| Field::new(name, DataType::Datetime));
    let mut fields = Vec::new();
    match mode {
        IngestMode::AppendOnly(mode) => {
            fields.extend(
                mode.batch_id_field
                    .as_deref()
                    .map(|name| Field::new(name, DataType::Int)),
            );
            fields.extend(audit(mode.auditing.audit_field()));
        }
        IngestMode::NontemporalSnapshot(mode) => fields.extend(audit(mode.auditing.audit_field())),
        IngestMode::NontemporalDelta(mode) => fields.extend(audit(mode.auditing.audit_field())),
        IngestMode::UnitemporalSnapshot(mode) => {
            fields.extend(milestoning_fields(&mode.transaction_milestoning))
        }
        IngestMode::UnitemporalDelta(mode) => {
            fields.extend(milestoning_fields(&mode.transaction_milestoning))
        }
        IngestMode::BulkLoad(mode) => {
            if let DigestGenStrategy::UdfBased { digest_field, .. } = &mode.digest_gen_strategy {
                fields.push(Field::new(digest_field, DataType::String));
            }
            fields.push(Field::new(&mode.batch_id_field, DataType::Int));
            fields.extend(audit(mode.auditing.audit_field()));
        }
    }
    fields
}

fn milestoning_fields(milestoning: &crate::ingest_mode::TransactionMilestoning) -> Vec<Field> {
    let mut fields = Vec::new();
    if let Some(name) = milestoning.batch_id_in() {
        fields.push(Field::new(name, DataType::Int).primary_key());
    }
    if let Some(name) = milestoning.batch_id_out() {
        fields.push(Field::new(name, DataType::Int));
    }
    if let Some(name) = milestoning.date_time_in() {
        fields.push(Field::new(name, DataType::Datetime).primary_key());
    }
    if let Some(name) = milestoning.date_time_out() {
        fields.push(Field::new(name, DataType::Datetime));
    }
    fields
}

/// Staging columns that carry data into main
fn carried_fields<'a>(
    staging: &'a StagingDataset,
    mode: &IngestMode,
) -> impl Iterator<Item = &'a Field> {
    let data_split = mode.data_split_field().map(str::to_string);
    let delete_indicator = mode.delete_indicator_field().map(str::to_string);
    staging.schema().fields.iter().filter(move |field| {
        Some(&field.name) != data_split.as_ref() && Some(&field.name) != delete_indicator.as_ref()
    })
}

/// The schema main is created with and inserted into.
///
/// An empty main schema is derived from staging plus the generated columns.
/// An explicit one must cover every carried staging column, unless schema
/// evolution may add the missing ones.
pub(crate) fn resolve_main_schema(
    main: &DatasetDefinition,
    staging: &StagingDataset,
    mode: &IngestMode,
    enable_schema_evolution: bool,
) -> IngestResult<SchemaDefinition> {
    if main.schema.fields.is_empty() {
        let mut fields: Vec<Field> = carried_fields(staging, mode).cloned().collect();
        for field in generated_fields(mode) {
            if !fields.iter().any(|f| f.name == field.name) {
                fields.push(field);
            }
        }
        return Ok(SchemaDefinition {
            fields,
            ..main.schema.clone()
        });
    }

    let mut schema = main.schema.clone();
    for field in carried_fields(staging, mode) {
        if schema.contains(&field.name) {
            continue;
        }
        if !enable_schema_evolution {
            return Err(IngestError::configuration(format!(
                "Field [{}] of staging dataset is missing from main dataset [{}]",
                field.name,
                main.name()
            )));
        }
        schema.fields.push(Field {
            primary_key: false,
            nullable: true,
            identity: false,
            unique: false,
            ..field.clone()
        });
    }
    Ok(schema)
}

/// Fields schema evolution adds to an explicit main schema
pub(crate) fn evolved_fields(
    original: &DatasetDefinition,
    resolved: &DatasetDefinition,
) -> Vec<Field> {
    if original.schema.fields.is_empty() {
        return Vec::new();
    }
    resolved
        .schema
        .fields
        .iter()
        .filter(|field| !original.schema.contains(&field.name))
        .cloned()
        .collect()
}

impl PlanContext<'_> {
    /// Insert columns and values in main schema order.
    ///
    /// Generated columns take their value from `generated`; every other column
    /// is copied from staging when staging has it and left to its default
    /// otherwise.
    pub fn insert_projection(&self, generated: &[(String, Value)]) -> (Vec<String>, Vec<Value>) {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for field in &self.main.schema.fields {
            if field.identity {
                continue;
            }
            if let Some((_, value)) = generated.iter().find(|(name, _)| *name == field.name) {
                columns.push(field.name.clone());
                values.push(value.clone());
            } else if self.staging.schema().contains(&field.name) {
                columns.push(field.name.clone());
                values.push(self.staging_field(&field.name));
            }
        }
        (columns, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest_mode::{AppendOnly, Auditing, TransactionMilestoning, UnitemporalDelta};

    fn staging() -> StagingDataset {
        DatasetDefinition::new("staging")
            .with_fields(vec![
                Field::new("id", DataType::Int).primary_key(),
                Field::new("name", DataType::String),
                Field::new("digest", DataType::String),
            ])
            .into()
    }

    #[test]
    fn test_derived_schema_adds_milestoning_to_primary_key() {
        let mode = IngestMode::UnitemporalDelta(UnitemporalDelta::new(
            "digest",
            TransactionMilestoning::batch_id("batch_id_in", "batch_id_out"),
        ));
        let schema =
            resolve_main_schema(&DatasetDefinition::new("main"), &staging(), &mode, false).unwrap();
        assert_eq!(
            schema.field_names(),
            vec!["id", "name", "digest", "batch_id_in", "batch_id_out"]
        );
        assert_eq!(schema.primary_keys(), vec!["id", "batch_id_in"]);
    }

    #[test]
    fn test_explicit_schema_missing_column_requires_evolution() {
        let mode = IngestMode::AppendOnly(AppendOnly {
            auditing: Auditing::date_time("batch_update_time"),
            ..Default::default()
        });
        let main = DatasetDefinition::new("main").with_fields(vec![
            Field::new("id", DataType::Int).primary_key(),
            Field::new("digest", DataType::String),
            Field::new("batch_update_time", DataType::Datetime),
        ]);

        let err = resolve_main_schema(&main, &staging(), &mode, false).unwrap_err();
        assert!(err.to_string().contains("Field [name]"));

        let evolved = resolve_main_schema(&main, &staging(), &mode, true).unwrap();
        let resolved = main.clone().with_schema(evolved);
        let added = evolved_fields(&main, &resolved);
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].name, "name");
        assert!(!added[0].primary_key);
    }
}
