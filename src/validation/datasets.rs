//! Dataset validation
//!
//! Checks a main/staging pair against an ingest mode before anything is
//! planned, so that a configuration mistake never yields a partial plan.

use std::collections::BTreeSet;

use crate::error::{IngestError, IngestResult};
use crate::ingest_mode::{
    DeduplicationStrategy, DigestGenStrategy, IngestMode, TransactionMilestoning,
};
use crate::models::{DatasetDefinition, DatasetReference, SchemaDefinition, StagingDataset};
use crate::planner::generated_fields;

use super::input::validate_identifier;

/// Validator for the datasets of one ingestion request
#[derive(Debug, Default)]
pub struct DatasetValidator;

impl DatasetValidator {
    pub fn new() -> Self {
        Self
    }

    /// Run every check for `mode` against `main` and `staging`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ingest_sql_sdk::ingest_mode::{IngestMode, NontemporalDelta};
    /// use ingest_sql_sdk::models::{DataType, DatasetDefinition, Field, StagingDataset};
    /// use ingest_sql_sdk::validation::DatasetValidator;
    ///
    /// let staging = DatasetDefinition::new("staging").with_fields(vec![
    ///     Field::new("id", DataType::Int).primary_key(),
    ///     Field::new("digest", DataType::String),
    /// ]);
    /// let mode = IngestMode::NontemporalDelta(NontemporalDelta::new("digest"));
    /// let result = DatasetValidator::new().validate(
    ///     &DatasetDefinition::new("main"),
    ///     &StagingDataset::Table(staging),
    ///     &mode,
    /// );
    /// assert!(result.is_ok());
    /// ```
    pub fn validate(
        &self,
        main: &DatasetDefinition,
        staging: &StagingDataset,
        mode: &IngestMode,
    ) -> IngestResult<()> {
        mode.validate()?;
        self.validate_reference(&main.reference)?;
        self.validate_reference(staging.reference())?;
        self.validate_schema(main.name(), &main.schema)?;
        self.validate_schema(&staging.reference().name, staging.schema())?;

        match (mode, staging) {
            (IngestMode::BulkLoad(_), StagingDataset::Table(_)) => {
                return Err(IngestError::configuration(
                    "BulkLoad requires a staged files dataset",
                ));
            }
            (IngestMode::BulkLoad(_), StagingDataset::StagedFiles(files)) => {
                if files.file_paths.is_empty() {
                    return Err(IngestError::configuration(
                        "Staged files dataset must list at least one file",
                    ));
                }
            }
            (_, StagingDataset::StagedFiles(_)) => {
                return Err(IngestError::configuration(format!(
                    "{} does not support staged files datasets",
                    mode.name()
                )));
            }
            (_, StagingDataset::Table(_)) => {}
        }

        let staging_schema = staging.schema();
        for field in self.required_staging_fields(mode) {
            if !staging_schema.contains(&field) {
                return Err(IngestError::configuration(format!(
                    "Field [{}] not found in staging dataset",
                    field
                )));
            }
        }
        for filter in staging.filters() {
            if !staging_schema.contains(&filter.field_name) {
                return Err(IngestError::configuration(format!(
                    "Filter field [{}] not found in staging dataset",
                    filter.field_name
                )));
            }
        }

        if self.requires_primary_keys(mode) && staging_schema.primary_keys().is_empty() {
            return Err(IngestError::configuration(
                "Primary key list must not be empty",
            ));
        }

        if !main.schema.fields.is_empty() {
            self.validate_main_schema(main, staging_schema, mode)?;
        }
        Ok(())
    }

    fn validate_reference(&self, reference: &DatasetReference) -> IngestResult<()> {
        validate_identifier("table name", &reference.name)?;
        if let Some(group) = &reference.group {
            validate_identifier("group name", group)?;
        }
        if let Some(database) = &reference.database {
            validate_identifier("database name", database)?;
        }
        if let Some(alias) = &reference.alias {
            validate_identifier("alias", alias)?;
        }
        Ok(())
    }

    /// Field names must be unique and every layout hint must name a field
    fn validate_schema(&self, dataset: &str, schema: &SchemaDefinition) -> IngestResult<()> {
        let mut seen = BTreeSet::new();
        for field in &schema.fields {
            validate_identifier("column name", &field.name)?;
            if !seen.insert(field.name.as_str()) {
                return Err(IngestError::configuration(format!(
                    "Duplicate field [{}] in dataset [{}]",
                    field.name, dataset
                )));
            }
        }

        let hinted = schema
            .indexes
            .iter()
            .flat_map(|index| index.columns.iter())
            .chain(schema.column_store_keys.iter())
            .chain(schema.shard_keys.iter());
        for column in hinted {
            if !seen.contains(column.as_str()) {
                return Err(IngestError::configuration(format!(
                    "Key [{}] does not name a field of dataset [{}]",
                    column, dataset
                )));
            }
        }
        Ok(())
    }

    fn required_staging_fields(&self, mode: &IngestMode) -> Vec<String> {
        let mut fields = Vec::new();
        match mode {
            IngestMode::AppendOnly(append) => {
                fields.extend(append.digest_field.clone());
                if let DeduplicationStrategy::DeduplicateAndVersion { version_field } =
                    &append.deduplication_strategy
                {
                    fields.push(version_field.clone());
                }
            }
            IngestMode::NontemporalSnapshot(snapshot) => {
                fields.extend(snapshot.versioning_strategy.version_field().map(str::to_string));
            }
            IngestMode::NontemporalDelta(delta) => {
                fields.push(delta.digest_field.clone());
                fields.extend(delta.versioning_strategy.version_field().map(str::to_string));
            }
            IngestMode::UnitemporalSnapshot(snapshot) => {
                fields.push(snapshot.digest_field.clone());
                fields.extend(snapshot.versioning_strategy.version_field().map(str::to_string));
                if let Some(partitioning) = &snapshot.partitioning {
                    fields.extend(partitioning.partition_fields.iter().cloned());
                }
            }
            IngestMode::UnitemporalDelta(delta) => {
                fields.push(delta.digest_field.clone());
                fields.extend(delta.versioning_strategy.version_field().map(str::to_string));
            }
            IngestMode::BulkLoad(bulk) => {
                if let DigestGenStrategy::UserProvided { digest_field } = &bulk.digest_gen_strategy
                {
                    fields.push(digest_field.clone());
                }
            }
        }
        fields.extend(mode.data_split_field().map(str::to_string));
        fields.extend(mode.delete_indicator_field().map(str::to_string));
        fields
    }

    fn requires_primary_keys(&self, mode: &IngestMode) -> bool {
        match mode {
            IngestMode::AppendOnly(append) => matches!(
                append.deduplication_strategy,
                DeduplicationStrategy::DeduplicateAndVersion { .. }
            ),
            IngestMode::NontemporalSnapshot(snapshot) => {
                snapshot.versioning_strategy.version_field().is_some()
            }
            IngestMode::NontemporalDelta(_)
            | IngestMode::UnitemporalSnapshot(_)
            | IngestMode::UnitemporalDelta(_) => true,
            IngestMode::BulkLoad(_) => false,
        }
    }

    /// An explicit main schema must carry the generated columns, and
    /// milestone-in columns must extend its primary key.
    fn validate_main_schema(
        &self,
        main: &DatasetDefinition,
        staging: &SchemaDefinition,
        mode: &IngestMode,
    ) -> IngestResult<()> {
        for field in generated_fields(mode) {
            if !main.schema.contains(&field.name) {
                return Err(IngestError::configuration(format!(
                    "Field [{}] not found in main dataset",
                    field.name
                )));
            }
        }

        let milestoning: Option<&TransactionMilestoning> = match mode {
            IngestMode::UnitemporalSnapshot(snapshot) => Some(&snapshot.transaction_milestoning),
            IngestMode::UnitemporalDelta(delta) => Some(&delta.transaction_milestoning),
            _ => None,
        };
        for name in milestoning.into_iter().flat_map(TransactionMilestoning::in_field_names) {
            if main.schema.field(name).is_some_and(|field| !field.primary_key) {
                return Err(IngestError::configuration(format!(
                    "Field \"{}\" must be a primary key",
                    name
                )));
            }
        }

        let main_keys: BTreeSet<String> = main.schema.primary_keys().into_iter().collect();
        for key in staging.primary_keys() {
            if !main_keys.contains(&key) {
                return Err(IngestError::configuration(format!(
                    "Primary key [{}] of staging dataset is not a primary key of main dataset [{}]",
                    key,
                    main.name()
                )));
            }
        }
        Ok(())
    }
}
