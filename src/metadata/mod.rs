//! Batch metadata and batch id allocation
//!
//! The metadata table is an append-only ledger with one row per completed
//! batch. The next batch id of a table is never computed up front: it is the
//! correlated subquery `COALESCE(MAX(table_batch_id),0)+1` embedded in every
//! statement that needs it, so each statement reads the ledger as it stands
//! when it executes. Allocation is only race-free when the statements of one
//! batch run in a transaction isolated enough that two writers cannot observe
//! the same `MAX`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{
    BatchIdValue, Condition, DataType, DatasetDefinition, DatasetReference, Field, FieldType,
    FunctionName, Operation, Selection, TimestampValue, Value,
};

/// Default name of the metadata table
pub const DEFAULT_METADATA_TABLE: &str = "batch_metadata";

/// Status recorded for a successfully completed batch
pub const DEFAULT_BATCH_STATUS: &str = "DONE";

fn default_table() -> String {
    DEFAULT_METADATA_TABLE.to_string()
}

fn default_table_name_field() -> String {
    "table_name".to_string()
}

fn default_batch_start_ts_field() -> String {
    "batch_start_ts_utc".to_string()
}

fn default_batch_end_ts_field() -> String {
    "batch_end_ts_utc".to_string()
}

fn default_batch_status_field() -> String {
    "batch_status".to_string()
}

fn default_table_batch_id_field() -> String {
    "table_batch_id".to_string()
}

fn default_batch_source_info_field() -> String {
    "batch_source_info".to_string()
}

fn default_additional_metadata_field() -> String {
    "additional_metadata".to_string()
}

fn default_ingest_request_id_field() -> String {
    "ingest_request_id".to_string()
}

/// Logical schema of the metadata table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataDataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default = "default_table")]
    pub name: String,
    #[serde(default = "default_table_name_field")]
    pub table_name_field: String,
    #[serde(default = "default_batch_start_ts_field")]
    pub batch_start_ts_field: String,
    #[serde(default = "default_batch_end_ts_field")]
    pub batch_end_ts_field: String,
    #[serde(default = "default_batch_status_field")]
    pub batch_status_field: String,
    #[serde(default = "default_table_batch_id_field")]
    pub table_batch_id_field: String,
    #[serde(default = "default_batch_source_info_field")]
    pub batch_source_info_field: String,
    #[serde(default = "default_additional_metadata_field")]
    pub additional_metadata_field: String,
    #[serde(default = "default_ingest_request_id_field")]
    pub ingest_request_id_field: String,
}

impl Default for MetadataDataset {
    fn default() -> Self {
        Self {
            database: None,
            group: None,
            name: default_table(),
            table_name_field: default_table_name_field(),
            batch_start_ts_field: default_batch_start_ts_field(),
            batch_end_ts_field: default_batch_end_ts_field(),
            batch_status_field: default_batch_status_field(),
            table_batch_id_field: default_table_batch_id_field(),
            batch_source_info_field: default_batch_source_info_field(),
            additional_metadata_field: default_additional_metadata_field(),
            ingest_request_id_field: default_ingest_request_id_field(),
        }
    }
}

impl MetadataDataset {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The table, aliased by its own name
    pub fn reference(&self) -> DatasetReference {
        DatasetReference {
            database: self.database.clone(),
            group: self.group.clone(),
            name: self.name.clone(),
            alias: Some(self.name.clone()),
        }
    }

    fn field(&self, name: &str) -> Value {
        Value::field(&self.name, name)
    }
}

/// Values recorded by one metadata insert
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRow {
    /// Main table name as the caller wrote it, before any case conversion
    pub table_name: String,
    pub batch_id: Value,
    pub batch_start: TimestampValue,
    pub batch_end: TimestampValue,
    pub batch_status: String,
    pub batch_source_info: Option<serde_json::Value>,
    pub additional_metadata: BTreeMap<String, serde_json::Value>,
    pub ingest_request_id: Option<String>,
}

/// Builds batch id values and ledger statements for one metadata table.
///
/// # Example
///
/// ```rust
/// use ingest_sql_sdk::metadata::{MetadataDataset, MetadataUtils};
/// use ingest_sql_sdk::models::{BatchIdValue, Value};
///
/// let utils = MetadataUtils::new(MetadataDataset::default());
/// let next = utils.get_batch_id("main", false);
/// assert!(matches!(next, Value::BatchId(BatchIdValue::Computed(_))));
///
/// let preallocated = utils.batch_id("main", Some("{NEXT_BATCH_ID_PATTERN}"), false);
/// assert_eq!(
///     preallocated,
///     Value::BatchId(BatchIdValue::Placeholder("{NEXT_BATCH_ID_PATTERN}".to_string()))
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataUtils {
    dataset: MetadataDataset,
}

impl MetadataUtils {
    pub fn new(dataset: MetadataDataset) -> Self {
        Self { dataset }
    }

    pub fn dataset(&self) -> &MetadataDataset {
        &self.dataset
    }

    /// `table_name = '<table>'`, or `UPPER(table_name) = '<TABLE>'` for sinks
    /// whose catalogs ignore identifier case
    fn table_name_condition(&self, table_name: &str, case_insensitive: bool) -> Condition {
        let column = self.dataset.field(&self.dataset.table_name_field);
        if case_insensitive {
            Condition::Equals(
                Value::function(FunctionName::Upper, vec![column]),
                Value::string(table_name.to_uppercase()),
            )
        } else {
            Condition::Equals(column, Value::string(table_name))
        }
    }

    /// `(SELECT COALESCE(MAX(table_batch_id),0)+1 FROM <metadata> WHERE table_name = '<table>')`
    pub fn get_batch_id(&self, table_name: &str, case_insensitive: bool) -> Value {
        let max = Value::function(
            FunctionName::Max,
            vec![self.dataset.field(&self.dataset.table_batch_id_field)],
        );
        let next = Value::function(FunctionName::Coalesce, vec![max, Value::Numeric(0)])
            .plus(Value::Numeric(1));
        let selection = Selection::new(
            crate::models::Dataset::Table(self.dataset.reference()),
            vec![next],
        )
        .with_condition(self.table_name_condition(table_name, case_insensitive));
        Value::BatchId(BatchIdValue::Computed(Box::new(selection)))
    }

    /// The batch being superseded: next batch id minus one
    pub fn get_prev_batch_id(&self, table_name: &str, case_insensitive: bool) -> Value {
        self.get_batch_id(table_name, case_insensitive)
            .minus(Value::Numeric(1))
    }

    /// Next batch id, or the caller's placeholder when ids are allocated outside SQL
    pub fn batch_id(
        &self,
        table_name: &str,
        pattern: Option<&str>,
        case_insensitive: bool,
    ) -> Value {
        match pattern {
            Some(pattern) => Value::BatchId(BatchIdValue::Placeholder(pattern.to_string())),
            None => self.get_batch_id(table_name, case_insensitive),
        }
    }

    pub fn prev_batch_id(
        &self,
        table_name: &str,
        pattern: Option<&str>,
        case_insensitive: bool,
    ) -> Value {
        self.batch_id(table_name, pattern, case_insensitive)
            .minus(Value::Numeric(1))
    }

    /// `CREATE TABLE IF NOT EXISTS` for the ledger
    pub fn create_table(&self) -> Operation {
        let dataset = &self.dataset;
        let fields = vec![
            Field::new(
                &dataset.table_name_field,
                FieldType::with_length(DataType::Varchar, 255),
            ),
            Field::new(&dataset.batch_start_ts_field, DataType::Datetime),
            Field::new(&dataset.batch_end_ts_field, DataType::Datetime),
            Field::new(
                &dataset.batch_status_field,
                FieldType::with_length(DataType::Varchar, 32),
            ),
            Field::new(&dataset.table_batch_id_field, DataType::Integer),
            Field::new(&dataset.batch_source_info_field, DataType::Json),
            Field::new(&dataset.additional_metadata_field, DataType::Json),
            Field::new(
                &dataset.ingest_request_id_field,
                FieldType::with_length(DataType::Varchar, 255),
            ),
        ];
        let mut reference = dataset.reference();
        reference.alias = None;
        Operation::Create {
            dataset: DatasetDefinition {
                reference,
                ..Default::default()
            }
            .with_fields(fields),
            if_not_exists: true,
        }
    }

    /// Single-row `INSERT ... SELECT` recording a finished batch.
    ///
    /// Optional columns appear only when the row carries a value for them.
    pub fn insert_metadata(&self, row: MetadataRow) -> Operation {
        let dataset = &self.dataset;
        let mut columns = vec![
            dataset.table_name_field.clone(),
            dataset.table_batch_id_field.clone(),
            dataset.batch_start_ts_field.clone(),
            dataset.batch_end_ts_field.clone(),
            dataset.batch_status_field.clone(),
        ];
        let mut values = vec![
            Value::string(row.table_name),
            row.batch_id,
            Value::BatchTimestamp(row.batch_start),
            Value::BatchTimestamp(row.batch_end),
            Value::string(row.batch_status),
        ];

        if let Some(source_info) = row.batch_source_info {
            columns.push(dataset.batch_source_info_field.clone());
            values.push(Value::string(source_info.to_string()));
        }
        if !row.additional_metadata.is_empty() {
            columns.push(dataset.additional_metadata_field.clone());
            let map: serde_json::Map<String, serde_json::Value> =
                row.additional_metadata.into_iter().collect();
            values.push(Value::string(serde_json::Value::Object(map).to_string()));
        }
        if let Some(request_id) = row.ingest_request_id {
            columns.push(dataset.ingest_request_id_field.clone());
            values.push(Value::string(request_id));
        }

        let mut target = dataset.reference();
        target.alias = None;
        Operation::Insert {
            target,
            columns,
            source: Selection::values(values),
        }
    }
}
