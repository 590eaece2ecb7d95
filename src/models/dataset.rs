//! Dataset model
//!
//! A dataset is identified by an optional database, an optional group (schema)
//! and a table name, carries an alias used to qualify field references, and is
//! described by a [`SchemaDefinition`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::field::Field;
use super::operation::Selection;

/// Identity of a table plus the alias it is referenced under.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl DatasetReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Alias if present, otherwise the bare table name
    pub fn alias_or_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Secondary index over one or more columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub index_name: String,
    pub columns: Vec<String>,
}

/// Ordered set of fields plus physical layout hints.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDefinition {
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<Index>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub column_store_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shard_keys: Vec<String>,
}

impl SchemaDefinition {
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            fields,
            ..Default::default()
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn primary_keys(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.primary_key)
            .map(|f| f.name.clone())
            .collect()
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }
}

/// Comparison used by a [`DatasetFilter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterType {
    EqualTo,
    NotEqualTo,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
}

/// A caller-supplied predicate that narrows the staging rows considered by a
/// plan, e.g. `snapshot_id > 18972`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetFilter {
    pub field_name: String,
    pub filter_type: FilterType,
    pub value: serde_json::Value,
}

impl DatasetFilter {
    pub fn new(
        field_name: impl Into<String>,
        filter_type: FilterType,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            filter_type,
            value: value.into(),
        }
    }
}

/// A table together with its schema.
///
/// # Example
///
/// ```rust
/// use ingest_sql_sdk::models::{DataType, DatasetDefinition, Field};
///
/// let main = DatasetDefinition::new("main")
///     .with_database("mydb")
///     .with_alias("sink")
///     .with_fields(vec![
///         Field::new("id", DataType::Int).primary_key(),
///         Field::new("name", DataType::String),
///     ]);
/// assert_eq!(main.schema.primary_keys(), vec!["id".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetDefinition {
    #[serde(flatten)]
    pub reference: DatasetReference,
    #[serde(default)]
    pub schema: SchemaDefinition,
    /// Filters applied whenever this dataset is read as a staging source
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<DatasetFilter>,
}

impl DatasetDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            reference: DatasetReference::new(name),
            ..Default::default()
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.reference.database = Some(database.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.reference.group = Some(group.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.reference.alias = Some(alias.into());
        self
    }

    pub fn with_fields(mut self, fields: Vec<Field>) -> Self {
        self.schema.fields = fields;
        self
    }

    pub fn with_schema(mut self, schema: SchemaDefinition) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_filter(mut self, filter: DatasetFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn name(&self) -> &str {
        &self.reference.name
    }

    pub fn alias(&self) -> &str {
        self.reference.alias_or_name()
    }

    /// This dataset as a `FROM` source
    pub fn as_source(&self) -> Dataset {
        Dataset::Table(self.reference.clone())
    }
}

/// File format of a staged-files dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileFormat {
    Csv,
    Json,
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileFormat::Csv => write!(f, "CSV"),
            FileFormat::Json => write!(f, "JSON"),
        }
    }
}

/// Files already staged on the target's file system, read through a typed
/// table function (`READ_CSV`/`READ_JSON`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedFilesDataset {
    #[serde(flatten)]
    pub reference: DatasetReference,
    #[serde(default)]
    pub schema: SchemaDefinition,
    pub file_paths: Vec<String>,
    pub file_format: FileFormat,
    /// Dialect-specific load options, rendered in key order as `key=value`
    #[serde(default)]
    pub load_options: BTreeMap<String, serde_json::Value>,
}

impl StagedFilesDataset {
    pub fn new(file_format: FileFormat, file_paths: Vec<String>, fields: Vec<Field>) -> Self {
        Self {
            reference: DatasetReference::new("staged_files"),
            schema: SchemaDefinition::new(fields),
            file_paths,
            file_format,
            load_options: BTreeMap::new(),
        }
    }

    pub fn with_load_option(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.load_options.insert(key.into(), value.into());
        self
    }
}

/// The staging side of an ingestion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StagingDataset {
    Table(DatasetDefinition),
    StagedFiles(StagedFilesDataset),
}

impl StagingDataset {
    pub fn schema(&self) -> &SchemaDefinition {
        match self {
            StagingDataset::Table(dataset) => &dataset.schema,
            StagingDataset::StagedFiles(files) => &files.schema,
        }
    }

    pub fn reference(&self) -> &DatasetReference {
        match self {
            StagingDataset::Table(dataset) => &dataset.reference,
            StagingDataset::StagedFiles(files) => &files.reference,
        }
    }

    pub fn filters(&self) -> &[DatasetFilter] {
        match self {
            StagingDataset::Table(dataset) => &dataset.filters,
            StagingDataset::StagedFiles(_) => &[],
        }
    }
}

impl From<DatasetDefinition> for StagingDataset {
    fn from(dataset: DatasetDefinition) -> Self {
        StagingDataset::Table(dataset)
    }
}

impl From<StagedFilesDataset> for StagingDataset {
    fn from(files: StagedFilesDataset) -> Self {
        StagingDataset::StagedFiles(files)
    }
}

/// A `FROM` source inside the logical plan
#[derive(Debug, Clone, PartialEq)]
pub enum Dataset {
    /// A physical table, rendered as its qualified name plus alias
    Table(DatasetReference),
    /// A sub-select used as a table, rendered as `(<select>) as <alias>`
    Derived {
        selection: Box<Selection>,
        alias: String,
    },
    /// A staged-files table function
    StagedFiles(StagedFilesDataset),
}

impl Dataset {
    /// Alias that field references against this source must use
    pub fn alias(&self) -> Option<&str> {
        match self {
            Dataset::Table(reference) => reference.alias.as_deref(),
            Dataset::Derived { alias, .. } => Some(alias),
            Dataset::StagedFiles(_) => None,
        }
    }
}
