//! Dialect capability descriptors and the registry that holds them

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{IngestError, IngestResult};
use crate::models::{DataType, FieldType, FunctionName};

/// Tag of the default ANSI sink
pub const ANSI: &str = "ansi";
/// Tag of the DuckDB sink
pub const DUCKDB: &str = "duckdb";
/// Tag of the MemSQL sink
pub const MEMSQL: &str = "memsql";

/// How a quoted value alias is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AliasQuoting {
    /// `as rowsInserted`
    Bare,
    /// `as "rowsInserted"` with the sink's identifier quote
    Quoted,
}

/// Everything the renderer needs to know about one target dialect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SinkCapabilities {
    pub name: String,
    /// Identifier quote character
    pub quote: char,
    pub alias_quoting: AliasQuoting,
    /// `INSERT INTO t (cols) (SELECT ...)` rather than `INSERT INTO t (cols) SELECT ...`
    pub parenthesize_insert_select: bool,
    /// Physical type of `DATETIME` columns
    pub datetime_type: String,
    /// Physical type of unbounded strings
    pub string_type: String,
    /// chrono format of timestamp literals
    pub timestamp_format: String,
    /// Catalog ignores identifier case, so metadata lookups compare `UPPER(table_name)`
    pub case_insensitive_metadata_lookup: bool,
    /// Can read staged files through `READ_CSV`/`READ_JSON`
    pub supports_staged_files: bool,
    /// Column clause for database-generated values, if the dialect has one
    pub identity_clause: Option<String>,
    /// Renders `SHARD KEY`/`SORT KEY` clauses from the schema's layout hints
    pub supports_shard_keys: bool,
    pub supported_functions: BTreeSet<FunctionName>,
}

fn common_functions() -> BTreeSet<FunctionName> {
    [
        FunctionName::Count,
        FunctionName::Max,
        FunctionName::Coalesce,
        FunctionName::CurrentTimestamp,
        FunctionName::Upper,
        FunctionName::RowNumber,
    ]
    .into_iter()
    .collect()
}

impl SinkCapabilities {
    pub fn ansi() -> Self {
        Self {
            name: ANSI.to_string(),
            quote: '"',
            alias_quoting: AliasQuoting::Bare,
            parenthesize_insert_select: true,
            datetime_type: "DATETIME".to_string(),
            string_type: "VARCHAR".to_string(),
            timestamp_format: "%Y-%m-%d %H:%M:%S".to_string(),
            case_insensitive_metadata_lookup: false,
            supports_staged_files: false,
            identity_clause: Some("IDENTITY".to_string()),
            supports_shard_keys: false,
            supported_functions: common_functions(),
        }
    }

    pub fn duckdb() -> Self {
        Self {
            name: DUCKDB.to_string(),
            quote: '"',
            alias_quoting: AliasQuoting::Quoted,
            parenthesize_insert_select: false,
            datetime_type: "TIMESTAMP".to_string(),
            string_type: "VARCHAR".to_string(),
            timestamp_format: "%Y-%m-%d %H:%M:%S%.6f".to_string(),
            case_insensitive_metadata_lookup: true,
            supports_staged_files: true,
            identity_clause: None,
            supports_shard_keys: false,
            supported_functions: common_functions(),
        }
    }

    pub fn memsql() -> Self {
        Self {
            name: MEMSQL.to_string(),
            quote: '`',
            alias_quoting: AliasQuoting::Quoted,
            parenthesize_insert_select: true,
            datetime_type: "DATETIME".to_string(),
            string_type: "TEXT".to_string(),
            timestamp_format: "%Y-%m-%d %H:%M:%S".to_string(),
            case_insensitive_metadata_lookup: false,
            supports_staged_files: false,
            identity_clause: Some("AUTO_INCREMENT".to_string()),
            supports_shard_keys: true,
            supported_functions: common_functions(),
        }
    }

    pub fn supports(&self, function: FunctionName) -> bool {
        self.supported_functions.contains(&function)
    }

    /// Physical type name for a logical field type
    pub fn type_name(&self, field_type: &FieldType) -> String {
        let sized = |base: &str| match (field_type.length, field_type.scale) {
            (Some(length), Some(scale)) => format!("{}({},{})", base, length, scale),
            (Some(length), None) => format!("{}({})", base, length),
            _ => base.to_string(),
        };
        match field_type.data_type {
            DataType::Int | DataType::Integer => "INTEGER".to_string(),
            DataType::BigInt => "BIGINT".to_string(),
            DataType::SmallInt => "SMALLINT".to_string(),
            DataType::TinyInt => "TINYINT".to_string(),
            DataType::Decimal => sized("DECIMAL"),
            DataType::Numeric => sized("NUMERIC"),
            DataType::Float => "FLOAT".to_string(),
            DataType::Double => "DOUBLE".to_string(),
            DataType::Boolean => "BOOLEAN".to_string(),
            DataType::Char => sized("CHAR"),
            DataType::Varchar if field_type.length.is_some() => sized("VARCHAR"),
            DataType::Varchar | DataType::String => sized(&self.string_type),
            DataType::Date => "DATE".to_string(),
            DataType::Time => "TIME".to_string(),
            DataType::Datetime => self.datetime_type.clone(),
            DataType::Timestamp => "TIMESTAMP".to_string(),
            DataType::Json => "JSON".to_string(),
        }
    }
}

/// Registry of sinks by tag, populated explicitly rather than discovered.
///
/// # Example
///
/// ```rust
/// use ingest_sql_sdk::transformer::{SinkCapabilities, SinkRegistry};
///
/// let mut registry = SinkRegistry::with_defaults();
/// assert_eq!(registry.get("duckdb").unwrap().datetime_type, "TIMESTAMP");
///
/// let mut custom = SinkCapabilities::ansi();
/// custom.name = "h2".to_string();
/// registry.register(custom);
/// assert!(registry.get("h2").is_ok());
/// assert!(registry.get("oracle").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SinkRegistry {
    sinks: BTreeMap<String, SinkCapabilities>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the ANSI, DuckDB and MemSQL sinks
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(SinkCapabilities::ansi());
        registry.register(SinkCapabilities::duckdb());
        registry.register(SinkCapabilities::memsql());
        registry
    }

    /// Add or replace a sink under its own name. Returns the replaced sink.
    pub fn register(&mut self, sink: SinkCapabilities) -> Option<SinkCapabilities> {
        self.sinks.insert(sink.name.to_lowercase(), sink)
    }

    pub fn get(&self, tag: &str) -> IngestResult<&SinkCapabilities> {
        self.sinks.get(&tag.to_lowercase()).ok_or_else(|| {
            IngestError::UnsupportedDialect(format!(
                "No sink registered for [{}]; known sinks: {}",
                tag,
                self.tags().join(", ")
            ))
        })
    }

    pub fn tags(&self) -> Vec<&str> {
        self.sinks.keys().map(String::as_str).collect()
    }
}
