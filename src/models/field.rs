//! Field model for dataset schemas

use serde::{Deserialize, Serialize};

/// Logical column type, independent of any SQL dialect.
///
/// The transformer maps each variant onto the sink's physical type name,
/// e.g. `Datetime` renders as `DATETIME` for ANSI and `TIMESTAMP` for DuckDB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    Int,
    Integer,
    BigInt,
    SmallInt,
    TinyInt,
    Decimal,
    Numeric,
    Float,
    Double,
    Boolean,
    Char,
    Varchar,
    String,
    Date,
    Time,
    Datetime,
    Timestamp,
    Json,
}

impl DataType {
    /// Whether literals of this type are written as quoted strings
    pub fn is_string_like(&self) -> bool {
        matches!(self, DataType::Char | DataType::Varchar | DataType::String)
    }
}

impl std::str::FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "INT" => Ok(DataType::Int),
            "INTEGER" => Ok(DataType::Integer),
            "BIGINT" => Ok(DataType::BigInt),
            "SMALLINT" => Ok(DataType::SmallInt),
            "TINYINT" => Ok(DataType::TinyInt),
            "DECIMAL" => Ok(DataType::Decimal),
            "NUMERIC" => Ok(DataType::Numeric),
            "FLOAT" => Ok(DataType::Float),
            "DOUBLE" => Ok(DataType::Double),
            "BOOLEAN" | "BOOL" => Ok(DataType::Boolean),
            "CHAR" => Ok(DataType::Char),
            "VARCHAR" => Ok(DataType::Varchar),
            "STRING" => Ok(DataType::String),
            "DATE" => Ok(DataType::Date),
            "TIME" => Ok(DataType::Time),
            "DATETIME" => Ok(DataType::Datetime),
            "TIMESTAMP" => Ok(DataType::Timestamp),
            "JSON" => Ok(DataType::Json),
            _ => Err(format!("Unknown data type: {}", s)),
        }
    }
}

/// A data type with its optional length (or precision) and scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldType {
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
}

impl FieldType {
    pub fn of(data_type: DataType) -> Self {
        Self {
            data_type,
            length: None,
            scale: None,
        }
    }

    pub fn with_length(data_type: DataType, length: u32) -> Self {
        Self {
            data_type,
            length: Some(length),
            scale: None,
        }
    }

    pub fn with_precision(data_type: DataType, precision: u32, scale: u32) -> Self {
        Self {
            data_type,
            length: Some(precision),
            scale: Some(scale),
        }
    }
}

impl From<DataType> for FieldType {
    fn from(data_type: DataType) -> Self {
        FieldType::of(data_type)
    }
}

/// A single column of a dataset schema.
///
/// Fields are nullable unless stated otherwise; primary-key fields form the
/// natural key used to match staging rows against main rows.
///
/// # Example
///
/// ```rust
/// use ingest_sql_sdk::models::{DataType, Field};
///
/// let id = Field::new("id", DataType::Int).primary_key();
/// assert!(id.primary_key);
/// assert!(id.nullable);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub unique: bool,
    /// Value generated by the database on insert
    #[serde(default, skip_serializing_if = "is_false")]
    pub identity: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
    /// Output alias used when the field is projected under another name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_alias: Option<String>,
}

fn default_true() -> bool {
    true
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: impl Into<FieldType>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            nullable: true,
            primary_key: false,
            unique: false,
            identity: false,
            default_value: None,
            field_alias: None,
        }
    }

    /// Mark the field as part of the primary key
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }
}
