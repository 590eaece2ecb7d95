//! Value expressions of the logical plan
//!
//! Values are immutable trees. Nodes own their children and never point back
//! at a parent, so a tree can be cloned, compared and rendered independently.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::operation::Selection;

/// Functions the planner may emit. The sink decides whether it can render each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FunctionName {
    Count,
    Max,
    Coalesce,
    CurrentTimestamp,
    Upper,
    RowNumber,
}

impl FunctionName {
    pub fn sql_name(&self) -> &'static str {
        match self {
            FunctionName::Count => "COUNT",
            FunctionName::Max => "MAX",
            FunctionName::Coalesce => "COALESCE",
            FunctionName::CurrentTimestamp => "CURRENT_TIMESTAMP",
            FunctionName::Upper => "UPPER",
            FunctionName::RowNumber => "ROW_NUMBER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Reference to a column, optionally qualified by a dataset alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValue {
    pub dataset_alias: Option<String>,
    pub field_name: String,
}

/// Next batch id for a table.
///
/// `Computed` embeds the allocation subquery inline so every consuming
/// statement re-reads the metadata table when it runs. `Placeholder` renders
/// the caller's token verbatim for orchestrators that allocate ids themselves.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchIdValue {
    Computed(Box<Selection>),
    Placeholder(String),
}

/// A batch timestamp (start or end of the ingestion run)
#[derive(Debug, Clone, PartialEq)]
pub enum TimestampValue {
    /// Fixed execution time, rendered as a literal in the sink's format
    Clock(NaiveDateTime),
    /// Caller token, rendered quoted: `'{BATCH_START_TS_PATTERN}'`
    Placeholder(String),
    /// The database clock at execution
    CurrentTimestamp,
}

/// A value expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Field(FieldValue),
    String(String),
    Numeric(i64),
    /// Typed literal: booleans and numbers render bare, strings quoted
    Object(serde_json::Value),
    Function {
        name: FunctionName,
        args: Vec<Value>,
    },
    /// Call of a user-defined function, rendered by name without quoting
    UserFunction {
        name: String,
        args: Vec<Value>,
    },
    /// `ROW_NUMBER() OVER (PARTITION BY ... ORDER BY ...)`
    Window {
        function: FunctionName,
        partition_by: Vec<Value>,
        order_by: Vec<(Value, SortOrder)>,
    },
    Binary {
        left: Box<Value>,
        op: ArithmeticOp,
        right: Box<Value>,
    },
    /// Scalar sub-select, rendered in parentheses
    Selection(Box<Selection>),
    BatchId(BatchIdValue),
    BatchTimestamp(TimestampValue),
    InfiniteBatchId,
    InfiniteBatchTime,
    /// Parenthesised list used on the right of `IN`
    Array(Vec<Value>),
    /// `*`
    All,
    /// Result alias, e.g. `COUNT(*) as rowsInserted`; quoting follows the sink
    Aliased {
        value: Box<Value>,
        alias: String,
    },
    /// Projection under a column name, always quoted as an identifier
    Named {
        value: Box<Value>,
        column: String,
    },
}

impl Value {
    /// Field qualified by a dataset alias: `stage."id"`
    pub fn field(dataset_alias: impl Into<String>, field_name: impl Into<String>) -> Self {
        Value::Field(FieldValue {
            dataset_alias: Some(dataset_alias.into()),
            field_name: field_name.into(),
        })
    }

    /// Unqualified field: `"id"`
    pub fn bare_field(field_name: impl Into<String>) -> Self {
        Value::Field(FieldValue {
            dataset_alias: None,
            field_name: field_name.into(),
        })
    }

    pub fn string(value: impl Into<String>) -> Self {
        Value::String(value.into())
    }

    pub fn function(name: FunctionName, args: Vec<Value>) -> Self {
        Value::Function { name, args }
    }

    pub fn count_all() -> Self {
        Value::function(FunctionName::Count, vec![Value::All])
    }

    pub fn plus(self, right: Value) -> Self {
        Value::Binary {
            left: Box::new(self),
            op: ArithmeticOp::Plus,
            right: Box::new(right),
        }
    }

    pub fn minus(self, right: Value) -> Self {
        Value::Binary {
            left: Box::new(self),
            op: ArithmeticOp::Minus,
            right: Box::new(right),
        }
    }

    pub fn alias(self, alias: impl Into<String>) -> Self {
        Value::Aliased {
            value: Box::new(self),
            alias: alias.into(),
        }
    }

    pub fn named(self, column: impl Into<String>) -> Self {
        Value::Named {
            value: Box::new(self),
            column: column.into(),
        }
    }

    pub fn selection(selection: Selection) -> Self {
        Value::Selection(Box::new(selection))
    }
}
