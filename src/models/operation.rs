//! Operations and the logical plan that orders them

use super::condition::Condition;
use super::dataset::{Dataset, DatasetDefinition, DatasetReference};
use super::field::Field;
use super::value::Value;

/// `SELECT <fields> [FROM <source>] [WHERE <condition>]`
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub source: Option<Dataset>,
    pub fields: Vec<Value>,
    pub condition: Option<Condition>,
}

impl Selection {
    pub fn new(source: Dataset, fields: Vec<Value>) -> Self {
        Self {
            source: Some(source),
            fields,
            condition: None,
        }
    }

    /// `SELECT * FROM <source>`
    pub fn all(source: Dataset) -> Self {
        Selection::new(source, vec![Value::All])
    }

    /// A select without a `FROM` clause, e.g. `SELECT 0 as rowsDeleted`
    pub fn values(fields: Vec<Value>) -> Self {
        Self {
            source: None,
            fields,
            condition: None,
        }
    }

    pub fn filter(mut self, condition: Option<Condition>) -> Self {
        self.condition = condition;
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }
}

/// One statement of a logical plan.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Create {
        dataset: DatasetDefinition,
        if_not_exists: bool,
    },
    Insert {
        target: DatasetReference,
        columns: Vec<String>,
        source: Selection,
    },
    /// `UPDATE <target> as <alias> SET <alias>.<column> = <value>, ...`
    Update {
        target: DatasetReference,
        assignments: Vec<(String, Value)>,
        condition: Option<Condition>,
    },
    Delete {
        target: DatasetReference,
        condition: Option<Condition>,
    },
    Select(Selection),
    AlterAddColumn {
        target: DatasetReference,
        field: Field,
    },
    Drop {
        target: DatasetReference,
        if_exists: bool,
    },
}

impl Operation {
    /// Short label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Create { .. } => "create",
            Operation::Insert { .. } => "insert",
            Operation::Update { .. } => "update",
            Operation::Delete { .. } => "delete",
            Operation::Select(_) => "select",
            Operation::AlterAddColumn { .. } => "alter",
            Operation::Drop { .. } => "drop",
        }
    }
}

/// An ordered list of operations, built once and rendered once.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogicalPlan {
    pub operations: Vec<Operation>,
}

impl LogicalPlan {
    pub fn of(operations: Vec<Operation>) -> Self {
        Self { operations }
    }

    pub fn single(operation: Operation) -> Self {
        Self {
            operations: vec![operation],
        }
    }

    pub fn push(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }
}
