//! Plan rewrites applied between planning and rendering
//!
//! Identifier rewrites touch table, group and database names, column names
//! and projection aliases. Dataset aliases and literals are left alone, so a
//! rewritten plan still filters the metadata ledger by the caller's table name.

use crate::models::{
    BatchIdValue, Condition, Dataset, DatasetDefinition, DatasetReference, Field, FieldValue,
    Index, LogicalPlan, Operation, SchemaDefinition, Selection, StagedFilesDataset, Value,
};

/// A rewrite from one logical plan to another.
pub trait Optimizer: Send + Sync {
    /// Stable name used in logs
    fn name(&self) -> &str;

    fn optimize(&self, plan: LogicalPlan) -> LogicalPlan;
}

/// Forces every identifier to upper case
#[derive(Debug, Default, Clone, Copy)]
pub struct UpperCaseOptimizer;

/// Forces every identifier to lower case
#[derive(Debug, Default, Clone, Copy)]
pub struct LowerCaseOptimizer;

impl Optimizer for UpperCaseOptimizer {
    fn name(&self) -> &str {
        "upper_case"
    }

    fn optimize(&self, plan: LogicalPlan) -> LogicalPlan {
        rewrite_identifiers(plan, &|identifier| identifier.to_uppercase())
    }
}

impl Optimizer for LowerCaseOptimizer {
    fn name(&self) -> &str {
        "lower_case"
    }

    fn optimize(&self, plan: LogicalPlan) -> LogicalPlan {
        rewrite_identifiers(plan, &|identifier| identifier.to_lowercase())
    }
}

/// Apply `optimizers` in order
pub fn optimize_plan(plan: LogicalPlan, optimizers: &[Box<dyn Optimizer>]) -> LogicalPlan {
    optimizers.iter().fold(plan, |plan, optimizer| {
        tracing::debug!(optimizer = optimizer.name(), "Applying optimizer");
        optimizer.optimize(plan)
    })
}

type Rename<'a> = &'a dyn Fn(&str) -> String;

/// Rebuild `plan` with every identifier passed through `rename`
pub fn rewrite_identifiers(plan: LogicalPlan, rename: Rename<'_>) -> LogicalPlan {
    LogicalPlan::of(
        plan.operations
            .into_iter()
            .map(|operation| rewrite_operation(operation, rename))
            .collect(),
    )
}

fn rewrite_operation(operation: Operation, rename: Rename<'_>) -> Operation {
    match operation {
        Operation::Create {
            dataset,
            if_not_exists,
        } => Operation::Create {
            dataset: rewrite_definition(dataset, rename),
            if_not_exists,
        },
        Operation::Insert {
            target,
            columns,
            source,
        } => Operation::Insert {
            target: rewrite_reference(target, rename),
            columns: columns.iter().map(|column| rename(column)).collect(),
            source: rewrite_selection(source, rename),
        },
        Operation::Update {
            target,
            assignments,
            condition,
        } => Operation::Update {
            target: rewrite_reference(target, rename),
            assignments: assignments
                .into_iter()
                .map(|(column, value)| (rename(&column), rewrite_value(value, rename)))
                .collect(),
            condition: condition.map(|c| rewrite_condition(c, rename)),
        },
        Operation::Delete { target, condition } => Operation::Delete {
            target: rewrite_reference(target, rename),
            condition: condition.map(|c| rewrite_condition(c, rename)),
        },
        Operation::Select(selection) => Operation::Select(rewrite_selection(selection, rename)),
        Operation::AlterAddColumn { target, field } => Operation::AlterAddColumn {
            target: rewrite_reference(target, rename),
            field: rewrite_field(field, rename),
        },
        Operation::Drop { target, if_exists } => Operation::Drop {
            target: rewrite_reference(target, rename),
            if_exists,
        },
    }
}

pub(crate) fn rewrite_reference(
    reference: DatasetReference,
    rename: Rename<'_>,
) -> DatasetReference {
    DatasetReference {
        database: reference.database.as_deref().map(rename),
        group: reference.group.as_deref().map(rename),
        name: rename(&reference.name),
        alias: reference.alias,
    }
}

pub(crate) fn rewrite_field(field: Field, rename: Rename<'_>) -> Field {
    Field {
        name: rename(&field.name),
        ..field
    }
}

pub(crate) fn rewrite_schema(schema: SchemaDefinition, rename: Rename<'_>) -> SchemaDefinition {
    let names =
        |names: Vec<String>| -> Vec<String> { names.iter().map(|name| rename(name)).collect() };
    SchemaDefinition {
        fields: schema
            .fields
            .into_iter()
            .map(|field| rewrite_field(field, rename))
            .collect(),
        indexes: schema
            .indexes
            .into_iter()
            .map(|index| Index {
                index_name: index.index_name,
                columns: names(index.columns),
            })
            .collect(),
        column_store_keys: names(schema.column_store_keys),
        shard_keys: names(schema.shard_keys),
    }
}

pub(crate) fn rewrite_definition(
    dataset: DatasetDefinition,
    rename: Rename<'_>,
) -> DatasetDefinition {
    DatasetDefinition {
        reference: rewrite_reference(dataset.reference, rename),
        schema: rewrite_schema(dataset.schema, rename),
        filters: dataset
            .filters
            .into_iter()
            .map(|mut filter| {
                filter.field_name = rename(&filter.field_name);
                filter
            })
            .collect(),
    }
}

pub(crate) fn rewrite_staged_files(
    files: StagedFilesDataset,
    rename: Rename<'_>,
) -> StagedFilesDataset {
    StagedFilesDataset {
        reference: rewrite_reference(files.reference, rename),
        schema: rewrite_schema(files.schema, rename),
        ..files
    }
}

fn rewrite_dataset(dataset: Dataset, rename: Rename<'_>) -> Dataset {
    match dataset {
        Dataset::Table(reference) => Dataset::Table(rewrite_reference(reference, rename)),
        Dataset::Derived { selection, alias } => Dataset::Derived {
            selection: Box::new(rewrite_selection(*selection, rename)),
            alias,
        },
        Dataset::StagedFiles(files) => Dataset::StagedFiles(rewrite_staged_files(files, rename)),
    }
}

fn rewrite_selection(selection: Selection, rename: Rename<'_>) -> Selection {
    Selection {
        source: selection.source.map(|source| rewrite_dataset(source, rename)),
        fields: rewrite_values(selection.fields, rename),
        condition: selection.condition.map(|c| rewrite_condition(c, rename)),
    }
}

fn rewrite_values(values: Vec<Value>, rename: Rename<'_>) -> Vec<Value> {
    values
        .into_iter()
        .map(|value| rewrite_value(value, rename))
        .collect()
}

fn rewrite_value(value: Value, rename: Rename<'_>) -> Value {
    match value {
        Value::Field(field) => Value::Field(FieldValue {
            dataset_alias: field.dataset_alias,
            field_name: rename(&field.field_name),
        }),
        Value::Function { name, args } => Value::Function {
            name,
            args: rewrite_values(args, rename),
        },
        Value::UserFunction { name, args } => Value::UserFunction {
            name,
            args: rewrite_values(args, rename),
        },
        Value::Window {
            function,
            partition_by,
            order_by,
        } => Value::Window {
            function,
            partition_by: rewrite_values(partition_by, rename),
            order_by: order_by
                .into_iter()
                .map(|(value, order)| (rewrite_value(value, rename), order))
                .collect(),
        },
        Value::Binary { left, op, right } => Value::Binary {
            left: Box::new(rewrite_value(*left, rename)),
            op,
            right: Box::new(rewrite_value(*right, rename)),
        },
        Value::Selection(selection) => {
            Value::Selection(Box::new(rewrite_selection(*selection, rename)))
        }
        Value::BatchId(BatchIdValue::Computed(selection)) => Value::BatchId(
            BatchIdValue::Computed(Box::new(rewrite_selection(*selection, rename))),
        ),
        Value::Array(values) => Value::Array(rewrite_values(values, rename)),
        Value::Aliased { value, alias } => Value::Aliased {
            value: Box::new(rewrite_value(*value, rename)),
            alias: rename(&alias),
        },
        Value::Named { value, column } => Value::Named {
            value: Box::new(rewrite_value(*value, rename)),
            column: rename(&column),
        },
        literal @ (Value::String(_)
        | Value::Numeric(_)
        | Value::Object(_)
        | Value::BatchId(BatchIdValue::Placeholder(_))
        | Value::BatchTimestamp(_)
        | Value::InfiniteBatchId
        | Value::InfiniteBatchTime
        | Value::All) => literal,
    }
}

fn rewrite_condition(condition: Condition, rename: Rename<'_>) -> Condition {
    let pair =
        |left: Value, right: Value| (rewrite_value(left, rename), rewrite_value(right, rename));
    match condition {
        Condition::Equals(l, r) => {
            let (l, r) = pair(l, r);
            Condition::Equals(l, r)
        }
        Condition::NotEquals(l, r) => {
            let (l, r) = pair(l, r);
            Condition::NotEquals(l, r)
        }
        Condition::GreaterThan(l, r) => {
            let (l, r) = pair(l, r);
            Condition::GreaterThan(l, r)
        }
        Condition::GreaterThanEqual(l, r) => {
            let (l, r) = pair(l, r);
            Condition::GreaterThanEqual(l, r)
        }
        Condition::LessThan(l, r) => {
            let (l, r) = pair(l, r);
            Condition::LessThan(l, r)
        }
        Condition::LessThanEqual(l, r) => {
            let (l, r) = pair(l, r);
            Condition::LessThanEqual(l, r)
        }
        Condition::In(l, r) => {
            let (l, r) = pair(l, r);
            Condition::In(l, r)
        }
        Condition::NotIn(l, r) => {
            let (l, r) = pair(l, r);
            Condition::NotIn(l, r)
        }
        Condition::And(conditions) => Condition::And(
            conditions
                .into_iter()
                .map(|c| rewrite_condition(c, rename))
                .collect(),
        ),
        Condition::Or(conditions) => Condition::Or(
            conditions
                .into_iter()
                .map(|c| rewrite_condition(c, rename))
                .collect(),
        ),
        Condition::Not(inner) => Condition::Not(Box::new(rewrite_condition(*inner, rename))),
        Condition::Exists(selection) => {
            Condition::Exists(Box::new(rewrite_selection(*selection, rename)))
        }
    }
}
