//! Recursive-descent SQL printer
//!
//! Every node renders to an owned `String`; parents compose their children's
//! output. The printer holds no state besides the sink it renders for, so the
//! same plan and sink always produce the same text.

use chrono::NaiveDateTime;

use crate::error::{IngestError, IngestResult};
use crate::models::{
    ArithmeticOp, BatchIdValue, Condition, Dataset, DatasetDefinition, DatasetReference, Field,
    FileFormat, FunctionName, LogicalPlan, Operation, Selection, SortOrder, StagedFilesDataset,
    TimestampValue, Value,
};
use crate::validation::input::{quote_identifier, quote_string_literal};

use super::sink::{AliasQuoting, SinkCapabilities};

/// Batch id sentinel of an open row
pub const INFINITE_BATCH_ID: i64 = 999_999_999;

/// Batch time sentinel of an open row
pub const INFINITE_BATCH_TIME: &str = "9999-12-31 23:59:59";

/// Renders logical plans for one sink.
///
/// # Example
///
/// ```rust
/// use ingest_sql_sdk::models::{Condition, Dataset, DatasetReference, Operation, Selection, Value};
/// use ingest_sql_sdk::transformer::{SinkCapabilities, SqlRenderer};
///
/// let sink = SinkCapabilities::ansi();
/// let main = DatasetReference::new("main").with_database("mydb").with_alias("sink");
/// let count = Selection::new(Dataset::Table(main), vec![Value::count_all().alias("rowsInserted")])
///     .with_condition(Condition::Equals(Value::field("sink", "batch_id"), Value::Numeric(1)));
///
/// let sql = SqlRenderer::new(&sink).render_operation(&Operation::Select(count)).unwrap();
/// assert_eq!(
///     sql,
///     r#"SELECT COUNT(*) as rowsInserted FROM "mydb"."main" as sink WHERE sink."batch_id" = 1"#
/// );
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SqlRenderer<'a> {
    sink: &'a SinkCapabilities,
}

impl<'a> SqlRenderer<'a> {
    pub fn new(sink: &'a SinkCapabilities) -> Self {
        Self { sink }
    }

    /// One statement per operation, in plan order
    pub fn render_plan(&self, plan: &LogicalPlan) -> IngestResult<Vec<String>> {
        plan.operations
            .iter()
            .map(|operation| self.render_operation(operation))
            .collect()
    }

    pub fn render_operation(&self, operation: &Operation) -> IngestResult<String> {
        match operation {
            Operation::Create {
                dataset,
                if_not_exists,
            } => self.render_create(dataset, *if_not_exists),
            Operation::Insert {
                target,
                columns,
                source,
            } => {
                let columns = columns
                    .iter()
                    .map(|column| self.quote(column))
                    .collect::<Vec<_>>()
                    .join(", ");
                let select = self.render_selection(source)?;
                let select = if self.sink.parenthesize_insert_select {
                    format!("({})", select)
                } else {
                    select
                };
                Ok(format!(
                    "INSERT INTO {} ({}) {}",
                    self.render_reference(target),
                    columns,
                    select
                ))
            }
            Operation::Update {
                target,
                assignments,
                condition,
            } => {
                let qualifier = target.alias.as_deref();
                let assignments = assignments
                    .iter()
                    .map(|(column, value)| {
                        Ok(format!(
                            "{} = {}",
                            self.render_column(qualifier, column),
                            self.render_value(value)?
                        ))
                    })
                    .collect::<IngestResult<Vec<_>>>()?
                    .join(",");
                let mut sql = format!(
                    "UPDATE {} SET {}",
                    self.render_aliased_reference(target),
                    assignments
                );
                if let Some(condition) = condition {
                    sql.push_str(" WHERE ");
                    sql.push_str(&self.render_condition(condition)?);
                }
                Ok(sql)
            }
            Operation::Delete { target, condition } => {
                let mut sql = format!("DELETE FROM {}", self.render_aliased_reference(target));
                if let Some(condition) = condition {
                    sql.push_str(" WHERE ");
                    sql.push_str(&self.render_condition(condition)?);
                }
                Ok(sql)
            }
            Operation::Select(selection) => self.render_selection(selection),
            Operation::AlterAddColumn { target, field } => Ok(format!(
                "ALTER TABLE {} ADD COLUMN {} {}",
                self.render_reference(target),
                self.quote(&field.name),
                self.sink.type_name(&field.field_type)
            )),
            Operation::Drop { target, if_exists } => Ok(format!(
                "DROP TABLE {}{}",
                if *if_exists { "IF EXISTS " } else { "" },
                self.render_reference(target)
            )),
        }
    }

    fn render_create(
        &self,
        dataset: &DatasetDefinition,
        if_not_exists: bool,
    ) -> IngestResult<String> {
        let mut parts = dataset
            .schema
            .fields
            .iter()
            .map(|field| self.render_column_definition(field))
            .collect::<IngestResult<Vec<_>>>()?;

        let primary_keys = dataset.schema.primary_keys();
        if !primary_keys.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", self.quote_list(&primary_keys)));
        }
        if self.sink.supports_shard_keys {
            if !dataset.schema.shard_keys.is_empty() {
                parts.push(format!(
                    "SHARD KEY ({})",
                    self.quote_list(&dataset.schema.shard_keys)
                ));
            }
            if !dataset.schema.column_store_keys.is_empty() {
                parts.push(format!(
                    "SORT KEY ({})",
                    self.quote_list(&dataset.schema.column_store_keys)
                ));
            }
        }

        Ok(format!(
            "CREATE TABLE {}{}({})",
            if if_not_exists { "IF NOT EXISTS " } else { "" },
            self.render_reference(&dataset.reference),
            parts.join(",")
        ))
    }

    fn render_column_definition(&self, field: &Field) -> IngestResult<String> {
        let mut sql = format!(
            "{} {}",
            self.quote(&field.name),
            self.sink.type_name(&field.field_type)
        );
        if !field.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &field.default_value {
            sql.push_str(" DEFAULT ");
            sql.push_str(&self.render_literal(default));
        }
        if field.identity {
            let clause = self.sink.identity_clause.as_deref().ok_or_else(|| {
                IngestError::UnsupportedDialect(format!(
                    "Sink [{}] cannot declare identity column [{}]",
                    self.sink.name, field.name
                ))
            })?;
            sql.push(' ');
            sql.push_str(clause);
        }
        if field.unique {
            sql.push_str(" UNIQUE");
        }
        Ok(sql)
    }

    /// `SELECT <fields> [FROM <source>] [WHERE <condition>]`, without parentheses
    pub fn render_selection(&self, selection: &Selection) -> IngestResult<String> {
        let fields = selection
            .fields
            .iter()
            .map(|value| self.render_value(value))
            .collect::<IngestResult<Vec<_>>>()?
            .join(",");
        let mut sql = format!("SELECT {}", fields);
        if let Some(source) = &selection.source {
            sql.push_str(" FROM ");
            sql.push_str(&self.render_dataset(source)?);
        }
        if let Some(condition) = &selection.condition {
            sql.push_str(" WHERE ");
            sql.push_str(&self.render_condition(condition)?);
        }
        Ok(sql)
    }

    fn render_dataset(&self, dataset: &Dataset) -> IngestResult<String> {
        match dataset {
            Dataset::Table(reference) => Ok(self.render_aliased_reference(reference)),
            Dataset::Derived { selection, alias } => {
                Ok(format!("({}) as {}", self.render_selection(selection)?, alias))
            }
            Dataset::StagedFiles(files) => self.render_staged_files(files),
        }
    }

    fn render_staged_files(&self, files: &StagedFilesDataset) -> IngestResult<String> {
        if !self.sink.supports_staged_files {
            return Err(IngestError::UnsupportedDialect(format!(
                "Sink [{}] cannot read staged files",
                self.sink.name
            )));
        }
        let paths = files
            .file_paths
            .iter()
            .map(|path| quote_string_literal(path))
            .collect::<Vec<_>>()
            .join(",");
        let mut arguments = vec![format!("[{}]", paths)];
        if files.file_format == FileFormat::Csv {
            let columns = files
                .schema
                .fields
                .iter()
                .map(|field| {
                    format!(
                        "{}:{}",
                        quote_string_literal(&field.name),
                        quote_string_literal(&self.sink.type_name(&field.field_type))
                    )
                })
                .collect::<Vec<_>>()
                .join(", ");
            arguments.push(format!("COLUMNS = {{{}}}", columns));
            arguments.push("AUTO_DETECT = FALSE".to_string());
        }
        for (key, value) in &files.load_options {
            arguments.push(format!("{}={}", key, self.render_literal(value)));
        }
        Ok(format!("READ_{}({})", files.file_format, arguments.join(", ")))
    }

    /// Qualified name without alias: `"db"."group"."name"`, or a bare `name`
    fn render_reference(&self, reference: &DatasetReference) -> String {
        if reference.database.is_none() && reference.group.is_none() {
            return reference.name.clone();
        }
        [
            reference.database.as_deref(),
            reference.group.as_deref(),
            Some(reference.name.as_str()),
        ]
        .into_iter()
        .flatten()
        .map(|part| self.quote(part))
        .collect::<Vec<_>>()
        .join(".")
    }

    fn render_aliased_reference(&self, reference: &DatasetReference) -> String {
        match &reference.alias {
            Some(alias) => format!("{} as {}", self.render_reference(reference), alias),
            None => self.render_reference(reference),
        }
    }

    fn render_column(&self, qualifier: Option<&str>, column: &str) -> String {
        match qualifier {
            Some(alias) => format!("{}.{}", alias, self.quote(column)),
            None => self.quote(column),
        }
    }

    pub fn render_value(&self, value: &Value) -> IngestResult<String> {
        match value {
            Value::Field(field) => Ok(self.render_column(
                field.dataset_alias.as_deref(),
                &field.field_name,
            )),
            Value::String(s) => Ok(quote_string_literal(s)),
            Value::Numeric(n) => Ok(n.to_string()),
            Value::Object(object) => Ok(self.render_literal(object)),
            Value::Function { name, args } => {
                self.check_function(*name)?;
                Ok(format!("{}({})", name.sql_name(), self.render_values(args)?))
            }
            Value::UserFunction { name, args } => {
                Ok(format!("{}({})", name, self.render_values(args)?))
            }
            Value::Window {
                function,
                partition_by,
                order_by,
            } => {
                self.check_function(*function)?;
                let mut over = Vec::new();
                if !partition_by.is_empty() {
                    over.push(format!("PARTITION BY {}", self.render_values(partition_by)?));
                }
                if !order_by.is_empty() {
                    let order = order_by
                        .iter()
                        .map(|(value, order)| {
                            let direction = match order {
                                SortOrder::Asc => "ASC",
                                SortOrder::Desc => "DESC",
                            };
                            Ok(format!("{} {}", self.render_value(value)?, direction))
                        })
                        .collect::<IngestResult<Vec<_>>>()?
                        .join(",");
                    over.push(format!("ORDER BY {}", order));
                }
                Ok(format!("{}() OVER ({})", function.sql_name(), over.join(" ")))
            }
            Value::Binary { left, op, right } => {
                let op = match op {
                    ArithmeticOp::Plus => "+",
                    ArithmeticOp::Minus => "-",
                };
                Ok(format!(
                    "{}{}{}",
                    self.render_value(left)?,
                    op,
                    self.render_value(right)?
                ))
            }
            Value::Selection(selection) => Ok(format!("({})", self.render_selection(selection)?)),
            Value::BatchId(BatchIdValue::Computed(selection)) => {
                Ok(format!("({})", self.render_selection(selection)?))
            }
            Value::BatchId(BatchIdValue::Placeholder(pattern)) => Ok(pattern.clone()),
            Value::BatchTimestamp(TimestampValue::Clock(time)) => {
                Ok(quote_string_literal(&self.format_timestamp(time)))
            }
            Value::BatchTimestamp(TimestampValue::Placeholder(pattern)) => {
                Ok(quote_string_literal(pattern))
            }
            Value::BatchTimestamp(TimestampValue::CurrentTimestamp) => {
                self.check_function(FunctionName::CurrentTimestamp)?;
                Ok(format!("{}()", FunctionName::CurrentTimestamp.sql_name()))
            }
            Value::InfiniteBatchId => Ok(INFINITE_BATCH_ID.to_string()),
            Value::InfiniteBatchTime => Ok(quote_string_literal(INFINITE_BATCH_TIME)),
            Value::Array(values) => Ok(format!("({})", self.render_values(values)?)),
            Value::All => Ok("*".to_string()),
            Value::Aliased { value, alias } => {
                let alias = match self.sink.alias_quoting {
                    AliasQuoting::Bare => alias.clone(),
                    AliasQuoting::Quoted => self.quote(alias),
                };
                Ok(format!("{} as {}", self.render_value(value)?, alias))
            }
            Value::Named { value, column } => Ok(format!(
                "{} as {}",
                self.render_value(value)?,
                self.quote(column)
            )),
        }
    }

    pub fn render_condition(&self, condition: &Condition) -> IngestResult<String> {
        let binary = |left: &Value, op: &str, right: &Value| -> IngestResult<String> {
            Ok(format!(
                "{} {} {}",
                self.render_value(left)?,
                op,
                self.render_value(right)?
            ))
        };
        match condition {
            Condition::Equals(left, right) => binary(left, "=", right),
            Condition::NotEquals(left, right) => binary(left, "<>", right),
            Condition::GreaterThan(left, right) => binary(left, ">", right),
            Condition::GreaterThanEqual(left, right) => binary(left, ">=", right),
            Condition::LessThan(left, right) => binary(left, "<", right),
            Condition::LessThanEqual(left, right) => binary(left, "<=", right),
            Condition::In(left, right) => binary(left, "IN", right),
            Condition::NotIn(left, right) => binary(left, "NOT IN", right),
            Condition::And(conditions) => self.render_junction(conditions, " AND "),
            Condition::Or(conditions) => self.render_junction(conditions, " OR "),
            Condition::Not(inner) => Ok(format!("NOT ({})", self.render_condition(inner)?)),
            Condition::Exists(selection) => {
                Ok(format!("EXISTS ({})", self.render_selection(selection)?))
            }
        }
    }

    fn render_junction(&self, conditions: &[Condition], separator: &str) -> IngestResult<String> {
        match conditions {
            [] => Err(IngestError::PlanningInvariantViolation(format!(
                "empty{}list",
                separator
            ))),
            [single] => self.render_condition(single),
            _ => Ok(conditions
                .iter()
                .map(|condition| Ok(format!("({})", self.render_condition(condition)?)))
                .collect::<IngestResult<Vec<_>>>()?
                .join(separator)),
        }
    }

    fn render_values(&self, values: &[Value]) -> IngestResult<String> {
        Ok(values
            .iter()
            .map(|value| self.render_value(value))
            .collect::<IngestResult<Vec<_>>>()?
            .join(","))
    }

    /// Typed JSON literal: strings quoted, numbers and booleans bare
    fn render_literal(&self, value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::Null => "NULL".to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) => quote_string_literal(s),
            other => quote_string_literal(&other.to_string()),
        }
    }

    fn check_function(&self, function: FunctionName) -> IngestResult<()> {
        if self.sink.supports(function) {
            Ok(())
        } else {
            Err(IngestError::UnsupportedDialect(format!(
                "Function [{}] is not supported by sink [{}]",
                function.sql_name(),
                self.sink.name
            )))
        }
    }

    pub fn format_timestamp(&self, time: &NaiveDateTime) -> String {
        time.format(&self.sink.timestamp_format).to_string()
    }

    fn quote(&self, identifier: &str) -> String {
        quote_identifier(identifier, self.sink.quote)
    }

    fn quote_list(&self, identifiers: &[String]) -> String {
        identifiers
            .iter()
            .map(|identifier| self.quote(identifier))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
