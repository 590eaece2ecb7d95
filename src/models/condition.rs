//! Conditions of the logical plan and the builders the planners share

use super::dataset::SchemaDefinition;
use super::operation::Selection;
use super::value::Value;
use crate::error::{IngestError, IngestResult};

/// Token replaced by the lower bound of a data split range
pub const DATA_SPLIT_LOWER_BOUND_PLACEHOLDER: &str = "{DATA_SPLIT_LOWER_BOUND_PLACEHOLDER}";
/// Token replaced by the upper bound of a data split range
pub const DATA_SPLIT_UPPER_BOUND_PLACEHOLDER: &str = "{DATA_SPLIT_UPPER_BOUND_PLACEHOLDER}";

/// A boolean expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equals(Value, Value),
    NotEquals(Value, Value),
    GreaterThan(Value, Value),
    GreaterThanEqual(Value, Value),
    LessThan(Value, Value),
    LessThanEqual(Value, Value),
    In(Value, Value),
    NotIn(Value, Value),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
    Exists(Box<Selection>),
}

impl Condition {
    pub fn and(conditions: Vec<Condition>) -> Self {
        Condition::And(conditions)
    }

    pub fn or(conditions: Vec<Condition>) -> Self {
        Condition::Or(conditions)
    }

    pub fn not(condition: Condition) -> Self {
        Condition::Not(Box::new(condition))
    }

    pub fn exists(selection: Selection) -> Self {
        Condition::Exists(Box::new(selection))
    }

    /// Prepend `self` to an optional condition, producing an `And` when both exist
    pub fn and_then(self, rest: Option<Condition>) -> Condition {
        match rest {
            Some(rest) => Condition::And(vec![self, rest]),
            None => self,
        }
    }
}

/// Combine optional conditions with `And`, skipping absent ones.
///
/// Returns `None` when nothing is left and the bare condition when only one is.
pub fn and_all(conditions: impl IntoIterator<Item = Option<Condition>>) -> Option<Condition> {
    let mut present: Vec<Condition> = conditions.into_iter().flatten().collect();
    match present.len() {
        0 => None,
        1 => present.pop(),
        _ => Some(Condition::And(present)),
    }
}

/// `AND` of per-column `left.c = right.c`, used to detect matching natural keys
pub fn match_condition(left_alias: &str, right_alias: &str, columns: &[String]) -> Condition {
    Condition::And(
        columns
            .iter()
            .map(|column| {
                Condition::Equals(
                    Value::field(left_alias, column),
                    Value::field(right_alias, column),
                )
            })
            .collect(),
    )
}

/// `OR` of per-column `left.c <> right.c`, used to detect changed rows
pub fn non_match_condition(left_alias: &str, right_alias: &str, columns: &[String]) -> Condition {
    Condition::Or(
        columns
            .iter()
            .map(|column| {
                Condition::NotEquals(
                    Value::field(left_alias, column),
                    Value::field(right_alias, column),
                )
            })
            .collect(),
    )
}

/// `field >= lower AND field <= upper` against the data split placeholders.
///
/// The placeholders are substituted after rendering, so a single plan can be
/// replayed once per split range.
pub fn data_split_in_range_condition(alias: &str, data_split_field: &str) -> Condition {
    Condition::And(vec![
        Condition::GreaterThanEqual(
            Value::field(alias, data_split_field),
            Value::string(DATA_SPLIT_LOWER_BOUND_PLACEHOLDER),
        ),
        Condition::LessThanEqual(
            Value::field(alias, data_split_field),
            Value::string(DATA_SPLIT_UPPER_BOUND_PLACEHOLDER),
        ),
    ])
}

/// Conditions selecting rows flagged deleted and rows not flagged deleted.
///
/// One configured value yields `Equals`/`NotEquals`; two or more yield
/// `In`/`NotIn`. String-typed indicator columns compare against string
/// literals, other columns against typed object literals.
pub fn delete_indicator_condition(
    alias: &str,
    delete_field: &str,
    delete_values: &[serde_json::Value],
    staging_schema: &SchemaDefinition,
) -> IngestResult<(Condition, Condition)> {
    let field = staging_schema.field(delete_field).ok_or_else(|| {
        IngestError::configuration(format!(
            "Delete indicator [{}] not found in staging dataset",
            delete_field
        ))
    })?;
    if delete_values.is_empty() {
        return Err(IngestError::configuration(format!(
            "Delete indicator [{}] has no delete values",
            delete_field
        )));
    }

    let string_typed = field.field_type.data_type.is_string_like();
    let literal = |value: &serde_json::Value| -> Value {
        if string_typed {
            match value {
                serde_json::Value::String(s) => Value::String(s.clone()),
                other => Value::String(other.to_string()),
            }
        } else {
            Value::Object(value.clone())
        }
    };

    let indicator = Value::field(alias, delete_field);
    if let [single] = delete_values {
        Ok((
            Condition::Equals(indicator.clone(), literal(single)),
            Condition::NotEquals(indicator, literal(single)),
        ))
    } else {
        let values = Value::Array(delete_values.iter().map(literal).collect());
        Ok((
            Condition::In(indicator.clone(), values.clone()),
            Condition::NotIn(indicator, values),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataType, Field};
    use serde_json::json;

    fn staging_schema(indicator_type: DataType) -> SchemaDefinition {
        SchemaDefinition::new(vec![
            Field::new("id", DataType::Int).primary_key(),
            Field::new("delete_indicator", indicator_type),
        ])
    }

    #[test]
    fn test_single_delete_value_uses_equals() {
        let (deleted, kept) = delete_indicator_condition(
            "stage",
            "delete_indicator",
            &[json!(true)],
            &staging_schema(DataType::Boolean),
        )
        .unwrap();
        assert_eq!(
            deleted,
            Condition::Equals(
                Value::field("stage", "delete_indicator"),
                Value::Object(json!(true))
            )
        );
        assert!(matches!(kept, Condition::NotEquals(_, _)));
    }

    #[test]
    fn test_multiple_delete_values_use_in() {
        let (deleted, kept) = delete_indicator_condition(
            "stage",
            "delete_indicator",
            &[json!("yes"), json!(1)],
            &staging_schema(DataType::String),
        )
        .unwrap();
        let expected_values = Value::Array(vec![Value::string("yes"), Value::string("1")]);
        assert_eq!(
            deleted,
            Condition::In(
                Value::field("stage", "delete_indicator"),
                expected_values.clone()
            )
        );
        assert_eq!(
            kept,
            Condition::NotIn(Value::field("stage", "delete_indicator"), expected_values)
        );
    }

    #[test]
    fn test_missing_delete_indicator_is_configuration_error() {
        let err = delete_indicator_condition(
            "stage",
            "is_deleted",
            &[json!("yes")],
            &staging_schema(DataType::String),
        )
        .unwrap_err();
        assert_eq!(
            err,
            IngestError::Configuration(
                "Delete indicator [is_deleted] not found in staging dataset".to_string()
            )
        );
    }

    #[test]
    fn test_and_all_skips_missing_conditions() {
        let single = Condition::Equals(Value::bare_field("a"), Value::Numeric(1));
        assert_eq!(and_all([None, Some(single.clone())]), Some(single));
        assert_eq!(and_all([None, None]), None);
    }
}
