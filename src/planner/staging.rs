//! The staging side of a plan: filters, data splits and deduplication

use crate::models::{
    Condition, Dataset, DatasetFilter, FilterType, FunctionName, Selection, SortOrder,
    StagingDataset, Value, and_all, data_split_in_range_condition,
};

use super::PlanContext;

/// Column holding the per-key rank inside a deduplicated staging source
pub const ROW_NUMBER_COLUMN: &str = "row_num";

/// Staging rows as a plan reads them.
///
/// `filter` holds whatever condition still has to be applied on top of
/// `dataset`. A deduplicated source already applies its filter before ranking
/// rows, so its `filter` is empty.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StagingSource {
    pub dataset: Dataset,
    pub filter: Option<Condition>,
}

impl StagingSource {
    /// `SELECT <fields> FROM <staging> WHERE <condition> AND <filter>`
    pub fn select(&self, fields: Vec<Value>, condition: Option<Condition>) -> Selection {
        Selection::new(self.dataset.clone(), fields)
            .filter(and_all([condition, self.filter.clone()]))
    }

    /// Conjunction of `conditions` with this source's filter
    pub fn condition(&self, conditions: Vec<Option<Condition>>) -> Option<Condition> {
        and_all(conditions.into_iter().chain([self.filter.clone()]))
    }
}

fn filter_condition(alias: &str, filter: &DatasetFilter) -> Condition {
    let field = Value::field(alias, &filter.field_name);
    let value = Value::Object(filter.value.clone());
    match filter.filter_type {
        FilterType::EqualTo => Condition::Equals(field, value),
        FilterType::NotEqualTo => Condition::NotEquals(field, value),
        FilterType::GreaterThan => Condition::GreaterThan(field, value),
        FilterType::GreaterThanEqual => Condition::GreaterThanEqual(field, value),
        FilterType::LessThan => Condition::LessThan(field, value),
        FilterType::LessThanEqual => Condition::LessThanEqual(field, value),
    }
}

impl PlanContext<'_> {
    /// Dataset filters plus the data split range, against the raw staging table
    pub fn staging_filter(&self) -> Option<Condition> {
        let alias = self.staging_alias();
        let filters = self
            .staging
            .filters()
            .iter()
            .map(|filter| Some(filter_condition(alias, filter)));
        let split = self
            .mode
            .data_split_field()
            .map(|field| data_split_in_range_condition(alias, field));
        and_all(filters.chain([split]))
    }

    /// Staging projected onto its own columns, qualified by the staging alias
    pub fn staging_columns(&self) -> Vec<Value> {
        self.staging
            .schema()
            .fields
            .iter()
            .map(|field| self.staging_field(&field.name))
            .collect()
    }

    /// The raw staging table, for counts over the incoming batch
    pub fn raw_staging_source(&self) -> Dataset {
        match &self.staging {
            StagingDataset::Table(dataset) => dataset.as_source(),
            StagingDataset::StagedFiles(files) => Dataset::StagedFiles(files.clone()),
        }
    }

    /// Staging as read by the ingest statements.
    ///
    /// With a version field only the highest version of each primary key
    /// survives:
    ///
    /// ```sql
    /// (SELECT <cols> FROM
    ///     (SELECT <cols>, ROW_NUMBER() OVER (PARTITION BY <pks> ORDER BY <version> DESC) as "row_num"
    ///      FROM <staging> WHERE <filter>) as stage
    ///  WHERE stage."row_num" = 1) as stage
    /// ```
    pub fn staging_source(&self, version_field: Option<&str>) -> StagingSource {
        let filter = self.staging_filter();
        let Some(version_field) = version_field else {
            return StagingSource {
                dataset: self.raw_staging_source(),
                filter,
            };
        };

        let alias = self.staging_alias().to_string();
        let columns = self.staging_columns();
        let rank = Value::Window {
            function: FunctionName::RowNumber,
            partition_by: self
                .primary_keys()
                .iter()
                .map(|key| Value::field(&alias, key))
                .collect(),
            order_by: vec![(Value::field(&alias, version_field), SortOrder::Desc)],
        }
        .named(ROW_NUMBER_COLUMN);

        let mut ranked_fields = columns.clone();
        ranked_fields.push(rank);
        let ranked = Selection::new(self.raw_staging_source(), ranked_fields).filter(filter);

        let latest = Selection::new(
            Dataset::Derived {
                selection: Box::new(ranked),
                alias: alias.clone(),
            },
            columns,
        )
        .with_condition(Condition::Equals(
            Value::field(&alias, ROW_NUMBER_COLUMN),
            Value::Numeric(1),
        ));

        StagingSource {
            dataset: Dataset::Derived {
                selection: Box::new(latest),
                alias,
            },
            filter: None,
        }
    }
}
