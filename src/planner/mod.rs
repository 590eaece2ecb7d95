//! Ingestion planner
//!
//! Turns datasets plus an ingest mode into an [`IngestPlan`]: ordered logical
//! plans for each phase of a batch. The executor is expected to run the
//! phases in this order, with `ingest`, `post_ingest_statistics` and
//! `metadata_ingest` inside one sufficiently isolated transaction:
//!
//! 1. `pre_actions`
//! 2. `pre_ingest_statistics`
//! 3. `ingest`
//! 4. `post_ingest_statistics`
//! 5. `metadata_ingest`
//! 6. `post_actions`
//! 7. `post_cleanup`
//!
//! Statistics read the next batch id before the metadata row is written, so
//! they observe the batch being ingested.

mod append_only;
mod bulk_load;
mod nontemporal;
mod schema;
mod staging;
mod statistics;
mod unitemporal;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::error::IngestResult;
use crate::ingest_mode::IngestMode;
use crate::metadata::{DEFAULT_BATCH_STATUS, MetadataDataset, MetadataRow, MetadataUtils};
use crate::models::{
    Dataset, DatasetDefinition, DatasetReference, LogicalPlan, Operation, Selection,
    StagingDataset, TimestampValue, Value,
};
use crate::validation::DatasetValidator;

pub(crate) use schema::generated_fields;

/// Alias given to the main dataset when the caller sets none
pub const DEFAULT_MAIN_ALIAS: &str = "sink";
/// Alias given to the staging dataset when the caller sets none
pub const DEFAULT_STAGING_ALIAS: &str = "stage";

/// The datasets of one ingestion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datasets {
    pub main: DatasetDefinition,
    pub staging: StagingDataset,
}

impl Datasets {
    pub fn new(main: DatasetDefinition, staging: impl Into<StagingDataset>) -> Self {
        Self {
            main,
            staging: staging.into(),
        }
    }
}

/// Statistics a plan can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatisticName {
    IncomingRecordCount,
    RowsInserted,
    RowsUpdated,
    RowsTerminated,
    RowsDeleted,
}

impl StatisticName {
    /// Column alias of the statistic's result
    pub fn alias(&self) -> &'static str {
        match self {
            StatisticName::IncomingRecordCount => "incomingRecordCount",
            StatisticName::RowsInserted => "rowsInserted",
            StatisticName::RowsUpdated => "rowsUpdated",
            StatisticName::RowsTerminated => "rowsTerminated",
            StatisticName::RowsDeleted => "rowsDeleted",
        }
    }
}

impl fmt::Display for StatisticName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatisticName::IncomingRecordCount => "INCOMING_RECORD_COUNT",
            StatisticName::RowsInserted => "ROWS_INSERTED",
            StatisticName::RowsUpdated => "ROWS_UPDATED",
            StatisticName::RowsTerminated => "ROWS_TERMINATED",
            StatisticName::RowsDeleted => "ROWS_DELETED",
        };
        write!(f, "{}", name)
    }
}

/// Options that shape a plan independently of the target sink
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerOptions {
    pub collect_statistics: bool,
    /// Delete staging rows once the batch is recorded
    pub cleanup_staging_data: bool,
    /// Create the staging table in pre-actions and drop it in post-actions
    pub create_staging_dataset: bool,
    /// Add staging columns missing from an explicit main schema
    pub enable_schema_evolution: bool,
    /// Compare `UPPER(table_name)` in metadata lookups
    pub case_insensitive_metadata_lookup: bool,
    /// Pre-allocated batch id token, e.g. `{NEXT_BATCH_ID_PATTERN}`
    pub batch_id_pattern: Option<String>,
    pub batch_start: TimestampValue,
    pub batch_end: TimestampValue,
    pub metadata: MetadataDataset,
    pub batch_status: String,
    /// Table name recorded in the ledger; defaults to the main table name
    pub ledger_table_name: Option<String>,
    pub additional_metadata: BTreeMap<String, serde_json::Value>,
    pub ingest_request_id: Option<String>,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            collect_statistics: false,
            cleanup_staging_data: false,
            create_staging_dataset: false,
            enable_schema_evolution: false,
            case_insensitive_metadata_lookup: false,
            batch_id_pattern: None,
            batch_start: TimestampValue::Clock(Utc::now().naive_utc()),
            batch_end: TimestampValue::CurrentTimestamp,
            metadata: MetadataDataset::default(),
            batch_status: DEFAULT_BATCH_STATUS.to_string(),
            ledger_table_name: None,
            additional_metadata: BTreeMap::new(),
            ingest_request_id: None,
        }
    }
}

/// Logical plans for every phase of one batch
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IngestPlan {
    pub pre_actions: LogicalPlan,
    pub ingest: LogicalPlan,
    pub metadata_ingest: LogicalPlan,
    pub post_actions: LogicalPlan,
    pub post_cleanup: LogicalPlan,
    pub pre_ingest_statistics: BTreeMap<StatisticName, Selection>,
    pub post_ingest_statistics: BTreeMap<StatisticName, Selection>,
}

/// What a mode planner contributes to the plan
#[derive(Debug, Default)]
pub(crate) struct ModePlan {
    pub ingest: Vec<Operation>,
    pub pre_statistics: BTreeMap<StatisticName, Selection>,
    pub post_statistics: BTreeMap<StatisticName, Selection>,
    pub batch_source_info: Option<serde_json::Value>,
}

/// Resolved datasets and helpers shared by the mode planners
pub(crate) struct PlanContext<'a> {
    pub mode: &'a IngestMode,
    pub options: &'a PlannerOptions,
    pub main: DatasetDefinition,
    pub staging: StagingDataset,
    pub metadata: MetadataUtils,
    ledger_table: String,
}

impl PlanContext<'_> {
    pub fn main_alias(&self) -> &str {
        self.main.alias()
    }

    pub fn staging_alias(&self) -> &str {
        self.staging.reference().alias_or_name()
    }

    /// Main table with its alias, for `FROM`, `UPDATE` and `DELETE`
    pub fn main_reference(&self) -> DatasetReference {
        self.main.reference.clone()
    }

    pub fn main_source(&self) -> Dataset {
        self.main.as_source()
    }

    /// Main under a second alias, for self-correlated statistics
    pub fn main_source_as(&self, alias: &str) -> Dataset {
        Dataset::Table(self.main.reference.clone().with_alias(alias))
    }

    pub fn main_field(&self, name: &str) -> Value {
        Value::field(self.main_alias(), name)
    }

    pub fn staging_field(&self, name: &str) -> Value {
        match &self.staging {
            StagingDataset::Table(_) => Value::field(self.staging_alias(), name),
            StagingDataset::StagedFiles(_) => Value::bare_field(name),
        }
    }

    pub fn primary_keys(&self) -> Vec<String> {
        self.staging.schema().primary_keys()
    }

    pub fn batch_id(&self) -> Value {
        self.metadata.batch_id(
            &self.ledger_table,
            self.options.batch_id_pattern.as_deref(),
            self.options.case_insensitive_metadata_lookup,
        )
    }

    pub fn prev_batch_id(&self) -> Value {
        self.metadata.prev_batch_id(
            &self.ledger_table,
            self.options.batch_id_pattern.as_deref(),
            self.options.case_insensitive_metadata_lookup,
        )
    }

    pub fn batch_start(&self) -> Value {
        Value::BatchTimestamp(self.options.batch_start.clone())
    }
}

/// Plans ingestion for one mode.
///
/// # Example
///
/// ```rust
/// use ingest_sql_sdk::ingest_mode::{AppendOnly, IngestMode};
/// use ingest_sql_sdk::models::{DataType, DatasetDefinition, Field};
/// use ingest_sql_sdk::planner::{Datasets, Planner, PlannerOptions};
///
/// let staging = DatasetDefinition::new("staging")
///     .with_fields(vec![Field::new("id", DataType::Int), Field::new("name", DataType::String)]);
/// let datasets = Datasets::new(DatasetDefinition::new("main"), staging);
/// let mode = IngestMode::AppendOnly(AppendOnly::default());
///
/// let plan = Planner::new(&mode, &PlannerOptions::default()).plan(&datasets).unwrap();
/// assert_eq!(plan.ingest.len(), 1);
/// assert_eq!(plan.metadata_ingest.len(), 1);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Planner<'a> {
    mode: &'a IngestMode,
    options: &'a PlannerOptions,
}

impl<'a> Planner<'a> {
    pub fn new(mode: &'a IngestMode, options: &'a PlannerOptions) -> Self {
        Self { mode, options }
    }

    fn context(&self, datasets: &Datasets) -> IngestResult<PlanContext<'a>> {
        DatasetValidator::new().validate(&datasets.main, &datasets.staging, self.mode)?;

        let mut main = datasets.main.clone();
        if main.reference.alias.is_none() {
            main.reference.alias = Some(DEFAULT_MAIN_ALIAS.to_string());
        }
        main.schema = schema::resolve_main_schema(
            &datasets.main,
            &datasets.staging,
            self.mode,
            self.options.enable_schema_evolution,
        )?;

        let mut staging = datasets.staging.clone();
        if let StagingDataset::Table(dataset) = &mut staging
            && dataset.reference.alias.is_none()
        {
            dataset.reference.alias = Some(DEFAULT_STAGING_ALIAS.to_string());
        }

        let ledger_table = self
            .options
            .ledger_table_name
            .clone()
            .unwrap_or_else(|| datasets.main.name().to_string());

        Ok(PlanContext {
            mode: self.mode,
            options: self.options,
            main,
            staging,
            metadata: MetadataUtils::new(self.options.metadata.clone()),
            ledger_table,
        })
    }

    /// Plan a batch that moves staging data into main.
    pub fn plan(&self, datasets: &Datasets) -> IngestResult<IngestPlan> {
        let ctx = self.context(datasets)?;
        let mode_plan = match self.mode {
            IngestMode::AppendOnly(mode) => append_only::plan(&ctx, mode)?,
            IngestMode::NontemporalSnapshot(mode) => nontemporal::plan_snapshot(&ctx, mode)?,
            IngestMode::NontemporalDelta(mode) => nontemporal::plan_delta(&ctx, mode)?,
            IngestMode::UnitemporalSnapshot(mode) => unitemporal::plan_snapshot(&ctx, mode)?,
            IngestMode::UnitemporalDelta(mode) => unitemporal::plan_delta(&ctx, mode)?,
            IngestMode::BulkLoad(mode) => bulk_load::plan(&ctx, mode)?,
        };
        Ok(self.assemble(&ctx, datasets, mode_plan))
    }

    /// Plan a batch whose staging data is known to be empty.
    ///
    /// Only a unitemporal snapshot with `DeleteTargetData` changes main: it
    /// closes every open row in scope. Every mode still records the batch.
    pub fn plan_empty_batch(&self, datasets: &Datasets) -> IngestResult<IngestPlan> {
        let ctx = self.context(datasets)?;
        let mode_plan = match self.mode {
            IngestMode::UnitemporalSnapshot(mode) => unitemporal::plan_empty_snapshot(&ctx, mode)?,
            IngestMode::AppendOnly(_)
            | IngestMode::NontemporalSnapshot(_)
            | IngestMode::NontemporalDelta(_)
            | IngestMode::UnitemporalDelta(_)
            | IngestMode::BulkLoad(_) => statistics::empty_batch(),
        };
        Ok(self.assemble(&ctx, datasets, mode_plan))
    }

    fn assemble(
        &self,
        ctx: &PlanContext<'_>,
        datasets: &Datasets,
        mode_plan: ModePlan,
    ) -> IngestPlan {
        let mut plan = IngestPlan::default();

        plan.pre_actions.push(Operation::Create {
            dataset: DatasetDefinition {
                reference: DatasetReference {
                    alias: None,
                    ..ctx.main.reference.clone()
                },
                schema: ctx.main.schema.clone(),
                filters: Vec::new(),
            },
            if_not_exists: true,
        });
        plan.pre_actions.push(ctx.metadata.create_table());
        if let StagingDataset::Table(staging) = &datasets.staging
            && self.options.create_staging_dataset
        {
            plan.pre_actions.push(Operation::Create {
                dataset: DatasetDefinition {
                    reference: DatasetReference {
                        alias: None,
                        ..staging.reference.clone()
                    },
                    schema: staging.schema.clone(),
                    filters: Vec::new(),
                },
                if_not_exists: true,
            });
            plan.post_actions.push(Operation::Drop {
                target: DatasetReference {
                    alias: None,
                    ..staging.reference.clone()
                },
                if_exists: true,
            });
        }
        for field in schema::evolved_fields(&datasets.main, &ctx.main) {
            plan.pre_actions.push(Operation::AlterAddColumn {
                target: DatasetReference {
                    alias: None,
                    ..ctx.main.reference.clone()
                },
                field,
            });
        }

        for operation in mode_plan.ingest {
            debug!(mode = self.mode.name(), kind = operation.kind(), "Planned operation");
            plan.ingest.push(operation);
        }

        plan.metadata_ingest.push(ctx.metadata.insert_metadata(MetadataRow {
            table_name: ctx.ledger_table.clone(),
            batch_id: ctx.batch_id(),
            batch_start: self.options.batch_start.clone(),
            batch_end: self.options.batch_end.clone(),
            batch_status: self.options.batch_status.clone(),
            batch_source_info: mode_plan.batch_source_info,
            additional_metadata: self.options.additional_metadata.clone(),
            ingest_request_id: self.options.ingest_request_id.clone(),
        }));

        if self.options.cleanup_staging_data
            && let StagingDataset::Table(_) = &ctx.staging
        {
            plan.post_cleanup.push(Operation::Delete {
                target: ctx.staging.reference().clone(),
                condition: None,
            });
        }

        if self.options.collect_statistics {
            plan.pre_ingest_statistics = mode_plan.pre_statistics;
            plan.post_ingest_statistics = mode_plan.post_statistics;
        }
        plan
    }
}
