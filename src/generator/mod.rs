//! Relational generator
//!
//! The public entry point: plans a request, applies case conversion, and
//! renders every phase of the plan for the configured sink.

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::error::{IngestError, IngestResult};
use crate::ingest_mode::IngestMode;
use crate::metadata::{DEFAULT_BATCH_STATUS, MetadataDataset};
use crate::models::{
    DATA_SPLIT_LOWER_BOUND_PLACEHOLDER, DATA_SPLIT_UPPER_BOUND_PLACEHOLDER, LogicalPlan, Operation,
    Selection, StagingDataset, TimestampValue,
};
use crate::planner::{Datasets, IngestPlan, Planner, PlannerOptions, StatisticName};
use crate::transformer::sink::ANSI;
use crate::transformer::{
    CaseConversion, Optimizer, SinkCapabilities, SinkRegistry, convert_dataset,
    convert_ingest_mode, convert_staging, transform,
};
use crate::validation::input::{quote_string_literal, validate_placeholder};

fn default_sink() -> String {
    ANSI.to_string()
}

fn default_true() -> bool {
    true
}

fn default_batch_status() -> String {
    DEFAULT_BATCH_STATUS.to_string()
}

/// Everything a generation run needs besides the datasets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorOptions {
    pub ingest_mode: IngestMode,
    /// Sink tag looked up in the registry, e.g. `ansi` or `duckdb`
    #[serde(default = "default_sink")]
    pub sink: String,
    #[serde(default)]
    pub case_conversion: CaseConversion,
    /// Batch start time; the current UTC time when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_timestamp: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_start_ts_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_end_ts_pattern: Option<String>,
    #[serde(default = "default_true")]
    pub collect_statistics: bool,
    #[serde(default)]
    pub cleanup_staging_data: bool,
    #[serde(default)]
    pub create_staging_dataset: bool,
    #[serde(default)]
    pub enable_schema_evolution: bool,
    #[serde(default)]
    pub metadata: MetadataDataset,
    #[serde(default = "default_batch_status")]
    pub batch_status: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingest_request_id: Option<String>,
}

impl GeneratorOptions {
    pub fn new(ingest_mode: IngestMode) -> Self {
        Self {
            ingest_mode,
            sink: default_sink(),
            case_conversion: CaseConversion::default(),
            execution_timestamp: None,
            batch_id_pattern: None,
            batch_start_ts_pattern: None,
            batch_end_ts_pattern: None,
            collect_statistics: true,
            cleanup_staging_data: false,
            create_staging_dataset: false,
            enable_schema_evolution: false,
            metadata: MetadataDataset::default(),
            batch_status: default_batch_status(),
            additional_metadata: BTreeMap::new(),
            ingest_request_id: None,
        }
    }
}

/// Inclusive range of data split values ingested as one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSplitRange {
    pub lower: i64,
    pub upper: i64,
}

impl DataSplitRange {
    pub fn new(lower: i64, upper: i64) -> Self {
        Self { lower, upper }
    }
}

/// Rendered SQL of one batch.
///
/// Phases run in this order: `pre_actions_sql`, `pre_ingest_statistics_sql`,
/// `ingest_sql`, `post_ingest_statistics_sql`, `metadata_ingest_sql`,
/// `post_actions_sql`, `post_cleanup_sql`. The statements from `ingest_sql`
/// through `metadata_ingest_sql` belong in one serializable transaction.
#[must_use]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorResult {
    pub pre_actions_sql: Vec<String>,
    pub pre_ingest_statistics_sql: BTreeMap<StatisticName, String>,
    pub ingest_sql: Vec<String>,
    pub post_ingest_statistics_sql: BTreeMap<StatisticName, String>,
    pub metadata_ingest_sql: Vec<String>,
    pub post_actions_sql: Vec<String>,
    pub post_cleanup_sql: Vec<String>,
}

impl GeneratorResult {
    /// Every statement in execution order
    pub fn statements(&self) -> Vec<&str> {
        self.pre_actions_sql
            .iter()
            .chain(self.pre_ingest_statistics_sql.values())
            .chain(&self.ingest_sql)
            .chain(self.post_ingest_statistics_sql.values())
            .chain(&self.metadata_ingest_sql)
            .chain(&self.post_actions_sql)
            .chain(&self.post_cleanup_sql)
            .map(String::as_str)
            .collect()
    }

    fn map_sql(self, f: impl Fn(String) -> String) -> Self {
        let list = |sql: Vec<String>| -> Vec<String> { sql.into_iter().map(&f).collect() };
        let map = |sql: BTreeMap<StatisticName, String>| -> BTreeMap<StatisticName, String> {
            sql.into_iter().map(|(name, s)| (name, f(s))).collect()
        };
        Self {
            pre_actions_sql: list(self.pre_actions_sql),
            pre_ingest_statistics_sql: map(self.pre_ingest_statistics_sql),
            ingest_sql: list(self.ingest_sql),
            post_ingest_statistics_sql: map(self.post_ingest_statistics_sql),
            metadata_ingest_sql: list(self.metadata_ingest_sql),
            post_actions_sql: list(self.post_actions_sql),
            post_cleanup_sql: list(self.post_cleanup_sql),
        }
    }
}

/// Generates ingestion SQL for one ingest mode and sink.
///
/// # Example
///
/// ```rust
/// use ingest_sql_sdk::generator::RelationalGenerator;
/// use ingest_sql_sdk::ingest_mode::{IngestMode, NontemporalSnapshot};
/// use ingest_sql_sdk::models::{DataType, DatasetDefinition, Field};
/// use ingest_sql_sdk::planner::Datasets;
///
/// let staging = DatasetDefinition::new("staging")
///     .with_database("mydb")
///     .with_fields(vec![Field::new("id", DataType::Int).primary_key()]);
/// let main = DatasetDefinition::new("main").with_database("mydb");
///
/// let generator = RelationalGenerator::builder(IngestMode::NontemporalSnapshot(
///     NontemporalSnapshot::default(),
/// ))
/// .collect_statistics(false)
/// .build();
/// let result = generator.generate_operations(&Datasets::new(main, staging)).unwrap();
/// assert_eq!(result.ingest_sql[0], r#"DELETE FROM "mydb"."main" as sink"#);
/// ```
#[derive(Debug, Clone)]
pub struct RelationalGenerator {
    options: GeneratorOptions,
    registry: SinkRegistry,
}

/// Builder for [`RelationalGenerator`]
#[derive(Debug, Clone)]
pub struct RelationalGeneratorBuilder {
    options: GeneratorOptions,
    registry: SinkRegistry,
}

impl RelationalGeneratorBuilder {
    pub fn sink(mut self, sink: impl Into<String>) -> Self {
        self.options.sink = sink.into();
        self
    }

    pub fn case_conversion(mut self, conversion: CaseConversion) -> Self {
        self.options.case_conversion = conversion;
        self
    }

    pub fn execution_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.options.execution_timestamp = Some(timestamp);
        self
    }

    pub fn batch_id_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.options.batch_id_pattern = Some(pattern.into());
        self
    }

    pub fn batch_start_ts_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.options.batch_start_ts_pattern = Some(pattern.into());
        self
    }

    pub fn batch_end_ts_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.options.batch_end_ts_pattern = Some(pattern.into());
        self
    }

    pub fn collect_statistics(mut self, collect: bool) -> Self {
        self.options.collect_statistics = collect;
        self
    }

    pub fn cleanup_staging_data(mut self, cleanup: bool) -> Self {
        self.options.cleanup_staging_data = cleanup;
        self
    }

    pub fn create_staging_dataset(mut self, create: bool) -> Self {
        self.options.create_staging_dataset = create;
        self
    }

    pub fn enable_schema_evolution(mut self, enable: bool) -> Self {
        self.options.enable_schema_evolution = enable;
        self
    }

    pub fn metadata(mut self, metadata: MetadataDataset) -> Self {
        self.options.metadata = metadata;
        self
    }

    pub fn batch_status(mut self, status: impl Into<String>) -> Self {
        self.options.batch_status = status.into();
        self
    }

    pub fn additional_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.options.additional_metadata.insert(key.into(), value.into());
        self
    }

    pub fn ingest_request_id(mut self, id: impl Into<String>) -> Self {
        self.options.ingest_request_id = Some(id.into());
        self
    }

    /// Register an extra sink, replacing a built-in one with the same tag
    pub fn register_sink(mut self, sink: SinkCapabilities) -> Self {
        self.registry.register(sink);
        self
    }

    pub fn build(self) -> RelationalGenerator {
        RelationalGenerator {
            options: self.options,
            registry: self.registry,
        }
    }
}

impl RelationalGenerator {
    pub fn new(options: GeneratorOptions) -> Self {
        Self {
            options,
            registry: SinkRegistry::with_defaults(),
        }
    }

    pub fn builder(ingest_mode: IngestMode) -> RelationalGeneratorBuilder {
        RelationalGeneratorBuilder {
            options: GeneratorOptions::new(ingest_mode),
            registry: SinkRegistry::with_defaults(),
        }
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// Generate the SQL of one batch.
    pub fn generate_operations(&self, datasets: &Datasets) -> IngestResult<GeneratorResult> {
        if self.options.ingest_mode.data_split_field().is_some() {
            warn!(
                "Data split field configured without split ranges; range placeholders are left in the SQL"
            );
        }
        self.generate(datasets, false)
    }

    /// Generate the SQL of a batch whose staging data is empty.
    pub fn generate_operations_for_empty_batch(
        &self,
        datasets: &Datasets,
    ) -> IngestResult<GeneratorResult> {
        self.generate(datasets, true)
    }

    /// Plan once and render one batch per data split range.
    ///
    /// Each range is a batch of its own with its own metadata row; staging is
    /// dropped or cleaned up only after the last range.
    pub fn generate_operations_with_data_splits(
        &self,
        datasets: &Datasets,
        ranges: &[DataSplitRange],
    ) -> IngestResult<Vec<GeneratorResult>> {
        if self.options.ingest_mode.data_split_field().is_none() {
            return Err(IngestError::configuration(format!(
                "{} has no data split field",
                self.options.ingest_mode.name()
            )));
        }
        if ranges.is_empty() {
            return Err(IngestError::configuration(
                "At least one data split range is required",
            ));
        }

        let template = self.generate(datasets, false)?;
        let lower_token = quote_string_literal(DATA_SPLIT_LOWER_BOUND_PLACEHOLDER);
        let upper_token = quote_string_literal(DATA_SPLIT_UPPER_BOUND_PLACEHOLDER);
        let last = ranges.len() - 1;

        Ok(ranges
            .iter()
            .enumerate()
            .map(|(index, range)| {
                let mut result = template.clone().map_sql(|sql| {
                    sql.replace(&lower_token, &range.lower.to_string())
                        .replace(&upper_token, &range.upper.to_string())
                });
                if index != last {
                    result.post_actions_sql.clear();
                    result.post_cleanup_sql.clear();
                }
                result
            })
            .collect())
    }

    fn planner_options(
        &self,
        sink: &SinkCapabilities,
        main_name: &str,
    ) -> IngestResult<PlannerOptions> {
        for pattern in [
            &self.options.batch_id_pattern,
            &self.options.batch_start_ts_pattern,
            &self.options.batch_end_ts_pattern,
        ]
        .into_iter()
        .flatten()
        {
            validate_placeholder(pattern)?;
        }

        let batch_start = match &self.options.batch_start_ts_pattern {
            Some(pattern) => TimestampValue::Placeholder(pattern.clone()),
            None => TimestampValue::Clock(
                self.options
                    .execution_timestamp
                    .unwrap_or_else(|| Utc::now().naive_utc()),
            ),
        };
        let batch_end = match &self.options.batch_end_ts_pattern {
            Some(pattern) => TimestampValue::Placeholder(pattern.clone()),
            None => TimestampValue::CurrentTimestamp,
        };

        Ok(PlannerOptions {
            collect_statistics: self.options.collect_statistics,
            cleanup_staging_data: self.options.cleanup_staging_data,
            create_staging_dataset: self.options.create_staging_dataset,
            enable_schema_evolution: self.options.enable_schema_evolution,
            case_insensitive_metadata_lookup: sink.case_insensitive_metadata_lookup,
            batch_id_pattern: self.options.batch_id_pattern.clone(),
            batch_start,
            batch_end,
            metadata: self.options.metadata.clone(),
            batch_status: self.options.batch_status.clone(),
            ledger_table_name: Some(main_name.to_string()),
            additional_metadata: self.options.additional_metadata.clone(),
            ingest_request_id: self.options.ingest_request_id.clone(),
        })
    }

    fn generate(&self, datasets: &Datasets, empty_batch: bool) -> IngestResult<GeneratorResult> {
        let sink = self.registry.get(&self.options.sink)?;
        let conversion = self.options.case_conversion;

        if self.options.cleanup_staging_data
            && let StagingDataset::StagedFiles(_) = &datasets.staging
        {
            warn!("Staged files are never cleaned up; ignoring cleanup_staging_data");
        }

        let converted = Datasets {
            main: convert_dataset(&datasets.main, conversion),
            staging: convert_staging(&datasets.staging, conversion),
        };
        let mode = convert_ingest_mode(&self.options.ingest_mode, conversion);
        let planner_options = self.planner_options(sink, datasets.main.name())?;

        let planner = Planner::new(&mode, &planner_options);
        let plan = if empty_batch {
            planner.plan_empty_batch(&converted)?
        } else {
            planner.plan(&converted)?
        };

        let optimizers: Vec<Box<dyn Optimizer>> = conversion.optimizer().into_iter().collect();
        let result = render(plan, sink, &optimizers)?;
        info!(
            mode = mode.name(),
            sink = %sink.name,
            case_conversion = %conversion,
            empty_batch,
            statements = result.statements().len(),
            "Generated ingestion SQL"
        );
        Ok(result)
    }
}

fn render(
    plan: IngestPlan,
    sink: &SinkCapabilities,
    optimizers: &[Box<dyn Optimizer>],
) -> IngestResult<GeneratorResult> {
    let statistics = |selections: BTreeMap<StatisticName, Selection>| {
        selections
            .into_iter()
            .map(|(name, selection)| {
                let sql = transform(
                    LogicalPlan::single(Operation::Select(selection)),
                    sink,
                    optimizers,
                )?;
                Ok((name, sql.concat()))
            })
            .collect::<IngestResult<BTreeMap<_, _>>>()
    };

    Ok(GeneratorResult {
        pre_actions_sql: transform(plan.pre_actions, sink, optimizers)?,
        pre_ingest_statistics_sql: statistics(plan.pre_ingest_statistics)?,
        ingest_sql: transform(plan.ingest, sink, optimizers)?,
        post_ingest_statistics_sql: statistics(plan.post_ingest_statistics)?,
        metadata_ingest_sql: transform(plan.metadata_ingest, sink, optimizers)?,
        post_actions_sql: transform(plan.post_actions, sink, optimizers)?,
        post_cleanup_sql: transform(plan.post_cleanup, sink, optimizers)?,
    })
}
