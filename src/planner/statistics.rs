//! Statistics selections shared by the mode planners

use std::collections::BTreeMap;

use crate::ingest_mode::TransactionMilestoning;
use crate::models::{Condition, Selection, Value, and_all, match_condition};

use super::{ModePlan, PlanContext, StatisticName};

/// `SELECT 0 as <statistic>`
pub(crate) fn zero(name: StatisticName) -> Selection {
    Selection::values(vec![Value::Numeric(0).alias(name.alias())])
}

/// `SELECT COUNT(*) as <statistic> FROM main as sink [WHERE ...]`
pub(crate) fn count_main(
    ctx: &PlanContext<'_>,
    name: StatisticName,
    condition: Option<Condition>,
) -> Selection {
    Selection::new(ctx.main_source(), vec![Value::count_all().alias(name.alias())])
        .filter(condition)
}

/// Rows arriving in this batch, before deduplication
pub(crate) fn incoming_record_count(ctx: &PlanContext<'_>) -> Selection {
    Selection::new(
        ctx.raw_staging_source(),
        vec![Value::count_all().alias(StatisticName::IncomingRecordCount.alias())],
    )
    .filter(ctx.staging_filter())
}

/// Milestoning predicates over main rows under `alias`
pub(crate) struct Milestones<'c, 'a> {
    ctx: &'c PlanContext<'a>,
    milestoning: &'c TransactionMilestoning,
}

impl<'c, 'a> Milestones<'c, 'a> {
    pub fn new(ctx: &'c PlanContext<'a>, milestoning: &'c TransactionMilestoning) -> Self {
        Self { ctx, milestoning }
    }

    /// Row still current: `out = 999999999`, or `time_out = '9999-12-31 23:59:59'`
    pub fn open(&self, alias: &str) -> Condition {
        match self.milestoning.batch_id_out() {
            Some(out) => Condition::Equals(Value::field(alias, out), Value::InfiniteBatchId),
            None => Condition::Equals(
                Value::field(alias, self.time_out()),
                Value::InfiniteBatchTime,
            ),
        }
    }

    /// Row closed by this batch
    pub fn closed_now(&self, alias: &str) -> Condition {
        match self.milestoning.batch_id_out() {
            Some(out) => Condition::Equals(Value::field(alias, out), self.ctx.prev_batch_id()),
            None => Condition::Equals(Value::field(alias, self.time_out()), self.ctx.batch_start()),
        }
    }

    /// Row opened by this batch
    pub fn opened_now(&self, alias: &str) -> Condition {
        match self.milestoning.batch_id_in() {
            Some(field) => Condition::Equals(Value::field(alias, field), self.ctx.batch_id()),
            None => Condition::Equals(Value::field(alias, self.time_in()), self.ctx.batch_start()),
        }
    }

    /// `SET` assignments that close a row
    pub fn close_assignments(&self) -> Vec<(String, Value)> {
        let mut assignments = Vec::new();
        if let Some(out) = self.milestoning.batch_id_out() {
            assignments.push((out.to_string(), self.ctx.prev_batch_id()));
        }
        if let Some(out) = self.milestoning.date_time_out() {
            assignments.push((out.to_string(), self.ctx.batch_start()));
        }
        assignments
    }

    /// Generated values of a newly opened row
    pub fn open_values(&self) -> Vec<(String, Value)> {
        let mut values = Vec::new();
        if let Some(field) = self.milestoning.batch_id_in() {
            values.push((field.to_string(), self.ctx.batch_id()));
        }
        if let Some(field) = self.milestoning.batch_id_out() {
            values.push((field.to_string(), Value::InfiniteBatchId));
        }
        if let Some(field) = self.milestoning.date_time_in() {
            values.push((field.to_string(), self.ctx.batch_start()));
        }
        if let Some(field) = self.milestoning.date_time_out() {
            values.push((field.to_string(), Value::InfiniteBatchTime));
        }
        values
    }

    // Time-only milestoning always names both time fields.
    fn time_in(&self) -> &str {
        self.milestoning.date_time_in().unwrap_or_default()
    }

    fn time_out(&self) -> &str {
        self.milestoning.date_time_out().unwrap_or_default()
    }
}

/// Post-ingest statistics of the unitemporal modes.
///
/// A row closed in this batch whose key was reopened in this batch is an
/// update; the other closed rows are terminations and the other opened rows
/// are inserts.
pub(crate) fn unitemporal_statistics(
    ctx: &PlanContext<'_>,
    milestones: &Milestones<'_, '_>,
) -> BTreeMap<StatisticName, Selection> {
    let alias = ctx.main_alias();
    let twin = format!("{}2", alias);
    let keys: Vec<String> = ctx
        .main
        .schema
        .primary_keys()
        .into_iter()
        .filter(|key| !milestones.milestoning.in_field_names().contains(&key.as_str()))
        .collect();

    let reopened = Selection::all(ctx.main_source_as(&twin)).filter(and_all([
        (!keys.is_empty()).then(|| match_condition(&twin, alias, &keys)),
        Some(milestones.opened_now(&twin)),
    ]));
    let updated_condition = Condition::And(vec![
        milestones.closed_now(alias),
        Condition::exists(reopened),
    ]);
    let updated_count = Value::selection(
        Selection::new(ctx.main_source(), vec![Value::count_all()])
            .with_condition(updated_condition.clone()),
    );
    let opened_count = Value::selection(
        Selection::new(ctx.main_source(), vec![Value::count_all()])
            .with_condition(milestones.opened_now(alias)),
    );
    let closed_count = Value::selection(
        Selection::new(ctx.main_source(), vec![Value::count_all()])
            .with_condition(milestones.closed_now(alias)),
    );

    let mut statistics = BTreeMap::new();
    statistics.insert(StatisticName::IncomingRecordCount, incoming_record_count(ctx));
    statistics.insert(
        StatisticName::RowsUpdated,
        count_main(ctx, StatisticName::RowsUpdated, Some(updated_condition)),
    );
    statistics.insert(
        StatisticName::RowsInserted,
        Selection::values(vec![
            opened_count
                .minus(updated_count.clone())
                .alias(StatisticName::RowsInserted.alias()),
        ]),
    );
    statistics.insert(
        StatisticName::RowsTerminated,
        Selection::values(vec![
            closed_count
                .minus(updated_count)
                .alias(StatisticName::RowsTerminated.alias()),
        ]),
    );
    statistics.insert(StatisticName::RowsDeleted, zero(StatisticName::RowsDeleted));
    statistics
}

/// Plan of a batch with no staging rows that leaves main untouched
pub(crate) fn empty_batch() -> ModePlan {
    ModePlan {
        post_statistics: empty_statistics(),
        ..Default::default()
    }
}

pub(crate) fn empty_statistics() -> BTreeMap<StatisticName, Selection> {
    [
        StatisticName::IncomingRecordCount,
        StatisticName::RowsInserted,
        StatisticName::RowsUpdated,
        StatisticName::RowsTerminated,
        StatisticName::RowsDeleted,
    ]
    .into_iter()
    .map(|name| (name, zero(name)))
    .collect()
}
