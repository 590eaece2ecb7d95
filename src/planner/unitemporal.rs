//! Unitemporal snapshot and delta ingestion
//!
//! Rows of main are never updated in place. A changed key closes its open row
//! (stamping the out milestone) and opens a new row carrying the staging
//! values; an open row has the infinite out milestone.

use crate::error::IngestResult;
use crate::ingest_mode::{
    EmptyDatasetHandling, MergeStrategy, Partitioning, UnitemporalDelta, UnitemporalSnapshot,
};
use crate::models::{
    Condition, Operation, Selection, Value, and_all, delete_indicator_condition, match_condition,
};

use super::staging::StagingSource;
use super::statistics::{Milestones, count_main, empty_statistics, unitemporal_statistics};
use super::{ModePlan, PlanContext, StatisticName};

pub(crate) fn plan_delta(ctx: &PlanContext<'_>, mode: &UnitemporalDelta) -> IngestResult<ModePlan> {
    let milestones = Milestones::new(ctx, &mode.transaction_milestoning);
    let source = ctx.staging_source(mode.versioning_strategy.version_field());
    let main_alias = ctx.main_alias();
    let staging_alias = ctx.staging_alias();
    let key_match = match_condition(main_alias, staging_alias, &ctx.primary_keys());
    let digest_changed = Condition::NotEquals(
        ctx.main_field(&mode.digest_field),
        ctx.staging_field(&mode.digest_field),
    );

    let (deleted, not_deleted) = match &mode.merge_strategy {
        MergeStrategy::DeleteIndicator {
            delete_field,
            delete_values,
        } => {
            let (deleted, kept) = delete_indicator_condition(
                staging_alias,
                delete_field,
                delete_values,
                ctx.staging.schema(),
            )?;
            (Some(deleted), Some(kept))
        }
        MergeStrategy::NoDeletes => (None, None),
    };

    let superseded = match deleted {
        Some(deleted) => Condition::or(vec![digest_changed, deleted]),
        None => digest_changed,
    };
    let close = Operation::Update {
        target: ctx.main_reference(),
        assignments: milestones.close_assignments(),
        condition: Some(Condition::And(vec![
            milestones.open(main_alias),
            Condition::exists(
                Selection::all(source.dataset.clone())
                    .filter(source.condition(vec![Some(key_match.clone()), Some(superseded)])),
            ),
        ])),
    };

    let current = Selection::all(ctx.main_source()).with_condition(Condition::And(vec![
        milestones.open(main_alias),
        Condition::Equals(
            ctx.main_field(&mode.digest_field),
            ctx.staging_field(&mode.digest_field),
        ),
        key_match,
    ]));
    let (columns, values) = ctx.insert_projection(&milestones.open_values());
    let open = Operation::Insert {
        target: ctx.main_reference(),
        columns,
        source: Selection::new(source.dataset.clone(), values).filter(source.condition(vec![
            Some(Condition::not(Condition::exists(current))),
            not_deleted,
        ])),
    };

    Ok(ModePlan {
        ingest: vec![close, open],
        post_statistics: unitemporal_statistics(ctx, &milestones),
        ..Default::default()
    })
}

/// Scope of a snapshot inside main, as `(close scope, insert scope)`.
///
/// Explicit partition values restrict both statements to those values.
/// Without values, only partitions present in the staging rows read by the
/// insert are touched.
fn partition_scope(
    ctx: &PlanContext<'_>,
    source: &StagingSource,
    partitioning: Option<&Partitioning>,
) -> (Option<Condition>, Option<Condition>) {
    let Some(partitioning) = partitioning else {
        return (None, None);
    };
    if partitioning.partition_fields.is_empty() {
        return (None, None);
    }
    if let Some(by_values) = partition_values(ctx, partitioning) {
        return (Some(by_values.clone()), Some(by_values));
    }

    let fields_match = match_condition(
        ctx.main_alias(),
        ctx.staging_alias(),
        &partitioning.partition_fields,
    );
    let present_in_staging = Condition::exists(
        Selection::all(source.dataset.clone())
            .filter(source.condition(vec![Some(fields_match.clone())])),
    );
    (Some(present_in_staging), Some(fields_match))
}

fn partition_values(ctx: &PlanContext<'_>, partitioning: &Partitioning) -> Option<Condition> {
    if partitioning.partition_values_by_field.is_empty() {
        return None;
    }
    let conditions = partitioning
        .partition_values_by_field
        .iter()
        .map(|(field, values)| {
            Some(Condition::In(
                ctx.main_field(field),
                Value::Array(values.iter().cloned().map(Value::Object).collect()),
            ))
        });
    and_all(conditions)
}

pub(crate) fn plan_snapshot(
    ctx: &PlanContext<'_>,
    mode: &UnitemporalSnapshot,
) -> IngestResult<ModePlan> {
    let milestones = Milestones::new(ctx, &mode.transaction_milestoning);
    let source = ctx.staging_source(mode.versioning_strategy.version_field());
    let main_alias = ctx.main_alias();
    let key_match = match_condition(main_alias, ctx.staging_alias(), &ctx.primary_keys());
    let (close_scope, insert_scope) = partition_scope(ctx, &source, mode.partitioning.as_ref());

    let unchanged = Selection::all(source.dataset.clone()).filter(source.condition(vec![
        Some(key_match),
        Some(Condition::Equals(
            ctx.main_field(&mode.digest_field),
            ctx.staging_field(&mode.digest_field),
        )),
    ]));
    let close = Operation::Update {
        target: ctx.main_reference(),
        assignments: milestones.close_assignments(),
        condition: and_all([
            Some(milestones.open(main_alias)),
            Some(Condition::not(Condition::exists(unchanged))),
            close_scope,
        ]),
    };

    let open_digests = Selection::new(ctx.main_source(), vec![ctx.main_field(&mode.digest_field)])
        .filter(and_all([Some(milestones.open(main_alias)), insert_scope]));
    let (columns, values) = ctx.insert_projection(&milestones.open_values());
    let open = Operation::Insert {
        target: ctx.main_reference(),
        columns,
        source: source.select(
            values,
            Some(Condition::not(Condition::In(
                ctx.staging_field(&mode.digest_field),
                Value::selection(open_digests),
            ))),
        ),
    };

    Ok(ModePlan {
        ingest: vec![close, open],
        post_statistics: unitemporal_statistics(ctx, &milestones),
        ..Default::default()
    })
}

/// A snapshot without rows means every open row in scope is gone.
pub(crate) fn plan_empty_snapshot(
    ctx: &PlanContext<'_>,
    mode: &UnitemporalSnapshot,
) -> IngestResult<ModePlan> {
    let partitioning = mode.partitioning.as_ref();
    let scoped_without_values = partitioning.is_some_and(|p| {
        !p.partition_fields.is_empty() && p.partition_values_by_field.is_empty()
    });
    // An empty batch names no partition, so there is nothing to close.
    if mode.empty_dataset_handling == EmptyDatasetHandling::NoOp || scoped_without_values {
        return Ok(ModePlan {
            post_statistics: empty_statistics(),
            ..Default::default()
        });
    }

    let milestones = Milestones::new(ctx, &mode.transaction_milestoning);
    let scope = partitioning.and_then(|p| partition_values(ctx, p));
    let close = Operation::Update {
        target: ctx.main_reference(),
        assignments: milestones.close_assignments(),
        condition: and_all([Some(milestones.open(ctx.main_alias())), scope]),
    };

    let mut post_statistics = empty_statistics();
    post_statistics.insert(
        StatisticName::RowsTerminated,
        count_main(
            ctx,
            StatisticName::RowsTerminated,
            Some(milestones.closed_now(ctx.main_alias())),
        ),
    );
    Ok(ModePlan {
        ingest: vec![close],
        post_statistics,
        ..Default::default()
    })
}
