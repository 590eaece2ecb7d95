//! Nontemporal snapshot and delta ingestion

use std::collections::BTreeMap;

use crate::error::IngestResult;
use crate::ingest_mode::{MergeStrategy, NontemporalDelta, NontemporalSnapshot};
use crate::models::{
    Condition, Operation, Selection, Value, delete_indicator_condition, match_condition,
};

use super::statistics::{count_main, incoming_record_count, zero};
use super::{ModePlan, PlanContext, StatisticName};

/// Empty main, then insert the whole staging snapshot.
pub(crate) fn plan_snapshot(
    ctx: &PlanContext<'_>,
    mode: &NontemporalSnapshot,
) -> IngestResult<ModePlan> {
    let source = ctx.staging_source(mode.versioning_strategy.version_field());
    let generated: Vec<(String, Value)> = mode
        .auditing
        .audit_field()
        .map(|field| (field.to_string(), ctx.batch_start()))
        .into_iter()
        .collect();
    let (columns, values) = ctx.insert_projection(&generated);

    let ingest = vec![
        Operation::Delete {
            target: ctx.main_reference(),
            condition: None,
        },
        Operation::Insert {
            target: ctx.main_reference(),
            columns,
            source: source.select(values, None),
        },
    ];

    let mut pre_statistics = BTreeMap::new();
    pre_statistics.insert(
        StatisticName::RowsDeleted,
        count_main(ctx, StatisticName::RowsDeleted, None),
    );
    let mut post_statistics = BTreeMap::new();
    post_statistics.insert(StatisticName::IncomingRecordCount, incoming_record_count(ctx));
    post_statistics.insert(
        StatisticName::RowsInserted,
        count_main(ctx, StatisticName::RowsInserted, None),
    );
    post_statistics.insert(StatisticName::RowsUpdated, zero(StatisticName::RowsUpdated));
    post_statistics.insert(StatisticName::RowsTerminated, zero(StatisticName::RowsTerminated));

    Ok(ModePlan {
        ingest,
        pre_statistics,
        post_statistics,
        ..Default::default()
    })
}

/// Delete flagged keys, update changed keys in place, insert new keys.
pub(crate) fn plan_delta(ctx: &PlanContext<'_>, mode: &NontemporalDelta) -> IngestResult<ModePlan> {
    let source = ctx.staging_source(mode.versioning_strategy.version_field());
    let main_alias = ctx.main_alias();
    let staging_alias = ctx.staging_alias();
    let key_match = match_condition(main_alias, staging_alias, &ctx.primary_keys());

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

    let mut ingest = Vec::new();
    let mut pre_statistics = BTreeMap::new();

    if let Some(deleted) = &deleted {
        let flagged = Selection::all(source.dataset.clone())
            .filter(source.condition(vec![Some(key_match.clone()), Some(deleted.clone())]));
        pre_statistics.insert(
            StatisticName::RowsDeleted,
            count_main(
                ctx,
                StatisticName::RowsDeleted,
                Some(Condition::exists(flagged.clone())),
            ),
        );
        ingest.push(Operation::Delete {
            target: ctx.main_reference(),
            condition: Some(Condition::exists(flagged)),
        });
    }

    let changed = source.condition(vec![
        Some(key_match.clone()),
        Some(Condition::NotEquals(
            ctx.main_field(&mode.digest_field),
            ctx.staging_field(&mode.digest_field),
        )),
        not_deleted.clone(),
    ]);
    let audit = mode.auditing.audit_field();
    let mut assignments: Vec<(String, Value)> = ctx
        .main
        .schema
        .fields
        .iter()
        .filter(|field| !field.identity && Some(field.name.as_str()) != audit)
        .filter(|field| ctx.staging.schema().contains(&field.name))
        .map(|field| {
            let value = Value::selection(
                Selection::new(source.dataset.clone(), vec![ctx.staging_field(&field.name)])
                    .filter(changed.clone()),
            );
            (field.name.clone(), value)
        })
        .collect();
    if let Some(field) = audit {
        assignments.push((field.to_string(), ctx.batch_start()));
    }
    ingest.push(Operation::Update {
        target: ctx.main_reference(),
        assignments,
        condition: Some(Condition::exists(
            Selection::all(source.dataset.clone()).filter(changed),
        )),
    });

    let generated: Vec<(String, Value)> = audit
        .map(|field| (field.to_string(), ctx.batch_start()))
        .into_iter()
        .collect();
    let (columns, values) = ctx.insert_projection(&generated);
    let absent = Condition::not(Condition::exists(
        Selection::all(ctx.main_source()).with_condition(key_match),
    ));
    ingest.push(Operation::Insert {
        target: ctx.main_reference(),
        columns,
        source: Selection::new(source.dataset.clone(), values)
            .filter(source.condition(vec![Some(absent), not_deleted])),
    });

    let mut post_statistics = BTreeMap::new();
    post_statistics.insert(StatisticName::IncomingRecordCount, incoming_record_count(ctx));
    post_statistics.insert(StatisticName::RowsTerminated, zero(StatisticName::RowsTerminated));
    if deleted.is_none() {
        post_statistics.insert(StatisticName::RowsDeleted, zero(StatisticName::RowsDeleted));
    }

    Ok(ModePlan {
        ingest,
        pre_statistics,
        post_statistics,
        ..Default::default()
    })
}
