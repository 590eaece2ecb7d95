//! Append-only ingestion

use std::collections::BTreeMap;

use crate::error::IngestResult;
use crate::ingest_mode::{AppendOnly, DeduplicationStrategy};
use crate::models::{Condition, Operation, Selection, and_all, match_condition};

use super::statistics::{count_main, incoming_record_count, zero};
use super::{ModePlan, PlanContext, StatisticName};

pub(crate) fn plan(ctx: &PlanContext<'_>, mode: &AppendOnly) -> IngestResult<ModePlan> {
    let version_field = match &mode.deduplication_strategy {
        DeduplicationStrategy::DeduplicateAndVersion { version_field } => {
            Some(version_field.as_str())
        }
        DeduplicationStrategy::AllowDuplicates | DeduplicationStrategy::FilterDuplicates => None,
    };
    let source = ctx.staging_source(version_field);

    let mut generated = Vec::new();
    if let Some(field) = &mode.batch_id_field {
        generated.push((field.clone(), ctx.batch_id()));
    }
    if let Some(field) = mode.auditing.audit_field() {
        generated.push((field.to_string(), ctx.batch_start()));
    }
    let (columns, values) = ctx.insert_projection(&generated);

    // Validation guarantees a digest whenever duplicates are filtered.
    let not_present = match (&mode.deduplication_strategy, &mode.digest_field) {
        (DeduplicationStrategy::FilterDuplicates, Some(digest)) => {
            let keys = ctx.primary_keys();
            let existing = Selection::all(ctx.main_source()).filter(and_all([
                (!keys.is_empty())
                    .then(|| match_condition(ctx.main_alias(), ctx.staging_alias(), &keys)),
                Some(Condition::Equals(
                    ctx.main_field(digest),
                    ctx.staging_field(digest),
                )),
            ]));
            Some(Condition::not(Condition::exists(existing)))
        }
        _ => None,
    };

    let insert = Operation::Insert {
        target: ctx.main_reference(),
        columns,
        source: source.select(values, not_present),
    };

    let mut post_statistics = BTreeMap::new();
    post_statistics.insert(StatisticName::IncomingRecordCount, incoming_record_count(ctx));
    let inserted_condition = match (&mode.batch_id_field, mode.auditing.audit_field()) {
        (Some(field), _) => Some(Condition::Equals(ctx.main_field(field), ctx.batch_id())),
        (None, Some(field)) => Some(Condition::Equals(ctx.main_field(field), ctx.batch_start())),
        (None, None) => None,
    };
    // Without a batch stamp inserted rows cannot be told apart from older ones.
    if inserted_condition.is_some() {
        post_statistics.insert(
            StatisticName::RowsInserted,
            count_main(ctx, StatisticName::RowsInserted, inserted_condition),
        );
    }
    for name in [
        StatisticName::RowsUpdated,
        StatisticName::RowsTerminated,
        StatisticName::RowsDeleted,
    ] {
        post_statistics.insert(name, zero(name));
    }

    Ok(ModePlan {
        ingest: vec![insert],
        post_statistics,
        ..Default::default()
    })
}
