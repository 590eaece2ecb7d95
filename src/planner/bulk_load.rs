//! Bulk load of staged files

use std::collections::BTreeMap;

use serde_json::json;

use crate::error::{IngestError, IngestResult};
use crate::ingest_mode::{BulkLoad, DigestGenStrategy};
use crate::models::{Condition, Dataset, Operation, Selection, StagingDataset, Value};

use super::statistics::count_main;
use super::{ModePlan, PlanContext, StatisticName};

pub(crate) fn plan(ctx: &PlanContext<'_>, mode: &BulkLoad) -> IngestResult<ModePlan> {
    let StagingDataset::StagedFiles(files) = &ctx.staging else {
        return Err(IngestError::configuration(
            "BulkLoad requires a staged files dataset",
        ));
    };

    let mut generated = Vec::new();
    if let DigestGenStrategy::UdfBased {
        digest_udf_name,
        digest_field,
        fields_to_exclude_from_digest,
    } = &mode.digest_gen_strategy
    {
        let args = files
            .schema
            .fields
            .iter()
            .filter(|field| !fields_to_exclude_from_digest.contains(&field.name))
            .map(|field| Value::bare_field(&field.name))
            .collect();
        generated.push((
            digest_field.clone(),
            Value::UserFunction {
                name: digest_udf_name.clone(),
                args,
            },
        ));
    }
    generated.push((mode.batch_id_field.clone(), ctx.batch_id()));
    if let Some(field) = mode.auditing.audit_field() {
        generated.push((field.to_string(), ctx.batch_start()));
    }
    let (columns, values) = ctx.insert_projection(&generated);

    let insert = Operation::Insert {
        target: ctx.main_reference(),
        columns,
        source: Selection::new(Dataset::StagedFiles(files.clone()), values),
    };

    let mut post_statistics = BTreeMap::new();
    post_statistics.insert(
        StatisticName::RowsInserted,
        count_main(
            ctx,
            StatisticName::RowsInserted,
            Some(Condition::Equals(
                ctx.main_field(&mode.batch_id_field),
                ctx.batch_id(),
            )),
        ),
    );

    Ok(ModePlan {
        ingest: vec![insert],
        post_statistics,
        batch_source_info: Some(json!({ "file_paths": files.file_paths })),
        ..Default::default()
    })
}
