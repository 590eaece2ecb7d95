//! End-to-end generation tests for the ANSI and MemSQL sinks

use chrono::{NaiveDate, NaiveDateTime};
use ingest_sql_sdk::generator::{
    DataSplitRange, GeneratorResult, RelationalGenerator, RelationalGeneratorBuilder,
};
use ingest_sql_sdk::ingest_mode::{
    AppendOnly, Auditing, DeduplicationStrategy, EmptyDatasetHandling, IngestMode, MergeStrategy,
    NontemporalDelta, NontemporalSnapshot, Partitioning, TransactionMilestoning,
    UnitemporalDelta, UnitemporalSnapshot, VersioningStrategy,
};
use ingest_sql_sdk::models::{DataType, DatasetDefinition, DatasetFilter, Field, FilterType};
use ingest_sql_sdk::planner::{Datasets, StatisticName};
use ingest_sql_sdk::IngestError;
use serde_json::json;
use std::collections::BTreeMap;

/// Next batch id of `main` as the ANSI sink renders it
const BID: &str = r#"(SELECT COALESCE(MAX(batch_metadata."table_batch_id"),0)+1 FROM batch_metadata as batch_metadata WHERE batch_metadata."table_name" = 'main')"#;

const METADATA_CREATE: &str = r#"CREATE TABLE IF NOT EXISTS batch_metadata("table_name" VARCHAR(255),"batch_start_ts_utc" DATETIME,"batch_end_ts_utc" DATETIME,"batch_status" VARCHAR(32),"table_batch_id" INTEGER,"batch_source_info" JSON,"additional_metadata" JSON,"ingest_request_id" VARCHAR(255))"#;

const METADATA_INSERT: &str = r#"INSERT INTO batch_metadata ("table_name", "table_batch_id", "batch_start_ts_utc", "batch_end_ts_utc", "batch_status") (SELECT 'main',(SELECT COALESCE(MAX(batch_metadata."table_batch_id"),0)+1 FROM batch_metadata as batch_metadata WHERE batch_metadata."table_name" = 'main'),'2000-01-01 00:00:00',CURRENT_TIMESTAMP(),'DONE')"#;

fn execution_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn main_dataset() -> DatasetDefinition {
    DatasetDefinition::new("main").with_database("mydb")
}

fn staging_dataset(fields: Vec<Field>) -> DatasetDefinition {
    DatasetDefinition::new("staging")
        .with_database("mydb")
        .with_fields(fields)
}

fn id_name_digest() -> Vec<Field> {
    vec![
        Field::new("id", DataType::Int).primary_key(),
        Field::new("name", DataType::Varchar),
        Field::new("digest", DataType::Varchar),
    ]
}

fn builder(mode: IngestMode) -> RelationalGeneratorBuilder {
    RelationalGenerator::builder(mode).execution_timestamp(execution_time())
}

fn generate(mode: IngestMode, staging_fields: Vec<Field>) -> GeneratorResult {
    builder(mode)
        .build()
        .generate_operations(&Datasets::new(main_dataset(), staging_dataset(staging_fields)))
        .unwrap()
}

fn stat(sql: &BTreeMap<StatisticName, String>, name: StatisticName) -> &str {
    sql.get(&name).map(String::as_str).unwrap_or_default()
}

fn batch_id_milestoning() -> TransactionMilestoning {
    TransactionMilestoning::batch_id("batch_id_in", "batch_id_out")
}

mod append_only_tests {
    use super::*;

    fn staging_fields() -> Vec<Field> {
        vec![
            Field::new("id", DataType::Int).primary_key(),
            Field::new("name", DataType::Varchar),
            Field::new("amount", DataType::Double),
            Field::new("biz_date", DataType::Date),
            Field::new("digest", DataType::Varchar),
        ]
    }

    #[test]
    fn test_filter_duplicates_with_auditing() {
        let mode = IngestMode::AppendOnly(AppendOnly {
            digest_field: Some("digest".to_string()),
            auditing: Auditing::date_time("batch_update_time"),
            deduplication_strategy: DeduplicationStrategy::FilterDuplicates,
            ..Default::default()
        });
        let result = generate(mode, staging_fields());

        assert_eq!(
            result.pre_actions_sql,
            vec![
                r#"CREATE TABLE IF NOT EXISTS "mydb"."main"("id" INTEGER,"name" VARCHAR,"amount" DOUBLE,"biz_date" DATE,"digest" VARCHAR,"batch_update_time" DATETIME,PRIMARY KEY ("id"))"#.to_string(),
                METADATA_CREATE.to_string(),
            ]
        );
        assert_eq!(
            result.ingest_sql,
            vec![
                r#"INSERT INTO "mydb"."main" ("id", "name", "amount", "biz_date", "digest", "batch_update_time") (SELECT stage."id",stage."name",stage."amount",stage."biz_date",stage."digest",'2000-01-01 00:00:00' FROM "mydb"."staging" as stage WHERE NOT (EXISTS (SELECT * FROM "mydb"."main" as sink WHERE (sink."id" = stage."id") AND (sink."digest" = stage."digest"))))"#.to_string()
            ]
        );
        assert_eq!(
            stat(&result.post_ingest_statistics_sql, StatisticName::IncomingRecordCount),
            r#"SELECT COUNT(*) as incomingRecordCount FROM "mydb"."staging" as stage"#
        );
        assert_eq!(
            stat(&result.post_ingest_statistics_sql, StatisticName::RowsInserted),
            r#"SELECT COUNT(*) as rowsInserted FROM "mydb"."main" as sink WHERE sink."batch_update_time" = '2000-01-01 00:00:00'"#
        );
        assert_eq!(
            stat(&result.post_ingest_statistics_sql, StatisticName::RowsUpdated),
            "SELECT 0 as rowsUpdated"
        );
        assert!(result.pre_ingest_statistics_sql.is_empty());
        assert_eq!(result.metadata_ingest_sql, vec![METADATA_INSERT.to_string()]);
        assert!(result.post_actions_sql.is_empty());
        assert!(result.post_cleanup_sql.is_empty());
    }

    #[test]
    fn test_batch_id_column_counts_by_batch_id() {
        let mode = IngestMode::AppendOnly(AppendOnly {
            batch_id_field: Some("batch_id".to_string()),
            ..Default::default()
        });
        let result = generate(mode, staging_fields());
        assert_eq!(
            result.ingest_sql[0],
            format!(
                r#"INSERT INTO "mydb"."main" ("id", "name", "amount", "biz_date", "digest", "batch_id") (SELECT stage."id",stage."name",stage."amount",stage."biz_date",stage."digest",{} FROM "mydb"."staging" as stage)"#,
                BID
            )
        );
        assert_eq!(
            stat(&result.post_ingest_statistics_sql, StatisticName::RowsInserted),
            format!(
                r#"SELECT COUNT(*) as rowsInserted FROM "mydb"."main" as sink WHERE sink."batch_id" = {}"#,
                BID
            )
        );
    }

    #[test]
    fn test_without_batch_stamp_rows_inserted_is_omitted() {
        let result = generate(IngestMode::AppendOnly(AppendOnly::default()), staging_fields());
        assert!(!result
            .post_ingest_statistics_sql
            .contains_key(&StatisticName::RowsInserted));
        assert!(result
            .post_ingest_statistics_sql
            .contains_key(&StatisticName::IncomingRecordCount));
    }

    #[test]
    fn test_explicit_main_without_audit_column_is_rejected() {
        let mode = IngestMode::AppendOnly(AppendOnly {
            auditing: Auditing::date_time("batch_update_time"),
            ..Default::default()
        });
        let main = main_dataset().with_fields(staging_fields());
        let err = builder(mode)
            .build()
            .generate_operations(&Datasets::new(main, staging_dataset(staging_fields())))
            .unwrap_err();
        assert_eq!(
            err,
            IngestError::Configuration(
                "Field [batch_update_time] not found in main dataset".to_string()
            )
        );
    }

    #[test]
    fn test_collect_statistics_disabled() {
        let result = builder(IngestMode::AppendOnly(AppendOnly::default()))
            .collect_statistics(false)
            .build()
            .generate_operations(&Datasets::new(main_dataset(), staging_dataset(staging_fields())))
            .unwrap();
        assert!(result.pre_ingest_statistics_sql.is_empty());
        assert!(result.post_ingest_statistics_sql.is_empty());
        assert_eq!(result.ingest_sql.len(), 1);
    }
}

mod nontemporal_tests {
    use super::*;

    #[test]
    fn test_snapshot_with_auditing() {
        let mode = IngestMode::NontemporalSnapshot(NontemporalSnapshot {
            auditing: Auditing::date_time("batch_update_time"),
            ..Default::default()
        });
        let result = generate(
            mode,
            vec![
                Field::new("id", DataType::Int).primary_key(),
                Field::new("name", DataType::Varchar),
                Field::new("amount", DataType::Double),
                Field::new("biz_date", DataType::Date),
            ],
        );

        assert_eq!(
            result.pre_actions_sql[0],
            r#"CREATE TABLE IF NOT EXISTS "mydb"."main"("id" INTEGER,"name" VARCHAR,"amount" DOUBLE,"biz_date" DATE,"batch_update_time" DATETIME,PRIMARY KEY ("id"))"#
        );
        assert_eq!(
            result.ingest_sql,
            vec![
                r#"DELETE FROM "mydb"."main" as sink"#.to_string(),
                r#"INSERT INTO "mydb"."main" ("id", "name", "amount", "biz_date", "batch_update_time") (SELECT stage."id",stage."name",stage."amount",stage."biz_date",'2000-01-01 00:00:00' FROM "mydb"."staging" as stage)"#.to_string(),
            ]
        );
        assert_eq!(
            stat(&result.pre_ingest_statistics_sql, StatisticName::RowsDeleted),
            r#"SELECT COUNT(*) as rowsDeleted FROM "mydb"."main" as sink"#
        );
        assert_eq!(
            stat(&result.post_ingest_statistics_sql, StatisticName::RowsInserted),
            r#"SELECT COUNT(*) as rowsInserted FROM "mydb"."main" as sink"#
        );
        assert_eq!(
            stat(&result.post_ingest_statistics_sql, StatisticName::RowsTerminated),
            "SELECT 0 as rowsTerminated"
        );
    }

    #[test]
    fn test_snapshot_with_max_version_deduplicates_staging() {
        let mode = IngestMode::NontemporalSnapshot(NontemporalSnapshot {
            versioning_strategy: VersioningStrategy::MaxVersion {
                version_field: "version".to_string(),
            },
            ..Default::default()
        });
        let result = generate(
            mode,
            vec![
                Field::new("id", DataType::Int).primary_key(),
                Field::new("name", DataType::Varchar),
                Field::new("version", DataType::Int),
            ],
        );
        assert_eq!(
            result.ingest_sql[1],
            r#"INSERT INTO "mydb"."main" ("id", "name", "version") (SELECT stage."id",stage."name",stage."version" FROM (SELECT stage."id",stage."name",stage."version" FROM (SELECT stage."id",stage."name",stage."version",ROW_NUMBER() OVER (PARTITION BY stage."id" ORDER BY stage."version" DESC) as "row_num" FROM "mydb"."staging" as stage) as stage WHERE stage."row_num" = 1) as stage)"#
        );
        // Incoming rows are counted before deduplication.
        assert_eq!(
            stat(&result.post_ingest_statistics_sql, StatisticName::IncomingRecordCount),
            r#"SELECT COUNT(*) as incomingRecordCount FROM "mydb"."staging" as stage"#
        );
    }

    #[test]
    fn test_delta_without_deletes() {
        let mode = IngestMode::NontemporalDelta(NontemporalDelta::new("digest"));
        let result = generate(mode, id_name_digest());

        let changed = r#"(sink."id" = stage."id") AND (sink."digest" <> stage."digest")"#;
        let assignment = |column: &str| {
            format!(
                r#"sink."{c}" = (SELECT stage."{c}" FROM "mydb"."staging" as stage WHERE {w})"#,
                c = column,
                w = changed
            )
        };
        assert_eq!(
            result.ingest_sql,
            vec![
                format!(
                    r#"UPDATE "mydb"."main" as sink SET {},{},{} WHERE EXISTS (SELECT * FROM "mydb"."staging" as stage WHERE {})"#,
                    assignment("id"),
                    assignment("name"),
                    assignment("digest"),
                    changed
                ),
                r#"INSERT INTO "mydb"."main" ("id", "name", "digest") (SELECT stage."id",stage."name",stage."digest" FROM "mydb"."staging" as stage WHERE NOT (EXISTS (SELECT * FROM "mydb"."main" as sink WHERE sink."id" = stage."id")))"#.to_string(),
            ]
        );
        assert!(result.pre_ingest_statistics_sql.is_empty());
        assert_eq!(
            stat(&result.post_ingest_statistics_sql, StatisticName::RowsDeleted),
            "SELECT 0 as rowsDeleted"
        );
    }

    fn delta_with_deletes(values: Vec<serde_json::Value>) -> GeneratorResult {
        let mode = IngestMode::NontemporalDelta(NontemporalDelta {
            merge_strategy: MergeStrategy::delete_indicator("delete_indicator", values),
            ..NontemporalDelta::new("digest")
        });
        let mut fields = id_name_digest();
        fields.push(Field::new("delete_indicator", DataType::Varchar));
        generate(mode, fields)
    }

    #[test]
    fn test_delta_single_delete_value_uses_equality() {
        let result = delta_with_deletes(vec![json!("yes")]);
        assert_eq!(
            result.ingest_sql[0],
            r#"DELETE FROM "mydb"."main" as sink WHERE EXISTS (SELECT * FROM "mydb"."staging" as stage WHERE (sink."id" = stage."id") AND (stage."delete_indicator" = 'yes'))"#
        );
        assert_eq!(
            stat(&result.pre_ingest_statistics_sql, StatisticName::RowsDeleted),
            r#"SELECT COUNT(*) as rowsDeleted FROM "mydb"."main" as sink WHERE EXISTS (SELECT * FROM "mydb"."staging" as stage WHERE (sink."id" = stage."id") AND (stage."delete_indicator" = 'yes'))"#
        );
        assert!(result.ingest_sql[2].ends_with(
            r#"WHERE (NOT (EXISTS (SELECT * FROM "mydb"."main" as sink WHERE sink."id" = stage."id"))) AND (stage."delete_indicator" <> 'yes'))"#
        ));
        // The indicator is a staging-only column.
        assert!(!result.pre_actions_sql[0].contains("delete_indicator"));
    }

    #[test]
    fn test_delta_multiple_delete_values_use_in() {
        let result = delta_with_deletes(vec![json!("yes"), json!("1")]);
        assert!(result.ingest_sql[0].contains(r#"stage."delete_indicator" IN ('yes','1')"#));
        assert!(result.ingest_sql[2].contains(r#"stage."delete_indicator" NOT IN ('yes','1')"#));
    }
}

mod unitemporal_tests {
    use super::*;

    #[test]
    fn test_delta_with_batch_id_milestoning() {
        let mode = IngestMode::UnitemporalDelta(UnitemporalDelta::new(
            "digest",
            batch_id_milestoning(),
        ));
        let result = generate(mode, id_name_digest());

        assert_eq!(
            result.pre_actions_sql[0],
            r#"CREATE TABLE IF NOT EXISTS "mydb"."main"("id" INTEGER,"name" VARCHAR,"digest" VARCHAR,"batch_id_in" INTEGER,"batch_id_out" INTEGER,PRIMARY KEY ("id", "batch_id_in"))"#
        );
        assert_eq!(
            result.ingest_sql,
            vec![
                format!(
                    r#"UPDATE "mydb"."main" as sink SET sink."batch_id_out" = {bid}-1 WHERE (sink."batch_id_out" = 999999999) AND (EXISTS (SELECT * FROM "mydb"."staging" as stage WHERE (sink."id" = stage."id") AND (sink."digest" <> stage."digest")))"#,
                    bid = BID
                ),
                format!(
                    r#"INSERT INTO "mydb"."main" ("id", "name", "digest", "batch_id_in", "batch_id_out") (SELECT stage."id",stage."name",stage."digest",{bid},999999999 FROM "mydb"."staging" as stage WHERE NOT (EXISTS (SELECT * FROM "mydb"."main" as sink WHERE (sink."batch_id_out" = 999999999) AND (sink."digest" = stage."digest") AND (sink."id" = stage."id"))))"#,
                    bid = BID
                ),
            ]
        );

        assert_eq!(
            stat(&result.post_ingest_statistics_sql, StatisticName::RowsUpdated),
            format!(
                r#"SELECT COUNT(*) as rowsUpdated FROM "mydb"."main" as sink WHERE (sink."batch_id_out" = {bid}-1) AND (EXISTS (SELECT * FROM "mydb"."main" as sink2 WHERE (sink2."id" = sink."id") AND (sink2."batch_id_in" = {bid})))"#,
                bid = BID
            )
        );
        assert!(stat(&result.post_ingest_statistics_sql, StatisticName::RowsInserted).starts_with(
            &format!(
                r#"SELECT (SELECT COUNT(*) FROM "mydb"."main" as sink WHERE sink."batch_id_in" = {bid})-(SELECT COUNT(*) FROM "mydb"."main" as sink WHERE (sink."batch_id_out" = {bid}-1)"#,
                bid = BID
            )
        ));
        assert!(stat(&result.post_ingest_statistics_sql, StatisticName::RowsTerminated)
            .ends_with(" as rowsTerminated"));
        assert_eq!(
            stat(&result.post_ingest_statistics_sql, StatisticName::RowsDeleted),
            "SELECT 0 as rowsDeleted"
        );
    }

    #[test]
    fn test_delta_with_date_time_milestoning() {
        let mode = IngestMode::UnitemporalDelta(UnitemporalDelta::new(
            "digest",
            TransactionMilestoning::date_time("batch_time_in", "batch_time_out"),
        ));
        let result = generate(mode, id_name_digest());

        assert!(result.ingest_sql[0].starts_with(
            r#"UPDATE "mydb"."main" as sink SET sink."batch_time_out" = '2000-01-01 00:00:00' WHERE (sink."batch_time_out" = '9999-12-31 23:59:59')"#
        ));
        assert!(result.ingest_sql[1].contains(
            r#"stage."digest",'2000-01-01 00:00:00','9999-12-31 23:59:59' FROM"#
        ));
        // Nothing in the plan reads the batch id, the metadata row still does.
        assert!(!result.ingest_sql.concat().contains("table_batch_id"));
        assert_eq!(result.metadata_ingest_sql, vec![METADATA_INSERT.to_string()]);
    }

    #[test]
    fn test_delta_with_delete_indicator_closes_deleted_rows() {
        let mode = IngestMode::UnitemporalDelta(UnitemporalDelta {
            merge_strategy: MergeStrategy::delete_indicator("delete_indicator", vec![json!(true)]),
            ..UnitemporalDelta::new("digest", batch_id_milestoning())
        });
        let mut fields = id_name_digest();
        fields.push(Field::new("delete_indicator", DataType::Boolean));
        let result = generate(mode, fields);

        assert!(result.ingest_sql[0].contains(
            r#"WHERE (sink."id" = stage."id") AND ((sink."digest" <> stage."digest") OR (stage."delete_indicator" = true))"#
        ));
        assert!(result.ingest_sql[1].ends_with(r#"AND (stage."delete_indicator" <> true))"#));
    }

    #[test]
    fn test_snapshot_with_batch_id_milestoning() {
        let mode = IngestMode::UnitemporalSnapshot(UnitemporalSnapshot::new(
            "digest",
            batch_id_milestoning(),
        ));
        let result = generate(mode, id_name_digest());
        assert_eq!(
            result.ingest_sql,
            vec![
                format!(
                    r#"UPDATE "mydb"."main" as sink SET sink."batch_id_out" = {bid}-1 WHERE (sink."batch_id_out" = 999999999) AND (NOT (EXISTS (SELECT * FROM "mydb"."staging" as stage WHERE (sink."id" = stage."id") AND (sink."digest" = stage."digest"))))"#,
                    bid = BID
                ),
                format!(
                    r#"INSERT INTO "mydb"."main" ("id", "name", "digest", "batch_id_in", "batch_id_out") (SELECT stage."id",stage."name",stage."digest",{bid},999999999 FROM "mydb"."staging" as stage WHERE NOT (stage."digest" IN (SELECT sink."digest" FROM "mydb"."main" as sink WHERE sink."batch_id_out" = 999999999)))"#,
                    bid = BID
                ),
            ]
        );
    }

    fn partitioned_snapshot(values: BTreeMap<String, Vec<serde_json::Value>>) -> IngestMode {
        IngestMode::UnitemporalSnapshot(UnitemporalSnapshot {
            partitioning: Some(Partitioning {
                partition_fields: vec!["biz_date".to_string()],
                partition_values_by_field: values,
            }),
            ..UnitemporalSnapshot::new("digest", batch_id_milestoning())
        })
    }

    fn partitioned_fields() -> Vec<Field> {
        let mut fields = id_name_digest();
        fields.push(Field::new("biz_date", DataType::Date));
        fields
    }

    #[test]
    fn test_snapshot_partitioned_by_values() {
        let mut values = BTreeMap::new();
        values.insert("biz_date".to_string(), vec![json!("2000-01-01"), json!("2000-01-02")]);
        let result = generate(partitioned_snapshot(values), partitioned_fields());

        assert!(result.ingest_sql[0]
            .ends_with(r#"AND (sink."biz_date" IN ('2000-01-01','2000-01-02'))"#));
        assert!(result.ingest_sql[1].ends_with(
            r#"WHERE (sink."batch_id_out" = 999999999) AND (sink."biz_date" IN ('2000-01-01','2000-01-02')))))"#
        ));
    }

    #[test]
    fn test_snapshot_partitioned_by_staging_content() {
        let result = generate(partitioned_snapshot(BTreeMap::new()), partitioned_fields());

        assert!(result.ingest_sql[0].ends_with(
            r#"AND (EXISTS (SELECT * FROM "mydb"."staging" as stage WHERE sink."biz_date" = stage."biz_date"))"#
        ));
        assert!(result.ingest_sql[1].ends_with(
            r#"WHERE (sink."batch_id_out" = 999999999) AND (sink."biz_date" = stage."biz_date"))))"#
        ));
    }

    #[test]
    fn test_partitions_to_close_respect_staging_filter() {
        let staging = staging_dataset(partitioned_fields()).with_filter(DatasetFilter::new(
            "biz_date",
            FilterType::GreaterThanEqual,
            json!("2000-01-02"),
        ));
        let result = builder(partitioned_snapshot(BTreeMap::new()))
            .build()
            .generate_operations(&Datasets::new(main_dataset(), staging))
            .unwrap();

        assert!(result.ingest_sql[0].ends_with(
            r#"AND (EXISTS (SELECT * FROM "mydb"."staging" as stage WHERE (sink."biz_date" = stage."biz_date") AND (stage."biz_date" >= '2000-01-02')))"#
        ));
    }

    #[test]
    fn test_empty_snapshot_closes_open_rows() {
        let mode = IngestMode::UnitemporalSnapshot(UnitemporalSnapshot::new(
            "digest",
            batch_id_milestoning(),
        ));
        let result = builder(mode)
            .build()
            .generate_operations_for_empty_batch(&Datasets::new(
                main_dataset(),
                staging_dataset(id_name_digest()),
            ))
            .unwrap();

        assert_eq!(
            result.ingest_sql,
            vec![format!(
                r#"UPDATE "mydb"."main" as sink SET sink."batch_id_out" = {}-1 WHERE sink."batch_id_out" = 999999999"#,
                BID
            )]
        );
        assert_eq!(
            stat(&result.post_ingest_statistics_sql, StatisticName::RowsTerminated),
            format!(
                r#"SELECT COUNT(*) as rowsTerminated FROM "mydb"."main" as sink WHERE sink."batch_id_out" = {}-1"#,
                BID
            )
        );
        assert_eq!(
            stat(&result.post_ingest_statistics_sql, StatisticName::IncomingRecordCount),
            "SELECT 0 as incomingRecordCount"
        );
        assert_eq!(result.metadata_ingest_sql, vec![METADATA_INSERT.to_string()]);
    }

    #[test]
    fn test_empty_snapshot_no_op() {
        let mode = IngestMode::UnitemporalSnapshot(UnitemporalSnapshot {
            empty_dataset_handling: EmptyDatasetHandling::NoOp,
            ..UnitemporalSnapshot::new("digest", batch_id_milestoning())
        });
        let result = builder(mode)
            .build()
            .generate_operations_for_empty_batch(&Datasets::new(
                main_dataset(),
                staging_dataset(id_name_digest()),
            ))
            .unwrap();
        assert!(result.ingest_sql.is_empty());
        assert_eq!(result.post_ingest_statistics_sql.len(), 5);
        assert_eq!(result.metadata_ingest_sql.len(), 1);
    }

    #[test]
    fn test_empty_snapshot_partitioned_by_staging_content_is_no_op() {
        let result = builder(partitioned_snapshot(BTreeMap::new()))
            .build()
            .generate_operations_for_empty_batch(&Datasets::new(
                main_dataset(),
                staging_dataset(partitioned_fields()),
            ))
            .unwrap();
        assert!(result.ingest_sql.is_empty());
    }
}

mod batch_options_tests {
    use super::*;

    #[test]
    fn test_empty_batch_for_append_only_only_records_batch() {
        let result = builder(IngestMode::AppendOnly(AppendOnly::default()))
            .build()
            .generate_operations_for_empty_batch(&Datasets::new(
                main_dataset(),
                staging_dataset(id_name_digest()),
            ))
            .unwrap();
        assert!(result.ingest_sql.is_empty());
        assert_eq!(result.pre_actions_sql.len(), 2);
        assert_eq!(result.metadata_ingest_sql, vec![METADATA_INSERT.to_string()]);
        assert!(result
            .post_ingest_statistics_sql
            .values()
            .all(|sql| sql.starts_with("SELECT 0 as ")));
    }

    #[test]
    fn test_placeholders_for_batch_id_and_timestamps() {
        let result = builder(IngestMode::AppendOnly(AppendOnly {
            batch_id_field: Some("batch_id".to_string()),
            ..Default::default()
        }))
        .batch_id_pattern("{NEXT_BATCH_ID_PATTERN}")
        .batch_start_ts_pattern("{BATCH_START_TS_PATTERN}")
        .batch_end_ts_pattern("{BATCH_END_TS_PATTERN}")
        .build()
        .generate_operations(&Datasets::new(main_dataset(), staging_dataset(id_name_digest())))
        .unwrap();

        assert!(result.ingest_sql[0].contains(r#"stage."digest",{NEXT_BATCH_ID_PATTERN} FROM"#));
        assert_eq!(
            result.metadata_ingest_sql,
            vec![r#"INSERT INTO batch_metadata ("table_name", "table_batch_id", "batch_start_ts_utc", "batch_end_ts_utc", "batch_status") (SELECT 'main',{NEXT_BATCH_ID_PATTERN},'{BATCH_START_TS_PATTERN}','{BATCH_END_TS_PATTERN}','DONE')"#.to_string()]
        );
    }

    #[test]
    fn test_invalid_placeholder_is_rejected() {
        let err = builder(IngestMode::AppendOnly(AppendOnly::default()))
            .batch_id_pattern("NEXT_BATCH_ID")
            .build()
            .generate_operations(&Datasets::new(main_dataset(), staging_dataset(id_name_digest())))
            .unwrap_err();
        assert!(matches!(err, IngestError::Configuration(_)));
    }

    #[test]
    fn test_additional_metadata_and_request_id() {
        let result = builder(IngestMode::AppendOnly(AppendOnly::default()))
            .additional_metadata("watermark", "abc")
            .ingest_request_id("req-1")
            .batch_status("SUCCEEDED")
            .build()
            .generate_operations(&Datasets::new(main_dataset(), staging_dataset(id_name_digest())))
            .unwrap();
        assert_eq!(
            result.metadata_ingest_sql[0],
            format!(
                r#"INSERT INTO batch_metadata ("table_name", "table_batch_id", "batch_start_ts_utc", "batch_end_ts_utc", "batch_status", "additional_metadata", "ingest_request_id") (SELECT 'main',{},'2000-01-01 00:00:00',CURRENT_TIMESTAMP(),'SUCCEEDED','{{"watermark":"abc"}}','req-1')"#,
                BID
            )
        );
    }

    #[test]
    fn test_create_and_cleanup_staging() {
        let result = builder(IngestMode::NontemporalSnapshot(NontemporalSnapshot::default()))
            .create_staging_dataset(true)
            .cleanup_staging_data(true)
            .build()
            .generate_operations(&Datasets::new(main_dataset(), staging_dataset(id_name_digest())))
            .unwrap();

        assert_eq!(
            result.pre_actions_sql[2],
            r#"CREATE TABLE IF NOT EXISTS "mydb"."staging"("id" INTEGER,"name" VARCHAR,"digest" VARCHAR,PRIMARY KEY ("id"))"#
        );
        assert_eq!(
            result.post_actions_sql,
            vec![r#"DROP TABLE IF EXISTS "mydb"."staging""#.to_string()]
        );
        assert_eq!(
            result.post_cleanup_sql,
            vec![r#"DELETE FROM "mydb"."staging" as stage"#.to_string()]
        );
    }

    #[test]
    fn test_schema_evolution_adds_missing_columns() {
        let main = main_dataset().with_fields(vec![
            Field::new("id", DataType::Int).primary_key(),
            Field::new("name", DataType::Varchar),
        ]);
        let staging = staging_dataset(vec![
            Field::new("id", DataType::Int).primary_key(),
            Field::new("name", DataType::Varchar),
            Field::new("amount", DataType::Double),
        ]);
        let mode = IngestMode::AppendOnly(AppendOnly::default());

        let err = builder(mode.clone())
            .build()
            .generate_operations(&Datasets::new(main.clone(), staging.clone()))
            .unwrap_err();
        assert_eq!(
            err,
            IngestError::Configuration(
                "Field [amount] of staging dataset is missing from main dataset [main]".to_string()
            )
        );

        let result = builder(mode)
            .enable_schema_evolution(true)
            .build()
            .generate_operations(&Datasets::new(main, staging))
            .unwrap();
        assert_eq!(
            result.pre_actions_sql,
            vec![
                r#"CREATE TABLE IF NOT EXISTS "mydb"."main"("id" INTEGER,"name" VARCHAR,"amount" DOUBLE,PRIMARY KEY ("id"))"#.to_string(),
                METADATA_CREATE.to_string(),
                r#"ALTER TABLE "mydb"."main" ADD COLUMN "amount" DOUBLE"#.to_string(),
            ]
        );
        assert!(result.ingest_sql[0].starts_with(r#"INSERT INTO "mydb"."main" ("id", "name", "amount")"#));
    }

    #[test]
    fn test_statements_follow_execution_order() {
        let result = builder(IngestMode::NontemporalSnapshot(NontemporalSnapshot::default()))
            .cleanup_staging_data(true)
            .build()
            .generate_operations(&Datasets::new(main_dataset(), staging_dataset(id_name_digest())))
            .unwrap();
        let statements = result.statements();
        assert!(statements[0].starts_with(r#"CREATE TABLE IF NOT EXISTS "mydb"."main""#));
        assert!(statements[2].starts_with("SELECT COUNT(*) as rowsDeleted"));
        assert!(statements[3].starts_with("DELETE FROM"));
        assert_eq!(statements.last(), Some(&r#"DELETE FROM "mydb"."staging" as stage"#));
    }

    #[test]
    fn test_unknown_sink() {
        let err = builder(IngestMode::AppendOnly(AppendOnly::default()))
            .sink("oracle")
            .build()
            .generate_operations(&Datasets::new(main_dataset(), staging_dataset(id_name_digest())))
            .unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedDialect(_)));
    }

    #[test]
    fn test_memsql_quoting() {
        let result = builder(IngestMode::NontemporalSnapshot(NontemporalSnapshot::default()))
            .sink("memsql")
            .build()
            .generate_operations(&Datasets::new(main_dataset(), staging_dataset(id_name_digest())))
            .unwrap();
        assert_eq!(result.ingest_sql[0], "DELETE FROM `mydb`.`main` as sink");
        assert_eq!(
            stat(&result.pre_ingest_statistics_sql, StatisticName::RowsDeleted),
            "SELECT COUNT(*) as `rowsDeleted` FROM `mydb`.`main` as sink"
        );
        assert!(result.pre_actions_sql[0].contains("`name` TEXT"));
    }

    #[test]
    fn test_result_serializes_statistics_by_name() {
        let result = generate(
            IngestMode::NontemporalSnapshot(NontemporalSnapshot::default()),
            id_name_digest(),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json["preIngestStatisticsSql"]["ROWS_DELETED"],
            json!(r#"SELECT COUNT(*) as rowsDeleted FROM "mydb"."main" as sink"#)
        );
        assert!(json["ingestSql"].is_array());
    }
}

mod data_split_tests {
    use super::*;

    fn split_fields() -> Vec<Field> {
        let mut fields = id_name_digest();
        fields.push(Field::new("data_split", DataType::Int));
        fields
    }

    fn split_mode() -> IngestMode {
        IngestMode::AppendOnly(AppendOnly {
            batch_id_field: Some("batch_id".to_string()),
            data_split_field: Some("data_split".to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn test_one_batch_per_range() {
        let results = builder(split_mode())
            .create_staging_dataset(true)
            .build()
            .generate_operations_with_data_splits(
                &Datasets::new(main_dataset(), staging_dataset(split_fields())),
                &[DataSplitRange::new(1, 1), DataSplitRange::new(2, 3)],
            )
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results[0].ingest_sql[0]
            .ends_with(r#"WHERE (stage."data_split" >= 1) AND (stage."data_split" <= 1))"#));
        assert!(results[1].ingest_sql[0]
            .ends_with(r#"WHERE (stage."data_split" >= 2) AND (stage."data_split" <= 3))"#));
        assert_eq!(
            stat(&results[1].post_ingest_statistics_sql, StatisticName::IncomingRecordCount),
            r#"SELECT COUNT(*) as incomingRecordCount FROM "mydb"."staging" as stage WHERE (stage."data_split" >= 2) AND (stage."data_split" <= 3)"#
        );
        // The split column stays in staging.
        assert!(!results[0].pre_actions_sql[0].contains("data_split"));
        assert!(results[0].post_actions_sql.is_empty());
        assert_eq!(results[1].post_actions_sql.len(), 1);
        assert_eq!(results[0].metadata_ingest_sql, results[1].metadata_ingest_sql);
    }

    #[test]
    fn test_mode_without_split_field_is_rejected() {
        let err = builder(IngestMode::NontemporalSnapshot(NontemporalSnapshot::default()))
            .build()
            .generate_operations_with_data_splits(
                &Datasets::new(main_dataset(), staging_dataset(id_name_digest())),
                &[DataSplitRange::new(1, 1)],
            )
            .unwrap_err();
        assert_eq!(
            err,
            IngestError::Configuration("NontemporalSnapshot has no data split field".to_string())
        );
    }

    #[test]
    fn test_empty_ranges_are_rejected() {
        let err = builder(split_mode())
            .build()
            .generate_operations_with_data_splits(
                &Datasets::new(main_dataset(), staging_dataset(split_fields())),
                &[],
            )
            .unwrap_err();
        assert!(matches!(err, IngestError::Configuration(_)));
    }
}

mod sql_syntax_tests {
    use super::*;
    use sqlparser::dialect::GenericDialect;
    use sqlparser::parser::Parser;

    fn assert_parses(result: &GeneratorResult) {
        for sql in result.statements() {
            if let Err(e) = Parser::parse_sql(&GenericDialect {}, sql) {
                panic!("failed to parse {}: {}", sql, e);
            }
        }
    }

    #[test]
    fn test_unitemporal_delta_statements_parse() {
        let mode = IngestMode::UnitemporalDelta(UnitemporalDelta {
            merge_strategy: MergeStrategy::delete_indicator(
                "delete_indicator",
                vec![json!("yes"), json!("1")],
            ),
            versioning_strategy: VersioningStrategy::MaxVersion {
                version_field: "version".to_string(),
            },
            ..UnitemporalDelta::new(
                "digest",
                TransactionMilestoning::batch_id_and_date_time(
                    "batch_id_in",
                    "batch_id_out",
                    "batch_time_in",
                    "batch_time_out",
                ),
            )
        });
        let mut fields = id_name_digest();
        fields.push(Field::new("version", DataType::Int));
        fields.push(Field::new("delete_indicator", DataType::Varchar));
        assert_parses(&generate(mode, fields));
    }

    #[test]
    fn test_nontemporal_delta_statements_parse() {
        let mode = IngestMode::NontemporalDelta(NontemporalDelta {
            auditing: Auditing::date_time("batch_update_time"),
            ..NontemporalDelta::new("digest")
        });
        let result = builder(mode)
            .cleanup_staging_data(true)
            .create_staging_dataset(true)
            .build()
            .generate_operations(&Datasets::new(main_dataset(), staging_dataset(id_name_digest())))
            .unwrap();
        assert_parses(&result);
    }

    #[test]
    fn test_unitemporal_snapshot_statements_parse() {
        let mode = IngestMode::UnitemporalSnapshot(UnitemporalSnapshot::new(
            "digest",
            batch_id_milestoning(),
        ));
        assert_parses(&generate(mode, id_name_digest()));
    }
}
