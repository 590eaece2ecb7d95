//! Ingestion modes
//!
//! Six closed variants, each a product of its sub-strategies. Every operation
//! over modes is an exhaustive `match`, so adding a variant fails to compile
//! until each of them handles it.

pub mod strategies;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{IngestError, IngestResult};

pub use strategies::{
    Auditing, DeduplicationStrategy, DigestGenStrategy, EmptyDatasetHandling, MergeStrategy,
    Partitioning, TransactionMilestoning, VersioningStrategy,
};

/// Insert staging rows as they come, optionally skipping rows already present.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendOnly {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest_field: Option<String>,
    #[serde(default)]
    pub auditing: Auditing,
    #[serde(default)]
    pub deduplication_strategy: DeduplicationStrategy,
    /// Column stamped with the allocated batch id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_split_field: Option<String>,
}

/// Replace the main table with the staging snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NontemporalSnapshot {
    #[serde(default)]
    pub auditing: Auditing,
    #[serde(default)]
    pub versioning_strategy: VersioningStrategy,
}

/// Upsert staging rows into main by primary key, in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NontemporalDelta {
    pub digest_field: String,
    #[serde(default)]
    pub auditing: Auditing,
    #[serde(default)]
    pub merge_strategy: MergeStrategy,
    #[serde(default)]
    pub versioning_strategy: VersioningStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_split_field: Option<String>,
}

/// Milestone the main table against a full staging snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitemporalSnapshot {
    pub digest_field: String,
    pub transaction_milestoning: TransactionMilestoning,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partitioning: Option<Partitioning>,
    #[serde(default)]
    pub empty_dataset_handling: EmptyDatasetHandling,
    #[serde(default)]
    pub versioning_strategy: VersioningStrategy,
}

/// Milestone the main table against a delta batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitemporalDelta {
    pub digest_field: String,
    pub transaction_milestoning: TransactionMilestoning,
    #[serde(default)]
    pub merge_strategy: MergeStrategy,
    #[serde(default)]
    pub versioning_strategy: VersioningStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_split_field: Option<String>,
}

/// Append staged files to main, stamping each row with the batch id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkLoad {
    pub batch_id_field: String,
    #[serde(default)]
    pub digest_gen_strategy: DigestGenStrategy,
    #[serde(default)]
    pub auditing: Auditing,
}

impl NontemporalDelta {
    pub fn new(digest_field: impl Into<String>) -> Self {
        Self {
            digest_field: digest_field.into(),
            auditing: Auditing::default(),
            merge_strategy: MergeStrategy::default(),
            versioning_strategy: VersioningStrategy::default(),
            data_split_field: None,
        }
    }
}

impl UnitemporalSnapshot {
    pub fn new(
        digest_field: impl Into<String>,
        transaction_milestoning: TransactionMilestoning,
    ) -> Self {
        Self {
            digest_field: digest_field.into(),
            transaction_milestoning,
            partitioning: None,
            empty_dataset_handling: EmptyDatasetHandling::default(),
            versioning_strategy: VersioningStrategy::default(),
        }
    }
}

impl UnitemporalDelta {
    pub fn new(
        digest_field: impl Into<String>,
        transaction_milestoning: TransactionMilestoning,
    ) -> Self {
        Self {
            digest_field: digest_field.into(),
            transaction_milestoning,
            merge_strategy: MergeStrategy::default(),
            versioning_strategy: VersioningStrategy::default(),
            data_split_field: None,
        }
    }
}

impl BulkLoad {
    pub fn new(batch_id_field: impl Into<String>) -> Self {
        Self {
            batch_id_field: batch_id_field.into(),
            digest_gen_strategy: DigestGenStrategy::default(),
            auditing: Auditing::default(),
        }
    }
}

/// The ingestion mode of a request.
///
/// # Example
///
/// ```rust
/// use ingest_sql_sdk::ingest_mode::{IngestMode, TransactionMilestoning, UnitemporalDelta};
///
/// let mode = IngestMode::UnitemporalDelta(UnitemporalDelta::new(
///     "DIGEST",
///     TransactionMilestoning::batch_id_and_date_time(
///         "BATCH_ID_IN", "BATCH_ID_OUT", "BATCH_TIME_IN", "BATCH_TIME_OUT",
///     ),
/// ));
/// assert!(mode.validate().is_ok());
/// assert!(mode.fields_to_exclude().contains("BATCH_TIME_OUT"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum IngestMode {
    AppendOnly(AppendOnly),
    NontemporalSnapshot(NontemporalSnapshot),
    NontemporalDelta(NontemporalDelta),
    UnitemporalSnapshot(UnitemporalSnapshot),
    UnitemporalDelta(UnitemporalDelta),
    BulkLoad(BulkLoad),
}

fn require(value: &str, what: &str) -> IngestResult<()> {
    if value.trim().is_empty() {
        return Err(IngestError::configuration(format!("{} must not be empty", what)));
    }
    Ok(())
}

fn validate_milestoning(milestoning: &TransactionMilestoning) -> IngestResult<()> {
    let names = milestoning.field_names();
    for name in &names {
        require(name, "Transaction milestoning field")?;
    }
    let distinct: BTreeSet<&str> = names.iter().copied().collect();
    if distinct.len() != names.len() {
        return Err(IngestError::configuration(
            "Transaction milestoning fields must be distinct",
        ));
    }
    Ok(())
}

fn validate_merge(merge: &MergeStrategy) -> IngestResult<()> {
    if let MergeStrategy::DeleteIndicator {
        delete_field,
        delete_values,
    } = merge
    {
        require(delete_field, "Delete indicator field")?;
        if delete_values.is_empty() {
            return Err(IngestError::configuration(format!(
                "Delete indicator [{}] has no delete values",
                delete_field
            )));
        }
    }
    Ok(())
}

fn validate_versioning(versioning: &VersioningStrategy) -> IngestResult<()> {
    if let Some(version_field) = versioning.version_field() {
        require(version_field, "Version field")?;
    }
    Ok(())
}

impl IngestMode {
    /// Variant name, as used in logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            IngestMode::AppendOnly(_) => "AppendOnly",
            IngestMode::NontemporalSnapshot(_) => "NontemporalSnapshot",
            IngestMode::NontemporalDelta(_) => "NontemporalDelta",
            IngestMode::UnitemporalSnapshot(_) => "UnitemporalSnapshot",
            IngestMode::UnitemporalDelta(_) => "UnitemporalDelta",
            IngestMode::BulkLoad(_) => "BulkLoad",
        }
    }

    /// Check that the variant carries the fields it needs.
    pub fn validate(&self) -> IngestResult<()> {
        match self {
            IngestMode::AppendOnly(mode) => {
                if let Some(digest) = &mode.digest_field {
                    require(digest, "Digest field")?;
                }
                match &mode.deduplication_strategy {
                    DeduplicationStrategy::FilterDuplicates if mode.digest_field.is_none() => {
                        return Err(IngestError::configuration(
                            "FilterDuplicates requires a digest field",
                        ));
                    }
                    DeduplicationStrategy::DeduplicateAndVersion { version_field } => {
                        require(version_field, "Version field")?;
                    }
                    _ => {}
                }
                if let Some(field) = mode.auditing.audit_field() {
                    require(field, "Audit field")?;
                }
                if let Some(field) = &mode.batch_id_field {
                    require(field, "Batch id field")?;
                }
            }
            IngestMode::NontemporalSnapshot(mode) => {
                if let Some(field) = mode.auditing.audit_field() {
                    require(field, "Audit field")?;
                }
                validate_versioning(&mode.versioning_strategy)?;
            }
            IngestMode::NontemporalDelta(mode) => {
                require(&mode.digest_field, "Digest field")?;
                if let Some(field) = mode.auditing.audit_field() {
                    require(field, "Audit field")?;
                }
                validate_merge(&mode.merge_strategy)?;
                validate_versioning(&mode.versioning_strategy)?;
            }
            IngestMode::UnitemporalSnapshot(mode) => {
                require(&mode.digest_field, "Digest field")?;
                validate_milestoning(&mode.transaction_milestoning)?;
                validate_versioning(&mode.versioning_strategy)?;
                if let Some(partitioning) = &mode.partitioning {
                    for field in partitioning.partition_values_by_field.keys() {
                        if !partitioning.partition_fields.contains(field) {
                            return Err(IngestError::configuration(format!(
                                "Partition values given for [{}] which is not a partition field",
                                field
                            )));
                        }
                    }
                }
            }
            IngestMode::UnitemporalDelta(mode) => {
                require(&mode.digest_field, "Digest field")?;
                validate_milestoning(&mode.transaction_milestoning)?;
                validate_merge(&mode.merge_strategy)?;
                validate_versioning(&mode.versioning_strategy)?;
            }
            IngestMode::BulkLoad(mode) => {
                require(&mode.batch_id_field, "Batch id field")?;
                if let DigestGenStrategy::UdfBased {
                    digest_udf_name,
                    digest_field,
                    ..
                } = &mode.digest_gen_strategy
                {
                    require(digest_udf_name, "Digest UDF name")?;
                    require(digest_field, "Digest field")?;
                }
                if let DigestGenStrategy::UserProvided { digest_field } = &mode.digest_gen_strategy
                {
                    require(digest_field, "Digest field")?;
                }
                if let Some(field) = mode.auditing.audit_field() {
                    require(field, "Audit field")?;
                }
            }
        }
        Ok(())
    }

    /// System-generated columns that a downstream digest computation must ignore.
    pub fn fields_to_exclude(&self) -> BTreeSet<String> {
        let mut fields = BTreeSet::new();
        match self {
            IngestMode::AppendOnly(mode) => {
                fields.extend(mode.digest_field.clone());
                fields.extend(mode.auditing.audit_field().map(str::to_string));
            }
            IngestMode::NontemporalSnapshot(mode) => {
                fields.extend(mode.auditing.audit_field().map(str::to_string));
            }
            IngestMode::NontemporalDelta(mode) => {
                fields.insert(mode.digest_field.clone());
                fields.extend(mode.auditing.audit_field().map(str::to_string));
            }
            IngestMode::UnitemporalSnapshot(UnitemporalSnapshot {
                digest_field,
                transaction_milestoning,
                ..
            })
            | IngestMode::UnitemporalDelta(UnitemporalDelta {
                digest_field,
                transaction_milestoning,
                ..
            }) => {
                fields.insert(digest_field.clone());
                fields.extend(transaction_milestoning.date_time_in().map(str::to_string));
                fields.extend(transaction_milestoning.date_time_out().map(str::to_string));
            }
            IngestMode::BulkLoad(mode) => {
                fields.extend(mode.digest_gen_strategy.digest_field().map(str::to_string));
                fields.extend(mode.auditing.audit_field().map(str::to_string));
            }
        }
        fields
    }

    pub fn digest_field(&self) -> Option<&str> {
        match self {
            IngestMode::AppendOnly(mode) => mode.digest_field.as_deref(),
            IngestMode::NontemporalSnapshot(_) => None,
            IngestMode::NontemporalDelta(mode) => Some(&mode.digest_field),
            IngestMode::UnitemporalSnapshot(mode) => Some(&mode.digest_field),
            IngestMode::UnitemporalDelta(mode) => Some(&mode.digest_field),
            IngestMode::BulkLoad(mode) => mode.digest_gen_strategy.digest_field(),
        }
    }

    pub fn data_split_field(&self) -> Option<&str> {
        match self {
            IngestMode::AppendOnly(mode) => mode.data_split_field.as_deref(),
            IngestMode::NontemporalDelta(mode) => mode.data_split_field.as_deref(),
            IngestMode::UnitemporalDelta(mode) => mode.data_split_field.as_deref(),
            IngestMode::NontemporalSnapshot(_)
            | IngestMode::UnitemporalSnapshot(_)
            | IngestMode::BulkLoad(_) => None,
        }
    }

    pub fn delete_indicator_field(&self) -> Option<&str> {
        match self {
            IngestMode::NontemporalDelta(mode) => mode.merge_strategy.delete_field(),
            IngestMode::UnitemporalDelta(mode) => mode.merge_strategy.delete_field(),
            IngestMode::AppendOnly(_)
            | IngestMode::NontemporalSnapshot(_)
            | IngestMode::UnitemporalSnapshot(_)
            | IngestMode::BulkLoad(_) => None,
        }
    }

    /// Rename every configured field with `convert`, leaving values untouched.
    pub fn convert_case(&self, convert: &dyn Fn(&str) -> String) -> IngestMode {
        let auditing = |auditing: &Auditing| match auditing {
            Auditing::NoAuditing => Auditing::NoAuditing,
            Auditing::DateTime { date_time_field } => Auditing::DateTime {
                date_time_field: convert(date_time_field),
            },
        };
        let versioning = |versioning: &VersioningStrategy| match versioning {
            VersioningStrategy::NoVersioning => VersioningStrategy::NoVersioning,
            VersioningStrategy::MaxVersion { version_field } => VersioningStrategy::MaxVersion {
                version_field: convert(version_field),
            },
        };
        let merge = |merge: &MergeStrategy| match merge {
            MergeStrategy::NoDeletes => MergeStrategy::NoDeletes,
            MergeStrategy::DeleteIndicator {
                delete_field,
                delete_values,
            } => MergeStrategy::DeleteIndicator {
                delete_field: convert(delete_field),
                delete_values: delete_values.clone(),
            },
        };
        let milestoning = |milestoning: &TransactionMilestoning| match milestoning {
            TransactionMilestoning::BatchId {
                batch_id_in_name,
                batch_id_out_name,
            } => TransactionMilestoning::BatchId {
                batch_id_in_name: convert(batch_id_in_name),
                batch_id_out_name: convert(batch_id_out_name),
            },
            TransactionMilestoning::BatchIdAndDateTime {
                batch_id_in_name,
                batch_id_out_name,
                date_time_in_name,
                date_time_out_name,
            } => TransactionMilestoning::BatchIdAndDateTime {
                batch_id_in_name: convert(batch_id_in_name),
                batch_id_out_name: convert(batch_id_out_name),
                date_time_in_name: convert(date_time_in_name),
                date_time_out_name: convert(date_time_out_name),
            },
            TransactionMilestoning::TransactionDateTime {
                date_time_in_name,
                date_time_out_name,
            } => TransactionMilestoning::TransactionDateTime {
                date_time_in_name: convert(date_time_in_name),
                date_time_out_name: convert(date_time_out_name),
            },
        };
        let optional = |field: &Option<String>| field.as_deref().map(convert);

        match self {
            IngestMode::AppendOnly(mode) => IngestMode::AppendOnly(AppendOnly {
                digest_field: optional(&mode.digest_field),
                auditing: auditing(&mode.auditing),
                deduplication_strategy: match &mode.deduplication_strategy {
                    DeduplicationStrategy::DeduplicateAndVersion { version_field } => {
                        DeduplicationStrategy::DeduplicateAndVersion {
                            version_field: convert(version_field),
                        }
                    }
                    other => other.clone(),
                },
                batch_id_field: optional(&mode.batch_id_field),
                data_split_field: optional(&mode.data_split_field),
            }),
            IngestMode::NontemporalSnapshot(mode) => {
                IngestMode::NontemporalSnapshot(NontemporalSnapshot {
                    auditing: auditing(&mode.auditing),
                    versioning_strategy: versioning(&mode.versioning_strategy),
                })
            }
            IngestMode::NontemporalDelta(mode) => IngestMode::NontemporalDelta(NontemporalDelta {
                digest_field: convert(&mode.digest_field),
                auditing: auditing(&mode.auditing),
                merge_strategy: merge(&mode.merge_strategy),
                versioning_strategy: versioning(&mode.versioning_strategy),
                data_split_field: optional(&mode.data_split_field),
            }),
            IngestMode::UnitemporalSnapshot(mode) => {
                IngestMode::UnitemporalSnapshot(UnitemporalSnapshot {
                    digest_field: convert(&mode.digest_field),
                    transaction_milestoning: milestoning(&mode.transaction_milestoning),
                    partitioning: mode.partitioning.as_ref().map(|p| Partitioning {
                        partition_fields: p.partition_fields.iter().map(|f| convert(f)).collect(),
                        partition_values_by_field: p
                            .partition_values_by_field
                            .iter()
                            .map(|(field, values)| (convert(field), values.clone()))
                            .collect(),
                    }),
                    empty_dataset_handling: mode.empty_dataset_handling,
                    versioning_strategy: versioning(&mode.versioning_strategy),
                })
            }
            IngestMode::UnitemporalDelta(mode) => IngestMode::UnitemporalDelta(UnitemporalDelta {
                digest_field: convert(&mode.digest_field),
                transaction_milestoning: milestoning(&mode.transaction_milestoning),
                merge_strategy: merge(&mode.merge_strategy),
                versioning_strategy: versioning(&mode.versioning_strategy),
                data_split_field: optional(&mode.data_split_field),
            }),
            IngestMode::BulkLoad(mode) => IngestMode::BulkLoad(BulkLoad {
                batch_id_field: convert(&mode.batch_id_field),
                digest_gen_strategy: match &mode.digest_gen_strategy {
                    DigestGenStrategy::NoDigest => DigestGenStrategy::NoDigest,
                    DigestGenStrategy::UdfBased {
                        digest_udf_name,
                        digest_field,
                        fields_to_exclude_from_digest,
                    } => DigestGenStrategy::UdfBased {
                        digest_udf_name: digest_udf_name.clone(),
                        digest_field: convert(digest_field),
                        fields_to_exclude_from_digest: fields_to_exclude_from_digest
                            .iter()
                            .map(|f| convert(f))
                            .collect(),
                    },
                    DigestGenStrategy::UserProvided { digest_field } => {
                        DigestGenStrategy::UserProvided {
                            digest_field: convert(digest_field),
                        }
                    }
                },
                auditing: auditing(&mode.auditing),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_duplicates_requires_digest() {
        let mode = IngestMode::AppendOnly(AppendOnly {
            deduplication_strategy: DeduplicationStrategy::FilterDuplicates,
            ..Default::default()
        });
        let err = mode.validate().unwrap_err();
        assert!(err.to_string().contains("requires a digest field"));
    }

    #[test]
    fn test_delete_indicator_requires_values() {
        let mut mode = NontemporalDelta::new("digest");
        mode.merge_strategy = MergeStrategy::delete_indicator("delete_indicator", vec![]);
        assert!(IngestMode::NontemporalDelta(mode).validate().is_err());
    }

    #[test]
    fn test_milestoning_fields_must_be_distinct() {
        let mode = IngestMode::UnitemporalDelta(UnitemporalDelta::new(
            "digest",
            TransactionMilestoning::batch_id("batch_id", "batch_id"),
        ));
        assert!(mode.validate().is_err());
    }

    #[test]
    fn test_deserialize_tagged_mode() {
        let yaml = r#"
mode: unitemporalDelta
digestField: digest
transactionMilestoning:
  type: batchId
  batchIdInName: batch_id_in
  batchIdOutName: batch_id_out
mergeStrategy:
  type: deleteIndicator
  deleteField: delete_indicator
  deleteValues: ["yes", "1", "true"]
"#;
        let mode: IngestMode = serde_yaml::from_str(yaml).unwrap();
        let IngestMode::UnitemporalDelta(delta) = &mode else {
            panic!("expected unitemporal delta, got {}", mode.name());
        };
        assert_eq!(
            delta.merge_strategy,
            MergeStrategy::delete_indicator(
                "delete_indicator",
                vec![json!("yes"), json!("1"), json!("true")]
            )
        );
        assert_eq!(mode.delete_indicator_field(), Some("delete_indicator"));
        assert!(mode.validate().is_ok());
    }

    #[test]
    fn test_convert_case_keeps_delete_values() {
        let mut delta =
            UnitemporalDelta::new("digest", TransactionMilestoning::date_time("t_in", "t_out"));
        delta.merge_strategy = MergeStrategy::delete_indicator("flag", vec![json!("yes")]);
        let upper = IngestMode::UnitemporalDelta(delta).convert_case(&|s| s.to_uppercase());
        let IngestMode::UnitemporalDelta(upper) = upper else {
            panic!("variant changed");
        };
        assert_eq!(upper.digest_field, "DIGEST");
        assert_eq!(upper.transaction_milestoning.date_time_out(), Some("T_OUT"));
        assert_eq!(
            upper.merge_strategy,
            MergeStrategy::delete_indicator("FLAG", vec![json!("yes")])
        );
    }
}
