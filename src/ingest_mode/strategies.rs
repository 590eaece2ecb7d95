//! Sub-strategies composed by the ingest modes

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whether rows get an audit timestamp column
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Auditing {
    #[default]
    NoAuditing,
    DateTime { date_time_field: String },
}

impl Auditing {
    pub fn date_time(field: impl Into<String>) -> Self {
        Auditing::DateTime {
            date_time_field: field.into(),
        }
    }

    pub fn audit_field(&self) -> Option<&str> {
        match self {
            Auditing::NoAuditing => None,
            Auditing::DateTime { date_time_field } => Some(date_time_field),
        }
    }
}

/// How duplicate staging rows are treated by append-only ingestion
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DeduplicationStrategy {
    #[default]
    AllowDuplicates,
    /// Skip staging rows whose key and digest already exist in main
    FilterDuplicates,
    /// Keep only the highest version per primary key
    DeduplicateAndVersion { version_field: String },
}

/// Version resolution applied to staging before merging
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum VersioningStrategy {
    #[default]
    NoVersioning,
    MaxVersion { version_field: String },
}

impl VersioningStrategy {
    pub fn version_field(&self) -> Option<&str> {
        match self {
            VersioningStrategy::NoVersioning => None,
            VersioningStrategy::MaxVersion { version_field } => Some(version_field),
        }
    }
}

/// How deletes arrive in a delta batch
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MergeStrategy {
    #[default]
    NoDeletes,
    /// Rows whose `delete_field` matches one of `delete_values` are deletions
    DeleteIndicator {
        delete_field: String,
        delete_values: Vec<serde_json::Value>,
    },
}

impl MergeStrategy {
    pub fn delete_indicator(field: impl Into<String>, values: Vec<serde_json::Value>) -> Self {
        MergeStrategy::DeleteIndicator {
            delete_field: field.into(),
            delete_values: values,
        }
    }

    pub fn delete_field(&self) -> Option<&str> {
        match self {
            MergeStrategy::NoDeletes => None,
            MergeStrategy::DeleteIndicator { delete_field, .. } => Some(delete_field),
        }
    }
}

/// Transaction-time milestoning columns.
///
/// `*_in` columns record when a row version opened; `*_out` columns hold the
/// infinite sentinel while the version is open and the closing batch after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TransactionMilestoning {
    BatchId {
        batch_id_in_name: String,
        batch_id_out_name: String,
    },
    BatchIdAndDateTime {
        batch_id_in_name: String,
        batch_id_out_name: String,
        date_time_in_name: String,
        date_time_out_name: String,
    },
    TransactionDateTime {
        date_time_in_name: String,
        date_time_out_name: String,
    },
}

impl TransactionMilestoning {
    pub fn batch_id(in_name: impl Into<String>, out_name: impl Into<String>) -> Self {
        TransactionMilestoning::BatchId {
            batch_id_in_name: in_name.into(),
            batch_id_out_name: out_name.into(),
        }
    }

    pub fn batch_id_and_date_time(
        batch_id_in: impl Into<String>,
        batch_id_out: impl Into<String>,
        date_time_in: impl Into<String>,
        date_time_out: impl Into<String>,
    ) -> Self {
        TransactionMilestoning::BatchIdAndDateTime {
            batch_id_in_name: batch_id_in.into(),
            batch_id_out_name: batch_id_out.into(),
            date_time_in_name: date_time_in.into(),
            date_time_out_name: date_time_out.into(),
        }
    }

    pub fn date_time(in_name: impl Into<String>, out_name: impl Into<String>) -> Self {
        TransactionMilestoning::TransactionDateTime {
            date_time_in_name: in_name.into(),
            date_time_out_name: out_name.into(),
        }
    }

    pub fn batch_id_in(&self) -> Option<&str> {
        match self {
            TransactionMilestoning::BatchId {
                batch_id_in_name, ..
            }
            | TransactionMilestoning::BatchIdAndDateTime {
                batch_id_in_name, ..
            } => Some(batch_id_in_name),
            TransactionMilestoning::TransactionDateTime { .. } => None,
        }
    }

    pub fn batch_id_out(&self) -> Option<&str> {
        match self {
            TransactionMilestoning::BatchId {
                batch_id_out_name, ..
            }
            | TransactionMilestoning::BatchIdAndDateTime {
                batch_id_out_name, ..
            } => Some(batch_id_out_name),
            TransactionMilestoning::TransactionDateTime { .. } => None,
        }
    }

    pub fn date_time_in(&self) -> Option<&str> {
        match self {
            TransactionMilestoning::BatchIdAndDateTime {
                date_time_in_name, ..
            }
            | TransactionMilestoning::TransactionDateTime {
                date_time_in_name, ..
            } => Some(date_time_in_name),
            TransactionMilestoning::BatchId { .. } => None,
        }
    }

    pub fn date_time_out(&self) -> Option<&str> {
        match self {
            TransactionMilestoning::BatchIdAndDateTime {
                date_time_out_name, ..
            }
            | TransactionMilestoning::TransactionDateTime {
                date_time_out_name, ..
            } => Some(date_time_out_name),
            TransactionMilestoning::BatchId { .. } => None,
        }
    }

    /// Column names in table order: batch id in/out, then time in/out
    pub fn field_names(&self) -> Vec<&str> {
        [
            self.batch_id_in(),
            self.batch_id_out(),
            self.date_time_in(),
            self.date_time_out(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Columns that join the primary key of the main table
    pub fn in_field_names(&self) -> Vec<&str> {
        [self.batch_id_in(), self.date_time_in()]
            .into_iter()
            .flatten()
            .collect()
    }
}

/// How a bulk load obtains its digest column
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DigestGenStrategy {
    #[default]
    NoDigest,
    /// Digest computed in SQL by a user-defined function over the row's fields
    UdfBased {
        digest_udf_name: String,
        digest_field: String,
        #[serde(default)]
        fields_to_exclude_from_digest: Vec<String>,
    },
    /// Digest column supplied with the data
    UserProvided { digest_field: String },
}

impl DigestGenStrategy {
    pub fn digest_field(&self) -> Option<&str> {
        match self {
            DigestGenStrategy::NoDigest => None,
            DigestGenStrategy::UdfBased { digest_field, .. }
            | DigestGenStrategy::UserProvided { digest_field } => Some(digest_field),
        }
    }
}

/// Partition scope for unitemporal snapshots.
///
/// With explicit values only those partitions are closed; without values the
/// partitions present in staging are.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partitioning {
    pub partition_fields: Vec<String>,
    #[serde(default)]
    pub partition_values_by_field: BTreeMap<String, Vec<serde_json::Value>>,
}

/// What a snapshot does when staging is empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmptyDatasetHandling {
    NoOp,
    #[default]
    DeleteTargetData,
}
