//! Logical plan IR
//!
//! Dialect-independent building blocks of an ingestion plan:
//! - Fields, schemas and datasets
//! - Value and condition expression trees
//! - Operations and the ordered logical plan

pub mod condition;
pub mod dataset;
pub mod field;
pub mod operation;
pub mod value;

pub use condition::{
    Condition, DATA_SPLIT_LOWER_BOUND_PLACEHOLDER, DATA_SPLIT_UPPER_BOUND_PLACEHOLDER, and_all,
    data_split_in_range_condition, delete_indicator_condition, match_condition,
    non_match_condition,
};
pub use dataset::{
    Dataset, DatasetDefinition, DatasetFilter, DatasetReference, FileFormat, FilterType, Index,
    SchemaDefinition, StagedFilesDataset, StagingDataset,
};
pub use field::{DataType, Field, FieldType};
pub use operation::{LogicalPlan, Operation, Selection};
pub use value::{
    ArithmeticOp, BatchIdValue, FieldValue, FunctionName, SortOrder, TimestampValue, Value,
};
