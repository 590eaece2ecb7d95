//! Ingest SQL SDK - Logical-plan based SQL generation for data ingestion
//!
//! Provides:
//! - A dialect-independent plan IR (datasets, values, conditions, operations)
//! - Ingest modes covering append-only, nontemporal, unitemporal and bulk loads
//! - A planner that turns a mode and its datasets into an ordered logical plan
//! - Batch metadata bookkeeping in a ledger table
//! - A relational transformer rendering plans for the ANSI, DuckDB and MemSQL sinks
//! - A generator façade returning the SQL grouped by execution phase

pub mod error;
pub mod generator;
pub mod ingest_mode;
pub mod metadata;
pub mod models;
pub mod planner;
pub mod transformer;
pub mod validation;

#[cfg(feature = "config")]
pub mod config;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{IngestError, IngestResult};
pub use generator::{DataSplitRange, GeneratorOptions, GeneratorResult, RelationalGenerator};
pub use ingest_mode::IngestMode;
pub use planner::{Datasets, IngestPlan, Planner, StatisticName};
pub use transformer::CaseConversion;
