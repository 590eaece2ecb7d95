//! Relational transformer
//!
//! Lowers a logical plan to SQL text for one sink:
//! - `sink`: dialect capability descriptors and their registry
//! - `optimizer`: plan rewrites run before rendering
//! - `render`: the recursive-descent printer
//! - `case_conversion`: identifier case for datasets and ingest modes

pub mod case_conversion;
pub mod optimizer;
pub mod render;
pub mod sink;

pub use case_conversion::{CaseConversion, convert_dataset, convert_ingest_mode, convert_staging};
pub use optimizer::{LowerCaseOptimizer, Optimizer, UpperCaseOptimizer, optimize_plan};
pub use render::{INFINITE_BATCH_ID, INFINITE_BATCH_TIME, SqlRenderer};
pub use sink::{AliasQuoting, SinkCapabilities, SinkRegistry};

use crate::error::IngestResult;
use crate::models::LogicalPlan;

/// Optimize `plan` with `optimizers`, then render it for `sink`.
pub fn transform(
    plan: LogicalPlan,
    sink: &SinkCapabilities,
    optimizers: &[Box<dyn Optimizer>],
) -> IngestResult<Vec<String>> {
    let plan = optimize_plan(plan, optimizers);
    SqlRenderer::new(sink).render_plan(&plan)
}
