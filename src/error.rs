//! Error types shared by planning, rendering and configuration

use serde::{Deserialize, Serialize};

use crate::validation::input::ValidationError;

/// Error raised while building or rendering an ingestion plan.
///
/// Every error is fatal to the generation call that raised it: no partial plan
/// or partial SQL list is ever returned alongside an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum IngestError {
    /// A required field is absent or references a column missing from a schema
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// The target sink cannot express a construct the plan needs
    #[error("Unsupported dialect: {0}")]
    UnsupportedDialect(String),
    /// The planner produced a plan that breaks one of its own guarantees
    #[error("Planning invariant violated: {0}")]
    PlanningInvariantViolation(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
}

impl IngestError {
    pub fn configuration(message: impl Into<String>) -> Self {
        IngestError::Configuration(message.into())
    }
}

impl From<ValidationError> for IngestError {
    fn from(err: ValidationError) -> Self {
        IngestError::Configuration(err.to_string())
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        IngestError::Serialization(err.to_string())
    }
}

/// Result type for planning and rendering
pub type IngestResult<T> = Result<T, IngestError>;
