//! CLI-specific error types

use crate::error::IngestError;
use std::path::PathBuf;
use thiserror::Error;

/// CLI-specific error type
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to read file {0}: {1}")]
    FileReadError(PathBuf, String),

    #[error("Failed to parse request: {0}")]
    RequestParseError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Generation error: {0}")]
    IngestError(#[from] IngestError),

    #[error("Failed to serialize output: {0}")]
    SerializationError(String),
}
