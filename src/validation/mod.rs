//! Validation functionality
//!
//! Provides validation logic for:
//! - Input validation and quoting of identifiers and placeholders
//! - Dataset validation (unique fields, required columns, primary keys)

pub mod datasets;
pub mod input;

pub use datasets::DatasetValidator;
pub use input::{
    ValidationError, ValidationResult, quote_identifier, quote_string_literal,
    validate_identifier, validate_placeholder,
};
