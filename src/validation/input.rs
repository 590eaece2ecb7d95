//! Input validation and sanitization utilities.
//!
//! Identifiers are always quoted when rendered, so reserved words are legal
//! names here. What is rejected is anything that could break out of the
//! quoting: quote characters, control characters and excessive length.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length for table, group and database names
pub const MAX_IDENTIFIER_LENGTH: usize = 255;

/// Maximum length for a caller-supplied placeholder pattern
pub const MAX_PATTERN_LENGTH: usize = 128;

static IDENTIFIER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$\-. ]*$").expect("Invalid regex"));

static PLACEHOLDER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{[A-Za-z0-9_]+\}$").expect("Invalid regex"));

/// Errors that can occur during input validation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ValidationError {
    /// Input is empty when a value is required
    #[error("{0} cannot be empty")]
    Empty(&'static str),

    /// Input exceeds maximum allowed length
    #[error("{field} exceeds maximum length (max: {max}, got: {actual})")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    /// Input contains invalid characters
    #[error("{field} contains invalid characters: {reason}")]
    InvalidCharacters { field: &'static str, reason: String },

    /// Input has invalid format
    #[error("{0}: {1}")]
    InvalidFormat(&'static str, String),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate a table, group, database or column name.
///
/// # Rules
///
/// - Must not be empty
/// - Must not exceed 255 characters
/// - Must start with a letter or underscore
/// - May contain letters, digits, underscores, hyphens, dollars, dots and spaces
///
/// # Examples
///
/// ```
/// use ingest_sql_sdk::validation::input::validate_identifier;
///
/// assert!(validate_identifier("table name", "main").is_ok());
/// assert!(validate_identifier("column name", "batch_id_in").is_ok());
/// assert!(validate_identifier("table name", "").is_err());
/// assert!(validate_identifier("column name", "id\"; DROP TABLE main;--").is_err());
/// ```
pub fn validate_identifier(field: &'static str, name: &str) -> ValidationResult<()> {
    if name.is_empty() {
        return Err(ValidationError::Empty(field));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_IDENTIFIER_LENGTH,
            actual: name.len(),
        });
    }

    if let Some(c) = name
        .chars()
        .find(|c| c.is_control() || matches!(c, '"' | '`' | '\'' | ';'))
    {
        return Err(ValidationError::InvalidCharacters {
            field,
            reason: format!("invalid character: '{}'", c.escape_default()),
        });
    }

    if !IDENTIFIER_PATTERN.is_match(name) {
        return Err(ValidationError::InvalidFormat(
            field,
            format!(
                "'{}' must start with a letter or underscore and contain only letters, digits, '_', '-', '$', '.' or spaces",
                name
            ),
        ));
    }

    Ok(())
}

/// Validate a caller-supplied placeholder such as `{NEXT_BATCH_ID_PATTERN}`.
///
/// Placeholders are substituted verbatim into SQL by the orchestrator, so
/// they must be a single brace-delimited token.
///
/// ```
/// use ingest_sql_sdk::validation::input::validate_placeholder;
///
/// assert!(validate_placeholder("{NEXT_BATCH_ID_PATTERN}").is_ok());
/// assert!(validate_placeholder("NEXT_BATCH_ID").is_err());
/// ```
pub fn validate_placeholder(pattern: &str) -> ValidationResult<()> {
    if pattern.is_empty() {
        return Err(ValidationError::Empty("placeholder pattern"));
    }
    if pattern.len() > MAX_PATTERN_LENGTH {
        return Err(ValidationError::TooLong {
            field: "placeholder pattern",
            max: MAX_PATTERN_LENGTH,
            actual: pattern.len(),
        });
    }
    if !PLACEHOLDER_PATTERN.is_match(pattern) {
        return Err(ValidationError::InvalidFormat(
            "placeholder pattern",
            format!("'{}' must look like {{NAME}}", pattern),
        ));
    }
    Ok(())
}

/// Quote an identifier with `quote`, doubling any embedded quote character.
///
/// # Examples
///
/// ```
/// use ingest_sql_sdk::validation::input::quote_identifier;
///
/// assert_eq!(quote_identifier("main", '"'), "\"main\"");
/// assert_eq!(quote_identifier("main", '`'), "`main`");
/// assert_eq!(quote_identifier("a\"b", '"'), "\"a\"\"b\"");
/// ```
pub fn quote_identifier(name: &str, quote: char) -> String {
    let escaped = name.replace(quote, &format!("{}{}", quote, quote));
    format!("{}{}{}", quote, escaped, quote)
}

/// Quote a string literal, doubling embedded single quotes.
///
/// ```
/// use ingest_sql_sdk::validation::input::quote_string_literal;
///
/// assert_eq!(quote_string_literal("main"), "'main'");
/// assert_eq!(quote_string_literal("o'brien"), "'o''brien'");
/// ```
pub fn quote_string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_length_limit() {
        let long = "a".repeat(MAX_IDENTIFIER_LENGTH + 1);
        assert_eq!(
            validate_identifier("table name", &long),
            Err(ValidationError::TooLong {
                field: "table name",
                max: MAX_IDENTIFIER_LENGTH,
                actual: MAX_IDENTIFIER_LENGTH + 1,
            })
        );
    }

    #[test]
    fn test_identifier_allows_reserved_words() {
        assert!(validate_identifier("column name", "select").is_ok());
        assert!(validate_identifier("column name", "ORDER").is_ok());
    }

    #[test]
    fn test_identifier_rejects_leading_digit() {
        let err = validate_identifier("column name", "1st").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFormat("column name", _)));
    }

    #[test]
    fn test_placeholder_rejects_quotes() {
        assert!(validate_placeholder("'{X}'").is_err());
        assert!(validate_placeholder("{BATCH_START_TS_PATTERN}").is_ok());
    }
}
