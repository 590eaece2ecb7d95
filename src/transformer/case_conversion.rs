//! Identifier case conversion for datasets and ingest modes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ingest_mode::IngestMode;
use crate::models::{DatasetDefinition, StagingDataset};

use super::optimizer::{
    LowerCaseOptimizer, Optimizer, UpperCaseOptimizer, rewrite_definition, rewrite_staged_files,
};

/// Case applied to every identifier of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseConversion {
    #[default]
    None,
    ToUpper,
    ToLower,
}

impl CaseConversion {
    /// The conversion that undoes this one on identifiers written in the opposite case
    pub fn inverse(self) -> CaseConversion {
        match self {
            CaseConversion::None => CaseConversion::None,
            CaseConversion::ToUpper => CaseConversion::ToLower,
            CaseConversion::ToLower => CaseConversion::ToUpper,
        }
    }

    pub fn apply(self, identifier: &str) -> String {
        match self {
            CaseConversion::None => identifier.to_string(),
            CaseConversion::ToUpper => identifier.to_uppercase(),
            CaseConversion::ToLower => identifier.to_lowercase(),
        }
    }

    /// Plan optimizer enforcing this case, if any
    pub fn optimizer(self) -> Option<Box<dyn Optimizer>> {
        match self {
            CaseConversion::None => None,
            CaseConversion::ToUpper => Some(Box::new(UpperCaseOptimizer)),
            CaseConversion::ToLower => Some(Box::new(LowerCaseOptimizer)),
        }
    }
}

impl fmt::Display for CaseConversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseConversion::None => write!(f, "NONE"),
            CaseConversion::ToUpper => write!(f, "TO_UPPER"),
            CaseConversion::ToLower => write!(f, "TO_LOWER"),
        }
    }
}

impl FromStr for CaseConversion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NONE" => Ok(CaseConversion::None),
            "TO_UPPER" | "UPPER" => Ok(CaseConversion::ToUpper),
            "TO_LOWER" | "LOWER" => Ok(CaseConversion::ToLower),
            _ => Err(format!("Unknown case conversion: {}", s)),
        }
    }
}

/// Convert table, group and database names, fields, index columns,
/// column-store keys and shard keys. Aliases are kept.
///
/// # Example
///
/// ```rust
/// use ingest_sql_sdk::models::{DataType, DatasetDefinition, Field};
/// use ingest_sql_sdk::transformer::{CaseConversion, convert_dataset};
///
/// let main = DatasetDefinition::new("main")
///     .with_database("mydb")
///     .with_alias("sink")
///     .with_fields(vec![Field::new("id", DataType::Int).primary_key()]);
///
/// let upper = convert_dataset(&main, CaseConversion::ToUpper);
/// assert_eq!(upper.name(), "MAIN");
/// assert_eq!(upper.alias(), "sink");
/// assert_eq!(convert_dataset(&upper, CaseConversion::ToUpper.inverse()), main);
/// ```
pub fn convert_dataset(
    dataset: &DatasetDefinition,
    conversion: CaseConversion,
) -> DatasetDefinition {
    if conversion == CaseConversion::None {
        return dataset.clone();
    }
    rewrite_definition(dataset.clone(), &|identifier| conversion.apply(identifier))
}

pub fn convert_staging(staging: &StagingDataset, conversion: CaseConversion) -> StagingDataset {
    match staging {
        StagingDataset::Table(dataset) => {
            StagingDataset::Table(convert_dataset(dataset, conversion))
        }
        StagingDataset::StagedFiles(files) => {
            if conversion == CaseConversion::None {
                return staging.clone();
            }
            StagingDataset::StagedFiles(rewrite_staged_files(files.clone(), &|identifier| {
                conversion.apply(identifier)
            }))
        }
    }
}

/// Convert the field names an ingest mode refers to
pub fn convert_ingest_mode(mode: &IngestMode, conversion: CaseConversion) -> IngestMode {
    mode.convert_case(&|identifier| conversion.apply(identifier))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_conversion_parse_and_display() {
        for conversion in [
            CaseConversion::None,
            CaseConversion::ToUpper,
            CaseConversion::ToLower,
        ] {
            assert_eq!(conversion.to_string().parse::<CaseConversion>(), Ok(conversion));
        }
        assert!("sideways".parse::<CaseConversion>().is_err());
    }

    #[test]
    fn test_inverse_of_inverse() {
        assert_eq!(CaseConversion::ToUpper.inverse().inverse(), CaseConversion::ToUpper);
        assert_eq!(CaseConversion::None.inverse(), CaseConversion::None);
    }
}
