//! Generator configuration file support
//!
//! Handles parsing of `.ingest-sql.toml` configuration files and
//! environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::error::{IngestError, IngestResult};
use crate::generator::GeneratorOptions;
use crate::ingest_mode::IngestMode;
use crate::metadata::{DEFAULT_BATCH_STATUS, DEFAULT_METADATA_TABLE, MetadataDataset};
use crate::transformer::CaseConversion;
use crate::transformer::sink::ANSI;

/// Default configuration filename
pub const CONFIG_FILENAME: &str = ".ingest-sql.toml";

/// Environment variable for the target sink
pub const ENV_SINK: &str = "INGEST_SQL_SINK";

/// Environment variable for identifier case conversion
pub const ENV_CASE_CONVERSION: &str = "INGEST_SQL_CASE_CONVERSION";

/// Environment variable for the batch id placeholder
pub const ENV_BATCH_ID_PATTERN: &str = "INGEST_SQL_BATCH_ID_PATTERN";

/// Environment variable toggling statistics collection
pub const ENV_COLLECT_STATISTICS: &str = "INGEST_SQL_COLLECT_STATISTICS";

/// Generator behaviour section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorSection {
    /// Sink tag: "ansi" (default), "duckdb" or "memsql"
    #[serde(default = "default_sink")]
    pub sink: String,

    #[serde(default)]
    pub case_conversion: CaseConversion,

    #[serde(default = "default_true")]
    pub collect_statistics: bool,

    #[serde(default)]
    pub cleanup_staging_data: bool,

    #[serde(default)]
    pub create_staging_dataset: bool,

    #[serde(default)]
    pub enable_schema_evolution: bool,
}

fn default_sink() -> String {
    ANSI.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for GeneratorSection {
    fn default() -> Self {
        Self {
            sink: default_sink(),
            case_conversion: CaseConversion::default(),
            collect_statistics: true,
            cleanup_staging_data: false,
            create_staging_dataset: false,
            enable_schema_evolution: false,
        }
    }
}

/// Placeholders for values the orchestrator substitutes after generation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PatternsSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id_pattern: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_start_ts_pattern: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_end_ts_pattern: Option<String>,
}

/// Metadata ledger section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataSection {
    #[serde(default = "default_table_name")]
    pub table_name: String,

    #[serde(default = "default_batch_status")]
    pub batch_status: String,
}

fn default_table_name() -> String {
    DEFAULT_METADATA_TABLE.to_string()
}

fn default_batch_status() -> String {
    DEFAULT_BATCH_STATUS.to_string()
}

impl Default for MetadataSection {
    fn default() -> Self {
        Self {
            table_name: default_table_name(),
            batch_status: default_batch_status(),
        }
    }
}

/// Main configuration structure
///
/// Represents the `.ingest-sql.toml` configuration file format.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default)]
    pub generator: GeneratorSection,

    #[serde(default)]
    pub patterns: PatternsSection,

    #[serde(default)]
    pub metadata: MetadataSection,
}

impl GeneratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a directory
    ///
    /// Looks for `.ingest-sql.toml` in `dir` and falls back to defaults if it
    /// is missing. Environment overrides apply either way.
    pub fn load(dir: &Path) -> IngestResult<Self> {
        let config_path = dir.join(CONFIG_FILENAME);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| IngestError::Io(format!("Failed to read config: {}", e)))?;
            Self::parse(&content)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> IngestResult<Self> {
        toml::from_str(content)
            .map_err(|e| IngestError::configuration(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, dir: &Path) -> IngestResult<()> {
        let content = self.to_toml()?;
        std::fs::write(dir.join(CONFIG_FILENAME), content)
            .map_err(|e| IngestError::Io(format!("Failed to write config: {}", e)))
    }

    pub fn to_toml(&self) -> IngestResult<String> {
        toml::to_string_pretty(self).map_err(|e| {
            IngestError::Serialization(format!("Failed to serialize config: {}", e))
        })
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from `lookup`; unparsable values are logged and skipped
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(sink) = lookup(ENV_SINK) {
            self.generator.sink = sink;
        }

        if let Some(conversion) = lookup(ENV_CASE_CONVERSION) {
            match conversion.parse() {
                Ok(conversion) => self.generator.case_conversion = conversion,
                Err(e) => warn!(variable = ENV_CASE_CONVERSION, "Ignoring override: {}", e),
            }
        }

        if let Some(pattern) = lookup(ENV_BATCH_ID_PATTERN) {
            self.patterns.batch_id_pattern = Some(pattern);
        }

        if let Some(collect) = lookup(ENV_COLLECT_STATISTICS) {
            match collect.parse() {
                Ok(collect) => self.generator.collect_statistics = collect,
                Err(_) => warn!(
                    variable = ENV_COLLECT_STATISTICS,
                    "Ignoring override: expected true or false, got '{}'", collect
                ),
            }
        }
    }

    /// Generator options for `ingest_mode` under this configuration
    pub fn to_options(&self, ingest_mode: IngestMode) -> GeneratorOptions {
        GeneratorOptions {
            sink: self.generator.sink.clone(),
            case_conversion: self.generator.case_conversion,
            collect_statistics: self.generator.collect_statistics,
            cleanup_staging_data: self.generator.cleanup_staging_data,
            create_staging_dataset: self.generator.create_staging_dataset,
            enable_schema_evolution: self.generator.enable_schema_evolution,
            batch_id_pattern: self.patterns.batch_id_pattern.clone(),
            batch_start_ts_pattern: self.patterns.batch_start_ts_pattern.clone(),
            batch_end_ts_pattern: self.patterns.batch_end_ts_pattern.clone(),
            metadata: MetadataDataset::default().with_name(&self.metadata.table_name),
            batch_status: self.metadata.batch_status.clone(),
            ..GeneratorOptions::new(ingest_mode)
        }
    }

    pub fn exists(dir: &Path) -> bool {
        dir.join(CONFIG_FILENAME).exists()
    }
}

/// Generate a sample configuration file content
pub fn sample_config() -> &'static str {
    r#"# Ingest SQL SDK Configuration

[generator]
# Target sink: "ansi" (default), "duckdb" or "memsql"
sink = "ansi"

# Identifier case: "NONE" (default), "TO_UPPER" or "TO_LOWER"
case_conversion = "NONE"

collect_statistics = true
cleanup_staging_data = false
create_staging_dataset = false
enable_schema_evolution = false

[patterns]
# Leave unset to allocate batch ids from the metadata table
# batch_id_pattern = "{NEXT_BATCH_ID_PATTERN}"
# batch_start_ts_pattern = "{BATCH_START_TS_PATTERN}"
# batch_end_ts_pattern = "{BATCH_END_TS_PATTERN}"

[metadata]
table_name = "batch_metadata"
batch_status = "DONE"
"#
}
