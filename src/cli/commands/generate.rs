//! Generate command implementation

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::cli::error::CliError;
use crate::config::GeneratorConfig;
use crate::generator::{DataSplitRange, GeneratorResult, RelationalGenerator};
use crate::ingest_mode::IngestMode;
use crate::planner::Datasets;

/// Format of the generated output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Statements grouped by phase, each terminated by `;`
    #[default]
    Sql,
    /// The generator results as pretty JSON
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sql" => Ok(OutputFormat::Sql),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}. Use 'sql' or 'json'.", s)),
        }
    }
}

/// An ingestion request file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    pub datasets: Datasets,
    pub ingest_mode: IngestMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_splits: Vec<DataSplitRange>,
}

impl IngestRequest {
    /// Parse a request written as JSON or YAML
    pub fn parse(content: &str) -> Result<Self, CliError> {
        if content.trim_start().starts_with('{') {
            serde_json::from_str(content).map_err(|e| CliError::RequestParseError(e.to_string()))
        } else {
            serde_yaml::from_str(content).map_err(|e| CliError::RequestParseError(e.to_string()))
        }
    }
}

/// Arguments of the generate command
#[derive(Debug, Clone, Default)]
pub struct GenerateArgs {
    /// Request file path, or `-` for stdin
    pub input: String,
    /// Directory holding `.ingest-sql.toml`; the current directory when absent
    pub config_dir: Option<PathBuf>,
    pub sink: Option<String>,
    pub case_conversion: Option<String>,
    /// Batch start time as `YYYY-MM-DD HH:MM:SS`
    pub execution_timestamp: Option<String>,
    pub empty_batch: bool,
    pub format: OutputFormat,
}

/// Load input content from file or stdin
fn load_input(input: &str) -> Result<String, CliError> {
    if input == "-" {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .map_err(|e| CliError::InvalidArgument(format!("Failed to read stdin: {}", e)))?;
        Ok(content)
    } else {
        let path = PathBuf::from(input);
        std::fs::read_to_string(&path).map_err(|e| CliError::FileReadError(path, e.to_string()))
    }
}

/// Generate the SQL for `request` under `args`
pub fn generate(
    request: IngestRequest,
    args: &GenerateArgs,
) -> Result<Vec<GeneratorResult>, CliError> {
    let config_dir = args.config_dir.as_deref().unwrap_or(Path::new("."));
    let config = GeneratorConfig::load(config_dir)?;
    let mut options = config.to_options(request.ingest_mode);

    if let Some(sink) = &args.sink {
        options.sink = sink.clone();
    }
    if let Some(conversion) = &args.case_conversion {
        options.case_conversion = conversion.parse().map_err(CliError::InvalidArgument)?;
    }
    if let Some(timestamp) = &args.execution_timestamp {
        let timestamp = NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S").map_err(|e| {
            CliError::InvalidArgument(format!("Invalid execution timestamp '{}': {}", timestamp, e))
        })?;
        options.execution_timestamp = Some(timestamp);
    }

    let generator = RelationalGenerator::new(options);
    let results = if args.empty_batch {
        vec![generator.generate_operations_for_empty_batch(&request.datasets)?]
    } else if !request.data_splits.is_empty() {
        generator.generate_operations_with_data_splits(&request.datasets, &request.data_splits)?
    } else {
        vec![generator.generate_operations(&request.datasets)?]
    };
    Ok(results)
}

/// Render results as SQL text, one phase header per non-empty phase
pub fn format_sql(results: &[GeneratorResult]) -> String {
    let mut out = String::new();
    for (index, result) in results.iter().enumerate() {
        if results.len() > 1 {
            out.push_str(&format!("-- batch {}\n", index + 1));
        }
        let mut phase = |name: &str, statements: Vec<&String>| {
            if statements.is_empty() {
                return;
            }
            out.push_str(&format!("-- {}\n", name));
            for statement in statements {
                out.push_str(statement);
                out.push_str(";\n");
            }
        };
        phase("pre actions", result.pre_actions_sql.iter().collect());
        phase(
            "pre ingest statistics",
            result.pre_ingest_statistics_sql.values().collect(),
        );
        phase("ingest", result.ingest_sql.iter().collect());
        phase(
            "post ingest statistics",
            result.post_ingest_statistics_sql.values().collect(),
        );
        phase("metadata", result.metadata_ingest_sql.iter().collect());
        phase("post actions", result.post_actions_sql.iter().collect());
        phase("post cleanup", result.post_cleanup_sql.iter().collect());
    }
    out
}

/// Handle the generate command
pub fn handle_generate(args: &GenerateArgs) -> Result<(), CliError> {
    let request = IngestRequest::parse(&load_input(&args.input)?)?;
    let results = generate(request, args)?;

    match args.format {
        OutputFormat::Sql => print!("{}", format_sql(&results)),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&results)
                .map_err(|e| CliError::SerializationError(e.to_string()))?;
            println!("{}", json);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUEST: &str = r#"
datasets:
  main:
    name: main
    database: mydb
  staging:
    kind: table
    name: staging
    database: mydb
    schema:
      fields:
        - name: id
          type:
            dataType: INT
          primaryKey: true
        - name: name
          type:
            dataType: VARCHAR
ingestMode:
  mode: nontemporalSnapshot
"#;

    #[test]
    fn test_parse_yaml_request() {
        let request = IngestRequest::parse(REQUEST).unwrap();
        assert_eq!(request.datasets.main.name(), "main");
        assert_eq!(request.ingest_mode.name(), "NontemporalSnapshot");
        assert!(request.data_splits.is_empty());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            IngestRequest::parse("{ not json"),
            Err(CliError::RequestParseError(_))
        ));
    }

    #[test]
    fn test_generate_and_format_sql() {
        let dir = tempfile::tempdir().unwrap();
        let args = GenerateArgs {
            input: "-".to_string(),
            config_dir: Some(dir.path().to_path_buf()),
            sink: Some("ansi".to_string()),
            execution_timestamp: Some("2000-01-01 00:00:00".to_string()),
            ..Default::default()
        };
        let results = generate(IngestRequest::parse(REQUEST).unwrap(), &args).unwrap();
        let sql = format_sql(&results);
        assert!(sql.contains("-- ingest\nDELETE FROM \"mydb\".\"main\" as sink;\n"));
        assert!(sql.contains("'2000-01-01 00:00:00'"));
    }

    #[test]
    fn test_invalid_timestamp_is_rejected() {
        let args = GenerateArgs {
            input: "-".to_string(),
            execution_timestamp: Some("yesterday".to_string()),
            ..Default::default()
        };
        let err = generate(IngestRequest::parse(REQUEST).unwrap(), &args).unwrap_err();
        assert!(matches!(err, CliError::InvalidArgument(_)));
    }
}
