//! CLI binary entry point for ingest-sql

#[cfg(feature = "cli")]
use anyhow::Context;
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand, ValueEnum};
#[cfg(feature = "cli")]
use ingest_sql_sdk::cli::commands::generate::{GenerateArgs, OutputFormat, handle_generate};
#[cfg(feature = "cli")]
use ingest_sql_sdk::config::{CONFIG_FILENAME, GeneratorConfig, sample_config};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "ingest-sql")]
#[command(about = "Generate SQL for incremental and temporal ingestion")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Generate the SQL for an ingestion request
    Generate {
        /// Request file (JSON or YAML), or '-' for stdin
        input: String,
        /// Directory containing .ingest-sql.toml
        #[arg(short, long)]
        config_dir: Option<PathBuf>,
        /// Target sink, overriding the configuration
        #[arg(short, long)]
        sink: Option<String>,
        /// Identifier case conversion: NONE, TO_UPPER or TO_LOWER
        #[arg(long)]
        case_conversion: Option<String>,
        /// Batch start time as 'YYYY-MM-DD HH:MM:SS'
        #[arg(long)]
        execution_timestamp: Option<String>,
        /// Generate the statements for a batch with no incoming data
        #[arg(long)]
        empty_batch: bool,
        /// Output format
        #[arg(short, long, value_enum, default_value = "sql")]
        format: FormatArg,
    },
    /// Write a sample .ingest-sql.toml
    Init {
        /// Target directory
        #[arg(default_value = ".")]
        dir: PathBuf,
        /// Overwrite an existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

#[cfg(feature = "cli")]
#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Sql,
    Json,
}

#[cfg(feature = "cli")]
impl From<FormatArg> for OutputFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Sql => OutputFormat::Sql,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[cfg(feature = "cli")]
fn init_config(dir: PathBuf, force: bool) -> anyhow::Result<()> {
    if GeneratorConfig::exists(&dir) && !force {
        anyhow::bail!(
            "{} already exists in {} (use --force to overwrite)",
            CONFIG_FILENAME,
            dir.display()
        );
    }
    let path = dir.join(CONFIG_FILENAME);
    std::fs::write(&path, sample_config())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

#[cfg(feature = "cli")]
fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Generate {
            input,
            config_dir,
            sink,
            case_conversion,
            execution_timestamp,
            empty_batch,
            format,
        } => {
            let args = GenerateArgs {
                input,
                config_dir,
                sink,
                case_conversion,
                execution_timestamp,
                empty_batch,
                format: format.into(),
            };
            handle_generate(&args)?;
        }
        Commands::Init { dir, force } => init_config(dir, force)?,
    }
    Ok(())
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Build with --features cli");
    std::process::exit(1);
}
