//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "fieldmap",
    version,
    about = "Map source column names onto target schema fields",
    long_about = "Map the columns of an uploaded file onto the fields of a target schema.\n\n\
                  Columns are resolved by exact and alias lookup, fuzzy matching, embedding\n\
                  similarity and, as a last resort, an external reasoning service."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(long = "log-format", value_enum, default_value = "pretty", global = true)]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Configuration file (default: ./fieldmap.toml when present).
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Schema directory (overrides the configuration file).
    #[arg(long = "schema-dir", value_name = "DIR", global = true)]
    pub schema_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Map source columns onto a target schema.
    Map(MapArgs),

    /// List loaded schemas, or the fields of one schema.
    Schemas(SchemasArgs),
}

#[derive(Args)]
pub struct MapArgs {
    /// JSON mapping request (`source_columns`, `target_schema_id`,
    /// `sample_values`). Use `-` for stdin.
    #[arg(value_name = "REQUEST", required_unless_present = "columns")]
    pub request: Option<PathBuf>,

    /// Target schema id, when columns are given on the command line.
    #[arg(long = "schema", value_name = "ID", requires = "columns")]
    pub schema: Option<String>,

    /// Source column names, comma separated.
    #[arg(
        long = "columns",
        value_name = "NAMES",
        value_delimiter = ',',
        conflicts_with = "request",
        requires = "schema"
    )]
    pub columns: Option<Vec<String>>,

    /// Auto-accept threshold for this run.
    #[arg(long = "threshold", value_name = "CONFIDENCE")]
    pub threshold: Option<f32>,

    /// Write the full run as JSON to this file.
    #[arg(long = "output", value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Print the run as JSON instead of tables.
    #[arg(long = "json")]
    pub json: bool,

    /// Exit with status 2 when any column needs review.
    #[arg(long = "fail-on-review")]
    pub fail_on_review: bool,
}

#[derive(Args)]
pub struct SchemasArgs {
    /// Show the fields and aliases of this schema.
    #[arg(value_name = "ID")]
    pub id: Option<String>,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
