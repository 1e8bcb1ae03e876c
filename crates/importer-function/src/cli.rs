//! Command-line arguments

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Adopt existing cloud resources into a composition by their tags
#[derive(Debug, Parser)]
#[command(name = "tag-importer", version, about)]
pub struct Cli {
    /// Log at debug level unless RUST_LOG is set
    #[arg(long, global = true, env = "TAG_IMPORTER_DEBUG")]
    pub debug: bool,

    /// Log line format
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = LogFormat::Text,
        env = "TAG_IMPORTER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one reconciliation pass for a RunFunction request
    Run(RunArgs),
    /// Check a Function input document and print its filters
    ValidateInput(ValidateInputArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    /// JSON request file, `-` for stdin
    #[arg(long, default_value = "-")]
    pub request: PathBuf,

    /// TOML configuration file
    #[arg(long, env = "TAG_IMPORTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Tagging endpoint URL, overrides the config file
    #[arg(long, env = "TAG_IMPORTER_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Region used to derive the default endpoint
    #[arg(long)]
    pub region: Option<String>,

    /// Tag whose value is adopted as the external name
    #[arg(long = "identity-tag")]
    pub identity_tag: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct ValidateInputArgs {
    /// Input document (YAML or JSON)
    #[arg(long)]
    pub input: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}
