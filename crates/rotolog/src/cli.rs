//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rotolog")]
#[command(version, about = "Filter log lines by severity and write them to a pluggable output")]
pub struct Cli {
    /// Logger config file (.toml, .yaml, .yml or .json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output adapter name (overrides the config file)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Write to this file through the file adapter
    #[arg(short, long, conflicts_with = "output")]
    pub file: Option<PathBuf>,

    /// Minimum severity to keep
    #[arg(short, long)]
    pub level: Option<String>,

    /// Recognized severities, least strict first (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub levels: Vec<String>,

    /// List registered output adapters and exit
    #[arg(long)]
    pub list_adapters: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
