//! Command-line definitions for the `confwatch` binary.

use crate::format::OutputFormat;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Print a layered configuration and follow its changes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Primary configuration file (YAML, or JSON by extension)
    pub file: PathBuf,

    /// Fallback file filling keys missing from the primary; repeatable, strongest first
    #[arg(short, long = "fallback", value_name = "FILE")]
    pub fallbacks: Vec<PathBuf>,

    /// Skip the user-level defaults in ~/.confwatch/config.yaml
    #[arg(long)]
    pub no_user_config: bool,

    /// Treat a missing primary file as empty
    #[arg(long)]
    pub ignore_missing: bool,

    /// Only load the sub-tree at this dot-separated path
    #[arg(long, value_name = "PATH")]
    pub root_path: Option<String>,

    /// Reload every N milliseconds
    #[arg(long, value_name = "N")]
    pub interval_ms: Option<u64>,

    /// Reload when a configuration file changes on disk
    #[arg(short, long)]
    pub watch: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub format: OutputFormat,

    /// Print the configuration once and exit
    #[arg(long)]
    pub once: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2")]
    pub log: String,
}

impl Cli {
    /// Periodic reload interval, if requested. Zero disables it.
    pub fn interval(&self) -> Option<Duration> {
        self.interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// The user-level defaults file, unless disabled or no home directory exists.
    pub fn user_config(&self) -> Option<PathBuf> {
        if self.no_user_config {
            return None;
        }
        user_config_path()
    }
}

/// `~/.confwatch/config.yaml`
pub fn user_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".confwatch").join("config.yaml"))
}
