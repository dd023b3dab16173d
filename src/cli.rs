//! Command-line arguments.

use clap::Parser;
use std::path::PathBuf;

use crate::utils::config::ConfigLayer;
use crate::utils::logging::LogFormat;

/// Mirror files and folders to the first available backup destination with rsync.
#[derive(Parser, Debug)]
#[command(name = "backup-mirror", version, about, long_about = None)]
pub struct Cli {
    /// Source paths to back up (repeat or comma-separate)
    #[arg(short, long = "source", value_delimiter = ',', value_name = "PATH")]
    pub sources: Vec<String>,

    /// Destination candidates, first accessible wins (repeat or comma-separate)
    #[arg(short, long = "dest", value_delimiter = ',', value_name = "PATH")]
    pub destinations: Vec<String>,

    /// Extra exclude patterns on top of the built-in ones
    #[arg(short, long = "exclude", value_name = "PATTERN")]
    pub excludes: Vec<String>,

    /// Show rsync progress and stream its output
    #[arg(short, long)]
    pub verbose: bool,

    /// Do not ask for confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Print the resolved backup list before running
    #[arg(long)]
    pub show_list: bool,

    /// Do not print inaccessible sources
    #[arg(long)]
    pub hide_inaccessible: bool,

    /// rsync binary to prefer over the default location
    #[arg(long, value_name = "PATH")]
    pub rsync: Option<PathBuf>,

    /// How recent the probe copy must be, e.g. "3s"
    #[arg(long, value_name = "DURATION")]
    pub freshness: Option<String>,

    /// Give up on the transfer after this long, e.g. "4h"
    #[arg(long, value_name = "DURATION")]
    pub timeout: Option<String>,

    /// Run the transfer at low CPU priority (nice -n 19)
    #[arg(long)]
    pub nice: bool,

    /// Configuration file (default: ~/.config/backup-mirror/config.toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the run result as JSON when done
    #[arg(long)]
    pub json: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    /// Settings given on the command line; flags that were not passed stay unset.
    pub fn overrides(&self) -> ConfigLayer {
        fn non_empty(values: &[String]) -> Option<Vec<String>> {
            (!values.is_empty()).then(|| values.to_vec())
        }

        ConfigLayer {
            verbose: self.verbose.then_some(true),
            sources: non_empty(&self.sources),
            destinations: non_empty(&self.destinations),
            excludes: non_empty(&self.excludes),
            show_backup_list: self.show_list.then_some(true),
            show_inaccessible: self.hide_inaccessible.then_some(false),
            interactive: self.yes.then_some(false),
            rsync_path: self.rsync.clone(),
            freshness_tolerance: self.freshness.clone(),
            timeout: self.timeout.clone(),
            low_priority: self.nice.then_some(true),
        }
    }
}
