//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use funneltrack::models::Metric;
use funneltrack::transfer::ConflictPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Funneltrack - marketing funnel tracker
///
/// Track posts, engagement, clicks and the rest of the funnel per platform
/// over a 31 or 90 day window. View, edit, summarize, export and re-import.
///
/// Examples:
///   funneltrack overview --seed 7
///   funneltrack show --platform TikTok --metrics Posts,Clicks
///   funneltrack summary --from 2024-01-01 --to 2024-01-07
///   funneltrack edit --platform Twitter --day 3 --set Clicks=40 --save
///   funneltrack import --input data.csv --policy reject
///   funneltrack --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .funneltrack.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Load the store from a CSV export instead of generating demo data
    #[arg(long, value_name = "FILE", global = true)]
    pub data: Option<PathBuf>,

    /// Seed for reproducible demo data
    #[arg(long, value_name = "SEED", env = "FUNNELTRACK_SEED", global = true)]
    pub seed: Option<u64>,

    /// Window length in days (31 or 90)
    #[arg(long, value_name = "DAYS", global = true)]
    pub window: Option<u32>,

    /// First tracked day (YYYY-MM-DD); defaults to today
    #[arg(long, value_name = "DATE", global = true)]
    pub anchor: Option<NaiveDate>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT", global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Generate a default .funneltrack.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Whole-window totals of every metric for every platform
    Overview,

    /// Daily table of one platform with Total and Average columns
    Show {
        #[arg(short, long)]
        platform: String,

        /// Only show these metrics as a trend (comma-separated)
        #[arg(long, value_delimiter = ',', value_parser = parse_metric)]
        metrics: Option<Vec<Metric>>,
    },

    /// Per-platform metric sums over a date range
    Summary {
        /// First day of the range (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        from: NaiveDate,

        /// Last day of the range, inclusive (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        to: NaiveDate,

        /// Metrics to sum (comma-separated); all tracked metrics by default
        #[arg(long, value_delimiter = ',', value_parser = parse_metric)]
        metrics: Option<Vec<Metric>>,
    },

    /// Platforms ranked by mean daily value of a metric
    Rank {
        #[arg(long, default_value = "Engagement", value_parser = parse_metric)]
        metric: Metric,
    },

    /// Days with the highest value of a metric for one platform
    TopDays {
        #[arg(short, long)]
        platform: String,

        #[arg(long, default_value = "Engagement", value_parser = parse_metric)]
        metric: Metric,

        #[arg(long, default_value = "5", value_name = "N")]
        count: usize,
    },

    /// Week-by-weekday grid of one metric for one platform
    Heatmap {
        #[arg(short, long)]
        platform: String,

        #[arg(long, value_parser = parse_metric)]
        metric: Metric,
    },

    /// Stage cell edits for one day, optionally saving them
    Edit {
        #[arg(short, long)]
        platform: String,

        /// Day of the window (1-based)
        #[arg(long)]
        day: usize,

        /// Cell assignment, repeatable (e.g. --set Clicks=40)
        #[arg(
            long = "set",
            value_name = "METRIC=VALUE",
            required = true,
            value_parser = parse_assignment
        )]
        assignments: Vec<(Metric, u32)>,

        /// Commit the edits; without this they are discarded
        #[arg(long)]
        save: bool,

        /// Where to write the saved store (defaults to the export path)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Write the store as CSV
    Export {
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Stage a CSV file and merge it into the store
    Import {
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// How to treat cells that differ from existing values
        #[arg(long, value_name = "POLICY")]
        policy: MergePolicy,

        /// Write the merged store as CSV
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

/// Output format for views.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown tables (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Conflict policy for --policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MergePolicy {
    Overwrite,
    SkipExisting,
    #[value(alias = "reject-if-any-conflict")]
    Reject,
}

impl From<MergePolicy> for ConflictPolicy {
    fn from(policy: MergePolicy) -> Self {
        match policy {
            MergePolicy::Overwrite => ConflictPolicy::Overwrite,
            MergePolicy::SkipExisting => ConflictPolicy::SkipExisting,
            MergePolicy::Reject => ConflictPolicy::RejectIfAnyConflict,
        }
    }
}

fn parse_metric(s: &str) -> Result<Metric, String> {
    s.parse::<Metric>().map_err(|e| e.to_string())
}

/// Parses `METRIC=VALUE`.
fn parse_assignment(s: &str) -> Result<(Metric, u32), String> {
    let (metric, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected METRIC=VALUE, got '{}'", s))?;
    let metric = parse_metric(metric)?;
    let value = value
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("value for {} must be a non-negative integer", metric))?;
    Ok((metric, value))
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.command.is_none() {
            return Err("A command is required (see --help)".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(window) = self.window {
            if window != 31 && window != 90 {
                return Err("Window must be 31 or 90 days".to_string());
            }
        }

        if self.data.is_some() && (self.window.is_some() || self.anchor.is_some()) {
            return Err(
                "--window and --anchor are taken from the file when using --data".to_string(),
            );
        }

        if let Some(ref data) = self.data {
            if !data.is_file() {
                return Err(format!("Data file does not exist: {}", data.display()));
            }
        }

        if let Some(Command::Import { ref input, .. }) = self.command {
            if !input.is_file() {
                return Err(format!("Import file does not exist: {}", input.display()));
            }
        }

        if let Some(Command::TopDays { count: 0, .. }) = self.command {
            return Err("Count must be at least 1".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is the config file's `general.verbose`; `--quiet`
    /// overrides it.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
