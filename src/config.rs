//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.funneltrack.toml` files.

use crate::cli::{Args, OutputFormat};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use funneltrack::models::{Metric, Platform, ValueBounds, Window};
use funneltrack::store::{Distribution, GeneratorSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".funneltrack.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Platforms, metrics and window.
    #[serde(default)]
    pub tracking: TrackingConfig,

    /// Demo data generator settings.
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Allowed cell values.
    #[serde(default)]
    pub bounds: ValueBounds,

    /// Export settings.
    #[serde(default)]
    pub export: ExportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Output format for views.
    #[serde(default)]
    pub format: OutputFormat,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// What is tracked and over which window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Named platform roster, in display order.
    #[serde(default = "default_platforms")]
    pub platforms: Vec<String>,

    /// Use "Platform 1".."Platform N" instead of the named roster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generic_platforms: Option<usize>,

    /// Tracked metric names; all metrics when empty.
    #[serde(default)]
    pub metrics: Vec<String>,

    /// Window length in days (31 or 90).
    #[serde(default = "default_window_days")]
    pub window_days: u32,

    /// First tracked day; today when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_date: Option<NaiveDate>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            platforms: default_platforms(),
            generic_platforms: None,
            metrics: Vec::new(),
            window_days: default_window_days(),
            anchor_date: None,
        }
    }
}

fn default_platforms() -> Vec<String> {
    vec![
        "Facebook",
        "Instagram (IG)",
        "Twitter",
        "Threads",
        "Pinterest",
        "TikTok",
        "YouTube",
        "LinkedIn",
        "Fanbase",
        "Facebook Group",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_window_days() -> u32 {
    90
}

/// Demo data generator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Fixed seed for reproducible demo data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    #[serde(default)]
    pub distribution: Distribution,

    #[serde(default = "default_baseline_min")]
    pub baseline_min: u32,

    #[serde(default = "default_baseline_max")]
    pub baseline_max: u32,

    #[serde(default = "default_std_dev")]
    pub std_dev: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: None,
            distribution: Distribution::default(),
            baseline_min: default_baseline_min(),
            baseline_max: default_baseline_max(),
            std_dev: default_std_dev(),
        }
    }
}

fn default_baseline_min() -> u32 {
    25
}

fn default_baseline_max() -> u32 {
    75
}

fn default_std_dev() -> f64 {
    12.0
}

impl From<&GeneratorConfig> for GeneratorSettings {
    fn from(config: &GeneratorConfig) -> Self {
        Self {
            seed: config.seed,
            distribution: config.distribution,
            baseline_min: config.baseline_min,
            baseline_max: config.baseline_max,
            std_dev: config.std_dev,
        }
    }
}

/// Export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Default CSV destination.
    #[serde(default = "default_export_path")]
    pub path: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            path: default_export_path(),
        }
    }
}

fn default_export_path() -> PathBuf {
    PathBuf::from("funnel_tracking_data.csv")
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, and only
    /// when given explicitly.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(format) = args.format {
            self.general.format = format;
        }
        if args.verbose {
            self.general.verbose = true;
        }
        if let Some(seed) = args.seed {
            self.generator.seed = Some(seed);
        }
        if let Some(window) = args.window {
            self.tracking.window_days = window;
        }
        if let Some(anchor) = args.anchor {
            self.tracking.anchor_date = Some(anchor);
        }
    }

    /// Platform roster in display order.
    pub fn roster(&self) -> Vec<Platform> {
        match self.tracking.generic_platforms {
            Some(count) => Platform::generic(count),
            None => self
                .tracking
                .platforms
                .iter()
                .map(|p| Platform::new(p.trim()))
                .collect(),
        }
    }

    /// Tracked metrics, in display order of the configured list.
    pub fn metrics(&self) -> Result<Vec<Metric>> {
        if self.tracking.metrics.is_empty() {
            return Ok(Metric::ALL.to_vec());
        }
        self.tracking
            .metrics
            .iter()
            .map(|name| name.parse::<Metric>().map_err(Into::into))
            .collect()
    }

    pub fn window(&self) -> Result<Window> {
        Ok(Window::try_from(self.tracking.window_days)?)
    }

    /// Configured anchor date, or today.
    pub fn anchor(&self) -> NaiveDate {
        self.tracking
            .anchor_date
            .unwrap_or_else(|| Local::now().date_naive())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
