//! Funneltrack - marketing funnel tracker
//!
//! A CLI that tracks daily funnel metrics per platform over a 31 or 90 day
//! window, renders views of the data, stages and commits cell edits, and
//! exchanges the store as CSV.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Invalid arguments or a failed operation

mod cli;
mod config;

use anyhow::{Context, Result};
use cli::{Args, Command, OutputFormat};
use config::{Config, CONFIG_FILE};
use funneltrack::analysis::{
    cross_platform_totals, pivot_heatmap, rank_platforms_by_metric, summary_over_range, to_table,
    top_days,
};
use funneltrack::editor::EditSession;
use funneltrack::models::Platform;
use funneltrack::report::{self, View};
use funneltrack::store::{GeneratorSettings, Store};
use funneltrack::transfer::{self, ConflictPolicy};
use std::path::Path;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration (general.verbose feeds the log level)
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(args.log_level(config.general.verbose));

    info!("Funneltrack v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    match args.config {
        Some(ref path) => debug!("Loaded config from {}", path.display()),
        None if Path::new(CONFIG_FILE).exists() => debug!("Loaded config from {}", CONFIG_FILE),
        None => debug!("No config file found, using defaults"),
    }

    if let Err(e) = run(args, config) {
        error!("Command failed: {}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

/// Handle --init-config: generate a default .funneltrack.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize platforms, metrics, window, and bounds.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("⚠️  A tracing subscriber was already installed");
    }
}

/// Build the store and run one command against it.
fn run(args: Args, config: Config) -> Result<()> {
    let mut store = build_store(&config, &args)?;
    let format = config.general.format;

    let Some(command) = args.command else {
        return Ok(());
    };

    let view = match command {
        Command::Overview => View::Overview {
            totals: cross_platform_totals(&store),
        },

        Command::Show { platform, metrics } => {
            let platform = Platform::new(platform);
            let table = to_table(store.get(&platform)?);
            match metrics {
                Some(metrics) => View::Trend {
                    trend: table.trend(&metrics)?,
                    platform,
                },
                None => View::Table { platform, table },
            }
        }

        Command::Summary { from, to, metrics } => {
            let metrics = metrics.unwrap_or_else(|| store.metrics().to_vec());
            View::Summary {
                summary: summary_over_range(&store, from, to, &metrics)?,
            }
        }

        Command::Rank { metric } => View::Ranking {
            metric,
            ranking: rank_platforms_by_metric(&store, metric)?,
        },

        Command::TopDays {
            platform,
            metric,
            count,
        } => {
            let platform = Platform::new(platform);
            let table = to_table(store.get(&platform)?);
            View::TopDays {
                days: top_days(&table, metric, count)?,
                platform,
                metric,
            }
        }

        Command::Heatmap { platform, metric } => {
            let platform = Platform::new(platform);
            let table = to_table(store.get(&platform)?);
            View::Heatmap {
                heatmap: pivot_heatmap(&table, metric)?,
                platform,
            }
        }

        Command::Edit {
            platform,
            day,
            assignments,
            save,
            output,
        } => {
            let platform = Platform::new(platform);
            let mut session = EditSession::new();
            for (metric, value) in assignments {
                session.update_cell(&store, &platform, metric, day, value)?;
            }

            let before = to_table(store.get(&platform)?).rows[day - 1].clone();
            let after = session.preview(&store, &platform)?.rows[day - 1].clone();

            let (committed, saved_to) = if save {
                let summary = session.commit(&mut store)?;
                let path = output.unwrap_or_else(|| config.export.path.clone());
                transfer::write_csv(&store, &path)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!("Saved store to {}", path.display());
                (Some(summary), Some(path))
            } else {
                session.discard();
                (None, None)
            };

            View::Edit {
                platform,
                day,
                metrics: store.metrics().to_vec(),
                before,
                after,
                committed,
                saved_to,
            }
        }

        Command::Export { output } => {
            let path = output.unwrap_or_else(|| config.export.path.clone());
            transfer::write_csv(&store, &path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            let rows = store.platforms_with_data().count() * store.window().days();
            View::Export { path, rows }
        }

        Command::Import {
            input,
            policy,
            output,
        } => {
            let staged = transfer::read_csv(&input)
                .with_context(|| format!("Failed to import {}", input.display()))?;
            let report = staged.merge_into(&mut store, ConflictPolicy::from(policy))?;

            let saved_to = match output {
                Some(path) => {
                    transfer::write_csv(&store, &path)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    Some(path)
                }
                None => None,
            };

            View::Import {
                source: input,
                rows: staged.row_count(),
                report,
                saved_to,
            }
        }
    };

    let rendered = match format {
        OutputFormat::Json => report::generate_json(&view)?,
        OutputFormat::Markdown => report::generate_markdown(&view),
    };
    println!("{}", rendered);

    Ok(())
}

/// Demo data, or the contents of `--data` merged into an empty store.
fn build_store(config: &Config, args: &Args) -> Result<Store> {
    let mut roster = config.roster();
    let bounds = config.bounds;

    if let Some(ref path) = args.data {
        info!("Loading store from: {}", path.display());
        let staged = transfer::read_csv(path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        let (anchor, window) = staged.span()?;

        for platform in staged.platforms() {
            if !roster.contains(platform) {
                debug!("Adding {} from data file to roster", platform);
                roster.push(platform.clone());
            }
        }

        let mut store = Store::empty(roster, staged.metrics().to_vec(), window, anchor, bounds)?;
        staged.merge_into(&mut store, ConflictPolicy::Overwrite)?;
        return Ok(store);
    }

    let settings = GeneratorSettings::from(&config.generator);
    let store = Store::initialize(
        roster,
        config.metrics()?,
        config.window()?,
        config.anchor(),
        bounds,
        &settings,
    )?;
    info!(
        "Generated demo data for {} platforms over {}",
        store.roster().len(),
        store.window()
    );
    Ok(store)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            // Logging is not initialized yet
            eprintln!("⚠️  Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
