//! Quaero main entry point
//!
//! This is the command-line interface for the Quaero link-graph crawler.

use anyhow::{bail, Context};
use clap::Parser;
use quaero::config::{load_config_with_hash, Config};
use quaero::output::{load_statistics, print_report, print_statistics};
use quaero::storage::open_repository;
use quaero::Crawler;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Quaero: a polite link-graph crawler
///
/// Quaero crawls outward from a seed URL while respecting robots.txt,
/// records every site, page and link it sees, and extracts page content
/// into a SQLite database.
#[derive(Parser, Debug)]
#[command(name = "quaero")]
#[command(version)]
#[command(about = "A polite link-graph crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// URL to start crawling from
    #[arg(value_name = "SEED", required_unless_present = "stats")]
    seed: Option<String>,

    /// Depth budget; overrides the configured max-depth
    #[arg(short, long, value_name = "N")]
    depth: Option<u32>,

    /// Follow links to other hosts
    #[arg(long)]
    external: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["depth", "external"])]
    stats: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.stats {
        return handle_stats(&config);
    }

    let Some(seed) = cli.seed.as_deref() else {
        bail!("a seed URL is required unless --stats is given");
    };
    let depth = cli.depth.unwrap_or(config.crawler.max_depth);
    let include_external = cli.external || config.crawler.include_external;

    handle_crawl(&config, seed, depth, include_external).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("quaero=info,warn"),
            1 => EnvFilter::new("quaero=debug,info"),
            2 => EnvFilter::new("quaero=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let repo = open_repository(Path::new(&config.output.database_path))
        .context("failed to open the database")?;
    let stats = load_statistics(&repo)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: &Config,
    seed: &str,
    depth: u32,
    include_external: bool,
) -> anyhow::Result<()> {
    let repo = open_repository(Path::new(&config.output.database_path))
        .context("failed to open the database")?;
    let crawler = Crawler::new(config, Arc::new(repo))?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight pages");
            on_signal.cancel();
        }
    });

    let report = crawler
        .crawl(seed, depth, include_external, cancel)
        .await
        .with_context(|| format!("crawl of {} failed", seed))?;

    print_report(&report);
    Ok(())
}
