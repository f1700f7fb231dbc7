//! Feed-Harvester main entry point
//!
//! This is the command-line interface for the Feed-Harvester engagement crawler.

use anyhow::Context;
use clap::Parser;
use feed_harvester::config::{load_config_with_hash, validate, Config};
use feed_harvester::crawler::{Coordinator, EngagementExtractor, RunScheduler};
use feed_harvester::output::{load_statistics, print_records, print_statistics};
use feed_harvester::renderer::WebDriverFactory;
use feed_harvester::storage::{merge_into_path, ParquetStore};
use feed_harvester::HarvestError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Feed-Harvester: a paced infinite-scroll engagement crawler
///
/// Feed-Harvester scrolls a rendered feed through a WebDriver session,
/// extracts hashtags and like/comment/share counts from every new item, and
/// appends each run's harvest to a Parquet dataset. Runs repeat until
/// interrupted.
#[derive(Parser, Debug)]
#[command(name = "feed-harvester")]
#[command(version = "1.0.0")]
#[command(about = "A paced infinite-scroll engagement crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (built-in defaults when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Run a single crawl, print its records and merge them, then exit
    #[arg(long)]
    once: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["show", "once"])]
    dry_run: bool,

    /// Show statistics for the stored dataset and exit
    #[arg(long, conflicts_with_all = ["dry_run", "once"])]
    show: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            match load_config_with_hash(path) {
                Ok((cfg, hash)) => {
                    tracing::info!("Configuration loaded successfully (hash: {})", hash);
                    cfg
                }
                Err(e) => {
                    tracing::error!("Failed to load configuration: {}", e);
                    return Err(e.into());
                }
            }
        }
        None => {
            tracing::info!("No configuration file given, using built-in defaults");
            let cfg = Config::default();
            validate(&cfg)?;
            cfg
        }
    };

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.show {
        handle_show(&config)?;
    } else if cli.once {
        handle_once(&config, shutdown_token()).await?;
    } else {
        handle_harvest(&config, shutdown_token()).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("feed_harvester=info,warn"),
            1 => EnvFilter::new("feed_harvester=debug,info"),
            2 => EnvFilter::new("feed_harvester=trace,debug"),
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

/// Returns a token cancelled on Ctrl-C
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let on_signal = token.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupt received, finishing up");
                on_signal.cancel();
            }
            Err(e) => tracing::warn!("Unable to listen for Ctrl-C: {}", e),
        }
    });

    token
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Feed-Harvester Dry Run ===\n");

    println!("Feed:");
    println!("  URL: {}", config.feed.url);
    println!("  Fragment selector: {}", config.feed.fragment_selector);

    println!("\nCrawler:");
    match config.crawler.target() {
        Some(target) => println!("  Target per run: {} records", target),
        None => println!("  Target per run: until the feed is exhausted"),
    }
    println!(
        "  Presence timeout: {}s",
        config.crawler.presence_timeout_secs
    );
    println!("  Scroll increment: {}", config.crawler.scroll_increment);
    println!("  Stall threshold: {}", config.crawler.stall_threshold);
    println!("  Settle wait: {}ms", config.crawler.settle_wait_ms);
    println!(
        "  Pause between runs: {}s",
        config.crawler.inter_iteration_delay_secs
    );

    println!("\nRate Limit:");
    println!(
        "  Every {} requests: {:.1}-{:.1}s cooldown",
        config.rate_limit.request_threshold,
        config.rate_limit.long_delay.min,
        config.rate_limit.long_delay.max
    );
    println!(
        "  Otherwise: {:.1}-{:.1}s",
        config.rate_limit.short_delay.min, config.rate_limit.short_delay.max
    );

    println!("\nRenderer:");
    println!("  WebDriver: {}", config.renderer.webdriver_url);
    println!(
        "  Browser: {}{}",
        config.renderer.browser,
        if config.renderer.headless {
            " (headless)"
        } else {
            ""
        }
    );

    println!("\nOutput:");
    println!("  Dataset: {}", config.output.dataset_path);

    println!("\n✓ Configuration is valid");
}

/// Handles the --show mode: prints dataset statistics
fn handle_show(config: &Config) -> anyhow::Result<()> {
    println!("Dataset: {}\n", config.output.dataset_path);

    let store = ParquetStore::new(&config.output.dataset_path);
    let stats = load_statistics(&store)
        .with_context(|| format!("reading dataset {}", config.output.dataset_path))?;
    print_statistics(&stats);

    Ok(())
}

fn build_coordinator(config: &Config) -> Result<Coordinator, HarvestError> {
    let factory = WebDriverFactory::new(&config.renderer)?;
    let extractor = EngagementExtractor::new()?;
    let coordinator = Coordinator::new(config, Arc::new(factory), Box::new(extractor))?;
    Ok(coordinator)
}

/// Handles the --once mode: one run, printed and merged
async fn handle_once(config: &Config, shutdown: CancellationToken) -> anyhow::Result<()> {
    let mut coordinator = build_coordinator(config).context("building WebDriver client")?;
    let report = coordinator
        .run_once(config.crawler.target(), &shutdown)
        .await;

    print_records(&report.records);

    let summary = merge_into_path(&report.records, Path::new(&config.output.dataset_path))
        .with_context(|| format!("merging into {}", config.output.dataset_path))?;
    tracing::info!(
        "Run {}: dataset now has {} rows",
        report.end_reason(),
        summary.total_rows
    );

    if let Some(e) = report.outcome.into_error() {
        return Err(HarvestError::Crawl(e).into());
    }
    Ok(())
}

/// Handles the main harvest loop
async fn handle_harvest(config: &Config, shutdown: CancellationToken) -> anyhow::Result<()> {
    tracing::info!("Harvesting {}", config.feed.url);
    tracing::info!("Dataset: {}", config.output.dataset_path);

    let coordinator = build_coordinator(config).context("building WebDriver client")?;
    let store = ParquetStore::new(&config.output.dataset_path);
    let mut scheduler = RunScheduler::new(coordinator, store);

    match scheduler.run(&shutdown).await {
        Ok(summary) => {
            tracing::info!(
                "Stopped after {} iterations: {} records collected, {} failed runs",
                summary.iterations,
                summary.records_collected,
                summary.failed_runs
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest stopped with unsaved records: {}", e);
            Err(e.into())
        }
    }
}
