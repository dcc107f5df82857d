//! Washi-Press main entry point
//!
//! This is the command-line interface for the Washi-Press article archiver.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use washi_press::config::{load_config, Config, RunOptions};
use washi_press::events::{CrawlEvent, CrawlObserver};
use washi_press::{Coordinator, CrawlOutcome};

/// Washi-Press: a resumable article archiver
///
/// Washi-Press walks a paginated article listing page by page, exports
/// every article it has not exported before, and records its progress in
/// a ledger so an interrupted run picks up where it left off.
#[derive(Parser, Debug)]
#[command(name = "washi-press")]
#[command(version = "1.0.0")]
#[command(about = "A resumable article archiver", long_about = None)]
struct Cli {
    /// Directory for exported articles and the progress ledger
    #[arg(value_name = "OUTPUT_DIR")]
    output_dir: PathBuf,

    /// Path to a TOML listing profile (defaults to the built-in profile)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Stop after this listing page (0 or omitted walks to the end)
    #[arg(long, value_name = "N")]
    max_pages: Option<u32>,

    /// Number of concurrent article downloads
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Settle delay in seconds after an article's content appears
    #[arg(long, default_value_t = 1.0, value_name = "SECONDS")]
    delay: f64,

    /// Ignore the progress ledger and start from the first page
    #[arg(long)]
    no_resume: bool,

    /// Ask the render engine for a visible window
    #[arg(long)]
    headed: bool,

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

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate the listing profile
    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading listing profile from: {}", path.display());
            load_config(path)?
        }
        None => Config::default(),
    };

    let options = build_options(&cli)?;
    let quiet = cli.quiet;

    handle_crawl(config, options, quiet).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr; stdout carries only the status lines.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("washi_press=info,warn"),
            1 => EnvFilter::new("washi_press=debug,info"),
            2 => EnvFilter::new("washi_press=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Translates CLI flags into run options
fn build_options(cli: &Cli) -> anyhow::Result<RunOptions> {
    let delay = Duration::try_from_secs_f64(cli.delay)
        .map_err(|_| anyhow::anyhow!("--delay must be a non-negative number of seconds"))?;

    let mut options = RunOptions::new(&cli.output_dir);
    // A ceiling of 0 means unlimited, same as leaving the flag off.
    options.max_pages = cli.max_pages.filter(|&pages| pages > 0);
    options.concurrency = cli.concurrency;
    options.request_delay = delay;
    options.resume = !cli.no_resume;
    options.headless = !cli.headed;
    Ok(options)
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, options: RunOptions, quiet: bool) -> anyhow::Result<()> {
    if options.resume {
        tracing::info!("Starting crawl (resuming from the ledger if one exists)");
    } else {
        tracing::info!("Starting crawl from the first page (ignoring the ledger)");
    }

    let observer: Arc<dyn CrawlObserver> = if quiet {
        Arc::new(washi_press::events::NullObserver)
    } else {
        Arc::new(|event: CrawlEvent| println!("{}", event.status_text()))
    };

    let coordinator = Coordinator::new(config, options)?.with_observer(observer);
    let handle = coordinator.stop_handle();

    // First Ctrl-C asks for a clean stop, a second one exits outright.
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.stop();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });

    let summary = coordinator.run().await?;

    tracing::info!(
        "Exported {} articles across {} pages",
        summary.articles_exported,
        summary.pages_completed
    );

    if summary.outcome == CrawlOutcome::HaltedOnFailures {
        // The failing page stays uncommitted, so a rerun retries it.
        std::process::exit(1);
    }

    Ok(())
}
