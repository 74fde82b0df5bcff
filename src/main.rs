//! Contact Harvester main entry point
//!
//! This is the command-line interface for the contact harvester.

use anyhow::Context;
use clap::Parser;
use contact_harvester::browser::HttpBrowser;
use contact_harvester::config::{build_config, Config, ConfigOverrides};
use contact_harvester::crawler::{load_seeds, Coordinator, RunEnd, RunReport};
use contact_harvester::output::print_summary;
use contact_harvester::HarvestError;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Exit code for an invalid configuration
const EXIT_CONFIG: u8 = 2;

/// Exit code for a user interrupt
const EXIT_INTERRUPTED: u8 = 130;

/// Contact Harvester: a polite email crawler
///
/// Visits every website listed in the input CSV, optionally follows links a
/// few hops deep, and writes one report row per visited page with the email
/// addresses found there.
#[derive(Parser, Debug)]
#[command(name = "contact-harvester")]
#[command(version)]
#[command(about = "A polite concurrent email crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Input CSV file, overriding [input] file
    #[arg(long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Number of workers, overriding [crawler] concurrency
    #[arg(long, value_name = "N")]
    concurrency: Option<u32>,

    /// Link hops to follow from each seed, overriding [crawler] max-depth
    #[arg(long, value_name = "N")]
    max_depth: Option<u32>,

    /// Start fresh, discarding the checkpoint of a previous run
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let overrides = ConfigOverrides {
        input: cli.input.clone(),
        concurrency: cli.concurrency,
        max_depth: cli.max_depth,
    };
    let (config, config_hash) = match build_config(cli.config.as_deref(), &overrides) {
        Ok(built) => built,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    if let Err(e) = setup_logging(cli.verbose, cli.quiet, &config.output.error_log) {
        eprintln!("{:#}", e);
        return ExitCode::FAILURE;
    }

    match (&cli.config, config_hash) {
        (Some(path), Some(hash)) => {
            tracing::info!("Configuration loaded from {} (hash: {})", path.display(), hash)
        }
        _ => tracing::info!("No configuration file given, using defaults"),
    }

    let result = if cli.dry_run {
        handle_dry_run(&config).map(|()| ExitCode::SUCCESS)
    } else {
        handle_run(config, cli.fresh).await.map(|report| exit_code_for(report.end))
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            if matches!(e.downcast_ref::<HarvestError>(), Some(HarvestError::Config(_))) {
                ExitCode::from(EXIT_CONFIG)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

/// Sets up console logging plus the warnings-and-errors log file
///
/// # Arguments
///
/// * `verbose` - Number of `-v` flags
/// * `quiet` - Only errors reach the console
/// * `error_log` - File receiving every warning and error, appended to
fn setup_logging(verbose: u8, quiet: bool, error_log: &Path) -> anyhow::Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("contact_harvester=info,warn"),
            1 => EnvFilter::new("contact_harvester=debug,info"),
            2 => EnvFilter::new("contact_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(error_log)
        .with_context(|| format!("Failed to open error log {}", error_log.display()))?;

    let console = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_filter(filter);

    let errors = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .with_filter(LevelFilter::WARN);

    tracing_subscriber::registry().with(console).with(errors).init();
    Ok(())
}

/// Handles the --dry-run mode: shows the effective configuration and seed count
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let seeds = load_seeds(config).context("Failed to read seeds")?;

    println!("=== Contact Harvester Dry Run ===\n");

    println!("Input:");
    if let Some(file) = &config.input.file {
        println!("  File: {}", file.display());
        println!("  Report: {}", config.output.report_path_for(file).display());
    }
    println!("  Website column: {}", config.input.website_column);

    println!("\nCrawler:");
    println!("  Concurrency: {}", config.crawler.concurrency);
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Page load timeout: {}ms", config.crawler.page_load_timeout_ms);
    println!("  Navigation retries: {}", config.crawler.navigation_retries);

    println!("\nSessions:");
    println!(
        "  Recycle after: {} tasks / {} minutes",
        config.session.context_max_tasks, config.session.context_max_time_minutes
    );
    if config.session.use_user_agents {
        println!("  User agents: {}", config.session.user_agents.len());
    }
    if config.session.use_proxies {
        println!("  Proxies: {}", config.session.proxies.len());
    }

    println!("\nPoliteness:");
    println!("  Respect robots.txt: {}", config.politeness.respect_robots_txt);
    println!("  Min delay per domain: {}ms", config.politeness.min_delay_per_domain_ms);
    println!("  Global rate limit: {}", config.politeness.use_rate_limiting);
    println!("  Block detection: {}", config.politeness.detect_blocks);
    println!("  Excluded domains: {}", config.politeness.excluded_domains.len());

    println!("\nExtraction:");
    println!("  Method: {:?}", config.extraction.method);
    println!("  Email filters: {}", config.extraction.email_filter.len());
    println!("  MX validation: {}", config.extraction.validate_domain_mx);

    println!("\nOutput:");
    println!("  Checkpoint: {}", config.output.state_file.display());
    println!("  Error log: {}", config.output.error_log.display());

    println!("\nConfiguration is valid");
    println!("Would start with {} seed URL(s)", seeds.tasks.len());

    Ok(())
}

/// Handles the main run
async fn handle_run(config: Config, fresh: bool) -> anyhow::Result<RunReport> {
    if fresh {
        tracing::info!("Starting fresh run (ignoring previous checkpoint)");
    } else {
        tracing::info!("Starting run (resuming from checkpoint if present)");
    }

    let config = Arc::new(config);
    let browser = Arc::new(HttpBrowser::new());
    let coordinator = Coordinator::new(Arc::clone(&config), browser, fresh)
        .await
        .context("Failed to start run")?;

    let report = coordinator.run().await.context("Run failed")?;

    println!();
    print_summary(
        &report.stats,
        report.unique_emails,
        &report.report_path,
        &config.output.error_log,
    );

    match report.end {
        RunEnd::Completed => tracing::info!("Run completed"),
        RunEnd::Interrupted => tracing::warn!("Run interrupted; progress saved, rerun to resume"),
        RunEnd::BrowserDisconnected => tracing::error!("Run ended: browser disconnected"),
    }

    Ok(report)
}

fn exit_code_for(end: RunEnd) -> ExitCode {
    match end {
        RunEnd::Completed => ExitCode::SUCCESS,
        RunEnd::Interrupted => ExitCode::from(EXIT_INTERRUPTED),
        RunEnd::BrowserDisconnected => ExitCode::FAILURE,
    }
}
