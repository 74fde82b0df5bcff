//! Run coordinator - wires the crawl together and drives it to the end
//!
//! This module handles:
//! - Restoring (or discarding) the checkpoint and turning input rows into seeds
//! - Starting the session pool, politeness controller and report writer
//! - Watching for interrupts and browser disconnects while tasks run
//! - Periodic checkpoints and progress lines
//! - Graceful shutdown with a bounded grace period

use crate::browser::BrowserDriver;
use crate::config::Config;
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::mx::{DnsMxResolver, MxValidator};
use crate::crawler::politeness::PolitenessController;
use crate::crawler::scheduler::Scheduler;
use crate::crawler::sessions::SessionPool;
use crate::crawler::task::Task;
use crate::output::{ReportSink, ReportWriter, RunStats, StatsSnapshot};
use crate::state::{EmailRegistry, Frontier};
use crate::storage::{read_input, Checkpoint, InputRow};
use crate::url::{canonicalize, CanonicalizeOptions};
use crate::{ConfigError, HarvestError};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Interval between progress lines
const PROGRESS_INTERVAL: Duration = Duration::from_secs(30);

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// Every task finished
    Completed,
    /// The shutdown signal fired
    Interrupted,
    /// The browser went away; fatal for the run
    BrowserDisconnected,
}

/// Final state of a run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub end: RunEnd,
    pub stats: StatsSnapshot,
    pub unique_emails: usize,
    pub report_path: PathBuf,

    /// Size of the visited-URL set at the end
    pub visited: usize,

    pub session_restarts: usize,
    pub blocked_domains: usize,
}

/// Seed tasks read from the input file
pub struct Seeds {
    pub tasks: Vec<Task>,

    /// Input headers, in file order
    pub columns: Vec<String>,
}

/// Reads the input file and canonicalizes every website cell
///
/// Rows whose website cannot be canonicalized are logged and dropped.
///
/// # Arguments
///
/// * `config` - Run configuration; `input.file` must be set
///
/// # Returns
///
/// * `Ok(Seeds)` - Depth-0 tasks in input order
/// * `Err(HarvestError)` - The input is missing, unreadable or lacks the website column
pub fn load_seeds(config: &Config) -> Result<Seeds, HarvestError> {
    let path = input_path(config)?;
    let rows = read_input(path, &config.input.website_column)?;
    let options = CanonicalizeOptions {
        strip_www: config.crawler.strip_www,
        strip_query: config.crawler.strip_query,
    };

    let columns = rows
        .first()
        .map(|row| row.record.iter().map(|(name, _)| name.to_string()).collect())
        .unwrap_or_default();

    let tasks = rows
        .into_iter()
        .filter_map(|InputRow { record, website }| match canonicalize(&website, &options) {
            Ok(url) => Some(Task::seed(record, website, url)),
            Err(e) => {
                tracing::warn!("Skipping invalid website '{}': {}", website, e);
                None
            }
        })
        .collect();

    Ok(Seeds { tasks, columns })
}

fn input_path(config: &Config) -> Result<&Path, ConfigError> {
    config.input.file.as_deref().ok_or_else(|| {
        ConfigError::Validation("no input file given (use --input or [input] file)".to_string())
    })
}

/// Main run structure
pub struct Coordinator {
    config: Arc<Config>,
    browser: Arc<dyn BrowserDriver>,
    frontier: Arc<Frontier>,
    registry: Arc<EmailRegistry>,
    stats: Arc<RunStats>,
    checkpoint: Checkpoint,
    report: Arc<ReportWriter>,
    pool: Arc<SessionPool>,
    politeness: Arc<PolitenessController>,
    fetcher: PageFetcher,
    seeds: Vec<Task>,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Prepares a run
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `browser` - Engine that provides the worker sessions
    /// * `fresh` - Discard the checkpoint instead of resuming from it
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(HarvestError)` - Input, report or sessions could not be set up
    pub async fn new(
        config: Arc<Config>,
        browser: Arc<dyn BrowserDriver>,
        fresh: bool,
    ) -> Result<Self, HarvestError> {
        let frontier = Arc::new(Frontier::new());
        let checkpoint = Checkpoint::new(&config.output.state_file);
        if fresh {
            tracing::info!("Fresh run, discarding {}", checkpoint.path().display());
            checkpoint.remove()?;
        } else {
            checkpoint.restore_into(&frontier);
        }

        let seeds = load_seeds(&config)?;
        tracing::info!("Loaded {} seed URL(s)", seeds.tasks.len());

        let report_path = config.output.report_path_for(input_path(&config)?);
        let report = Arc::new(ReportWriter::create(&report_path, &config.output, &seeds.columns)?);

        let politeness = Arc::new(PolitenessController::new(
            &config.politeness,
            config.crawler.concurrency,
        )?);

        let mx = config.extraction.validate_domain_mx.then(|| {
            tracing::info!("MX validation enabled");
            MxValidator::new(Arc::new(DnsMxResolver::new()))
        });

        let pool = Arc::new(
            SessionPool::start(
                Arc::clone(&browser),
                &config.session,
                config.crawler.concurrency as usize,
            )
            .await?,
        );

        let fetcher = PageFetcher::new(
            Arc::clone(&config),
            Arc::clone(&frontier),
            Arc::clone(&politeness),
            mx,
        );

        Ok(Self {
            stats: Arc::new(RunStats::new(config.output.recent_errors)),
            registry: Arc::new(EmailRegistry::new()),
            cancel: CancellationToken::new(),
            seeds: seeds.tasks,
            config,
            browser,
            frontier,
            checkpoint,
            report,
            pool,
            politeness,
            fetcher,
        })
    }

    /// Token that stops the run when cancelled, as an interrupt would
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs until every task finished or Ctrl-C is pressed
    pub async fn run(self) -> Result<RunReport, HarvestError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Runs until every task finished or `shutdown` resolves
    ///
    /// # Arguments
    ///
    /// * `shutdown` - Resolves when the run should stop taking new tasks
    ///
    /// # Returns
    ///
    /// * `Ok(RunReport)` - How the run ended and its counters
    /// * `Err(HarvestError)` - Reserved for failures outside any task
    pub async fn run_until<F>(self, shutdown: F) -> Result<RunReport, HarvestError>
    where
        F: Future<Output = ()>,
    {
        let config = Arc::clone(&self.config);
        let output = &config.output;
        tracing::info!(
            "Starting run: {} seed(s), {} worker(s), max depth {}",
            self.seeds.len(),
            self.pool.live_workers(),
            self.config.crawler.max_depth
        );

        let report: Arc<dyn ReportSink> = self.report.clone();
        let scheduler = Scheduler::new(
            self.fetcher,
            Arc::clone(&self.pool),
            report,
            Arc::clone(&self.stats),
            Arc::clone(&self.registry),
            self.pool.live_workers(),
            self.cancel.clone(),
        );

        for task in self.seeds.iter().cloned() {
            scheduler.submit(task);
        }

        let mut disconnected = self.browser.disconnected();
        let mut watching_browser = true;

        let checkpoint_every = Duration::from_secs(output.checkpoint_interval_secs);
        let checkpointing = !checkpoint_every.is_zero();
        let checkpoint_period = if checkpointing { checkpoint_every } else { PROGRESS_INTERVAL };
        let mut checkpoint_tick = interval_at(Instant::now() + checkpoint_period, checkpoint_period);
        checkpoint_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut progress_tick = interval_at(Instant::now() + PROGRESS_INTERVAL, PROGRESS_INTERVAL);
        progress_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let completion = scheduler.wait();
        tokio::pin!(completion);
        tokio::pin!(shutdown);

        let end = loop {
            tokio::select! {
                _ = &mut completion => break RunEnd::Completed,
                _ = &mut shutdown => {
                    tracing::warn!("Interrupt received, stopping new tasks");
                    break RunEnd::Interrupted;
                }
                _ = self.cancel.cancelled() => {
                    tracing::warn!("Run cancelled, stopping new tasks");
                    break RunEnd::Interrupted;
                }
                changed = disconnected.changed(), if watching_browser => {
                    match changed {
                        Ok(()) if *disconnected.borrow() => {
                            tracing::error!("Browser disconnected, shutting down");
                            break RunEnd::BrowserDisconnected;
                        }
                        Ok(()) => {}
                        Err(_) => watching_browser = false,
                    }
                }
                _ = checkpoint_tick.tick(), if checkpointing => {
                    self.checkpoint.save_if_dirty(&self.frontier);
                }
                _ = progress_tick.tick() => {
                    log_progress(&self.stats, &self.frontier, scheduler.active(), scheduler.pending());
                }
            }
        };

        if end != RunEnd::Completed {
            self.cancel.cancel();
            self.checkpoint.save_if_dirty(&self.frontier);

            let grace = Duration::from_secs(output.shutdown_grace_secs);
            if tokio::time::timeout(grace, &mut completion).await.is_err() {
                tracing::warn!(
                    "{} task(s) still running after {}s grace period, giving up on them",
                    scheduler.active(),
                    grace.as_secs()
                );
            }
        }

        self.checkpoint.save_if_dirty(&self.frontier);
        self.pool.close_all().await;
        self.browser.close().await;

        let stats = self.stats.snapshot();
        tracing::info!(
            "Run finished ({:?}): {} processed, {} success, {} failed, {} skipped, {} abandoned",
            end,
            stats.processed,
            stats.success,
            stats.failed,
            stats.skipped,
            stats.abandoned
        );

        Ok(RunReport {
            end,
            stats,
            unique_emails: self.registry.len(),
            report_path: self.report.path().to_path_buf(),
            visited: self.frontier.len(),
            session_restarts: self.pool.restarts(),
            blocked_domains: self.politeness.blocked_count(),
        })
    }

}

fn log_progress(stats: &RunStats, frontier: &Frontier, active: usize, pending: usize) {
    let stats = stats.snapshot();
    tracing::info!(
        "Progress: {} processed ({} success, {} failed, {} skipped), {} active, {} queued, {} visited URLs",
        stats.processed,
        stats.success,
        stats.failed,
        stats.skipped,
        active,
        pending.saturating_sub(active),
        frontier.len()
    );
}
