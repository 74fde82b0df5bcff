//! Task scheduler
//!
//! This module handles:
//! - Bounding active tasks with a semaphore sized to the worker pool
//! - Running each task to exactly one report row
//! - Spawning child tasks for discovered links
//! - Containing task panics so one page can never take down the run
//! - Abandoning queued tasks once the run is cancelled

use crate::crawler::fetcher::PageFetcher;
use crate::crawler::sessions::{SessionPool, Worker};
use crate::crawler::task::Task;
use crate::output::{ReportRow, ReportSink, RunStats};
use crate::state::{EmailRegistry, ScrapeOutcome, TaskError};
use crate::url::CanonicalUrl;
use futures::future::{BoxFuture, FutureExt};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Everything a running task needs
struct Shared {
    fetcher: PageFetcher,
    pool: Arc<SessionPool>,
    report: Arc<dyn ReportSink>,
    stats: Arc<RunStats>,
    registry: Arc<EmailRegistry>,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    cancel: CancellationToken,
    active: AtomicUsize,
}

/// Spawns and tracks every task of a run
///
/// At most `permits` tasks hold a permit at a time; a task keeps its permit
/// from admission until its worker is checked back in.
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    /// Creates a scheduler
    ///
    /// # Arguments
    ///
    /// * `fetcher` - The per-task pipeline
    /// * `pool` - Worker sessions; its size should match `permits`
    /// * `report` - Where each task's row goes
    /// * `stats` - Run counters
    /// * `registry` - Unique emails of the run
    /// * `permits` - Bound on concurrently active tasks
    /// * `cancel` - Fires on interrupt or browser disconnect
    pub fn new(
        fetcher: PageFetcher,
        pool: Arc<SessionPool>,
        report: Arc<dyn ReportSink>,
        stats: Arc<RunStats>,
        registry: Arc<EmailRegistry>,
        permits: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                fetcher,
                pool,
                report,
                stats,
                registry,
                permits: Arc::new(Semaphore::new(permits)),
                tracker: TaskTracker::new(),
                cancel,
                active: AtomicUsize::new(0),
            }),
        }
    }

    /// Queues a task; it waits for a permit in submission order
    pub fn submit(&self, task: Task) {
        spawn_task(&self.shared, task);
    }

    /// Waits until every submitted task and its descendants have finished
    ///
    /// No tasks should be submitted from outside after this is called.
    pub async fn wait(&self) {
        self.shared.tracker.close();
        self.shared.tracker.wait().await;
    }

    /// Tasks spawned but not yet finished, queued ones included
    pub fn pending(&self) -> usize {
        self.shared.tracker.len()
    }

    /// Tasks currently holding a permit
    pub fn active(&self) -> usize {
        self.shared.active.load(Ordering::Acquire)
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.shared.cancel
    }
}

fn spawn_task(shared: &Arc<Shared>, task: Task) {
    let future = run_task(Arc::clone(shared), task);
    shared.tracker.spawn(future);
}

fn run_task(shared: Arc<Shared>, task: Task) -> BoxFuture<'static, ()> {
    async move {
        let acquired = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => None,
            permit = Arc::clone(&shared.permits).acquire_owned() => permit.ok(),
        };
        let Some(permit) = acquired else {
            tracing::debug!(url = %task.url, "Task abandoned before start");
            shared.stats.record_abandoned();
            return;
        };

        shared.active.fetch_add(1, Ordering::AcqRel);

        if let Some(reason) = shared.fetcher.admit(&task).await {
            shared.finish(&task, ScrapeOutcome::Skipped(reason), None);
            shared.active.fetch_sub(1, Ordering::AcqRel);
            return;
        }

        let Some(worker) = shared.pool.checkout().await else {
            let error = TaskError::internal("No browser sessions available");
            shared.finish(&task, ScrapeOutcome::Failed(error), None);
            shared.active.fetch_sub(1, Ordering::AcqRel);
            return;
        };

        let outcome = match AssertUnwindSafe(shared.fetcher.fetch(&task, &worker))
            .catch_unwind()
            .await
        {
            Ok(Ok(harvest)) => ScrapeOutcome::Success(harvest),
            Ok(Err(e)) => ScrapeOutcome::Failed(e),
            Err(panic) => ScrapeOutcome::Failed(TaskError::internal(format!(
                "Task panicked: {}",
                panic_message(&*panic)
            ))),
        };

        let links = shared.finish(&task, outcome, Some(&worker));

        if shared.cancel.is_cancelled() {
            if !links.is_empty() {
                tracing::debug!(url = %task.url, "Dropping {} link(s) after cancellation", links.len());
            }
        } else {
            for link in links {
                spawn_task(&shared, task.child(link));
            }
        }

        if !shared.pool.checkin(worker).await {
            // The slot is gone for good; keep permits equal to live workers.
            permit.forget();
        }
        shared.active.fetch_sub(1, Ordering::AcqRel);
    }
    .boxed()
}

impl Shared {
    /// Writes the task's row and counts it
    ///
    /// # Returns
    ///
    /// The links to follow, empty unless the task succeeded
    fn finish(&self, task: &Task, outcome: ScrapeOutcome, worker: Option<&Worker>) -> Vec<CanonicalUrl> {
        let status = outcome.status();
        let (detail, harvest) = match outcome {
            ScrapeOutcome::Success(harvest) => (String::new(), Some(harvest)),
            ScrapeOutcome::Skipped(reason) => (reason.to_string(), None),
            ScrapeOutcome::Failed(error) => {
                tracing::warn!(
                    url = %task.url,
                    worker = ?worker.map(|w| w.id),
                    status = %status,
                    "Task failed: {}",
                    error
                );
                (error.to_string(), None)
            }
        };

        let mut row = ReportRow::new(
            task.input_url.clone(),
            task.url.as_str(),
            status,
            detail,
            Arc::clone(&task.record),
        );
        if let Some(worker) = worker {
            row.user_agent = worker.user_agent.clone();
            row.proxy = worker.proxy.clone();
            row.worker_id = Some(worker.id);
        }

        let mut links = Vec::new();
        if let Some(harvest) = harvest {
            let new_emails = self.registry.register(&harvest.emails);
            row.status_detail = success_detail(harvest.emails.len(), new_emails.len());
            row.page_title = harvest.title;
            row.emails = harvest.raw_emails;
            row.new_emails = new_emails;
            links = harvest.links;
        }

        if let Err(e) = self.report.write_row(&row) {
            tracing::warn!(url = %task.url, "Failed to write report row: {}", e);
        }
        self.stats.record(status, task.url.as_str(), &row.status_detail);

        links
    }
}

fn success_detail(found: usize, new: usize) -> String {
    if new > 0 {
        format!("Success ({} new email(s) found)", new)
    } else if found > 0 {
        "Success (Duplicate email(s) found)".to_string()
    } else {
        "Success (No emails found)".to_string()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
