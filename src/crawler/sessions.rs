//! Session lifecycle manager
//!
//! The pool owns one long-lived browser session per worker slot. A task
//! checks a worker out, uses its session for one page, and checks it back in;
//! recycling happens at check-in, never while a task is using the session.
//!
//! A slot whose session cannot be recreated is dropped for the rest of the
//! run, which lowers the effective concurrency.

use crate::browser::{BrowserDriver, BrowserSession, SessionOptions};
use crate::config::SessionConfig;
use crate::{BrowserError, HarvestError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// A worker slot and the session currently bound to it
pub struct Worker {
    pub id: usize,
    pub session: Arc<dyn BrowserSession>,
    pub user_agent: Option<String>,
    pub proxy: Option<String>,

    /// Tasks served by the current session
    pub tasks_served: u32,

    /// When the current session was created
    pub started_at: Instant,
}

/// Fixed-size pool of browser sessions
pub struct SessionPool {
    browser: Arc<dyn BrowserDriver>,
    config: SessionConfig,
    idle: Mutex<Vec<Worker>>,
    available: Notify,
    live: AtomicUsize,
    restarts: AtomicUsize,
}

impl SessionPool {
    /// Creates `size` sessions
    ///
    /// Slots whose session cannot be created are dropped with an error log.
    ///
    /// # Returns
    ///
    /// * `Ok(SessionPool)` - At least one session is usable
    /// * `Err(HarvestError::NoSessions)` - Every session failed
    pub async fn start(
        browser: Arc<dyn BrowserDriver>,
        config: &SessionConfig,
        size: usize,
    ) -> Result<Self, HarvestError> {
        let pool = Self {
            browser,
            config: config.clone(),
            idle: Mutex::new(Vec::with_capacity(size)),
            available: Notify::new(),
            live: AtomicUsize::new(0),
            restarts: AtomicUsize::new(0),
        };

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            match pool.create_session(id).await {
                Ok(session) => {
                    let options = pool.options_for(id);
                    tracing::debug!(worker = id, "Session created (user agent: {:?})", options.user_agent);
                    workers.push(Worker {
                        id,
                        session,
                        user_agent: options.user_agent,
                        proxy: options.proxy,
                        tasks_served: 0,
                        started_at: Instant::now(),
                    });
                }
                Err(e) => tracing::error!(worker = id, "Failed to create session: {}", e),
            }
        }

        if workers.is_empty() {
            return Err(HarvestError::NoSessions);
        }
        if workers.len() < size {
            tracing::warn!("Only {} of {} sessions could be created", workers.len(), size);
        }

        // Popped from the back, so reverse to hand out worker 0 first
        workers.reverse();
        pool.live.store(workers.len(), Ordering::Release);
        *pool.lock_idle() = workers;
        Ok(pool)
    }

    /// Takes a free worker, waiting until one is returned
    ///
    /// A worker whose session died while idle gets a fresh session first.
    ///
    /// # Returns
    ///
    /// * `Some(Worker)` - A worker with a live session
    /// * `None` - No worker slots remain
    pub async fn checkout(&self) -> Option<Worker> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let popped = self.lock_idle().pop();
            if let Some(worker) = popped {
                if let Some(mut worker) = self.ensure_alive(worker).await {
                    worker.tasks_served += 1;
                    return Some(worker);
                }
                continue;
            }

            if self.live.load(Ordering::Acquire) == 0 {
                return None;
            }
            notified.await;
        }
    }

    /// Returns a worker, recycling its session if a threshold was reached
    ///
    /// # Returns
    ///
    /// * `true` - The worker is back in the pool
    /// * `false` - Its session could not be replaced and the slot was dropped
    pub async fn checkin(&self, mut worker: Worker) -> bool {
        if let Some(reason) = self.recycle_reason(&worker) {
            tracing::info!(worker = worker.id, "Restarting session after {}", reason);
            worker.session.close().await;
            if let Err(e) = self.replace_session(&mut worker).await {
                tracing::error!(worker = worker.id, "Session restart failed, dropping worker: {}", e);
                self.remove_slot();
                return false;
            }
        }

        self.lock_idle().push(worker);
        self.available.notify_one();
        true
    }

    /// Closes every idle session
    pub async fn close_all(&self) {
        let workers: Vec<Worker> = self.lock_idle().drain(..).collect();
        for worker in workers {
            worker.session.close().await;
        }
    }

    /// Worker slots still in the pool
    pub fn live_workers(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Sessions replaced so far
    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::Acquire)
    }

    fn recycle_reason(&self, worker: &Worker) -> Option<&'static str> {
        let max_tasks = self.config.context_max_tasks;
        if max_tasks > 0 && worker.tasks_served >= max_tasks {
            return Some("reaching the task limit");
        }

        let max_minutes = self.config.context_max_time_minutes;
        if max_minutes > 0 && worker.started_at.elapsed() >= Duration::from_secs(max_minutes * 60) {
            return Some("reaching the age limit");
        }

        if !worker.session.is_alive() {
            return Some("the session closed");
        }

        None
    }

    async fn ensure_alive(&self, mut worker: Worker) -> Option<Worker> {
        if worker.session.is_alive() {
            return Some(worker);
        }

        tracing::warn!(worker = worker.id, "Session found dead at checkout, restarting");
        match self.replace_session(&mut worker).await {
            Ok(()) => Some(worker),
            Err(e) => {
                tracing::error!(worker = worker.id, "Session restart failed, dropping worker: {}", e);
                self.remove_slot();
                None
            }
        }
    }

    async fn replace_session(&self, worker: &mut Worker) -> Result<(), BrowserError> {
        worker.session = self.create_session(worker.id).await?;
        worker.tasks_served = 0;
        worker.started_at = Instant::now();
        self.restarts.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    async fn create_session(&self, id: usize) -> Result<Arc<dyn BrowserSession>, BrowserError> {
        self.browser.new_session(&self.options_for(id)).await
    }

    fn options_for(&self, id: usize) -> SessionOptions {
        SessionOptions {
            user_agent: self.config.user_agent_for(id).map(str::to_string),
            proxy: self.config.proxy_for(id).map(str::to_string),
            ignore_https_errors: self.config.ignore_https_errors,
        }
    }

    fn remove_slot(&self) {
        let remaining = self.live.fetch_sub(1, Ordering::AcqRel).saturating_sub(1);
        tracing::warn!("Worker pool shrank to {} session(s)", remaining);
        // Waiters must re-check whether any slot is left
        self.available.notify_waiters();
    }

    fn lock_idle(&self) -> MutexGuard<'_, Vec<Worker>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
