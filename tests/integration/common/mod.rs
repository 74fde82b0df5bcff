//! Scripted in-memory browser and run fixtures shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use contact_harvester::browser::{
    BrowserDriver, BrowserPage, BrowserSession, NavigationError, NavigationErrorKind,
    NavigationResponse, RequestFilter, SessionOptions,
};
use contact_harvester::config::{Config, WaitUntil};
use contact_harvester::BrowserError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::watch;

/// What the scripted browser serves for one URL
#[derive(Debug, Clone, Default)]
pub struct PageScript {
    pub title: String,
    pub text: String,
    pub links: Vec<String>,
    pub fail: Option<NavigationErrorKind>,
    /// Every anchor read on the loaded page fails
    pub broken_links: bool,
}

impl PageScript {
    pub fn new(title: &str, text: &str) -> Self {
        Self {
            title: title.to_string(),
            text: text.to_string(),
            ..Self::default()
        }
    }

    pub fn with_links(mut self, links: &[&str]) -> Self {
        self.links = links.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn with_broken_links(mut self) -> Self {
        self.broken_links = true;
        self
    }

    pub fn failing(kind: NavigationErrorKind) -> Self {
        Self {
            fail: Some(kind),
            ..Self::default()
        }
    }
}

/// One navigation observed by the browser
#[derive(Debug, Clone)]
pub struct Visit {
    pub url: String,
    pub host: String,
    pub session: usize,
    pub at: Instant,
}

/// State shared by the driver, its sessions and their pages
#[derive(Default)]
struct Shared {
    pages: Mutex<HashMap<String, PageScript>>,
    visits: Mutex<Vec<Visit>>,
    anchor_reads: AtomicUsize,
    navigation_time: Mutex<Duration>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    sessions_created: AtomicUsize,
    sessions_closed: AtomicUsize,
}

/// Browser driver answering from a fixed script, with concurrency gauges
pub struct ScriptedBrowser {
    shared: Arc<Shared>,
    disconnect_tx: watch::Sender<bool>,
}

impl ScriptedBrowser {
    pub fn new() -> Arc<Self> {
        let (disconnect_tx, _) = watch::channel(false);
        Arc::new(Self {
            shared: Arc::new(Shared::default()),
            disconnect_tx,
        })
    }

    /// Serves `script` for the canonical URL `url`
    pub fn page(&self, url: &str, script: PageScript) {
        self.shared.pages.lock().unwrap().insert(url.to_string(), script);
    }

    /// How long every navigation takes
    pub fn set_navigation_time(&self, duration: Duration) {
        *self.shared.navigation_time.lock().unwrap() = duration;
    }

    pub fn disconnect(&self) {
        self.disconnect_tx.send_replace(true);
    }

    pub fn visits(&self) -> Vec<Visit> {
        self.shared.visits.lock().unwrap().clone()
    }

    pub fn visit_count(&self, url: &str) -> usize {
        self.visits().iter().filter(|v| v.url == url).count()
    }

    /// Anchor reads attempted across all pages
    pub fn anchor_reads(&self) -> usize {
        self.shared.anchor_reads.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.shared.max_active.load(Ordering::SeqCst)
    }

    pub fn sessions_created(&self) -> usize {
        self.shared.sessions_created.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.shared.sessions_closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserDriver for ScriptedBrowser {
    async fn new_session(
        &self,
        _options: &SessionOptions,
    ) -> Result<Arc<dyn BrowserSession>, BrowserError> {
        let id = self.shared.sessions_created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ScriptedSession {
            id,
            shared: Arc::clone(&self.shared),
            alive: AtomicBool::new(true),
        }))
    }

    fn disconnected(&self) -> watch::Receiver<bool> {
        self.disconnect_tx.subscribe()
    }

    async fn close(&self) {}
}

struct ScriptedSession {
    id: usize,
    shared: Arc<Shared>,
    alive: AtomicBool,
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>, BrowserError> {
        Ok(Box::new(ScriptedPage {
            session: self.id,
            shared: Arc::clone(&self.shared),
            loaded: None,
        }))
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        if self.alive.swap(false, Ordering::SeqCst) {
            self.shared.sessions_closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

struct ScriptedPage {
    session: usize,
    shared: Arc<Shared>,
    loaded: Option<PageScript>,
}

impl ScriptedPage {
    fn loaded(&self) -> Result<&PageScript, BrowserError> {
        self.loaded.as_ref().ok_or(BrowserError::NoDocument)
    }
}

#[async_trait]
impl BrowserPage for ScriptedPage {
    async fn set_request_filter(&mut self, _filter: RequestFilter) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn goto(
        &mut self,
        url: &str,
        _timeout: Duration,
        _wait_until: WaitUntil,
    ) -> Result<NavigationResponse, NavigationError> {
        let host = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        self.shared.visits.lock().unwrap().push(Visit {
            url: url.to_string(),
            host,
            session: self.session,
            at: Instant::now(),
        });

        let now_active = self.shared.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.max_active.fetch_max(now_active, Ordering::SeqCst);
        let navigation_time = *self.shared.navigation_time.lock().unwrap();
        tokio::time::sleep(navigation_time).await;
        self.shared.active.fetch_sub(1, Ordering::SeqCst);

        let script = self
            .shared
            .pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| PageScript::new("Untitled", ""));

        if let Some(kind) = script.fail {
            return Err(NavigationError::new(kind, format!("scripted failure for {}", url)));
        }

        self.loaded = Some(script);
        Ok(NavigationResponse {
            status: 200,
            url: url.to_string(),
        })
    }

    async fn title(&self) -> Result<String, BrowserError> {
        Ok(self.loaded()?.title.clone())
    }

    async fn inner_text(&self, selector: &str) -> Result<String, BrowserError> {
        let page = self.loaded()?;
        Ok(if selector == "body" { page.text.clone() } else { String::new() })
    }

    async fn content(&self) -> Result<String, BrowserError> {
        let page = self.loaded()?;
        Ok(format!(
            "<html><head><title>{}</title></head><body>{}</body></html>",
            page.title, page.text
        ))
    }

    async fn count(&self, _selector: &str) -> Result<usize, BrowserError> {
        self.loaded()?;
        Ok(0)
    }

    async fn attribute_values(
        &self,
        _selector: &str,
        _attribute: &str,
    ) -> Result<Vec<String>, BrowserError> {
        self.loaded()?;
        Ok(Vec::new())
    }

    async fn anchor_hrefs(&self) -> Result<Vec<String>, BrowserError> {
        self.shared.anchor_reads.fetch_add(1, Ordering::SeqCst);
        let page = self.loaded()?;
        if page.broken_links {
            return Err(BrowserError::Evaluate {
                operation: "anchor_hrefs",
                message: "execution context was destroyed".to_string(),
            });
        }
        Ok(page.links.clone())
    }

    async fn shadow_root_text(&self) -> Result<String, BrowserError> {
        Ok(String::new())
    }

    async fn frame_texts(&self, _max_depth: u32) -> Result<Vec<String>, BrowserError> {
        Ok(Vec::new())
    }

    async fn wait_for_selector(&self, _selector: &str, _timeout: Duration) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn close(&mut self) {
        self.loaded = None;
    }
}

/// Temporary directory holding a run's input, report and checkpoint
pub struct RunDir {
    pub dir: TempDir,
}

impl RunDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Writes an input CSV with `Name` and `Website` columns
    pub fn write_input(&self, websites: &[&str]) -> PathBuf {
        let path = self.path("leads.csv");
        let mut contents = String::from("Name,Website\n");
        for (i, website) in websites.iter().enumerate() {
            contents.push_str(&format!("Lead {},{}\n", i, website));
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Fast, offline configuration writing into this directory
    pub fn config(&self, websites: &[&str]) -> Config {
        let mut config = Config::default();
        config.input.file = Some(self.write_input(websites));
        config.crawler.concurrency = 2;
        config.crawler.post_load_delay_ms = 0;
        config.crawler.retry_delay_ms = 100;
        config.politeness.respect_robots_txt = false;
        config.politeness.min_delay_per_domain_ms = 0;
        config.output.report_path = Some(self.path("report.csv"));
        config.output.state_file = self.path("state.json");
        config.output.error_log = self.path("errors.log");
        config.output.checkpoint_interval_secs = 0;
        config.output.shutdown_grace_secs = 2;
        config
    }
}

/// A report row keyed by column name
pub type Row = HashMap<String, String>;

pub fn read_report(path: &Path) -> Vec<Row> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers = reader.headers().unwrap().clone();
    reader
        .records()
        .map(|record| {
            let record = record.unwrap();
            headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect()
        })
        .collect()
}

pub fn rows_for<'a>(rows: &'a [Row], url: &str) -> Vec<&'a Row> {
    rows.iter().filter(|r| r["NormalizedURL"] == url).collect()
}
