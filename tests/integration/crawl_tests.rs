//! Whole-run tests against the scripted browser

use crate::common::{read_report, rows_for, PageScript, RunDir, ScriptedBrowser};
use contact_harvester::browser::NavigationErrorKind;
use contact_harvester::config::Config;
use contact_harvester::crawler::{Coordinator, RunEnd, RunReport};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn run(config: Config, browser: &Arc<ScriptedBrowser>) -> RunReport {
    let coordinator = Coordinator::new(Arc::new(config), browser.clone(), false)
        .await
        .expect("coordinator starts");
    coordinator
        .run_until(std::future::pending::<()>())
        .await
        .expect("run finishes")
}

fn checkpoint_urls(run_dir: &RunDir) -> Vec<String> {
    let raw = std::fs::read_to_string(run_dir.path("state.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    value["visitedUrls"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_example_biz_email_is_harvested() {
    let run_dir = RunDir::new();
    let browser = ScriptedBrowser::new();
    browser.page(
        "http://example-biz.com/",
        PageScript::new("Example Biz", "Email us: Jane@Example-Biz.com"),
    );

    let report = run(run_dir.config(&["example-biz.com"]), &browser).await;
    assert_eq!(report.end, RunEnd::Completed);
    assert_eq!(report.unique_emails, 1);

    let rows = read_report(&run_dir.path("report.csv"));
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row["InputURL"], "example-biz.com");
    assert_eq!(row["NormalizedURL"], "http://example-biz.com/");
    assert_eq!(row["Status"], "Success");
    assert_eq!(row["StatusDetail"], "Success (1 new email(s) found)");
    assert_eq!(row["PageTitle"], "Example Biz");
    assert_eq!(row["EmailsFoundRaw"], "jane@example-biz.com");
    assert_eq!(row["NewUniqueEmailsAdded"], "jane@example-biz.com");
    assert_eq!(row["ProxyUsed"], "None");
    assert_eq!(row["WorkerID"], "0");
}

#[tokio::test]
async fn test_filtered_emails_never_reported() {
    let run_dir = RunDir::new();
    let browser = ScriptedBrowser::new();
    browser.page(
        "http://acme-roofing.test/",
        PageScript::new(
            "Acme Roofing",
            "noreply@acme-roofing.test logo.png@cdn.example sam@acme-roofing.test",
        ),
    );

    run(run_dir.config(&["acme-roofing.test"]), &browser).await;

    let rows = read_report(&run_dir.path("report.csv"));
    assert_eq!(rows[0]["EmailsFoundRaw"], "sam@acme-roofing.test");
}

#[tokio::test]
async fn test_one_row_per_task_with_children() {
    let run_dir = RunDir::new();
    let browser = ScriptedBrowser::new();
    browser.page(
        "http://acme-roofing.test/",
        PageScript::new("Home", "Call us").with_links(&[
            "http://acme-roofing.test/team",
            "http://acme-roofing.test/team/",
            "http://acme-roofing.test/contact#form",
            "http://acme-roofing.test/",
            "mailto:sam@acme-roofing.test",
            "http://acme-roofing.test/brochure.pdf",
            "https://www.facebook.com/acme",
        ]),
    );
    browser.page(
        "http://acme-roofing.test/team",
        PageScript::new("Team", "sam@acme-roofing.test").with_links(&["http://acme-roofing.test/contact"]),
    );
    browser.page(
        "http://acme-roofing.test/contact",
        PageScript::new("Contact", "lee@acme-roofing.test"),
    );

    let mut config = run_dir.config(&["acme-roofing.test"]);
    config.crawler.max_depth = 2;
    config.output.include_original_data = true;
    let report = run(config, &browser).await;

    let rows = read_report(&run_dir.path("report.csv"));
    assert_eq!(report.stats.processed as usize, rows.len());
    assert_eq!(report.unique_emails, 2);

    let home = rows_for(&rows, "http://acme-roofing.test/");
    let team = rows_for(&rows, "http://acme-roofing.test/team");
    let contact = rows_for(&rows, "http://acme-roofing.test/contact");
    assert_eq!(home.len(), 1);
    assert_eq!(team.len(), 1);
    assert!(!contact.is_empty());

    assert_eq!(home[0]["StatusDetail"], "Success (No emails found)");
    assert_eq!(team[0]["InputURL"], "http://acme-roofing.test/team");
    assert_eq!(team[0]["Original_Name"], "Lead 0");
    assert_eq!(team[0]["Original_Website"], "acme-roofing.test");

    // Every URL is navigated at most once, whoever discovered it
    assert_eq!(browser.visit_count("http://acme-roofing.test/contact"), 1);
    let success: Vec<_> = contact.iter().filter(|r| r["Status"] == "Success").collect();
    assert_eq!(success.len(), 1);
    assert!(contact
        .iter()
        .filter(|r| r["Status"] != "Success")
        .all(|r| r["StatusDetail"] == "Already Visited"));
    assert_eq!(success[0]["NewUniqueEmailsAdded"], "lee@acme-roofing.test");

    assert!(browser.visits().iter().all(|v| !v.url.contains("facebook")));
    assert!(browser.visits().iter().all(|v| !v.url.ends_with(".pdf")));
}

#[tokio::test]
async fn test_duplicate_seeds_fetched_once() {
    let run_dir = RunDir::new();
    let browser = ScriptedBrowser::new();
    browser.set_navigation_time(Duration::from_millis(50));
    browser.page("http://dup-shop.test/", PageScript::new("Dup", "owner@dup-shop.test"));

    let mut config = run_dir.config(&[
        "dup-shop.test",
        "http://DUP-shop.test/",
        "dup-shop.test/#top",
        "dup-shop.test?utm_source=ad",
    ]);
    config.crawler.concurrency = 4;
    let report = run(config, &browser).await;

    assert_eq!(browser.visit_count("http://dup-shop.test/"), 1);
    assert_eq!(report.stats.success, 1);
    assert_eq!(report.stats.skipped, 3);

    let rows = read_report(&run_dir.path("report.csv"));
    assert_eq!(rows.len(), 4);
    let skipped: Vec<_> = rows.iter().filter(|r| r["Status"] == "Skipped").collect();
    assert!(skipped.iter().all(|r| r["StatusDetail"] == "Already Visited"));
    assert!(skipped.iter().all(|r| r["WorkerID"] == "N/A"));
}

#[tokio::test]
async fn test_active_navigations_bounded_by_concurrency() {
    let run_dir = RunDir::new();
    let browser = ScriptedBrowser::new();
    browser.set_navigation_time(Duration::from_millis(40));

    let seeds: Vec<String> = (0..12).map(|i| format!("biz-{}.test", i)).collect();
    let seeds: Vec<&str> = seeds.iter().map(String::as_str).collect();
    let mut config = run_dir.config(&seeds);
    config.crawler.concurrency = 3;
    let report = run(config, &browser).await;

    assert_eq!(report.stats.processed, 12);
    assert_eq!(report.stats.success, 12);
    assert!(browser.max_active() <= 3, "max active was {}", browser.max_active());
    assert!(browser.max_active() >= 2);
}

#[tokio::test]
async fn test_same_host_requests_are_paced() {
    let run_dir = RunDir::new();
    let browser = ScriptedBrowser::new();

    let mut config = run_dir.config(&[
        "paced.test",
        "paced.test/about",
        "paced.test/team",
        "paced.test/contact",
        "other.test",
    ]);
    config.crawler.concurrency = 4;
    config.politeness.min_delay_per_domain_ms = 150;
    run(config, &browser).await;

    let mut starts: Vec<_> = browser
        .visits()
        .into_iter()
        .filter(|v| v.host == "paced.test")
        .map(|v| v.at)
        .collect();
    starts.sort();
    assert_eq!(starts.len(), 4);
    for pair in starts.windows(2) {
        let gap = pair[1].duration_since(pair[0]);
        // The controller releases at least 150ms apart; allow for scheduling jitter
        assert!(gap >= Duration::from_millis(140), "gap was {:?}", gap);
    }
}

#[tokio::test]
async fn test_sessions_recycled_at_task_limit() {
    let run_dir = RunDir::new();
    let browser = ScriptedBrowser::new();

    let mut config = run_dir.config(&["a.test", "b.test", "c.test", "d.test", "e.test"]);
    config.crawler.concurrency = 1;
    config.session.context_max_tasks = 2;
    let report = run(config, &browser).await;

    assert_eq!(report.stats.success, 5);
    assert_eq!(report.session_restarts, 2);
    assert_eq!(browser.sessions_created(), 3);

    let sessions: Vec<usize> = browser.visits().iter().map(|v| v.session).collect();
    assert_eq!(sessions, vec![0, 0, 1, 1, 2]);
}

#[tokio::test]
async fn test_block_page_quarantines_host() {
    let run_dir = RunDir::new();
    let browser = ScriptedBrowser::new();
    browser.page(
        "http://guarded.test/",
        PageScript::new("Verify you are human", "Please wait"),
    );

    let mut config = run_dir.config(&["guarded.test", "guarded.test/contact", "open.test"]);
    config.crawler.concurrency = 1;
    let report = run(config, &browser).await;

    let rows = read_report(&run_dir.path("report.csv"));
    let home = rows_for(&rows, "http://guarded.test/");
    assert_eq!(home[0]["Status"], "Blocked");
    assert!(home[0]["StatusDetail"].contains("verify you are human"));

    let contact = rows_for(&rows, "http://guarded.test/contact");
    assert_eq!(contact[0]["Status"], "Skipped");
    assert_eq!(contact[0]["StatusDetail"], "Domain Blocked: guarded.test");
    assert_eq!(browser.visit_count("http://guarded.test/contact"), 0);

    assert_eq!(rows_for(&rows, "http://open.test/")[0]["Status"], "Success");
    assert_eq!(report.blocked_domains, 1);
}

#[tokio::test]
async fn test_navigation_failures_classified() {
    let run_dir = RunDir::new();
    let browser = ScriptedBrowser::new();
    browser.page("http://slow.test/", PageScript::failing(NavigationErrorKind::Timeout));
    browser.page("http://proxied.test/", PageScript::failing(NavigationErrorKind::Proxy));
    browser.page("http://broken.test/", PageScript::failing(NavigationErrorKind::Other));

    let mut config = run_dir.config(&["slow.test", "proxied.test", "broken.test"]);
    config.crawler.navigation_retries = 2;
    let report = run(config, &browser).await;

    assert_eq!(browser.visit_count("http://slow.test/"), 3);
    assert_eq!(browser.visit_count("http://proxied.test/"), 1);
    assert_eq!(browser.visit_count("http://broken.test/"), 1);

    let rows = read_report(&run_dir.path("report.csv"));
    assert_eq!(rows_for(&rows, "http://slow.test/")[0]["Status"], "Navigation Error");
    assert_eq!(rows_for(&rows, "http://proxied.test/")[0]["Status"], "Proxy Error");
    assert_eq!(rows_for(&rows, "http://broken.test/")[0]["Status"], "Navigation Error");

    assert_eq!(report.stats.failed, 3);
    assert_eq!(report.stats.recent_errors.len(), 3);
}

#[tokio::test]
async fn test_link_extraction_failure_is_scrape_error() {
    let run_dir = RunDir::new();
    let browser = ScriptedBrowser::new();
    browser.page(
        "http://fragile.test/",
        PageScript::new("Fragile", "reach us at desk@fragile.test").with_broken_links(),
    );

    let mut config = run_dir.config(&["fragile.test"]);
    config.crawler.max_depth = 1;
    config.crawler.element_action_retries = 2;
    config.crawler.element_action_retry_delay_ms = 10;
    let report = run(config, &browser).await;

    assert_eq!(browser.visit_count("http://fragile.test/"), 1);
    assert_eq!(browser.anchor_reads(), 3);

    let rows = read_report(&run_dir.path("report.csv"));
    let row = rows_for(&rows, "http://fragile.test/")[0];
    assert_eq!(row["Status"], "Scrape Error");
    assert!(row["StatusDetail"].contains("Extraction of links failed on fragile.test"));
    assert_eq!(row["EmailsFoundRaw"], "");
    assert_eq!(report.stats.failed, 1);
}

#[tokio::test]
async fn test_checkpoint_resume_skips_visited() {
    let run_dir = RunDir::new();

    let first = ScriptedBrowser::new();
    run(run_dir.config(&["first.test", "second.test"]), &first).await;
    assert_eq!(
        checkpoint_urls(&run_dir),
        vec!["http://first.test/", "http://second.test/"]
    );

    let second = ScriptedBrowser::new();
    let report = run(
        run_dir.config(&["first.test", "second.test", "third.test"]),
        &second,
    )
    .await;

    assert_eq!(second.visit_count("http://first.test/"), 0);
    assert_eq!(second.visit_count("http://second.test/"), 0);
    assert_eq!(second.visit_count("http://third.test/"), 1);
    assert_eq!(report.stats.skipped, 2);

    let rows = read_report(&run_dir.path("report.csv"));
    assert_eq!(rows_for(&rows, "http://first.test/")[0]["StatusDetail"], "Already Visited");

    let urls = checkpoint_urls(&run_dir);
    let unique: HashSet<_> = urls.iter().collect();
    assert_eq!(urls.len(), 3);
    assert_eq!(unique.len(), 3);
}

#[tokio::test]
async fn test_fresh_run_discards_checkpoint() {
    let run_dir = RunDir::new();
    run(run_dir.config(&["first.test"]), &ScriptedBrowser::new()).await;

    let browser = ScriptedBrowser::new();
    let coordinator = Coordinator::new(
        Arc::new(run_dir.config(&["first.test"])),
        browser.clone(),
        true,
    )
    .await
    .unwrap();
    coordinator.run_until(std::future::pending::<()>()).await.unwrap();

    assert_eq!(browser.visit_count("http://first.test/"), 1);
}

#[tokio::test]
async fn test_robots_disallowed_skipped_without_navigation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"))
        .mount(&server)
        .await;

    let run_dir = RunDir::new();
    let browser = ScriptedBrowser::new();
    let private = format!("{}/private", server.uri());
    let home = format!("{}/", server.uri());

    let mut config = run_dir.config(&[&home, &private]);
    config.politeness.respect_robots_txt = true;
    let report = run(config, &browser).await;

    let rows = read_report(&run_dir.path("report.csv"));
    let row = rows_for(&rows, &private)[0];
    assert_eq!(row["Status"], "Skipped");
    assert_eq!(row["StatusDetail"], "robots.txt");
    assert_eq!(browser.visit_count(&private), 0);
    assert_eq!(browser.visit_count(&home), 1);

    assert_eq!(report.visited, 2);
    assert!(checkpoint_urls(&run_dir).contains(&private));
}

#[tokio::test]
async fn test_interrupt_abandons_queued_tasks() {
    let run_dir = RunDir::new();
    let browser = ScriptedBrowser::new();
    browser.set_navigation_time(Duration::from_millis(200));

    let seeds: Vec<String> = (0..10).map(|i| format!("slow-{}.test", i)).collect();
    let seeds: Vec<&str> = seeds.iter().map(String::as_str).collect();
    let mut config = run_dir.config(&seeds);
    config.crawler.concurrency = 1;

    let coordinator = Coordinator::new(Arc::new(config), browser.clone(), false)
        .await
        .unwrap();
    let report = coordinator
        .run_until(tokio::time::sleep(Duration::from_millis(300)))
        .await
        .unwrap();

    assert_eq!(report.end, RunEnd::Interrupted);
    assert!(report.stats.abandoned > 0);
    assert_eq!(report.stats.processed + report.stats.abandoned, 10);
    assert_eq!(read_report(&run_dir.path("report.csv")).len() as u64, report.stats.processed);
    assert_eq!(checkpoint_urls(&run_dir).len() as u64, report.stats.processed);
}

#[tokio::test]
async fn test_browser_disconnect_ends_run() {
    let run_dir = RunDir::new();
    let browser = ScriptedBrowser::new();
    browser.set_navigation_time(Duration::from_millis(100));

    let seeds: Vec<String> = (0..10).map(|i| format!("shop-{}.test", i)).collect();
    let seeds: Vec<&str> = seeds.iter().map(String::as_str).collect();
    let mut config = run_dir.config(&seeds);
    config.crawler.concurrency = 1;

    let coordinator = Coordinator::new(Arc::new(config), browser.clone(), false)
        .await
        .unwrap();

    let trigger = browser.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        trigger.disconnect();
    });

    let report = coordinator.run_until(std::future::pending::<()>()).await.unwrap();
    assert_eq!(report.end, RunEnd::BrowserDisconnected);
    assert!(report.stats.processed < 10);
    assert!(report.stats.abandoned > 0);
}
