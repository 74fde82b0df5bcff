//! Whole-run tests through the HTTP renderer against wiremock servers

use crate::common::{read_report, rows_for, RunDir};
use contact_harvester::browser::HttpBrowser;
use contact_harvester::crawler::{Coordinator, RunEnd};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html")
}

#[tokio::test]
async fn test_full_run_single_site() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(format!(
            r#"<html><head><title>Harbor Bakery</title></head><body>
            <p>Orders: orders [at] harbor-bakery [dot] com</p>
            <a href="{}/contact">Contact</a>
            <a href="/contact/">Contact again</a>
            <a href="/menu.pdf">Menu</a>
            </body></html>"#,
            base_url
        )))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/contact"))
        .respond_with(html(
            r#"<html><head><title>Contact</title></head><body>
            <a data-email="Owner@Harbor-Bakery.com" href="/x">Write to the owner</a>
            <p>orders@harbor-bakery.com</p>
            </body></html>"#
                .to_string(),
        ))
        .mount(&mock_server)
        .await;

    let run_dir = RunDir::new();
    let mut config = run_dir.config(&[&base_url]);
    config.crawler.max_depth = 1;
    config.politeness.respect_robots_txt = true;
    config.session.block_url_patterns = Vec::new();

    let coordinator = Coordinator::new(Arc::new(config), Arc::new(HttpBrowser::new()), false)
        .await
        .expect("coordinator starts");
    let report = coordinator
        .run_until(std::future::pending::<()>())
        .await
        .expect("run finishes");

    assert_eq!(report.end, RunEnd::Completed);
    assert_eq!(report.stats.success, 2);
    assert_eq!(report.unique_emails, 2);

    let rows = read_report(&run_dir.path("report.csv"));
    assert_eq!(rows.len(), 2);

    let home = rows_for(&rows, &format!("{}/", base_url))[0];
    assert_eq!(home["PageTitle"], "Harbor Bakery");
    assert_eq!(home["EmailsFoundRaw"], "orders@harbor-bakery.com");

    let contact = rows_for(&rows, &format!("{}/contact", base_url))[0];
    assert_eq!(contact["PageTitle"], "Contact");
    assert_eq!(contact["StatusDetail"], "Success (1 new email(s) found)");
    assert_eq!(contact["NewUniqueEmailsAdded"], "owner@harbor-bakery.com");
    assert!(contact["UserAgentUsed"].starts_with("Mozilla/5.0"));
}

#[tokio::test]
async fn test_unreachable_site_reports_navigation_error() {
    let run_dir = RunDir::new();
    let mut config = run_dir.config(&["http://127.0.0.1:9/"]);
    config.crawler.navigation_retries = 1;

    let coordinator = Coordinator::new(Arc::new(config), Arc::new(HttpBrowser::new()), false)
        .await
        .unwrap();
    let report = coordinator
        .run_until(std::future::pending::<()>())
        .await
        .unwrap();

    assert_eq!(report.stats.failed, 1);
    let rows = read_report(&run_dir.path("report.csv"));
    assert_eq!(rows[0]["Status"], "Navigation Error");
    assert!(rows[0]["StatusDetail"].contains("after 2 attempt(s)"));
}
