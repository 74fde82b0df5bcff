//! Integration tests for the harvester
//!
//! The coordinator runs end-to-end against a scripted in-memory browser, and
//! against wiremock servers through the HTTP renderer.

mod common;
mod crawl_tests;
mod http_tests;
