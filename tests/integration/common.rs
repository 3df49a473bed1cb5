//! Shared fixtures

use chrono::Utc;
use sitegraph::config::{Config, CrawlerConfig, OutputConfig, UserAgentConfig};
use sitegraph::model::{ContentCategory, SiteKind};
use sitegraph::storage::{NewSite, Storage};

/// Creates a test configuration with no jitter and the given database
pub fn create_test_config(db_path: &str) -> Config {
    Config {
        crawler: CrawlerConfig {
            jitter_min_ms: 0,
            jitter_max_ms: 0,
            request_timeout_secs: 5,
            ..Default::default()
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: db_path.to_string(),
            link_graph_path: None,
        },
        search: Default::default(),
        jobs: Default::default(),
        lock: Default::default(),
        links: Default::default(),
    }
}

/// Canonical form of a mock server address, e.g. "127.0.0.1:40123"
pub fn canonical_host(base_url: &str) -> String {
    let parsed = url::Url::parse(base_url).expect("Failed to parse base URL");
    let host = parsed.host_str().expect("Failed to extract host");
    match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

pub fn add_site<S: Storage>(storage: &mut S, url: &str) -> i64 {
    storage
        .insert_site(
            &NewSite {
                url: url.to_string(),
                title: None,
                kind: SiteKind::Domestic,
                category: ContentCategory::Uncategorized,
                refresh_interval_hours: 24,
            },
            Utc::now(),
        )
        .expect("Failed to insert site")
}

pub fn html_page(body: &str) -> String {
    format!(
        "<html><head><title>Test</title></head><body>{}</body></html>",
        body
    )
}
