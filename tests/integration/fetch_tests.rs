//! Fetching against a mock site

use crate::common::{canonical_host, html_page};
use sitegraph::crawler::{build_http_client, fetch_document, FetchResult};
use sitegraph::config::UserAgentConfig;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> reqwest::Client {
    let config = UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    };
    build_http_client(&config, Duration::from_secs(5)).expect("Failed to build client")
}

#[tokio::test]
async fn test_fetch_falls_back_to_http() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header(
            "user-agent",
            "TestBot/1.0.0 (+https://example.com/contact; test@example.com)",
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html_page("Salut"))
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(&mock_server)
        .await;

    let host = canonical_host(&mock_server.uri());
    match fetch_document(&client(), &host).await {
        FetchResult::Success {
            status_code, body, ..
        } => {
            assert_eq!(status_code, 200);
            assert!(body.contains("Salut"));
        }
        other => panic!("Expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_http_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let host = canonical_host(&mock_server.uri());
    let result = fetch_document(&client(), &format!("{}/lipsa", host)).await;
    assert!(matches!(result, FetchResult::HttpError { status_code: 404 }));
    assert!(result.failure_reason().is_some());
}

#[tokio::test]
async fn test_fetch_non_html_is_a_failure() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/date.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{}")
                .insert_header("content-type", "application/json"),
        )
        .mount(&mock_server)
        .await;

    let host = canonical_host(&mock_server.uri());
    let result = fetch_document(&client(), &format!("{}/date.json", host)).await;
    assert!(matches!(result, FetchResult::ContentMismatch { .. }));
    assert!(!result.is_success());
}
