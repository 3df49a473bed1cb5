//! Search discovery against a mock Custom Search API

use chrono::Utc;
use sitegraph::discovery::{
    DiscoveryError, DiscoveryOutcome, GoogleSearchClient, SearchClient, SearchDiscovery,
};
use sitegraph::storage::{into_shared, lock_storage, SqliteStorage, Storage};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn search_client(server: &MockServer) -> GoogleSearchClient {
    GoogleSearchClient::new(
        reqwest::Client::new(),
        format!("{}/customsearch/v1", server.uri()),
        "test-key",
        "test-engine",
    )
}

#[tokio::test]
async fn test_google_client_sends_query_and_parses_items() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customsearch/v1"))
        .and(query_param("key", "test-key"))
        .and(query_param("cx", "test-engine"))
        .and(query_param("q", "ziare locale"))
        .and(query_param("start", "21"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "queries": {"request": [{"startIndex": 21}]},
            "items": [
                {"title": "Ziarul Local", "displayLink": "www.ziarul-local.ro"},
                {"title": "Radio", "displayLink": "radio.ro"}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let page = search_client(&mock_server)
        .search("ziare locale", 21)
        .await
        .expect("Search failed");
    assert_eq!(page.start_index, Some(21));
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].display_link, "www.ziarul-local.ro");
}

#[tokio::test]
async fn test_api_error_status() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string("quota exceeded"))
        .mount(&mock_server)
        .await;

    let result = search_client(&mock_server).search("presa", 1).await;
    match result {
        Err(DiscoveryError::Api { status, message }) => {
            assert_eq!(status, 403);
            assert!(message.contains("quota"));
        }
        other => panic!("Expected API error, got {:?}", other.map(|p| p.items.len())),
    }
}

#[tokio::test]
async fn test_discovery_creates_sites_and_advances_cursor() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customsearch/v1"))
        .and(query_param("start", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "queries": {"request": [{"startIndex": 1}]},
            "items": [
                {"title": "Stiri de azi", "displayLink": "www.stiri-azi.ro"},
                {"title": "Digi24", "displayLink": "www.digi24.ro"},
                {"title": "Foreign", "displayLink": "news.example.com"}
            ]
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/customsearch/v1"))
        .and(query_param("start", "11"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "queries": {"request": [{"startIndex": 11}]}
        })))
        .mount(&mock_server)
        .await;

    let mut storage = SqliteStorage::open_in_memory().expect("Failed to open DB");
    storage
        .insert_search_term("stiri", Utc::now())
        .expect("Failed to add term");
    let storage = into_shared(storage);
    let client = search_client(&mock_server);
    let discovery = SearchDiscovery::new(101, 12);

    let outcome = discovery.run(&storage, &client).await.expect("Discovery failed");
    assert_eq!(
        outcome,
        DiscoveryOutcome::Searched {
            term: "stiri".to_string(),
            created: 3,
            next_start_index: 11,
        }
    );

    // Empty page: the term is done
    let outcome = discovery.run(&storage, &client).await.expect("Discovery failed");
    assert_eq!(outcome.created(), 0);
    let outcome = discovery.run(&storage, &client).await.expect("Discovery failed");
    assert!(matches!(outcome, DiscoveryOutcome::Exhausted { .. }));

    let storage = lock_storage(&storage).expect("Failed to lock storage");
    let digi = storage
        .get_site_by_url("digi24.ro")
        .expect("Query failed")
        .expect("Site missing");
    assert_eq!(digi.category.to_string(), "NEWS");
    assert_eq!(digi.refresh_interval_hours, 12);

    let foreign = storage
        .get_site_by_url("news.example.com")
        .expect("Query failed")
        .expect("Site missing");
    assert_eq!(foreign.kind.to_string(), "FOREIGN");
}
