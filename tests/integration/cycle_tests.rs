//! Full cycles against a mock site

use crate::common::{add_site, canonical_host, create_test_config, html_page};
use chrono::Utc;
use sitegraph::crawler::{build_http_client, Coordinator};
use sitegraph::output::{Indexer, LinkGraphExport};
use sitegraph::storage::{into_shared, lock_storage, open_storage, ExtractedLinks, Storage};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(html_page(body))
        .insert_header("content-type", "text/html")
}

#[tokio::test]
async fn test_full_cycle_builds_link_graph() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response(
            r#"<a href="https://www.other.ro/stiri?id=4">Other</a>
               <a href="mailto:redactia@other.ro">Mail</a>
               <a href="https://unknown.ro">Unknown</a>"#,
        ))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/despre"))
        .respond_with(html_response(r#"<a href="http://other.ro">Other</a>"#))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("sitegraph.db");
    let graph_path = dir.path().join("export").join("graph.json");
    let config = create_test_config(db_path.to_str().expect("utf-8 path"));

    let host = canonical_host(&mock_server.uri());
    let mut storage = open_storage(&db_path).expect("Failed to open DB");
    let site_id = add_site(&mut storage, &host);
    let other_id = add_site(&mut storage, "other.ro");
    // Fetched recently, so the cycle does not go out to the network for it
    storage
        .record_site_fetch_success(other_id, "<html></html>", Utc::now())
        .expect("Failed to record fetch");
    storage
        .save_page_links(&ExtractedLinks {
            site_id,
            page_urls: vec![format!("{}/despre", host)],
            ..Default::default()
        })
        .expect("Failed to save page");

    let client = build_http_client(&config.user_agent, Duration::from_secs(5))
        .expect("Failed to build client");
    let indexer: Arc<dyn Indexer> = Arc::new(LinkGraphExport::new(&graph_path));
    let coordinator = Coordinator::with_parts(
        config,
        into_shared(storage),
        client,
        None,
        Some(indexer),
    )
    .expect("Failed to create coordinator");

    let report = coordinator
        .cycle_tick()
        .await
        .expect("Cycle failed")
        .expect("Lock should be free");

    assert_eq!((report.sites.attempted, report.sites.successful), (1, 1));
    assert_eq!((report.pages.attempted, report.pages.successful), (1, 1));
    assert_eq!(report.processing.processed, 2);
    assert!(!report.processing.timed_out);
    assert_eq!(report.index.as_ref().map(|index| index.links), Some(1));

    {
        let storage = lock_storage(coordinator.storage()).expect("Failed to lock storage");
        let site = storage.get_site(site_id).expect("Site missing");
        assert!(site.last_checked_on.is_some());
        assert!(site.last_processed_on.is_some());
        assert!(site.error.is_none());

        let page = storage
            .get_page_by_url(&format!("{}/despre", host))
            .expect("Query failed")
            .expect("Page missing");
        assert!(page.last_seen.is_some());

        let edges = storage.get_current_links(None).expect("Query failed");
        assert_eq!(edges.len(), 1);
        assert_eq!((edges[0].from_site_id, edges[0].to_site_id), (site_id, other_id));
        assert!(storage
            .get_content_due_for_processing(100)
            .expect("Query failed")
            .is_empty());
    }

    let exported: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(&graph_path).expect("Export missing"),
    )
    .expect("Export is not JSON");
    assert_eq!(exported["links"].as_array().map(Vec::len), Some(1));

    // Nothing is due any more: a second cycle fetches nothing
    let report = coordinator
        .cycle_tick()
        .await
        .expect("Cycle failed")
        .expect("Lock should be free");
    assert_eq!(report.sites.attempted, 0);
    assert_eq!(report.pages.attempted, 0);
    assert_eq!(report.processing.processed, 0);
}

#[tokio::test]
async fn test_failed_site_fetch_is_recorded() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("sitegraph.db");
    let config = create_test_config(db_path.to_str().expect("utf-8 path"));

    let host = canonical_host(&mock_server.uri());
    let mut storage = open_storage(&db_path).expect("Failed to open DB");
    let site_id = add_site(&mut storage, &host);

    let client = build_http_client(&config.user_agent, Duration::from_secs(5))
        .expect("Failed to build client");
    let coordinator = Coordinator::with_parts(config, into_shared(storage), client, None, None)
        .expect("Failed to create coordinator");

    let report = coordinator.run_cycle().await.expect("Cycle failed");
    assert_eq!((report.sites.attempted, report.sites.successful), (1, 0));
    assert_eq!(report.sites.success_ratio(), 0.0);
    assert_eq!(report.processing.processed, 0);

    let storage = lock_storage(coordinator.storage()).expect("Failed to lock storage");
    let site = storage.get_site(site_id).expect("Site missing");
    assert_eq!(site.error.as_deref(), Some("HTTP 503"));
    assert!(site.last_checked_on.is_some());
    assert_eq!(storage.count_errored_sites().expect("Count failed"), 1);
}
