//! Partitioned batch fetching across several mock hosts

use crate::common::{add_site, canonical_host, create_test_config, html_page};
use sitegraph::crawler::{build_http_client, FetchOrchestrator, FetchTarget};
use sitegraph::storage::{into_shared, lock_storage, ExtractedLinks, SqliteStorage, Storage};
use sitegraph::url::LinkPatterns;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn html_server(pages: &[&str]) -> MockServer {
    let server = MockServer::start().await;
    for page in pages {
        Mock::given(method("GET"))
            .and(path(*page))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(html_page("Salut"))
                    .insert_header("content-type", "text/html"),
            )
            .expect(1)
            .mount(&server)
            .await;
    }
    server
}

#[tokio::test]
async fn test_failing_partition_does_not_affect_others() {
    let first = html_server(&["/", "/despre"]).await;
    let second = html_server(&["/"]).await;
    let broken = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&broken)
        .await;

    let first_host = canonical_host(&first.uri());
    let second_host = canonical_host(&second.uri());
    let broken_host = canonical_host(&broken.uri());

    let mut storage = SqliteStorage::open_in_memory().expect("Failed to open DB");
    let first_id = add_site(&mut storage, &first_host);
    let second_id = add_site(&mut storage, &second_host);
    let broken_id = add_site(&mut storage, &broken_host);
    let page_url = format!("{}/despre", first_host);
    storage
        .save_page_links(&ExtractedLinks {
            site_id: first_id,
            page_urls: vec![page_url.clone()],
            ..Default::default()
        })
        .expect("Failed to add page");

    let mut targets: Vec<FetchTarget> = [first_id, second_id, broken_id]
        .into_iter()
        .map(|id| FetchTarget::Site(storage.get_site(id).expect("Site missing")))
        .collect();
    let page = storage
        .get_page_by_url(&page_url)
        .expect("Query failed")
        .expect("Page missing");
    targets.push(FetchTarget::Page(page));

    let config = create_test_config(":memory:");
    let client = build_http_client(&config.user_agent, Duration::from_secs(5))
        .expect("Failed to build client");
    let storage = into_shared(storage);
    let orchestrator = FetchOrchestrator::new(
        storage.clone(),
        client,
        Arc::new(LinkPatterns::new(&[]).expect("Failed to compile patterns")),
        &config.crawler,
    );

    let outcome = orchestrator.fetch_batch(targets).await;
    assert_eq!(outcome.attempted, 4);
    assert_eq!(outcome.successful, 3);
    assert!((outcome.success_ratio() - 0.75).abs() < f64::EPSILON);

    let storage = lock_storage(&storage).expect("Failed to lock storage");
    for id in [first_id, second_id] {
        let site = storage.get_site(id).expect("Site missing");
        assert!(site.error.is_none(), "{} should have no error", site.url);
        assert!(site.last_checked_on.is_some());
    }
    assert_eq!(
        storage
            .get_content_due_for_processing(10)
            .expect("Query failed")
            .len(),
        2
    );

    let broken_site = storage.get_site(broken_id).expect("Site missing");
    assert_eq!(broken_site.error.as_deref(), Some("HTTP 503"));
    assert!(broken_site.last_checked_on.is_some());

    let page = storage
        .get_page_by_url(&page_url)
        .expect("Query failed")
        .expect("Page missing");
    assert!(page.last_seen.is_some());
    assert!(page.error.is_none());
}
