//! Content processing: turns fetched documents into pages and graph edges

use crate::crawler::parser::{parse_document, ParsedDocument};
use crate::storage::{
    lock_storage, ExtractedLinks, LinkWriteSummary, PageRecord, SharedStorage, Storage,
    StorageResult,
};
use crate::url::{site_key, LinkPatterns};
use chrono::Utc;
use std::collections::HashSet;
use std::time::Instant;

/// Totals of one processing pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessingOutcome {
    /// Content rows marked processed
    pub processed: usize,

    /// Content rows that failed to write and stay due
    pub failed: usize,

    /// True if the deadline stopped the pass before the batch was done
    pub timed_out: bool,

    pub new_pages: usize,
    pub new_edges: usize,
}

/// Splits a document's links into internal pages and linked sites
///
/// Internal links other than the site's own front page become page URLs. Every
/// other link contributes its site key once.
pub fn split_links(
    parsed: &ParsedDocument,
    site_id: i64,
    site_url: &str,
    content_id: Option<i64>,
) -> ExtractedLinks {
    let mut page_urls = Vec::new();
    let mut site_urls = Vec::new();
    let mut seen_sites = HashSet::new();

    for link in &parsed.links {
        if link.is_internal_to(site_url) {
            if link.url != site_url {
                page_urls.push(link.url.clone());
            }
        } else {
            let key = link.site_key();
            if seen_sites.insert(key.to_string()) {
                site_urls.push(key.to_string());
            }
        }
    }

    ExtractedLinks {
        site_id,
        content_id,
        page_urls,
        site_urls,
    }
}

/// Processes a freshly fetched page document right away
///
/// Edges are tagged with the owning site's latest content id; a site that was
/// never fetched gets its pages recorded but no edges.
pub fn process_page_document<S: Storage>(
    storage: &mut S,
    page: &PageRecord,
    parsed: &ParsedDocument,
) -> StorageResult<LinkWriteSummary> {
    let site_url = site_key(&page.url);
    let content_id = storage.get_latest_content_id(page.site_id)?;
    let links = split_links(parsed, page.site_id, site_url, content_id);

    storage.save_page_links(&links)
}

/// Processes due site content until the batch is done or the deadline passes
///
/// Each content row is written in its own transaction, so whatever completed
/// before the deadline stays durable and the rest remains due for the next
/// cycle. Storage errors on a single row are logged and do not stop the pass.
pub fn process_due_content(
    storage: &SharedStorage,
    patterns: &LinkPatterns,
    limit: u32,
    deadline: Instant,
) -> StorageResult<ProcessingOutcome> {
    let due = lock_storage(storage)?.get_content_due_for_processing(limit)?;
    let mut outcome = ProcessingOutcome::default();

    tracing::info!("Processing {} fetched site documents", due.len());

    for content in due {
        if Instant::now() >= deadline {
            outcome.timed_out = true;
            tracing::warn!("Processing time limit reached, remaining content stays due");
            break;
        }

        let parsed = parse_document(&content.body, &content.site_url, patterns);
        let links = split_links(
            &parsed,
            content.site_id,
            &content.site_url,
            Some(content.content_id),
        );

        let result = lock_storage(storage)?.complete_content_processing(&links, Utc::now());
        match result {
            Ok(summary) => {
                tracing::debug!(
                    "Processed {} (content {}): {} new pages, {} new edges",
                    content.site_url,
                    content.content_id,
                    summary.new_pages,
                    summary.new_edges
                );
                outcome.processed += 1;
                outcome.new_pages += summary.new_pages;
                outcome.new_edges += summary.new_edges;
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to process content {} of {}: {}",
                    content.content_id,
                    content.site_url,
                    e
                );
                outcome.failed += 1;
            }
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentCategory, SimpleLink, SiteKind};
    use crate::storage::{into_shared, NewSite, SqliteStorage};
    use std::time::Duration;

    fn add_site(storage: &mut SqliteStorage, url: &str) -> i64 {
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
            .unwrap()
    }

    fn patterns() -> LinkPatterns {
        LinkPatterns::new(&[]).unwrap()
    }

    #[test]
    fn test_split_links() {
        let parsed = ParsedDocument {
            links: vec![
                SimpleLink::new("Home", "example.ro"),
                SimpleLink::new("About", "example.ro/about"),
                SimpleLink::new("Other", "other.ro/news/1"),
                SimpleLink::new("Other again", "other.ro/news/2"),
                SimpleLink::new("Blog", "blog.example.ro"),
            ],
            ..Default::default()
        };

        let links = split_links(&parsed, 1, "example.ro", Some(9));
        assert_eq!(links.page_urls, vec!["example.ro/about"]);
        assert_eq!(links.site_urls, vec!["other.ro", "blog.example.ro"]);
        assert_eq!(links.content_id, Some(9));
    }

    #[test]
    fn test_process_due_content() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let a = add_site(&mut storage, "example.ro");
        let b = add_site(&mut storage, "other.ro");
        let html = r#"<html><body>
            <a href="/despre">Despre</a>
            <a href="https://other.ro/x">Other</a>
            <a href="https://unknown.ro">Unknown</a>
        </body></html>"#;
        let content_id = storage.record_site_fetch_success(a, html, Utc::now()).unwrap();
        let shared = into_shared(storage);

        let deadline = Instant::now() + Duration::from_secs(60);
        let outcome = process_due_content(&shared, &patterns(), 100, deadline).unwrap();
        assert_eq!(outcome.processed, 1);
        assert_eq!(outcome.new_pages, 1);
        assert_eq!(outcome.new_edges, 1);
        assert!(!outcome.timed_out);

        let storage = shared.lock().unwrap();
        assert!(storage.get_page_by_url("example.ro/despre").unwrap().is_some());
        let edges = storage.get_current_links(None).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!((edges[0].from_site_id, edges[0].to_site_id), (a, b));
        assert_eq!(edges[0].content_id, content_id);
        assert!(storage.get_content_due_for_processing(100).unwrap().is_empty());
    }

    #[test]
    fn test_expired_deadline_leaves_content_due() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let a = add_site(&mut storage, "example.ro");
        storage.record_site_fetch_success(a, "<html></html>", Utc::now()).unwrap();
        let shared = into_shared(storage);

        let outcome = process_due_content(&shared, &patterns(), 100, Instant::now()).unwrap();
        assert!(outcome.timed_out);
        assert_eq!(outcome.processed, 0);

        let storage = shared.lock().unwrap();
        assert_eq!(storage.get_content_due_for_processing(100).unwrap().len(), 1);
    }

    #[test]
    fn test_page_document_uses_latest_site_content() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let a = add_site(&mut storage, "example.ro");
        let b = add_site(&mut storage, "other.ro");
        storage
            .save_page_links(&ExtractedLinks {
                site_id: a,
                page_urls: vec!["example.ro/despre".to_string()],
                ..Default::default()
            })
            .unwrap();
        let page = storage.get_page_by_url("example.ro/despre").unwrap().unwrap();

        let parsed = parse_document(
            r#"<a href="contact">Contact</a><a href="http://other.ro">Other</a>"#,
            "example.ro",
            &patterns(),
        );

        // No site content yet: pages only
        let summary = process_page_document(&mut storage, &page, &parsed).unwrap();
        assert_eq!(summary, LinkWriteSummary { new_pages: 1, new_edges: 0 });

        let content_id = storage.record_site_fetch_success(a, "<html/>", Utc::now()).unwrap();
        let summary = process_page_document(&mut storage, &page, &parsed).unwrap();
        assert_eq!(summary, LinkWriteSummary { new_pages: 0, new_edges: 1 });

        let edges = storage.get_current_links(None).unwrap();
        assert_eq!(edges[0].to_site_id, b);
        assert_eq!(edges[0].content_id, content_id);
    }
}
