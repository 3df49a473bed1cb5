//! Search cursor state machine

use crate::discovery::{DiscoveryError, SearchClient, SearchPage};
use crate::model::SiteKind;
use crate::storage::{lock_storage, NewSite, SearchTermRecord, SharedStorage, Storage};
use crate::url::{classify_site, normalize};
use chrono::Utc;
use std::collections::HashSet;
use std::fmt;

/// Results are requested in pages of this many items
const PAGE_SIZE: u32 = 10;

/// What one discovery step did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    /// No unresolved search term exists
    NoTerm,

    /// The in-progress term has no results left; it must be resolved to move on
    Exhausted { term: String },

    /// One page of results was consumed
    Searched {
        term: String,
        created: usize,
        next_start_index: u32,
    },
}

impl DiscoveryOutcome {
    /// Number of sites created by this step
    pub fn created(&self) -> usize {
        match self {
            Self::Searched { created, .. } => *created,
            _ => 0,
        }
    }
}

impl fmt::Display for DiscoveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTerm => write!(f, "no search term available"),
            Self::Exhausted { term } => write!(f, "results exhausted for '{}'", term),
            Self::Searched {
                term,
                created,
                next_start_index,
            } => write!(
                f,
                "'{}': {} new sites, next start index {}",
                term, created, next_start_index
            ),
        }
    }
}

/// Consumes one page of search results per step
pub struct SearchDiscovery {
    max_start_index: u32,
    refresh_interval_hours: u32,
}

impl SearchDiscovery {
    pub fn new(max_start_index: u32, refresh_interval_hours: u32) -> Self {
        Self {
            max_start_index,
            refresh_interval_hours,
        }
    }

    /// Runs one discovery step
    ///
    /// The in-progress term is resumed from its stored cursor; without one, an
    /// unused term starts at index 1. A term whose cursor reached the maximum
    /// start index is reported exhausted without calling the API.
    pub async fn run(
        &self,
        storage: &SharedStorage,
        client: &dyn SearchClient,
    ) -> Result<DiscoveryOutcome, DiscoveryError> {
        let Some((term, start_index)) = self.select_term(storage)? else {
            tracing::info!("No search term to run");
            return Ok(DiscoveryOutcome::NoTerm);
        };

        if start_index >= self.max_start_index {
            tracing::info!("Search results exhausted for '{}'", term.term);
            return Ok(DiscoveryOutcome::Exhausted { term: term.term });
        }

        let page = client.search(&term.term, start_index).await?;
        let served_index = page.start_index.unwrap_or(start_index);
        let next_start_index = self.next_start_index(&page, served_index);
        let created = self.record_results(storage, &term, &page, served_index, next_start_index)?;

        let outcome = DiscoveryOutcome::Searched {
            term: term.term,
            created,
            next_start_index,
        };
        tracing::info!("Search discovery: {}", outcome);
        Ok(outcome)
    }

    /// The term to search and the index to resume from
    fn select_term(
        &self,
        storage: &SharedStorage,
    ) -> Result<Option<(SearchTermRecord, u32)>, DiscoveryError> {
        let storage = lock_storage(storage)?;

        if let Some((term, cursor)) = storage.get_in_progress_search()? {
            return Ok(Some((term, cursor.next_start_index)));
        }

        Ok(storage.get_unused_search_term()?.map(|term| (term, 1)))
    }

    /// Never past the maximum start index, whatever the API echoed back
    fn next_start_index(&self, page: &SearchPage, served_index: u32) -> u32 {
        if page.items.is_empty() {
            self.max_start_index
        } else {
            served_index
                .saturating_add(PAGE_SIZE)
                .min(self.max_start_index)
        }
    }

    /// Creates sites for unseen display links and appends the cursor row
    fn record_results(
        &self,
        storage: &SharedStorage,
        term: &SearchTermRecord,
        page: &SearchPage,
        start_index: u32,
        next_start_index: u32,
    ) -> Result<usize, DiscoveryError> {
        let now = Utc::now();
        let mut storage = lock_storage(storage)?;

        let mut seen = HashSet::new();
        let found: Vec<(String, &str)> = page
            .items
            .iter()
            .map(|item| (normalize(&item.display_link), item.title.trim()))
            .filter(|(url, _)| !url.is_empty() && seen.insert(url.clone()))
            .collect();

        let urls: Vec<String> = found.iter().map(|(url, _)| url.clone()).collect();
        let existing: HashSet<String> = storage
            .get_sites_by_urls(&urls)?
            .into_iter()
            .map(|site| site.url)
            .collect();

        let mut created = 0;
        for (url, title) in found {
            if existing.contains(&url) {
                continue;
            }

            let (kind, category) = classify_site(&url);
            let site = NewSite {
                url,
                title: (!title.is_empty()).then(|| title.to_string()),
                kind,
                category,
                refresh_interval_hours: self.refresh_interval_hours,
            };
            let id = storage.insert_site(&site, now)?;
            if kind == SiteKind::IndexingService {
                tracing::debug!("Discovered indexing service {} ({})", site.url, id);
            } else {
                tracing::debug!("Discovered site {} ({})", site.url, id);
            }
            created += 1;
        }

        storage.insert_search_cursor(term.id, start_index, next_start_index, now)?;
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::SearchItem;
    use crate::model::ContentCategory;
    use crate::storage::{into_shared, SqliteStorage};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Returns canned pages and remembers every call
    struct MockClient {
        page: SearchPage,
        calls: AtomicUsize,
        requested: Mutex<Vec<(String, u32)>>,
    }

    impl MockClient {
        fn new(page: SearchPage) -> Self {
            Self {
                page,
                calls: AtomicUsize::new(0),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SearchClient for MockClient {
        async fn search(&self, term: &str, start_index: u32) -> Result<SearchPage, DiscoveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested
                .lock()
                .unwrap()
                .push((term.to_string(), start_index));
            let mut page = self.page.clone();
            page.start_index = page.start_index.or(Some(start_index));
            Ok(page)
        }
    }

    fn item(title: &str, link: &str) -> SearchItem {
        SearchItem {
            title: title.to_string(),
            display_link: link.to_string(),
        }
    }

    fn engine() -> SearchDiscovery {
        SearchDiscovery::new(101, 24)
    }

    fn storage_with_term(term: &str) -> (SharedStorage, i64) {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let id = storage.insert_search_term(term, Utc::now()).unwrap();
        (into_shared(storage), id)
    }

    #[tokio::test]
    async fn test_no_term() {
        let storage = into_shared(SqliteStorage::open_in_memory().unwrap());
        let client = MockClient::new(SearchPage::default());

        let outcome = engine().run(&storage, &client).await.unwrap();
        assert_eq!(outcome, DiscoveryOutcome::NoTerm);
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_unused_term_starts_at_one() {
        let (storage, _) = storage_with_term("stiri locale");
        let client = MockClient::new(SearchPage {
            items: vec![
                item("Stiri", "www.stiri.ro"),
                item("Stiri again", "stiri.ro"),
                item("Facebook", "www.facebook.com"),
            ],
            start_index: None,
        });

        let outcome = engine().run(&storage, &client).await.unwrap();
        assert_eq!(
            outcome,
            DiscoveryOutcome::Searched {
                term: "stiri locale".to_string(),
                created: 2,
                next_start_index: 11,
            }
        );
        assert_eq!(
            client.requested.lock().unwrap().as_slice(),
            &[("stiri locale".to_string(), 1)]
        );

        let storage = storage.lock().unwrap();
        let stiri = storage.get_site_by_url("stiri.ro").unwrap().unwrap();
        assert_eq!(stiri.title.as_deref(), Some("Stiri"));
        assert_eq!(stiri.kind, SiteKind::Domestic);
        assert_eq!(stiri.refresh_interval_hours, 24);

        let facebook = storage.get_site_by_url("facebook.com").unwrap().unwrap();
        assert_eq!(facebook.category, ContentCategory::SocialMedia);
    }

    #[tokio::test]
    async fn test_cursor_reaches_max_then_exhausted() {
        let (storage, term_id) = storage_with_term("presa");
        storage
            .lock()
            .unwrap()
            .insert_search_cursor(term_id, 81, 91, Utc::now())
            .unwrap();
        let client = MockClient::new(SearchPage {
            items: vec![item("Ziar", "ziar.ro")],
            start_index: None,
        });

        let outcome = engine().run(&storage, &client).await.unwrap();
        assert_eq!(
            outcome,
            DiscoveryOutcome::Searched {
                term: "presa".to_string(),
                created: 1,
                next_start_index: 101,
            }
        );
        assert_eq!(client.requested.lock().unwrap()[0].1, 91);

        for _ in 0..2 {
            let outcome = engine().run(&storage, &client).await.unwrap();
            assert_eq!(
                outcome,
                DiscoveryOutcome::Exhausted {
                    term: "presa".to_string()
                }
            );
        }
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_page_exhausts_term() {
        let (storage, _) = storage_with_term("nimic");
        let client = MockClient::new(SearchPage::default());

        let outcome = engine().run(&storage, &client).await.unwrap();
        assert_eq!(outcome.created(), 0);
        assert!(matches!(
            outcome,
            DiscoveryOutcome::Searched {
                next_start_index: 101,
                ..
            }
        ));

        let outcome = engine().run(&storage, &client).await.unwrap();
        assert!(matches!(outcome, DiscoveryOutcome::Exhausted { .. }));
    }

    #[tokio::test]
    async fn test_resolved_term_moves_on() {
        let (storage, first) = storage_with_term("presa");
        {
            let mut guard = storage.lock().unwrap();
            guard.insert_search_term("radio", Utc::now()).unwrap();
            guard.insert_search_cursor(first, 91, 101, Utc::now()).unwrap();
            guard.resolve_search_term(first).unwrap();
        }
        let client = MockClient::new(SearchPage {
            items: vec![item("Radio", "radio.ro")],
            start_index: Some(1),
        });

        let outcome = engine().run(&storage, &client).await.unwrap();
        assert_eq!(
            outcome,
            DiscoveryOutcome::Searched {
                term: "radio".to_string(),
                created: 1,
                next_start_index: 11,
            }
        );
    }

    #[tokio::test]
    async fn test_cursor_follows_echoed_start_index() {
        let (storage, term_id) = storage_with_term("presa");
        let client = MockClient::new(SearchPage {
            items: vec![item("Ziar", "ziar.ro")],
            start_index: Some(21),
        });

        let outcome = engine().run(&storage, &client).await.unwrap();
        assert!(matches!(
            outcome,
            DiscoveryOutcome::Searched {
                next_start_index: 31,
                ..
            }
        ));

        let (term, cursor) = storage.lock().unwrap().get_in_progress_search().unwrap().unwrap();
        assert_eq!(term.id, term_id);
        assert_eq!((cursor.start_index, cursor.next_start_index), (21, 31));
    }

    #[tokio::test]
    async fn test_huge_echoed_start_index_is_capped() {
        let (storage, _) = storage_with_term("presa");
        let client = MockClient::new(SearchPage {
            items: vec![item("Ziar", "ziar.ro")],
            start_index: Some(u32::MAX - 3),
        });

        let outcome = engine().run(&storage, &client).await.unwrap();
        assert!(matches!(
            outcome,
            DiscoveryOutcome::Searched {
                next_start_index: 101,
                ..
            }
        ));

        let outcome = engine().run(&storage, &client).await.unwrap();
        assert!(matches!(outcome, DiscoveryOutcome::Exhausted { .. }));
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_existing_sites_are_not_duplicated() {
        let (storage, _) = storage_with_term("presa");
        let client = MockClient::new(SearchPage {
            items: vec![item("Ziar", "ziar.ro")],
            start_index: None,
        });

        engine().run(&storage, &client).await.unwrap();
        let outcome = engine().run(&storage, &client).await.unwrap();
        assert_eq!(outcome.created(), 0);
        assert_eq!(storage.lock().unwrap().count_sites().unwrap(), 1);
    }
}
