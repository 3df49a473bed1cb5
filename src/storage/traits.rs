//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::model::{ContentCategory, SiteKind};
use crate::storage::{
    ExtractedLinks, LinkWriteSummary, NewSite, PageRecord, SearchCursorRecord, SearchTermRecord,
    SiteContentRecord, SiteLinkRecord, SiteRecord, SiteUpdate, SubdomainRecord,
};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Site not found: {0}")]
    SiteNotFound(i64),

    #[error("Search term not found: {0}")]
    SearchTermNotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait is the whole query surface the crawler relies on. Work is never
/// held in memory between ticks: every batch is chosen by one of the `*_due_*`
/// queries and claimed implicitly by the timestamp update that follows a fetch.
/// Methods that take `now` never read the clock themselves.
pub trait Storage {
    // ===== Sites =====

    /// Inserts a site and returns its id
    fn insert_site(&mut self, site: &NewSite, now: DateTime<Utc>) -> StorageResult<i64>;

    /// Gets a site by ID
    fn get_site(&self, site_id: i64) -> StorageResult<SiteRecord>;

    /// Gets the lowest-id site with the given canonical URL
    fn get_site_by_url(&self, url: &str) -> StorageResult<Option<SiteRecord>>;

    /// Gets every site whose URL is in `urls`, ordered by id
    fn get_sites_by_urls(&self, urls: &[String]) -> StorageResult<Vec<SiteRecord>>;

    /// Gets the sites taking part in the current link graph
    ///
    /// With a filter, only edges whose source site has the given kind and
    /// category are considered; both endpoints of those edges are returned.
    fn get_linked_sites(
        &self,
        filter: Option<(SiteKind, ContentCategory)>,
    ) -> StorageResult<Vec<SiteRecord>>;

    /// Applies an administrative update
    ///
    /// A new URL also drops the site's pages that do not live under it.
    fn update_site(&mut self, site_id: i64, update: &SiteUpdate) -> StorageResult<()>;

    /// Deletes a site with its pages, content, edges and subdomain rows
    fn delete_site(&mut self, site_id: i64) -> StorageResult<()>;

    // ===== Work selection =====

    /// Sites due for fetching, never-checked first, then oldest-checked
    ///
    /// Social media sites, redirects and indexing services are never due. A
    /// site's recorded error does not exclude it.
    fn get_sites_due_for_fetch(&self, now: DateTime<Utc>, limit: u32)
        -> StorageResult<Vec<SiteRecord>>;

    /// Fetched site content not yet processed, oldest fetch first
    fn get_content_due_for_processing(&self, limit: u32) -> StorageResult<Vec<SiteContentRecord>>;

    /// Pages never seen or last seen before the freshness window
    fn get_pages_due_for_fetch(
        &self,
        now: DateTime<Utc>,
        freshness_minutes: u32,
        limit: u32,
    ) -> StorageResult<Vec<PageRecord>>;

    // ===== Fetch results =====

    /// Stores a fetched site document and returns its content id
    ///
    /// Also sets the site's last-checked timestamp and clears its error.
    fn record_site_fetch_success(
        &mut self,
        site_id: i64,
        body: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<i64>;

    /// Records a failed site fetch and the attempt time
    fn record_site_fetch_failure(
        &mut self,
        site_id: i64,
        error: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<()>;

    fn record_page_fetch_success(&mut self, page_id: i64, now: DateTime<Utc>) -> StorageResult<()>;

    fn record_page_fetch_failure(
        &mut self,
        page_id: i64,
        error: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<()>;

    // ===== Content processing =====

    /// Writes a processed site document's links and marks the content processed
    ///
    /// Runs in one transaction; `links.content_id` names the content row.
    fn complete_content_processing(
        &mut self,
        links: &ExtractedLinks,
        now: DateTime<Utc>,
    ) -> StorageResult<LinkWriteSummary>;

    /// Writes a page document's links in one transaction
    fn save_page_links(&mut self, links: &ExtractedLinks) -> StorageResult<LinkWriteSummary>;

    /// The most recent content id of a site, if it was ever fetched
    fn get_latest_content_id(&self, site_id: i64) -> StorageResult<Option<i64>>;

    // ===== Duplicates and subdomains =====

    /// The URL shared by the most sites, if any URL is shared
    fn get_next_duplicate_url(&self) -> StorageResult<Option<String>>;

    /// Every site with exactly this URL, ordered by id
    fn get_sites_with_url(&self, url: &str) -> StorageResult<Vec<SiteRecord>>;

    /// Merges the duplicates into the survivor and deletes them, atomically
    fn merge_sites(&mut self, survivor_id: i64, duplicate_ids: &[i64]) -> StorageResult<()>;

    /// A top-level site with unlinked subdomain candidates, if any
    fn get_next_subdomain_candidate(&self) -> StorageResult<Option<SiteRecord>>;

    /// Error-free, unparented sites whose URL contains `.{url}`
    fn get_subdomains_for_url(&self, url: &str) -> StorageResult<Vec<SiteRecord>>;

    /// Records parent/child edges atomically and returns how many were new
    fn add_subdomains(&mut self, parent_id: i64, child_ids: &[i64]) -> StorageResult<usize>;

    /// Every edge of the subdomain forest, ordered by parent then child
    fn get_subdomain_edges(&self) -> StorageResult<Vec<SubdomainRecord>>;

    // ===== Pages =====

    fn get_page_by_url(&self, url: &str) -> StorageResult<Option<PageRecord>>;

    fn get_pages_by_urls(&self, urls: &[String]) -> StorageResult<Vec<PageRecord>>;

    fn get_pages_for_site(&self, site_id: i64) -> StorageResult<Vec<PageRecord>>;

    /// Deletes every page of a site and returns how many were removed
    fn delete_pages_for_site(&mut self, site_id: i64) -> StorageResult<usize>;

    // ===== Link graph =====

    /// Current edges: for each source, only those with its highest content id
    fn get_current_links(
        &self,
        filter: Option<(SiteKind, ContentCategory)>,
    ) -> StorageResult<Vec<SiteLinkRecord>>;

    // ===== Counts =====

    fn count_sites(&self) -> StorageResult<u64>;

    fn count_checked_sites(&self) -> StorageResult<u64>;

    fn count_processed_sites(&self) -> StorageResult<u64>;

    fn count_errored_sites(&self) -> StorageResult<u64>;

    fn count_sites_by_kind(&self, kind: SiteKind) -> StorageResult<u64>;

    fn count_sites_by_category(&self, category: ContentCategory) -> StorageResult<u64>;

    /// Sites whose URL has fewer than two dots
    fn count_top_domains(&self) -> StorageResult<u64>;

    fn count_subdomains(&self) -> StorageResult<u64>;

    /// Number of URLs shared by more than one site
    fn count_duplicate_urls(&self) -> StorageResult<u64>;

    fn count_pages(&self) -> StorageResult<u64>;

    fn count_current_links(&self) -> StorageResult<u64>;

    // ===== Search discovery =====

    /// Adds a search term, or returns the id of an identical existing one
    fn insert_search_term(&mut self, term: &str, now: DateTime<Utc>) -> StorageResult<i64>;

    /// Releases a term so discovery moves on to an unused one
    fn resolve_search_term(&mut self, term_id: i64) -> StorageResult<()>;

    /// The unresolved term of the most recent cursor row, with that row
    fn get_in_progress_search(
        &self,
    ) -> StorageResult<Option<(SearchTermRecord, SearchCursorRecord)>>;

    /// The oldest unresolved term that was never searched
    fn get_unused_search_term(&self) -> StorageResult<Option<SearchTermRecord>>;

    fn insert_search_cursor(
        &mut self,
        term_id: i64,
        start_index: u32,
        next_start_index: u32,
        now: DateTime<Utc>,
    ) -> StorageResult<i64>;

    // ===== Scheduler locks =====

    /// Takes the named lock unless another holder's lease is still running
    fn try_acquire_lock(
        &mut self,
        name: &str,
        owner: &str,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> StorageResult<bool>;

    /// Ends the owner's lease on the named lock
    fn release_lock(&mut self, name: &str, owner: &str, now: DateTime<Utc>) -> StorageResult<()>;
}
