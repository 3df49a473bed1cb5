//! Storage module for persisting crawl state
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Work selection queries for sites, pages and fetched content
//! - Site-to-site link graph and subdomain forest persistence
//! - Search discovery cursors and scheduler locks

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::model::{ContentCategory, SiteKind};
use crate::SitegraphError;
use chrono::{DateTime, Utc};

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Format of every timestamp column; SQLite's `datetime()` produces the same shape
pub const DB_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(SitegraphError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, SitegraphError> {
    SqliteStorage::new(path)
}

/// Storage shared between tasks; never held across an `.await`
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

pub fn into_shared(storage: SqliteStorage) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// Locks shared storage, reporting a poisoned mutex as a storage error
pub fn lock_storage(storage: &SharedStorage) -> StorageResult<MutexGuard<'_, SqliteStorage>> {
    storage
        .lock()
        .map_err(|_| StorageError::Database("storage mutex poisoned".to_string()))
}

/// Formats a timestamp for storage
pub fn db_timestamp(time: DateTime<Utc>) -> String {
    time.format(DB_TIMESTAMP_FORMAT).to_string()
}

/// Represents a site in the database
#[derive(Debug, Clone, PartialEq)]
pub struct SiteRecord {
    pub id: i64,
    pub url: String,
    pub title: Option<String>,
    pub kind: SiteKind,
    pub category: ContentCategory,
    pub refresh_interval_hours: u32,
    pub last_checked_on: Option<String>,
    pub last_processed_on: Option<String>,
    pub error: Option<String>,
    pub created_on: String,
}

/// A site about to be inserted
#[derive(Debug, Clone)]
pub struct NewSite {
    pub url: String,
    pub title: Option<String>,
    pub kind: SiteKind,
    pub category: ContentCategory,
    pub refresh_interval_hours: u32,
}

/// Administrative changes to a site; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct SiteUpdate {
    pub url: Option<String>,
    pub kind: Option<SiteKind>,
    pub category: Option<ContentCategory>,
    pub refresh_interval_hours: Option<u32>,
}

impl SiteUpdate {
    pub fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.kind.is_none()
            && self.category.is_none()
            && self.refresh_interval_hours.is_none()
    }
}

/// Represents a page in the database
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    pub id: i64,
    pub site_id: i64,
    pub url: String,
    pub last_seen: Option<String>,
    pub error: Option<String>,
}

/// One successful fetch of a site's front document
#[derive(Debug, Clone)]
pub struct SiteContentRecord {
    pub content_id: i64,
    pub site_id: i64,
    pub site_url: String,
    pub body: String,
    pub time_fetched: String,
    pub time_processed: Option<String>,
}

/// A directed site-to-site edge, tagged with the content that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteLinkRecord {
    pub from_site_id: i64,
    pub to_site_id: i64,
    pub content_id: i64,
}

/// A parent/child edge of the subdomain forest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubdomainRecord {
    pub parent_id: i64,
    pub child_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchTermRecord {
    pub id: i64,
    pub term: String,
    pub resolved: bool,
    pub created_on: String,
}

/// One page of results consumed for a search term
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCursorRecord {
    pub id: i64,
    pub term_id: i64,
    pub start_index: u32,
    pub next_start_index: u32,
    pub searched_on: String,
}

/// Links extracted from one document, ready to be written
#[derive(Debug, Clone, Default)]
pub struct ExtractedLinks {
    /// Site owning the document
    pub site_id: i64,

    /// Tag for the produced edges; no edges are written without one
    pub content_id: Option<i64>,

    /// Canonical URLs of internal pages of the owning site
    pub page_urls: Vec<String>,

    /// Canonical site keys of other sites the document links to
    pub site_urls: Vec<String>,
}

/// What a link write actually changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkWriteSummary {
    pub new_pages: usize,
    pub new_edges: usize,
}
