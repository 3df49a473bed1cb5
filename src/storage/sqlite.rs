//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::model::{ContentCategory, SiteKind};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    db_timestamp, ExtractedLinks, LinkWriteSummary, NewSite, PageRecord, SearchCursorRecord,
    SearchTermRecord, SiteContentRecord, SiteLinkRecord, SiteRecord, SiteUpdate, SubdomainRecord,
};
use crate::SitegraphError;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Params, Row};
use std::path::Path;

const SITE_COLUMNS: &str = "s.id, s.url, s.title, s.kind, s.content_category, \
     s.refresh_interval_hours, s.last_checked_on, s.last_processed_on, s.error, s.created_on";

const PAGE_COLUMNS: &str = "p.id, p.site_id, p.url, p.last_seen, p.error";

/// Sites that are never fetched nor processed
const CRAWLABLE_SITE: &str = "s.content_category != 'SOCIAL_MEDIA' \
     AND s.kind NOT IN ('REDIRECT', 'INDEXING_SERVICE')";

/// Edges whose content id is the highest of their source site
const CURRENT_LINKS_CTE: &str = "
    WITH current_links AS (
        SELECT l.from_site_id, l.to_site_id, l.content_id
        FROM site_links l
        JOIN (
            SELECT from_site_id, MAX(content_id) AS content_id
            FROM site_links
            GROUP BY from_site_id
        ) latest
          ON latest.from_site_id = l.from_site_id
         AND latest.content_id = l.content_id
    ),
    filtered_links AS (
        SELECT c.from_site_id, c.to_site_id, c.content_id
        FROM current_links c
        JOIN sites s ON s.id = c.from_site_id
        WHERE ?1 IS NULL OR (s.kind = ?1 AND s.content_category = ?2)
    )";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(SitegraphError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, SitegraphError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self, SitegraphError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn count<P: Params>(&self, sql: &str, params: P) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, params, |row| row.get(0))?;
        Ok(count as u64)
    }

    fn query_sites<P: Params>(&self, sql: &str, params: P) -> StorageResult<Vec<SiteRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let sites = stmt
            .query_map(params, site_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sites)
    }

    fn query_pages<P: Params>(&self, sql: &str, params: P) -> StorageResult<Vec<PageRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let pages = stmt
            .query_map(params, page_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pages)
    }
}

fn site_from_row(row: &Row<'_>) -> rusqlite::Result<SiteRecord> {
    Ok(SiteRecord {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        kind: SiteKind::from_db_string(&row.get::<_, String>(3)?).unwrap_or(SiteKind::Foreign),
        category: ContentCategory::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(ContentCategory::Uncategorized),
        refresh_interval_hours: row.get(5)?,
        last_checked_on: row.get(6)?,
        last_processed_on: row.get(7)?,
        error: row.get(8)?,
        created_on: row.get(9)?,
    })
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    Ok(PageRecord {
        id: row.get(0)?,
        site_id: row.get(1)?,
        url: row.get(2)?,
        last_seen: row.get(3)?,
        error: row.get(4)?,
    })
}

/// `?, ?, ?` with `count` placeholders
fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn filter_params(
    filter: Option<(SiteKind, ContentCategory)>,
) -> (Option<&'static str>, Option<&'static str>) {
    match filter {
        Some((kind, category)) => (Some(kind.to_db_string()), Some(category.to_db_string())),
        None => (None, None),
    }
}

/// Inserts unseen pages and edges to existing other sites
fn write_links(conn: &Connection, links: &ExtractedLinks) -> StorageResult<LinkWriteSummary> {
    let mut summary = LinkWriteSummary::default();

    let mut insert_page = conn.prepare("INSERT OR IGNORE INTO pages (site_id, url) VALUES (?1, ?2)")?;
    for url in &links.page_urls {
        summary.new_pages += insert_page.execute(params![links.site_id, url])?;
    }

    let Some(content_id) = links.content_id else {
        return Ok(summary);
    };

    let mut find_site = conn.prepare("SELECT id FROM sites WHERE url = ?1 ORDER BY id LIMIT 1")?;
    let mut insert_edge = conn.prepare(
        "INSERT OR IGNORE INTO site_links (from_site_id, to_site_id, content_id) VALUES (?1, ?2, ?3)",
    )?;

    for url in &links.site_urls {
        let target: Option<i64> = find_site
            .query_row(params![url], |row| row.get(0))
            .optional()?;

        if let Some(to_site_id) = target.filter(|id| *id != links.site_id) {
            summary.new_edges += insert_edge.execute(params![links.site_id, to_site_id, content_id])?;
        }
    }

    Ok(summary)
}

impl Storage for SqliteStorage {
    // ===== Sites =====

    fn insert_site(&mut self, site: &NewSite, now: DateTime<Utc>) -> StorageResult<i64> {
        if site.url.is_empty() {
            return Err(StorageError::ConstraintViolation(
                "site url cannot be empty".to_string(),
            ));
        }

        self.conn.execute(
            "INSERT INTO sites (url, title, kind, content_category, refresh_interval_hours, created_on)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                site.url,
                site.title,
                site.kind.to_db_string(),
                site.category.to_db_string(),
                site.refresh_interval_hours,
                db_timestamp(now)
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_site(&self, site_id: i64) -> StorageResult<SiteRecord> {
        let sql = format!("SELECT {SITE_COLUMNS} FROM sites s WHERE s.id = ?1");
        self.conn
            .query_row(&sql, params![site_id], site_from_row)
            .optional()?
            .ok_or(StorageError::SiteNotFound(site_id))
    }

    fn get_site_by_url(&self, url: &str) -> StorageResult<Option<SiteRecord>> {
        let sql = format!("SELECT {SITE_COLUMNS} FROM sites s WHERE s.url = ?1 ORDER BY s.id LIMIT 1");
        Ok(self
            .conn
            .query_row(&sql, params![url], site_from_row)
            .optional()?)
    }

    fn get_sites_by_urls(&self, urls: &[String]) -> StorageResult<Vec<SiteRecord>> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {SITE_COLUMNS} FROM sites s WHERE s.url IN ({}) ORDER BY s.id",
            placeholders(urls.len())
        );
        self.query_sites(&sql, params_from_iter(urls.iter()))
    }

    fn get_linked_sites(
        &self,
        filter: Option<(SiteKind, ContentCategory)>,
    ) -> StorageResult<Vec<SiteRecord>> {
        let (kind, category) = filter_params(filter);
        let sql = format!(
            "{CURRENT_LINKS_CTE}
            SELECT {SITE_COLUMNS} FROM sites s
            WHERE s.id IN (
                SELECT from_site_id FROM filtered_links
                UNION
                SELECT to_site_id FROM filtered_links
            )
            ORDER BY s.url, s.id"
        );
        self.query_sites(&sql, params![kind, category])
    }

    fn update_site(&mut self, site_id: i64, update: &SiteUpdate) -> StorageResult<()> {
        let tx = self.conn.transaction()?;

        let changed = tx.execute(
            "UPDATE sites SET
                url = COALESCE(?2, url),
                kind = COALESCE(?3, kind),
                content_category = COALESCE(?4, content_category),
                refresh_interval_hours = COALESCE(?5, refresh_interval_hours)
             WHERE id = ?1",
            params![
                site_id,
                update.url,
                update.kind.map(|k| k.to_db_string()),
                update.category.map(|c| c.to_db_string()),
                update.refresh_interval_hours
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::SiteNotFound(site_id));
        }

        // Pages outside the new URL belonged to the old host
        if let Some(url) = &update.url {
            let dropped = tx.execute(
                "DELETE FROM pages
                 WHERE site_id = ?1 AND substr(url, 1, length(?2) + 1) <> ?2 || '/'",
                params![site_id, url],
            )?;
            if dropped > 0 {
                tracing::info!("Dropped {} pages of site {} after its URL changed", dropped, site_id);
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn delete_site(&mut self, site_id: i64) -> StorageResult<()> {
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM pages WHERE site_id = ?1", params![site_id])?;
        tx.execute("DELETE FROM site_content WHERE site_id = ?1", params![site_id])?;
        tx.execute(
            "DELETE FROM site_links WHERE from_site_id = ?1 OR to_site_id = ?1",
            params![site_id],
        )?;
        tx.execute(
            "DELETE FROM subdomain_of WHERE parent_id = ?1 OR child_id = ?1",
            params![site_id],
        )?;
        let deleted = tx.execute("DELETE FROM sites WHERE id = ?1", params![site_id])?;

        if deleted == 0 {
            return Err(StorageError::SiteNotFound(site_id));
        }

        tx.commit()?;
        Ok(())
    }

    // ===== Work selection =====

    fn get_sites_due_for_fetch(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> StorageResult<Vec<SiteRecord>> {
        let sql = format!(
            "SELECT {SITE_COLUMNS} FROM sites s
             WHERE (s.last_checked_on IS NULL
                    OR datetime(s.last_checked_on, '+' || s.refresh_interval_hours || ' hours') < ?1)
               AND {CRAWLABLE_SITE}
             ORDER BY s.last_checked_on, s.id
             LIMIT ?2"
        );
        self.query_sites(&sql, params![db_timestamp(now), limit])
    }

    fn get_content_due_for_processing(&self, limit: u32) -> StorageResult<Vec<SiteContentRecord>> {
        let sql = format!(
            "SELECT c.content_id, c.site_id, s.url, c.body, c.time_fetched, c.time_processed
             FROM site_content c
             JOIN sites s ON s.id = c.site_id
             WHERE c.time_processed IS NULL
               AND {CRAWLABLE_SITE}
             ORDER BY c.time_fetched, c.content_id
             LIMIT ?1"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let content = stmt
            .query_map(params![limit], |row| {
                Ok(SiteContentRecord {
                    content_id: row.get(0)?,
                    site_id: row.get(1)?,
                    site_url: row.get(2)?,
                    body: row.get(3)?,
                    time_fetched: row.get(4)?,
                    time_processed: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(content)
    }

    fn get_pages_due_for_fetch(
        &self,
        now: DateTime<Utc>,
        freshness_minutes: u32,
        limit: u32,
    ) -> StorageResult<Vec<PageRecord>> {
        let sql = format!(
            "SELECT {PAGE_COLUMNS} FROM pages p
             JOIN sites s ON s.id = p.site_id
             WHERE (p.last_seen IS NULL
                    OR datetime(p.last_seen, '+' || ?2 || ' minutes') < ?1)
               AND {CRAWLABLE_SITE}
             ORDER BY p.last_seen, p.id
             LIMIT ?3"
        );
        self.query_pages(&sql, params![db_timestamp(now), freshness_minutes, limit])
    }

    // ===== Fetch results =====

    fn record_site_fetch_success(
        &mut self,
        site_id: i64,
        body: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<i64> {
        let now = db_timestamp(now);
        let tx = self.conn.transaction()?;

        let updated = tx.execute(
            "UPDATE sites SET last_checked_on = ?2, error = NULL WHERE id = ?1",
            params![site_id, now],
        )?;
        if updated == 0 {
            return Err(StorageError::SiteNotFound(site_id));
        }

        tx.execute(
            "INSERT INTO site_content (site_id, body, time_fetched) VALUES (?1, ?2, ?3)",
            params![site_id, body, now],
        )?;
        let content_id = tx.last_insert_rowid();

        tx.commit()?;
        Ok(content_id)
    }

    fn record_site_fetch_failure(
        &mut self,
        site_id: i64,
        error: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE sites SET last_checked_on = ?2, error = ?3 WHERE id = ?1",
            params![site_id, db_timestamp(now), error],
        )?;
        Ok(())
    }

    fn record_page_fetch_success(&mut self, page_id: i64, now: DateTime<Utc>) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE pages SET last_seen = ?2, error = NULL WHERE id = ?1",
            params![page_id, db_timestamp(now)],
        )?;
        Ok(())
    }

    fn record_page_fetch_failure(
        &mut self,
        page_id: i64,
        error: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE pages SET last_seen = ?2, error = ?3 WHERE id = ?1",
            params![page_id, db_timestamp(now), error],
        )?;
        Ok(())
    }

    // ===== Content processing =====

    fn complete_content_processing(
        &mut self,
        links: &ExtractedLinks,
        now: DateTime<Utc>,
    ) -> StorageResult<LinkWriteSummary> {
        let Some(content_id) = links.content_id else {
            return Err(StorageError::ConstraintViolation(
                "processed content needs a content id".to_string(),
            ));
        };
        let now = db_timestamp(now);
        let tx = self.conn.transaction()?;

        let summary = write_links(&tx, links)?;
        tx.execute(
            "UPDATE site_content SET time_processed = ?2 WHERE content_id = ?1",
            params![content_id, now],
        )?;
        tx.execute(
            "UPDATE sites SET last_processed_on = ?2 WHERE id = ?1",
            params![links.site_id, now],
        )?;

        tx.commit()?;
        Ok(summary)
    }

    fn save_page_links(&mut self, links: &ExtractedLinks) -> StorageResult<LinkWriteSummary> {
        let tx = self.conn.transaction()?;
        let summary = write_links(&tx, links)?;
        tx.commit()?;
        Ok(summary)
    }

    fn get_latest_content_id(&self, site_id: i64) -> StorageResult<Option<i64>> {
        let content_id: Option<i64> = self.conn.query_row(
            "SELECT MAX(content_id) FROM site_content WHERE site_id = ?1",
            params![site_id],
            |row| row.get(0),
        )?;
        Ok(content_id)
    }

    // ===== Duplicates and subdomains =====

    fn get_next_duplicate_url(&self) -> StorageResult<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT url FROM sites
                 GROUP BY url
                 HAVING COUNT(*) > 1
                 ORDER BY COUNT(*) DESC, url
                 LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn get_sites_with_url(&self, url: &str) -> StorageResult<Vec<SiteRecord>> {
        let sql = format!("SELECT {SITE_COLUMNS} FROM sites s WHERE s.url = ?1 ORDER BY s.id");
        self.query_sites(&sql, params![url])
    }

    fn merge_sites(&mut self, survivor_id: i64, duplicate_ids: &[i64]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;

        for &duplicate_id in duplicate_ids {
            if duplicate_id == survivor_id {
                continue;
            }

            // Survivor keeps its own values; only gaps are filled
            tx.execute(
                "UPDATE sites SET
                    title = COALESCE(title, (SELECT title FROM sites WHERE id = ?2)),
                    last_checked_on = COALESCE(last_checked_on, (SELECT last_checked_on FROM sites WHERE id = ?2)),
                    last_processed_on = COALESCE(last_processed_on, (SELECT last_processed_on FROM sites WHERE id = ?2))
                 WHERE id = ?1",
                params![survivor_id, duplicate_id],
            )?;

            tx.execute(
                "UPDATE pages SET site_id = ?1 WHERE site_id = ?2",
                params![survivor_id, duplicate_id],
            )?;
            tx.execute(
                "UPDATE site_content SET site_id = ?1 WHERE site_id = ?2",
                params![survivor_id, duplicate_id],
            )?;

            tx.execute(
                "UPDATE OR IGNORE site_links SET from_site_id = ?1 WHERE from_site_id = ?2",
                params![survivor_id, duplicate_id],
            )?;
            tx.execute(
                "UPDATE OR IGNORE site_links SET to_site_id = ?1 WHERE to_site_id = ?2",
                params![survivor_id, duplicate_id],
            )?;
            tx.execute(
                "DELETE FROM site_links WHERE from_site_id = ?1 OR to_site_id = ?1",
                params![duplicate_id],
            )?;

            tx.execute(
                "UPDATE OR IGNORE subdomain_of SET parent_id = ?1 WHERE parent_id = ?2",
                params![survivor_id, duplicate_id],
            )?;
            tx.execute(
                "UPDATE OR IGNORE subdomain_of SET child_id = ?1 WHERE child_id = ?2",
                params![survivor_id, duplicate_id],
            )?;
            tx.execute(
                "DELETE FROM subdomain_of WHERE parent_id = ?1 OR child_id = ?1",
                params![duplicate_id],
            )?;

            tx.execute("DELETE FROM sites WHERE id = ?1", params![duplicate_id])?;
        }

        tx.execute(
            "DELETE FROM site_links WHERE from_site_id = to_site_id",
            [],
        )?;
        tx.execute("DELETE FROM subdomain_of WHERE parent_id = child_id", [])?;

        tx.commit()?;
        Ok(())
    }

    fn get_next_subdomain_candidate(&self) -> StorageResult<Option<SiteRecord>> {
        let sql = format!(
            "SELECT {SITE_COLUMNS} FROM sites s
             WHERE s.error IS NULL
               AND s.url NOT LIKE '%.%.%'
               AND NOT EXISTS (SELECT 1 FROM subdomain_of so WHERE so.parent_id = s.id)
               AND NOT EXISTS (SELECT 1 FROM subdomain_of so WHERE so.child_id = s.id)
               AND EXISTS (
                   SELECT 1 FROM sites c
                   WHERE c.id != s.id
                     AND c.error IS NULL
                     AND c.url LIKE '%.%.%'
                     AND c.url LIKE '%.' || s.url || '%'
                     AND NOT EXISTS (SELECT 1 FROM subdomain_of so WHERE so.child_id = c.id)
               )
             ORDER BY s.id
             LIMIT 1"
        );
        Ok(self.conn.query_row(&sql, [], site_from_row).optional()?)
    }

    fn get_subdomains_for_url(&self, url: &str) -> StorageResult<Vec<SiteRecord>> {
        let sql = format!(
            "SELECT {SITE_COLUMNS} FROM sites s
             WHERE s.url LIKE '%.' || ?1 || '%'
               AND s.url LIKE '%.%.%'
               AND s.url != ?1
               AND s.error IS NULL
               AND NOT EXISTS (SELECT 1 FROM subdomain_of so WHERE so.child_id = s.id)
             ORDER BY s.id"
        );
        self.query_sites(&sql, params![url])
    }

    fn add_subdomains(&mut self, parent_id: i64, child_ids: &[i64]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt =
                tx.prepare("INSERT OR IGNORE INTO subdomain_of (child_id, parent_id) VALUES (?1, ?2)")?;
            for &child_id in child_ids.iter().filter(|id| **id != parent_id) {
                inserted += stmt.execute(params![child_id, parent_id])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn get_subdomain_edges(&self) -> StorageResult<Vec<SubdomainRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT parent_id, child_id FROM subdomain_of ORDER BY parent_id, child_id")?;
        let edges = stmt
            .query_map([], |row| {
                Ok(SubdomainRecord {
                    parent_id: row.get(0)?,
                    child_id: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(edges)
    }

    // ===== Pages =====

    fn get_page_by_url(&self, url: &str) -> StorageResult<Option<PageRecord>> {
        let sql = format!("SELECT {PAGE_COLUMNS} FROM pages p WHERE p.url = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![url], page_from_row)
            .optional()?)
    }

    fn get_pages_by_urls(&self, urls: &[String]) -> StorageResult<Vec<PageRecord>> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {PAGE_COLUMNS} FROM pages p WHERE p.url IN ({}) ORDER BY p.id",
            placeholders(urls.len())
        );
        self.query_pages(&sql, params_from_iter(urls.iter()))
    }

    fn get_pages_for_site(&self, site_id: i64) -> StorageResult<Vec<PageRecord>> {
        let sql = format!("SELECT {PAGE_COLUMNS} FROM pages p WHERE p.site_id = ?1 ORDER BY p.url");
        self.query_pages(&sql, params![site_id])
    }

    fn delete_pages_for_site(&mut self, site_id: i64) -> StorageResult<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM pages WHERE site_id = ?1", params![site_id])?)
    }

    // ===== Link graph =====

    fn get_current_links(
        &self,
        filter: Option<(SiteKind, ContentCategory)>,
    ) -> StorageResult<Vec<SiteLinkRecord>> {
        let (kind, category) = filter_params(filter);
        let sql = format!(
            "{CURRENT_LINKS_CTE}
            SELECT from_site_id, to_site_id, content_id FROM filtered_links
            ORDER BY from_site_id, to_site_id"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let links = stmt
            .query_map(params![kind, category], |row| {
                Ok(SiteLinkRecord {
                    from_site_id: row.get(0)?,
                    to_site_id: row.get(1)?,
                    content_id: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(links)
    }

    // ===== Counts =====

    fn count_sites(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM sites", [])
    }

    fn count_checked_sites(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM sites WHERE last_checked_on IS NOT NULL", [])
    }

    fn count_processed_sites(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM sites WHERE last_processed_on IS NOT NULL", [])
    }

    fn count_errored_sites(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM sites WHERE error IS NOT NULL", [])
    }

    fn count_sites_by_kind(&self, kind: SiteKind) -> StorageResult<u64> {
        self.count(
            "SELECT COUNT(*) FROM sites WHERE kind = ?1",
            params![kind.to_db_string()],
        )
    }

    fn count_sites_by_category(&self, category: ContentCategory) -> StorageResult<u64> {
        self.count(
            "SELECT COUNT(*) FROM sites WHERE content_category = ?1",
            params![category.to_db_string()],
        )
    }

    fn count_top_domains(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM sites WHERE url NOT LIKE '%.%.%'", [])
    }

    fn count_subdomains(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM subdomain_of", [])
    }

    fn count_duplicate_urls(&self) -> StorageResult<u64> {
        self.count(
            "SELECT COUNT(*) FROM (SELECT url FROM sites GROUP BY url HAVING COUNT(*) > 1)",
            [],
        )
    }

    fn count_pages(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM pages", [])
    }

    fn count_current_links(&self) -> StorageResult<u64> {
        let sql = format!("{CURRENT_LINKS_CTE} SELECT COUNT(*) FROM filtered_links");
        self.count(&sql, params![None::<&str>, None::<&str>])
    }

    // ===== Search discovery =====

    fn insert_search_term(&mut self, term: &str, now: DateTime<Utc>) -> StorageResult<i64> {
        let term = term.trim();
        if term.is_empty() {
            return Err(StorageError::ConstraintViolation(
                "search term cannot be empty".to_string(),
            ));
        }

        self.conn.execute(
            "INSERT OR IGNORE INTO search_terms (term, resolved, created_on) VALUES (?1, 0, ?2)",
            params![term, db_timestamp(now)],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM search_terms WHERE term = ?1",
            params![term],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn resolve_search_term(&mut self, term_id: i64) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE search_terms SET resolved = 1 WHERE id = ?1",
            params![term_id],
        )?;
        if changed == 0 {
            return Err(StorageError::SearchTermNotFound(term_id));
        }
        Ok(())
    }

    fn get_in_progress_search(
        &self,
    ) -> StorageResult<Option<(SearchTermRecord, SearchCursorRecord)>> {
        Ok(self
            .conn
            .query_row(
                "SELECT t.id, t.term, t.resolved, t.created_on,
                        c.id, c.start_index, c.next_start_index, c.searched_on
                 FROM search_cursors c
                 JOIN search_terms t ON t.id = c.term_id
                 WHERE t.resolved = 0
                 ORDER BY c.id DESC
                 LIMIT 1",
                [],
                |row| {
                    let term = SearchTermRecord {
                        id: row.get(0)?,
                        term: row.get(1)?,
                        resolved: row.get(2)?,
                        created_on: row.get(3)?,
                    };
                    let cursor = SearchCursorRecord {
                        id: row.get(4)?,
                        term_id: term.id,
                        start_index: row.get(5)?,
                        next_start_index: row.get(6)?,
                        searched_on: row.get(7)?,
                    };
                    Ok((term, cursor))
                },
            )
            .optional()?)
    }

    fn get_unused_search_term(&self) -> StorageResult<Option<SearchTermRecord>> {
        Ok(self
            .conn
            .query_row(
                "SELECT t.id, t.term, t.resolved, t.created_on
                 FROM search_terms t
                 WHERE t.resolved = 0
                   AND NOT EXISTS (SELECT 1 FROM search_cursors c WHERE c.term_id = t.id)
                 ORDER BY t.id
                 LIMIT 1",
                [],
                |row| {
                    Ok(SearchTermRecord {
                        id: row.get(0)?,
                        term: row.get(1)?,
                        resolved: row.get(2)?,
                        created_on: row.get(3)?,
                    })
                },
            )
            .optional()?)
    }

    fn insert_search_cursor(
        &mut self,
        term_id: i64,
        start_index: u32,
        next_start_index: u32,
        now: DateTime<Utc>,
    ) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO search_cursors (term_id, start_index, next_start_index, searched_on)
             VALUES (?1, ?2, ?3, ?4)",
            params![term_id, start_index, next_start_index, db_timestamp(now)],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    // ===== Scheduler locks =====

    fn try_acquire_lock(
        &mut self,
        name: &str,
        owner: &str,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let changed = self.conn.execute(
            "INSERT INTO scheduler_locks (name, locked_until, locked_at, locked_by)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(name) DO UPDATE SET
                locked_until = excluded.locked_until,
                locked_at = excluded.locked_at,
                locked_by = excluded.locked_by
             WHERE scheduler_locks.locked_until <= excluded.locked_at",
            params![name, db_timestamp(until), db_timestamp(now), owner],
        )?;
        Ok(changed == 1)
    }

    fn release_lock(&mut self, name: &str, owner: &str, now: DateTime<Utc>) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE scheduler_locks SET locked_until = ?3 WHERE name = ?1 AND locked_by = ?2",
            params![name, owner, db_timestamp(now)],
        )?;
        Ok(())
    }
}
