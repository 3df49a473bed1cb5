//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the sitegraph database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Crawled sites; url is the canonical URL, duplicates may exist until merged
CREATE TABLE IF NOT EXISTS sites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    title TEXT,
    kind TEXT NOT NULL,
    content_category TEXT NOT NULL,
    refresh_interval_hours INTEGER NOT NULL,
    last_checked_on TEXT,
    last_processed_on TEXT,
    error TEXT,
    created_on TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sites_url ON sites(url);
CREATE INDEX IF NOT EXISTS idx_sites_last_checked ON sites(last_checked_on);

-- Pages within a site, fetched independently
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL REFERENCES sites(id),
    url TEXT NOT NULL UNIQUE,
    last_seen TEXT,
    error TEXT
);

CREATE INDEX IF NOT EXISTS idx_pages_site ON pages(site_id);
CREATE INDEX IF NOT EXISTS idx_pages_last_seen ON pages(last_seen);

-- One row per successful site fetch; content_id tags the edges it produces
CREATE TABLE IF NOT EXISTS site_content (
    content_id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL REFERENCES sites(id),
    body TEXT NOT NULL,
    time_fetched TEXT NOT NULL,
    time_processed TEXT
);

CREATE INDEX IF NOT EXISTS idx_site_content_site ON site_content(site_id);
CREATE INDEX IF NOT EXISTS idx_site_content_unprocessed ON site_content(time_processed, time_fetched);

-- Site-to-site edges; only the highest content_id per source is current
CREATE TABLE IF NOT EXISTS site_links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    from_site_id INTEGER NOT NULL REFERENCES sites(id),
    to_site_id INTEGER NOT NULL REFERENCES sites(id),
    content_id INTEGER NOT NULL,
    UNIQUE(from_site_id, to_site_id, content_id)
);

CREATE INDEX IF NOT EXISTS idx_site_links_from ON site_links(from_site_id, content_id);
CREATE INDEX IF NOT EXISTS idx_site_links_to ON site_links(to_site_id);

-- Inferred subdomain forest; a site has at most one parent
CREATE TABLE IF NOT EXISTS subdomain_of (
    child_id INTEGER PRIMARY KEY REFERENCES sites(id),
    parent_id INTEGER NOT NULL REFERENCES sites(id)
);

CREATE INDEX IF NOT EXISTS idx_subdomain_parent ON subdomain_of(parent_id);

-- Search discovery
CREATE TABLE IF NOT EXISTS search_terms (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    term TEXT NOT NULL UNIQUE,
    resolved INTEGER NOT NULL DEFAULT 0,
    created_on TEXT NOT NULL
);

-- Append-only; the latest row per term holds its position
CREATE TABLE IF NOT EXISTS search_cursors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    term_id INTEGER NOT NULL REFERENCES search_terms(id),
    start_index INTEGER NOT NULL,
    next_start_index INTEGER NOT NULL,
    searched_on TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_search_cursors_term ON search_cursors(term_id);

-- Named leases shared by every instance using this database
CREATE TABLE IF NOT EXISTS scheduler_locks (
    name TEXT PRIMARY KEY,
    locked_until TEXT NOT NULL,
    locked_at TEXT NOT NULL,
    locked_by TEXT NOT NULL
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
