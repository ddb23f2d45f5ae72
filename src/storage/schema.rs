//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Quaero database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per distinct host
CREATE TABLE IF NOT EXISTS sites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    host TEXT NOT NULL UNIQUE,
    robots_txt TEXT,
    robots_status INTEGER,
    status TEXT NOT NULL DEFAULT 'A',
    created_at TEXT NOT NULL,
    last_crawled_at TEXT
);

-- Pages are keyed by (site, path); path includes the query string
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL REFERENCES sites(id),
    path TEXT NOT NULL,
    scheme TEXT NOT NULL,
    state TEXT NOT NULL,
    status_code INTEGER,
    content_type TEXT,
    raw_body TEXT,
    title TEXT,
    article_title TEXT,
    article_body TEXT,
    article_excerpt TEXT,
    top_image_url TEXT,
    keywords TEXT,
    backlink_count INTEGER NOT NULL DEFAULT 0,
    error_message TEXT,
    created_at TEXT NOT NULL,
    last_crawled_at TEXT,
    UNIQUE(site_id, path)
);

CREATE INDEX IF NOT EXISTS idx_pages_site ON pages(site_id);
CREATE INDEX IF NOT EXISTS idx_pages_state ON pages(state);

-- Directed edges between pages
CREATE TABLE IF NOT EXISTS links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    from_page_id INTEGER NOT NULL REFERENCES pages(id),
    to_page_id INTEGER NOT NULL REFERENCES pages(id),
    title TEXT,
    rel TEXT,
    text TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    UNIQUE(from_page_id, to_page_id)
);

CREATE INDEX IF NOT EXISTS idx_links_from ON links(from_page_id);
CREATE INDEX IF NOT EXISTS idx_links_to ON links(to_page_id);
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
