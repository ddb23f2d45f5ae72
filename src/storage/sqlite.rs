//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the
//! `GraphRepository` trait. One connection sits behind a mutex; the lock is
//! held for exactly one repository call.

use crate::state::{PageState, SiteStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{GraphRepository, StorageError, StorageResult};
use crate::storage::{
    join_keywords, split_keywords, LinkAttrs, LinkRecord, PageRecord, PageUpdate, SiteRecord,
};
use crate::url::canonical_host;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SITE_COLUMNS: &str =
    "id, host, robots_txt, robots_status, status, created_at, last_crawled_at";

const PAGE_COLUMNS: &str = "id, site_id, path, scheme, state, status_code, content_type, \
     raw_body, title, article_title, article_body, article_excerpt, top_image_url, keywords, \
     backlink_count, error_message, created_at, last_crawled_at";

const LINK_COLUMNS: &str = "id, from_page_id, to_page_id, title, rel, text, created_at";

/// SQLite storage backend
pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    /// Creates a new SqliteRepository instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteRepository)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
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

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn site_from_row(row: &Row<'_>) -> rusqlite::Result<SiteRecord> {
    Ok(SiteRecord {
        id: row.get(0)?,
        host: row.get(1)?,
        robots_txt: row.get(2)?,
        robots_status: row.get(3)?,
        status: SiteStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or_default(),
        created_at: row.get(5)?,
        last_crawled_at: row.get(6)?,
    })
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    Ok(PageRecord {
        id: row.get(0)?,
        site_id: row.get(1)?,
        path: row.get(2)?,
        scheme: row.get(3)?,
        state: PageState::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(PageState::Discovered),
        status_code: row.get(5)?,
        content_type: row.get(6)?,
        raw_body: row.get(7)?,
        title: row.get(8)?,
        article_title: row.get(9)?,
        article_body: row.get(10)?,
        article_excerpt: row.get(11)?,
        top_image_url: row.get(12)?,
        keywords: split_keywords(row.get(13)?),
        backlink_count: row.get::<_, i64>(14)? as u64,
        error_message: row.get(15)?,
        created_at: row.get(16)?,
        last_crawled_at: row.get(17)?,
    })
}

fn link_from_row(row: &Row<'_>) -> rusqlite::Result<LinkRecord> {
    Ok(LinkRecord {
        id: row.get(0)?,
        from_page_id: row.get(1)?,
        to_page_id: row.get(2)?,
        title: row.get(3)?,
        rel: row.get(4)?,
        text: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn require_site(conn: &Connection, site_id: i64) -> StorageResult<()> {
    let exists: Option<i64> = conn
        .query_row("SELECT id FROM sites WHERE id = ?1", params![site_id], |row| {
            row.get(0)
        })
        .optional()?;
    exists.map(|_| ()).ok_or(StorageError::SiteNotFound(site_id))
}

fn require_page(conn: &Connection, page_id: i64) -> StorageResult<()> {
    let exists: Option<i64> = conn
        .query_row("SELECT id FROM pages WHERE id = ?1", params![page_id], |row| {
            row.get(0)
        })
        .optional()?;
    exists.map(|_| ()).ok_or(StorageError::PageNotFound(page_id))
}

/// Recomputes a page's backlink count from the links table
fn refresh_backlinks(conn: &Connection, page_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE pages SET backlink_count =
             (SELECT COUNT(*) FROM links WHERE to_page_id = ?1)
         WHERE id = ?1",
        params![page_id],
    )?;
    Ok(())
}

/// Inserts or updates one link; caller holds the connection
fn upsert_link_on(
    conn: &Connection,
    from_page_id: i64,
    to_page_id: i64,
    attrs: &LinkAttrs,
) -> StorageResult<LinkRecord> {
    require_page(conn, from_page_id)?;
    require_page(conn, to_page_id)?;

    conn.execute(
        "INSERT INTO links (from_page_id, to_page_id, title, rel, text, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(from_page_id, to_page_id) DO UPDATE SET
             title = excluded.title, rel = excluded.rel, text = excluded.text",
        params![
            from_page_id,
            to_page_id,
            attrs.title,
            attrs.rel,
            attrs.text,
            now()
        ],
    )?;
    refresh_backlinks(conn, to_page_id)?;

    let link = conn.query_row(
        &format!(
            "SELECT {} FROM links WHERE from_page_id = ?1 AND to_page_id = ?2",
            LINK_COLUMNS
        ),
        params![from_page_id, to_page_id],
        link_from_row,
    )?;
    Ok(link)
}

/// Deletes stale outgoing links; caller holds the connection
fn prune_on(conn: &Connection, from_page_id: i64, keep: &[i64]) -> StorageResult<usize> {
    let keep: HashSet<i64> = keep.iter().copied().collect();

    let mut stmt = conn.prepare("SELECT id, to_page_id FROM links WHERE from_page_id = ?1")?;
    let stale = stmt
        .query_map(params![from_page_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|(id, _)| !keep.contains(id))
        .collect::<Vec<_>>();

    let mut targets = HashSet::new();
    for (link_id, to_page_id) in &stale {
        conn.execute("DELETE FROM links WHERE id = ?1", params![link_id])?;
        targets.insert(*to_page_id);
    }
    for target in targets {
        refresh_backlinks(conn, target)?;
    }

    Ok(stale.len())
}

impl GraphRepository for SqliteRepository {
    // ===== Sites =====

    fn get_or_create_site(&self, host: &str) -> StorageResult<SiteRecord> {
        let host = canonical_host(host);
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO sites (host, status, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(host) DO NOTHING",
            params![host, SiteStatus::Active.to_db_string(), now()],
        )?;

        let site = conn.query_row(
            &format!("SELECT {} FROM sites WHERE host = ?1", SITE_COLUMNS),
            params![host],
            site_from_row,
        )?;
        Ok(site)
    }

    fn find_site(&self, host: &str) -> StorageResult<Option<SiteRecord>> {
        let host = canonical_host(host);
        let conn = self.lock()?;

        let site = conn
            .query_row(
                &format!("SELECT {} FROM sites WHERE host = ?1", SITE_COLUMNS),
                params![host],
                site_from_row,
            )
            .optional()?;
        Ok(site)
    }

    fn update_site_robots(
        &self,
        site_id: i64,
        body: Option<&str>,
        status: u16,
    ) -> StorageResult<()> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE sites SET robots_txt = COALESCE(?1, robots_txt), robots_status = ?2
             WHERE id = ?3",
            params![body, status, site_id],
        )?;
        if updated == 0 {
            return Err(StorageError::SiteNotFound(site_id));
        }
        Ok(())
    }

    fn touch_site(&self, site_id: i64) -> StorageResult<()> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE sites SET last_crawled_at = ?1 WHERE id = ?2",
            params![now(), site_id],
        )?;
        if updated == 0 {
            return Err(StorageError::SiteNotFound(site_id));
        }
        Ok(())
    }

    fn set_site_status(&self, site_id: i64, status: SiteStatus) -> StorageResult<()> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE sites SET status = ?1 WHERE id = ?2",
            params![status.to_db_string(), site_id],
        )?;
        if updated == 0 {
            return Err(StorageError::SiteNotFound(site_id));
        }
        Ok(())
    }

    // ===== Pages =====

    fn get_or_create_page(
        &self,
        site_id: i64,
        path: &str,
        scheme: &str,
    ) -> StorageResult<PageRecord> {
        let conn = self.lock()?;
        require_site(&conn, site_id)?;

        conn.execute(
            "INSERT INTO pages (site_id, path, scheme, state, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(site_id, path) DO NOTHING",
            params![
                site_id,
                path,
                scheme,
                PageState::Discovered.to_db_string(),
                now()
            ],
        )?;

        let page = conn.query_row(
            &format!(
                "SELECT {} FROM pages WHERE site_id = ?1 AND path = ?2",
                PAGE_COLUMNS
            ),
            params![site_id, path],
            page_from_row,
        )?;
        Ok(page)
    }

    fn find_page(&self, site_id: i64, path: &str) -> StorageResult<Option<PageRecord>> {
        let conn = self.lock()?;
        let page = conn
            .query_row(
                &format!(
                    "SELECT {} FROM pages WHERE site_id = ?1 AND path = ?2",
                    PAGE_COLUMNS
                ),
                params![site_id, path],
                page_from_row,
            )
            .optional()?;
        Ok(page)
    }

    fn get_page(&self, page_id: i64) -> StorageResult<PageRecord> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {} FROM pages WHERE id = ?1", PAGE_COLUMNS),
            params![page_id],
            page_from_row,
        )
        .optional()?
        .ok_or(StorageError::PageNotFound(page_id))
    }

    fn update_page(&self, page_id: i64, update: &PageUpdate) -> StorageResult<()> {
        let conn = self.lock()?;
        let state = update.state().to_db_string();

        let updated = match update {
            PageUpdate::Skipped { reason, .. } => conn.execute(
                "UPDATE pages SET state = ?1, error_message = ?2 WHERE id = ?3",
                params![state, reason, page_id],
            )?,
            PageUpdate::Failed { error } => conn.execute(
                "UPDATE pages SET state = ?1, error_message = ?2 WHERE id = ?3",
                params![state, error, page_id],
            )?,
            PageUpdate::Fetched {
                status_code,
                content_type,
            } => conn.execute(
                "UPDATE pages SET state = ?1, status_code = ?2, content_type = ?3,
                     raw_body = NULL, title = NULL, article_title = NULL,
                     article_body = NULL, article_excerpt = NULL, top_image_url = NULL,
                     keywords = NULL, error_message = NULL, last_crawled_at = ?4
                 WHERE id = ?5",
                params![state, status_code, content_type, now(), page_id],
            )?,
            PageUpdate::Extracted {
                status_code,
                content_type,
                raw_body,
                article,
            } => conn.execute(
                "UPDATE pages SET state = ?1, status_code = ?2, content_type = ?3,
                     raw_body = ?4, title = ?5, article_title = ?6, article_body = ?7,
                     article_excerpt = ?8, top_image_url = ?9, keywords = ?10,
                     error_message = NULL, last_crawled_at = ?11
                 WHERE id = ?12",
                params![
                    state,
                    status_code,
                    content_type,
                    raw_body,
                    article.title,
                    article.article_title,
                    article.article_body,
                    article.article_excerpt,
                    article.top_image_url,
                    join_keywords(&article.keywords),
                    now(),
                    page_id
                ],
            )?,
        };

        if updated == 0 {
            return Err(StorageError::PageNotFound(page_id));
        }
        Ok(())
    }

    // ===== Links =====

    fn upsert_link(
        &self,
        from_page_id: i64,
        to_page_id: i64,
        attrs: &LinkAttrs,
    ) -> StorageResult<LinkRecord> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let link = upsert_link_on(&tx, from_page_id, to_page_id, attrs)?;
        tx.commit()?;
        Ok(link)
    }

    fn prune_stale_links(&self, from_page_id: i64, keep: &[i64]) -> StorageResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let deleted = prune_on(&tx, from_page_id, keep)?;
        tx.commit()?;
        Ok(deleted)
    }

    fn replace_outgoing_links(
        &self,
        from_page_id: i64,
        edges: &[(i64, LinkAttrs)],
    ) -> StorageResult<Vec<LinkRecord>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        require_page(&tx, from_page_id)?;

        let mut seen = HashSet::new();
        let mut links = Vec::with_capacity(edges.len());
        for (to_page_id, attrs) in edges {
            if !seen.insert(*to_page_id) {
                continue;
            }
            links.push(upsert_link_on(&tx, from_page_id, *to_page_id, attrs)?);
        }

        let keep: Vec<i64> = links.iter().map(|link| link.id).collect();
        prune_on(&tx, from_page_id, &keep)?;

        tx.commit()?;
        Ok(links)
    }

    fn outgoing_links(&self, from_page_id: i64) -> StorageResult<Vec<LinkRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM links WHERE from_page_id = ?1 ORDER BY id",
            LINK_COLUMNS
        ))?;

        let links = stmt
            .query_map(params![from_page_id], link_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(links)
    }

    // ===== Statistics =====

    fn count_sites(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sites", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_pages(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_links(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM links", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_pages_by_state(&self, state: PageState) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE state = ?1",
            params![state.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
