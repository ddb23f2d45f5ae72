//! Storage traits and error types
//!
//! This module defines the repository interface the crawler persists the
//! link graph through, and the associated error types.

use crate::state::{PageState, SiteStatus};
use crate::storage::{LinkAttrs, LinkRecord, PageRecord, PageUpdate, SiteRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Repository lock poisoned")]
    LockPoisoned,

    #[error("Site not found: {0}")]
    SiteNotFound(i64),

    #[error("Page not found: {0}")]
    PageNotFound(i64),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence interface for the Site/Page/Link graph
///
/// Every operation is atomic for the key it touches. Implementations are
/// shared between crawl workers and between concurrent crawl runs, so they
/// take `&self` and synchronize internally.
pub trait GraphRepository: Send + Sync {
    // ===== Sites =====

    /// Returns the site for `host`, creating it on first reference
    ///
    /// Concurrent callers with the same host converge on one row.
    fn get_or_create_site(&self, host: &str) -> StorageResult<SiteRecord>;

    /// Looks up a site by host without creating it
    fn find_site(&self, host: &str) -> StorageResult<Option<SiteRecord>>;

    /// Records the outcome of a robots.txt fetch
    ///
    /// `body` replaces the cached body only when given; the status code is
    /// always replaced.
    fn update_site_robots(&self, site_id: i64, body: Option<&str>, status: u16)
        -> StorageResult<()>;

    /// Sets the site's last-crawled timestamp to now
    fn touch_site(&self, site_id: i64) -> StorageResult<()>;

    /// Changes the lifecycle status of a site
    fn set_site_status(&self, site_id: i64, status: SiteStatus) -> StorageResult<()>;

    // ===== Pages =====

    /// Returns the page at `(site, path)`, creating it on first reference
    ///
    /// `scheme` is stored only when the page is created.
    fn get_or_create_page(&self, site_id: i64, path: &str, scheme: &str)
        -> StorageResult<PageRecord>;

    /// Looks up a page by `(site, path)` without creating it
    fn find_page(&self, site_id: i64, path: &str) -> StorageResult<Option<PageRecord>>;

    /// Gets a page by ID
    fn get_page(&self, page_id: i64) -> StorageResult<PageRecord>;

    /// Applies the result of a visit to a page
    fn update_page(&self, page_id: i64, update: &PageUpdate) -> StorageResult<()>;

    // ===== Links =====

    /// Inserts a link, or updates title/rel/text of the existing one
    fn upsert_link(&self, from_page_id: i64, to_page_id: i64, attrs: &LinkAttrs)
        -> StorageResult<LinkRecord>;

    /// Deletes every outgoing link of `from_page_id` whose ID is not in `keep`
    ///
    /// Returns the number of deleted links.
    fn prune_stale_links(&self, from_page_id: i64, keep: &[i64]) -> StorageResult<usize>;

    /// Replaces the outgoing link set of a page in one atomic step
    ///
    /// Upserts every edge, then prunes links not among them. When a target
    /// appears more than once the first edge's attributes win. Returns the
    /// stored links in edge order.
    fn replace_outgoing_links(
        &self,
        from_page_id: i64,
        edges: &[(i64, LinkAttrs)],
    ) -> StorageResult<Vec<LinkRecord>>;

    /// Gets all outgoing links of a page, oldest first
    fn outgoing_links(&self, from_page_id: i64) -> StorageResult<Vec<LinkRecord>>;

    // ===== Statistics =====

    /// Gets total site count
    fn count_sites(&self) -> StorageResult<u64>;

    /// Gets total page count
    fn count_pages(&self) -> StorageResult<u64>;

    /// Gets total link count
    fn count_links(&self) -> StorageResult<u64>;

    /// Counts pages by state
    fn count_pages_by_state(&self, state: PageState) -> StorageResult<u64>;
}
