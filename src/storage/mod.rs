//! Storage module for persisting the link graph
//!
//! This module handles all persistence for the crawler, including:
//! - The `GraphRepository` interface shared by crawl workers
//! - SQLite database initialization and schema management
//! - An in-memory repository for tests and embedders
//! - Site, page and link records

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryRepository;
pub use sqlite::SqliteRepository;
pub use traits::{GraphRepository, StorageError, StorageResult};

use crate::state::{PageState, SiteStatus};
use crate::QuaeroError;

use std::path::Path;

/// Opens or creates a SQLite-backed repository
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteRepository)` - Successfully initialized storage
/// * `Err(QuaeroError)` - Failed to open the database
pub fn open_repository(path: &Path) -> Result<SqliteRepository, QuaeroError> {
    Ok(SqliteRepository::new(path)?)
}

/// Represents a site in the graph
#[derive(Debug, Clone, PartialEq)]
pub struct SiteRecord {
    pub id: i64,
    pub host: String,
    pub robots_txt: Option<String>,
    pub robots_status: Option<u16>,
    pub status: SiteStatus,
    pub created_at: String,
    pub last_crawled_at: Option<String>,
}

/// Represents a page in the graph
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    pub id: i64,
    pub site_id: i64,
    pub path: String,
    pub scheme: String,
    pub state: PageState,
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    pub raw_body: Option<String>,
    pub title: Option<String>,
    pub article_title: Option<String>,
    pub article_body: Option<String>,
    pub article_excerpt: Option<String>,
    pub top_image_url: Option<String>,
    pub keywords: Vec<String>,
    pub backlink_count: u64,
    pub error_message: Option<String>,
    pub created_at: String,
    pub last_crawled_at: Option<String>,
}

/// Represents a link between two pages
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRecord {
    pub id: i64,
    pub from_page_id: i64,
    pub to_page_id: i64,
    pub title: Option<String>,
    pub rel: Option<String>,
    pub text: String,
    pub created_at: String,
}

/// Anchor attributes stored on a link
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkAttrs {
    pub title: Option<String>,
    /// Space-joined rel tokens
    pub rel: Option<String>,
    pub text: String,
}

/// Extracted article fields persisted on a page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleFields {
    pub title: Option<String>,
    pub article_title: Option<String>,
    pub article_body: Option<String>,
    pub article_excerpt: Option<String>,
    pub top_image_url: Option<String>,
    pub keywords: Vec<String>,
}

/// Partial page update applied after a visit
///
/// Each variant names the columns it writes; everything else on the page
/// keeps its last-known value.
#[derive(Debug, Clone, PartialEq)]
pub enum PageUpdate {
    /// Visit skipped before any network access to the page
    ///
    /// Writes state and error message only.
    Skipped { state: PageState, reason: String },

    /// Fetch failed; HTTP status stays as last recorded
    Failed { error: String },

    /// Non-HTML response: status and content type kept, body and article
    /// fields cleared
    Fetched {
        status_code: u16,
        content_type: Option<String>,
    },

    /// HTML response with extracted content
    Extracted {
        status_code: u16,
        content_type: Option<String>,
        raw_body: String,
        article: ArticleFields,
    },
}

impl PageUpdate {
    /// The page state this update leaves behind
    pub fn state(&self) -> PageState {
        match self {
            Self::Skipped { state, .. } => *state,
            Self::Failed { .. } => PageState::Failed,
            Self::Fetched { .. } => PageState::Fetched,
            Self::Extracted { .. } => PageState::Extracted,
        }
    }

    /// Returns true if the update records a completed fetch
    pub fn marks_crawled(&self) -> bool {
        matches!(self, Self::Fetched { .. } | Self::Extracted { .. })
    }
}

/// Joins keywords for a single text column
pub(crate) fn join_keywords(keywords: &[String]) -> Option<String> {
    if keywords.is_empty() {
        None
    } else {
        Some(keywords.join(","))
    }
}

/// Splits a keyword column back into its entries
pub(crate) fn split_keywords(column: Option<String>) -> Vec<String> {
    column
        .map(|s| {
            s.split(',')
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
