//! Quaero: a polite link-graph crawler
//!
//! This crate walks the pages reachable from a seed URL, records a normalized
//! site/page/link graph through a pluggable repository, respects robots.txt,
//! and extracts page content for later indexing.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Quaero operations
///
/// Only run-level failures surface through this type. Per-page problems are
/// recorded as visit outcomes and never abort a crawl.
#[derive(Debug, Error)]
pub enum QuaeroError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Crawl depth must be at least 1, got {0}")]
    InvalidDepth(u32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
///
/// Every variant means the same thing to the crawler: the link cannot be
/// resolved and is skipped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Missing host in URL: {0}")]
    MissingHost(String),

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Quaero operations
pub type Result<T> = std::result::Result<T, QuaeroError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlReport, Crawler};
pub use extract::{ContentExtractor, HtmlExtractor, PageContent};
pub use state::PageState;
pub use storage::{GraphRepository, MemoryRepository, SqliteRepository};
pub use url::{normalize, NormalizedUrl};
