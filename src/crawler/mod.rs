//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching
//! - Per-page visits: robots policy, extraction and link recording
//! - Overall crawl coordination and reporting

mod coordinator;
mod fetcher;
mod report;
mod visit;

pub use coordinator::Crawler;
pub use fetcher::{build_http_client, FetchError, FetchErrorKind, FetchResult, PageFetcher};
pub use report::CrawlReport;
pub use visit::{FailReason, SkipReason, VisitOutcome, VisitReport};
