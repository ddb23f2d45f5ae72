//! Robots.txt handling module
//!
//! This module provides functionality for fetching, caching, and matching
//! robots.txt files. Each crawl run owns one `RobotsGate`.

mod cache;
mod gate;
mod parser;

pub use cache::CachedRobots;
pub use gate::RobotsGate;
pub use parser::ParsedRobots;

use crate::storage::StorageError;
use thiserror::Error;

/// Errors from refreshing a site's robots.txt
///
/// None of these stop a crawl; the gate keeps its cached policy.
#[derive(Debug, Error)]
pub enum RobotsError {
    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to persist robots.txt for {host}: {source}")]
    Storage {
        host: String,
        #[source]
        source: StorageError,
    },

    #[error("Robots cache lock poisoned")]
    LockPoisoned,
}
