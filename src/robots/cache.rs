//! Robots.txt cache entries
//!
//! One entry per host: the status of the last robots.txt fetch and the
//! rules from the last successful one.

use crate::robots::ParsedRobots;
use crate::storage::SiteRecord;
use chrono::{DateTime, Utc};

/// Cached robots.txt data for a host
#[derive(Debug, Clone)]
pub struct CachedRobots {
    /// HTTP status of the last robots.txt fetch, if any
    pub status: Option<u16>,

    /// Rules from the last 200 response
    pub content: ParsedRobots,

    /// When this entry was last refreshed from the network
    pub fetched_at: Option<DateTime<Utc>>,
}

impl CachedRobots {
    /// Builds an entry from what a site row has persisted
    pub fn from_site(site: &SiteRecord) -> Self {
        let content = match &site.robots_txt {
            Some(body) => ParsedRobots::from_content(body),
            None => ParsedRobots::allow_all(),
        };
        Self {
            status: site.robots_status,
            content,
            fetched_at: None,
        }
    }

    /// Applies a fresh HTTP response
    ///
    /// The status always changes; rules only change on 200.
    pub fn apply_response(&mut self, status: u16, body: Option<&str>) {
        self.status = Some(status);
        if let Some(body) = body {
            self.content = ParsedRobots::from_content(body);
        }
        self.fetched_at = Some(Utc::now());
    }

    /// Forgets the last status after a failed fetch; rules are kept
    pub fn mark_unreachable(&mut self) {
        self.status = None;
        self.fetched_at = Some(Utc::now());
    }

    /// Checks if a URL is allowed according to the cached robots.txt
    ///
    /// Rules are enforced only when the last fetch returned 200; a missing
    /// or failing robots.txt allows everything.
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.status != Some(200) {
            return true;
        }
        self.content.is_allowed(url, user_agent)
    }
}
