/// Page state definitions for tracking crawl progress
///
/// This module defines the states a page row can be left in by a visit.
use std::fmt;

/// Represents the last crawl outcome recorded on a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PageState {
    /// Page is known as a link target but has never been visited
    Discovered,

    /// Page was fetched as HTML and its content extracted
    Extracted,

    /// Page was fetched but is not HTML; only status and content type kept
    Fetched,

    /// robots.txt forbids fetching this page
    RobotsDisallowed,

    /// The page's site is marked blocked or spam
    SiteBlocked,

    /// The last fetch attempt failed (timeout, connection, protocol)
    Failed,
}

impl PageState {
    /// Returns true if the page has been visited at least once
    pub fn is_visited(&self) -> bool {
        !matches!(self, Self::Discovered)
    }

    /// Returns true if the last visit reached the server successfully
    pub fn is_fetched(&self) -> bool {
        matches!(self, Self::Extracted | Self::Fetched)
    }

    /// Returns true if the last visit was a deliberate skip
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::RobotsDisallowed | Self::SiteBlocked)
    }

    /// Converts the page state to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Extracted => "extracted",
            Self::Fetched => "fetched",
            Self::RobotsDisallowed => "robots_disallowed",
            Self::SiteBlocked => "site_blocked",
            Self::Failed => "failed",
        }
    }

    /// Parses a page state from a database string representation
    ///
    /// Returns None if the string doesn't match any known state.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "discovered" => Some(Self::Discovered),
            "extracted" => Some(Self::Extracted),
            "fetched" => Some(Self::Fetched),
            "robots_disallowed" => Some(Self::RobotsDisallowed),
            "site_blocked" => Some(Self::SiteBlocked),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible page states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Discovered,
            Self::Extracted,
            Self::Fetched,
            Self::RobotsDisallowed,
            Self::SiteBlocked,
            Self::Failed,
        ]
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
