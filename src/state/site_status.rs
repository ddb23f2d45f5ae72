/// Site lifecycle status
///
/// Operators mark sites blocked or spam; the crawler only fetches from
/// active sites.
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SiteStatus {
    /// Site may be crawled
    #[default]
    Active,

    /// Site is skipped until an operator re-activates it
    TemporarilyBlocked,

    /// Site is known spam and never fetched
    Spam,
}

impl SiteStatus {
    /// Returns true if pages on this site may be fetched
    pub fn allows_crawl(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Single-letter code stored in the database
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Active => "A",
            Self::TemporarilyBlocked => "B",
            Self::Spam => "S",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "A" => Some(Self::Active),
            "B" => Some(Self::TemporarilyBlocked),
            "S" => Some(Self::Spam),
            _ => None,
        }
    }
}

impl fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Active => "active",
            Self::TemporarilyBlocked => "temporarily blocked",
            Self::Spam => "spam",
        };
        f.write_str(label)
    }
}
