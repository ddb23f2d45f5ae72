//! URL handling module for Quaero
//!
//! This module turns raw link strings into canonical `(host, scheme, path)`
//! triples and classifies hosts relative to a crawl's seed.

mod domain;
mod normalize;

use crate::UrlError;
use url::Url;

// Re-export main functions
pub use domain::{canonical_host, site_host};
pub use normalize::normalize;

/// A canonical URL split into the parts the graph is keyed on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedUrl {
    /// Lowercase host, with `:port` when non-default
    pub host: String,
    /// `http` or `https`
    pub scheme: String,
    /// Path plus `?query`, never empty
    pub path: String,
}

impl NormalizedUrl {
    /// Renders the absolute URL string
    pub fn absolute(&self) -> String {
        format!("{}://{}{}", self.scheme, self.host, self.path)
    }

    /// Page identity: host plus path, scheme ignored
    ///
    /// The `http` and `https` forms of a page share one key, matching the
    /// repository's `(site, path)` uniqueness. This is the key of a crawl
    /// run's visited set.
    pub fn page_key(&self) -> String {
        format!("{}{}", self.host, self.path)
    }

    /// Parses the absolute form back into a `Url`
    pub fn to_url(&self) -> Result<Url, UrlError> {
        Url::parse(&self.absolute()).map_err(|e| UrlError::Parse(e.to_string()))
    }
}

impl std::fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.absolute())
    }
}

/// Where a link target sits relative to the crawl's seed host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Same host as the seed
    Internal,
    /// Any other host
    External,
}

impl Scope {
    /// Classifies `host` against the crawl-scope host
    ///
    /// # Examples
    ///
    /// ```
    /// use quaero::url::Scope;
    ///
    /// assert_eq!(Scope::classify("a.test", "a.test"), Scope::Internal);
    /// assert_eq!(Scope::classify("b.test", "a.test"), Scope::External);
    /// ```
    pub fn classify(host: &str, scope_host: &str) -> Self {
        if host == scope_host {
            Self::Internal
        } else {
            Self::External
        }
    }

    /// Returns true if a crawl with this external policy may follow the link
    pub fn may_follow(&self, include_external: bool) -> bool {
        matches!(self, Self::Internal) || include_external
    }
}
