//! Content extraction from fetched pages
//!
//! Extraction is pluggable through `ContentExtractor`. `HtmlExtractor` is
//! the default, built on `scraper`.

mod html;

pub use html::HtmlExtractor;

use crate::storage::{ArticleFields, LinkAttrs};
use url::Url;

/// Turns a fetched body into typed page content
///
/// Extraction never fails: input it cannot make sense of yields an empty
/// `PageContent`.
pub trait ContentExtractor: Send + Sync {
    fn extract(&self, body: &[u8], page_url: &Url) -> PageContent;
}

/// An `<a href>` as found in the document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Anchor {
    /// The raw `href` attribute, unresolved
    pub href: String,
    pub title: Option<String>,
    pub rel_tokens: Vec<String>,
    /// First non-whitespace text fragment inside the anchor, or empty
    pub text: String,
}

impl Anchor {
    /// Returns true for same-page jumps like `#top`
    pub fn is_fragment_only(&self) -> bool {
        self.href.trim_start().starts_with('#')
    }

    /// Returns true if any rel token mentions `nofollow`, ignoring case
    pub fn is_nofollow(&self) -> bool {
        self.rel_tokens
            .iter()
            .any(|token| token.to_ascii_lowercase().contains("nofollow"))
    }

    /// Space-joined rel tokens, if any
    pub fn rel(&self) -> Option<String> {
        if self.rel_tokens.is_empty() {
            None
        } else {
            Some(self.rel_tokens.join(" "))
        }
    }

    /// Attributes stored on the link this anchor produces
    pub fn link_attrs(&self) -> LinkAttrs {
        LinkAttrs {
            title: self.title.clone(),
            rel: self.rel(),
            text: self.text.clone(),
        }
    }
}

/// Everything extracted from one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContent {
    pub title: Option<String>,
    pub article_title: Option<String>,
    pub article_body: Option<String>,
    pub article_excerpt: Option<String>,
    pub top_image_url: Option<String>,
    pub keywords: Vec<String>,
    /// Anchors in document order
    pub anchors: Vec<Anchor>,
}

impl PageContent {
    /// The fields persisted on the page row
    pub fn article_fields(&self) -> ArticleFields {
        ArticleFields {
            title: self.title.clone(),
            article_title: self.article_title.clone(),
            article_body: self.article_body.clone(),
            article_excerpt: self.article_excerpt.clone(),
            top_image_url: self.top_image_url.clone(),
            keywords: self.keywords.clone(),
        }
    }
}
