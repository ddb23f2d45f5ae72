//! HTML content extractor
//!
//! This module handles parsing HTML content to extract:
//! - Page and article titles
//! - Readable article text and an excerpt
//! - Top image and keywords from metadata
//! - Every anchor, in document order

use crate::extract::{Anchor, ContentExtractor, PageContent};
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashSet;
use url::Url;

/// Characters of article text used when no description is declared
const EXCERPT_CHARS: usize = 200;

/// Subtrees that never contribute to article text
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside", "form",
];

/// Elements that start a new line of article text
const BLOCK_TAGS: &[&str] = &[
    "address",
    "article",
    "blockquote",
    "br",
    "dd",
    "div",
    "dl",
    "dt",
    "figcaption",
    "figure",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "hr",
    "li",
    "main",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "td",
    "th",
    "tr",
    "ul",
];

/// Default extractor backed by `scraper`
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlExtractor;

impl HtmlExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl ContentExtractor for HtmlExtractor {
    /// Parses HTML content and extracts page content
    ///
    /// # Extraction Rules
    ///
    /// - `title`: trimmed `<title>` text
    /// - `article_title`: `og:title`, else first `<h1>`, else `title`
    /// - `article_body`: text of the first `article`, `main`, or `body`,
    ///   skipping navigation, forms and scripts
    /// - `article_excerpt`: declared description, else the start of the body
    /// - `top_image_url`: `og:image`, else the first image in the article
    /// - `keywords`: meta keywords, deduplicated in order
    /// - `anchors`: every `<a href>`
    ///
    /// # Example
    ///
    /// ```
    /// use quaero::extract::{ContentExtractor, HtmlExtractor};
    /// use url::Url;
    ///
    /// let html = br#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
    /// let page_url = Url::parse("http://a.test/").unwrap();
    /// let content = HtmlExtractor::new().extract(html, &page_url);
    /// assert_eq!(content.title.as_deref(), Some("Test"));
    /// assert_eq!(content.anchors[0].href, "/page");
    /// ```
    fn extract(&self, body: &[u8], page_url: &Url) -> PageContent {
        let html = String::from_utf8_lossy(body);
        let document = Html::parse_document(&html);

        let meta = MetaTags::collect(&document);
        let title = extract_title(&document);
        let article = find_article(&document);

        let article_title = meta
            .og_title
            .clone()
            .or_else(|| first_text(&document, "h1"))
            .or_else(|| title.clone());

        let article_body = article.map(article_text).filter(|text| !text.is_empty());

        let article_excerpt = meta
            .description
            .clone()
            .or_else(|| meta.og_description.clone())
            .or_else(|| {
                article_body
                    .as_deref()
                    .map(|text| text.chars().take(EXCERPT_CHARS).collect::<String>())
                    .map(|excerpt| excerpt.trim().to_string())
            });

        let top_image_url = meta
            .og_image
            .as_deref()
            .or_else(|| article.and_then(first_image_src))
            .and_then(|src| page_url.join(src.trim()).ok())
            .map(|url| url.to_string());

        PageContent {
            title,
            article_title,
            article_body,
            article_excerpt,
            top_image_url,
            keywords: meta.keywords,
            anchors: extract_anchors(&document),
        }
    }
}

/// Metadata declared in `<meta>` tags
#[derive(Debug, Default)]
struct MetaTags {
    description: Option<String>,
    og_title: Option<String>,
    og_description: Option<String>,
    og_image: Option<String>,
    keywords: Vec<String>,
}

impl MetaTags {
    fn collect(document: &Html) -> Self {
        let mut meta = Self::default();
        let Ok(selector) = Selector::parse("meta[content]") else {
            return meta;
        };

        for element in document.select(&selector) {
            let name = element
                .value()
                .attr("name")
                .or_else(|| element.value().attr("property"))
                .unwrap_or("")
                .trim()
                .to_ascii_lowercase();
            let content = element.value().attr("content").unwrap_or("").trim();
            if content.is_empty() {
                continue;
            }

            let slot = match name.as_str() {
                "description" => &mut meta.description,
                "og:title" => &mut meta.og_title,
                "og:description" => &mut meta.og_description,
                "og:image" => &mut meta.og_image,
                "keywords" => {
                    if meta.keywords.is_empty() {
                        meta.keywords = split_keywords(content);
                    }
                    continue;
                }
                _ => continue,
            };
            // First declaration wins
            if slot.is_none() {
                *slot = Some(content.to_string());
            }
        }

        meta
    }
}

/// Splits a keywords declaration, dropping blanks and repeats
fn split_keywords(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    content
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .filter(|k| seen.insert(k.to_string()))
        .map(str::to_string)
        .collect()
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    first_text(document, "title")
}

/// Trimmed text of the first element matching `selector`, if non-empty
fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;

    document
        .select(&selector)
        .next()
        .map(|element| collapse_inline(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

/// Content priority: article > main > body
fn find_article(document: &Html) -> Option<ElementRef<'_>> {
    ["article", "main", "body"].iter().find_map(|tag| {
        Selector::parse(tag)
            .ok()
            .and_then(|selector| document.select(&selector).next())
    })
}

fn first_image_src(article: ElementRef<'_>) -> Option<&str> {
    let selector = Selector::parse("img[src]").ok()?;
    article
        .select(&selector)
        .find_map(|img| img.value().attr("src"))
        .filter(|src| !src.trim().is_empty())
}

/// Readable text of an element, one line per block
fn article_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);

    raw.lines()
        .map(collapse_inline)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                let tag = child.value().name();
                if SKIPPED_TAGS.contains(&tag) {
                    continue;
                }

                let block = BLOCK_TAGS.contains(&tag);
                if block {
                    out.push('\n');
                }
                collect_text(child, out);
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// Collapses runs of whitespace to single spaces and trims
fn collapse_inline(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extracts every `<a href>` in document order
fn extract_anchors(document: &Html) -> Vec<Anchor> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            let title = element
                .value()
                .attr("title")
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            let rel_tokens = element
                .value()
                .attr("rel")
                .map(|rel| rel.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default();
            let text = element
                .text()
                .map(str::trim)
                .find(|fragment| !fragment.is_empty())
                .unwrap_or("")
                .to_string();

            Some(Anchor {
                href: href.to_string(),
                title,
                rel_tokens,
                text,
            })
        })
        .collect()
}
