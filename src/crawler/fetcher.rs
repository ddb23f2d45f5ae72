//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the shared HTTP client with the crawler user agent
//! - GET requests for page content
//! - Error classification
//!
//! Fetches are never retried.

use crate::config::{CrawlerConfig, UserAgentConfig};
use reqwest::{header::CONTENT_TYPE, redirect::Policy, Client};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// A response the server actually sent, whatever its status
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// HTTP status code
    pub status_code: u16,
    /// Content-Type header value
    pub content_type: Option<String>,
    /// Raw response body
    pub body: Vec<u8>,
    /// Final URL after redirects
    pub final_url: String,
}

impl FetchResult {
    /// Returns true if the response declares an HTML body
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with("text/html"))
            .unwrap_or(false)
    }
}

/// Why a fetch produced no response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FetchErrorKind {
    /// Request or connect timeout elapsed
    Timeout,
    /// DNS, TCP, or TLS failure
    ConnectionFailure,
    /// Malformed response, redirect limit, or body read failure
    ProtocolError,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Timeout => "timeout",
            Self::ConnectionFailure => "connection failure",
            Self::ProtocolError => "protocol error",
        };
        f.write_str(label)
    }
}

/// A fetch that produced no usable response
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            FetchErrorKind::Timeout
        } else if e.is_connect() {
            FetchErrorKind::ConnectionFailure
        } else {
            FetchErrorKind::ProtocolError
        };
        Self {
            kind,
            message: e.to_string(),
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `crawler` - Timeouts and redirect limit
/// * `user_agent` - Identification sent with every request
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use quaero::config::{CrawlerConfig, UserAgentConfig};
/// use quaero::crawler::build_http_client;
///
/// let user_agent = UserAgentConfig {
///     crawler_name: "QuaeroBot".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/bot".to_string(),
///     contact_email: "bot@example.com".to_string(),
/// };
///
/// let client = build_http_client(&CrawlerConfig::default(), &user_agent).unwrap();
/// ```
pub fn build_http_client(
    crawler: &CrawlerConfig,
    user_agent: &UserAgentConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(crawler.request_timeout_secs))
        .connect_timeout(Duration::from_secs(crawler.connect_timeout_secs))
        .redirect(Policy::limited(crawler.max_redirects as usize))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches pages over a shared client
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// The underlying client, shared with the robots gate
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Fetches a URL once
    ///
    /// Any HTTP status counts as a response; 4xx and 5xx pages are returned
    /// like any other.
    pub async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        let response = self.client.get(url).send().await?;

        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await?.to_vec();

        Ok(FetchResult {
            status_code,
            content_type,
            body,
            final_url,
        })
    }
}
