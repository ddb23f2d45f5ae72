use url::Url;

/// Extracts the site host from a URL
///
/// The host is lowercased and carries the port when the URL names a
/// non-default one, so `http://127.0.0.1:8080/` and `http://127.0.0.1:9090/`
/// are different sites.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use quaero::url::site_host;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(site_host(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("http://localhost:8080/").unwrap();
/// assert_eq!(site_host(&url), Some("localhost:8080".to_string()));
/// ```
pub fn site_host(url: &Url) -> Option<String> {
    let host = url.host_str().filter(|h| !h.is_empty())?.to_lowercase();
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

/// Canonicalizes a bare host string for repository lookups
///
/// Strips a leading `scheme://`, a single trailing slash, surrounding
/// whitespace, and lowercases the result.
///
/// # Examples
///
/// ```
/// use quaero::url::canonical_host;
///
/// assert_eq!(canonical_host("http://A.Test/"), "a.test");
/// assert_eq!(canonical_host("a.test"), "a.test");
/// ```
pub fn canonical_host(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_scheme = match trimmed.find("://") {
        Some(idx) => &trimmed[idx + 3..],
        None => trimmed,
    };
    let without_slash = without_scheme.strip_suffix('/').unwrap_or(without_scheme);
    without_slash.to_lowercase()
}
