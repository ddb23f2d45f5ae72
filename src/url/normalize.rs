use crate::url::domain::site_host;
use crate::url::NormalizedUrl;
use crate::UrlError;
use url::Url;

/// Scheme given to links that do not name one
const DEFAULT_SCHEME: &str = "http";

/// Normalizes a raw URL into a `(host, scheme, path)` triple
///
/// # Normalization Steps
///
/// 1. Collapse a leading `./`, then resolve `raw` against `base` when
///    given (relative links)
/// 2. Default the scheme to `http` when `raw` names none; this also
///    applies to relative and scheme-relative links
/// 3. Reject anything that is not HTTP(S) after resolution
/// 4. Host: lowercase, explicit port kept, one trailing slash stripped
/// 5. Path: empty path becomes `/`, query kept, fragment dropped
///
/// # Arguments
///
/// * `raw` - The URL as found in a page or given on the command line
/// * `base` - The page the link was found on, if any
///
/// # Returns
///
/// * `Ok(NormalizedUrl)` - The canonical triple
/// * `Err(UrlError)` - The input cannot be resolved into host and path
///
/// # Examples
///
/// ```
/// use quaero::url::normalize;
///
/// let seed = normalize("a.test/index", None).unwrap();
/// assert_eq!(seed.absolute(), "http://a.test/index");
///
/// let base = seed.to_url().unwrap();
/// let about = normalize("about?lang=en#team", Some(&base)).unwrap();
/// assert_eq!(about.path, "/about?lang=en");
/// ```
pub fn normalize(raw: &str, base: Option<&Url>) -> Result<NormalizedUrl, UrlError> {
    let raw = raw.trim();
    let raw = match raw.strip_prefix("./") {
        Some(rest) if !rest.is_empty() => rest,
        _ => raw,
    };
    if raw.is_empty() {
        return Err(UrlError::Malformed("empty URL".to_string()));
    }

    let explicit_scheme = has_explicit_scheme(raw);

    let mut url = match base {
        Some(base) => base
            .join(raw)
            .map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?,
        None if explicit_scheme => {
            Url::parse(raw).map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?
        }
        None => {
            let with_scheme = format!("{}://{}", DEFAULT_SCHEME, raw.trim_start_matches('/'));
            Url::parse(&with_scheme).map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?
        }
    };

    if !explicit_scheme && url.scheme() != DEFAULT_SCHEME {
        url.set_scheme(DEFAULT_SCHEME)
            .map_err(|_| UrlError::Malformed(format!("cannot default scheme of {}", raw)))?;
    }

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::UnsupportedScheme(url.scheme().to_string()));
    }

    let host = site_host(&url).ok_or_else(|| UrlError::MissingHost(raw.to_string()))?;
    let host = host.strip_suffix('/').map(str::to_string).unwrap_or(host);

    Ok(NormalizedUrl {
        host,
        scheme: url.scheme().to_string(),
        path: normalize_path(&url),
    })
}

/// Builds the page path: URL path plus query, fragment dropped
fn normalize_path(url: &Url) -> String {
    let mut path = match url.path() {
        "" => "/".to_string(),
        raw_path => raw_path.to_string(),
    };

    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }

    path
}

/// Checks whether a string starts with an RFC 3986 scheme followed by ':'
fn has_explicit_scheme(raw: &str) -> bool {
    let Some((candidate, rest)) = raw.split_once(':') else {
        return false;
    };

    // `host:8080/path` is a port, not a scheme
    let port = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }

    let mut chars = candidate.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }

    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}
