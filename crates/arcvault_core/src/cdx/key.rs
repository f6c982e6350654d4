//! Canonical URL sort keys.

use url::{Host, Url};

/// Returns the CDX sort key for `url`.
///
/// The scheme is dropped, a domain host is lowercased and its labels
/// reversed with commas, a non-default port follows as `:port`, then `)`
/// and the path with any query:
///
/// ```rust
/// use arcvault_core::url_sort_key;
///
/// assert_eq!(url_sort_key("http://www.Example.com/a?b=1"), "com,example,www)/a?b=1");
/// assert_eq!(url_sort_key("https://example.com:8443"), "com,example:8443)/");
/// ```
///
/// Input that does not parse as a URL with a host is lowercased and
/// returned without its scheme.
#[must_use]
pub fn url_sort_key(url: &str) -> String {
    let trimmed = url.trim();
    match Url::parse(trimmed) {
        Ok(parsed) if parsed.has_host() => canonical_key(&parsed),
        _ => fallback_key(trimmed),
    }
}

fn canonical_key(url: &Url) -> String {
    let mut key = match url.host() {
        Some(Host::Domain(domain)) => domain
            .to_ascii_lowercase()
            .trim_end_matches('.')
            .split('.')
            .rev()
            .collect::<Vec<_>>()
            .join(","),
        Some(ip) => ip.to_string(),
        None => String::new(),
    };
    if let Some(port) = url.port() {
        key.push(':');
        key.push_str(&port.to_string());
    }
    key.push(')');
    match url.path() {
        "" => key.push('/'),
        path => key.push_str(path),
    }
    if let Some(query) = url.query() {
        key.push('?');
        key.push_str(query);
    }
    key
}

fn fallback_key(url: &str) -> String {
    let lowered = url.to_ascii_lowercase();
    match lowered.split_once("://") {
        Some((_, rest)) => rest.to_string(),
        None => lowered,
    }
}
