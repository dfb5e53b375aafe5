//! URL handling module for Sampletrace
//!
//! This module provides canonical identity keys for crawl tasks, link
//! resolution for extracted hrefs, domain extraction, and wildcard domain
//! matching for the challenge bypass routing.

mod normalize;

pub use normalize::{identity_key, normalize_url, strip_tracking};

use url::Url;

/// Extracts the lowercase host of a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sampletrace::url::extract_domain;
///
/// let url = Url::parse("https://WWW.Example.com/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("www.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Checks if a domain matches a pattern
///
/// `"example.com"` matches only itself; `"*.example.com"` matches the bare
/// domain and any subdomain depth.
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            candidate == base
                || candidate
                    .strip_suffix(base)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        }
        None => candidate == pattern,
    }
}

/// Returns true if the domain matches any of the patterns
pub fn matches_any<S: AsRef<str>>(patterns: &[S], candidate: &str) -> bool {
    patterns
        .iter()
        .any(|pattern| matches_wildcard(pattern.as_ref(), candidate))
}

/// Resolves an extracted href against the page it was found on
///
/// Returns None for empty hrefs, same-page anchors, non-navigational schemes
/// (`javascript:`, `mailto:`, `tel:`, `data:`) and anything that does not
/// resolve to HTTP(S). The fragment is dropped from the result.
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| href.starts_with(scheme))
    {
        return None;
    }

    let mut resolved = base_url.join(href).ok()?;
    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return None;
    }

    resolved.set_fragment(None);
    Some(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://www.example.com/Artist/Track/").unwrap()
    }

    #[test]
    fn test_extract_domain_lowercases() {
        let url = Url::parse("https://EXAMPLE.COM:8080/page").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_wildcard_matches_bare_and_subdomains() {
        assert!(matches_wildcard("*.example.com", "example.com"));
        assert!(matches_wildcard("*.example.com", "www.example.com"));
        assert!(matches_wildcard("*.example.com", "a.b.example.com"));
        assert!(!matches_wildcard("*.example.com", "badexample.com"));
        assert!(!matches_wildcard("*.example.com", "example.org"));
    }

    #[test]
    fn test_exact_pattern() {
        assert!(matches_wildcard("example.com", "example.com"));
        assert!(!matches_wildcard("example.com", "www.example.com"));
    }

    #[test]
    fn test_matches_any() {
        let patterns = vec!["other.net".to_string(), "*.example.com".to_string()];
        assert!(matches_any(&patterns, "www.example.com"));
        assert!(!matches_any(&patterns, "example.net"));
        assert!(!matches_any::<String>(&[], "example.com"));
    }

    #[test]
    fn test_resolve_relative_link() {
        let resolved = resolve_link("/sample/123/A-B/", &base_url()).unwrap();
        assert_eq!(resolved.as_str(), "https://www.example.com/sample/123/A-B/");
    }

    #[test]
    fn test_resolve_drops_fragment() {
        let resolved = resolve_link("/Other/Song/#comments", &base_url()).unwrap();
        assert_eq!(resolved.as_str(), "https://www.example.com/Other/Song/");
    }

    #[test]
    fn test_resolve_rejects_special_schemes() {
        assert!(resolve_link("javascript:void(0)", &base_url()).is_none());
        assert!(resolve_link("mailto:a@example.com", &base_url()).is_none());
        assert!(resolve_link("#top", &base_url()).is_none());
        assert!(resolve_link("   ", &base_url()).is_none());
        assert!(resolve_link("ftp://example.com/file", &base_url()).is_none());
    }
}
