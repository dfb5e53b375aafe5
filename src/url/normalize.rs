use crate::UrlError;
use url::{Position, Url};

/// Query parameters that never change the document served
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "mc_eid", "ref", "source", "cid", "_ga",
];

/// Normalizes a URL for comparison
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or not HTTP(S)
/// 2. Lowercase the host and remove a `www.` prefix
/// 3. Normalize the path: drop dot segments and empty segments, drop the
///    trailing slash (except for root `/`)
/// 4. Remove the fragment
/// 5. Remove tracking query parameters (`utm_*` and friends), sort the rest,
///    and drop an empty query string
///
/// The scheme is left alone so the result stays fetchable against plain-HTTP
/// test servers; [`identity_key`] ignores it.
///
/// # Examples
///
/// ```
/// use sampletrace::url::normalize_url;
///
/// let url = normalize_url("https://WWW.EXAMPLE.COM/Artist/Track/?utm_source=x").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/Artist/Track");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .ok_or(UrlError::MissingDomain)?
        .to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    let path = normalize_path(url.path());
    url.set_path(&path);

    strip_tracking(&mut url);
    sort_query(&mut url);

    Ok(url)
}

/// Returns the canonical identity key for a URL
///
/// Two URLs that differ only in scheme, `www.` prefix, host case, trailing
/// slash, fragment, tracking parameters or query order share a key.
pub fn identity_key(url: &Url) -> Result<String, UrlError> {
    let normalized = normalize_url(url.as_str())?;
    Ok(normalized[Position::BeforeHost..].to_string())
}

/// Removes the fragment and tracking parameters in place, leaving the path
/// exactly as the site linked it
pub fn strip_tracking(url: &mut Url) {
    url.set_fragment(None);

    if url.query().is_none() {
        return;
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
}

/// Sorts query parameters by key so parameter order never splits identity
fn sort_query(url: &mut Url) {
    if url.query().is_none() {
        return;
    }

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();

    url.query_pairs_mut().clear().extend_pairs(params);
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    format!("/{}", segments.join("/"))
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}
