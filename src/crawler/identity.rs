//! Request decorators
//!
//! Each decorator has one job (user agent, browser headers, referer, proxy)
//! and is applied in order by the fetcher before a request goes out. None of
//! them keeps state between requests.

use crate::config::IdentityConfig;
use rand::seq::SliceRandom;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, REFERER,
    UPGRADE_INSECURE_REQUESTS, USER_AGENT,
};
use url::Url;

/// An outgoing GET before it is handed to a transport
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: Url,
    pub headers: HeaderMap,
    /// Upstream proxy URL chosen for this request
    pub proxy: Option<String>,
    /// Depth of the task being fetched; 0 for seeds and robots.txt
    pub depth: u32,
}

impl FetchRequest {
    pub fn new(url: Url, depth: u32) -> Self {
        Self {
            url,
            headers: HeaderMap::new(),
            proxy: None,
            depth,
        }
    }
}

/// One step of request preparation
pub trait RequestDecorator: Send + Sync {
    fn name(&self) -> &'static str;

    fn decorate(&self, request: &mut FetchRequest);
}

/// Sets a user agent drawn at random from the pool
pub struct UserAgentRotation {
    pool: Vec<HeaderValue>,
}

impl UserAgentRotation {
    pub fn new(user_agents: &[String]) -> Self {
        let pool = user_agents
            .iter()
            .filter_map(|ua| match HeaderValue::from_str(ua) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring user agent with invalid characters: {:?}", ua);
                    None
                }
            })
            .collect();
        Self { pool }
    }
}

impl RequestDecorator for UserAgentRotation {
    fn name(&self) -> &'static str {
        "user-agent"
    }

    fn decorate(&self, request: &mut FetchRequest) {
        if let Some(ua) = self.pool.choose(&mut rand::thread_rng()) {
            tracing::debug!("User agent for {}: {:?}", request.url, ua);
            request.headers.insert(USER_AGENT, ua.clone());
        }
    }
}

/// Adds the headers a desktop browser sends with a page navigation
///
/// `Accept-Encoding` is left to the HTTP client, which decodes the body.
pub struct BrowserHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl Default for BrowserHeaders {
    fn default() -> Self {
        let headers = vec![
            (
                ACCEPT,
                HeaderValue::from_static(
                    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
                ),
            ),
            (ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9")),
            (UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1")),
            (
                HeaderName::from_static("sec-fetch-dest"),
                HeaderValue::from_static("document"),
            ),
            (
                HeaderName::from_static("sec-fetch-mode"),
                HeaderValue::from_static("navigate"),
            ),
            (
                HeaderName::from_static("sec-fetch-site"),
                HeaderValue::from_static("none"),
            ),
            (
                HeaderName::from_static("sec-fetch-user"),
                HeaderValue::from_static("?1"),
            ),
            (CACHE_CONTROL, HeaderValue::from_static("max-age=0")),
        ];
        Self { headers }
    }
}

impl RequestDecorator for BrowserHeaders {
    fn name(&self) -> &'static str {
        "browser-headers"
    }

    fn decorate(&self, request: &mut FetchRequest) {
        for (name, value) in &self.headers {
            if !request.headers.contains_key(name) {
                request.headers.insert(name.clone(), value.clone());
            }
        }
    }
}

/// Sets a fixed referer on requests below the seed level
pub struct RefererHeader {
    referer: HeaderValue,
}

impl RefererHeader {
    /// Returns None when the referer is empty or not a valid header value
    pub fn new(referer: &str) -> Option<Self> {
        if referer.trim().is_empty() {
            return None;
        }
        HeaderValue::from_str(referer)
            .ok()
            .map(|referer| Self { referer })
    }
}

impl RequestDecorator for RefererHeader {
    fn name(&self) -> &'static str {
        "referer"
    }

    fn decorate(&self, request: &mut FetchRequest) {
        if request.depth > 0 && !request.headers.contains_key(REFERER) {
            request.headers.insert(REFERER, self.referer.clone());
        }
    }
}

/// Routes each request through a proxy drawn at random from the pool
pub struct ProxyRotation {
    pool: Vec<String>,
}

impl ProxyRotation {
    pub fn new(proxies: Vec<String>) -> Self {
        Self { pool: proxies }
    }
}

impl RequestDecorator for ProxyRotation {
    fn name(&self) -> &'static str {
        "proxy"
    }

    fn decorate(&self, request: &mut FetchRequest) {
        if let Some(proxy) = self.pool.choose(&mut rand::thread_rng()) {
            tracing::debug!("Proxy for {}: {}", request.url, proxy);
            request.proxy = Some(proxy.clone());
        }
    }
}

/// Builds the standard decorator chain from the identity configuration
///
/// Order: user agent, browser headers, referer (if configured), proxy (if
/// the pool is non-empty).
pub fn default_decorators(config: &IdentityConfig) -> Vec<Box<dyn RequestDecorator>> {
    let mut decorators: Vec<Box<dyn RequestDecorator>> = vec![
        Box::new(UserAgentRotation::new(&config.user_agents)),
        Box::new(BrowserHeaders::default()),
    ];

    if let Some(referer) = config.referer.as_deref().and_then(RefererHeader::new) {
        decorators.push(Box::new(referer));
    }

    if !config.proxies.is_empty() {
        decorators.push(Box::new(ProxyRotation::new(config.proxies.clone())));
    }

    decorators
}
