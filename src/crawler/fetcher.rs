//! HTTP fetcher implementation
//!
//! This module performs a single GET per call:
//! - Runs the request decorators (user agent, headers, referer, proxy)
//! - Picks the plain HTTP transport or, for configured domains, the
//!   challenge solver
//! - Detects challenge pages and maps non-2xx statuses to typed errors
//!
//! Pacing, retries and deduplication live elsewhere.

use crate::config::Config;
use crate::crawler::challenge::{detect_challenge, ChallengeSolver};
use crate::crawler::identity::{default_decorators, FetchRequest, RequestDecorator};
use crate::crawler::politeness::ThrottleSignal;
use crate::model::CrawlTask;
use crate::url::{extract_domain, matches_any};
use crate::TraceError;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{redirect::Policy, Client, Proxy};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Typed fetch failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("HTTP {code}")]
    Http { code: u16 },

    #[error("challenge page detected (via bypass: {via_bypass})")]
    Challenge { via_bypass: bool },

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to read body: {0}")]
    Body(String),
}

impl FetchError {
    /// The throttling signal this failure carries, if any
    pub fn throttle_signal(&self) -> Option<ThrottleSignal> {
        match self {
            Self::Http { code: code @ (403 | 429 | 503) } => Some(ThrottleSignal::Status(*code)),
            Self::Challenge { .. } => Some(ThrottleSignal::Challenge),
            _ => None,
        }
    }
}

/// A response as returned by a transport, before status checks
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// URL after redirects
    pub final_url: Url,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

/// A successfully fetched document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    /// URL after redirects
    pub url: Url,
    pub status: u16,
    pub body: String,
}

/// Something that can execute a prepared GET
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &FetchRequest) -> Result<RawResponse, FetchError>;
}

/// Plain reqwest transport with one client per configured proxy
pub struct HttpTransport {
    direct: Client,
    proxied: HashMap<String, Client>,
}

impl HttpTransport {
    /// Builds the direct client plus one client per proxy URL
    ///
    /// Redirects are followed up to 10 hops; gzip and brotli bodies are
    /// decoded by the client.
    pub fn new(timeout: Duration, proxies: &[String]) -> Result<Self, TraceError> {
        let direct = build_http_client(timeout, None)?;

        let mut proxied = HashMap::new();
        for proxy_url in proxies {
            let proxy = Proxy::all(proxy_url).map_err(|e| TraceError::Proxy {
                proxy: proxy_url.clone(),
                message: e.to_string(),
            })?;
            proxied.insert(proxy_url.clone(), build_http_client(timeout, Some(proxy))?);
        }

        Ok(Self { direct, proxied })
    }

    fn client_for(&self, proxy: Option<&str>) -> Result<&Client, FetchError> {
        match proxy {
            None => Ok(&self.direct),
            Some(p) => self
                .proxied
                .get(p)
                .ok_or_else(|| FetchError::Network(format!("unknown proxy {}", p))),
        }
    }
}

fn build_http_client(timeout: Duration, proxy: Option<Proxy>) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = proxy {
        builder = builder.proxy(proxy);
    }

    builder.build()
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &FetchRequest) -> Result<RawResponse, FetchError> {
        let client = self.client_for(request.proxy.as_deref())?;

        let response = client
            .get(request.url.clone())
            .headers(request.headers.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Network(e.to_string())
                }
            })?;

        let final_url = response.url().clone();
        let status = response.status().as_u16();
        let headers = response.headers().clone();

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Body(e.to_string())
            }
        })?;

        Ok(RawResponse {
            final_url,
            status,
            headers,
            body,
        })
    }
}

/// Executes single fetches with identity rotation and challenge routing
pub struct Fetcher {
    decorators: Vec<Box<dyn RequestDecorator>>,
    http: Arc<dyn Transport>,
    solver: Option<Arc<dyn Transport>>,
    bypass_domains: Vec<String>,
}

impl Fetcher {
    /// Builds the fetcher described by the configuration
    pub fn from_config(config: &Config) -> Result<Self, TraceError> {
        let http = HttpTransport::new(
            Duration::from_secs(config.politeness.request_timeout_secs),
            &config.identity.proxies,
        )?;

        let solver = ChallengeSolver::from_config(&config.challenge)?
            .map(|solver| Arc::new(solver) as Arc<dyn Transport>);

        if solver.is_some() {
            tracing::info!(
                "Challenge solver enabled for {}",
                config.challenge.domains.join(", ")
            );
        }

        Ok(Self::new(
            default_decorators(&config.identity),
            Arc::new(http),
            solver,
            config.challenge.domains.clone(),
        ))
    }

    pub fn new(
        decorators: Vec<Box<dyn RequestDecorator>>,
        http: Arc<dyn Transport>,
        solver: Option<Arc<dyn Transport>>,
        bypass_domains: Vec<String>,
    ) -> Self {
        Self {
            decorators,
            http,
            solver,
            bypass_domains,
        }
    }

    /// Fetches the page behind a crawl task
    pub async fn fetch(&self, task: &CrawlTask) -> Result<FetchedDocument, FetchError> {
        self.fetch_at_depth(&task.url, task.context.depth).await
    }

    /// Fetches an auxiliary URL (such as robots.txt) as if at depth 0
    pub async fn fetch_url(&self, url: &Url) -> Result<FetchedDocument, FetchError> {
        self.fetch_at_depth(url, 0).await
    }

    async fn fetch_at_depth(&self, url: &Url, depth: u32) -> Result<FetchedDocument, FetchError> {
        let request = self.prepare(url.clone(), depth);
        let (transport, via_bypass) = self.transport_for(url);

        let raw = transport.execute(&request).await?;

        if detect_challenge(raw.status, &raw.headers, &raw.body) {
            return Err(FetchError::Challenge { via_bypass });
        }

        if !(200..300).contains(&raw.status) {
            return Err(FetchError::Http { code: raw.status });
        }

        Ok(FetchedDocument {
            url: raw.final_url,
            status: raw.status,
            body: raw.body,
        })
    }

    /// Runs every decorator over a fresh request, in order
    pub fn prepare(&self, url: Url, depth: u32) -> FetchRequest {
        let mut request = FetchRequest::new(url, depth);
        for decorator in &self.decorators {
            decorator.decorate(&mut request);
        }
        request
    }

    /// The solver for bypass domains when one is configured, else plain HTTP
    fn transport_for(&self, url: &Url) -> (&dyn Transport, bool) {
        if let Some(solver) = &self.solver {
            let bypass = extract_domain(url)
                .is_some_and(|domain| matches_any(&self.bypass_domains, &domain));
            if bypass {
                return (solver.as_ref(), true);
            }
        }
        (self.http.as_ref(), false)
    }
}
