//! Anti-bot challenge detection and the solver-backed transport
//!
//! The solver speaks the FlareSolverr v1 protocol: one JSON `request.get`
//! command per page, answered with the final URL, status, headers and the
//! already-decoded body.

use crate::config::ChallengeConfig;
use crate::crawler::fetcher::{FetchError, RawResponse, Transport};
use crate::crawler::identity::FetchRequest;
use crate::TraceError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_ENCODING, CONTENT_LENGTH};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Body fragments that only appear on challenge interstitials
const CHALLENGE_MARKERS: &[&str] = &[
    "<title>Just a moment...</title>",
    "cf-browser-verification",
    "challenge-platform",
    "cf_chl_opt",
];

/// Returns true if a response is a bot-challenge page rather than content
///
/// A `cf-mitigated: challenge` header is conclusive. Otherwise a 403 or 503
/// whose body carries a known challenge marker counts.
pub fn detect_challenge(status: u16, headers: &HeaderMap, body: &str) -> bool {
    let mitigated = headers
        .get("cf-mitigated")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("challenge"));

    if mitigated {
        return true;
    }

    matches!(status, 403 | 503) && CHALLENGE_MARKERS.iter().any(|m| body.contains(m))
}

/// Drops headers that describe the transfer encoding of a body the solver
/// has already decoded
pub fn normalize_headers(headers: &mut HeaderMap) {
    headers.remove(CONTENT_ENCODING);
    headers.remove(CONTENT_LENGTH);
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SolverCommand<'a> {
    cmd: &'static str,
    url: &'a str,
    max_timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    proxy: Option<SolverProxy<'a>>,
}

#[derive(Debug, Serialize)]
struct SolverProxy<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct SolverReply {
    status: String,
    #[serde(default)]
    message: String,
    solution: Option<SolverSolution>,
}

#[derive(Debug, Deserialize)]
struct SolverSolution {
    url: String,
    status: u16,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default)]
    response: String,
}

/// Transport that fetches pages through a challenge-solving service
pub struct ChallengeSolver {
    client: Client,
    endpoint: Url,
    max_timeout_ms: u64,
}

impl ChallengeSolver {
    /// Builds a solver transport, or None when no solver URL is configured
    pub fn from_config(config: &ChallengeConfig) -> Result<Option<Self>, TraceError> {
        let Some(endpoint) = &config.solver_url else {
            return Ok(None);
        };

        let endpoint = Url::parse(endpoint)?;
        // Solver budget plus connection overhead
        let client = Client::builder()
            .timeout(Duration::from_millis(config.max_timeout_ms) + Duration::from_secs(10))
            .build()?;

        Ok(Some(Self {
            client,
            endpoint,
            max_timeout_ms: config.max_timeout_ms,
        }))
    }

    fn solution_to_response(solution: SolverSolution) -> Result<RawResponse, FetchError> {
        let final_url = Url::parse(&solution.url)
            .map_err(|e| FetchError::Body(format!("solver returned bad URL: {}", e)))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &solution.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }
        normalize_headers(&mut headers);

        Ok(RawResponse {
            final_url,
            status: solution.status,
            headers,
            body: solution.response,
        })
    }
}

#[async_trait]
impl Transport for ChallengeSolver {
    async fn execute(&self, request: &FetchRequest) -> Result<RawResponse, FetchError> {
        let command = SolverCommand {
            cmd: "request.get",
            url: request.url.as_str(),
            max_timeout: self.max_timeout_ms,
            proxy: request.proxy.as_deref().map(|url| SolverProxy { url }),
        };

        tracing::debug!("Routing {} through challenge solver", request.url);

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&command)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Network(format!("challenge solver unreachable: {}", e))
                }
            })?;

        let reply: SolverReply = response
            .json()
            .await
            .map_err(|e| FetchError::Body(format!("unreadable solver reply: {}", e)))?;

        match reply.solution {
            Some(solution) if reply.status == "ok" => Self::solution_to_response(solution),
            _ => {
                tracing::warn!(
                    "Challenge solver failed for {}: {} {}",
                    request.url,
                    reply.status,
                    reply.message
                );
                Err(FetchError::Challenge { via_bypass: true })
            }
        }
    }
}
