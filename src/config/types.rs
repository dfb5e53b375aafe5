use serde::Deserialize;

/// Main configuration structure for Sampletrace
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub politeness: PolitenessConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub challenge: ChallengeConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub seeds: SeedConfig,
}

/// Traversal limits and budgets
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Deepest "contains samples of" hop followed from a seed
    #[serde(rename = "forward-depth-limit", default = "default_depth_limit")]
    pub forward_depth_limit: u32,

    /// Deepest "was sampled in" hop followed from a seed
    #[serde(rename = "reverse-depth-limit", default = "default_depth_limit")]
    pub reverse_depth_limit: u32,

    /// Fetches allowed in flight against one domain (also the worker count)
    #[serde(
        rename = "concurrent-requests-per-domain",
        default = "default_concurrent_requests"
    )]
    pub concurrent_requests_per_domain: u32,

    /// Year-index pages fetched at most per seed
    #[serde(rename = "pagination-page-limit", default = "default_pagination_limit")]
    pub pagination_page_limit: u32,

    /// Pages followed per dedicated samples/sampled list
    #[serde(rename = "list-page-limit", default = "default_list_page_limit")]
    pub list_page_limit: u32,

    /// Request budget; 0 means unlimited
    #[serde(rename = "max-requests", default)]
    pub max_requests: u64,

    /// Wall-clock budget in seconds; 0 means unlimited
    #[serde(rename = "max-duration-secs", default)]
    pub max_duration_secs: u64,

    /// Whether robots.txt is fetched and honored
    #[serde(rename = "obey-robots", default = "default_true")]
    pub obey_robots: bool,
}

/// Pacing, backoff and retry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PolitenessConfig {
    /// Random delay drawn before each dispatch, `[min, max]` seconds
    #[serde(rename = "base-delay-range", default = "default_delay_range")]
    pub base_delay_range: [f64; 2],

    /// Factor applied to the delay range on every throttling signal
    #[serde(rename = "throttle-multiplier", default = "default_throttle_multiplier")]
    pub throttle_multiplier: f64,

    /// Ceiling for the effective delay range (seconds)
    #[serde(rename = "max-delay", default = "default_max_delay")]
    pub max_delay: f64,

    /// Factor applied to the backoff scale after a successful fetch
    #[serde(rename = "recovery-factor", default = "default_recovery_factor")]
    pub recovery_factor: f64,

    /// Retries allowed per task after the first attempt
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// HTTP status codes treated as transient
    #[serde(
        rename = "retryable-status-codes",
        default = "default_retryable_status_codes"
    )]
    pub retryable_status_codes: Vec<u16>,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Request identity rotation
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// User-agent strings, one drawn at random per request
    #[serde(rename = "user-agents", default = "default_user_agents")]
    pub user_agents: Vec<String>,

    /// Upstream proxies, one drawn at random per request when non-empty
    #[serde(default)]
    pub proxies: Vec<String>,

    /// Referer attached to requests below depth 0
    #[serde(default = "default_referer")]
    pub referer: Option<String>,

    /// Product token matched against robots.txt groups
    #[serde(rename = "robots-agent", default = "default_robots_agent")]
    pub robots_agent: String,
}

/// Challenge-solving bypass layer
#[derive(Debug, Clone, Deserialize)]
pub struct ChallengeConfig {
    /// Endpoint of a FlareSolverr-compatible solver; bypass is off when absent
    #[serde(rename = "solver-url", default)]
    pub solver_url: Option<String>,

    /// Domain patterns routed through the solver (e.g. "*.whosampled.com")
    #[serde(default = "default_challenge_domains")]
    pub domains: Vec<String>,

    /// Time the solver may spend on one page (milliseconds)
    #[serde(rename = "max-timeout-ms", default = "default_solver_timeout")]
    pub max_timeout_ms: u64,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// JSON-lines file receiving track records
    #[serde(rename = "tracks-path", default = "default_tracks_path")]
    pub tracks_path: String,

    /// JSON-lines file receiving sample edges
    #[serde(rename = "edges-path", default = "default_edges_path")]
    pub edges_path: String,

    /// Optional markdown run summary
    #[serde(rename = "summary-path", default)]
    pub summary_path: Option<String>,
}

/// Start URLs
#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    /// Year-index listing pages the crawl starts from
    #[serde(default = "default_seed_urls")]
    pub urls: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            forward_depth_limit: default_depth_limit(),
            reverse_depth_limit: default_depth_limit(),
            concurrent_requests_per_domain: default_concurrent_requests(),
            pagination_page_limit: default_pagination_limit(),
            list_page_limit: default_list_page_limit(),
            max_requests: 0,
            max_duration_secs: 0,
            obey_robots: true,
        }
    }
}

impl Default for PolitenessConfig {
    fn default() -> Self {
        Self {
            base_delay_range: default_delay_range(),
            throttle_multiplier: default_throttle_multiplier(),
            max_delay: default_max_delay(),
            recovery_factor: default_recovery_factor(),
            max_retries: default_max_retries(),
            retryable_status_codes: default_retryable_status_codes(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            user_agents: default_user_agents(),
            proxies: Vec::new(),
            referer: default_referer(),
            robots_agent: default_robots_agent(),
        }
    }
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            solver_url: None,
            domains: default_challenge_domains(),
            max_timeout_ms: default_solver_timeout(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            tracks_path: default_tracks_path(),
            edges_path: default_edges_path(),
            summary_path: None,
        }
    }
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            urls: default_seed_urls(),
        }
    }
}

fn default_depth_limit() -> u32 {
    5
}

fn default_concurrent_requests() -> u32 {
    1
}

fn default_pagination_limit() -> u32 {
    10
}

fn default_list_page_limit() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_delay_range() -> [f64; 2] {
    [10.0, 20.0]
}

fn default_throttle_multiplier() -> f64 {
    2.0
}

/// Longest delay, in seconds, the politeness policy will ever wait
pub const MAX_DELAY_LIMIT_SECS: f64 = 3600.0;

fn default_max_delay() -> f64 {
    120.0
}

fn default_recovery_factor() -> f64 {
    0.9
}

fn default_max_retries() -> u32 {
    5
}

fn default_retryable_status_codes() -> Vec<u16> {
    vec![403, 408, 429, 500, 502, 503, 504]
}

fn default_request_timeout() -> u64 {
    30
}

fn default_user_agents() -> Vec<String> {
    [
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:123.0) Gecko/20100101 Firefox/123.0",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edge/123.0.0.0 Safari/537.36",
    ]
    .iter()
    .map(|ua| ua.to_string())
    .collect()
}

fn default_referer() -> Option<String> {
    Some("https://www.whosampled.com/".to_string())
}

fn default_robots_agent() -> String {
    "sampletrace".to_string()
}

fn default_challenge_domains() -> Vec<String> {
    vec!["*.whosampled.com".to_string()]
}

fn default_solver_timeout() -> u64 {
    60_000
}

fn default_tracks_path() -> String {
    "data/tracks.jsonl".to_string()
}

fn default_edges_path() -> String {
    "data/edges.jsonl".to_string()
}

fn default_seed_urls() -> Vec<String> {
    vec!["https://www.whosampled.com/browse/year/2024/".to_string()]
}
