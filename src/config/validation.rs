use crate::config::types::{
    ChallengeConfig, Config, CrawlerConfig, IdentityConfig, OutputConfig, PolitenessConfig,
    SeedConfig, MAX_DELAY_LIMIT_SECS,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_politeness_config(&config.politeness)?;
    validate_identity_config(&config.identity)?;
    validate_challenge_config(&config.challenge)?;
    validate_output_config(&config.output)?;
    validate_seeds(&config.seeds)?;
    Ok(())
}

/// Validates traversal limits
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.concurrent_requests_per_domain < 1 || config.concurrent_requests_per_domain > 16 {
        return Err(ConfigError::Validation(format!(
            "concurrent-requests-per-domain must be between 1 and 16, got {}",
            config.concurrent_requests_per_domain
        )));
    }

    if config.pagination_page_limit < 1 {
        return Err(ConfigError::Validation(
            "pagination-page-limit must be >= 1".to_string(),
        ));
    }

    if config.list_page_limit < 1 {
        return Err(ConfigError::Validation(
            "list-page-limit must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates pacing and retry settings
fn validate_politeness_config(config: &PolitenessConfig) -> Result<(), ConfigError> {
    let [min, max] = config.base_delay_range;

    if !min.is_finite() || !max.is_finite() || min < 0.0 {
        return Err(ConfigError::Validation(format!(
            "base-delay-range must be finite and non-negative, got [{}, {}]",
            min, max
        )));
    }

    if min > max {
        return Err(ConfigError::Validation(format!(
            "base-delay-range minimum {} exceeds maximum {}",
            min, max
        )));
    }

    if !config.max_delay.is_finite() || config.max_delay < max {
        return Err(ConfigError::Validation(format!(
            "max-delay must be >= the base delay maximum ({}), got {}",
            max, config.max_delay
        )));
    }

    if config.max_delay > MAX_DELAY_LIMIT_SECS {
        return Err(ConfigError::Validation(format!(
            "max-delay must be at most {} seconds, got {}",
            MAX_DELAY_LIMIT_SECS, config.max_delay
        )));
    }

    if !(config.throttle_multiplier >= 1.0) {
        return Err(ConfigError::Validation(format!(
            "throttle-multiplier must be >= 1.0, got {}",
            config.throttle_multiplier
        )));
    }

    if !(config.recovery_factor > 0.0 && config.recovery_factor <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "recovery-factor must be in (0, 1], got {}",
            config.recovery_factor
        )));
    }

    if let Some(code) = config
        .retryable_status_codes
        .iter()
        .find(|code| !(100..=599).contains(*code))
    {
        return Err(ConfigError::Validation(format!(
            "retryable-status-codes contains invalid HTTP status {}",
            code
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user-agent and proxy pools
fn validate_identity_config(config: &IdentityConfig) -> Result<(), ConfigError> {
    if config.user_agents.is_empty() {
        return Err(ConfigError::Validation(
            "user-agents must contain at least one entry".to_string(),
        ));
    }

    if config.user_agents.iter().any(|ua| ua.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "user-agents cannot contain empty strings".to_string(),
        ));
    }

    for proxy in &config.proxies {
        validate_service_url("proxy", proxy, &["http", "https", "socks5", "socks5h"])?;
    }

    if let Some(referer) = config.referer.as_deref().filter(|r| !r.is_empty()) {
        validate_service_url("referer", referer, &["http", "https"])?;
    }

    if config.robots_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "robots-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the challenge bypass settings
fn validate_challenge_config(config: &ChallengeConfig) -> Result<(), ConfigError> {
    if let Some(solver) = &config.solver_url {
        validate_service_url("solver-url", solver, &["http", "https"])?;
    }

    for pattern in &config.domains {
        validate_domain_pattern(pattern)?;
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.tracks_path.is_empty() {
        return Err(ConfigError::Validation(
            "tracks-path cannot be empty".to_string(),
        ));
    }

    if config.edges_path.is_empty() {
        return Err(ConfigError::Validation(
            "edges-path cannot be empty".to_string(),
        ));
    }

    if config.tracks_path == config.edges_path {
        return Err(ConfigError::Validation(
            "tracks-path and edges-path must differ".to_string(),
        ));
    }

    Ok(())
}

/// Validates the seed list
fn validate_seeds(config: &SeedConfig) -> Result<(), ConfigError> {
    if config.urls.is_empty() {
        return Err(ConfigError::Validation(
            "at least one seed URL is required".to_string(),
        ));
    }

    for seed in &config.urls {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use HTTP or HTTPS",
                seed
            )));
        }
    }

    Ok(())
}

/// Validates a URL for an external service and checks its scheme
fn validate_service_url(field: &str, value: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use one of: {}",
            field,
            value,
            schemes.join(", ")
        )));
    }

    Ok(())
}

/// Validates a domain pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    validate_domain_string(pattern.strip_prefix("*.").unwrap_or(pattern))
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with(['.', '-']) || domain.ends_with(['.', '-']) {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
    }

    Ok(())
}
