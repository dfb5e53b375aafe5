use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Reads, parses and validates the TOML file at `path`
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - The validated configuration, defaults filled in
/// * `Err(ConfigError)` - The file could not be read, parsed or validated
///
/// # Example
///
/// ```no_run
/// use sampletrace::config::load_config;
/// use std::path::Path;
///
/// let config = load_config(Path::new("sampletrace.toml")).unwrap();
/// println!("Seeds: {}", config.seeds.urls.len());
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    parse_config(&fs::read_to_string(path)?)
}

/// Parses and validates configuration from TOML text
///
/// # Example
///
/// ```
/// use sampletrace::config::parse_config;
///
/// let config = parse_config("[seeds]\nurls = [\"https://www.example.com/browse/\"]").unwrap();
/// assert_eq!(config.crawler.forward_depth_limit, 5);
/// ```
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Hex SHA-256 fingerprint of a configuration file
///
/// Logged at startup and written into the run summary so two runs can be
/// compared for configuration drift.
///
/// # Returns
///
/// * `Ok(String)` - 64 lowercase hex digits
/// * `Err(ConfigError)` - The file could not be read
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    Ok(fingerprint(&fs::read_to_string(path)?))
}

/// Loads a configuration together with its fingerprint, reading the file once
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok((Config, String))` - The validated configuration and the hex
///   SHA-256 of the exact bytes it was parsed from
/// * `Err(ConfigError)` - The file could not be read, parsed or validated
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, fingerprint(&content)))
}

fn fingerprint(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}
