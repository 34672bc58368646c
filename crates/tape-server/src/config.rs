//! Server configuration management
//!
//! Handles loading configuration from TOML files, environment variables and
//! CLI arguments.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tape::{Credential, ProviderCredentials, USAGE_STAT_TARGET};
use thiserror::Error;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Port outside 1..=65535 or not a number.
    #[error("Invalid port number: {0}. Must be between 1 and 65535")]
    InvalidPort(String),

    /// Unknown log level name.
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// A setting with an unusable value.
    #[error("Invalid value for {name}: {value}")]
    InvalidValue {
        /// Setting name.
        name: &'static str,
        /// Rejected value.
        value: String,
    },

    /// Unreadable or malformed config file.
    #[error("Configuration file error: {0}")]
    FileError(String),
}

/// Log levels supported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Everything.
    Trace,
    /// Provider requests and session transitions.
    Debug,
    /// Lifecycle and fetch outcomes.
    #[default]
    Info,
    /// Recovered provider failures.
    Warn,
    /// Errors only.
    Error,
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(ConfigError::InvalidLogLevel(s.to_string())),
        }
    }
}

impl LogLevel {
    /// Convert log level to tracing filter string
    pub const fn as_filter_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Appends the directive that keeps fetch outcomes at `info` whatever the
/// base level is.
pub fn with_usage_stats(directives: &str) -> String {
    let directives = directives.trim();
    if directives.is_empty() {
        format!("{USAGE_STAT_TARGET}=info")
    } else {
        format!("{directives},{USAGE_STAT_TARGET}=info")
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Server configuration structure
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Log level
    pub log_level: LogLevel,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Directory served for paths no route matches
    pub static_dir: Option<PathBuf>,
    /// Answer exhausted market-data queries with a simulated series
    pub synthetic_fallback: bool,
    /// Bars seeded when simulating history
    pub history_len: usize,
    /// Live session tick period in milliseconds
    pub tick_interval_ms: u64,
    /// How often a live stream of provider data re-queries the chain
    pub poll_interval_ms: u64,
    /// Per-request timeout for upstream providers
    pub request_timeout_secs: Option<u64>,
    /// Alpha Vantage API key
    pub alphavantage_key: Credential,
    /// Finnhub API token
    pub finnhub_key: Credential,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: LogLevel::Info,
            log_json: false,
            static_dir: None,
            synthetic_fallback: false,
            history_len: 500,
            tick_interval_ms: 200,
            poll_interval_ms: 60_000,
            request_timeout_secs: None,
            alphavantage_key: Credential::none(),
            finnhub_key: Credential::none(),
        }
    }
}

impl ServerConfig {
    /// Create a new ServerConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    ///
    /// The result is not validated: later layers may still fix a value.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileError(format!("Failed to read config file: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::FileError(format!("Failed to parse TOML: {e}")))
    }

    /// Overrides settings from whatever `lookup` returns for each variable.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("TAPE_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("TAPE_PORT") {
            self.port = port.parse().map_err(|_| ConfigError::InvalidPort(port))?;
        }
        if let Some(log_level) = lookup("TAPE_LOG_LEVEL") {
            self.log_level = LogLevel::from_str(&log_level)?;
        }
        if let Some(json) = lookup("TAPE_LOG_JSON") {
            self.log_json = parse_flag("TAPE_LOG_JSON", &json)?;
        }
        if let Some(dir) = lookup("TAPE_STATIC_DIR") {
            self.static_dir = Some(PathBuf::from(dir));
        }
        if let Some(enabled) = lookup("TAPE_SYNTHETIC_FALLBACK") {
            self.synthetic_fallback = parse_flag("TAPE_SYNTHETIC_FALLBACK", &enabled)?;
        }
        if let Some(len) = lookup("TAPE_HISTORY_LEN") {
            self.history_len = parse_number("TAPE_HISTORY_LEN", &len)?;
        }
        if let Some(ms) = lookup("TAPE_TICK_INTERVAL_MS") {
            self.tick_interval_ms = parse_number("TAPE_TICK_INTERVAL_MS", &ms)?;
        }
        if let Some(ms) = lookup("TAPE_POLL_INTERVAL_MS") {
            self.poll_interval_ms = parse_number("TAPE_POLL_INTERVAL_MS", &ms)?;
        }
        if let Some(secs) = lookup("TAPE_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = Some(parse_number("TAPE_REQUEST_TIMEOUT_SECS", &secs)?);
        }
        if let Some(key) = lookup("ALPHAVANTAGE_KEY") {
            self.alphavantage_key = Credential::new(key);
        }
        if let Some(key) = lookup("FINNHUB_KEY") {
            self.finnhub_key = Credential::new(key);
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port.to_string()));
        }
        if self.history_len == 0 {
            return Err(ConfigError::InvalidValue {
                name: "history_len",
                value: "0".to_string(),
            });
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                name: "tick_interval_ms",
                value: "0".to_string(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                name: "poll_interval_ms",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Live session tick period.
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Re-query period for live streams of provider data.
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Upstream request timeout, if any.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Keys handed to the provider chain.
    pub fn credentials(&self) -> ProviderCredentials {
        ProviderCredentials {
            alphavantage: self.alphavantage_key.clone(),
            finnhub: self.finnhub_key.clone(),
        }
    }

    /// Merge with CLI arguments (CLI takes precedence)
    pub fn merge_with_cli(&mut self, cli: &CliArgs) -> Result<(), ConfigError> {
        if let Some(host) = &cli.host {
            self.host.clone_from(host);
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(log_level) = &cli.log_level {
            self.log_level = LogLevel::from_str(log_level)?;
        }
        if let Some(json) = cli.log_json {
            self.log_json = json;
        }
        if let Some(dir) = &cli.static_dir {
            self.static_dir = Some(dir.clone());
        }
        if let Some(enabled) = cli.synthetic_fallback {
            self.synthetic_fallback = enabled;
        }
        Ok(())
    }
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
        }),
    }
}

fn parse_number<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: value.to_string(),
    })
}

/// CLI arguments structure
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Config file path
    pub config_file: Option<PathBuf>,
    /// Host address override
    pub host: Option<String>,
    /// Port override
    pub port: Option<u16>,
    /// Log level override
    pub log_level: Option<String>,
    /// JSON logs override
    pub log_json: Option<bool>,
    /// Static asset directory override
    pub static_dir: Option<PathBuf>,
    /// Synthetic fallback override
    pub synthetic_fallback: Option<bool>,
}

/// Build configuration from all sources
///
/// Priority (highest to lowest):
/// 1. CLI arguments
/// 2. Environment variables
/// 3. Config file
/// 4. Default values
pub fn build_config(cli: &CliArgs) -> Result<ServerConfig, ConfigError> {
    build_config_with(cli, |name| std::env::var(name).ok())
}

/// [`build_config`] with an explicit environment lookup.
pub fn build_config_with<F>(cli: &CliArgs, lookup: F) -> Result<ServerConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match &cli.config_file {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };

    config.apply_env(lookup)?;
    config.merge_with_cli(cli)?;
    config.validate()?;

    Ok(config)
}
