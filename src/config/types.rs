//! Configuration types
//!
//! This module contains the main configuration types used throughout the application.

use std::path::Path;
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::common::parse_host_port;
use crate::config::defaults::{
    BUFFER_SIZE, DIAL_TIMEOUT_SECS, KEEPALIVE_SECS, LOG_LEVEL_STR, SHUTDOWN_TIMEOUT_SECS,
};
use crate::config::error::{ConfigError, Result};
use crate::config::validator::validate_config;

/// Partial configuration values
///
/// Every field is optional so that values from several sources (defaults, file,
/// environment, command line) can be layered on top of each other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigValues {
    /// Listen address (host:port)
    #[serde(default)]
    pub listen: Option<String>,

    /// Target address (host:port)
    #[serde(default)]
    pub target: Option<String>,

    /// Upstream proxy URL (scheme://[user[:pass]@]host:port/)
    #[serde(default)]
    pub proxy: Option<String>,

    /// Dial timeout in seconds
    #[serde(default, alias = "timeout")]
    pub dial_timeout: Option<u64>,

    /// TCP keep-alive interval in seconds, 0 disables
    #[serde(default)]
    pub keepalive: Option<u64>,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default)]
    pub log_level: Option<String>,

    /// Buffer size for data transfer (in bytes)
    #[serde(default)]
    pub buffer_size: Option<usize>,

    /// Shutdown grace period in seconds
    #[serde(default)]
    pub shutdown_timeout: Option<u64>,
}

impl ConfigValues {
    /// Default values for every option that has one
    pub fn defaults() -> Self {
        Self {
            listen: None,
            target: None,
            proxy: None,
            dial_timeout: Some(DIAL_TIMEOUT_SECS),
            keepalive: Some(KEEPALIVE_SECS),
            log_level: Some(LOG_LEVEL_STR.to_string()),
            buffer_size: Some(BUFFER_SIZE),
            shutdown_timeout: Some(SHUTDOWN_TIMEOUT_SECS),
        }
    }

    /// Layer `other` on top of `self`; values present in `other` win
    pub fn merge(self, other: ConfigValues) -> Self {
        Self {
            listen: other.listen.or(self.listen),
            target: other.target.or(self.target),
            proxy: other.proxy.or(self.proxy),
            dial_timeout: other.dial_timeout.or(self.dial_timeout),
            keepalive: other.keepalive.or(self.keepalive),
            log_level: other.log_level.or(self.log_level),
            buffer_size: other.buffer_size.or(self.buffer_size),
            shutdown_timeout: other.shutdown_timeout.or(self.shutdown_timeout),
        }
    }

    /// Load values from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileReadError(path.to_path_buf(), e.to_string()))?;

        let values: ConfigValues = serde_json::from_str(&content)?;
        debug!("Loaded configuration values from {}", path.display());
        Ok(values)
    }

    /// Load values from environment variables with the given prefix
    pub fn from_env(prefix: &str) -> Result<Self> {
        Self::from_lookup(prefix, |name| std::env::var(name).ok())
    }

    /// Load values through an arbitrary variable lookup
    pub fn from_lookup<F>(prefix: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{}{}", prefix, name)).filter(|v| !v.is_empty());

        Ok(Self {
            listen: get("LISTEN"),
            target: get("TARGET"),
            proxy: get("PROXY"),
            dial_timeout: get("TIMEOUT").map(|v| parse_number("TIMEOUT", &v)).transpose()?,
            keepalive: get("KEEPALIVE").map(|v| parse_number("KEEPALIVE", &v)).transpose()?,
            log_level: get("LOG_LEVEL"),
            buffer_size: get("BUFFER_SIZE")
                .map(|v| parse_number("BUFFER_SIZE", &v))
                .transpose()?,
            shutdown_timeout: get("SHUTDOWN_TIMEOUT")
                .map(|v| parse_number("SHUTDOWN_TIMEOUT", &v))
                .transpose()?,
        })
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_lowercase(), e.to_string()))
}

/// Resolved tunnel configuration
///
/// Immutable once built; shared read-only by the supervisor and every session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelConfig {
    /// Listen address (host:port)
    pub listen: String,
    /// Target address (host:port)
    pub target: String,
    /// Upstream proxy URL
    pub proxy: Option<String>,
    /// Deadline for establishing each outbound connection
    pub dial_timeout: Duration,
    /// TCP keep-alive idle time for both sides of a tunnel
    pub keepalive: Duration,
    /// Log level
    pub log_level: String,
    /// Per-direction copy buffer size
    pub buffer_size: usize,
    /// Grace period for in-flight sessions at shutdown
    pub shutdown_timeout: Duration,
}

impl TunnelConfig {
    /// Create a configuration with default tuning for the given addresses
    pub fn new(listen: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            listen: listen.into(),
            target: target.into(),
            proxy: None,
            dial_timeout: Duration::from_secs(DIAL_TIMEOUT_SECS),
            keepalive: Duration::from_secs(KEEPALIVE_SECS),
            log_level: LOG_LEVEL_STR.to_string(),
            buffer_size: BUFFER_SIZE,
            shutdown_timeout: Duration::from_secs(SHUTDOWN_TIMEOUT_SECS),
        }
    }

    /// Resolve layered values into a validated configuration
    pub fn from_values(values: ConfigValues) -> Result<Self> {
        let values = ConfigValues::defaults().merge(values);

        let listen = values
            .listen
            .ok_or_else(|| ConfigError::MissingRequiredValue("listen".to_string()))?;
        let target = values
            .target
            .ok_or_else(|| ConfigError::MissingRequiredValue("target".to_string()))?;

        let listen = parse_host_port(&listen)
            .map_err(|e| ConfigError::InvalidValue("listen".to_string(), e.to_string()))?;
        let target = parse_host_port(&target)
            .map_err(|e| ConfigError::InvalidValue("target".to_string(), e.to_string()))?;

        let config = Self {
            listen,
            target,
            proxy: values.proxy.filter(|p| !p.trim().is_empty()),
            dial_timeout: Duration::from_secs(values.dial_timeout.unwrap_or(DIAL_TIMEOUT_SECS)),
            keepalive: Duration::from_secs(values.keepalive.unwrap_or(KEEPALIVE_SECS)),
            log_level: values.log_level.unwrap_or_else(|| LOG_LEVEL_STR.to_string()),
            buffer_size: values.buffer_size.unwrap_or(BUFFER_SIZE),
            shutdown_timeout: Duration::from_secs(
                values.shutdown_timeout.unwrap_or(SHUTDOWN_TIMEOUT_SECS),
            ),
        };

        validate_config(&config)?;
        Ok(config)
    }

    /// Set the upstream proxy URL
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Set the shutdown grace period
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the dial timeout
    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Log the resolved configuration at debug level
    pub fn log(&self) {
        debug!("  listen: {}", self.listen);
        debug!("  target: {}", self.target);
        debug!("  proxy: {}", self.proxy.as_deref().map(redact_proxy).unwrap_or_else(|| "none".to_string()));
        debug!("  dial_timeout: {:?}", self.dial_timeout);
        debug!("  keepalive: {:?}", self.keepalive);
        debug!("  buffer_size: {}", self.buffer_size);
        debug!("  shutdown_timeout: {:?}", self.shutdown_timeout);
    }
}

/// Strip credentials from a proxy URL before it is logged
pub fn redact_proxy(proxy: &str) -> String {
    match url::Url::parse(proxy) {
        Ok(mut url) if !url.username().is_empty() || url.password().is_some() => {
            let _ = url.set_username("***");
            let _ = url.set_password(None);
            url.to_string()
        }
        Ok(url) => url.to_string(),
        Err(_) => proxy.to_string(),
    }
}
