//! Default configuration values
//!
//! Single source of truth for defaults.

/// Environment variable prefix for all configuration options
pub const ENV_PREFIX: &str = "TCP_TUNNEL_";

/// Default log level
pub const LOG_LEVEL_STR: &str = "info";

/// Default dial timeout in seconds
pub const DIAL_TIMEOUT_SECS: u64 = 10;

/// Default TCP keep-alive interval in seconds
pub const KEEPALIVE_SECS: u64 = 30;

/// Default copy buffer size (8KB)
pub const BUFFER_SIZE: usize = 8192;

/// Default shutdown grace period in seconds
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 10;
