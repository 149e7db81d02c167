//! Configuration module
//!
//! Layered configuration for the tunnel: built-in defaults, an optional JSON
//! file, `TCP_TUNNEL_*` environment variables and command line flags, applied
//! in that order.

pub mod builder;
pub mod defaults;
pub mod error;
pub mod types;
pub mod validator;

pub use builder::{ConfigBuilder, ConfigSource, DefaultSource, EnvSource, FileSource};
pub use defaults::ENV_PREFIX;
pub use error::ConfigError;
pub use types::{redact_proxy, ConfigValues, TunnelConfig};
pub use validator::{check_warnings, validate_config};
