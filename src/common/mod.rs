//! Common module
//!
//! This module contains shared types, errors, and utility functions used throughout the application.

pub mod error;
pub mod log;
pub mod net;

#[cfg(test)]
pub(crate) mod test_util;

// Re-export commonly used types and functions
pub use self::error::{ProxyError, Result};
pub use self::log::{init_logger, GlobalLogger, SharedLogger};
pub use self::net::{parse_host_port, set_keepalive};
