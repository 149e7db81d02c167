//! Error handling module
//!
//! This module defines the error types and result type aliases used in the application.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// TCP tunnel error type
#[derive(Error, Debug)]
pub enum ProxyError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error (invalid proxy URL, unsupported scheme, bad address)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The listener could not be bound
    #[error("could not start listening on {addr}: {source}")]
    Listen {
        /// Requested listen address
        addr: String,
        /// Underlying bind error
        #[source]
        source: io::Error,
    },

    /// The accept loop failed; listening stops
    #[error("error accepting connection: {0}")]
    Accept(#[source] io::Error),

    /// Outbound connection could not be established
    #[error("error dialing {addr}: {source}")]
    Dial {
        /// Address that was dialed
        addr: String,
        /// Underlying connect error
        #[source]
        source: io::Error,
    },

    /// Outbound connection did not complete within the dial timeout
    #[error("dialing {addr} timed out after {timeout:?}")]
    DialTimeout {
        /// Address that was dialed
        addr: String,
        /// Configured dial timeout
        timeout: Duration,
    },

    /// Upstream proxy refused or broke the handshake
    #[error("Proxy error: {0}")]
    Proxy(String),
}

impl ProxyError {
    /// Whether this error is fatal to the whole process
    ///
    /// Only configuration and listener failures propagate to the process boundary;
    /// dial errors are absorbed by the session that produced them.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProxyError::Config(_) | ProxyError::Listen { .. } | ProxyError::Accept(_)
        )
    }
}

/// Result type alias
///
/// This is a `Result` type alias that uses our custom `ProxyError`.
pub type Result<T> = std::result::Result<T, ProxyError>;
