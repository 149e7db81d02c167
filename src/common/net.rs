//! Network utility functions
//!
//! This module provides utility functions for network operations.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpStream;

use super::error::{ProxyError, Result};

/// Validate a `host:port` address without resolving it
///
/// Host names are accepted as-is (resolution happens at dial time, possibly on
/// the far side of a proxy); the port must be numeric.
///
/// # Returns
///
/// The normalized address string
pub fn parse_host_port(addr: &str) -> Result<String> {
    let addr = addr.trim();

    if SocketAddr::from_str(addr).is_ok() {
        return Ok(addr.to_string());
    }

    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| ProxyError::Config(format!("Address must be <host>:<port>: {}", addr)))?;

    if host.is_empty() {
        return Err(ProxyError::Config(format!("Missing host in address: {}", addr)));
    }

    // Bare IPv6 without brackets is ambiguous
    if host.contains(':') && !(host.starts_with('[') && host.ends_with(']')) {
        return Err(ProxyError::Config(format!(
            "IPv6 hosts must be bracketed: {}",
            addr
        )));
    }

    port.parse::<u16>()
        .map_err(|e| ProxyError::Config(format!("Invalid port in address {}: {}", addr, e)))?;

    Ok(addr.to_string())
}

/// Enable TCP keep-alive on a connected stream
///
/// A zero interval leaves the socket untouched.
pub fn set_keepalive(stream: &TcpStream, interval: Duration) -> Result<()> {
    if interval.is_zero() {
        return Ok(());
    }

    let keepalive = TcpKeepalive::new().with_time(interval);
    SockRef::from(stream).set_tcp_keepalive(&keepalive)?;

    Ok(())
}
