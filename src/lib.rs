//! TCP Tunnel: transparent TCP relay with optional upstream proxy chaining
//!
//! This library accepts inbound TCP connections on a listening address and
//! relays each one, byte for byte, to a fixed target. Outbound connections are
//! made directly or through an upstream SOCKS5 / HTTP CONNECT proxy.
//!
//! # Main Features
//!
//! - Bidirectional relay that never inspects the forwarded bytes
//! - Dialer chain with SOCKS5 (`socks5://`, `socks5h://`) and HTTP CONNECT (`http://`) proxies
//! - Dial timeout and TCP keep-alive on both sides of every tunnel
//! - Supervised, bounded-time graceful shutdown of every in-flight connection
//!
//! # Example
//!
//! ```no_run
//! use tcp_tunnel::{Supervisor, GlobalLogger, Result};
//! use tcp_tunnel::config::TunnelConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = TunnelConfig::new("127.0.0.1:8080", "example.com:80")
//!         .with_proxy("socks5://127.0.0.1:1080");
//!
//!     let supervisor = Supervisor::new(&config, GlobalLogger::shared())?;
//!
//!     // Runs until Ctrl+C, then drains in-flight tunnels
//!     supervisor
//!         .run(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await
//! }
//! ```

// Public modules
pub mod common;
pub mod config;
pub mod dialer;
pub mod tunnel;

// Re-export commonly used structures and functions for convenience
pub use common::{GlobalLogger, ProxyError, Result, SharedLogger};
pub use dialer::{build_dialer, Dialer};
pub use tunnel::{Supervisor, SupervisorHandle, SupervisorState};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
