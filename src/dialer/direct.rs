//! Direct TCP dialer

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::common::{set_keepalive, ProxyError, Result};
use super::Dialer;

/// Dials the target directly over TCP
#[derive(Debug, Clone)]
pub struct DirectDialer {
    timeout: Duration,
    keepalive: Duration,
}

impl DirectDialer {
    /// Create a direct dialer
    ///
    /// # Parameters
    ///
    /// * `timeout` - Connect deadline
    /// * `keepalive` - TCP keep-alive interval applied to dialed streams, zero disables
    pub fn new(timeout: Duration, keepalive: Duration) -> Self {
        Self { timeout, keepalive }
    }
}

#[async_trait]
impl Dialer for DirectDialer {
    async fn dial(&self, addr: &str) -> Result<TcpStream> {
        let stream = match timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(ProxyError::Dial {
                    addr: addr.to_string(),
                    source,
                })
            }
            Err(_) => {
                return Err(ProxyError::DialTimeout {
                    addr: addr.to_string(),
                    timeout: self.timeout,
                })
            }
        };

        if let Err(e) = set_keepalive(&stream, self.keepalive) {
            warn!("could not enable keep-alive for {}: {}", addr, e);
        }
        debug!("Dialed {} directly", addr);

        Ok(stream)
    }
}
