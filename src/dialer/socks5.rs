//! SOCKS5 proxy dialer

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_socks::tcp::Socks5Stream;

use crate::common::{ProxyError, Result};
use super::{Credentials, Dialer};

/// Routes connections through a SOCKS5 proxy
///
/// The proxy itself is reached through the wrapped `forward` dialer. Target
/// host names are sent to the proxy unresolved.
pub struct Socks5Dialer {
    proxy_addr: String,
    credentials: Option<Credentials>,
    forward: Arc<dyn Dialer>,
    timeout: Duration,
}

impl Socks5Dialer {
    /// Create a SOCKS5 dialer for the proxy at `proxy_addr`
    pub fn new(
        proxy_addr: String,
        credentials: Option<Credentials>,
        forward: Arc<dyn Dialer>,
        timeout: Duration,
    ) -> Self {
        Self {
            proxy_addr,
            credentials,
            forward,
            timeout,
        }
    }

    async fn connect(&self, addr: &str) -> Result<TcpStream> {
        let stream = self.forward.dial(&self.proxy_addr).await?;

        let stream = match &self.credentials {
            Some(creds) => {
                Socks5Stream::connect_with_password_and_socket(
                    stream,
                    addr,
                    &creds.username,
                    &creds.password,
                )
                .await
            }
            None => Socks5Stream::connect_with_socket(stream, addr).await,
        }
        .map_err(|e| {
            ProxyError::Proxy(format!(
                "socks5 proxy {} could not reach {}: {}",
                self.proxy_addr, addr, e
            ))
        })?;

        Ok(stream.into_inner())
    }
}

#[async_trait]
impl Dialer for Socks5Dialer {
    /// The proxy hop and the handshake share one deadline
    async fn dial(&self, addr: &str) -> Result<TcpStream> {
        let stream = timeout(self.timeout, self.connect(addr))
            .await
            .map_err(|_| ProxyError::DialTimeout {
                addr: addr.to_string(),
                timeout: self.timeout,
            })??;

        debug!("Dialed {} via socks5 proxy {}", addr, self.proxy_addr);
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::test_util::{spawn_silent_listener, DelayedDialer};
    use crate::dialer::DirectDialer;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal no-auth SOCKS5 server that relays a single CONNECT
    async fn spawn_socks5_server(reply: u8) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (mut client, _) = listener.accept().await.unwrap();

            let mut greeting = [0u8; 2];
            client.read_exact(&mut greeting).await.unwrap();
            let mut methods = vec![0u8; greeting[1] as usize];
            client.read_exact(&mut methods).await.unwrap();
            client.write_all(&[5, 0]).await.unwrap();

            let mut head = [0u8; 4];
            client.read_exact(&mut head).await.unwrap();
            let target = match head[3] {
                1 => {
                    let mut ip = [0u8; 4];
                    client.read_exact(&mut ip).await.unwrap();
                    let port = client.read_u16().await.unwrap();
                    format!("{}.{}.{}.{}:{}", ip[0], ip[1], ip[2], ip[3], port)
                }
                3 => {
                    let len = client.read_u8().await.unwrap() as usize;
                    let mut host = vec![0u8; len];
                    client.read_exact(&mut host).await.unwrap();
                    let port = client.read_u16().await.unwrap();
                    format!("{}:{}", String::from_utf8(host).unwrap(), port)
                }
                other => panic!("unexpected address type {}", other),
            };

            client.write_all(&[5, reply, 0, 1, 0, 0, 0, 0, 0, 0]).await.unwrap();
            if reply != 0 {
                return;
            }

            let mut upstream = TcpStream::connect(target).await.unwrap();
            let _ = tokio::io::copy_bidirectional(&mut client, &mut upstream).await;
        });

        addr
    }

    fn dialer(proxy_addr: String) -> Socks5Dialer {
        let forward = Arc::new(DirectDialer::new(Duration::from_secs(1), Duration::ZERO));
        Socks5Dialer::new(proxy_addr, None, forward, Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_dial_through_proxy() {
        let target = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target_addr = target.local_addr().unwrap().to_string();
        let proxy_addr = spawn_socks5_server(0).await;

        let mut stream = dialer(proxy_addr).dial(&target_addr).await.unwrap();
        let (mut accepted, _) = target.accept().await.unwrap();

        stream.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        accepted.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[tokio::test]
    async fn test_proxy_refuses() {
        let proxy_addr = spawn_socks5_server(5).await;

        let err = dialer(proxy_addr).dial("127.0.0.1:9").await.unwrap_err();
        assert!(matches!(err, ProxyError::Proxy(_)));
    }

    #[tokio::test]
    async fn test_deadline_covers_proxy_hop_and_handshake() {
        let proxy_addr = spawn_silent_listener().await;
        let forward = Arc::new(DelayedDialer {
            delay: Duration::from_millis(300),
            inner: Arc::new(DirectDialer::new(Duration::from_secs(1), Duration::ZERO)),
        });
        let dialer = Socks5Dialer::new(proxy_addr, None, forward, Duration::from_millis(400));

        let started = tokio::time::Instant::now();
        let err = dialer.dial("127.0.0.1:9").await.unwrap_err();

        assert!(matches!(err, ProxyError::DialTimeout { .. }), "{:?}", err);
        assert!(started.elapsed() < Duration::from_millis(650), "{:?}", started.elapsed());
    }
}
