//! HTTP CONNECT proxy dialer

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::debug;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::common::{ProxyError, Result};
use super::{Credentials, Dialer};

/// Upper bound on the proxy's response header block
const MAX_RESPONSE_HEADER: usize = 8192;

/// Routes connections through an HTTP proxy using `CONNECT`
pub struct HttpConnectDialer {
    proxy_addr: String,
    credentials: Option<Credentials>,
    forward: Arc<dyn Dialer>,
    timeout: Duration,
}

impl HttpConnectDialer {
    /// Create an HTTP CONNECT dialer for the proxy at `proxy_addr`
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

    fn connect_request(&self, addr: &str) -> String {
        let mut request = format!("CONNECT {addr} HTTP/1.1\r\nHost: {addr}\r\n");

        if let Some(creds) = &self.credentials {
            let token = STANDARD.encode(format!("{}:{}", creds.username, creds.password));
            request.push_str(&format!("Proxy-Authorization: Basic {}\r\n", token));
        }

        request.push_str("\r\n");
        request
    }

    async fn connect(&self, addr: &str) -> Result<TcpStream> {
        let mut stream = self.forward.dial(&self.proxy_addr).await?;
        self.handshake(&mut stream, addr).await?;
        Ok(stream)
    }

    async fn handshake(&self, stream: &mut TcpStream, addr: &str) -> Result<()> {
        stream.write_all(self.connect_request(addr).as_bytes()).await?;

        // Read byte by byte so no tunnel payload is consumed past the header block
        let mut header = Vec::with_capacity(256);
        while !header.ends_with(b"\r\n\r\n") {
            if header.len() >= MAX_RESPONSE_HEADER {
                return Err(ProxyError::Proxy(format!(
                    "http proxy {} sent an oversized response",
                    self.proxy_addr
                )));
            }

            match stream.read_u8().await {
                Ok(byte) => header.push(byte),
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Err(ProxyError::Proxy(format!(
                        "http proxy {} closed the connection during CONNECT",
                        self.proxy_addr
                    )))
                }
                Err(e) => return Err(e.into()),
            }
        }

        let status = parse_status_code(&header).ok_or_else(|| {
            ProxyError::Proxy(format!("http proxy {} sent a malformed response", self.proxy_addr))
        })?;

        if !(200..300).contains(&status) {
            return Err(ProxyError::Proxy(format!(
                "http proxy {} rejected CONNECT to {} with status {}",
                self.proxy_addr, addr, status
            )));
        }

        Ok(())
    }
}

/// Extract the status code from `HTTP/1.x NNN reason`
fn parse_status_code(header: &[u8]) -> Option<u16> {
    let text = std::str::from_utf8(header).ok()?;
    let status_line = text.lines().next()?;
    let mut parts = status_line.split_whitespace();

    if !parts.next()?.starts_with("HTTP/") {
        return None;
    }

    parts.next()?.parse().ok()
}

#[async_trait]
impl Dialer for HttpConnectDialer {
    /// The proxy hop and the handshake share one deadline
    async fn dial(&self, addr: &str) -> Result<TcpStream> {
        let stream = timeout(self.timeout, self.connect(addr))
            .await
            .map_err(|_| ProxyError::DialTimeout {
                addr: addr.to_string(),
                timeout: self.timeout,
            })??;

        debug!("Dialed {} via http proxy {}", addr, self.proxy_addr);
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::test_util::{spawn_silent_listener, DelayedDialer};
    use crate::dialer::DirectDialer;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Accept one CONNECT, report the request head and answer with `response`
    async fn spawn_http_proxy(response: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (client, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(client);
            let mut head = String::new();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).await.unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                head.push_str(&line);
            }
            let mut client = reader.into_inner();
            // Payload right behind the header block must reach the dialer untouched
            client
                .write_all(format!("{}tunnel-bytes", response).as_bytes())
                .await
                .unwrap();
            let _ = tx.send(head);
            let mut sink = Vec::new();
            let _ = client.read_to_end(&mut sink).await;
        });

        (addr, rx)
    }

    fn dialer(proxy_addr: String, credentials: Option<Credentials>) -> HttpConnectDialer {
        let forward = Arc::new(DirectDialer::new(Duration::from_secs(1), Duration::ZERO));
        HttpConnectDialer::new(proxy_addr, credentials, forward, Duration::from_secs(2))
    }

    #[test]
    fn test_parse_status_code() {
        assert_eq!(parse_status_code(b"HTTP/1.1 200 Connection established\r\n\r\n"), Some(200));
        assert_eq!(parse_status_code(b"HTTP/1.0 407 Auth\r\n\r\n"), Some(407));
        assert_eq!(parse_status_code(b"SSH-2.0-OpenSSH\r\n\r\n"), None);
    }

    #[tokio::test]
    async fn test_connect_with_credentials() {
        let (proxy_addr, head) =
            spawn_http_proxy("HTTP/1.1 200 Connection established\r\n\r\n").await;
        let creds = Credentials {
            username: "user".into(),
            password: "pass".into(),
        };

        let mut stream = dialer(proxy_addr, Some(creds)).dial("example.com:443").await.unwrap();

        let head = head.await.unwrap();
        assert!(head.starts_with("CONNECT example.com:443 HTTP/1.1\r\n"));
        assert!(head.contains("Proxy-Authorization: Basic dXNlcjpwYXNz\r\n"));

        let mut buf = [0u8; 12];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"tunnel-bytes");
    }

    #[tokio::test]
    async fn test_connect_rejected() {
        let (proxy_addr, _head) =
            spawn_http_proxy("HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\n\r\n").await;

        let err = dialer(proxy_addr, None).dial("example.com:443").await.unwrap_err();
        assert!(matches!(err, ProxyError::Proxy(ref m) if m.contains("403")));
    }

    #[tokio::test]
    async fn test_deadline_covers_proxy_hop_and_handshake() {
        let proxy_addr = spawn_silent_listener().await;
        let forward = Arc::new(DelayedDialer {
            delay: Duration::from_millis(300),
            inner: Arc::new(DirectDialer::new(Duration::from_secs(1), Duration::ZERO)),
        });
        let dialer = HttpConnectDialer::new(proxy_addr, None, forward, Duration::from_millis(400));

        let started = tokio::time::Instant::now();
        let err = dialer.dial("example.com:443").await.unwrap_err();

        assert!(matches!(err, ProxyError::DialTimeout { .. }), "{:?}", err);
        assert!(started.elapsed() < Duration::from_millis(650), "{:?}", started.elapsed());
    }
}
