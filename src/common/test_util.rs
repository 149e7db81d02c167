//! Test helpers shared by unit tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use log::{Level, Log, Metadata, Record};
use tokio::net::{TcpListener, TcpStream};

use crate::common::Result;
use crate::dialer::Dialer;

/// Records every log record it receives
#[derive(Default)]
pub(crate) struct CaptureLogger {
    records: Mutex<Vec<(Level, String)>>,
}

impl CaptureLogger {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn records(&self) -> Vec<(Level, String)> {
        self.records.lock().unwrap().clone()
    }

    /// Whether a record at `level` containing `needle` was logged
    pub(crate) fn contains(&self, level: Level, needle: &str) -> bool {
        self.records()
            .iter()
            .any(|(l, msg)| *l == level && msg.contains(needle))
    }
}

impl Log for CaptureLogger {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.records
            .lock()
            .unwrap()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

/// Waits `delay` before handing the dial to `inner`
pub(crate) struct DelayedDialer {
    pub(crate) delay: Duration,
    pub(crate) inner: Arc<dyn Dialer>,
}

#[async_trait]
impl Dialer for DelayedDialer {
    async fn dial(&self, addr: &str) -> Result<TcpStream> {
        tokio::time::sleep(self.delay).await;
        self.inner.dial(addr).await
    }
}

/// A listener that accepts connections and never answers on them
pub(crate) async fn spawn_silent_listener() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    addr
}
