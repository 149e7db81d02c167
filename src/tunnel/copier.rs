//! Duplex copier
//!
//! Streams bytes between two connections in both directions at once. The
//! duplex is finished as soon as the first direction ends; closing the
//! connections afterwards unblocks whatever the other direction was waiting on.

use std::io;
use std::net::SocketAddr;

use log::Level;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio_util::task::TaskTracker;

use crate::common::log::emit;
use crate::common::SharedLogger;

/// Why a directional copy stopped early
#[derive(Debug, Error)]
pub enum CopyError {
    /// Reading from the source failed
    #[error("read: {0}")]
    Read(io::Error),
    /// Writing to the destination failed
    #[error("write: {0}")]
    Write(io::Error),
}

impl CopyError {
    /// Read-side failures are the normal way a copy ends when either end closes
    pub fn is_expected(&self) -> bool {
        matches!(self, CopyError::Read(_))
    }
}

/// Copy from `reader` to `writer` until EOF or the first error
///
/// Returns the number of bytes relayed.
pub async fn copy_direction<R, W>(
    reader: &mut R,
    writer: &mut W,
    buffer_size: usize,
) -> Result<u64, CopyError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut total_bytes = 0u64;

    loop {
        let n = reader.read(&mut buffer).await.map_err(CopyError::Read)?;
        if n == 0 {
            return Ok(total_bytes);
        }

        writer.write_all(&buffer[..n]).await.map_err(CopyError::Write)?;
        total_bytes += n as u64;
    }
}

/// Starts duplex copies between connection pairs
#[derive(Clone)]
pub struct DuplexCopier {
    buffer_size: usize,
    tracker: TaskTracker,
    logger: SharedLogger,
}

impl DuplexCopier {
    /// Create a copier
    ///
    /// # Parameters
    ///
    /// * `buffer_size` - Per-direction buffer size
    /// * `tracker` - Outstanding-work tracker the directional tasks are counted in
    /// * `logger` - Sink for copy failures
    pub fn new(buffer_size: usize, tracker: TaskTracker, logger: SharedLogger) -> Self {
        Self {
            buffer_size,
            tracker,
            logger,
        }
    }

    /// Start copying `a -> b` and `b -> a` concurrently
    ///
    /// Both streams move into the returned [`Duplex`]; they are closed when it is
    /// closed or dropped.
    pub fn start(&self, a: TcpStream, b: TcpStream) -> Duplex {
        let a_addr = a.peer_addr().ok();
        let b_addr = b.peer_addr().ok();
        let (mut a_read, mut a_write) = a.into_split();
        let (mut b_read, mut b_write) = b.into_split();

        let mut tasks = JoinSet::new();

        let copier = self.clone();
        tasks.spawn(self.tracker.track_future(async move {
            let result = copy_direction(&mut a_read, &mut b_write, copier.buffer_size).await;
            copier.report(result, a_addr, b_addr);
        }));

        let copier = self.clone();
        tasks.spawn(self.tracker.track_future(async move {
            let result = copy_direction(&mut b_read, &mut a_write, copier.buffer_size).await;
            copier.report(result, b_addr, a_addr);
        }));

        Duplex { tasks }
    }

    /// Copy until one direction ends, then close both connections
    pub async fn run(&self, a: TcpStream, b: TcpStream) {
        let mut duplex = self.start(a, b);
        duplex.finished().await;
        duplex.close().await;
    }

    fn report(&self, result: Result<u64, CopyError>, src: Option<SocketAddr>, dst: Option<SocketAddr>) {
        let src = display_addr(src);
        let dst = display_addr(dst);

        match result {
            Ok(total_bytes) => {
                emit!(self.logger, Level::Debug, "{} to {} transferred {} bytes total", src, dst, total_bytes);
            }
            Err(e) if e.is_expected() => {
                emit!(self.logger, Level::Debug, "copy from {} to {} ended: {}", src, dst, e);
            }
            Err(e) => {
                emit!(self.logger, Level::Error, "failed to copy connection from {} to {}: {}", src, dst, e);
            }
        }
    }
}

fn display_addr(addr: Option<SocketAddr>) -> String {
    addr.map(|a| a.to_string()).unwrap_or_else(|| "<unknown>".to_string())
}

/// A running duplex copy
///
/// Dropping it aborts both directions and releases the connections.
pub struct Duplex {
    tasks: JoinSet<()>,
}

impl Duplex {
    /// Wait until the first direction ends
    pub async fn finished(&mut self) {
        // A panic inside a copy task is reported by the runtime; either way the
        // direction is over.
        let _ = self.tasks.join_next().await;
    }

    /// Abort the remaining direction and wait until both connections are closed
    pub async fn close(mut self) {
        self.tasks.shutdown().await;
    }
}
