//! Connection supervisor
//!
//! The supervisor owns the listener, the dialer chain and the set of running
//! sessions. It runs the accept loop and, once stopped, drives a bounded-time
//! graceful shutdown of every session still in flight.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::Level;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use crate::common::log::emit;
use crate::common::{ProxyError, Result, SharedLogger};
use crate::config::TunnelConfig;
use crate::dialer::{build_dialer, Dialer};
use super::copier::DuplexCopier;
use super::session::{SessionContext, TunnelSession};
use super::shutdown::{StopSignal, TerminalError};

/// Supervisor lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SupervisorState {
    /// Building the dialer chain and binding the listener
    Starting = 0,
    /// Accepting connections
    Running = 1,
    /// Stop fired; waiting for in-flight sessions
    ShuttingDown = 2,
    /// Terminal
    Stopped = 3,
}

impl SupervisorState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SupervisorState::Starting,
            1 => SupervisorState::Running,
            2 => SupervisorState::ShuttingDown,
            _ => SupervisorState::Stopped,
        }
    }
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupervisorState::Starting => write!(f, "starting"),
            SupervisorState::Running => write!(f, "running"),
            SupervisorState::ShuttingDown => write!(f, "shutting down"),
            SupervisorState::Stopped => write!(f, "stopped"),
        }
    }
}

#[derive(Debug, Default)]
struct StateCell(AtomicU8);

impl StateCell {
    fn get(&self) -> SupervisorState {
        SupervisorState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: SupervisorState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Source of inbound connections for the accept loop
#[async_trait]
pub(crate) trait Acceptor: Send + Sync + 'static {
    async fn next_connection(&self) -> io::Result<(TcpStream, SocketAddr)>;
}

#[async_trait]
impl Acceptor for TcpListener {
    async fn next_connection(&self) -> io::Result<(TcpStream, SocketAddr)> {
        self.accept().await
    }
}

/// Connection supervisor
///
/// Accepts inbound connections on the listen address and tunnels each one to
/// the target through the dialer chain.
pub struct Supervisor {
    listen: String,
    target: Arc<str>,
    keepalive: Duration,
    grace_period: Duration,
    buffer_size: usize,
    dialer: Arc<dyn Dialer>,
    logger: SharedLogger,
    stop: StopSignal,
    tracker: TaskTracker,
    terminal: TerminalError,
    state: Arc<StateCell>,
}

impl Supervisor {
    /// Create a supervisor, building the dialer chain from the configuration
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Config`] if the proxy URL is invalid. No socket has
    /// been opened at that point.
    pub fn new(config: &TunnelConfig, logger: SharedLogger) -> Result<Self> {
        let dialer = build_dialer(config.proxy.as_deref(), config.dial_timeout, config.keepalive)?;
        Ok(Self::with_dialer(config, dialer, logger))
    }

    /// Create a supervisor around an already built dialer
    pub fn with_dialer(config: &TunnelConfig, dialer: Arc<dyn Dialer>, logger: SharedLogger) -> Self {
        Self {
            listen: config.listen.clone(),
            target: Arc::from(config.target.as_str()),
            keepalive: config.keepalive,
            grace_period: config.shutdown_timeout,
            buffer_size: config.buffer_size,
            dialer,
            logger,
            stop: StopSignal::new(),
            tracker: TaskTracker::new(),
            terminal: TerminalError::new(),
            state: Arc::new(StateCell::default()),
        }
    }

    /// Bind the listener and start accepting in the background
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Listen`] if the listen address cannot be bound.
    pub async fn start(self) -> Result<SupervisorHandle> {
        let listener = match TcpListener::bind(&self.listen).await {
            Ok(listener) => listener,
            Err(source) => {
                emit!(self.logger, Level::Error, "could not start listening on {}: {}", self.listen, source);
                return Err(ProxyError::Listen {
                    addr: self.listen.clone(),
                    source,
                });
            }
        };
        let local_addr = listener.local_addr()?;

        emit!(self.logger, Level::Info, "Listening port opened on {}", local_addr);
        Ok(self.launch(listener, local_addr))
    }

    /// Enter `Running` and serve connections from `acceptor` in the background
    pub(crate) fn launch<A: Acceptor>(self, acceptor: A, local_addr: SocketAddr) -> SupervisorHandle {
        self.state.set(SupervisorState::Running);

        let stop = self.stop.clone();
        let tracker = self.tracker.clone();
        let state = Arc::clone(&self.state);
        let logger = Arc::clone(&self.logger);
        let task = tokio::spawn(self.serve(acceptor));

        SupervisorHandle {
            local_addr,
            stop,
            tracker,
            state,
            logger,
            task,
        }
    }

    /// Start, then run until `trigger` resolves or the accept loop fails
    pub async fn run<F>(self, trigger: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?.run_until(trigger).await
    }

    async fn serve<A: Acceptor>(self, acceptor: A) -> Result<()> {
        self.accept_loop(&acceptor).await;

        self.stop.trigger();
        self.state.set(SupervisorState::ShuttingDown);
        emit!(self.logger, Level::Info, "stopping tunnel on {}", self.listen);

        drop(acceptor);
        self.tracker.close();

        if tokio::time::timeout(self.grace_period, self.tracker.wait()).await.is_err() {
            emit!(
                self.logger,
                Level::Warn,
                "{} tasks still running after {:?} grace period, abandoning them",
                self.tracker.len(),
                self.grace_period
            );
        }

        self.state.set(SupervisorState::Stopped);
        emit!(self.logger, Level::Info, "tunnel on {} stopped", self.listen);

        match self.terminal.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn accept_loop<A: Acceptor>(&self, acceptor: &A) {
        let ctx = Arc::new(SessionContext {
            target: Arc::clone(&self.target),
            dialer: Arc::clone(&self.dialer),
            copier: DuplexCopier::new(self.buffer_size, self.tracker.clone(), Arc::clone(&self.logger)),
            stop: self.stop.clone(),
            keepalive: self.keepalive,
            logger: Arc::clone(&self.logger),
        });

        loop {
            let accepted = tokio::select! {
                biased;
                _ = self.stop.stopped() => return,
                accepted = acceptor.next_connection() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    emit!(self.logger, Level::Info, "accepted connection from {}", peer);
                    let session = TunnelSession::new(stream, peer, Arc::clone(&ctx));
                    self.tracker.spawn(session.run());
                }
                Err(e) => {
                    emit!(self.logger, Level::Error, "error accepting connection: {}", e);
                    self.terminal.record(ProxyError::Accept(e));
                    self.stop.trigger();
                    return;
                }
            }
        }
    }
}

/// Handle to a running supervisor
pub struct SupervisorHandle {
    local_addr: SocketAddr,
    stop: StopSignal,
    tracker: TaskTracker,
    state: Arc<StateCell>,
    logger: SharedLogger,
    task: JoinHandle<Result<()>>,
}

impl SupervisorHandle {
    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Current lifecycle state
    pub fn state(&self) -> SupervisorState {
        self.state.get()
    }

    /// Initiate graceful shutdown
    ///
    /// Returns `false` if shutdown had already been initiated.
    pub fn shutdown(&self) -> bool {
        self.stop.trigger()
    }

    /// Whether the stop notification has fired
    pub fn is_stopping(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Sessions and copy tasks still running
    pub fn active_tasks(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until the supervisor has stopped and return its terminal result
    pub async fn wait(self) -> Result<()> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(ProxyError::Io(io::Error::other(e))),
        }
    }

    /// Shut down when `trigger` resolves, then wait for the terminal result
    ///
    /// Returns early if the supervisor stops on its own (fatal accept error).
    pub async fn run_until<F>(self, trigger: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let stop = self.stop.clone();

        tokio::select! {
            _ = trigger => {
                emit!(self.logger, Level::Info, "received shutdown signal");
                self.shutdown();
            }
            _ = stop.stopped() => {}
        }

        self.wait().await
    }
}
