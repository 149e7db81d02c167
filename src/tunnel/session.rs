//! Tunnel session
//!
//! A session owns one accepted inbound connection and, once dialed, its
//! outbound counterpart. Both are released when the session ends, whatever
//! ended it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::Level;
use tokio::net::TcpStream;

use crate::common::log::emit;
use crate::common::{set_keepalive, SharedLogger};
use crate::dialer::Dialer;
use super::copier::DuplexCopier;
use super::shutdown::StopSignal;

/// Read-only state shared by every session of a supervisor
#[derive(Clone)]
pub struct SessionContext {
    /// Address every session dials
    pub target: Arc<str>,
    /// Dialer chain used to reach the target
    pub dialer: Arc<dyn Dialer>,
    /// Duplex copier for established tunnels
    pub copier: DuplexCopier,
    /// Supervisor-wide stop notification
    pub stop: StopSignal,
    /// TCP keep-alive applied to accepted connections
    pub keepalive: Duration,
    /// Log sink
    pub logger: SharedLogger,
}

/// One inbound connection and the tunnel built for it
pub struct TunnelSession {
    inbound: TcpStream,
    peer: SocketAddr,
    ctx: Arc<SessionContext>,
}

impl TunnelSession {
    /// Create a session for an accepted connection
    pub fn new(inbound: TcpStream, peer: SocketAddr, ctx: Arc<SessionContext>) -> Self {
        Self { inbound, peer, ctx }
    }

    /// Dial the target and relay until either side finishes or the supervisor stops
    ///
    /// A dial failure closes the inbound connection and ends the session; it is
    /// never reported further up.
    pub async fn run(self) {
        let Self { inbound, peer, ctx } = self;

        if let Err(e) = set_keepalive(&inbound, ctx.keepalive) {
            emit!(ctx.logger, Level::Warn, "could not enable keep-alive for {}: {}", peer, e);
        }

        let outbound = match ctx.dialer.dial(&ctx.target).await {
            Ok(stream) => stream,
            Err(e) => {
                emit!(ctx.logger, Level::Error, "error dialing remote target {} for {}: {}", ctx.target, peer, e);
                drop(inbound);
                return;
            }
        };

        let remote = outbound
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| ctx.target.to_string());
        emit!(ctx.logger, Level::Info, "tunneling connection from {} to {}", peer, remote);

        let mut duplex = ctx.copier.start(inbound, outbound);
        tokio::select! {
            _ = duplex.finished() => {}
            _ = ctx.stop.stopped() => {
                emit!(ctx.logger, Level::Debug, "stop requested, closing tunnel from {}", peer);
            }
        }
        duplex.close().await;

        emit!(ctx.logger, Level::Debug, "closed tunnel from {} to {}", peer, remote);
    }
}

/// Run a session for `accepted`
pub async fn handle(accepted: TcpStream, peer: SocketAddr, ctx: Arc<SessionContext>) {
    TunnelSession::new(accepted, peer, ctx).run().await
}
