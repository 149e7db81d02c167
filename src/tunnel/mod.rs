//! Tunnel engine
//!
//! Accept loop, per-connection sessions, duplex copying and shutdown
//! coordination.

pub mod copier;
pub mod session;
pub mod shutdown;
pub mod supervisor;

pub use copier::{copy_direction, CopyError, Duplex, DuplexCopier};
pub use session::{handle, SessionContext, TunnelSession};
pub use shutdown::{StopSignal, TerminalError};
pub use supervisor::{Supervisor, SupervisorHandle, SupervisorState};
