//! Shutdown coordination primitives
//!
//! [`StopSignal`] is the single-fire stop notification broadcast to every
//! session and copy task. [`TerminalError`] is the single-slot holder for the
//! error the supervisor eventually reports.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::common::ProxyError;

/// Single-fire, idempotent stop notification
///
/// Cloning yields another handle to the same signal. Firing it more than once
/// is a no-op; any number of tasks may wait on it or poll it.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    token: CancellationToken,
    fired: Arc<AtomicBool>,
}

impl StopSignal {
    /// Create an unfired signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal
    ///
    /// Returns `true` only for the call that actually fired it.
    pub fn trigger(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }

        self.token.cancel();
        true
    }

    /// Non-blocking check
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the signal has fired
    pub fn stopped(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

/// Holds at most one terminal error; later errors are dropped
#[derive(Debug, Default)]
pub struct TerminalError {
    slot: Mutex<Option<ProxyError>>,
}

impl TerminalError {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `err` unless an error is already held
    ///
    /// Returns whether the error was stored.
    pub fn record(&self, err: ProxyError) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }

        *slot = Some(err);
        true
    }

    /// Take the held error, leaving the slot empty
    pub fn take(&self) -> Option<ProxyError> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}
