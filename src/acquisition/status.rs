// src/acquisition/status.rs
//! Shared scan state and transfer-progress snapshotting
//!
//! One lock guards the state, the two counters, and the ring index together,
//! so a reader can never pair an incremented count with a stale index.
//! Status reads never block beyond that uncontended lock. State edges are
//! broadcast on a condvar for `wait`.

use crate::error::{DaqError, ErrorKind};
use crate::hal::types::{ScanState, TransferStatus};
use parking_lot::{Condvar, Mutex};
use std::time::Duration;

struct StatusInner {
    state: ScanState,
    transfer: TransferStatus,
    error: Option<DaqError>,
}

/// Consistent `(ScanState, TransferStatus)` snapshot cell
pub struct StatusCell {
    inner: Mutex<StatusInner>,
    state_edge: Condvar,
}

impl StatusCell {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StatusInner {
                state: ScanState::Idle,
                transfer: TransferStatus::default(),
                error: None,
            }),
            state_edge: Condvar::new(),
        }
    }

    /// Point-in-time snapshot; safe from any thread, never blocks the writer
    pub fn snapshot(&self) -> (ScanState, TransferStatus) {
        let inner = self.inner.lock();
        (inner.state, inner.transfer)
    }

    /// Transition Idle/Error -> Running, resetting progress
    ///
    /// A prior unacknowledged error is cleared by starting a new scan.
    /// Fails with `AlreadyActive` while a scan runs.
    pub fn begin_scan(&self) -> Result<(), DaqError> {
        let mut inner = self.inner.lock();
        if inner.state == ScanState::Running {
            return Err(DaqError::AlreadyActive);
        }
        inner.state = ScanState::Running;
        inner.transfer = TransferStatus::default();
        inner.error = None;
        Ok(())
    }

    /// Publish progress from the scan loop; counts only move forward
    pub fn update_progress(&self, scan_count: u64, total_count: u64, index: i64) {
        let mut inner = self.inner.lock();
        if inner.state != ScanState::Running {
            return;
        }
        debug_assert!(scan_count >= inner.transfer.current_scan_count);
        debug_assert!(total_count >= inner.transfer.current_total_count);
        inner.transfer = TransferStatus {
            current_scan_count: scan_count,
            current_total_count: total_count,
            current_index: index,
        };
    }

    /// Leave the running state normally
    pub fn finish_idle(&self) {
        let mut inner = self.inner.lock();
        inner.state = ScanState::Idle;
        self.state_edge.notify_all();
    }

    /// Leave the running state on a fault, parking the error for retrieval
    pub fn finish_error(&self, error: DaqError) {
        let mut inner = self.inner.lock();
        inner.state = ScanState::Error(error.kind());
        inner.error = Some(error);
        self.state_edge.notify_all();
    }

    /// Acknowledge a fault, returning the cell to Idle
    pub fn acknowledge_error(&self) {
        let mut inner = self.inner.lock();
        if matches!(inner.state, ScanState::Error(_)) {
            inner.state = ScanState::Idle;
            self.state_edge.notify_all();
        }
    }

    /// Error kind of the current/last fault without consuming it
    pub fn last_error(&self) -> Option<DaqError> {
        self.inner.lock().error.clone()
    }

    /// Take the parked fault, leaving the slot empty
    pub fn take_error(&self) -> Option<DaqError> {
        self.inner.lock().error.take()
    }

    /// Block until the state leaves Running or the timeout elapses
    ///
    /// Returns `Err(TimedOut)` on elapse with no side effects.
    pub fn wait_not_running(&self, timeout: Duration) -> Result<(), DaqError> {
        let mut inner = self.inner.lock();
        let deadline = std::time::Instant::now() + timeout;
        while inner.state == ScanState::Running {
            if self
                .state_edge
                .wait_until(&mut inner, deadline)
                .timed_out()
            {
                return Err(DaqError::TimedOut);
            }
        }
        Ok(())
    }

    /// Current error kind if the cell is in the error state
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self.inner.lock().state {
            ScanState::Error(kind) => Some(kind),
            _ => None,
        }
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}
