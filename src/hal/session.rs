// src/hal/session.rs
//! Suspend-aware serialized command session over a transport
//!
//! Foreground configuration calls and the background scan loop share one
//! session; a command lock makes every command/response exchange atomic with
//! respect to other exchanges. Before each exchange the session compares its
//! cached suspend generation against the watcher's: on mismatch the firmware
//! status is re-probed before the command is forwarded, and a device that
//! lost its firmware across the sleep is reported as disconnected.

use crate::config::constants::status_bits;
use crate::error::{DaqError, DaqResult};
use crate::hal::capabilities::CommandSet;
use crate::hal::suspend::SuspendMonitor;
use crate::hal::traits::TransportSession;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Serialized, suspend-validated command channel to one device
pub struct DeviceSession {
    transport: Arc<dyn TransportSession>,
    commands: CommandSet,
    suspend: Arc<SuspendMonitor>,
    cached_generation: AtomicU64,
    exchange_lock: Mutex<()>,
    io_timeout: Duration,
}

impl DeviceSession {
    pub fn new(
        transport: Arc<dyn TransportSession>,
        commands: CommandSet,
        suspend: Arc<SuspendMonitor>,
        io_timeout: Duration,
    ) -> Self {
        let cached_generation = AtomicU64::new(suspend.generation());
        Self {
            transport,
            commands,
            suspend,
            cached_generation,
            exchange_lock: Mutex::new(()),
            io_timeout,
        }
    }

    /// Command opcodes of the attached device family
    pub fn commands(&self) -> &CommandSet {
        &self.commands
    }

    /// Per-command I/O timeout this session was configured with
    pub fn io_timeout(&self) -> Duration {
        self.io_timeout
    }

    /// Whether the transport channel is currently usable
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Send a command, re-validating the session after a host sleep
    pub fn send(&self, command: u8, value: u16, index: u16, payload: &[u8]) -> DaqResult<usize> {
        self.revalidate_after_suspend()?;
        let _guard = self.exchange_lock.lock();
        self.transport
            .send(command, value, index, payload, self.io_timeout)
    }

    /// Query a command response, re-validating the session after a host sleep
    pub fn query(&self, command: u8, value: u16, index: u16, out: &mut [u8]) -> DaqResult<usize> {
        self.revalidate_after_suspend()?;
        let _guard = self.exchange_lock.lock();
        self.transport
            .query(command, value, index, out, self.io_timeout)
    }

    /// Device status word via the family's status opcode
    pub fn status_word(&self) -> DaqResult<u16> {
        let mut out = [0u8; 2];
        self.query(self.commands.status, 0, 0, &mut out)?;
        Ok(u16::from_le_bytes(out))
    }

    /// Send without the suspend check; used by firmware bring-up, which runs
    /// while the loaded-state is the thing being established
    pub(crate) fn raw_send(
        &self,
        command: u8,
        value: u16,
        index: u16,
        payload: &[u8],
    ) -> DaqResult<usize> {
        let _guard = self.exchange_lock.lock();
        self.transport
            .send(command, value, index, payload, self.io_timeout)
    }

    /// Query without the suspend check; see [`DeviceSession::raw_send`]
    pub(crate) fn raw_query(
        &self,
        command: u8,
        value: u16,
        index: u16,
        out: &mut [u8],
    ) -> DaqResult<usize> {
        let _guard = self.exchange_lock.lock();
        self.transport
            .query(command, value, index, out, self.io_timeout)
    }

    /// Status word without the suspend check
    pub(crate) fn raw_status_word(&self) -> DaqResult<u16> {
        let mut out = [0u8; 2];
        self.raw_query(self.commands.status, 0, 0, &mut out)?;
        Ok(u16::from_le_bytes(out))
    }

    fn revalidate_after_suspend(&self) -> DaqResult<()> {
        let current = self.suspend.generation();
        let cached = self.cached_generation.load(Ordering::Acquire);
        if current == cached {
            return Ok(());
        }

        debug!(cached, current, "suspend generation changed, re-validating session");

        // Firmware held in volatile memory does not survive a power cycle;
        // a clear loaded bit here means the handle is stale.
        let status = self.raw_status_word()?;
        if status & status_bits::FPGA_LOADED == 0 {
            warn!("firmware state lost across host suspend");
            return Err(DaqError::NotConnected);
        }

        self.cached_generation.store(current, Ordering::Release);
        Ok(())
    }
}
