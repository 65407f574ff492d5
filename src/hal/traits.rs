// src/hal/traits.rs
//! Core HAL traits: the transport contract and the device capability seams

use crate::error::DaqResult;
use crate::hal::types::{
    ChannelDescriptor, InputMode, Range, ScanFlags, ScanOptions, ScanState, TransferStatus,
    TriggerType, WaitType,
};
use std::sync::Arc;
use std::time::Duration;

/// Open channel to a device: control plus bulk endpoints or equivalent
///
/// Supplied by the transport layer; the scan core only consumes this
/// contract. A command/response exchange is not assumed atomic here; the
/// session wrapper serializes exchanges.
pub trait TransportSession: Send + Sync {
    /// Issue a command carrying `payload` to the device
    fn send(
        &self,
        command: u8,
        value: u16,
        index: u16,
        payload: &[u8],
        timeout: Duration,
    ) -> DaqResult<usize>;

    /// Issue a command and read the device's response into `out`
    fn query(
        &self,
        command: u8,
        value: u16,
        index: u16,
        out: &mut [u8],
        timeout: Duration,
    ) -> DaqResult<usize>;

    /// Whether the underlying channel is currently usable
    fn is_connected(&self) -> bool;
}

/// Paced multi-channel sampled input
pub trait ScannableInput {
    /// Start a background scan; returns the actual achievable sample rate
    fn start_scan(
        &self,
        descriptors: &[ChannelDescriptor],
        samples_per_channel: usize,
        rate: f64,
        options: ScanOptions,
        flags: ScanFlags,
        buffer: Arc<crate::acquisition::ScanBuffer>,
    ) -> DaqResult<f64>;

    /// Non-blocking consistent snapshot of scan state and transfer progress
    fn scan_status(&self) -> (ScanState, TransferStatus);

    /// Stop the background scan; idempotent
    fn stop_scan(&self) -> DaqResult<()>;

    /// Block until the scan leaves the running state or the timeout elapses
    fn scan_wait(&self, wait_type: WaitType, timeout_secs: f64) -> DaqResult<()>;
}

/// Per-unit calibration data access
pub trait Calibratable {
    /// Calibration coefficient for a channel/mode/range combination
    fn cal_coef(
        &self,
        channel: u32,
        mode: InputMode,
        range: Range,
    ) -> DaqResult<crate::calibration::CalCoef>;

    /// Unit calibration date, seconds since the Unix epoch
    fn cal_date(&self) -> u64;
}

/// Trigger-gated scan start
pub trait Triggerable {
    /// Configure the trigger condition used by subsequent triggered scans
    fn set_trigger(
        &self,
        trigger_type: TriggerType,
        channel: u32,
        level: f64,
        variance: f64,
        retrigger_count: u32,
    ) -> DaqResult<()>;

    /// Bitmask of trigger types the device supports
    fn supported_triggers(&self) -> u32;
}
