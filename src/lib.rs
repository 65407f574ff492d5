//! daq-hal: hardware abstraction layer for USB data-acquisition devices
//!
//! This library lets a host process configure a DAQ device's analog, digital,
//! and counter subsystems and run sustained, high-rate sampled input while
//! another thread monitors progress and can stop it safely. It features:
//!
//! - A continuous scan engine with a background transfer loop per scan
//! - A ring-buffer mapping over a caller-owned flat sample array
//! - On-the-fly conversion of raw codes to calibrated physical units
//! - Lock-free-readable progress/status snapshots for concurrent pollers
//! - Trigger conditions that gate scan start, with automatic re-arming
//! - Firmware bring-up and host suspend/resume detection that keep the
//!   transport session valid across sleep cycles
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use daq_hal::{DaqConfig, DeviceFactory, ScanBuffer, SuspendMonitor};
//! use daq_hal::{ChannelDescriptor, InputMode, Range, ScanFlags, ScanOptions, WaitType};
//! use daq_hal::hal::simulator::SimulatorConfig;
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DaqConfig::default();
//!     let suspend = SuspendMonitor::start(&config.suspend);
//!     let (device, _transport) =
//!         DeviceFactory::simulated(SimulatorConfig::default(), &config, suspend);
//!     device.connect()?;
//!
//!     let channels = vec![
//!         ChannelDescriptor::analog(0, InputMode::SingleEnded, Range::Bip10Volts),
//!         ChannelDescriptor::analog(1, InputMode::SingleEnded, Range::Bip10Volts),
//!     ];
//!     let buffer = Arc::new(ScanBuffer::new(2 * 1000));
//!
//!     let rate = device.start_scan(
//!         &channels,
//!         1000,
//!         1000.0,
//!         ScanOptions::DEFAULT,
//!         ScanFlags::DEFAULT,
//!         buffer.clone(),
//!     )?;
//!     println!("scanning at {rate} S/s per channel");
//!
//!     device.scan_wait(WaitType::WaitUntilDone, 5.0)?;
//!     println!("first sample: {}", buffer.get(0));
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod acquisition;
pub mod calibration;
pub mod config;
pub mod device;
pub mod error;
pub mod hal;
pub mod utils;
pub mod validation;

// Re-export commonly used types for convenience
pub use acquisition::{ScanBuffer, ScanEngine};
pub use calibration::{CalCoef, CalibrationTable, CustomScale};
pub use config::{ConfigLoader, DaqConfig};
pub use device::{DaqDevice, DeviceFactory};
pub use error::{error_message, DaqError, DaqResult, ErrorKind, ERR_MSG_LEN};
pub use hal::{
    Calibratable, ChannelDescriptor, ChannelType, DeviceCapabilities, InputMode, Range,
    ScanFlags, ScanOptions, ScanState, ScannableInput, SuspendMonitor, TransferStatus,
    TransportSession, TriggerType, Triggerable, WaitType,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "daq-hal");
    }
}
