// src/hal/capabilities.rs
//! Per-device-family capability tables
//!
//! Model differences are expressed as data looked up from these tables, not
//! as subclass overrides: channel counts, ranges, clocking, queue rules,
//! trigger support, and the command opcodes the family decodes.

use crate::hal::types::{Range, ScanOptions, TriggerType};
use serde::{Deserialize, Serialize};

/// Channel-queue ordering regimes enforced at scan setup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueOrdering {
    /// Channels must be unique, any order
    Unique,
    /// Channels must be unique and ascending
    Ascending,
    /// Channels must be unique, ascending, and consecutive
    Consecutive,
}

/// Queue constraints declared by the device family
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueueRule {
    pub max_length: usize,
    pub ordering: QueueOrdering,
}

/// Command opcodes a device family decodes
///
/// Opcode values are family-specific register-map data; this default set is
/// the one the simulated family uses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommandSet {
    pub status: u8,
    pub ain: u8,
    pub scan_start: u8,
    pub scan_stop: u8,
    pub scan_data: u8,
    pub scan_clear_fifo: u8,
    pub set_trigger: u8,
    pub digital_snapshot: u8,
    pub fpga_config: u8,
    pub fpga_data: u8,
    pub fpga_version: u8,
}

impl Default for CommandSet {
    fn default() -> Self {
        Self {
            status: 0x40,
            ain: 0x10,
            scan_start: 0x12,
            scan_stop: 0x13,
            scan_data: 0x14,
            scan_clear_fifo: 0x15,
            set_trigger: 0x43,
            digital_snapshot: 0x20,
            fpga_config: 0x50,
            fpga_data: 0x51,
            fpga_version: 0x52,
        }
    }
}

/// Static capabilities of one device family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    pub model: String,
    /// Bitstream file name under the firmware directory; None for families
    /// without volatile firmware
    pub firmware_file: Option<String>,
    /// Bitstream families that require the two-byte zero trailer
    pub firmware_trailer: bool,
    pub max_channels: u32,
    pub resolution_bits: u32,
    /// Aggregate conversion throughput limit across all scanned channels
    pub max_throughput_hz: f64,
    pub min_scan_rate_hz: f64,
    /// Pacer base clock the scan clock divisor divides
    pub clock_base_hz: f64,
    pub max_clock_divisor: u32,
    pub fifo_size_samples: usize,
    pub supported_ranges: Vec<Range>,
    /// Bitmask of supported [`TriggerType`] bits
    pub trigger_mask: u32,
    /// Bitmask of supported [`ScanOptions`] bits
    pub scan_options_mask: u32,
    pub queue_rule: QueueRule,
    pub commands: CommandSet,
}

impl DeviceCapabilities {
    /// Whether a trigger type is in the family's supported set
    pub fn supports_trigger(&self, trigger_type: TriggerType) -> bool {
        self.trigger_mask & trigger_type.bit() != 0
    }

    /// Whether every set option bit is in the family's supported set
    pub fn supports_options(&self, options: ScanOptions) -> bool {
        options.bits() & !self.scan_options_mask == 0
    }

    /// Whether a range is in the family's supported set
    pub fn supports_range(&self, range: Range) -> bool {
        self.supported_ranges.contains(&range)
    }

    /// Midscale raw code for the family's converter resolution
    pub fn full_scale_counts(&self) -> u32 {
        1u32 << self.resolution_bits
    }

    /// Nearest achievable per-channel rate and its clock divisor
    ///
    /// Device clock divisors are discrete; the requested rate is mapped to
    /// the closest divisor of the base clock, then clamped to the family's
    /// rate limits for the given channel count.
    pub fn actual_rate(&self, requested_hz: f64, num_channels: usize) -> (f64, u32) {
        let max_per_channel = self.max_throughput_hz / num_channels.max(1) as f64;
        let clamped = requested_hz.clamp(self.min_scan_rate_hz, max_per_channel);

        let divisor = (self.clock_base_hz / clamped).round().max(1.0);
        let divisor = (divisor as u32).min(self.max_clock_divisor);

        (self.clock_base_hz / divisor as f64, divisor)
    }

    /// Capability table for the simulated USB family used in tests and demos
    pub fn simulated_usb() -> Self {
        let trigger_mask = TriggerType::PosEdge.bit()
            | TriggerType::NegEdge.bit()
            | TriggerType::High.bit()
            | TriggerType::Low.bit()
            | TriggerType::Rising.bit()
            | TriggerType::Falling.bit()
            | TriggerType::Above.bit()
            | TriggerType::Below.bit()
            | TriggerType::PatternEq.bit()
            | TriggerType::PatternNe.bit();

        let scan_options_mask = (ScanOptions::SINGLE_IO
            | ScanOptions::BLOCK_IO
            | ScanOptions::BURST_IO
            | ScanOptions::CONTINUOUS
            | ScanOptions::EXT_CLOCK
            | ScanOptions::EXT_TRIGGER
            | ScanOptions::RETRIGGER)
            .bits();

        Self {
            model: "SIM-1808".to_string(),
            firmware_file: Some("sim_1808.bin".to_string()),
            firmware_trailer: true,
            max_channels: 8,
            resolution_bits: 16,
            max_throughput_hz: 500_000.0,
            min_scan_rate_hz: 0.1,
            clock_base_hz: 10_000_000.0,
            max_clock_divisor: 0x00FF_FFFF,
            fifo_size_samples: 4096,
            supported_ranges: vec![
                Range::Bip10Volts,
                Range::Bip5Volts,
                Range::Bip2Volts,
                Range::Bip1Volts,
                Range::Uni10Volts,
                Range::Uni5Volts,
            ],
            trigger_mask,
            scan_options_mask,
            queue_rule: QueueRule {
                max_length: 8,
                ordering: QueueOrdering::Ascending,
            },
            commands: CommandSet::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_support() {
        let caps = DeviceCapabilities::simulated_usb();
        assert!(caps.supports_trigger(TriggerType::PosEdge));
        assert!(caps.supports_trigger(TriggerType::PatternEq));
        assert!(!caps.supports_trigger(TriggerType::GateHigh));
    }

    #[test]
    fn test_options_support() {
        let caps = DeviceCapabilities::simulated_usb();
        assert!(caps.supports_options(ScanOptions::CONTINUOUS | ScanOptions::EXT_TRIGGER));
        assert!(caps.supports_options(ScanOptions::DEFAULT));

        // An unknown bit outside the mask is rejected
        let bogus = ScanOptions::from_bits(1 << 12);
        assert!(!caps.supports_options(bogus));
    }

    #[test]
    fn test_actual_rate_divisor() {
        let caps = DeviceCapabilities::simulated_usb();

        // 10 MHz base: 1000 Hz divides exactly
        let (rate, divisor) = caps.actual_rate(1000.0, 2);
        assert_eq!(divisor, 10_000);
        assert!((rate - 1000.0).abs() < f64::EPSILON);

        // 3 kHz does not divide exactly; nearest divisor is 3333
        let (rate, _) = caps.actual_rate(3000.0, 1);
        assert!((rate - 10_000_000.0 / 3333.0).abs() < 1e-9);
        assert!(rate != 3000.0);
    }

    #[test]
    fn test_actual_rate_clamped_by_throughput() {
        let caps = DeviceCapabilities::simulated_usb();

        // 8 channels limit per-channel rate to 62.5 kHz
        let (rate, _) = caps.actual_rate(200_000.0, 8);
        assert!(rate <= 500_000.0 / 8.0 + 1.0);
    }

    #[test]
    fn test_range_support() {
        let caps = DeviceCapabilities::simulated_usb();
        assert!(caps.supports_range(Range::Bip10Volts));
        assert!(!caps.supports_range(Range::Uni1Volts));
    }
}
