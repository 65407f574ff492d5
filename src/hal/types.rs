// src/hal/types.rs
//! Core types for DAQ device abstraction

use serde::{Deserialize, Serialize};

/// Input terminal configuration for an analog channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputMode {
    Differential,
    SingleEnded,
}

/// Kind of channel a scan element samples from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelType {
    AnalogDifferential,
    AnalogSingleEnded,
    Digital,
    Counter16,
    Counter32,
    Counter48,
}

impl ChannelType {
    /// Input mode implied by the channel type, for analog channels
    pub fn input_mode(&self) -> Option<InputMode> {
        match self {
            ChannelType::AnalogDifferential => Some(InputMode::Differential),
            ChannelType::AnalogSingleEnded => Some(InputMode::SingleEnded),
            _ => None,
        }
    }

    /// True for the analog channel types
    pub fn is_analog(&self) -> bool {
        matches!(
            self,
            ChannelType::AnalogDifferential | ChannelType::AnalogSingleEnded
        )
    }
}

/// Analog input range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Range {
    Bip10Volts,
    Bip5Volts,
    Bip2Volts,
    Bip1Volts,
    Uni10Volts,
    Uni5Volts,
    Uni2Volts,
    Uni1Volts,
}

impl Range {
    /// Lower bound of the range in volts
    pub fn min_volts(&self) -> f64 {
        match self {
            Range::Bip10Volts => -10.0,
            Range::Bip5Volts => -5.0,
            Range::Bip2Volts => -2.0,
            Range::Bip1Volts => -1.0,
            Range::Uni10Volts | Range::Uni5Volts | Range::Uni2Volts | Range::Uni1Volts => 0.0,
        }
    }

    /// Upper bound of the range in volts
    pub fn max_volts(&self) -> f64 {
        match self {
            Range::Bip10Volts | Range::Uni10Volts => 10.0,
            Range::Bip5Volts | Range::Uni5Volts => 5.0,
            Range::Bip2Volts | Range::Uni2Volts => 2.0,
            Range::Bip1Volts | Range::Uni1Volts => 1.0,
        }
    }

    /// Full span of the range in volts
    pub fn span_volts(&self) -> f64 {
        self.max_volts() - self.min_volts()
    }
}

/// One element of a scan's channel sequence
///
/// The order of descriptors passed to `start_scan` defines the interleave
/// order of samples within the ring buffer. Immutable once a scan starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    pub channel: u32,
    pub channel_type: ChannelType,
    pub range: Option<Range>,
}

impl ChannelDescriptor {
    /// Analog channel descriptor with an explicit range
    pub fn analog(channel: u32, mode: InputMode, range: Range) -> Self {
        let channel_type = match mode {
            InputMode::Differential => ChannelType::AnalogDifferential,
            InputMode::SingleEnded => ChannelType::AnalogSingleEnded,
        };
        Self {
            channel,
            channel_type,
            range: Some(range),
        }
    }

    /// Digital port descriptor
    pub fn digital(channel: u32) -> Self {
        Self {
            channel,
            channel_type: ChannelType::Digital,
            range: None,
        }
    }
}

/// Channel gain-queue element, overriding mode/range per channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueueElement {
    pub channel: u32,
    pub input_mode: InputMode,
    pub range: Range,
}

/// Scan option bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanOptions(u32);

impl ScanOptions {
    pub const DEFAULT: ScanOptions = ScanOptions(0);
    /// Transfer one packet of data at a time
    pub const SINGLE_IO: ScanOptions = ScanOptions(1 << 0);
    /// Transfer data in blocks
    pub const BLOCK_IO: ScanOptions = ScanOptions(1 << 1);
    /// Drain the FIFO after the scan completes; sample count bounded by FIFO size
    pub const BURST_IO: ScanOptions = ScanOptions(1 << 2);
    /// Scan in an endless loop, wrapping the buffer; only `stop_scan` ends it
    pub const CONTINUOUS: ScanOptions = ScanOptions(1 << 3);
    /// Conversions paced by an external clock signal
    pub const EXT_CLOCK: ScanOptions = ScanOptions(1 << 4);
    /// Sampling begins when the trigger condition is met
    pub const EXT_TRIGGER: ScanOptions = ScanOptions(1 << 5);
    /// Re-arm the trigger after each trigger event
    pub const RETRIGGER: ScanOptions = ScanOptions(1 << 6);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        ScanOptions(bits)
    }

    pub const fn contains(self, other: ScanOptions) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: ScanOptions) -> Self {
        ScanOptions(self.0 | other.0)
    }
}

impl std::ops::BitOr for ScanOptions {
    type Output = ScanOptions;

    fn bitor(self, rhs: ScanOptions) -> ScanOptions {
        self.union(rhs)
    }
}

/// Scaling/calibration flags for scan and single-point reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanFlags(u32);

impl ScanFlags {
    pub const DEFAULT: ScanFlags = ScanFlags(0);
    /// Return data in device counts; no unit scaling is applied
    pub const NO_SCALE_DATA: ScanFlags = ScanFlags(1 << 0);
    /// Disable real-time software calibration
    pub const NO_CALIBRATE_DATA: ScanFlags = ScanFlags(1 << 1);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: ScanFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for ScanFlags {
    type Output = ScanFlags;

    fn bitor(self, rhs: ScanFlags) -> ScanFlags {
        ScanFlags(self.0 | rhs.0)
    }
}

/// Trigger condition types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerType {
    /// Digital trigger, low-to-high transition
    PosEdge,
    /// Digital trigger, high-to-low transition
    NegEdge,
    /// Digital trigger, active while high
    High,
    /// Digital trigger, active while low
    Low,
    /// Gated sampling while the digital trigger is high
    GateHigh,
    /// Gated sampling while the digital trigger is low
    GateLow,
    /// Analog trigger, rising through the level
    Rising,
    /// Analog trigger, falling through the level
    Falling,
    /// Analog trigger, above the level
    Above,
    /// Analog trigger, below the level
    Below,
    /// Digital pattern equal to `(pattern, mask)`
    PatternEq,
    /// Digital pattern not equal to `(pattern, mask)`
    PatternNe,
}

impl TriggerType {
    /// Bit position within a device's supported-trigger bitmask
    pub const fn bit(self) -> u32 {
        match self {
            TriggerType::PosEdge => 1 << 0,
            TriggerType::NegEdge => 1 << 1,
            TriggerType::High => 1 << 2,
            TriggerType::Low => 1 << 3,
            TriggerType::GateHigh => 1 << 4,
            TriggerType::GateLow => 1 << 5,
            TriggerType::Rising => 1 << 6,
            TriggerType::Falling => 1 << 7,
            TriggerType::Above => 1 << 8,
            TriggerType::Below => 1 << 9,
            TriggerType::PatternEq => 1 << 14,
            TriggerType::PatternNe => 1 << 15,
        }
    }

    /// True for the digital pattern-match trigger family
    pub const fn is_pattern(self) -> bool {
        matches!(self, TriggerType::PatternEq | TriggerType::PatternNe)
    }

    /// True for gate conditions, which enable sampling rather than start it
    pub const fn is_gate(self) -> bool {
        matches!(self, TriggerType::GateHigh | TriggerType::GateLow)
    }
}

/// Trigger source and parameters armed at scan start
///
/// For the pattern trigger family, `level` carries the pattern and `variance`
/// the bit mask, both interpreted as integer port values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerConfig {
    pub trigger_type: TriggerType,
    pub channel: u32,
    pub level: f64,
    pub variance: f64,
    pub retrigger_count: u32,
}

/// State of a scan operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// No scan in progress; initial and terminal state
    Idle,
    /// Background scan is transferring data
    Running,
    /// Scan stopped on a fault; cleared back to Idle by `stop_scan`
    Error(crate::error::ErrorKind),
}

/// Point-in-time snapshot of a scan's transfer progress
///
/// `current_index` is the flat sample index of the most recently completed
/// scan group in the ring buffer, or -1 before the first group completes.
/// Counts are monotonically non-decreasing while the scan runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferStatus {
    pub current_scan_count: u64,
    pub current_total_count: u64,
    pub current_index: i64,
}

impl Default for TransferStatus {
    fn default() -> Self {
        Self {
            current_scan_count: 0,
            current_total_count: 0,
            current_index: -1,
        }
    }
}

/// Wait conditions accepted by the blocking wait call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitType {
    /// Wait until the background operation completes
    WaitUntilDone,
}
