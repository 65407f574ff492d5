// src/calibration/coefficients.rs
//! Per-unit calibration coefficients and user-defined rescales

use crate::error::{DaqError, DaqResult};
use crate::hal::capabilities::DeviceCapabilities;
use crate::hal::types::{ChannelDescriptor, InputMode, Range};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Linear correction mapping a raw code to its calibrated value
///
/// Applied in the code domain: `calibrated_code = raw * slope + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalCoef {
    pub slope: f64,
    pub offset: f64,
}

impl CalCoef {
    pub const IDENTITY: CalCoef = CalCoef {
        slope: 1.0,
        offset: 0.0,
    };
}

/// User-defined linear rescale applied after unit scaling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CustomScale {
    pub slope: f64,
    pub offset: f64,
}

impl Default for CustomScale {
    fn default() -> Self {
        Self {
            slope: 1.0,
            offset: 0.0,
        }
    }
}

/// Per-unit coefficient table indexed by `(channel, mode, range)`
///
/// Populated by the device-specific bring-up routine; combinations the unit
/// was never calibrated for are absent and reported as unsupported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationTable {
    coefs: HashMap<(u32, InputMode, Range), CalCoef>,
    /// Unit calibration date, seconds since the Unix epoch
    cal_date: u64,
}

impl CalibrationTable {
    pub fn new(cal_date: u64) -> Self {
        Self {
            coefs: HashMap::new(),
            cal_date,
        }
    }

    /// Identity table covering every channel/mode/range the family supports
    pub fn identity(caps: &DeviceCapabilities, cal_date: u64) -> Self {
        let mut table = Self::new(cal_date);
        for channel in 0..caps.max_channels {
            for mode in [InputMode::Differential, InputMode::SingleEnded] {
                for &range in &caps.supported_ranges {
                    table.insert(channel, mode, range, CalCoef::IDENTITY);
                }
            }
        }
        table
    }

    pub fn insert(&mut self, channel: u32, mode: InputMode, range: Range, coef: CalCoef) {
        self.coefs.insert((channel, mode, range), coef);
    }

    /// Coefficient for one channel/mode/range combination
    pub fn coef(&self, channel: u32, mode: InputMode, range: Range) -> DaqResult<CalCoef> {
        self.coefs
            .get(&(channel, mode, range))
            .copied()
            .ok_or_else(|| {
                DaqError::ConfigNotSupported(format!(
                    "channel {} {:?} {:?} was never calibrated for this unit",
                    channel, mode, range
                ))
            })
    }

    /// Coefficients ordered 1:1 with a scan's channel sequence
    ///
    /// Non-analog channels get the identity coefficient; their codes carry
    /// no converter error to correct.
    pub fn scan_coefs(&self, descriptors: &[ChannelDescriptor]) -> DaqResult<Vec<CalCoef>> {
        descriptors
            .iter()
            .map(|desc| match (desc.channel_type.input_mode(), desc.range) {
                (Some(mode), Some(range)) => self.coef(desc.channel, mode, range),
                _ => Ok(CalCoef::IDENTITY),
            })
            .collect()
    }

    /// Unit calibration date, seconds since the Unix epoch
    pub fn cal_date(&self) -> u64 {
        self.cal_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::types::ChannelType;

    #[test]
    fn test_lookup_and_missing_combination() {
        let mut table = CalibrationTable::new(1_700_000_000);
        table.insert(
            0,
            InputMode::Differential,
            Range::Bip10Volts,
            CalCoef {
                slope: 1.001,
                offset: -2.5,
            },
        );

        let coef = table
            .coef(0, InputMode::Differential, Range::Bip10Volts)
            .unwrap();
        assert_eq!(coef.slope, 1.001);

        let err = table
            .coef(0, InputMode::SingleEnded, Range::Bip10Volts)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ConfigNotSupported);
    }

    #[test]
    fn test_identity_covers_capabilities() {
        let caps = DeviceCapabilities::simulated_usb();
        let table = CalibrationTable::identity(&caps, 0);
        for channel in 0..caps.max_channels {
            for &range in &caps.supported_ranges {
                assert_eq!(
                    table.coef(channel, InputMode::Differential, range).unwrap(),
                    CalCoef::IDENTITY
                );
            }
        }
    }

    #[test]
    fn test_scan_coefs_order_matches_descriptors() {
        let mut table = CalibrationTable::new(0);
        table.insert(
            2,
            InputMode::SingleEnded,
            Range::Bip5Volts,
            CalCoef {
                slope: 2.0,
                offset: 0.0,
            },
        );
        table.insert(
            0,
            InputMode::SingleEnded,
            Range::Bip5Volts,
            CalCoef {
                slope: 3.0,
                offset: 0.0,
            },
        );

        let descriptors = vec![
            ChannelDescriptor::analog(0, InputMode::SingleEnded, Range::Bip5Volts),
            ChannelDescriptor::analog(2, InputMode::SingleEnded, Range::Bip5Volts),
            ChannelDescriptor {
                channel: 0,
                channel_type: ChannelType::Digital,
                range: None,
            },
        ];

        let coefs = table.scan_coefs(&descriptors).unwrap();
        assert_eq!(coefs[0].slope, 3.0);
        assert_eq!(coefs[1].slope, 2.0);
        assert_eq!(coefs[2], CalCoef::IDENTITY);
    }

    #[test]
    fn test_cal_date() {
        let table = CalibrationTable::new(1_650_000_000);
        assert_eq!(table.cal_date(), 1_650_000_000);
    }
}
