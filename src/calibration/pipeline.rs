// src/calibration/pipeline.rs
//! Raw-code to physical-unit conversion for the scan hot path
//!
//! The pipeline is built once at scan start from a snapshot of the unit's
//! calibration table and the caller's custom scales; configuration calls
//! made while the scan runs cannot change it. Per channel, the three linear
//! stages (code calibration, count-to-volts, custom rescale) are pre-combined
//! into a single slope/offset pair so the hot path does exactly one
//! multiply-add per sample.

use crate::calibration::coefficients::{CalCoef, CustomScale};
use crate::hal::capabilities::DeviceCapabilities;
use crate::hal::types::{ChannelDescriptor, ScanFlags};

/// Frozen per-channel conversion, ordered 1:1 with the scan sequence
#[derive(Debug, Clone)]
pub struct ScalingPipeline {
    combined: Vec<CombinedCoef>,
}

#[derive(Debug, Clone, Copy)]
struct CombinedCoef {
    slope: f64,
    offset: f64,
}

impl ScalingPipeline {
    /// Pre-combine the conversion stages for each scan channel
    ///
    /// Flag semantics:
    /// - `NO_SCALE_DATA`: output stays in the code domain. Calibration still
    ///   applies unless also disabled; custom scales never apply to counts.
    /// - `NO_CALIBRATE_DATA`: the calibration term is skipped, but unit
    ///   scaling and custom scales still apply.
    pub fn build(
        caps: &DeviceCapabilities,
        descriptors: &[ChannelDescriptor],
        cal_coefs: &[CalCoef],
        custom_scales: &[CustomScale],
        flags: ScanFlags,
    ) -> Self {
        debug_assert_eq!(descriptors.len(), cal_coefs.len());
        debug_assert_eq!(descriptors.len(), custom_scales.len());

        let no_scale = flags.contains(ScanFlags::NO_SCALE_DATA);
        let no_calibrate = flags.contains(ScanFlags::NO_CALIBRATE_DATA);
        let counts = caps.full_scale_counts() as f64;

        let combined = descriptors
            .iter()
            .zip(cal_coefs.iter().zip(custom_scales.iter()))
            .map(|(desc, (cal, custom))| {
                let cal = if no_calibrate { CalCoef::IDENTITY } else { *cal };

                if no_scale {
                    // Code-domain output: calibration only
                    return CombinedCoef {
                        slope: cal.slope,
                        offset: cal.offset,
                    };
                }

                // Count-to-volts stage for analog channels; digital and
                // counter codes pass through as counts
                let (unit_slope, unit_offset) = match desc.range {
                    Some(range) if desc.channel_type.is_analog() => {
                        (range.span_volts() / counts, range.min_volts())
                    }
                    _ => (1.0, 0.0),
                };

                // custom(unit(cal(code))) collapsed to one multiply-add
                let slope = custom.slope * unit_slope * cal.slope;
                let offset =
                    custom.slope * (unit_slope * cal.offset + unit_offset) + custom.offset;
                CombinedCoef { slope, offset }
            })
            .collect();

        Self { combined }
    }

    /// Number of channels in the scan sequence
    pub fn num_channels(&self) -> usize {
        self.combined.len()
    }

    /// Convert one raw code for the channel at `channel_index` in scan order
    #[inline]
    pub fn apply(&self, channel_index: usize, raw_code: u16) -> f64 {
        let coef = &self.combined[channel_index];
        raw_code as f64 * coef.slope + coef.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::types::{InputMode, Range};

    fn caps() -> DeviceCapabilities {
        DeviceCapabilities::simulated_usb()
    }

    fn one_channel(range: Range) -> Vec<ChannelDescriptor> {
        vec![ChannelDescriptor::analog(0, InputMode::SingleEnded, range)]
    }

    #[test]
    fn test_raw_passthrough_with_noscale_and_identity_cal() {
        let pipeline = ScalingPipeline::build(
            &caps(),
            &one_channel(Range::Bip10Volts),
            &[CalCoef::IDENTITY],
            &[CustomScale::default()],
            ScanFlags::NO_SCALE_DATA,
        );

        // Identity calibration with scaling off reproduces codes bit-for-bit
        for code in [0u16, 1, 1234, 0x7FFF, 0xFFFF] {
            assert_eq!(pipeline.apply(0, code), code as f64);
        }
    }

    #[test]
    fn test_noscale_still_calibrates() {
        let pipeline = ScalingPipeline::build(
            &caps(),
            &one_channel(Range::Bip10Volts),
            &[CalCoef {
                slope: 1.01,
                offset: -3.0,
            }],
            &[CustomScale::default()],
            ScanFlags::NO_SCALE_DATA,
        );

        assert_eq!(pipeline.apply(0, 1000), 1000.0 * 1.01 - 3.0);
    }

    #[test]
    fn test_volts_conversion_bip10() {
        let pipeline = ScalingPipeline::build(
            &caps(),
            &one_channel(Range::Bip10Volts),
            &[CalCoef::IDENTITY],
            &[CustomScale::default()],
            ScanFlags::DEFAULT,
        );

        // 16-bit Bip10: code 0 -> -10 V, midscale -> ~0 V, full scale -> ~+10 V
        assert!((pipeline.apply(0, 0) - (-10.0)).abs() < 1e-12);
        assert!((pipeline.apply(0, 32768)).abs() < 1e-9);
        let top = pipeline.apply(0, 65535);
        assert!(top < 10.0 && top > 9.999);
    }

    #[test]
    fn test_custom_scale_composition() {
        let pipeline = ScalingPipeline::build(
            &caps(),
            &one_channel(Range::Uni10Volts),
            &[CalCoef::IDENTITY],
            &[CustomScale {
                slope: 2.0,
                offset: 1.0,
            }],
            ScanFlags::DEFAULT,
        );

        // Uni10: code 65536 would be 10 V; midscale 32768 is 5 V -> 2*5+1
        let value = pipeline.apply(0, 32768);
        assert!((value - 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_nocalibrate_keeps_custom_scale() {
        let pipeline = ScalingPipeline::build(
            &caps(),
            &one_channel(Range::Uni10Volts),
            &[CalCoef {
                slope: 5.0,
                offset: 100.0,
            }],
            &[CustomScale {
                slope: 3.0,
                offset: 0.5,
            }],
            ScanFlags::NO_CALIBRATE_DATA,
        );

        // Calibration term ignored; unit scaling and custom scale remain
        let volts = 32768.0 * (10.0 / 65536.0);
        assert!((pipeline.apply(0, 32768) - (3.0 * volts + 0.5)).abs() < 1e-9);
    }

    #[test]
    fn test_single_multiply_add_exactness() {
        // value == raw * slope + offset exactly, per the combined coefficients
        let cal = CalCoef {
            slope: 1.25,
            offset: -0.5,
        };
        let pipeline = ScalingPipeline::build(
            &caps(),
            &one_channel(Range::Bip10Volts),
            &[cal],
            &[CustomScale::default()],
            ScanFlags::NO_SCALE_DATA,
        );

        for code in 0..100u16 {
            let expected = code as f64 * 1.25 - 0.5;
            assert_eq!(pipeline.apply(0, code), expected);
        }
    }
}
