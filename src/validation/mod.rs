// src/validation/mod.rs
//! Synchronous argument validation for scan setup
//!
//! Everything here runs before any background activity starts, so a
//! rejected call leaves no partial state behind.

use crate::error::{DaqError, DaqResult};
use crate::hal::capabilities::{DeviceCapabilities, QueueOrdering};
use crate::hal::types::{ChannelDescriptor, QueueElement, ScanFlags, ScanOptions};

/// Validate a scan's channel sequence against the family's queue rules
pub fn validate_descriptors(
    caps: &DeviceCapabilities,
    descriptors: &[ChannelDescriptor],
) -> DaqResult<()> {
    if descriptors.is_empty() {
        return Err(DaqError::BadArgument(
            "scan requires at least one channel".to_string(),
        ));
    }
    if descriptors.len() > caps.queue_rule.max_length {
        return Err(DaqError::BadArgument(format!(
            "{} channels exceeds the queue limit of {}",
            descriptors.len(),
            caps.queue_rule.max_length
        )));
    }

    for desc in descriptors {
        if desc.channel >= caps.max_channels {
            return Err(DaqError::BadArgument(format!(
                "channel {} out of range for {} ({} channels)",
                desc.channel, caps.model, caps.max_channels
            )));
        }
        if desc.channel_type.is_analog() {
            match desc.range {
                None => {
                    return Err(DaqError::BadArgument(format!(
                        "analog channel {} requires a range",
                        desc.channel
                    )));
                }
                Some(range) if !caps.supports_range(range) => {
                    return Err(DaqError::BadArgument(format!(
                        "range {:?} not supported by {}",
                        range, caps.model
                    )));
                }
                _ => {}
            }
        }
    }

    check_ordering(caps.queue_rule.ordering, descriptors)
}

fn check_ordering(ordering: QueueOrdering, descriptors: &[ChannelDescriptor]) -> DaqResult<()> {
    let channels: Vec<u32> = descriptors.iter().map(|d| d.channel).collect();

    let unique = {
        let mut seen = channels.clone();
        seen.sort_unstable();
        seen.windows(2).all(|w| w[0] != w[1])
    };
    if !unique {
        return Err(DaqError::BadArgument(
            "queue channels must be unique".to_string(),
        ));
    }

    match ordering {
        QueueOrdering::Unique => Ok(()),
        QueueOrdering::Ascending => {
            if channels.windows(2).all(|w| w[0] < w[1]) {
                Ok(())
            } else {
                Err(DaqError::BadArgument(
                    "queue channels must be in ascending order".to_string(),
                ))
            }
        }
        QueueOrdering::Consecutive => {
            if channels.windows(2).all(|w| w[1] == w[0] + 1) {
                Ok(())
            } else {
                Err(DaqError::BadArgument(
                    "queue channels must be consecutive".to_string(),
                ))
            }
        }
    }
}

/// Validate a gain queue before it is stored
pub fn validate_queue(caps: &DeviceCapabilities, queue: &[QueueElement]) -> DaqResult<()> {
    let descriptors: Vec<ChannelDescriptor> = queue
        .iter()
        .map(|e| ChannelDescriptor::analog(e.channel, e.input_mode, e.range))
        .collect();
    validate_descriptors(caps, &descriptors)
}

/// Validate rate, sample count, options, flags, and buffer sizing
pub fn validate_scan_args(
    caps: &DeviceCapabilities,
    num_channels: usize,
    samples_per_channel: usize,
    rate: f64,
    options: ScanOptions,
    _flags: ScanFlags,
    buffer_len: usize,
    min_window_groups: usize,
) -> DaqResult<()> {
    if samples_per_channel == 0 {
        return Err(DaqError::BadArgument(
            "samples per channel must be positive".to_string(),
        ));
    }
    if !rate.is_finite() || rate <= 0.0 {
        return Err(DaqError::BadArgument(format!(
            "sample rate {rate} is not a positive number"
        )));
    }
    if !caps.supports_options(options) {
        return Err(DaqError::BadArgument(format!(
            "scan options {:#x} not supported by {}",
            options.bits(),
            caps.model
        )));
    }

    if options.contains(ScanOptions::BURST_IO) {
        if options.contains(ScanOptions::CONTINUOUS) {
            return Err(DaqError::BadArgument(
                "burst and continuous modes are mutually exclusive".to_string(),
            ));
        }
        let total = samples_per_channel * num_channels;
        if total > caps.fifo_size_samples {
            return Err(DaqError::BadArgument(format!(
                "burst scan of {} samples exceeds the {}-sample FIFO",
                total, caps.fifo_size_samples
            )));
        }
    }

    let required = samples_per_channel * num_channels;
    if buffer_len < required {
        return Err(DaqError::BadArgument(format!(
            "buffer of {} samples is smaller than the required {}",
            buffer_len, required
        )));
    }

    // In continuous mode the buffer is the ring; it must hold enough
    // transfer slices that the reader can stay ahead of the writer.
    if options.contains(ScanOptions::CONTINUOUS) && samples_per_channel < min_window_groups {
        return Err(DaqError::BadArgument(format!(
            "continuous ring of {} scans is below the {}-scan minimum window",
            samples_per_channel, min_window_groups
        )));
    }

    Ok(())
}
