// src/device.rs
//! Device facade tying the subsystems together
//!
//! A [`DaqDevice`] owns the serialized session, the capability table, the
//! unit's calibration data, the armed trigger configuration, and the scan
//! engine, and exposes the caller-facing surface: single-point reads, scan
//! start/status/stop/wait, gain-queue loading, trigger setup, and custom
//! scales.

use crate::acquisition::engine::{ScanEngine, ScanPlan};
use crate::acquisition::trigger::validate_trigger;
use crate::acquisition::ScanBuffer;
use crate::calibration::{CalCoef, CalibrationTable, CustomScale, ScalingPipeline};
use crate::config::DaqConfig;
use crate::error::{DaqError, DaqResult};
use crate::hal::capabilities::DeviceCapabilities;
use crate::hal::firmware::FirmwareLoader;
use crate::hal::session::DeviceSession;
use crate::hal::simulator::{SimulatedTransport, SimulatorConfig};
use crate::hal::suspend::SuspendMonitor;
use crate::hal::traits::{Calibratable, ScannableInput, TransportSession, Triggerable};
use crate::hal::types::{
    ChannelDescriptor, InputMode, QueueElement, Range, ScanFlags, ScanOptions, ScanState,
    TransferStatus, TriggerConfig, TriggerType, WaitType,
};
use crate::validation;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Default trigger programmed until the caller configures one
const DEFAULT_TRIGGER: TriggerConfig = TriggerConfig {
    trigger_type: TriggerType::PosEdge,
    channel: 0,
    level: 0.0,
    variance: 0.0,
    retrigger_count: 0,
};

/// One attached DAQ device
pub struct DaqDevice {
    session: Arc<DeviceSession>,
    caps: Arc<DeviceCapabilities>,
    firmware: Option<FirmwareLoader>,
    calibration: CalibrationTable,
    custom_scales: Mutex<HashMap<u32, CustomScale>>,
    queue: Mutex<Option<Vec<QueueElement>>>,
    trigger: Mutex<TriggerConfig>,
    engine: ScanEngine,
    tuning: crate::config::ScanTuning,
}

impl DaqDevice {
    /// Build a device over an open transport
    pub fn new(
        transport: Arc<dyn TransportSession>,
        caps: DeviceCapabilities,
        calibration: CalibrationTable,
        config: &DaqConfig,
        suspend: Arc<SuspendMonitor>,
    ) -> Self {
        let session = Arc::new(DeviceSession::new(
            transport,
            caps.commands,
            suspend,
            Duration::from_millis(config.transport.io_timeout_ms),
        ));

        let firmware = caps.firmware_file.as_ref().map(|file| {
            FirmwareLoader::new(
                Arc::clone(&session),
                &config.firmware,
                file,
                caps.firmware_trailer,
            )
        });

        let engine = ScanEngine::new(Arc::clone(&session), config.scan.clone());

        Self {
            session,
            caps: Arc::new(caps),
            firmware,
            calibration,
            custom_scales: Mutex::new(HashMap::new()),
            queue: Mutex::new(None),
            trigger: Mutex::new(DEFAULT_TRIGGER),
            engine,
            tuning: config.scan.clone(),
        }
    }

    /// Verify the transport and bring up firmware if needed
    pub fn connect(&self) -> DaqResult<()> {
        if !self.session.is_connected() {
            return Err(DaqError::NotConnected);
        }
        if let Some(firmware) = &self.firmware {
            firmware.ensure_loaded()?;
        }
        info!(model = %self.caps.model, "device connected");
        Ok(())
    }

    /// Capability table of the attached device family
    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.caps
    }

    /// Raw firmware version word, for families with loadable firmware
    pub fn firmware_version(&self) -> DaqResult<u16> {
        match &self.firmware {
            Some(firmware) => firmware.raw_version(),
            None => Err(DaqError::ConfigNotSupported(
                "device has no loadable firmware".to_string(),
            )),
        }
    }

    /// Set a user-defined linear rescale for one channel
    pub fn set_custom_scale(&self, channel: u32, scale: CustomScale) -> DaqResult<()> {
        if channel >= self.caps.max_channels {
            return Err(DaqError::BadArgument(format!(
                "channel {} out of range",
                channel
            )));
        }
        self.custom_scales.lock().insert(channel, scale);
        Ok(())
    }

    /// Remove the custom scale for one channel
    pub fn clear_custom_scale(&self, channel: u32) {
        self.custom_scales.lock().remove(&channel);
    }

    /// Load the channel gain queue; an empty slice clears it
    ///
    /// A loaded queue defines the channel sequence and per-channel
    /// mode/range of subsequent scans, overriding the descriptors passed to
    /// `start_scan`.
    pub fn load_queue(&self, queue: &[QueueElement]) -> DaqResult<()> {
        if queue.is_empty() {
            *self.queue.lock() = None;
            return Ok(());
        }
        validation::validate_queue(&self.caps, queue)?;
        *self.queue.lock() = Some(queue.to_vec());
        Ok(())
    }

    /// Read one software-paced sample from an analog channel
    pub fn a_in(
        &self,
        channel: u32,
        mode: InputMode,
        range: Range,
        flags: ScanFlags,
    ) -> DaqResult<f64> {
        let descriptor = ChannelDescriptor::analog(channel, mode, range);
        validation::validate_descriptors(&self.caps, std::slice::from_ref(&descriptor))?;

        let pipeline = self.build_pipeline(std::slice::from_ref(&descriptor), flags)?;

        let mut out = [0u8; 2];
        self.session
            .query(self.session.commands().ain, channel as u16, 0, &mut out)?;
        let code = u16::from_le_bytes(out);
        Ok(pipeline.apply(0, code))
    }

    /// Start a background scan; returns the actual achievable sample rate
    pub fn start_scan(
        &self,
        descriptors: &[ChannelDescriptor],
        samples_per_channel: usize,
        rate: f64,
        options: ScanOptions,
        flags: ScanFlags,
        buffer: Arc<ScanBuffer>,
    ) -> DaqResult<f64> {
        // A loaded gain queue overrides the caller's channel sequence
        let queued: Option<Vec<ChannelDescriptor>> = self.queue.lock().as_ref().map(|queue| {
            queue
                .iter()
                .map(|e| ChannelDescriptor::analog(e.channel, e.input_mode, e.range))
                .collect()
        });
        let descriptors = match &queued {
            Some(from_queue) => from_queue.as_slice(),
            None => descriptors,
        };

        validation::validate_descriptors(&self.caps, descriptors)?;
        let num_channels = descriptors.len();

        let (actual_rate, divisor) = self.caps.actual_rate(rate, num_channels);
        validation::validate_scan_args(
            &self.caps,
            num_channels,
            samples_per_channel,
            rate,
            options,
            flags,
            buffer.len(),
            self.min_continuous_window(actual_rate, num_channels),
        )?;

        let trigger = if options.contains(ScanOptions::EXT_TRIGGER) {
            let config = *self.trigger.lock();
            validate_trigger(&self.caps, &config)?;
            if options.contains(ScanOptions::RETRIGGER) && config.retrigger_count == 0 {
                return Err(DaqError::BadArgument(
                    "re-trigger option requires a positive re-trigger count".to_string(),
                ));
            }
            Some(config)
        } else if options.contains(ScanOptions::RETRIGGER) {
            return Err(DaqError::BadArgument(
                "re-trigger option requires the external trigger option".to_string(),
            ));
        } else {
            None
        };

        // Coefficients are snapshotted here and frozen for the scan's
        // lifetime, regardless of concurrent configuration calls.
        let pipeline = self.build_pipeline(descriptors, flags)?;

        if !self.session.is_connected() {
            return Err(DaqError::NotConnected);
        }
        if let Some(firmware) = &self.firmware {
            firmware.ensure_loaded()?;
        }

        self.engine.start(ScanPlan {
            num_channels,
            samples_per_channel,
            options,
            pipeline,
            trigger,
            buffer,
            actual_rate_hz: actual_rate,
            clock_divisor: divisor,
            fifo_size_samples: self.caps.fifo_size_samples,
        })?;

        Ok(actual_rate)
    }

    /// Consistent scan state and transfer progress; never blocks
    pub fn scan_status(&self) -> (ScanState, TransferStatus) {
        self.engine.status()
    }

    /// Stop the background scan; idempotent across all states
    pub fn stop_scan(&self) -> DaqResult<()> {
        self.engine.stop()
    }

    /// Block until the scan completes or `timeout_secs` elapses
    ///
    /// A negative timeout waits indefinitely, matching the C ABI.
    pub fn scan_wait(&self, wait_type: WaitType, timeout_secs: f64) -> DaqResult<()> {
        let WaitType::WaitUntilDone = wait_type;
        let timeout = if timeout_secs < 0.0 {
            // Effectively unbounded
            Duration::from_secs(365 * 24 * 3600)
        } else {
            Duration::from_secs_f64(timeout_secs)
        };
        self.engine.wait(timeout)
    }

    /// Error parked by the last faulted scan, if any
    pub fn last_scan_error(&self) -> Option<DaqError> {
        self.engine.last_error()
    }

    fn build_pipeline(
        &self,
        descriptors: &[ChannelDescriptor],
        flags: ScanFlags,
    ) -> DaqResult<ScalingPipeline> {
        let cal_coefs = if flags.contains(ScanFlags::NO_CALIBRATE_DATA) {
            vec![CalCoef::IDENTITY; descriptors.len()]
        } else {
            self.calibration.scan_coefs(descriptors)?
        };

        let scales = self.custom_scales.lock();
        let custom: Vec<CustomScale> = descriptors
            .iter()
            .map(|d| scales.get(&d.channel).copied().unwrap_or_default())
            .collect();

        Ok(ScalingPipeline::build(
            &self.caps,
            descriptors,
            &cal_coefs,
            &custom,
            flags,
        ))
    }

    /// Smallest continuous ring, in scan groups, that holds the minimum
    /// number of transfer slices
    fn min_continuous_window(&self, rate_hz: f64, num_channels: usize) -> usize {
        let throughput = rate_hz * num_channels as f64;
        let slice_samples = ((throughput * self.tuning.transfer_slice_ms as f64 / 1000.0)
            as usize)
            .max(self.tuning.min_transfer_samples);
        let slice_groups = slice_samples.div_ceil(num_channels.max(1));
        slice_groups * crate::config::constants::scan::MIN_CONTINUOUS_SLICES
    }
}

impl ScannableInput for DaqDevice {
    fn start_scan(
        &self,
        descriptors: &[ChannelDescriptor],
        samples_per_channel: usize,
        rate: f64,
        options: ScanOptions,
        flags: ScanFlags,
        buffer: Arc<ScanBuffer>,
    ) -> DaqResult<f64> {
        DaqDevice::start_scan(
            self,
            descriptors,
            samples_per_channel,
            rate,
            options,
            flags,
            buffer,
        )
    }

    fn scan_status(&self) -> (ScanState, TransferStatus) {
        DaqDevice::scan_status(self)
    }

    fn stop_scan(&self) -> DaqResult<()> {
        DaqDevice::stop_scan(self)
    }

    fn scan_wait(&self, wait_type: WaitType, timeout_secs: f64) -> DaqResult<()> {
        DaqDevice::scan_wait(self, wait_type, timeout_secs)
    }
}

impl Calibratable for DaqDevice {
    fn cal_coef(&self, channel: u32, mode: InputMode, range: Range) -> DaqResult<CalCoef> {
        self.calibration.coef(channel, mode, range)
    }

    fn cal_date(&self) -> u64 {
        self.calibration.cal_date()
    }
}

impl Triggerable for DaqDevice {
    fn set_trigger(
        &self,
        trigger_type: TriggerType,
        channel: u32,
        level: f64,
        variance: f64,
        retrigger_count: u32,
    ) -> DaqResult<()> {
        let config = TriggerConfig {
            trigger_type,
            channel,
            level,
            variance,
            retrigger_count,
        };
        validate_trigger(&self.caps, &config)?;
        *self.trigger.lock() = config;
        Ok(())
    }

    fn supported_triggers(&self) -> u32 {
        self.caps.trigger_mask
    }
}

/// Constructors for common device arrangements
pub struct DeviceFactory;

impl DeviceFactory {
    /// Simulated device with an identity calibration table
    ///
    /// Returns the transport handle alongside the device so tests can inject
    /// triggers and faults.
    pub fn simulated(
        sim_config: SimulatorConfig,
        config: &DaqConfig,
        suspend: Arc<SuspendMonitor>,
    ) -> (DaqDevice, Arc<SimulatedTransport>) {
        let transport = Arc::new(SimulatedTransport::new(sim_config));
        let caps = DeviceCapabilities::simulated_usb();
        let calibration = CalibrationTable::identity(&caps, 0);
        let device = DaqDevice::new(
            transport.clone(),
            caps,
            calibration,
            config,
            suspend,
        );
        (device, transport)
    }
}
