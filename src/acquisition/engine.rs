// src/acquisition/engine.rs
//! Background continuous-scan engine
//!
//! One worker thread per active scan pulls raw blocks from the device with
//! bounded timeouts, converts them through the frozen scaling pipeline, and
//! writes whole scan groups into the caller's ring buffer. Foreground
//! threads poll the status cell or block in `wait`; a stop request from any
//! thread is observed within one transfer timeout and the worker is joined
//! before `stop` returns, so no buffer write can happen afterwards.

use crate::acquisition::ring::{RingCursor, ScanBuffer};
use crate::acquisition::status::StatusCell;
use crate::acquisition::trigger::{ArmedTrigger, TriggerState};
use crate::calibration::ScalingPipeline;
use crate::config::constants::status_bits;
use crate::config::ScanTuning;
use crate::error::{DaqError, DaqResult};
use crate::hal::session::DeviceSession;
use crate::hal::types::{ScanOptions, ScanState, TransferStatus, TriggerConfig};
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Everything a scan needs, assembled and validated by the device facade
pub struct ScanPlan {
    pub num_channels: usize,
    pub samples_per_channel: usize,
    pub options: ScanOptions,
    pub pipeline: ScalingPipeline,
    pub trigger: Option<TriggerConfig>,
    pub buffer: Arc<ScanBuffer>,
    pub actual_rate_hz: f64,
    pub clock_divisor: u32,
    pub fifo_size_samples: usize,
}

/// Drives the background transfer loop for one device
pub struct ScanEngine {
    session: Arc<DeviceSession>,
    status: Arc<StatusCell>,
    stop_tx: Mutex<Option<Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    tuning: ScanTuning,
}

impl ScanEngine {
    pub fn new(session: Arc<DeviceSession>, tuning: ScanTuning) -> Self {
        Self {
            session,
            status: Arc::new(StatusCell::new()),
            stop_tx: Mutex::new(None),
            worker: Mutex::new(None),
            tuning,
        }
    }

    /// Arm the trigger, start the device pacer, and spawn the worker
    ///
    /// Returns with the scan in the Running state; all validation has
    /// already happened, so any failure here leaves the state Idle with no
    /// partial background activity.
    pub fn start(&self, plan: ScanPlan) -> DaqResult<()> {
        self.status.begin_scan()?;

        // A finished worker may still be parked in the slot; reap it so the
        // new scan's handle can take its place.
        if let Some(stale) = self.worker.lock().take() {
            let _ = stale.join();
        }

        let result = self.arm_and_launch(plan);
        if let Err(err) = &result {
            self.status.finish_idle();
            warn!(error = %err, "scan start failed");
        }
        result
    }

    fn arm_and_launch(&self, plan: ScanPlan) -> DaqResult<()> {
        let trigger = match plan.trigger {
            Some(config) => Some(ArmedTrigger::arm(
                &self.session,
                config,
                plan.options.contains(ScanOptions::RETRIGGER),
            )?),
            None => None,
        };

        self.send_scan_start(&plan)?;

        // Fresh stop channel per scan; dropping the sender also stops the
        // worker, so an engine torn down mid-scan cannot leak its thread.
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let worker = Worker {
            session: Arc::clone(&self.session),
            status: Arc::clone(&self.status),
            stop_rx,
            tuning: self.tuning.clone(),
            cursor: RingCursor::new(
                plan.samples_per_channel,
                plan.num_channels,
                plan.options.contains(ScanOptions::CONTINUOUS),
            ),
            buffer: plan.buffer,
            pipeline: plan.pipeline,
            trigger,
            continuous: plan.options.contains(ScanOptions::CONTINUOUS),
            num_channels: plan.num_channels,
            rate_hz: plan.actual_rate_hz,
            fifo_size_samples: plan.fifo_size_samples,
            channel_position: 0,
        };

        let handle = std::thread::Builder::new()
            .name("daq-scan".to_string())
            .spawn(move || worker.run())
            .map_err(|err| DaqError::Internal(format!("failed to spawn scan thread: {err}")))?;

        *self.worker.lock() = Some(handle);
        *self.stop_tx.lock() = Some(stop_tx);
        debug!(rate_hz = plan.actual_rate_hz, "scan started");
        Ok(())
    }

    fn send_scan_start(&self, plan: &ScanPlan) -> DaqResult<()> {
        let mut payload = Vec::with_capacity(11);
        payload.extend_from_slice(&plan.clock_divisor.to_le_bytes());
        payload.extend_from_slice(&(plan.samples_per_channel as u32).to_le_bytes());
        payload.push(plan.num_channels as u8);
        payload.extend_from_slice(&(plan.options.bits() as u16).to_le_bytes());

        self.session
            .send(self.session.commands().scan_start, 0, 0, &payload)?;
        Ok(())
    }

    /// Consistent `(state, transfer)` snapshot; never blocks, any thread
    pub fn status(&self) -> (ScanState, TransferStatus) {
        self.status.snapshot()
    }

    /// Error parked by the background loop, if any
    pub fn last_error(&self) -> Option<DaqError> {
        self.status.last_error()
    }

    /// Signal the worker, join it, and settle the state to Idle
    ///
    /// Idempotent; a no-op when nothing runs. The worker has fully exited
    /// when this returns, so no further buffer writes can occur.
    pub fn stop(&self) -> DaqResult<()> {
        if let Some(stop_tx) = self.stop_tx.lock().take() {
            // A worker that already exited has dropped its receiver
            let _ = stop_tx.try_send(());
        }

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }

        // A faulted scan transitions back to Idle once stopped
        self.status.acknowledge_error();
        Ok(())
    }

    /// Block the calling thread until the scan leaves Running
    pub fn wait(&self, timeout: Duration) -> DaqResult<()> {
        self.status.wait_not_running(timeout)
    }
}

impl Drop for ScanEngine {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

enum TransferOutcome {
    Finished,
    Stopped,
    Rearm,
}

struct Worker {
    session: Arc<DeviceSession>,
    status: Arc<StatusCell>,
    stop_rx: Receiver<()>,
    tuning: ScanTuning,
    cursor: RingCursor,
    buffer: Arc<ScanBuffer>,
    pipeline: ScalingPipeline,
    trigger: Option<ArmedTrigger>,
    continuous: bool,
    num_channels: usize,
    rate_hz: f64,
    fifo_size_samples: usize,
    channel_position: usize,
}

impl Worker {
    fn run(mut self) {
        loop {
            if self.trigger.is_some() && !self.wait_for_trigger() {
                return;
            }

            match self.transfer_loop() {
                Ok(TransferOutcome::Finished) | Ok(TransferOutcome::Stopped) => {
                    self.device_stop();
                    self.status.finish_idle();
                    return;
                }
                Ok(TransferOutcome::Rearm) => {
                    let rearmed = match self.trigger.as_mut() {
                        Some(trigger) => trigger.rearm(&self.session),
                        None => Ok(()),
                    };
                    if let Err(err) = rearmed {
                        self.fatal(err);
                        return;
                    }
                }
                Err(err) => {
                    self.fatal(err);
                    return;
                }
            }
        }
    }

    /// Block issuing transfers until the trigger fires or the scan is stopped
    ///
    /// While waiting, `current_index` stays -1; a stop request before
    /// satisfaction cancels the wait and leaves it -1 permanently.
    fn wait_for_trigger(&mut self) -> bool {
        let poll = Duration::from_millis(self.tuning.trigger_poll_ms.max(1));
        loop {
            let trigger = match self.trigger.as_mut() {
                Some(trigger) => trigger,
                None => return true,
            };
            if trigger.state() == TriggerState::Satisfied {
                return true;
            }
            match trigger.poll_satisfied(&self.session) {
                Ok(true) => return true,
                Ok(false) => {}
                Err(err) => {
                    self.fatal(err);
                    return false;
                }
            }

            match self.stop_rx.recv_timeout(poll) {
                Err(RecvTimeoutError::Timeout) => {}
                // Stop requested, or the engine itself went away
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    if let Some(trigger) = self.trigger.as_mut() {
                        trigger.cancel();
                    }
                    debug!("scan stopped while waiting for trigger");
                    self.device_stop();
                    self.status.finish_idle();
                    return false;
                }
            }
        }
    }

    fn transfer_loop(&mut self) -> DaqResult<TransferOutcome> {
        let slice_samples = self.slice_samples();
        let mut raw = vec![0u8; slice_samples * 2];
        let mut converted: Vec<f64> = Vec::with_capacity(slice_samples);

        // A drain larger than the FIFO could ever hold means samples were
        // dropped in between; channel interleave is no longer trustworthy.
        let backlog_limit = self
            .fifo_size_samples
            .saturating_mul(self.tuning.overrun_backlog_factor);

        let starvation_limit = self.starvation_limit();
        let mut last_data = Instant::now();

        loop {
            match self.stop_rx.try_recv() {
                Err(TryRecvError::Empty) => {}
                Ok(()) | Err(TryRecvError::Disconnected) => {
                    return Ok(TransferOutcome::Stopped);
                }
            }

            let status_word = self.session.status_word()?;
            if status_word & status_bits::FIFO_OVERRUN != 0 {
                return Err(DaqError::Overrun);
            }
            if status_word & status_bits::FIFO_UNDERRUN != 0 {
                return Err(DaqError::Underrun);
            }

            let read = self.session.query(
                self.session.commands().scan_data,
                0,
                0,
                &mut raw,
            );
            let bytes = match read {
                Ok(bytes) => bytes,
                Err(DaqError::TimedOut) => 0,
                Err(err) => return Err(err),
            };

            if bytes == 0 {
                if last_data.elapsed() > starvation_limit {
                    return Err(DaqError::TimedOut);
                }
                // Idle until more data is due, still responsive to stop
                match self.stop_rx.recv_timeout(Duration::from_millis(1)) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        return Ok(TransferOutcome::Stopped);
                    }
                }
            }
            last_data = Instant::now();

            let samples = bytes / 2;
            if samples > backlog_limit {
                return Err(DaqError::Overrun);
            }

            converted.clear();
            for chunk in raw[..samples * 2].chunks_exact(2) {
                let code = u16::from_le_bytes([chunk[0], chunk[1]]);
                converted.push(self.pipeline.apply(self.channel_position, code));
                self.channel_position = (self.channel_position + 1) % self.num_channels;
            }

            let completed = self.cursor.push_samples(&self.buffer, &converted);
            if completed > 0 {
                self.status.update_progress(
                    self.cursor.groups_written(),
                    self.cursor.samples_written(),
                    self.cursor.current_index(),
                );
            }

            if !self.continuous && self.cursor.remaining_groups() == 0 {
                debug!(groups = self.cursor.groups_written(), "finite scan complete");
                return Ok(TransferOutcome::Finished);
            }

            if let Some(trigger) = self.trigger.as_mut() {
                trigger.note_samples(completed);
                if trigger.should_rearm() {
                    return Ok(TransferOutcome::Rearm);
                }
            }
        }
    }

    /// Samples per drain: one transfer slice worth of data, floored so slow
    /// scans still move in useful blocks
    fn slice_samples(&self) -> usize {
        let throughput = self.rate_hz * self.num_channels as f64;
        let per_slice = (throughput * self.tuning.transfer_slice_ms as f64 / 1000.0) as usize;
        per_slice.max(self.tuning.min_transfer_samples)
    }

    fn starvation_limit(&self) -> Duration {
        let throughput = (self.rate_hz * self.num_channels as f64).max(1e-3);
        let slice = Duration::from_secs_f64(self.slice_samples() as f64 / throughput);
        let io_timeout = self.session.io_timeout();
        slice.max(io_timeout) * self.tuning.starvation_factor.max(1)
    }

    fn device_stop(&self) {
        let _ = self
            .session
            .send(self.session.commands().scan_stop, 0, 0, &[]);
    }

    fn fatal(&self, error: DaqError) {
        warn!(error = %error, "scan stopped on fault");
        self.device_stop();
        self.status.finish_error(error);
    }
}
