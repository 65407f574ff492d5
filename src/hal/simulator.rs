// src/hal/simulator.rs
//! In-memory simulated DAQ transport
//!
//! Implements the transport contract against a modelled device: firmware
//! bring-up state, a paced sample producer with a bounded FIFO, trigger
//! arming with injectable satisfaction, and fault injection for overrun,
//! underrun, and disconnect. Integration tests and the demo programs run
//! against this transport.

use crate::config::constants::status_bits;
use crate::error::{DaqError, DaqResult};
use crate::hal::capabilities::CommandSet;
use crate::hal::traits::TransportSession;
use parking_lot::Mutex;
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Sample production pacing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Produce samples at the programmed rate in real time
    Realtime,
    /// Unlimited backlog; every drain is immediately satisfied
    Unlimited,
}

/// Simulated device configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub pacing: Pacing,
    /// Peak noise amplitude in counts; zero keeps the waveform deterministic
    pub noise_counts: f64,
    /// Device comes up with firmware already latched
    pub firmware_preloaded: bool,
    pub fifo_size_samples: usize,
    pub clock_base_hz: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            pacing: Pacing::Realtime,
            noise_counts: 0.0,
            firmware_preloaded: true,
            fifo_size_samples: 4096,
            clock_base_hz: 10_000_000.0,
        }
    }
}

struct ActiveScan {
    samples_per_channel: u64,
    num_channels: u64,
    continuous: bool,
    ext_trigger: bool,
    /// Per-channel sample rate derived from the programmed divisor
    rate_hz: f64,
    paced_from: Option<Instant>,
    produced: u64,
    consumed: u64,
}

impl ActiveScan {
    fn total_limit(&self) -> Option<u64> {
        if self.continuous {
            None
        } else {
            Some(self.samples_per_channel * self.num_channels)
        }
    }
}

struct SimState {
    scan: Option<ActiveScan>,
    trigger_armed: bool,
}

/// Simulated transport session
pub struct SimulatedTransport {
    config: SimulatorConfig,
    commands: CommandSet,
    state: Mutex<SimState>,
    connected: AtomicBool,
    fpga_loaded: AtomicBool,
    fpga_unlocked: AtomicBool,
    fpga_bytes: AtomicU64,
    trigger_satisfied: AtomicBool,
    injected_status: AtomicU16,
    digital_port: AtomicU64,
    sample_counter: AtomicU64,
}

impl SimulatedTransport {
    pub fn new(config: SimulatorConfig) -> Self {
        let fpga_loaded = AtomicBool::new(config.firmware_preloaded);
        Self {
            config,
            commands: CommandSet::default(),
            state: Mutex::new(SimState {
                scan: None,
                trigger_armed: false,
            }),
            connected: AtomicBool::new(true),
            fpga_loaded,
            fpga_unlocked: AtomicBool::new(false),
            fpga_bytes: AtomicU64::new(0),
            trigger_satisfied: AtomicBool::new(false),
            injected_status: AtomicU16::new(0),
            digital_port: AtomicU64::new(0),
            sample_counter: AtomicU64::new(0),
        }
    }

    /// Device with default config and unlimited pacing, for fast tests
    pub fn unlimited() -> Self {
        Self::new(SimulatorConfig {
            pacing: Pacing::Unlimited,
            ..SimulatorConfig::default()
        })
    }

    /// Satisfy the armed trigger condition, as external hardware would
    pub fn inject_trigger(&self) {
        self.trigger_satisfied.store(true, Ordering::Release);
        let mut state = self.state.lock();
        if let Some(scan) = state.scan.as_mut() {
            if scan.paced_from.is_none() {
                scan.paced_from = Some(Instant::now());
            }
        }
    }

    /// Latch the FIFO overrun status bit
    pub fn inject_overrun(&self) {
        self.injected_status
            .fetch_or(status_bits::FIFO_OVERRUN, Ordering::Release);
    }

    /// Latch the FIFO underrun status bit
    pub fn inject_underrun(&self) {
        self.injected_status
            .fetch_or(status_bits::FIFO_UNDERRUN, Ordering::Release);
    }

    /// Set the digital port value seen by pattern triggers
    pub fn set_digital_port(&self, value: u64) {
        self.digital_port.store(value, Ordering::Release);
    }

    /// Connect or disconnect the transport channel
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    /// Firmware bytes received through the data command
    pub fn firmware_bytes_received(&self) -> u64 {
        self.fpga_bytes.load(Ordering::Acquire)
    }

    /// Whether a trigger is currently armed
    pub fn trigger_armed(&self) -> bool {
        self.state.lock().trigger_armed
    }

    fn ensure_connected(&self) -> DaqResult<()> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(DaqError::NotConnected)
        }
    }

    fn status_word(&self) -> u16 {
        let mut word = self.injected_status.load(Ordering::Acquire);
        if self.fpga_loaded.load(Ordering::Acquire) {
            word |= status_bits::FPGA_LOADED;
        }
        if self.trigger_satisfied.load(Ordering::Acquire) {
            word |= status_bits::TRIGGERED;
        }
        if self.state.lock().scan.is_some() {
            word |= status_bits::SCAN_RUNNING;
        }
        word
    }

    /// Deterministic waveform plus optional noise, one code per conversion
    fn next_code(&self) -> u16 {
        let n = self.sample_counter.fetch_add(1, Ordering::Relaxed);
        let phase = (n % 128) as f64 / 128.0 * std::f64::consts::TAU;
        let mut code = 32768.0 + 12000.0 * phase.sin();
        if self.config.noise_counts > 0.0 {
            code += rand::thread_rng().gen_range(-self.config.noise_counts..self.config.noise_counts);
        }
        code.clamp(0.0, 65535.0) as u16
    }

    fn handle_scan_start(&self, payload: &[u8]) -> DaqResult<()> {
        if payload.len() < 11 {
            return Err(DaqError::Internal(
                "malformed scan start payload".to_string(),
            ));
        }
        let divisor = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let samples_per_channel =
            u32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]);
        let num_channels = payload[8] as u64;
        let options = u16::from_le_bytes([payload[9], payload[10]]);

        let continuous = options & (1 << 3) != 0;
        let ext_trigger = options & (1 << 5) != 0;

        let mut state = self.state.lock();
        let armed = state.trigger_armed;
        let gated = ext_trigger && armed;
        state.scan = Some(ActiveScan {
            samples_per_channel: samples_per_channel as u64,
            num_channels: num_channels.max(1),
            continuous,
            ext_trigger: gated,
            rate_hz: self.config.clock_base_hz / divisor.max(1) as f64,
            paced_from: if gated { None } else { Some(Instant::now()) },
            produced: 0,
            consumed: 0,
        });

        // Fault latches clear when a new scan is programmed
        self.injected_status.store(0, Ordering::Release);
        Ok(())
    }

    fn drain_scan_data(&self, out: &mut [u8]) -> usize {
        let mut state = self.state.lock();
        let scan = match state.scan.as_mut() {
            Some(scan) => scan,
            None => return 0,
        };

        if scan.ext_trigger {
            if !self.trigger_satisfied.load(Ordering::Acquire) {
                return 0;
            }
            if scan.paced_from.is_none() {
                scan.paced_from = Some(Instant::now());
            }
        }

        let capacity = (out.len() / 2) as u64;
        let mut available = match self.config.pacing {
            Pacing::Unlimited => capacity,
            Pacing::Realtime => {
                let elapsed = match scan.paced_from {
                    Some(from) => from.elapsed(),
                    None => Duration::ZERO,
                };
                let throughput = scan.rate_hz * scan.num_channels as f64;
                let target = (elapsed.as_secs_f64() * throughput) as u64;
                scan.produced = scan.produced.max(target);
                let backlog = scan.produced - scan.consumed;

                // Data beyond the FIFO capacity was lost on the real device
                if backlog > self.config.fifo_size_samples as u64 {
                    self.injected_status
                        .fetch_or(status_bits::FIFO_OVERRUN, Ordering::Release);
                }
                backlog.min(self.config.fifo_size_samples as u64)
            }
        };

        if let Some(limit) = scan.total_limit() {
            available = available.min(limit.saturating_sub(scan.consumed));
        }

        let samples = available.min(capacity) as usize;
        for i in 0..samples {
            let code = self.next_code();
            out[i * 2..i * 2 + 2].copy_from_slice(&code.to_le_bytes());
        }
        scan.consumed += samples as u64;
        samples * 2
    }
}

impl TransportSession for SimulatedTransport {
    fn send(
        &self,
        command: u8,
        _value: u16,
        _index: u16,
        payload: &[u8],
        _timeout: Duration,
    ) -> DaqResult<usize> {
        self.ensure_connected()?;

        if command == self.commands.scan_start {
            self.handle_scan_start(payload)?;
        } else if command == self.commands.scan_stop {
            self.state.lock().scan = None;
        } else if command == self.commands.scan_clear_fifo {
            if let Some(scan) = self.state.lock().scan.as_mut() {
                scan.consumed = scan.produced;
            }
        } else if command == self.commands.set_trigger {
            let mut state = self.state.lock();
            state.trigger_armed = true;
            self.trigger_satisfied.store(false, Ordering::Release);
        } else if command == self.commands.fpga_config {
            if payload == [crate::config::constants::firmware::UNLOCK_CODE] {
                self.fpga_unlocked.store(true, Ordering::Release);
                self.fpga_bytes.store(0, Ordering::Release);
            }
        } else if command == self.commands.fpga_data {
            if !self.fpga_unlocked.load(Ordering::Acquire) {
                return Err(DaqError::Internal(
                    "firmware data without configuration unlock".to_string(),
                ));
            }
            self.fpga_bytes
                .fetch_add(payload.len() as u64, Ordering::AcqRel);
            self.fpga_loaded.store(true, Ordering::Release);
        }

        Ok(payload.len())
    }

    fn query(
        &self,
        command: u8,
        value: u16,
        _index: u16,
        out: &mut [u8],
        _timeout: Duration,
    ) -> DaqResult<usize> {
        self.ensure_connected()?;

        if command == self.commands.status {
            let bytes = self.status_word().to_le_bytes();
            let len = bytes.len().min(out.len());
            out[..len].copy_from_slice(&bytes[..len]);
            return Ok(len);
        }

        if command == self.commands.scan_data {
            return Ok(self.drain_scan_data(out));
        }

        if command == self.commands.ain {
            // Single software-paced conversion; channel arrives in `value`
            let code = self.next_code().wrapping_add(value * 16);
            out[..2].copy_from_slice(&code.to_le_bytes());
            return Ok(2);
        }

        if command == self.commands.digital_snapshot {
            let bytes = self.digital_port.load(Ordering::Acquire).to_le_bytes();
            let len = bytes.len().min(out.len());
            out[..len].copy_from_slice(&bytes[..len]);
            return Ok(len);
        }

        if command == self.commands.fpga_version {
            out[..2].copy_from_slice(&0x0102u16.to_le_bytes());
            return Ok(2);
        }

        Ok(0)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start_payload(divisor: u32, spc: u32, channels: u8, options: u16) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&divisor.to_le_bytes());
        payload.extend_from_slice(&spc.to_le_bytes());
        payload.push(channels);
        payload.extend_from_slice(&options.to_le_bytes());
        payload
    }

    #[test]
    fn test_status_word_reflects_firmware() {
        let sim = SimulatedTransport::new(SimulatorConfig {
            firmware_preloaded: false,
            ..SimulatorConfig::default()
        });
        assert_eq!(sim.status_word() & status_bits::FPGA_LOADED, 0);

        sim.send(CommandSet::default().fpga_config, 0, 0, &[0xAD], Duration::ZERO)
            .unwrap();
        sim.send(CommandSet::default().fpga_data, 0, 0, &[0u8; 64], Duration::ZERO)
            .unwrap();
        assert_ne!(sim.status_word() & status_bits::FPGA_LOADED, 0);
        assert_eq!(sim.firmware_bytes_received(), 64);
    }

    #[test]
    fn test_unlimited_scan_produces_data() {
        let sim = SimulatedTransport::unlimited();
        sim.send(
            CommandSet::default().scan_start,
            0,
            0,
            &start_payload(10_000, 100, 2, 0),
            Duration::ZERO,
        )
        .unwrap();

        let mut out = vec![0u8; 64];
        let bytes = sim
            .query(CommandSet::default().scan_data, 0, 0, &mut out, Duration::ZERO)
            .unwrap();
        assert_eq!(bytes, 64);
    }

    #[test]
    fn test_finite_scan_stops_at_limit() {
        let sim = SimulatedTransport::unlimited();
        // 4 samples per channel, 2 channels: 8 samples total
        sim.send(
            CommandSet::default().scan_start,
            0,
            0,
            &start_payload(10_000, 4, 2, 0),
            Duration::ZERO,
        )
        .unwrap();

        let mut out = vec![0u8; 1024];
        let bytes = sim
            .query(CommandSet::default().scan_data, 0, 0, &mut out, Duration::ZERO)
            .unwrap();
        assert_eq!(bytes, 16);

        let more = sim
            .query(CommandSet::default().scan_data, 0, 0, &mut out, Duration::ZERO)
            .unwrap();
        assert_eq!(more, 0);
    }

    #[test]
    fn test_triggered_scan_holds_until_injection() {
        let sim = SimulatedTransport::unlimited();
        sim.send(CommandSet::default().set_trigger, 0, 0, &[0u8; 4], Duration::ZERO)
            .unwrap();
        sim.send(
            CommandSet::default().scan_start,
            0,
            0,
            &start_payload(10_000, 10, 1, 1 << 5),
            Duration::ZERO,
        )
        .unwrap();

        let mut out = vec![0u8; 64];
        assert_eq!(
            sim.query(CommandSet::default().scan_data, 0, 0, &mut out, Duration::ZERO)
                .unwrap(),
            0
        );

        sim.inject_trigger();
        assert!(
            sim.query(CommandSet::default().scan_data, 0, 0, &mut out, Duration::ZERO)
                .unwrap()
                > 0
        );
    }

    #[test]
    fn test_disconnect_fails_exchanges() {
        let sim = SimulatedTransport::unlimited();
        sim.set_connected(false);
        assert!(!sim.is_connected());

        let mut out = [0u8; 2];
        assert_eq!(
            sim.query(CommandSet::default().status, 0, 0, &mut out, Duration::ZERO)
                .unwrap_err(),
            DaqError::NotConnected
        );
    }

    #[test]
    fn test_injected_faults_latch_until_next_start() {
        let sim = SimulatedTransport::unlimited();
        sim.inject_overrun();
        assert_ne!(sim.status_word() & status_bits::FIFO_OVERRUN, 0);

        sim.send(
            CommandSet::default().scan_start,
            0,
            0,
            &start_payload(10_000, 10, 1, 0),
            Duration::ZERO,
        )
        .unwrap();
        assert_eq!(sim.status_word() & status_bits::FIFO_OVERRUN, 0);
    }
}
