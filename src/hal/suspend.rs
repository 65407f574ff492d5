// src/hal/suspend.rs
//! Host suspend/resume detection
//!
//! A watcher thread samples the monotonic and wall clocks on a fixed
//! interval. The monotonic clock pauses while the host sleeps, so a wall
//! clock jump far beyond the polling interval marks a suspend/resume cycle
//! and increments a generation counter. Long-lived session holders compare
//! their cached generation against the current one and re-validate the
//! transport before touching hardware, because USB re-enumeration after
//! resume can leave stale handles.

use crate::config::SuspendConfig;
use crate::utils::time::{SystemTimeProvider, TimeProvider};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, warn};

struct WatcherShared {
    generation: AtomicU64,
    stop: Mutex<bool>,
    stop_signal: Condvar,
    time: Arc<dyn TimeProvider>,
    poll_interval: Duration,
    drift_factor: u64,
}

/// Process-wide suspend/resume watcher
///
/// Explicitly started and shut down; injected into the components that need
/// it rather than accessed as a hidden global.
pub struct SuspendMonitor {
    shared: Arc<WatcherShared>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl SuspendMonitor {
    /// Start the watcher thread with the system clock
    pub fn start(config: &SuspendConfig) -> Arc<Self> {
        Self::start_with_time(config, Arc::new(SystemTimeProvider::new()))
    }

    /// Start the watcher thread with an injected clock, for tests
    pub fn start_with_time(config: &SuspendConfig, time: Arc<dyn TimeProvider>) -> Arc<Self> {
        let shared = Arc::new(WatcherShared {
            generation: AtomicU64::new(0),
            stop: Mutex::new(false),
            stop_signal: Condvar::new(),
            time,
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            drift_factor: config.drift_factor.max(2),
        });

        let thread_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("daq-suspend-watch".to_string())
            .spawn(move || watch_loop(thread_shared))
            .ok();

        if handle.is_none() {
            warn!("failed to spawn suspend watcher; suspend detection disabled");
        }

        Arc::new(Self {
            shared,
            watcher: Mutex::new(handle),
        })
    }

    /// Current suspend generation; increments once per detected sleep cycle
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::Acquire)
    }

    /// Stop and join the watcher thread; further generations are frozen
    pub fn shutdown(&self) {
        {
            let mut stop = self.shared.stop.lock();
            *stop = true;
            self.shared.stop_signal.notify_all();
        }
        if let Some(handle) = self.watcher.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SuspendMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn watch_loop(shared: Arc<WatcherShared>) {
    let poll_nanos = shared.poll_interval.as_nanos() as u64;
    let threshold = poll_nanos.saturating_mul(shared.drift_factor);

    let mut last_mono = shared.time.monotonic_nanos();
    let mut last_wall = shared.time.wall_nanos();

    loop {
        {
            let mut stop = shared.stop.lock();
            if *stop {
                return;
            }
            shared
                .stop_signal
                .wait_for(&mut stop, shared.poll_interval);
            if *stop {
                return;
            }
        }

        let mono = shared.time.monotonic_nanos();
        let wall = shared.time.wall_nanos();

        let mono_delta = mono.saturating_sub(last_mono);
        let wall_delta = wall.saturating_sub(last_wall);

        // Wall time that passed while the monotonic clock stood still
        if wall_delta.saturating_sub(mono_delta) > threshold {
            let generation = shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
            debug!(
                generation,
                gap_ms = wall_delta.saturating_sub(mono_delta) / 1_000_000,
                "host suspend/resume cycle detected"
            );
        }

        last_mono = mono;
        last_wall = wall;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::time::MockTimeProvider;

    fn fast_config() -> SuspendConfig {
        SuspendConfig {
            poll_interval_ms: 5,
            drift_factor: 4,
        }
    }

    fn wait_for<F: Fn() -> bool>(predicate: F) -> bool {
        for _ in 0..200 {
            if predicate() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        predicate()
    }

    #[test]
    fn test_no_suspend_no_generation_bump() {
        let time = Arc::new(MockTimeProvider::new(0));
        let monitor = SuspendMonitor::start_with_time(&fast_config(), time.clone());

        // Clocks advance together
        for _ in 0..10 {
            time.advance_by(5_000_000);
            std::thread::sleep(Duration::from_millis(6));
        }

        assert_eq!(monitor.generation(), 0);
        monitor.shutdown();
    }

    #[test]
    fn test_wall_jump_increments_generation() {
        let time = Arc::new(MockTimeProvider::new(0));
        let monitor = SuspendMonitor::start_with_time(&fast_config(), time.clone());

        // 1 second wall jump against a 5 ms poll: far beyond the threshold
        time.jump_wall_by(1_000_000_000);

        assert!(wait_for(|| monitor.generation() >= 1));
        monitor.shutdown();
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let monitor = SuspendMonitor::start(&fast_config());
        monitor.shutdown();
        monitor.shutdown();
        assert_eq!(monitor.generation(), monitor.generation());
    }
}
