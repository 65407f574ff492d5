// src/utils/time.rs
//! Clock sampling with injectable providers for deterministic tests

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Clock source abstraction
///
/// The suspend watcher compares the two axes: the monotonic clock stops
/// during host sleep while the wall clock keeps running.
pub trait TimeProvider: Send + Sync {
    /// Nanoseconds on a monotonic clock that pauses across host suspend
    fn monotonic_nanos(&self) -> u64;

    /// Nanoseconds on the wall clock since the Unix epoch
    fn wall_nanos(&self) -> u64;
}

/// System clock provider
pub struct SystemTimeProvider {
    origin: Instant,
}

impl SystemTimeProvider {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeProvider for SystemTimeProvider {
    fn monotonic_nanos(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    fn wall_nanos(&self) -> u64 {
        current_timestamp_nanos()
    }
}

/// Mock provider whose clocks are advanced explicitly by tests
pub struct MockTimeProvider {
    monotonic: AtomicU64,
    wall: AtomicU64,
}

impl MockTimeProvider {
    pub fn new(initial_nanos: u64) -> Self {
        Self {
            monotonic: AtomicU64::new(initial_nanos),
            wall: AtomicU64::new(initial_nanos),
        }
    }

    /// Advance both clocks together, as during normal operation
    pub fn advance_by(&self, nanos: u64) {
        self.monotonic.fetch_add(nanos, Ordering::Relaxed);
        self.wall.fetch_add(nanos, Ordering::Relaxed);
    }

    /// Advance only the wall clock, as observed after a suspend/resume cycle
    pub fn jump_wall_by(&self, nanos: u64) {
        self.wall.fetch_add(nanos, Ordering::Relaxed);
    }
}

impl TimeProvider for MockTimeProvider {
    fn monotonic_nanos(&self) -> u64 {
        self.monotonic.load(Ordering::Relaxed)
    }

    fn wall_nanos(&self) -> u64 {
        self.wall.load(Ordering::Relaxed)
    }
}

/// Current wall-clock timestamp in nanoseconds since the Unix epoch
pub fn current_timestamp_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_provider_monotonic_advances() {
        let provider = SystemTimeProvider::new();
        let a = provider.monotonic_nanos();
        let b = provider.monotonic_nanos();
        assert!(b >= a);
    }

    #[test]
    fn test_mock_provider_advance() {
        let mock = MockTimeProvider::new(1_000);
        mock.advance_by(500);
        assert_eq!(mock.monotonic_nanos(), 1_500);
        assert_eq!(mock.wall_nanos(), 1_500);
    }

    #[test]
    fn test_mock_provider_wall_jump() {
        let mock = MockTimeProvider::new(0);
        mock.jump_wall_by(10_000);
        assert_eq!(mock.monotonic_nanos(), 0);
        assert_eq!(mock.wall_nanos(), 10_000);
    }
}
