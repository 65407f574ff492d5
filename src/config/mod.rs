// src/config/mod.rs
//! Configuration management for the DAQ layer

pub mod constants;

pub use constants::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete DAQ layer configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct DaqConfig {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub scan: ScanTuning,
    #[serde(default)]
    pub suspend: SuspendConfig,
    #[serde(default)]
    pub firmware: FirmwareConfig,
}

/// Transport command exchange settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TransportConfig {
    #[serde(default = "defaults::io_timeout_ms")]
    pub io_timeout_ms: u64,
}

/// Scan engine pacing and fault-detection settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScanTuning {
    #[serde(default = "defaults::transfer_slice_ms")]
    pub transfer_slice_ms: u64,

    #[serde(default = "defaults::min_transfer_samples")]
    pub min_transfer_samples: usize,

    #[serde(default = "defaults::overrun_backlog_factor")]
    pub overrun_backlog_factor: usize,

    #[serde(default = "defaults::starvation_factor")]
    pub starvation_factor: u32,

    #[serde(default = "defaults::trigger_poll_ms")]
    pub trigger_poll_ms: u64,
}

/// Host suspend/resume watcher settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SuspendConfig {
    #[serde(default = "defaults::suspend_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "defaults::suspend_drift_factor")]
    pub drift_factor: u64,
}

/// Firmware bitstream location settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FirmwareConfig {
    #[serde(default = "defaults::firmware_directory")]
    pub directory: PathBuf,
}

/// Default value providers backed by `constants`
mod defaults {
    use super::constants;
    use std::path::PathBuf;

    pub fn io_timeout_ms() -> u64 {
        constants::transport::DEFAULT_IO_TIMEOUT_MS
    }

    pub fn transfer_slice_ms() -> u64 {
        constants::scan::TRANSFER_SLICE_MS
    }

    pub fn min_transfer_samples() -> usize {
        constants::scan::MIN_TRANSFER_SAMPLES
    }

    pub fn overrun_backlog_factor() -> usize {
        constants::scan::OVERRUN_BACKLOG_FACTOR
    }

    pub fn starvation_factor() -> u32 {
        constants::scan::STARVATION_FACTOR
    }

    pub fn trigger_poll_ms() -> u64 {
        constants::scan::TRIGGER_POLL_MS
    }

    pub fn suspend_poll_interval_ms() -> u64 {
        constants::suspend::DEFAULT_POLL_INTERVAL_MS
    }

    pub fn suspend_drift_factor() -> u64 {
        constants::suspend::DRIFT_FACTOR
    }

    pub fn firmware_directory() -> PathBuf {
        PathBuf::from(constants::firmware::DEFAULT_DIRECTORY)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            io_timeout_ms: defaults::io_timeout_ms(),
        }
    }
}

impl Default for ScanTuning {
    fn default() -> Self {
        Self {
            transfer_slice_ms: defaults::transfer_slice_ms(),
            min_transfer_samples: defaults::min_transfer_samples(),
            overrun_backlog_factor: defaults::overrun_backlog_factor(),
            starvation_factor: defaults::starvation_factor(),
            trigger_poll_ms: defaults::trigger_poll_ms(),
        }
    }
}

impl Default for SuspendConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::suspend_poll_interval_ms(),
            drift_factor: defaults::suspend_drift_factor(),
        }
    }
}

impl Default for FirmwareConfig {
    fn default() -> Self {
        Self {
            directory: defaults::firmware_directory(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    FileNotFound(String),
    #[error("configuration parse error: {0}")]
    ParseError(String),
    #[error("io error: {0}")]
    IoError(String),
}

/// Loads [`DaqConfig`] from TOML files and `DAQ_`-prefixed environment overrides
pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            search_paths: vec![
                PathBuf::from("daq-hal.toml"),
                PathBuf::from("/etc/daq-hal/daq-hal.toml"),
            ],
        }
    }

    /// Prepend an explicit config file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.insert(0, path.as_ref().to_path_buf());
        self
    }

    /// Load the first config file found, falling back to defaults, then
    /// apply environment overrides (`DAQ_SCAN__TRANSFER_SLICE_MS=25` etc.)
    pub fn load(&self) -> Result<DaqConfig, ConfigError> {
        let mut builder = config::Config::builder();

        for path in &self.search_paths {
            if path.exists() {
                builder = builder.add_source(config::File::from(path.as_path()));
                break;
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix("DAQ")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DaqConfig::default();
        assert_eq!(config.transport.io_timeout_ms, 1000);
        assert_eq!(config.scan.transfer_slice_ms, 50);
        assert_eq!(config.suspend.drift_factor, 4);
        assert_eq!(
            config.firmware.directory,
            PathBuf::from("/etc/daq-hal/fpga")
        );
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = DaqConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: DaqConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.scan.transfer_slice_ms, config.scan.transfer_slice_ms);
        assert_eq!(parsed.suspend.poll_interval_ms, config.suspend.poll_interval_ms);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: DaqConfig = toml::from_str("[scan]\ntransfer_slice_ms = 25\n").unwrap();
        assert_eq!(parsed.scan.transfer_slice_ms, 25);
        assert_eq!(parsed.scan.trigger_poll_ms, 1);
        assert_eq!(parsed.transport.io_timeout_ms, 1000);
    }

    #[test]
    fn test_loader_missing_files_fall_back() {
        let loader = ConfigLoader::new().with_path("/nonexistent/daq.toml");
        let config = loader.load().unwrap();
        assert_eq!(config.scan.overrun_backlog_factor, 2);
    }
}
