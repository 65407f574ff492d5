// src/hal/firmware.rs
//! FPGA bitstream loader
//!
//! Devices in this family hold their gate-array image in volatile memory;
//! the image must be streamed in after power-up and again after any event
//! that drops power. The transfer protocol: probe the status word's loaded
//! bit, send the unlock sentinel via the configuration command, stream the
//! image in 64-byte chunks via the data command, append a two-byte zero
//! trailer on families that need the flush, then re-probe.

use crate::config::constants::{firmware, status_bits};
use crate::config::FirmwareConfig;
use crate::error::{DaqError, DaqResult};
use crate::hal::session::DeviceSession;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Loads and verifies the device's firmware bitstream
pub struct FirmwareLoader {
    session: Arc<DeviceSession>,
    directory: PathBuf,
    file_name: String,
    needs_trailer: bool,
}

impl FirmwareLoader {
    pub fn new(
        session: Arc<DeviceSession>,
        config: &FirmwareConfig,
        file_name: &str,
        needs_trailer: bool,
    ) -> Self {
        Self {
            session,
            directory: config.directory.clone(),
            file_name: file_name.to_string(),
            needs_trailer,
        }
    }

    /// Whether the device reports its firmware loaded
    ///
    /// Uses the raw session path: this probe runs while the loaded-state is
    /// the thing being established, so it must not recurse into the
    /// suspend re-validation.
    pub fn is_loaded(&self) -> DaqResult<bool> {
        let status = self.session.raw_status_word()?;
        Ok(status & status_bits::FPGA_LOADED != 0)
    }

    /// Ensure the firmware is loaded, streaming the bitstream if needed
    ///
    /// Filesystem failures are distinct from hardware faults so callers can
    /// tell "not installed" from "device fault": a missing file is
    /// `FirmwareFileNotFound`, an unreadable one `FirmwareReadFailure`, and
    /// a device that still reports unloaded after a complete transfer is
    /// `NoFirmware` (not retried).
    pub fn ensure_loaded(&self) -> DaqResult<()> {
        if self.is_loaded()? {
            return Ok(());
        }

        let image = self.read_image()?;
        self.transfer(&image)?;

        if !self.is_loaded()? {
            return Err(DaqError::NoFirmware);
        }

        info!(file = %self.file_name, bytes = image.len(), "firmware loaded");
        Ok(())
    }

    /// Raw firmware version word reported by the device
    pub fn raw_version(&self) -> DaqResult<u16> {
        let mut out = [0u8; 2];
        self.session
            .raw_query(self.session.commands().fpga_version, 0, 0, &mut out)?;
        Ok(u16::from_le_bytes(out))
    }

    fn image_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }

    fn read_image(&self) -> DaqResult<Vec<u8>> {
        let path = self.image_path();
        let mut file = match std::fs::File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(DaqError::FirmwareFileNotFound(path.display().to_string()));
            }
            Err(err) => {
                return Err(DaqError::FirmwareReadFailure(format!(
                    "{}: {}",
                    path.display(),
                    err
                )));
            }
        };

        let mut image = Vec::new();
        file.read_to_end(&mut image).map_err(|err| {
            DaqError::FirmwareReadFailure(format!("{}: {}", path.display(), err))
        })?;
        Ok(image)
    }

    fn transfer(&self, image: &[u8]) -> DaqResult<()> {
        let commands = self.session.commands();

        debug!(bytes = image.len(), "entering firmware configuration mode");
        self.session
            .raw_send(commands.fpga_config, 0, 0, &[firmware::UNLOCK_CODE])?;

        for chunk in image.chunks(firmware::CHUNK_SIZE) {
            self.session.raw_send(commands.fpga_data, 0, 0, chunk)?;
        }

        if self.needs_trailer {
            self.session
                .raw_send(commands.fpga_data, 0, 0, &firmware::TRAILER)?;
        }

        Ok(())
    }
}
