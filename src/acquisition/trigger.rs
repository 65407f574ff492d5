// src/acquisition/trigger.rs
//! Trigger validation, arming, and satisfaction tracking
//!
//! A trigger gates when a scan's sample stream actually begins. Validation
//! happens synchronously in `set_trigger`/`start_scan`; arming happens at
//! scan start by programming the device; satisfaction is observed either
//! from the hardware status word's triggered bit or, for the pattern family,
//! by matching a digital port snapshot against `(pattern, mask)`.

use crate::config::constants::status_bits;
use crate::error::{DaqError, DaqResult};
use crate::hal::capabilities::DeviceCapabilities;
use crate::hal::session::DeviceSession;
use crate::hal::types::{ScanOptions, TriggerConfig, TriggerType};
use tracing::debug;

/// Lifecycle of a trigger across one scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Unarmed,
    Armed,
    Satisfied,
    Cancelled,
}

/// Validate a trigger configuration against the device's capabilities
pub fn validate_trigger(caps: &DeviceCapabilities, config: &TriggerConfig) -> DaqResult<()> {
    if !caps.supports_trigger(config.trigger_type) {
        return Err(DaqError::BadArgument(format!(
            "trigger type {:?} not supported by {}",
            config.trigger_type, caps.model
        )));
    }

    if config.retrigger_count > 0 {
        if caps.scan_options_mask & ScanOptions::RETRIGGER.bits() == 0 {
            return Err(DaqError::BadArgument(
                "re-trigger count set but the device does not support re-triggering".to_string(),
            ));
        }
        if config.trigger_type.is_gate() {
            return Err(DaqError::BadArgument(format!(
                "re-trigger is not supported for gate trigger type {:?}",
                config.trigger_type
            )));
        }
    }

    if !config.trigger_type.is_pattern() && config.variance < 0.0 {
        return Err(DaqError::BadArgument(
            "trigger variance must be non-negative".to_string(),
        ));
    }

    Ok(())
}

/// A trigger programmed into the device for the current scan
pub struct ArmedTrigger {
    config: TriggerConfig,
    state: TriggerState,
    retrigger: bool,
    samples_since_trigger: u64,
}

impl ArmedTrigger {
    /// Program the trigger condition and leave it armed
    pub fn arm(
        session: &DeviceSession,
        config: TriggerConfig,
        retrigger: bool,
    ) -> DaqResult<Self> {
        let mut payload = Vec::with_capacity(24);
        payload.extend_from_slice(&config.trigger_type.bit().to_le_bytes());
        payload.extend_from_slice(&config.level.to_le_bytes());
        payload.extend_from_slice(&config.variance.to_le_bytes());
        payload.extend_from_slice(&config.retrigger_count.to_le_bytes());

        session.send(
            session.commands().set_trigger,
            config.channel as u16,
            0,
            &payload,
        )?;

        debug!(trigger_type = ?config.trigger_type, channel = config.channel, "trigger armed");

        Ok(Self {
            config,
            state: TriggerState::Armed,
            retrigger,
            samples_since_trigger: 0,
        })
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    /// Check whether the armed condition has been satisfied
    ///
    /// Pattern types snapshot the digital port and match `(pattern, mask)`;
    /// every other type reads the hardware triggered bit.
    pub fn poll_satisfied(&mut self, session: &DeviceSession) -> DaqResult<bool> {
        if self.state == TriggerState::Satisfied {
            return Ok(true);
        }
        if self.state != TriggerState::Armed {
            return Ok(false);
        }

        let satisfied = if self.config.trigger_type.is_pattern() {
            let mut out = [0u8; 8];
            session.query(
                session.commands().digital_snapshot,
                self.config.channel as u16,
                0,
                &mut out,
            )?;
            let port = u64::from_le_bytes(out);
            let pattern = self.config.level as u64;
            let mask = self.config.variance as u64;
            match self.config.trigger_type {
                TriggerType::PatternEq => port & mask == pattern & mask,
                _ => port & mask != pattern & mask,
            }
        } else {
            session.status_word()? & status_bits::TRIGGERED != 0
        };

        if satisfied {
            self.state = TriggerState::Satisfied;
            self.samples_since_trigger = 0;
            debug!("trigger satisfied");
        }
        Ok(satisfied)
    }

    /// Mark the trigger wait abandoned by a stop request
    pub fn cancel(&mut self) {
        if self.state == TriggerState::Armed {
            self.state = TriggerState::Cancelled;
        }
    }

    /// Record samples acquired since the last trigger event
    pub fn note_samples(&mut self, samples: u64) {
        if self.state == TriggerState::Satisfied {
            self.samples_since_trigger += samples;
        }
    }

    /// Whether the re-trigger window elapsed and the condition must re-arm
    pub fn should_rearm(&self) -> bool {
        self.retrigger
            && self.state == TriggerState::Satisfied
            && self.config.retrigger_count > 0
            && self.samples_since_trigger >= self.config.retrigger_count as u64
    }

    /// Re-arm after a re-trigger window without a new scan start
    pub fn rearm(&mut self, session: &DeviceSession) -> DaqResult<()> {
        session.send(
            session.commands().set_trigger,
            self.config.channel as u16,
            0,
            &[],
        )?;
        self.state = TriggerState::Armed;
        self.samples_since_trigger = 0;
        debug!("trigger re-armed");
        Ok(())
    }
}
