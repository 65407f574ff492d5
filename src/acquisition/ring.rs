// src/acquisition/ring.rs
//! Ring-buffer mapping over the caller-owned sample array
//!
//! The caller owns a flat array of `samples_per_channel * num_channels`
//! calibrated samples; the scan loop is its only writer while a scan runs.
//! Samples are stored as atomic bit cells so concurrent foreground reads of
//! already-written regions never tear, without any unsafe aliasing.
//! The cursor advances in whole scan groups only: a partial group from a
//! transfer stays staged internally and is never visible through the
//! reported index.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared flat sample array with tear-free element access
pub struct ScanBuffer {
    cells: Box<[AtomicU64]>,
}

impl ScanBuffer {
    /// Allocate a zeroed buffer of `len` samples
    pub fn new(len: usize) -> Self {
        let cells = (0..len).map(|_| AtomicU64::new(0)).collect();
        Self { cells }
    }

    /// Number of samples the buffer holds
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Read the sample at `index`
    #[inline]
    pub fn get(&self, index: usize) -> f64 {
        f64::from_bits(self.cells[index].load(Ordering::Acquire))
    }

    /// Write the sample at `index`
    #[inline]
    pub fn set(&self, index: usize, value: f64) {
        self.cells[index].store(value.to_bits(), Ordering::Release);
    }

    /// Copy out a contiguous region
    pub fn read_region(&self, start: usize, out: &mut [f64]) {
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.get(start + i);
        }
    }

    /// Bitwise checksum of the whole buffer, for write-quiescence checks
    pub fn checksum(&self) -> u64 {
        self.cells
            .iter()
            .fold(0u64, |acc, cell| {
                acc.wrapping_mul(31).wrapping_add(cell.load(Ordering::Acquire))
            })
    }
}

/// Group-granular write cursor over a [`ScanBuffer`]
pub struct RingCursor {
    samples_per_channel: usize,
    num_channels: usize,
    continuous: bool,
    /// Complete groups written since the scan started
    groups_written: u64,
    /// Staged samples of the group currently being assembled
    pending: Vec<f64>,
}

impl RingCursor {
    pub fn new(samples_per_channel: usize, num_channels: usize, continuous: bool) -> Self {
        Self {
            samples_per_channel,
            num_channels,
            continuous,
            groups_written: 0,
            pending: Vec::with_capacity(num_channels),
        }
    }

    /// Complete groups written so far
    pub fn groups_written(&self) -> u64 {
        self.groups_written
    }

    /// Total samples inside complete groups
    pub fn samples_written(&self) -> u64 {
        self.groups_written * self.num_channels as u64
    }

    /// Flat start index of the most recently completed group, or -1
    pub fn current_index(&self) -> i64 {
        if self.groups_written == 0 {
            return -1;
        }
        let group_pos = (self.groups_written - 1) % self.samples_per_channel as u64;
        (group_pos * self.num_channels as u64) as i64
    }

    /// Groups remaining before a finite scan of this length is complete
    pub fn remaining_groups(&self) -> u64 {
        (self.samples_per_channel as u64).saturating_sub(self.groups_written)
    }

    /// Append calibrated samples, writing every group that completes
    ///
    /// Returns the number of groups completed by this call. In finite mode
    /// samples beyond the requested count are discarded; in continuous mode
    /// the write position wraps.
    pub fn push_samples(&mut self, buffer: &ScanBuffer, samples: &[f64]) -> u64 {
        let mut completed = 0u64;

        for &sample in samples {
            if !self.continuous && self.remaining_groups() == 0 {
                break;
            }

            self.pending.push(sample);
            if self.pending.len() == self.num_channels {
                let group_pos = self.groups_written % self.samples_per_channel as u64;
                let base = group_pos as usize * self.num_channels;
                for (offset, &value) in self.pending.iter().enumerate() {
                    buffer.set(base + offset, value);
                }
                self.pending.clear();
                self.groups_written += 1;
                completed += 1;
            }
        }

        completed
    }
}
