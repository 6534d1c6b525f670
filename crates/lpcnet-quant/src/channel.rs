//! Channel bit-error simulation
//!
//! Flips each bit of a coded frame independently with probability `ber`.
//! The random source is seeded explicitly so corrupted runs can be replayed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::error::{QuantError, Result};

/// Seed used when the caller does not provide one
pub const DEFAULT_SEED: u64 = 0x4C50_434E;

/// Independent per-bit error model
#[derive(Debug, Clone)]
pub struct ChannelSimulator {
    ber: f32,
    rng: StdRng,
    bits: u64,
    errors: u64,
}

impl ChannelSimulator {
    /// Create a simulator with bit-error rate `ber` and a fixed seed
    ///
    /// # Errors
    ///
    /// Returns [`QuantError::InvalidConfig`] unless `0 <= ber <= 1`.
    pub fn new(ber: f32, seed: u64) -> Result<Self> {
        if !(0.0..=1.0).contains(&ber) {
            return Err(QuantError::invalid_config(format!(
                "bit error rate {} outside [0, 1]",
                ber
            )));
        }
        Ok(Self {
            ber,
            rng: StdRng::seed_from_u64(seed),
            bits: 0,
            errors: 0,
        })
    }

    /// Error-free channel
    pub fn error_free() -> Self {
        Self {
            ber: 0.0,
            rng: StdRng::seed_from_u64(DEFAULT_SEED),
            bits: 0,
            errors: 0,
        }
    }

    /// Corrupt `frame` in place and return the number of bits flipped
    ///
    /// Every call adds `frame.len()` to the bit counter, whether or not any
    /// bit is flipped. With `ber == 0` the frame is untouched and no random
    /// numbers are drawn.
    pub fn corrupt(&mut self, frame: &mut [u8]) -> usize {
        self.bits += frame.len() as u64;
        if self.ber == 0.0 {
            return 0;
        }

        let mut flipped = 0;
        for bit in frame.iter_mut() {
            let r: f32 = self.rng.gen();
            if r < self.ber {
                *bit = (*bit ^ 1) & 0x1;
                flipped += 1;
            }
        }
        self.errors += flipped as u64;
        if flipped > 0 {
            trace!("Channel flipped {} of {} bits", flipped, frame.len());
        }
        flipped
    }

    /// Configured bit-error rate
    pub fn ber(&self) -> f32 {
        self.ber
    }

    /// Bits passed through the channel
    pub fn bits(&self) -> u64 {
        self.bits
    }

    /// Bits flipped so far
    pub fn errors(&self) -> u64 {
        self.errors
    }

    /// Measured error rate, `None` before any bit was seen
    pub fn observed_ber(&self) -> Option<f64> {
        if self.bits == 0 {
            None
        } else {
            Some(self.errors as f64 / self.bits as f64)
        }
    }
}

impl Default for ChannelSimulator {
    fn default() -> Self {
        Self::error_free()
    }
}
