//! Coded frame bit fields
//!
//! Coded frames carry one bit per byte. Fields are read MSB first, in the
//! order the encoder packed them: one index per VQ stage, then the pitch
//! code.

use crate::error::{QuantError, Result};

/// Number of bits needed to address `entries` codebook entries
///
/// `entries` must be a power of two.
pub fn bits_for_entries(entries: usize) -> usize {
    debug_assert!(entries.is_power_of_two());
    entries.trailing_zeros() as usize
}

/// Sequential reader over an unpacked coded frame
#[derive(Debug)]
pub struct FrameReader<'a> {
    bits: &'a [u8],
    bit_pos: usize,
}

impl<'a> FrameReader<'a> {
    /// Start reading at the first bit of `bits`
    pub fn new(bits: &'a [u8]) -> Self {
        Self { bits, bit_pos: 0 }
    }

    /// Read an unsigned field of `num_bits` bits
    ///
    /// # Errors
    ///
    /// Returns [`QuantError::BitstreamUnderrun`] if fewer than `num_bits`
    /// bits remain, or a configuration error for fields wider than 32 bits.
    pub fn read(&mut self, num_bits: usize) -> Result<u32> {
        if num_bits > 32 {
            return Err(QuantError::invalid_config(format!(
                "bit field of {} bits is wider than 32",
                num_bits
            )));
        }
        if self.remaining() < num_bits {
            return Err(QuantError::BitstreamUnderrun {
                position: self.bit_pos,
                requested: num_bits,
                available: self.bits.len(),
            });
        }
        Ok(read_bits(self.bits, &mut self.bit_pos, num_bits))
    }

    /// Bits consumed so far
    pub fn position(&self) -> usize {
        self.bit_pos
    }

    /// Bits not yet consumed
    pub fn remaining(&self) -> usize {
        self.bits.len() - self.bit_pos
    }
}

/// Read `num_bits` bits MSB first, one bit per byte
fn read_bits(bits: &[u8], bit_pos: &mut usize, num_bits: usize) -> u32 {
    let mut value = 0u32;

    for _ in 0..num_bits {
        let bit = bits[*bit_pos] & 1;
        value = (value << 1) | bit as u32;
        *bit_pos += 1;
    }

    value
}

#[cfg(test)]
pub(crate) fn write_bits(bits: &mut Vec<u8>, value: u32, num_bits: usize) {
    for i in 0..num_bits {
        bits.push(((value >> (num_bits - 1 - i)) & 1) as u8);
    }
}
