//! Feature vector layout and assembly
//!
//! The synthesizer consumes a fixed-size vector laid out as follows:
//!
//! | Slots | Content |
//! |---|---|
//! | `0..NB_BANDS` | cepstral coefficients |
//! | `NB_BANDS..2*NB_BANDS` | reserved, always zero |
//! | `PITCH_INDEX` | pitch feature, `0.01 * (period - 200)` |
//! | `PITCH_GAIN_INDEX` | pitch gain (not transmitted, zero) |
//! | remaining | reserved, always zero |

use std::ops::{Index, Range};

/// Number of spectral bands carried by each frame
pub const NB_BANDS: usize = 18;

/// Total length of a feature vector handed to the synthesizer
pub const NB_TOTAL_FEATURES: usize = 55;

/// Slot holding the pitch feature
pub const PITCH_INDEX: usize = 2 * NB_BANDS;

/// Slot holding the pitch gain
pub const PITCH_GAIN_INDEX: usize = PITCH_INDEX + 1;

/// Reserved slots between the cepstrum and the pitch parameters
pub const RESERVED_BANDS: Range<usize> = NB_BANDS..2 * NB_BANDS;

/// Samples synthesized per tick (10 ms at 16 kHz)
pub const FRAME_SIZE: usize = 160;

/// Output sample rate in Hz
pub const SAMPLE_RATE: u32 = 16000;

/// Duration of one synthesis tick in seconds
pub const FRAME_DURATION_SECS: f32 = 0.01;

/// Shortest pitch period the decoder can produce, in samples
pub const PITCH_MIN_PERIOD: f32 = 32.0;

/// Longest pitch period the decoder can produce, in samples
pub const PITCH_MAX_PERIOD: f32 = 256.0;

/// Convert a pitch period in samples to the synthesizer's pitch feature
pub fn period_to_pitch_feature(period: f32) -> f32 {
    0.01 * (period - 200.0)
}

/// Convert the synthesizer's pitch feature back to a period in samples
pub fn pitch_feature_to_period(feature: f32) -> f32 {
    100.0 * feature + 200.0
}

/// Whether a slot must be zero when handed to the synthesizer
pub fn is_reserved(index: usize) -> bool {
    index >= NB_BANDS && index != PITCH_INDEX && index != PITCH_GAIN_INDEX
}

/// Raw output of the VQ decoder for one tick, before assembly
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedFrame {
    /// Per-band values, in the domain of the active decode mode
    pub bands: [f32; NB_BANDS],
    /// Pitch feature
    pub pitch: f32,
}

impl DecodedFrame {
    /// Assemble the final feature vector, zeroing every reserved slot
    pub fn assemble(&self) -> FeatureVector {
        let mut values = [0.0f32; NB_TOTAL_FEATURES];
        values[..NB_BANDS].copy_from_slice(&self.bands);
        values[PITCH_INDEX] = self.pitch;
        values[PITCH_GAIN_INDEX] = 0.0;
        FeatureVector(values)
    }
}

/// Feature vector consumed by the synthesis engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f32; NB_TOTAL_FEATURES]);

impl FeatureVector {
    /// All-zero feature vector
    pub fn zeroed() -> Self {
        Self([0.0; NB_TOTAL_FEATURES])
    }

    /// All values, in slot order
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Cepstral coefficients
    pub fn bands(&self) -> &[f32] {
        &self.0[..NB_BANDS]
    }

    /// Pitch feature
    pub fn pitch(&self) -> f32 {
        self.0[PITCH_INDEX]
    }

    /// Pitch period in samples implied by the pitch feature
    pub fn pitch_period(&self) -> f32 {
        pitch_feature_to_period(self.pitch())
    }

    /// Pitch gain
    pub fn pitch_gain(&self) -> f32 {
        self.0[PITCH_GAIN_INDEX]
    }

    /// Check that every reserved slot is exactly zero
    pub fn reserved_is_zero(&self) -> bool {
        self.0
            .iter()
            .enumerate()
            .filter(|(i, _)| is_reserved(*i))
            .all(|(_, &v)| v == 0.0)
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl Index<usize> for FeatureVector {
    type Output = f32;

    fn index(&self, index: usize) -> &f32 {
        &self.0[index]
    }
}

impl AsRef<[f32]> for FeatureVector {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}
