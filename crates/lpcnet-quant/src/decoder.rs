//! Multi-stage predictive VQ decoder
//!
//! Each coded frame holds one index per stage followed by a pitch code.
//! The addressed centroids are summed across stages, scaled by the mode
//! weight and blended with the previous output:
//!
//! ```text
//! out[b] = weight * sum_s(centroid(s, index_s)[b]) + pred * prev[b]
//! ```
//!
//! `prev` is then replaced by `out`. Decoding the same frame again therefore
//! moves the output one geometric step closer to its fixed point, which is
//! what smooths the held frames between decimated updates.

use tracing::trace;

use crate::bitstream::FrameReader;
use crate::config::{QuantizerConfig, MAX_PITCH_BITS};
use crate::error::{QuantError, Result};
use crate::features::{
    period_to_pitch_feature, DecodedFrame, FeatureVector, NB_BANDS, PITCH_MAX_PERIOD,
    PITCH_MIN_PERIOD,
};

/// Indices unpacked from a coded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameIndices {
    /// One codebook index per stage
    pub stages: Vec<usize>,
    /// Pitch code
    pub pitch: u32,
}

/// Split a coded frame into its stage indices and pitch code
///
/// # Errors
///
/// Returns [`QuantError::InvalidFrameSize`] if `frame` is not exactly
/// `bits_per_frame` bits long.
pub fn unpack_frame(config: &QuantizerConfig, frame: &[u8]) -> Result<FrameIndices> {
    if frame.len() != config.bits_per_frame() {
        return Err(QuantError::InvalidFrameSize {
            expected: config.bits_per_frame(),
            actual: frame.len(),
        });
    }

    let mut reader = FrameReader::new(frame);
    let mut stages = Vec::with_capacity(config.num_stages());
    for stage in 0..config.num_stages() {
        stages.push(reader.read(config.stage_bits(stage))? as usize);
    }
    let pitch = reader.read(config.pitch_bits())?;

    Ok(FrameIndices { stages, pitch })
}

/// Pitch period in samples for a pitch code
///
/// Codes map linearly onto `[PITCH_MIN_PERIOD, PITCH_MAX_PERIOD]`; code 0 is
/// the shortest period and `2^pitch_bits - 1` the longest. `pitch_bits` must
/// lie in `1..=MAX_PITCH_BITS`; wider codes are clamped to the longest period.
pub fn pitch_period(pitch_bits: usize, code: u32) -> f32 {
    debug_assert!((1..=MAX_PITCH_BITS).contains(&pitch_bits));
    let pitch_bits = pitch_bits.clamp(1, MAX_PITCH_BITS);
    let max_code = ((1u32 << pitch_bits) - 1) as f32;
    let offset = (PITCH_MAX_PERIOD - PITCH_MIN_PERIOD) * code as f32 / max_code;
    (PITCH_MIN_PERIOD + offset).clamp(PITCH_MIN_PERIOD, PITCH_MAX_PERIOD)
}

/// Pitch feature for a pitch code
pub fn pitch_decode(pitch_bits: usize, code: u32) -> f32 {
    period_to_pitch_feature(pitch_period(pitch_bits, code))
}

/// Prediction memory carried between decode calls
#[derive(Debug, Clone, PartialEq)]
pub struct DecoderState {
    previous: [f32; NB_BANDS],
}

impl DecoderState {
    /// Zeroed memory
    pub fn new() -> Self {
        Self {
            previous: [0.0; NB_BANDS],
        }
    }

    /// Previously decoded band vector
    pub fn previous(&self) -> &[f32; NB_BANDS] {
        &self.previous
    }

    /// Clear the memory
    pub fn reset(&mut self) {
        self.previous = [0.0; NB_BANDS];
    }
}

impl Default for DecoderState {
    fn default() -> Self {
        Self::new()
    }
}

/// Stateful VQ decoder
#[derive(Debug, Clone)]
pub struct VqDecoder {
    config: QuantizerConfig,
    state: DecoderState,
}

impl VqDecoder {
    /// Create a decoder with zeroed prediction memory
    pub fn new(config: QuantizerConfig) -> Self {
        Self {
            config,
            state: DecoderState::new(),
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &QuantizerConfig {
        &self.config
    }

    /// Current prediction memory
    pub fn state(&self) -> &DecoderState {
        &self.state
    }

    /// Clear prediction memory, e.g. after a stream discontinuity
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Decode one coded frame into raw bands and pitch
    ///
    /// Bands are in the domain of the configured mode; use
    /// [`VqDecoder::decode_features`] for synthesizer-ready output.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame length does not match the configuration.
    pub fn decode(&mut self, frame: &[u8]) -> Result<DecodedFrame> {
        let indices = unpack_frame(&self.config, frame)?;
        self.decode_indices(&indices)
    }

    /// Decode one coded frame and assemble the feature vector
    ///
    /// # Errors
    ///
    /// Returns an error if the frame length does not match the configuration.
    pub fn decode_features(&mut self, frame: &[u8]) -> Result<FeatureVector> {
        let mut decoded = self.decode(frame)?;
        self.config.mode().post_process(&mut decoded.bands);
        Ok(decoded.assemble())
    }

    fn decode_indices(&mut self, indices: &FrameIndices) -> Result<DecodedFrame> {
        let codebook = self.config.codebook();
        let mode = self.config.mode();

        let mut sum = [0.0f32; NB_BANDS];
        for (stage, &index) in indices.stages.iter().enumerate() {
            let centroid = codebook.centroid(stage, index);
            if centroid.len() != NB_BANDS {
                return Err(QuantError::decoding_failed(format!(
                    "stage {} entry {} has {} bands, expected {}",
                    stage,
                    index,
                    centroid.len(),
                    NB_BANDS
                )));
            }
            for (acc, &c) in sum.iter_mut().zip(centroid) {
                *acc += c;
            }
        }

        let weight = mode.weight();
        let pred = mode.pred();
        let mut bands = [0.0f32; NB_BANDS];
        for b in 0..NB_BANDS {
            bands[b] = weight * sum[b] + pred * self.state.previous[b];
        }
        self.state.previous = bands;

        let pitch = pitch_decode(self.config.pitch_bits(), indices.pitch);
        trace!(
            "VQ indices {:?} pitch code {} -> c0 {:.3} pitch {:.3}",
            indices.stages,
            indices.pitch,
            bands[0],
            pitch
        );

        Ok(DecodedFrame { bands, pitch })
    }
}
