//! Quantiser configuration
//!
//! A [`QuantizerConfig`] is immutable once built. All tunables go through
//! [`QuantizerConfigBuilder`], which validates them together and derives
//! the coded frame length, so a decoder can never observe a stale
//! `bits_per_frame`.

use std::fmt;
use std::sync::Arc;

use crate::bitstream::bits_for_entries;
use crate::codebook::{Codebook, MAX_ENTRIES, MAX_STAGES};
use crate::error::{QuantError, Result};
use crate::features::{FRAME_DURATION_SECS, NB_BANDS};
use crate::transform;

/// Default prediction coefficient for predictive decoding
pub const DEFAULT_PRED: f32 = 0.9;

/// Default decimation factor (one coded frame every 30 ms)
pub const DEFAULT_DECIMATION: usize = 3;

/// Default width of the pitch field
pub const DEFAULT_PITCH_BITS: usize = 6;

/// Default number of M-best survivors used by the encoder
pub const DEFAULT_MBEST: usize = 5;

/// Widest pitch field supported
pub const MAX_PITCH_BITS: usize = 16;

/// Post-sum scale used by predictive decoding
pub fn default_predictive_weight() -> f32 {
    1.0 / (NB_BANDS as f32).sqrt()
}

/// Decode variant, each with its own scaling and post-processing
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecodeMode {
    /// Predictive VQ operating directly on cepstral features
    PredictiveDirect {
        /// Leak applied to the previous decoded vector, in `[0, 1)`
        pred: f32,
        /// Scale applied to the summed stage centroids
        weight: f32,
    },
    /// Memoryless split VQ on log band magnitudes, transformed to cepstrum after decoding
    SplitLogMag,
}

impl DecodeMode {
    /// Predictive mode with the default weight
    pub fn predictive(pred: f32) -> Self {
        Self::PredictiveDirect {
            pred,
            weight: default_predictive_weight(),
        }
    }

    /// Prediction coefficient
    pub fn pred(&self) -> f32 {
        match self {
            Self::PredictiveDirect { pred, .. } => *pred,
            Self::SplitLogMag => 0.0,
        }
    }

    /// Scale applied to the summed stage centroids
    pub fn weight(&self) -> f32 {
        match self {
            Self::PredictiveDirect { weight, .. } => *weight,
            Self::SplitLogMag => 1.0,
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::PredictiveDirect { .. } => "predictive",
            Self::SplitLogMag => "split",
        }
    }

    /// Convert decoded bands into the domain the synthesizer expects
    pub fn post_process(&self, bands: &mut [f32; NB_BANDS]) {
        match self {
            Self::PredictiveDirect { .. } => {}
            Self::SplitLogMag => transform::dct_in_place(bands),
        }
    }

    fn validate(&self) -> Result<()> {
        if let Self::PredictiveDirect { pred, weight } = *self {
            if !(0.0..1.0).contains(&pred) {
                return Err(QuantError::invalid_config(format!(
                    "prediction coefficient {} outside [0, 1)",
                    pred
                )));
            }
            if !weight.is_finite() || weight <= 0.0 {
                return Err(QuantError::invalid_config(format!(
                    "weight {} must be finite and positive",
                    weight
                )));
            }
        }
        Ok(())
    }
}

impl Default for DecodeMode {
    fn default() -> Self {
        Self::predictive(DEFAULT_PRED)
    }
}

impl fmt::Display for DecodeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (pred {:.2}, weight {:.4})", self.name(), self.pred(), self.weight())
    }
}

/// Coded frame length: one index per stage plus the pitch field
pub fn compute_bits_per_frame(stage_sizes: &[usize], pitch_bits: usize) -> usize {
    stage_sizes.iter().map(|&m| bits_for_entries(m)).sum::<usize>() + pitch_bits
}

/// Validated quantiser configuration
#[derive(Debug, Clone)]
pub struct QuantizerConfig {
    codebook: Arc<dyn Codebook>,
    stage_sizes: Vec<usize>,
    mode: DecodeMode,
    mbest: usize,
    pitch_bits: usize,
    dec: usize,
    bits_per_frame: usize,
}

impl QuantizerConfig {
    /// Start a configuration over a shared codebook
    pub fn builder(codebook: Arc<dyn Codebook>) -> QuantizerConfigBuilder {
        QuantizerConfigBuilder::new(codebook)
    }

    /// Shared codebook
    pub fn codebook(&self) -> &dyn Codebook {
        self.codebook.as_ref()
    }

    /// Number of VQ stages in use
    pub fn num_stages(&self) -> usize {
        self.stage_sizes.len()
    }

    /// Entry count of each stage in use
    pub fn stage_sizes(&self) -> &[usize] {
        &self.stage_sizes
    }

    /// Width of the index field of `stage`
    pub fn stage_bits(&self, stage: usize) -> usize {
        bits_for_entries(self.stage_sizes[stage])
    }

    /// Decode variant
    pub fn mode(&self) -> DecodeMode {
        self.mode
    }

    /// Encoder M-best survivors; has no effect on decoding
    pub fn mbest(&self) -> usize {
        self.mbest
    }

    /// Width of the pitch field
    pub fn pitch_bits(&self) -> usize {
        self.pitch_bits
    }

    /// Decimation factor
    pub fn decimation(&self) -> usize {
        self.dec
    }

    /// Length of a coded frame in bits
    pub fn bits_per_frame(&self) -> usize {
        self.bits_per_frame
    }

    /// Transmitted bit rate in bits/s
    pub fn bit_rate(&self) -> f32 {
        self.bits_per_frame as f32 / (self.dec as f32 * FRAME_DURATION_SECS)
    }

    /// Interval between coded frames in milliseconds
    pub fn frame_interval_ms(&self) -> f32 {
        self.dec as f32 * FRAME_DURATION_SECS * 1000.0
    }
}

impl fmt::Display for QuantizerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dec: {} pred: {:3.2} num_stages: {} mbest: {} bits_per_frame: {} \
             frame: {:2} ms bit_rate: {:5.2} bits/s",
            self.dec,
            self.mode.pred(),
            self.num_stages(),
            self.mbest,
            self.bits_per_frame,
            self.frame_interval_ms(),
            self.bit_rate()
        )
    }
}

/// Builder for [`QuantizerConfig`]
#[derive(Debug, Clone)]
pub struct QuantizerConfigBuilder {
    codebook: Arc<dyn Codebook>,
    num_stages: Option<usize>,
    mode: DecodeMode,
    mbest: usize,
    pitch_bits: usize,
    dec: usize,
}

impl QuantizerConfigBuilder {
    /// Defaults: all codebook stages, predictive mode, 6 pitch bits, decimation 3
    pub fn new(codebook: Arc<dyn Codebook>) -> Self {
        Self {
            codebook,
            num_stages: None,
            mode: DecodeMode::default(),
            mbest: DEFAULT_MBEST,
            pitch_bits: DEFAULT_PITCH_BITS,
            dec: DEFAULT_DECIMATION,
        }
    }

    /// Use only the first `num_stages` codebook stages
    pub fn with_num_stages(mut self, num_stages: usize) -> Self {
        self.num_stages = Some(num_stages);
        self
    }

    /// Set the decode variant
    pub fn with_mode(mut self, mode: DecodeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the encoder M-best survivor count
    pub fn with_mbest(mut self, mbest: usize) -> Self {
        self.mbest = mbest;
        self
    }

    /// Set the pitch field width
    pub fn with_pitch_bits(mut self, pitch_bits: usize) -> Self {
        self.pitch_bits = pitch_bits;
        self
    }

    /// Set the decimation factor
    pub fn with_decimation(mut self, dec: usize) -> Self {
        self.dec = dec;
        self
    }

    /// Validate all settings and derive the frame layout
    ///
    /// # Errors
    ///
    /// Returns [`QuantError::InvalidConfig`] if any setting is out of range
    /// or the codebook cannot support the requested layout.
    pub fn build(self) -> Result<QuantizerConfig> {
        let available = self.codebook.num_stages();
        let num_stages = self.num_stages.unwrap_or(available);

        if num_stages == 0 {
            return Err(QuantError::invalid_config("at least one VQ stage is required"));
        }
        if num_stages > available || num_stages > MAX_STAGES {
            return Err(QuantError::invalid_config(format!(
                "{} VQ stages requested, codebook provides {} (maximum {})",
                num_stages, available, MAX_STAGES
            )));
        }

        let mut stage_sizes = Vec::with_capacity(num_stages);
        for stage in 0..num_stages {
            let m = self.codebook.stage_size(stage);
            if m == 0 || m > MAX_ENTRIES || !m.is_power_of_two() {
                return Err(QuantError::invalid_config(format!(
                    "stage {} has {} entries; expected a power of two up to {}",
                    stage, m, MAX_ENTRIES
                )));
            }
            stage_sizes.push(m);
        }

        if self.pitch_bits == 0 || self.pitch_bits > MAX_PITCH_BITS {
            return Err(QuantError::invalid_config(format!(
                "pitch field of {} bits outside 1..={}",
                self.pitch_bits, MAX_PITCH_BITS
            )));
        }
        if self.dec == 0 {
            return Err(QuantError::invalid_config("decimation factor must be at least 1"));
        }
        self.mode.validate()?;

        let bits_per_frame = compute_bits_per_frame(&stage_sizes, self.pitch_bits);

        Ok(QuantizerConfig {
            codebook: self.codebook,
            stage_sizes,
            mode: self.mode,
            mbest: self.mbest,
            pitch_bits: self.pitch_bits,
            dec: self.dec,
            bits_per_frame,
        })
    }
}
