//! Synthesis engine interface
//!
//! The decoder hands every assembled [`FeatureVector`] to a [`Synthesizer`]
//! and writes out the `FRAME_SIZE` samples it returns. The neural engine
//! lives outside this crate; [`PulseSynthesizer`] is a light stand-in that
//! renders a pitch pulse train at the level implied by the cepstrum, and
//! [`FeatureTap`] records the features for an external engine.

use std::io::Write;

use bytes::BufMut;

use crate::error::{QuantError, Result};
use crate::features::{FeatureVector, FRAME_SIZE, NB_BANDS, PITCH_MAX_PERIOD, PITCH_MIN_PERIOD};

/// Block of PCM produced per tick
pub type PcmBlock = [i16; FRAME_SIZE];

/// Maps a feature vector to one block of audio
pub trait Synthesizer {
    /// Render `FRAME_SIZE` samples for `features`
    ///
    /// # Errors
    ///
    /// Implementations return [`QuantError::SynthesisFailed`] or an I/O error.
    fn synthesize(&mut self, features: &FeatureVector) -> Result<PcmBlock>;
}

impl<S: Synthesizer + ?Sized> Synthesizer for &mut S {
    fn synthesize(&mut self, features: &FeatureVector) -> Result<PcmBlock> {
        (**self).synthesize(features)
    }
}

impl<S: Synthesizer + ?Sized> Synthesizer for Box<S> {
    fn synthesize(&mut self, features: &FeatureVector) -> Result<PcmBlock> {
        (**self).synthesize(features)
    }
}

/// De-emphasis applied after excitation
const DEEMPHASIS: f32 = 0.85;

/// Offset removed from c0 by the feature analysis
const C0_OFFSET: f32 = 4.0;

/// Ceiling on the rendered RMS level
const MAX_RMS: f32 = 4000.0;

/// Pitch pulse train excited at the cepstral energy level
#[derive(Debug, Clone, Default)]
pub struct PulseSynthesizer {
    phase: usize,
    deemph_mem: f32,
}

impl PulseSynthesizer {
    /// New synthesizer with cleared filter memory
    pub fn new() -> Self {
        Self::default()
    }

    /// Target RMS for a cepstrum: c0 tracks the mean log10 band energy
    fn rms_for(bands: &[f32]) -> f32 {
        let mean_log_energy = (bands[0] + C0_OFFSET) / (NB_BANDS as f32).sqrt();
        10f32.powf(0.5 * mean_log_energy).min(MAX_RMS)
    }
}

impl Synthesizer for PulseSynthesizer {
    fn synthesize(&mut self, features: &FeatureVector) -> Result<PcmBlock> {
        let period = features.pitch_period();
        if !period.is_finite() || !features.bands()[0].is_finite() {
            return Err(QuantError::synthesis_failed(format!(
                "non-finite features (period {}, c0 {})",
                period,
                features.bands()[0]
            )));
        }
        let period = period.clamp(PITCH_MIN_PERIOD, PITCH_MAX_PERIOD).round() as usize;
        let rms = Self::rms_for(features.bands());
        // A unit pulse every `period` samples has RMS 1/sqrt(period)
        let amplitude = rms * (period as f32).sqrt() * (1.0 - DEEMPHASIS);

        if self.phase >= period {
            self.phase = 0;
        }

        let mut pcm = [0i16; FRAME_SIZE];
        for out in pcm.iter_mut() {
            let excitation = if self.phase == 0 { amplitude } else { 0.0 };
            self.phase = (self.phase + 1) % period;

            let y = excitation + DEEMPHASIS * self.deemph_mem;
            self.deemph_mem = y;
            *out = y.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        }
        Ok(pcm)
    }
}

/// Records every successfully synthesized feature vector as little-endian `f32`
#[derive(Debug)]
pub struct FeatureTap<S, W> {
    inner: S,
    writer: W,
    frames: u64,
}

impl<S: Synthesizer, W: Write> FeatureTap<S, W> {
    /// Tap features going into `inner`
    pub fn new(inner: S, writer: W) -> Self {
        Self {
            inner,
            writer,
            frames: 0,
        }
    }

    /// Feature vectors written so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Flush the feature writer and return both halves
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the flush fails.
    pub fn into_parts(mut self) -> Result<(S, W)> {
        self.writer.flush()?;
        Ok((self.inner, self.writer))
    }
}

impl<S: Synthesizer, W: Write> Synthesizer for FeatureTap<S, W> {
    fn synthesize(&mut self, features: &FeatureVector) -> Result<PcmBlock> {
        // Keep the feature file in step with the PCM blocks
        let pcm = self.inner.synthesize(features)?;

        let mut buf = Vec::with_capacity(features.as_slice().len() * 4);
        for &v in features.as_slice() {
            buf.put_f32_le(v);
        }
        self.writer.write_all(&buf)?;
        self.frames += 1;
        Ok(pcm)
    }
}
