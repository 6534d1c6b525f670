//! Decode orchestration
//!
//! Per tick: schedule → channel → VQ decode → post-process → synthesize →
//! emit. Ticks run strictly in order; the PCM block of tick `i` is written
//! before tick `i + 1` reads anything. The sink is flushed once the stream
//! drains, or after every block with [`DecodePipeline::with_block_flush`]
//! for live consumers such as a pipe.
//!
//! End of stream is detected on an update tick whose read comes up short.
//! That tick is dropped: nothing is decoded or emitted from an incomplete
//! frame, and the pipeline moves to [`PipelineState::Drained`].

use std::io::{Read, Write};

use bytes::BufMut;
use tracing::{debug, info};

use crate::channel::ChannelSimulator;
use crate::config::QuantizerConfig;
use crate::decoder::VqDecoder;
use crate::error::Result;
use crate::features::{FeatureVector, FRAME_SIZE};
use crate::scheduler::{FrameScheduler, Tick};
use crate::synth::{PcmBlock, Synthesizer};

/// Scheduler, channel and VQ decoder driven together, one tick per call
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    scheduler: FrameScheduler,
    channel: ChannelSimulator,
    decoder: VqDecoder,
}

impl FrameDecoder {
    /// Create a frame decoder for `config`, corrupting new frames through `channel`
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot drive a scheduler.
    pub fn new(config: QuantizerConfig, channel: ChannelSimulator) -> Result<Self> {
        let scheduler = FrameScheduler::from_config(&config)?;
        Ok(Self {
            scheduler,
            channel,
            decoder: VqDecoder::new(config),
        })
    }

    /// Decode the next tick, or `None` once the source is exhausted
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from `source` and decoding errors.
    pub fn next_features<R: Read>(&mut self, source: &mut R) -> Result<Option<FeatureVector>> {
        match self.scheduler.next_frame(source, &mut self.channel)? {
            Tick::EndOfStream { .. } => return Ok(None),
            Tick::Update | Tick::Hold => {}
        }

        let features = self.decoder.decode_features(self.scheduler.frame())?;
        self.scheduler.advance();
        Ok(Some(features))
    }

    /// Clear prediction memory, tick counter and last frame
    pub fn reset(&mut self) {
        self.scheduler.reset();
        self.decoder.reset();
    }

    /// Frame scheduler
    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    /// Channel simulator
    pub fn channel(&self) -> &ChannelSimulator {
        &self.channel
    }

    /// VQ decoder
    pub fn decoder(&self) -> &VqDecoder {
        &self.decoder
    }
}

/// Orchestration loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Ticks are still being processed
    Running,
    /// The coded stream ended; no further output
    Drained,
}

/// Running totals reported at shutdown
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodeStats {
    /// Synthesis ticks completed
    pub ticks: u64,
    /// Complete coded frames read
    pub frames_read: u64,
    /// Bits read in complete frames
    pub bits_read: u64,
    /// Bits passed through the channel simulator
    pub channel_bits: u64,
    /// Bits flipped by the channel simulator
    pub bit_errors: u64,
    /// PCM blocks written
    pub audio_blocks: u64,
}

impl DecodeStats {
    /// Measured bit-error rate, `None` before any bit went through the channel
    pub fn observed_ber(&self) -> Option<f64> {
        if self.channel_bits == 0 {
            None
        } else {
            Some(self.bit_errors as f64 / self.channel_bits as f64)
        }
    }

    /// PCM samples written
    pub fn samples_written(&self) -> u64 {
        self.audio_blocks * FRAME_SIZE as u64
    }
}

/// Frame decoder feeding a synthesizer and a PCM sink
#[derive(Debug)]
pub struct DecodePipeline<S> {
    decoder: FrameDecoder,
    synth: S,
    state: PipelineState,
    flush_each_block: bool,
    ticks: u64,
    audio_blocks: u64,
}

impl<S: Synthesizer> DecodePipeline<S> {
    /// Wrap a frame decoder and a synthesis engine
    pub fn new(decoder: FrameDecoder, synth: S) -> Self {
        Self {
            decoder,
            synth,
            state: PipelineState::Running,
            flush_each_block: false,
            ticks: 0,
            audio_blocks: 0,
        }
    }

    /// Flush the sink after every PCM block instead of only at the end
    pub fn with_block_flush(mut self, enabled: bool) -> Self {
        self.flush_each_block = enabled;
        self
    }

    /// Current state
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Run one tick
    ///
    /// # Errors
    ///
    /// Propagates read, decode, synthesis and write errors.
    pub fn step<R: Read, W: Write>(
        &mut self,
        source: &mut R,
        sink: &mut W,
    ) -> Result<PipelineState> {
        if self.state == PipelineState::Drained {
            return Ok(self.state);
        }

        let Some(features) = self.decoder.next_features(source)? else {
            debug!("Coded stream drained after {} ticks", self.ticks);
            self.state = PipelineState::Drained;
            return Ok(self.state);
        };

        let pcm = self.synth.synthesize(&features)?;
        write_block(sink, &pcm)?;
        if self.flush_each_block {
            sink.flush()?;
        }
        self.ticks += 1;
        self.audio_blocks += 1;

        Ok(self.state)
    }

    /// Run until the coded stream is drained
    ///
    /// # Errors
    ///
    /// Stops at the first read, decode, synthesis or write error.
    pub fn run<R: Read, W: Write>(&mut self, source: &mut R, sink: &mut W) -> Result<DecodeStats> {
        while self.step(source, sink)? == PipelineState::Running {}
        sink.flush()?;

        let stats = self.stats();
        info!(
            "Decoded {} frames into {} audio blocks ({} bits read)",
            stats.frames_read, stats.audio_blocks, stats.bits_read
        );
        Ok(stats)
    }

    /// Totals so far
    pub fn stats(&self) -> DecodeStats {
        let scheduler = self.decoder.scheduler();
        let channel = self.decoder.channel();
        DecodeStats {
            ticks: self.ticks,
            frames_read: scheduler.frames_read(),
            bits_read: scheduler.bits_read(),
            channel_bits: channel.bits(),
            bit_errors: channel.errors(),
            audio_blocks: self.audio_blocks,
        }
    }

    /// Frame decoder
    pub fn decoder(&self) -> &FrameDecoder {
        &self.decoder
    }

    /// Release the synthesis engine
    pub fn into_synthesizer(self) -> S {
        self.synth
    }
}

/// Write one block as little-endian i16
fn write_block<W: Write>(sink: &mut W, pcm: &PcmBlock) -> Result<()> {
    let mut buf = Vec::with_capacity(FRAME_SIZE * 2);
    for &sample in pcm.iter() {
        buf.put_i16_le(sample);
    }
    sink.write_all(&buf)?;
    Ok(())
}
