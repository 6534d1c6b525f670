//! # LPCNet-Quant: quantised feature bitstream decoder
//!
//! This library turns a quantised LPCNet bitstream back into feature
//! vectors and hands them to a synthesis engine, one 10 ms tick at a time.
//!
//! ## Features
//!
//! - **Multi-stage predictive VQ**: stage centroids are summed, scaled and
//!   blended with the previous frame
//! - **Split/log-magnitude VQ**: memoryless decoding followed by a DCT back
//!   to cepstral features
//! - **Decimation**: coded frames every `dec` ticks, with the prediction
//!   memory smoothing the ticks in between
//! - **Channel simulation**: seedable per-bit error injection
//!
//! ## Usage
//!
//! ```rust
//! use std::io::Cursor;
//! use std::sync::Arc;
//! use lpcnet_quant::{
//!     ChannelSimulator, DecodePipeline, FrameDecoder, PulseSynthesizer, QuantizerConfig,
//!     VqCodebook, NB_BANDS,
//! };
//!
//! // One 16-entry stage
//! let codebook = Arc::new(VqCodebook::new(vec![vec![0.5f32; 16 * NB_BANDS]])?);
//! let config = QuantizerConfig::builder(codebook)
//!     .with_decimation(2)
//!     .build()?;
//! assert_eq!(config.bits_per_frame(), 4 + 6);
//!
//! let decoder = FrameDecoder::new(config, ChannelSimulator::error_free())?;
//! let mut pipeline = DecodePipeline::new(decoder, PulseSynthesizer::new());
//!
//! let mut pcm = Vec::new();
//! let stats = pipeline.run(&mut Cursor::new(vec![0u8; 20]), &mut pcm)?;
//! assert_eq!(stats.frames_read, 2);
//! assert_eq!(stats.audio_blocks, 4);
//! # Ok::<(), lpcnet_quant::QuantError>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bitstream;
pub mod channel;
pub mod codebook;
pub mod config;
pub mod decoder;
pub mod error;
pub mod features;
pub mod pipeline;
pub mod scheduler;
pub mod synth;
pub mod transform;

// Re-export commonly used types and traits
pub use channel::ChannelSimulator;
pub use codebook::{Codebook, VqCodebook, MAX_ENTRIES, MAX_STAGES};
pub use config::{DecodeMode, QuantizerConfig, QuantizerConfigBuilder};
pub use decoder::{DecoderState, VqDecoder};
pub use error::{QuantError, Result};
pub use features::{FeatureVector, FRAME_SIZE, NB_BANDS, NB_TOTAL_FEATURES, SAMPLE_RATE};
pub use pipeline::{DecodePipeline, DecodeStats, FrameDecoder, PipelineState};
pub use scheduler::{FrameScheduler, Tick};
pub use synth::{FeatureTap, PulseSynthesizer, Synthesizer};

/// Version information for the decoder library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install a default `tracing` subscriber if none is set
///
/// Safe to call more than once.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .try_init();

    tracing::debug!("LPCNet-Quant v{} initialized", VERSION);
}
