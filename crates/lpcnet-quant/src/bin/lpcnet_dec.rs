//! LPCNet quantised bitstream decoder
//!
//! Reads a fully quantised bit stream (one bit per byte) and writes 16 kHz
//! signed 16-bit PCM. Diagnostics go to stderr.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use lpcnet_quant::channel::DEFAULT_SEED;
use lpcnet_quant::config::{DEFAULT_DECIMATION, DEFAULT_MBEST, DEFAULT_PITCH_BITS, DEFAULT_PRED};
use lpcnet_quant::{
    ChannelSimulator, DecodeMode, DecodePipeline, DecodeStats, FeatureTap, FrameDecoder,
    PulseSynthesizer, QuantizerConfig, Synthesizer, VqCodebook,
};

/// Decode an LPCNet quantised bit stream to PCM
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// VQ stage table (raw little-endian f32, entries x 18 bands); repeat once per stage
    #[arg(short, long = "codebook", value_name = "FILE", required = true)]
    codebooks: Vec<PathBuf>,

    /// Coded bit stream, one bit per byte (default: stdin)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output PCM file (default: stdout)
    #[arg(short = 'O', long)]
    output: Option<PathBuf>,

    /// Bit error rate applied to each received bit
    #[arg(short, long, default_value_t = 0.0)]
    ber: f32,

    /// Decimation: one coded frame every N 10 ms ticks
    #[arg(short, long = "decimation", default_value_t = DEFAULT_DECIMATION)]
    decimation: usize,

    /// Number of VQ stages to use (default: all codebook stages)
    #[arg(short, long = "num-stages")]
    num_stages: Option<usize>,

    /// Width of the pitch field in bits
    #[arg(short = 'o', long = "pitch-bits", default_value_t = DEFAULT_PITCH_BITS)]
    pitch_bits: usize,

    /// Prediction coefficient
    #[arg(short, long, default_value_t = DEFAULT_PRED)]
    pred: f32,

    /// Codebooks are split log-magnitude tables (no prediction, DCT after decode)
    #[arg(short, long, conflicts_with = "pred")]
    split: bool,

    /// Encoder M-best survivors (reported only)
    #[arg(long, default_value_t = DEFAULT_MBEST)]
    mbest: usize,

    /// Seed for the bit error generator
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Also write every feature vector as raw little-endian f32
    #[arg(long, value_name = "FILE")]
    features_out: Option<PathBuf>,

    /// Print diagnostics
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn build_config(args: &Args) -> Result<QuantizerConfig> {
    let codebook = VqCodebook::from_f32_files(&args.codebooks).context("loading VQ codebooks")?;
    info!("Codebook stage sizes: {:?}", codebook.stage_sizes());

    let mode = if args.split {
        info!("split VQ");
        DecodeMode::SplitLogMag
    } else {
        DecodeMode::predictive(args.pred)
    };

    let mut builder = QuantizerConfig::builder(Arc::new(codebook))
        .with_mode(mode)
        .with_mbest(args.mbest)
        .with_pitch_bits(args.pitch_bits)
        .with_decimation(args.decimation);
    if let Some(n) = args.num_stages {
        builder = builder.with_num_stages(n);
    }

    builder.build().context("invalid quantiser configuration")
}

fn decode<S: Synthesizer, R: Read, W: Write>(
    decoder: FrameDecoder,
    synth: S,
    input: &mut R,
    output: &mut W,
    live: bool,
) -> Result<(DecodeStats, S)> {
    let mut pipeline = DecodePipeline::new(decoder, synth).with_block_flush(live);
    let stats = pipeline.run(input, output).context("decoding bit stream")?;
    Ok((stats, pipeline.into_synthesizer()))
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = build_config(&args)?;
    info!("{}", config);

    let channel = ChannelSimulator::new(args.ber, args.seed).context("invalid bit error rate")?;
    if args.ber > 0.0 {
        info!("BER = {} (seed {})", args.ber, args.seed);
    }
    let decoder = FrameDecoder::new(config, channel)?;

    // Streams are opened only once the configuration is known to be valid
    let mut input: Box<dyn Read> = match &args.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };
    // Blocks are pushed through immediately only when a pipe is listening
    let live = args.output.is_none();
    let mut output: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    let stats = match &args.features_out {
        Some(path) => {
            let writer = BufWriter::new(
                File::create(path).with_context(|| format!("creating {}", path.display()))?,
            );
            let tap = FeatureTap::new(PulseSynthesizer::new(), writer);
            let (stats, tap) = decode(decoder, tap, &mut input, &mut output, live)?;
            let frames = tap.frames();
            tap.into_parts().context("flushing feature file")?;
            info!("Wrote {} feature vectors to {}", frames, path.display());
            stats
        }
        None => decode(decoder, PulseSynthesizer::new(), &mut input, &mut output, live)?.0,
    };
    output.flush()?;

    if args.ber != 0.0 {
        info!(
            "nbits: {} nerr: {} BER: {:4.3}",
            stats.channel_bits,
            stats.bit_errors,
            stats.observed_ber().unwrap_or(0.0)
        );
    }

    Ok(())
}
