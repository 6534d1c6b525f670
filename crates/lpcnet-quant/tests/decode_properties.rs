//! End-to-end decoding properties: scheduling, prediction, channel errors
//! and feature assembly.

use std::io::Cursor;
use std::sync::Arc;

use lpcnet_quant::decoder::{pitch_decode, pitch_period, unpack_frame};
use lpcnet_quant::features::{PITCH_MAX_PERIOD, PITCH_MIN_PERIOD};
use lpcnet_quant::transform::{dct, idct};
use lpcnet_quant::{
    ChannelSimulator, Codebook, DecodeMode, DecodePipeline, FeatureVector, FrameDecoder,
    PipelineState, PulseSynthesizer, QuantizerConfig, VqCodebook, NB_BANDS,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn push_bits(bits: &mut Vec<u8>, value: u32, num_bits: usize) {
    for i in (0..num_bits).rev() {
        bits.push(((value >> i) & 1) as u8);
    }
}

/// Stage `s` entry `e` holds `(s + 1) * e + band / 10` in band `band`
fn ramp_codebook(sizes: &[usize]) -> Arc<dyn Codebook> {
    let stages = sizes
        .iter()
        .enumerate()
        .map(|(s, &m)| {
            (0..m)
                .flat_map(|e| {
                    (0..NB_BANDS).map(move |b| (s as f32 + 1.0) * e as f32 + b as f32 / 10.0)
                })
                .collect()
        })
        .collect();
    Arc::new(VqCodebook::new(stages).unwrap())
}

fn encode_frame(config: &QuantizerConfig, indices: &[u32], pitch: u32) -> Vec<u8> {
    let mut bits = Vec::with_capacity(config.bits_per_frame());
    for (s, &index) in indices.iter().enumerate() {
        push_bits(&mut bits, index, config.stage_bits(s));
    }
    push_bits(&mut bits, pitch, config.pitch_bits());
    bits
}

fn decode_all(
    config: QuantizerConfig,
    channel: ChannelSimulator,
    stream: &[u8],
) -> Vec<FeatureVector> {
    let mut decoder = FrameDecoder::new(config, channel).unwrap();
    let mut source = Cursor::new(stream.to_vec());
    let mut out = Vec::new();
    while let Some(features) = decoder.next_features(&mut source).unwrap() {
        out.push(features);
    }
    out
}

fn random_stream(config: &QuantizerConfig, frames: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..frames * config.bits_per_frame())
        .map(|_| rng.gen_range(0..2u8))
        .collect()
}

#[test]
fn test_every_tick_reads_one_frame_without_decimation() {
    let config = QuantizerConfig::builder(ramp_codebook(&[16, 8]))
        .with_decimation(1)
        .build()
        .unwrap();
    let bpf = config.bits_per_frame() as u64;
    let stream = random_stream(&config, 6, 1);

    let mut decoder = FrameDecoder::new(config, ChannelSimulator::error_free()).unwrap();
    let mut source = Cursor::new(stream);
    for tick in 1..=6u64 {
        assert!(decoder.next_features(&mut source).unwrap().is_some());
        assert_eq!(source.position(), tick * bpf);
        assert_eq!(decoder.scheduler().tick_count(), tick);
        assert_eq!(decoder.scheduler().bits_read(), tick * bpf);
    }
    assert!(decoder.next_features(&mut source).unwrap().is_none());
}

#[test]
fn test_decimated_reads_happen_on_multiples_of_dec() {
    let dec = 4;
    let config = QuantizerConfig::builder(ramp_codebook(&[16]))
        .with_decimation(dec)
        .build()
        .unwrap();
    let bpf = config.bits_per_frame() as u64;
    let stream = random_stream(&config, 3, 2);

    let mut decoder = FrameDecoder::new(config, ChannelSimulator::error_free()).unwrap();
    let mut source = Cursor::new(stream);
    for f in 0..(3 * dec) as u64 {
        decoder.next_features(&mut source).unwrap().unwrap();
        let expected_frames = f / dec as u64 + 1;
        assert_eq!(source.position(), expected_frames * bpf, "tick {}", f);
        assert_eq!(decoder.scheduler().frames_read(), expected_frames);
    }
}

#[test]
fn test_predictive_mode_converges_geometrically_between_updates() {
    let pred = 0.7f32;
    let weight = 0.25f32;
    let dec = 5;
    let config = QuantizerConfig::builder(ramp_codebook(&[16, 4]))
        .with_mode(DecodeMode::PredictiveDirect { pred, weight })
        .with_decimation(dec)
        .build()
        .unwrap();

    let mut stream = encode_frame(&config, &[15, 3], 10);
    stream.extend(encode_frame(&config, &[2, 1], 20));
    let ticks = decode_all(config.clone(), ChannelSimulator::error_free(), &stream);
    assert_eq!(ticks.len(), 2 * dec);

    // Fixed point of the second frame: weight * sum / (1 - pred)
    let target: Vec<f32> = (0..NB_BANDS)
        .map(|b| {
            let sum = config.codebook().value(0, b, 2) + config.codebook().value(1, b, 1);
            weight * sum / (1.0 - pred)
        })
        .collect();

    let distance = |v: &FeatureVector| -> Vec<f32> {
        v.bands()
            .iter()
            .zip(&target)
            .map(|(x, t)| x - t)
            .collect()
    };

    for f in dec..2 * dec - 1 {
        let now = distance(&ticks[f]);
        let next = distance(&ticks[f + 1]);
        for b in 0..NB_BANDS {
            assert!(next[b].abs() < now[b].abs(), "tick {} band {} not closer", f, b);
            assert!(
                (next[b] - pred * now[b]).abs() <= 1e-4 * now[b].abs().max(1.0),
                "tick {} band {}: {} != {} * {}",
                f,
                b,
                next[b],
                pred,
                now[b]
            );
        }
        assert_eq!(ticks[f].pitch(), ticks[f + 1].pitch());
    }
}

#[test]
fn test_split_mode_holds_identical_vectors() {
    let dec = 3;
    let config = QuantizerConfig::builder(ramp_codebook(&[16, 8]))
        .with_mode(DecodeMode::SplitLogMag)
        .with_decimation(dec)
        .build()
        .unwrap();
    let stream = random_stream(&config, 4, 3);
    let ticks = decode_all(config, ChannelSimulator::error_free(), &stream);
    assert_eq!(ticks.len(), 4 * dec);

    for update in (0..ticks.len()).step_by(dec) {
        for held in update + 1..update + dec {
            assert_eq!(ticks[held], ticks[update]);
        }
    }
}

#[test]
fn test_error_free_decoding_is_reproducible() {
    let config = QuantizerConfig::builder(ramp_codebook(&[32, 16, 8]))
        .with_decimation(2)
        .build()
        .unwrap();
    let stream = random_stream(&config, 25, 4);

    let run = || {
        let decoder = FrameDecoder::new(config.clone(), ChannelSimulator::error_free()).unwrap();
        let mut pipeline = DecodePipeline::new(decoder, PulseSynthesizer::new());
        let mut pcm = Vec::new();
        let stats = pipeline.run(&mut Cursor::new(stream.clone()), &mut pcm).unwrap();
        (pcm, stats)
    };

    let (pcm_a, stats_a) = run();
    let (pcm_b, stats_b) = run();
    assert_eq!(pcm_a, pcm_b);
    assert_eq!(stats_a, stats_b);
    assert_eq!(stats_a.frames_read, 25);
    assert_eq!(stats_a.bit_errors, 0);
    assert_eq!(
        decode_all(config.clone(), ChannelSimulator::error_free(), &stream),
        decode_all(config, ChannelSimulator::error_free(), &stream)
    );
}

#[test]
fn test_seeded_channel_errors_are_replayable() {
    let config = QuantizerConfig::builder(ramp_codebook(&[16, 8]))
        .with_decimation(1)
        .build()
        .unwrap();
    let stream = random_stream(&config, 50, 5);

    let a = decode_all(config.clone(), ChannelSimulator::new(0.05, 99).unwrap(), &stream);
    let b = decode_all(config.clone(), ChannelSimulator::new(0.05, 99).unwrap(), &stream);
    let clean = decode_all(config, ChannelSimulator::error_free(), &stream);
    assert_eq!(a, b);
    assert_ne!(a, clean);
}

#[test]
fn test_full_ber_complements_indices() {
    // pred 0, weight 1: band 0 of the output is the sum of the stage entries
    let config = QuantizerConfig::builder(ramp_codebook(&[16]))
        .with_mode(DecodeMode::PredictiveDirect { pred: 0.0, weight: 1.0 })
        .with_decimation(1)
        .build()
        .unwrap();

    let sent = [(5u32, 9u32), (0, 63), (15, 0), (10, 33)];
    let mut stream = Vec::new();
    for &(index, pitch) in &sent {
        stream.extend(encode_frame(&config, &[index], pitch));
    }

    let channel = ChannelSimulator::new(1.0, 0).unwrap();
    let mut decoder = FrameDecoder::new(config.clone(), channel).unwrap();
    let mut source = Cursor::new(stream);
    for &(index, pitch) in &sent {
        let features = decoder.next_features(&mut source).unwrap().unwrap();

        let received = unpack_frame(&config, decoder.scheduler().frame()).unwrap();
        assert_eq!(received.stages, vec![(!index & 0xF) as usize]);
        assert_eq!(received.pitch, !pitch & 0x3F);

        assert_eq!(features.bands()[0], (15 - index) as f32);
        assert_eq!(features.pitch(), pitch_decode(6, 63 - pitch));
    }
    assert_eq!(decoder.channel().errors(), 4 * config.bits_per_frame() as u64);
}

#[test]
fn test_empty_source_terminates_cleanly() {
    let config = QuantizerConfig::builder(ramp_codebook(&[16])).build().unwrap();
    let decoder = FrameDecoder::new(config, ChannelSimulator::new(0.5, 1).unwrap()).unwrap();
    let mut pipeline = DecodePipeline::new(decoder, PulseSynthesizer::new());
    let mut pcm = Vec::new();

    let stats = pipeline.run(&mut Cursor::new(Vec::<u8>::new()), &mut pcm).unwrap();
    assert_eq!(pipeline.state(), PipelineState::Drained);
    assert_eq!(stats.frames_read, 0);
    assert_eq!(stats.bit_errors, 0);
    assert_eq!(stats.audio_blocks, 0);
    assert!(pcm.is_empty());
}

#[test]
fn test_single_stage_converges_to_fixed_point() {
    let pred = 0.9f32;
    let codebook = ramp_codebook(&[16]);
    let config = QuantizerConfig::builder(codebook.clone())
        .with_mode(DecodeMode::predictive(pred))
        .with_decimation(1)
        .build()
        .unwrap();
    let weight = config.mode().weight();

    let ticks = 250;
    let stream = vec![0u8; ticks * config.bits_per_frame()];
    let decoded = decode_all(config, ChannelSimulator::error_free(), &stream);
    assert_eq!(decoded.len(), ticks);

    let last = decoded.last().unwrap();
    for b in 0..NB_BANDS {
        let target = codebook.value(0, b, 0) * weight / (1.0 - pred);
        assert!(
            (last.bands()[b] - target).abs() <= 1e-4 * target.abs().max(1.0),
            "band {}: {} vs {}",
            b,
            last.bands()[b],
            target
        );
    }
}

#[test]
fn test_all_pitch_codes_in_range() {
    for code in 0..64u32 {
        let period = pitch_period(6, code);
        assert!((PITCH_MIN_PERIOD..=PITCH_MAX_PERIOD).contains(&period));
    }
    assert!(pitch_period(6, 1) > pitch_period(6, 0));
}

proptest! {
    #[test]
    fn prop_pitch_period_in_range(pitch_bits in 1usize..=16, raw in any::<u32>()) {
        let code = raw & ((1u32 << pitch_bits) - 1);
        let period = pitch_period(pitch_bits, code);
        prop_assert!(period.is_finite());
        prop_assert!(period >= PITCH_MIN_PERIOD && period <= PITCH_MAX_PERIOD);
    }

    #[test]
    fn prop_reserved_slots_always_zero(
        seed in any::<u64>(),
        split in any::<bool>(),
        dec in 1usize..4,
    ) {
        let mode = if split { DecodeMode::SplitLogMag } else { DecodeMode::predictive(0.85) };
        let config = QuantizerConfig::builder(ramp_codebook(&[64, 16]))
            .with_mode(mode)
            .with_decimation(dec)
            .build()
            .unwrap();
        let stream = random_stream(&config, 5, seed);
        let channel = ChannelSimulator::new(0.1, seed).unwrap();
        for features in decode_all(config, channel, &stream) {
            prop_assert!(features.reserved_is_zero());
        }
    }

    #[test]
    fn prop_dct_round_trip(values in prop::array::uniform18(-20.0f32..20.0)) {
        let restored = idct(&dct(&values));
        for (a, b) in values.iter().zip(restored.iter()) {
            prop_assert!((a - b).abs() < 1e-3);
        }
    }
}
