//! Criterion benchmarks for the callback bridge hot path
//!
//! Run with: cargo bench -p pabridge-io
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pabridge_core::{
    CallbackFlags, Continuation, OutputBuffers, SampleFormat, StreamFormat, fill_fn,
};
use pabridge_io::{CallbackBridge, StreamStatus};
use std::sync::Arc;

const SAMPLE_RATE: f64 = 48000.0;
const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512, 1024];

fn bench_interleaved(c: &mut Criterion) {
    let mut group = c.benchmark_group("bridge_interleaved_f32");
    let format = StreamFormat::new(SAMPLE_RATE, 2, SampleFormat::Float32);

    for &frames in BLOCK_SIZES {
        group.bench_with_input(BenchmarkId::from_parameter(frames), &frames, |b, _| {
            let mut phase = 0.0f32;
            let callback = fill_fn(move |buffers: &mut OutputBuffers<'_, '_>, _frames| {
                if let Some(samples) = buffers.interleaved_samples_mut::<f32>() {
                    for frame in samples.chunks_exact_mut(2) {
                        let s = (phase * std::f32::consts::TAU).sin() * 0.5;
                        frame[0] = s;
                        frame[1] = s;
                        phase = (phase + 440.0 / SAMPLE_RATE as f32).fract();
                    }
                }
                Continuation::Continue
            });
            let mut bridge =
                CallbackBridge::new(callback, &format, Arc::new(StreamStatus::default()));
            let mut data = vec![0.0f32; frames * 2];

            b.iter(|| {
                let bytes = bytemuck::cast_slice_mut::<f32, u8>(&mut data);
                let mut buffers =
                    OutputBuffers::interleaved(bytes, 2, frames, SampleFormat::Float32);
                black_box(bridge.process(&mut buffers, CallbackFlags::empty()))
            })
        });
    }

    group.finish();
}

fn bench_non_interleaved(c: &mut Criterion) {
    let mut group = c.benchmark_group("bridge_planar_i16");
    let format = StreamFormat::new(SAMPLE_RATE, 8, SampleFormat::Int16).with_interleaved(false);

    for &frames in BLOCK_SIZES {
        group.bench_with_input(BenchmarkId::from_parameter(frames), &frames, |b, _| {
            let callback = fill_fn(|buffers: &mut OutputBuffers<'_, '_>, _frames| {
                for channel in buffers.channels_mut() {
                    channel.fill(0);
                }
                Continuation::Continue
            });
            let mut bridge =
                CallbackBridge::new(callback, &format, Arc::new(StreamStatus::default()));
            let mut planes: Vec<Vec<u8>> = (0..8).map(|_| vec![0u8; frames * 2]).collect();

            b.iter(|| {
                let mut views: Vec<&mut [u8]> =
                    planes.iter_mut().map(Vec::as_mut_slice).collect();
                let mut buffers =
                    OutputBuffers::non_interleaved(&mut views, frames, SampleFormat::Int16);
                black_box(bridge.process(&mut buffers, CallbackFlags::empty()))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_interleaved, bench_non_interleaved);

criterion_main!(benches);
