//! Benchmarks for segmentation, resampling and framing
//!
//! Run with: cargo bench -p packet-tts-pipeline --bench segmenter_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use packet_tts_pipeline::audio::Resampler;
use packet_tts_pipeline::tts::framing::emit_frames;
use packet_tts_pipeline::{AudioPacket, ChunkerConfig, FrameTiming, Segmenter};

// =============================================================================
// Segmentation Benchmarks
// =============================================================================

fn bench_segmentation(c: &mut Criterion) {
    let mut group = c.benchmark_group("segmentation");
    let segmenter = Segmenter::new(ChunkerConfig::default());

    let sentence = "The sun rose over the hills. It was warm, calm, and quiet, but the wind picked up; ";
    for repeats in [1usize, 10, 100] {
        let text = sentence.repeat(repeats);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("english", repeats), &text, |b, text| {
            b.iter(|| segmenter.split(black_box(text)))
        });
    }

    let gujarati = "હું ઘરે ગયો અને પછી મેં ખાધું પણ ભૂખ લાગી તો ફરી ખાધું. ".repeat(20);
    group.bench_function("gujarati_20", |b| b.iter(|| segmenter.split(black_box(&gujarati))));

    let unbroken = (0..1000).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ");
    group.bench_function("forced_split_1000_words", |b| {
        b.iter(|| segmenter.split(black_box(&unbroken)))
    });

    group.finish();
}

// =============================================================================
// Resampling Benchmarks
// =============================================================================

fn bench_resampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("resampling");

    for (from, to) in [(22050u32, 16000u32), (8000, 16000), (24000, 16000)] {
        let samples: Vec<f32> = (0..from as usize).map(|i| (i as f32 * 0.01).sin()).collect();
        let resampler = Resampler::new(from, to);
        group.throughput(Throughput::Elements(samples.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("linear_1s", format!("{}_to_{}", from, to)),
            &samples,
            |b, samples| b.iter(|| resampler.resample(black_box(samples))),
        );
    }

    group.finish();
}

// =============================================================================
// Framing Benchmarks
// =============================================================================

fn bench_framing(c: &mut Criterion) {
    let mut group = c.benchmark_group("framing");
    let timing = FrameTiming {
        first_frame_ms: 20,
        subsequent_frame_ms: 40,
    };

    for seconds in [1usize, 5] {
        let packet = AudioPacket {
            span_index: 0,
            samples: (0..16000 * seconds).map(|i| (i as f32 * 0.01).sin() * 0.5).collect(),
            sample_rate: 16000,
            is_last: true,
            synthesis_ms: 0.0,
        };
        group.bench_with_input(BenchmarkId::new("wav_frames", seconds), &packet, |b, packet| {
            b.iter(|| {
                let mut sent_first = false;
                emit_frames(black_box(packet), timing, &mut sent_first)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_segmentation, bench_resampling, bench_framing);
criterion_main!(benches);
