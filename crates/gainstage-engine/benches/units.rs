//! Benchmarks for the units and a small chain.
//!
//! Run with: cargo bench -p gainstage-engine
//!
//! At 48kHz a 512 frame block leaves 10.67ms; every case here should be
//! orders of magnitude below that.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use gainstage_engine::dsp::{GainUnit, StereoGainUnit, TremoloUnit, Unit, UnitSettings};
use gainstage_engine::graph::Chain;
use gainstage_patch::parse_patch;

const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512];

fn ramp(size: usize) -> Vec<f32> {
    (0..size).map(|i| (i as f32 / size as f32) * 2.0 - 1.0).collect()
}

fn bench_units(c: &mut Criterion) {
    let mut group = c.benchmark_group("units");

    for &size in BLOCK_SIZES {
        let settings = UnitSettings::new(48_000.0, size);
        let signal = ramp(size);

        let mut gain = GainUnit::new(&settings).with_gain(0.5);
        group.bench_with_input(BenchmarkId::new("gain", size), &size, |b, _| {
            b.iter(|| gain.execute(black_box(&[signal.as_slice()])))
        });

        let mut stereo = StereoGainUnit::new(&settings).with_gain(0.5);
        group.bench_with_input(BenchmarkId::new("stereo_gain", size), &size, |b, _| {
            b.iter(|| stereo.execute(black_box(&[signal.as_slice(), signal.as_slice()])))
        });

        let mut tremolo = TremoloUnit::new(&settings).with_rate(5.0).with_depth(0.8);
        group.bench_with_input(BenchmarkId::new("tremolo", size), &size, |b, _| {
            b.iter(|| tremolo.execute(black_box(&[signal.as_slice()])))
        });

        // Depth changes every block, so the LFO is rebuilt each time.
        let mut modulated = TremoloUnit::new(&settings).with_rate(5.0);
        let mut depth = 0.0f32;
        group.bench_with_input(BenchmarkId::new("tremolo_moving_depth", size), &size, |b, _| {
            b.iter(|| {
                depth = if depth > 0.9 { 0.0 } else { depth + 0.01 };
                modulated.set_depth(depth);
                modulated.execute(black_box(&[signal.as_slice()]))
            })
        });
    }

    group.finish();
}

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain");
    let patch = parse_patch("gain gain=0.8 | tremolo rate=4 depth=0.6 | stereo_gain gain=1.2")
        .expect("bench patch parses");

    for &size in BLOCK_SIZES {
        let mut chain = Chain::from_patch(&patch, UnitSettings::new(48_000.0, size), 2)
            .expect("bench chain builds");
        let signal = ramp(size);
        let mut channels = vec![signal.clone(), signal.clone()];

        group.bench_with_input(BenchmarkId::new("stereo", size), &size, |b, _| {
            b.iter(|| {
                for ch in channels.iter_mut() {
                    ch.copy_from_slice(&signal);
                }
                chain.process(black_box(&mut channels), size)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_units, bench_chain);
criterion_main!(benches);
