//! Selection Benchmarks
//!
//! Planning cost for compilations and Shorts over growing clip pools.
//!
//! # Running Benchmarks
//! ```bash
//! cargo bench --bench selection
//! ```

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use reel_compositor::{
    config::{CompilationConfig, ShortsConfig},
    selection::{pack, select, PackParams, SelectionParams},
    video::{ClipPool, ClipValidity, SourceClip},
};

/// A validated pool with durations cycling between 4 and 40 seconds
fn synthetic_pool(size: usize) -> ClipPool {
    (0..size)
        .map(|i| {
            let mut clip = SourceClip::new(format!("clips/{:04}_clip.mp4", i), i as u32 + 1);
            clip.duration = Some(4.0 + (i * 7 % 37) as f64);
            clip.fps = Some(30.0);
            clip.validity = ClipValidity::Valid;
            clip
        })
        .collect()
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("select");
    group.measurement_time(Duration::from_secs(5));

    let params = SelectionParams::from_config(&CompilationConfig::default(), 0.5, 30.0);

    for size in [10, 100, 1000] {
        let pool = synthetic_pool(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &pool, |b, pool| {
            b.iter(|| select(black_box(pool), black_box(&params)))
        });
    }

    group.finish();
}

fn bench_pack(c: &mut Criterion) {
    let mut group = c.benchmark_group("pack");
    group.measurement_time(Duration::from_secs(5));

    let mut config = ShortsConfig::default();
    config.max_clips = 12;
    let params = PackParams::from_config(&config, 0.5, 2.0, 30.0);

    for size in [10, 100, 1000] {
        let pool = synthetic_pool(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &pool, |b, pool| {
            b.iter(|| pack(black_box(pool), black_box(&params)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_select, bench_pack);
criterion_main!(benches);
