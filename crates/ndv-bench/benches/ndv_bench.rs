//! Benchmarks for the compositing hot path.
//!
//! Run with: `cargo bench -p ndv-bench`

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use ndv_compose::{ChannelStats, Compositor};
use ndv_core::axis::CHANNEL;
use ndv_core::{AxisPositions, CancelFlag, Rect, TileIndex, Viewport};
use ndv_io::{CachedTileSource, DEFAULT_CACHE_SIZE, MemoryTileSource, TileSource};
use ndv_lut::{ChannelLut, DisplaySettings, Rgb8, rescale_to_u8};

const TILE: u32 = 256;
const GRID: i64 = 4;
const CHANNELS: [(&str, Rgb8); 3] = [("DAPI", Rgb8::BLUE), ("GFP", Rgb8::GREEN), ("mCherry", Rgb8::RED)];

/// 1024x1024, three channels, two coarser levels.
fn mosaic() -> MemoryTileSource {
    let size = TILE * GRID as u32;
    let source = MemoryTileSource::bounded(TILE, TILE, Rect::new(0, 0, size, size), 2, 12).unwrap();
    for (c, (name, _)) in CHANNELS.iter().enumerate() {
        let axes = AxisPositions::standard().with(CHANNEL, c as i32);
        for row in 0..GRID {
            for col in 0..GRID {
                let data = (0..TILE * TILE)
                    .map(|i| ((i as i64 * 7 + col * 131 + row * 17 + c as i64 * 1000) % 4096) as u16)
                    .collect();
                source.insert_tile(name, &axes, TileIndex::new(col, row), data).unwrap();
            }
        }
    }
    source
}

fn settings() -> DisplaySettings {
    let settings = DisplaySettings::new();
    for (name, color) in CHANNELS {
        settings.register(name, color, 12).unwrap();
        settings.set_contrast(name, 0, 4095, 0.8).unwrap();
    }
    settings
}

/// Benchmark LUT construction and 16-to-8 bit rescaling.
fn bench_lut(c: &mut Criterion) {
    let mut group = c.benchmark_group("lut");

    group.bench_function("build_gamma_1", |b| {
        b.iter(|| ChannelLut::new(black_box(Rgb8::GREEN), black_box(1.0)).unwrap())
    });
    group.bench_function("build_gamma_0.5", |b| {
        b.iter(|| ChannelLut::new(black_box(Rgb8::MAGENTA), black_box(0.5)).unwrap())
    });

    let values: Vec<u16> = (0..65536).map(|i| (i % 4096) as u16).collect();
    group.throughput(Throughput::Elements(values.len() as u64));
    group.bench_function("rescale_12bit", |b| {
        b.iter(|| {
            values
                .iter()
                .map(|&v| rescale_to_u8(black_box(v), 100, 3000))
                .collect::<Vec<_>>()
        })
    });

    group.finish();
}

/// Benchmark full composites at several canvas sizes.
fn bench_composite(c: &mut Criterion) {
    let mut group = c.benchmark_group("composite");
    let source = mosaic();
    let snapshot = settings().snapshot();
    let compositor = Compositor::new();
    let cancel = CancelFlag::new();

    for size in [256u32, 512, 1024] {
        let viewport = Viewport::new(size, size, source.bounds(), source.max_resolution_index()).unwrap();
        group.throughput(Throughput::Elements(u64::from(size) * u64::from(size)));
        group.bench_with_input(BenchmarkId::new("fit_3ch", size), &viewport, |b, vp| {
            b.iter(|| compositor.composite(black_box(vp), &snapshot, &source, &cancel))
        });
    }

    let cached = CachedTileSource::new(mosaic(), DEFAULT_CACHE_SIZE);
    let viewport = Viewport::new(512, 512, cached.bounds(), cached.max_resolution_index()).unwrap();
    group.bench_function("fit_3ch_cached/512", |b| {
        b.iter(|| compositor.composite(black_box(&viewport), &snapshot, &cached, &cancel))
    });

    group.finish();
}

/// Benchmark per-channel statistics.
fn bench_stats(c: &mut Criterion) {
    let mut group = c.benchmark_group("stats");
    let source = mosaic();
    let axes = AxisPositions::standard();

    for level in [0u32, 2] {
        let side = (TILE * GRID as u32) >> level;
        let region = source
            .fetch_region("GFP", &axes, level, Rect::new(0, 0, side, side))
            .unwrap();
        group.throughput(Throughput::Elements(u64::from(side) * u64::from(side)));
        group.bench_with_input(BenchmarkId::new("compute", side), &region, |b, r| {
            b.iter(|| ChannelStats::compute("GFP", black_box(r), 12))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_lut, bench_composite, bench_stats);
criterion_main!(benches);
