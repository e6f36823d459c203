mod common;

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use georaster::geocoding::{GeoCoding, PixelPos, TiePointGeoCoding, TiePointGrid};
use georaster::raster::PixelRect;
use georaster::sampling::Stepping;

const BUDGETS: [usize; 4] = [16, 256, 2500, 65_536];

fn stepping_benches(c: &mut Criterion) {
    let rect = PixelRect::of_size(4096, 4096);
    let mut group = c.benchmark_group("sampling/stepping");

    for &budget in &BUDGETS {
        let expected = Stepping::new(rect, budget).map(|s| s.point_count()).unwrap_or(1);
        group.throughput(criterion::Throughput::Elements(expected as u64));
        group.bench_with_input(BenchmarkId::from_parameter(budget), &budget, |b, &budget| {
            b.iter(|| {
                let stepping = Stepping::new(black_box(rect), budget).unwrap();
                black_box(stepping.points().count());
            });
        });
    }

    group.finish();
}

fn tie_point_inverse_benches(c: &mut Criterion) {
    let (gw, gh) = (33, 33);
    let lats: Vec<f32> = (0..gw * gh).map(|i| 60.0 - (i / gw) as f32 * 0.25).collect();
    let lons: Vec<f32> = (0..gw * gh).map(|i| 10.0 + (i % gw) as f32 * 0.25).collect();
    let lat = TiePointGrid::new(gw, gh, 0.5, 0.5, 16.0, 16.0, lats).unwrap();
    let lon = TiePointGrid::new(gw, gh, 0.5, 0.5, 16.0, 16.0, lons).unwrap();
    let coding = TiePointGeoCoding::new(lat, lon, 512, 512).unwrap();
    let targets: Vec<_> = (0..64)
        .map(|i| coding.pixel_to_geo(&PixelPos::new(8.0 * i as f64 + 3.3, 500.0 - 7.0 * i as f64)))
        .collect();

    let mut group = c.benchmark_group("geocoding/tie_point");
    group.throughput(criterion::Throughput::Elements(targets.len() as u64));
    group.bench_function("geo_to_pixel", |b| {
        b.iter(|| {
            for geo in &targets {
                black_box(coding.geo_to_pixel(geo));
            }
        });
    });
    group.finish();
}

criterion_group! {
    name = benches;
    config = common::default_criterion();
    targets = stepping_benches, tie_point_inverse_benches
}
criterion_main!(benches);
