use std::time::Duration;

use criterion::{Criterion, Throughput};
use georaster::raster::RasterImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const SAMPLE_SIZE: usize = 20;
pub const WARM_UP: Duration = Duration::from_secs(1);
pub const MEASUREMENT_TIME: Duration = Duration::from_secs(2);

pub fn default_criterion() -> Criterion {
    Criterion::default()
        .configure_from_args()
        .sample_size(SAMPLE_SIZE)
        .warm_up_time(WARM_UP)
        .measurement_time(MEASUREMENT_TIME)
}

pub fn pixels_throughput(width: usize, height: usize) -> Throughput {
    Throughput::Elements((width * height).max(1) as u64)
}

/// Seeded noise in `[0, 100)`.
#[allow(dead_code)]
pub fn noise_image(width: usize, height: usize, seed: u64) -> RasterImage {
    let mut rng = StdRng::seed_from_u64(seed);
    RasterImage::from_fn(width, height, |_, _| {
        (rng.next_u32() as f32) / ((u32::MAX as f32) + 1.0) * 100.0
    })
}
