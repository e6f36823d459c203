use std::sync::{Arc, Mutex};

use georaster::prelude::*;
use georaster_examples::{ascii_preview, init_tracing};
use glam::DVec2;
use tracing::info;

const W: usize = 48;
const H: usize = 24;

fn main() -> anyhow::Result<()> {
    init_tracing();
    let registry = RasterRegistry::new(W, H)?;
    let events = Arc::new(Mutex::new(VecSink::new()));
    registry.add_sink(Arc::clone(&events));

    let red = registry.add_band(
        "red",
        RasterImage::from_fn(W, H, |x, y| 0.1 + 0.002 * (x + y) as f32),
    )?;
    registry.add_band(
        "nir",
        RasterImage::from_fn(W, H, |x, _| 0.2 + 0.012 * x as f32),
    )?;
    let ndvi = registry.add_virtual_band("ndvi", "(nir - red) / (nir + red)")?;
    let smooth = registry.add_filter_band(
        "ndvi_smooth",
        "ndvi",
        FilterOp::general(GeneralFilter::Median, 3, 3),
    )?;
    let vegetation = registry.add_mask("vegetation", MaskSpec::range("ndvi_smooth", 0.5, 1.0))?;
    let field = Polygon::rectangle(DVec2::new(4.0, 4.0), DVec2::new(20.0, 18.0))?;
    let roi = registry.add_mask("field", MaskSpec::Geometry(vec![field]))?;

    for level in 0..registry.level_count() {
        let (w, h) = registry.level_size(level)?;
        let image = registry.get_image_level(smooth, level)?;
        info!(level, w, h, first = image.data[0], "smoothed ndvi level");
    }
    println!("{}", ascii_preview(&*registry.get_image_level(vegetation, 0)?, 0.0, 1.0));

    let stx = Stx::compute(&registry, ndvi, Some(roi), 16)?;
    let (lo, hi) = stx.histogram().find_range_95()?;
    info!(
        samples = stx.sample_count(),
        min = stx.min(),
        max = stx.max(),
        mean = stx.mean(),
        p2_5 = lo,
        p97_5 = hi,
        "ndvi inside the field"
    );

    registry.write_pixels(red, PixelRect::new(0, 0, W, 1), &vec![0.9; W])?;
    info!(
        recomputed = registry.recompute_count(smooth)?,
        cached = ?registry.cached_levels(smooth)?,
        "after editing the red band"
    );

    let events = events.lock().map_err(|_| anyhow::anyhow!("event sink poisoned"))?;
    info!(events = events.len(), "registry events");
    Ok(())
}
