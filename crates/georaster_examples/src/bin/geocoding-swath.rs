use anyhow::Context;
use chrono::{TimeZone, Utc};
use georaster::geocoding::normalize_lon;
use georaster::prelude::*;
use georaster_examples::init_tracing;
use tracing::{info, warn};

const W: usize = 256;
const H: usize = 512;

/// A swath crossing the antimeridian, sampled every 16 pixels.
fn swath() -> anyhow::Result<TiePointGeoCoding> {
    let (gw, gh) = (W / 16 + 1, H / 16 + 1);
    let mut lats = Vec::with_capacity(gw * gh);
    let mut lons = Vec::with_capacity(gw * gh);
    for j in 0..gh {
        for i in 0..gw {
            let (x, y) = (i as f64 * 16.0, j as f64 * 16.0);
            lats.push((70.0 - y * 0.02 + x * 0.002) as f32);
            lons.push(normalize_lon(175.0 + x * 0.04 + y * 0.004) as f32);
        }
    }
    let lat = TiePointGrid::new(gw, gh, 0.5, 0.5, 16.0, 16.0, lats)?;
    let lon = TiePointGrid::new(gw, gh, 0.5, 0.5, 16.0, 16.0, lons)?;
    Ok(TiePointGeoCoding::new(lat, lon, W, H)?)
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let coding = swath()?;
    info!(
        crosses_antimeridian = coding.crosses_antimeridian(),
        "tie-point geo-coding"
    );

    let start = Utc
        .with_ymd_and_hms(2024, 6, 1, 10, 0, 0)
        .single()
        .context("start time")?;
    let span = TimeSpan::between(start, start + chrono::Duration::seconds(100))?;
    let times = LineTimeCoding::new(span, W, H)?;

    for (x, y) in [(10.5, 10.5), (128.0, 256.0), (250.2, 500.7)] {
        let pixel = PixelPos::new(x, y);
        let geo = coding.pixel_to_geo(&pixel);
        let back = coding.geo_to_pixel(&geo);
        let time = times.time_at_pixel(&pixel)?;
        if back.is_valid() {
            info!(x, y, lat = geo.lat, lon = geo.lon, back_x = back.x, back_y = back.y, %time, "round trip");
        } else {
            warn!(x, y, "inverse did not resolve");
        }
    }

    let outside = coding.geo_to_pixel(&GeoPos::new(-10.0, 20.0));
    info!(valid = outside.is_valid(), "position far from the swath");
    Ok(())
}
