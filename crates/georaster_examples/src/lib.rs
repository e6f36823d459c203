#![forbid(unsafe_code)]
//! Shared helpers for the georaster example binaries.
use georaster::raster::RasterImage;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs a `fmt` subscriber honouring `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A second call from the same process keeps the first subscriber.
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

/// Renders `image` as rows of shaded characters, scaling `[low, high]` onto the ramp.
pub fn ascii_preview(image: &RasterImage, low: f32, high: f32) -> String {
    const RAMP: &[u8] = b" .:-=+*#%@";
    let span = (high - low).max(f32::EPSILON);
    let mut out = String::with_capacity((image.width() + 1) * image.height());
    for y in 0..image.height() {
        for x in 0..image.width() {
            let v = image.get(x, y).unwrap_or(f32::NAN);
            let ch = if v.is_nan() {
                '?'
            } else {
                let t = ((v - low) / span).clamp(0.0, 1.0);
                RAMP[(t * (RAMP.len() - 1) as f32).round() as usize] as char
            };
            out.push(ch);
        }
        out.push('\n');
    }
    out
}
