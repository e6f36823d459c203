//! Geo-coding: bidirectional mapping between pixel and geographic positions.
//!
//! - Implement [`GeoCoding`] for custom transforms, or use one of the provided codings:
//!   [`AffineGeoCoding`] (parametric), [`TiePointGeoCoding`] (interpolated from sparse
//!   tie-point grids) and [`PixelGeoCoding`] (per-pixel latitude/longitude with search).
//! - Positions that cannot be resolved come back as the invalid sentinel
//!   ([`PixelPos::is_valid`] / [`GeoPos::is_valid`] return `false`). Callers in bulk
//!   per-pixel loops check validity instead of handling errors.
pub mod affine;
pub mod datum;
pub mod pixel;
pub mod position;
pub mod tie_point;

pub use affine::{AffineGeoCoding, GeoTransform};
pub use datum::Datum;
pub use pixel::PixelGeoCoding;
pub use position::{interpolate_lon, lon_delta, lon_diff, normalize_lon, GeoPos, PixelPos};
pub use tie_point::{TiePointGeoCoding, TiePointGrid};

use crate::error::{Error, Result};

/// Upper bound of seed points used by the inverse searches.
pub const INVERSE_SEED_POINTS: usize = 2500;

/// Contract between pixel space and geographic space.
///
/// Either direction may be unsupported; check [`GeoCoding::can_get_geo_pos`] and
/// [`GeoCoding::can_get_pixel_pos`] first, or use the `try_` variants.
pub trait GeoCoding: Send + Sync {
    /// Whether [`GeoCoding::pixel_to_geo`] is supported.
    fn can_get_geo_pos(&self) -> bool;

    /// Whether [`GeoCoding::geo_to_pixel`] is supported.
    fn can_get_pixel_pos(&self) -> bool;

    /// Geographic position of a pixel position, invalid when outside the coverage.
    fn pixel_to_geo(&self, pixel: &PixelPos) -> GeoPos;

    /// Pixel position of a geographic position, invalid when it cannot be located.
    fn geo_to_pixel(&self, geo: &GeoPos) -> PixelPos;

    /// Whether the covered area spans the 180° meridian.
    fn crosses_antimeridian(&self) -> bool;

    fn datum(&self) -> &Datum;

    /// Releases cached search structures. The coding must not be queried afterwards.
    fn dispose(&mut self) {}

    /// [`GeoCoding::pixel_to_geo`], failing when the capability is missing.
    fn try_pixel_to_geo(&self, pixel: &PixelPos) -> Result<GeoPos> {
        if !self.can_get_geo_pos() {
            return Err(Error::Unsupported("pixel_to_geo"));
        }
        Ok(self.pixel_to_geo(pixel))
    }

    /// [`GeoCoding::geo_to_pixel`], failing when the capability is missing.
    fn try_geo_to_pixel(&self, geo: &GeoPos) -> Result<PixelPos> {
        if !self.can_get_pixel_pos() {
            return Err(Error::Unsupported("geo_to_pixel"));
        }
        Ok(self.geo_to_pixel(geo))
    }
}

/// Whether a pixel position lies within a `width` x `height` raster, borders included.
#[inline]
pub(crate) fn in_raster(pixel: &PixelPos, width: usize, height: usize) -> bool {
    pixel.is_valid()
        && pixel.x >= 0.0
        && pixel.y >= 0.0
        && pixel.x <= width as f64
        && pixel.y <= height as f64
}

/// Squared angular distance with longitude scaled by `cos(lat)`.
#[inline]
pub(crate) fn angular_distance_sq(lat0: f64, lon0: f64, lat: f64, lon: f64) -> f64 {
    let r = lat0.to_radians().cos();
    let dlat = lat - lat0;
    let dlon = r * lon_diff(lon, lon0);
    dlat * dlat + dlon * dlon
}
