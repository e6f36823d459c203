//! Pixel and geographic positions plus longitude arithmetic.
//!
//! Both position types carry an "invalid" sentinel (NaN components) used by the
//! geo-codings to report positions they cannot resolve.
use glam::DVec2;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geocoding::Datum;

/// A position in image space. Integer coordinates are pixel corners, `+0.5` is the centre.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelPos {
    pub x: f64,
    pub y: f64,
}

impl PixelPos {
    pub const INVALID: PixelPos = PixelPos {
        x: f64::NAN,
        y: f64::NAN,
    };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub const fn invalid() -> Self {
        Self::INVALID
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        !self.x.is_nan() && !self.y.is_nan()
    }

    pub fn set_invalid(&mut self) {
        *self = Self::INVALID;
    }

    pub fn set_location(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    /// Centre of the pixel containing this position.
    pub fn pixel_center(&self) -> PixelPos {
        PixelPos::new(self.x.floor() + 0.5, self.y.floor() + 0.5)
    }

    pub fn distance(&self, other: &PixelPos) -> f64 {
        DVec2::from(*self).distance(DVec2::from(*other))
    }
}

impl Default for PixelPos {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl From<DVec2> for PixelPos {
    fn from(v: DVec2) -> Self {
        Self::new(v.x, v.y)
    }
}

impl From<PixelPos> for DVec2 {
    fn from(p: PixelPos) -> Self {
        DVec2::new(p.x, p.y)
    }
}

impl From<mint::Point2<f64>> for PixelPos {
    fn from(p: mint::Point2<f64>) -> Self {
        Self::new(p.x, p.y)
    }
}

impl From<PixelPos> for mint::Point2<f64> {
    fn from(p: PixelPos) -> Self {
        mint::Point2 { x: p.x, y: p.y }
    }
}

/// A geographic position in degrees, referenced to a [`Datum`].
///
/// Equality compares the datum as well as the coordinates.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct GeoPos {
    pub lat: f64,
    pub lon: f64,
    pub datum: Datum,
}

impl GeoPos {
    /// A WGS84 position.
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            datum: Datum::WGS84,
        }
    }

    pub fn with_datum(lat: f64, lon: f64, datum: Datum) -> Self {
        Self { lat, lon, datum }
    }

    pub const fn invalid() -> Self {
        Self::new(f64::NAN, f64::NAN)
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        !self.lat.is_nan() && !self.lon.is_nan()
    }

    pub fn set_invalid(&mut self) {
        self.lat = f64::NAN;
        self.lon = f64::NAN;
    }

    pub fn set_location(&mut self, lat: f64, lon: f64) {
        self.lat = lat;
        self.lon = lon;
    }
}

impl Default for GeoPos {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Wraps a longitude into `[-180, 180)`. NaN stays NaN.
#[inline]
pub fn normalize_lon(lon: f64) -> f64 {
    if !lon.is_finite() {
        return lon;
    }
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped >= 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Signed difference `a - b` along the shorter path, in `[-180, 180)`.
#[inline]
pub fn lon_delta(a: f64, b: f64) -> f64 {
    normalize_lon(a - b)
}

/// Absolute angular distance between two longitudes along the shorter path.
#[inline]
pub fn lon_diff(a: f64, b: f64) -> f64 {
    lon_delta(a, b).abs()
}

/// Linear interpolation from `a` to `b` along the shorter path, normalized.
#[inline]
pub fn interpolate_lon(a: f64, b: f64, t: f64) -> f64 {
    normalize_lon(a + lon_delta(b, a) * t)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn invalid_sentinels() {
        let mut p = PixelPos::new(1.0, 2.0);
        assert!(p.is_valid());
        p.set_invalid();
        assert!(!p.is_valid());
        assert!(!GeoPos::invalid().is_valid());
    }

    #[test]
    fn geo_equality_is_datum_aware() {
        let a = GeoPos::new(10.0, 20.0);
        let b = GeoPos::with_datum(10.0, 20.0, Datum::WGS72);
        assert_ne!(a, b);
        assert_eq!(a, GeoPos::with_datum(10.0, 20.0, Datum::WGS84));
    }

    #[test]
    fn normalize_wraps_into_range() {
        assert_abs_diff_eq!(normalize_lon(190.0), -170.0);
        assert_abs_diff_eq!(normalize_lon(-190.0), 170.0);
        assert_abs_diff_eq!(normalize_lon(180.0), -180.0);
        assert_abs_diff_eq!(normalize_lon(540.0), -180.0);
        assert!(normalize_lon(f64::NAN).is_nan());
    }

    #[test]
    fn interpolation_takes_shorter_path_across_antimeridian() {
        assert_abs_diff_eq!(lon_diff(179.0, -179.0), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(interpolate_lon(179.0, -179.0, 0.25), 179.5, epsilon = 1e-12);
        assert_abs_diff_eq!(interpolate_lon(179.0, -179.0, 0.75), -179.5, epsilon = 1e-12);
        assert_abs_diff_eq!(interpolate_lon(10.0, 20.0, 0.5), 15.0, epsilon = 1e-12);
    }

    #[test]
    fn mint_and_glam_conversions() {
        let p: PixelPos = mint::Point2 { x: 1.5, y: 2.5 }.into();
        assert_eq!(p, PixelPos::new(1.5, 2.5));
        let v: DVec2 = p.into();
        assert_eq!(v, DVec2::new(1.5, 2.5));
        assert_eq!(p.pixel_center(), PixelPos::new(1.5, 2.5));
    }
}
