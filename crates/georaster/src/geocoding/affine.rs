//! Parametric geo-coding from a six-coefficient affine geotransform.
use glam::{DAffine2, DMat2, DVec2};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geocoding::{in_raster, lon_delta, normalize_lon, Datum, GeoCoding, GeoPos, PixelPos};

/// Affine transformation coefficients mapping pixel corners to longitude/latitude:
///
/// ```text
/// lon = origin_x + x * pixel_width + y * row_rotation
/// lat = origin_y + x * col_rotation + y * pixel_height
/// ```
///
/// For north-up images the rotation terms are zero and `pixel_height` is negative.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    /// Longitude of the upper-left corner.
    pub origin_x: f64,
    /// Latitude of the upper-left corner.
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub row_rotation: f64,
    pub col_rotation: f64,
}

impl GeoTransform {
    /// A north-up transform without rotation.
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// From GDAL ordering `[origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]`.
    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        Self {
            origin_x: coeffs[0],
            pixel_width: coeffs[1],
            row_rotation: coeffs[2],
            origin_y: coeffs[3],
            col_rotation: coeffs[4],
            pixel_height: coeffs[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    pub fn determinant(&self) -> f64 {
        self.linear().determinant()
    }

    pub fn is_north_up(&self) -> bool {
        self.row_rotation.abs() < 1e-10 && self.col_rotation.abs() < 1e-10
    }

    fn linear(&self) -> DMat2 {
        DMat2::from_cols(
            DVec2::new(self.pixel_width, self.col_rotation),
            DVec2::new(self.row_rotation, self.pixel_height),
        )
    }

    fn to_affine(self) -> DAffine2 {
        DAffine2::from_mat2_translation(self.linear(), DVec2::new(self.origin_x, self.origin_y))
    }
}

/// Direct geo-coding of a `width` x `height` raster through a [`GeoTransform`].
#[derive(Debug, Clone)]
pub struct AffineGeoCoding {
    transform: GeoTransform,
    forward: DAffine2,
    inverse: DAffine2,
    width: usize,
    height: usize,
    center_lon: f64,
    crosses_antimeridian: bool,
    datum: Datum,
}

impl AffineGeoCoding {
    pub fn new(transform: GeoTransform, width: usize, height: usize) -> Result<Self> {
        Self::with_datum(transform, width, height, Datum::WGS84)
    }

    pub fn with_datum(
        transform: GeoTransform,
        width: usize,
        height: usize,
        datum: Datum,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidConfig(
                "raster width and height must be > 0".into(),
            ));
        }
        if transform.determinant().abs() < 1e-12 {
            return Err(Error::InvalidConfig(format!(
                "geotransform {:?} is not invertible",
                transform.to_gdal()
            )));
        }

        let forward = transform.to_affine();
        let inverse = forward.inverse();
        let (w, h) = (width as f64, height as f64);
        let corners = [
            DVec2::ZERO,
            DVec2::new(w, 0.0),
            DVec2::new(0.0, h),
            DVec2::new(w, h),
        ]
        .map(|c| forward.transform_point2(c).x);
        let min_lon = corners.iter().copied().fold(f64::INFINITY, f64::min);
        let max_lon = corners.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Ok(Self {
            transform,
            forward,
            inverse,
            width,
            height,
            center_lon: forward.transform_point2(DVec2::new(w, h) * 0.5).x,
            crosses_antimeridian: min_lon < -180.0 || max_lon > 180.0,
            datum,
        })
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }
}

impl GeoCoding for AffineGeoCoding {
    fn can_get_geo_pos(&self) -> bool {
        true
    }

    fn can_get_pixel_pos(&self) -> bool {
        true
    }

    fn pixel_to_geo(&self, pixel: &PixelPos) -> GeoPos {
        if !in_raster(pixel, self.width, self.height) {
            return GeoPos::invalid();
        }
        let geo = self.forward.transform_point2(DVec2::from(*pixel));
        let lon = if (-180.0..=180.0).contains(&geo.x) {
            geo.x
        } else {
            normalize_lon(geo.x)
        };
        GeoPos::with_datum(geo.y, lon, self.datum.clone())
    }

    fn geo_to_pixel(&self, geo: &GeoPos) -> PixelPos {
        if !geo.is_valid() {
            return PixelPos::invalid();
        }
        // The longitude equivalent closest to the raster centre.
        let lon = self.center_lon + lon_delta(geo.lon, self.center_lon);
        let pixel = PixelPos::from(self.inverse.transform_point2(DVec2::new(lon, geo.lat)));
        if in_raster(&pixel, self.width, self.height) {
            pixel
        } else {
            PixelPos::invalid()
        }
    }

    fn crosses_antimeridian(&self) -> bool {
        self.crosses_antimeridian
    }

    fn datum(&self) -> &Datum {
        &self.datum
    }
}
