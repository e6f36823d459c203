//! Geo-coding interpolated from sparse latitude/longitude tie-point grids.
//!
//! The forward transform interpolates both grids bilinearly. The inverse is solved with
//! Newton iterations on the forward transform, seeded from the nearest point of a coarse
//! approximation grid that is built on first use from a [`Stepping`] over the raster.
use std::sync::OnceLock;

use glam::{DMat2, DVec2};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::geocoding::{
    angular_distance_sq, in_raster, lon_delta, normalize_lon, Datum, GeoCoding, GeoPos, PixelPos,
    INVERSE_SEED_POINTS,
};
use crate::raster::PixelRect;
use crate::sampling::Stepping;

const MAX_NEWTON_ITERATIONS: usize = 30;
/// Residual in degrees below which the inverse is accepted.
const NEWTON_TOLERANCE: f64 = 1e-7;
/// Finite-difference half step in pixels.
const JACOBIAN_STEP: f64 = 0.5;

/// A sparse grid of samples of a smoothly varying quantity.
///
/// Tie point `(i, j)` sits at pixel position
/// `(offset_x + i * sub_sampling_x, offset_y + j * sub_sampling_y)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TiePointGrid {
    grid_width: usize,
    grid_height: usize,
    offset_x: f64,
    offset_y: f64,
    sub_sampling_x: f64,
    sub_sampling_y: f64,
    tie_points: Vec<f32>,
}

impl TiePointGrid {
    pub fn new(
        grid_width: usize,
        grid_height: usize,
        offset_x: f64,
        offset_y: f64,
        sub_sampling_x: f64,
        sub_sampling_y: f64,
        tie_points: Vec<f32>,
    ) -> Result<Self> {
        if grid_width < 2 || grid_height < 2 {
            return Err(Error::InvalidConfig(
                "tie-point grids need at least 2x2 points".into(),
            ));
        }
        if !(sub_sampling_x > 0.0 && sub_sampling_y > 0.0) {
            return Err(Error::InvalidConfig("sub-sampling must be > 0".into()));
        }
        if tie_points.len() != grid_width * grid_height {
            return Err(Error::InvalidConfig(format!(
                "expected {} tie points for a {grid_width}x{grid_height} grid, got {}",
                grid_width * grid_height,
                tie_points.len()
            )));
        }
        Ok(Self {
            grid_width,
            grid_height,
            offset_x,
            offset_y,
            sub_sampling_x,
            sub_sampling_y,
            tie_points,
        })
    }

    pub fn grid_width(&self) -> usize {
        self.grid_width
    }

    pub fn grid_height(&self) -> usize {
        self.grid_height
    }

    pub fn offset(&self) -> (f64, f64) {
        (self.offset_x, self.offset_y)
    }

    pub fn sub_sampling(&self) -> (f64, f64) {
        (self.sub_sampling_x, self.sub_sampling_y)
    }

    pub fn tie_points(&self) -> &[f32] {
        &self.tie_points
    }

    /// Whether `other` samples the same pixel positions.
    pub fn is_compatible(&self, other: &TiePointGrid) -> bool {
        self.grid_width == other.grid_width
            && self.grid_height == other.grid_height
            && self.offset() == other.offset()
            && self.sub_sampling() == other.sub_sampling()
    }

    /// Bilinearly interpolated value at pixel position `(x, y)`.
    ///
    /// Positions beyond the outermost tie points extrapolate from the border cell.
    pub fn value_at(&self, x: f64, y: f64) -> f64 {
        let fi = (x - self.offset_x) / self.sub_sampling_x;
        let fj = (y - self.offset_y) / self.sub_sampling_y;
        let i = floor_and_crop(fi, self.grid_width - 2);
        let j = floor_and_crop(fj, self.grid_height - 2);
        let (wi, wj) = (fi - i as f64, fj - j as f64);

        let v00 = self.point(i, j);
        let v10 = self.point(i + 1, j);
        let v01 = self.point(i, j + 1);
        let v11 = self.point(i + 1, j + 1);
        v00 + wi * (v10 - v00) + wj * (v01 - v00) + wi * wj * (v11 + v00 - v01 - v10)
    }

    #[inline]
    fn point(&self, i: usize, j: usize) -> f64 {
        f64::from(self.tie_points[j * self.grid_width + i])
    }

    fn with_points(self, tie_points: Vec<f32>) -> Self {
        Self { tie_points, ..self }
    }
}

#[inline]
fn floor_and_crop(value: f64, max: usize) -> usize {
    if value.is_nan() || value <= 0.0 {
        0
    } else {
        (value.floor() as usize).min(max)
    }
}

/// Unwraps longitude jumps across the antimeridian line by line.
///
/// Returns `None` when no jump was found. Otherwise every value is shifted so that the
/// grid is continuous and its smallest value is at least -180.
fn unwrap_longitudes(lons: &[f32], width: usize, height: usize) -> Option<Vec<f32>> {
    let mut out = lons.to_vec();
    let mut west = false;
    let mut east = false;
    for y in 0..height {
        for x in 0..width {
            let index = y * width + x;
            let base = match (x, y) {
                (0, 0) => continue,
                (0, _) => out[index - width],
                _ => out[index - 1],
            };
            let value = f64::from(out[index]);
            let delta = value - f64::from(base);
            if delta > 180.0 {
                out[index] = (value - 360.0) as f32;
                west = true;
            } else if delta < -180.0 {
                out[index] = (value + 360.0) as f32;
                east = true;
            }
        }
    }
    if west {
        out.iter_mut().for_each(|lon| *lon += 360.0);
    }
    (west || east).then_some(out)
}

#[derive(Debug, Clone, Copy)]
struct Seed {
    pixel: DVec2,
    lat: f64,
    lon: f64,
}

/// Geo-coding of a `width` x `height` raster from a latitude and a longitude tie-point grid.
#[derive(Debug)]
pub struct TiePointGeoCoding {
    lat_grid: TiePointGrid,
    lon_grid: TiePointGrid,
    width: usize,
    height: usize,
    crosses_antimeridian: bool,
    datum: Datum,
    seeds: OnceLock<Vec<Seed>>,
}

impl TiePointGeoCoding {
    pub fn new(
        lat_grid: TiePointGrid,
        lon_grid: TiePointGrid,
        width: usize,
        height: usize,
    ) -> Result<Self> {
        Self::with_datum(lat_grid, lon_grid, width, height, Datum::WGS84)
    }

    pub fn with_datum(
        lat_grid: TiePointGrid,
        lon_grid: TiePointGrid,
        width: usize,
        height: usize,
        datum: Datum,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidConfig(
                "raster width and height must be > 0".into(),
            ));
        }
        if !lat_grid.is_compatible(&lon_grid) {
            return Err(Error::InvalidConfig(
                "latitude grid is not compatible with longitude grid".into(),
            ));
        }

        let unwrapped =
            unwrap_longitudes(&lon_grid.tie_points, lon_grid.grid_width, lon_grid.grid_height);
        let crosses_antimeridian = unwrapped.is_some();
        let lon_grid = match unwrapped {
            Some(points) => lon_grid.with_points(points),
            None => lon_grid,
        };
        debug!(width, height, crosses_antimeridian, "tie-point geo-coding");

        Ok(Self {
            lat_grid,
            lon_grid,
            width,
            height,
            crosses_antimeridian,
            datum,
            seeds: OnceLock::new(),
        })
    }

    pub fn lat_grid(&self) -> &TiePointGrid {
        &self.lat_grid
    }

    /// Longitude grid, unwrapped across the antimeridian if needed.
    pub fn lon_grid(&self) -> &TiePointGrid {
        &self.lon_grid
    }

    /// Number of points in the inverse approximation grid, building it if needed.
    pub fn seed_count(&self) -> usize {
        self.seeds().len()
    }

    pub fn has_inverse_approximation(&self) -> bool {
        self.seeds.get().is_some()
    }

    /// Latitude and unwrapped longitude at a pixel position, without range checks.
    #[inline]
    fn geo_at(&self, p: DVec2) -> DVec2 {
        DVec2::new(
            self.lon_grid.value_at(p.x, p.y),
            self.lat_grid.value_at(p.x, p.y),
        )
    }

    fn seeds(&self) -> &[Seed] {
        self.seeds.get_or_init(|| self.build_seeds())
    }

    fn build_seeds(&self) -> Vec<Seed> {
        let rect = PixelRect::of_size(self.width, self.height);
        let stepping = match Stepping::new(rect, INVERSE_SEED_POINTS) {
            Ok(stepping) => stepping,
            Err(err) => {
                warn!(%err, "cannot build inverse approximation grid");
                return Vec::new();
            }
        };
        let seeds: Vec<Seed> = stepping
            .points()
            .map(|(x, y)| {
                let pixel = DVec2::new(x as f64 + 0.5, y as f64 + 0.5);
                let geo = self.geo_at(pixel);
                Seed {
                    pixel,
                    lat: geo.y,
                    lon: normalize_lon(geo.x),
                }
            })
            .collect();
        debug!(
            seeds = seeds.len(),
            step_x = stepping.step_x(),
            step_y = stepping.step_y(),
            "built inverse approximation grid"
        );
        seeds
    }

    fn nearest_seed(&self, lat: f64, lon: f64) -> Option<Seed> {
        self.seeds()
            .iter()
            .map(|s| (angular_distance_sq(lat, lon, s.lat, s.lon), s))
            .filter(|(d, _)| !d.is_nan())
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, s)| *s)
    }

    /// Residual `(lon, lat)` of the forward transform at `p` against the target.
    #[inline]
    fn residual(&self, p: DVec2, lat: f64, lon: f64) -> DVec2 {
        let geo = self.geo_at(p);
        DVec2::new(lon_delta(geo.x, lon), geo.y - lat)
    }

    fn jacobian(&self, p: DVec2) -> DMat2 {
        let dx = DVec2::new(JACOBIAN_STEP, 0.0);
        let dy = DVec2::new(0.0, JACOBIAN_STEP);
        let diff = |a: DVec2, b: DVec2| {
            let (ga, gb) = (self.geo_at(a), self.geo_at(b));
            DVec2::new(lon_delta(ga.x, gb.x), ga.y - gb.y) / (2.0 * JACOBIAN_STEP)
        };
        DMat2::from_cols(diff(p + dx, p - dx), diff(p + dy, p - dy))
    }

    fn solve(&self, seed: DVec2, lat: f64, lon: f64) -> Option<DVec2> {
        let mut p = seed;
        for _ in 0..MAX_NEWTON_ITERATIONS {
            let r = self.residual(p, lat, lon);
            if r.length() < NEWTON_TOLERANCE {
                return Some(p);
            }
            let jacobian = self.jacobian(p);
            let det = jacobian.determinant();
            if det.abs() < 1e-15 || !det.is_finite() {
                warn!(x = p.x, y = p.y, "singular tie-point jacobian");
                return None;
            }
            p -= jacobian.inverse() * r;
            if !p.is_finite() {
                return None;
            }
        }
        (self.residual(p, lat, lon).length() < NEWTON_TOLERANCE).then_some(p)
    }
}

impl GeoCoding for TiePointGeoCoding {
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
        let geo = self.geo_at(DVec2::from(*pixel));
        GeoPos::with_datum(geo.y, normalize_lon(geo.x), self.datum.clone())
    }

    fn geo_to_pixel(&self, geo: &GeoPos) -> PixelPos {
        if !geo.is_valid() {
            return PixelPos::invalid();
        }
        let Some(seed) = self.nearest_seed(geo.lat, geo.lon) else {
            return PixelPos::invalid();
        };
        match self.solve(seed.pixel, geo.lat, geo.lon) {
            Some(p) => {
                let pixel = PixelPos::from(p);
                if in_raster(&pixel, self.width, self.height) {
                    pixel
                } else {
                    PixelPos::invalid()
                }
            }
            None => {
                debug!(lat = geo.lat, lon = geo.lon, "tie-point inverse did not converge");
                PixelPos::invalid()
            }
        }
    }

    fn crosses_antimeridian(&self) -> bool {
        self.crosses_antimeridian
    }

    fn datum(&self) -> &Datum {
        &self.datum
    }

    fn dispose(&mut self) {
        self.seeds.take();
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    /// 41x41 raster with a 5x5 grid every 10 pixels starting at the first pixel centre.
    fn grid(f: impl Fn(f64, f64) -> f64) -> TiePointGrid {
        let points = (0..25)
            .map(|k| f((k % 5) as f64, (k / 5) as f64) as f32)
            .collect();
        TiePointGrid::new(5, 5, 0.5, 0.5, 10.0, 10.0, points).unwrap()
    }

    fn skewed() -> TiePointGeoCoding {
        TiePointGeoCoding::new(
            grid(|i, j| 50.0 - j + 0.1 * i + 0.02 * i * j),
            grid(|i, j| 10.0 + i + 0.2 * j),
            41,
            41,
        )
        .unwrap()
    }

    #[test]
    fn bilinear_interpolation_hits_tie_points() {
        let g = grid(|i, j| i * 10.0 + j);
        assert_abs_diff_eq!(g.value_at(0.5, 0.5), 0.0);
        assert_abs_diff_eq!(g.value_at(20.5, 30.5), 23.0, epsilon = 1e-9);
        assert_abs_diff_eq!(g.value_at(25.5, 30.5), 28.0, epsilon = 1e-9);
        // linear extrapolation from the border cell
        assert_abs_diff_eq!(g.value_at(45.5, 0.5), 45.0, epsilon = 1e-9);
    }

    #[test]
    fn rejects_incompatible_grids() {
        let lat = grid(|_, j| j);
        let lon = TiePointGrid::new(5, 5, 0.5, 0.5, 8.0, 10.0, vec![0.0; 25]).unwrap();
        assert!(matches!(
            TiePointGeoCoding::new(lat, lon, 41, 41),
            Err(Error::InvalidConfig(_))
        ));
        assert!(TiePointGrid::new(1, 5, 0.0, 0.0, 1.0, 1.0, vec![0.0; 5]).is_err());
        assert!(TiePointGrid::new(2, 2, 0.0, 0.0, 1.0, 1.0, vec![0.0; 3]).is_err());
    }

    #[test]
    fn round_trip_within_tolerance() {
        let coding = skewed();
        assert!(!coding.crosses_antimeridian());
        for &(x, y) in &[(0.5, 0.5), (3.25, 7.75), (20.0, 20.0), (39.9, 12.1), (40.5, 40.5)] {
            let p = PixelPos::new(x, y);
            let geo = coding.pixel_to_geo(&p);
            assert!(geo.is_valid());
            let back = coding.geo_to_pixel(&geo);
            assert_abs_diff_eq!(back.x, x, epsilon = 1e-4);
            assert_abs_diff_eq!(back.y, y, epsilon = 1e-4);
        }
    }

    #[test]
    fn positions_outside_coverage_are_invalid() {
        let coding = skewed();
        assert!(!coding.geo_to_pixel(&GeoPos::new(-30.0, 100.0)).is_valid());
        assert!(!coding.pixel_to_geo(&PixelPos::new(41.5, 2.0)).is_valid());
    }

    #[test]
    fn antimeridian_grid_is_unwrapped() {
        let coding = TiePointGeoCoding::new(
            grid(|_, j| 10.0 - j),
            grid(|i, _| normalize_lon(178.0 + i)),
            41,
            41,
        )
        .unwrap();
        assert!(coding.crosses_antimeridian());
        assert_eq!(
            &coding.lon_grid().tie_points()[..5],
            &[178.0, 179.0, 180.0, 181.0, 182.0]
        );

        let geo = coding.pixel_to_geo(&PixelPos::new(25.5, 0.5));
        assert_abs_diff_eq!(geo.lon, -179.5, epsilon = 1e-9);

        let pixel = coding.geo_to_pixel(&GeoPos::new(8.0, -179.5));
        assert_abs_diff_eq!(pixel.x, 25.5, epsilon = 1e-4);
        assert_abs_diff_eq!(pixel.y, 20.5, epsilon = 1e-4);
    }

    #[test]
    fn west_jump_is_shifted_above_minus_180() {
        let lons = [-179.0f32, 179.0, 178.0, 177.0];
        let out = unwrap_longitudes(&lons, 2, 2).unwrap();
        assert_eq!(out, vec![181.0, 179.0, 178.0, 177.0]);
        assert!(unwrap_longitudes(&[1.0, 2.0, 3.0, 4.0], 2, 2).is_none());
    }

    #[test]
    fn dispose_drops_the_approximation() {
        let mut coding = skewed();
        assert!(!coding.has_inverse_approximation());
        assert!(coding.seed_count() <= INVERSE_SEED_POINTS);
        assert!(coding.has_inverse_approximation());
        coding.dispose();
        assert!(!coding.has_inverse_approximation());
    }
}
