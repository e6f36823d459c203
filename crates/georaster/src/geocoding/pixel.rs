//! Geo-coding backed by per-pixel latitude and longitude rasters.
//!
//! The forward transform is a lookup of the pixel containing the position. The inverse
//! starts from the nearest point of a coarse [`Stepping`] grid and then searches a window
//! around it for the pixel whose geolocation is closest, re-centering the window up to
//! [`MAX_SEARCH_CYCLES`] times while the best pixel lies on the window border.
use std::sync::OnceLock;

use tracing::debug;

use crate::error::{Error, Result};
use crate::geocoding::{
    angular_distance_sq, in_raster, Datum, GeoCoding, GeoPos, PixelPos, INVERSE_SEED_POINTS,
};
use crate::raster::{PixelRect, RasterImage};
use crate::sampling::Stepping;

pub const MAX_SEARCH_CYCLES: usize = 10;
const MIN_SEARCH_RADIUS: usize = 2;

#[derive(Debug, Clone, Copy)]
struct Seed {
    x: usize,
    y: usize,
    lat: f64,
    lon: f64,
}

/// Pixel-search geo-coding over a latitude and a longitude raster of equal size.
///
/// NaN samples mark pixels without geolocation; they map to the invalid [`GeoPos`] and
/// are never returned by the inverse search.
#[derive(Debug)]
pub struct PixelGeoCoding {
    lats: RasterImage,
    lons: RasterImage,
    search_radius: usize,
    delta_threshold: f64,
    crosses_antimeridian: bool,
    datum: Datum,
    stepping: Stepping,
    seeds: OnceLock<Vec<Seed>>,
}

impl PixelGeoCoding {
    /// Builds the coding with a search radius equal to the coarsest seed-grid step.
    pub fn new(lats: RasterImage, lons: RasterImage) -> Result<Self> {
        Self::build(lats, lons, None, Datum::WGS84)
    }

    /// Builds the coding with an explicit search radius in pixels (at least 2).
    pub fn with_search_radius(lats: RasterImage, lons: RasterImage, radius: usize) -> Result<Self> {
        if radius < MIN_SEARCH_RADIUS {
            return Err(Error::InvalidConfig(format!(
                "search radius must be >= {MIN_SEARCH_RADIUS}, got {radius}"
            )));
        }
        Self::build(lats, lons, Some(radius), Datum::WGS84)
    }

    pub fn with_datum(mut self, datum: Datum) -> Self {
        self.datum = datum;
        self
    }

    fn build(
        lats: RasterImage,
        lons: RasterImage,
        radius: Option<usize>,
        datum: Datum,
    ) -> Result<Self> {
        if lats.size() != lons.size() {
            return Err(Error::InvalidConfig(format!(
                "latitude raster is {:?} but longitude raster is {:?}",
                lats.size(),
                lons.size()
            )));
        }
        let (width, height) = lats.size();
        if width == 0 || height == 0 {
            return Err(Error::InvalidConfig(
                "raster width and height must be > 0".into(),
            ));
        }

        let stepping = Stepping::new(PixelRect::of_size(width, height), INVERSE_SEED_POINTS)?;
        let search_radius = radius
            .unwrap_or_else(|| stepping.step_x().max(stepping.step_y()))
            .max(MIN_SEARCH_RADIUS);
        let delta_threshold = 2.0 * mean_pixel_spacing(&lats, &lons, &stepping);
        let crosses_antimeridian = has_longitude_jump(&lons);

        debug!(
            width,
            height, search_radius, delta_threshold, crosses_antimeridian, "pixel geo-coding"
        );

        Ok(Self {
            lats,
            lons,
            search_radius,
            delta_threshold,
            crosses_antimeridian,
            datum,
            stepping,
            seeds: OnceLock::new(),
        })
    }

    pub fn width(&self) -> usize {
        self.lats.width()
    }

    pub fn height(&self) -> usize {
        self.lats.height()
    }

    pub fn search_radius(&self) -> usize {
        self.search_radius
    }

    /// Largest accepted angular distance in degrees between a target and the best pixel.
    pub fn delta_threshold(&self) -> f64 {
        self.delta_threshold
    }

    #[inline]
    fn geo_at(&self, x: usize, y: usize) -> Option<(f64, f64)> {
        let lat = f64::from(self.lats.get(x, y)?);
        let lon = f64::from(self.lons.get(x, y)?);
        (!lat.is_nan() && !lon.is_nan()).then_some((lat, lon))
    }

    fn seeds(&self) -> &[Seed] {
        self.seeds.get_or_init(|| {
            let seeds: Vec<Seed> = self
                .stepping
                .points()
                .filter_map(|(x, y)| {
                    let (lat, lon) = self.geo_at(x, y)?;
                    Some(Seed { x, y, lat, lon })
                })
                .collect();
            debug!(seeds = seeds.len(), "built pixel search seeds");
            seeds
        })
    }

    fn nearest_seed(&self, lat: f64, lon: f64) -> Option<(usize, usize)> {
        self.seeds()
            .iter()
            .map(|s| (angular_distance_sq(lat, lon, s.lat, s.lon), s))
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, s)| (s.x, s.y))
    }

    /// Best pixel within the search window centred on `(x0, y0)` and its squared distance.
    fn find_best_pixel(&self, x0: usize, y0: usize, lat: f64, lon: f64) -> (usize, usize, f64) {
        let r = self.search_radius;
        let x1 = x0.saturating_sub(r);
        let y1 = y0.saturating_sub(r);
        let x2 = (x0 + r).min(self.width() - 1);
        let y2 = (y0 + r).min(self.height() - 1);

        let mut best = (x0, y0, f64::INFINITY);
        for y in y1..=y2 {
            for x in x1..=x2 {
                let Some((plat, plon)) = self.geo_at(x, y) else {
                    continue;
                };
                let delta = angular_distance_sq(lat, lon, plat, plon);
                if delta < best.2 {
                    best = (x, y, delta);
                }
            }
        }
        best
    }

    fn on_search_border(&self, x0: usize, y0: usize, x: usize, y: usize) -> bool {
        let limit = self.search_radius.saturating_sub(2);
        x.abs_diff(x0) > limit || y.abs_diff(y0) > limit
    }
}

/// Mean angular distance between horizontally and vertically adjacent pixels.
fn mean_pixel_spacing(lats: &RasterImage, lons: &RasterImage, stepping: &Stepping) -> f64 {
    let geo = |x: usize, y: usize| {
        let lat = f64::from(lats.get(x, y)?);
        let lon = f64::from(lons.get(x, y)?);
        (!lat.is_nan() && !lon.is_nan()).then_some((lat, lon))
    };
    let mut sum = 0.0;
    let mut count = 0usize;
    for (x, y) in stepping.points() {
        let Some((lat0, lon0)) = geo(x, y) else {
            continue;
        };
        for (nx, ny) in [(x + 1, y), (x, y + 1)] {
            if let Some((lat, lon)) = geo(nx, ny) {
                sum += angular_distance_sq(lat0, lon0, lat, lon).sqrt();
                count += 1;
            }
        }
    }
    if count == 0 {
        f64::INFINITY
    } else {
        sum / count as f64
    }
}

fn has_longitude_jump(lons: &RasterImage) -> bool {
    let (width, height) = lons.size();
    (0..height).any(|y| {
        (1..width).any(|x| match (lons.get(x - 1, y), lons.get(x, y)) {
            (Some(a), Some(b)) => (b - a).abs() > 180.0,
            _ => false,
        })
    })
}

impl GeoCoding for PixelGeoCoding {
    fn can_get_geo_pos(&self) -> bool {
        true
    }

    fn can_get_pixel_pos(&self) -> bool {
        true
    }

    fn pixel_to_geo(&self, pixel: &PixelPos) -> GeoPos {
        if !in_raster(pixel, self.width(), self.height()) {
            return GeoPos::invalid();
        }
        let x = (pixel.x.floor() as usize).min(self.width() - 1);
        let y = (pixel.y.floor() as usize).min(self.height() - 1);
        match self.geo_at(x, y) {
            Some((lat, lon)) => GeoPos::with_datum(lat, lon, self.datum.clone()),
            None => GeoPos::invalid(),
        }
    }

    fn geo_to_pixel(&self, geo: &GeoPos) -> PixelPos {
        if !geo.is_valid() {
            return PixelPos::invalid();
        }
        let Some((mut x, mut y)) = self.nearest_seed(geo.lat, geo.lon) else {
            return PixelPos::invalid();
        };

        let mut min_delta;
        let mut cycles = 0;
        loop {
            let (bx, by, delta) = self.find_best_pixel(x, y, geo.lat, geo.lon);
            min_delta = delta;
            let moved = (bx, by) != (x, y);
            let on_border = self.on_search_border(x, y, bx, by);
            (x, y) = (bx, by);
            cycles += 1;
            if cycles >= MAX_SEARCH_CYCLES || !moved || !on_border {
                break;
            }
        }

        if min_delta.sqrt() < self.delta_threshold {
            PixelPos::new(x as f64 + 0.5, y as f64 + 0.5)
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

    fn dispose(&mut self) {
        self.seeds.take();
    }
}
