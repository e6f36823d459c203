//! Mask definitions and rasterization of vector geometry.
//!
//! Mask samples are `1.0` inside and `0.0` outside.
use glam::DVec2;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::raster::{level_size, RasterImage};

/// A closed ring in level-0 pixel coordinates. Pixels are inside when their centre is,
/// following the even-odd rule.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Polygon {
    vertices: Vec<DVec2>,
}

impl Polygon {
    pub fn new(vertices: Vec<DVec2>) -> Result<Self> {
        if vertices.len() < 3 {
            return Err(Error::InvalidConfig(format!(
                "polygon needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }
        if vertices.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidConfig("polygon vertices must be finite".into()));
        }
        Ok(Self { vertices })
    }

    /// Axis-aligned rectangle with corners `min` and `max`.
    pub fn rectangle(min: DVec2, max: DVec2) -> Result<Self> {
        Self::new(vec![
            min,
            DVec2::new(max.x, min.y),
            max,
            DVec2::new(min.x, max.y),
        ])
    }

    pub fn vertices(&self) -> &[DVec2] {
        &self.vertices
    }

    /// Even-odd point-in-polygon test.
    pub fn contains(&self, p: DVec2) -> bool {
        let mut inside = false;
        let n = self.vertices.len();
        let mut j = n - 1;
        for i in 0..n {
            let (a, b) = (self.vertices[i], self.vertices[j]);
            if (a.y > p.y) != (b.y > p.y) {
                let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if p.x < x {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    fn bounds(&self) -> (DVec2, DVec2) {
        self.vertices.iter().fold(
            (DVec2::splat(f64::INFINITY), DVec2::splat(f64::NEG_INFINITY)),
            |(lo, hi), v| (lo.min(*v), hi.max(*v)),
        )
    }
}

/// How a mask node derives its samples.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub enum MaskSpec {
    /// Inside any of the polygons.
    Geometry(Vec<Polygon>),
    /// `min <= source <= max`; NaN samples are outside.
    Range { source: String, min: f64, max: f64 },
    /// Non-zero, non-NaN results of a band-arithmetic expression.
    Expression(String),
}

impl MaskSpec {
    pub fn range(source: impl Into<String>, min: f64, max: f64) -> Self {
        MaskSpec::Range {
            source: source.into(),
            min,
            max,
        }
    }

    pub fn expression(source: impl Into<String>) -> Self {
        MaskSpec::Expression(source.into())
    }
}

#[inline]
pub(crate) fn mask_value(inside: bool) -> f32 {
    if inside {
        1.0
    } else {
        0.0
    }
}

/// Rasterizes `polygons` at pyramid `level` of a `width` x `height` level-0 raster.
pub(crate) fn rasterize(
    polygons: &[Polygon],
    width: usize,
    height: usize,
    level: usize,
) -> RasterImage {
    let (w, h) = level_size(width, height, level);
    let scale = (1u64 << level.min(63)) as f64;
    let mut out = RasterImage::new(w, h);
    for polygon in polygons {
        let (lo, hi) = polygon.bounds();
        let x0 = ((lo.x / scale - 0.5).floor().max(0.0) as usize).min(w);
        let y0 = ((lo.y / scale - 0.5).floor().max(0.0) as usize).min(h);
        let x1 = ((hi.x / scale + 0.5).ceil().max(0.0) as usize).min(w);
        let y1 = ((hi.y / scale + 0.5).ceil().max(0.0) as usize).min(h);
        for y in y0..y1 {
            for x in x0..x1 {
                let centre = DVec2::new(x as f64 + 0.5, y as f64 + 0.5) * scale;
                if polygon.contains(centre) {
                    out.set(x, y, 1.0);
                }
            }
        }
    }
    out
}
