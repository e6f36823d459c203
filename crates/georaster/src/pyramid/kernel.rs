//! Neighbourhood filters applied to full-resolution raster data.
//!
//! Pixels outside the image are replaced by the nearest edge pixel.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::raster::RasterImage;

/// A convolution kernel with a key element (`x_origin`, `y_origin`) and a scale `factor`.
///
/// `out(x, y) = factor * sum k(i, j) * in(x + i - x_origin, y + j - y_origin)`
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Kernel {
    width: usize,
    height: usize,
    x_origin: usize,
    y_origin: usize,
    factor: f64,
    values: Vec<f64>,
}

impl Kernel {
    pub fn new(
        width: usize,
        height: usize,
        x_origin: usize,
        y_origin: usize,
        factor: f64,
        values: Vec<f64>,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidConfig("kernel size must be > 0".into()));
        }
        if x_origin >= width || y_origin >= height {
            return Err(Error::InvalidConfig(format!(
                "kernel origin ({x_origin}, {y_origin}) outside {width}x{height}"
            )));
        }
        if values.len() != width * height {
            return Err(Error::InvalidConfig(format!(
                "expected {} kernel values, got {}",
                width * height,
                values.len()
            )));
        }
        if !factor.is_finite() {
            return Err(Error::InvalidConfig("kernel factor must be finite".into()));
        }
        Ok(Self {
            width,
            height,
            x_origin,
            y_origin,
            factor,
            values,
        })
    }

    /// Centred kernel of odd size with factor 1.
    pub fn centered(width: usize, height: usize, values: Vec<f64>) -> Result<Self> {
        Self::new(width, height, width / 2, height / 2, 1.0, values)
    }

    /// Normalized `size` x `size` mean kernel.
    pub fn box_blur(size: usize) -> Result<Self> {
        let n = size * size;
        Self::new(size, size, size / 2, size / 2, 1.0 / n as f64, vec![1.0; n])
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn origin(&self) -> (usize, usize) {
        (self.x_origin, self.y_origin)
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    fn convolve(&self, src: &RasterImage) -> RasterImage {
        let (w, h) = src.size();
        let (ox, oy) = (self.x_origin as isize, self.y_origin as isize);
        RasterImage::from_fn(w, h, |x, y| {
            let mut sum = 0.0f64;
            for j in 0..self.height {
                let sy = y as isize + j as isize - oy;
                for i in 0..self.width {
                    let k = self.values[j * self.width + i];
                    if k == 0.0 {
                        continue;
                    }
                    let sx = x as isize + i as isize - ox;
                    sum += k * f64::from(src.get_clamped(sx, sy));
                }
            }
            (self.factor * sum) as f32
        })
    }
}

/// Order-statistic and moment filters over a rectangular window.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeneralFilter {
    Min,
    Max,
    Mean,
    Median,
    StdDev,
}

impl GeneralFilter {
    /// Reduces the valid (non-NaN) samples of a window; NaN if there are none.
    fn reduce(self, window: &mut [f64]) -> f64 {
        if window.is_empty() {
            return f64::NAN;
        }
        let n = window.len() as f64;
        match self {
            GeneralFilter::Min => window.iter().copied().fold(f64::INFINITY, f64::min),
            GeneralFilter::Max => window.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            GeneralFilter::Mean => window.iter().sum::<f64>() / n,
            GeneralFilter::Median => {
                window.sort_unstable_by(f64::total_cmp);
                let mid = window.len() / 2;
                if window.len() % 2 == 1 {
                    window[mid]
                } else {
                    0.5 * (window[mid - 1] + window[mid])
                }
            }
            GeneralFilter::StdDev => {
                let mean = window.iter().sum::<f64>() / n;
                let var = window.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
                var.sqrt()
            }
        }
    }
}

/// The operation of a filter band.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub enum FilterOp {
    Convolve(Kernel),
    General {
        kind: GeneralFilter,
        width: usize,
        height: usize,
    },
}

impl FilterOp {
    pub fn general(kind: GeneralFilter, width: usize, height: usize) -> Self {
        FilterOp::General {
            kind,
            width,
            height,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            // Kernel invariants hold by construction.
            FilterOp::Convolve(_) => Ok(()),
            FilterOp::General { width, height, .. } => {
                if *width == 0 || *height == 0 {
                    Err(Error::InvalidConfig("filter window must be > 0".into()))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Filters `src`, producing an image of the same size.
    pub fn apply(&self, src: &RasterImage) -> RasterImage {
        match self {
            FilterOp::Convolve(kernel) => kernel.convolve(src),
            FilterOp::General {
                kind,
                width,
                height,
            } => {
                let (w, h) = src.size();
                let (ox, oy) = ((width / 2) as isize, (height / 2) as isize);
                let mut window = Vec::with_capacity(width * height);
                RasterImage::from_fn(w, h, |x, y| {
                    window.clear();
                    for j in 0..*height as isize {
                        for i in 0..*width as isize {
                            let v = src.get_clamped(x as isize + i - ox, y as isize + j - oy);
                            if !v.is_nan() {
                                window.push(f64::from(v));
                            }
                        }
                    }
                    kind.reduce(&mut window) as f32
                })
            }
        }
    }
}
