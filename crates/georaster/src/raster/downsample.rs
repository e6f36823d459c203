//! Downsampling functions for generating pyramid levels.
//!
//! Each level halves the linear resolution of the previous one. Odd dimensions round up,
//! so the last column/row of a level is reduced from a partial block.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::raster::RasterImage;

/// Reduction used to combine a 2x2 block into one coarser pixel.
///
/// NaN samples are treated as no-data: they are skipped by `Mean` and `Max` and a block
/// with no valid sample yields NaN.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownsampleMethod {
    /// Average of the valid samples, for continuous quantities.
    #[default]
    Mean,
    /// Maximum of the valid samples, keeps peaks and mask coverage.
    Max,
    /// Upper-left sample of the block, keeps exact (categorical) values.
    Nearest,
}

/// Size of pyramid level `level` for a level-0 image of `width` x `height`.
pub fn level_size(width: usize, height: usize, level: usize) -> (usize, usize) {
    if level >= usize::BITS as usize {
        return (width.min(1), height.min(1));
    }
    let scale = 1usize << level;
    (width.div_ceil(scale), height.div_ceil(scale))
}

/// Downsample an image by a factor of 2 in both directions.
pub fn downsample_2x(src: &RasterImage, method: DownsampleMethod) -> RasterImage {
    let (width, height) = src.size();
    let (new_width, new_height) = level_size(width, height, 1);

    RasterImage::from_fn(new_width, new_height, |out_x, out_y| {
        let in_x = out_x * 2;
        let in_y = out_y * 2;
        let v00 = src.get(in_x, in_y).unwrap_or(f32::NAN);
        if method == DownsampleMethod::Nearest {
            return v00;
        }
        let block = [
            v00,
            src.get(in_x + 1, in_y).unwrap_or(f32::NAN),
            src.get(in_x, in_y + 1).unwrap_or(f32::NAN),
            src.get(in_x + 1, in_y + 1).unwrap_or(f32::NAN),
        ];
        match method {
            DownsampleMethod::Mean => mean_of_block(&block),
            DownsampleMethod::Max => max_of_block(&block),
            DownsampleMethod::Nearest => v00,
        }
    })
}

#[inline]
fn mean_of_block(values: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    let mut count = 0;
    for &v in values {
        if !v.is_nan() {
            sum += v;
            count += 1;
        }
    }
    if count == 0 {
        f32::NAN
    } else {
        sum / count as f32
    }
}

#[inline]
fn max_of_block(values: &[f32]) -> f32 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc: Option<f32>, v| Some(acc.map_or(v, |m| m.max(v))))
        .unwrap_or(f32::NAN)
}
