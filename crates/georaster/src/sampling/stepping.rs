//! Regular sub-sampling grids used to approximate dense coordinate transforms.
//!
//! A [`Stepping`] describes the coarsest regular grid over a pixel rectangle that stays
//! within a point budget while always sampling the rectangle's first and last column
//! and row. Piecewise reconstructions built on it never extrapolate past the corners.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::raster::PixelRect;

/// Immutable sampling grid descriptor over a pixel rectangle.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Stepping {
    min_x: usize,
    min_y: usize,
    max_x: usize,
    max_y: usize,
    point_count_x: usize,
    point_count_y: usize,
    step_x: usize,
    step_y: usize,
}

impl Stepping {
    /// Computes the sampling grid for `rect` using at most `max_point_count` points.
    ///
    /// Steps grow alternately along X and Y (X first) until the grid fits the budget.
    /// An axis whose step already spans its extent stops growing. When even the coarsest
    /// grid exceeds the budget (e.g. a budget of 1 for a 2D rectangle), the border
    /// guarantee wins and the coarsest grid is returned.
    pub fn new(rect: PixelRect, max_point_count: usize) -> Result<Self> {
        if max_point_count < 1 {
            return Err(Error::InvalidConfig(
                "max_point_count must be >= 1".into(),
            ));
        }

        let (sw, sh) = (rect.width, rect.height);
        let mut step_x = 1;
        let mut step_y = 1;
        let mut count_x = axis_point_count(sw, step_x);
        let mut count_y = axis_point_count(sh, step_y);
        let mut grow_x = true;

        while count_x * count_y > max_point_count {
            let x_open = step_x < sw;
            let y_open = step_y < sh;
            if !x_open && !y_open {
                debug!(
                    ?rect,
                    max_point_count, "stepping budget below the coarsest border-covering grid"
                );
                break;
            }
            if (grow_x && x_open) || !y_open {
                step_x += 1;
                count_x = axis_point_count(sw, step_x);
            } else {
                step_y += 1;
                count_y = axis_point_count(sh, step_y);
            }
            grow_x = !grow_x;
        }

        Ok(Self {
            min_x: rect.x,
            min_y: rect.y,
            max_x: rect.x + sw.saturating_sub(1),
            max_y: rect.y + sh.saturating_sub(1),
            point_count_x: count_x,
            point_count_y: count_y,
            step_x,
            step_y,
        })
    }

    pub fn min_x(&self) -> usize {
        self.min_x
    }

    pub fn min_y(&self) -> usize {
        self.min_y
    }

    pub fn max_x(&self) -> usize {
        self.max_x
    }

    pub fn max_y(&self) -> usize {
        self.max_y
    }

    pub fn point_count_x(&self) -> usize {
        self.point_count_x
    }

    pub fn point_count_y(&self) -> usize {
        self.point_count_y
    }

    pub fn step_x(&self) -> usize {
        self.step_x
    }

    pub fn step_y(&self) -> usize {
        self.step_y
    }

    /// Total number of grid points.
    pub fn point_count(&self) -> usize {
        self.point_count_x * self.point_count_y
    }

    /// X coordinate of grid column `i`, the last column being clamped to `max_x`.
    #[inline]
    pub fn x_at(&self, i: usize) -> usize {
        (self.min_x + i * self.step_x).min(self.max_x)
    }

    /// Y coordinate of grid row `j`, the last row being clamped to `max_y`.
    #[inline]
    pub fn y_at(&self, j: usize) -> usize {
        (self.min_y + j * self.step_y).min(self.max_y)
    }

    /// Iterates the grid points in row-major order.
    pub fn points(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.point_count_y)
            .flat_map(move |j| (0..self.point_count_x).map(move |i| (self.x_at(i), self.y_at(j))))
    }
}

/// Points along one axis of extent `size` for step `step`, including the far border.
fn axis_point_count(size: usize, step: usize) -> usize {
    if size <= 1 {
        return 1;
    }
    let mut count = size / step + 1;
    if size % step != 0 {
        count += 1;
    }
    count.max(1)
}
