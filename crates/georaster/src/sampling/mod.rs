//! Sampling grids for approximating dense per-pixel computations.
//!
//! [`Stepping`] is used by the geo-codings to seed inverse searches and can be reused
//! by callers that warp or resample over a rectangle.
pub mod stepping;

pub use stepping::Stepping;

use crate::error::Result;
use crate::raster::PixelRect;

/// Computes the sampling grid for `rect` within `max_point_count` points.
///
/// Shorthand for [`Stepping::new`].
#[inline]
pub fn create_stepping(rect: PixelRect, max_point_count: usize) -> Result<Stepping> {
    Stepping::new(rect, max_point_count)
}
