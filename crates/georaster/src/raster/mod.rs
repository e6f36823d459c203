//! Raster storage primitives shared by the pyramid and the statistics accumulators.
//!
//! - [`PixelRect`]: integer pixel rectangles and tiling.
//! - [`RasterImage`]: a dense single-band `f32` image for one pyramid level.
//! - [`downsample_2x`]: power-of-two reduction used to build coarser levels.
pub mod downsample;
pub mod image;
pub mod rect;

pub use downsample::{downsample_2x, level_size, DownsampleMethod};
pub use image::RasterImage;
pub use rect::PixelRect;
