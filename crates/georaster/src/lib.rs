#![forbid(unsafe_code)]
//! georaster: geocoding, lazily derived raster pyramids and tile-streamed statistics.
//!
//! Modules:
//! - geocoding: pixel <-> geographic transforms (affine, tie-point grids, per-pixel search)
//! - sampling: bounded regular sampling grids over pixel rectangles
//! - time: per-row acquisition time of scan-line products
//! - raster: pixel buffers, rectangles and 2x downsampling
//! - pyramid: raster registry with expression, filter and mask nodes and a per-level cache
//! - stx: histogram and summary statistics accumulated tile by tile
//!
//! The library logs through `tracing` and never installs a subscriber.
pub mod config;
pub mod error;
pub mod geocoding;
pub mod pyramid;
pub mod raster;
pub mod sampling;
pub mod stx;
pub mod time;

/// Convenient re-exports for common types. Import with `use georaster::prelude::*;`.
pub mod prelude {
    pub use crate::config::ImageConfig;
    pub use crate::error::{Error, Result};
    pub use crate::geocoding::{
        AffineGeoCoding, Datum, GeoCoding, GeoPos, GeoTransform, PixelGeoCoding, PixelPos,
        TiePointGeoCoding, TiePointGrid,
    };
    pub use crate::pyramid::{
        EventSink, Expression, FilterOp, FnSink, GeneralFilter, Kernel, MaskSpec, NodeId,
        NodeType, Polygon, RasterEvent, RasterRegistry, VecSink,
    };
    pub use crate::raster::{DownsampleMethod, PixelRect, RasterImage};
    pub use crate::sampling::{create_stepping, Stepping};
    pub use crate::stx::{
        accumulate_raster, accumulate_raster_parallel, HistogramStxOp, MergeStxOp, SampleData,
        Stx, StxOp, SummaryStxOp, Tile,
    };
    pub use crate::time::{LineTimeCoding, TimeSpan};
}
