//! Statistics accumulated over raster tiles.
//!
//! An [`StxOp`] ingests [`Tile`]s one after another. Operators that also implement
//! [`MergeStxOp`] can be accumulated in parallel over disjoint tiles and merged.
pub mod accumulate;
pub mod histogram;
pub mod summary;
pub mod tile;

pub use accumulate::{accumulate_raster, accumulate_raster_parallel};
pub use histogram::HistogramStxOp;
pub use summary::SummaryStxOp;
pub use tile::{SampleData, Tile, TileMask};

use crate::error::{Error, Result};
use crate::pyramid::{NodeId, RasterRegistry};

/// A running statistic fed tile by tile.
pub trait StxOp {
    fn name(&self) -> &'static str;

    /// Adds the valid samples of `tile`.
    fn accumulate(&mut self, tile: &Tile<'_>);
}

/// An [`StxOp`] whose partial results over disjoint tiles combine into the full result.
pub trait MergeStxOp: StxOp + Send + Sync + Sized {
    /// A fresh operator with the same parameters and nothing accumulated.
    fn empty_like(&self) -> Self;

    fn merge(&mut self, other: &Self) -> Result<()>;
}

/// Summary and histogram of a raster at full resolution.
#[derive(Clone, Debug)]
pub struct Stx {
    summary: SummaryStxOp,
    histogram: HistogramStxOp,
}

impl Stx {
    /// Computes the summary in a first pass, then a histogram of `num_bins` bins over
    /// `[min, max]` in a second pass. Constant rasters get the range `[v, v + 1]`.
    pub fn compute(
        registry: &RasterRegistry,
        node: NodeId,
        roi_mask: Option<NodeId>,
        num_bins: usize,
    ) -> Result<Self> {
        let mut summary = SummaryStxOp::new();
        accumulate_raster_parallel(registry, node, 0, roi_mask, &mut summary)?;
        let (Some(min), Some(max)) = (summary.min(), summary.max()) else {
            return Err(Error::Other(format!(
                "raster '{}' has no valid samples",
                registry.name(node)?
            )));
        };
        let high = if max > min { max } else { min + 1.0 };
        let mut histogram = HistogramStxOp::new(num_bins, min, high)?;
        accumulate_raster_parallel(registry, node, 0, roi_mask, &mut histogram)?;
        Ok(Self { summary, histogram })
    }

    pub fn sample_count(&self) -> u64 {
        self.summary.count()
    }

    pub fn min(&self) -> f64 {
        self.summary.min().unwrap_or(self.histogram.low())
    }

    pub fn max(&self) -> f64 {
        self.summary.max().unwrap_or(self.histogram.high())
    }

    pub fn mean(&self) -> f64 {
        self.summary.mean().unwrap_or(f64::NAN)
    }

    pub fn std_dev(&self) -> f64 {
        self.summary.std_dev().unwrap_or(f64::NAN)
    }

    pub fn summary(&self) -> &SummaryStxOp {
        &self.summary
    }

    pub fn histogram(&self) -> &HistogramStxOp {
        &self.histogram
    }
}
