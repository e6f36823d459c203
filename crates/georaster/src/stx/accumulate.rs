//! Feeding registry rasters to statistics operators tile by tile.
use rayon::prelude::*;
use tracing::debug;

use crate::error::Result;
use crate::pyramid::{NodeId, RasterRegistry};
use crate::raster::{PixelRect, RasterImage};
use crate::stx::{MergeStxOp, SampleData, StxOp, Tile};

/// Level `level` of `node` plus the validity bytes of `roi_mask`, ready to be tiled.
struct TiledLevel {
    image: std::sync::Arc<RasterImage>,
    mask: Option<Vec<u8>>,
    tiles: Vec<PixelRect>,
}

impl TiledLevel {
    fn load(
        registry: &RasterRegistry,
        node: NodeId,
        level: usize,
        roi_mask: Option<NodeId>,
    ) -> Result<Self> {
        let image = registry.get_image_level(node, level)?;
        // Every node has the registry's dimensions, so mask and raster levels align.
        let mask = match roi_mask {
            Some(mask) => Some(
                registry
                    .get_image_level(mask, level)?
                    .data
                    .iter()
                    .map(|v| u8::from(*v != 0.0 && !v.is_nan()))
                    .collect(),
            ),
            None => None,
        };
        let config = registry.config();
        let tiles = image.bounds().tiles(config.tile_width, config.tile_height);
        debug!(node = %node, level, tiles = tiles.len(), "accumulating raster");
        Ok(Self { image, mask, tiles })
    }

    fn tile(&self, rect: &PixelRect) -> Result<Tile<'_>> {
        let stride = self.image.width();
        let start = rect.y * stride + rect.x;
        let tile = Tile::with_stride(
            SampleData::F32(&self.image.data[start..]),
            rect.width,
            rect.height,
            stride,
        )?;
        match &self.mask {
            Some(mask) => tile.with_mask(&mask[start..], stride),
            None => Ok(tile),
        }
    }
}

/// Feeds level `level` of `node` to `op` tile by tile, skipping samples outside `roi_mask`.
///
/// Returns the number of tiles visited.
pub fn accumulate_raster<O: StxOp + ?Sized>(
    registry: &RasterRegistry,
    node: NodeId,
    level: usize,
    roi_mask: Option<NodeId>,
    op: &mut O,
) -> Result<usize> {
    let level = TiledLevel::load(registry, node, level, roi_mask)?;
    for rect in &level.tiles {
        op.accumulate(&level.tile(rect)?);
    }
    Ok(level.tiles.len())
}

/// Like [`accumulate_raster`], but tiles are accumulated on the rayon pool into partial
/// operators that are merged into `op`.
pub fn accumulate_raster_parallel<O: MergeStxOp>(
    registry: &RasterRegistry,
    node: NodeId,
    level: usize,
    roi_mask: Option<NodeId>,
    op: &mut O,
) -> Result<usize> {
    let level = TiledLevel::load(registry, node, level, roi_mask)?;
    let template = op.empty_like();
    let partial = level
        .tiles
        .par_iter()
        .try_fold(
            || template.empty_like(),
            |mut acc, rect| {
                acc.accumulate(&level.tile(rect)?);
                Ok::<_, crate::error::Error>(acc)
            },
        )
        .try_reduce(
            || template.empty_like(),
            |mut a, b| {
                a.merge(&b)?;
                Ok(a)
            },
        )?;
    op.merge(&partial)?;
    Ok(level.tiles.len())
}
