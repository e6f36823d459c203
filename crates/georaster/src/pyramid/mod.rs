//! Lazily computed multi-resolution rasters derived from other rasters.
//!
//! A [`RasterRegistry`] owns the rasters of one product. Stored bands hold pixel data;
//! derived nodes (expression bands, filter bands and masks) compute their pyramid levels
//! on first access and cache them per `(node, level)`. Every derived node is registered
//! as a dependent of the rasters it reads, and a content change on a raster invalidates
//! the cached levels of all its transitive dependents.
pub mod cache;
pub mod events;
pub mod expression;
pub mod kernel;
pub mod mask;
pub mod node;
pub mod registry;

use std::fmt;

pub use events::{EventSink, FnSink, RasterEvent, VecSink};
pub use expression::Expression;
pub use kernel::{FilterOp, GeneralFilter, Kernel};
pub use mask::{MaskSpec, Polygon};
pub use node::NodeType;
pub use registry::RasterRegistry;

/// Non-owning handle to a raster node of a [`RasterRegistry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
