//! Raster nodes held by the registry.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::pyramid::{Expression, FilterOp, NodeId, Polygon};
use crate::raster::RasterImage;

/// Kind of a registered node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// Stored pixel data, writable.
    Band,
    /// Computed from a band-arithmetic expression.
    Virtual,
    /// A filter applied to another raster.
    Filter,
    /// A 1.0/0.0 mask.
    Mask,
}

impl NodeType {
    pub fn is_derived(self) -> bool {
        self != NodeType::Band
    }
}

/// Mask definition with source names resolved to nodes.
#[derive(Debug)]
pub(crate) enum MaskSource {
    Geometry(Vec<Polygon>),
    Range { source: NodeId, min: f64, max: f64 },
    Expression(Expression),
}

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    Band(Arc<RwLock<RasterImage>>),
    Virtual(Arc<Expression>),
    Filter { source: NodeId, op: Arc<FilterOp> },
    Mask(Arc<MaskSource>),
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Band(_) => NodeType::Band,
            NodeKind::Virtual(_) => NodeType::Virtual,
            NodeKind::Filter { .. } => NodeType::Filter,
            NodeKind::Mask(_) => NodeType::Mask,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Node {
    pub name: String,
    pub kind: NodeKind,
    /// Sources this node reads, in the order its computation binds them.
    pub dependencies: Vec<NodeId>,
    pub recomputes: Arc<AtomicUsize>,
}

impl Node {
    pub fn new(name: String, kind: NodeKind, dependencies: Vec<NodeId>) -> Self {
        Self {
            name,
            kind,
            dependencies,
            recomputes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn recompute_count(&self) -> usize {
        self.recomputes.load(Ordering::Relaxed)
    }
}
