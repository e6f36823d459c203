//! Product-level collection of raster nodes with lazily computed pyramid levels.
//!
//! Typical usage:
//! - Create a [`RasterRegistry`] for the product dimensions.
//! - Register stored bands with [`RasterRegistry::add_band`] and derived nodes with
//!   [`RasterRegistry::add_virtual_band`], [`RasterRegistry::add_filter_band`] or
//!   [`RasterRegistry::add_mask`].
//! - Read levels with [`RasterRegistry::get_image_level`]; modify bands with
//!   [`RasterRegistry::write_pixels`], which invalidates every transitive dependent.
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use crate::config::ImageConfig;
use crate::error::{Error, Result};
use crate::pyramid::cache::LevelCache;
use crate::pyramid::events::{EventSink, RasterEvent};
use crate::pyramid::mask::{mask_value, rasterize};
use crate::pyramid::node::{MaskSource, Node, NodeKind, NodeType};
use crate::pyramid::{Expression, FilterOp, MaskSpec, NodeId};
use crate::raster::{downsample_2x, level_size, PixelRect, RasterImage};

/// Node arena plus the dependency table (node -> nodes that read it).
#[derive(Default)]
struct Graph {
    nodes: Vec<Option<Node>>,
    names: HashMap<String, NodeId>,
    dependents: HashMap<NodeId, BTreeSet<NodeId>>,
}

impl Graph {
    fn node(&self, id: NodeId) -> Result<&Node> {
        match self.nodes.get(id.index()) {
            Some(Some(node)) => Ok(node),
            Some(None) => Err(Error::Disposed(id)),
            None => Err(Error::UnknownNode(id)),
        }
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        match self.nodes.get_mut(id.index()) {
            Some(Some(node)) => Ok(node),
            Some(None) => Err(Error::Disposed(id)),
            None => Err(Error::UnknownNode(id)),
        }
    }

    fn resolve(&self, name: &str) -> Result<NodeId> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownRaster {
                name: name.to_owned(),
            })
    }

    fn resolve_all(&self, names: &[String]) -> Result<Vec<NodeId>> {
        names.iter().map(|name| self.resolve(name)).collect()
    }

    fn name_of(&self, id: NodeId) -> String {
        self.node(id)
            .map(|n| n.name.clone())
            .unwrap_or_else(|_| id.to_string())
    }

    fn insert(&mut self, node: Node) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.names.insert(node.name.clone(), id);
        self.subscribe(id, &node.dependencies);
        self.nodes.push(Some(node));
        id
    }

    fn subscribe(&mut self, id: NodeId, sources: &[NodeId]) {
        for source in sources {
            self.dependents.entry(*source).or_default().insert(id);
        }
    }

    fn unsubscribe(&mut self, id: NodeId, sources: &[NodeId]) {
        for source in sources {
            if let Some(set) = self.dependents.get_mut(source) {
                set.remove(&id);
                if set.is_empty() {
                    self.dependents.remove(source);
                }
            }
        }
    }

    fn direct_dependents(&self, id: NodeId) -> Vec<NodeId> {
        self.dependents
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// `id` and every transitive dependent, sources before the nodes reading them.
    fn downstream(&self, id: NodeId) -> Vec<NodeId> {
        let mut reached: HashSet<NodeId> = HashSet::from([id]);
        let mut queue = VecDeque::from([id]);
        while let Some(n) = queue.pop_front() {
            for d in self.direct_dependents(n) {
                if reached.insert(d) {
                    queue.push_back(d);
                }
            }
        }

        let mut indeg: HashMap<NodeId, usize> = reached
            .iter()
            .map(|n| {
                let inside = self
                    .node(*n)
                    .map(|node| {
                        node.dependencies
                            .iter()
                            .filter(|d| reached.contains(d))
                            .collect::<HashSet<_>>()
                            .len()
                    })
                    .unwrap_or(0);
                (*n, if *n == id { 0 } else { inside })
            })
            .collect();

        let mut ready: VecDeque<NodeId> = VecDeque::from([id]);
        let mut out = Vec::with_capacity(reached.len());
        while let Some(n) = ready.pop_front() {
            out.push(n);
            for d in self.direct_dependents(n) {
                if let Some(e) = indeg.get_mut(&d) {
                    *e = e.saturating_sub(1);
                    if *e == 0 {
                        indeg.remove(&d);
                        ready.push_back(d);
                    }
                }
            }
        }
        out
    }

    /// Whether `target` transitively depends on `source`.
    fn reaches(&self, source: NodeId, target: NodeId) -> bool {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([source]);
        while let Some(n) = queue.pop_front() {
            if n == target {
                return true;
            }
            if seen.insert(n) {
                queue.extend(self.direct_dependents(n));
            }
        }
        false
    }
}

/// Registry of the rasters of one product. All nodes share the product dimensions.
///
/// The registry is `Sync`: levels may be requested from many threads at once. At most one
/// computation runs per `(node, level)`; other callers for the same key wait for it, and
/// cached levels are returned without recomputation until an invalidation.
///
/// Event sinks must not call back into the registry.
pub struct RasterRegistry {
    width: usize,
    height: usize,
    level_count: usize,
    config: ImageConfig,
    graph: RwLock<Graph>,
    cache: LevelCache,
    sinks: Mutex<Vec<Box<dyn EventSink + Send>>>,
}

impl RasterRegistry {
    pub fn new(width: usize, height: usize) -> Result<Self> {
        Self::with_config(width, height, ImageConfig::default())
    }

    pub fn with_config(width: usize, height: usize, config: ImageConfig) -> Result<Self> {
        config.validate()?;
        if width == 0 || height == 0 {
            return Err(Error::InvalidConfig(
                "raster width and height must be > 0".into(),
            ));
        }
        let mut level_count = 1;
        let (mut w, mut h) = (width, height);
        while w > 1 || h > 1 {
            w = w.div_ceil(2);
            h = h.div_ceil(2);
            level_count += 1;
        }
        if let Some(cap) = config.max_levels {
            level_count = level_count.min(cap);
        }
        Ok(Self {
            width,
            height,
            level_count,
            config,
            graph: RwLock::new(Graph::default()),
            cache: LevelCache::new(level_count),
            sinks: Mutex::new(Vec::new()),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn config(&self) -> &ImageConfig {
        &self.config
    }

    /// Number of pyramid levels, level 0 being full resolution.
    pub fn level_count(&self) -> usize {
        self.level_count
    }

    /// Size of `level`: `ceil(width / 2^level) x ceil(height / 2^level)`.
    pub fn level_size(&self, level: usize) -> Result<(usize, usize)> {
        self.check_level(level)?;
        Ok(level_size(self.width, self.height, level))
    }

    /// Registers an event sink. Wrap it in `Arc<Mutex<_>>` to keep a handle.
    pub fn add_sink<S>(&self, sink: S)
    where
        S: EventSink + Send + 'static,
    {
        self.lock_sinks().push(Box::new(sink));
    }

    pub fn add_band(&self, name: &str, image: RasterImage) -> Result<NodeId> {
        if image.size() != (self.width, self.height) {
            return Err(Error::InvalidConfig(format!(
                "band '{name}' is {:?} but the product is {}x{}",
                image.size(),
                self.width,
                self.height
            )));
        }
        self.add_node(name, |_| {
            Ok((NodeKind::Band(Arc::new(RwLock::new(image))), Vec::new()))
        })
    }

    /// Adds a band computed from `expression`; its sources are the rasters it names.
    pub fn add_virtual_band(&self, name: &str, expression: &str) -> Result<NodeId> {
        let expression = Expression::parse(expression)?;
        self.add_node(name, |graph| {
            let deps = graph.resolve_all(expression.references())?;
            Ok((NodeKind::Virtual(Arc::new(expression)), deps))
        })
    }

    /// Adds a band that filters `source` at full resolution.
    pub fn add_filter_band(&self, name: &str, source: &str, op: FilterOp) -> Result<NodeId> {
        op.validate()?;
        self.add_node(name, |graph| {
            let source = graph.resolve(source)?;
            Ok((
                NodeKind::Filter {
                    source,
                    op: Arc::new(op),
                },
                vec![source],
            ))
        })
    }

    pub fn add_mask(&self, name: &str, spec: MaskSpec) -> Result<NodeId> {
        self.add_node(name, |graph| {
            let (mask, deps) = match spec {
                MaskSpec::Geometry(polygons) => (MaskSource::Geometry(polygons), Vec::new()),
                MaskSpec::Range { source, min, max } => {
                    if !(min <= max) {
                        return Err(Error::InvalidConfig(format!(
                            "mask range [{min}, {max}] is empty"
                        )));
                    }
                    let source = graph.resolve(&source)?;
                    (MaskSource::Range { source, min, max }, vec![source])
                }
                MaskSpec::Expression(source) => {
                    let expression = Expression::parse(&source)?;
                    let deps = graph.resolve_all(expression.references())?;
                    (MaskSource::Expression(expression), deps)
                }
            };
            Ok((NodeKind::Mask(Arc::new(mask)), deps))
        })
    }

    fn add_node<F>(&self, name: &str, build: F) -> Result<NodeId>
    where
        F: FnOnce(&Graph) -> Result<(NodeKind, Vec<NodeId>)>,
    {
        if name.trim().is_empty() {
            return Err(Error::InvalidConfig("raster name must not be empty".into()));
        }
        let (id, node_type) = {
            let mut graph = self.write_graph();
            if graph.names.contains_key(name) {
                return Err(Error::DuplicateRaster {
                    name: name.to_owned(),
                });
            }
            let (kind, deps) = build(&graph)?;
            let node_type = kind.node_type();
            (graph.insert(Node::new(name.to_owned(), kind, deps)), node_type)
        };
        info!(node = %id, name, ?node_type, "registered raster node");
        self.emit(RasterEvent::NodeAdded {
            id,
            name: name.to_owned(),
        });
        Ok(id)
    }

    /// Replaces the expression of a virtual band or expression mask and rebinds its sources.
    pub fn set_expression(&self, id: NodeId, expression: &str) -> Result<()> {
        let expression = Expression::parse(expression)?;
        {
            let mut graph = self.write_graph();
            let node = graph.node(id)?;
            let is_mask = match &node.kind {
                NodeKind::Virtual(_) => false,
                NodeKind::Mask(mask) if matches!(**mask, MaskSource::Expression(_)) => true,
                _ => {
                    return Err(Error::InvalidConfig(format!(
                        "raster '{}' is not expression based",
                        node.name
                    )))
                }
            };
            let deps = graph.resolve_all(expression.references())?;
            if let Some(dep) = deps.iter().find(|d| **d == id || graph.reaches(id, **d)) {
                return Err(Error::Cycle(format!(
                    "'{}' cannot read '{}'",
                    graph.name_of(id),
                    graph.name_of(*dep)
                )));
            }

            let old = std::mem::take(&mut graph.node_mut(id)?.dependencies);
            graph.unsubscribe(id, &old);
            graph.subscribe(id, &deps);
            let node = graph.node_mut(id)?;
            node.dependencies = deps;
            node.kind = if is_mask {
                NodeKind::Mask(Arc::new(MaskSource::Expression(expression)))
            } else {
                NodeKind::Virtual(Arc::new(expression))
            };
        }
        self.invalidate(id)?;
        Ok(())
    }

    /// Writes `samples` (row-major) into `rect` of a stored band and invalidates dependents.
    pub fn write_pixels(&self, id: NodeId, rect: PixelRect, samples: &[f32]) -> Result<()> {
        let data = {
            let graph = self.read_graph();
            let node = graph.node(id)?;
            match &node.kind {
                NodeKind::Band(data) => Arc::clone(data),
                _ => {
                    return Err(Error::ReadOnly {
                        name: node.name.clone(),
                    })
                }
            }
        };
        data.write()
            .unwrap_or_else(PoisonError::into_inner)
            .write_region(rect, samples)?;
        self.notify_content_changed(id)
    }

    /// Reports that the content of `id` changed, invalidating it and all its dependents.
    pub fn notify_content_changed(&self, id: NodeId) -> Result<()> {
        let name = self.read_graph().node(id)?.name.clone();
        debug!(node = %id, name, "content changed");
        self.emit(RasterEvent::ContentChanged { id, name });
        self.invalidate(id)?;
        Ok(())
    }

    /// Drops the cached levels of `id` and of every transitive dependent.
    ///
    /// Returns the invalidated nodes, sources before their dependents.
    pub fn invalidate(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let order: Vec<(NodeId, String)> = {
            let graph = self.read_graph();
            graph.node(id)?;
            graph
                .downstream(id)
                .into_iter()
                .map(|n| (n, graph.name_of(n)))
                .collect()
        };
        debug!(node = %id, fan_out = order.len(), "invalidating");
        for (n, name) in &order {
            let levels_dropped = self.cache.invalidate(*n);
            self.emit(RasterEvent::Invalidated {
                id: *n,
                name: name.clone(),
                levels_dropped,
            });
        }
        Ok(order.into_iter().map(|(n, _)| n).collect())
    }

    /// Removes a node that no other node depends on, unsubscribing it from its sources
    /// before its cached levels are released.
    pub fn dispose(&self, id: NodeId) -> Result<()> {
        let name = {
            let mut graph = self.write_graph();
            let node = graph.node(id)?;
            let dependents = graph.direct_dependents(id);
            if !dependents.is_empty() {
                return Err(Error::InUse {
                    name: node.name.clone(),
                    dependents: dependents.iter().map(|d| graph.name_of(*d)).collect(),
                });
            }
            let sources = node.dependencies.clone();
            let name = node.name.clone();
            graph.unsubscribe(id, &sources);
            graph.dependents.remove(&id);
            graph.names.remove(&name);
            graph.nodes[id.index()] = None;
            name
        };
        let levels_dropped = self.cache.invalidate(id);
        info!(node = %id, name, levels_dropped, "disposed raster node");
        self.emit(RasterEvent::NodeDisposed { id, name });
        Ok(())
    }

    /// Pyramid level `level` of `id`, computed on first access and cached.
    pub fn get_image_level(&self, id: NodeId, level: usize) -> Result<Arc<RasterImage>> {
        self.check_level(level)?;
        self.read_graph().node(id)?;
        let lookup = self
            .cache
            .get_or_compute(id, level, || self.compute_level(id, level))?;
        if lookup.computed {
            debug!(node = %id, level, "computed level");
            self.emit(RasterEvent::LevelComputed {
                id,
                level,
                size: lookup.image.size(),
            });
        }
        Ok(lookup.image)
    }

    fn compute_level(&self, id: NodeId, level: usize) -> Result<RasterImage> {
        let (kind, deps) = {
            let graph = self.read_graph();
            let node = graph.node(id)?;
            node.recomputes.fetch_add(1, Ordering::Relaxed);
            (node.kind.clone(), node.dependencies.clone())
        };

        match kind {
            NodeKind::Band(data) => {
                if level == 0 {
                    Ok(data.read().unwrap_or_else(PoisonError::into_inner).clone())
                } else {
                    self.downsample_previous(id, level)
                }
            }
            NodeKind::Filter { source, op } => {
                if level == 0 {
                    let source = self.get_image_level(source, 0)?;
                    Ok(op.apply(&source))
                } else {
                    self.downsample_previous(id, level)
                }
            }
            NodeKind::Virtual(expression) => self.evaluate(&expression, &deps, level),
            NodeKind::Mask(mask) => match &*mask {
                MaskSource::Geometry(polygons) => {
                    Ok(rasterize(polygons, self.width, self.height, level))
                }
                MaskSource::Range { source, min, max } => {
                    let mut image = (*self.get_image_level(*source, level)?).clone();
                    for v in &mut image.data {
                        let value = f64::from(*v);
                        *v = mask_value(value >= *min && value <= *max);
                    }
                    Ok(image)
                }
                MaskSource::Expression(expression) => {
                    let mut image = self.evaluate(expression, &deps, level)?;
                    for v in &mut image.data {
                        *v = mask_value(*v != 0.0 && !v.is_nan());
                    }
                    Ok(image)
                }
            },
        }
    }

    fn downsample_previous(&self, id: NodeId, level: usize) -> Result<RasterImage> {
        let previous = self.get_image_level(id, level - 1)?;
        Ok(downsample_2x(&previous, self.config.downsample))
    }

    fn evaluate(&self, expression: &Expression, deps: &[NodeId], level: usize) -> Result<RasterImage> {
        let sources = deps
            .iter()
            .map(|d| self.get_image_level(*d, level))
            .collect::<Result<Vec<_>>>()?;
        let (w, h) = level_size(self.width, self.height, level);
        let mut values = vec![0.0f64; sources.len()];
        Ok(RasterImage::from_fn(w, h, |x, y| {
            let index = y * w + x;
            for (value, source) in values.iter_mut().zip(&sources) {
                *value = f64::from(source.data[index]);
            }
            expression.eval(&values) as f32
        }))
    }

    fn check_level(&self, level: usize) -> Result<()> {
        if level >= self.level_count {
            return Err(Error::out_of_bounds("level", level as f64, self.level_count));
        }
        Ok(())
    }

    /// Number of level computations run for `id` so far.
    pub fn recompute_count(&self, id: NodeId) -> Result<usize> {
        Ok(self.read_graph().node(id)?.recompute_count())
    }

    /// Levels of `id` currently held in the cache.
    pub fn cached_levels(&self, id: NodeId) -> Result<Vec<usize>> {
        self.read_graph().node(id)?;
        Ok(self.cache.cached_levels(id))
    }

    /// Releases every cached level of every node.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.read_graph().names.get(name).copied()
    }

    pub fn name(&self, id: NodeId) -> Result<String> {
        Ok(self.read_graph().node(id)?.name.clone())
    }

    pub fn node_type(&self, id: NodeId) -> Result<NodeType> {
        Ok(self.read_graph().node(id)?.kind.node_type())
    }

    /// Expression source of a virtual band or expression mask.
    pub fn expression(&self, id: NodeId) -> Result<Option<String>> {
        let graph = self.read_graph();
        Ok(match &graph.node(id)?.kind {
            NodeKind::Virtual(expression) => Some(expression.source().to_owned()),
            NodeKind::Mask(mask) => match &**mask {
                MaskSource::Expression(expression) => Some(expression.source().to_owned()),
                _ => None,
            },
            _ => None,
        })
    }

    /// Sources `id` reads.
    pub fn dependencies(&self, id: NodeId) -> Result<Vec<NodeId>> {
        Ok(self.read_graph().node(id)?.dependencies.clone())
    }

    /// Nodes that read `id` directly.
    pub fn dependents(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let graph = self.read_graph();
        graph.node(id)?;
        Ok(graph.direct_dependents(id))
    }

    /// Live node handles in registration order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.read_graph()
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_some())
            .map(|(i, _)| NodeId::from_index(i))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read_graph().names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_graph(&self) -> RwLockReadGuard<'_, Graph> {
        self.graph.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_graph(&self) -> RwLockWriteGuard<'_, Graph> {
        self.graph.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_sinks(&self) -> std::sync::MutexGuard<'_, Vec<Box<dyn EventSink + Send>>> {
        self.sinks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: RasterEvent) {
        let mut sinks = self.lock_sinks();
        let Some((last, rest)) = sinks.split_last_mut() else {
            return;
        };
        for sink in rest {
            sink.send(event.clone());
        }
        last.send(event);
    }
}
