//! Change notifications raised by a [`crate::pyramid::RasterRegistry`].
//!
//! Sinks are registered with [`crate::pyramid::RasterRegistry::add_sink`]; every registered
//! sink receives every event, in the order the registry raised them.
use std::sync::{Arc, Mutex, PoisonError};

use crate::pyramid::NodeId;

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum RasterEvent {
    NodeAdded { id: NodeId, name: String },

    /// The stored content of a node was reported as changed.
    ContentChanged { id: NodeId, name: String },

    /// Raised once per node reached by an invalidation, sources first.
    Invalidated {
        id: NodeId,
        name: String,
        levels_dropped: usize,
    },

    /// A level was computed; cache hits raise nothing.
    LevelComputed {
        id: NodeId,
        level: usize,
        size: (usize, usize),
    },

    /// The node was removed and unsubscribed from its sources.
    NodeDisposed { id: NodeId, name: String },
}

impl RasterEvent {
    /// Node the event is about.
    pub fn node(&self) -> NodeId {
        match self {
            RasterEvent::NodeAdded { id, .. }
            | RasterEvent::ContentChanged { id, .. }
            | RasterEvent::Invalidated { id, .. }
            | RasterEvent::LevelComputed { id, .. }
            | RasterEvent::NodeDisposed { id, .. } => *id,
        }
    }
}

/// Receiver of [`RasterEvent`]s. Sinks run on the thread that raised the event and must
/// not call back into the registry.
pub trait EventSink {
    fn send(&mut self, event: RasterEvent);
}

/// Lets a caller keep a handle on a sink after handing it to the registry.
impl<S: EventSink> EventSink for Arc<Mutex<S>> {
    fn send(&mut self, event: RasterEvent) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(event);
    }
}

/// Forwards events to a closure.
pub struct FnSink<F>
where
    F: FnMut(RasterEvent),
{
    f: F,
}

impl<F> FnSink<F>
where
    F: FnMut(RasterEvent),
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> EventSink for FnSink<F>
where
    F: FnMut(RasterEvent),
{
    #[inline]
    fn send(&mut self, event: RasterEvent) {
        (self.f)(event);
    }
}

/// Records events in arrival order.
#[derive(Debug, Default)]
pub struct VecSink {
    events: Vec<RasterEvent>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_inner(self) -> Vec<RasterEvent> {
        self.events
    }

    pub fn as_slice(&self) -> &[RasterEvent] {
        &self.events
    }

    /// Recorded events about `id`.
    pub fn for_node(&self, id: NodeId) -> impl Iterator<Item = &RasterEvent> + '_ {
        self.events.iter().filter(move |e| e.node() == id)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSink for VecSink {
    #[inline]
    fn send(&mut self, event: RasterEvent) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn added(n: usize) -> RasterEvent {
        RasterEvent::NodeAdded {
            id: NodeId::from_index(n),
            name: format!("band{n}"),
        }
    }

    #[test]
    fn vec_sink_filters_by_node() {
        let mut sink = VecSink::new();
        sink.send(added(0));
        sink.send(added(1));
        sink.send(RasterEvent::LevelComputed {
            id: NodeId::from_index(1),
            level: 2,
            size: (4, 4),
        });
        assert_eq!(sink.for_node(NodeId::from_index(1)).count(), 2);
        assert_eq!(sink.as_slice()[0], added(0));
        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn fn_sink_sees_every_event() {
        let mut levels = Vec::new();
        let mut sink = FnSink::new(|event| {
            if let RasterEvent::LevelComputed { level, .. } = event {
                levels.push(level);
            }
        });
        sink.send(added(0));
        sink.send(RasterEvent::LevelComputed {
            id: NodeId::from_index(0),
            level: 3,
            size: (1, 1),
        });
        drop(sink);
        assert_eq!(levels, vec![3]);
    }

    #[test]
    fn shared_sink_stays_inspectable() {
        let shared = Arc::new(Mutex::new(VecSink::new()));
        let mut handle = Arc::clone(&shared);
        handle.send(added(7));
        assert_eq!(shared.lock().unwrap().len(), 1);
    }
}
