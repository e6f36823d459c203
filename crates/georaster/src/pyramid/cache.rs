//! Per-`(node, level)` cache of computed pyramid levels.
//!
//! Each key owns a slot that is either empty or ready. The first caller for an empty slot
//! computes the level while holding the slot's guard; concurrent callers for the same key
//! wait on that guard and then read the stored result. Callers for other keys never
//! contend. Ready slots are read without taking the guard.
//!
//! Invalidation removes slots from the map. A computation still running on a removed
//! slot completes into the detached slot, so its result is never served to later callers.
//! A node's slots are removed one key at a time in ascending level order: level `L` is
//! built from level `L - 1`, so a slot created after `(id, L)` was removed can only read
//! levels that were already removed, and a slot created before is removed afterwards.
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use dashmap::DashMap;

use crate::error::Result;
use crate::pyramid::NodeId;
use crate::raster::RasterImage;

type Key = (NodeId, usize);

#[derive(Default)]
struct Slot {
    ready: OnceLock<Arc<RasterImage>>,
    guard: Mutex<()>,
}

/// Outcome of [`LevelCache::get_or_compute`].
pub(crate) struct Lookup {
    pub image: Arc<RasterImage>,
    /// Whether this call ran the computation.
    pub computed: bool,
}

pub(crate) struct LevelCache {
    slots: DashMap<Key, Arc<Slot>>,
    level_count: usize,
}

impl LevelCache {
    pub fn new(level_count: usize) -> Self {
        Self {
            slots: DashMap::new(),
            level_count,
        }
    }

    /// Cached level, if ready.
    #[cfg(test)]
    pub fn get(&self, id: NodeId, level: usize) -> Option<Arc<RasterImage>> {
        self.slots
            .get(&(id, level))
            .and_then(|slot| slot.ready.get().cloned())
    }

    pub fn get_or_compute<F>(&self, id: NodeId, level: usize, compute: F) -> Result<Lookup>
    where
        F: FnOnce() -> Result<RasterImage>,
    {
        let key = (id, level);
        // Never hold a map guard while computing: computations recurse into the cache.
        let slot = match self.slots.get(&key) {
            Some(slot) => Arc::clone(&slot),
            None => Arc::clone(&self.slots.entry(key).or_default()),
        };

        if let Some(image) = slot.ready.get() {
            return Ok(Lookup {
                image: Arc::clone(image),
                computed: false,
            });
        }

        let _guard = slot.guard.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(image) = slot.ready.get() {
            return Ok(Lookup {
                image: Arc::clone(image),
                computed: false,
            });
        }

        let image = Arc::new(compute()?);
        let image = Arc::clone(slot.ready.get_or_init(|| image));
        Ok(Lookup {
            image,
            computed: true,
        })
    }

    /// Drops every slot of `id`, lowest level first, returning how many held a ready level.
    pub fn invalidate(&self, id: NodeId) -> usize {
        (0..self.level_count)
            .filter_map(|level| self.slots.remove(&(id, level)))
            .filter(|(_, slot)| slot.ready.get().is_some())
            .count()
    }

    /// Ready levels of `id` in ascending order.
    pub fn cached_levels(&self, id: NodeId) -> Vec<usize> {
        let mut levels: Vec<usize> = self
            .slots
            .iter()
            .filter(|entry| entry.key().0 == id && entry.value().ready.get().is_some())
            .map(|entry| entry.key().1)
            .collect();
        levels.sort_unstable();
        levels
    }

    /// Number of ready levels across all nodes.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| entry.value().ready.get().is_some())
            .count()
    }

    pub fn clear(&self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    use super::*;
    use crate::error::Error;

    fn id(n: usize) -> NodeId {
        NodeId::from_index(n)
    }

    #[test]
    fn computes_once_then_hits() {
        let cache = LevelCache::new(4);
        let first = cache
            .get_or_compute(id(0), 0, || Ok(RasterImage::filled(2, 2, 1.0)))
            .unwrap();
        assert!(first.computed);
        let second = cache
            .get_or_compute(id(0), 0, || Err(Error::Other("must not run".into())))
            .unwrap();
        assert!(!second.computed);
        assert!(Arc::ptr_eq(&first.image, &second.image));
        assert_eq!(cache.cached_levels(id(0)), vec![0]);
    }

    #[test]
    fn failed_computation_leaves_slot_empty() {
        let cache = LevelCache::new(4);
        assert!(cache
            .get_or_compute(id(0), 1, || Err(Error::Other("boom".into())))
            .is_err());
        assert!(cache.get(id(0), 1).is_none());
        let retry = cache
            .get_or_compute(id(0), 1, || Ok(RasterImage::new(1, 1)))
            .unwrap();
        assert!(retry.computed);
    }

    #[test]
    fn invalidate_only_touches_one_node() {
        let cache = LevelCache::new(4);
        for (node, level) in [(0, 0), (0, 1), (1, 0)] {
            cache
                .get_or_compute(id(node), level, || Ok(RasterImage::new(1, 1)))
                .unwrap();
        }
        assert_eq!(cache.invalidate(id(0)), 2);
        assert!(cache.cached_levels(id(0)).is_empty());
        assert_eq!(cache.cached_levels(id(1)), vec![0]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn invalidate_drops_every_level() {
        let cache = LevelCache::new(4);
        for level in [3, 0, 2] {
            cache
                .get_or_compute(id(5), level, || Ok(RasterImage::new(1, 1)))
                .unwrap();
        }
        assert_eq!(cache.cached_levels(id(5)), vec![0, 2, 3]);
        assert_eq!(cache.invalidate(id(5)), 3);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn concurrent_first_access_computes_once() {
        let cache = LevelCache::new(4);
        let runs = AtomicUsize::new(0);
        let barrier = Barrier::new(8);
        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    barrier.wait();
                    cache
                        .get_or_compute(id(3), 2, || {
                            runs.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(std::time::Duration::from_millis(20));
                            Ok(RasterImage::filled(4, 4, 7.0))
                        })
                        .unwrap();
                });
            }
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get(id(3), 2).unwrap().data[0], 7.0);
    }
}
