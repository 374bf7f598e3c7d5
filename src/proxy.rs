//! Proxy wrapper expressing infeasible counterfactual caches.
//!
//! A [`PipelineCacheProxy`] is a [`PipelineCache`] plus a `dummy` flag. The
//! adaptive layer keeps one proxy per candidate quantum shift; when a shift
//! would drain a block below one quantum, the proxy is marked dummy instead
//! of being special-cased at the comparison site. A dummy proxy absorbs all
//! operations as no-ops and reports an infinite timeframe cost, so it loses
//! every cost comparison.

use crate::block::Entry;
use crate::cache::PipelineCache;
use crate::error::{ConfigError, InvariantError};

/// A pipeline cache that can be switched into an inert "dummy" mode.
#[derive(Debug)]
pub struct PipelineCacheProxy {
    cache: PipelineCache,
    dummy: bool,
}

impl PipelineCacheProxy {
    /// Creates a non-dummy proxy over a fresh cache with the given layout.
    pub fn try_new(capacity: usize, quantum_size: usize) -> Result<Self, ConfigError> {
        Ok(Self {
            cache: PipelineCache::try_new(capacity, quantum_size)?,
            dummy: false,
        })
    }

    /// Returns `true` while the proxy is inert.
    #[inline]
    pub fn is_dummy(&self) -> bool {
        self.dummy
    }

    /// Marks the proxy inert. All mutating operations become no-ops and the
    /// timeframe cost reads as +∞.
    pub fn make_dummy(&mut self) {
        self.dummy = true;
    }

    /// Reactivates the proxy. Only valid immediately after `assign_from`
    /// seeded it from a live cache.
    pub fn make_non_dummy(&mut self) {
        self.dummy = false;
    }

    /// Forwards to [`PipelineCache::insert_item`]; no-op when dummy.
    pub fn insert_item(&mut self, key: u64, latency: f64, tokens: u64) -> Option<(f64, u64)> {
        if self.dummy {
            return None;
        }
        self.cache.insert_item(key, latency, tokens)
    }

    /// Replays a lookup for its timestamp side effect. Returns `None` when
    /// dummy or when the key is not present in this proxy's cache (mirrored
    /// caches evict independently, so absence here is routine).
    pub fn get_item(&mut self, key: u64) -> Option<Entry> {
        if self.dummy || !self.cache.contains(key) {
            return None;
        }
        Some(self.cache.get_item(key))
    }

    /// Returns `false` when dummy.
    #[inline]
    pub fn contains(&self, key: u64) -> bool {
        !self.dummy && self.cache.contains(key)
    }

    /// Returns `false` when dummy.
    #[inline]
    pub fn should_evict(&self) -> bool {
        !self.dummy && self.cache.should_evict()
    }

    /// Forwards to [`PipelineCache::evict_item`]; no-op when dummy.
    pub fn evict_item(&mut self) -> Option<Entry> {
        if self.dummy {
            return None;
        }
        Some(self.cache.evict_item())
    }

    /// Returns +∞ when dummy, so a dummy loses every cost comparison.
    pub fn get_timeframe_aggregated_cost(&self) -> f64 {
        if self.dummy {
            f64::INFINITY
        } else {
            self.cache.get_timeframe_aggregated_cost()
        }
    }

    /// Zeroes the underlying accumulator, dummy or not.
    pub fn reset_timeframe_stats(&mut self) {
        self.cache.reset_timeframe_stats();
    }

    /// Returns `false` when dummy.
    pub fn can_adapt(&self, src: usize, dst: usize) -> bool {
        !self.dummy && self.cache.can_adapt(src, dst)
    }

    /// Forwards to [`PipelineCache::move_quantum`]; no-op when dummy.
    pub fn move_quantum(&mut self, src: usize, dst: usize) {
        if self.dummy {
            return;
        }
        self.cache.move_quantum(src, dst);
    }

    /// Returns 0 when dummy.
    pub fn len(&self) -> usize {
        if self.dummy { 0 } else { self.cache.len() }
    }

    /// Returns `true` when dummy.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total capacity of the underlying cache (layout is a property of the
    /// cache, not of the dummy state).
    #[inline]
    pub fn capacity(&self) -> usize {
        self.cache.capacity()
    }

    /// Per-block allocation of the underlying cache, in quanta.
    #[inline]
    pub fn quanta(&self) -> [usize; 3] {
        self.cache.quanta()
    }

    /// Clears the underlying cache, dummy or not.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Deep-copies `src`'s underlying cache state and dummy flag into this
    /// proxy. `src`'s buffers are rotated so each copy is contiguous.
    pub fn assign_from(&mut self, src: &mut PipelineCacheProxy) {
        self.cache.assign_from(&mut src.cache);
        self.dummy = src.dummy;
    }

    /// Validates the underlying cache's invariants.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.cache.check_invariants()
    }
}
