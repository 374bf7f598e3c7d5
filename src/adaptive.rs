//! The adaptive cache: a pipeline cache that re-tunes its own partition.
//!
//! An [`AdaptiveCache`] serves all traffic from one *main*
//! [`PipelineCache`](crate::cache::PipelineCache) while maintaining a
//! sampled clone and six *ghost* proxies, one per ordered pair of distinct
//! blocks. Each ghost runs the same sampled traffic under the counterfactual
//! partition "main with one quantum shifted from block `i` to block `j`".
//!
//! ## Control flow
//!
//! ```text
//!   get/set ──► main (always)
//!      │
//!      └─ should_sample(key)? ──► sampled + 6 ghosts (mirrored replay)
//!
//!   adapt() ──► compare windowed eviction costs:
//!      main vs argmin(ghosts); if a ghost won, apply its shift to main
//!      and sampled, then reseed all ghosts from the post-shift sampled.
//! ```
//!
//! Because every mirror sees the identical sampled stream, each ghost's
//! windowed cost is a near-unbiased estimate of what its partition would
//! have cost on real traffic at roughly `1/(SAMPLE_MASK+1)` of the work.
//! Ghost history is discarded at each applied decision on purpose: the next
//! window's ghosts must represent fresh counterfactuals against the new
//! baseline.
//!
//! The cache is single-threaded and non-reentrant; the host serializes all
//! calls and decides the `adapt` cadence (every N ops or every T millis).

use std::fmt;

use log::debug;
use xxhash_rust::xxh3::xxh3_64;

use crate::cache::PipelineCache;
use crate::constants::{PIPELINE_CACHE_CAPACITY, QUANTUM_SIZE, SAMPLE_MASK};
use crate::error::{ConfigError, InvariantError};
use crate::proxy::PipelineCacheProxy;

/// The six candidate quantum shifts, as ordered `(src, dst)` block pairs
/// over (FIFO, ALRU, COST). Ghost `k` models shift `GHOST_SHIFTS[k]`.
const GHOST_SHIFTS: [(usize, usize); 6] = [(0, 1), (0, 2), (1, 0), (1, 2), (2, 0), (2, 1)];

/// An adaptive three-policy cache for `u64 -> (latency, tokens)` records.
///
/// # Example
///
/// ```
/// use adacache::adaptive::AdaptiveCache;
///
/// let mut cache = AdaptiveCache::try_with_layout(12, 4, 0).unwrap();
/// cache.set(1, (2.5, 80));
///
/// assert!(cache.contains(1));
/// assert_eq!(cache.get(1), (2.5, 80));
///
/// cache.adapt(); // no evictions happened, so the partition holds
/// assert_eq!(cache.partition(), [4, 4, 4]);
/// ```
#[derive(Debug)]
pub struct AdaptiveCache {
    main: PipelineCache,
    sampled: PipelineCacheProxy,
    ghosts: [PipelineCacheProxy; 6],
    ops_since_last_decision: u64,
    sample_mask: u64,
}

impl AdaptiveCache {
    /// Creates an adaptive cache with the compiled-in layout.
    ///
    /// `maxsize` must equal [`PIPELINE_CACHE_CAPACITY`]; passing anything
    /// else is a programmer error and aborts with a diagnostic.
    pub fn new(maxsize: usize) -> Self {
        assert_eq!(
            maxsize, PIPELINE_CACHE_CAPACITY,
            "AdaptiveCache::new: maxsize must equal PIPELINE_CACHE_CAPACITY"
        );
        Self::try_with_layout(maxsize, QUANTUM_SIZE, SAMPLE_MASK)
            .expect("compiled-in layout is valid")
    }

    /// Creates an adaptive cache with an explicit layout.
    ///
    /// `sample_mask` must be one less than a power of two (`0` samples every
    /// key). Ghosts whose initial shift is infeasible start dummy.
    pub fn try_with_layout(
        capacity: usize,
        quantum_size: usize,
        sample_mask: u64,
    ) -> Result<Self, ConfigError> {
        if sample_mask & sample_mask.wrapping_add(1) != 0 {
            return Err(ConfigError::new(format!(
                "sample_mask {sample_mask:#x} is not one less than a power of two"
            )));
        }

        let main = PipelineCache::try_new(capacity, quantum_size)?;
        let sampled = PipelineCacheProxy::try_new(capacity, quantum_size)?;

        let mut ghosts = Vec::with_capacity(GHOST_SHIFTS.len());
        for &(src, dst) in &GHOST_SHIFTS {
            let mut ghost = PipelineCacheProxy::try_new(capacity, quantum_size)?;
            if ghost.can_adapt(src, dst) {
                ghost.move_quantum(src, dst);
            } else {
                ghost.make_dummy();
            }
            ghosts.push(ghost);
        }
        let ghosts: [PipelineCacheProxy; 6] =
            ghosts.try_into().expect("exactly six ghost proxies");

        Ok(Self {
            main,
            sampled,
            ghosts,
            ops_since_last_decision: 0,
            sample_mask,
        })
    }

    /// Deterministic sampling predicate: `true` for roughly one key in
    /// `sample_mask + 1`. Constant for a given key over the process
    /// lifetime, so a sampled key's history is consistent in every mirror.
    #[inline]
    pub fn should_sample(&self, key: u64) -> bool {
        xxh3_64(&key.to_le_bytes()) & self.sample_mask == 0
    }

    /// Looks up `key`, returning its `(latency, tokens)` value.
    ///
    /// The key must be present (check [`contains`](Self::contains) first).
    /// Sampled keys are replayed into the shadow caches for their
    /// access-order side effects.
    pub fn get(&mut self, key: u64) -> (f64, u64) {
        self.ops_since_last_decision += 1;
        let entry = self.main.get_item(key);

        if self.should_sample(key) {
            self.sampled.get_item(key);
            for ghost in &mut self.ghosts {
                ghost.get_item(key);
            }
        }

        (entry.latency, entry.tokens)
    }

    /// Inserts or overwrites `key` with `(latency, tokens)`, evicting from
    /// the main cache immediately if the insert pushed it over capacity.
    /// Sampled keys are mirrored (insert plus eviction) into the shadow
    /// caches.
    pub fn set(&mut self, key: u64, value: (f64, u64)) {
        self.ops_since_last_decision += 1;
        let (latency, tokens) = value;

        self.main.insert_item(key, latency, tokens);
        if self.main.len() > self.main.capacity() {
            self.main.evict_item();
        }

        if self.should_sample(key) {
            self.sampled.insert_item(key, latency, tokens);
            if self.sampled.len() > self.sampled.capacity() {
                self.sampled.evict_item();
            }
            for ghost in &mut self.ghosts {
                ghost.insert_item(key, latency, tokens);
                if ghost.len() > ghost.capacity() {
                    ghost.evict_item();
                }
            }
        }
    }

    /// Compares the last window's eviction costs and, when some ghost beat
    /// the main cache, applies that ghost's quantum shift.
    ///
    /// The main and ghost accumulators are consumed. On an applied decision
    /// the shift moves one quantum in both main and sampled, and the six ghosts
    /// are reseeded from the post-shift sampled baseline: each ghost whose
    /// labelled shift remains feasible re-applies it, the rest go dummy.
    pub fn adapt(&mut self) {
        self.ops_since_last_decision = 0;

        let main_cost = self.main.get_timeframe_aggregated_cost();
        self.main.reset_timeframe_stats();

        let mut best_cost = f64::INFINITY;
        let mut best: Option<usize> = None;
        for (k, ghost) in self.ghosts.iter_mut().enumerate() {
            let cost = ghost.get_timeframe_aggregated_cost();
            ghost.reset_timeframe_stats();
            if cost < best_cost {
                best_cost = cost;
                best = Some(k);
            }
        }

        let Some(winner) = best else {
            return;
        };
        if best_cost >= main_cost {
            return;
        }

        let (src, dst) = GHOST_SHIFTS[winner];
        debug!(
            "adapt: shifting one quantum {src} -> {dst} (ghost cost {best_cost}, main cost {main_cost})"
        );
        debug_assert!(self.main.can_adapt(src, dst));
        self.main.move_quantum(src, dst);
        self.sampled.move_quantum(src, dst);

        for (ghost, &(i, j)) in self.ghosts.iter_mut().zip(&GHOST_SHIFTS) {
            ghost.assign_from(&mut self.sampled);
            if self.sampled.can_adapt(i, j) {
                ghost.make_non_dummy();
                ghost.move_quantum(i, j);
            } else {
                ghost.make_dummy();
            }
        }
    }

    /// Removes and returns one entry chosen by the eviction policy.
    ///
    /// Precondition: [`should_evict`](Self::should_evict). This gate stays
    /// checked in release builds.
    pub fn pop_one(&mut self) -> (u64, (f64, u64)) {
        assert!(
            self.main.should_evict(),
            "pop_one: cache is not at capacity"
        );
        let victim = self.main.evict_item();
        (victim.id, (victim.latency, victim.tokens))
    }

    /// Returns `true` when the main cache is at capacity.
    #[inline]
    pub fn should_evict(&self) -> bool {
        self.main.should_evict()
    }

    /// Returns `true` if `key` is stored in the main cache.
    #[inline]
    pub fn contains(&self, key: u64) -> bool {
        self.main.contains(key)
    }

    /// Returns the number of stored entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.main.len()
    }

    /// Returns `true` if the cache holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.main.is_empty()
    }

    /// Returns the total capacity in entries.
    #[inline]
    pub fn maxsize(&self) -> usize {
        self.main.capacity()
    }

    /// Returns the stored keys. Order is stable within one call only.
    pub fn keys(&self) -> Vec<u64> {
        self.main.keys()
    }

    /// Returns the stored values. Order is stable within one call only.
    pub fn values(&self) -> Vec<(f64, u64)> {
        self.main.values()
    }

    /// Drops every entry from the main cache and all shadow caches. The
    /// partition is untouched.
    pub fn clear(&mut self) {
        self.main.clear();
        self.sampled.clear();
        for ghost in &mut self.ghosts {
            ghost.clear();
        }
    }

    /// Returns the main cache's per-block allocation in entry slots.
    pub fn partition(&self) -> [usize; 3] {
        self.main.partition()
    }

    /// Returns the main cache's per-block allocation in quanta.
    pub fn quanta(&self) -> [usize; 3] {
        self.main.quanta()
    }

    /// Eviction cost accumulated by the main cache in the current window.
    pub fn timeframe_cost(&self) -> f64 {
        self.main.get_timeframe_aggregated_cost()
    }

    /// Operations observed since the last `adapt` call; hosts driving
    /// adaptation by op count read this.
    #[inline]
    pub fn ops_since_last_decision(&self) -> u64 {
        self.ops_since_last_decision
    }

    /// Validates the whole ensemble: main, sampled, and ghost cache
    /// invariants, partition agreement between main and sampled, and the
    /// ghost feasibility law (every non-dummy ghost's partition equals the
    /// sampled partition with its labelled shift applied; every dummy
    /// ghost's labelled shift is infeasible from the sampled baseline).
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.main.check_invariants()?;
        self.sampled.check_invariants()?;

        if self.main.quanta() != self.sampled.quanta() {
            return Err(InvariantError::new(
                "sampled partition diverged from main partition",
            ));
        }

        for (k, ghost) in self.ghosts.iter().enumerate() {
            ghost.check_invariants()?;
            let (src, dst) = GHOST_SHIFTS[k];
            if ghost.is_dummy() {
                if self.sampled.can_adapt(src, dst) {
                    return Err(InvariantError::new(format!(
                        "ghost {k} is dummy but shift {src}->{dst} is feasible"
                    )));
                }
            } else {
                let mut expected = self.sampled.quanta();
                expected[src] -= 1;
                expected[dst] += 1;
                if ghost.quanta() != expected {
                    return Err(InvariantError::new(format!(
                        "ghost {k} partition {:?} does not match shifted baseline {:?}",
                        ghost.quanta(),
                        expected
                    )));
                }
            }
        }

        Ok(())
    }
}

impl fmt::Display for AdaptiveCache {
    /// Renders the current partition as quantum counts.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let q = self.quanta();
        write!(f, "AdaptiveCache(q_fifo={}, q_alru={}, q_cost={})", q[0], q[1], q[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // mask 0 samples every key, which keeps the shadow caches observable
    fn small() -> AdaptiveCache {
        AdaptiveCache::try_with_layout(12, 4, 0).unwrap()
    }

    fn adaptable() -> AdaptiveCache {
        AdaptiveCache::try_with_layout(24, 4, 0).unwrap()
    }

    #[test]
    fn layout_validation_rejects_bad_mask() {
        assert!(AdaptiveCache::try_with_layout(12, 4, 2).is_err());
        assert!(AdaptiveCache::try_with_layout(12, 4, 1).is_ok());
        assert!(AdaptiveCache::try_with_layout(12, 4, 15).is_ok());
    }

    #[test]
    #[should_panic(expected = "maxsize must equal PIPELINE_CACHE_CAPACITY")]
    fn new_rejects_foreign_maxsize() {
        AdaptiveCache::new(123);
    }

    #[test]
    fn single_quantum_blocks_make_every_ghost_dummy() {
        let cache = small();
        cache.check_invariants().unwrap();
        // 3 quanta, one per block: no shift is feasible
        for k in 0..6 {
            assert!(cache.ghosts[k].is_dummy(), "ghost {k} should be dummy");
        }
    }

    #[test]
    fn multi_quantum_layout_starts_with_live_ghosts() {
        let cache = adaptable();
        cache.check_invariants().unwrap();
        for k in 0..6 {
            assert!(!cache.ghosts[k].is_dummy(), "ghost {k} should be live");
        }
        assert_eq!(cache.ghosts[0].quanta(), [1, 3, 2]);
        assert_eq!(cache.ghosts[5].quanta(), [2, 3, 1]);
    }

    #[test]
    fn sampling_is_deterministic_per_key() {
        let cache = AdaptiveCache::try_with_layout(12, 4, 7).unwrap();
        for key in 0..256 {
            let first = cache.should_sample(key);
            for _ in 0..8 {
                assert_eq!(cache.should_sample(key), first);
            }
        }
    }

    #[test]
    fn mask_zero_samples_everything() {
        let cache = small();
        assert!((0..64).all(|key| cache.should_sample(key)));
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut cache = small();
        cache.set(7, (3.25, 11));
        assert!(cache.contains(7));
        assert_eq!(cache.get(7), (3.25, 11));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn set_mirrors_sampled_keys_into_shadows() {
        let mut cache = small();
        cache.set(1, (1.0, 1));
        assert!(cache.sampled.contains(1));
        cache.check_invariants().unwrap();
    }

    #[test]
    fn set_at_capacity_evicts_fifo_head() {
        let mut cache = small();
        for key in 1..=12 {
            cache.set(key, (1.0, 1));
        }
        assert_eq!(cache.len(), 12);

        cache.set(13, (5.0, 1));
        assert_eq!(cache.len(), 12);
        assert!(!cache.contains(1));
        assert!(cache.contains(13));
        cache.check_invariants().unwrap();
    }

    #[test]
    fn overwrite_at_capacity_does_not_evict() {
        let mut cache = small();
        for key in 1..=12 {
            cache.set(key, (1.0, 1));
        }
        cache.set(5, (9.0, 9));

        assert_eq!(cache.len(), 12);
        assert!(cache.contains(1));
        assert_eq!(cache.get(5), (9.0, 9));
    }

    #[test]
    fn pop_one_returns_policy_victim() {
        let mut cache = small();
        for key in 1..=12 {
            cache.set(key, (key as f64, key));
        }
        assert!(cache.should_evict());

        let (key, (latency, tokens)) = cache.pop_one();
        assert_eq!(key, 1);
        assert_eq!(latency, 1.0);
        assert_eq!(tokens, 1);
        assert_eq!(cache.len(), 11);
    }

    #[test]
    #[should_panic(expected = "not at capacity")]
    fn pop_one_panics_below_capacity() {
        let mut cache = small();
        cache.set(1, (1.0, 1));
        cache.pop_one();
    }

    #[test]
    fn adapt_with_no_traffic_is_a_noop() {
        let mut cache = adaptable();
        let before = cache.partition();
        for _ in 0..10 {
            cache.adapt();
            assert_eq!(cache.partition(), before);
            cache.check_invariants().unwrap();
        }
    }

    #[test]
    fn adapt_resets_op_counter() {
        let mut cache = small();
        cache.set(1, (1.0, 1));
        cache.get(1);
        assert_eq!(cache.ops_since_last_decision(), 2);
        cache.adapt();
        assert_eq!(cache.ops_since_last_decision(), 0);
    }

    #[test]
    fn applied_adaptation_moves_one_quantum_and_reseeds_ghosts() {
        let mut cache = adaptable();

        // churn enough sampled traffic that main and the ghosts all evict
        for key in 1..=200 {
            cache.set(key, (1.0 + (key % 7) as f64, 1));
        }
        cache.adapt();

        let quanta = cache.quanta();
        assert_eq!(quanta.iter().sum::<usize>(), 6);
        assert!(quanta.iter().all(|&q| q >= 1));
        cache.check_invariants().unwrap();

        // a second flat window must not drift the partition
        let before = cache.partition();
        cache.adapt();
        assert_eq!(cache.partition(), before);
    }

    #[test]
    fn clear_empties_main_and_shadows_keeps_partition() {
        let mut cache = adaptable();
        for key in 1..=30 {
            cache.set(key, (1.0, 1));
        }
        let partition = cache.partition();
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.partition(), partition);
        assert_eq!(cache.sampled.len(), 0);
        assert!((1..=30).all(|key| !cache.contains(key)));
        cache.check_invariants().unwrap();
    }

    #[test]
    fn display_renders_quantum_partition() {
        let cache = small();
        assert_eq!(format!("{cache}"), "AdaptiveCache(q_fifo=1, q_alru=1, q_cost=1)");
    }
}
