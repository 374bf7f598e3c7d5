//! The pipeline cache: three policy blocks behind one key index.
//!
//! A [`PipelineCache`] composes a FIFO, an approximate-LRU, and a
//! cost-ordered [`PipelineBlock`] into a single addressable store. Total
//! capacity is split into equal quanta distributed among the blocks;
//! [`PipelineCache::move_quantum`] shifts one quantum of allocation (and up
//! to a quantum of entries) between blocks, which is the adaptation lever
//! the adaptive layer pulls.
//!
//! ## Index
//!
//! The key index maps `key -> (block, position)` where positions are the
//! absolute sequence positions issued by blocks. Head consumption inside a
//! block re-addresses its remaining entries implicitly, so eviction and
//! quantum donation only touch the index records of the entries that
//! actually moved.
//!
//! ## Cost accounting
//!
//! Every eviction adds the victim's latency to the timeframe accumulator.
//! The adaptive layer reads and resets the accumulator once per adaptation
//! window; comparing windows across the shadow caches is what drives the
//! partition decision.

use std::time::Instant;

use log::trace;
use rustc_hash::FxHashMap;

use crate::block::{BlockKind, Entry, PipelineBlock};
use crate::error::{ConfigError, InvariantError};

/// Index record: which block holds the entry, and at which position.
#[derive(Debug, Clone, Copy)]
struct Slot {
    block: usize,
    pos: u64,
}

/// Block order used for insert routing and eviction scans.
const BLOCK_KINDS: [BlockKind; 3] = [BlockKind::Fifo, BlockKind::Alru, BlockKind::Cost];

/// A fixed-capacity store partitioned across three eviction policies.
///
/// Single-threaded and non-reentrant; the host serializes all calls.
///
/// # Example
///
/// ```
/// use adacache::cache::PipelineCache;
///
/// let mut cache = PipelineCache::try_new(12, 4).unwrap();
/// cache.insert_item(1, 2.5, 80);
///
/// assert!(cache.contains(1));
/// let entry = cache.get_item(1);
/// assert_eq!(entry.latency, 2.5);
/// assert_eq!(entry.tokens, 80);
/// ```
#[derive(Debug)]
pub struct PipelineCache {
    blocks: [PipelineBlock; 3],
    index: FxHashMap<u64, Slot>,
    total_capacity: usize,
    quantum_size: usize,
    timeframe_cost: f64,
    epoch: Instant,
}

impl PipelineCache {
    /// Creates a cache of `capacity` entries split evenly, quantum by
    /// quantum, across the three blocks.
    ///
    /// Fails if the quantum does not divide the capacity or the quantum
    /// count does not split three ways.
    pub fn try_new(capacity: usize, quantum_size: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::new("capacity must be > 0"));
        }
        if quantum_size == 0 {
            return Err(ConfigError::new("quantum_size must be > 0"));
        }
        if capacity % quantum_size != 0 {
            return Err(ConfigError::new(format!(
                "capacity {capacity} is not a multiple of quantum_size {quantum_size}"
            )));
        }
        let quanta = capacity / quantum_size;
        if quanta % 3 != 0 {
            return Err(ConfigError::new(format!(
                "quantum count {quanta} does not split across three blocks"
            )));
        }

        let per_block = quanta / 3;
        let blocks = BLOCK_KINDS.map(|kind| PipelineBlock::new(kind, capacity, quantum_size, per_block));

        Ok(Self {
            blocks,
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            total_capacity: capacity,
            quantum_size,
            timeframe_cost: 0.0,
            epoch: Instant::now(),
        })
    }

    /// Monotonic milliseconds since this cache was constructed.
    #[inline]
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Returns the number of stored entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if no entries are stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns the total capacity in entries.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.total_capacity
    }

    /// Returns the quantum size in entries.
    #[inline]
    pub fn quantum_size(&self) -> usize {
        self.quantum_size
    }

    /// Returns `true` if `key` is stored.
    #[inline]
    pub fn contains(&self, key: u64) -> bool {
        self.index.contains_key(&key)
    }

    /// Inserts or overwrites `key`. Returns the replaced `(latency, tokens)`
    /// value when the key was already present.
    ///
    /// A present key is overwritten in place (same block, same position,
    /// fresh timestamp). A new entry is routed to the first block with spare
    /// allocation, falling back to the FIFO block when every block is full;
    /// the caller is expected to invoke [`evict_item`](Self::evict_item)
    /// when the insert pushes the cache over capacity.
    pub fn insert_item(&mut self, key: u64, latency: f64, tokens: u64) -> Option<(f64, u64)> {
        let now = self.now_ms();
        if let Some(slot) = self.index.get(&key).copied() {
            let entry = self.blocks[slot.block].entry_mut(slot.pos);
            let old = (entry.latency, entry.tokens);
            *entry = Entry::new(key, latency, tokens, now);
            return Some(old);
        }

        let block = self.route_insert();
        let pos = self.blocks[block].insert(Entry::new(key, latency, tokens, now));
        self.index.insert(key, Slot { block, pos });
        None
    }

    fn route_insert(&self) -> usize {
        (0..3)
            .find(|&i| self.blocks[i].len() < self.blocks[i].curr_max_capacity())
            .unwrap_or(0)
    }

    /// Returns a copy of the entry for `key`, refreshing its access
    /// timestamp. The key must be present; check
    /// [`contains`](Self::contains) first.
    pub fn get_item(&mut self, key: u64) -> Entry {
        let now = self.now_ms();
        let slot = *self
            .index
            .get(&key)
            .expect("get_item: key not present in cache");
        self.blocks[slot.block].touch(slot.pos, now);
        *self.blocks[slot.block].entry(slot.pos)
    }

    /// Returns `true` when the cache is at (or transiently over) capacity
    /// and an eviction is due.
    #[inline]
    pub fn should_evict(&self) -> bool {
        self.index.len() >= self.total_capacity
    }

    /// Evicts one entry and returns it.
    ///
    /// Scans the blocks in FIFO, ALRU, COST order and asks the first one at
    /// its allocation to evict by its own policy. The victim's latency is
    /// added to the timeframe cost accumulator.
    pub fn evict_item(&mut self) -> Entry {
        let block = (0..3)
            .find(|&i| self.blocks[i].should_evict())
            .expect("evict_item: no block at capacity");

        let eviction = self.blocks[block].evict();
        self.index.remove(&eviction.victim.id);
        if let Some((id, pos)) = eviction.relocated {
            self.index.insert(id, Slot { block, pos });
        }
        self.timeframe_cost += eviction.victim.latency;
        eviction.victim
    }

    /// Returns the evicted-latency sum accumulated since the last reset.
    #[inline]
    pub fn get_timeframe_aggregated_cost(&self) -> f64 {
        self.timeframe_cost
    }

    /// Zeroes the timeframe cost accumulator.
    #[inline]
    pub fn reset_timeframe_stats(&mut self) {
        self.timeframe_cost = 0.0;
    }

    /// Returns `true` when one quantum can move from `src` to `dst` without
    /// draining `src` below a single quantum.
    pub fn can_adapt(&self, src: usize, dst: usize) -> bool {
        src != dst
            && self.blocks[src].curr_max_capacity() >= 2 * self.quantum_size
            && self.blocks[dst].curr_max_capacity() + self.quantum_size <= self.total_capacity
    }

    /// Moves one quantum of allocation (and up to a quantum of entries) from
    /// `src` to `dst`, rewriting the index records of the moved entries.
    ///
    /// Precondition: `can_adapt(src, dst)`.
    pub fn move_quantum(&mut self, src: usize, dst: usize) {
        debug_assert!(self.can_adapt(src, dst), "move_quantum on infeasible shift");

        self.blocks[src].rotate();
        self.blocks[dst].rotate();

        let (src_block, dst_block) = self.blocks_pair_mut(src, dst);
        let locations = src_block.move_quanta_to(dst_block);

        trace!(
            "moved quantum {} -> {} ({} entries)",
            BLOCK_KINDS[src].label(),
            BLOCK_KINDS[dst].label(),
            locations.len()
        );

        for (id, pos) in locations {
            self.index.insert(id, Slot { block: dst, pos });
        }
    }

    fn blocks_pair_mut(&mut self, src: usize, dst: usize) -> (&mut PipelineBlock, &mut PipelineBlock) {
        debug_assert!(src != dst && src < 3 && dst < 3);
        if src < dst {
            let (lo, hi) = self.blocks.split_at_mut(dst);
            (&mut lo[src], &mut hi[0])
        } else {
            let (lo, hi) = self.blocks.split_at_mut(src);
            (&mut hi[0], &mut lo[dst])
        }
    }

    /// Returns the stored keys. Order is stable within one call only.
    pub fn keys(&self) -> Vec<u64> {
        self.index.keys().copied().collect()
    }

    /// Returns the stored `(latency, tokens)` values. Order is stable within
    /// one call only.
    pub fn values(&self) -> Vec<(f64, u64)> {
        self.index
            .values()
            .map(|slot| {
                let entry = self.blocks[slot.block].entry(slot.pos);
                (entry.latency, entry.tokens)
            })
            .collect()
    }

    /// Drops all entries and zeroes the cost accumulator. The partition is
    /// untouched.
    pub fn clear(&mut self) {
        for block in &mut self.blocks {
            block.clear();
        }
        self.index.clear();
        self.timeframe_cost = 0.0;
    }

    /// Returns the per-block allocation in entry slots `(fifo, alru, cost)`.
    pub fn partition(&self) -> [usize; 3] {
        [
            self.blocks[0].curr_max_capacity(),
            self.blocks[1].curr_max_capacity(),
            self.blocks[2].curr_max_capacity(),
        ]
    }

    /// Returns the per-block allocation in quanta `(fifo, alru, cost)`.
    pub fn quanta(&self) -> [usize; 3] {
        [
            self.blocks[0].quanta(),
            self.blocks[1].quanta(),
            self.blocks[2].quanta(),
        ]
    }

    /// Returns the per-block entry counts `(fifo, alru, cost)`.
    pub fn block_sizes(&self) -> [usize; 3] {
        [
            self.blocks[0].len(),
            self.blocks[1].len(),
            self.blocks[2].len(),
        ]
    }

    /// Overwrites this cache's entire state with `src`'s, rotating `src`'s
    /// buffers so each block copy is contiguous. Layouts must match.
    pub fn assign_from(&mut self, src: &mut PipelineCache) {
        debug_assert_eq!(self.total_capacity, src.total_capacity);
        debug_assert_eq!(self.quantum_size, src.quantum_size);
        for i in 0..3 {
            self.blocks[i].assign_from(&mut src.blocks[i]);
        }
        self.index.clone_from(&src.index);
        self.timeframe_cost = src.timeframe_cost;
        self.epoch = src.epoch;
    }

    /// Validates index consistency, the capacity law, and the no-overflow
    /// law. Randomized tests run this after every driven operation.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let block_total: usize = self.blocks.iter().map(|b| b.len()).sum();
        if block_total != self.index.len() {
            return Err(InvariantError::new(format!(
                "index holds {} entries but blocks hold {}",
                self.index.len(),
                block_total
            )));
        }

        let alloc_total: usize = self.blocks.iter().map(|b| b.curr_max_capacity()).sum();
        if alloc_total != self.total_capacity {
            return Err(InvariantError::new(format!(
                "block allocations sum to {alloc_total}, expected {}",
                self.total_capacity
            )));
        }
        for block in &self.blocks {
            if block.curr_max_capacity() < self.quantum_size {
                return Err(InvariantError::new(format!(
                    "{} block allocation below one quantum",
                    block.kind().label()
                )));
            }
            if block.curr_max_capacity() % self.quantum_size != 0 {
                return Err(InvariantError::new(format!(
                    "{} block allocation is not a quantum multiple",
                    block.kind().label()
                )));
            }
            if block.len() > block.curr_max_capacity() {
                return Err(InvariantError::new(format!(
                    "{} block overflows its allocation: {} > {}",
                    block.kind().label(),
                    block.len(),
                    block.curr_max_capacity()
                )));
            }
        }
        if self.index.len() > self.total_capacity {
            return Err(InvariantError::new(format!(
                "cache overflows total capacity: {} > {}",
                self.index.len(),
                self.total_capacity
            )));
        }

        for (&key, slot) in &self.index {
            let entry = self.blocks[slot.block].entry(slot.pos);
            if entry.id != key {
                return Err(InvariantError::new(format!(
                    "index maps key {key} to an entry with id {}",
                    entry.id
                )));
            }
        }

        for (block_idx, block) in self.blocks.iter().enumerate() {
            for entry in block.entries() {
                match self.index.get(&entry.id) {
                    Some(slot) if slot.block == block_idx => {},
                    _ => {
                        return Err(InvariantError::new(format!(
                            "entry {} stored in the {} block has no matching index record",
                            entry.id,
                            block.kind().label()
                        )));
                    },
                }
            }
        }

        Ok(())
    }
}
