//! adacache: an adaptive pipeline cache for hot-set acceleration.
//!
//! Maps 64-bit keys to `(latency, tokens)` records in front of an expensive
//! compute pipeline. Capacity is partitioned across three eviction policies
//! (FIFO, approximate-LRU, cost-aware); ghost caches score counterfactual
//! partitions on sampled traffic and [`adaptive::AdaptiveCache::adapt`]
//! re-tunes the split toward whichever partition would have evicted the
//! least latency over the last window.
//!
//! See `DESIGN.md` for internal architecture and invariants.

pub mod adaptive;
pub mod block;
pub mod cache;
pub mod constants;
pub mod ds;
pub mod error;
pub mod prelude;
pub mod proxy;
