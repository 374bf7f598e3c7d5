//! Compile-time layout constants for the adaptive pipeline cache.
//!
//! These three values form part of the public interface: hosts constructing
//! an [`AdaptiveCache`](crate::adaptive::AdaptiveCache) through
//! [`AdaptiveCache::new`](crate::adaptive::AdaptiveCache::new) must pass
//! `PIPELINE_CACHE_CAPACITY` as the maximum size. Tests and embedders that
//! need a different geometry go through `try_with_layout` instead.

/// Total number of entries the cache holds across all three blocks.
pub const PIPELINE_CACHE_CAPACITY: usize = 6144;

/// Number of entry slots reallocated between blocks per adaptation step.
///
/// Must divide [`PIPELINE_CACHE_CAPACITY`], and the resulting quantum count
/// must split evenly three ways so the initial partition is balanced.
pub const QUANTUM_SIZE: usize = 256;

/// Sampling filter: a key is mirrored into the shadow caches iff
/// `xxh3(key) & SAMPLE_MASK == 0`. One less than a power of two; the default
/// samples one key in sixteen.
pub const SAMPLE_MASK: u64 = 15;

const _: () = assert!(PIPELINE_CACHE_CAPACITY % QUANTUM_SIZE == 0);
const _: () = assert!((PIPELINE_CACHE_CAPACITY / QUANTUM_SIZE) % 3 == 0);
const _: () = assert!(SAMPLE_MASK & SAMPLE_MASK.wrapping_add(1) == 0);
