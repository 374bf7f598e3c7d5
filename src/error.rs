//! Error types for the adacache library.
//!
//! ## Key Components
//!
//! - [`ConfigError`]: Returned when a cache layout is invalid (capacity not a
//!   multiple of the quantum, quantum count not splittable three ways,
//!   malformed sample mask).
//! - [`InvariantError`]: Returned by `check_invariants` methods when an
//!   internal consistency law is violated (index/block mismatch, capacity
//!   law, partition drift).
//!
//! ## Example Usage
//!
//! ```
//! use adacache::adaptive::AdaptiveCache;
//! use adacache::error::ConfigError;
//!
//! // Fallible constructor for embedder-chosen layouts
//! let cache: Result<AdaptiveCache, ConfigError> = AdaptiveCache::try_with_layout(12, 4, 0);
//! assert!(cache.is_ok());
//!
//! // A quantum that does not divide the capacity is caught without panicking
//! let bad = AdaptiveCache::try_with_layout(10, 4, 0);
//! assert!(bad.is_err());
//! ```

use std::fmt;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when cache layout parameters are invalid.
///
/// Produced by the `try_with_layout` constructors on
/// [`PipelineCache`](crate::cache::PipelineCache),
/// [`PipelineCacheProxy`](crate::proxy::PipelineCacheProxy), and
/// [`AdaptiveCache`](crate::adaptive::AdaptiveCache). Carries a
/// human-readable description of which parameter failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when internal cache invariants are violated.
///
/// Produced by `check_invariants` methods
/// (e.g. [`PipelineCache::check_invariants`](crate::cache::PipelineCache::check_invariants)),
/// which randomized tests run after every driven operation. Carries a
/// human-readable description of which invariant failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantError(String);

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvariantError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
