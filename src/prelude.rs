pub use crate::adaptive::AdaptiveCache;
pub use crate::block::{BlockKind, Entry};
pub use crate::cache::PipelineCache;
pub use crate::constants::{PIPELINE_CACHE_CAPACITY, QUANTUM_SIZE, SAMPLE_MASK};
pub use crate::ds::RingBuffer;
pub use crate::error::{ConfigError, InvariantError};
pub use crate::proxy::PipelineCacheProxy;
