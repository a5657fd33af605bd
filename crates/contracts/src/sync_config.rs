//! Synchronizer configuration contracts that can be shared across crates.

use serde::{Deserialize, Serialize};

use crate::StreamId;

/// Synchronizer configuration
///
/// `lateness` and `window_size` share the unit of the item timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig<K = StreamId> {
    /// Maximum delay tolerated before a window is forced closed
    pub lateness: u64,

    /// Width of one release window (must be < lateness)
    pub window_size: u64,

    /// Registered stream identifiers (fixed for the configuration's lifetime)
    pub streams: Vec<K>,

    /// Buffer configuration
    #[serde(default)]
    pub buffer: BufferConfig,
}

impl<K> SyncConfig<K> {
    /// Configuration with the default (unbounded) buffer policy
    pub fn new(lateness: u64, window_size: u64, streams: impl IntoIterator<Item = K>) -> Self {
        Self {
            lateness,
            window_size,
            streams: streams.into_iter().collect(),
            buffer: BufferConfig::default(),
        }
    }

    /// Bound every stream buffer to `max` items
    pub fn with_max_per_stream(mut self, max: usize) -> Self {
        self.buffer.max_per_stream = Some(max);
        self
    }
}

/// Buffer configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Maximum items held per stream; `None` means unbounded.
    ///
    /// When a stream buffer is full further admissions to that stream are
    /// rejected. Nothing already buffered is ever evicted.
    #[serde(default)]
    pub max_per_stream: Option<usize>,
}
