//! Per-stream FIFO buffer.
//!
//! Uses index-based separation:
//! - VecDeque stores lightweight metadata (timestamp + slab key)
//! - Slab stores the actual payloads
//!
//! Growing the index never moves payloads (images, point clouds, ...).

use std::collections::VecDeque;
use std::fmt;

use slab::Slab;

/// Lightweight metadata stored in the index
#[derive(Debug, Clone, Copy)]
struct ItemMeta {
    /// Timestamp used for release decisions
    timestamp: u64,
    /// Key into the slab storage
    slab_key: usize,
}

/// FIFO of one stream's items, in admission order.
///
/// The buffer never sorts. Producers are expected to admit non-decreasing
/// timestamps per stream; violations are counted but otherwise stored as-is.
pub struct StreamBuffer<T> {
    /// Admission-ordered metadata
    index: VecDeque<ItemMeta>,
    /// Payload storage
    storage: Slab<T>,
    out_of_order_count: u64,
    last_timestamp: Option<u64>,
}

impl<T> fmt::Debug for StreamBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamBuffer")
            .field("len", &self.index.len())
            .field("front", &self.front_timestamp())
            .field("out_of_order", &self.out_of_order_count)
            .finish()
    }
}

impl<T> Default for StreamBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StreamBuffer<T> {
    /// Create an empty buffer
    #[inline]
    pub fn new() -> Self {
        Self {
            index: VecDeque::new(),
            storage: Slab::new(),
            out_of_order_count: 0,
            last_timestamp: None,
        }
    }

    /// Append an item at the back.
    ///
    /// Returns `true` when the timestamp went backwards relative to the
    /// previously admitted item of this stream.
    #[inline]
    pub fn push(&mut self, item: T, timestamp: u64) -> bool {
        let out_of_order = self.last_timestamp.is_some_and(|last| timestamp < last);
        if out_of_order {
            self.out_of_order_count += 1;
        }
        self.last_timestamp = Some(timestamp);

        let slab_key = self.storage.insert(item);
        self.index.push_back(ItemMeta {
            timestamp,
            slab_key,
        });
        out_of_order
    }

    /// Timestamp of the oldest (front) item
    #[inline]
    pub fn front_timestamp(&self) -> Option<u64> {
        self.index.front().map(|meta| meta.timestamp)
    }

    /// Timestamp of the most recently admitted (back) item
    #[inline]
    pub fn back_timestamp(&self) -> Option<u64> {
        self.index.back().map(|meta| meta.timestamp)
    }

    /// Pop the front item if `ready` accepts its timestamp
    #[inline]
    pub fn pop_front_if(&mut self, ready: impl FnOnce(u64) -> bool) -> Option<(u64, T)> {
        let meta = *self.index.front()?;
        if !ready(meta.timestamp) {
            return None;
        }
        self.index.pop_front();
        let item = self.storage.remove(meta.slab_key);
        Some((meta.timestamp, item))
    }

    /// Pop the front item if its timestamp is strictly below `boundary`
    #[inline]
    pub fn pop_before(&mut self, boundary: u64) -> Option<(u64, T)> {
        self.pop_front_if(|timestamp| timestamp < boundary)
    }

    /// Get the number of buffered items
    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check if the buffer is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Get out-of-order admission count
    #[inline]
    pub fn out_of_order_count(&self) -> u64 {
        self.out_of_order_count
    }
}
