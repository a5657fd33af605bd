//! Synchronizer diagnostics
//!
//! Read-only snapshots of buffer state and lifetime counters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::StreamId;

/// Which rule released an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleasePath {
    /// An item `lateness` newer was admitted, closing the window
    Lateness,
    /// Every stream had already buffered data past the window
    Opportunistic,
    /// Re-check triggered by an item older than the open window
    LateArrival,
    /// Unconditional drain (shutdown, reconfiguration, drop)
    Drain,
}

impl ReleasePath {
    pub const ALL: [ReleasePath; 4] = [
        ReleasePath::Lateness,
        ReleasePath::Opportunistic,
        ReleasePath::LateArrival,
        ReleasePath::Drain,
    ];

    /// Short static label (used for logs and metrics)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lateness => "lateness",
            Self::Opportunistic => "opportunistic",
            Self::LateArrival => "late_arrival",
            Self::Drain => "drain",
        }
    }
}

impl fmt::Display for ReleasePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Buffer status snapshot (for diagnostics)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferStats<K = StreamId>
where
    K: Ord,
{
    /// Buffer depth per registered stream
    pub buffer_depths: BTreeMap<K, usize>,

    /// Total buffered items
    pub total_items: usize,

    /// Oldest buffered timestamp
    pub oldest_timestamp: Option<u64>,

    /// Newest buffered timestamp
    pub newest_timestamp: Option<u64>,

    /// Lower edge of the open window (`None` while uninitialized)
    pub window_floor: Option<u64>,

    /// Latest high-water mark (`t - lateness`)
    pub cursor: Option<u64>,
}

impl<K: Ord> Default for BufferStats<K> {
    fn default() -> Self {
        Self {
            buffer_depths: BTreeMap::new(),
            total_items: 0,
            oldest_timestamp: None,
            newest_timestamp: None,
            window_floor: None,
            cursor: None,
        }
    }
}

/// Lifetime counters of one synchronizer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounters {
    /// Accepted admissions
    pub admitted: u64,

    /// Rejections, keyed by reason label
    pub rejected: BTreeMap<String, u64>,

    /// Released items, keyed by release path
    pub released: BTreeMap<ReleasePath, u64>,

    /// Admissions whose timestamp went backwards within their stream
    pub out_of_order: u64,

    /// Completed forced drains that released at least one item
    pub drains: u64,
}

impl SyncCounters {
    /// Total rejected admissions
    pub fn total_rejected(&self) -> u64 {
        self.rejected.values().sum()
    }

    /// Total released items
    pub fn total_released(&self) -> u64 {
        self.released.values().sum()
    }

    /// Released items for one path
    pub fn released_by(&self, path: ReleasePath) -> u64 {
        self.released.get(&path).copied().unwrap_or(0)
    }
}
