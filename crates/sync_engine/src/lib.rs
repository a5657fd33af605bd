//! # Sync Engine
//!
//! Multi-stream timestamp synchronizer.
//!
//! Responsibilities:
//! - Per-stream FIFO buffering
//! - Lateness-driven window advancement
//! - Opportunistic release once every stream has covered a window
//! - Forced drain at shutdown
//!
//! ## Usage
//!
//! ```
//! use sync_engine::{StreamId, SyncConfig, Synchronizer, VecSink};
//!
//! let sink = VecSink::new();
//! let config = SyncConfig::new(100, 20, ["camera", "lidar"].map(StreamId::from));
//! let mut sync = Synchronizer::with_config(config, sink.clone()).unwrap();
//!
//! sync.admit("frame-0", 110, "camera").unwrap();
//! sync.admit("sweep-0", 112, "lidar").unwrap();
//! assert_eq!(sink.take(), vec!["frame-0", "sweep-0"]);
//!
//! sync.admit("frame-1", 150, "camera").unwrap();
//! assert_eq!(sync.force_drain(), 1);
//! ```
//!
//! The synchronizer is single-threaded: several producers must serialize
//! access, e.g. behind one `Mutex` or by feeding one owning task.

mod buffer;
mod engine;
mod sinks;
mod window;

pub use engine::Synchronizer;
pub use sinks::{ChannelSink, TracingSink, VecSink};

// Re-export contracts types
pub use contracts::{
    BufferConfig, BufferStats, RejectReason, Rejected, ReleasePath, ReleaseSink, StreamId,
    StreamKey, SyncConfig, SyncCounters,
};
