//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace.
//! Business crates depend only on this crate, never on each other's internals.
//!
//! ## Time Model
//! - Timestamps are unsigned integers (`u64`) on one comparable axis
//! - The unit is whatever the producers agree on; the synchronizer never
//!   interprets it beyond ordering and subtraction

mod error;
mod sink;
mod stats;
mod stream_id;
mod sync_config;

pub use error::*;
pub use sink::*;
pub use stats::*;
pub use stream_id::{StreamId, StreamKey};
pub use sync_config::*;
