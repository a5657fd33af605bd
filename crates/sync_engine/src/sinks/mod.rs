//! Ready-made release sinks.
//!
//! Any `FnMut(T)` closure already is a sink; these cover the common cases of
//! collecting, forwarding across tasks, and tracing.

mod channel;
mod collect;
mod traced;

pub use channel::ChannelSink;
pub use collect::VecSink;
pub use traced::TracingSink;
