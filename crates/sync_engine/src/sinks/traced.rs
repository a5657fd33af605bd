//! TracingSink - logs each release before forwarding it

use contracts::ReleaseSink;
use tracing::trace;

/// Wraps another sink and emits one `trace` event per item.
#[derive(Debug)]
pub struct TracingSink<S> {
    name: String,
    sequence: u64,
    inner: S,
}

impl<S> TracingSink<S> {
    /// Create a new TracingSink with the given name
    pub fn new(name: impl Into<String>, inner: S) -> Self {
        Self {
            name: name.into(),
            sequence: 0,
            inner,
        }
    }

    /// Sink name (used for logging)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Items forwarded so far
    pub fn forwarded(&self) -> u64 {
        self.sequence
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<T, S> ReleaseSink<T> for TracingSink<S>
where
    S: ReleaseSink<T>,
{
    fn receive(&mut self, item: T) {
        self.sequence += 1;
        trace!(sink = %self.name, seq = self.sequence, "forwarding released item");
        self.inner.receive(item);
    }
}
