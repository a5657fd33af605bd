//! ReleaseSink trait - Synchronizer output interface
//!
//! Defines the abstract interface for whatever consumes released items.

/// Receiver of released items.
///
/// Called synchronously on the caller's thread, once per released item, in
/// release order. The synchronizer neither retries nor buffers on failure:
/// a sink that can fail must handle that itself.
///
/// Any `FnMut(T)` closure is a sink.
pub trait ReleaseSink<T> {
    /// Take ownership of one released item
    fn receive(&mut self, item: T);
}

impl<T, F> ReleaseSink<T> for F
where
    F: FnMut(T),
{
    #[inline]
    fn receive(&mut self, item: T) {
        self(item)
    }
}
