//! VecSink - collects released items behind a shared handle

use std::sync::{Arc, Mutex, MutexGuard};

use contracts::ReleaseSink;

/// Sink that appends every released item to a shared `Vec`.
///
/// Clones share the same storage, so one clone can be handed to the
/// synchronizer while another is kept to inspect what was released.
#[derive(Debug)]
pub struct VecSink<T> {
    items: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for VecSink<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T> Default for VecSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> VecSink<T> {
    pub fn new() -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Remove and return everything collected so far
    pub fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of items collected and not yet taken
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the collected items
    pub fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        // A panicking holder cannot leave a Vec half-written
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T> ReleaseSink<T> for VecSink<T> {
    fn receive(&mut self, item: T) {
        self.lock().push(item);
    }
}
