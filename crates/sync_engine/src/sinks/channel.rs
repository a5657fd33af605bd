//! ChannelSink - forwards released items to an async consumer

use contracts::ReleaseSink;
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

/// Sink that hands released items to a tokio task.
///
/// Sending never blocks, so the synchronizer stays synchronous. Once the
/// receiver is gone further items are dropped and counted; the closure is
/// logged once.
#[derive(Debug)]
pub struct ChannelSink<T> {
    tx: UnboundedSender<T>,
    dropped: u64,
}

impl<T> ChannelSink<T> {
    pub fn new(tx: UnboundedSender<T>) -> Self {
        Self { tx, dropped: 0 }
    }

    /// Items lost because the receiver was closed
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl<T> ReleaseSink<T> for ChannelSink<T> {
    fn receive(&mut self, item: T) {
        if self.tx.send(item).is_err() {
            if self.dropped == 0 {
                warn!("release channel closed, dropping released items");
            }
            self.dropped += 1;
            metrics::counter!("sync_sink_dropped_total", "sink" => "channel").increment(1);
        }
    }
}
