//! Main synchronizer implementation.

use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use contracts::{
    BufferStats, ContractError, RejectReason, Rejected, ReleasePath, ReleaseSink, StreamId,
    StreamKey, SyncConfig, SyncCounters,
};
use tracing::{debug, instrument, trace, warn};

use crate::buffer::StreamBuffer;
use crate::window::WindowGrid;

type BoxedSink<T> = Box<dyn ReleaseSink<T> + Send>;

/// Multi-stream timestamp synchronizer
///
/// Holds one FIFO per registered stream and releases items to the sink in
/// window order once either the lateness allowance has passed or every stream
/// has proven the window complete. Dropping the synchronizer drains it.
pub struct Synchronizer<T, K = StreamId>
where
    K: StreamKey,
{
    /// Maximum tolerated delay
    lateness: u64,
    /// Open window position
    grid: WindowGrid,
    /// Latest high-water mark (`t - lateness`)
    cursor: Option<u64>,
    /// Per-stream buffers, iterated in key order when flushing
    buffers: BTreeMap<K, StreamBuffer<T>>,
    /// Optional per-stream capacity
    max_per_stream: Option<usize>,
    /// Release target; `None` until configured
    sink: Option<BoxedSink<T>>,
    /// Lifetime counters
    counters: SyncCounters,
}

impl<T, K: StreamKey> fmt::Debug for Synchronizer<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synchronizer")
            .field("lateness", &self.lateness)
            .field("window_size", &self.grid.window_size())
            .field("window_floor", &self.grid.floor())
            .field("cursor", &self.cursor)
            .field("buffers", &self.buffers)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl<T, K: StreamKey> Default for Synchronizer<T, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, K: StreamKey> Synchronizer<T, K> {
    /// Create an unconfigured synchronizer.
    ///
    /// Every admission is rejected until [`configure`](Self::configure) runs.
    pub fn new() -> Self {
        Self {
            lateness: 0,
            grid: WindowGrid::default(),
            cursor: None,
            buffers: BTreeMap::new(),
            max_per_stream: None,
            sink: None,
            counters: SyncCounters::default(),
        }
    }

    /// Create and configure in one step
    pub fn with_config<S>(config: SyncConfig<K>, sink: S) -> Result<Self, ContractError>
    where
        S: ReleaseSink<T> + Send + 'static,
    {
        let mut synchronizer = Self::new();
        synchronizer.configure(config, sink)?;
        Ok(synchronizer)
    }

    /// Register streams, constants and sink.
    ///
    /// Anything still buffered from a previous configuration is drained into
    /// the previous sink first. A zero window size is accepted but makes every
    /// later admission a rejection.
    ///
    /// # Errors
    /// - `window_size > 0` and `lateness <= window_size`
    /// - a stream registered twice
    #[instrument(
        name = "synchronizer_configure",
        skip(self, config, sink),
        fields(
            lateness = config.lateness,
            window_size = config.window_size,
            streams = config.streams.len()
        )
    )]
    pub fn configure<S>(&mut self, config: SyncConfig<K>, sink: S) -> Result<(), ContractError>
    where
        S: ReleaseSink<T> + Send + 'static,
    {
        if config.window_size > 0 && config.lateness <= config.window_size {
            return Err(ContractError::config_validation(
                "lateness / window_size",
                format!(
                    "lateness ({}) must be > window_size ({})",
                    config.lateness, config.window_size
                ),
            ));
        }

        let mut seen = BTreeSet::new();
        for stream in &config.streams {
            if !seen.insert(stream) {
                return Err(ContractError::config_validation(
                    format!("streams[{stream}]"),
                    "duplicate stream id",
                ));
            }
        }

        if config.window_size == 0 {
            warn!("window size is zero, every admission will be rejected");
        }

        if self.buffered_count() > 0 {
            let released = self.force_drain();
            debug!(released, "drained previous configuration");
        }

        self.lateness = config.lateness;
        self.grid = WindowGrid::new(config.window_size);
        self.cursor = None;
        self.buffers = config
            .streams
            .into_iter()
            .map(|stream| (stream, StreamBuffer::new()))
            .collect();
        self.max_per_stream = config.buffer.max_per_stream;
        self.sink = Some(Box::new(sink));
        Ok(())
    }

    /// Admit one item and release whatever became ready.
    ///
    /// Returns the number of items handed to the sink by this call. Items of
    /// one stream must be admitted with non-decreasing timestamps; violations
    /// are counted, not rejected, and weaken ordering for that stream.
    ///
    /// # Errors
    /// A [`Rejected`] carrying the item back when the synchronizer is not
    /// configured, the timestamp is below the lateness floor, the stream is not
    /// registered, or the stream buffer is at capacity. Nothing changes.
    #[instrument(
        level = "trace",
        name = "synchronizer_admit",
        skip(self, item, stream),
        fields(stream = %stream, timestamp = timestamp)
    )]
    pub fn admit<Q>(&mut self, item: T, timestamp: u64, stream: &Q) -> Result<usize, Rejected<T>>
    where
        K: Borrow<Q>,
        Q: Ord + fmt::Display + ?Sized,
    {
        if self.grid.window_size() == 0 {
            return Err(self.reject(item, RejectReason::NotConfigured));
        }
        if timestamp < self.lateness {
            let reason = RejectReason::BeforeLateness {
                timestamp,
                lateness: self.lateness,
            };
            return Err(self.reject(item, reason));
        }

        let capacity = self.max_per_stream;
        let buffer = match self.buffers.get_mut(stream) {
            Some(buffer) => buffer,
            None => {
                let reason = RejectReason::UnknownStream {
                    stream: stream.to_string(),
                };
                return Err(self.reject(item, reason));
            }
        };
        if let Some(capacity) = capacity {
            if buffer.len() >= capacity {
                let reason = RejectReason::BufferFull {
                    stream: stream.to_string(),
                    capacity,
                };
                return Err(self.reject(item, reason));
            }
        }

        if buffer.push(item, timestamp) {
            self.counters.out_of_order += 1;
            debug!(
                stream = %stream,
                timestamp,
                "timestamp went backwards within stream"
            );
        }
        self.grid.start_at(timestamp);
        self.counters.admitted += 1;
        metrics::counter!("sync_items_admitted_total", "stream" => stream.to_string())
            .increment(1);

        let released = self.check_out(timestamp);
        metrics::gauge!("sync_buffered_items").set(self.buffered_count() as f64);
        Ok(released)
    }

    /// Release every buffered item, window by window, then return to the
    /// uninitialized state.
    ///
    /// Calling it on an empty synchronizer releases nothing.
    #[instrument(name = "synchronizer_force_drain", level = "debug", skip(self))]
    pub fn force_drain(&mut self) -> usize {
        let mut released = 0;

        while let Some(oldest) = self.oldest_front() {
            let idle = self.grid.idle_steps(oldest);
            self.grid.skip(idle);
            match self.grid.advance() {
                Some(boundary) => released += self.flush(boundary, ReleasePath::Drain),
                None => {
                    released += self.flush_all(ReleasePath::Drain);
                    break;
                }
            }
        }

        self.grid.reset();
        self.cursor = None;

        if released > 0 {
            self.counters.drains += 1;
            debug!(released, "forced drain complete");
            metrics::gauge!("sync_buffered_items").set(0.0);
        }
        released
    }

    /// Total items currently buffered across all streams
    pub fn buffered_count(&self) -> usize {
        self.buffers.values().map(StreamBuffer::len).sum()
    }

    /// Items currently buffered for one stream (`None` if unregistered)
    pub fn buffered_in<Q>(&self, stream: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.buffers.get(stream).map(StreamBuffer::len)
    }

    /// Lower edge of the open window (`None` while uninitialized)
    pub fn window_floor(&self) -> Option<u64> {
        self.grid.floor()
    }

    /// Latest high-water mark
    pub fn cursor(&self) -> Option<u64> {
        self.cursor
    }

    /// At least one item admitted since construction or the last drain
    pub fn is_active(&self) -> bool {
        self.grid.floor().is_some()
    }

    /// Non-zero window size and a sink installed
    pub fn is_configured(&self) -> bool {
        self.grid.window_size() > 0 && self.sink.is_some()
    }

    pub fn lateness(&self) -> u64 {
        self.lateness
    }

    pub fn window_size(&self) -> u64 {
        self.grid.window_size()
    }

    /// Registered streams in flush order
    pub fn streams(&self) -> impl Iterator<Item = &K> + '_ {
        self.buffers.keys()
    }

    /// Lifetime counters
    pub fn counters(&self) -> &SyncCounters {
        &self.counters
    }

    /// Get current buffer statistics
    #[instrument(name = "synchronizer_buffer_stats", level = "trace", skip(self))]
    pub fn buffer_stats(&self) -> BufferStats<K> {
        let mut stats = BufferStats {
            window_floor: self.grid.floor(),
            cursor: self.cursor,
            ..BufferStats::default()
        };

        for (stream, buffer) in &self.buffers {
            stats.buffer_depths.insert(stream.clone(), buffer.len());
            stats.total_items += buffer.len();

            if let Some(front) = buffer.front_timestamp() {
                let oldest = stats.oldest_timestamp.map_or(front, |o| o.min(front));
                stats.oldest_timestamp = Some(oldest);
            }
            if let Some(back) = buffer.back_timestamp() {
                let newest = stats.newest_timestamp.map_or(back, |n| n.max(back));
                stats.newest_timestamp = Some(newest);
            }
        }

        stats
    }

    /// Window advancement after a successful admission of timestamp `t`
    fn check_out(&mut self, t: u64) -> usize {
        let Some(floor) = self.grid.floor() else {
            return 0;
        };

        if t < floor {
            debug!(timestamp = t, window_floor = floor, "late arrival");
            return self.flush(floor, ReleasePath::LateArrival);
        }

        // Admission guarantees t >= lateness
        let cursor = t - self.lateness;
        self.cursor = Some(cursor);

        let mut released = self.advance_through(cursor);

        while self.can_release_early() {
            let Some(boundary) = self.grid.advance() else {
                break;
            };
            metrics::counter!("sync_window_advances_total", "path" => "opportunistic")
                .increment(1);
            released += self.flush(boundary, ReleasePath::Opportunistic);
        }

        released
    }

    /// Advance window by window until the floor passes `cursor`.
    ///
    /// Runs of windows that cannot release anything are skipped in one jump.
    fn advance_through(&mut self, cursor: u64) -> usize {
        let mut released = 0;

        loop {
            let pending = self.grid.steps_through(cursor);
            if pending == 0 {
                break;
            }

            let idle = match self.oldest_front() {
                Some(oldest) => self.grid.idle_steps(oldest).min(pending),
                None => pending,
            };
            if idle > 0 {
                self.grid.skip(idle);
                continue;
            }

            let Some(boundary) = self.grid.advance() else {
                break;
            };
            metrics::counter!("sync_window_advances_total", "path" => "lateness").increment(1);
            released += self.flush(boundary, ReleasePath::Lateness);
        }

        if let Some(floor) = self.grid.floor() {
            trace!(cursor, window_floor = floor, released, "lateness advance done");
        }
        released
    }

    /// Every stream non-empty with its front inside the next window
    fn can_release_early(&self) -> bool {
        let Some(horizon) = self.grid.horizon() else {
            return false;
        };
        !self.buffers.is_empty()
            && self
                .buffers
                .values()
                .all(|buffer| buffer.front_timestamp().is_some_and(|ts| ts <= horizon))
    }

    /// Smallest front timestamp across streams
    fn oldest_front(&self) -> Option<u64> {
        self.buffers
            .values()
            .filter_map(StreamBuffer::front_timestamp)
            .min()
    }

    /// Release, stream by stream, every front item strictly below `boundary`
    fn flush(&mut self, boundary: u64, path: ReleasePath) -> usize {
        self.release_while(path, |timestamp| timestamp < boundary)
    }

    /// Release everything regardless of timestamp
    fn flush_all(&mut self, path: ReleasePath) -> usize {
        self.release_while(path, |_| true)
    }

    fn release_while(&mut self, path: ReleasePath, ready: impl Fn(u64) -> bool) -> usize {
        let mut released = 0;

        for (stream, buffer) in self.buffers.iter_mut() {
            while let Some((timestamp, item)) = buffer.pop_front_if(&ready) {
                trace!(stream = %stream, timestamp, path = %path, "item released");
                if let Some(sink) = self.sink.as_mut() {
                    sink.receive(item);
                }
                released += 1;
            }
        }

        if released > 0 {
            *self.counters.released.entry(path).or_insert(0) += released as u64;
            metrics::counter!("sync_items_released_total", "path" => path.as_str())
                .increment(released as u64);
            metrics::histogram!("sync_release_batch_size").record(released as f64);
        }
        released
    }

    fn reject(&mut self, item: T, reason: RejectReason) -> Rejected<T> {
        *self
            .counters
            .rejected
            .entry(reason.label().to_string())
            .or_insert(0) += 1;
        metrics::counter!("sync_items_rejected_total", "reason" => reason.label()).increment(1);
        trace!(%reason, "admission rejected");
        Rejected::new(item, reason)
    }
}

impl<T, K: StreamKey> Drop for Synchronizer<T, K> {
    fn drop(&mut self) {
        let released = self.force_drain();
        if released > 0 {
            debug!(released, "synchronizer dropped with buffered items");
        }
    }
}
