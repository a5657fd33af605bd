//! Replay Demo
//!
//! Several simulated sensor streams produce timestamped frames on their own
//! tokio tasks. A single owning task admits them into the synchronizer and the
//! released frames are consumed through a channel sink.
//!
//! Run with: cargo run -p sync_demos --bin replay_demo [config_path]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use config_loader::ConfigLoader;
use contracts::{StreamId, SyncConfig};
use observability::{LogFormat, ObservabilityConfig, ReleaseMetricsAggregator};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sync_engine::{ChannelSink, Synchronizer};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// First timestamp produced by every stream (microseconds)
const START_US: u64 = 1_000_000;
/// Simulated run length (microseconds)
const DURATION_US: u64 = 2_000_000;
/// Real time runs this many times faster than timestamps
const SPEEDUP: u64 = 20;

/// One simulated sensor frame
#[derive(Debug, Clone)]
struct Frame {
    stream: StreamId,
    seq: u64,
    timestamp: u64,
    payload: Bytes,
}

/// Production profile for one stream
#[derive(Debug, Clone)]
struct StreamProfile {
    stream: StreamId,
    period_us: u64,
    payload_len: usize,
    /// Upper bound of random delivery delay (microseconds of simulated time)
    max_delay_us: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_with_config(ObservabilityConfig {
        default_log_level: "info".to_string(),
        ..ObservabilityConfig::logs_only(LogFormat::Compact)
    })?;

    info!("Starting replay demo");

    let config = load_config()?;
    info!(
        lateness = config.lateness,
        window_size = config.window_size,
        streams = config.streams.len(),
        "Sync config ready"
    );

    let profiles: Vec<StreamProfile> = config.streams.iter().map(profile_for).collect();

    // Owning task: the only place the synchronizer lives
    let (frame_tx, mut frame_rx) = mpsc::channel::<Frame>(256);
    let (release_tx, mut release_rx) = mpsc::unbounded_channel::<Frame>();

    let mut sync = Synchronizer::with_config(config, ChannelSink::new(release_tx))
        .context("Failed to configure synchronizer")?;

    let owner_handle = tokio::spawn(async move {
        let mut aggregator = ReleaseMetricsAggregator::new();

        while let Some(frame) = frame_rx.recv().await {
            let stream = frame.stream.clone();
            let timestamp = frame.timestamp;
            match sync.admit(frame, timestamp, &stream) {
                Ok(released) => {
                    observability::record_release_batch(released);
                    aggregator.observe_release(released);
                }
                Err(rejected) => {
                    warn!(
                        stream = %stream,
                        timestamp,
                        reason = %rejected.reason,
                        "Frame rejected"
                    );
                }
            }

            let stats = sync.buffer_stats();
            observability::record_buffer_stats(&stats);
            aggregator.observe_buffer(&stats);
        }

        let drained = sync.force_drain();
        aggregator.observe_release(drained);
        observability::record_counters(sync.counters());
        info!(drained, "Producers finished, synchronizer drained");

        (aggregator, sync.counters().clone())
    });

    // Consumer: released frames in window order
    let consumer_handle = tokio::spawn(async move {
        let mut per_stream: BTreeMap<StreamId, u64> = BTreeMap::new();
        let mut bytes_total = 0usize;
        let mut last_timestamp = 0u64;
        let mut regressions = 0u64;

        while let Some(frame) = release_rx.recv().await {
            debug!(
                stream = %frame.stream,
                seq = frame.seq,
                timestamp = frame.timestamp,
                "Frame released"
            );
            if frame.timestamp < last_timestamp {
                regressions += 1;
            }
            last_timestamp = last_timestamp.max(frame.timestamp);
            bytes_total += frame.payload.len();
            *per_stream.entry(frame.stream).or_insert(0) += 1;
        }

        (per_stream, bytes_total, regressions)
    });

    // Producers: one task per stream
    let producer_handles: Vec<_> = profiles
        .into_iter()
        .enumerate()
        .map(|(idx, profile)| {
            let tx = frame_tx.clone();
            tokio::spawn(produce(profile, idx as u64, tx))
        })
        .collect();
    drop(frame_tx);

    let mut produced = 0u64;
    for handle in producer_handles {
        produced += handle.await.context("Producer task panicked")?;
    }

    let (aggregator, counters) = owner_handle.await.context("Owner task panicked")?;
    let (per_stream, bytes_total, regressions) =
        consumer_handle.await.context("Consumer task panicked")?;

    info!(
        produced,
        admitted = counters.admitted,
        rejected = counters.total_rejected(),
        released = counters.total_released(),
        bytes_total,
        regressions,
        "Replay demo finished"
    );
    for (stream, count) in &per_stream {
        info!(stream = %stream, count, "Frames delivered");
    }
    println!("{}", aggregator.summary());

    Ok(())
}

/// Load the config named on the command line, falling back to the bundled one
fn load_config() -> Result<SyncConfig> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("demos/sync.toml"));

    if path.exists() {
        info!(path = %path.display(), "Loading sync config file");
        return ConfigLoader::load_from_path(&path)
            .with_context(|| format!("Failed to load {}", path.display()));
    }

    warn!(path = %path.display(), "Config file not found, using built-in defaults");
    let config = SyncConfig::new(
        50_000,
        10_000,
        ["front_camera", "top_lidar", "imu"].map(StreamId::from),
    );
    ConfigLoader::validate(&config)?;
    Ok(config)
}

/// Rates and sizes loosely modeled on a camera / lidar / IMU rig
fn profile_for(stream: &StreamId) -> StreamProfile {
    let (period_us, payload_len, max_delay_us) = if stream.contains("camera") {
        (33_333, 64 * 1024, 20_000)
    } else if stream.contains("lidar") {
        (100_000, 256 * 1024, 40_000)
    } else {
        (5_000, 64, 2_000)
    };

    StreamProfile {
        stream: stream.clone(),
        period_us,
        payload_len,
        max_delay_us,
    }
}

/// Emit frames for one stream until the simulated run ends.
///
/// Frames leave in timestamp order, each after a random delivery delay, so
/// streams interleave out of order relative to each other.
async fn produce(profile: StreamProfile, seed: u64, tx: mpsc::Sender<Frame>) -> u64 {
    let mut rng = StdRng::seed_from_u64(seed);
    let payload = Bytes::from(vec![0u8; profile.payload_len]);
    let mut seq = 0u64;
    let mut timestamp = START_US;

    while timestamp < START_US + DURATION_US {
        let delay_us = profile.period_us + rng.random_range(0..=profile.max_delay_us);
        tokio::time::sleep(Duration::from_micros(delay_us / SPEEDUP)).await;

        let frame = Frame {
            stream: profile.stream.clone(),
            seq,
            timestamp,
            payload: payload.clone(),
        };
        if tx.send(frame).await.is_err() {
            break;
        }

        seq += 1;
        timestamp += profile.period_us;
    }

    debug!(stream = %profile.stream, frames = seq, "Producer done");
    seq
}
