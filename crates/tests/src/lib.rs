//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置加载 -> 同步器 的跨 crate 测试
//! - 随机化的释放不变量测试
//! - 多生产者 (线程 / tokio 任务) 场景

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{RejectReason, StreamId, SyncConfig};
    use sync_engine::{Synchronizer, VecSink};

    const TRACE_CONFIG: &str = r#"
lateness = 100
window_size = 20
streams = ["A", "B"]
"#;

    fn load_trace_config() -> SyncConfig {
        ConfigLoader::load_from_str(TRACE_CONFIG, ConfigFormat::Toml).unwrap()
    }

    #[test]
    fn test_loaded_config_drives_synchronizer() {
        let sink = VecSink::new();
        let mut sync = Synchronizer::with_config(load_trace_config(), sink.clone()).unwrap();

        assert_eq!(sync.lateness(), 100);
        assert_eq!(sync.window_size(), 20);
        let streams: Vec<&StreamId> = sync.streams().collect();
        assert_eq!(streams, ["A", "B"]);

        assert_eq!(sync.admit(("A", 110), 110, "A").unwrap(), 0);
        assert_eq!(sync.admit(("A", 130), 130, "A").unwrap(), 0);
        assert_eq!(sync.admit(("B", 115), 115, "B").unwrap(), 2);
        assert_eq!(sync.admit(("A", 215), 215, "A").unwrap(), 0);

        assert_eq!(sink.take(), vec![("A", 110), ("B", 115)]);
        assert_eq!(sync.buffered_in("A"), Some(2));
        assert_eq!(sync.buffered_in("B"), Some(0));

        assert_eq!(sync.force_drain(), 2);
        assert_eq!(sink.take(), vec![("A", 130), ("A", 215)]);
        assert_eq!(sync.force_drain(), 0);
    }

    #[test]
    fn test_trace_below_lateness_is_rejected() {
        let sink = VecSink::new();
        let mut sync = Synchronizer::with_config(load_trace_config(), sink.clone()).unwrap();

        for (ts, stream) in [(10, "A"), (30, "A"), (15, "B")] {
            let rejected = sync.admit(ts, ts, stream).unwrap_err();
            assert_eq!(rejected.item, ts);
            assert!(matches!(
                rejected.reason,
                RejectReason::BeforeLateness { lateness: 100, .. }
            ));
        }

        assert_eq!(sync.admit(115, 115, "A").unwrap(), 0);
        assert_eq!(sync.buffered_count(), 1);
        assert!(sink.is_empty());
        assert_eq!(sync.counters().total_rejected(), 3);
    }

    #[test]
    fn test_json_round_trip_feeds_same_behavior() {
        let json = ConfigLoader::to_json(&load_trace_config()).unwrap();
        let config: SyncConfig = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();

        let sink = VecSink::new();
        let mut sync = Synchronizer::with_config(config, sink.clone()).unwrap();
        sync.admit(1u32, 110, "A").unwrap();
        sync.admit(2u32, 115, "B").unwrap();
        assert_eq!(sink.take(), vec![1, 2]);
    }

    #[test]
    fn test_capacity_from_config_file() {
        let content = r#"
lateness = 100
window_size = 20
streams = ["A", "B"]

[buffer]
max_per_stream = 2
"#;
        let config: SyncConfig = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap();
        let mut sync = Synchronizer::with_config(config, VecSink::new()).unwrap();

        sync.admit(0u8, 110, "A").unwrap();
        sync.admit(1u8, 111, "A").unwrap();
        let rejected = sync.admit(2u8, 112, "A").unwrap_err();
        assert_eq!(rejected.item, 2);
        assert_eq!(rejected.reason.label(), "buffer_full");
        assert_eq!(sync.buffered_count(), 2);
    }

    #[test]
    fn test_reconfigure_drains_into_previous_sink() {
        let first = VecSink::new();
        let second = VecSink::new();
        let mut sync = Synchronizer::with_config(load_trace_config(), first.clone()).unwrap();

        sync.admit(7u32, 150, "A").unwrap();
        sync.configure(load_trace_config(), second.clone()).unwrap();

        assert_eq!(first.take(), vec![7]);
        assert!(!sync.is_active());
        sync.admit(8u32, 150, "A").unwrap();
        drop(sync);
        assert_eq!(second.take(), vec![8]);
    }
}

#[cfg(test)]
mod property_tests {
    use std::collections::BTreeMap;

    use contracts::{StreamId, SyncConfig};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use sync_engine::{Synchronizer, VecSink};

    /// (stream index, per-stream sequence, timestamp)
    type Tagged = (usize, u64, u64);

    struct Scenario {
        config: SyncConfig,
        items: Vec<Tagged>,
    }

    /// Random interleaving of streams whose own timestamps never go backwards
    fn scenario(seed: u64) -> Scenario {
        let mut rng = StdRng::seed_from_u64(seed);

        let window_size = rng.random_range(1..=40u64);
        let lateness = window_size + rng.random_range(1..=200u64);
        let stream_count = rng.random_range(1..=4usize);
        let streams: Vec<StreamId> = (0..stream_count)
            .map(|idx| StreamId::from(format!("s{idx}")))
            .collect();

        let mut clock = lateness + rng.random_range(0..1_000u64);
        let mut last = vec![0u64; stream_count];
        let mut seq = vec![0u64; stream_count];
        let mut items = Vec::new();

        for _ in 0..rng.random_range(50..400usize) {
            clock += rng.random_range(0..=window_size * 2);
            // occasional long silence across every stream
            if rng.random_bool(0.02) {
                clock += rng.random_range(0..50_000u64);
            }

            let stream = rng.random_range(0..stream_count);
            let jitter = rng.random_range(0..=lateness);
            let ts = clock.saturating_sub(jitter).max(lateness).max(last[stream]);
            last[stream] = ts;

            items.push((stream, seq[stream], ts));
            seq[stream] += 1;
        }

        Scenario {
            config: SyncConfig::new(lateness, window_size, streams),
            items,
        }
    }

    fn run_scenario(seed: u64) {
        let Scenario { config, items } = scenario(seed);
        let names = config.streams.clone();
        let sink: VecSink<Tagged> = VecSink::new();
        let mut sync = Synchronizer::with_config(config, sink.clone()).unwrap();

        let mut released: Vec<Tagged> = Vec::new();

        for &(stream, seq, ts) in &items {
            let count = sync
                .admit((stream, seq, ts), ts, &names[stream])
                .unwrap_or_else(|rejected| panic!("seed {seed}: {rejected}"));

            let batch = sink.take();
            assert_eq!(batch.len(), count, "seed {seed}: return value vs sink");

            let floor = sync.window_floor().unwrap();
            for &(_, _, released_ts) in &batch {
                assert!(
                    released_ts < floor,
                    "seed {seed}: released ts {released_ts} not below floor {floor}"
                );
            }
            if let Some(cursor) = sync.cursor() {
                assert!(floor > cursor, "seed {seed}: floor {floor} <= cursor {cursor}");
            }
            if let Some(oldest) = sync.buffer_stats().oldest_timestamp {
                assert!(
                    oldest >= floor,
                    "seed {seed}: buffered ts {oldest} below floor {floor}"
                );
            }
            released.extend(batch);
        }

        sync.force_drain();
        released.extend(sink.take());

        assert_eq!(sync.buffered_count(), 0, "seed {seed}");
        assert!(!sync.is_active(), "seed {seed}");
        assert_eq!(released.len(), items.len(), "seed {seed}: exactly once");

        let mut per_stream: BTreeMap<usize, Vec<u64>> = BTreeMap::new();
        for (stream, seq, _) in released {
            per_stream.entry(stream).or_default().push(seq);
        }
        for (stream, seqs) in per_stream {
            let expected: Vec<u64> = (0..seqs.len() as u64).collect();
            assert_eq!(seqs, expected, "seed {seed}: order within stream {stream}");
        }
        assert_eq!(sync.counters().out_of_order, 0);
    }

    #[test]
    fn test_random_scenarios_hold_release_invariants() {
        for seed in 0..64 {
            run_scenario(seed);
        }
    }

    #[test]
    fn test_rejection_leaves_state_untouched() {
        let mut rng = StdRng::seed_from_u64(7);
        let sink = VecSink::new();
        let config = SyncConfig::new(100, 20, ["cam", "lidar"].map(StreamId::from));
        let mut sync = Synchronizer::with_config(config, sink.clone()).unwrap();

        for _ in 0..20 {
            let ts = 100 + rng.random_range(0..500u64);
            let stream = if rng.random_bool(0.5) { "cam" } else { "lidar" };
            sync.admit(ts, ts, stream).unwrap();
        }

        let before = sync.buffer_stats();
        let released_before = sink.len();

        assert!(sync.admit(1, 1, "cam").is_err());
        assert!(sync.admit(999, 999, "radar").is_err());

        assert_eq!(sync.buffer_stats(), before);
        assert_eq!(sink.len(), released_before);
    }
}

#[cfg(test)]
mod concurrency_tests {
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};
    use std::thread;

    use contracts::{StreamId, SyncConfig};
    use sync_engine::{ChannelSink, Synchronizer, VecSink};
    use tokio::sync::mpsc;

    const STREAMS: [&str; 3] = ["camera", "lidar", "imu"];
    const PER_STREAM: u64 = 200;

    fn config() -> SyncConfig {
        SyncConfig::new(50, 10, STREAMS.map(StreamId::from))
    }

    fn assert_per_stream_order(released: &[(usize, u64)]) {
        let mut per_stream: BTreeMap<usize, Vec<u64>> = BTreeMap::new();
        for &(stream, seq) in released {
            per_stream.entry(stream).or_default().push(seq);
        }
        assert_eq!(per_stream.len(), STREAMS.len());
        for seqs in per_stream.values() {
            assert_eq!(*seqs, (0..PER_STREAM).collect::<Vec<_>>());
        }
    }

    /// Producer threads sharing one synchronizer behind a mutex
    #[test]
    fn test_threads_behind_mutex() {
        let sink = VecSink::new();
        let sync = Arc::new(Mutex::new(
            Synchronizer::with_config(config(), sink.clone()).unwrap(),
        ));

        let handles: Vec<_> = STREAMS
            .into_iter()
            .enumerate()
            .map(|(idx, stream)| {
                let sync = Arc::clone(&sync);
                thread::spawn(move || {
                    for seq in 0..PER_STREAM {
                        let ts = 1_000 + seq * 5;
                        let mut guard = sync.lock().unwrap();
                        guard.admit((idx, seq), ts, stream).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let drained = sync.lock().unwrap().force_drain();
        let released = sink.take();
        assert!(drained <= released.len());
        assert_eq!(released.len() as u64, PER_STREAM * STREAMS.len() as u64);
        assert_per_stream_order(&released);
    }

    /// Producer tasks feeding one owning task over a channel
    #[tokio::test]
    async fn test_tokio_producers_feed_owning_task() {
        let (admit_tx, mut admit_rx) = mpsc::channel::<(usize, u64, u64)>(64);
        let (release_tx, mut release_rx) = mpsc::unbounded_channel();

        let owner = tokio::spawn(async move {
            let sink = ChannelSink::new(release_tx);
            let mut sync = Synchronizer::with_config(config(), sink).unwrap();
            while let Some((idx, seq, ts)) = admit_rx.recv().await {
                sync.admit((idx, seq), ts, STREAMS[idx]).unwrap();
            }
            let drained = sync.force_drain();
            (drained, sync.counters().admitted)
        });

        let producers: Vec<_> = (0..STREAMS.len())
            .map(|idx| {
                let tx = admit_tx.clone();
                tokio::spawn(async move {
                    for seq in 0..PER_STREAM {
                        let ts = 1_000 + seq * 5 + idx as u64;
                        tx.send((idx, seq, ts)).await.unwrap();
                        if seq % 16 == 0 {
                            tokio::task::yield_now().await;
                        }
                    }
                })
            })
            .collect();
        drop(admit_tx);

        for producer in producers {
            producer.await.unwrap();
        }
        let (_, admitted) = owner.await.unwrap();
        assert_eq!(admitted, PER_STREAM * STREAMS.len() as u64);

        let mut released = Vec::new();
        while let Some(item) = release_rx.recv().await {
            released.push(item);
        }
        assert_eq!(released.len() as u64, admitted);
        assert_per_stream_order(&released);
    }
}

#[cfg(test)]
mod observability_tests {
    use contracts::{StreamId, SyncConfig};
    use observability::{record_buffer_stats, record_release_batch, ReleaseMetricsAggregator};
    use sync_engine::{Synchronizer, VecSink};

    #[test]
    fn test_aggregator_follows_synchronizer_run() {
        let sink = VecSink::new();
        let config = SyncConfig::new(100, 20, ["A", "B"].map(StreamId::from));
        let mut sync = Synchronizer::with_config(config, sink.clone()).unwrap();
        let mut aggregator = ReleaseMetricsAggregator::new();

        for (ts, stream) in [(110, "A"), (130, "A"), (115, "B"), (215, "A")] {
            let released = sync.admit(ts, ts, stream).unwrap();
            record_release_batch(released);
            aggregator.observe_release(released);

            let stats = sync.buffer_stats();
            record_buffer_stats(&stats);
            aggregator.observe_buffer(&stats);
        }
        aggregator.observe_release(sync.force_drain());

        let summary = aggregator.summary();
        assert_eq!(summary.total_calls, 5);
        assert_eq!(summary.total_released, 4);
        assert_eq!(summary.peak_depths.get("A"), Some(&2));
        assert_eq!(summary.peak_depths.get("B"), Some(&0));
        assert_eq!(summary.total_released as usize, sink.len());
    }
}
