//! 同步器指标收集模块
//!
//! 基于 BufferStats / SyncCounters 收集和统计同步器的运行指标。

use std::collections::BTreeMap;
use std::fmt;

use contracts::{BufferStats, ReleasePath, StreamKey, SyncCounters};
use metrics::{counter, gauge, histogram};

/// 从 BufferStats 记录缓冲区指标
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_buffer_stats;
///
/// sync.admit(item, ts, "camera")?;
/// record_buffer_stats(&sync.buffer_stats());
/// ```
pub fn record_buffer_stats<K: StreamKey>(stats: &BufferStats<K>) {
    gauge!("sync_buffered_items").set(stats.total_items as f64);

    for (stream, depth) in &stats.buffer_depths {
        gauge!("sync_buffer_depth", "stream" => stream.to_string()).set(*depth as f64);
    }

    if let Some(floor) = stats.window_floor {
        gauge!("sync_window_floor").set(floor as f64);
    }

    // 缓冲区跨度 (最新 - 最旧)
    if let (Some(oldest), Some(newest)) = (stats.oldest_timestamp, stats.newest_timestamp) {
        gauge!("sync_buffer_span").set(newest.saturating_sub(oldest) as f64);
    }
}

/// 记录一次 admit / drain 释放的条目数
pub fn record_release_batch(released: usize) {
    histogram!("sync_admit_release_count").record(released as f64);
}

/// 把生命周期计数器导出为 gauge (用于进程退出前的快照)
pub fn record_counters(counters: &SyncCounters) {
    gauge!("sync_lifetime_admitted").set(counters.admitted as f64);
    gauge!("sync_lifetime_rejected").set(counters.total_rejected() as f64);
    gauge!("sync_lifetime_out_of_order").set(counters.out_of_order as f64);
    for path in ReleasePath::ALL {
        gauge!("sync_lifetime_released", "path" => path.as_str())
            .set(counters.released_by(path) as f64);
    }
    counter!("sync_counter_snapshots_total").increment(1);
}

/// 释放指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct ReleaseMetricsAggregator {
    /// 观测次数 (admit / drain 调用)
    pub total_calls: u64,

    /// 释放总数
    pub total_released: u64,

    /// 未释放任何条目的调用次数
    pub idle_calls: u64,

    /// 每次调用释放数量统计
    pub batch_stats: RunningStats,

    /// 总缓冲深度统计
    pub depth_stats: RunningStats,

    /// 各流缓冲深度峰值
    pub peak_depths: BTreeMap<String, usize>,
}

impl ReleaseMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次调用的释放数量
    pub fn observe_release(&mut self, released: usize) {
        self.total_calls += 1;
        self.total_released += released as u64;
        if released == 0 {
            self.idle_calls += 1;
        }
        self.batch_stats.push(released as f64);
    }

    /// 记录一次缓冲区快照
    pub fn observe_buffer<K: StreamKey>(&mut self, stats: &BufferStats<K>) {
        self.depth_stats.push(stats.total_items as f64);
        for (stream, depth) in &stats.buffer_depths {
            let peak = self.peak_depths.entry(stream.to_string()).or_insert(0);
            *peak = (*peak).max(*depth);
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_calls: self.total_calls,
            total_released: self.total_released,
            idle_rate: if self.total_calls > 0 {
                self.idle_calls as f64 / self.total_calls as f64 * 100.0
            } else {
                0.0
            },
            batch_size: StatsSummary::from(&self.batch_stats),
            buffer_depth: StatsSummary::from(&self.depth_stats),
            peak_depths: self.peak_depths.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_calls: u64,
    pub total_released: u64,
    pub idle_rate: f64,
    pub batch_size: StatsSummary,
    pub buffer_depth: StatsSummary,
    pub peak_depths: BTreeMap<String, usize>,
}

impl fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Sync Release Summary ===")?;
        writeln!(f, "Calls: {}", self.total_calls)?;
        writeln!(f, "Released items: {}", self.total_released)?;
        writeln!(f, "Calls without release: {:.2}%", self.idle_rate)?;
        writeln!(f, "Release batch size: {}", self.batch_size)?;
        writeln!(f, "Buffered items: {}", self.buffer_depth)?;

        if !self.peak_depths.is_empty() {
            writeln!(f, "Peak depth per stream:")?;
            for (stream, depth) in &self.peak_depths {
                writeln!(f, "  {}: {}", stream, depth)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::StreamId;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();

        for value in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(value);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_release_batches() {
        let mut aggregator = ReleaseMetricsAggregator::new();

        aggregator.observe_release(0);
        aggregator.observe_release(3);
        aggregator.observe_release(0);
        aggregator.observe_release(1);

        let summary = aggregator.summary();
        assert_eq!(summary.total_calls, 4);
        assert_eq!(summary.total_released, 4);
        assert!((summary.idle_rate - 50.0).abs() < 1e-10);
        assert!((summary.batch_size.max - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_tracks_peak_depth() {
        let mut aggregator = ReleaseMetricsAggregator::new();

        let mut stats: BufferStats<StreamId> = BufferStats::default();
        stats.buffer_depths.insert("camera".into(), 4);
        stats.total_items = 4;
        aggregator.observe_buffer(&stats);

        stats.buffer_depths.insert("camera".into(), 1);
        stats.buffer_depths.insert("lidar".into(), 2);
        stats.total_items = 3;
        aggregator.observe_buffer(&stats);

        assert_eq!(aggregator.peak_depths.get("camera"), Some(&4));
        assert_eq!(aggregator.peak_depths.get("lidar"), Some(&2));
        assert_eq!(aggregator.depth_stats.count(), 2);
    }

    #[test]
    fn test_summary_display() {
        let summary = MetricsSummary {
            total_calls: 100,
            total_released: 80,
            idle_rate: 25.0,
            batch_size: StatsSummary {
                count: 100,
                min: 0.0,
                max: 6.0,
                mean: 0.8,
                std_dev: 1.1,
            },
            buffer_depth: StatsSummary::default(),
            peak_depths: BTreeMap::from([("camera".to_string(), 12)]),
        };

        let output = format!("{}", summary);
        assert!(output.contains("Released items: 80"));
        assert!(output.contains("25.00%"));
        assert!(output.contains("camera: 12"));
        assert!(output.contains("Buffered items: N/A"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_release_batch(3);
        record_buffer_stats(&BufferStats::<StreamId>::default());
        record_counters(&SyncCounters::default());
    }
}
