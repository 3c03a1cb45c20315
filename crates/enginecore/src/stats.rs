//! Ring statistics: lifetime counters plus an in-process latency histogram
//! for `locate`. Load distribution is derived on demand from the registry
//! rather than accumulated.

use crate::registry::NodeRegistry;

const BUCKET_BOUNDS_NS: [u64; 12] =
    [100, 500, 1_000, 5_000, 10_000, 50_000, 100_000, 500_000, 1_000_000, 5_000_000, 10_000_000, u64::MAX];

#[derive(Clone, Debug, Default)]
pub struct LatencyHistogram {
    buckets: [u64; 12],
    sum_ns: u64,
    count: u64,
    max_ns: u64,
}

impl LatencyHistogram {
    pub fn record(&mut self, ns: u64) {
        self.sum_ns += ns;
        self.count += 1;
        self.max_ns = self.max_ns.max(ns);
        let idx = BUCKET_BOUNDS_NS.iter().position(|&b| ns <= b).unwrap_or(BUCKET_BOUNDS_NS.len() - 1);
        self.buckets[idx] += 1;
    }

    pub fn avg_ns(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.sum_ns / self.count
        }
    }

    pub fn max_ns(&self) -> u64 {
        self.max_ns
    }

    /// Approximate p99 from the fixed-bucket histogram: the upper bound of
    /// the bucket containing the 99th-percentile sample.
    pub fn p99_ns(&self) -> u64 {
        if self.count == 0 {
            return 0;
        }
        let target = (self.count as f64 * 0.99).ceil() as u64;
        let mut seen = 0u64;
        for (i, &b) in self.buckets.iter().enumerate() {
            seen += b;
            if seen >= target {
                return BUCKET_BOUNDS_NS[i];
            }
        }
        self.max_ns
    }
}

#[derive(Clone, Debug, Default)]
pub struct RingStats {
    pub locate_ops: u64,
    pub write_ops: u64,
    pub read_ops: u64,
    pub rebalance_moves: u64,
    pub locate_latency: LatencyHistogram,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LoadDistribution {
    pub load_variance: f64,
    pub max_node_load: f64,
    pub min_node_load: f64,
}

/// Derives load-distribution stats on demand from current node load samples;
/// never accumulated over time.
pub fn load_distribution(registry: &NodeRegistry) -> LoadDistribution {
    let loads: Vec<f64> = registry
        .iter()
        .map(|n| (n.load.cpu_usage + n.load.memory_usage + n.load.disk_usage) / 3.0)
        .collect();
    if loads.is_empty() {
        return LoadDistribution::default();
    }
    let mean = loads.iter().sum::<f64>() / loads.len() as f64;
    let variance = loads.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / loads.len() as f64;
    let max = loads.iter().cloned().fold(f64::MIN, f64::max);
    let min = loads.iter().cloned().fold(f64::MAX, f64::min);
    LoadDistribution { load_variance: variance, max_node_load: max, min_node_load: min }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_tracks_avg_and_max() {
        let mut h = LatencyHistogram::default();
        for ns in [100u64, 200, 300, 10_000] {
            h.record(ns);
        }
        assert_eq!(h.max_ns(), 10_000);
        assert_eq!(h.avg_ns(), (100 + 200 + 300 + 10_000) / 4);
    }

    #[test]
    fn p99_is_monotonic_with_more_high_samples() {
        let mut h = LatencyHistogram::default();
        for _ in 0..99 {
            h.record(50);
        }
        h.record(1_000_000);
        assert!(h.p99_ns() >= 50);
    }

    #[test]
    fn empty_registry_has_zero_distribution() {
        let reg = NodeRegistry::new();
        let dist = load_distribution(&reg);
        assert_eq!(dist.load_variance, 0.0);
    }
}
