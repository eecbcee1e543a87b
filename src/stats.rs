//! Request statistics for the prediction service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Counters and latencies of served requests
pub struct ServiceStats {
    /// Total predictions produced
    pub predictions: AtomicU64,
    /// Predictions with a YES decision
    pub yes_decisions: AtomicU64,
    /// Failed requests by error kind
    failures: RwLock<HashMap<String, u64>>,
    /// Prediction latencies (in microseconds)
    latencies: RwLock<Vec<u64>>,
    /// Probability distribution buckets
    probability_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

impl ServiceStats {
    pub fn new() -> Self {
        Self {
            predictions: AtomicU64::new(0),
            yes_decisions: AtomicU64::new(0),
            failures: RwLock::new(HashMap::new()),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            probability_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a successful prediction
    pub fn record_prediction(&self, latency: Duration, decision: bool, probability: Option<f64>) {
        self.predictions.fetch_add(1, Ordering::Relaxed);
        if decision {
            self.yes_decisions.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut times) = self.latencies.write() {
            times.push(latency.as_micros() as u64);
            // Keep only last 10000
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        if let Some(p) = probability {
            let bucket = (p.clamp(0.0, 1.0) * 10.0).min(9.0) as usize;
            if let Ok(mut buckets) = self.probability_buckets.write() {
                buckets[bucket] += 1;
            }
        }
    }

    /// Record a failed request
    pub fn record_failure(&self, kind: &str) {
        if let Ok(mut failures) = self.failures.write() {
            *failures.entry(kind.to_string()).or_insert(0) += 1;
        }
    }

    pub fn total_failures(&self) -> u64 {
        self.failures
            .read()
            .map(|f| f.values().sum())
            .unwrap_or(0)
    }

    pub fn failures_by_kind(&self) -> HashMap<String, u64> {
        self.failures.read().map(|f| f.clone()).unwrap_or_default()
    }

    /// Share of predictions that said YES
    pub fn yes_rate(&self) -> f64 {
        let total = self.predictions.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        self.yes_decisions.load(Ordering::Relaxed) as f64 / total as f64
    }

    /// Get latency statistics
    pub fn latency_stats(&self) -> LatencyStats {
        let times = match self.latencies.read() {
            Ok(times) => times,
            Err(_) => return LatencyStats::default(),
        };
        if times.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p99_us: sorted[((count as f64 * 0.99) as usize).min(count - 1)],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    pub fn probability_distribution(&self) -> [u64; 10] {
        self.probability_buckets
            .read()
            .map(|b| *b)
            .unwrap_or_default()
    }

    /// Log summary statistics
    pub fn log_summary(&self) {
        let predictions = self.predictions.load(Ordering::Relaxed);
        let latency = self.latency_stats();
        let elapsed = self.start_time.elapsed().as_secs_f64();

        info!(
            predictions = predictions,
            yes_rate = format!("{:.1}%", self.yes_rate() * 100.0),
            failures = self.total_failures(),
            uptime_s = format!("{:.0}", elapsed),
            mean_us = latency.mean_us,
            p50_us = latency.p50_us,
            p99_us = latency.p99_us,
            max_us = latency.max_us,
            "Prediction service summary"
        );

        for (kind, count) in self.failures_by_kind() {
            info!(kind = %kind, count = count, "Failures by kind");
        }

        let distribution = self.probability_distribution();
        let total: u64 = distribution.iter().sum();
        if total > 0 {
            for (i, &count) in distribution.iter().enumerate() {
                let pct = (count as f64 / total as f64) * 100.0;
                info!(
                    "  p(YES) {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                    i as f64 / 10.0,
                    (i + 1) as f64 / 10.0,
                    count,
                    pct,
                    "█".repeat(((pct / 5.0) as usize).min(20))
                );
            }
        }
    }
}

impl Default for ServiceStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency statistics
#[derive(Debug, Default)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_recording() {
        let stats = ServiceStats::new();

        stats.record_prediction(Duration::from_micros(100), true, Some(0.8));
        stats.record_prediction(Duration::from_micros(300), false, None);
        stats.record_failure("schema_mismatch");
        stats.record_failure("schema_mismatch");
        stats.record_failure("invalid_request");

        assert_eq!(stats.predictions.load(Ordering::Relaxed), 2);
        assert_eq!(stats.yes_rate(), 0.5);
        assert_eq!(stats.total_failures(), 3);
        assert_eq!(stats.failures_by_kind().get("schema_mismatch"), Some(&2));
        assert_eq!(stats.probability_distribution()[8], 1);
    }

    #[test]
    fn test_latency_stats() {
        let stats = ServiceStats::new();
        assert_eq!(stats.latency_stats().count, 0);

        for us in [100, 200, 300] {
            stats.record_prediction(Duration::from_micros(us), false, Some(0.1));
        }
        let latency = stats.latency_stats();
        assert_eq!(latency.count, 3);
        assert_eq!(latency.mean_us, 200);
        assert_eq!(latency.p50_us, 200);
        assert_eq!(latency.max_us, 300);
    }
}
