//! Simulation metrics.

use std::collections::VecDeque;

/// Simulation metrics.
#[derive(Debug, Clone)]
pub struct SimulationMetrics {
    /// Operations submitted.
    pub total_operations: u64,
    /// Operations committed.
    pub committed: u64,
    /// Operations rejected by the ledger.
    pub rejected: u64,
    /// Operations that failed in the store, retries exhausted included.
    pub failed: u64,
    /// Re-executions after commit conflicts.
    pub retries: u64,
    /// Latency samples (us).
    latency_samples: VecDeque<u64>,
    /// Maximum samples to keep.
    max_samples: usize,
}

impl SimulationMetrics {
    pub fn new() -> Self {
        Self {
            total_operations: 0,
            committed: 0,
            rejected: 0,
            failed: 0,
            retries: 0,
            latency_samples: VecDeque::with_capacity(10000),
            max_samples: 10000,
        }
    }

    /// Record a committed operation and the attempts it took.
    pub fn record_commit(&mut self, latency_us: u64, attempts: u32) {
        self.total_operations += 1;
        self.committed += 1;
        self.retries += u64::from(attempts.saturating_sub(1));

        if self.latency_samples.len() >= self.max_samples {
            self.latency_samples.pop_front();
        }
        self.latency_samples.push_back(latency_us);
    }

    pub fn record_rejection(&mut self) {
        self.total_operations += 1;
        self.rejected += 1;
    }

    pub fn record_failure(&mut self) {
        self.total_operations += 1;
        self.failed += 1;
    }

    pub fn average_latency_us(&self) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let sum: u64 = self.latency_samples.iter().sum();
        sum / self.latency_samples.len() as u64
    }

    pub fn p50_latency_us(&self) -> u64 {
        self.percentile_latency(50)
    }

    pub fn p99_latency_us(&self) -> u64 {
        self.percentile_latency(99)
    }

    fn percentile_latency(&self, percentile: usize) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let mut sorted: Vec<_> = self.latency_samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = (sorted.len() * percentile / 100).min(sorted.len() - 1);
        sorted[idx]
    }

    /// Share of submitted operations that committed.
    pub fn commit_rate(&self) -> f64 {
        if self.total_operations == 0 {
            return 0.0;
        }

        self.committed as f64 / self.total_operations as f64
    }

    /// Operations per second over `elapsed_secs`.
    pub fn throughput(&self, elapsed_secs: f64) -> f64 {
        if elapsed_secs <= 0.0 {
            return 0.0;
        }

        self.total_operations as f64 / elapsed_secs
    }
}

impl Default for SimulationMetrics {
    fn default() -> Self {
        Self::new()
    }
}
