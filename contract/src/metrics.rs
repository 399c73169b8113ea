//! Metrics collection for contract monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokenledger_common::LedgerError;

/// Invocation metrics.
pub struct Metrics {
    /// Total invocations received.
    pub invocations_total: AtomicU64,
    /// State-changing invocations committed.
    pub invocations_committed: AtomicU64,
    /// Invocations rejected by the ledger (validation, authorization,
    /// balance, duplicates).
    pub invocations_rejected: AtomicU64,
    /// Invocations that failed in the store.
    pub invocations_failed: AtomicU64,
    /// Read-only invocations served.
    pub queries_total: AtomicU64,
    /// Replays rejected as duplicates.
    pub duplicates_rejected: AtomicU64,
    /// Commits aborted by read-set validation.
    pub commit_conflicts: AtomicU64,
    /// Re-executions after a conflict.
    pub commit_retries: AtomicU64,
}

impl Metrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self {
            invocations_total: AtomicU64::new(0),
            invocations_committed: AtomicU64::new(0),
            invocations_rejected: AtomicU64::new(0),
            invocations_failed: AtomicU64::new(0),
            queries_total: AtomicU64::new(0),
            duplicates_rejected: AtomicU64::new(0),
            commit_conflicts: AtomicU64::new(0),
            commit_retries: AtomicU64::new(0),
        }
    }

    pub fn invocation_received(&self) {
        self.invocations_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn invocation_committed(&self) {
        self.invocations_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn query_served(&self) {
        self.queries_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn commit_conflicted(&self) {
        self.commit_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn commit_retried(&self) {
        self.commit_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an invocation that ended in `error`.
    pub fn invocation_errored(&self, error: &LedgerError) {
        match error {
            LedgerError::Store(_) => {
                self.invocations_failed.fetch_add(1, Ordering::Relaxed);
            }
            LedgerError::DuplicateTransaction { .. } => {
                self.duplicates_rejected.fetch_add(1, Ordering::Relaxed);
                self.invocations_rejected.fetch_add(1, Ordering::Relaxed);
            }
            _ => {
                self.invocations_rejected.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            invocations_total: self.invocations_total.load(Ordering::Relaxed),
            invocations_committed: self.invocations_committed.load(Ordering::Relaxed),
            invocations_rejected: self.invocations_rejected.load(Ordering::Relaxed),
            invocations_failed: self.invocations_failed.load(Ordering::Relaxed),
            queries_total: self.queries_total.load(Ordering::Relaxed),
            duplicates_rejected: self.duplicates_rejected.load(Ordering::Relaxed),
            commit_conflicts: self.commit_conflicts.load(Ordering::Relaxed),
            commit_retries: self.commit_retries.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            r#"# HELP tokenledger_invocations_total Total number of invocations
# TYPE tokenledger_invocations_total counter
tokenledger_invocations_total {}

# HELP tokenledger_invocations_committed State-changing invocations committed
# TYPE tokenledger_invocations_committed counter
tokenledger_invocations_committed {}

# HELP tokenledger_invocations_rejected Invocations rejected by the ledger
# TYPE tokenledger_invocations_rejected counter
tokenledger_invocations_rejected {}

# HELP tokenledger_invocations_failed Invocations failed in the store
# TYPE tokenledger_invocations_failed counter
tokenledger_invocations_failed {}

# HELP tokenledger_queries_total Read-only invocations served
# TYPE tokenledger_queries_total counter
tokenledger_queries_total {}

# HELP tokenledger_duplicates_rejected Replayed transactions rejected
# TYPE tokenledger_duplicates_rejected counter
tokenledger_duplicates_rejected {}

# HELP tokenledger_commit_conflicts Commits aborted by read conflicts
# TYPE tokenledger_commit_conflicts counter
tokenledger_commit_conflicts {}

# HELP tokenledger_commit_retries Invocations re-executed after a conflict
# TYPE tokenledger_commit_retries counter
tokenledger_commit_retries {}
"#,
            snapshot.invocations_total,
            snapshot.invocations_committed,
            snapshot.invocations_rejected,
            snapshot.invocations_failed,
            snapshot.queries_total,
            snapshot.duplicates_rejected,
            snapshot.commit_conflicts,
            snapshot.commit_retries,
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub invocations_total: u64,
    pub invocations_committed: u64,
    pub invocations_rejected: u64,
    pub invocations_failed: u64,
    pub queries_total: u64,
    pub duplicates_rejected: u64,
    pub commit_conflicts: u64,
    pub commit_retries: u64,
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<Metrics>;

#[cfg(test)]
mod tests {
    use super::*;
    use tokenledger_common::{AssetId, StoreError, TxnId};

    #[test]
    fn test_metrics_increment() {
        let metrics = Metrics::new();

        metrics.invocation_received();
        metrics.invocation_received();
        metrics.invocation_committed();
        metrics.invocation_errored(&LedgerError::DuplicateTransaction {
            txn_id: TxnId::new("t1"),
            asset_id: AssetId::new("TOKEN1"),
        });

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.invocations_total, 2);
        assert_eq!(snapshot.invocations_committed, 1);
        assert_eq!(snapshot.invocations_rejected, 1);
        assert_eq!(snapshot.duplicates_rejected, 1);
    }

    #[test]
    fn test_conflicts_counted_as_failures() {
        let metrics = Metrics::new();
        metrics.commit_conflicted();
        metrics.commit_retried();
        metrics.commit_conflicted();
        metrics.invocation_errored(&LedgerError::Store(StoreError::Conflict {
            key: "TOKEN1".to_string(),
        }));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.invocations_failed, 1);
        assert_eq!(snapshot.commit_conflicts, 2);
        assert_eq!(snapshot.commit_retries, 1);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = Metrics::new();
        metrics.invocation_received();

        let output = metrics.to_prometheus();
        assert!(output.contains("tokenledger_invocations_total 1"));
    }
}
