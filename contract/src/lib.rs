//! TokenLedger Contract
//!
//! Hosts the accounting engine behind a function-name interface. Each
//! invocation runs in one store transaction that commits only on success.

pub mod config;
pub mod contract;
pub mod metrics;

pub use config::ContractConfig;
pub use contract::{Outcome, Submission, TokenContract};
pub use metrics::{Metrics, MetricsSnapshot, SharedMetrics};
