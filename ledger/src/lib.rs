//! TokenLedger Accounting Engine
//!
//! Mint, transfer and burn of fungible assets over a transactional
//! key-value store, with exactly-once application per `(txn id, asset id)`
//! and conservation of total supply.

pub mod auth;
pub mod balance;
pub mod config;
pub mod engine;
pub mod journal;
pub mod keys;
pub mod query;
pub mod store;
pub mod supply;

pub use auth::{AuthPolicy, AuthorizationGuard, Caller, CallerIdentity};
pub use balance::{BalanceChange, BalanceChangeType, BalanceLedger};
pub use config::LedgerConfig;
pub use engine::{Receipt, TokenLedger};
pub use journal::TransactionLedger;
pub use keys::{KeyCodec, StateKey};
pub use query::{QueryEngine, Records, SupplyAudit};
pub use store::{MemoryStore, MemoryTxn, Selector, StateStore, TransactionalStore};
pub use supply::SupplyTracker;
