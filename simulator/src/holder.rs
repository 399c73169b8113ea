//! Simulated token holders.

use std::sync::Arc;

use tokio::sync::RwLock;

use tokenledger_common::{OwnerId, TxnId};
use tokenledger_ledger::{Caller, LedgerConfig};

/// A simulated holder with a shadow of the balance the ledger should report.
pub struct SimulatedHolder {
    /// Holder identifier.
    pub id: OwnerId,
    /// Display name.
    pub name: String,
    /// Identity the holder invokes with.
    pub caller: Caller,
    /// Expected balance. Signed: concurrent credits may land after debits.
    expected: Arc<RwLock<i128>>,
    sent: Arc<RwLock<Vec<TxnId>>>,
    received: Arc<RwLock<Vec<TxnId>>>,
}

impl SimulatedHolder {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            caller: Caller::new(id.clone()).with_msp("HolderMSP"),
            id: OwnerId::new(id),
            name: name.into(),
            expected: Arc::new(RwLock::new(0)),
            sent: Arc::new(RwLock::new(Vec::new())),
            received: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn expected_balance(&self) -> i128 {
        *self.expected.read().await
    }

    pub async fn credit(&self, amount: u64) {
        *self.expected.write().await += i128::from(amount);
    }

    pub async fn debit(&self, amount: u64) {
        *self.expected.write().await -= i128::from(amount);
    }

    pub async fn record_sent(&self, txn_id: TxnId) {
        self.sent.write().await.push(txn_id);
    }

    pub async fn record_received(&self, txn_id: TxnId) {
        self.received.write().await.push(txn_id);
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.read().await.len()
    }

    pub async fn received_count(&self) -> usize {
        self.received.read().await.len()
    }
}

/// Factory for holders and the fixed identities scenarios invoke with.
pub struct HolderFactory;

impl HolderFactory {
    /// Create N simulated holders.
    pub fn create_holders(count: usize) -> Vec<SimulatedHolder> {
        let names = [
            ("alice", "Alice"),
            ("bob", "Bob"),
            ("carol", "Carol"),
            ("dave", "Dave"),
            ("erin", "Erin"),
            ("frank", "Frank"),
            ("grace", "Grace"),
            ("heidi", "Heidi"),
            ("ivan", "Ivan"),
            ("judy", "Judy"),
        ];

        (0..count)
            .map(|i| match names.get(i) {
                Some((id, name)) => SimulatedHolder::new(*id, *name),
                None => SimulatedHolder::new(format!("holder-{}", i + 1), format!("Holder {}", i + 1)),
            })
            .collect()
    }

    /// Caller holding both the issuer organization and the minter role.
    pub fn issuer(config: &LedgerConfig) -> Caller {
        Caller::new("issuer-admin")
            .with_msp(config.issuer_org.clone())
            .with_attribute(config.role_attribute.clone(), config.minter_role.clone())
    }

    /// Caller from a foreign organization without any role.
    pub fn outsider() -> Caller {
        Caller::new("mallory").with_msp("OutsiderMSP")
    }
}
