//! Core ledger engine implementation.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use tokenledger_common::{
    Amount, AssetId, BurnRequest, LedgerError, MintRequest, OwnerId, Result, TransactionRecord,
    TransferRequest, TxnId, TxnKind,
};

use crate::auth::{AuthorizationGuard, CallerIdentity};
use crate::balance::{BalanceChange, BalanceLedger};
use crate::config::LedgerConfig;
use crate::journal::TransactionLedger;
use crate::keys::KeyCodec;
use crate::query::QueryEngine;
use crate::store::StateStore;
use crate::supply::SupplyTracker;

/// Outcome of an applied operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// The stored transaction record.
    pub record: TransactionRecord,
    /// Balance mutations, in the order they were applied.
    pub changes: Vec<BalanceChange>,
    /// Total supply after a Mint or Burn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_supply: Option<Amount>,
}

/// The token ledger: Mint, Transfer and Burn workflows over a store view.
///
/// Each workflow runs its steps in a fixed order and stops at the first
/// failure. Writes go to the invocation's store view; whether they become
/// visible is decided by the host at commit. The engine keeps no state
/// between calls, so a workflow can be re-executed from scratch after the
/// host aborts a conflicting transaction.
#[derive(Debug, Clone)]
pub struct TokenLedger {
    config: LedgerConfig,
    guard: AuthorizationGuard,
    balances: BalanceLedger,
    supply: SupplyTracker,
    journal: TransactionLedger,
    queries: QueryEngine,
}

impl TokenLedger {
    /// Create a new ledger engine.
    pub fn new(config: LedgerConfig) -> Result<Self> {
        config.validate().map_err(LedgerError::invalid)?;
        let codec = KeyCodec::new(&config.doc_type)?;

        Ok(Self {
            guard: AuthorizationGuard::new(&config),
            balances: BalanceLedger::new(codec.clone()),
            supply: SupplyTracker::new(codec.clone()),
            journal: TransactionLedger::new(codec.clone()),
            queries: QueryEngine::new(codec),
            config,
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Read-only query surface.
    pub fn queries(&self) -> &QueryEngine {
        &self.queries
    }

    /// Current balance of one owner.
    pub fn balance_of<S>(&self, store: &S, asset_id: &AssetId, owner: &OwnerId) -> Result<Amount>
    where
        S: StateStore + ?Sized,
    {
        self.balances.read(store, asset_id, owner)
    }

    /// Create supply and credit it to the owner.
    #[instrument(
        skip(self, store, caller, request),
        fields(asset_id = %request.asset_id, txn_id = %request.txn_id, amount = %request.amount)
    )]
    pub fn mint<S, C>(&self, store: &mut S, caller: &C, request: &MintRequest) -> Result<Receipt>
    where
        S: StateStore + ?Sized,
        C: CallerIdentity + ?Sized,
    {
        let outcome = self.apply_mint(store, caller, request);
        log_outcome(TxnKind::Mint, &outcome);
        outcome
    }

    /// Move balance from sender to receiver.
    #[instrument(
        skip(self, store, caller, request),
        fields(asset_id = %request.asset_id, txn_id = %request.txn_id, amount = %request.amount)
    )]
    pub fn transfer<S, C>(&self, store: &mut S, caller: &C, request: &TransferRequest) -> Result<Receipt>
    where
        S: StateStore + ?Sized,
        C: CallerIdentity + ?Sized,
    {
        let outcome = self.apply_transfer(store, caller, request);
        log_outcome(TxnKind::Transfer, &outcome);
        outcome
    }

    /// Destroy supply held by the owner.
    #[instrument(
        skip(self, store, caller, request),
        fields(asset_id = %request.asset_id, txn_id = %request.txn_id, amount = %request.amount)
    )]
    pub fn burn<S, C>(&self, store: &mut S, caller: &C, request: &BurnRequest) -> Result<Receipt>
    where
        S: StateStore + ?Sized,
        C: CallerIdentity + ?Sized,
    {
        let outcome = self.apply_burn(store, caller, request);
        log_outcome(TxnKind::Burn, &outcome);
        outcome
    }

    fn apply_mint<S, C>(&self, store: &mut S, caller: &C, request: &MintRequest) -> Result<Receipt>
    where
        S: StateStore + ?Sized,
        C: CallerIdentity + ?Sized,
    {
        request.validate()?;
        self.guard.check(caller, TxnKind::Mint)?;
        self.journal.ensure_new(&*store, &request.txn_id, &request.asset_id)?;

        let issuer = caller.msp_id()?;
        let asset = self.supply.increase(
            &*store,
            &request.asset_id,
            &issuer,
            request.amount,
            &request.txn_id,
        )?;
        let credit = self
            .balances
            .credit(store, &request.asset_id, &request.owner, request.amount)?;
        self.supply.persist(store, &asset)?;

        let record = TransactionRecord::mint(
            request.txn_id.clone(),
            request.asset_id.clone(),
            request.owner.clone(),
            request.amount,
        );
        self.journal.record(store, &record)?;

        Ok(Receipt {
            record,
            changes: vec![credit],
            total_supply: Some(asset.total_supply),
        })
    }

    fn apply_transfer<S, C>(
        &self,
        store: &mut S,
        caller: &C,
        request: &TransferRequest,
    ) -> Result<Receipt>
    where
        S: StateStore + ?Sized,
        C: CallerIdentity + ?Sized,
    {
        request.validate()?;
        self.guard.check(caller, TxnKind::Transfer)?;
        self.journal.ensure_new(&*store, &request.txn_id, &request.asset_id)?;

        let debit = self
            .balances
            .debit(store, &request.asset_id, &request.sender, request.amount)?;
        let credit = self
            .balances
            .credit(store, &request.asset_id, &request.receiver, request.amount)?;

        let record = TransactionRecord::transfer(
            request.txn_id.clone(),
            request.asset_id.clone(),
            request.sender.clone(),
            request.receiver.clone(),
            request.amount,
        );
        self.journal.record(store, &record)?;

        Ok(Receipt {
            record,
            changes: vec![debit, credit],
            total_supply: None,
        })
    }

    fn apply_burn<S, C>(&self, store: &mut S, caller: &C, request: &BurnRequest) -> Result<Receipt>
    where
        S: StateStore + ?Sized,
        C: CallerIdentity + ?Sized,
    {
        request.validate()?;
        self.guard.check(caller, TxnKind::Burn)?;
        self.journal.ensure_new(&*store, &request.txn_id, &request.asset_id)?;

        let debit = self
            .balances
            .debit(store, &request.asset_id, &request.owner, request.amount)?;
        let asset = self.supply.decrease(
            &*store,
            &request.asset_id,
            request.amount,
            &request.txn_id,
        )?;
        self.supply.persist(store, &asset)?;

        let record = TransactionRecord::burn(
            request.txn_id.clone(),
            request.asset_id.clone(),
            request.owner.clone(),
            request.amount,
            request.requested_by.clone(),
        );
        self.journal.record(store, &record)?;

        Ok(Receipt {
            record,
            changes: vec![debit],
            total_supply: Some(asset.total_supply),
        })
    }

    /// Whether the pair was already applied.
    pub fn is_applied<S>(&self, store: &S, txn_id: &TxnId, asset_id: &AssetId) -> Result<bool>
    where
        S: StateStore + ?Sized,
    {
        self.journal.record_exists(store, txn_id, asset_id)
    }
}

fn log_outcome(kind: TxnKind, outcome: &Result<Receipt>) {
    match outcome {
        Ok(receipt) => match receipt.total_supply {
            Some(total_supply) => info!(
                operation = kind.operation(),
                owner = %receipt.record.owner,
                total_supply = %total_supply,
                "Operation applied"
            ),
            None => info!(
                operation = kind.operation(),
                owner = %receipt.record.owner,
                "Operation applied"
            ),
        },
        Err(e) => warn!(
            operation = kind.operation(),
            code = e.error_code(),
            error = %e,
            "Operation rejected"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Caller;
    use crate::store::{MemoryStore, MemoryTxn, TransactionalStore};
    use proptest::prelude::*;

    fn ledger() -> TokenLedger {
        TokenLedger::new(LedgerConfig::default()).unwrap()
    }

    fn minter() -> Caller {
        Caller::new("admin").with_msp("Org1MSP").with_attribute("UserRole", "Minter")
    }

    fn holder(name: &str) -> Caller {
        Caller::new(name).with_msp("Org2MSP")
    }

    /// Run `op` in its own host transaction, committing only on success.
    fn invoke<T>(
        store: &MemoryStore,
        tx_id: &str,
        op: impl FnOnce(&mut MemoryTxn<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut txn = store.begin(tx_id);
        let out = op(&mut txn)?;
        store.commit(txn)?;
        Ok(out)
    }

    fn balance(store: &MemoryStore, ledger: &TokenLedger, owner: &str) -> u64 {
        let txn = store.begin("read");
        ledger
            .balance_of(&txn, &AssetId::new("TOKEN1"), &OwnerId::new(owner))
            .unwrap()
            .value()
    }

    fn supply(store: &MemoryStore, ledger: &TokenLedger) -> u64 {
        let txn = store.begin("read");
        ledger
            .queries()
            .asset(&txn, &AssetId::new("TOKEN1"))
            .unwrap()
            .map(|a| a.total_supply.value())
            .unwrap_or(0)
    }

    #[test]
    fn test_lifecycle_scenarios() {
        let store = MemoryStore::new();
        let ledger = ledger();

        invoke(&store, "h1", |txn| {
            ledger.mint(txn, &minter(), &MintRequest::new("TOKEN1", "alice", "t1", 100))
        })
        .unwrap();
        assert_eq!(supply(&store, &ledger), 100);
        assert_eq!(balance(&store, &ledger, "alice"), 100);

        let receipt = invoke(&store, "h2", |txn| {
            ledger.mint(txn, &minter(), &MintRequest::new("TOKEN1", "alice", "t2", 50))
        })
        .unwrap();
        assert_eq!(receipt.total_supply, Some(Amount::new(150)));
        assert_eq!(balance(&store, &ledger, "alice"), 150);

        let transfer = TransferRequest::new("TOKEN1", "alice", "bob", "t3", 50);
        invoke(&store, "h3", |txn| ledger.transfer(txn, &holder("alice"), &transfer)).unwrap();
        assert_eq!(balance(&store, &ledger, "alice"), 100);
        assert_eq!(balance(&store, &ledger, "bob"), 50);
        assert_eq!(supply(&store, &ledger), 150);

        let replay = invoke(&store, "h4", |txn| ledger.transfer(txn, &holder("alice"), &transfer));
        assert!(matches!(replay, Err(LedgerError::DuplicateTransaction { .. })));
        assert_eq!(balance(&store, &ledger, "alice"), 100);
        assert_eq!(balance(&store, &ledger, "bob"), 50);

        let receipt = invoke(&store, "h5", |txn| {
            ledger.burn(txn, &minter(), &BurnRequest::new("TOKEN1", "alice", "t4", 30))
        })
        .unwrap();
        assert_eq!(receipt.total_supply, Some(Amount::new(120)));
        assert_eq!(balance(&store, &ledger, "alice"), 70);

        let overdraw = invoke(&store, "h6", |txn| {
            ledger.transfer(
                txn,
                &holder("bob"),
                &TransferRequest::new("TOKEN1", "bob", "alice", "t5", 1000),
            )
        });
        assert!(matches!(overdraw, Err(LedgerError::InsufficientBalance { .. })));
        assert_eq!(balance(&store, &ledger, "bob"), 50);
        assert_eq!(supply(&store, &ledger), 120);
    }

    #[test]
    fn test_mint_rejected_for_non_issuer() {
        let store = MemoryStore::new();
        let ledger = ledger();

        let result = invoke(&store, "h1", |txn| {
            ledger.mint(txn, &holder("mallory"), &MintRequest::new("TOKEN1", "mallory", "t1", 10))
        });
        assert!(matches!(result, Err(LedgerError::Unauthorized { .. })));
        assert!(store.is_empty());
    }

    #[test]
    fn test_zero_amount_rejected_before_authorization() {
        let store = MemoryStore::new();
        let ledger = ledger();

        let result = invoke(&store, "h1", |txn| {
            ledger.burn(txn, &holder("mallory"), &BurnRequest::new("TOKEN1", "alice", "t1", 0))
        });
        assert!(matches!(result, Err(LedgerError::Validation { .. })));
    }

    #[test]
    fn test_failed_step_discards_earlier_writes() {
        let store = MemoryStore::new();
        let ledger = ledger();
        invoke(&store, "h1", |txn| {
            ledger.mint(txn, &minter(), &MintRequest::new("TOKEN1", "alice", "t1", 10))
        })
        .unwrap();
        let version = store.version();

        let mut txn = store.begin("h2");
        let burn = BurnRequest::new("TOKEN1", "alice", "t2", 11);
        assert!(ledger.burn(&mut txn, &minter(), &burn).is_err());
        drop(txn);

        assert_eq!(store.version(), version);
        assert_eq!(balance(&store, &ledger, "alice"), 10);
    }

    #[test]
    fn test_burn_records_requester() {
        let store = MemoryStore::new();
        let ledger = ledger();
        invoke(&store, "h1", |txn| {
            ledger.mint(txn, &minter(), &MintRequest::new("TOKEN1", "alice", "t1", 10))
        })
        .unwrap();

        let mut request = BurnRequest::new("TOKEN1", "alice", "t2", 4);
        request.requested_by = Some(OwnerId::new("admin"));
        let receipt = invoke(&store, "h2", |txn| ledger.burn(txn, &minter(), &request)).unwrap();

        assert_eq!(receipt.record.requested_by, Some(OwnerId::new("admin")));
        assert_eq!(receipt.record.owner, OwnerId::new("alice"));
    }

    #[test]
    fn test_self_transfer_keeps_balance() {
        let store = MemoryStore::new();
        let ledger = ledger();
        invoke(&store, "h1", |txn| {
            ledger.mint(txn, &minter(), &MintRequest::new("TOKEN1", "alice", "t1", 10))
        })
        .unwrap();

        let request = TransferRequest::new("TOKEN1", "alice", "alice", "t2", 7);
        invoke(&store, "h2", |txn| ledger.transfer(txn, &holder("alice"), &request)).unwrap();

        assert_eq!(balance(&store, &ledger, "alice"), 10);
        let txn = store.begin("read");
        assert!(ledger
            .is_applied(&txn, &TxnId::new("t2"), &AssetId::new("TOKEN1"))
            .unwrap());
    }

    #[test]
    fn test_mint_supply_overflow_rejected() {
        let store = MemoryStore::new();
        let ledger = ledger();
        invoke(&store, "h1", |txn| {
            ledger.mint(txn, &minter(), &MintRequest::new("TOKEN1", "alice", "t1", u64::MAX))
        })
        .unwrap();

        let result = invoke(&store, "h2", |txn| {
            ledger.mint(txn, &minter(), &MintRequest::new("TOKEN1", "bob", "t2", 1))
        });
        assert!(matches!(result, Err(LedgerError::Validation { .. })));
        assert_eq!(balance(&store, &ledger, "bob"), 0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Mint { owner: usize, amount: u64 },
        Transfer { from: usize, to: usize, amount: u64 },
        Burn { owner: usize, amount: u64 },
    }

    const OWNERS: [&str; 3] = ["alice", "bob", "carol"];

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..3usize, 1..500u64).prop_map(|(owner, amount)| Op::Mint { owner, amount }),
            (0..3usize, 0..3usize, 1..500u64)
                .prop_map(|(from, to, amount)| Op::Transfer { from, to, amount }),
            (0..3usize, 1..500u64).prop_map(|(owner, amount)| Op::Burn { owner, amount }),
        ]
    }

    proptest! {
        #[test]
        fn prop_supply_equals_sum_of_balances(ops in prop::collection::vec(op_strategy(), 1..40)) {
            let store = MemoryStore::new();
            let ledger = ledger();
            let asset_id = AssetId::new("TOKEN1");

            for (i, op) in ops.iter().enumerate() {
                let txn_id = format!("t{}", i);
                let before: Vec<u64> = OWNERS.iter().map(|o| balance(&store, &ledger, o)).collect();
                let supply_before = supply(&store, &ledger);

                let result = invoke(&store, &txn_id, |txn| match op {
                    Op::Mint { owner, amount } => ledger.mint(
                        txn,
                        &minter(),
                        &MintRequest::new("TOKEN1", OWNERS[*owner], txn_id.as_str(), *amount),
                    ),
                    Op::Transfer { from, to, amount } => ledger.transfer(
                        txn,
                        &holder(OWNERS[*from]),
                        &TransferRequest::new("TOKEN1", OWNERS[*from], OWNERS[*to], txn_id.as_str(), *amount),
                    ),
                    Op::Burn { owner, amount } => ledger.burn(
                        txn,
                        &minter(),
                        &BurnRequest::new("TOKEN1", OWNERS[*owner], txn_id.as_str(), *amount),
                    ),
                });

                let after: Vec<u64> = OWNERS.iter().map(|o| balance(&store, &ledger, o)).collect();
                if result.is_err() {
                    prop_assert_eq!(&before, &after);
                    prop_assert_eq!(supply_before, supply(&store, &ledger));
                }

                let txn = store.begin("audit");
                let audit = ledger.queries().audit_supply(&txn, &asset_id).unwrap();
                prop_assert!(audit.is_balanced());
                prop_assert_eq!(audit.sum_of_balances.value(), after.iter().sum::<u64>());
            }
        }

        #[test]
        fn prop_replay_is_rejected(amount in 1..1_000u64) {
            let store = MemoryStore::new();
            let ledger = ledger();
            let request = MintRequest::new("TOKEN1", "alice", "t1", amount);

            invoke(&store, "h1", |txn| ledger.mint(txn, &minter(), &request)).unwrap();
            let version = store.version();
            let replay = invoke(&store, "h2", |txn| ledger.mint(txn, &minter(), &request));

            let rejected = matches!(replay, Err(LedgerError::DuplicateTransaction { .. }));
            prop_assert!(rejected, "expected a duplicate rejection, got {:?}", replay);
            prop_assert_eq!(store.version(), version);
            prop_assert_eq!(balance(&store, &ledger, "alice"), amount);
        }
    }
}
