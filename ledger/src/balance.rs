//! Per-owner balance bookkeeping.

use serde::{Deserialize, Serialize};
use tracing::debug;

use tokenledger_common::{Amount, AssetId, LedgerError, OwnerBalance, OwnerId, Result};

use crate::keys::KeyCodec;
use crate::store::{self, StateStore};

/// Type of balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceChangeType {
    /// Credit (increase).
    Credit,
    /// Debit (decrease).
    Debit,
}

/// Receipt of one balance mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChange {
    pub asset_id: AssetId,
    pub owner: OwnerId,
    pub change_type: BalanceChangeType,
    pub amount: Amount,
    pub balance_before: Amount,
    pub balance_after: Amount,
}

/// Reads and mutates `(asset, owner)` balance records.
///
/// Every mutation is a read-modify-write against the invocation's store
/// view. Nothing is cached between calls.
#[derive(Debug, Clone)]
pub struct BalanceLedger {
    codec: KeyCodec,
}

impl BalanceLedger {
    pub fn new(codec: KeyCodec) -> Self {
        Self { codec }
    }

    /// Current balance, zero when no record exists.
    pub fn read<S>(&self, store: &S, asset_id: &AssetId, owner: &OwnerId) -> Result<Amount>
    where
        S: StateStore + ?Sized,
    {
        let key = self.codec.balance_key(asset_id, owner);
        let record: Option<OwnerBalance> = store::read_record(store, &key)?;
        Ok(record.map(|r| r.amount).unwrap_or(Amount::ZERO))
    }

    /// Add `amount` to the owner's balance.
    pub fn credit<S>(
        &self,
        store: &mut S,
        asset_id: &AssetId,
        owner: &OwnerId,
        amount: Amount,
    ) -> Result<BalanceChange>
    where
        S: StateStore + ?Sized,
    {
        if amount.is_zero() {
            return Err(LedgerError::invalid_field("amount", "credit must be positive"));
        }

        let before = self.read(store, asset_id, owner)?;
        let after = before.checked_add(amount).ok_or_else(|| {
            LedgerError::invalid_field(
                "amount",
                format!("balance of {} in {} would overflow", owner, asset_id),
            )
        })?;

        self.write(store, asset_id, owner, after)?;
        debug!(asset_id = %asset_id, owner = %owner, %before, %after, "Credited balance");

        Ok(BalanceChange {
            asset_id: asset_id.clone(),
            owner: owner.clone(),
            change_type: BalanceChangeType::Credit,
            amount,
            balance_before: before,
            balance_after: after,
        })
    }

    /// Subtract `amount` from the owner's balance. Fails without writing if
    /// the balance is smaller than `amount`.
    pub fn debit<S>(
        &self,
        store: &mut S,
        asset_id: &AssetId,
        owner: &OwnerId,
        amount: Amount,
    ) -> Result<BalanceChange>
    where
        S: StateStore + ?Sized,
    {
        let before = self.read(store, asset_id, owner)?;
        let after = before
            .checked_sub(amount)
            .ok_or_else(|| LedgerError::InsufficientBalance {
                asset_id: asset_id.clone(),
                owner: owner.clone(),
                required: amount,
                available: before,
            })?;

        self.write(store, asset_id, owner, after)?;
        debug!(asset_id = %asset_id, owner = %owner, %before, %after, "Debited balance");

        Ok(BalanceChange {
            asset_id: asset_id.clone(),
            owner: owner.clone(),
            change_type: BalanceChangeType::Debit,
            amount,
            balance_before: before,
            balance_after: after,
        })
    }

    /// Every balance record of one asset, ordered by owner.
    pub fn holders<S>(&self, store: &S, asset_id: &AssetId) -> Result<Vec<OwnerBalance>>
    where
        S: StateStore + ?Sized,
    {
        let prefix = self.codec.balance_prefix(asset_id);
        let mut holders = Vec::new();
        for item in store.scan_prefix(&prefix)? {
            let (key, bytes) = item?;
            holders.push(store::decode(&key, &bytes)?);
        }
        Ok(holders)
    }

    fn write<S>(&self, store: &mut S, asset_id: &AssetId, owner: &OwnerId, amount: Amount) -> Result<()>
    where
        S: StateStore + ?Sized,
    {
        let key = self.codec.balance_key(asset_id, owner);
        let record = OwnerBalance::new(asset_id.clone(), owner.clone(), amount);
        store::write_record(store, &key, &record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, TransactionalStore};

    fn ledger() -> BalanceLedger {
        BalanceLedger::new(KeyCodec::new("token").unwrap())
    }

    #[test]
    fn test_missing_balance_reads_zero() {
        let store = MemoryStore::new();
        let txn = store.begin("tx1");
        let balance = ledger()
            .read(&txn, &AssetId::new("TOKEN1"), &OwnerId::new("alice"))
            .unwrap();
        assert_eq!(balance, Amount::ZERO);
    }

    #[test]
    fn test_credit_then_debit() {
        let store = MemoryStore::new();
        let ledger = ledger();
        let asset = AssetId::new("TOKEN1");
        let alice = OwnerId::new("alice");

        let mut txn = store.begin("tx1");
        let credit = ledger.credit(&mut txn, &asset, &alice, Amount::new(100)).unwrap();
        assert_eq!(credit.balance_before, Amount::ZERO);
        assert_eq!(credit.balance_after, Amount::new(100));

        let debit = ledger.debit(&mut txn, &asset, &alice, Amount::new(30)).unwrap();
        assert_eq!(debit.change_type, BalanceChangeType::Debit);
        assert_eq!(debit.balance_after, Amount::new(70));
        store.commit(txn).unwrap();

        let txn = store.begin("tx2");
        assert_eq!(ledger.read(&txn, &asset, &alice).unwrap(), Amount::new(70));
    }

    #[test]
    fn test_overdraw_leaves_balance_unchanged() {
        let store = MemoryStore::new();
        let ledger = ledger();
        let asset = AssetId::new("TOKEN1");
        let bob = OwnerId::new("bob");

        let mut txn = store.begin("tx1");
        ledger.credit(&mut txn, &asset, &bob, Amount::new(50)).unwrap();

        let err = ledger
            .debit(&mut txn, &asset, &bob, Amount::new(1000))
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientBalance { available, .. } if available == Amount::new(50)
        ));
        assert_eq!(ledger.read(&txn, &asset, &bob).unwrap(), Amount::new(50));
    }

    #[test]
    fn test_credit_overflow_rejected() {
        let store = MemoryStore::new();
        let ledger = ledger();
        let asset = AssetId::new("TOKEN1");
        let alice = OwnerId::new("alice");

        let mut txn = store.begin("tx1");
        ledger.credit(&mut txn, &asset, &alice, Amount::new(u64::MAX)).unwrap();
        assert!(matches!(
            ledger.credit(&mut txn, &asset, &alice, Amount::new(1)),
            Err(LedgerError::Validation { .. })
        ));
    }

    #[test]
    fn test_holders_scoped_to_asset() {
        let store = MemoryStore::new();
        let ledger = ledger();
        let token1 = AssetId::new("TOKEN1");

        let mut txn = store.begin("tx1");
        ledger.credit(&mut txn, &token1, &OwnerId::new("bob"), Amount::new(5)).unwrap();
        ledger.credit(&mut txn, &token1, &OwnerId::new("alice"), Amount::new(7)).unwrap();
        ledger
            .credit(&mut txn, &AssetId::new("TOKEN10"), &OwnerId::new("carol"), Amount::new(9))
            .unwrap();
        store.commit(txn).unwrap();

        let txn = store.begin("tx2");
        let holders = ledger.holders(&txn, &token1).unwrap();
        let owners: Vec<&str> = holders.iter().map(|h| h.owner.as_str()).collect();
        assert_eq!(owners, vec!["alice", "bob"]);
    }
}
