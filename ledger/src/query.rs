//! Read-only queries over ledger state.

use serde::{Deserialize, Serialize};

use tokenledger_common::{
    Amount, Asset, AssetId, DocType, HistoryEntry, LedgerError, OwnerBalance, OwnerId, Result,
    TransactionRecord, TxnId, TxnKind,
};

use crate::balance::BalanceLedger;
use crate::journal::TransactionLedger;
use crate::keys::KeyCodec;
use crate::store::{self, Selector, StateStore};
use crate::supply::SupplyTracker;

/// Consume-once sequence of decoded records.
pub type Records<'a, T> = Box<dyn Iterator<Item = Result<T>> + 'a>;

/// Result of comparing an asset's recorded supply with its holders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyAudit {
    pub asset_id: AssetId,
    pub total_supply: Amount,
    pub sum_of_balances: Amount,
    pub holders: usize,
}

impl SupplyAudit {
    /// Whether supply equals the sum of balances.
    pub fn is_balanced(&self) -> bool {
        self.total_supply == self.sum_of_balances
    }
}

/// Read-only views: selector queries, key history, balances, holders.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    codec: KeyCodec,
    balances: BalanceLedger,
    supply: SupplyTracker,
    journal: TransactionLedger,
}

impl QueryEngine {
    pub fn new(codec: KeyCodec) -> Self {
        Self {
            balances: BalanceLedger::new(codec.clone()),
            supply: SupplyTracker::new(codec.clone()),
            journal: TransactionLedger::new(codec.clone()),
            codec,
        }
    }

    /// Every transaction record of one kind.
    pub fn query_by_kind<'s, S>(&self, store: &'s S, kind: TxnKind) -> Result<Records<'s, TransactionRecord>>
    where
        S: StateStore + ?Sized,
    {
        let selector = Selector::new().field("doc_type", kind.as_str());
        let rows = store.query(&selector)?;
        Ok(Box::new(rows.map(|row| -> Result<TransactionRecord> {
            let (key, bytes) = row?;
            Ok(store::decode(&key, &bytes)?)
        })))
    }

    /// Every owner balance record, across all assets.
    pub fn all_owners<'s, S>(&self, store: &'s S) -> Result<Records<'s, OwnerBalance>>
    where
        S: StateStore + ?Sized,
    {
        let selector = Selector::new().field("doc_type", DocType::Owner.as_str());
        let rows = store.query(&selector)?;
        Ok(Box::new(rows.map(|row| -> Result<OwnerBalance> {
            let (key, bytes) = row?;
            Ok(store::decode(&key, &bytes)?)
        })))
    }

    /// Every committed value of the asset record, oldest first.
    ///
    /// An entry without a value (a deletion) carries a placeholder record
    /// holding only the asset id.
    pub fn history_of<'s, S>(&self, store: &'s S, asset_id: &AssetId) -> Result<Records<'s, HistoryEntry>>
    where
        S: StateStore + ?Sized,
    {
        let key = self.codec.asset_key(asset_id);
        let asset_id = asset_id.clone();
        let modifications = store.history_for_key(&key)?;
        Ok(Box::new(modifications.map(move |item| -> Result<HistoryEntry> {
            let modification = item?;
            let record = if modification.value.is_empty() {
                Asset::placeholder(asset_id.clone())
            } else {
                store::decode(&key, &modification.value)?
            };
            Ok(HistoryEntry {
                record,
                tx_id: modification.tx_id,
                timestamp: modification.timestamp,
                is_delete: modification.is_delete,
            })
        })))
    }

    /// Current balance, zero if absent.
    pub fn balance_of<S>(&self, store: &S, asset_id: &AssetId, owner: &OwnerId) -> Result<Amount>
    where
        S: StateStore + ?Sized,
    {
        self.balances.read(store, asset_id, owner)
    }

    /// Balance records of one asset, ordered by owner.
    pub fn holders<S>(&self, store: &S, asset_id: &AssetId) -> Result<Vec<OwnerBalance>>
    where
        S: StateStore + ?Sized,
    {
        self.balances.holders(store, asset_id)
    }

    /// Recompute the sum of holder balances and compare with total supply.
    pub fn audit_supply<S>(&self, store: &S, asset_id: &AssetId) -> Result<SupplyAudit>
    where
        S: StateStore + ?Sized,
    {
        let holders = self.balances.holders(store, asset_id)?;
        let sum_of_balances = Amount::checked_sum(holders.iter().map(|h| h.amount))
            .ok_or_else(|| LedgerError::invalid(format!("balances of {} overflow", asset_id)))?;
        let total_supply = self
            .supply
            .load(store, asset_id)?
            .map(|asset| asset.total_supply)
            .unwrap_or(Amount::ZERO);

        Ok(SupplyAudit {
            asset_id: asset_id.clone(),
            total_supply,
            sum_of_balances,
            holders: holders.len(),
        })
    }

    /// One transaction record by its idempotency pair.
    pub fn transaction<S>(
        &self,
        store: &S,
        txn_id: &TxnId,
        asset_id: &AssetId,
    ) -> Result<Option<TransactionRecord>>
    where
        S: StateStore + ?Sized,
    {
        self.journal.get(store, txn_id, asset_id)
    }

    /// Current asset record.
    pub fn asset<S>(&self, store: &S, asset_id: &AssetId) -> Result<Option<Asset>>
    where
        S: StateStore + ?Sized,
    {
        self.supply.load(store, asset_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, TransactionalStore};
    use tokenledger_common::OrgId;

    fn engine() -> QueryEngine {
        QueryEngine::new(KeyCodec::new("token").unwrap())
    }

    fn seed(store: &MemoryStore) {
        let codec = KeyCodec::new("token").unwrap();
        let supply = SupplyTracker::new(codec.clone());
        let balances = BalanceLedger::new(codec.clone());
        let journal = TransactionLedger::new(codec);
        let asset_id = AssetId::new("TOKEN1");

        let mut txn = store.begin("host-1");
        let asset = supply
            .increase(&txn, &asset_id, &OrgId::new("Org1MSP"), Amount::new(100), &TxnId::new("t1"))
            .unwrap();
        supply.persist(&mut txn, &asset).unwrap();
        balances
            .credit(&mut txn, &asset_id, &OwnerId::new("alice"), Amount::new(100))
            .unwrap();
        journal
            .record(
                &mut txn,
                &TransactionRecord::mint(
                    TxnId::new("t1"),
                    asset_id.clone(),
                    OwnerId::new("alice"),
                    Amount::new(100),
                ),
            )
            .unwrap();
        store.commit(txn).unwrap();

        let mut txn = store.begin("host-2");
        balances
            .debit(&mut txn, &asset_id, &OwnerId::new("alice"), Amount::new(40))
            .unwrap();
        balances
            .credit(&mut txn, &asset_id, &OwnerId::new("bob"), Amount::new(40))
            .unwrap();
        journal
            .record(
                &mut txn,
                &TransactionRecord::transfer(
                    TxnId::new("t2"),
                    asset_id,
                    OwnerId::new("alice"),
                    OwnerId::new("bob"),
                    Amount::new(40),
                ),
            )
            .unwrap();
        store.commit(txn).unwrap();
    }

    #[test]
    fn test_query_by_kind() {
        let store = MemoryStore::new();
        seed(&store);
        let txn = store.begin("read");

        let mints: Vec<TransactionRecord> = engine()
            .query_by_kind(&txn, TxnKind::Mint)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(mints.len(), 1);
        assert_eq!(mints[0].txn_id, TxnId::new("t1"));

        let burns = engine().query_by_kind(&txn, TxnKind::Burn).unwrap().count();
        assert_eq!(burns, 0);
    }

    #[test]
    fn test_all_owners_by_doc_type() {
        let store = MemoryStore::new();
        seed(&store);
        let txn = store.begin("read");

        let mut owners: Vec<OwnerBalance> = engine()
            .all_owners(&txn)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        owners.sort_by(|a, b| a.owner.cmp(&b.owner));

        assert_eq!(owners.len(), 2);
        assert_eq!(owners[0].owner, OwnerId::new("alice"));
        assert_eq!(owners[1].amount, Amount::new(40));
    }

    #[test]
    fn test_history_of_asset() {
        let store = MemoryStore::new();
        seed(&store);
        let txn = store.begin("read");

        let history: Vec<HistoryEntry> = engine()
            .history_of(&txn, &AssetId::new("TOKEN1"))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].tx_id, "host-1");
        assert_eq!(history[0].record.total_supply, Amount::new(100));

        assert_eq!(engine().history_of(&txn, &AssetId::new("NOPE")).unwrap().count(), 0);
    }

    #[test]
    fn test_history_placeholder_for_empty_value() {
        let store = MemoryStore::new();
        let asset_id = AssetId::new("TOKEN9");
        let mut txn = store.begin("host-1");
        txn.put_state(&KeyCodec::new("token").unwrap().asset_key(&asset_id), Vec::new())
            .unwrap();
        store.commit(txn).unwrap();

        let txn = store.begin("read");
        let entry = engine()
            .history_of(&txn, &asset_id)
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(entry.record, Asset::placeholder(asset_id));
    }

    #[test]
    fn test_audit_and_holders() {
        let store = MemoryStore::new();
        seed(&store);
        let txn = store.begin("read");
        let engine = engine();
        let asset_id = AssetId::new("TOKEN1");

        let audit = engine.audit_supply(&txn, &asset_id).unwrap();
        assert!(audit.is_balanced());
        assert_eq!(audit.holders, 2);
        assert_eq!(audit.total_supply, Amount::new(100));

        assert_eq!(
            engine.balance_of(&txn, &asset_id, &OwnerId::new("bob")).unwrap(),
            Amount::new(40)
        );
        assert!(engine
            .transaction(&txn, &TxnId::new("t2"), &asset_id)
            .unwrap()
            .is_some());
        assert_eq!(
            engine.asset(&txn, &asset_id).unwrap().map(|a| a.issuer),
            Some(Some(OrgId::new("Org1MSP")))
        );
    }
}
