//! Idempotent transaction records.

use tracing::debug;

use tokenledger_common::{AssetId, LedgerError, Result, TransactionRecord, TxnId};

use crate::keys::KeyCodec;
use crate::store::{self, StateStore};

/// Write-once log of applied operations, keyed by `(txn id, asset id)`.
///
/// The existence check and the write are not locked together. Both run
/// inside the same invocation, and the store's commit-time validation of
/// the read key rejects a concurrent writer of the same pair.
#[derive(Debug, Clone)]
pub struct TransactionLedger {
    codec: KeyCodec,
}

impl TransactionLedger {
    pub fn new(codec: KeyCodec) -> Self {
        Self { codec }
    }

    /// Whether any value is stored for the pair, even an empty one.
    pub fn record_exists<S>(&self, store: &S, txn_id: &TxnId, asset_id: &AssetId) -> Result<bool>
    where
        S: StateStore + ?Sized,
    {
        let key = self.codec.txn_key(txn_id, asset_id);
        Ok(store.get_state(&key)?.is_some())
    }

    /// Fail with a duplicate error if the pair was already applied.
    pub fn ensure_new<S>(&self, store: &S, txn_id: &TxnId, asset_id: &AssetId) -> Result<()>
    where
        S: StateStore + ?Sized,
    {
        if self.record_exists(store, txn_id, asset_id)? {
            return Err(LedgerError::DuplicateTransaction {
                txn_id: txn_id.clone(),
                asset_id: asset_id.clone(),
            });
        }
        Ok(())
    }

    /// Store the record under its pair.
    pub fn record<S>(&self, store: &mut S, record: &TransactionRecord) -> Result<()>
    where
        S: StateStore + ?Sized,
    {
        let key = self.codec.txn_key(&record.txn_id, &record.asset_id);
        store::write_record(store, &key, record)?;
        debug!(key = %key, kind = %record.kind, "Recorded transaction");
        Ok(())
    }

    /// Fetch the record of one pair.
    pub fn get<S>(
        &self,
        store: &S,
        txn_id: &TxnId,
        asset_id: &AssetId,
    ) -> Result<Option<TransactionRecord>>
    where
        S: StateStore + ?Sized,
    {
        store::read_record(store, &self.codec.txn_key(txn_id, asset_id))
    }
}
