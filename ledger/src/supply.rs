//! Aggregate supply kept in the asset record.

use tracing::debug;

use tokenledger_common::{Amount, Asset, AssetId, LedgerError, OrgId, Result, TxnId};

use crate::keys::KeyCodec;
use crate::store::{self, StateStore};

/// Owns the asset record and its total supply.
///
/// `increase` and `decrease` return the updated record without writing it;
/// the caller persists it with [`SupplyTracker::persist`] once the rest of
/// the workflow step has succeeded.
#[derive(Debug, Clone)]
pub struct SupplyTracker {
    codec: KeyCodec,
}

impl SupplyTracker {
    pub fn new(codec: KeyCodec) -> Self {
        Self { codec }
    }

    /// Load the asset record, if any.
    pub fn load<S>(&self, store: &S, asset_id: &AssetId) -> Result<Option<Asset>>
    where
        S: StateStore + ?Sized,
    {
        store::read_record(store, &self.codec.asset_key(asset_id))
    }

    /// Add supply, creating the asset on its first mint.
    pub fn increase<S>(
        &self,
        store: &S,
        asset_id: &AssetId,
        issuer: &OrgId,
        amount: Amount,
        txn_id: &TxnId,
    ) -> Result<Asset>
    where
        S: StateStore + ?Sized,
    {
        let mut asset = match self.load(store, asset_id)? {
            Some(asset) => {
                let total = asset.total_supply.checked_add(amount).ok_or_else(|| {
                    LedgerError::invalid_field(
                        "amount",
                        format!("total supply of {} would overflow", asset_id),
                    )
                })?;
                Asset {
                    total_supply: total,
                    ..asset
                }
            }
            None => {
                debug!(asset_id = %asset_id, issuer = %issuer, "Creating asset");
                Asset::new(asset_id.clone(), issuer.clone(), amount)
            }
        };
        asset.last_txn = Some(txn_id.clone());
        Ok(asset)
    }

    /// Remove supply from an existing asset.
    pub fn decrease<S>(
        &self,
        store: &S,
        asset_id: &AssetId,
        amount: Amount,
        txn_id: &TxnId,
    ) -> Result<Asset>
    where
        S: StateStore + ?Sized,
    {
        let key = self.codec.asset_key(asset_id);
        let bytes = store
            .get_state(&key)?
            .ok_or_else(|| LedgerError::AssetNotFound(asset_id.clone()))?;
        let mut asset: Asset = store::decode(&key, &bytes)?;

        let available = asset.total_supply;
        asset.total_supply =
            available
                .checked_sub(amount)
                .ok_or_else(|| LedgerError::InsufficientSupply {
                    asset_id: asset_id.clone(),
                    required: amount,
                    available,
                })?;
        asset.last_txn = Some(txn_id.clone());
        Ok(asset)
    }

    /// Write the asset record.
    pub fn persist<S>(&self, store: &mut S, asset: &Asset) -> Result<()>
    where
        S: StateStore + ?Sized,
    {
        store::write_record(store, &self.codec.asset_key(&asset.id), asset)
    }
}
