//! Typed operation requests accepted by the ledger.

use serde::{Deserialize, Serialize};

use crate::{Amount, AssetId, LedgerError, OrgId, OwnerId, Result, TxnId};

fn ensure_positive(amount: Amount, field: &'static str) -> Result<()> {
    if amount.is_zero() {
        return Err(LedgerError::invalid_field(
            field,
            "amount must be greater than zero",
        ));
    }
    Ok(())
}

/// Create new supply and credit it to an owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintRequest {
    pub asset_id: AssetId,
    pub owner: OwnerId,
    pub txn_id: TxnId,
    pub amount: Amount,
    /// Organization named by the client. Informational only; authorization
    /// uses the verified caller identity.
    pub org_name: Option<OrgId>,
}

impl MintRequest {
    pub fn new(
        asset_id: impl Into<AssetId>,
        owner: impl Into<OwnerId>,
        txn_id: impl Into<TxnId>,
        amount: u64,
    ) -> Self {
        Self {
            asset_id: asset_id.into(),
            owner: owner.into(),
            txn_id: txn_id.into(),
            amount: Amount::new(amount),
            org_name: None,
        }
    }

    /// Check identifiers and that the amount is positive.
    pub fn validate(&self) -> Result<()> {
        ensure_positive(self.amount, "amount")?;
        self.asset_id.validate("asset_id")?;
        self.owner.validate("owner")?;
        self.txn_id.validate("txn_id")
    }
}

/// Move balance from a sender to a receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub asset_id: AssetId,
    pub sender: OwnerId,
    pub receiver: OwnerId,
    pub txn_id: TxnId,
    pub amount: Amount,
}

impl TransferRequest {
    pub fn new(
        asset_id: impl Into<AssetId>,
        sender: impl Into<OwnerId>,
        receiver: impl Into<OwnerId>,
        txn_id: impl Into<TxnId>,
        amount: u64,
    ) -> Self {
        Self {
            asset_id: asset_id.into(),
            sender: sender.into(),
            receiver: receiver.into(),
            txn_id: txn_id.into(),
            amount: Amount::new(amount),
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure_positive(self.amount, "amount")?;
        self.asset_id.validate("asset_id")?;
        self.sender.validate("sender")?;
        self.receiver.validate("receiver")?;
        self.txn_id.validate("txn_id")
    }
}

/// Destroy supply held by an owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnRequest {
    pub asset_id: AssetId,
    /// Owner whose balance is burned.
    pub owner: OwnerId,
    pub txn_id: TxnId,
    pub amount: Amount,
    /// User that asked for the burn, if different from the owner.
    pub requested_by: Option<OwnerId>,
    /// Organization named by the client. Informational only.
    pub org_name: Option<OrgId>,
}

impl BurnRequest {
    pub fn new(
        asset_id: impl Into<AssetId>,
        owner: impl Into<OwnerId>,
        txn_id: impl Into<TxnId>,
        amount: u64,
    ) -> Self {
        Self {
            asset_id: asset_id.into(),
            owner: owner.into(),
            txn_id: txn_id.into(),
            amount: Amount::new(amount),
            requested_by: None,
            org_name: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure_positive(self.amount, "burn_amount")?;
        self.asset_id.validate("asset_id")?;
        self.owner.validate("owner")?;
        self.txn_id.validate("txn_id")
    }
}
