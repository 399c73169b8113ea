//! Stored record types and record kind tags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Amount, AssetId, LedgerError, OrgId, OwnerId, TxnId};

/// Kind of a state-changing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxnKind {
    /// New supply credited to an owner.
    #[serde(rename = "MINTTX")]
    Mint,
    /// Balance moved between two owners.
    #[serde(rename = "TRANSFERTXN")]
    Transfer,
    /// Supply destroyed from an owner's balance.
    #[serde(rename = "BURNTXN")]
    Burn,
}

impl TxnKind {
    /// Document type tag stored with transaction records of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            TxnKind::Mint => "MINTTX",
            TxnKind::Transfer => "TRANSFERTXN",
            TxnKind::Burn => "BURNTXN",
        }
    }

    /// Operation name as exposed to callers.
    pub fn operation(&self) -> &'static str {
        match self {
            TxnKind::Mint => "Mint",
            TxnKind::Transfer => "Transfer",
            TxnKind::Burn => "Burn",
        }
    }

    /// Whether the operation changes total supply.
    pub fn changes_supply(&self) -> bool {
        matches!(self, TxnKind::Mint | TxnKind::Burn)
    }
}

impl fmt::Display for TxnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxnKind {
    type Err = LedgerError;

    /// Accepts both the stored tag (`MINTTX`) and the operation name (`Mint`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MINTTX" | "Mint" => Ok(TxnKind::Mint),
            "TRANSFERTXN" | "Transfer" => Ok(TxnKind::Transfer),
            "BURNTXN" | "Burn" => Ok(TxnKind::Burn),
            other => Err(LedgerError::invalid_field(
                "kind",
                format!("unknown transaction kind: {}", other),
            )),
        }
    }
}

/// Document type of every record family kept in the key-value space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocType {
    #[serde(rename = "ASSET")]
    Asset,
    #[serde(rename = "OWNER")]
    Owner,
    #[serde(rename = "MINTTX")]
    Mint,
    #[serde(rename = "TRANSFERTXN")]
    Transfer,
    #[serde(rename = "BURNTXN")]
    Burn,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Asset => "ASSET",
            DocType::Owner => "OWNER",
            DocType::Mint => TxnKind::Mint.as_str(),
            DocType::Transfer => TxnKind::Transfer.as_str(),
            DocType::Burn => TxnKind::Burn.as_str(),
        }
    }
}

impl From<TxnKind> for DocType {
    fn from(kind: TxnKind) -> Self {
        match kind {
            TxnKind::Mint => DocType::Mint,
            TxnKind::Transfer => DocType::Transfer,
            TxnKind::Burn => DocType::Burn,
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn asset_doc_type() -> DocType {
    DocType::Asset
}

fn owner_doc_type() -> DocType {
    DocType::Owner
}

/// One fungible token type and its aggregate supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Asset identifier, also the record's primary key.
    pub id: AssetId,
    /// Record family tag.
    #[serde(default = "asset_doc_type")]
    pub doc_type: DocType,
    /// Organization that first minted the asset.
    #[serde(default)]
    pub issuer: Option<OrgId>,
    /// Total minted minus total burned.
    #[serde(default)]
    pub total_supply: Amount,
    /// Transaction that last changed the supply.
    #[serde(default)]
    pub last_txn: Option<TxnId>,
}

impl Asset {
    /// Create a fresh asset record with the given opening supply.
    pub fn new(id: AssetId, issuer: OrgId, total_supply: Amount) -> Self {
        Self {
            id,
            doc_type: DocType::Asset,
            issuer: Some(issuer),
            total_supply,
            last_txn: None,
        }
    }

    /// Record carrying only the asset id, used where a history entry has no value.
    pub fn placeholder(id: AssetId) -> Self {
        Self {
            id,
            doc_type: DocType::Asset,
            issuer: None,
            total_supply: Amount::ZERO,
            last_txn: None,
        }
    }
}

/// One owner's holding of one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerBalance {
    pub asset_id: AssetId,
    pub owner: OwnerId,
    #[serde(default = "owner_doc_type")]
    pub doc_type: DocType,
    pub amount: Amount,
}

impl OwnerBalance {
    /// Create a balance record.
    pub fn new(asset_id: AssetId, owner: OwnerId, amount: Amount) -> Self {
        Self {
            asset_id,
            owner,
            doc_type: DocType::Owner,
            amount,
        }
    }
}

/// Immutable record of one applied operation.
///
/// Keyed by `(txn_id, asset_id)`; written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub txn_id: TxnId,
    pub asset_id: AssetId,
    /// Operation kind, stored under the `doc_type` field so selector
    /// queries address all record families the same way.
    #[serde(rename = "doc_type")]
    pub kind: TxnKind,
    pub amount: Amount,
    /// Credited owner for Mint, sender for Transfer, burned owner for Burn.
    pub owner: OwnerId,
    /// Receiver of a Transfer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<OwnerId>,
    /// User that asked for a Burn on the owner's behalf.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<OwnerId>,
}

impl TransactionRecord {
    /// Record of a mint.
    pub fn mint(txn_id: TxnId, asset_id: AssetId, owner: OwnerId, amount: Amount) -> Self {
        Self {
            txn_id,
            asset_id,
            kind: TxnKind::Mint,
            amount,
            owner,
            receiver: None,
            requested_by: None,
        }
    }

    /// Record of a transfer.
    pub fn transfer(
        txn_id: TxnId,
        asset_id: AssetId,
        sender: OwnerId,
        receiver: OwnerId,
        amount: Amount,
    ) -> Self {
        Self {
            txn_id,
            asset_id,
            kind: TxnKind::Transfer,
            amount,
            owner: sender,
            receiver: Some(receiver),
            requested_by: None,
        }
    }

    /// Record of a burn.
    pub fn burn(
        txn_id: TxnId,
        asset_id: AssetId,
        owner: OwnerId,
        amount: Amount,
        requested_by: Option<OwnerId>,
    ) -> Self {
        Self {
            txn_id,
            asset_id,
            kind: TxnKind::Burn,
            amount,
            owner,
            receiver: None,
            requested_by,
        }
    }
}

/// A point-in-time value of an asset record, as reported by the store's
/// key history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub record: Asset,
    pub tx_id: String,
    pub timestamp: DateTime<Utc>,
    pub is_delete: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_txn_kind_parsing() {
        assert_eq!("MINTTX".parse::<TxnKind>().unwrap(), TxnKind::Mint);
        assert_eq!("Transfer".parse::<TxnKind>().unwrap(), TxnKind::Transfer);
        assert_eq!("BURNTXN".parse::<TxnKind>().unwrap(), TxnKind::Burn);
        assert!("OWNER".parse::<TxnKind>().is_err());
    }

    #[test]
    fn test_transaction_record_uses_doc_type_field() {
        let record = TransactionRecord::transfer(
            TxnId::new("t3"),
            AssetId::new("TOKEN1"),
            OwnerId::new("alice"),
            OwnerId::new("bob"),
            Amount::new(50),
        );

        let json: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(json["doc_type"], "TRANSFERTXN");
        assert_eq!(json["receiver"], "bob");
        assert!(json.get("requested_by").is_none());
    }

    #[test]
    fn test_asset_decodes_with_defaults() {
        let asset: Asset = serde_json::from_str(r#"{"id":"TOKEN1"}"#).unwrap();
        assert_eq!(asset, Asset::placeholder(AssetId::new("TOKEN1")));
    }

    #[test]
    fn test_supply_changing_kinds() {
        assert!(TxnKind::Mint.changes_supply());
        assert!(TxnKind::Burn.changes_supply());
        assert!(!TxnKind::Transfer.changes_supply());
    }
}
