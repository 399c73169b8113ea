//! Error types for TokenLedger operations.

use crate::{Amount, AssetId, OwnerId, TxnId, TxnKind};
use thiserror::Error;

/// Failure of the underlying key-value store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Optimistic validation failed at commit: a key read by the transaction
    /// was changed by another committed transaction.
    #[error("Read conflict on key {key}")]
    Conflict { key: String },

    /// A stored value could not be decoded.
    #[error("Corrupt value under key {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// Backend read or write failure.
    #[error("Store backend error: {0}")]
    Backend(String),

    /// Malformed selector query.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Main error type for ledger operations.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Malformed input or non-positive amount.
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Caller lacks the organization or role the operation requires.
    #[error("Not authorized to {}: {reason}", .operation.operation())]
    Unauthorized { operation: TxnKind, reason: String },

    /// The identity provider could not supply a caller attribute.
    #[error("Identity unavailable: {0}")]
    Identity(String),

    /// The (txn id, asset id) pair was already applied.
    #[error("Duplicate transaction {txn_id} for asset {asset_id}")]
    DuplicateTransaction { txn_id: TxnId, asset_id: AssetId },

    /// A debit exceeds the owner's holding.
    #[error("Insufficient balance for owner {owner} of {asset_id}: required {required}, available {available}")]
    InsufficientBalance {
        asset_id: AssetId,
        owner: OwnerId,
        required: Amount,
        available: Amount,
    },

    /// A supply decrease exceeds the recorded total supply.
    #[error("Insufficient supply of {asset_id}: required {required}, available {available}")]
    InsufficientSupply {
        asset_id: AssetId,
        required: Amount,
        available: Amount,
    },

    /// The referenced asset record is absent.
    #[error("Asset not found: {0}")]
    AssetNotFound(AssetId),

    /// Underlying store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Validation failure without a specific field.
    pub fn invalid(message: impl Into<String>) -> Self {
        LedgerError::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Validation failure attributed to one input field.
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        LedgerError::Validation {
            message: format!("{}: {}", field, message.into()),
            field: Some(field.to_string()),
        }
    }

    /// Check if the failed invocation may succeed when re-executed from scratch.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Store(StoreError::Conflict { .. }))
    }

    /// Get error code for response envelopes.
    pub fn error_code(&self) -> &'static str {
        match self {
            LedgerError::Validation { .. } => "VALIDATION_ERROR",
            LedgerError::Unauthorized { .. } => "UNAUTHORIZED",
            LedgerError::Identity(_) => "IDENTITY_UNAVAILABLE",
            LedgerError::DuplicateTransaction { .. } => "DUPLICATE_TRANSACTION",
            LedgerError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            LedgerError::InsufficientSupply { .. } => "INSUFFICIENT_SUPPLY",
            LedgerError::AssetNotFound(_) => "ASSET_NOT_FOUND",
            LedgerError::Store(StoreError::Conflict { .. }) => "MVCC_CONFLICT",
            LedgerError::Store(_) => "STORE_ERROR",
        }
    }
}

/// Result type alias for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_conflicts_are_retryable() {
        let conflict = LedgerError::from(StoreError::Conflict {
            key: "TOKEN1".to_string(),
        });
        assert!(conflict.is_retryable());
        assert_eq!(conflict.error_code(), "MVCC_CONFLICT");

        let duplicate = LedgerError::DuplicateTransaction {
            txn_id: TxnId::new("t1"),
            asset_id: AssetId::new("TOKEN1"),
        };
        assert!(!duplicate.is_retryable());
        assert_eq!(duplicate.error_code(), "DUPLICATE_TRANSACTION");
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = LedgerError::InsufficientBalance {
            asset_id: AssetId::new("TOKEN1"),
            owner: OwnerId::new("bob"),
            required: Amount::new(1000),
            available: Amount::new(50),
        };
        let message = err.to_string();
        assert!(message.contains("bob"));
        assert!(message.contains("1000"));
        assert!(message.contains("50"));
    }
}
