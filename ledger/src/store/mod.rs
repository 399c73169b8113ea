//! Key-value store contract.
//!
//! The ledger never owns storage. Every operation runs against a
//! [`StateStore`], the per-invocation view handed out by a
//! [`TransactionalStore`]: writes are staged in that view and become visible
//! only when the host commits it, all at once. Dropping an uncommitted view
//! discards everything it staged.

pub mod memory;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use tokenledger_common::{Result, StoreError};

use crate::keys::StateKey;

pub use memory::{MemoryStore, MemoryTxn};

/// Finite, consume-once sequence produced by a store read.
pub type StateIter<'a, T> = Box<dyn Iterator<Item = std::result::Result<T, StoreError>> + 'a>;

/// One committed value of a key, as kept by the store's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyModification {
    /// Host transaction that committed the value.
    pub tx_id: String,
    pub timestamp: DateTime<Utc>,
    /// Committed bytes; empty for deletions.
    pub value: Vec<u8>,
    pub is_delete: bool,
}

/// Equality selector over top-level fields of JSON documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selector {
    fields: BTreeMap<String, Value>,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `name` to equal `value`.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Parse the `{"selector":{...}}` query form.
    pub fn parse(query: &str) -> std::result::Result<Self, StoreError> {
        let document: Value = serde_json::from_str(query)
            .map_err(|e| StoreError::InvalidQuery(e.to_string()))?;
        let selector = document
            .get("selector")
            .and_then(Value::as_object)
            .ok_or_else(|| StoreError::InvalidQuery("missing selector object".to_string()))?;

        let mut fields = BTreeMap::new();
        for (name, value) in selector {
            if value.is_object() || value.is_array() {
                return Err(StoreError::InvalidQuery(format!(
                    "field {} must be compared to a scalar",
                    name
                )));
            }
            fields.insert(name.clone(), value.clone());
        }
        Ok(Self { fields })
    }

    /// Render as a `{"selector":{...}}` query string.
    pub fn to_query_string(&self) -> String {
        serde_json::json!({ "selector": self.fields }).to_string()
    }

    /// Check a document against every field condition.
    pub fn matches(&self, document: &Value) -> bool {
        self.fields
            .iter()
            .all(|(name, expected)| document.get(name) == Some(expected))
    }
}

/// Per-invocation view of the key-value store.
pub trait StateStore {
    /// Identifier of the enclosing host transaction.
    fn tx_id(&self) -> &str;

    /// Read a key. Staged writes of this view are visible.
    fn get_state(&self, key: &StateKey) -> std::result::Result<Option<Vec<u8>>, StoreError>;

    /// Stage a write.
    fn put_state(&mut self, key: &StateKey, value: Vec<u8>) -> std::result::Result<(), StoreError>;

    /// All keys starting with `prefix`, in key order.
    fn scan_prefix(
        &self,
        prefix: &StateKey,
    ) -> std::result::Result<StateIter<'_, (StateKey, Vec<u8>)>, StoreError>;

    /// All JSON documents matching the selector.
    fn query(
        &self,
        selector: &Selector,
    ) -> std::result::Result<StateIter<'_, (StateKey, Vec<u8>)>, StoreError>;

    /// Every committed value of `key`, oldest first.
    fn history_for_key(
        &self,
        key: &StateKey,
    ) -> std::result::Result<StateIter<'_, KeyModification>, StoreError>;
}

/// Host store that hands out atomic per-invocation views.
pub trait TransactionalStore: Send + Sync {
    type Txn<'a>: StateStore
    where
        Self: 'a;

    /// Open a view for one invocation.
    fn begin(&self, tx_id: &str) -> Self::Txn<'_>;

    /// Validate and apply everything the view staged, or nothing.
    /// Returns the store version after the commit.
    fn commit(&self, txn: Self::Txn<'_>) -> std::result::Result<u64, StoreError>;
}

/// Decode a stored JSON record.
pub fn decode<T: DeserializeOwned>(key: &StateKey, bytes: &[u8]) -> std::result::Result<T, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Encode a record as JSON.
pub fn encode<T: Serialize>(key: &StateKey, record: &T) -> std::result::Result<Vec<u8>, StoreError> {
    serde_json::to_vec(record).map_err(|e| StoreError::Backend(format!(
        "failed to encode record for {}: {}",
        key, e
    )))
}

/// Read and decode a record. Absence is checked before decoding.
pub fn read_record<S, T>(store: &S, key: &StateKey) -> Result<Option<T>>
where
    S: StateStore + ?Sized,
    T: DeserializeOwned,
{
    match store.get_state(key)? {
        None => Ok(None),
        Some(bytes) => Ok(Some(decode(key, &bytes)?)),
    }
}

/// Encode and stage a record.
pub fn write_record<S, T>(store: &mut S, key: &StateKey, record: &T) -> Result<()>
where
    S: StateStore + ?Sized,
    T: Serialize,
{
    let bytes = encode(key, record)?;
    store.put_state(key, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_selector_round_trip() {
        let selector = Selector::new().field("doc_type", "MINTTX");
        let parsed = Selector::parse(&selector.to_query_string()).unwrap();
        assert_eq!(parsed, selector);
    }

    #[test]
    fn test_selector_matching() {
        let selector = Selector::parse(r#"{"selector":{"doc_type":"OWNER","asset_id":"TOKEN1"}}"#)
            .unwrap();

        assert!(selector.matches(&json!({"doc_type": "OWNER", "asset_id": "TOKEN1", "amount": 5})));
        assert!(!selector.matches(&json!({"doc_type": "OWNER", "asset_id": "TOKEN2"})));
        assert!(!selector.matches(&json!({"asset_id": "TOKEN1"})));
    }

    #[test]
    fn test_selector_rejects_operators() {
        assert!(Selector::parse(r#"{"selector":{"amount":{"$gt":5}}}"#).is_err());
        assert!(Selector::parse(r#"{"fields":["a"]}"#).is_err());
        assert!(Selector::parse("not json").is_err());
    }
}
