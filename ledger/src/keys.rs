//! Composite state keys.
//!
//! Keys follow the composite layout `\0<object type>\0<attr>\0<attr>\0`.
//! Identifiers never contain `\0`, so a composite key can never equal a
//! simple key (an asset id), and keys of one object type sort by their
//! attributes in tuple order.

use std::fmt;

use tokenledger_common::{validate_id, AssetId, OwnerId, Result, TxnId, KEY_SEPARATOR};

/// Opaque key in the ledger's key-value space.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateKey(String);

impl StateKey {
    /// Build a key from a raw string.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Check whether `prefix` is a leading part of this key.
    pub fn starts_with(&self, prefix: &StateKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Whether the key belongs to a composite namespace.
    pub fn is_composite(&self) -> bool {
        self.0.starts_with(KEY_SEPARATOR)
    }
}

impl fmt::Display for StateKey {
    /// Renders separators as `~` for logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let printable = self.0.trim_matches(KEY_SEPARATOR).replace(KEY_SEPARATOR, "~");
        f.write_str(&printable)
    }
}

/// Join an object type and attributes into a composite key.
pub fn composite_key(object_type: &str, attributes: &[&str]) -> StateKey {
    let capacity = 2 + object_type.len() + attributes.iter().map(|a| a.len() + 1).sum::<usize>();
    let mut key = String::with_capacity(capacity);
    key.push(KEY_SEPARATOR);
    key.push_str(object_type);
    key.push(KEY_SEPARATOR);
    for attribute in attributes {
        key.push_str(attribute);
        key.push(KEY_SEPARATOR);
    }
    StateKey(key)
}

/// Split a composite key back into its object type and attributes.
pub fn split_composite_key(key: &StateKey) -> Option<(String, Vec<String>)> {
    let inner = key.0.strip_prefix(KEY_SEPARATOR)?.strip_suffix(KEY_SEPARATOR)?;
    let mut parts = inner.split(KEY_SEPARATOR).map(str::to_string);
    let object_type = parts.next()?;
    Some((object_type, parts.collect()))
}

/// Builds the two composite namespaces of one asset type tag.
#[derive(Debug, Clone)]
pub struct KeyCodec {
    txn_index: String,
    balance_index: String,
}

impl KeyCodec {
    /// Create a codec for the given asset type tag.
    pub fn new(doc_type: &str) -> Result<Self> {
        validate_id(doc_type, "doc_type")?;
        Ok(Self {
            txn_index: format!("TxnID~{}", doc_type),
            balance_index: format!("{}~Owner", doc_type),
        })
    }

    /// Primary key of an asset record.
    pub fn asset_key(&self, asset_id: &AssetId) -> StateKey {
        StateKey::new(asset_id.as_str())
    }

    /// Idempotency key of one operation.
    pub fn txn_key(&self, txn_id: &TxnId, asset_id: &AssetId) -> StateKey {
        composite_key(&self.txn_index, &[txn_id.as_str(), asset_id.as_str()])
    }

    /// Key of one owner's balance of one asset.
    pub fn balance_key(&self, asset_id: &AssetId, owner: &OwnerId) -> StateKey {
        composite_key(&self.balance_index, &[asset_id.as_str(), owner.as_str()])
    }

    /// Prefix covering every balance key of one asset.
    pub fn balance_prefix(&self, asset_id: &AssetId) -> StateKey {
        composite_key(&self.balance_index, &[asset_id.as_str()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> KeyCodec {
        KeyCodec::new("token").unwrap()
    }

    #[test]
    fn test_composite_round_trip() {
        let key = codec().balance_key(&AssetId::new("TOKEN1"), &OwnerId::new("alice"));
        let (object_type, attributes) = split_composite_key(&key).unwrap();

        assert_eq!(object_type, "token~Owner");
        assert_eq!(attributes, vec!["TOKEN1".to_string(), "alice".to_string()]);
        assert_eq!(key.to_string(), "token~Owner~TOKEN1~alice");
    }

    #[test]
    fn test_namespaces_do_not_collide() {
        let codec = codec();
        let asset = AssetId::new("TOKEN1");
        let txn = codec.txn_key(&TxnId::new("alice"), &asset);
        let balance = codec.balance_key(&asset, &OwnerId::new("alice"));
        let primary = codec.asset_key(&asset);

        assert_ne!(txn, balance);
        assert!(txn.is_composite());
        assert!(!primary.is_composite());
    }

    #[test]
    fn test_key_order_follows_attributes() {
        let codec = codec();
        let asset = AssetId::new("TOKEN1");
        let alice = codec.balance_key(&asset, &OwnerId::new("alice"));
        let bob = codec.balance_key(&asset, &OwnerId::new("bob"));
        let other_asset = codec.balance_key(&AssetId::new("TOKEN2"), &OwnerId::new("aaron"));

        assert!(alice < bob);
        assert!(bob < other_asset);
    }

    #[test]
    fn test_balance_prefix_is_asset_scoped() {
        let codec = codec();
        let prefix = codec.balance_prefix(&AssetId::new("TOKEN1"));

        assert!(codec
            .balance_key(&AssetId::new("TOKEN1"), &OwnerId::new("bob"))
            .starts_with(&prefix));
        assert!(!codec
            .balance_key(&AssetId::new("TOKEN10"), &OwnerId::new("bob"))
            .starts_with(&prefix));
    }

    #[test]
    fn test_tag_with_separator_rejected() {
        assert!(KeyCodec::new("bad\u{0}tag").is_err());
        assert!(KeyCodec::new("").is_err());
    }
}
