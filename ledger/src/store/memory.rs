//! In-memory transactional store with optimistic concurrency control.
//!
//! Committed state lives in an ordered map behind a `RwLock`. A
//! [`MemoryTxn`] reads through to committed state, stages its writes
//! locally and remembers the version of every key (and every scanned range)
//! it observed. Commit re-checks those versions under the write lock; any
//! change made by another transaction in between aborts the commit with
//! [`StoreError::Conflict`] and nothing is applied.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

use tokenledger_common::StoreError;

use super::{KeyModification, Selector, StateIter, StateStore, TransactionalStore};
use crate::keys::StateKey;

#[derive(Debug, Clone)]
struct Versioned {
    value: Vec<u8>,
    version: u64,
}

#[derive(Debug, Default)]
struct Committed {
    state: BTreeMap<StateKey, Versioned>,
    history: HashMap<StateKey, Vec<KeyModification>>,
    version: u64,
}

impl Committed {
    fn version_of(&self, key: &StateKey) -> Option<u64> {
        self.state.get(key).map(|v| v.version)
    }

    fn range_versions(&self, prefix: &StateKey) -> Vec<(StateKey, u64)> {
        self.state
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, v)| (key.clone(), v.version))
            .collect()
    }
}

/// Shared in-memory key-value store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    committed: RwLock<Committed>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Version of the last successful commit.
    pub fn version(&self) -> u64 {
        self.committed.read().version
    }

    /// Number of committed keys.
    pub fn len(&self) -> usize {
        self.committed.read().state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Committed value of a key, outside any transaction.
    pub fn snapshot(&self, key: &StateKey) -> Option<Vec<u8>> {
        self.committed.read().state.get(key).map(|v| v.value.clone())
    }
}

/// One invocation's view of a [`MemoryStore`].
pub struct MemoryTxn<'a> {
    store: &'a MemoryStore,
    tx_id: String,
    timestamp: DateTime<Utc>,
    reads: RefCell<HashMap<StateKey, Option<u64>>>,
    ranges: RefCell<Vec<(StateKey, Vec<(StateKey, u64)>)>>,
    writes: BTreeMap<StateKey, Vec<u8>>,
}

impl<'a> MemoryTxn<'a> {
    fn new(store: &'a MemoryStore, tx_id: &str) -> Self {
        Self {
            store,
            tx_id: tx_id.to_string(),
            timestamp: Utc::now(),
            reads: RefCell::new(HashMap::new()),
            ranges: RefCell::new(Vec::new()),
            writes: BTreeMap::new(),
        }
    }

    /// Number of staged writes.
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    fn track_read(&self, key: &StateKey, version: Option<u64>) {
        self.reads.borrow_mut().entry(key.clone()).or_insert(version);
    }

    /// Committed entries merged with staged writes, in key order.
    fn merged_view<F>(&self, include: F) -> BTreeMap<StateKey, Vec<u8>>
    where
        F: Fn(&StateKey) -> bool,
    {
        let committed = self.store.committed.read();
        let mut merged: BTreeMap<StateKey, Vec<u8>> = committed
            .state
            .iter()
            .filter(|(key, _)| include(key))
            .map(|(key, v)| (key.clone(), v.value.clone()))
            .collect();
        for (key, value) in self.writes.iter().filter(|(key, _)| include(key)) {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }
}

impl StateStore for MemoryTxn<'_> {
    fn tx_id(&self) -> &str {
        &self.tx_id
    }

    fn get_state(&self, key: &StateKey) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(staged) = self.writes.get(key) {
            return Ok(Some(staged.clone()));
        }

        let committed = self.store.committed.read();
        let current = committed.state.get(key);
        self.track_read(key, current.map(|v| v.version));
        debug!(key = %key, found = current.is_some(), "Read state");
        Ok(current.map(|v| v.value.clone()))
    }

    fn put_state(&mut self, key: &StateKey, value: Vec<u8>) -> Result<(), StoreError> {
        if key.as_str().is_empty() {
            return Err(StoreError::Backend("empty key".to_string()));
        }
        self.writes.insert(key.clone(), value);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &StateKey) -> Result<StateIter<'_, (StateKey, Vec<u8>)>, StoreError> {
        {
            let committed = self.store.committed.read();
            let observed = committed.range_versions(prefix);
            self.ranges.borrow_mut().push((prefix.clone(), observed));
        }

        let merged = self.merged_view(|key| key.starts_with(prefix));
        Ok(Box::new(merged.into_iter().map(Ok)))
    }

    /// Rich queries are not re-validated at commit.
    fn query(&self, selector: &Selector) -> Result<StateIter<'_, (StateKey, Vec<u8>)>, StoreError> {
        let merged = self.merged_view(|_| true);
        let matches: Vec<(StateKey, Vec<u8>)> = merged
            .into_iter()
            .filter(|(_, bytes)| {
                serde_json::from_slice::<Value>(bytes)
                    .map(|doc| selector.matches(&doc))
                    .unwrap_or(false)
            })
            .collect();
        Ok(Box::new(matches.into_iter().map(Ok)))
    }

    fn history_for_key(&self, key: &StateKey) -> Result<StateIter<'_, KeyModification>, StoreError> {
        let entries = self
            .store
            .committed
            .read()
            .history
            .get(key)
            .cloned()
            .unwrap_or_default();
        Ok(Box::new(entries.into_iter().map(Ok)))
    }
}

impl TransactionalStore for MemoryStore {
    type Txn<'a> = MemoryTxn<'a> where Self: 'a;

    fn begin(&self, tx_id: &str) -> MemoryTxn<'_> {
        MemoryTxn::new(self, tx_id)
    }

    fn commit(&self, txn: MemoryTxn<'_>) -> Result<u64, StoreError> {
        if !std::ptr::eq(self, txn.store) {
            return Err(StoreError::Backend(
                "transaction belongs to a different store".to_string(),
            ));
        }

        let mut committed = self.committed.write();

        for (key, seen) in txn.reads.borrow().iter() {
            if committed.version_of(key) != *seen {
                warn!(tx_id = %txn.tx_id, key = %key, "Read-set validation failed");
                return Err(StoreError::Conflict { key: key.to_string() });
            }
        }
        for (prefix, seen) in txn.ranges.borrow().iter() {
            if committed.range_versions(prefix) != *seen {
                warn!(tx_id = %txn.tx_id, prefix = %prefix, "Range validation failed");
                return Err(StoreError::Conflict { key: prefix.to_string() });
            }
        }

        if txn.writes.is_empty() {
            return Ok(committed.version);
        }

        committed.version += 1;
        let version = committed.version;
        let writes = txn.writes.len();

        for (key, value) in txn.writes {
            committed.history.entry(key.clone()).or_default().push(KeyModification {
                tx_id: txn.tx_id.clone(),
                timestamp: txn.timestamp,
                value: value.clone(),
                is_delete: false,
            });
            committed.state.insert(key, Versioned { value, version });
        }

        debug!(tx_id = %txn.tx_id, version, writes, "Committed transaction");
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> StateKey {
        StateKey::new(raw)
    }

    fn put(store: &MemoryStore, tx_id: &str, k: &str, v: &str) {
        let mut txn = store.begin(tx_id);
        txn.put_state(&key(k), v.as_bytes().to_vec()).unwrap();
        store.commit(txn).unwrap();
    }

    #[test]
    fn test_reads_own_writes() {
        let store = MemoryStore::new();
        let mut txn = store.begin("tx1");

        assert_eq!(txn.get_state(&key("a")).unwrap(), None);
        txn.put_state(&key("a"), b"1".to_vec()).unwrap();
        assert_eq!(txn.get_state(&key("a")).unwrap(), Some(b"1".to_vec()));

        assert!(store.snapshot(&key("a")).is_none());
        store.commit(txn).unwrap();
        assert_eq!(store.snapshot(&key("a")), Some(b"1".to_vec()));
    }

    #[test]
    fn test_dropped_transaction_discards_writes() {
        let store = MemoryStore::new();
        {
            let mut txn = store.begin("tx1");
            txn.put_state(&key("a"), b"1".to_vec()).unwrap();
        }
        assert!(store.is_empty());
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn test_stale_read_conflicts() {
        let store = MemoryStore::new();
        put(&store, "tx0", "a", "1");

        let mut first = store.begin("tx1");
        let mut second = store.begin("tx2");
        first.get_state(&key("a")).unwrap();
        second.get_state(&key("a")).unwrap();
        first.put_state(&key("a"), b"2".to_vec()).unwrap();
        second.put_state(&key("a"), b"3".to_vec()).unwrap();

        store.commit(first).unwrap();
        let err = store.commit(second).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert_eq!(store.snapshot(&key("a")), Some(b"2".to_vec()));
    }

    #[test]
    fn test_absent_key_read_conflicts_with_insert() {
        let store = MemoryStore::new();

        let mut txn = store.begin("tx1");
        assert!(txn.get_state(&key("a")).unwrap().is_none());
        txn.put_state(&key("b"), b"x".to_vec()).unwrap();

        put(&store, "tx2", "a", "1");
        assert!(store.commit(txn).is_err());
        assert!(store.snapshot(&key("b")).is_none());
    }

    #[test]
    fn test_prefix_scan_is_ordered_and_validated() {
        let store = MemoryStore::new();
        put(&store, "tx0", "p/b", "2");
        put(&store, "tx1", "p/a", "1");
        put(&store, "tx2", "q/a", "3");

        let mut txn = store.begin("tx3");
        txn.put_state(&key("p/c"), b"4".to_vec()).unwrap();
        let keys: Vec<String> = txn
            .scan_prefix(&key("p/"))
            .unwrap()
            .map(|item| item.unwrap().0.as_str().to_string())
            .collect();
        assert_eq!(keys, vec!["p/a", "p/b", "p/c"]);

        put(&store, "tx4", "p/z", "5");
        assert!(matches!(
            store.commit(txn),
            Err(StoreError::Conflict { .. })
        ));
    }

    #[test]
    fn test_history_records_each_commit() {
        let store = MemoryStore::new();
        put(&store, "tx1", "a", "1");
        put(&store, "tx2", "a", "2");

        let txn = store.begin("tx3");
        let history: Vec<KeyModification> = txn
            .history_for_key(&key("a"))
            .unwrap()
            .map(|item| item.unwrap())
            .collect();

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].tx_id, "tx1");
        assert_eq!(history[1].value, b"2".to_vec());
        assert!(!history[1].is_delete);
    }

    #[test]
    fn test_query_matches_json_documents() {
        let store = MemoryStore::new();
        put(&store, "tx1", "a", r#"{"doc_type":"MINTTX","amount":5}"#);
        put(&store, "tx2", "b", r#"{"doc_type":"BURNTXN","amount":1}"#);
        put(&store, "tx3", "c", "not json");

        let txn = store.begin("tx4");
        let selector = Selector::new().field("doc_type", "MINTTX");
        let found: Vec<StateKey> = txn
            .query(&selector)
            .unwrap()
            .map(|item| item.unwrap().0)
            .collect();
        assert_eq!(found, vec![key("a")]);
    }

    #[test]
    fn test_commit_rejects_foreign_transaction() {
        let store = MemoryStore::new();
        let other = MemoryStore::new();
        let txn = other.begin("tx1");
        assert!(matches!(store.commit(txn), Err(StoreError::Backend(_))));
    }
}
