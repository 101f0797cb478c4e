//! In-memory storage backend.
//!
//! Keeps ABI blobs, block records, actions and deltas in RAM, keyed by chain.
//! Useful for tests and short-lived workers that don't need persistence.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chainhist_abi::{parse_abi_store_key, AbiStore};
use chainhist_core::{
    BlockIndex, BlockRecord, DeltaRecord, IndexCollection, IndexWriter, ResolvedAction, SortOrder,
    StoreError,
};

/// In-memory store.
///
/// All data is lost when the value is dropped.
#[derive(Default)]
pub struct MemoryStore {
    abis: Mutex<BTreeMap<String, Vec<u8>>>,
    blocks: Mutex<HashMap<String, BTreeMap<u32, BlockRecord>>>,
    actions: Mutex<HashMap<String, Vec<ResolvedAction>>>,
    deltas: Mutex<HashMap<String, Vec<DeltaRecord>>>,
    fail_writes: AtomicBool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with a backend error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("memory store is read-only".into()));
        }
        Ok(())
    }

    /// All ABI keys, in lexical order.
    pub fn abi_keys(&self) -> Vec<String> {
        lock(&self.abis).keys().cloned().collect()
    }

    pub fn abi_blob(&self, key: &str) -> Option<Vec<u8>> {
        lock(&self.abis).get(key).cloned()
    }

    /// Block records of `chain`, ascending by block number.
    pub fn blocks(&self, chain: &str) -> Vec<BlockRecord> {
        lock(&self.blocks)
            .get(chain)
            .map(|b| b.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Actions of `chain` in write order.
    pub fn actions(&self, chain: &str) -> Vec<ResolvedAction> {
        lock(&self.actions).get(chain).cloned().unwrap_or_default()
    }

    pub fn deltas(&self, chain: &str) -> Vec<DeltaRecord> {
        lock(&self.deltas).get(chain).cloned().unwrap_or_default()
    }

    fn abi_blocks(&self, chain: &str) -> Vec<u64> {
        lock(&self.abis)
            .keys()
            .filter_map(|k| parse_abi_store_key(k).ok())
            .filter(|(c, _, _)| c == chain)
            .map(|(_, block, _)| u64::from(block))
            .collect()
    }
}

#[async_trait]
impl AbiStore for MemoryStore {
    async fn put(&self, key: &str, blob: &[u8]) -> Result<(), StoreError> {
        self.check_writable()?;
        parse_abi_store_key(key)?;
        lock(&self.abis).insert(key.to_string(), blob.to_vec());
        Ok(())
    }

    async fn entries(&self, chain: &str) -> Result<Vec<(u32, String, Vec<u8>)>, StoreError> {
        let abis = lock(&self.abis);
        let mut out = Vec::new();
        for (key, blob) in abis.iter() {
            let (c, block_num, account) = parse_abi_store_key(key)?;
            if c == chain {
                out.push((block_num, account, blob.clone()));
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl IndexWriter for MemoryStore {
    async fn write_block(&self, chain: &str, block: BlockRecord) -> Result<(), StoreError> {
        self.check_writable()?;
        lock(&self.blocks)
            .entry(chain.to_string())
            .or_default()
            .insert(block.block_num, block);
        Ok(())
    }

    async fn write_actions(&self, chain: &str, actions: Vec<ResolvedAction>) -> Result<(), StoreError> {
        self.check_writable()?;
        lock(&self.actions)
            .entry(chain.to_string())
            .or_default()
            .extend(actions);
        Ok(())
    }

    async fn write_deltas(&self, chain: &str, deltas: Vec<DeltaRecord>) -> Result<(), StoreError> {
        self.check_writable()?;
        lock(&self.deltas)
            .entry(chain.to_string())
            .or_default()
            .extend(deltas);
        Ok(())
    }
}

#[async_trait]
impl BlockIndex for MemoryStore {
    async fn edge_block(
        &self,
        chain: &str,
        collection: IndexCollection,
        range: Option<Range<u64>>,
        order: SortOrder,
    ) -> Result<Option<u64>, StoreError> {
        let blocks: Vec<u64> = match collection {
            IndexCollection::Block => lock(&self.blocks)
                .get(chain)
                .map(|b| b.keys().map(|n| u64::from(*n)).collect())
                .unwrap_or_default(),
            IndexCollection::Delta => lock(&self.deltas)
                .get(chain)
                .map(|d| d.iter().map(|r| u64::from(r.block_num)).collect())
                .unwrap_or_default(),
            IndexCollection::Abi => self.abi_blocks(chain),
        };
        let in_range = blocks
            .into_iter()
            .filter(|b| range.as_ref().map_or(true, |r| r.contains(b)));
        Ok(match order {
            SortOrder::Asc => in_range.min(),
            SortOrder::Desc => in_range.max(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainhist_core::ResumePoints;
    use std::sync::Arc;

    fn block(n: u32) -> BlockRecord {
        BlockRecord {
            timestamp: None,
            block_num: n,
            block_id: format!("{n:064x}"),
            producer: None,
            previous: None,
            trx_count: 0,
            act_count: 0,
        }
    }

    fn delta(n: u32) -> DeltaRecord {
        DeltaRecord {
            block_num: n,
            table: "account".into(),
            present: true,
            data: "00".into(),
        }
    }

    #[tokio::test]
    async fn abi_entries_filtered_by_chain() {
        let store = MemoryStore::new();
        store.put("eos:100:eosio.token", b"a").await.unwrap();
        store.put("eos:50:eosio.token", b"b").await.unwrap();
        store.put("wax:10:eosio", b"c").await.unwrap();

        let mut eos = store.entries("eos").await.unwrap();
        eos.sort();
        assert_eq!(
            eos,
            vec![
                (50, "eosio.token".to_string(), b"b".to_vec()),
                (100, "eosio.token".to_string(), b"a".to_vec()),
            ]
        );
        assert_eq!(store.entries("wax").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn malformed_abi_key_rejected() {
        let store = MemoryStore::new();
        let err = store.put("no-colons", b"x").await.unwrap_err();
        assert!(matches!(err, StoreError::MalformedKey { .. }));
        assert!(store.abi_keys().is_empty());
    }

    #[tokio::test]
    async fn failing_writes_leave_store_untouched() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        assert!(store.write_block("eos", block(1)).await.is_err());
        assert!(store.put("eos:1:a", b"x").await.is_err());
        store.set_fail_writes(false);
        store.write_block("eos", block(1)).await.unwrap();
        assert_eq!(store.blocks("eos").len(), 1);
    }

    #[tokio::test]
    async fn resume_points_over_memory_index() {
        let store = Arc::new(MemoryStore::new());
        for n in [10, 20, 30] {
            store.write_block("eos", block(n)).await.unwrap();
        }
        store
            .write_deltas("eos", vec![delta(15), delta(25)])
            .await
            .unwrap();
        store.put("eos:7:eosio", b"abi").await.unwrap();
        store.write_block("wax", block(999)).await.unwrap();

        let rp = ResumePoints::new(store.clone(), "eos");
        assert_eq!(rp.last_indexed_block().await.unwrap(), 30);
        assert_eq!(rp.last_indexed_block_by_delta().await.unwrap(), 25);
        assert_eq!(rp.first_indexed_block_from_range(11, 40).await.unwrap(), 20);
        assert_eq!(rp.last_indexed_block_from_range(0, 30).await.unwrap(), 20);
        assert_eq!(
            rp.last_indexed_block_by_delta_from_range(0, 20).await.unwrap(),
            15
        );
        assert_eq!(rp.last_indexed_abi().await.unwrap(), 7);

        let empty = ResumePoints::new(store, "telos");
        assert_eq!(empty.last_indexed_block().await.unwrap(), 0);
        assert_eq!(empty.last_indexed_abi().await.unwrap(), 1);
    }
}
