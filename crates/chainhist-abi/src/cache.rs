//! Versioned ABI cache.
//!
//! Per account, an ascending list of the block numbers at which a new ABI
//! became effective. Every new version is written through to an
//! [`AbiStore`] before it becomes visible in memory, so lookups never touch
//! the store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

use chainhist_core::StoreError;

use crate::abi::ContractAbi;
use crate::error::AbiError;

/// Durable-store key for one ABI version: `chain:block_num:account`.
pub fn abi_store_key(chain: &str, block_num: u32, account: &str) -> String {
    format!("{chain}:{block_num}:{account}")
}

/// Split a key produced by [`abi_store_key`].
pub fn parse_abi_store_key(key: &str) -> Result<(String, u32, String), StoreError> {
    let malformed = || StoreError::MalformedKey { key: key.into() };
    let mut parts = key.rsplitn(3, ':');
    let account = parts.next().ok_or_else(malformed)?;
    let block = parts.next().ok_or_else(malformed)?;
    let chain = parts.next().ok_or_else(malformed)?;
    let block_num = block.parse().map_err(|_| malformed())?;
    if chain.is_empty() || account.is_empty() {
        return Err(malformed());
    }
    Ok((chain.to_string(), block_num, account.to_string()))
}

/// Durable key/value backing for ABI versions.
#[async_trait]
pub trait AbiStore: Send + Sync {
    async fn put(&self, key: &str, blob: &[u8]) -> Result<(), StoreError>;

    /// Every stored `(block_num, account, blob)` for `chain`.
    async fn entries(&self, chain: &str) -> Result<Vec<(u32, String, Vec<u8>)>, StoreError>;
}

#[async_trait]
impl<S: AbiStore + ?Sized> AbiStore for Arc<S> {
    async fn put(&self, key: &str, blob: &[u8]) -> Result<(), StoreError> {
        (**self).put(key, blob).await
    }

    async fn entries(&self, chain: &str) -> Result<Vec<(u32, String, Vec<u8>)>, StoreError> {
        (**self).entries(chain).await
    }
}

/// One recorded ABI. The blob is parsed on first use and the result kept.
#[derive(Debug)]
pub struct AbiVersion {
    block_num: u32,
    blob: Vec<u8>,
    parsed: OnceLock<Result<ContractAbi, AbiError>>,
}

impl AbiVersion {
    fn new(block_num: u32, blob: Vec<u8>) -> Self {
        Self {
            block_num,
            blob,
            parsed: OnceLock::new(),
        }
    }

    pub fn block_num(&self) -> u32 {
        self.block_num
    }

    pub fn blob(&self) -> &[u8] {
        &self.blob
    }

    pub fn schema(&self) -> Result<&ContractAbi, &AbiError> {
        self.parsed
            .get_or_init(|| ContractAbi::from_blob(&self.blob))
            .as_ref()
    }
}

/// Single-owner cache of ABI versions for one chain.
pub struct AbiVersionCache<S> {
    chain: String,
    store: S,
    versions: HashMap<String, Vec<AbiVersion>>,
}

impl<S: AbiStore> AbiVersionCache<S> {
    pub fn new(chain: impl Into<String>, store: S) -> Self {
        Self {
            chain: chain.into(),
            store,
            versions: HashMap::new(),
        }
    }

    /// Build a cache from what the store already holds for `chain`.
    pub async fn warm_start(chain: impl Into<String>, store: S) -> Result<Self, StoreError> {
        let mut cache = Self::new(chain, store);
        let entries = cache.store.entries(&cache.chain).await?;
        let loaded = entries.len();
        for (block_num, account, blob) in entries {
            cache.insert(account, block_num, blob);
        }
        debug!(chain = %cache.chain, loaded, accounts = cache.versions.len(), "ABI cache warm start");
        Ok(cache)
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persist `blob` as the ABI of `account` from `block_num` on, then
    /// make it visible to [`resolve`](Self::resolve). A store failure leaves
    /// the cache unchanged.
    pub async fn record(
        &mut self,
        account: &str,
        block_num: u32,
        blob: Vec<u8>,
    ) -> Result<(), StoreError> {
        let key = abi_store_key(&self.chain, block_num, account);
        self.store.put(&key, &blob).await?;
        debug!(key = %key, bytes = blob.len(), "ABI version recorded");
        self.insert(account.to_string(), block_num, blob);
        Ok(())
    }

    fn insert(&mut self, account: String, block_num: u32, blob: Vec<u8>) {
        let list = self.versions.entry(account).or_default();
        let idx = list.partition_point(|v| v.block_num < block_num);
        match list.get_mut(idx) {
            Some(existing) if existing.block_num == block_num => {
                *existing = AbiVersion::new(block_num, blob)
            }
            _ => list.insert(idx, AbiVersion::new(block_num, blob)),
        }
    }

    /// The version effective at `block_num`: the greatest recorded block
    /// not above it.
    pub fn resolve(&self, account: &str, block_num: u32) -> Option<&AbiVersion> {
        let list = self.versions.get(account)?;
        let idx = list.partition_point(|v| v.block_num <= block_num);
        idx.checked_sub(1).map(|i| &list[i])
    }

    /// Recorded block numbers for `account`, ascending.
    pub fn versions(&self, account: &str) -> Vec<u32> {
        self.versions
            .get(account)
            .map(|list| list.iter().map(|v| v.block_num).collect())
            .unwrap_or_default()
    }

    pub fn account_count(&self) -> usize {
        self.versions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct VecStore {
        rows: Mutex<Vec<(String, Vec<u8>)>>,
        fail: bool,
    }

    #[async_trait]
    impl AbiStore for VecStore {
        async fn put(&self, key: &str, blob: &[u8]) -> Result<(), StoreError> {
            if self.fail {
                return Err(StoreError::Backend("unavailable".into()));
            }
            self.rows.lock().unwrap().push((key.to_string(), blob.to_vec()));
            Ok(())
        }

        async fn entries(&self, chain: &str) -> Result<Vec<(u32, String, Vec<u8>)>, StoreError> {
            let rows = self.rows.lock().unwrap();
            let mut out = Vec::new();
            for (key, blob) in rows.iter() {
                let (c, block, account) = parse_abi_store_key(key)?;
                if c == chain {
                    out.push((block, account, blob.clone()));
                }
            }
            Ok(out)
        }
    }

    #[tokio::test]
    async fn resolve_is_independent_of_insertion_order() {
        let mut cache = AbiVersionCache::new("eos", VecStore::default());
        cache.record("tokena", 100, b"X".to_vec()).await.unwrap();
        cache.record("tokena", 50, b"Y".to_vec()).await.unwrap();

        assert_eq!(cache.resolve("tokena", 75).unwrap().blob(), b"Y");
        assert_eq!(cache.resolve("tokena", 100).unwrap().blob(), b"X");
        assert_eq!(cache.resolve("tokena", 1_000).unwrap().block_num(), 100);
        assert!(cache.resolve("tokena", 49).is_none());
        assert!(cache.resolve("tokenb", 75).is_none());
        assert_eq!(cache.versions("tokena"), vec![50, 100]);
    }

    #[tokio::test]
    async fn record_writes_through_before_visibility() {
        let store = Arc::new(VecStore::default());
        let mut cache = AbiVersionCache::new("eos", store.clone());
        cache.record("eosio.token", 10, b"{}".to_vec()).await.unwrap();

        let rows = store.rows.lock().unwrap().clone();
        assert_eq!(rows, vec![("eos:10:eosio.token".to_string(), b"{}".to_vec())]);
        assert_eq!(cache.resolve("eosio.token", 10).unwrap().block_num(), 10);
    }

    #[tokio::test]
    async fn store_failure_leaves_cache_unchanged() {
        let store = VecStore {
            fail: true,
            ..Default::default()
        };
        let mut cache = AbiVersionCache::new("eos", store);
        assert!(cache.record("a", 1, vec![1]).await.is_err());
        assert!(cache.resolve("a", 1).is_none());
    }

    #[tokio::test]
    async fn duplicate_block_replaces_blob() {
        let mut cache = AbiVersionCache::new("eos", VecStore::default());
        cache.record("a", 5, b"old".to_vec()).await.unwrap();
        cache.record("a", 5, b"new".to_vec()).await.unwrap();
        assert_eq!(cache.versions("a"), vec![5]);
        assert_eq!(cache.resolve("a", 5).unwrap().blob(), b"new");
    }

    #[tokio::test]
    async fn warm_start_rebuilds_index_for_chain() {
        let store = Arc::new(VecStore::default());
        {
            let mut eos = AbiVersionCache::new("eos", store.clone());
            eos.record("a", 20, vec![2]).await.unwrap();
            eos.record("a", 10, vec![1]).await.unwrap();
            let mut wax = AbiVersionCache::new("wax", store.clone());
            wax.record("a", 30, vec![3]).await.unwrap();
        }
        let cache = AbiVersionCache::warm_start("eos", store).await.unwrap();
        assert_eq!(cache.versions("a"), vec![10, 20]);
        assert_eq!(cache.account_count(), 1);
    }

    #[tokio::test]
    async fn unparsable_blob_is_still_resolvable() {
        let mut cache = AbiVersionCache::new("eos", VecStore::default());
        cache.record("a", 1, b"\x01garbage".to_vec()).await.unwrap();
        let version = cache.resolve("a", 1).unwrap();
        assert!(version.schema().is_err());
        assert!(version.schema().is_err());
    }

    #[test]
    fn store_keys() {
        assert_eq!(abi_store_key("eos", 7, "eosio"), "eos:7:eosio");
        assert_eq!(
            parse_abi_store_key("eos:7:eosio").unwrap(),
            ("eos".to_string(), 7, "eosio".to_string())
        );
        assert!(parse_abi_store_key("eos:x:eosio").is_err());
        assert!(parse_abi_store_key("eosio").is_err());
    }
}
