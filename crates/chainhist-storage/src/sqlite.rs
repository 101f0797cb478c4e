//! SQLite storage backend for ChainHist.
//!
//! Persists ABI versions, block records, actions and deltas to a single
//! SQLite file using `sqlx` with WAL mode.
//!
//! # Usage
//! ```rust,no_run
//! use chainhist_storage::sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStorage::open("./history.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStorage::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use std::ops::Range;
use tracing::debug;

use chainhist_abi::{parse_abi_store_key, AbiStore};
use chainhist_core::{
    BlockIndex, BlockRecord, DeltaRecord, IndexCollection, IndexWriter, ResolvedAction, SortOrder,
    StoreError,
};

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) a database at `path`.
    ///
    /// The path may be a plain file path (`"./history.db"`) or a full
    /// SQLite URL (`"sqlite:./history.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };
        let pool = SqlitePool::connect(&url).await.map_err(backend)?;
        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Open an in-memory database. All data is lost when the pool is dropped.
    pub async fn in_memory() -> Result<Self, StoreError> {
        // A single connection, otherwise every pooled connection gets its own
        // empty in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(backend)?;
        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS abi_versions (
                key       TEXT    PRIMARY KEY,
                chain     TEXT    NOT NULL,
                block_num INTEGER NOT NULL,
                account   TEXT    NOT NULL,
                blob      BLOB    NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS blocks (
                chain     TEXT    NOT NULL,
                block_num INTEGER NOT NULL,
                block_id  TEXT    NOT NULL,
                doc       TEXT    NOT NULL,
                PRIMARY KEY (chain, block_num)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS actions (
                chain           TEXT    NOT NULL,
                global_sequence INTEGER NOT NULL,
                block_num       INTEGER NOT NULL,
                doc             TEXT    NOT NULL,
                PRIMARY KEY (chain, global_sequence)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS deltas (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                chain      TEXT    NOT NULL,
                block_num  INTEGER NOT NULL,
                table_name TEXT    NOT NULL,
                present    INTEGER NOT NULL,
                data       TEXT    NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_abi_chain ON abi_versions (chain, block_num);")
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_deltas_block ON deltas (chain, block_num);")
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        Ok(())
    }

    // ─── Queries ────────────────────────────────────────────────────────────────

    /// Stored block record, if any.
    pub async fn block(&self, chain: &str, block_num: u32) -> Result<Option<BlockRecord>, StoreError> {
        let row = sqlx::query("SELECT doc FROM blocks WHERE chain = ? AND block_num = ?")
            .bind(chain)
            .bind(i64::from(block_num))
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        match row {
            Some(r) => {
                let doc: String = r.get("doc");
                Ok(Some(serde_json::from_str(&doc)?))
            }
            None => Ok(None),
        }
    }

    /// Actions of one block, ordered by global sequence.
    pub async fn actions_in_block(
        &self,
        chain: &str,
        block_num: u32,
    ) -> Result<Vec<ResolvedAction>, StoreError> {
        let rows = sqlx::query(
            "SELECT doc FROM actions WHERE chain = ? AND block_num = ? ORDER BY global_sequence",
        )
        .bind(chain)
        .bind(i64::from(block_num))
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter()
            .map(|r| {
                let doc: String = r.get("doc");
                serde_json::from_str(&doc).map_err(StoreError::from)
            })
            .collect()
    }

    pub async fn delta_count(&self, chain: &str) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM deltas WHERE chain = ?")
            .bind(chain)
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        let cnt: i64 = row.get("cnt");
        Ok(cnt as u64)
    }
}

// ─── AbiStore impl ───────────────────────────────────────────────────────────

#[async_trait]
impl AbiStore for SqliteStorage {
    async fn put(&self, key: &str, blob: &[u8]) -> Result<(), StoreError> {
        let (chain, block_num, account) = parse_abi_store_key(key)?;
        sqlx::query(
            "INSERT OR REPLACE INTO abi_versions (key, chain, block_num, account, blob)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(key)
        .bind(&chain)
        .bind(i64::from(block_num))
        .bind(&account)
        .bind(blob)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        debug!(key, bytes = blob.len(), "ABI stored");
        Ok(())
    }

    async fn entries(&self, chain: &str) -> Result<Vec<(u32, String, Vec<u8>)>, StoreError> {
        let rows = sqlx::query(
            "SELECT key, block_num, account, blob FROM abi_versions
             WHERE chain = ? ORDER BY block_num",
        )
        .bind(chain)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter()
            .map(|r| {
                let block_num: i64 = r.get("block_num");
                let block_num = u32::try_from(block_num).map_err(|_| StoreError::MalformedKey {
                    key: r.get("key"),
                })?;
                Ok((block_num, r.get("account"), r.get("blob")))
            })
            .collect()
    }
}

// ─── IndexWriter impl ────────────────────────────────────────────────────────

#[async_trait]
impl IndexWriter for SqliteStorage {
    async fn write_block(&self, chain: &str, block: BlockRecord) -> Result<(), StoreError> {
        let doc = serde_json::to_string(&block)?;
        sqlx::query(
            "INSERT OR REPLACE INTO blocks (chain, block_num, block_id, doc) VALUES (?, ?, ?, ?)",
        )
        .bind(chain)
        .bind(i64::from(block.block_num))
        .bind(&block.block_id)
        .bind(&doc)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn write_actions(&self, chain: &str, actions: Vec<ResolvedAction>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        for action in &actions {
            let doc = serde_json::to_string(action)?;
            sqlx::query(
                "INSERT OR REPLACE INTO actions (chain, global_sequence, block_num, doc)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(chain)
            .bind(action.global_sequence as i64)
            .bind(i64::from(action.block_num))
            .bind(&doc)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }
        tx.commit().await.map_err(backend)?;
        debug!(chain, count = actions.len(), "actions stored");
        Ok(())
    }

    async fn write_deltas(&self, chain: &str, deltas: Vec<DeltaRecord>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        for delta in &deltas {
            sqlx::query(
                "INSERT INTO deltas (chain, block_num, table_name, present, data)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(chain)
            .bind(i64::from(delta.block_num))
            .bind(&delta.table)
            .bind(delta.present)
            .bind(&delta.data)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }
        tx.commit().await.map_err(backend)?;
        Ok(())
    }
}

// ─── BlockIndex impl ─────────────────────────────────────────────────────────

fn collection_table(collection: IndexCollection) -> &'static str {
    match collection {
        IndexCollection::Block => "blocks",
        IndexCollection::Delta => "deltas",
        IndexCollection::Abi => "abi_versions",
    }
}

#[async_trait]
impl BlockIndex for SqliteStorage {
    async fn edge_block(
        &self,
        chain: &str,
        collection: IndexCollection,
        range: Option<Range<u64>>,
        order: SortOrder,
    ) -> Result<Option<u64>, StoreError> {
        let agg = match order {
            SortOrder::Asc => "MIN",
            SortOrder::Desc => "MAX",
        };
        let table = collection_table(collection);
        let row = match range {
            Some(r) => {
                let sql = format!(
                    "SELECT {agg}(block_num) AS edge FROM {table}
                     WHERE chain = ? AND block_num >= ? AND block_num < ?"
                );
                sqlx::query(&sql)
                    .bind(chain)
                    .bind(i64::try_from(r.start).unwrap_or(i64::MAX))
                    .bind(i64::try_from(r.end).unwrap_or(i64::MAX))
                    .fetch_one(&self.pool)
                    .await
            }
            None => {
                let sql = format!("SELECT {agg}(block_num) AS edge FROM {table} WHERE chain = ?");
                sqlx::query(&sql).bind(chain).fetch_one(&self.pool).await
            }
        }
        .map_err(backend)?;

        let edge: Option<i64> = row.get("edge");
        Ok(edge.map(|n| n as u64))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chainhist_core::{ActionData, ActionReceipt, ResolvedAct, ResumePoints};
    use std::sync::Arc;

    fn block(n: u32) -> BlockRecord {
        BlockRecord {
            timestamp: Some("2019-06-01T00:00:00.000".into()),
            block_num: n,
            block_id: format!("{n:064x}"),
            producer: Some("eosproducer".into()),
            previous: None,
            trx_count: 1,
            act_count: 1,
        }
    }

    fn action(block_num: u32, gs: u64) -> ResolvedAction {
        ResolvedAction {
            timestamp: None,
            block_num,
            producer: None,
            trx_id: "aa".into(),
            action_ordinal: 1,
            creator_action_ordinal: 0,
            receiver: "eosio.token".into(),
            act: ResolvedAct {
                account: "eosio.token".into(),
                name: "transfer".into(),
                authorization: vec![],
                data: ActionData::Hex("00".into()),
            },
            receipt: ActionReceipt {
                receiver: "eosio.token".into(),
                act_digest: "00".into(),
                global_sequence: gs,
                recv_sequence: 1,
                auth_sequence: vec![],
                code_sequence: 1,
                abi_sequence: 1,
            },
            global_sequence: gs,
            context_free: false,
            elapsed: 0,
            console: None,
            account_ram_deltas: None,
            cpu_usage_us: None,
            net_usage_words: None,
            extras: serde_json::Map::new(),
        }
    }

    // ── AbiStore ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn abi_put_and_entries() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.put("eos:100:eosio.token", b"new").await.unwrap();
        store.put("eos:50:eosio.token", b"old").await.unwrap();
        store.put("wax:1:eosio", b"other").await.unwrap();

        let entries = store.entries("eos").await.unwrap();
        assert_eq!(
            entries,
            vec![
                (50, "eosio.token".to_string(), b"old".to_vec()),
                (100, "eosio.token".to_string(), b"new".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn abi_put_overwrites_same_key() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.put("eos:5:a", b"1").await.unwrap();
        store.put("eos:5:a", b"2").await.unwrap();
        let entries = store.entries("eos").await.unwrap();
        assert_eq!(entries, vec![(5, "a".to_string(), b"2".to_vec())]);
    }

    // ── IndexWriter ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn block_and_actions_roundtrip() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.write_block("eos", block(10)).await.unwrap();
        store
            .write_actions("eos", vec![action(10, 2), action(10, 1)])
            .await
            .unwrap();

        assert_eq!(store.block("eos", 10).await.unwrap(), Some(block(10)));
        assert!(store.block("eos", 11).await.unwrap().is_none());

        let actions = store.actions_in_block("eos", 10).await.unwrap();
        assert_eq!(actions, vec![action(10, 1), action(10, 2)]);
        assert!(actions.iter().all(|a| !a.act.data.is_decoded()));
    }

    #[tokio::test]
    async fn deltas_counted_per_chain() {
        let store = SqliteStorage::in_memory().await.unwrap();
        let d = DeltaRecord {
            block_num: 3,
            table: "account".into(),
            present: true,
            data: "ab".into(),
        };
        store.write_deltas("eos", vec![d.clone(), d]).await.unwrap();
        assert_eq!(store.delta_count("eos").await.unwrap(), 2);
        assert_eq!(store.delta_count("wax").await.unwrap(), 0);
    }

    // ── BlockIndex ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn resume_points_over_sqlite() {
        let store = Arc::new(SqliteStorage::in_memory().await.unwrap());
        for n in [5, 10, 20] {
            store.write_block("eos", block(n)).await.unwrap();
        }
        store.put("eos:42:eosio", b"abi").await.unwrap();

        let rp = ResumePoints::new(store.clone(), "eos");
        assert_eq!(rp.last_indexed_block().await.unwrap(), 20);
        assert_eq!(rp.first_indexed_block_from_range(6, 100).await.unwrap(), 10);
        assert_eq!(rp.last_indexed_block_from_range(0, 20).await.unwrap(), 10);
        assert_eq!(rp.last_indexed_block_by_delta().await.unwrap(), 0);
        assert_eq!(rp.last_indexed_abi().await.unwrap(), 42);

        let other = ResumePoints::new(store, "wax");
        assert_eq!(other.last_indexed_block().await.unwrap(), 0);
        assert_eq!(other.last_indexed_abi().await.unwrap(), 1);
    }
}
