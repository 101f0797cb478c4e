//! Resume-point lookups against the block index.
//!
//! Callers use these to decide where live ingestion should continue or which
//! backfill ranges remain. Every query returns a plain block number; an empty
//! index yields the documented default instead of an error.

use async_trait::async_trait;
use std::ops::Range;
use std::sync::Arc;

use crate::error::StoreError;

/// Which indexed document family to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexCollection {
    Block,
    Delta,
    Abi,
}

impl IndexCollection {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexCollection::Block => "block",
            IndexCollection::Delta => "delta",
            IndexCollection::Abi => "abi",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Read-only access to the indexed block numbers.
#[async_trait]
pub trait BlockIndex: Send + Sync {
    /// The first (`Asc`) or last (`Desc`) block number in `collection`,
    /// optionally restricted to `range` (`start` inclusive, `end` exclusive).
    async fn edge_block(
        &self,
        chain: &str,
        collection: IndexCollection,
        range: Option<Range<u64>>,
        order: SortOrder,
    ) -> Result<Option<u64>, StoreError>;
}

/// Resume-point queries for one chain.
pub struct ResumePoints {
    index: Arc<dyn BlockIndex>,
    chain: String,
}

impl ResumePoints {
    pub fn new(index: Arc<dyn BlockIndex>, chain: impl Into<String>) -> Self {
        Self {
            index,
            chain: chain.into(),
        }
    }

    /// Highest indexed block, `0` if none.
    pub async fn last_indexed_block(&self) -> Result<u64, StoreError> {
        self.edge(IndexCollection::Block, None, SortOrder::Desc, 0).await
    }

    /// Highest block with indexed deltas, `0` if none.
    pub async fn last_indexed_block_by_delta(&self) -> Result<u64, StoreError> {
        self.edge(IndexCollection::Delta, None, SortOrder::Desc, 0).await
    }

    /// Lowest indexed block in `[first, last)`, `0` if none.
    pub async fn first_indexed_block_from_range(&self, first: u64, last: u64) -> Result<u64, StoreError> {
        self.edge(IndexCollection::Block, Some(first..last), SortOrder::Asc, 0)
            .await
    }

    /// Highest indexed block in `[first, last)`, `0` if none.
    pub async fn last_indexed_block_from_range(&self, first: u64, last: u64) -> Result<u64, StoreError> {
        self.edge(IndexCollection::Block, Some(first..last), SortOrder::Desc, 0)
            .await
    }

    /// Highest block with indexed deltas in `[first, last)`, `0` if none.
    pub async fn last_indexed_block_by_delta_from_range(
        &self,
        first: u64,
        last: u64,
    ) -> Result<u64, StoreError> {
        self.edge(IndexCollection::Delta, Some(first..last), SortOrder::Desc, 0)
            .await
    }

    /// Highest block at which an ABI was recorded, `1` if none.
    pub async fn last_indexed_abi(&self) -> Result<u64, StoreError> {
        self.edge(IndexCollection::Abi, None, SortOrder::Desc, 1).await
    }

    async fn edge(
        &self,
        collection: IndexCollection,
        range: Option<Range<u64>>,
        order: SortOrder,
        default: u64,
    ) -> Result<u64, StoreError> {
        let found = self
            .index
            .edge_block(&self.chain, collection, range, order)
            .await?;
        Ok(found.unwrap_or(default))
    }
}
