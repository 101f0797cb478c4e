//! Normalized records forwarded for persistence, and the writer trait that
//! receives them.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::StoreError;
use crate::trace::{AccountRamDelta, ActionReceipt, PermissionLevel};

/// Action arguments after resolution.
///
/// Serialized untagged: decoded data is a JSON object, the hex fallback is a
/// bare string. Deserialization maps any JSON string back to `Hex`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ActionData {
    /// Named fields decoded against the contract ABI.
    Decoded(serde_json::Value),
    /// Original payload, hex-encoded, when decoding failed.
    Hex(String),
}

impl<'de> Deserialize<'de> for ActionData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(hex) => ActionData::Hex(hex),
            other => ActionData::Decoded(other),
        })
    }
}

impl ActionData {
    pub fn is_decoded(&self) -> bool {
        matches!(self, ActionData::Decoded(_))
    }

    /// Look up a top-level decoded field.
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        match self {
            ActionData::Decoded(v) => v.get(name),
            ActionData::Hex(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAct {
    pub account: String,
    pub name: String,
    pub authorization: Vec<PermissionLevel>,
    pub data: ActionData,
}

/// An action trace ready to be indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAction {
    #[serde(rename = "@timestamp", default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub block_num: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,
    pub trx_id: String,
    pub action_ordinal: u32,
    pub creator_action_ordinal: u32,
    pub receiver: String,
    pub act: ResolvedAct,
    pub receipt: ActionReceipt,
    pub global_sequence: u64,
    pub context_free: bool,
    pub elapsed: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_ram_deltas: Option<Vec<AccountRamDelta>>,
    /// Set on root actions only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_usage_us: Option<u32>,
    /// Set on root actions only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_usage_words: Option<u32>,
    /// Derived fields such as `@transfer`, flattened into the document.
    #[serde(flatten)]
    pub extras: serde_json::Map<String, serde_json::Value>,
}

/// Per-block summary document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    #[serde(rename = "@timestamp", default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub block_num: u32,
    pub block_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    pub trx_count: u32,
    pub act_count: u32,
}

/// One table-delta row, payload kept as hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaRecord {
    pub block_num: u32,
    pub table: String,
    pub present: bool,
    pub data: String,
}

/// Destination for normalized records (the search index in production).
#[async_trait]
pub trait IndexWriter: Send + Sync {
    async fn write_block(&self, chain: &str, block: BlockRecord) -> Result<(), StoreError>;

    async fn write_actions(&self, chain: &str, actions: Vec<ResolvedAction>) -> Result<(), StoreError>;

    async fn write_deltas(&self, chain: &str, deltas: Vec<DeltaRecord>) -> Result<(), StoreError>;
}
