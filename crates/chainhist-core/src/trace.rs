//! Typed views of the state-history stream: block header, transaction traces,
//! raw action traces and table deltas.
//!
//! These are extracted from codec values by the envelope decoder and consumed
//! by the action resolver.

use serde::{Deserialize, Serialize};

/// A `(block_num, block_id)` pair as reported by the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPosition {
    pub block_num: u32,
    pub block_id: String,
}

/// The header fields of a signed block that the indexer uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// ISO-8601 block timestamp, e.g. `"2019-06-01T12:00:00.500"`.
    pub timestamp: String,
    pub producer: String,
    pub previous: String,
    pub schedule_version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionLevel {
    pub actor: String,
    pub permission: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSequence {
    pub account: String,
    pub sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRamDelta {
    pub account: String,
    pub delta: i64,
}

/// Receipt of an executed action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReceipt {
    pub receiver: String,
    pub act_digest: String,
    pub global_sequence: u64,
    pub recv_sequence: u64,
    pub auth_sequence: Vec<AuthSequence>,
    pub code_sequence: u32,
    pub abi_sequence: u32,
}

/// The action itself: contract, entry point and still-opaque arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAction {
    pub account: String,
    pub name: String,
    pub authorization: Vec<PermissionLevel>,
    pub data: Vec<u8>,
}

/// One executed action within a transaction trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionTrace {
    pub action_ordinal: u32,
    /// `0` for root actions.
    pub creator_action_ordinal: u32,
    pub receipt: Option<ActionReceipt>,
    pub receiver: String,
    pub act: RawAction,
    pub context_free: bool,
    pub elapsed: i64,
    pub console: String,
    pub account_ram_deltas: Vec<AccountRamDelta>,
    pub except: Option<String>,
    pub error_code: Option<u64>,
}

impl ActionTrace {
    pub fn is_root(&self) -> bool {
        self.creator_action_ordinal == 0
    }

    /// Global sequence from the receipt, `0` when there is none.
    pub fn global_sequence(&self) -> u64 {
        self.receipt.as_ref().map(|r| r.global_sequence).unwrap_or(0)
    }
}

/// A transaction trace with its ordered action traces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionTrace {
    pub id: String,
    /// Transaction status code (0 = executed).
    pub status: u8,
    pub cpu_usage_us: u32,
    pub net_usage_words: u32,
    pub elapsed: i64,
    pub action_traces: Vec<ActionTrace>,
    pub except: Option<String>,
}

/// One row of a table delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaRow {
    pub present: bool,
    pub data: Vec<u8>,
}

/// A binary change record for one on-chain table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDelta {
    pub name: String,
    pub rows: Vec<DeltaRow>,
}
