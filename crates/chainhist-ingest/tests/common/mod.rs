//! Message builders over the state-history fixture ABI.

#![allow(dead_code)]

use std::sync::Arc;

use chainhist_abi::{deserialize, serialize, ContractAbi, TypeTable, Value};
use chainhist_ingest::QueueMessage;

pub const TOKEN_ABI: &str = r#"{
    "version": "eosio::abi/1.1",
    "structs": [{"name": "transfer", "base": "", "fields": [
        {"name": "from", "type": "name"},
        {"name": "to", "type": "name"},
        {"name": "quantity", "type": "asset"},
        {"name": "memo", "type": "string"}
    ]}],
    "actions": [{"name": "transfer", "type": "transfer", "ricardian_contract": ""}]
}"#;

pub const SYSTEM_ABI: &str = r#"{
    "version": "eosio::abi/1.1",
    "structs": [{"name": "setabi", "base": "", "fields": [
        {"name": "account", "type": "name"},
        {"name": "abi", "type": "bytes"}
    ]}],
    "actions": [{"name": "setabi", "type": "setabi", "ricardian_contract": ""}]
}"#;

pub fn ship_table() -> Arc<TypeTable> {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../fixtures/ship_abi.json");
    let json = std::fs::read_to_string(path).expect("fixture");
    let def = chainhist_abi::AbiDef::from_json(&json).expect("abi");
    Arc::new(TypeTable::from_abi(&def).expect("table"))
}

pub fn position(n: u32) -> Value {
    Value::structure([
        ("block_num", Value::Uint(u64::from(n))),
        ("block_id", Value::Bytes(vec![n as u8; 32])),
    ])
}

/// Serialized `signed_block` with no transactions.
pub fn signed_block(table: &TypeTable, producer: &str) -> Vec<u8> {
    let signature = deserialize("signature", &[0u8; 66], table).expect("signature");
    let block = Value::structure([
        ("timestamp", Value::str("2019-06-01T12:00:00.500")),
        ("producer", Value::str(producer)),
        ("confirmed", Value::Uint(0)),
        ("previous", Value::Bytes(vec![0xAB; 32])),
        ("transaction_mroot", Value::Bytes(vec![0; 32])),
        ("action_mroot", Value::Bytes(vec![0; 32])),
        ("schedule_version", Value::Uint(3)),
        ("new_producers", Value::Null),
        ("header_extensions", Value::Array(vec![])),
        ("producer_signature", signature),
        ("transactions", Value::Array(vec![])),
        ("block_extensions", Value::Array(vec![])),
    ]);
    serialize("signed_block", &block, table).expect("signed_block")
}

pub struct Act {
    pub account: &'static str,
    pub name: &'static str,
    pub data: Vec<u8>,
    pub ordinal: u64,
    pub creator: u64,
    pub global_sequence: Option<u64>,
    pub except: Option<&'static str>,
}

impl Act {
    pub fn root(account: &'static str, name: &'static str, data: Vec<u8>, gs: u64) -> Self {
        Self {
            account,
            name,
            data,
            ordinal: 1,
            creator: 0,
            global_sequence: Some(gs),
            except: None,
        }
    }

    pub fn trace(&self) -> Value {
        let receipt = match self.global_sequence {
            Some(gs) => Value::variant(
                "action_receipt_v0",
                Value::structure([
                    ("receiver", Value::str(self.account)),
                    ("act_digest", Value::Bytes(vec![0xCD; 32])),
                    ("global_sequence", Value::Uint(gs)),
                    ("recv_sequence", Value::Uint(1)),
                    ("auth_sequence", Value::Array(vec![])),
                    ("code_sequence", Value::Uint(1)),
                    ("abi_sequence", Value::Uint(1)),
                ]),
            ),
            None => Value::Null,
        };
        Value::variant(
            "action_trace_v0",
            Value::structure([
                ("action_ordinal", Value::Uint(self.ordinal)),
                ("creator_action_ordinal", Value::Uint(self.creator)),
                ("receipt", receipt),
                ("receiver", Value::str(self.account)),
                (
                    "act",
                    Value::structure([
                        ("account", Value::str(self.account)),
                        ("name", Value::str(self.name)),
                        (
                            "authorization",
                            Value::Array(vec![Value::structure([
                                ("actor", Value::str("alice")),
                                ("permission", Value::str("active")),
                            ])]),
                        ),
                        ("data", Value::Bytes(self.data.clone())),
                    ]),
                ),
                ("context_free", Value::Bool(false)),
                ("elapsed", Value::Int(25)),
                ("console", Value::str("")),
                ("account_ram_deltas", Value::Array(vec![])),
                ("except", self.except.map(Value::str).unwrap_or(Value::Null)),
                ("error_code", Value::Null),
            ]),
        )
    }
}

pub fn transaction(id: u8, acts: &[Act]) -> Value {
    Value::variant(
        "transaction_trace_v0",
        Value::structure([
            ("id", Value::Bytes(vec![id; 32])),
            ("status", Value::Uint(0)),
            ("cpu_usage_us", Value::Uint(150)),
            ("net_usage_words", Value::Uint(12)),
            ("elapsed", Value::Int(300)),
            ("net_usage", Value::Uint(96)),
            ("scheduled", Value::Bool(false)),
            ("action_traces", Value::Array(acts.iter().map(Act::trace).collect())),
            ("account_ram_delta", Value::Null),
            ("except", Value::Null),
            ("error_code", Value::Null),
            ("failed_dtrx_trace", Value::Null),
        ]),
    )
}

pub fn table_delta(name: &str, rows: &[Vec<u8>]) -> Value {
    Value::variant(
        "table_delta_v0",
        Value::structure([
            ("name", Value::str(name)),
            (
                "rows",
                Value::Array(
                    rows.iter()
                        .map(|data| {
                            Value::structure([
                                ("present", Value::Bool(true)),
                                ("data", Value::Bytes(data.clone())),
                            ])
                        })
                        .collect(),
                ),
            ),
        ]),
    )
}

/// Contents of one `get_blocks_result_v0` message.
#[derive(Default)]
pub struct Envelope {
    pub block_num: Option<u32>,
    pub block: Option<Vec<u8>>,
    pub traces: Vec<Value>,
    pub deltas: Vec<Value>,
}

impl Envelope {
    pub fn at(block_num: u32) -> Self {
        Self {
            block_num: Some(block_num),
            ..Self::default()
        }
    }

    pub fn message(&self, tag: u64, table: &TypeTable) -> QueueMessage {
        let section = |type_name: &str, items: &[Value]| {
            if items.is_empty() {
                Value::Null
            } else {
                Value::Bytes(
                    serialize(type_name, &Value::Array(items.to_vec()), table).expect("section"),
                )
            }
        };
        let head = self.block_num.unwrap_or(1) + 10;
        let result = Value::variant(
            "get_blocks_result_v0",
            Value::structure([
                ("head", position(head)),
                ("last_irreversible", position(head - 5)),
                (
                    "this_block",
                    self.block_num.map(position).unwrap_or(Value::Null),
                ),
                (
                    "prev_block",
                    self.block_num
                        .and_then(|n| n.checked_sub(1))
                        .map(position)
                        .unwrap_or(Value::Null),
                ),
                (
                    "block",
                    self.block.clone().map(Value::Bytes).unwrap_or(Value::Null),
                ),
                ("traces", section("transaction_trace[]", &self.traces)),
                ("deltas", section("table_delta[]", &self.deltas)),
            ]),
        );
        QueueMessage::new(tag, serialize("result", &result, table).expect("result"))
    }
}

pub fn transfer_data(from: &str, to: &str, quantity: &str, memo: &str) -> Vec<u8> {
    let abi = ContractAbi::from_blob(TOKEN_ABI.as_bytes()).expect("token abi");
    abi.encode_action(
        "transfer",
        &Value::structure([
            ("from", Value::str(from)),
            ("to", Value::str(to)),
            ("quantity", Value::str(quantity)),
            ("memo", Value::str(memo)),
        ]),
    )
    .expect("transfer")
}

pub fn setabi_data(account: &str, abi: &[u8]) -> Vec<u8> {
    let system = ContractAbi::from_blob(SYSTEM_ABI.as_bytes()).expect("system abi");
    system
        .encode_action(
            "setabi",
            &Value::structure([
                ("account", Value::str(account)),
                ("abi", Value::Bytes(abi.to_vec())),
            ]),
        )
        .expect("setabi")
}
