//! Envelope decoding: one queue message → block position, optional block
//! header, transaction traces and table deltas.
//!
//! The message body is a `result` variant. Its `block`, `traces` and
//! `deltas` sections are themselves encoded and decoded separately as
//! `signed_block`, `transaction_trace[]` and `table_delta[]`. Missing or
//! zero-length sections decode to nothing.

use chainhist_abi::{deserialize, TypeTable, Value};
use chainhist_core::{
    AccountRamDelta, ActionReceipt, ActionTrace, AuthSequence, BlockHeader, BlockPosition,
    DeltaRow, PermissionLevel, RawAction, TableDelta, TransactionTrace,
};

use crate::error::EnvelopeDecodeError;

/// A fully decoded queue message.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEnvelope {
    /// Alternative name of the `result` variant, e.g. `get_blocks_result_v0`.
    pub kind: String,
    pub head: BlockPosition,
    pub last_irreversible: BlockPosition,
    pub this_block: Option<BlockPosition>,
    pub prev_block: Option<BlockPosition>,
    pub block: Option<BlockHeader>,
    pub traces: Vec<TransactionTrace>,
    pub deltas: Vec<TableDelta>,
}

pub fn decode(content: &[u8], table: &TypeTable) -> Result<DecodedEnvelope, EnvelopeDecodeError> {
    let result = deserialize("result", content, table).map_err(|source| {
        EnvelopeDecodeError::Codec {
            section: "result",
            source,
        }
    })?;
    let (kind, body) = result.as_variant().ok_or_else(|| shape("result", "not a variant"))?;

    let x = Extract::new("result", body);
    let head = position(x.field("head")?)?;
    let last_irreversible = position(x.field("last_irreversible")?)?;
    let this_block = x.optional("this_block").map(position).transpose()?;
    let prev_block = x.optional("prev_block").map(position).transpose()?;

    let block = match section(&x, "block")? {
        Some(bytes) => {
            let value = decode_section("signed_block", "block", bytes, table)?;
            Some(block_header(&value)?)
        }
        None => None,
    };

    let traces = match section(&x, "traces")? {
        Some(bytes) => {
            let value = decode_section("transaction_trace[]", "traces", bytes, table)?;
            list(&value, "traces")?
                .iter()
                .map(transaction_trace)
                .collect::<Result<Vec<_>, _>>()?
        }
        None => Vec::new(),
    };

    let deltas = match section(&x, "deltas")? {
        Some(bytes) => {
            let value = decode_section("table_delta[]", "deltas", bytes, table)?;
            list(&value, "deltas")?
                .iter()
                .map(table_delta)
                .collect::<Result<Vec<_>, _>>()?
        }
        None => Vec::new(),
    };

    Ok(DecodedEnvelope {
        kind: kind.to_string(),
        head,
        last_irreversible,
        this_block,
        prev_block,
        block,
        traces,
        deltas,
    })
}

fn decode_section(
    type_name: &str,
    section: &'static str,
    bytes: &[u8],
    table: &TypeTable,
) -> Result<Value, EnvelopeDecodeError> {
    deserialize(type_name, bytes, table).map_err(|source| EnvelopeDecodeError::Codec { section, source })
}

/// Non-empty payload bytes of an optional section.
fn section<'a>(x: &Extract<'a>, name: &str) -> Result<Option<&'a [u8]>, EnvelopeDecodeError> {
    match x.optional(name) {
        None => Ok(None),
        Some(v) => {
            let bytes = v
                .as_bytes()
                .ok_or_else(|| shape("result", format!("'{name}' is not bytes")))?;
            Ok((!bytes.is_empty()).then_some(bytes))
        }
    }
}

// ─── Typed extraction ───────────────────────────────────────────────────────

fn shape(section: &'static str, reason: impl Into<String>) -> EnvelopeDecodeError {
    EnvelopeDecodeError::Shape {
        section,
        reason: reason.into(),
    }
}

/// Field reader over a decoded struct, with errors attributed to `section`.
struct Extract<'a> {
    section: &'static str,
    value: &'a Value,
}

impl<'a> Extract<'a> {
    fn new(section: &'static str, value: &'a Value) -> Self {
        Self {
            section,
            value: value.unwrap_variant(),
        }
    }

    fn field(&self, name: &str) -> Result<&'a Value, EnvelopeDecodeError> {
        self.value
            .get(name)
            .ok_or_else(|| shape(self.section, format!("missing field '{name}'")))
    }

    /// Absent fields and nulls are both `None`.
    fn optional(&self, name: &str) -> Option<&'a Value> {
        self.value.get(name).filter(|v| !v.is_null())
    }

    fn str(&self, name: &str) -> Result<String, EnvelopeDecodeError> {
        let section = self.section;
        self.field(name)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| shape(section, format!("'{name}' is not a string")))
    }

    /// Checksums are normalised to lowercase hex.
    fn id(&self, name: &str) -> Result<String, EnvelopeDecodeError> {
        Ok(self.str(name)?.to_ascii_lowercase())
    }

    fn u64(&self, name: &str) -> Result<u64, EnvelopeDecodeError> {
        let section = self.section;
        self.field(name)?
            .as_u64()
            .ok_or_else(|| shape(section, format!("'{name}' is not an unsigned integer")))
    }

    fn u32(&self, name: &str) -> Result<u32, EnvelopeDecodeError> {
        let section = self.section;
        let v = self.u64(name)?;
        u32::try_from(v).map_err(|_| shape(section, format!("'{name}' exceeds u32")))
    }

    fn i64(&self, name: &str) -> Result<i64, EnvelopeDecodeError> {
        let section = self.section;
        self.field(name)?
            .as_i64()
            .ok_or_else(|| shape(section, format!("'{name}' is not an integer")))
    }

    fn bool(&self, name: &str) -> Result<bool, EnvelopeDecodeError> {
        let section = self.section;
        self.field(name)?
            .as_bool()
            .ok_or_else(|| shape(section, format!("'{name}' is not a bool")))
    }

    fn bytes(&self, name: &str) -> Result<Vec<u8>, EnvelopeDecodeError> {
        let section = self.section;
        self.field(name)?
            .as_bytes()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| shape(section, format!("'{name}' is not bytes")))
    }

    fn list(&self, name: &str) -> Result<&'a [Value], EnvelopeDecodeError> {
        let section = self.section;
        list(self.field(name)?, section)
    }
}

fn list<'a>(value: &'a Value, section: &'static str) -> Result<&'a [Value], EnvelopeDecodeError> {
    value
        .as_array()
        .ok_or_else(|| shape(section, "expected an array"))
}

fn position(value: &Value) -> Result<BlockPosition, EnvelopeDecodeError> {
    let x = Extract::new("block_position", value);
    Ok(BlockPosition {
        block_num: x.u32("block_num")?,
        block_id: x.id("block_id")?,
    })
}

fn block_header(value: &Value) -> Result<BlockHeader, EnvelopeDecodeError> {
    let x = Extract::new("block", value);
    Ok(BlockHeader {
        timestamp: x.str("timestamp")?,
        producer: x.str("producer")?,
        previous: x.id("previous")?,
        schedule_version: x.u32("schedule_version")?,
    })
}

fn transaction_trace(value: &Value) -> Result<TransactionTrace, EnvelopeDecodeError> {
    let x = Extract::new("transaction_trace", value);
    let action_traces = x
        .list("action_traces")?
        .iter()
        .map(action_trace)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TransactionTrace {
        id: x.id("id")?,
        status: u8::try_from(x.u64("status")?)
            .map_err(|_| shape("transaction_trace", "status exceeds u8"))?,
        cpu_usage_us: x.u32("cpu_usage_us")?,
        net_usage_words: x.u32("net_usage_words")?,
        elapsed: x.i64("elapsed")?,
        action_traces,
        except: optional_str(&x, "except")?,
    })
}

fn action_trace(value: &Value) -> Result<ActionTrace, EnvelopeDecodeError> {
    let x = Extract::new("action_trace", value);
    let receipt = x.optional("receipt").map(action_receipt).transpose()?;
    let act = raw_action(x.field("act")?)?;
    let account_ram_deltas = x
        .list("account_ram_deltas")?
        .iter()
        .map(|d| {
            let dx = Extract::new("account_delta", d);
            Ok(AccountRamDelta {
                account: dx.str("account")?,
                delta: dx.i64("delta")?,
            })
        })
        .collect::<Result<Vec<_>, EnvelopeDecodeError>>()?;
    let error_code = match x.optional("error_code") {
        Some(v) => Some(
            v.as_u64()
                .ok_or_else(|| shape("action_trace", "'error_code' is not an unsigned integer"))?,
        ),
        None => None,
    };
    Ok(ActionTrace {
        action_ordinal: x.u32("action_ordinal")?,
        creator_action_ordinal: x.u32("creator_action_ordinal")?,
        receipt,
        receiver: x.str("receiver")?,
        act,
        context_free: x.bool("context_free")?,
        elapsed: x.i64("elapsed")?,
        console: x.str("console")?,
        account_ram_deltas,
        except: optional_str(&x, "except")?,
        error_code,
    })
}

fn action_receipt(value: &Value) -> Result<ActionReceipt, EnvelopeDecodeError> {
    let x = Extract::new("action_receipt", value);
    let auth_sequence = x
        .list("auth_sequence")?
        .iter()
        .map(|a| {
            let ax = Extract::new("account_auth_sequence", a);
            Ok(AuthSequence {
                account: ax.str("account")?,
                sequence: ax.u64("sequence")?,
            })
        })
        .collect::<Result<Vec<_>, EnvelopeDecodeError>>()?;
    Ok(ActionReceipt {
        receiver: x.str("receiver")?,
        act_digest: x.id("act_digest")?,
        global_sequence: x.u64("global_sequence")?,
        recv_sequence: x.u64("recv_sequence")?,
        auth_sequence,
        code_sequence: x.u32("code_sequence")?,
        abi_sequence: x.u32("abi_sequence")?,
    })
}

fn raw_action(value: &Value) -> Result<RawAction, EnvelopeDecodeError> {
    let x = Extract::new("action", value);
    let authorization = x
        .list("authorization")?
        .iter()
        .map(|p| {
            let px = Extract::new("permission_level", p);
            Ok(PermissionLevel {
                actor: px.str("actor")?,
                permission: px.str("permission")?,
            })
        })
        .collect::<Result<Vec<_>, EnvelopeDecodeError>>()?;
    Ok(RawAction {
        account: x.str("account")?,
        name: x.str("name")?,
        authorization,
        data: x.bytes("data")?,
    })
}

fn table_delta(value: &Value) -> Result<TableDelta, EnvelopeDecodeError> {
    let x = Extract::new("table_delta", value);
    let rows = x
        .list("rows")?
        .iter()
        .map(|r| {
            let rx = Extract::new("row", r);
            Ok(DeltaRow {
                present: rx.bool("present")?,
                data: rx.bytes("data")?,
            })
        })
        .collect::<Result<Vec<_>, EnvelopeDecodeError>>()?;
    Ok(TableDelta {
        name: x.str("name")?,
        rows,
    })
}

fn optional_str(x: &Extract<'_>, name: &str) -> Result<Option<String>, EnvelopeDecodeError> {
    match x.optional(name) {
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| shape(x.section, format!("'{name}' is not a string"))),
        None => Ok(None),
    }
}
