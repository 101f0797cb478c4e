mod common;

use chainhist_abi::{serialize, Value};
use chainhist_ingest::{decompress, envelope, EnvelopeDecodeError};
use flate2::{write::GzEncoder, Compression};
use std::io::Write;

use common::*;

#[test]
fn full_envelope_decodes_to_typed_records() {
    let table = ship_table();
    let mut failed = Act::root("eosio.token", "transfer", vec![9], 8);
    failed.except = Some("overdrawn balance");
    failed.ordinal = 2;
    failed.creator = 1;
    let env = Envelope {
        block: Some(signed_block(&table, "bp1")),
        traces: vec![transaction(
            0xAA,
            &[Act::root("eosio", "onblock", vec![1, 2], 7), failed],
        )],
        deltas: vec![table_delta("contract_row", &[vec![1], vec![2]])],
        ..Envelope::at(300)
    };
    let msg = env.message(1, &table);

    let decoded = envelope::decode(&msg.content, &table).unwrap();
    assert_eq!(decoded.kind, "get_blocks_result_v0");
    assert_eq!(decoded.head.block_num, 310);
    assert_eq!(decoded.last_irreversible.block_num, 305);
    let this = decoded.this_block.as_ref().unwrap();
    assert_eq!(this.block_num, 300);
    // checksums are lowercased on extraction
    assert_eq!(this.block_id, hex::encode([300u32 as u8; 32]));
    assert_eq!(decoded.prev_block.as_ref().unwrap().block_num, 299);

    let header = decoded.block.as_ref().unwrap();
    assert_eq!(header.producer, "bp1");
    assert_eq!(header.timestamp, "2019-06-01T12:00:00.500");
    assert_eq!(header.schedule_version, 3);

    assert_eq!(decoded.traces.len(), 1);
    let trx = &decoded.traces[0];
    assert_eq!(trx.id, "aa".repeat(32));
    assert_eq!(trx.cpu_usage_us, 150);
    assert_eq!(trx.net_usage_words, 12);
    assert_eq!(trx.action_traces.len(), 2);
    assert!(trx.action_traces[0].is_root());
    assert_eq!(trx.action_traces[0].global_sequence(), 7);
    assert_eq!(trx.action_traces[0].act.data, vec![1, 2]);
    assert_eq!(
        trx.action_traces[1].except.as_deref(),
        Some("overdrawn balance")
    );
    assert_eq!(trx.action_traces[1].act.authorization[0].actor, "alice");

    assert_eq!(decoded.deltas.len(), 1);
    assert_eq!(decoded.deltas[0].name, "contract_row");
    assert_eq!(decoded.deltas[0].rows[1].data, vec![2]);
}

#[test]
fn zero_length_sections_decode_to_nothing() {
    let table = ship_table();
    let result = Value::variant(
        "get_blocks_result_v0",
        Value::structure([
            ("head", position(5)),
            ("last_irreversible", position(4)),
            ("this_block", position(5)),
            ("prev_block", Value::Null),
            ("block", Value::Bytes(vec![])),
            ("traces", Value::Bytes(vec![])),
            ("deltas", Value::Null),
        ]),
    );
    let bytes = serialize("result", &result, &table).unwrap();
    let decoded = envelope::decode(&bytes, &table).unwrap();
    assert!(decoded.block.is_none());
    assert!(decoded.traces.is_empty());
    assert!(decoded.deltas.is_empty());
}

#[test]
fn corrupt_trace_section_is_attributed() {
    let table = ship_table();
    let result = Value::variant(
        "get_blocks_result_v0",
        Value::structure([
            ("head", position(5)),
            ("last_irreversible", position(4)),
            ("this_block", position(5)),
            ("prev_block", Value::Null),
            ("block", Value::Null),
            // one trace announced, none present
            ("traces", Value::Bytes(vec![1])),
            ("deltas", Value::Null),
        ]),
    );
    let bytes = serialize("result", &result, &table).unwrap();
    let err = envelope::decode(&bytes, &table).unwrap_err();
    assert!(matches!(
        err,
        EnvelopeDecodeError::Codec {
            section: "traces",
            ..
        }
    ));
}

#[test]
fn status_result_has_no_block() {
    let table = ship_table();
    let result = Value::variant(
        "get_status_result_v0",
        Value::structure([
            ("head", position(9)),
            ("last_irreversible", position(8)),
            ("trace_begin_block", Value::Uint(1)),
            ("trace_end_block", Value::Uint(9)),
            ("chain_state_begin_block", Value::Uint(1)),
            ("chain_state_end_block", Value::Uint(9)),
        ]),
    );
    let bytes = serialize("result", &result, &table).unwrap();
    let decoded = envelope::decode(&bytes, &table).unwrap();
    assert_eq!(decoded.kind, "get_status_result_v0");
    assert!(decoded.this_block.is_none());
}

#[test]
fn gzip_transport_round_trip() {
    let table = ship_table();
    let msg = Envelope::at(12).message(1, &table);
    let mut enc = GzEncoder::new(Vec::new(), Compression::fast());
    enc.write_all(&msg.content).unwrap();
    let packed = enc.finish().unwrap();

    let plain = decompress(&packed).unwrap();
    let decoded = envelope::decode(&plain, &table).unwrap();
    assert_eq!(decoded.this_block.unwrap().block_num, 12);
}
