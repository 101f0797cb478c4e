//! Wire encodings of the builtin types.
//!
//! Reads produce canonical [`Value`]s (names, assets, keys and times as
//! strings). Writes are lenient about numeric input: any integer variant or
//! a decimal string is accepted as long as it fits the target width.

use chrono::{DateTime, NaiveDateTime};
use ripemd::{Digest, Ripemd160};

use crate::cursor::{CursorError, Reader, Writer};
use crate::types::Builtin;
use crate::value::Value;

const NAME_CHARMAP: &[u8; 32] = b".12345abcdefghijklmnopqrstuvwxyz";

/// Milliseconds between the Unix epoch and 2000-01-01T00:00:00Z.
const BLOCK_TIMESTAMP_EPOCH_MS: i64 = 946_684_800_000;
const BLOCK_INTERVAL_MS: i64 = 500;

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

const KEY_DATA_LEN: usize = 33;
const SIGNATURE_DATA_LEN: usize = 65;

// ─── Reading ────────────────────────────────────────────────────────────────

pub(crate) fn read(b: Builtin, r: &mut Reader<'_>) -> Result<Value, CursorError> {
    let value = match b {
        Builtin::Bool => match r.read_u8()? {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            other => return Err(r.error(format!("invalid bool byte {other}"))),
        },
        Builtin::Int8 => Value::Int(r.read_i8()?.into()),
        Builtin::Uint8 => Value::Uint(r.read_u8()?.into()),
        Builtin::Int16 => Value::Int(r.read_i16()?.into()),
        Builtin::Uint16 => Value::Uint(r.read_u16()?.into()),
        Builtin::Int32 => Value::Int(r.read_i32()?.into()),
        Builtin::Uint32 => Value::Uint(r.read_u32()?.into()),
        Builtin::Int64 => Value::Int(r.read_i64()?),
        Builtin::Uint64 => Value::Uint(r.read_u64()?),
        Builtin::Int128 => Value::Int128(r.read_i128()?),
        Builtin::Uint128 => Value::Uint128(r.read_u128()?),
        Builtin::VarInt32 => Value::Int(r.read_varint32()?.into()),
        Builtin::VarUint32 => Value::Uint(r.read_varuint32()?.into()),
        Builtin::Float32 => Value::Float(r.read_f32()?.into()),
        Builtin::Float64 => Value::Float(r.read_f64()?),
        Builtin::Float128 => Value::Bytes(r.read_slice(16)?.to_vec()),
        Builtin::TimePoint => {
            let start = r.offset();
            let micros = r.read_i64()?;
            Value::Str(format_micros(micros).ok_or_else(|| CursorError {
                offset: start,
                reason: format!("time_point {micros} out of range"),
            })?)
        }
        Builtin::TimePointSec => {
            let start = r.offset();
            let secs = r.read_u32()?;
            Value::Str(
                format_micros(i64::from(secs) * 1_000_000).ok_or_else(|| CursorError {
                    offset: start,
                    reason: format!("time_point_sec {secs} out of range"),
                })?,
            )
        }
        Builtin::BlockTimestamp => {
            let start = r.offset();
            let slot = r.read_u32()?;
            let ms = i64::from(slot) * BLOCK_INTERVAL_MS + BLOCK_TIMESTAMP_EPOCH_MS;
            Value::Str(format_micros(ms * 1_000).ok_or_else(|| CursorError {
                offset: start,
                reason: format!("block_timestamp_type {slot} out of range"),
            })?)
        }
        Builtin::Name => Value::Str(name_to_string(r.read_u64()?)),
        Builtin::Bytes => Value::Bytes(r.read_sized_bytes()?.to_vec()),
        Builtin::String => Value::Str(String::from_utf8_lossy(r.read_sized_bytes()?).into_owned()),
        Builtin::Checksum160 => Value::Str(hex::encode_upper(r.read_slice(20)?)),
        Builtin::Checksum256 => Value::Str(hex::encode_upper(r.read_slice(32)?)),
        Builtin::Checksum512 => Value::Str(hex::encode_upper(r.read_slice(64)?)),
        Builtin::PublicKey => {
            let suffix = key_suffix(r)?;
            let data = r.read_slice(KEY_DATA_LEN)?;
            Value::Str(format!("PUB_{suffix}_{}", base58_with_checksum(data, suffix)))
        }
        Builtin::Signature => {
            let suffix = key_suffix(r)?;
            let data = r.read_slice(SIGNATURE_DATA_LEN)?;
            Value::Str(format!("SIG_{suffix}_{}", base58_with_checksum(data, suffix)))
        }
        Builtin::Symbol => {
            let raw = r.read_u64()?;
            let precision = (raw & 0xff) as u8;
            Value::Str(format!("{precision},{}", symbol_code_to_string(raw >> 8)))
        }
        Builtin::SymbolCode => Value::Str(symbol_code_to_string(r.read_u64()?)),
        Builtin::Asset => {
            let amount = r.read_i64()?;
            let raw = r.read_u64()?;
            let precision = (raw & 0xff) as u8;
            Value::Str(format_asset(amount, precision, &symbol_code_to_string(raw >> 8)))
        }
    };
    Ok(value)
}

fn key_suffix(r: &mut Reader<'_>) -> Result<&'static str, CursorError> {
    match r.read_u8()? {
        0 => Ok("K1"),
        1 => Ok("R1"),
        other => Err(r.error(format!("unsupported key type {other}"))),
    }
}

// ─── Writing ────────────────────────────────────────────────────────────────

pub(crate) fn write(b: Builtin, v: &Value, w: &mut Writer) -> Result<(), String> {
    match b {
        Builtin::Bool => w.write_u8(u8::from(
            v.as_bool().ok_or_else(|| expected("bool", v))?,
        )),
        Builtin::Int8 => w.write_i8(narrow(signed(v)?)?),
        Builtin::Uint8 => w.write_u8(narrow(unsigned(v)?)?),
        Builtin::Int16 => w.write_i16(narrow(signed(v)?)?),
        Builtin::Uint16 => w.write_u16(narrow(unsigned(v)?)?),
        Builtin::Int32 => w.write_i32(narrow(signed(v)?)?),
        Builtin::Uint32 => w.write_u32(narrow(unsigned(v)?)?),
        Builtin::Int64 => w.write_i64(narrow(signed(v)?)?),
        Builtin::Uint64 => w.write_u64(narrow(unsigned(v)?)?),
        Builtin::Int128 => w.write_i128(signed(v)?),
        Builtin::Uint128 => w.write_u128(unsigned(v)?),
        Builtin::VarInt32 => w.write_varint32(narrow(signed(v)?)?),
        Builtin::VarUint32 => w.write_varuint32(narrow(unsigned(v)?)?),
        Builtin::Float32 => w.write_f32(float(v)? as f32),
        Builtin::Float64 => w.write_f64(float(v)?),
        Builtin::Float128 => w.write_slice(&fixed_bytes(v, 16)?),
        Builtin::TimePoint => w.write_i64(parse_time_micros(text(v)?)?),
        Builtin::TimePointSec => {
            let secs = parse_time_micros(text(v)?)?.div_euclid(1_000_000);
            w.write_u32(u32::try_from(secs).map_err(|_| "time_point_sec out of range".to_string())?)
        }
        Builtin::BlockTimestamp => {
            let ms = parse_time_micros(text(v)?)?.div_euclid(1_000);
            let slot = (ms - BLOCK_TIMESTAMP_EPOCH_MS).div_euclid(BLOCK_INTERVAL_MS);
            w.write_u32(
                u32::try_from(slot).map_err(|_| "block_timestamp_type out of range".to_string())?,
            )
        }
        Builtin::Name => w.write_u64(string_to_name(text(v)?)?),
        Builtin::Bytes => {
            let bytes = match v {
                Value::Bytes(b) => b.clone(),
                Value::Str(s) => hex::decode(s).map_err(|e| format!("invalid hex: {e}"))?,
                other => return Err(expected("bytes", other)),
            };
            w.write_sized_bytes(&bytes)?
        }
        Builtin::String => w.write_sized_bytes(text(v)?.as_bytes())?,
        Builtin::Checksum160 => w.write_slice(&fixed_bytes(v, 20)?),
        Builtin::Checksum256 => w.write_slice(&fixed_bytes(v, 32)?),
        Builtin::Checksum512 => w.write_slice(&fixed_bytes(v, 64)?),
        Builtin::PublicKey => {
            let (kind, data) = parse_public_key(text(v)?)?;
            w.write_u8(kind);
            w.write_slice(&data);
        }
        Builtin::Signature => {
            let (kind, data) = parse_prefixed("SIG", text(v)?, SIGNATURE_DATA_LEN)?;
            w.write_u8(kind);
            w.write_slice(&data);
        }
        Builtin::Symbol => w.write_u64(parse_symbol(text(v)?)?),
        Builtin::SymbolCode => w.write_u64(string_to_symbol_code(text(v)?)?),
        Builtin::Asset => {
            let (amount, symbol) = parse_asset(text(v)?)?;
            w.write_i64(amount);
            w.write_u64(symbol);
        }
    }
    Ok(())
}

fn expected(what: &str, got: &Value) -> String {
    format!("expected {what}, got {got}")
}

fn text(v: &Value) -> Result<&str, String> {
    v.as_str().ok_or_else(|| expected("string", v))
}

fn signed(v: &Value) -> Result<i128, String> {
    match v {
        Value::Int(i) => Ok((*i).into()),
        Value::Uint(u) => Ok((*u).into()),
        Value::Int128(i) => Ok(*i),
        Value::Uint128(u) => i128::try_from(*u).map_err(|_| format!("{u} out of range")),
        Value::Str(s) => s.trim().parse().map_err(|_| expected("integer", v)),
        other => Err(expected("integer", other)),
    }
}

fn unsigned(v: &Value) -> Result<u128, String> {
    match v {
        Value::Uint(u) => Ok((*u).into()),
        Value::Uint128(u) => Ok(*u),
        Value::Int(i) => u128::try_from(*i).map_err(|_| format!("{i} is negative")),
        Value::Int128(i) => u128::try_from(*i).map_err(|_| format!("{i} is negative")),
        Value::Str(s) => s.trim().parse().map_err(|_| expected("unsigned integer", v)),
        other => Err(expected("unsigned integer", other)),
    }
}

fn narrow<T, S>(value: S) -> Result<T, String>
where
    S: Copy + std::fmt::Display,
    T: TryFrom<S>,
{
    T::try_from(value).map_err(|_| format!("{value} out of range"))
}

fn float(v: &Value) -> Result<f64, String> {
    match v {
        Value::Float(f) => Ok(*f),
        Value::Int(i) => Ok(*i as f64),
        Value::Uint(u) => Ok(*u as f64),
        Value::Str(s) => s.trim().parse().map_err(|_| expected("float", v)),
        other => Err(expected("float", other)),
    }
}

fn fixed_bytes(v: &Value, len: usize) -> Result<Vec<u8>, String> {
    let bytes = match v {
        Value::Bytes(b) => b.clone(),
        Value::Str(s) => hex::decode(s).map_err(|e| format!("invalid hex: {e}"))?,
        other => return Err(expected("hex string", other)),
    };
    if bytes.len() != len {
        return Err(format!("expected {len} bytes, got {}", bytes.len()));
    }
    Ok(bytes)
}

// ─── Names and symbols ──────────────────────────────────────────────────────

/// Render a 64-bit account name.
pub fn name_to_string(value: u64) -> String {
    let mut out = [b'.'; 13];
    let mut tmp = value;
    for i in 0..13 {
        let mask = if i == 0 { 0x0f } else { 0x1f };
        out[12 - i] = NAME_CHARMAP[(tmp & mask) as usize];
        tmp >>= if i == 0 { 4 } else { 5 };
    }
    let end = out.iter().rposition(|&c| c != b'.').map(|p| p + 1).unwrap_or(0);
    String::from_utf8_lossy(&out[..end]).into_owned()
}

fn char_to_symbol(c: u8) -> Option<u64> {
    match c {
        b'a'..=b'z' => Some(u64::from(c - b'a') + 6),
        b'1'..=b'5' => Some(u64::from(c - b'1') + 1),
        b'.' => Some(0),
        _ => None,
    }
}

/// Parse an account name (up to 13 characters of `.1-5a-z`).
pub fn string_to_name(s: &str) -> Result<u64, String> {
    let bytes = s.as_bytes();
    if bytes.len() > 13 {
        return Err(format!("name '{s}' is longer than 13 characters"));
    }
    let mut value = 0u64;
    for (i, &c) in bytes.iter().enumerate() {
        let sym = char_to_symbol(c).ok_or_else(|| format!("invalid character in name '{s}'"))?;
        if i < 12 {
            value |= (sym & 0x1f) << (64 - 5 * (i + 1));
        } else {
            if sym > 0x0f {
                return Err(format!("thirteenth character of name '{s}' must be in .1-5a-j"));
            }
            value |= sym;
        }
    }
    Ok(value)
}

fn symbol_code_to_string(mut raw: u64) -> String {
    let mut out = String::new();
    while raw > 0 {
        out.push((raw & 0xff) as u8 as char);
        raw >>= 8;
    }
    out
}

fn string_to_symbol_code(s: &str) -> Result<u64, String> {
    if s.is_empty() || s.len() > 7 || !s.bytes().all(|c| c.is_ascii_uppercase()) {
        return Err(format!("invalid symbol code '{s}'"));
    }
    Ok(s.bytes()
        .rev()
        .fold(0u64, |acc, c| (acc << 8) | u64::from(c)))
}

fn parse_symbol(s: &str) -> Result<u64, String> {
    let (precision, code) = s
        .split_once(',')
        .ok_or_else(|| format!("symbol '{s}' must look like '4,EOS'"))?;
    let precision: u8 = precision
        .trim()
        .parse()
        .map_err(|_| format!("invalid precision in symbol '{s}'"))?;
    Ok((string_to_symbol_code(code.trim())? << 8) | u64::from(precision))
}

fn format_asset(amount: i64, precision: u8, code: &str) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let digits = amount.unsigned_abs().to_string();
    let precision = usize::from(precision);
    if precision == 0 {
        return format!("{sign}{digits} {code}");
    }
    let padded = format!("{digits:0>width$}", width = precision + 1);
    let (int_part, frac_part) = padded.split_at(padded.len() - precision);
    format!("{sign}{int_part}.{frac_part} {code}")
}

fn parse_asset(s: &str) -> Result<(i64, u64), String> {
    let (amount, code) = s
        .trim()
        .split_once(' ')
        .ok_or_else(|| format!("asset '{s}' must look like '1.0000 EOS'"))?;
    let (negative, amount) = match amount.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, amount),
    };
    let (int_part, frac_part) = amount.split_once('.').unwrap_or((amount, ""));
    let digits = format!("{int_part}{frac_part}");
    if digits.is_empty() || !digits.bytes().all(|c| c.is_ascii_digit()) {
        return Err(format!("invalid amount in asset '{s}'"));
    }
    let magnitude: i64 = digits
        .parse()
        .map_err(|_| format!("amount in asset '{s}' out of range"))?;
    let precision = u8::try_from(frac_part.len()).map_err(|_| format!("precision of '{s}' too large"))?;
    let symbol = (string_to_symbol_code(code.trim())? << 8) | u64::from(precision);
    Ok((if negative { -magnitude } else { magnitude }, symbol))
}

// ─── Time ───────────────────────────────────────────────────────────────────

fn format_micros(micros: i64) -> Option<String> {
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    DateTime::from_timestamp(secs, nanos).map(|dt| dt.naive_utc().format(TIME_FORMAT).to_string())
}

fn parse_time_micros(s: &str) -> Result<i64, String> {
    let trimmed = s.trim().trim_end_matches('Z');
    let naive = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|e| format!("invalid time '{s}': {e}"))?;
    Ok(naive.and_utc().timestamp_micros())
}

// ─── Keys and signatures ────────────────────────────────────────────────────

fn ripemd_checksum(data: &[u8], suffix: &str) -> [u8; 4] {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    hasher.update(suffix.as_bytes());
    let digest = hasher.finalize();
    [digest[0], digest[1], digest[2], digest[3]]
}

fn base58_with_checksum(data: &[u8], suffix: &str) -> String {
    let mut buf = data.to_vec();
    buf.extend_from_slice(&ripemd_checksum(data, suffix));
    bs58::encode(buf).into_string()
}

fn decode_checked(encoded: &str, suffix: &str, len: usize) -> Result<Vec<u8>, String> {
    let raw = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| format!("invalid base58: {e}"))?;
    if raw.len() != len + 4 {
        return Err(format!("expected {} decoded bytes, got {}", len + 4, raw.len()));
    }
    let (data, checksum) = raw.split_at(len);
    if checksum != ripemd_checksum(data, suffix) {
        return Err("checksum mismatch".into());
    }
    Ok(data.to_vec())
}

fn parse_prefixed(prefix: &str, s: &str, len: usize) -> Result<(u8, Vec<u8>), String> {
    let rest = s
        .strip_prefix(prefix)
        .and_then(|r| r.strip_prefix('_'))
        .ok_or_else(|| format!("'{s}' does not start with {prefix}_"))?;
    let (kind, encoded) = if let Some(e) = rest.strip_prefix("K1_") {
        (0u8, e)
    } else if let Some(e) = rest.strip_prefix("R1_") {
        (1u8, e)
    } else {
        return Err(format!("unsupported key type in '{s}'"));
    };
    let suffix = if kind == 0 { "K1" } else { "R1" };
    Ok((kind, decode_checked(encoded, suffix, len)?))
}

/// `PUB_K1_` / `PUB_R1_` keys, or legacy `EOS` keys (K1, unsuffixed checksum).
fn parse_public_key(s: &str) -> Result<(u8, Vec<u8>), String> {
    if let Some(legacy) = s.strip_prefix("EOS") {
        return Ok((0, decode_checked(legacy, "", KEY_DATA_LEN)?));
    }
    parse_prefixed("PUB", s, KEY_DATA_LEN)
}
