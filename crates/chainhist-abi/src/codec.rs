//! Schema-driven serialization between [`Value`] and bytes.
//!
//! Both directions walk the [`TypeTable`] by name. They hold no state, so a
//! single table can serve any number of concurrent calls.

use indexmap::IndexMap;

use crate::builtin;
use crate::cursor::{CursorError, Reader, Writer};
use crate::error::CodecError;
use crate::types::{FieldDef, Resolved, TypeTable};
use crate::value::Value;

/// Nesting limit for arrays, optionals, structs and variants.
pub const MAX_DEPTH: usize = 64;

/// Decode `bytes` as `type_name`. All input must be consumed.
pub fn deserialize(type_name: &str, bytes: &[u8], table: &TypeTable) -> Result<Value, CodecError> {
    let mut r = Reader::new(bytes);
    let value = read_value(type_name, &mut r, table, 0)?;
    if r.remaining() > 0 {
        return Err(CodecError::SchemaDecode {
            type_name: type_name.into(),
            offset: r.offset(),
            reason: format!("{} trailing bytes", r.remaining()),
        });
    }
    Ok(value)
}

/// Encode `value` as `type_name`.
pub fn serialize(type_name: &str, value: &Value, table: &TypeTable) -> Result<Vec<u8>, CodecError> {
    let mut w = Writer::new();
    write_value(type_name, value, &mut w, table, 0)?;
    Ok(w.finish())
}

// ─── Decode ─────────────────────────────────────────────────────────────────

fn decode_error(type_name: &str, offset: usize, reason: impl Into<String>) -> CodecError {
    CodecError::SchemaDecode {
        type_name: type_name.into(),
        offset,
        reason: reason.into(),
    }
}

fn at(type_name: &str) -> impl Fn(CursorError) -> CodecError + '_ {
    move |e| decode_error(type_name, e.offset, e.reason)
}

fn read_value(
    type_name: &str,
    r: &mut Reader<'_>,
    table: &TypeTable,
    depth: usize,
) -> Result<Value, CodecError> {
    if depth > MAX_DEPTH {
        return Err(decode_error(type_name, r.offset(), "maximum nesting depth exceeded"));
    }
    let resolved = table
        .resolve(type_name)
        .map_err(|reason| decode_error(type_name, r.offset(), reason))?;

    match resolved {
        Resolved::Builtin(b) => builtin::read(b, r).map_err(at(type_name)),
        Resolved::Array(inner) => {
            let count = r.read_varuint32().map_err(at(type_name))? as usize;
            let mut items = Vec::with_capacity(count.min(r.remaining()));
            for _ in 0..count {
                items.push(read_value(inner, r, table, depth + 1)?);
            }
            Ok(Value::Array(items))
        }
        Resolved::Optional(inner) => match r.read_u8().map_err(at(type_name))? {
            0 => Ok(Value::Null),
            1 => read_value(inner, r, table, depth + 1),
            other => Err(decode_error(
                type_name,
                r.offset() - 1,
                format!("invalid optional flag {other}"),
            )),
        },
        Resolved::Extension(inner) => {
            if r.remaining() == 0 {
                Ok(Value::Null)
            } else {
                read_value(inner, r, table, depth + 1)
            }
        }
        Resolved::Struct { base, fields } => {
            let mut map = IndexMap::with_capacity(fields.len());
            read_struct(type_name, base, fields, r, table, depth, &mut map)?;
            Ok(Value::Struct(map))
        }
        Resolved::Variant(alts) => {
            let start = r.offset();
            let tag = r.read_varuint32().map_err(at(type_name))? as usize;
            let alt = alts.get(tag).ok_or_else(|| {
                decode_error(
                    type_name,
                    start,
                    format!("variant tag {tag} out of range ({} alternatives)", alts.len()),
                )
            })?;
            let inner = read_value(alt, r, table, depth + 1)?;
            Ok(Value::Variant(alt.clone(), Box::new(inner)))
        }
    }
}

fn read_struct(
    type_name: &str,
    base: Option<&str>,
    fields: &[FieldDef],
    r: &mut Reader<'_>,
    table: &TypeTable,
    depth: usize,
    map: &mut IndexMap<String, Value>,
) -> Result<(), CodecError> {
    if depth > MAX_DEPTH {
        return Err(decode_error(type_name, r.offset(), "maximum nesting depth exceeded"));
    }
    if let Some(base) = base {
        match table.resolve(base) {
            Ok(Resolved::Struct { base: b, fields: f }) => {
                read_struct(base, b, f, r, table, depth + 1, map)?
            }
            _ => return Err(decode_error(base, r.offset(), "struct base is not a struct")),
        }
    }
    for field in fields {
        if field.type_name.ends_with('$') && r.remaining() == 0 {
            break;
        }
        let value = read_value(&field.type_name, r, table, depth + 1)?;
        map.insert(field.name.clone(), value);
    }
    Ok(())
}

// ─── Encode ─────────────────────────────────────────────────────────────────

fn encode_error(type_name: &str, reason: impl Into<String>) -> CodecError {
    CodecError::Encode {
        type_name: type_name.into(),
        reason: reason.into(),
    }
}

fn write_value(
    type_name: &str,
    value: &Value,
    w: &mut Writer,
    table: &TypeTable,
    depth: usize,
) -> Result<(), CodecError> {
    if depth > MAX_DEPTH {
        return Err(encode_error(type_name, "maximum nesting depth exceeded"));
    }
    let resolved = table
        .resolve(type_name)
        .map_err(|reason| encode_error(type_name, reason))?;

    match resolved {
        Resolved::Builtin(b) => {
            builtin::write(b, value, w).map_err(|reason| encode_error(type_name, reason))
        }
        Resolved::Array(inner) => {
            let items = value
                .as_array()
                .ok_or_else(|| encode_error(type_name, format!("expected array, got {value}")))?;
            let count = u32::try_from(items.len())
                .map_err(|_| encode_error(type_name, "array too long"))?;
            w.write_varuint32(count);
            for item in items {
                write_value(inner, item, w, table, depth + 1)?;
            }
            Ok(())
        }
        Resolved::Optional(inner) => {
            if value.is_null() {
                w.write_u8(0);
                Ok(())
            } else {
                w.write_u8(1);
                write_value(inner, value, w, table, depth + 1)
            }
        }
        Resolved::Extension(inner) => {
            if value.is_null() {
                Ok(())
            } else {
                write_value(inner, value, w, table, depth + 1)
            }
        }
        Resolved::Struct { base, fields } => match value {
            Value::Struct(map) => write_struct(type_name, base, fields, map, w, table, depth),
            other => Err(encode_error(type_name, format!("expected struct, got {other}"))),
        },
        Resolved::Variant(alts) => {
            let (alt, inner) = variant_parts(value)
                .ok_or_else(|| encode_error(type_name, format!("expected variant, got {value}")))?;
            let tag = alts
                .iter()
                .position(|a| a == alt)
                .ok_or_else(|| encode_error(type_name, format!("'{alt}' is not an alternative")))?;
            w.write_varuint32(tag as u32);
            write_value(&alts[tag], inner, w, table, depth + 1)
        }
    }
}

/// Accepts `Variant(name, v)` or a `[name, v]` pair.
fn variant_parts(value: &Value) -> Option<(&str, &Value)> {
    match value {
        Value::Variant(name, inner) => Some((name.as_str(), inner.as_ref())),
        Value::Array(items) if items.len() == 2 => Some((items[0].as_str()?, &items[1])),
        _ => None,
    }
}

fn write_struct(
    type_name: &str,
    base: Option<&str>,
    fields: &[FieldDef],
    map: &IndexMap<String, Value>,
    w: &mut Writer,
    table: &TypeTable,
    depth: usize,
) -> Result<(), CodecError> {
    if depth > MAX_DEPTH {
        return Err(encode_error(type_name, "maximum nesting depth exceeded"));
    }
    if let Some(base) = base {
        match table.resolve(base) {
            Ok(Resolved::Struct { base: b, fields: f }) => {
                write_struct(base, b, f, map, w, table, depth + 1)?
            }
            _ => return Err(encode_error(base, "struct base is not a struct")),
        }
    }
    for field in fields {
        let is_extension = field.type_name.ends_with('$');
        match map.get(&field.name) {
            Some(v) if !(is_extension && v.is_null()) => {
                write_value(&field.type_name, v, w, table, depth + 1)?
            }
            _ if is_extension => break,
            _ => {
                return Err(encode_error(
                    type_name,
                    format!("missing field '{}'", field.name),
                ))
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeDescriptor;

    fn table() -> TypeTable {
        let mut t = TypeTable::with_builtins();
        t.insert(
            "header",
            TypeDescriptor::Struct {
                base: None,
                fields: vec![FieldDef::new("id", "uint32"), FieldDef::new("owner", "name")],
            },
        );
        t.insert(
            "record",
            TypeDescriptor::Struct {
                base: Some("header".into()),
                fields: vec![
                    FieldDef::new("memo", "string"),
                    FieldDef::new("tags", "name[]"),
                    FieldDef::new("extra", "uint16$"),
                ],
            },
        );
        t.insert(
            "either",
            TypeDescriptor::Variant(vec!["uint8".into(), "string".into()]),
        );
        t.insert(
            "node",
            TypeDescriptor::Struct {
                base: None,
                fields: vec![FieldDef::new("next", "node?")],
            },
        );
        t
    }

    fn record(extra: Option<u64>) -> Value {
        let mut fields = vec![
            ("id", Value::Uint(7)),
            ("owner", Value::str("alice")),
            ("memo", Value::str("hi")),
            ("tags", Value::Array(vec![Value::str("a"), Value::str("b")])),
        ];
        if let Some(e) = extra {
            fields.push(("extra", Value::Uint(e)));
        }
        Value::structure(fields)
    }

    #[test]
    fn struct_with_base_round_trips() {
        let t = table();
        let bytes = serialize("record", &record(None), &t).unwrap();
        assert_eq!(&bytes[..4], &7u32.to_le_bytes());
        let back = deserialize("record", &bytes, &t).unwrap();
        assert_eq!(back, record(None));
    }

    #[test]
    fn extension_field_read_when_present() {
        let t = table();
        let bytes = serialize("record", &record(Some(9)), &t).unwrap();
        let short = serialize("record", &record(None), &t).unwrap();
        assert_eq!(bytes.len(), short.len() + 2);
        assert_eq!(deserialize("record", &bytes, &t).unwrap(), record(Some(9)));
    }

    #[test]
    fn trailing_bytes_report_offset() {
        let t = table();
        let mut bytes = serialize("uint32", &Value::Uint(1), &t).unwrap();
        bytes.push(0xff);
        let err = deserialize("uint32", &bytes, &t).unwrap_err();
        assert_eq!(err.offset(), Some(4));
        assert_eq!(err.type_name(), "uint32");
    }

    #[test]
    fn insufficient_bytes_never_yield_partial_struct() {
        let t = table();
        let bytes = serialize("record", &record(None), &t).unwrap();
        let err = deserialize("record", &bytes[..bytes.len() - 3], &t).unwrap_err();
        assert!(matches!(err, CodecError::SchemaDecode { .. }));
    }

    #[test]
    fn unknown_type_is_decode_error() {
        let t = table();
        let err = deserialize("nothing", &[0], &t).unwrap_err();
        assert!(matches!(err, CodecError::SchemaDecode { offset: 0, .. }));
        assert!(matches!(
            serialize("nothing", &Value::Null, &t),
            Err(CodecError::Encode { .. })
        ));
    }

    #[test]
    fn variants_and_optionals() {
        let t = table();
        let v = Value::variant("string", Value::str("x"));
        let bytes = serialize("either", &v, &t).unwrap();
        assert_eq!(bytes, vec![1, 1, b'x']);
        assert_eq!(deserialize("either", &bytes, &t).unwrap(), v);

        let pair = Value::Array(vec![Value::str("uint8"), Value::Uint(3)]);
        assert_eq!(serialize("either", &pair, &t).unwrap(), vec![0, 3]);

        assert_eq!(serialize("uint8?", &Value::Null, &t).unwrap(), vec![0]);
        assert_eq!(deserialize("uint8?", &[1, 5], &t).unwrap(), Value::Uint(5));
        assert!(deserialize("either", &[2, 0], &t).is_err());
    }

    #[test]
    fn nesting_limit() {
        let t = table();
        let bytes = vec![1u8; MAX_DEPTH * 2];
        let err = deserialize("node", &bytes, &t).unwrap_err();
        match err {
            CodecError::SchemaDecode { reason, .. } => assert!(reason.contains("depth")),
            other => panic!("unexpected {other:?}"),
        }
        let ok = deserialize("node", &[1, 1, 0], &t).unwrap();
        assert!(ok.get("next").unwrap().get("next").unwrap().get("next").unwrap().is_null());
    }

    #[test]
    fn missing_field_is_encode_error() {
        let t = table();
        let v = Value::structure([("id", Value::Uint(1))]);
        let err = serialize("header", &v, &t).unwrap_err();
        assert!(err.to_string().contains("owner"));
    }
}
