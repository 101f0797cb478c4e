//! The type table: name → descriptor registry consulted by every codec call.
//!
//! Array (`T[]`), optional (`T?`) and binary-extension (`T$`) types are not
//! stored; they are recognised by suffix when a name is resolved.

use std::collections::{HashMap, HashSet};

use crate::abi::AbiDef;
use crate::error::AbiError;

/// Alias chains longer than this are treated as cycles.
const MAX_ALIAS_HOPS: usize = 32;

macro_rules! builtins {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// Primitive types with a fixed wire encoding.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Builtin {
            $($variant),*
        }

        impl Builtin {
            pub const ALL: &'static [Builtin] = &[$(Builtin::$variant),*];

            pub fn name(&self) -> &'static str {
                match self {
                    $(Builtin::$variant => $name),*
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Builtin::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

builtins! {
    Bool => "bool",
    Int8 => "int8",
    Uint8 => "uint8",
    Int16 => "int16",
    Uint16 => "uint16",
    Int32 => "int32",
    Uint32 => "uint32",
    Int64 => "int64",
    Uint64 => "uint64",
    Int128 => "int128",
    Uint128 => "uint128",
    VarInt32 => "varint32",
    VarUint32 => "varuint32",
    Float32 => "float32",
    Float64 => "float64",
    Float128 => "float128",
    TimePoint => "time_point",
    TimePointSec => "time_point_sec",
    BlockTimestamp => "block_timestamp_type",
    Name => "name",
    Bytes => "bytes",
    String => "string",
    Checksum160 => "checksum160",
    Checksum256 => "checksum256",
    Checksum512 => "checksum512",
    PublicKey => "public_key",
    Signature => "signature",
    Symbol => "symbol",
    SymbolCode => "symbol_code",
    Asset => "asset",
}

/// A named struct field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub type_name: String,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDescriptor {
    Builtin(Builtin),
    /// `typedef`: another name for `target`.
    Alias(String),
    /// Base fields are encoded before `fields`.
    Struct {
        base: Option<String>,
        fields: Vec<FieldDef>,
    },
    /// Alternatives in tag order.
    Variant(Vec<String>),
}

/// A name after suffix handling and alias expansion.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Resolved<'a> {
    Builtin(Builtin),
    Array(&'a str),
    Optional(&'a str),
    Extension(&'a str),
    Struct {
        base: Option<&'a str>,
        fields: &'a [FieldDef],
    },
    Variant(&'a [String]),
}

/// Immutable once built; share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    types: HashMap<String, TypeDescriptor>,
}

impl TypeTable {
    /// An empty table. Most callers want [`TypeTable::with_builtins`].
    pub fn new() -> Self {
        Self::default()
    }

    /// All builtins plus `extended_asset`.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        for b in Builtin::ALL {
            table.insert(b.name(), TypeDescriptor::Builtin(*b));
        }
        table.insert(
            "extended_asset",
            TypeDescriptor::Struct {
                base: None,
                fields: vec![
                    FieldDef::new("quantity", "asset"),
                    FieldDef::new("contract", "name"),
                ],
            },
        );
        table
    }

    /// Build the table for an ABI: builtins, then its typedefs, structs and
    /// variants. Every referenced name must resolve.
    pub fn from_abi(abi: &AbiDef) -> Result<Self, AbiError> {
        let mut table = Self::with_builtins();
        let mut defined: HashSet<&str> = HashSet::new();

        for def in &abi.types {
            claim(&mut defined, &def.new_type_name)?;
            table.insert(&def.new_type_name, TypeDescriptor::Alias(def.type_.clone()));
        }
        for def in &abi.structs {
            claim(&mut defined, &def.name)?;
            table.insert(
                &def.name,
                TypeDescriptor::Struct {
                    base: (!def.base.is_empty()).then(|| def.base.clone()),
                    fields: def
                        .fields
                        .iter()
                        .map(|f| FieldDef::new(&f.name, &f.type_))
                        .collect(),
                },
            );
        }
        for def in &abi.variants {
            claim(&mut defined, &def.name)?;
            table.insert(&def.name, TypeDescriptor::Variant(def.types.clone()));
        }

        table.validate()?;
        Ok(table)
    }

    /// Insert or replace a descriptor, returning the previous one.
    pub fn insert(&mut self, name: impl Into<String>, desc: TypeDescriptor) -> Option<TypeDescriptor> {
        self.types.insert(name.into(), desc)
    }

    pub fn get(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }

    /// Whether `name` (suffixes included) resolves to a known type.
    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub(crate) fn resolve<'a>(&'a self, name: &'a str) -> Result<Resolved<'a>, String> {
        let mut current = name;
        for _ in 0..MAX_ALIAS_HOPS {
            if let Some(inner) = current.strip_suffix("[]") {
                return Ok(Resolved::Array(inner));
            }
            if let Some(inner) = current.strip_suffix('?') {
                return Ok(Resolved::Optional(inner));
            }
            if let Some(inner) = current.strip_suffix('$') {
                return Ok(Resolved::Extension(inner));
            }
            match self.types.get(current) {
                Some(TypeDescriptor::Builtin(b)) => return Ok(Resolved::Builtin(*b)),
                Some(TypeDescriptor::Alias(target)) => current = target.as_str(),
                Some(TypeDescriptor::Struct { base, fields }) => {
                    return Ok(Resolved::Struct {
                        base: base.as_deref(),
                        fields: fields.as_slice(),
                    })
                }
                Some(TypeDescriptor::Variant(alts)) => return Ok(Resolved::Variant(alts.as_slice())),
                None => return Err(format!("unknown type '{current}'")),
            }
        }
        Err(format!("alias chain for '{name}' does not terminate"))
    }

    /// Strip every suffix and check that the element type resolves.
    fn check_reference(&self, type_name: &str, referenced_by: &str) -> Result<(), AbiError> {
        let mut current = type_name;
        loop {
            match self.resolve(current) {
                Ok(Resolved::Array(inner) | Resolved::Optional(inner) | Resolved::Extension(inner)) => {
                    current = inner
                }
                Ok(_) => return Ok(()),
                Err(_) => {
                    return Err(AbiError::UnknownType {
                        type_name: type_name.into(),
                        referenced_by: referenced_by.into(),
                    })
                }
            }
        }
    }

    /// Check that every alias target, struct base, field type and variant
    /// alternative resolves, and that struct bases are structs.
    pub fn validate(&self) -> Result<(), AbiError> {
        for (name, desc) in &self.types {
            match desc {
                TypeDescriptor::Builtin(_) => {}
                TypeDescriptor::Alias(target) => self.check_reference(target, name)?,
                TypeDescriptor::Struct { base, fields } => {
                    if let Some(base) = base {
                        match self.resolve(base) {
                            Ok(Resolved::Struct { .. }) => {}
                            _ => {
                                return Err(AbiError::UnknownType {
                                    type_name: base.clone(),
                                    referenced_by: name.clone(),
                                })
                            }
                        }
                    }
                    for f in fields {
                        self.check_reference(&f.type_name, name)?;
                    }
                }
                TypeDescriptor::Variant(alts) => {
                    for alt in alts {
                        self.check_reference(alt, name)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn claim<'a>(defined: &mut HashSet<&'a str>, name: &'a str) -> Result<(), AbiError> {
    if !defined.insert(name) {
        return Err(AbiError::DuplicateType { name: name.into() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_names_round_trip() {
        for b in Builtin::ALL {
            assert_eq!(Builtin::from_name(b.name()), Some(*b));
        }
        assert_eq!(Builtin::from_name("uint256"), None);
    }

    #[test]
    fn suffixes_resolve_without_registration() {
        let table = TypeTable::with_builtins();
        assert!(matches!(table.resolve("name[]"), Ok(Resolved::Array("name"))));
        assert!(matches!(table.resolve("asset?"), Ok(Resolved::Optional("asset"))));
        assert!(matches!(table.resolve("uint8$"), Ok(Resolved::Extension("uint8"))));
        assert!(table.contains("extended_asset[]"));
        assert!(!table.contains("nope[]"));
    }

    #[test]
    fn aliases_follow_to_target() {
        let mut table = TypeTable::with_builtins();
        table.insert("account_name", TypeDescriptor::Alias("name".into()));
        table.insert("names", TypeDescriptor::Alias("account_name[]".into()));
        assert!(matches!(
            table.resolve("account_name"),
            Ok(Resolved::Builtin(Builtin::Name))
        ));
        assert!(matches!(table.resolve("names"), Ok(Resolved::Array("account_name"))));
    }

    #[test]
    fn alias_cycle_detected() {
        let mut table = TypeTable::with_builtins();
        table.insert("a", TypeDescriptor::Alias("b".into()));
        table.insert("b", TypeDescriptor::Alias("a".into()));
        assert!(table.resolve("a").unwrap_err().contains("does not terminate"));
    }

    #[test]
    fn validate_reports_dangling_field() {
        let mut table = TypeTable::with_builtins();
        table.insert(
            "transfer",
            TypeDescriptor::Struct {
                base: None,
                fields: vec![FieldDef::new("to", "account")],
            },
        );
        match table.validate() {
            Err(AbiError::UnknownType {
                type_name,
                referenced_by,
            }) => {
                assert_eq!(type_name, "account");
                assert_eq!(referenced_by, "transfer");
            }
            other => panic!("expected UnknownType, got {other:?}"),
        }
    }

    #[test]
    fn base_must_be_struct() {
        let mut table = TypeTable::with_builtins();
        table.insert(
            "child",
            TypeDescriptor::Struct {
                base: Some("uint8".into()),
                fields: vec![],
            },
        );
        assert!(table.validate().is_err());
    }
}
