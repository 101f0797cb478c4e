//! ABI definitions: the serde model of an `eosio::abi/1.x` document, its
//! binary `abi_def` form, and [`ContractAbi`], a compiled per-account ABI.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::codec::{deserialize, serialize};
use crate::error::AbiError;
use crate::types::{FieldDef, TypeDescriptor, TypeTable};
use crate::value::Value;

const VERSION_PREFIX: &str = "eosio::abi/1.";

// ─── Serde model ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    pub new_type_name: String,
    #[serde(rename = "type")]
    pub type_: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiFieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructDef {
    pub name: String,
    /// Empty when the struct has no base.
    #[serde(default)]
    pub base: String,
    pub fields: Vec<AbiFieldDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDef {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub ricardian_contract: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    #[serde(default)]
    pub index_type: String,
    #[serde(default)]
    pub key_names: Vec<String>,
    #[serde(default)]
    pub key_types: Vec<String>,
    #[serde(rename = "type")]
    pub type_: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClausePair {
    pub id: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub error_code: u64,
    pub error_msg: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiExtension {
    pub tag: u16,
    /// Hex-encoded payload.
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantDef {
    pub name: String,
    pub types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResultDef {
    pub name: String,
    pub result_type: String,
}

/// An ABI document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiDef {
    pub version: String,
    #[serde(default)]
    pub types: Vec<TypeDef>,
    #[serde(default)]
    pub structs: Vec<StructDef>,
    #[serde(default)]
    pub actions: Vec<ActionDef>,
    #[serde(default)]
    pub tables: Vec<TableDef>,
    #[serde(default)]
    pub ricardian_clauses: Vec<ClausePair>,
    #[serde(default)]
    pub error_messages: Vec<ErrorMessage>,
    #[serde(default)]
    pub abi_extensions: Vec<AbiExtension>,
    #[serde(default)]
    pub variants: Vec<VariantDef>,
    #[serde(default)]
    pub action_results: Vec<ActionResultDef>,
}

impl AbiDef {
    pub fn from_json(json: &str) -> Result<Self, AbiError> {
        let def: AbiDef = serde_json::from_str(json)?;
        def.check_version()?;
        Ok(def)
    }

    /// Decode a binary `abi_def`, as carried by `eosio::setabi`.
    pub fn from_bin(bytes: &[u8]) -> Result<Self, AbiError> {
        let value = deserialize("abi_def", bytes, bootstrap_table())?;
        let def: AbiDef = serde_json::from_value(value.to_json())?;
        def.check_version()?;
        Ok(def)
    }

    /// JSON when the blob opens with `{`, binary otherwise.
    pub fn from_blob(blob: &[u8]) -> Result<Self, AbiError> {
        let first = blob.iter().find(|b| !b.is_ascii_whitespace());
        if first == Some(&b'{') {
            let text = String::from_utf8_lossy(blob);
            Self::from_json(&text)
        } else {
            Self::from_bin(blob)
        }
    }

    pub fn to_bin(&self) -> Result<Vec<u8>, AbiError> {
        let value = Value::from_json(&serde_json::to_value(self)?);
        Ok(serialize("abi_def", &value, bootstrap_table())?)
    }

    pub fn to_json(&self) -> Result<String, AbiError> {
        Ok(serde_json::to_string(self)?)
    }

    fn check_version(&self) -> Result<(), AbiError> {
        if self.version.starts_with(VERSION_PREFIX) {
            Ok(())
        } else {
            Err(AbiError::UnsupportedVersion {
                version: self.version.clone(),
            })
        }
    }
}

/// Type table describing `abi_def` itself.
fn bootstrap_table() -> &'static TypeTable {
    static TABLE: OnceLock<TypeTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut t = TypeTable::with_builtins();
        let mut def = |name: &str, fields: &[(&str, &str)]| {
            t.insert(
                name,
                TypeDescriptor::Struct {
                    base: None,
                    fields: fields.iter().map(|(n, ty)| FieldDef::new(*n, *ty)).collect(),
                },
            );
        };
        def("type_def", &[("new_type_name", "string"), ("type", "string")]);
        def("field_def", &[("name", "string"), ("type", "string")]);
        def(
            "struct_def",
            &[("name", "string"), ("base", "string"), ("fields", "field_def[]")],
        );
        def(
            "action_def",
            &[("name", "name"), ("type", "string"), ("ricardian_contract", "string")],
        );
        def(
            "table_def",
            &[
                ("name", "name"),
                ("index_type", "string"),
                ("key_names", "string[]"),
                ("key_types", "string[]"),
                ("type", "string"),
            ],
        );
        def("clause_pair", &[("id", "string"), ("body", "string")]);
        def("error_message", &[("error_code", "uint64"), ("error_msg", "string")]);
        def("extensions_entry", &[("tag", "uint16"), ("value", "bytes")]);
        def("variant_def", &[("name", "string"), ("types", "string[]")]);
        def("action_result_def", &[("name", "name"), ("result_type", "string")]);
        def(
            "abi_def",
            &[
                ("version", "string"),
                ("types", "type_def[]"),
                ("structs", "struct_def[]"),
                ("actions", "action_def[]"),
                ("tables", "table_def[]"),
                ("ricardian_clauses", "clause_pair[]"),
                ("error_messages", "error_message[]"),
                ("abi_extensions", "extensions_entry[]"),
                ("variants", "variant_def[]$"),
                ("action_results", "action_result_def[]$"),
            ],
        );
        t
    })
}

// ─── Compiled ABI ───────────────────────────────────────────────────────────

/// A parsed ABI with its type table and action map.
#[derive(Debug, Clone)]
pub struct ContractAbi {
    def: AbiDef,
    table: Arc<TypeTable>,
    actions: HashMap<String, String>,
}

impl ContractAbi {
    pub fn from_blob(blob: &[u8]) -> Result<Self, AbiError> {
        Self::from_def(AbiDef::from_blob(blob)?)
    }

    pub fn from_def(def: AbiDef) -> Result<Self, AbiError> {
        let table = Arc::new(TypeTable::from_abi(&def)?);
        let actions = def
            .actions
            .iter()
            .map(|a| (a.name.clone(), a.type_.clone()))
            .collect();
        Ok(Self { def, table, actions })
    }

    pub fn def(&self) -> &AbiDef {
        &self.def
    }

    pub fn table(&self) -> &Arc<TypeTable> {
        &self.table
    }

    /// The type declared for `action`, if any.
    pub fn action_type(&self, action: &str) -> Option<&str> {
        self.actions.get(action).map(String::as_str)
    }

    pub fn decode_action(&self, action: &str, data: &[u8]) -> Result<Value, AbiError> {
        let type_name = self
            .action_type(action)
            .ok_or_else(|| AbiError::MissingAction {
                action: action.into(),
            })?;
        Ok(deserialize(type_name, data, &self.table)?)
    }

    pub fn encode_action(&self, action: &str, value: &Value) -> Result<Vec<u8>, AbiError> {
        let type_name = self
            .action_type(action)
            .ok_or_else(|| AbiError::MissingAction {
                action: action.into(),
            })?;
        Ok(serialize(type_name, value, &self.table)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN_ABI: &str = r#"{
        "version": "eosio::abi/1.1",
        "types": [{"new_type_name": "account_name", "type": "name"}],
        "structs": [
            {"name": "transfer", "base": "", "fields": [
                {"name": "from", "type": "account_name"},
                {"name": "to", "type": "account_name"},
                {"name": "quantity", "type": "asset"},
                {"name": "memo", "type": "string"}
            ]},
            {"name": "account", "base": "", "fields": [{"name": "balance", "type": "asset"}]}
        ],
        "actions": [{"name": "transfer", "type": "transfer", "ricardian_contract": ""}],
        "tables": [{"name": "accounts", "index_type": "i64", "key_names": [], "key_types": [], "type": "account"}],
        "error_messages": [{"error_code": 10, "error_msg": "overdrawn"}],
        "abi_extensions": [{"tag": 1, "value": "00ff"}]
    }"#;

    fn transfer() -> Value {
        Value::structure([
            ("from", Value::str("alice")),
            ("to", Value::str("bob")),
            ("quantity", Value::str("1.0000 EOS")),
            ("memo", Value::str("thanks")),
        ])
    }

    #[test]
    fn json_abi_decodes_actions() {
        let abi = ContractAbi::from_blob(TOKEN_ABI.as_bytes()).unwrap();
        assert_eq!(abi.action_type("transfer"), Some("transfer"));
        let bytes = abi.encode_action("transfer", &transfer()).unwrap();
        assert_eq!(abi.decode_action("transfer", &bytes).unwrap(), transfer());
    }

    #[test]
    fn missing_action_is_reported() {
        let abi = ContractAbi::from_blob(TOKEN_ABI.as_bytes()).unwrap();
        assert!(matches!(
            abi.decode_action("issue", &[]),
            Err(AbiError::MissingAction { .. })
        ));
    }

    #[test]
    fn binary_form_matches_json_form() {
        let def = AbiDef::from_json(TOKEN_ABI).unwrap();
        let bin = def.to_bin().unwrap();
        assert_ne!(bin.first(), Some(&b'{'));
        let back = AbiDef::from_blob(&bin).unwrap();
        assert_eq!(back, def);
    }

    #[test]
    fn binary_without_extensions_parses() {
        let def = AbiDef::from_json(TOKEN_ABI).unwrap();
        let bin = def.to_bin().unwrap();
        // Drop the two trailing empty extension arrays.
        let legacy = &bin[..bin.len() - 2];
        let back = AbiDef::from_bin(legacy).unwrap();
        assert!(back.variants.is_empty());
        assert_eq!(back.structs, def.structs);
    }

    #[test]
    fn unsupported_version_rejected() {
        let json = r#"{"version": "eosio::abi/2.0"}"#;
        assert!(matches!(
            AbiDef::from_json(json),
            Err(AbiError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn dangling_type_rejected() {
        let json = r#"{"version": "eosio::abi/1.0", "structs": [
            {"name": "s", "base": "", "fields": [{"name": "x", "type": "missing"}]}
        ]}"#;
        assert!(matches!(
            ContractAbi::from_blob(json.as_bytes()),
            Err(AbiError::UnknownType { .. })
        ));
    }
}
