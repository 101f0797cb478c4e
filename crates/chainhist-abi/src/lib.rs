//! # chainhist-abi
//!
//! Schema-driven binary codec for EOSIO-style ABIs.
//!
//! - [`TypeTable`] maps type names to descriptors; it is built from an
//!   [`AbiDef`] and shared read-only by every codec call.
//! - [`serialize`] / [`deserialize`] convert between [`Value`] and bytes.
//! - [`AbiVersionCache`] tracks which contract ABI is effective at which
//!   block and writes every new version through to an [`AbiStore`].

pub mod abi;
pub mod builtin;
pub mod cache;
pub mod codec;
pub mod cursor;
pub mod error;
pub mod types;
pub mod value;

pub use abi::{AbiDef, ActionDef, ContractAbi, StructDef, TypeDef};
pub use cache::{abi_store_key, parse_abi_store_key, AbiStore, AbiVersion, AbiVersionCache};
pub use codec::{deserialize, serialize};
pub use error::{AbiError, CodecError};
pub use types::{Builtin, FieldDef, TypeDescriptor, TypeTable};
pub use value::Value;
