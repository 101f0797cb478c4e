//! chainhist-storage: storage backends for ChainHist.
//!
//! Each backend implements the three storage seams of the pipeline:
//! [`AbiStore`](chainhist_abi::AbiStore) for ABI versions,
//! [`IndexWriter`](chainhist_core::IndexWriter) for normalized records and
//! [`BlockIndex`](chainhist_core::BlockIndex) for resume points.
//!
//! Backends:
//! - [`memory`]: in-memory (dev/testing, no persistence)
//! - [`sqlite`]: SQLite via `sqlx` (embedded, single-file persistence)

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryStore;
