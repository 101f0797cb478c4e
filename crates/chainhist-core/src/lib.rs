//! # chainhist-core
//!
//! Core types, traits and policy shared across the ChainHist crates.
//! The codec, the ingestion pipeline and the storage backends are all built
//! on top of the interfaces defined here.
//!
//! ```text
//! queue message → envelope decode → trace processor → action resolver
//!                                                        ├── PolicyFilter
//!                                                        └── ABI version cache
//!                     → IndexWriter + NotificationSink + ack/nack
//! ```

pub mod config;
pub mod error;
pub mod notify;
pub mod policy;
pub mod record;
pub mod resume;
pub mod trace;

pub use config::HistConfig;
pub use error::{ConfigError, StoreError};
pub use notify::{ChannelSink, DecodeErrorReport, HistEvent, NotificationSink, NullSink, RecordingSink};
pub use policy::PolicyFilter;
pub use record::{ActionData, BlockRecord, DeltaRecord, IndexWriter, ResolvedAct, ResolvedAction};
pub use resume::{BlockIndex, IndexCollection, ResumePoints, SortOrder};
pub use trace::{
    AccountRamDelta, ActionReceipt, ActionTrace, AuthSequence, BlockHeader, BlockPosition,
    DeltaRow, PermissionLevel, RawAction, TableDelta, TransactionTrace,
};
