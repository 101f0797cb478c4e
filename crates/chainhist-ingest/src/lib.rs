//! # chainhist-ingest
//!
//! The state-history ingestion path.
//!
//! ```text
//! QueueMessage ─▶ decompress? ─▶ envelope::decode ─▶ BlockProcessor
//!                                                     ├── ActionResolver (policy, ABI, extras)
//!                                                     ├── AbiVersionCache (setabi)
//!                                                     └── IndexWriter
//!              ◀── ack / nack ◀── IngestLoop ──▶ NotificationSink
//! ```
//!
//! [`IngestLoop`] handles one message at a time and decides ack or nack for
//! each. [`TraceProcessor`] is the standard [`BlockProcessor`].

pub mod decompress;
pub mod envelope;
pub mod error;
pub mod extras;
pub mod ingest;
pub mod processor;
pub mod resolver;

pub use decompress::decompress;
pub use envelope::DecodedEnvelope;
pub use error::{EnvelopeDecodeError, IngestError, ProcessError, TransportDecompressionError};
pub use ingest::{
    Acknowledger, Delivery, IngestLoop, IngestStats, LatencyObserver, QueueMessage,
    RecordingAcknowledger,
};
pub use processor::{BlockProcessor, ProcessedBlock, TraceProcessor};
pub use resolver::{ActionOutcome, ActionResolver, PayloadError, TraceContext};
