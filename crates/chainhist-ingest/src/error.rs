//! Error types for the ingestion pipeline.

use chainhist_abi::CodecError;
use chainhist_core::StoreError;
use thiserror::Error;

/// A queue message could not be turned into a block, traces and deltas.
#[derive(Debug, Error)]
pub enum EnvelopeDecodeError {
    #[error("Failed to decode {section}: {source}")]
    Codec {
        section: &'static str,
        #[source]
        source: CodecError,
    },

    #[error("Unexpected {section} shape: {reason}")]
    Shape {
        section: &'static str,
        reason: String,
    },
}

/// The block processor failed; the message is nacked.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Processing failed: {0}")]
    Other(String),
}

/// A batch could not be decompressed and was rejected as a whole.
#[derive(Debug, Error)]
#[error("Failed to decompress message {index} of the batch (delivery tag {delivery_tag}): {source}")]
pub struct TransportDecompressionError {
    pub index: usize,
    pub delivery_tag: u64,
    #[source]
    pub source: std::io::Error,
}

/// Errors raised by the ingestion loop itself. Per-message failures are
/// nacked, not returned.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Decompression(#[from] TransportDecompressionError),

    #[error("Acknowledgement failed: {0}")]
    Ack(String),
}
