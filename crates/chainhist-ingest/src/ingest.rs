//! The consume loop: decode, process, acknowledge, notify.
//!
//! Messages are handled strictly one at a time. Each message gets exactly one
//! ack or nack, and every notification it causes is sent before the next
//! message is touched.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use chainhist_abi::TypeTable;
use chainhist_core::{HistConfig, HistEvent, NotificationSink};

use crate::decompress::decompress;
use crate::envelope;
use crate::error::{IngestError, TransportDecompressionError};
use crate::processor::BlockProcessor;

/// One delivery from the distribution queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub delivery_tag: u64,
    pub content: Vec<u8>,
}

impl QueueMessage {
    pub fn new(delivery_tag: u64, content: Vec<u8>) -> Self {
        Self {
            delivery_tag,
            content,
        }
    }
}

/// Broker-side acknowledgement.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self, delivery_tag: u64) -> Result<(), IngestError>;

    async fn nack(&self, delivery_tag: u64) -> Result<(), IngestError>;
}

/// An acknowledgement decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Ack(u64),
    Nack(u64),
}

/// Records every decision in order. Used in tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingAcknowledger {
    decisions: Mutex<Vec<Delivery>>,
}

impl RecordingAcknowledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decisions(&self) -> Vec<Delivery> {
        self.decisions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn push(&self, d: Delivery) {
        self.decisions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(d);
    }
}

#[async_trait]
impl Acknowledger for RecordingAcknowledger {
    async fn ack(&self, delivery_tag: u64) -> Result<(), IngestError> {
        self.push(Delivery::Ack(delivery_tag));
        Ok(())
    }

    async fn nack(&self, delivery_tag: u64) -> Result<(), IngestError> {
        self.push(Delivery::Nack(delivery_tag));
        Ok(())
    }
}

#[async_trait]
impl<A: Acknowledger + ?Sized> Acknowledger for Arc<A> {
    async fn ack(&self, delivery_tag: u64) -> Result<(), IngestError> {
        (**self).ack(delivery_tag).await
    }

    async fn nack(&self, delivery_tag: u64) -> Result<(), IngestError> {
        (**self).nack(delivery_tag).await
    }
}

/// Called with the processing time of every decoded message.
pub type LatencyObserver = Arc<dyn Fn(Duration) + Send + Sync>;

/// Counters for one loop instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Messages acknowledged, empty ones included.
    pub acked: u64,
    pub nacked: u64,
    /// Acknowledged messages that yielded no block.
    pub empty: u64,
    /// Messages whose processing exceeded the latency budget.
    pub slow: u64,
}

pub struct IngestLoop<P, A> {
    table: Arc<TypeTable>,
    processor: P,
    acker: A,
    sink: Arc<dyn NotificationSink>,
    live: bool,
    latency_budget: Duration,
    observer: Option<LatencyObserver>,
    stats: IngestStats,
}

impl<P: BlockProcessor, A: Acknowledger> IngestLoop<P, A> {
    pub fn new(
        config: &HistConfig,
        table: Arc<TypeTable>,
        processor: P,
        acker: A,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            table,
            processor,
            acker,
            sink,
            live: config.live_mode,
            latency_budget: config.latency_budget(),
            observer: None,
            stats: IngestStats::default(),
        }
    }

    pub fn with_latency_observer(mut self, observer: LatencyObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn stats(&self) -> IngestStats {
        self.stats.clone()
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    pub fn processor_mut(&mut self) -> &mut P {
        &mut self.processor
    }

    pub fn acknowledger(&self) -> &A {
        &self.acker
    }

    /// Process a batch in delivery order.
    ///
    /// Per-message failures are nacked and never returned. A failing
    /// acknowledger does not stop the batch: every message is still decided
    /// and the first acknowledgement error is returned at the end.
    pub async fn consume(&mut self, batch: Vec<QueueMessage>) -> Result<(), IngestError> {
        let mut first_error = None;
        for message in &batch {
            if let Err(e) = self.consume_one(message).await {
                error!(delivery_tag = message.delivery_tag, error = %e, "Acknowledgement failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Decompress every message first; if any fails, the whole batch is
    /// rejected before anything is processed or acknowledged.
    pub async fn consume_compressed(&mut self, batch: Vec<QueueMessage>) -> Result<(), IngestError> {
        let mut plain = Vec::with_capacity(batch.len());
        for (index, message) in batch.into_iter().enumerate() {
            let content = decompress(&message.content).map_err(|source| {
                error!(index, delivery_tag = message.delivery_tag, error = %source, "Batch decompression failed");
                TransportDecompressionError {
                    index,
                    delivery_tag: message.delivery_tag,
                    source,
                }
            })?;
            plain.push(QueueMessage::new(message.delivery_tag, content));
        }
        self.consume(plain).await
    }

    /// Drain a stream of batches until it ends.
    pub async fn run<St>(&mut self, mut batches: St) -> Result<(), IngestError>
    where
        St: Stream<Item = Vec<QueueMessage>> + Unpin + Send,
    {
        info!(live = self.live, "Ingest loop starting");
        while let Some(batch) = batches.next().await {
            self.consume(batch).await?;
        }
        info!(
            acked = self.stats.acked,
            nacked = self.stats.nacked,
            empty = self.stats.empty,
            "Ingest loop finished"
        );
        Ok(())
    }

    async fn consume_one(&mut self, message: &QueueMessage) -> Result<(), IngestError> {
        let tag = message.delivery_tag;
        let envelope = match envelope::decode(&message.content, &self.table) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(delivery_tag = tag, error = %e, "Envelope decode failed");
                self.acker.nack(tag).await?;
                self.stats.nacked += 1;
                return Ok(());
            }
        };

        let started = Instant::now();
        let result = self.processor.process(&envelope).await;
        let elapsed = started.elapsed();
        if let Some(observe) = &self.observer {
            observe(elapsed);
        }
        if elapsed > self.latency_budget {
            warn!(
                block = envelope.this_block.as_ref().map(|b| b.block_num),
                elapsed_ms = elapsed.as_millis() as u64,
                budget_ms = self.latency_budget.as_millis() as u64,
                "Block processing time too high"
            );
            self.stats.slow += 1;
        }

        match result {
            Ok(Some(block)) => {
                self.sink
                    .notify(HistEvent::ConsumedBlock {
                        block_num: block.block_num,
                        live: self.live,
                        producer: block.producer,
                    })
                    .await;
                self.acker.ack(tag).await?;
                self.stats.acked += 1;
            }
            Ok(None) => {
                info!(
                    delivery_tag = tag,
                    kind = %envelope.kind,
                    head = envelope.head.block_num,
                    last_irreversible = envelope.last_irreversible.block_num,
                    "Empty message, no block"
                );
                self.acker.ack(tag).await?;
                self.stats.acked += 1;
                self.stats.empty += 1;
            }
            Err(e) => {
                error!(delivery_tag = tag, error = %e, "Block processing failed");
                self.acker.nack(tag).await?;
                self.stats.nacked += 1;
            }
        }
        Ok(())
    }
}
