//! Coordinator notifications.
//!
//! Events are one-way and fire-and-forget: a sink never reports failure back
//! to the pipeline. Production wiring forwards them over a channel to the
//! coordinator; tests inject a [`RecordingSink`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::warn;

/// Payload of a `decode_error` notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeErrorReport {
    /// Error class, e.g. `"action_ds_error"`.
    #[serde(rename = "type")]
    pub kind: String,
    pub block: u32,
    pub account: String,
    pub action: String,
    /// Global sequence of the failing action (0 when it carried no receipt).
    pub gs: u64,
    pub message: String,
}

/// A notification sent to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HistEvent {
    /// An action payload was decoded against its contract ABI.
    DecodeOk,
    /// An action payload could not be decoded and was forwarded as hex.
    DecodeError { data: DecodeErrorReport },
    /// A queue message yielded a processed block.
    ConsumedBlock {
        block_num: u32,
        live: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        producer: Option<String>,
    },
}

impl HistEvent {
    /// The `event` tag as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            HistEvent::DecodeOk => "decode_ok",
            HistEvent::DecodeError { .. } => "decode_error",
            HistEvent::ConsumedBlock { .. } => "consumed_block",
        }
    }
}

/// One-way event sink.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: HistEvent);
}

#[async_trait]
impl<S: NotificationSink + ?Sized> NotificationSink for Arc<S> {
    async fn notify(&self, event: HistEvent) {
        (**self).notify(event).await
    }
}

/// Forwards events to the coordinator task over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<HistEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<HistEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink together with the coordinator-side receiver.
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<HistEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl NotificationSink for ChannelSink {
    async fn notify(&self, event: HistEvent) {
        if let Err(e) = self.tx.send(event) {
            // Coordinator gone, ingestion carries on
            warn!(event = e.0.name(), "Coordinator channel closed, dropping notification");
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl NotificationSink for NullSink {
    async fn notify(&self, _event: HistEvent) {}
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<HistEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events recorded so far.
    pub fn events(&self) -> Vec<HistEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of recorded events with the given wire name.
    pub fn count(&self, name: &str) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|e| e.name() == name)
            .count()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, event: HistEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}
