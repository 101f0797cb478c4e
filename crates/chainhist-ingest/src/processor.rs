//! Block processing: resolve every action of a decoded envelope and forward
//! the results to the index.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use chainhist_abi::{abi_store_key, AbiStore, AbiVersionCache};
use chainhist_core::{
    ActionData, BlockRecord, DeltaRecord, IndexWriter, NotificationSink, ResolvedAction,
};

use crate::envelope::DecodedEnvelope;
use crate::error::ProcessError;
use crate::resolver::{ActionOutcome, ActionResolver, TraceContext};

/// Summary of one processed block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedBlock {
    pub block_num: u32,
    /// Present when the envelope carried a block header.
    pub producer: Option<String>,
    pub actions: usize,
    pub deltas: usize,
}

/// Turns a decoded envelope into persisted records.
///
/// `Ok(None)` means the envelope held nothing to process; the message is
/// still acknowledged.
#[async_trait]
pub trait BlockProcessor: Send {
    async fn process(
        &mut self,
        envelope: &DecodedEnvelope,
    ) -> Result<Option<ProcessedBlock>, ProcessError>;
}

/// The standard processor: resolves actions through an [`ActionResolver`],
/// writes block, action and delta records to an [`IndexWriter`], and keeps
/// the ABI cache current by observing `eosio::setabi`.
pub struct TraceProcessor<S> {
    resolver: ActionResolver,
    cache: AbiVersionCache<S>,
    writer: Arc<dyn IndexWriter>,
    sink: Arc<dyn NotificationSink>,
    debug: bool,
}

impl<S: AbiStore> TraceProcessor<S> {
    pub fn new(
        resolver: ActionResolver,
        cache: AbiVersionCache<S>,
        writer: Arc<dyn IndexWriter>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            resolver,
            cache,
            writer,
            sink,
            debug: false,
        }
    }

    /// Log every recorded ABI key.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn cache(&self) -> &AbiVersionCache<S> {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut AbiVersionCache<S> {
        &mut self.cache
    }

    /// Record the ABI carried by a decoded `eosio::setabi`.
    async fn observe_setabi(&mut self, action: &ResolvedAction) -> Result<(), ProcessError> {
        let ActionData::Decoded(data) = &action.act.data else {
            return Ok(());
        };
        let account = data.get("account").and_then(|v| v.as_str());
        let abi_hex = data.get("abi").and_then(|v| v.as_str());
        let (Some(account), Some(abi_hex)) = (account, abi_hex) else {
            warn!(block = action.block_num, "setabi without account or abi field");
            return Ok(());
        };
        let blob = match hex::decode(abi_hex) {
            Ok(blob) => blob,
            Err(e) => {
                warn!(block = action.block_num, account, error = %e, "setabi payload is not hex");
                return Ok(());
            }
        };
        let bytes = blob.len();
        self.cache.record(account, action.block_num, blob).await?;
        info!(block = action.block_num, account, "ABI updated");
        if self.debug {
            debug!(
                key = %abi_store_key(self.cache.chain(), action.block_num, account),
                bytes,
                versions = ?self.cache.versions(account),
                "ABI version index"
            );
        }
        Ok(())
    }
}

fn is_setabi(action: &ResolvedAction) -> bool {
    action.act.account == "eosio" && action.act.name == "setabi"
}

#[async_trait]
impl<S: AbiStore + 'static> BlockProcessor for TraceProcessor<S> {
    async fn process(
        &mut self,
        envelope: &DecodedEnvelope,
    ) -> Result<Option<ProcessedBlock>, ProcessError> {
        let Some(this_block) = &envelope.this_block else {
            return Ok(None);
        };
        let block_num = this_block.block_num;
        let header = envelope.block.as_ref();
        let timestamp = header.map(|h| h.timestamp.as_str());
        let producer = header.map(|h| h.producer.as_str());

        let mut resolved = Vec::new();
        for trx in &envelope.traces {
            let ctx = TraceContext {
                trx_id: &trx.id,
                block_num,
                timestamp,
                producer,
                cpu_usage_us: trx.cpu_usage_us,
                net_usage_words: trx.net_usage_words,
            };
            for trace in &trx.action_traces {
                let outcome = self
                    .resolver
                    .resolve(trace, &ctx, &self.cache, self.sink.as_ref())
                    .await;
                if let ActionOutcome::Resolved(action) = outcome {
                    if is_setabi(&action) {
                        self.observe_setabi(&action).await?;
                    }
                    resolved.push(action);
                }
            }
        }

        let chain = self.resolver.chain().to_string();
        let actions = resolved.len();
        self.writer
            .write_block(
                &chain,
                BlockRecord {
                    timestamp: timestamp.map(str::to_string),
                    block_num,
                    block_id: this_block.block_id.clone(),
                    producer: producer.map(str::to_string),
                    previous: header.map(|h| h.previous.clone()),
                    trx_count: u32::try_from(envelope.traces.len()).unwrap_or(u32::MAX),
                    act_count: u32::try_from(actions).unwrap_or(u32::MAX),
                },
            )
            .await?;
        if !resolved.is_empty() {
            self.writer.write_actions(&chain, resolved).await?;
        }

        let deltas: Vec<DeltaRecord> = envelope
            .deltas
            .iter()
            .flat_map(|delta| {
                delta.rows.iter().map(move |row| DeltaRecord {
                    block_num,
                    table: delta.name.clone(),
                    present: row.present,
                    data: hex::encode(&row.data),
                })
            })
            .collect();
        let delta_count = deltas.len();
        if !deltas.is_empty() {
            self.writer.write_deltas(&chain, deltas).await?;
        }

        Ok(Some(ProcessedBlock {
            block_num,
            producer: producer.map(str::to_string),
            actions,
            deltas: delta_count,
        }))
    }
}
