//! Action resolution: policy, ABI selection, payload decoding and the shaping
//! of a raw action trace into a [`ResolvedAction`].

use chainhist_abi::{AbiError, AbiStore, AbiVersionCache, Value};
use chainhist_core::{
    ActionData, ActionTrace, DecodeErrorReport, HistEvent, NotificationSink, PolicyFilter,
    RawAction, ResolvedAct, ResolvedAction,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::extras;

/// Per-transaction data shared by all of its actions.
#[derive(Debug, Clone, Copy)]
pub struct TraceContext<'a> {
    pub trx_id: &'a str,
    pub block_num: u32,
    pub timestamp: Option<&'a str>,
    pub producer: Option<&'a str>,
    pub cpu_usage_us: u32,
    pub net_usage_words: u32,
}

/// What happened to one action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// Rejected by the blacklist or whitelist. Nothing was emitted.
    Filtered,
    /// Carried an exception marker or no receipt; logged, not forwarded.
    Excluded,
    Resolved(ResolvedAction),
}

/// Why a payload could not be decoded.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("no ABI for {account} at block {block_num}")]
    NoSchema { account: String, block_num: u32 },

    #[error("ABI for {account} at block {abi_block} is unusable: {message}")]
    BadSchema {
        account: String,
        abi_block: u32,
        message: String,
    },

    #[error(transparent)]
    Decode(#[from] AbiError),
}

pub struct ActionResolver {
    chain: String,
    policy: PolicyFilter,
}

impl ActionResolver {
    pub fn new(chain: impl Into<String>, policy: PolicyFilter) -> Self {
        Self {
            chain: chain.into(),
            policy,
        }
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    pub fn policy(&self) -> &PolicyFilter {
        &self.policy
    }

    /// Decode `act` against the ABI effective at `block_num`.
    pub fn decode_payload<S: AbiStore>(
        &self,
        act: &RawAction,
        block_num: u32,
        cache: &AbiVersionCache<S>,
    ) -> Result<Value, PayloadError> {
        let version = cache
            .resolve(&act.account, block_num)
            .ok_or_else(|| PayloadError::NoSchema {
                account: act.account.clone(),
                block_num,
            })?;
        let abi = version.schema().map_err(|e| PayloadError::BadSchema {
            account: act.account.clone(),
            abi_block: version.block_num(),
            message: e.to_string(),
        })?;
        Ok(abi.decode_action(&act.name, &act.data)?)
    }

    pub async fn resolve<S, N>(
        &self,
        trace: &ActionTrace,
        ctx: &TraceContext<'_>,
        cache: &AbiVersionCache<S>,
        sink: &N,
    ) -> ActionOutcome
    where
        S: AbiStore,
        N: NotificationSink + ?Sized,
    {
        let act = &trace.act;
        if !self.policy.accepts(&self.chain, &act.account, &act.name) {
            return ActionOutcome::Filtered;
        }

        let mut extras = serde_json::Map::new();
        let data = match self.decode_payload(act, ctx.block_num, cache) {
            Ok(value) => {
                let json = value.to_json();
                extras::attach(&act.account, &act.name, &json, &mut extras);
                sink.notify(HistEvent::DecodeOk).await;
                ActionData::Decoded(json)
            }
            Err(e) => {
                debug!(
                    block = ctx.block_num,
                    account = %act.account,
                    action = %act.name,
                    error = %e,
                    "Action payload kept as hex"
                );
                sink.notify(HistEvent::DecodeError {
                    data: DecodeErrorReport {
                        kind: "action_ds_error".into(),
                        block: ctx.block_num,
                        account: act.account.clone(),
                        action: act.name.clone(),
                        gs: trace.global_sequence(),
                        message: e.to_string(),
                    },
                })
                .await;
                ActionData::Hex(hex::encode(&act.data))
            }
        };

        let receipt = match (&trace.except, &trace.receipt) {
            (None, Some(receipt)) => receipt.clone(),
            // Exception-marked actions are dropped on purpose, matching the
            // existing indexer. Receipt-less ones have nothing to index.
            (except, receipt) => {
                warn!(
                    block = ctx.block_num,
                    trx_id = %ctx.trx_id,
                    account = %act.account,
                    action = %act.name,
                    except = except.as_deref().unwrap_or(""),
                    has_receipt = receipt.is_some(),
                    "Action excluded"
                );
                return ActionOutcome::Excluded;
            }
        };

        let root = trace.is_root();
        ActionOutcome::Resolved(ResolvedAction {
            timestamp: ctx.timestamp.map(str::to_string),
            block_num: ctx.block_num,
            producer: ctx.producer.map(str::to_string),
            trx_id: ctx.trx_id.to_string(),
            action_ordinal: trace.action_ordinal,
            creator_action_ordinal: trace.creator_action_ordinal,
            receiver: trace.receiver.clone(),
            act: ResolvedAct {
                account: act.account.clone(),
                name: act.name.clone(),
                authorization: act.authorization.clone(),
                data,
            },
            global_sequence: receipt.global_sequence,
            receipt,
            context_free: trace.context_free,
            elapsed: trace.elapsed,
            console: (!trace.console.is_empty()).then(|| trace.console.clone()),
            account_ram_deltas: (!trace.account_ram_deltas.is_empty())
                .then(|| trace.account_ram_deltas.clone()),
            cpu_usage_us: root.then_some(ctx.cpu_usage_us),
            net_usage_words: root.then_some(ctx.net_usage_words),
            extras,
        })
    }
}
