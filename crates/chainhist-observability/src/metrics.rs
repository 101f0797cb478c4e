//! ChainHist metrics definitions.
//!
//! All metrics use OpenTelemetry conventions and can be exported through any
//! configured meter provider.

use async_trait::async_trait;
use opentelemetry::{
    metrics::{Counter, Histogram, Meter},
    KeyValue,
};
use std::time::Duration;

use chainhist_core::{HistEvent, NotificationSink};

/// Central metrics handle for ChainHist.
#[derive(Clone)]
pub struct ChainHistMetrics {
    pub decode_ok: Counter<u64>,
    pub decode_errors: Counter<u64>,
    pub blocks_consumed: Counter<u64>,
    pub block_latency_ms: Histogram<f64>,
}

impl ChainHistMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            decode_ok: meter
                .u64_counter("chainhist.decode_ok")
                .with_description("Action payloads decoded against their contract ABI")
                .init(),
            decode_errors: meter
                .u64_counter("chainhist.decode_errors")
                .with_description("Action payloads forwarded as hex after a decode failure")
                .init(),
            blocks_consumed: meter
                .u64_counter("chainhist.blocks_consumed")
                .with_description("Queue messages that yielded a processed block")
                .init(),
            block_latency_ms: meter
                .f64_histogram("chainhist.block_latency_ms")
                .with_description("Time to process one block in milliseconds")
                .init(),
        }
    }

    pub fn record_decoded(&self, chain: &str) {
        self.decode_ok
            .add(1, &[KeyValue::new("chain", chain.to_string())]);
    }

    pub fn record_error(&self, chain: &str, error_type: &str) {
        self.decode_errors.add(
            1,
            &[
                KeyValue::new("chain", chain.to_string()),
                KeyValue::new("error_type", error_type.to_string()),
            ],
        );
    }

    pub fn record_block(&self, chain: &str, live: bool) {
        self.blocks_consumed.add(
            1,
            &[
                KeyValue::new("chain", chain.to_string()),
                KeyValue::new("live", live),
            ],
        );
    }

    pub fn record_latency(&self, elapsed: Duration, chain: &str) {
        self.block_latency_ms.record(
            elapsed.as_secs_f64() * 1000.0,
            &[KeyValue::new("chain", chain.to_string())],
        );
    }
}

/// Counts every notification, then forwards it to the wrapped sink.
pub struct MetricsSink<S> {
    inner: S,
    metrics: ChainHistMetrics,
    chain: String,
}

impl<S: NotificationSink> MetricsSink<S> {
    pub fn new(inner: S, metrics: ChainHistMetrics, chain: impl Into<String>) -> Self {
        Self {
            inner,
            metrics,
            chain: chain.into(),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn metrics(&self) -> &ChainHistMetrics {
        &self.metrics
    }
}

#[async_trait]
impl<S: NotificationSink> NotificationSink for MetricsSink<S> {
    async fn notify(&self, event: HistEvent) {
        match &event {
            HistEvent::DecodeOk => self.metrics.record_decoded(&self.chain),
            HistEvent::DecodeError { data } => self.metrics.record_error(&self.chain, &data.kind),
            HistEvent::ConsumedBlock { live, .. } => self.metrics.record_block(&self.chain, *live),
        }
        self.inner.notify(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainhist_core::{DecodeErrorReport, RecordingSink};
    use opentelemetry::metrics::MeterProvider;
    use opentelemetry_sdk::metrics::SdkMeterProvider;
    use std::sync::Arc;

    fn metrics() -> ChainHistMetrics {
        let provider = SdkMeterProvider::default();
        ChainHistMetrics::new(&provider.meter("chainhist-test"))
    }

    #[tokio::test]
    async fn sink_forwards_every_event() {
        let recorder = Arc::new(RecordingSink::new());
        let sink = MetricsSink::new(recorder.clone(), metrics(), "eos");

        sink.notify(HistEvent::DecodeOk).await;
        sink.notify(HistEvent::DecodeError {
            data: DecodeErrorReport {
                kind: "action_ds_error".into(),
                block: 1,
                account: "a".into(),
                action: "b".into(),
                gs: 0,
                message: "no ABI".into(),
            },
        })
        .await;
        sink.notify(HistEvent::ConsumedBlock {
            block_num: 1,
            live: false,
            producer: None,
        })
        .await;

        assert_eq!(recorder.events().len(), 3);
        assert_eq!(recorder.count("decode_error"), 1);
    }

    #[test]
    fn latency_recording_accepts_sub_millisecond() {
        metrics().record_latency(Duration::from_micros(250), "eos");
    }
}
