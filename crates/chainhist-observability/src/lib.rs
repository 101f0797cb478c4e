//! # chainhist-observability
//!
//! OpenTelemetry-based observability for ChainHist.
//!
//! ## Built-in metrics
//! - `chainhist.decode_ok`        counter, tagged with chain
//! - `chainhist.decode_errors`    counter, tagged with chain + error_type
//! - `chainhist.blocks_consumed`  counter, tagged with chain + live
//! - `chainhist.block_latency_ms` histogram, tagged with chain
//!
//! [`MetricsSink`] wraps any notification sink and counts events on the way
//! through.
//!
//! ## Structured logging
//! Text or JSON logs with per-component levels, see [`init_tracing`].

pub mod metrics;
pub mod tracing_setup;

pub use metrics::{ChainHistMetrics, MetricsSink};
pub use tracing_setup::{init_tracing, try_init_tracing, LogConfig};
