//! Export boundary
//!
//! - [`platform_span_processor`], [`with_platform_log_exporter`]: batching on
//!   threaded targets, synchronous export on wasm
//! - [`otlp`]: OTLP/HTTP protobuf exporters for spans and events

pub mod otlp;

use std::time::Duration;

use opentelemetry_sdk::logs::{LogExporter, LoggerProviderBuilder};
#[cfg(not(target_arch = "wasm32"))]
use opentelemetry_sdk::logs::BatchLogProcessor;
use opentelemetry_sdk::trace::SpanExporter;
#[cfg(not(target_arch = "wasm32"))]
use opentelemetry_sdk::trace::{BatchConfig, BatchConfigBuilder, BatchSpanProcessor};
#[cfg(target_arch = "wasm32")]
use opentelemetry_sdk::trace::SimpleSpanProcessor;

pub use self::otlp::{log_exporter, span_exporter};

#[cfg(not(target_arch = "wasm32"))]
use crate::core::constants::{
    DEFAULT_MAX_EXPORT_BATCH_SIZE, DEFAULT_MAX_QUEUE_SIZE, DEFAULT_SCHEDULE_DELAY_MS,
};

/// Batching processor on threaded targets, synchronous export on wasm
#[cfg(not(target_arch = "wasm32"))]
pub type PlatformSpanProcessor = BatchSpanProcessor;

#[cfg(target_arch = "wasm32")]
pub type PlatformSpanProcessor = SimpleSpanProcessor;

/// Queue and batch limits for span export
#[cfg(not(target_arch = "wasm32"))]
pub fn span_batch_config() -> BatchConfig {
    BatchConfigBuilder::default()
        .with_max_queue_size(DEFAULT_MAX_QUEUE_SIZE)
        .with_max_export_batch_size(DEFAULT_MAX_EXPORT_BATCH_SIZE)
        .with_scheduled_delay(Duration::from_millis(DEFAULT_SCHEDULE_DELAY_MS))
        .build()
}

/// Wrap `exporter` in the processor suited to the target
pub fn platform_span_processor<E: SpanExporter + 'static>(exporter: E) -> PlatformSpanProcessor {
    #[cfg(not(target_arch = "wasm32"))]
    {
        BatchSpanProcessor::builder(exporter)
            .with_batch_config(span_batch_config())
            .build()
    }
    #[cfg(target_arch = "wasm32")]
    {
        SimpleSpanProcessor::new(Box::new(exporter))
    }
}

/// Register `exporter` on a logger provider: batched with the given limits on
/// threaded targets, exported on emit on wasm.
pub fn with_platform_log_exporter<E: LogExporter + 'static>(
    builder: LoggerProviderBuilder,
    exporter: E,
    max_batch_size: usize,
    flush_interval_ms: u64,
) -> LoggerProviderBuilder {
    #[cfg(not(target_arch = "wasm32"))]
    {
        let config = opentelemetry_sdk::logs::BatchConfigBuilder::default()
            .with_max_queue_size(DEFAULT_MAX_QUEUE_SIZE)
            .with_max_export_batch_size(max_batch_size.max(1))
            .with_scheduled_delay(schedule_delay(flush_interval_ms))
            .build();
        builder.with_log_processor(
            BatchLogProcessor::builder(exporter)
                .with_batch_config(config)
                .build(),
        )
    }
    #[cfg(target_arch = "wasm32")]
    {
        let _ = (max_batch_size, flush_interval_ms);
        builder.with_simple_exporter(exporter)
    }
}

/// Clamp to at least 1 ms so a zero interval can't spin the export worker
pub(crate) fn schedule_delay(interval_ms: u64) -> Duration {
    Duration::from_millis(interval_ms.max(1))
}
