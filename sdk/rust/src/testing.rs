//! Deterministic test doubles
//!
//! Sequential ids and a one-second-per-call clock make traces reproducible;
//! the in-memory exporters and counting processor record what the pipeline
//! hands them.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use opentelemetry::logs::AnyValue;
use opentelemetry::trace::{SpanId, TraceId};
use opentelemetry::{Context, InstrumentationScope, Key, Value};
use opentelemetry_sdk::error::{OTelSdkError, OTelSdkResult};
use opentelemetry_sdk::logs::{LogBatch, LogExporter, SdkLogRecord};
use opentelemetry_sdk::trace::{IdGenerator, Span, SpanData, SpanExporter, SpanProcessor};
use parking_lot::Mutex;

use crate::trace::TimestampGenerator;

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Trace and span ids from independent counters starting at 1
#[derive(Debug, Default)]
pub struct IncrementalIdGenerator {
    trace_ids: AtomicU64,
    span_ids: AtomicU64,
}

impl IncrementalIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for IncrementalIdGenerator {
    fn new_trace_id(&self) -> TraceId {
        let next = self.trace_ids.fetch_add(1, Ordering::SeqCst) + 1;
        TraceId::from_bytes(u128::from(next).to_be_bytes())
    }

    fn new_span_id(&self) -> SpanId {
        let next = self.span_ids.fetch_add(1, Ordering::SeqCst) + 1;
        SpanId::from_bytes(next.to_be_bytes())
    }
}

/// Clock that advances one second per call; the first call returns 1s
#[derive(Debug, Default)]
pub struct TimeGenerator {
    calls: AtomicU64,
}

impl TimeGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimestampGenerator for TimeGenerator {
    fn now(&self) -> u64 {
        (self.calls.fetch_add(1, Ordering::SeqCst) + 1) * NANOS_PER_SECOND
    }
}

/// Attribute of a finished span by key
pub fn span_attribute<'a>(span: &'a SpanData, key: &str) -> Option<&'a Value> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| &kv.value)
}

// ============================================================================
// SPAN EXPORTER
// ============================================================================

/// Keeps every exported span. Clones share storage, so a test can hand one
/// clone to a processor and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct InMemorySpanExporter {
    spans: Arc<Mutex<Vec<SpanData>>>,
    export_calls: Arc<AtomicUsize>,
    is_shutdown: Arc<AtomicBool>,
    fail: bool,
}

impl InMemorySpanExporter {
    /// An exporter whose every export call fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn finished_spans(&self) -> Vec<SpanData> {
        self.spans.lock().clone()
    }

    pub fn export_count(&self) -> usize {
        self.export_calls.load(Ordering::SeqCst)
    }

    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.spans.lock().clear();
        self.export_calls.store(0, Ordering::SeqCst);
    }
}

impl SpanExporter for InMemorySpanExporter {
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, OTelSdkResult> {
        self.export_calls.fetch_add(1, Ordering::SeqCst);
        let result = if self.fail {
            Err(OTelSdkError::InternalFailure(
                "in-memory exporter set to fail".to_string(),
            ))
        } else {
            self.spans.lock().extend(batch);
            Ok(())
        };
        Box::pin(futures::future::ready(result))
    }

    fn shutdown(&mut self) -> OTelSdkResult {
        self.is_shutdown.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// LOG EXPORTER
// ============================================================================

/// One exported log record with its instrumentation scope
#[derive(Debug, Clone)]
pub struct ExportedLog {
    pub record: SdkLogRecord,
    pub scope: InstrumentationScope,
}

impl ExportedLog {
    pub fn attribute(&self, key: &str) -> Option<&AnyValue> {
        self.record
            .attributes_iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, value)| value)
    }

    /// String attribute; `None` when absent or not a string
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        match self.attribute(key) {
            Some(AnyValue::String(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attribute(key).is_some()
    }

    pub fn attribute_keys(&self) -> Vec<&Key> {
        self.record.attributes_iter().map(|(k, _)| k).collect()
    }
}

/// Keeps every exported log record, batch by batch. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLogExporter {
    batches: Arc<Mutex<Vec<Vec<ExportedLog>>>>,
    is_shutdown: Arc<AtomicBool>,
}

impl InMemoryLogExporter {
    pub fn batches(&self) -> Vec<Vec<ExportedLog>> {
        self.batches.lock().clone()
    }

    /// All exported records, flattened in export order
    pub fn logs(&self) -> Vec<ExportedLog> {
        self.batches.lock().iter().flatten().cloned().collect()
    }

    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown.load(Ordering::SeqCst)
    }
}

impl LogExporter for InMemoryLogExporter {
    fn export(&self, batch: LogBatch<'_>) -> impl Future<Output = OTelSdkResult> + Send {
        let logs: Vec<ExportedLog> = batch
            .iter()
            .map(|(record, scope)| ExportedLog {
                record: record.clone(),
                scope: scope.clone(),
            })
            .collect();
        self.batches.lock().push(logs);
        futures::future::ready(Ok(()))
    }

    fn shutdown(&mut self) -> OTelSdkResult {
        self.is_shutdown.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// PROCESSOR
// ============================================================================

#[derive(Debug, Default)]
struct Counts {
    starts: AtomicUsize,
    flushes: AtomicUsize,
    shutdowns: AtomicUsize,
    ended: Mutex<Vec<SpanData>>,
}

/// Span processor that counts calls and keeps ended spans. Clones share
/// counters.
#[derive(Debug, Clone)]
pub struct CountingProcessor {
    counts: Arc<Counts>,
    fail_shutdown: bool,
    flush_result: bool,
    flush_delay: Duration,
}

impl Default for CountingProcessor {
    fn default() -> Self {
        Self {
            counts: Arc::new(Counts::default()),
            fail_shutdown: false,
            flush_result: true,
            flush_delay: Duration::ZERO,
        }
    }
}

impl CountingProcessor {
    /// A processor whose shutdown always fails
    pub fn failing_shutdown() -> Self {
        Self {
            fail_shutdown: true,
            ..Self::default()
        }
    }

    /// A processor whose flush reports `result`
    pub fn with_flush_result(result: bool) -> Self {
        Self {
            flush_result: result,
            ..Self::default()
        }
    }

    /// A processor that blocks for `delay` inside every flush
    pub fn with_flush_delay(delay: Duration) -> Self {
        Self {
            flush_delay: delay,
            ..Self::default()
        }
    }

    pub fn start_count(&self) -> usize {
        self.counts.starts.load(Ordering::SeqCst)
    }

    pub fn end_count(&self) -> usize {
        self.counts.ended.lock().len()
    }

    pub fn flush_count(&self) -> usize {
        self.counts.flushes.load(Ordering::SeqCst)
    }

    pub fn shutdown_count(&self) -> usize {
        self.counts.shutdowns.load(Ordering::SeqCst)
    }

    pub fn ended(&self) -> Vec<SpanData> {
        self.counts.ended.lock().clone()
    }
}

impl SpanProcessor for CountingProcessor {
    fn on_start(&self, _span: &mut Span, _cx: &Context) {
        self.counts.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_end(&self, span: SpanData) {
        self.counts.ended.lock().push(span);
    }

    fn force_flush(&self) -> OTelSdkResult {
        self.counts.flushes.fetch_add(1, Ordering::SeqCst);
        if !self.flush_delay.is_zero() {
            std::thread::sleep(self.flush_delay);
        }
        if self.flush_result {
            Ok(())
        } else {
            Err(OTelSdkError::InternalFailure("flush failed".to_string()))
        }
    }

    fn shutdown(&self) -> OTelSdkResult {
        self.counts.shutdowns.fetch_add(1, Ordering::SeqCst);
        if self.fail_shutdown {
            return Err(OTelSdkError::InternalFailure("shutdown failed".to_string()));
        }
        Ok(())
    }
}
