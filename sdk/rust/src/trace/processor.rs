//! Span processing pipeline
//!
//! [`IntrospectionSpanProcessor`] plugs into an `SdkTracerProvider`. It gates
//! finished spans on the sampled flag, rewrites OpenInference spans into the
//! GenAI schema through a [`SpanView`], and fans every span out to its
//! downstream processors.
//!
//! ```text
//! on_end(span)
//!   ├── not sampled          → dropped, no downstream call
//!   ├── openinference scope  → SpanView(span, convert_openinference(attrs))
//!   └── otherwise            → span unchanged
//!         ↓
//!   every downstream processor's on_end
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use opentelemetry::Context;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::error::{OTelSdkError, OTelSdkResult};
use opentelemetry_sdk::trace::{Span, SpanData, SpanExporter, SpanProcessor};

use super::view::SpanView;
use crate::convert::{convert_openinference, is_openinference_span};
use crate::core::config::{AdvancedOptions, process_env};
use crate::core::constants::DEFAULT_FLUSH_TIMEOUT_MS;
use crate::core::error::ConfigError;
use crate::export::{platform_span_processor, span_exporter};
use crate::schema::attribute_map;
use crate::utils::deadline::run_until;

#[derive(Debug)]
pub struct IntrospectionSpanProcessor {
    processors: Vec<Arc<dyn SpanProcessor>>,
    is_shutdown: AtomicBool,
}

impl IntrospectionSpanProcessor {
    /// Export to the Introspection API over OTLP/HTTP.
    ///
    /// Fails with [`ConfigError::MissingToken`] when no token is given and
    /// none is set in `INTROSPECTION_TOKEN`.
    pub fn new(token: Option<&str>, advanced: AdvancedOptions) -> Result<Self, ConfigError> {
        let exporter = span_exporter(token, &advanced, process_env)?;
        tracing::debug!("IntrospectionSpanProcessor initialized");
        Ok(Self::with_exporter(exporter))
    }

    /// Export through a custom exporter; no token is needed.
    pub fn with_exporter<E: SpanExporter + 'static>(exporter: E) -> Self {
        Self::from_processors(vec![Box::new(platform_span_processor(exporter))])
    }

    /// Forward to the given processors only
    pub fn from_processors(processors: Vec<Box<dyn SpanProcessor>>) -> Self {
        Self {
            processors: processors.into_iter().map(Arc::from).collect(),
            is_shutdown: AtomicBool::new(false),
        }
    }

    /// Add another downstream processor, e.g. for a second backend
    pub fn with_processor<P: SpanProcessor + 'static>(mut self, processor: P) -> Self {
        self.processors.push(Arc::new(processor));
        self
    }

    pub fn processor_count(&self) -> usize {
        self.processors.len()
    }

    /// Flush every downstream processor within one overall `timeout`.
    ///
    /// Each processor gets whatever time is left; once the deadline passes
    /// the remaining processors are skipped and `false` is returned.
    pub fn force_flush_with_timeout(&self, timeout: Duration) -> bool {
        match self.flush_within(timeout) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Span flush incomplete");
                false
            }
        }
    }

    fn flush_within(&self, timeout: Duration) -> OTelSdkResult {
        let deadline = Instant::now() + timeout;
        let mut failed = 0;

        for (index, processor) in self.processors.iter().enumerate() {
            let processor = Arc::clone(processor);
            match run_until(deadline, move || processor.force_flush()) {
                Some(Ok(())) => {}
                Some(Err(e)) => {
                    tracing::error!(error = %e, index, "Span processor flush failed");
                    failed += 1;
                }
                None => {
                    tracing::warn!(index, ?timeout, "Span flush deadline passed");
                    return Err(OTelSdkError::Timeout(timeout));
                }
            }
        }

        if failed > 0 {
            return Err(OTelSdkError::InternalFailure(format!(
                "{} of {} downstream processors failed to flush",
                failed,
                self.processors.len()
            )));
        }
        Ok(())
    }

    fn convert(span: SpanData) -> SpanData {
        if !is_openinference_span(Some(span.instrumentation_scope.name())) {
            return span;
        }
        let converted = convert_openinference(Some(&attribute_map(&span.attributes)));
        tracing::trace!(span = %span.name, "Converted OpenInference span");
        SpanView::new(span, &converted).into_span_data()
    }
}

impl SpanProcessor for IntrospectionSpanProcessor {
    fn on_start(&self, span: &mut Span, cx: &Context) {
        for processor in &self.processors {
            processor.on_start(span, cx);
        }
    }

    fn on_end(&self, span: SpanData) {
        if !span.span_context.is_sampled() {
            return;
        }
        let span = Self::convert(span);
        for processor in &self.processors {
            processor.on_end(span.clone());
        }
    }

    fn force_flush(&self) -> OTelSdkResult {
        self.flush_within(Duration::from_millis(DEFAULT_FLUSH_TIMEOUT_MS))
    }

    /// Shut down every processor even if some fail; failures are logged and counted.
    fn shutdown(&self) -> OTelSdkResult {
        if self.is_shutdown.swap(true, Ordering::SeqCst) {
            return Err(OTelSdkError::AlreadyShutdown);
        }

        let mut failed = 0;
        for (index, processor) in self.processors.iter().enumerate() {
            if let Err(e) = processor.shutdown() {
                tracing::error!(error = %e, index, "Span processor shutdown failed");
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(OTelSdkError::InternalFailure(format!(
                "{} of {} downstream processors failed to shut down",
                failed,
                self.processors.len()
            )));
        }
        Ok(())
    }

    fn set_resource(&mut self, resource: &Resource) {
        for processor in &mut self.processors {
            match Arc::get_mut(processor) {
                Some(processor) => processor.set_resource(resource),
                None => tracing::debug!("Span processor is shared, resource not forwarded"),
            }
        }
    }
}

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;
