//! # Introspection SDK
//!
//! Normalizes LLM tracing data to the
//! [OpenTelemetry GenAI semantic conventions](https://opentelemetry.io/docs/specs/semconv/gen-ai/)
//! and ships it to the Introspection API over OTLP/HTTP.
//!
//! - [`IntrospectionSpanProcessor`]: an `opentelemetry_sdk` span processor that
//!   rewrites OpenInference spans into `gen_ai.*` attributes and exports every
//!   sampled span
//! - [`AgentTraceBridge`]: turns OpenAI Agents trace callbacks into spans
//! - [`IntrospectionClient`]: product events, feedback and identity as OTLP logs
//!
//! ## Quick Start
//!
//! ```no_run
//! use introspection_sdk::{AdvancedOptions, IntrospectionSpanProcessor};
//! use opentelemetry_sdk::trace::SdkTracerProvider;
//!
//! // token from INTROSPECTION_TOKEN
//! let processor = IntrospectionSpanProcessor::new(None, AdvancedOptions::default())?;
//! let provider = SdkTracerProvider::builder()
//!     .with_span_processor(processor)
//!     .build();
//!
//! // ... instrumented work ...
//!
//! provider.force_flush().ok();
//! provider.shutdown().ok();
//! # Ok::<(), introspection_sdk::ConfigError>(())
//! ```
//!
//! Diagnostics go through `tracing`; call [`init_logging`] to print them.

pub mod client;
pub mod convert;
pub mod core;
pub mod export;
pub mod schema;
pub mod testing;
pub mod trace;
pub mod utils;

pub use crate::client::{ClientOptions, Feedback, IntrospectionClient, Properties};
pub use crate::convert::{convert_openinference, convert_responses_inputs, convert_responses_outputs};
pub use crate::core::{AdvancedOptions, ConfigError, init_logging};
pub use crate::export::{log_exporter, span_exporter};
pub use crate::schema::{GenAiAttributes, Message, Part, Role, ToolDefinition};
pub use crate::trace::{
    AgentSpan, AgentTraceBridge, IntrospectionSpanProcessor, SpanPayload, SpanView, Trace,
};
