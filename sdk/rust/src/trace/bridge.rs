//! Agent trace bridge
//!
//! Maps the OpenAI Agents tracing callbacks (`on_trace_start/end`,
//! `on_span_start/end`) onto spans of a dedicated `SdkTracerProvider`. Trace
//! ids and span ids share one lookup table, so a span whose `parent_id` is
//! missing is parented to its trace. Start and end times come from the
//! configured [`TimestampGenerator`].
//!
//! Attributes are written when a span ends, from the typed payload:
//!
//! | kind         | attributes                                                      |
//! |--------------|-----------------------------------------------------------------|
//! | `agent`      | agent name, tool names, handoffs, output type                   |
//! | `function`   | tool name, input, output                                        |
//! | `response`   | instructions, tool definitions, usage, model, id, messages      |
//! | `generation` | model, usage, raw input/output message lists                    |
//! | `handoff`    | source and target agent                                         |
//!
//! Every span additionally carries its raw payload as `openai_agents.span_data`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use opentelemetry::trace::{
    Span as _, SpanContext, TraceContextExt, Tracer as _, TracerProvider as _,
};
use opentelemetry::{Context, InstrumentationScope, Key, KeyValue, Value};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider, Span, SpanExporter};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue, json};

use super::clock::{TimestampGenerator, to_system_time};
use crate::convert::{convert_responses_inputs, convert_responses_outputs};
use crate::core::config::{AdvancedOptions, SharedIdGenerator, process_env};
use crate::core::constants::{AGENT_TRACER_NAME, ENV_SERVICE_NAME, SDK_NAME, SDK_VERSION};
use crate::core::error::ConfigError;
use crate::export::{platform_span_processor, span_exporter};
use crate::schema::{GenAiAttributes, Part, ToolDefinition, keys};
use crate::utils::deadline::run_until;
use crate::utils::json::{json_to_value, to_json_string};

// ============================================================================
// PAYLOADS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub trace_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentSpan {
    pub trace_id: String,
    pub span_id: String,
    pub parent_id: Option<String>,
    pub span_data: SpanPayload,
}

/// Per-kind span payload
#[derive(Debug, Clone, PartialEq)]
pub enum SpanPayload {
    Agent(AgentSpanData),
    Function(FunctionSpanData),
    Response(ResponseSpanData),
    Generation(GenerationSpanData),
    Handoff(HandoffSpanData),
    /// Any kind the bridge has no extractor for
    Custom { kind: String, data: JsonValue },
}

impl SpanPayload {
    pub fn kind(&self) -> &str {
        match self {
            SpanPayload::Agent(_) => "agent",
            SpanPayload::Function(_) => "function",
            SpanPayload::Response(_) => "response",
            SpanPayload::Generation(_) => "generation",
            SpanPayload::Handoff(_) => "handoff",
            SpanPayload::Custom { kind, .. } => kind.as_str(),
        }
    }

    /// JSON form of the payload, always with a `type` field
    pub fn export(&self) -> JsonValue {
        match self {
            SpanPayload::Agent(data) => json!({
                "type": self.kind(),
                "name": data.name,
                "handoffs": data.handoffs,
                "tools": data.tools,
                "output_type": data.output_type,
            }),
            SpanPayload::Function(data) => json!({
                "type": self.kind(),
                "name": data.name,
                "input": data.input,
                "output": data.output.as_ref().filter(|o| is_truthy(o)).map(stringify),
                "mcp_data": data.mcp_data,
            }),
            SpanPayload::Response(data) => json!({
                "type": self.kind(),
                "response_id": data.response.as_ref().and_then(|r| r.id.clone()),
            }),
            SpanPayload::Generation(data) => json!({
                "type": self.kind(),
                "input": data.input,
                "output": data.output,
                "model": data.model,
                "model_config": data.model_config,
                "usage": data.usage,
            }),
            SpanPayload::Handoff(data) => json!({
                "type": self.kind(),
                "from_agent": data.from_agent,
                "to_agent": data.to_agent,
            }),
            SpanPayload::Custom { kind, data } => json!({
                "type": kind,
                "data": data,
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentSpanData {
    pub name: String,
    #[serde(default)]
    pub handoffs: Option<Vec<String>>,
    /// Tool names
    #[serde(default)]
    pub tools: Option<Vec<String>>,
    #[serde(default)]
    pub output_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpanData {
    pub name: String,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub output: Option<JsonValue>,
    #[serde(default)]
    pub mcp_data: Option<JsonValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseSpanData {
    #[serde(default)]
    pub response: Option<Response>,
    /// Responses API input items
    #[serde(default)]
    pub input: Option<Vec<JsonValue>>,
}

/// The parts of an OpenAI `Response` the bridge reads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub tools: Vec<ResponseTool>,
    #[serde(default)]
    pub usage: Option<ResponseUsage>,
    /// Responses API output items
    #[serde(default)]
    pub output: Vec<JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseTool {
    #[serde(rename = "type")]
    pub tool_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Option<JsonValue>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseUsage {
    #[serde(default)]
    pub input_tokens: i64,
    #[serde(default)]
    pub output_tokens: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationSpanData {
    #[serde(default)]
    pub input: Option<Vec<JsonValue>>,
    #[serde(default)]
    pub output: Option<Vec<JsonValue>>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub model_config: Option<JsonValue>,
    #[serde(default)]
    pub usage: Option<JsonMap<String, JsonValue>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandoffSpanData {
    #[serde(default)]
    pub from_agent: Option<String>,
    #[serde(default)]
    pub to_agent: Option<String>,
}

// ============================================================================
// BRIDGE
// ============================================================================

#[derive(Debug)]
pub struct AgentTraceBridge {
    provider: SdkTracerProvider,
    tracer: SdkTracer,
    clock: Arc<dyn TimestampGenerator>,
    /// Open spans keyed by trace id or span id
    spans: Mutex<HashMap<String, Span>>,
}

impl AgentTraceBridge {
    /// Export to the Introspection API over OTLP/HTTP.
    pub fn new(token: Option<&str>, advanced: AdvancedOptions) -> Result<Self, ConfigError> {
        let exporter = span_exporter(token, &advanced, process_env)?;
        tracing::debug!("AgentTraceBridge initialized");
        Ok(Self::with_exporter(exporter, advanced))
    }

    /// Export through a custom exporter; no token is needed. Ids and
    /// timestamps come from `advanced`.
    pub fn with_exporter<E>(exporter: E, advanced: AdvancedOptions) -> Self
    where
        E: SpanExporter + 'static,
    {
        let provider = SdkTracerProvider::builder()
            .with_span_processor(platform_span_processor(exporter))
            .with_id_generator(SharedIdGenerator(advanced.id_generator.clone()))
            .with_resource(span_resource(process_env))
            .build();
        Self::with_provider(provider, advanced.timestamp_generator)
    }

    /// Bridge onto an existing provider. `clock` stamps every start and end.
    pub fn with_provider(
        provider: SdkTracerProvider,
        clock: Arc<dyn TimestampGenerator>,
    ) -> Self {
        let scope = InstrumentationScope::builder(AGENT_TRACER_NAME)
            .with_version(SDK_VERSION)
            .build();
        let tracer = provider.tracer_with_scope(scope);
        Self {
            provider,
            tracer,
            clock,
            spans: Mutex::new(HashMap::new()),
        }
    }

    pub fn on_trace_start(&self, trace: &Trace) {
        let span = self.start_span(trace.name.clone(), None);
        self.track(trace.trace_id.clone(), span);
    }

    pub fn on_trace_end(&self, trace: &Trace) {
        let span = self.spans.lock().remove(&trace.trace_id);
        if let Some(mut span) = span {
            span.end_with_timestamp(to_system_time(self.clock.now()));
        }
    }

    pub fn on_span_start(&self, span: &AgentSpan) {
        let parent_key = span
            .parent_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(span.trace_id.as_str());
        let parent = self
            .spans
            .lock()
            .get(parent_key)
            .map(|parent| parent.span_context().clone());
        if parent.is_none() {
            tracing::debug!(parent = parent_key, "Parent not tracked, starting a root span");
        }

        let name = match &span.span_data {
            SpanPayload::Agent(data) => data.name.clone(),
            SpanPayload::Function(data) => data.name.clone(),
            other => other.kind().to_string(),
        };
        let otel_span = self.start_span(name, parent);
        self.track(span.span_id.clone(), otel_span);
    }

    pub fn on_span_end(&self, span: &AgentSpan) {
        let otel_span = self.spans.lock().remove(&span.span_id);
        let Some(mut otel_span) = otel_span else {
            return;
        };

        match &span.span_data {
            SpanPayload::Agent(data) => record_agent(&mut otel_span, data),
            SpanPayload::Function(data) => record_function(&mut otel_span, data),
            SpanPayload::Response(data) => record_response(&mut otel_span, data),
            SpanPayload::Generation(data) => record_generation(&mut otel_span, data),
            SpanPayload::Handoff(data) => record_handoff(&mut otel_span, data),
            SpanPayload::Custom { kind, .. } => {
                tracing::debug!(kind = %kind, "No attribute extractor for span kind");
            }
        }

        put(
            &mut otel_span,
            keys::AGENT_SPAN_DATA,
            span.span_data.export().to_string(),
        );
        otel_span.end_with_timestamp(to_system_time(self.clock.now()));
    }

    /// Spans started but not yet ended
    pub fn open_span_count(&self) -> usize {
        self.spans.lock().len()
    }

    /// `true` if every pending span was exported within `timeout`
    pub fn force_flush(&self, timeout: Duration) -> bool {
        let provider = self.provider.clone();
        match run_until(Instant::now() + timeout, move || provider.force_flush()) {
            Some(Ok(())) => true,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Agent span flush failed");
                false
            }
            None => {
                tracing::warn!(?timeout, "Agent span flush timed out");
                false
            }
        }
    }

    pub fn shutdown(&self) -> OTelSdkResult {
        self.provider.shutdown()
    }

    fn start_span(&self, name: String, parent: Option<SpanContext>) -> Span {
        let parent_cx = match parent {
            Some(parent) => Context::new().with_remote_span_context(parent),
            None => Context::new(),
        };
        self.tracer
            .span_builder(name)
            .with_start_time(to_system_time(self.clock.now()))
            .start_with_context(&self.tracer, &parent_cx)
    }

    fn track(&self, id: String, span: Span) {
        let replaced = self.spans.lock().insert(id.clone(), span);
        if replaced.is_some() {
            // dropping the replaced span ends it
            tracing::warn!(id = %id, "Duplicate trace or span id, ending previous span");
        }
    }
}

/// `service.name` from `INTROSPECTION_SERVICE_NAME`, else the SDK name
fn span_resource(env: impl Fn(&str) -> Option<String>) -> Resource {
    let service_name = env(ENV_SERVICE_NAME)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| SDK_NAME.to_string());
    Resource::builder().with_service_name(service_name).build()
}

// ============================================================================
// EXTRACTORS
// ============================================================================

fn record_agent(span: &mut Span, data: &AgentSpanData) {
    put(span, keys::AGENT_NAME, data.name.clone());

    if let Some(tools) = data.tools.as_ref().filter(|t| !t.is_empty()) {
        set_json(span, keys::TOOL_DEFINITIONS, tools);
    }
    if let Some(handoffs) = data.handoffs.as_ref().filter(|h| !h.is_empty()) {
        set_json(span, keys::AGENT_HANDOFFS, handoffs);
    }
    if let Some(output_type) = non_empty(&data.output_type) {
        put(span, keys::AGENT_OUTPUT_TYPE, output_type.to_string());
    }
}

fn record_function(span: &mut Span, data: &FunctionSpanData) {
    put(span, keys::TOOL_NAME, data.name.clone());

    if let Some(input) = non_empty(&data.input) {
        put(span, keys::TOOL_INPUT, input.to_string());
    }
    if let Some(output) = data.output.as_ref().filter(|o| is_truthy(o)) {
        put(span, keys::TOOL_OUTPUT, stringify(output));
    }
}

fn record_response(span: &mut Span, data: &ResponseSpanData) {
    let Some(response) = &data.response else {
        return;
    };

    let usage = response.usage.unwrap_or_default();
    let input_messages = data
        .input
        .as_deref()
        .map(|input| convert_responses_inputs(Some(input), None).0)
        .filter(|messages| !messages.is_empty());
    let output_messages = Some(convert_responses_outputs(&response.output))
        .filter(|messages| !messages.is_empty());

    let converted = GenAiAttributes {
        request_model: non_empty(&response.model).map(str::to_string),
        tool_definitions: Some(response.tools.iter().map(tool_definition).collect())
            .filter(|tools: &Vec<ToolDefinition>| !tools.is_empty()),
        input_messages,
        output_messages,
        system_instructions: non_empty(&response.instructions).map(|i| vec![Part::text(i)]),
        response_id: non_empty(&response.id).map(str::to_string),
        input_tokens: Some(usage.input_tokens).filter(|t| *t != 0),
        output_tokens: Some(usage.output_tokens).filter(|t| *t != 0),
        ..Default::default()
    };

    for attribute in converted.to_key_values() {
        span.set_attribute(attribute);
    }
}

/// Function tools keep their schema; other tools are named by their type.
/// Neither carries a `type` field.
fn tool_definition(tool: &ResponseTool) -> ToolDefinition {
    if tool.tool_type != "function" {
        return ToolDefinition::named(tool.tool_type.clone());
    }
    ToolDefinition {
        tool_type: None,
        name: tool.name.clone().unwrap_or_default(),
        description: non_empty(&tool.description).map(str::to_string),
        parameters: tool.parameters.clone().filter(is_truthy),
    }
}

fn record_generation(span: &mut Span, data: &GenerationSpanData) {
    if let Some(model) = non_empty(&data.model) {
        put(span, keys::REQUEST_MODEL, model.to_string());
    }

    if let Some(usage) = &data.usage {
        if let Some(tokens) = usage.get("input_tokens") {
            put(span, keys::USAGE_INPUT_TOKENS, json_to_value(tokens));
        }
        if let Some(tokens) = usage.get("output_tokens") {
            put(span, keys::USAGE_OUTPUT_TOKENS, json_to_value(tokens));
        }
    }

    if let Some(input) = data.input.as_ref().filter(|i| !i.is_empty()) {
        set_json(span, keys::INPUT_MESSAGES, input);
    }
    if let Some(output) = data.output.as_ref().filter(|o| !o.is_empty()) {
        set_json(span, keys::OUTPUT_MESSAGES, output);
    }
}

fn record_handoff(span: &mut Span, data: &HandoffSpanData) {
    if let Some(from_agent) = non_empty(&data.from_agent) {
        put(span, keys::HANDOFF_FROM_AGENT, from_agent.to_string());
    }
    if let Some(to_agent) = non_empty(&data.to_agent) {
        put(span, keys::HANDOFF_TO_AGENT, to_agent.to_string());
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn put(span: &mut Span, key: impl Into<Key>, value: impl Into<Value>) {
    span.set_attribute(KeyValue::new(key, value));
}

fn set_json<T: Serialize>(span: &mut Span, key: &'static str, value: &T) {
    if let Some(json) = to_json_string(value) {
        put(span, key, json);
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Strings pass through; anything else is JSON-encoded.
fn stringify(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Null, `false`, zero and empty strings/arrays/objects count as absent.
fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64() != Some(0.0),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(items) => !items.is_empty(),
        JsonValue::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
