use std::time::{SystemTime, UNIX_EPOCH};

use opentelemetry::trace::{SpanId, TraceId};
use opentelemetry_sdk::trace::SpanData;
use serde_json::json;

use super::*;
use crate::schema::attribute_map;
use crate::testing::{
    CountingProcessor, InMemorySpanExporter, IncrementalIdGenerator, TimeGenerator, span_attribute,
};

fn bridge() -> (AgentTraceBridge, CountingProcessor) {
    let counter = CountingProcessor::default();
    let provider = SdkTracerProvider::builder()
        .with_span_processor(counter.clone())
        .with_id_generator(IncrementalIdGenerator::new())
        .build();
    let bridge = AgentTraceBridge::with_provider(provider, Arc::new(TimeGenerator::new()));
    (bridge, counter)
}

fn trace(id: &str, name: &str) -> Trace {
    Trace {
        trace_id: id.to_string(),
        name: name.to_string(),
    }
}

fn agent_span(
    span_id: &str,
    trace_id: &str,
    parent_id: Option<&str>,
    data: SpanPayload,
) -> AgentSpan {
    AgentSpan {
        trace_id: trace_id.to_string(),
        span_id: span_id.to_string(),
        parent_id: parent_id.map(str::to_string),
        span_data: data,
    }
}

/// Run trace start, span start, span end, trace end and return `(inner, outer)`.
fn run_single(span: AgentSpan) -> (SpanData, SpanData) {
    let (bridge, counter) = bridge();
    let outer = trace(&span.trace_id, "test-trace");

    bridge.on_trace_start(&outer);
    bridge.on_span_start(&span);
    bridge.on_span_end(&span);
    bridge.on_trace_end(&outer);

    let ended = counter.ended();
    assert_eq!(ended.len(), 2);
    assert_eq!(bridge.open_span_count(), 0);
    (ended[0].clone(), ended[1].clone())
}

fn json_attr(span: &SpanData, key: &str) -> serde_json::Value {
    match span_attribute(span, key) {
        Some(Value::String(raw)) => serde_json::from_str(raw.as_str()).unwrap(),
        other => panic!("expected string {}, got {:?}", key, other),
    }
}

fn at_second(n: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(n)
}

fn trace_id(n: u128) -> TraceId {
    TraceId::from_bytes(n.to_be_bytes())
}

fn span_id(n: u64) -> SpanId {
    SpanId::from_bytes(n.to_be_bytes())
}

// ============================================================================
// Agent
// ============================================================================

#[test]
fn test_agent_span_end_to_end() {
    let data = SpanPayload::Agent(AgentSpanData {
        name: "test-agent".to_string(),
        tools: Some(vec!["tool1".to_string(), "tool2".to_string()]),
        handoffs: None,
        output_type: Some("text".to_string()),
    });
    let (inner, outer) = run_single(agent_span("span-1", "trace-1", None, data));

    assert_eq!(outer.name, "test-trace");
    assert_eq!(outer.span_context.trace_id(), trace_id(1));
    assert_eq!(outer.span_context.span_id(), span_id(1));
    assert_eq!(outer.parent_span_id, SpanId::INVALID);
    assert_eq!(outer.start_time, at_second(1));
    assert_eq!(outer.end_time, at_second(4));
    assert!(outer.attributes.is_empty());

    assert_eq!(inner.name, "test-agent");
    assert_eq!(inner.span_context.trace_id(), trace_id(1));
    assert_eq!(inner.span_context.span_id(), span_id(2));
    assert_eq!(inner.parent_span_id, outer.span_context.span_id());
    assert_eq!(inner.start_time, at_second(2));
    assert_eq!(inner.end_time, at_second(3));
    assert_eq!(inner.instrumentation_scope.name(), "openai-agents");

    let attrs = attribute_map(&inner.attributes);
    assert_eq!(attrs.len(), 4);
    assert_eq!(attrs.get(keys::AGENT_NAME), Some(&Value::from("test-agent")));
    assert_eq!(attrs.get(keys::AGENT_OUTPUT_TYPE), Some(&Value::from("text")));
    assert_eq!(json_attr(&inner, keys::TOOL_DEFINITIONS), json!(["tool1", "tool2"]));
    assert_eq!(
        json_attr(&inner, keys::AGENT_SPAN_DATA),
        json!({
            "type": "agent",
            "name": "test-agent",
            "handoffs": null,
            "tools": ["tool1", "tool2"],
            "output_type": "text"
        })
    );
}

#[test]
fn test_agent_handoffs_and_empty_tools() {
    let data = SpanPayload::Agent(AgentSpanData {
        name: "triage".to_string(),
        tools: Some(Vec::new()),
        handoffs: Some(vec!["billing".to_string()]),
        output_type: None,
    });
    let (inner, _) = run_single(agent_span("s", "t", Some("t"), data));

    assert_eq!(json_attr(&inner, keys::AGENT_HANDOFFS), json!(["billing"]));
    assert!(span_attribute(&inner, keys::TOOL_DEFINITIONS).is_none());
    assert!(span_attribute(&inner, keys::AGENT_OUTPUT_TYPE).is_none());
}

// ============================================================================
// Function
// ============================================================================

#[test]
fn test_function_span_with_untracked_parent_starts_new_trace() {
    let data = SpanPayload::Function(FunctionSpanData {
        name: "get_weather".to_string(),
        input: Some(r#"{"city": "Tokyo"}"#.to_string()),
        output: Some(json!(r#"{"temperature": "20C"}"#)),
        mcp_data: None,
    });
    let (inner, outer) = run_single(agent_span("span-2", "trace-2", Some("span-1"), data));

    assert_eq!(inner.name, "get_weather");
    assert_eq!(inner.parent_span_id, SpanId::INVALID);
    assert_eq!(inner.span_context.trace_id(), trace_id(2));
    assert_eq!(outer.span_context.trace_id(), trace_id(1));

    assert_eq!(
        span_attribute(&inner, keys::TOOL_NAME),
        Some(&Value::from("get_weather"))
    );
    assert_eq!(json_attr(&inner, keys::TOOL_INPUT), json!({"city": "Tokyo"}));
    assert_eq!(json_attr(&inner, keys::TOOL_OUTPUT), json!({"temperature": "20C"}));
    assert_eq!(json_attr(&inner, keys::AGENT_SPAN_DATA)["type"], json!("function"));
}

#[test]
fn test_function_structured_output_is_stringified() {
    let data = SpanPayload::Function(FunctionSpanData {
        name: "lookup".to_string(),
        input: None,
        output: Some(json!({"rows": 2})),
        mcp_data: None,
    });
    let (inner, _) = run_single(agent_span("s", "t", None, data));

    assert_eq!(
        span_attribute(&inner, keys::TOOL_OUTPUT),
        Some(&Value::from(r#"{"rows":2}"#))
    );
    assert!(span_attribute(&inner, keys::TOOL_INPUT).is_none());
}

// ============================================================================
// Response
// ============================================================================

#[test]
fn test_response_span() {
    let data = SpanPayload::Response(ResponseSpanData {
        response: Some(Response {
            id: Some("resp-123".to_string()),
            model: Some("gpt-4".to_string()),
            instructions: Some("You are a helpful assistant".to_string()),
            usage: Some(ResponseUsage {
                input_tokens: 10,
                output_tokens: 20,
            }),
            ..Default::default()
        }),
        input: Some(vec![json!({"role": "user", "content": "Hello"})]),
    });
    let (inner, _) = run_single(agent_span("span-3", "trace-3", None, data));

    assert_eq!(inner.name, "response");
    let attrs = attribute_map(&inner.attributes);
    assert_eq!(attrs.len(), 7);
    assert_eq!(attrs.get(keys::USAGE_INPUT_TOKENS), Some(&Value::I64(10)));
    assert_eq!(attrs.get(keys::USAGE_OUTPUT_TOKENS), Some(&Value::I64(20)));
    assert_eq!(attrs.get(keys::REQUEST_MODEL), Some(&Value::from("gpt-4")));
    assert_eq!(attrs.get(keys::RESPONSE_ID), Some(&Value::from("resp-123")));
    assert_eq!(
        json_attr(&inner, keys::SYSTEM_INSTRUCTIONS),
        json!([{"type": "text", "content": "You are a helpful assistant"}])
    );
    assert_eq!(
        json_attr(&inner, keys::INPUT_MESSAGES),
        json!([{"role": "user", "parts": [{"type": "text", "content": "Hello"}]}])
    );
    assert_eq!(
        json_attr(&inner, keys::AGENT_SPAN_DATA),
        json!({"type": "response", "response_id": "resp-123"})
    );
}

#[test]
fn test_response_tools_output_and_zero_usage() {
    let data = SpanPayload::Response(ResponseSpanData {
        response: Some(Response {
            tools: vec![
                ResponseTool {
                    tool_type: "function".to_string(),
                    name: Some("get_weather".to_string()),
                    description: Some("Weather by city".to_string()),
                    parameters: Some(json!({"type": "object"})),
                },
                ResponseTool {
                    tool_type: "web_search_preview".to_string(),
                    name: None,
                    description: None,
                    parameters: None,
                },
            ],
            usage: Some(ResponseUsage {
                input_tokens: 0,
                output_tokens: 3,
            }),
            output: vec![json!({
                "type": "message",
                "role": "assistant",
                "content": [{"type": "output_text", "text": "Sunny"}]
            })],
            ..Default::default()
        }),
        input: None,
    });
    let (inner, _) = run_single(agent_span("s", "t", None, data));

    assert_eq!(
        json_attr(&inner, keys::TOOL_DEFINITIONS),
        json!([
            {
                "name": "get_weather",
                "description": "Weather by city",
                "parameters": {"type": "object"}
            },
            {"name": "web_search_preview"}
        ])
    );
    assert_eq!(
        json_attr(&inner, keys::OUTPUT_MESSAGES),
        json!([{"role": "assistant", "parts": [{"type": "text", "content": "Sunny"}]}])
    );
    let attrs = attribute_map(&inner.attributes);
    assert!(!attrs.contains_key(keys::USAGE_INPUT_TOKENS));
    assert_eq!(attrs.get(keys::USAGE_OUTPUT_TOKENS), Some(&Value::I64(3)));
    assert!(!attrs.contains_key(keys::INPUT_MESSAGES));
    assert!(!attrs.contains_key(keys::RESPONSE_ID));
}

#[test]
fn test_response_without_response_object() {
    let data = SpanPayload::Response(ResponseSpanData::default());
    let (inner, _) = run_single(agent_span("s", "t", None, data));

    assert_eq!(inner.attributes.len(), 1);
    assert_eq!(
        json_attr(&inner, keys::AGENT_SPAN_DATA),
        json!({"type": "response", "response_id": null})
    );
}

// ============================================================================
// Generation, handoff, unknown kinds
// ============================================================================

#[test]
fn test_generation_span() {
    let usage = json!({"input_tokens": 5, "output_tokens": 15});
    let data = SpanPayload::Generation(GenerationSpanData {
        model: Some("gpt-4".to_string()),
        usage: usage.as_object().cloned(),
        input: Some(vec![json!({"role": "user", "content": "Hi"})]),
        output: Some(vec![json!({"role": "assistant", "content": "Hello!"})]),
        model_config: None,
    });
    let (inner, _) = run_single(agent_span("span-4", "trace-4", None, data));

    assert_eq!(inner.name, "generation");
    let attrs = attribute_map(&inner.attributes);
    assert_eq!(attrs.get(keys::REQUEST_MODEL), Some(&Value::from("gpt-4")));
    assert_eq!(attrs.get(keys::USAGE_INPUT_TOKENS), Some(&Value::I64(5)));
    assert_eq!(attrs.get(keys::USAGE_OUTPUT_TOKENS), Some(&Value::I64(15)));
    // message lists are recorded as-is
    assert_eq!(
        json_attr(&inner, keys::INPUT_MESSAGES),
        json!([{"role": "user", "content": "Hi"}])
    );
    assert_eq!(
        json_attr(&inner, keys::OUTPUT_MESSAGES),
        json!([{"role": "assistant", "content": "Hello!"}])
    );
}

#[test]
fn test_handoff_span() {
    let data = SpanPayload::Handoff(HandoffSpanData {
        from_agent: Some("triage".to_string()),
        to_agent: Some("billing".to_string()),
    });
    let (inner, _) = run_single(agent_span("s", "t", None, data));

    assert_eq!(inner.name, "handoff");
    assert_eq!(
        span_attribute(&inner, keys::HANDOFF_FROM_AGENT),
        Some(&Value::from("triage"))
    );
    assert_eq!(
        span_attribute(&inner, keys::HANDOFF_TO_AGENT),
        Some(&Value::from("billing"))
    );
}

#[test]
fn test_unknown_kind_only_records_payload() {
    let data = SpanPayload::Custom {
        kind: "guardrail".to_string(),
        data: json!({"triggered": false}),
    };
    let (inner, _) = run_single(agent_span("s", "t", None, data));

    assert_eq!(inner.name, "guardrail");
    assert_eq!(inner.attributes.len(), 1);
    assert_eq!(
        json_attr(&inner, keys::AGENT_SPAN_DATA),
        json!({"type": "guardrail", "data": {"triggered": false}})
    );
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_unbalanced_ends_are_ignored() {
    let (bridge, counter) = bridge();
    let data = SpanPayload::Handoff(HandoffSpanData::default());

    bridge.on_trace_end(&trace("never-started", "x"));
    bridge.on_span_end(&agent_span("never-started", "x", None, data));

    assert_eq!(counter.end_count(), 0);
    assert_eq!(counter.start_count(), 0);
}

#[test]
fn test_nested_spans_link_to_parent_span() {
    let (bridge, counter) = bridge();
    let outer = trace("trace-1", "run");
    let agent = agent_span(
        "span-1",
        "trace-1",
        None,
        SpanPayload::Agent(AgentSpanData {
            name: "assistant".to_string(),
            ..Default::default()
        }),
    );
    let tool = agent_span(
        "span-2",
        "trace-1",
        Some("span-1"),
        SpanPayload::Function(FunctionSpanData {
            name: "search".to_string(),
            ..Default::default()
        }),
    );

    bridge.on_trace_start(&outer);
    bridge.on_span_start(&agent);
    bridge.on_span_start(&tool);
    assert_eq!(bridge.open_span_count(), 3);
    bridge.on_span_end(&tool);
    bridge.on_span_end(&agent);
    bridge.on_trace_end(&outer);

    let ended = counter.ended();
    assert_eq!(ended[0].name, "search");
    assert_eq!(ended[0].parent_span_id, span_id(2));
    assert_eq!(ended[1].name, "assistant");
    assert_eq!(ended[1].parent_span_id, span_id(1));
    assert!(ended.iter().all(|s| s.span_context.trace_id() == trace_id(1)));
}

#[test]
fn test_concurrent_traces() {
    let (bridge, counter) = bridge();

    std::thread::scope(|scope| {
        for worker in 0..4 {
            let bridge = &bridge;
            scope.spawn(move || {
                for i in 0..25 {
                    let trace_key = format!("trace-{}-{}", worker, i);
                    let outer = trace(&trace_key, "run");
                    let span = agent_span(
                        &format!("span-{}-{}", worker, i),
                        &trace_key,
                        None,
                        SpanPayload::Handoff(HandoffSpanData::default()),
                    );
                    bridge.on_trace_start(&outer);
                    bridge.on_span_start(&span);
                    bridge.on_span_end(&span);
                    bridge.on_trace_end(&outer);
                }
            });
        }
    });

    let ended = counter.ended();
    assert_eq!(ended.len(), 200);
    assert_eq!(bridge.open_span_count(), 0);
    let children = ended
        .iter()
        .filter(|s| s.parent_span_id != SpanId::INVALID)
        .count();
    assert_eq!(children, 100);
}

#[test]
fn test_with_exporter_uses_advanced_generators() {
    let exporter = InMemorySpanExporter::default();
    let advanced = AdvancedOptions::default()
        .with_id_generator(Arc::new(IncrementalIdGenerator::new()))
        .with_timestamp_generator(Arc::new(TimeGenerator::new()));
    let bridge = AgentTraceBridge::with_exporter(exporter.clone(), advanced);

    let outer = trace("trace-1", "run");
    let span = agent_span(
        "span-1",
        "trace-1",
        None,
        SpanPayload::Agent(AgentSpanData {
            name: "assistant".to_string(),
            ..Default::default()
        }),
    );
    bridge.on_trace_start(&outer);
    bridge.on_span_start(&span);
    bridge.on_span_end(&span);
    bridge.on_trace_end(&outer);

    assert!(bridge.force_flush(Duration::from_secs(5)));
    let spans = exporter.finished_spans();
    assert_eq!(spans.len(), 2);
    assert_eq!(spans[0].name, "assistant");
    assert_eq!(spans[0].start_time, at_second(2));
    assert_eq!(spans[0].span_context.trace_id(), trace_id(1));
    assert_eq!(spans[1].end_time, at_second(4));
    assert_eq!(spans[1].span_context.span_id(), span_id(1));

    bridge.shutdown().unwrap();
    assert!(exporter.is_shutdown());
    assert!(bridge.shutdown().is_err());
}

#[test]
fn test_duplicate_span_id_ends_previous_span() {
    let (bridge, counter) = bridge();
    let data = || SpanPayload::Handoff(HandoffSpanData::default());

    bridge.on_span_start(&agent_span("dup", "t", None, data()));
    bridge.on_span_start(&agent_span("dup", "t", None, data()));

    assert_eq!(bridge.open_span_count(), 1);
    assert_eq!(counter.start_count(), 2);
    assert_eq!(counter.end_count(), 1);
}

#[test]
fn test_span_resource_service_name() {
    let env = |key: &str| (key == ENV_SERVICE_NAME).then(|| "agents".to_string());
    let resource = span_resource(env);
    assert_eq!(
        resource.get(&Key::from_static_str("service.name")),
        Some(Value::from("agents"))
    );

    let resource = span_resource(|_: &str| None);
    assert_eq!(
        resource.get(&Key::from_static_str("service.name")),
        Some(Value::from(SDK_NAME))
    );
}

#[test]
fn test_new_requires_token() {
    if std::env::var(crate::core::constants::ENV_TOKEN).is_ok() {
        return;
    }
    let result = AgentTraceBridge::new(None, AdvancedOptions::default());
    assert!(matches!(result, Err(ConfigError::MissingToken)));
}
