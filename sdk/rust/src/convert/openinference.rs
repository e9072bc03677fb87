//! OpenInference to GenAI semantic-convention conversion
//!
//! OpenInference instrumentors (Arize Phoenix, Langfuse, Braintrust, ...)
//! flatten messages into dotted keys:
//!
//! ```text
//! llm.input_messages.0.message.role     = "user"
//! llm.input_messages.0.message.content  = "Hello"
//! llm.tools.0.tool.json_schema          = "{...}"
//! ```
//!
//! [`convert_openinference`] rebuilds those into [`GenAiAttributes`]. It never
//! fails: malformed values are logged and skipped.
//!
//! ## Part order within a message
//!
//! 1. `role == tool` with a `tool_call_id`: exactly one tool-call response
//! 2. `contents.N` entries of type `text`, ascending `N`
//! 3. flat `content`, only when step 2 produced nothing
//! 4. `tool_calls.N`, ascending `N`

use serde_json::{Map as JsonMap, Value as JsonValue};

use super::index::group_by_index;
use crate::core::constants::OPENINFERENCE_SCOPE_PREFIX;
use crate::schema::{
    Attributes, GenAiAttributes, Message, Part, Role, ToolDefinition, attr_i64, attr_str, keys,
};
use crate::utils::json::{parse_json_with_fallback, truncate_for_log};

// ============================================================================
// ENTRY POINTS
// ============================================================================

/// Whether spans from this instrumentation scope carry OpenInference attributes.
pub fn is_openinference_span(scope_name: Option<&str>) -> bool {
    scope_name.is_some_and(|name| name.starts_with(OPENINFERENCE_SCOPE_PREFIX))
}

/// Convert an OpenInference attribute map into canonical GenAI attributes.
pub fn convert_openinference(attrs: Option<&Attributes>) -> GenAiAttributes {
    let Some(attrs) = attrs else {
        return GenAiAttributes::default();
    };

    let (input_messages, system_instructions) = extract_input_messages(attrs);
    let output_messages = extract_output_messages(attrs);
    let tool_definitions = extract_tool_definitions(attrs);
    let (input_tokens, output_tokens) = extract_token_usage(attrs);

    GenAiAttributes {
        request_model: extract_model_name(attrs),
        system: extract_system(attrs),
        tool_definitions: non_empty(tool_definitions),
        input_messages: non_empty(input_messages),
        output_messages: non_empty(output_messages),
        system_instructions: non_empty(system_instructions),
        response_id: extract_response_id(attrs),
        input_tokens,
        output_tokens,
    }
}

fn non_empty<T>(list: Vec<T>) -> Option<Vec<T>> {
    (!list.is_empty()).then_some(list)
}

// ============================================================================
// SCALAR FIELDS
// ============================================================================

pub fn extract_model_name(attrs: &Attributes) -> Option<String> {
    attr_str(attrs, keys::OI_MODEL_NAME).map(str::to_string)
}

pub fn extract_system(attrs: &Attributes) -> Option<String> {
    attr_str(attrs, keys::OI_SYSTEM).map(str::to_string)
}

/// `(input_tokens, output_tokens)`; only integer values count.
pub fn extract_token_usage(attrs: &Attributes) -> (Option<i64>, Option<i64>) {
    (
        attr_i64(attrs, keys::OI_TOKEN_COUNT_PROMPT),
        attr_i64(attrs, keys::OI_TOKEN_COUNT_COMPLETION),
    )
}

/// Resolve the provider response id.
///
/// Tried in order, first hit wins:
/// 1. an existing `gen_ai.response.id`
/// 2. top-level `id` of the `output.value` JSON (Chat Completions, Responses API)
/// 3. `generations[*][*].message.kwargs.response_metadata.id` (LangChain)
pub fn extract_response_id(attrs: &Attributes) -> Option<String> {
    if let Some(existing) = attr_str(attrs, keys::RESPONSE_ID).filter(|s| !s.is_empty()) {
        return Some(existing.to_string());
    }

    let output_value = attr_str(attrs, keys::OI_OUTPUT_VALUE).filter(|s| !s.is_empty())?;
    let payload = match serde_json::from_str::<JsonValue>(output_value) {
        Ok(JsonValue::Object(payload)) => payload,
        Ok(_) => return None,
        Err(e) => {
            tracing::trace!(error = %e, "output.value is not JSON, no response id");
            return None;
        }
    };

    if let Some(id) = non_empty_str(payload.get("id")) {
        return Some(id.to_string());
    }
    langchain_response_id(&payload)
}

fn langchain_response_id(payload: &JsonMap<String, JsonValue>) -> Option<String> {
    let generations = payload.get("generations")?.as_array()?;

    let from_item = |item: &JsonValue| -> Option<String> {
        let id = item
            .get("message")?
            .get("kwargs")?
            .get("response_metadata")?
            .get("id");
        non_empty_str(id).map(str::to_string)
    };

    generations.iter().find_map(|outer| match outer {
        JsonValue::Array(items) => items.iter().find_map(from_item),
        other => from_item(other),
    })
}

fn non_empty_str(value: Option<&JsonValue>) -> Option<&str> {
    value.and_then(JsonValue::as_str).filter(|s| !s.is_empty())
}

// ============================================================================
// TOOL DEFINITIONS
// ============================================================================

/// Tool definitions from `llm.tools.N.tool.json_schema`, ascending `N`.
///
/// Unparseable schemas are logged and skipped; the rest are kept.
pub fn extract_tool_definitions(attrs: &Attributes) -> Vec<ToolDefinition> {
    let mut tools = Vec::new();

    for (idx, group) in group_by_index(attrs, keys::OI_TOOLS, keys::OI_TOOL_MEMBER) {
        let Some(raw) = group.get_str(keys::OI_TOOL_JSON_SCHEMA) else {
            continue;
        };

        let schema = match serde_json::from_str::<JsonValue>(raw) {
            Ok(JsonValue::Object(schema)) => schema,
            Ok(_) => {
                tracing::warn!(index = idx, "Tool schema is not a JSON object, skipping");
                continue;
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    index = idx,
                    schema = %truncate_for_log(raw, 200),
                    "Failed to parse tool schema"
                );
                continue;
            }
        };

        tools.push(tool_definition_from_schema(&schema));
    }

    tools
}

/// Accepts both flat schemas and the `{type: "function", function: {...}}` envelope.
fn tool_definition_from_schema(schema: &JsonMap<String, JsonValue>) -> ToolDefinition {
    let (tool_type, body) = match schema.get("function") {
        Some(JsonValue::Object(function)) if schema.get("type").and_then(JsonValue::as_str) == Some("function") => {
            ("function", function)
        }
        _ => (
            schema
                .get("type")
                .and_then(JsonValue::as_str)
                .unwrap_or("function"),
            schema,
        ),
    };

    ToolDefinition {
        tool_type: Some(tool_type.to_string()),
        name: body
            .get("name")
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_string(),
        description: body
            .get("description")
            .and_then(JsonValue::as_str)
            .map(str::to_string),
        parameters: body.get("parameters").filter(|p| !p.is_null()).cloned(),
    }
}

// ============================================================================
// MESSAGES
// ============================================================================

/// Rebuild messages stored under `prefix` (input or output messages).
pub fn extract_messages(attrs: &Attributes, prefix: &str) -> Vec<Message> {
    group_by_index(attrs, prefix, keys::OI_MESSAGE_MEMBER)
        .into_values()
        .map(|group| {
            let role = group
                .get_str("role")
                .map(|r| Role::from_str_or(r, Role::Assistant))
                .unwrap_or(Role::Assistant);
            let content = group.text("content").filter(|c| !c.is_empty());

            if role == Role::Tool {
                if let Some(call_id) = group.text("tool_call_id") {
                    let response = match content.as_deref() {
                        Some(text) => parse_json_with_fallback(text, "tool response"),
                        None => JsonValue::Null,
                    };
                    return Message::new(
                        role,
                        vec![Part::ToolCallResponse {
                            id: Some(call_id.into_owned()),
                            response,
                        }],
                    );
                }
            }

            let mut parts: Vec<Part> = group
                .nested("contents", "message_content")
                .into_values()
                .filter(|c| c.get_str("type") == Some("text"))
                .map(|c| Part::text(c.text("text").unwrap_or_default()))
                .collect();

            if !parts.iter().any(Part::is_text) {
                if let Some(content) = content {
                    parts.push(Part::text(content));
                }
            }

            parts.extend(
                group
                    .nested("tool_calls", "tool_call")
                    .into_values()
                    .map(|call| Part::ToolCall {
                        id: call.text("id").map(|id| id.into_owned()),
                        name: call.text("function.name").map(|n| n.into_owned()),
                        arguments: call
                            .get("function.arguments")
                            .map(|a| JsonValue::String(a.as_str().into_owned()))
                            .unwrap_or(JsonValue::Null),
                    }),
            );

            Message::new(role, parts)
        })
        .collect()
}

/// System instructions, only when the first input message isn't a system message.
///
/// Falls back to the `instructions` field of the `input.value` JSON (Responses API).
pub fn extract_system_instructions(attrs: &Attributes) -> Vec<Part> {
    let first_role_key = format!("{}.0.{}.role", keys::OI_INPUT_MESSAGES, keys::OI_MESSAGE_MEMBER);
    if attr_str(attrs, &first_role_key) == Some("system") {
        return Vec::new();
    }

    let Some(input_value) = attr_str(attrs, keys::OI_INPUT_VALUE).filter(|s| !s.is_empty()) else {
        return Vec::new();
    };
    match serde_json::from_str::<JsonValue>(input_value) {
        Ok(parsed) => non_empty_str(parsed.get("instructions"))
            .map(|instructions| vec![Part::text(instructions)])
            .unwrap_or_default(),
        Err(e) => {
            tracing::trace!(error = %e, "input.value is not JSON, no system instructions");
            Vec::new()
        }
    }
}

/// `(input_messages, system_instructions)`. System-role messages stay in the list.
pub fn extract_input_messages(attrs: &Attributes) -> (Vec<Message>, Vec<Part>) {
    let system_instructions = extract_system_instructions(attrs);
    let messages = extract_messages(attrs, keys::OI_INPUT_MESSAGES);
    (messages, system_instructions)
}

/// Output messages, each with an explicit `finish_reason: null`.
pub fn extract_output_messages(attrs: &Attributes) -> Vec<Message> {
    extract_messages(attrs, keys::OI_OUTPUT_MESSAGES)
        .into_iter()
        .map(Message::with_unknown_finish_reason)
        .collect()
}

#[cfg(test)]
#[path = "openinference_tests.rs"]
mod tests;
