//! OpenAI Responses API items to GenAI messages
//!
//! Input items are messages (`type` absent or `message`), `function_call`,
//! or `function_call_output`. Output items are messages or `function_call`.
//! Any other item type is ignored.

use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::schema::{Message, Part, Role};

/// Convert request input items plus optional instructions.
///
/// Returns `(input_messages, system_instructions)`. Instructions are never
/// folded into the message list.
pub fn convert_responses_inputs(
    inputs: Option<&[JsonValue]>,
    instructions: Option<&str>,
) -> (Vec<Message>, Vec<Part>) {
    let system_instructions = instructions
        .filter(|i| !i.is_empty())
        .map(|i| vec![Part::text(i)])
        .unwrap_or_default();

    let messages = inputs
        .unwrap_or_default()
        .iter()
        .filter_map(JsonValue::as_object)
        .filter_map(|item| {
            let role = item
                .get("role")
                .and_then(JsonValue::as_str)
                .map(|r| Role::from_str_or(r, Role::User))
                .unwrap_or(Role::User);

            match item_type(item) {
                None | Some("message") => {
                    message_content(item).map(|content| Message::new(role, content_parts(content)))
                }
                Some("function_call") => Some(function_call_message(item)),
                Some("function_call_output") => {
                    let message = Message::new(
                        Role::Tool,
                        vec![Part::ToolCallResponse {
                            id: string_field(item, "call_id"),
                            response: item.get("output").cloned().unwrap_or(JsonValue::Null),
                        }],
                    );
                    Some(match string_field(item, "name") {
                        Some(name) => message.with_name(name),
                        None => message,
                    })
                }
                Some(other) => {
                    tracing::debug!(item_type = other, "Skipping unsupported Responses input item");
                    None
                }
            }
        })
        .collect();

    (messages, system_instructions)
}

/// Convert response output items. Every message is from the assistant.
pub fn convert_responses_outputs(outputs: &[JsonValue]) -> Vec<Message> {
    outputs
        .iter()
        .filter_map(JsonValue::as_object)
        .filter_map(|item| match item_type(item) {
            None | Some("message") => message_content(item)
                .map(|content| Message::new(Role::Assistant, content_parts(content))),
            Some("function_call") => Some(function_call_message(item)),
            Some(other) => {
                tracing::debug!(item_type = other, "Skipping unsupported Responses output item");
                None
            }
        })
        .collect()
}

fn item_type(item: &JsonMap<String, JsonValue>) -> Option<&str> {
    item.get("type").and_then(JsonValue::as_str)
}

fn string_field(item: &JsonMap<String, JsonValue>, key: &str) -> Option<String> {
    item.get(key).and_then(JsonValue::as_str).map(str::to_string)
}

/// Content that counts as present: non-empty string, array, or object.
fn message_content(item: &JsonMap<String, JsonValue>) -> Option<&JsonValue> {
    item.get("content").filter(|content| match content {
        JsonValue::Null | JsonValue::Bool(false) => false,
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(items) => !items.is_empty(),
        JsonValue::Object(map) => !map.is_empty(),
        JsonValue::Number(n) => n.as_f64() != Some(0.0),
        JsonValue::Bool(true) => true,
    })
}

fn function_call_message(item: &JsonMap<String, JsonValue>) -> Message {
    Message::new(
        Role::Assistant,
        vec![Part::ToolCall {
            id: string_field(item, "call_id"),
            name: string_field(item, "name"),
            arguments: item.get("arguments").cloned().unwrap_or(JsonValue::Null),
        }],
    )
}

fn content_parts(content: &JsonValue) -> Vec<Part> {
    match content {
        JsonValue::String(text) => vec![Part::text(text.as_str())],
        JsonValue::Array(items) => items.iter().filter_map(content_item_part).collect(),
        _ => Vec::new(),
    }
}

/// One content array entry. `output_text`/`input_text` items and anything
/// carrying a `text` field become text; already-canonical parts pass through.
fn content_item_part(item: &JsonValue) -> Option<Part> {
    let JsonValue::Object(map) = item else {
        return Some(match item {
            JsonValue::String(text) => Part::text(text.as_str()),
            other => Part::text(other.to_string()),
        });
    };

    if matches!(item_type(map), Some("output_text") | Some("input_text")) {
        let text = map.get("text").and_then(JsonValue::as_str).unwrap_or_default();
        return Some(Part::text(text));
    }
    if let Ok(part) = serde_json::from_value::<Part>(item.clone()) {
        return Some(part);
    }
    if let Some(text) = map.get("text").and_then(JsonValue::as_str) {
        return Some(Part::text(text));
    }

    tracing::debug!(
        item_type = item_type(map).unwrap_or("unknown"),
        "Skipping unsupported content item"
    );
    None
}
