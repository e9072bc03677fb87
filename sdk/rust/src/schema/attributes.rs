//! Canonical GenAI attribute record
//!
//! List-valued fields travel as JSON strings because span attribute maps only
//! hold scalars. Absent fields are omitted from the attribute map entirely.

use std::collections::HashMap;

use opentelemetry::{KeyValue, Value};
use serde::de::DeserializeOwned;

use super::keys;
use super::types::{Message, Part, ToolDefinition};
use crate::utils::json::{to_json_string, truncate_for_log};

/// Span attribute map. Ordering is irrelevant.
pub type Attributes = HashMap<String, Value>;

/// Index span attributes by key. A repeated key keeps its last value.
pub fn attribute_map(attributes: &[KeyValue]) -> Attributes {
    attributes
        .iter()
        .map(|kv| (kv.key.as_str().to_string(), kv.value.clone()))
        .collect()
}

/// Read a string attribute, ignoring non-string values
pub fn attr_str<'a>(attrs: &'a Attributes, key: &str) -> Option<&'a str> {
    match attrs.get(key) {
        Some(Value::String(s)) => Some(s.as_str()),
        _ => None,
    }
}

/// Read an integer attribute, ignoring non-integer values
pub fn attr_i64(attrs: &Attributes, key: &str) -> Option<i64> {
    match attrs.get(key) {
        Some(Value::I64(i)) => Some(*i),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenAiAttributes {
    pub request_model: Option<String>,
    pub system: Option<String>,
    pub tool_definitions: Option<Vec<ToolDefinition>>,
    pub input_messages: Option<Vec<Message>>,
    pub output_messages: Option<Vec<Message>>,
    /// Text parts only
    pub system_instructions: Option<Vec<Part>>,
    pub response_id: Option<String>,
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
}

impl GenAiAttributes {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Encode as span attributes, sorted by key, skipping every absent field.
    pub fn to_key_values(&self) -> Vec<KeyValue> {
        let mut pairs: Vec<(String, Value)> = self.to_attribute_map().into_iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs
            .into_iter()
            .map(|(key, value)| KeyValue::new(key, value))
            .collect()
    }

    /// Encode as an attribute map, skipping every absent field.
    pub fn to_attribute_map(&self) -> Attributes {
        let mut attrs = Attributes::new();

        let mut put_str = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                attrs.insert(key.to_string(), Value::from(value));
            }
        };
        put_str(keys::REQUEST_MODEL, self.request_model.clone());
        put_str(keys::SYSTEM, self.system.clone());
        put_str(
            keys::TOOL_DEFINITIONS,
            self.tool_definitions.as_ref().and_then(to_json_string),
        );
        put_str(
            keys::INPUT_MESSAGES,
            self.input_messages.as_ref().and_then(to_json_string),
        );
        put_str(
            keys::OUTPUT_MESSAGES,
            self.output_messages.as_ref().and_then(to_json_string),
        );
        put_str(
            keys::SYSTEM_INSTRUCTIONS,
            self.system_instructions.as_ref().and_then(to_json_string),
        );
        put_str(keys::RESPONSE_ID, self.response_id.clone());

        if let Some(tokens) = self.input_tokens {
            attrs.insert(keys::USAGE_INPUT_TOKENS.to_string(), Value::I64(tokens));
        }
        if let Some(tokens) = self.output_tokens {
            attrs.insert(keys::USAGE_OUTPUT_TOKENS.to_string(), Value::I64(tokens));
        }

        attrs
    }

    /// Decode from span attributes. Malformed JSON leaves the field absent.
    pub fn from_attribute_map(attrs: &Attributes) -> Self {
        Self {
            request_model: attr_str(attrs, keys::REQUEST_MODEL).map(str::to_string),
            system: attr_str(attrs, keys::SYSTEM).map(str::to_string),
            tool_definitions: decode_list(attrs, keys::TOOL_DEFINITIONS),
            input_messages: decode_list(attrs, keys::INPUT_MESSAGES),
            output_messages: decode_list(attrs, keys::OUTPUT_MESSAGES),
            system_instructions: decode_list(attrs, keys::SYSTEM_INSTRUCTIONS),
            response_id: attr_str(attrs, keys::RESPONSE_ID).map(str::to_string),
            input_tokens: attr_i64(attrs, keys::USAGE_INPUT_TOKENS),
            output_tokens: attr_i64(attrs, keys::USAGE_OUTPUT_TOKENS),
        }
    }
}

fn decode_list<T: DeserializeOwned>(attrs: &Attributes, key: &str) -> Option<Vec<T>> {
    let raw = attr_str(attrs, key)?;
    match serde_json::from_str(raw) {
        Ok(list) => Some(list),
        Err(e) => {
            tracing::warn!(
                error = %e,
                key = key,
                value_preview = %truncate_for_log(raw, 100),
                "Failed to decode GenAI attribute"
            );
            None
        }
    }
}
