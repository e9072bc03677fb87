//! Canonical GenAI message types
//!
//! Serialized shapes follow the OpenTelemetry GenAI input/output message
//! schemas: a message is `{role, parts, name?, finish_reason?}` and every part
//! carries a `type` discriminator.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

// ============================================================================
// ROLE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }

    /// Parse a role, accepting the aliases common across providers.
    pub fn try_from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "system" | "developer" => Some(Role::System),
            "user" | "human" => Some(Role::User),
            "assistant" | "ai" | "model" | "bot" => Some(Role::Assistant),
            "tool" | "function" => Some(Role::Tool),
            _ => None,
        }
    }

    /// Parse a role, falling back to `default` for unknown values.
    pub fn from_str_or(s: &str, default: Role) -> Self {
        Self::try_from_str(s).unwrap_or_else(|| {
            tracing::debug!(role = s, fallback = default.as_str(), "Unknown message role");
            default
        })
    }
}

// ============================================================================
// PARTS
// ============================================================================

/// One piece of message content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text {
        content: String,
    },
    /// Tool invocation requested by the model. `arguments` is opaque.
    /// A missing name is written as `null`.
    ToolCall {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        arguments: JsonValue,
    },
    /// Result of a tool invocation. `response` is opaque.
    ToolCallResponse {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        response: JsonValue,
    },
}

impl Part {
    pub fn text(content: impl Into<String>) -> Self {
        Part::Text {
            content: content.into(),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Part::Text { .. })
    }
}

// ============================================================================
// MESSAGE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `None` omits the field; `Some(None)` writes an explicit `null`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_present"
    )]
    pub finish_reason: Option<Option<String>>,
}

impl Message {
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self {
            role,
            parts,
            name: None,
            finish_reason: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Mark as an output message whose finish reason is unknown
    pub fn with_unknown_finish_reason(mut self) -> Self {
        if self.finish_reason.is_none() {
            self.finish_reason = Some(None);
        }
        self
    }
}

/// Keeps an explicit `null` distinguishable from a missing field.
fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// ============================================================================
// TOOL DEFINITION
// ============================================================================

/// A tool offered to the model. `type` is omitted when unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub tool_type: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<JsonValue>,
}

impl ToolDefinition {
    pub fn function(name: impl Into<String>) -> Self {
        Self {
            tool_type: Some("function".to_string()),
            name: name.into(),
            description: None,
            parameters: None,
        }
    }

    /// A definition carrying only a name, with no `type` field
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            tool_type: None,
            name: name.into(),
            description: None,
            parameters: None,
        }
    }
}
