//! GenAI semantic-convention schema
//!
//! - `types`: messages, parts, and tool definitions
//! - `attributes`: the canonical attribute record and its attribute-map form
//! - `keys`: every attribute name the SDK reads or writes

mod attributes;
mod types;

pub use self::attributes::{Attributes, GenAiAttributes, attr_i64, attr_str, attribute_map};
pub use self::types::{Message, Part, Role, ToolDefinition};

// ============================================================================
// ATTRIBUTE KEYS
// ============================================================================

pub mod keys {
    // Canonical GenAI
    pub const REQUEST_MODEL: &str = "gen_ai.request.model";
    pub const SYSTEM: &str = "gen_ai.system";
    pub const TOOL_DEFINITIONS: &str = "gen_ai.tool.definitions";
    pub const INPUT_MESSAGES: &str = "gen_ai.input.messages";
    pub const OUTPUT_MESSAGES: &str = "gen_ai.output.messages";
    pub const SYSTEM_INSTRUCTIONS: &str = "gen_ai.system_instructions";
    pub const RESPONSE_ID: &str = "gen_ai.response.id";
    pub const USAGE_INPUT_TOKENS: &str = "gen_ai.usage.input_tokens";
    pub const USAGE_OUTPUT_TOKENS: &str = "gen_ai.usage.output_tokens";

    // Agents and tools
    pub const AGENT_NAME: &str = "gen_ai.agent.name";
    pub const AGENT_ID: &str = "gen_ai.agent.id";
    pub const AGENT_HANDOFFS: &str = "gen_ai.agent.handoffs";
    pub const AGENT_OUTPUT_TYPE: &str = "gen_ai.agent.output_type";
    pub const TOOL_NAME: &str = "gen_ai.tool.name";
    pub const TOOL_INPUT: &str = "gen_ai.tool.input";
    pub const TOOL_OUTPUT: &str = "gen_ai.tool.output";
    pub const HANDOFF_FROM_AGENT: &str = "gen_ai.handoff.from_agent";
    pub const HANDOFF_TO_AGENT: &str = "gen_ai.handoff.to_agent";
    pub const AGENT_SPAN_DATA: &str = "openai_agents.span_data";

    // Conversation context
    pub const CONVERSATION_ID: &str = "gen_ai.conversation.id";
    pub const PREVIOUS_RESPONSE_ID: &str = "gen_ai.request.previous_response_id";

    // Events
    pub const EVENT_NAME: &str = "event.name";
    pub const EVENT_ID: &str = "event.id";
    pub const USER_ID: &str = "identity.user.id";
    pub const ANONYMOUS_ID: &str = "identity.anonymous.id";
    pub const PROPERTIES_PREFIX: &str = "properties.";
    pub const TRAITS_PREFIX: &str = "context.traits.";

    // OpenInference
    pub const OI_MODEL_NAME: &str = "llm.model_name";
    pub const OI_SYSTEM: &str = "llm.system";
    pub const OI_TOKEN_COUNT_PROMPT: &str = "llm.token_count.prompt";
    pub const OI_TOKEN_COUNT_COMPLETION: &str = "llm.token_count.completion";
    pub const OI_INPUT_VALUE: &str = "input.value";
    pub const OI_OUTPUT_VALUE: &str = "output.value";
    pub const OI_TOOLS: &str = "llm.tools";
    pub const OI_TOOL_MEMBER: &str = "tool";
    pub const OI_TOOL_JSON_SCHEMA: &str = "json_schema";
    pub const OI_INPUT_MESSAGES: &str = "llm.input_messages";
    pub const OI_OUTPUT_MESSAGES: &str = "llm.output_messages";
    pub const OI_MESSAGE_MEMBER: &str = "message";

    /// Attribute prefixes replaced by canonical keys after conversion
    pub const OI_PREFIXES: [&str; 3] = ["llm.", "input.", "output."];
}
