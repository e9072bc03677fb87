// =============================================================================
// SDK Identity
// =============================================================================

/// SDK name (instrumentation scope for events, user agent product)
pub const SDK_NAME: &str = "introspection-sdk";

/// SDK version, taken from the crate manifest
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate target used in default log filters
pub const CRATE_TARGET: &str = "introspection_sdk";

/// Instrumentation scope of spans produced by the agent trace bridge
pub const AGENT_TRACER_NAME: &str = "openai-agents";

/// Instrumentation scope prefix of OpenInference instrumentors
pub const OPENINFERENCE_SCOPE_PREFIX: &str = "openinference";

/// `User-Agent` header value sent with every span export
pub fn user_agent() -> String {
    format!("{}/{}", SDK_NAME, SDK_VERSION)
}

// =============================================================================
// Environment Variables
// =============================================================================

/// Environment variable for the API token
pub const ENV_TOKEN: &str = "INTROSPECTION_TOKEN";

/// Environment variable for the API base URL
pub const ENV_BASE_URL: &str = "INTROSPECTION_BASE_URL";

/// Environment variable for the event client service name
pub const ENV_SERVICE_NAME: &str = "INTROSPECTION_SERVICE_NAME";

/// Environment variable for the log level/filter
pub const ENV_LOG_LEVEL: &str = "INTROSPECTION_LOG_LEVEL";

// =============================================================================
// Endpoint Defaults
// =============================================================================

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.nuraline.ai";

/// OTLP/HTTP traces path
pub const TRACES_PATH: &str = "/v1/traces";

/// OTLP/HTTP logs path
pub const LOGS_PATH: &str = "/v1/logs";

// =============================================================================
// Event Client Defaults
// =============================================================================

/// Default service name for the event client
pub const DEFAULT_SERVICE_NAME: &str = "introspection-client";

/// Default event flush interval (ms)
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 5000;

/// Default maximum events per export
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

// =============================================================================
// Span Batch Defaults
// =============================================================================

/// Maximum queued spans before new ones are dropped
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 2048;

/// Maximum spans per export call
pub const DEFAULT_MAX_EXPORT_BATCH_SIZE: usize = 512;

/// Delay between scheduled exports (ms)
pub const DEFAULT_SCHEDULE_DELAY_MS: u64 = 1000;

/// Timeout for a single export call (ms)
pub const DEFAULT_EXPORT_TIMEOUT_MS: u64 = 30_000;

/// Default timeout for flush calls (ms)
pub const DEFAULT_FLUSH_TIMEOUT_MS: u64 = 30_000;
