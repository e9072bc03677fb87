//! Configuration errors
//!
//! Conversion code never surfaces errors: malformed telemetry degrades to
//! partial attributes. Flush and shutdown report through the OpenTelemetry
//! SDK's `OTelSdkResult`, so only construction has its own error type.

use thiserror::Error;

/// Invalid or missing configuration, raised at construction time
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("INTROSPECTION_TOKEN is not set")]
    MissingToken,

    #[error("INTROSPECTION_BASE_URL is not set")]
    MissingBaseUrl,

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("Failed to build OTLP exporter: {0}")]
    Exporter(String),
}
