//! OTLP/HTTP protobuf exporters
//!
//! Endpoint and headers come from [`ExportSettings`]; the transport is the
//! `opentelemetry-otlp` blocking HTTP client, so exports work from the SDK's
//! batch threads without a tokio reactor. No retries: a failed request fails
//! the batch.

use std::time::Duration;

use opentelemetry_otlp::{LogExporter, Protocol, SpanExporter, WithExportConfig, WithHttpConfig};

use crate::core::config::{AdvancedOptions, ExportSettings};
use crate::core::constants::DEFAULT_EXPORT_TIMEOUT_MS;
use crate::core::error::ConfigError;

/// Span exporter for the traces endpoint. A missing token is an error.
pub fn span_exporter(
    token: Option<&str>,
    advanced: &AdvancedOptions,
    env: impl Fn(&str) -> Option<String>,
) -> Result<SpanExporter, ConfigError> {
    let settings = ExportSettings::for_traces(token, advanced, env)?;
    tracing::debug!(endpoint = %settings.endpoint, "Exporting spans over OTLP/HTTP");

    SpanExporter::builder()
        .with_http()
        .with_protocol(Protocol::HttpBinary)
        .with_endpoint(settings.endpoint.as_str())
        .with_headers(settings.header_pairs())
        .with_timeout(Duration::from_millis(DEFAULT_EXPORT_TIMEOUT_MS))
        .build()
        .map_err(|e| ConfigError::Exporter(e.to_string()))
}

/// Log exporter for the events endpoint. A missing token only warns.
pub fn log_exporter(
    token: Option<&str>,
    base_url: Option<&str>,
    advanced: &AdvancedOptions,
    env: impl Fn(&str) -> Option<String>,
) -> Result<(LogExporter, ExportSettings), ConfigError> {
    let settings = ExportSettings::for_logs(token, base_url, advanced, env)?;

    let exporter = LogExporter::builder()
        .with_http()
        .with_protocol(Protocol::HttpBinary)
        .with_endpoint(settings.endpoint.as_str())
        .with_headers(settings.header_pairs())
        .with_timeout(Duration::from_millis(DEFAULT_EXPORT_TIMEOUT_MS))
        .build()
        .map_err(|e| ConfigError::Exporter(e.to_string()))?;
    Ok((exporter, settings))
}
