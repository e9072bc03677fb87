//! SDK configuration
//!
//! Values resolve in a fixed order: explicit argument, then [`AdvancedOptions`],
//! then environment variables, then built-in defaults. Environment access goes
//! through an injectable lookup so resolution stays a pure function.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use opentelemetry::trace::{SpanId, TraceId};
use opentelemetry_sdk::trace::{IdGenerator, RandomIdGenerator};
use reqwest::Url;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue, USER_AGENT};

use super::constants::{
    DEFAULT_BASE_URL, DEFAULT_FLUSH_INTERVAL_MS, DEFAULT_MAX_BATCH_SIZE, ENV_BASE_URL, ENV_TOKEN,
    LOGS_PATH, TRACES_PATH, user_agent,
};
use super::error::ConfigError;
use crate::trace::{SystemClock, TimestampGenerator};

/// Read a variable from the process environment
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

// =============================================================================
// Advanced Options
// =============================================================================

/// Options for custom endpoints, headers, and test injection
#[derive(Clone)]
pub struct AdvancedOptions {
    /// API base URL. Falls back to `INTROSPECTION_BASE_URL`, then the default.
    pub base_url: Option<String>,
    /// Extra HTTP headers sent with every export request
    pub additional_headers: HashMap<String, String>,
    /// Event client flush interval in milliseconds
    pub flush_interval_ms: u64,
    /// Event client maximum batch size
    pub max_batch_size: usize,
    /// Trace and span id source
    pub id_generator: Arc<dyn IdGenerator>,
    /// Nanosecond timestamp source
    pub timestamp_generator: Arc<dyn TimestampGenerator>,
}

impl Default for AdvancedOptions {
    fn default() -> Self {
        Self {
            base_url: None,
            additional_headers: HashMap::new(),
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            id_generator: Arc::new(RandomIdGenerator::default()),
            timestamp_generator: Arc::new(SystemClock),
        }
    }
}

impl fmt::Debug for AdvancedOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdvancedOptions")
            .field("base_url", &self.base_url)
            .field(
                "additional_headers",
                &self.additional_headers.keys().collect::<Vec<_>>(),
            )
            .field("flush_interval_ms", &self.flush_interval_ms)
            .field("max_batch_size", &self.max_batch_size)
            .field("id_generator", &self.id_generator)
            .field("timestamp_generator", &self.timestamp_generator)
            .finish()
    }
}

impl AdvancedOptions {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_flush_interval_ms(mut self, flush_interval_ms: u64) -> Self {
        self.flush_interval_ms = flush_interval_ms;
        self
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    pub fn with_id_generator(mut self, id_generator: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = id_generator;
        self
    }

    pub fn with_timestamp_generator(mut self, generator: Arc<dyn TimestampGenerator>) -> Self {
        self.timestamp_generator = generator;
        self
    }
}

/// Shared handle to the configured id generator.
///
/// The tracer provider takes its generator by value; this lets one
/// `AdvancedOptions` feed several providers.
#[derive(Debug, Clone)]
pub(crate) struct SharedIdGenerator(pub(crate) Arc<dyn IdGenerator>);

impl IdGenerator for SharedIdGenerator {
    fn new_trace_id(&self) -> TraceId {
        self.0.new_trace_id()
    }

    fn new_span_id(&self) -> SpanId {
        self.0.new_span_id()
    }
}

// =============================================================================
// Export Settings (resolved)
// =============================================================================

/// Fully resolved endpoint and headers for one OTLP signal
#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub endpoint: Url,
    pub headers: HeaderMap,
}

impl ExportSettings {
    /// Resolve span export settings. A missing token is a hard error.
    pub fn for_traces(
        token: Option<&str>,
        advanced: &AdvancedOptions,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let base_url = resolve_base_url(None, advanced, &env);
        if base_url.is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }
        let token = resolve_token(token, &env).ok_or(ConfigError::MissingToken)?;

        let endpoint = if base_url.ends_with(TRACES_PATH) {
            parse_url(&base_url)?
        } else {
            join_url(&parse_url(&base_url)?, TRACES_PATH)?
        };

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header_value("User-Agent", &user_agent())?);
        headers.insert(
            AUTHORIZATION,
            header_value("Authorization", &format!("Bearer {}", token))?,
        );
        extend_headers(&mut headers, &advanced.additional_headers)?;

        Ok(Self { endpoint, headers })
    }

    /// Resolve event export settings. A missing token only warns.
    pub fn for_logs(
        token: Option<&str>,
        base_url: Option<&str>,
        advanced: &AdvancedOptions,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let base_url = resolve_base_url(base_url, advanced, &env);
        if base_url.is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }

        let endpoint = if base_url.ends_with(LOGS_PATH) {
            parse_url(&base_url)?
        } else {
            let base = parse_url(&format!("{}/", base_url.trim_end_matches('/')))?;
            join_url(&base, LOGS_PATH.trim_start_matches('/'))?
        };

        let mut headers = HeaderMap::new();
        match resolve_token(token, &env) {
            Some(token) => {
                headers.insert(
                    AUTHORIZATION,
                    header_value("Authorization", &format!("Bearer {}", token))?,
                );
            }
            None => {
                tracing::warn!("No token provided for IntrospectionClient, events may be rejected");
            }
        }
        extend_headers(&mut headers, &advanced.additional_headers)?;

        Ok(Self { endpoint, headers })
    }

    /// Headers as plain strings, the form the OTLP exporter builder takes
    pub fn header_pairs(&self) -> HashMap<String, String> {
        self.headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect()
    }
}

fn resolve_base_url(
    explicit: Option<&str>,
    advanced: &AdvancedOptions,
    env: &impl Fn(&str) -> Option<String>,
) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| advanced.base_url.clone())
        .or_else(|| env(ENV_BASE_URL))
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

fn resolve_token(explicit: Option<&str>, env: &impl Fn(&str) -> Option<String>) -> Option<String> {
    explicit
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or_else(|| env(ENV_TOKEN))
        .filter(|t| !t.is_empty())
}

fn parse_url(url: &str) -> Result<Url, ConfigError> {
    Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

fn join_url(base: &Url, path: &str) -> Result<Url, ConfigError> {
    base.join(path).map_err(|e| ConfigError::InvalidUrl {
        url: format!("{}{}", base, path),
        reason: e.to_string(),
    })
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

fn extend_headers(
    headers: &mut HeaderMap,
    additional: &HashMap<String, String>,
) -> Result<(), ConfigError> {
    for (name, value) in additional {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| ConfigError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        headers.insert(header_name, header_value(name, value)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_traces_default_endpoint() {
        let settings =
            ExportSettings::for_traces(Some("tok"), &AdvancedOptions::default(), env_from(&[]))
                .unwrap();
        assert_eq!(settings.endpoint.as_str(), "https://api.nuraline.ai/v1/traces");
        assert_eq!(settings.headers.get(AUTHORIZATION).unwrap(), "Bearer tok");
        assert_eq!(
            settings.headers.get(USER_AGENT).unwrap().to_str().unwrap(),
            user_agent()
        );
    }

    #[test]
    fn test_traces_missing_token_is_error() {
        let result = ExportSettings::for_traces(None, &AdvancedOptions::default(), env_from(&[]));
        assert!(matches!(result, Err(ConfigError::MissingToken)));

        let result =
            ExportSettings::for_traces(Some(""), &AdvancedOptions::default(), env_from(&[]));
        assert!(matches!(result, Err(ConfigError::MissingToken)));
    }

    #[test]
    fn test_traces_token_from_env() {
        let settings = ExportSettings::for_traces(
            None,
            &AdvancedOptions::default(),
            env_from(&[(ENV_TOKEN, "env-tok")]),
        )
        .unwrap();
        assert_eq!(settings.headers.get(AUTHORIZATION).unwrap(), "Bearer env-tok");
    }

    #[test]
    fn test_traces_endpoint_already_complete() {
        let advanced = AdvancedOptions::default().with_base_url("http://localhost:5418/v1/traces");
        let settings = ExportSettings::for_traces(Some("t"), &advanced, env_from(&[])).unwrap();
        assert_eq!(settings.endpoint.as_str(), "http://localhost:5418/v1/traces");
    }

    #[test]
    fn test_traces_endpoint_replaces_base_path() {
        let advanced = AdvancedOptions::default().with_base_url("http://localhost:8080/api/");
        let settings = ExportSettings::for_traces(Some("t"), &advanced, env_from(&[])).unwrap();
        assert_eq!(settings.endpoint.as_str(), "http://localhost:8080/v1/traces");
    }

    #[test]
    fn test_base_url_precedence() {
        let env = env_from(&[(ENV_BASE_URL, "http://env:1")]);
        let settings =
            ExportSettings::for_traces(Some("t"), &AdvancedOptions::default(), &env).unwrap();
        assert_eq!(settings.endpoint.as_str(), "http://env:1/v1/traces");

        let advanced = AdvancedOptions::default().with_base_url("http://advanced:2");
        let settings = ExportSettings::for_traces(Some("t"), &advanced, &env).unwrap();
        assert_eq!(settings.endpoint.as_str(), "http://advanced:2/v1/traces");

        let settings =
            ExportSettings::for_logs(Some("t"), Some("http://explicit:3"), &advanced, &env)
                .unwrap();
        assert_eq!(settings.endpoint.as_str(), "http://explicit:3/v1/logs");
    }

    #[test]
    fn test_empty_base_url_is_error() {
        let advanced = AdvancedOptions::default().with_base_url("");
        let result = ExportSettings::for_traces(Some("t"), &advanced, env_from(&[]));
        assert!(matches!(result, Err(ConfigError::MissingBaseUrl)));
    }

    #[test]
    fn test_invalid_base_url() {
        let advanced = AdvancedOptions::default().with_base_url("not a url");
        let result = ExportSettings::for_traces(Some("t"), &advanced, env_from(&[]));
        assert!(matches!(result, Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn test_additional_headers_override() {
        let advanced = AdvancedOptions::default()
            .with_header("X-Custom-Header", "value")
            .with_header("User-Agent", "custom/1.0");
        let settings = ExportSettings::for_traces(Some("t"), &advanced, env_from(&[])).unwrap();
        assert_eq!(settings.headers.get("x-custom-header").unwrap(), "value");
        assert_eq!(settings.headers.get(USER_AGENT).unwrap(), "custom/1.0");
    }

    #[test]
    fn test_invalid_header_name() {
        let advanced = AdvancedOptions::default().with_header("Bad Header", "v");
        let result = ExportSettings::for_traces(Some("t"), &advanced, env_from(&[]));
        assert!(matches!(result, Err(ConfigError::InvalidHeader { .. })));
    }

    #[test]
    fn test_logs_endpoint_appends_path() {
        let advanced = AdvancedOptions::default().with_base_url("http://localhost:8080/api/");
        let settings = ExportSettings::for_logs(Some("t"), None, &advanced, env_from(&[])).unwrap();
        assert_eq!(settings.endpoint.as_str(), "http://localhost:8080/api/v1/logs");

        let advanced = AdvancedOptions::default().with_base_url("http://localhost:8080/v1/logs");
        let settings = ExportSettings::for_logs(Some("t"), None, &advanced, env_from(&[])).unwrap();
        assert_eq!(settings.endpoint.as_str(), "http://localhost:8080/v1/logs");
    }

    #[test]
    fn test_logs_without_token_omits_authorization() {
        let settings =
            ExportSettings::for_logs(None, None, &AdvancedOptions::default(), env_from(&[]))
                .unwrap();
        assert!(settings.headers.get(AUTHORIZATION).is_none());
        assert!(settings.headers.get(USER_AGENT).is_none());
    }

    #[test]
    fn test_header_pairs_are_lowercase_strings() {
        let advanced = AdvancedOptions::default().with_header("X-Custom-Header", "value");
        let settings = ExportSettings::for_traces(Some("t"), &advanced, env_from(&[])).unwrap();
        let pairs = settings.header_pairs();
        assert_eq!(pairs.get("authorization").map(String::as_str), Some("Bearer t"));
        assert_eq!(pairs.get("x-custom-header").map(String::as_str), Some("value"));
        assert_eq!(pairs.len(), 3);
    }

    #[test]
    fn test_shared_id_generator_delegates() {
        let shared = SharedIdGenerator(Arc::new(crate::testing::IncrementalIdGenerator::new()));
        let copy = shared.clone();
        assert_eq!(shared.new_trace_id(), TraceId::from_bytes(1u128.to_be_bytes()));
        assert_eq!(copy.new_trace_id(), TraceId::from_bytes(2u128.to_be_bytes()));
        assert_eq!(copy.new_span_id(), SpanId::from_bytes(1u64.to_be_bytes()));
    }
}
