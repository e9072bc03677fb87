//! Event client
//!
//! [`IntrospectionClient`] records product events, feedback and user identity
//! as OTLP log records. Identity and conversation context travel as
//! OpenTelemetry baggage: `identify` and the `set_*` calls attach it to the
//! current thread's context and return a [`ContextGuard`] that restores the
//! previous context when dropped.
//!
//! ```text
//! track / feedback / identify
//!   → attributes: event.name, event.id, identity + gen_ai context (baggage),
//!                 properties.<k>, context.traits.<k>
//!   → SdkLogRecord (INFO, active span context)
//!   → batch log processor → log exporter
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use opentelemetry::baggage::BaggageExt;
use opentelemetry::logs::{AnyValue, LogRecord as _, Logger as _, LoggerProvider as _, Severity};
use opentelemetry::trace::TraceContextExt;
use opentelemetry::{Context, ContextGuard, InstrumentationScope, KeyValue};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::logs::{LogExporter, SdkLogger, SdkLoggerProvider};
use parking_lot::Mutex;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::core::config::{AdvancedOptions, process_env};
use crate::core::constants::{DEFAULT_SERVICE_NAME, ENV_SERVICE_NAME, SDK_NAME, SDK_VERSION};
use crate::core::error::ConfigError;
use crate::export::{log_exporter, with_platform_log_exporter};
use crate::schema::keys;
use crate::trace::{TimestampGenerator, to_system_time};
use crate::utils::deadline::run_until;
use crate::utils::json::json_to_any_value;

/// Free-form event properties or user traits
pub type Properties = JsonMap<String, JsonValue>;

pub const EVENT_IDENTIFY: &str = "identify";
pub const EVENT_FEEDBACK: &str = "introspection.feedback";

/// Baggage keys. Identity keys use underscores instead of dots.
pub mod baggage_keys {
    pub const USER_ID: &str = "identity.user_id";
    pub const ANONYMOUS_ID: &str = "identity.anonymous_id";
    pub const CONVERSATION_ID: &str = "gen_ai.conversation.id";
    pub const PREVIOUS_RESPONSE_ID: &str = "gen_ai.request.previous_response_id";
    pub const AGENT_NAME: &str = "gen_ai.agent.name";
    pub const AGENT_ID: &str = "gen_ai.agent.id";
}

// ============================================================================
// OPTIONS
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// API token. Falls back to `INTROSPECTION_TOKEN`.
    pub token: Option<String>,
    /// Resource `service.name`. Falls back to `INTROSPECTION_SERVICE_NAME`.
    pub service_name: Option<String>,
    /// Takes precedence over `advanced.base_url`
    pub base_url: Option<String>,
    pub advanced: AdvancedOptions,
}

impl ClientOptions {
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_advanced(mut self, advanced: AdvancedOptions) -> Self {
        self.advanced = advanced;
        self
    }
}

/// Feedback on a message or response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feedback {
    /// Feedback action, e.g. `thumbs_up`
    pub name: String,
    pub comments: Option<String>,
    /// Overrides the conversation id from baggage
    pub conversation_id: Option<String>,
    /// Overrides the previous response id from baggage
    pub previous_response_id: Option<String>,
    pub event_id: Option<String>,
    /// Additional custom properties
    pub extra: Properties,
}

impl Feedback {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = Some(comments.into());
        self
    }

    pub fn with_conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_previous_response_id(mut self, previous_response_id: impl Into<String>) -> Self {
        self.previous_response_id = Some(previous_response_id.into());
        self
    }

    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    fn properties(&self) -> Properties {
        let mut props = Properties::new();
        props.insert("name".to_string(), JsonValue::String(self.name.clone()));
        if let Some(comments) = &self.comments {
            props.insert("comments".to_string(), JsonValue::String(comments.clone()));
        }
        props.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        props
    }
}

/// Log attributes of one event, in insertion order
type EventAttributes = Vec<(String, AnyValue)>;

/// Per-event inputs to attribute building
#[derive(Debug, Default)]
struct EventFields<'a> {
    properties: Option<&'a Properties>,
    traits: Option<&'a Properties>,
    conversation_id: Option<&'a str>,
    previous_response_id: Option<&'a str>,
    event_id: Option<&'a str>,
}

// ============================================================================
// CLIENT
// ============================================================================

#[derive(Debug)]
pub struct IntrospectionClient {
    provider: SdkLoggerProvider,
    logger: SdkLogger,
    clock: Arc<dyn TimestampGenerator>,
    service_name: String,
    /// Traits accumulated by `identify`
    traits: Mutex<Properties>,
}

impl IntrospectionClient {
    /// Export to the Introspection API over OTLP/HTTP.
    ///
    /// A missing token is only a warning: events are best effort.
    pub fn new(options: ClientOptions) -> Result<Self, ConfigError> {
        Self::with_env(options, process_env)
    }

    /// Export through a custom exporter; token and base URL are ignored.
    pub fn with_exporter<E: LogExporter + 'static>(options: ClientOptions, exporter: E) -> Self {
        let service_name = resolve_service_name(options.service_name, process_env);
        Self::build(exporter, service_name, options.advanced)
    }

    fn with_env(
        options: ClientOptions,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let ClientOptions {
            token,
            service_name,
            base_url,
            advanced,
        } = options;

        let service_name = resolve_service_name(service_name, &env);
        let (exporter, settings) =
            log_exporter(token.as_deref(), base_url.as_deref(), &advanced, &env)?;
        tracing::info!(
            service = %service_name,
            endpoint = %settings.endpoint,
            "IntrospectionClient initialized"
        );
        Ok(Self::build(exporter, service_name, advanced))
    }

    fn build<E: LogExporter + 'static>(
        exporter: E,
        service_name: String,
        advanced: AdvancedOptions,
    ) -> Self {
        let builder = SdkLoggerProvider::builder().with_resource(
            Resource::builder()
                .with_service_name(service_name.clone())
                .build(),
        );
        let provider = with_platform_log_exporter(
            builder,
            exporter,
            advanced.max_batch_size,
            advanced.flush_interval_ms,
        )
        .build();
        let logger = provider.logger_with_scope(
            InstrumentationScope::builder(SDK_NAME)
                .with_version(SDK_VERSION)
                .build(),
        );

        Self {
            provider,
            logger,
            clock: advanced.timestamp_generator,
            service_name,
            traits: Mutex::new(Properties::new()),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Track a custom event
    pub fn track(&self, event_name: &str, properties: Option<&Properties>, event_id: Option<&str>) {
        self.emit(
            event_name,
            EventFields {
                properties,
                event_id,
                ..Default::default()
            },
        );
        tracing::debug!(event = event_name, "Tracked");
    }

    pub fn feedback(&self, feedback: &Feedback) {
        let properties = feedback.properties();
        self.emit(
            EVENT_FEEDBACK,
            EventFields {
                properties: Some(&properties),
                conversation_id: feedback.conversation_id.as_deref(),
                previous_response_id: feedback.previous_response_id.as_deref(),
                event_id: feedback.event_id.as_deref(),
                ..Default::default()
            },
        );
        tracing::debug!(name = %feedback.name, "Feedback");
    }

    /// Attach the user's identity as baggage and emit an `identify` event
    /// within it. `traits` are merged into [`traits`](Self::traits).
    #[must_use = "identity is detached when the guard is dropped"]
    pub fn identify(
        &self,
        user_id: &str,
        traits: Option<&Properties>,
        anonymous_id: Option<&str>,
        event_id: Option<&str>,
    ) -> ContextGuard {
        if let Some(traits) = traits {
            self.traits
                .lock()
                .extend(traits.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let mut values = vec![(baggage_keys::USER_ID, user_id)];
        if let Some(anonymous_id) = anonymous_id.filter(|id| !id.is_empty()) {
            values.push((baggage_keys::ANONYMOUS_ID, anonymous_id));
        }
        let guard = self.set_baggage(values);

        self.emit(
            EVENT_IDENTIFY,
            EventFields {
                traits,
                event_id,
                ..Default::default()
            },
        );
        tracing::debug!(user_id, "Identified");
        guard
    }

    /// Attach key/value pairs as baggage until the guard is dropped
    #[must_use = "baggage is detached when the guard is dropped"]
    pub fn set_baggage<K, V>(&self, values: impl IntoIterator<Item = (K, V)>) -> ContextGuard
    where
        K: Into<String>,
        V: Into<String>,
    {
        let entries: Vec<KeyValue> = values
            .into_iter()
            .map(|(key, value)| KeyValue::new(key.into(), value.into()))
            .collect();
        Context::current_with_baggage(entries).attach()
    }

    #[must_use = "baggage is detached when the guard is dropped"]
    pub fn set_user_id(&self, user_id: &str) -> ContextGuard {
        self.set_baggage([(baggage_keys::USER_ID, user_id)])
    }

    #[must_use = "baggage is detached when the guard is dropped"]
    pub fn set_anonymous_id(&self, anonymous_id: &str) -> ContextGuard {
        self.set_baggage([(baggage_keys::ANONYMOUS_ID, anonymous_id)])
    }

    #[must_use = "baggage is detached when the guard is dropped"]
    pub fn set_agent(&self, agent_name: &str, agent_id: Option<&str>) -> ContextGuard {
        let mut values = vec![(baggage_keys::AGENT_NAME, agent_name)];
        if let Some(agent_id) = agent_id.filter(|id| !id.is_empty()) {
            values.push((baggage_keys::AGENT_ID, agent_id));
        }
        self.set_baggage(values)
    }

    #[must_use = "baggage is detached when the guard is dropped"]
    pub fn set_conversation(
        &self,
        conversation_id: Option<&str>,
        previous_response_id: Option<&str>,
    ) -> ContextGuard {
        let values = [
            (baggage_keys::CONVERSATION_ID, conversation_id),
            (baggage_keys::PREVIOUS_RESPONSE_ID, previous_response_id),
        ];
        self.set_baggage(values.into_iter().filter_map(|(key, value)| {
            value.filter(|v| !v.is_empty()).map(|v| (key, v))
        }))
    }

    /// User id from the current baggage
    pub fn user_id(&self) -> Option<String> {
        baggage_value(&Context::current(), baggage_keys::USER_ID)
    }

    /// Anonymous id from the current baggage
    pub fn anonymous_id(&self) -> Option<String> {
        baggage_value(&Context::current(), baggage_keys::ANONYMOUS_ID)
    }

    pub fn traits(&self) -> Properties {
        self.traits.lock().clone()
    }

    /// Forget stored traits, e.g. on logout. Baggage is owned by the guards.
    pub fn reset(&self) {
        self.traits.lock().clear();
        tracing::debug!("Client state reset");
    }

    /// `true` if every pending event was exported within `timeout`
    pub fn flush(&self, timeout: Duration) -> bool {
        tracing::info!("Flushing IntrospectionClient");
        let provider = self.provider.clone();
        match run_until(Instant::now() + timeout, move || provider.force_flush()) {
            Some(Ok(())) => true,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Event flush failed");
                false
            }
            None => {
                tracing::warn!(?timeout, "Event flush timed out");
                false
            }
        }
    }

    pub fn shutdown(&self) -> OTelSdkResult {
        tracing::info!("Shutting down IntrospectionClient");
        self.provider.shutdown()
    }

    fn emit(&self, event_name: &str, fields: EventFields<'_>) {
        let cx = Context::current();
        let timestamp = to_system_time(self.clock.now());

        let mut record = self.logger.create_log_record();
        record.set_timestamp(timestamp);
        record.set_observed_timestamp(timestamp);
        record.set_severity_number(Severity::Info);
        record.set_severity_text(Severity::Info.name());
        record.add_attributes(build_attributes(&cx, event_name, &fields));

        let span_context = cx.span().span_context().clone();
        if span_context.is_valid() {
            record.set_trace_context(
                span_context.trace_id(),
                span_context.span_id(),
                Some(span_context.trace_flags()),
            );
        }
        self.logger.emit(record);
    }
}

/// Explicit name, then `INTROSPECTION_SERVICE_NAME`, then the default
fn resolve_service_name(
    explicit: Option<String>,
    env: impl Fn(&str) -> Option<String>,
) -> String {
    explicit
        .filter(|s| !s.is_empty())
        .or_else(|| env(ENV_SERVICE_NAME).filter(|s| !s.is_empty()))
        .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string())
}

// ============================================================================
// ATTRIBUTES
// ============================================================================

fn build_attributes(cx: &Context, event_name: &str, fields: &EventFields<'_>) -> EventAttributes {
    let mut attrs = EventAttributes::new();
    attrs.push((keys::EVENT_NAME.to_string(), AnyValue::from(event_name.to_string())));

    let event_id = fields
        .event_id
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(generate_event_id);
    attrs.push((keys::EVENT_ID.to_string(), AnyValue::from(event_id)));

    // explicit arguments override baggage
    let conversation_id =
        explicit_or_baggage(cx, fields.conversation_id, baggage_keys::CONVERSATION_ID);
    let previous_response_id = explicit_or_baggage(
        cx,
        fields.previous_response_id,
        baggage_keys::PREVIOUS_RESPONSE_ID,
    );

    let context_values = [
        (keys::USER_ID, baggage_value(cx, baggage_keys::USER_ID)),
        (keys::ANONYMOUS_ID, baggage_value(cx, baggage_keys::ANONYMOUS_ID)),
        (keys::CONVERSATION_ID, conversation_id),
        (keys::PREVIOUS_RESPONSE_ID, previous_response_id),
        (keys::AGENT_NAME, baggage_value(cx, baggage_keys::AGENT_NAME)),
        (keys::AGENT_ID, baggage_value(cx, baggage_keys::AGENT_ID)),
    ];
    for (key, value) in context_values
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
    {
        attrs.push((key.to_string(), AnyValue::from(value)));
    }

    flatten_into(&mut attrs, keys::PROPERTIES_PREFIX, fields.properties);
    flatten_into(&mut attrs, keys::TRAITS_PREFIX, fields.traits);
    attrs
}

/// Prefix each key; nulls are skipped, non-scalars JSON-encoded.
fn flatten_into(attrs: &mut EventAttributes, prefix: &str, values: Option<&Properties>) {
    let Some(values) = values else {
        return;
    };
    for (key, value) in values {
        if value.is_null() {
            continue;
        }
        attrs.push((format!("{}{}", prefix, key), json_to_any_value(value)));
    }
}

fn baggage_value(cx: &Context, key: &'static str) -> Option<String> {
    cx.baggage()
        .get(key)
        .map(|value| value.as_str().into_owned())
        .filter(|value| !value.is_empty())
}

fn explicit_or_baggage(cx: &Context, explicit: Option<&str>, key: &'static str) -> Option<String> {
    explicit
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| baggage_value(cx, key))
}

/// `intro_event_<hex unix millis>-<8 hex>`
fn generate_event_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    format!("intro_event_{:x}-{:08x}", millis, rand::random::<u32>())
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
