//! Attribute-overriding view over a finished span
//!
//! The merged attribute list is computed once at construction; everything
//! else is the wrapped span's data.

use opentelemetry::KeyValue;
use opentelemetry_sdk::trace::SpanData;

use crate::schema::{GenAiAttributes, keys};

#[derive(Debug, Clone)]
pub struct SpanView {
    inner: SpanData,
    attributes: Vec<KeyValue>,
}

impl SpanView {
    /// Drop `llm.*`, `input.*`, `output.*` attributes and merge `converted` on top.
    pub fn new(inner: SpanData, converted: &GenAiAttributes) -> Self {
        let converted = converted.to_key_values();
        let mut attributes: Vec<KeyValue> = inner
            .attributes
            .iter()
            .filter(|kv| {
                let key = kv.key.as_str();
                !keys::OI_PREFIXES.iter().any(|p| key.starts_with(p))
                    && !converted.iter().any(|c| c.key == kv.key)
            })
            .cloned()
            .collect();
        attributes.extend(converted);

        Self { inner, attributes }
    }

    pub fn original(&self) -> &SpanData {
        &self.inner
    }

    pub fn attributes(&self) -> &[KeyValue] {
        &self.attributes
    }

    /// The span as exporters see it: original data, merged attributes
    pub fn into_span_data(self) -> SpanData {
        SpanData {
            attributes: self.attributes,
            ..self.inner
        }
    }
}
