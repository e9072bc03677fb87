//! Grouping of flattened, index-addressed attribute keys
//!
//! Keys look like `{prefix}.{index}.{member}.{field}`, for example
//! `llm.input_messages.0.message.role`. Grouping runs in two passes: collect
//! the distinct indices, then assemble each index's fields. Groups come back
//! in ascending index order and sparse indices are never zero-filled.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use opentelemetry::Value;

use crate::schema::Attributes;

/// Split `{prefix}.{index}.{member}.{field}` into `(index, field)`.
pub fn split_indexed_key<'k>(key: &'k str, prefix: &str, member: &str) -> Option<(usize, &'k str)> {
    let rest = key.strip_prefix(prefix)?.strip_prefix('.')?;
    let (idx, rest) = rest.split_once('.')?;
    if idx.is_empty() || !idx.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let field = rest.strip_prefix(member)?.strip_prefix('.')?;
    if field.is_empty() {
        return None;
    }
    Some((idx.parse().ok()?, field))
}

/// Distinct indices present under `prefix`/`member`, ascending.
pub fn extract_indices(attrs: &Attributes, prefix: &str, member: &str) -> BTreeSet<usize> {
    collect_indices(attrs.keys().map(String::as_str), prefix, member)
}

/// Group attributes by index, each group keyed by the trailing field path.
pub fn group_by_index<'a>(
    attrs: &'a Attributes,
    prefix: &str,
    member: &str,
) -> BTreeMap<usize, IndexedGroup<'a>> {
    group_entries(attrs.iter().map(|(k, v)| (k.as_str(), v)), prefix, member)
}

/// Fields belonging to one index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexedGroup<'a> {
    fields: BTreeMap<&'a str, &'a Value>,
}

impl<'a> IndexedGroup<'a> {
    pub fn get(&self, field: &str) -> Option<&'a Value> {
        self.fields.get(field).copied()
    }

    /// String field; non-string values are ignored
    pub fn get_str(&self, field: &str) -> Option<&'a str> {
        match self.get(field)? {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Any scalar field rendered as text
    pub fn text(&self, field: &str) -> Option<Cow<'a, str>> {
        self.get(field).map(Value::as_str)
    }

    /// Second-level grouping, e.g. `tool_calls.{n}.tool_call.{field}`
    pub fn nested(&self, prefix: &str, member: &str) -> BTreeMap<usize, IndexedGroup<'a>> {
        group_entries(self.fields.iter().map(|(k, v)| (*k, *v)), prefix, member)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn collect_indices<'a>(
    keys: impl Iterator<Item = &'a str>,
    prefix: &str,
    member: &str,
) -> BTreeSet<usize> {
    keys.filter_map(|k| split_indexed_key(k, prefix, member).map(|(idx, _)| idx))
        .collect()
}

fn group_entries<'a, I>(entries: I, prefix: &str, member: &str) -> BTreeMap<usize, IndexedGroup<'a>>
where
    I: Iterator<Item = (&'a str, &'a Value)> + Clone,
{
    let mut groups: BTreeMap<usize, IndexedGroup<'a>> =
        collect_indices(entries.clone().map(|(k, _)| k), prefix, member)
            .into_iter()
            .map(|idx| (idx, IndexedGroup::default()))
            .collect();

    for (key, value) in entries {
        let Some((idx, field)) = split_indexed_key(key, prefix, member) else {
            continue;
        };
        if let Some(group) = groups.get_mut(&idx) {
            group.fields.insert(field, value);
        }
    }
    groups
}
