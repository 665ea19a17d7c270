//! Field extraction for a single alert candidate.

use crate::core::{CanonicalAlert, DEFAULT_INSTANCE, DEFAULT_NAME, DEFAULT_STATUS};
use serde_json::{Map, Value};
use std::borrow::Cow;
use thiserror::Error;

/// Why a candidate could not be turned into a `CanonicalAlert`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("not JSON-deserializable (len={0})")]
    NotDeserializable(usize),

    #[error("unexpected type {0}")]
    UnexpectedType(&'static str),

    /// An internal fault while handling the element. Unlike the other
    /// variants this is reported back to the sender.
    #[error("{0}")]
    Fault(String),
}

impl ExtractError {
    pub fn is_fault(&self) -> bool {
        matches!(self, ExtractError::Fault(_))
    }
}

/// Extracts a `CanonicalAlert` from one candidate.
///
/// Missing or malformed `labels` / `annotations` never fail extraction; they
/// are read as empty mappings and the defaults apply.
pub fn extract(candidate: &Value) -> Result<CanonicalAlert, ExtractError> {
    let decoded;
    let alert = match candidate {
        Value::Object(map) => map,
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => {
                decoded = map;
                &decoded
            }
            _ => return Err(ExtractError::NotDeserializable(text.chars().count())),
        },
        other => return Err(ExtractError::UnexpectedType(type_name(other))),
    };

    let empty = Map::new();
    let labels = sub_mapping(alert, "labels").unwrap_or(&empty);
    let annotations = sub_mapping(alert, "annotations").unwrap_or(&empty);

    let name = text_field(labels, "alertname").unwrap_or(Cow::Borrowed(DEFAULT_NAME));
    let instance = text_field(labels, "instance")
        .or_else(|| text_field(labels, "host"))
        .unwrap_or(Cow::Borrowed(DEFAULT_INSTANCE));
    let summary = non_empty(text_field(annotations, "summary"))
        .or_else(|| non_empty(text_field(annotations, "description")))
        .unwrap_or_default();
    let status = text_field(alert, "status").unwrap_or(Cow::Borrowed(DEFAULT_STATUS));

    Ok(CanonicalAlert {
        status: status.into_owned(),
        name: name.into_owned(),
        instance: instance.into_owned(),
        summary: summary.into_owned(),
    })
}

fn sub_mapping<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    map.get(key).and_then(Value::as_object)
}

/// Reads a field for display. Strings are used verbatim, other values are
/// rendered as compact JSON; absent and null fields yield `None`.
fn text_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<Cow<'a, str>> {
    match map.get(key)? {
        Value::Null => None,
        Value::String(text) => Some(Cow::Borrowed(text.as_str())),
        other => Some(Cow::Owned(other.to_string())),
    }
}

fn non_empty(value: Option<Cow<'_, str>>) -> Option<Cow<'_, str>> {
    value.filter(|text| !text.is_empty())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
