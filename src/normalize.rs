//! Payload normalization.
//!
//! Upstream senders do not agree on a body shape: some post the Alertmanager
//! envelope (`{"alerts": [...]}`), some a bare array, some a single alert, and
//! some double-encode any of those as a JSON string. Everything is reduced to
//! an ordered list of candidates here; judging the individual candidates is
//! left to the extractor.

use serde_json::{Map, Value};
use thiserror::Error;

/// The top-level shape of a decoded request body.
#[derive(Debug, PartialEq)]
pub enum RawPayload {
    /// `{"alerts": [...]}`
    Envelope(Vec<Value>),
    /// `[...]`
    Sequence(Vec<Value>),
    /// Any other object, treated as a single alert.
    Mapping(Map<String, Value>),
    /// A string that may itself hold JSON.
    Encoded(String),
    /// Numbers, booleans and null.
    Unsupported(&'static str),
}

impl From<Value> for RawPayload {
    fn from(raw: Value) -> Self {
        match raw {
            Value::Object(mut map) => match map.remove("alerts") {
                Some(Value::Array(alerts)) => RawPayload::Envelope(alerts),
                Some(other) => {
                    // Not an envelope after all; keep the object intact.
                    map.insert("alerts".to_string(), other);
                    RawPayload::Mapping(map)
                }
                None => RawPayload::Mapping(map),
            },
            Value::Array(items) => RawPayload::Sequence(items),
            Value::String(text) => RawPayload::Encoded(text),
            Value::Number(_) => RawPayload::Unsupported("number"),
            Value::Bool(_) => RawPayload::Unsupported("boolean"),
            Value::Null => RawPayload::Unsupported("null"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ShapeError {
    #[error("body is not valid JSON: {0}")]
    Undecodable(#[from] serde_json::Error),

    #[error("top-level JSON {0} cannot carry alerts")]
    Unsupported(&'static str),
}

/// A request body that could not be turned into a candidate list.
#[derive(Error, Debug)]
#[error("invalid payload (raw length {raw_length}): {source}")]
pub struct InvalidPayload {
    /// Length of the raw body in characters.
    pub raw_length: usize,
    #[source]
    pub source: ShapeError,
}

/// Resolves a decoded body into its ordered list of alert candidates.
pub fn normalize(raw: Value) -> Result<Vec<Value>, ShapeError> {
    match RawPayload::from(raw) {
        RawPayload::Envelope(alerts) => Ok(alerts),
        RawPayload::Sequence(items) => Ok(items),
        RawPayload::Mapping(map) => Ok(vec![Value::Object(map)]),
        RawPayload::Encoded(text) => Ok(match serde_json::from_str::<Value>(&text) {
            Ok(Value::Array(items)) => items,
            Ok(Value::Object(map)) => vec![Value::Object(map)],
            // Kept as a single candidate so it is counted and skipped downstream.
            _ => vec![Value::String(text)],
        }),
        RawPayload::Unsupported(kind) => Err(ShapeError::Unsupported(kind)),
    }
}

/// Decodes a raw request body and normalizes it.
pub fn decode_body(body: &[u8]) -> Result<Vec<Value>, InvalidPayload> {
    serde_json::from_slice::<Value>(body)
        .map_err(ShapeError::from)
        .and_then(normalize)
        .map_err(|source| InvalidPayload {
            raw_length: String::from_utf8_lossy(body).chars().count(),
            source,
        })
}
