//! Permission codec
//!
//! The list store holds a permission map as JSON in a single text field. Two shapes
//! exist in stored data, with no version tag:
//!
//! ```text
//! compressed (legacy): ["home","news"]              -> every id implies ["read"]
//! verbose:             {"assets":["read","write"]}
//! ```
//!
//! Only the verbose shape is ever written. The compressed shape is decoded so that
//! records written by the old quick editor keep working.

use std::collections::BTreeMap;

use serde_json::Value;

use super::PermissionMap;
use crate::catalog::actions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredShape {
    Empty,
    Compressed,
    Verbose,
    Malformed,
}

impl StoredShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoredShape::Empty => "empty",
            StoredShape::Compressed => "compressed",
            StoredShape::Verbose => "verbose",
            StoredShape::Malformed => "malformed",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("invalid permissions payload at '{path}': {message}")]
    InvalidPayload { path: String, message: String },
    #[error("expected a JSON array or object, found {0}")]
    UnexpectedShape(&'static str),
}

impl From<serde_path_to_error::Error<serde_json::Error>> for CodecError {
    fn from(err: serde_path_to_error::Error<serde_json::Error>) -> Self {
        CodecError::InvalidPayload {
            path: err.path().to_string(),
            message: err.into_inner().to_string(),
        }
    }
}

/// Serialize to the verbose shape. Keys and actions come out sorted, so equal maps
/// always produce identical text.
pub fn encode(map: &PermissionMap) -> String {
    let raw: BTreeMap<&str, Vec<&str>> = map
        .iter()
        .map(|(resource, granted)| (resource, granted.iter().map(String::as_str).collect()))
        .collect();
    serde_json::to_string(&raw).unwrap_or_else(|_| "{}".to_string())
}

/// Parse either stored shape. Malformed or blank text yields an empty map; the
/// failure is logged and never returned.
pub fn decode(text: &str) -> PermissionMap {
    match try_decode(text) {
        Ok(map) => map,
        Err(err) => {
            tracing::warn!(error = %err, payload = %truncate(text), "discarding unreadable permissions payload");
            PermissionMap::new()
        }
    }
}

/// [`decode`] for an optional field value.
pub fn decode_field(text: Option<&str>) -> PermissionMap {
    text.map(decode).unwrap_or_default()
}

pub fn try_decode(text: &str) -> Result<PermissionMap, CodecError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(PermissionMap::new());
    }

    let value: Value = serde_json::from_str(text)?;
    match value {
        Value::Null => Ok(PermissionMap::new()),
        Value::Array(_) => {
            let ids: Vec<String> = serde_path_to_error::deserialize(value)?;
            Ok(PermissionMap::from_pairs(
                ids.into_iter().map(|id| (id, [actions::READ])),
            ))
        }
        Value::Object(_) => {
            let raw: BTreeMap<String, Vec<String>> = serde_path_to_error::deserialize(value)?;
            Ok(PermissionMap::from_pairs(raw))
        }
        Value::Bool(_) => Err(CodecError::UnexpectedShape("a boolean")),
        Value::Number(_) => Err(CodecError::UnexpectedShape("a number")),
        Value::String(_) => Err(CodecError::UnexpectedShape("a string")),
    }
}

pub fn detect_shape(text: &str) -> StoredShape {
    let text = text.trim();
    if text.is_empty() {
        return StoredShape::Empty;
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Null) => StoredShape::Empty,
        Ok(Value::Array(_)) if try_decode(text).is_ok() => StoredShape::Compressed,
        Ok(Value::Object(_)) if try_decode(text).is_ok() => StoredShape::Verbose,
        _ => StoredShape::Malformed,
    }
}

fn truncate(text: &str) -> &str {
    const MAX: usize = 120;
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
