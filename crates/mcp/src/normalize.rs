//! Tool-result normalization.
//!
//! `tools/call` responses arrive in one of three wire shapes: a structured
//! JSON value, an MCP content-block envelope, or free text. Downstream code
//! (the conversation loop, trace rendering) wants a single
//! [`serde_json::Value`] per call. [`normalize`] is the total function that
//! gets it there; it never fails, unexpected shapes degrade to text.

use serde_json::Value;

use crate::types::ToolContent;

/// A raw `tools/call` response, classified at the protocol boundary.
///
/// The gateway produces exactly one of these per successful call; server
/// errors (JSON-RPC error objects, `isError` envelopes) are reported as
/// [`crate::GatewayError::ToolExecution`] before this type is built.
#[derive(Debug, Clone)]
pub enum RawToolResponse {
    /// The server returned a JSON object or array directly.
    Structured(Value),
    /// The server returned an MCP content-block envelope.
    ContentBlocks(Vec<ToolContent>),
    /// Anything else, carried as text.
    Opaque(String),
}

impl RawToolResponse {
    /// Classify a bare JSON value (a `tools/call` result that is not a
    /// content-block envelope).
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(_) | Value::Array(_) => RawToolResponse::Structured(value),
            Value::String(s) => RawToolResponse::Opaque(s),
            other => RawToolResponse::Opaque(other.to_string()),
        }
    }
}

/// Reduce a raw response to one JSON value.
///
/// Structured values pass through unchanged. For content blocks, each text
/// payload is tried as JSON; if any block parses, the parsed values win and
/// plain-text blocks are dropped (servers that serialize results as JSON
/// text occasionally prepend free-text banners; the data is what matters).
/// A lone value is returned bare, several become an array. If nothing
/// parses, the raw text(s) are returned the same way. Non-text blocks are
/// skipped throughout, and an empty envelope yields an empty array.
pub fn normalize(raw: RawToolResponse) -> Value {
    match raw {
        RawToolResponse::Structured(value) => value,
        RawToolResponse::ContentBlocks(blocks) => normalize_blocks(blocks),
        RawToolResponse::Opaque(text) => Value::String(text),
    }
}

fn normalize_blocks(blocks: Vec<ToolContent>) -> Value {
    let mut parsed = Vec::new();
    let mut raw = Vec::new();
    for block in blocks {
        if let ToolContent::Text { text } = block {
            match serde_json::from_str::<Value>(&text) {
                Ok(value) => parsed.push(value),
                Err(_) => raw.push(Value::String(text)),
            }
        }
    }
    if parsed.is_empty() {
        single_or_array(raw)
    } else {
        single_or_array(parsed)
    }
}

fn single_or_array(mut values: Vec<Value>) -> Value {
    if values.len() == 1 {
        values.swap_remove(0)
    } else {
        Value::Array(values)
    }
}
