//! Best-effort conversion of message content into structured JSON.
//!
//! Models frequently wrap JSON answers in a fenced ```` ```json ```` block. When the
//! content carries such a fence only the fenced text is parsed; otherwise the whole
//! string is tried. A parse failure is never an error: the original string stays.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```json\s*([\s\S]*?)\s*```").expect("fence pattern is valid"));

/// Parse `content` as JSON, looking inside the first ```` ```json ```` fence if present.
pub fn extract_json(content: &str) -> Option<Value> {
    match FENCED_JSON.captures(content) {
        Some(caps) => serde_json::from_str(caps.get(1)?.as_str()).ok(),
        None => serde_json::from_str(content).ok(),
    }
}

/// Replace `payload.message.content` with its parsed form when it is a non-empty
/// string holding JSON. Returns whether the content was replaced.
pub fn parse_message_content(payload: &mut Value) -> bool {
    let Some(content) = payload.pointer_mut("/message/content") else {
        return false;
    };
    let parsed = content
        .as_str()
        .filter(|text| !text.is_empty())
        .and_then(extract_json);
    match parsed {
        Some(value) => {
            *content = value;
            true
        }
        None => false,
    }
}
