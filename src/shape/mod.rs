//! Response shaping: reduce a raw completion response to the payload emitted for an item.
//!
//! | Mode | Payload |
//! |------|---------|
//! | [`OutputMode::Full`] | raw response + `debug` block + `_request_metadata` |
//! | [`OutputMode::Simplified`] | first choice as `{index, message, logprobs, finish_reason}` |
//! | [`OutputMode::Raw`] | raw response, untouched |
//!
//! JSON-content parsing is an orthogonal post-processing step applied after the
//! mode, see [`json_content`].

pub mod json_content;

use crate::request::OutputFlags;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Full,
    Simplified,
    Raw,
}

/// Resolved shaping configuration for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeOptions {
    pub mode: OutputMode,
    pub content_as_json: bool,
    /// Attach the debug block in simplified and raw mode too.
    pub include_debug: bool,
}

impl Default for ShapeOptions {
    fn default() -> Self {
        OutputFlags::default().into()
    }
}

impl From<OutputFlags> for ShapeOptions {
    fn from(flags: OutputFlags) -> Self {
        // full_response wins over simplify
        let mode = if flags.full_response {
            OutputMode::Full
        } else if flags.simplify {
            OutputMode::Simplified
        } else {
            OutputMode::Raw
        };
        Self {
            mode,
            content_as_json: flags.content_as_json,
            include_debug: flags.include_debug,
        }
    }
}

/// What was actually requested, echoed back for troubleshooting.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugInfo {
    pub seed_used: Option<i32>,
    pub temperature: Option<f64>,
    pub determinism_enabled: bool,
}

impl DebugInfo {
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(
            "seedUsed".into(),
            self.seed_used
                .map(Value::from)
                .unwrap_or_else(|| Value::from("not_used")),
        );
        map.insert(
            "temperature".into(),
            self.temperature
                .map(Value::from)
                .unwrap_or_else(|| Value::from("default")),
        );
        map.insert(
            "determinismEnabled".into(),
            Value::Bool(self.determinism_enabled),
        );
        Value::Object(map)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestMetadata {
    pub deployment: String,
    pub api_version: String,
    pub endpoint: String,
    pub request_body: Value,
}

impl RequestMetadata {
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("deployment".into(), Value::from(self.deployment.as_str()));
        map.insert("api_version".into(), Value::from(self.api_version.as_str()));
        map.insert(
            "endpoint".into(),
            Value::from(self.endpoint.trim_end_matches('/')),
        );
        map.insert("request_body".into(), self.request_body.clone());
        Value::Object(map)
    }
}

/// Per-request facts the shaper may echo into the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeContext {
    pub debug: DebugInfo,
    /// Only needed in full mode.
    pub metadata: Option<RequestMetadata>,
}

/// Shape a raw response according to `options`.
pub fn shape(response: Value, options: &ShapeOptions, ctx: &ShapeContext) -> Value {
    let mut payload = match options.mode {
        OutputMode::Full => full(response, ctx),
        OutputMode::Simplified => simplified(response),
        OutputMode::Raw => response,
    };

    if options.include_debug && options.mode != OutputMode::Full {
        insert(&mut payload, "debug", ctx.debug.to_value());
    }
    if options.content_as_json {
        json_content::parse_message_content(&mut payload);
    }
    payload
}

fn full(mut response: Value, ctx: &ShapeContext) -> Value {
    insert(&mut response, "debug", ctx.debug.to_value());
    if let Some(metadata) = &ctx.metadata {
        insert(&mut response, "_request_metadata", metadata.to_value());
    }
    response
}

/// First choice re-emitted in the canonical shape; falls back to the raw response
/// when there is no choice.
fn simplified(response: Value) -> Value {
    let choice = match response.pointer("/choices/0").and_then(Value::as_object) {
        Some(choice) => choice.clone(),
        None => return response,
    };

    let field = |key: &str| choice.get(key).cloned().unwrap_or(Value::Null);
    // falsy logprobs collapse to null
    let logprobs = match choice.get("logprobs") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Value::Null,
        Some(Value::String(s)) if s.is_empty() => Value::Null,
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => Value::Null,
        Some(v) => v.clone(),
    };

    let mut map = Map::new();
    map.insert("index".into(), field("index"));
    map.insert("message".into(), field("message"));
    map.insert("logprobs".into(), logprobs);
    map.insert("finish_reason".into(), field("finish_reason"));
    Value::Object(map)
}

fn insert(payload: &mut Value, key: &str, value: Value) {
    if let Value::Object(map) = payload {
        map.insert(key.to_string(), value);
    }
}
