//! Wire protocol: request/response envelopes and cache-key derivation.
//!
//! Every message is one JSON object on one line.
//!
//! ```text
//! request   {"mode": "calc"|"gpt", "data": {...}, "options": {"cache": bool}}
//! success   {"ok": true, "result": number|string,
//!            "meta": {"from_cache": bool, "took_ms": int, "from_proxy_cache"?: bool}}
//! failure   {"ok": false, "error": string}
//! ```
//!
//! Decoding happens in two stages so the failure class is precise: bytes to
//! a JSON value ([`decode_frame`], failing as `Malformed`), then the value to
//! a typed [`Request`] ([`Request::from_value`], failing as `Bad request`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::ServiceError;
use crate::framer::encode_frame;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Request mode names as they appear on the wire.
pub const MODE_CALC: &str = "calc";
/// See [`MODE_CALC`].
pub const MODE_GPT: &str = "gpt";

/// The work a request asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Evaluate an arithmetic expression.
    Calc {
        /// Expression source.
        expr: String,
    },
    /// Generate text from a prompt.
    Gpt {
        /// Prompt text.
        prompt: String,
    },
}

/// A validated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// What to compute.
    pub task: Task,
    /// Whether the caller allows cached results (`options.cache`).
    pub cache: bool,
}

impl Request {
    /// A `calc` request with caching enabled.
    #[must_use]
    pub fn calc(expr: impl Into<String>) -> Self {
        Self { task: Task::Calc { expr: expr.into() }, cache: true }
    }

    /// A `gpt` request with caching enabled.
    #[must_use]
    pub fn gpt(prompt: impl Into<String>) -> Self {
        Self { task: Task::Gpt { prompt: prompt.into() }, cache: true }
    }

    /// Set `options.cache`.
    #[must_use]
    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// Wire mode name.
    #[must_use]
    pub fn mode(&self) -> &'static str {
        match self.task {
            Task::Calc { .. } => MODE_CALC,
            Task::Gpt { .. } => MODE_GPT,
        }
    }

    /// Build the wire envelope.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let data = match &self.task {
            Task::Calc { expr } => json!({ "expr": expr }),
            Task::Gpt { prompt } => json!({ "prompt": prompt }),
        };
        json!({ "mode": self.mode(), "data": data, "options": { "cache": self.cache } })
    }

    /// Validate a decoded envelope.
    ///
    /// # Errors
    /// [`ServiceError::BadRequest`] when the value is not an object, `data`
    /// is not an object, the mode is unknown, or the mode-specific field is
    /// missing, empty, or not a string.
    pub fn from_value(value: &Value) -> Result<Self, ServiceError> {
        let envelope = value
            .as_object()
            .ok_or_else(|| ServiceError::BadRequest("request must be a JSON object".into()))?;
        let data = data_of(envelope)?;
        let cache = cache_option(value);

        let task = match envelope.get("mode").and_then(Value::as_str) {
            Some(MODE_CALC) => Task::Calc { expr: required_string(data, "expr")? },
            Some(MODE_GPT) => Task::Gpt { prompt: required_string(data, "prompt")? },
            _ => return Err(ServiceError::BadRequest("unknown mode".into())),
        };
        Ok(Self { task, cache })
    }
}

/// Read `options.cache` by JSON truthiness.
///
/// Absent (or `options` itself absent or not an object) means `true`.
/// `false`, `null`, `0`, `""`, `[]` and `{}` mean `false`; any other value
/// means `true`.
#[must_use]
pub fn cache_option(value: &Value) -> bool {
    value
        .get("options")
        .and_then(Value::as_object)
        .and_then(|options| options.get("cache"))
        .is_none_or(truthy)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn data_of(envelope: &Map<String, Value>) -> Result<Option<&Map<String, Value>>, ServiceError> {
    match envelope.get("data") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(data)) => Ok(Some(data)),
        Some(_) => Err(ServiceError::BadRequest("'data' must be an object".into())),
    }
}

fn required_string(data: Option<&Map<String, Value>>, field: &str) -> Result<String, ServiceError> {
    match data.and_then(|d| d.get(field)).and_then(Value::as_str) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(ServiceError::BadRequest(format!("'{field}' is required (string)"))),
    }
}

/// Decode one frame into a JSON value.
///
/// # Errors
/// [`ServiceError::Malformed`] when the bytes are not valid UTF-8 JSON.
pub fn decode_frame(frame: &[u8]) -> Result<Value, ServiceError> {
    serde_json::from_slice(frame).map_err(|e| ServiceError::Malformed(e.to_string()))
}

/// Encode a JSON value as one frame.
#[must_use]
pub fn encode_value(value: &Value) -> Vec<u8> {
    // Serializing a `Value` into memory cannot fail.
    encode_frame(serde_json::to_vec(value).unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Cache keys
// ---------------------------------------------------------------------------

/// Serialize `value` with object keys sorted at every level.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Server cache key: the whole request envelope, `options` included.
///
/// Two requests that differ only in `options` therefore occupy different
/// server cache slots.
#[must_use]
pub fn server_cache_key(request: &Value) -> String {
    canonical_json(request)
}

/// Proxy cache key: `mode` plus the sorted `data` entries, `options` excluded.
///
/// `None` unless `mode` is a string and `data` an object; such requests are
/// forwarded without touching the proxy cache.
#[must_use]
pub fn proxy_cache_key(request: &Value) -> Option<String> {
    let mode = request.get("mode")?.as_str()?;
    let mut entries: Vec<_> = request.get("data")?.as_object()?.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    let data: Vec<Value> = entries.into_iter().map(|(k, v)| json!([k, v])).collect();
    Some(canonical_json(&json!([mode, data])))
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// A successful result: a number for `calc`, text for `gpt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Output {
    /// Evaluator result.
    Number(f64),
    /// Generated text.
    Text(String),
}

impl Output {
    /// The numeric value, if this is a number.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    /// The text, if this is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(_) => None,
        }
    }
}

/// Response metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// The server answered from its cache.
    #[serde(default)]
    pub from_cache: bool,
    /// Server-side processing time in milliseconds.
    #[serde(default)]
    pub took_ms: u64,
    /// The proxy answered from its cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_proxy_cache: Option<bool>,
}

/// Response envelope. Exactly one of `result` and `error` is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Whether the request succeeded.
    pub ok: bool,
    /// Result on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Output>,
    /// `"<classification>: <detail>"` on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Metadata on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl Response {
    /// A success envelope.
    #[must_use]
    pub fn success(result: Output, from_cache: bool, took_ms: u64) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
            meta: Some(Meta { from_cache, took_ms, from_proxy_cache: None }),
        }
    }

    /// A failure envelope.
    #[must_use]
    pub fn failure(error: &ServiceError) -> Self {
        Self { ok: false, result: None, error: Some(error.to_string()), meta: None }
    }

    /// Mark a copy of a cached envelope as served by the proxy. Envelopes
    /// without `meta` are left as they are.
    #[must_use]
    pub fn from_proxy_cache(mut self) -> Self {
        if let Some(meta) = self.meta.as_mut() {
            meta.from_proxy_cache = Some(true);
        }
        self
    }

    /// Decode a response frame.
    ///
    /// # Errors
    /// [`ServiceError::Malformed`] when the frame is not a response envelope.
    pub fn decode(frame: &[u8]) -> Result<Self, ServiceError> {
        serde_json::from_slice(frame).map_err(|e| ServiceError::Malformed(e.to_string()))
    }

    /// Encode as one newline-terminated frame.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        match serde_json::to_vec(self) {
            Ok(bytes) => encode_frame(bytes),
            Err(e) => {
                let fallback = Self::failure(&ServiceError::Malformed(format!("unencodable response: {e}")));
                encode_frame(serde_json::to_vec(&fallback).unwrap_or_default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_through_wire_value() {
        let request = Request::calc("1 + 1").with_cache(false);
        let value = request.to_value();
        assert_eq!(value["mode"], "calc");
        assert_eq!(value["data"]["expr"], "1 + 1");
        assert_eq!(value["options"]["cache"], false);
        assert_eq!(Request::from_value(&value).expect("valid"), request);
    }

    #[test]
    fn missing_options_default_to_caching() {
        let value = json!({"mode": "gpt", "data": {"prompt": "hi"}});
        assert_eq!(Request::from_value(&value).expect("valid"), Request::gpt("hi"));
    }

    #[test]
    fn cache_option_follows_json_truthiness() {
        let with = |cache: Value| cache_option(&json!({"mode": "calc", "options": {"cache": cache}}));
        for off in [json!(false), json!(null), json!(0), json!(0.0), json!(""), json!([]), json!({})] {
            assert!(!with(off.clone()), "{off} should disable caching");
        }
        for on in [json!(true), json!(1), json!(-2.5), json!("no"), json!([0]), json!({"a": 1})] {
            assert!(with(on.clone()), "{on} should enable caching");
        }
        assert!(cache_option(&json!({"mode": "calc"})));
        assert!(cache_option(&json!({"mode": "calc", "options": null})));
        assert!(cache_option(&json!({"mode": "calc", "options": {}})));
    }

    #[test]
    fn validation_errors() {
        let bad = |v: Value| Request::from_value(&v).expect_err("should be rejected").to_string();
        assert_eq!(bad(json!({"mode": "calc", "data": {}})), "Bad request: 'expr' is required (string)");
        assert_eq!(bad(json!({"mode": "calc"})), "Bad request: 'expr' is required (string)");
        assert_eq!(bad(json!({"mode": "calc", "data": {"expr": ""}})), "Bad request: 'expr' is required (string)");
        assert_eq!(bad(json!({"mode": "calc", "data": {"expr": 5}})), "Bad request: 'expr' is required (string)");
        assert_eq!(bad(json!({"mode": "gpt", "data": {"expr": "x"}})), "Bad request: 'prompt' is required (string)");
        assert_eq!(bad(json!({"mode": "shell", "data": {"cmd": "ls"}})), "Bad request: unknown mode");
        assert_eq!(bad(json!({"data": {"expr": "1"}})), "Bad request: unknown mode");
        assert_eq!(bad(json!({"mode": "calc", "data": "1+1"})), "Bad request: 'data' must be an object");
        assert_eq!(bad(json!([1, 2])), "Bad request: request must be a JSON object");
    }

    #[test]
    fn decode_failure_is_malformed() {
        let err = decode_frame(b"{not json").expect_err("invalid json");
        assert!(err.to_string().starts_with("Malformed: "));
        assert!(decode_frame(b"").is_err());
    }

    #[test]
    fn canonical_json_sorts_nested_keys() {
        let a: Value = serde_json::from_str(r#"{"b": {"y": 1, "x": 2}, "a": [3, {"d": 4, "c": 5}]}"#).expect("json");
        assert_eq!(canonical_json(&a), r#"{"a":[3,{"c":5,"d":4}],"b":{"x":2,"y":1}}"#);
    }

    #[test]
    fn server_key_includes_options() {
        let cached = Request::calc("sin(0)").to_value();
        let uncached = Request::calc("sin(0)").with_cache(false).to_value();
        assert_ne!(server_cache_key(&cached), server_cache_key(&uncached));
    }

    #[test]
    fn proxy_key_ignores_options() {
        let cached = Request::calc("sin(0)").to_value();
        let uncached = Request::calc("sin(0)").with_cache(false).to_value();
        assert!(proxy_cache_key(&cached).is_some());
        assert_eq!(proxy_cache_key(&cached), proxy_cache_key(&uncached));
        assert_ne!(proxy_cache_key(&cached), proxy_cache_key(&Request::calc("cos(0)").to_value()));
        assert_ne!(proxy_cache_key(&cached), proxy_cache_key(&Request::gpt("sin(0)").to_value()));
    }

    #[test]
    fn proxy_key_needs_string_mode_and_object_data() {
        assert_eq!(proxy_cache_key(&json!([1, 2])), None);
        assert_eq!(proxy_cache_key(&json!({})), None);
        assert_eq!(proxy_cache_key(&json!({"foo": 1})), None);
        assert_eq!(proxy_cache_key(&json!({"mode": 7, "data": {}})), None);
        assert_eq!(proxy_cache_key(&json!({"mode": "calc", "data": "1+1"})), None);
        assert_eq!(proxy_cache_key(&json!({"mode": "calc"})), None);
        assert_eq!(
            proxy_cache_key(&json!({"mode": "calc", "data": {"expr": "1", "b": 2}})).as_deref(),
            Some(r#"["calc",[["b",2],["expr","1"]]]"#)
        );
    }

    #[test]
    fn response_wire_shapes() {
        let ok = Response::success(Output::Number(4.0), false, 3);
        assert_eq!(
            String::from_utf8(ok.encode()).expect("utf8"),
            "{\"ok\":true,\"result\":4.0,\"meta\":{\"from_cache\":false,\"took_ms\":3}}\n"
        );

        let err = Response::failure(&ServiceError::BadRequest("unknown mode".into()));
        assert_eq!(
            String::from_utf8(err.encode()).expect("utf8"),
            "{\"ok\":false,\"error\":\"Bad request: unknown mode\"}\n"
        );
    }

    #[test]
    fn proxy_mark_only_touches_meta() {
        let ok = Response::success(Output::Text("hi".into()), true, 0).from_proxy_cache();
        assert_eq!(ok.meta.as_ref().and_then(|m| m.from_proxy_cache), Some(true));

        let err = Response::failure(&ServiceError::Upstream("down".into())).from_proxy_cache();
        assert!(err.meta.is_none());
    }

    #[test]
    fn integer_results_decode_as_numbers() {
        let resp = Response::decode(br#"{"ok":true,"result":1024,"meta":{"from_cache":true,"took_ms":0}}"#)
            .expect("decode");
        assert_eq!(resp.result.and_then(|r| r.as_f64()), Some(1024.0));
    }
}
