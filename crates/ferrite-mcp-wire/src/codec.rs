use crate::message::{Message, Notification, Request, Response};
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed JSON: {0}")]
    Syntax(String),
    #[error("duplicate key {key:?} in JSON object")]
    DuplicateKey { key: String },
    #[error("unknown field {key:?} in JSON-RPC message")]
    UnknownField { key: String },
    #[error("field {key:?} must be written as {expected:?} (case-sensitive)")]
    CaseMismatch { key: String, expected: String },
    #[error("not a valid JSON-RPC 2.0 message: {0}")]
    NotAMessage(String),
    #[error("message exceeds maximum size of {limit} bytes")]
    TooLarge { limit: usize },
}

/// A wire codec: encodes a [`Message`] to bytes and decodes bytes back. A
/// trait (rather than free functions) so a transport can swap in a
/// different wire format without touching the `Peer` dispatch loop.
pub trait Codec: Send + Sync {
    fn encode(&self, message: &Message) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, bytes: &[u8]) -> Result<Message, CodecError>;
}

/// The default codec: strict, case-sensitive, duplicate-key-rejecting
/// JSON-RPC 2.0 over UTF-8 JSON text.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec {
    max_message_bytes: Option<usize>,
}

impl JsonCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_message_bytes(max: usize) -> Self {
        Self {
            max_message_bytes: Some(max),
        }
    }
}

impl Codec for JsonCodec {
    fn encode(&self, message: &Message) -> Result<Vec<u8>, CodecError> {
        let value = match message {
            Message::Request(r) => serde_json::to_vec(r),
            Message::Response(r) => serde_json::to_vec(r),
            Message::Notification(n) => serde_json::to_vec(n),
        }
        .map_err(|e| CodecError::Syntax(e.to_string()))?;
        if let Some(limit) = self.max_message_bytes {
            if value.len() > limit {
                return Err(CodecError::TooLarge { limit });
            }
        }
        Ok(value)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Message, CodecError> {
        if let Some(limit) = self.max_message_bytes {
            if bytes.len() > limit {
                return Err(CodecError::TooLarge { limit });
            }
        }
        let strict: StrictValue = serde_json::from_slice(bytes)
            .map_err(|e| CodecError::Syntax(e.to_string()))?;
        decode_strict_value(strict.0)
    }
}

/// Every top-level field name across all three message shapes. Used to tell
/// a field that's simply wrong-cased from one that doesn't belong at all.
const KNOWN_ENVELOPE_FIELDS: &[&str] = &["jsonrpc", "id", "method", "params", "result", "error"];
const REQUEST_FIELDS: &[&str] = &["jsonrpc", "id", "method", "params"];
const NOTIFICATION_FIELDS: &[&str] = &["jsonrpc", "method", "params"];
const RESPONSE_FIELDS: &[&str] = &["jsonrpc", "id", "result", "error"];
const ERROR_OBJECT_FIELDS: &[&str] = &["code", "message", "data"];

/// Rejects any key in `obj` that matches one of `known` only case-
/// insensitively (e.g. `"Method"` when `"method"` is the declared name).
/// A key that doesn't match `known` at all, in any case, is left alone —
/// that's [`reject_unknown_fields`]'s job.
fn reject_case_mismatches(obj: &Map<String, Value>, known: &[&str]) -> Result<(), CodecError> {
    for key in obj.keys() {
        if known.contains(&key.as_str()) {
            continue;
        }
        if let Some(canonical) = known.iter().find(|k| k.eq_ignore_ascii_case(key)) {
            return Err(CodecError::CaseMismatch {
                key: key.clone(),
                expected: (*canonical).to_string(),
            });
        }
    }
    Ok(())
}

/// Rejects any key in `obj` not in `allowed`, once case mismatches have
/// already been ruled out by [`reject_case_mismatches`].
fn reject_unknown_fields(obj: &Map<String, Value>, allowed: &[&str]) -> Result<(), CodecError> {
    for key in obj.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(CodecError::UnknownField { key: key.clone() });
        }
    }
    Ok(())
}

fn decode_strict_value(value: Value) -> Result<Message, CodecError> {
    let obj = value
        .as_object()
        .ok_or_else(|| CodecError::NotAMessage("top-level value is not a JSON object".into()))?;

    reject_case_mismatches(obj, KNOWN_ENVELOPE_FIELDS)?;

    let has_method = obj.contains_key("method");
    let has_id = obj.contains_key("id");
    let has_result_or_error = obj.contains_key("result") || obj.contains_key("error");

    if has_method && has_id {
        reject_unknown_fields(obj, REQUEST_FIELDS)?;
        let req: Request = serde_json::from_value(value)
            .map_err(|e| CodecError::NotAMessage(e.to_string()))?;
        Ok(Message::Request(req))
    } else if has_method {
        reject_unknown_fields(obj, NOTIFICATION_FIELDS)?;
        let note: Notification = serde_json::from_value(value)
            .map_err(|e| CodecError::NotAMessage(e.to_string()))?;
        Ok(Message::Notification(note))
    } else if has_result_or_error && has_id {
        reject_unknown_fields(obj, RESPONSE_FIELDS)?;
        if let Some(error_obj) = obj.get("error").and_then(Value::as_object) {
            reject_case_mismatches(error_obj, ERROR_OBJECT_FIELDS)?;
            reject_unknown_fields(error_obj, ERROR_OBJECT_FIELDS)?;
        }
        let resp: Response = serde_json::from_value(value)
            .map_err(|e| CodecError::NotAMessage(e.to_string()))?;
        Ok(Message::Response(resp))
    } else {
        Err(CodecError::NotAMessage(
            "missing method/id, or result/error/id".into(),
        ))
    }
}

/// A `serde_json::Value` that rejects duplicate object keys during parsing,
/// rather than silently keeping the last occurrence. Two keys collide if
/// their lowercasings are equal, not just if they're identical — `"name"`
/// and `"Name"` in the same object are rejected, closing the key-smuggling
/// vector a case-sensitive-only comparison would miss.
struct StrictValue(Value);

impl<'de> Deserialize<'de> for StrictValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(StrictValueVisitor).map(StrictValue)
    }
}

struct StrictValueVisitor;

impl<'de> Visitor<'de> for StrictValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value with no duplicate object keys")
    }

    fn visit_bool<E>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Value, E> {
        Ok(serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number))
    }

    fn visit_str<E>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut vec = Vec::new();
        while let Some(StrictValue(v)) = seq.next_element()? {
            vec.push(v);
        }
        Ok(Value::Array(vec))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut obj = Map::new();
        let mut seen_lower = std::collections::HashSet::new();
        while let Some(key) = map.next_key::<String>()? {
            if !seen_lower.insert(key.to_ascii_lowercase()) {
                return Err(de::Error::custom(format!(
                    "duplicate key {key:?} in JSON object (collides case-insensitively with another key)"
                )));
            }
            let StrictValue(value) = map.next_value()?;
            obj.insert(key, value);
        }
        Ok(Value::Object(obj))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RequestId;

    #[test]
    fn decodes_request() {
        let codec = JsonCodec::new();
        let bytes = br#"{"jsonrpc":"2.0","id":1,"method":"tools/list","params":{}}"#;
        let msg = codec.decode(bytes).unwrap();
        assert_eq!(msg.method(), Some("tools/list"));
        assert_eq!(msg.id(), Some(&RequestId::Number(1)));
    }

    #[test]
    fn decodes_notification() {
        let codec = JsonCodec::new();
        let bytes = br#"{"jsonrpc":"2.0","method":"notifications/cancelled","params":{"requestId":1}}"#;
        let msg = codec.decode(bytes).unwrap();
        assert!(matches!(msg, Message::Notification(_)));
    }

    #[test]
    fn decodes_response() {
        let codec = JsonCodec::new();
        let bytes = br#"{"jsonrpc":"2.0","id":1,"result":{"ok":true}}"#;
        let msg = codec.decode(bytes).unwrap();
        assert!(matches!(msg, Message::Response(_)));
    }

    #[test]
    fn rejects_duplicate_top_level_key() {
        let codec = JsonCodec::new();
        let bytes = br#"{"jsonrpc":"2.0","id":1,"method":"tools/call","method":"admin/shutdown"}"#;
        let err = codec.decode(bytes).unwrap_err();
        assert!(matches!(err, CodecError::Syntax(_)));
    }

    #[test]
    fn rejects_duplicate_nested_key() {
        let codec = JsonCodec::new();
        let bytes =
            br#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"a":1,"a":2}}"#;
        let err = codec.decode(bytes).unwrap_err();
        assert!(matches!(err, CodecError::Syntax(_)));
    }

    #[test]
    fn rejects_nested_keys_colliding_only_by_case() {
        let codec = JsonCodec::new();
        let bytes =
            br#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"safe_tool","Name":"admin_tool"}}"#;
        let err = codec.decode(bytes).unwrap_err();
        assert!(matches!(err, CodecError::Syntax(_)));
    }

    #[test]
    fn rejects_top_level_case_mismatch() {
        let codec = JsonCodec::new();
        let bytes = br#"{"jsonrpc":"2.0","id":1,"Method":"tools/call"}"#;
        let err = codec.decode(bytes).unwrap_err();
        assert!(matches!(err, CodecError::CaseMismatch { key, expected } if key == "Method" && expected == "method"));
    }

    #[test]
    fn rejects_unknown_top_level_field() {
        let codec = JsonCodec::new();
        let bytes = br#"{"jsonrpc":"2.0","id":1,"method":"tools/call","extra":true}"#;
        let err = codec.decode(bytes).unwrap_err();
        assert!(matches!(err, CodecError::UnknownField { key } if key == "extra"));
    }

    #[test]
    fn rejects_field_valid_for_a_different_message_shape() {
        let codec = JsonCodec::new();
        // "result" is a legal envelope field, just not alongside "method" —
        // a Notification can't carry it, so it's unknown in this shape.
        let bytes = br#"{"jsonrpc":"2.0","method":"notifications/cancelled","result":{}}"#;
        let err = codec.decode(bytes).unwrap_err();
        assert!(matches!(err, CodecError::UnknownField { key } if key == "result"));
    }

    #[test]
    fn rejects_case_mismatch_in_nested_error_object() {
        let codec = JsonCodec::new();
        let bytes = br#"{"jsonrpc":"2.0","id":1,"error":{"Code":-32601,"message":"nope"}}"#;
        let err = codec.decode(bytes).unwrap_err();
        assert!(matches!(err, CodecError::CaseMismatch { key, expected } if key == "Code" && expected == "code"));
    }

    #[test]
    fn round_trips_through_encode() {
        let codec = JsonCodec::new();
        let req = Message::Request(Request::new(
            RequestId::Number(7),
            "ping",
            None,
        ));
        let bytes = codec.encode(&req).unwrap();
        let decoded = codec.decode(&bytes).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn enforces_max_message_size() {
        let codec = JsonCodec::with_max_message_bytes(8);
        let bytes = br#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#;
        assert!(matches!(
            codec.decode(bytes),
            Err(CodecError::TooLarge { .. })
        ));
    }
}
