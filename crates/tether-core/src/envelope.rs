use serde_json::{Map, Value};

/// Key carrying the message tag on the wire.
pub const TYPE_KEY: &str = "type";

/// The wire unit exchanged with the content surface in both directions.
///
/// On the wire the payload fields sit next to `type` in one flat object
/// (`{"type":"track_location","accuracy":15}`). An empty payload is
/// normalised to `None` so that a one-field envelope has exactly one
/// in-memory representation.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    kind: String,
    payload: Option<Map<String, Value>>,
}

impl Envelope {
    /// Envelope with no payload.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: None,
        }
    }

    /// Envelope carrying the given payload fields. A `type` key inside the
    /// payload is discarded; the tag always wins.
    pub fn with_payload(kind: impl Into<String>, mut payload: Map<String, Value>) -> Self {
        let _ = payload.remove(TYPE_KEY);
        Self {
            kind: kind.into(),
            payload: (!payload.is_empty()).then_some(payload),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn payload(&self) -> Option<&Map<String, Value>> {
        self.payload.as_ref()
    }

    /// Look up a single payload field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.as_ref().and_then(|p| p.get(key))
    }
}

/// An inbound message as the host hands it over, before decoding.
///
/// Content surfaces post either serialized strings or already-structured
/// objects; both collapse to one [`Envelope`] in [`decode`].
#[derive(Clone, Debug, PartialEq)]
pub enum RawMessage {
    Text(String),
    Structured(Value),
}

impl From<&str> for RawMessage {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for RawMessage {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Value> for RawMessage {
    fn from(v: Value) -> Self {
        Self::Structured(v)
    }
}

/// Errors produced while decoding an inbound message.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum DecodeError {
    /// Input is neither a string nor an object.
    #[error("malformed message: {0}")]
    Malformed(String),
    /// Structured input without a non-empty string `type`.
    #[error("message has no type tag")]
    MissingType,
}

/// Decode a raw inbound message into an [`Envelope`].
///
/// Strings are parsed as JSON first; anything that does not parse into an
/// object is treated as a legacy bare-token message and becomes
/// `{type: <raw>}`.
pub fn decode(raw: RawMessage) -> Result<Envelope, DecodeError> {
    match raw {
        RawMessage::Text(text) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => from_object(map),
            _ => {
                let token = text.trim();
                if token.is_empty() {
                    return Err(DecodeError::Malformed("empty message".into()));
                }
                Ok(Envelope::new(token))
            }
        },
        RawMessage::Structured(Value::Object(map)) => from_object(map),
        RawMessage::Structured(other) => Err(DecodeError::Malformed(format!(
            "expected string or object, got {}",
            value_kind(&other)
        ))),
    }
}

/// Serialize an envelope to its flat wire string.
pub fn encode(envelope: &Envelope) -> String {
    let mut map = Map::new();
    let _ = map.insert(TYPE_KEY.into(), Value::String(envelope.kind.clone()));
    if let Some(payload) = &envelope.payload {
        for (k, v) in payload {
            let _ = map.insert(k.clone(), v.clone());
        }
    }
    Value::Object(map).to_string()
}

fn from_object(mut map: Map<String, Value>) -> Result<Envelope, DecodeError> {
    let kind = match map.remove(TYPE_KEY) {
        Some(Value::String(s)) if !s.trim().is_empty() => s,
        _ => return Err(DecodeError::MissingType),
    };
    Ok(Envelope::with_payload(kind, map))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn decode_json_string() {
        let env = decode(r#"{"type":"track_location","accuracy":15}"#.into()).unwrap();
        assert_eq!(env.kind(), "track_location");
        assert_eq!(env.field("accuracy"), Some(&json!(15)));
    }

    #[test]
    fn decode_bare_token() {
        let env = decode("Exit_App".into()).unwrap();
        assert_eq!(env.kind(), "Exit_App");
        assert!(env.payload().is_none());
    }

    #[test]
    fn decode_non_object_json_string_is_token() {
        let env = decode("42".into()).unwrap();
        assert_eq!(env.kind(), "42");
    }

    #[test]
    fn decode_structured_object() {
        let env = decode(json!({"type": "OPEN_GOOGLE_MAP", "url": "https://maps.example"}).into())
            .unwrap();
        assert_eq!(env.kind(), "OPEN_GOOGLE_MAP");
        assert_eq!(env.field("url"), Some(&json!("https://maps.example")));
    }

    #[test]
    fn decode_rejects_non_string_non_object() {
        assert!(matches!(
            decode(json!(12).into()),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            decode(Value::Null.into()),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            decode(json!(["a"]).into()),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn decode_rejects_empty_token() {
        assert!(matches!(decode("   ".into()), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn decode_object_without_type() {
        assert_eq!(
            decode(json!({"accuracy": 3}).into()),
            Err(DecodeError::MissingType)
        );
        assert_eq!(
            decode(json!({"type": 7}).into()),
            Err(DecodeError::MissingType)
        );
    }

    #[test]
    fn encode_without_payload_is_one_field() {
        let s = encode(&Envelope::new("Location_Disabled"));
        assert_eq!(s, r#"{"type":"Location_Disabled"}"#);
    }

    #[test]
    fn encode_flattens_payload() {
        let env = Envelope::with_payload(
            "location_update",
            obj(json!({"location": {"lat": 1.5, "lng": 2.5}})),
        );
        let v: Value = serde_json::from_str(&encode(&env)).unwrap();
        assert_eq!(v, json!({"type": "location_update", "location": {"lat": 1.5, "lng": 2.5}}));
    }

    #[test]
    fn empty_payload_normalised() {
        let env = Envelope::with_payload("info", Map::new());
        assert_eq!(env, Envelope::new("info"));
    }

    #[test]
    fn payload_type_key_is_dropped() {
        let env = Envelope::with_payload("a", obj(json!({"type": "b", "x": 1})));
        assert_eq!(env.kind(), "a");
        assert!(env.field("type").is_none());
    }

    #[test]
    fn decode_inverts_encode() {
        let samples = [
            Envelope::new("Exit_App"),
            Envelope::with_payload("Check_Version", obj(json!({"requiredVersion": "2.0"}))),
            Envelope::with_payload(
                "current_Location",
                obj(json!({"currentLocation": {"lat": -3.25, "lng": 40.0}})),
            ),
            Envelope::with_payload("errorMessage", obj(json!({"msg": null, "n": [1, 2]}))),
        ];
        for env in samples {
            assert_eq!(decode(encode(&env).into()).unwrap(), env);
        }
    }
}
