//! JSON encoding and decoding of [`Message`] values.

use serde::Deserialize;
use serde_json::{Map, Number, Value};

use crate::error::{DecodingError, EncodingError, GelfError};

use super::{ExtraValue, Message};

/// Top-level keys owned by [`Message`] fields.
pub const RESERVED_FIELDS: [&str; 7] = [
    "version",
    "host",
    "short_message",
    "full_message",
    "timestamp",
    "level",
    "facility",
];

/// Level assumed when a decoded payload has none (ALERT).
pub const DEFAULT_DECODED_LEVEL: i64 = 1;

/// Encode a message as a flat JSON object.
///
/// Additional fields from `extra` are merged first, then those from
/// `raw_extra`. A reserved key supplied through either is accepted only when
/// it carries the same value as the message field; otherwise encoding fails.
pub fn encode(message: &Message) -> Result<Vec<u8>, GelfError> {
    let mut object = reserved_object(message)?;

    for (key, value) in &message.extra {
        let value = value
            .to_json()
            .ok_or_else(|| EncodingError::NonFiniteNumber { key: key.clone() })?;
        admit(&mut object, message, key.clone(), value)?;
    }

    if let Some(raw) = &message.raw_extra {
        let parsed: Value = serde_json::from_slice(raw).map_err(EncodingError::InvalidRawExtra)?;
        let Value::Object(fields) = parsed else {
            return Err(EncodingError::RawExtraNotObject.into());
        };
        for (key, value) in fields {
            admit(&mut object, message, key, value)?;
        }
    }

    serde_json::to_vec(&Value::Object(object))
        .map_err(|err| GelfError::Encoding(EncodingError::Json(err)))
}

fn reserved_object(message: &Message) -> Result<Map<String, Value>, EncodingError> {
    let mut object = Map::new();
    object.insert("version".into(), Value::from(message.version.as_str()));
    object.insert("host".into(), Value::from(message.host.as_str()));
    object.insert("short_message".into(), Value::from(message.short.as_str()));
    if !message.full.is_empty() {
        object.insert("full_message".into(), Value::from(message.full.as_str()));
    }
    let timestamp = Number::from_f64(message.timestamp).ok_or_else(|| {
        EncodingError::NonFiniteNumber {
            key: "timestamp".into(),
        }
    })?;
    object.insert("timestamp".into(), Value::Number(timestamp));
    object.insert("level".into(), Value::from(message.level));
    if !message.facility.is_empty() {
        object.insert("facility".into(), Value::from(message.facility.as_str()));
    }
    Ok(object)
}

fn reserved_value(message: &Message, key: &str) -> Option<Value> {
    match key {
        "version" => Some(Value::from(message.version.as_str())),
        "host" => Some(Value::from(message.host.as_str())),
        "short_message" => Some(Value::from(message.short.as_str())),
        "full_message" => Some(Value::from(message.full.as_str())),
        "timestamp" => Number::from_f64(message.timestamp).map(Value::Number),
        "level" => Some(Value::from(message.level)),
        "facility" => Some(Value::from(message.facility.as_str())),
        _ => None,
    }
}

fn admit(
    object: &mut Map<String, Value>,
    message: &Message,
    key: String,
    value: Value,
) -> Result<(), EncodingError> {
    match reserved_value(message, &key) {
        Some(own) if same_value(&own, &value) => Ok(()),
        Some(_) => Err(EncodingError::ReservedKeyConflict { key }),
        None => {
            object.insert(key, value);
            Ok(())
        }
    }
}

/// JSON equality that treats `6` and `6.0` as the same number.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

#[derive(Deserialize)]
struct WireMessage {
    version: Option<String>,
    host: Option<String>,
    short_message: Option<String>,
    full_message: Option<String>,
    timestamp: Option<f64>,
    level: Option<f64>,
    facility: Option<String>,
    #[serde(flatten)]
    additional: Map<String, Value>,
}

/// Decode a JSON payload into a message.
///
/// `host` and `short_message` are required. Every key that is not a reserved
/// field lands in `extra`, with numbers widened to `f64`.
pub fn decode(bytes: &[u8]) -> Result<Message, GelfError> {
    let value: Value = serde_json::from_slice(bytes).map_err(DecodingError::Json)?;
    if !value.is_object() {
        return Err(DecodingError::NotAnObject.into());
    }
    let wire: WireMessage = serde_json::from_value(value).map_err(DecodingError::Json)?;

    let host = wire.host.ok_or(DecodingError::MissingField("host"))?;
    let short = wire
        .short_message
        .ok_or(DecodingError::MissingField("short_message"))?;
    let level = match wire.level {
        None => DEFAULT_DECODED_LEVEL,
        Some(level) if level.fract() == 0.0 && level.is_finite() => level as i64,
        Some(_) => {
            return Err(DecodingError::InvalidField {
                field: "level",
                expected: "an integer",
            }
            .into());
        }
    };

    Ok(Message {
        version: wire.version.unwrap_or_default(),
        host,
        short,
        full: wire.full_message.unwrap_or_default(),
        timestamp: wire.timestamp.unwrap_or(0.0),
        level,
        facility: wire.facility.unwrap_or_default(),
        extra: wire
            .additional
            .into_iter()
            .map(|(key, value)| (key, ExtraValue::from(value)))
            .collect(),
        raw_extra: None,
    })
}
