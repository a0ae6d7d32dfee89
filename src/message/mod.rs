//! GELF message representation.
//!
//! This module defines [`Message`], the record shipped by both transports,
//! along with [`ExtraValue`] for additional fields and [`Origin`], the
//! writer-supplied identity used when a message is built from raw bytes.
//! Conversion to and from the JSON wire form lives in [`codec`].

use std::collections::BTreeMap;
use std::fmt;
use std::panic::Location;

use serde_json::Value;

use crate::level::Level;

pub mod codec;


pub use codec::{decode, encode};

/// GELF format version written by this crate.
pub const GELF_VERSION: &str = "1.1";

/// Facility used when the caller does not configure one.
pub const DEFAULT_FACILITY: &str = "";

/// Value of an additional field.
///
/// Numbers are always carried as `f64`, so integers above 2^53 lose
/// precision on a round trip.
#[derive(Clone, Debug, PartialEq)]
pub enum ExtraValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<ExtraValue>),
    Object(BTreeMap<String, ExtraValue>),
}

impl ExtraValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ExtraValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ExtraValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Convert into a JSON value, rejecting NaN and infinities.
    pub(crate) fn to_json(&self) -> Option<Value> {
        Some(match self {
            ExtraValue::Null => Value::Null,
            ExtraValue::Bool(b) => Value::Bool(*b),
            ExtraValue::Number(n) => Value::Number(serde_json::Number::from_f64(*n)?),
            ExtraValue::String(s) => Value::String(s.clone()),
            ExtraValue::Array(items) => Value::Array(
                items
                    .iter()
                    .map(ExtraValue::to_json)
                    .collect::<Option<Vec<_>>>()?,
            ),
            ExtraValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| v.to_json().map(|v| (k.clone(), v)))
                    .collect::<Option<serde_json::Map<_, _>>>()?,
            ),
        })
    }
}

impl From<Value> for ExtraValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ExtraValue::Null,
            Value::Bool(b) => ExtraValue::Bool(b),
            Value::Number(n) => ExtraValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => ExtraValue::String(s),
            Value::Array(items) => {
                ExtraValue::Array(items.into_iter().map(ExtraValue::from).collect())
            }
            Value::Object(map) => ExtraValue::Object(
                map.into_iter()
                    .map(|(k, v)| (k, ExtraValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for ExtraValue {
    fn from(value: &str) -> Self {
        ExtraValue::String(value.to_owned())
    }
}

impl From<String> for ExtraValue {
    fn from(value: String) -> Self {
        ExtraValue::String(value)
    }
}

impl From<f64> for ExtraValue {
    fn from(value: f64) -> Self {
        ExtraValue::Number(value)
    }
}

impl From<i64> for ExtraValue {
    fn from(value: i64) -> Self {
        ExtraValue::Number(value as f64)
    }
}

impl From<u32> for ExtraValue {
    fn from(value: u32) -> Self {
        ExtraValue::Number(f64::from(value))
    }
}

impl From<bool> for ExtraValue {
    fn from(value: bool) -> Self {
        ExtraValue::Bool(value)
    }
}

/// Identity stamped onto messages built from raw bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Origin {
    /// Source host reported in the `host` field.
    pub host: String,
    /// Legacy `facility` field; omitted from the wire when empty.
    pub facility: String,
}

impl Origin {
    pub fn new(host: impl Into<String>, facility: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            facility: facility.into(),
        }
    }
}

/// Use the machine hostname, falling back to `localhost` when it cannot be
/// read or is not valid UTF-8.
impl Default for Origin {
    fn default() -> Self {
        let host = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "localhost".to_owned());
        Self::new(host, DEFAULT_FACILITY)
    }
}

/// A single GELF log event.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub version: String,
    pub host: String,
    /// First line of the event.
    pub short: String,
    /// Entire event text when it spans several lines, otherwise empty.
    pub full: String,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub level: i64,
    pub facility: String,
    /// Additional fields, conventionally prefixed with `_`.
    pub extra: BTreeMap<String, ExtraValue>,
    /// Pre-encoded JSON object merged into the output after `extra`.
    pub raw_extra: Option<Vec<u8>>,
}

impl Message {
    /// Create an INFO message stamped with the current time.
    pub fn new(host: impl Into<String>, short: impl Into<String>) -> Self {
        Self {
            version: GELF_VERSION.to_owned(),
            host: host.into(),
            short: short.into(),
            full: String::new(),
            timestamp: now_unix(),
            level: Level::Info.as_i64(),
            facility: DEFAULT_FACILITY.to_owned(),
            extra: BTreeMap::new(),
            raw_extra: None,
        }
    }

    /// Build a message from raw text the way `write` does.
    ///
    /// Surrounding whitespace is trimmed. The first line becomes `short`; the
    /// whole trimmed input becomes `full` only when it has more than one line.
    pub fn from_raw(raw: &[u8], origin: &Origin) -> Self {
        let text = String::from_utf8_lossy(raw);
        let trimmed = text.trim();
        let (short, full) = match trimmed.find('\n') {
            Some(idx) => (trimmed[..idx].trim_end().to_owned(), trimmed.to_owned()),
            None => (trimmed.to_owned(), String::new()),
        };
        let mut message = Self::new(origin.host.clone(), short);
        message.full = full;
        message.facility = origin.facility.clone();
        message
    }

    pub fn with_full(mut self, full: impl Into<String>) -> Self {
        self.full = full.into();
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level.as_i64();
        self
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_facility(mut self, facility: impl Into<String>) -> Self {
        self.facility = facility.into();
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<ExtraValue>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Record a source location as the `_file` and `_line` extras.
    pub fn with_location(self, location: &Location<'_>) -> Self {
        self.with_extra("_file", location.file())
            .with_extra("_line", location.line())
    }

    pub fn with_raw_extra(mut self, raw: impl Into<Vec<u8>>) -> Self {
        self.raw_extra = Some(raw.into());
        self
    }

    /// Severity as a [`Level`] when the numeric value is a syslog severity.
    pub fn severity(&self) -> Option<Level> {
        Level::from_i64(self.level)
    }

    /// Text handed back by `read`: the full message when present.
    pub fn text(&self) -> &str {
        if self.full.is_empty() {
            &self.short
        } else {
            &self.full
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.host, self.level, self.short)
    }
}

fn now_unix() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
