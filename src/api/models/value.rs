//! Polymorphic response values and their storage encoding.
//!
//! `row_id`, `contact_id`, `session_id` and `response` can each hold one of several
//! value types. Every such field is persisted as a `(ValueType, payload)` pair: the tag
//! says how to read the JSON payload back, which matters for types JSON has no native
//! form for (URLs and the temporal types).

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;
use thiserror::Error;
use url::Url;

/// Storage tag for a response value. The discriminants are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
pub enum ValueType {
    String = 0,
    Integer = 1,
    ArrayOfString = 2,
    Float = 3,
    Url = 4,
    ArrayOfFloat = 5,
    DateTime = 6,
    Date = 7,
    Time = 8,
}

impl ValueType {
    pub fn as_i16(self) -> i16 {
        self as i16
    }

    /// Identifiers (`row_id`, `contact_id`, `session_id`) only accept these two tags.
    pub fn is_identifier(self) -> bool {
        matches!(self, ValueType::String | ValueType::Integer)
    }
}

impl From<ValueType> for i16 {
    fn from(value: ValueType) -> Self {
        value.as_i16()
    }
}

impl TryFrom<i16> for ValueType {
    type Error = CodecError;

    fn try_from(tag: i16) -> Result<Self, Self::Error> {
        Ok(match tag {
            0 => ValueType::String,
            1 => ValueType::Integer,
            2 => ValueType::ArrayOfString,
            3 => ValueType::Float,
            4 => ValueType::Url,
            5 => ValueType::ArrayOfFloat,
            6 => ValueType::DateTime,
            7 => ValueType::Date,
            8 => ValueType::Time,
            other => return Err(CodecError::UnknownTag(other)),
        })
    }
}

/// Errors decoding a stored `(tag, payload)` pair.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("unknown value type tag {0}")]
    UnknownTag(i16),
    #[error("payload {payload} does not match value type {value_type:?}")]
    PayloadMismatch { value_type: ValueType, payload: Value },
    #[error("invalid {kind} payload {payload:?}: {reason}")]
    Parse {
        kind: &'static str,
        payload: String,
        reason: String,
    },
}

/// A typed response value.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseValue {
    String(String),
    Integer(i64),
    StringList(Vec<String>),
    Float(f64),
    Url(Url),
    FloatList(Vec<f64>),
    DateTime(DateTime<FixedOffset>),
    Date(NaiveDate),
    Time(NaiveTime),
}

/// A `(tag, payload)` pair as persisted for one polymorphic field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredValue {
    pub value_type: ValueType,
    pub payload: Value,
}

impl StoredValue {
    pub fn decode(&self) -> Result<ResponseValue, CodecError> {
        ResponseValue::decode(self.value_type, &self.payload)
    }
}

impl ResponseValue {
    /// Infer a value from submitted JSON.
    ///
    /// Precedence follows the tag order used for encoding: string, integer, float,
    /// list of strings, list of floats. Empty lists are lists of strings. Anything else
    /// (booleans, null, objects, mixed or integer lists) has no representation.
    pub fn from_json(json: &Value) -> Option<ResponseValue> {
        match json {
            Value::String(s) => Some(ResponseValue::String(s.clone())),
            Value::Number(n) => number_value(n),
            Value::Array(items) => {
                if items.iter().all(Value::is_string) {
                    Some(ResponseValue::StringList(
                        items
                            .iter()
                            .filter_map(|item| item.as_str().map(str::to_string))
                            .collect(),
                    ))
                } else if items.iter().all(Value::is_f64) {
                    Some(ResponseValue::FloatList(
                        items.iter().filter_map(Value::as_f64).collect(),
                    ))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            ResponseValue::Url(_) => ValueType::Url,
            ResponseValue::String(_) => ValueType::String,
            ResponseValue::Integer(_) => ValueType::Integer,
            ResponseValue::Float(_) => ValueType::Float,
            ResponseValue::DateTime(_) => ValueType::DateTime,
            ResponseValue::Date(_) => ValueType::Date,
            ResponseValue::Time(_) => ValueType::Time,
            ResponseValue::StringList(_) => ValueType::ArrayOfString,
            ResponseValue::FloatList(_) => ValueType::ArrayOfFloat,
        }
    }

    /// Encode into the persisted `(tag, payload)` pair. Temporal values are stored as
    /// RFC 3339 strings, everything else as its JSON equivalent.
    pub fn encode(&self) -> StoredValue {
        StoredValue {
            value_type: self.value_type(),
            payload: self.to_json(),
        }
    }

    /// Decode a persisted pair.
    pub fn decode(value_type: ValueType, payload: &Value) -> Result<ResponseValue, CodecError> {
        let mismatch = || CodecError::PayloadMismatch {
            value_type,
            payload: payload.clone(),
        };
        match value_type {
            ValueType::Url => {
                let raw = payload.as_str().ok_or_else(mismatch)?;
                Url::parse(raw)
                    .map(ResponseValue::Url)
                    .map_err(|e| parse_error("URL", raw, e))
            }
            ValueType::DateTime => {
                let raw = payload.as_str().ok_or_else(mismatch)?;
                parse_datetime(raw)
                    .map(ResponseValue::DateTime)
                    .map_err(|e| parse_error("date-time", raw, e))
            }
            ValueType::Date => {
                let raw = payload.as_str().ok_or_else(mismatch)?;
                parse_date(raw)
                    .map(ResponseValue::Date)
                    .map_err(|e| parse_error("date", raw, e))
            }
            ValueType::Time => {
                let raw = payload.as_str().ok_or_else(mismatch)?;
                parse_time(raw)
                    .map(ResponseValue::Time)
                    .map_err(|e| parse_error("time", raw, e))
            }
            ValueType::String => payload
                .as_str()
                .map(|s| ResponseValue::String(s.to_string()))
                .ok_or_else(mismatch),
            ValueType::Integer => payload
                .as_i64()
                .map(ResponseValue::Integer)
                .ok_or_else(mismatch),
            ValueType::Float => payload
                .as_f64()
                .map(ResponseValue::Float)
                .ok_or_else(mismatch),
            ValueType::ArrayOfString => {
                let items = payload.as_array().ok_or_else(mismatch)?;
                items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
                    .map(ResponseValue::StringList)
                    .ok_or_else(mismatch)
            }
            ValueType::ArrayOfFloat => {
                let items = payload.as_array().ok_or_else(mismatch)?;
                items
                    .iter()
                    .map(Value::as_f64)
                    .collect::<Option<Vec<_>>>()
                    .map(ResponseValue::FloatList)
                    .ok_or_else(mismatch)
            }
        }
    }

    /// The JSON form used both as storage payload and in API output.
    pub fn to_json(&self) -> Value {
        match self {
            ResponseValue::String(s) => Value::String(s.clone()),
            ResponseValue::Integer(i) => Value::from(*i),
            ResponseValue::Float(f) => float_json(*f),
            ResponseValue::Url(url) => Value::String(url.to_string()),
            ResponseValue::DateTime(dt) => Value::String(dt.to_rfc3339()),
            ResponseValue::Date(date) => Value::String(date.to_string()),
            ResponseValue::Time(time) => Value::String(time.to_string()),
            ResponseValue::StringList(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
            ResponseValue::FloatList(items) => {
                Value::Array(items.iter().copied().map(float_json).collect())
            }
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, ResponseValue::Integer(_) | ResponseValue::Float(_))
    }

    /// The elements of a list value, as JSON.
    pub fn list_items(&self) -> Option<Vec<Value>> {
        match self {
            ResponseValue::StringList(_) | ResponseValue::FloatList(_) => match self.to_json() {
                Value::Array(items) => Some(items),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for ResponseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseValue::String(s) => f.write_str(s),
            ResponseValue::Url(url) => f.write_str(url.as_str()),
            other => f.write_str(&display_json(&other.to_json())),
        }
    }
}

fn number_value(n: &Number) -> Option<ResponseValue> {
    if let Some(i) = n.as_i64() {
        Some(ResponseValue::Integer(i))
    } else if n.is_f64() {
        n.as_f64().map(ResponseValue::Float)
    } else {
        // u64 beyond i64::MAX
        None
    }
}

fn float_json(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

fn parse_error(kind: &'static str, raw: &str, reason: impl fmt::Display) -> CodecError {
    CodecError::Parse {
        kind,
        payload: raw.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse an RFC 3339 date-time. A space separator is accepted in place of `T`.
pub fn parse_datetime(raw: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).or_else(|e| {
        if raw.len() > 10 && raw.as_bytes()[10] == b' ' {
            DateTime::parse_from_rfc3339(&format!("{}T{}", &raw[..10], &raw[11..]))
        } else {
            Err(e)
        }
    })
}

/// Parse an RFC 3339 full-date (`YYYY-MM-DD`).
pub fn parse_date(raw: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
}

/// Parse an RFC 3339 partial-time (`HH:MM:SS[.frac]`).
pub fn parse_time(raw: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
}

/// Render JSON the way validation messages show values: strings bare at the top
/// level, quoted with `'` inside lists, lists bracketed and comma separated.
pub fn display_json(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => repr_json(other),
    }
}

/// Render JSON with strings quoted, e.g. `['a', 'b', 'c']`.
pub fn repr_json(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s),
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(repr_json).collect::<Vec<_>>().join(", ")
        ),
        Value::Number(n) if n.is_f64() => match n.as_f64() {
            Some(f) if f.is_finite() && f.fract() == 0.0 => format!("{:.1}", f),
            _ => n.to_string(),
        },
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Null => "None".to_string(),
        Value::Object(map) => format!(
            "{{{}}}",
            map.iter()
                .map(|(k, v)| format!("'{}': {}", k, repr_json(v)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Value::Number(n) => n.to_string(),
    }
}

/// JSON equality that treats `1` and `1.0` as the same number.
pub fn json_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) if a.is_f64() || b.is_f64() => {
            a.as_f64() == b.as_f64()
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| json_eq(x, y))
        }
        _ => left == right,
    }
}
