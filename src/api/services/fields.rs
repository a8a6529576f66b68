//! Structural checks for JSON request bodies.
//!
//! Each helper reads one field of a JSON object, records a message under that field
//! when the value is missing or has the wrong shape, and returns the value when it is
//! usable. Callers keep going after a failure so every structural problem in a body is
//! reported at once.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::ValidationErrors;
use crate::models::value::parse_datetime;

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";
pub const NOT_AN_OBJECT: &str = "must be an object";
pub const NOT_AN_ARRAY: &str = "must be an array";
pub const NOT_A_STRING: &str = "must be a string";
pub const INVALID_UUID: &str = "Must be a valid UUID.";
pub const INVALID_DATETIME: &str = "Datetime has wrong format. Use RFC 3339.";
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// A required nested object.
pub fn required_object<'a>(
    object: &'a Map<String, Value>,
    key: &str,
    errors: &mut ValidationErrors,
) -> Option<&'a Map<String, Value>> {
    match object.get(key) {
        None => {
            errors.add(key, REQUIRED);
            None
        }
        Some(Value::Object(inner)) => Some(inner),
        Some(_) => {
            errors.add(key, NOT_AN_OBJECT);
            None
        }
    }
}

/// A required array.
pub fn required_array<'a>(
    object: &'a Map<String, Value>,
    key: &str,
    errors: &mut ValidationErrors,
) -> Option<&'a [Value]> {
    match object.get(key) {
        None => {
            errors.add(key, REQUIRED);
            None
        }
        Some(Value::Array(items)) => Some(items),
        Some(_) => {
            errors.add(key, NOT_AN_ARRAY);
            None
        }
    }
}

/// A required string restricted to `allowed` values.
pub fn choice(
    object: &Map<String, Value>,
    key: &str,
    allowed: &[&str],
    errors: &mut ValidationErrors,
) -> Option<String> {
    match object.get(key) {
        None => {
            errors.add(key, REQUIRED);
            None
        }
        Some(Value::String(value)) if allowed.contains(&value.as_str()) => Some(value.clone()),
        Some(other) => {
            let shown = match other {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            errors.add(key, format!("\"{}\" is not a valid choice.", shown));
            None
        }
    }
}

/// Options for [`char_field`].
#[derive(Debug, Clone, Copy)]
pub struct CharField {
    pub required: bool,
    pub allow_blank: bool,
    pub max_length: Option<usize>,
}

impl CharField {
    pub const fn required(max_length: Option<usize>) -> Self {
        Self {
            required: true,
            allow_blank: false,
            max_length,
        }
    }

    pub const fn optional(max_length: usize) -> Self {
        Self {
            required: false,
            allow_blank: true,
            max_length: Some(max_length),
        }
    }
}

/// A string field. Optional fields that are absent come back as an empty string.
pub fn char_field(
    object: &Map<String, Value>,
    key: &str,
    field: CharField,
    errors: &mut ValidationErrors,
) -> Option<String> {
    let value = match object.get(key) {
        None if field.required => {
            errors.add(key, REQUIRED);
            return None;
        }
        None => return Some(String::new()),
        Some(Value::String(value)) => value,
        Some(_) => {
            errors.add(key, NOT_A_STRING);
            return None;
        }
    };

    let before = errors.messages(key).map_or(0, <[String]>::len);
    if value.is_empty() && !field.allow_blank {
        errors.add(key, BLANK);
    }
    if let Some(max_length) = field.max_length {
        if value.chars().count() > max_length {
            errors.add(
                key,
                format!(
                    "Ensure this field has no more than {} characters.",
                    max_length
                ),
            );
        }
    }
    let after = errors.messages(key).map_or(0, <[String]>::len);
    (before == after).then(|| value.clone())
}

/// An optional RFC 3339 timestamp.
pub fn optional_datetime(
    object: &Map<String, Value>,
    key: &str,
    errors: &mut ValidationErrors,
) -> Option<Option<DateTime<Utc>>> {
    match object.get(key) {
        None | Some(Value::Null) => Some(None),
        Some(Value::String(raw)) => match parse_datetime(raw) {
            Ok(parsed) => Some(Some(parsed.with_timezone(&Utc))),
            Err(_) => {
                errors.add(key, INVALID_DATETIME);
                None
            }
        },
        Some(_) => {
            errors.add(key, INVALID_DATETIME);
            None
        }
    }
}

/// An optional UUID; absent or null values come back as `None`.
pub fn optional_uuid(
    object: &Map<String, Value>,
    key: &str,
    errors: &mut ValidationErrors,
) -> Option<Option<Uuid>> {
    match object.get(key) {
        None | Some(Value::Null) => Some(None),
        Some(Value::String(raw)) => match Uuid::parse_str(raw) {
            Ok(id) => Some(Some(id)),
            Err(_) => {
                errors.add(key, INVALID_UUID);
                None
            }
        },
        Some(_) => {
            errors.add(key, INVALID_UUID);
            None
        }
    }
}

/// The top-level body, which must be a JSON object.
pub fn body_object<'a>(
    body: &'a Value,
    errors: &mut ValidationErrors,
) -> Option<&'a Map<String, Value>> {
    match body {
        Value::Object(object) => Some(object),
        _ => {
            errors.add(NON_FIELD_ERRORS, NOT_AN_OBJECT);
            None
        }
    }
}
