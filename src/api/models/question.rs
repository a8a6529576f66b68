use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Declared answer type of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SelectOne,
    SelectMany,
    Numeric,
    Open,
    Text,
    Image,
    Video,
    Audio,
    GeoPoint,
    Datetime,
    Date,
    Time,
}

impl QuestionType {
    pub const ALL: [QuestionType; 12] = [
        QuestionType::SelectOne,
        QuestionType::SelectMany,
        QuestionType::Numeric,
        QuestionType::Open,
        QuestionType::Text,
        QuestionType::Image,
        QuestionType::Video,
        QuestionType::Audio,
        QuestionType::GeoPoint,
        QuestionType::Datetime,
        QuestionType::Date,
        QuestionType::Time,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::SelectOne => "select_one",
            QuestionType::SelectMany => "select_many",
            QuestionType::Numeric => "numeric",
            QuestionType::Open => "open",
            QuestionType::Text => "text",
            QuestionType::Image => "image",
            QuestionType::Video => "video",
            QuestionType::Audio => "audio",
            QuestionType::GeoPoint => "geo_point",
            QuestionType::Datetime => "datetime",
            QuestionType::Date => "date",
            QuestionType::Time => "time",
        }
    }

    /// Types an `open` answer may declare for itself, sorted by name.
    pub fn concrete_names() -> Vec<&'static str> {
        let mut names: Vec<&'static str> = Self::ALL
            .iter()
            .filter(|t| **t != QuestionType::Open)
            .map(|t| t.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Value '{}' is not a valid choice.", s))
    }
}

/// One question definition within a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowQuestion {
    pub id: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub label: String,
    #[serde(default)]
    pub type_options: Map<String, Value>,
}

impl FlowQuestion {
    pub fn new(
        id: impl Into<String>,
        question_type: QuestionType,
        label: impl Into<String>,
        type_options: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            question_type,
            label: label.into(),
            type_options,
        }
    }
}

/// The `choices` option as a slice. Empty when absent or malformed.
pub(crate) fn choices(type_options: &Map<String, Value>) -> &[Value] {
    type_options
        .get("choices")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Check that `type_options` has the shape `question_type` requires.
///
/// Returns every violated rule, in evaluation order. An empty list means valid.
pub fn validate_type_options(
    question_type: QuestionType,
    type_options: &Map<String, Value>,
) -> Vec<String> {
    let mut errors = Vec::new();
    match question_type {
        QuestionType::SelectOne | QuestionType::SelectMany => match type_options.get("choices") {
            None => errors.push(format!("choices is required for {} type", question_type)),
            Some(Value::Array(_)) => {}
            Some(_) => errors.push("choices must be an array".to_string()),
        },
        QuestionType::Numeric => match type_options.get("range") {
            None => {}
            Some(Value::Array(range)) => {
                if !range.iter().all(is_integer) {
                    errors.push("range can only contain integers".to_string());
                }
                if range.len() != 2 {
                    errors.push("range must contain exactly 2 items".to_string());
                }
            }
            Some(_) => errors.push("range must be an array".to_string()),
        },
        _ => {}
    }
    errors
}

pub(crate) fn is_integer(value: &Value) -> bool {
    value.is_i64() || value.is_u64()
}
