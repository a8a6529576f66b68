use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use uuid::Uuid;

use super::errors::ValidationErrors;

/// Maximum length of the character fields of flows and questions.
pub const MAX_CHAR_LENGTH: usize = 255;

/// Supported flow-results-specification versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowVersion {
    #[serde(rename = "1.0.0-rc1")]
    V1_0_0Rc1,
}

impl FlowVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            FlowVersion::V1_0_0Rc1 => "1.0.0-rc1",
        }
    }
}

impl fmt::Display for FlowVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1.0.0-rc1" => Ok(FlowVersion::V1_0_0Rc1),
            other => Err(format!("Value '{}' is not a valid choice.", other)),
        }
    }
}

/// A published flow package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub id: Uuid,
    pub name: String,
    pub version: FlowVersion,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub title: String,
    pub language: String,
}

impl Flow {
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            version: FlowVersion::V1_0_0Rc1,
            created: now,
            modified: now,
            title: title.into(),
            language: String::new(),
        }
    }

    /// Model-level checks on the flow's own fields.
    ///
    /// Errors are keyed by model field name: `name`, `title` and `language`.
    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if let Some(message) = max_length_error(&self.name) {
            errors.add("name", message);
        }
        if !name_pattern().is_match(&self.name) {
            errors.add(
                "name",
                "can only contain lowercase, alphanumeric characters and '-', '_', '.'",
            );
        }
        if let Some(message) = max_length_error(&self.title) {
            errors.add("title", message);
        }
        let language_length = self.language.chars().count();
        if language_length > 3 {
            errors.add(
                "language",
                format!(
                    "Ensure this value has at most 3 characters (it has {}).",
                    language_length
                ),
            );
        } else if language_length > 0 && language_length < 3 {
            errors.add(
                "language",
                format!(
                    "Ensure this value has at least 3 characters (it has {}).",
                    language_length
                ),
            );
        }
        errors
    }
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9\-._]*$").expect("flow name pattern is valid"))
}

pub(crate) fn max_length_error(value: &str) -> Option<String> {
    let length = value.chars().count();
    (length > MAX_CHAR_LENGTH).then(|| {
        format!(
            "Ensure this field has no more than {} characters.",
            MAX_CHAR_LENGTH
        )
    })
}
