//! Answer validation.
//!
//! Checks a response value and its metadata against the question it answers. Every
//! applicable rule runs and every violation is reported, grouped under `response` or
//! `response_metadata`. Some rules also coerce the value: media strings become URLs
//! and temporal strings become dates and times, so the coerced value is what gets
//! encoded and stored.
//!
//! `open` questions carry their real type in the answer: `response_metadata.type` and
//! `response_metadata.type_options` are resolved and checked first, and the answer is
//! then validated as if the question had been declared with that type.

use serde_json::{Map, Value};
use std::borrow::Cow;
use url::Url;

use crate::models::question::{choices, is_integer};
use crate::models::value::{json_eq, parse_date, parse_datetime, parse_time, repr_json};
use crate::models::{FlowQuestion, QuestionType, ResponseValue, ValidationErrors, validate_type_options};

const RESPONSE: &str = "response";
const RESPONSE_METADATA: &str = "response_metadata";

/// A candidate answer: the typed response value plus its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub response: ResponseValue,
    pub metadata: Map<String, Value>,
}

impl Answer {
    pub fn new(response: ResponseValue, metadata: Map<String, Value>) -> Self {
        Self { response, metadata }
    }
}

/// Validate `answer` against `question`, coercing the response where the question type
/// calls for it.
pub fn validate_answer(question: &FlowQuestion, answer: &mut Answer) -> ValidationErrors {
    validate(question.question_type, &question.type_options, answer)
}

/// Validate `answer` against a question type and its options.
pub fn validate(
    question_type: QuestionType,
    type_options: &Map<String, Value>,
    answer: &mut Answer,
) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    let (question_type, type_options) = if question_type == QuestionType::Open {
        match resolve_open_type(&answer.metadata, &mut errors) {
            Some((resolved, options)) => (resolved, Cow::Owned(options)),
            None => return errors,
        }
    } else {
        (question_type, Cow::Borrowed(type_options))
    };

    match question_type {
        QuestionType::SelectOne => validate_select_one(&type_options, answer, &mut errors),
        QuestionType::SelectMany => validate_select_many(&type_options, answer, &mut errors),
        QuestionType::Numeric => {
            if !answer.response.is_number() {
                errors.add(RESPONSE, "must be float or integer");
            }
        }
        QuestionType::Text => {
            if !matches!(answer.response, ResponseValue::String(_)) {
                errors.add(RESPONSE, "must be a string");
            }
            check_string(&answer.metadata, "language", &mut errors);
        }
        QuestionType::Image | QuestionType::Video | QuestionType::Audio => {
            validate_media(answer, &mut errors)
        }
        QuestionType::GeoPoint => validate_geo_point(&answer.response, &mut errors),
        QuestionType::Datetime | QuestionType::Date | QuestionType::Time => {
            validate_temporal(question_type, answer, &mut errors)
        }
        // Resolved away above.
        QuestionType::Open => {}
    }

    errors
}

/// Resolve the effective type and options of an answer to an `open` question.
///
/// Returns `None` when the declaration is missing or invalid; the reasons are
/// recorded under `response_metadata`.
fn resolve_open_type(
    metadata: &Map<String, Value>,
    errors: &mut ValidationErrors,
) -> Option<(QuestionType, Map<String, Value>)> {
    let mut resolved = QuestionType::Open;
    match metadata.get("type") {
        None => errors.add(RESPONSE_METADATA, "type is required"),
        Some(declared) => {
            let concrete = declared
                .as_str()
                .and_then(|name| name.parse::<QuestionType>().ok())
                .filter(|t| *t != QuestionType::Open);
            match concrete {
                Some(question_type) => resolved = question_type,
                None => {
                    let names = QuestionType::concrete_names()
                        .into_iter()
                        .map(|name| Value::String(name.to_string()))
                        .collect();
                    errors.add(
                        RESPONSE_METADATA,
                        format!("type must be one of {}", repr_json(&Value::Array(names))),
                    );
                }
            }
        }
    }

    let mut type_options = Map::new();
    match metadata.get("type_options") {
        None => errors.add(RESPONSE_METADATA, "type_options is required"),
        Some(Value::Object(options)) => type_options = options.clone(),
        Some(_) => errors.add(RESPONSE_METADATA, "type_options must be an object"),
    }

    errors.extend(
        RESPONSE_METADATA,
        validate_type_options(resolved, &type_options)
            .into_iter()
            .map(|message| format!("type_options.{}", message)),
    );

    errors.is_empty().then_some((resolved, type_options))
}

fn contains(choices: &[Value], candidate: &Value) -> bool {
    choices.iter().any(|choice| json_eq(choice, candidate))
}

fn choices_repr(choices: &[Value]) -> String {
    repr_json(&Value::Array(choices.to_vec()))
}

fn validate_select_one(
    type_options: &Map<String, Value>,
    answer: &Answer,
    errors: &mut ValidationErrors,
) {
    let choices = choices(type_options);
    if !contains(choices, &answer.response.to_json()) {
        errors.add(
            RESPONSE,
            format!(
                "{} is not a valid choice. Valid choices are {}",
                answer.response,
                choices_repr(choices)
            ),
        );
    }
    validate_choice_order(choices, &answer.metadata, errors);
}

fn validate_select_many(
    type_options: &Map<String, Value>,
    answer: &Answer,
    errors: &mut ValidationErrors,
) {
    let choices = choices(type_options);
    match answer.response.list_items() {
        None => errors.add(RESPONSE, "must be an array"),
        Some(items) => {
            if !items.iter().all(|item| contains(choices, item)) {
                errors.add(
                    RESPONSE,
                    format!(
                        "{} contains choices not in {}",
                        answer.response,
                        choices_repr(choices)
                    ),
                );
            }
        }
    }
    validate_choice_order(choices, &answer.metadata, errors);
}

/// `choice_order`, when present, must list every choice.
fn validate_choice_order(
    choices: &[Value],
    metadata: &Map<String, Value>,
    errors: &mut ValidationErrors,
) {
    let Some(choice_order) = metadata.get("choice_order") else {
        return;
    };
    match choice_order {
        Value::Array(order) => {
            if !choices.iter().all(|choice| contains(order, choice)) {
                errors.add(
                    RESPONSE_METADATA,
                    format!(
                        "choice_order {} contains choices not in {}",
                        repr_json(choice_order),
                        choices_repr(choices)
                    ),
                );
            }
        }
        _ => errors.add(RESPONSE_METADATA, "choice_order must be an array"),
    }
}

fn validate_media(answer: &mut Answer, errors: &mut ValidationErrors) {
    let coerced = match &answer.response {
        ResponseValue::String(raw) => Url::parse(raw).ok().map(ResponseValue::Url),
        _ => None,
    };
    if let Some(url) = coerced {
        answer.response = url;
    }
    if !matches!(answer.response, ResponseValue::Url(_)) {
        errors.add(RESPONSE, "must be a URL");
    }

    let metadata = &answer.metadata;
    check_string(metadata, "format", errors);
    if let Some(dimensions) = metadata.get("dimensions") {
        match dimensions {
            Value::Array(items) => {
                if items.len() != 2 {
                    errors.add(RESPONSE_METADATA, "dimensions must have a length of 2");
                }
                if !items.iter().all(is_integer) {
                    errors.add(RESPONSE_METADATA, "dimensions items must be integers");
                }
            }
            _ => errors.add(RESPONSE_METADATA, "dimensions must be an array"),
        }
    }
    check_number(metadata, "file_size_mb", errors);
    check_number(metadata, "duration_s", errors);
    check_string(metadata, "language", errors);
}

fn validate_geo_point(response: &ResponseValue, errors: &mut ValidationErrors) {
    let length = match response {
        ResponseValue::FloatList(points) => points.len(),
        ResponseValue::StringList(items) => {
            if !items.is_empty() {
                errors.add(RESPONSE, "array may only contain floats");
            }
            items.len()
        }
        _ => {
            errors.add(RESPONSE, "must be an array");
            return;
        }
    };
    if !(2..=4).contains(&length) {
        errors.add(
            RESPONSE,
            "number of array elements must be between 2 and 4 inclusive",
        );
    }
}

fn validate_temporal(
    question_type: QuestionType,
    answer: &mut Answer,
    errors: &mut ValidationErrors,
) {
    let coerced = match &answer.response {
        ResponseValue::String(raw) => match question_type {
            QuestionType::Datetime => parse_datetime(raw).ok().map(ResponseValue::DateTime),
            QuestionType::Date => parse_date(raw).ok().map(ResponseValue::Date),
            _ => parse_time(raw).ok().map(ResponseValue::Time),
        },
        _ => None,
    };
    if let Some(value) = coerced {
        answer.response = value;
    }

    let (valid, kind) = match question_type {
        QuestionType::Datetime => (
            matches!(answer.response, ResponseValue::DateTime(_)),
            "date-time",
        ),
        QuestionType::Date => (matches!(answer.response, ResponseValue::Date(_)), "date"),
        _ => (matches!(answer.response, ResponseValue::Time(_)), "time"),
    };
    if !valid {
        errors.add(RESPONSE, format!("must be an RFC 3339 {}", kind));
    }
}

fn check_string(metadata: &Map<String, Value>, key: &str, errors: &mut ValidationErrors) {
    if metadata.get(key).is_some_and(|value| !value.is_string()) {
        errors.add(RESPONSE_METADATA, format!("{} must be a string", key));
    }
}

fn check_number(metadata: &Map<String, Value>, key: &str, errors: &mut ValidationErrors) {
    if metadata.get(key).is_some_and(|value| !value.is_number()) {
        errors.add(RESPONSE_METADATA, format!("{} must be integer or float", key));
    }
}
