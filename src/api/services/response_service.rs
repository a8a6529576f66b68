//! Flow response service.
//!
//! Submission validates every row of a batch before anything is written, then stores
//! the batch in one bulk insert. Listing pages through a flow's responses by `row_id`
//! cursor with an optional timestamp window.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::answer_validator::{Answer, validate_answer};
use super::error::ServiceError;
use super::fields::{self, CharField};
use super::pagination::{
    CursorPage, PAGE_SIZE_PARAM, PageLinks, PageRequest, SequencedSource, paginate, query_param,
};
use crate::config::PaginationConfig;
use crate::models::value::parse_datetime;
use crate::models::{NewFlowResponse, ResponseValue, StoredResponse, ValidationErrors};
use crate::storage::{
    SequenceRange, StorageBackend, StorageError, StoredQuestion, TimestampFilter,
};

pub const RESPONSES_TYPE: &str = "responses";
pub const RESULTS_DATA_TYPE: &str = "flow-results-data";
pub const START_TIMESTAMP_PARAM: &str = "filter[start-timestamp]";
pub const END_TIMESTAMP_PARAM: &str = "filter[end-timestamp]";

const ROW_LENGTH: usize = 7;
const NOT_UNIQUE: &str = "row_id is not unique for flow question";
const NOT_AN_IDENTIFIER: &str = "must be string or integer";
const UNSUPPORTED_VALUE: &str = "unsupported value type";

/// Extract the response rows from a submission body, checking only its shape.
fn parse_rows(body: &Value) -> Result<Vec<Vec<Value>>, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let Some(root) = fields::body_object(body, &mut errors) else {
        return Err(errors);
    };
    let Some(data) = fields::required_object(root, "data", &mut errors) else {
        return Err(errors);
    };

    let mut data_errors = ValidationErrors::new();
    fields::choice(data, "type", &[RESPONSES_TYPE], &mut data_errors);
    fields::char_field(data, "id", CharField::required(None), &mut data_errors);

    let mut rows = Vec::new();
    if let Some(attributes) = fields::required_object(data, "attributes", &mut data_errors) {
        let mut attribute_errors = ValidationErrors::new();
        if let Some(items) = fields::required_array(attributes, "responses", &mut attribute_errors)
        {
            let mut row_errors = ValidationErrors::new();
            for (index, item) in items.iter().enumerate() {
                match item {
                    Value::Array(row) if row.len() == ROW_LENGTH => rows.push(row.clone()),
                    Value::Array(_) => row_errors.add(
                        index.to_string(),
                        format!("must contain exactly {} items", ROW_LENGTH),
                    ),
                    _ => row_errors.add(index.to_string(), fields::NOT_AN_ARRAY),
                }
            }
            attribute_errors.nest("responses", row_errors);
        }
        data_errors.nest("attributes", attribute_errors);
    }

    errors.nest("data", data_errors);
    errors.into_result().map(|()| rows)
}

/// Identifier fields accept strings and integers only.
fn identifier(
    raw: &Value,
    field: &str,
    errors: &mut ValidationErrors,
) -> Option<ResponseValue> {
    match ResponseValue::from_json(raw) {
        Some(value) if value.value_type().is_identifier() => Some(value),
        _ => {
            errors.add(format!("{}_type", field), NOT_AN_IDENTIFIER);
            None
        }
    }
}

/// Validate one row against the flow's questions and encode it for storage.
fn validate_row(
    row: &[Value],
    flow_pk: i64,
    questions: &HashMap<&str, &StoredQuestion>,
) -> Result<NewFlowResponse, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let timestamp = match &row[0] {
        Value::String(raw) => match parse_datetime(raw) {
            Ok(parsed) => Some(parsed.with_timezone(&Utc)),
            Err(_) => {
                errors.add("timestamp", fields::INVALID_DATETIME);
                None
            }
        },
        _ => {
            errors.add("timestamp", fields::INVALID_DATETIME);
            None
        }
    };
    let row_id = identifier(&row[1], "row_id", &mut errors);
    let contact_id = identifier(&row[2], "contact_id", &mut errors);
    let session_id = identifier(&row[3], "session_id", &mut errors);

    let question = match &row[4] {
        Value::String(id) => match questions.get(id.as_str()) {
            Some(question) => Some(*question),
            None => {
                errors.add(
                    "question_id",
                    format!("Invalid question_id \"{}\" - object does not exist.", id),
                );
                None
            }
        },
        _ => {
            errors.add("question_id", fields::NOT_A_STRING);
            None
        }
    };

    let response = ResponseValue::from_json(&row[5]);
    if response.is_none() {
        errors.add("response_type", UNSUPPORTED_VALUE);
    }

    let metadata = match &row[6] {
        Value::Object(metadata) => Some(metadata.clone()),
        Value::Null => Some(Map::new()),
        _ => {
            errors.add("response_metadata", fields::NOT_AN_OBJECT);
            None
        }
    };

    let mut answer = None;
    if let (Some(question), Some(response), Some(metadata)) = (question, response, metadata) {
        let mut candidate = Answer::new(response, metadata);
        errors.merge(validate_answer(&question.question, &mut candidate));
        answer = Some(candidate);
    }

    match (timestamp, row_id, contact_id, session_id, question, answer) {
        (
            Some(timestamp),
            Some(row_id),
            Some(contact_id),
            Some(session_id),
            Some(question),
            Some(answer),
        ) if errors.is_empty() => Ok(NewFlowResponse {
            flow_pk,
            question_pk: question.primary_key,
            question_id: question.question.id.clone(),
            timestamp,
            row_id: row_id.encode(),
            contact_id: contact_id.encode(),
            session_id: session_id.encode(),
            response: answer.response.encode(),
            response_metadata: answer.metadata,
        }),
        _ => Err(errors),
    }
}

/// Validate a whole submission. Every row is checked; any failure rejects the batch
/// with errors keyed by row index.
pub fn validate_submission(
    body: &Value,
    flow_pk: i64,
    questions: &[StoredQuestion],
) -> Result<Vec<NewFlowResponse>, ValidationErrors> {
    let rows = parse_rows(body)?;
    let by_id: HashMap<&str, &StoredQuestion> = questions
        .iter()
        .map(|stored| (stored.question.id.as_str(), stored))
        .collect();

    let mut responses = Vec::with_capacity(rows.len());
    let mut row_errors = ValidationErrors::new();
    for (index, row) in rows.iter().enumerate() {
        match validate_row(row, flow_pk, &by_id) {
            Ok(response) => responses.push(response),
            Err(errors) => row_errors.nest(index.to_string(), errors),
        }
    }

    if row_errors.is_empty() {
        Ok(responses)
    } else {
        Err(row_errors.wrap("data.attributes.responses"))
    }
}

/// Parse a timestamp filter value. Query decoding turns `+` into a space, so a
/// failed parse is retried with spaces restored to `+`.
pub fn parse_timestamp_filter(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    parse_datetime(raw)
        .or_else(|_| parse_datetime(&raw.replace(' ', "+")))
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

/// A flow's responses ordered by insertion, paged by `row_id`.
struct ResponseSource<'a> {
    storage: &'a dyn StorageBackend,
    flow_pk: i64,
    filter: TimestampFilter,
}

#[async_trait]
impl SequencedSource for ResponseSource<'_> {
    type Item = StoredResponse;

    async fn sequence_after(&self, cursor: &str) -> Result<Option<i64>, StorageError> {
        let span = self.storage.response_sequences(self.flow_pk, cursor).await?;
        Ok(span.map(|span| span.last))
    }

    async fn sequence_before(&self, cursor: &str) -> Result<Option<i64>, StorageError> {
        let span = self.storage.response_sequences(self.flow_pk, cursor).await?;
        Ok(span.map(|span| span.first))
    }

    async fn scan(&self, range: SequenceRange) -> Result<Vec<StoredResponse>, StorageError> {
        self.storage
            .scan_responses(self.flow_pk, range, self.filter)
            .await
    }

    fn cursor_of(item: &StoredResponse) -> String {
        item.cursor()
    }

    fn sequence_of(item: &StoredResponse) -> i64 {
        item.sequence
    }
}

/// Service for flow responses.
#[derive(Clone)]
pub struct ResponseService {
    storage: Arc<dyn StorageBackend>,
    pagination: PaginationConfig,
}

impl ResponseService {
    pub fn new(storage: Arc<dyn StorageBackend>, pagination: PaginationConfig) -> Self {
        Self {
            storage,
            pagination,
        }
    }

    /// Validate and store a batch of responses for flow `flow_id`.
    pub async fn submit_responses(&self, flow_id: Uuid, body: &Value) -> Result<u64, ServiceError> {
        let flow = self
            .storage
            .get_flow(flow_id)
            .await?
            .ok_or(ServiceError::NotFound)?;
        let questions = self.storage.get_questions(flow.primary_key).await?;

        let responses = validate_submission(body, flow.primary_key, &questions)?;

        match self.storage.create_responses(&responses).await {
            Ok(count) => {
                info!("Stored {} response(s) for flow {}", count, flow_id);
                Ok(count)
            }
            Err(e) if e.is_unique_violation() => {
                warn!("Rejected response batch for flow {}: {}", flow_id, e);
                let mut errors = ValidationErrors::new();
                errors.add("responses", NOT_UNIQUE);
                Err(errors.wrap("data.attributes").into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// One page of a flow's responses as a `flow-results-data` document.
    ///
    /// `package_url` is the absolute URL of the owning package.
    pub async fn list_responses(
        &self,
        flow_id: Uuid,
        query: &[(String, String)],
        links: &PageLinks,
        package_url: &str,
    ) -> Result<Value, ServiceError> {
        let flow = self
            .storage
            .get_flow(flow_id)
            .await?
            .ok_or(ServiceError::NotFound)?;

        let filter = TimestampFilter {
            start: parse_timestamp_filter(query_param(query, START_TIMESTAMP_PARAM)),
            end: parse_timestamp_filter(query_param(query, END_TIMESTAMP_PARAM)),
        };
        let size = self
            .pagination
            .effective_size(query_param(query, PAGE_SIZE_PARAM));
        let request = PageRequest::from_query(query, size);
        let source = ResponseSource {
            storage: self.storage.as_ref(),
            flow_pk: flow.primary_key,
            filter,
        };
        let page: CursorPage<StoredResponse> = paginate(&source, &request).await?;
        debug!(
            "Listing {} response(s) for flow {}",
            page.items.len(),
            flow_id
        );

        let next = page
            .next_cursor(StoredResponse::cursor)
            .map(|cursor| links.after(&cursor));
        let previous = page
            .previous_cursor(StoredResponse::cursor)
            .map(|cursor| links.before(&cursor));
        let rows = page
            .items
            .iter()
            .map(|stored| stored.decode().map(|response| response.to_row()))
            .collect::<Result<Vec<Value>, _>>()
            .map_err(StorageError::from)?;

        Ok(json!({
            "data": {
                "type": RESULTS_DATA_TYPE,
                "id": flow_id,
                "attributes": {"responses": rows},
                "relationships": {
                    "descriptor": {"links": {"self": package_url}},
                    "links": {
                        "self": links.current(),
                        "next": next,
                        "previous": previous,
                    },
                },
            },
        }))
    }
}
