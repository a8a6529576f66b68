use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::value::{CodecError, ResponseValue, StoredValue};

/// One answer to one question, for one row of submitted data.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowResponse {
    pub question_id: String,
    pub timestamp: DateTime<Utc>,
    pub row_id: ResponseValue,
    pub contact_id: ResponseValue,
    pub session_id: ResponseValue,
    pub response: ResponseValue,
    pub response_metadata: Map<String, Value>,
}

impl FlowResponse {
    /// The 7-tuple wire form:
    /// `[timestamp, row_id, contact_id, session_id, question_id, response, response_metadata]`.
    pub fn to_row(&self) -> Value {
        Value::Array(vec![
            Value::String(self.timestamp.to_rfc3339()),
            self.row_id.to_json(),
            self.contact_id.to_json(),
            self.session_id.to_json(),
            Value::String(self.question_id.clone()),
            self.response.to_json(),
            Value::Object(self.response_metadata.clone()),
        ])
    }
}

/// A validated response ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFlowResponse {
    pub flow_pk: i64,
    pub question_pk: i64,
    pub question_id: String,
    pub timestamp: DateTime<Utc>,
    pub row_id: StoredValue,
    pub contact_id: StoredValue,
    pub session_id: StoredValue,
    pub response: StoredValue,
    pub response_metadata: Map<String, Value>,
}

/// A persisted response. `sequence` is the internal insertion order and is never
/// exposed through the API.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResponse {
    pub sequence: i64,
    pub question_id: String,
    pub timestamp: DateTime<Utc>,
    pub row_id: StoredValue,
    pub contact_id: StoredValue,
    pub session_id: StoredValue,
    pub response: StoredValue,
    pub response_metadata: Map<String, Value>,
}

impl StoredResponse {
    pub fn decode(&self) -> Result<FlowResponse, CodecError> {
        Ok(FlowResponse {
            question_id: self.question_id.clone(),
            timestamp: self.timestamp,
            row_id: self.row_id.decode()?,
            contact_id: self.contact_id.decode()?,
            session_id: self.session_id.decode()?,
            response: self.response.decode()?,
            response_metadata: self.response_metadata.clone(),
        })
    }

    /// The cursor value for this response: its `row_id` rendered as a string.
    pub fn cursor(&self) -> String {
        match &self.row_id.payload {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}
