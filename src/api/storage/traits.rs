//! Storage trait definitions for the API storage backends.

use crate::models::{Flow, FlowQuestion, NewFlowResponse, StoredResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted flow with its internal primary key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredFlow {
    pub primary_key: i64,
    pub flow: Flow,
}

/// A persisted question with its internal primary key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredQuestion {
    pub primary_key: i64,
    pub flow_pk: i64,
    pub question: FlowQuestion,
}

/// Bounds of an ordered scan over internal sequence numbers.
///
/// `after` and `before` are exclusive. Rows come back ascending unless `descending`
/// is set, at most `limit` of them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SequenceRange {
    pub after: Option<i64>,
    pub before: Option<i64>,
    pub descending: bool,
    pub limit: usize,
}

impl SequenceRange {
    pub fn contains(&self, sequence: i64) -> bool {
        self.after.is_none_or(|after| sequence > after)
            && self.before.is_none_or(|before| sequence < before)
    }
}

/// Timestamp window applied to response scans: `start < timestamp <= end`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimestampFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimestampFilter {
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| timestamp > start)
            && self.end.is_none_or(|end| timestamp <= end)
    }
}

/// Lowest and highest internal sequence numbers of the responses sharing a `row_id`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SequenceSpan {
    pub first: i64,
    pub last: i64,
}

/// Storage backend trait for database operations
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Insert a flow and all of its questions atomically.
    async fn create_flow(
        &self,
        flow: &Flow,
        questions: &[FlowQuestion],
    ) -> Result<StoredFlow, super::StorageError>;

    /// Get flow by its public ID
    async fn get_flow(&self, id: Uuid) -> Result<Option<StoredFlow>, super::StorageError>;

    /// Get all questions of a flow
    async fn get_questions(
        &self,
        flow_pk: i64,
    ) -> Result<Vec<StoredQuestion>, super::StorageError>;

    /// Internal sequence of the flow with this public ID
    async fn flow_sequence(&self, id: Uuid) -> Result<Option<i64>, super::StorageError> {
        Ok(self.get_flow(id).await?.map(|stored| stored.primary_key))
    }

    /// Scan flows ordered by primary key
    async fn scan_flows(&self, range: SequenceRange)
    -> Result<Vec<StoredFlow>, super::StorageError>;

    /// Insert a batch of responses in one operation. A `(question, row_id)` collision
    /// rejects the whole batch with `StorageError::UniqueViolation`.
    async fn create_responses(
        &self,
        responses: &[NewFlowResponse],
    ) -> Result<u64, super::StorageError>;

    /// Sequence span of the flow's responses whose `row_id` matches the cursor value.
    async fn response_sequences(
        &self,
        flow_pk: i64,
        row_id: &str,
    ) -> Result<Option<SequenceSpan>, super::StorageError>;

    /// Scan a flow's responses ordered by internal sequence
    async fn scan_responses(
        &self,
        flow_pk: i64,
        range: SequenceRange,
        filter: TimestampFilter,
    ) -> Result<Vec<StoredResponse>, super::StorageError>;

    /// Delete every response older than `cutoff`, returning how many were removed
    async fn delete_responses_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, super::StorageError>;
}

/// JSON values a `row_id` cursor can match: the string itself and, when it parses
/// as one, the integer.
pub fn row_id_candidates(row_id: &str) -> Vec<serde_json::Value> {
    let mut candidates = vec![serde_json::Value::String(row_id.to_string())];
    if let Ok(integer) = row_id.parse::<i64>() {
        candidates.push(serde_json::Value::from(integer));
    }
    candidates
}
