//! In-memory storage backend.
//!
//! Used when no `DATABASE_URL` is configured and by the test suite. It enforces the
//! same constraints as the PostgreSQL schema: unique flow IDs, unique question IDs per
//! flow and unique `row_id` per question, each checked before anything is written.

use super::{StorageError, traits::*};
use crate::models::{Flow, FlowQuestion, NewFlowResponse, StoredResponse};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    flows: Vec<StoredFlow>,
    questions: Vec<StoredQuestion>,
    responses: Vec<(i64, i64, StoredResponse)>,
    next_flow_pk: i64,
    next_question_pk: i64,
    next_response_pk: i64,
}

/// In-memory storage backend.
#[derive(Default)]
pub struct MemoryStorageBackend {
    state: RwLock<MemoryState>,
}

impl MemoryStorageBackend {
    /// Create an empty in-memory storage backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored responses across all flows.
    pub async fn response_count(&self) -> usize {
        self.state.read().await.responses.len()
    }

    /// Number of stored flows.
    pub async fn flow_count(&self) -> usize {
        self.state.read().await.flows.len()
    }
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[async_trait]
impl StorageBackend for MemoryStorageBackend {
    async fn create_flow(
        &self,
        flow: &Flow,
        questions: &[FlowQuestion],
    ) -> Result<StoredFlow, StorageError> {
        let mut state = self.state.write().await;

        if state.flows.iter().any(|stored| stored.flow.id == flow.id) {
            return Err(StorageError::UniqueViolation {
                constraint: "flows_id_key".to_string(),
            });
        }
        let mut seen = HashSet::new();
        if !questions.iter().all(|question| seen.insert(question.id.as_str())) {
            return Err(StorageError::UniqueViolation {
                constraint: "flow_questions_flow_id_id_key".to_string(),
            });
        }

        let stored = StoredFlow {
            primary_key: next(&mut state.next_flow_pk),
            flow: flow.clone(),
        };
        for question in questions {
            let primary_key = next(&mut state.next_question_pk);
            state.questions.push(StoredQuestion {
                primary_key,
                flow_pk: stored.primary_key,
                question: question.clone(),
            });
        }
        state.flows.push(stored.clone());
        Ok(stored)
    }

    async fn get_flow(&self, id: Uuid) -> Result<Option<StoredFlow>, StorageError> {
        let state = self.state.read().await;
        Ok(state.flows.iter().find(|stored| stored.flow.id == id).cloned())
    }

    async fn get_questions(&self, flow_pk: i64) -> Result<Vec<StoredQuestion>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .questions
            .iter()
            .filter(|stored| stored.flow_pk == flow_pk)
            .cloned()
            .collect())
    }

    async fn scan_flows(&self, range: SequenceRange) -> Result<Vec<StoredFlow>, StorageError> {
        let state = self.state.read().await;
        let mut flows: Vec<StoredFlow> = state
            .flows
            .iter()
            .filter(|stored| range.contains(stored.primary_key))
            .cloned()
            .collect();
        flows.sort_by_key(|stored| stored.primary_key);
        if range.descending {
            flows.reverse();
        }
        flows.truncate(range.limit);
        Ok(flows)
    }

    async fn create_responses(&self, responses: &[NewFlowResponse]) -> Result<u64, StorageError> {
        let mut state = self.state.write().await;

        let mut keys: HashSet<(i64, String)> = state
            .responses
            .iter()
            .map(|(_, question_pk, stored)| (*question_pk, stored.row_id.payload.to_string()))
            .collect();
        for response in responses {
            if !keys.insert((response.question_pk, response.row_id.payload.to_string())) {
                return Err(StorageError::UniqueViolation {
                    constraint: "flow_responses_question_id_row_id_value_key".to_string(),
                });
            }
        }

        for response in responses {
            let sequence = next(&mut state.next_response_pk);
            state.responses.push((
                response.flow_pk,
                response.question_pk,
                StoredResponse {
                    sequence,
                    question_id: response.question_id.clone(),
                    timestamp: response.timestamp,
                    row_id: response.row_id.clone(),
                    contact_id: response.contact_id.clone(),
                    session_id: response.session_id.clone(),
                    response: response.response.clone(),
                    response_metadata: response.response_metadata.clone(),
                },
            ));
        }
        Ok(responses.len() as u64)
    }

    async fn response_sequences(
        &self,
        flow_pk: i64,
        row_id: &str,
    ) -> Result<Option<SequenceSpan>, StorageError> {
        let candidates = row_id_candidates(row_id);
        let state = self.state.read().await;
        let sequences: Vec<i64> = state
            .responses
            .iter()
            .filter(|(owner, _, stored)| {
                *owner == flow_pk && candidates.iter().any(|c| c == &stored.row_id.payload)
            })
            .map(|(_, _, stored)| stored.sequence)
            .collect();
        Ok(match (sequences.iter().min(), sequences.iter().max()) {
            (Some(first), Some(last)) => Some(SequenceSpan {
                first: *first,
                last: *last,
            }),
            _ => None,
        })
    }

    async fn scan_responses(
        &self,
        flow_pk: i64,
        range: SequenceRange,
        filter: TimestampFilter,
    ) -> Result<Vec<StoredResponse>, StorageError> {
        let state = self.state.read().await;
        let mut responses: Vec<StoredResponse> = state
            .responses
            .iter()
            .filter(|(owner, _, stored)| {
                *owner == flow_pk
                    && range.contains(stored.sequence)
                    && filter.contains(stored.timestamp)
            })
            .map(|(_, _, stored)| stored.clone())
            .collect();
        responses.sort_by_key(|stored| stored.sequence);
        if range.descending {
            responses.reverse();
        }
        responses.truncate(range.limit);
        Ok(responses)
    }

    async fn delete_responses_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let mut state = self.state.write().await;
        let before = state.responses.len();
        state
            .responses
            .retain(|(_, _, stored)| stored.timestamp >= cutoff);
        Ok((before - state.responses.len()) as u64)
    }
}
