//! Retention purge tests.

use chrono::{TimeZone, Utc};
use flow_results_api::config::PaginationConfig;
use flow_results_api::models::{Flow, FlowQuestion, QuestionType};
use flow_results_api::services::{ResponseService, RetentionService};
use flow_results_api::storage::{MemoryStorageBackend, StorageBackend};
use serde_json::{Map, json};
use std::sync::Arc;

#[tokio::test]
async fn test_purge_deletes_only_old_responses() {
    let storage = Arc::new(MemoryStorageBackend::new());
    let flow = Flow::new("survey", "Survey");
    let questions = vec![FlowQuestion::new("q1", QuestionType::Text, "Name?", Map::new())];
    storage.create_flow(&flow, &questions).await.unwrap();

    let body = json!({"data": {"type": "responses", "id": flow.id.to_string(), "attributes": {"responses": [
        ["2019-01-01T00:00:00+00:00", "old", "c", "s", "q1", "x", {}],
        ["2021-01-15T23:59:59+00:00", "boundary-old", "c", "s", "q1", "x", {}],
        ["2021-01-16T00:30:00+00:00", "boundary-new", "c", "s", "q1", "x", {}],
        ["2025-06-01T12:00:00+00:00", "new", "c", "s", "q1", "x", {}],
    ]}}});
    ResponseService::new(storage.clone(), PaginationConfig::default())
        .submit_responses(flow.id, &body)
        .await
        .unwrap();

    // 12 months back from 2022-01-16 14:30 with the hour reset: 2021-01-16 00:30
    let now = Utc.with_ymd_and_hms(2022, 1, 16, 14, 30, 0).unwrap();
    let service = RetentionService::new(storage.clone(), 12);
    assert_eq!(
        service.cutoff(now),
        Utc.with_ymd_and_hms(2021, 1, 16, 0, 30, 0).unwrap()
    );
    assert_eq!(service.purge(now).await.unwrap(), 2);
    assert_eq!(storage.response_count().await, 2);

    assert_eq!(service.purge(now).await.unwrap(), 0);
}
