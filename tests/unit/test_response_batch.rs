//! Response submission tests against the in-memory backend.

use flow_results_api::config::PaginationConfig;
use flow_results_api::models::{Flow, FlowQuestion, QuestionType};
use flow_results_api::services::{ResponseService, ServiceError};
use flow_results_api::storage::{MemoryStorageBackend, StorageBackend};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use uuid::Uuid;

async fn setup() -> (Arc<MemoryStorageBackend>, ResponseService, Uuid) {
    let storage = Arc::new(MemoryStorageBackend::new());
    let mut flow = Flow::new("survey", "Survey");
    flow.language = "eng".to_string();
    let mut choices = Map::new();
    choices.insert("choices".to_string(), json!(["a", "b", "c"]));
    let questions = vec![
        FlowQuestion::new("colour", QuestionType::SelectOne, "Colour?", choices),
        FlowQuestion::new("age", QuestionType::Numeric, "Age?", Map::new()),
    ];
    storage.create_flow(&flow, &questions).await.unwrap();
    let service = ResponseService::new(storage.clone(), PaginationConfig::default());
    (storage, service, flow.id)
}

fn row(row_id: Value, question_id: &str, response: Value) -> Value {
    json!(["2021-02-03T04:05:06+00:00", row_id, "contact", "session", question_id, response, {}])
}

fn body(rows: Vec<Value>) -> Value {
    json!({"data": {"type": "responses", "id": "x", "attributes": {"responses": rows}}})
}

fn validation(result: Result<u64, ServiceError>) -> Value {
    match result {
        Err(ServiceError::Validation(errors)) => errors.to_json(),
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_valid_batch_is_stored() {
    let (storage, service, flow_id) = setup().await;
    let rows = vec![
        row(json!(1), "colour", json!("a")),
        row(json!(1), "age", json!(30)),
        row(json!("two"), "colour", json!("b")),
    ];
    assert_eq!(service.submit_responses(flow_id, &body(rows)).await.unwrap(), 3);
    assert_eq!(storage.response_count().await, 3);
}

#[tokio::test]
async fn test_one_invalid_row_rejects_the_batch() {
    let (storage, service, flow_id) = setup().await;
    let mut rows: Vec<Value> = (0..10)
        .map(|i| row(json!(format!("r{}", i)), "colour", json!("a")))
        .collect();
    rows[6] = row(json!("r6"), "colour", json!("d"));

    let errors = validation(service.submit_responses(flow_id, &body(rows)).await);
    assert_eq!(
        errors,
        json!({"data": {"attributes": {"responses": {"6": {
            "response": ["d is not a valid choice. Valid choices are ['a', 'b', 'c']"]
        }}}}})
    );
    assert_eq!(storage.response_count().await, 0);
}

#[tokio::test]
async fn test_identifier_must_be_string_or_integer() {
    let (_, service, flow_id) = setup().await;
    let rows = vec![row(json!(["1"]), "colour", json!("a"))];
    let errors = validation(service.submit_responses(flow_id, &body(rows)).await);
    assert_eq!(
        errors["data"]["attributes"]["responses"]["0"],
        json!({"row_id_type": ["must be string or integer"]})
    );
}

#[tokio::test]
async fn test_row_level_field_errors() {
    let (_, service, flow_id) = setup().await;
    let rows = vec![
        json!(["yesterday", 1, 2.5, "s", "missing", true, []]),
        json!([1, 2, 3]),
    ];
    let errors = validation(service.submit_responses(flow_id, &body(rows)).await);
    assert_eq!(
        errors,
        json!({"data": {"attributes": {"responses": {
            "1": ["must contain exactly 7 items"]
        }}}})
    );

    let rows = vec![json!(["yesterday", 1, 2.5, "s", "missing", true, []])];
    let errors = validation(service.submit_responses(flow_id, &body(rows)).await);
    assert_eq!(
        errors["data"]["attributes"]["responses"]["0"],
        json!({
            "timestamp": ["Datetime has wrong format. Use RFC 3339."],
            "contact_id_type": ["must be string or integer"],
            "question_id": ["Invalid question_id \"missing\" - object does not exist."],
            "response_type": ["unsupported value type"],
            "response_metadata": ["must be an object"]
        })
    );
}

#[tokio::test]
async fn test_duplicate_row_id_is_a_batch_error() {
    let (storage, service, flow_id) = setup().await;
    let first = vec![row(json!("r1"), "colour", json!("a"))];
    service.submit_responses(flow_id, &body(first)).await.unwrap();

    let second = vec![
        row(json!("r2"), "colour", json!("b")),
        row(json!("r1"), "colour", json!("c")),
    ];
    let errors = validation(service.submit_responses(flow_id, &body(second)).await);
    assert_eq!(
        errors,
        json!({"data": {"attributes": {"responses": ["row_id is not unique for flow question"]}}})
    );
    assert_eq!(storage.response_count().await, 1);
}

#[tokio::test]
async fn test_envelope_structure_errors() {
    let (_, service, flow_id) = setup().await;
    let errors = validation(
        service
            .submit_responses(flow_id, &json!({"data": {"type": "packages", "attributes": {}}}))
            .await,
    );
    assert_eq!(
        errors,
        json!({"data": {
            "type": ["\"packages\" is not a valid choice."],
            "id": ["This field is required."],
            "attributes": {"responses": ["This field is required."]}
        }})
    );
}

#[tokio::test]
async fn test_unknown_flow_is_not_found() {
    let (_, service, _) = setup().await;
    let result = service
        .submit_responses(Uuid::new_v4(), &body(vec![]))
        .await;
    assert!(matches!(result, Err(ServiceError::NotFound)));
}
