//! Cursor pagination tests for response and package listings.

use flow_results_api::config::PaginationConfig;
use flow_results_api::models::{Flow, FlowQuestion, QuestionType};
use flow_results_api::services::{PackageService, PageLinks, ResponseService};
use flow_results_api::storage::{MemoryStorageBackend, StorageBackend};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

const PACKAGE_URL: &str = "http://testserver/api/v1/flow-results/packages/p";

async fn flow_with_responses(page_size: usize, timestamps: &[&str]) -> (ResponseService, Uuid) {
    let storage = Arc::new(MemoryStorageBackend::new());
    let flow = Flow::new("survey", "Survey");
    let questions = vec![FlowQuestion::new("q1", QuestionType::Text, "Name?", Map::new())];
    storage.create_flow(&flow, &questions).await.unwrap();

    let service = ResponseService::new(storage, PaginationConfig { page_size });
    let rows: Vec<Value> = timestamps
        .iter()
        .enumerate()
        .map(|(i, timestamp)| json!([timestamp, format!("a{}", i), "c", "s", "q1", "text", {}]))
        .collect();
    let body = json!({"data": {"type": "responses", "id": flow.id.to_string(), "attributes": {"responses": rows}}});
    service.submit_responses(flow.id, &body).await.unwrap();
    (service, flow.id)
}

async fn five_responses() -> (ResponseService, Uuid) {
    five_responses_with_page_size(100).await
}

async fn five_responses_with_page_size(page_size: usize) -> (ResponseService, Uuid) {
    flow_with_responses(page_size, &[
        "2021-01-01T00:00:00+00:00",
        "2021-01-02T00:00:00+00:00",
        "2021-01-03T00:00:00+00:00",
        "2021-01-04T00:00:00+00:00",
        "2021-01-05T00:00:00+00:00",
    ])
    .await
}

fn query_pairs(raw: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(raw.as_bytes())
        .into_owned()
        .collect()
}

async fn list(service: &ResponseService, flow_id: Uuid, query: &str) -> Value {
    let query = query_pairs(query);
    let links = PageLinks::new(format!("{}/responses", PACKAGE_URL), query.clone());
    service
        .list_responses(flow_id, &query, &links, PACKAGE_URL)
        .await
        .unwrap()
}

fn row_ids(document: &Value) -> Vec<String> {
    document["data"]["attributes"]["responses"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row[1].as_str().unwrap().to_string())
        .collect()
}

fn link(document: &Value, name: &str) -> Value {
    document["data"]["relationships"]["links"][name].clone()
}

#[tokio::test]
async fn test_after_cursor_at_the_end() {
    let (service, flow_id) = five_responses().await;
    let page = list(&service, flow_id, "page[size]=2&page[afterCursor]=a3").await;
    assert_eq!(row_ids(&page), vec!["a4"]);
    assert_eq!(link(&page, "next"), Value::Null);
    let previous = link(&page, "previous");
    let previous = previous.as_str().unwrap();
    assert!(previous.contains("page%5BbeforeCursor%5D=a4"));
    assert!(!previous.contains("afterCursor"));
}

#[tokio::test]
async fn test_first_page_and_next_link() {
    let (service, flow_id) = five_responses().await;
    let page = list(&service, flow_id, "page[size]=2").await;
    assert_eq!(row_ids(&page), vec!["a0", "a1"]);
    assert_eq!(link(&page, "previous"), Value::Null);
    assert_eq!(
        link(&page, "next"),
        json!(format!(
            "{}/responses?page%5Bsize%5D=2&page%5BafterCursor%5D=a1",
            PACKAGE_URL
        ))
    );
}

#[tokio::test]
async fn test_before_cursor_pages_backwards() {
    let (service, flow_id) = five_responses().await;
    let page = list(&service, flow_id, "page[size]=2&page[beforeCursor]=a4").await;
    assert_eq!(row_ids(&page), vec!["a2", "a3"]);
    assert!(link(&page, "next").as_str().unwrap().contains("page%5BafterCursor%5D=a3"));
    assert!(link(&page, "previous").as_str().unwrap().contains("page%5BbeforeCursor%5D=a2"));

    let page = list(&service, flow_id, "page[size]=2&page[beforeCursor]=a2").await;
    assert_eq!(row_ids(&page), vec!["a0", "a1"]);
    assert_eq!(link(&page, "previous"), Value::Null);
}

#[tokio::test]
async fn test_unknown_cursor_is_ignored() {
    let (service, flow_id) = five_responses().await;
    let page = list(&service, flow_id, "page[size]=3&page[afterCursor]=nope").await;
    assert_eq!(row_ids(&page), vec!["a0", "a1", "a2"]);
}

#[tokio::test]
async fn test_page_size_is_capped_by_configuration() {
    let (service, flow_id) = five_responses_with_page_size(2).await;
    let page = list(&service, flow_id, "page[size]=50").await;
    assert_eq!(row_ids(&page), vec!["a0", "a1"]);

    let page = list(&service, flow_id, "page[size]=0").await;
    assert_eq!(row_ids(&page), vec!["a0", "a1"]);
}

#[tokio::test]
async fn test_timestamp_filter_bounds() {
    let (service, flow_id) = five_responses().await;
    let page = list(
        &service,
        flow_id,
        "filter[start-timestamp]=2021-01-02T00:00:00%2B00:00&filter[end-timestamp]=2021-01-04T00:00:00+00:00",
    )
    .await;
    assert_eq!(row_ids(&page), vec!["a2", "a3"]);

    let page = list(&service, flow_id, "filter[start-timestamp]=garbage").await;
    assert_eq!(row_ids(&page).len(), 5);
}

#[tokio::test]
async fn test_listing_is_idempotent() {
    let (service, flow_id) = five_responses().await;
    let first = list(&service, flow_id, "page[size]=2&page[afterCursor]=a1").await;
    let second = list(&service, flow_id, "page[size]=2&page[afterCursor]=a1").await;
    assert_eq!(first, second);
    assert_eq!(row_ids(&first), vec!["a2", "a3"]);
}

#[tokio::test]
async fn test_document_shape() {
    let (service, flow_id) = five_responses().await;
    let page = list(&service, flow_id, "page[size]=1").await;
    assert_eq!(page["data"]["type"], json!("flow-results-data"));
    assert_eq!(page["data"]["id"], json!(flow_id.to_string()));
    assert_eq!(
        page["data"]["relationships"]["descriptor"]["links"]["self"],
        json!(PACKAGE_URL)
    );
    assert_eq!(
        page["data"]["attributes"]["responses"][0],
        json!(["2021-01-01T00:00:00+00:00", "a0", "c", "s", "q1", "text", {}])
    );
}

#[tokio::test]
async fn test_package_listing_pages_by_id() {
    let storage = Arc::new(MemoryStorageBackend::new());
    let mut ids = Vec::new();
    for i in 0..3 {
        let flow = Flow::new(format!("flow-{}", i), "");
        storage.create_flow(&flow, &[]).await.unwrap();
        ids.push(flow.id);
    }
    let service = PackageService::new(storage, PaginationConfig::default());
    let base = "http://testserver/api/v1/flow-results/packages";

    let query = query_pairs("page[size]=2");
    let page = service
        .list_packages(&query, &PageLinks::new(base, query.clone()))
        .await
        .unwrap();
    assert_eq!(page["data"].as_array().unwrap().len(), 2);
    assert_eq!(page["data"][0]["id"], json!(ids[0].to_string()));
    assert_eq!(page["links"]["previous"], Value::Null);
    let next = page["links"]["next"].as_str().unwrap().to_string();
    assert!(next.ends_with(&format!("page%5BafterCursor%5D={}", ids[1])));

    let query = query_pairs(&format!("page[size]=2&page[afterCursor]={}", ids[1]));
    let page = service
        .list_packages(&query, &PageLinks::new(base, query.clone()))
        .await
        .unwrap();
    assert_eq!(page["data"][0]["id"], json!(ids[2].to_string()));
    assert_eq!(page["links"]["next"], Value::Null);
}

/// Three rows, each answering two questions, stored row by row.
async fn two_question_rows() -> (ResponseService, Uuid) {
    let storage = Arc::new(MemoryStorageBackend::new());
    let flow = Flow::new("survey", "Survey");
    let questions = vec![
        FlowQuestion::new("q1", QuestionType::Text, "Name?", Map::new()),
        FlowQuestion::new("q2", QuestionType::Text, "Town?", Map::new()),
    ];
    storage.create_flow(&flow, &questions).await.unwrap();

    let service = ResponseService::new(storage, PaginationConfig { page_size: 100 });
    let answers = [
        ("r1", "q1", "x"),
        ("r1", "q2", "y"),
        ("r2", "q1", "z"),
        ("r2", "q2", "w"),
        ("r3", "q1", "v"),
        ("r3", "q2", "u"),
    ];
    let rows: Vec<Value> = answers
        .iter()
        .map(|(row_id, question, answer)| {
            json!(["2021-01-01T00:00:00+00:00", row_id, "c", "s", question, answer, {}])
        })
        .collect();
    let body = json!({"data": {"type": "responses", "id": flow.id.to_string(), "attributes": {"responses": rows}}});
    service.submit_responses(flow.id, &body).await.unwrap();
    (service, flow.id)
}

fn answers(document: &Value) -> Vec<String> {
    document["data"]["attributes"]["responses"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row[5].as_str().unwrap().to_string())
        .collect()
}

fn link_query(document: &Value, name: &str) -> Option<String> {
    let link = link(document, name);
    let url = Url::parse(link.as_str()?).unwrap();
    url.query().map(str::to_string)
}

#[tokio::test]
async fn test_next_links_return_every_answer_of_multi_question_rows() {
    let (service, flow_id) = two_question_rows().await;
    let mut seen = Vec::new();
    let mut query = Some("page%5Bsize%5D=3".to_string());
    let mut pages = 0;
    while let Some(current) = query {
        let page = list(&service, flow_id, &current).await;
        seen.extend(answers(&page));
        query = link_query(&page, "next");
        pages += 1;
        assert!(pages <= 6);
    }
    assert_eq!(seen, vec!["x", "y", "z", "w", "v", "u"]);
}

#[tokio::test]
async fn test_page_grows_to_finish_its_last_row() {
    let (service, flow_id) = two_question_rows().await;
    let page = list(&service, flow_id, "page[size]=3").await;
    assert_eq!(answers(&page), vec!["x", "y", "z", "w"]);
    assert!(link(&page, "next").as_str().unwrap().contains("page%5BafterCursor%5D=r2"));
}

#[tokio::test]
async fn test_previous_links_return_every_answer_of_multi_question_rows() {
    let (service, flow_id) = two_question_rows().await;
    let page = list(&service, flow_id, "page[size]=3&page[beforeCursor]=r3").await;
    assert_eq!(answers(&page), vec!["x", "y", "z", "w"]);
    assert_eq!(link(&page, "previous"), Value::Null);

    let page = list(&service, flow_id, "page[size]=1&page[beforeCursor]=r3").await;
    assert_eq!(answers(&page), vec!["z", "w"]);
    let previous = link_query(&page, "previous").unwrap();
    let page = list(&service, flow_id, &previous).await;
    assert_eq!(answers(&page), vec!["x", "y"]);
}
