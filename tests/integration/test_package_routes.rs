//! Flow package endpoint contract tests against the in-memory backend.

use axum::http::StatusCode;
use axum_test::TestServer;
use flow_results_api::config::ServerConfig;
use flow_results_api::routes;
use serde_json::{Value, json};

const PACKAGES: &str = "/api/v1/flow-results/packages";

fn server() -> TestServer {
    let app_state = routes::create_app_state(ServerConfig::default());
    TestServer::new(routes::create_app(app_state)).unwrap()
}

fn package(attributes: Value) -> Value {
    let mut body = json!({
        "data": {
            "type": "packages",
            "attributes": {
                "profile": "flow-results-package",
                "name": "standard_test_survey",
                "flow-results-specification": "1.0.0-rc1",
                "title": "Standard Test Survey",
                "resources": [{
                    "mediatype": "application/json",
                    "encoding": "utf-8",
                    "schema": {
                        "language": "eng",
                        "questions": {
                            "1448506769745_42": {
                                "type": "select_one",
                                "label": "Are you a woman or a man?",
                                "type_options": {"choices": ["Woman", "Man", "Other"]}
                            },
                            "1448506773018_89": {
                                "type": "numeric",
                                "label": "How old are you? Please enter your age in years.",
                                "type_options": {"range": [1, 99]}
                            }
                        }
                    }
                }]
            }
        }
    });
    if let (Some(target), Value::Object(overrides)) =
        (body["data"]["attributes"].as_object_mut(), attributes)
    {
        target.extend(overrides);
    }
    body
}

#[tokio::test]
async fn test_create_package_returns_document() {
    let server = server();
    let id = "8e5a6a0c-1f3b-4a55-9d6e-2f0b0f1c8a11";
    let response = server
        .post(PACKAGES)
        .json(&package(json!({"id": id})))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    let document: Value = response.json();
    assert_eq!(document["data"]["type"], "packages");
    assert_eq!(document["data"]["id"], id);
    let attributes = &document["data"]["attributes"];
    assert_eq!(attributes["flow-results-specification"], "1.0.0-rc1");
    let resource = &attributes["resources"][0];
    assert_eq!(resource["schema"]["fields"].as_array().unwrap().len(), 7);
    assert_eq!(resource["schema"]["fields"][5]["name"], "response_id");
    assert!(
        resource["api-data-url"]
            .as_str()
            .unwrap()
            .ends_with(&format!("/api/v1/flow-results/packages/{}/responses", id))
    );
    assert!(
        document["links"]["self"]
            .as_str()
            .unwrap()
            .ends_with(&format!("/api/v1/flow-results/packages/{}", id))
    );
    assert_eq!(
        resource["schema"]["questions"]["1448506773018_89"]["type_options"],
        json!({"range": [1, 99]})
    );
}

#[tokio::test]
async fn test_get_package_round_trips() {
    let server = server();
    let created: Value = server.post(PACKAGES).json(&package(json!({}))).await.json();
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let response = server.get(&format!("{}/{}", PACKAGES, id)).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let fetched: Value = response.json();
    assert_eq!(fetched["data"]["attributes"], created["data"]["attributes"]);
}

#[tokio::test]
async fn test_unknown_and_malformed_ids_are_not_found() {
    let server = server();
    let response = server
        .get(&format!("{}/{}", PACKAGES, uuid::Uuid::new_v4()))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let response = server.get(&format!("{}/not-a-uuid", PACKAGES)).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_questions_are_reported_together() {
    let server = server();
    let mut body = package(json!({"name": "Bad Name"}));
    body["data"]["attributes"]["resources"][0]["schema"]["questions"] = json!({
        "q1": {"type": "select_one", "label": "Pick", "type_options": {}},
        "q2": {"type": "numeric", "label": "Age", "type_options": {"range": []}},
        "q3": {"type": "multiple_choice", "label": "Other", "type_options": {}}
    });

    let response = server.post(PACKAGES).json(&body).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let errors: Value = response.json();
    let attributes = &errors["data"]["attributes"];
    assert_eq!(
        attributes["name"],
        json!(["can only contain lowercase, alphanumeric characters and '-', '_', '.'"])
    );
    let questions = &attributes["resources"]["0"]["schema"]["questions"];
    assert_eq!(
        questions["q1"]["type_options"],
        json!(["choices is required for select_one type"])
    );
    assert_eq!(
        questions["q2"]["type_options"],
        json!(["range must contain exactly 2 items"])
    );
    assert_eq!(
        questions["q3"]["type"],
        json!(["Value 'multiple_choice' is not a valid choice."])
    );

    let listing: Value = server.get(PACKAGES).await.json();
    assert_eq!(listing["data"], json!([]));
}

#[tokio::test]
async fn test_structural_errors() {
    let server = server();
    let response = server
        .post(PACKAGES)
        .json(&json!({"data": {"type": "package", "attributes": {"resources": []}}}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let errors: Value = response.json();
    assert_eq!(errors["data"]["type"], json!(["\"package\" is not a valid choice."]));
    let attributes = &errors["data"]["attributes"];
    assert_eq!(attributes["profile"], json!(["This field is required."]));
    assert_eq!(
        attributes["flow-results-specification"],
        json!(["This field is required."])
    );
    assert_eq!(attributes["resources"], json!(["must contain exactly 1 item"]));

    let response = server
        .post(PACKAGES)
        .text("{not json")
        .content_type("application/json")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bad_version_and_language() {
    let server = server();
    let mut body = package(json!({"flow-results-specification": "2.0"}));
    body["data"]["attributes"]["resources"][0]["schema"]["language"] = json!("en");

    let errors: Value = server.post(PACKAGES).json(&body).await.json();
    let attributes = &errors["data"]["attributes"];
    assert_eq!(
        attributes["flow-results-specification"],
        json!(["Value '2.0' is not a valid choice."])
    );
    assert_eq!(
        attributes["resources"]["0"]["schema"]["language"],
        json!(["Ensure this value has at least 3 characters (it has 2)."])
    );
}

#[tokio::test]
async fn test_duplicate_id_is_rejected() {
    let server = server();
    let body = package(json!({"id": "0b7c3c36-5ad7-4cf4-a3f0-0d1f0e3c1b22"}));
    assert_eq!(
        server.post(PACKAGES).json(&body).await.status_code(),
        StatusCode::CREATED
    );
    let response = server.post(PACKAGES).json(&body).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let errors: Value = response.json();
    assert_eq!(
        errors["data"]["attributes"]["id"],
        json!(["flow with this id already exists."])
    );
}

#[tokio::test]
async fn test_list_packages_paginates() {
    let server = server();
    for i in 0..3 {
        server
            .post(PACKAGES)
            .json(&package(json!({"name": format!("survey-{}", i)})))
            .await;
    }

    let first: Value = server
        .get(PACKAGES)
        .add_query_param("page[size]", 2)
        .await
        .json();
    assert_eq!(first["data"].as_array().unwrap().len(), 2);
    assert_eq!(first["data"][0]["attributes"]["name"], "survey-0");
    assert_eq!(first["links"]["previous"], Value::Null);
    let cursor = first["data"][1]["id"].as_str().unwrap();

    let second: Value = server
        .get(PACKAGES)
        .add_query_param("page[size]", 2)
        .add_query_param("page[afterCursor]", cursor)
        .await
        .json();
    assert_eq!(second["data"].as_array().unwrap().len(), 1);
    assert_eq!(second["data"][0]["attributes"]["name"], "survey-2");
    assert_eq!(second["links"]["next"], Value::Null);
    assert!(
        second["links"]["previous"]
            .as_str()
            .unwrap()
            .contains("page%5BbeforeCursor%5D=")
    );
}
