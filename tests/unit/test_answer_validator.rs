//! Answer validation tests: every question type, its coercions and its messages.

use flow_results_api::models::{FlowQuestion, QuestionType, ResponseValue};
use flow_results_api::services::{Answer, validate_answer};
use serde_json::{Map, Value, json};

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected an object"),
    }
}

fn question(question_type: QuestionType, type_options: Value) -> FlowQuestion {
    FlowQuestion::new("q1", question_type, "Question", object(type_options))
}

fn answer(response: Value, metadata: Value) -> Answer {
    Answer::new(
        ResponseValue::from_json(&response).expect("representable response"),
        object(metadata),
    )
}

fn check(question: &FlowQuestion, response: Value, metadata: Value) -> Value {
    let mut answer = answer(response, metadata);
    validate_answer(question, &mut answer).to_json()
}

#[test]
fn test_select_one_membership() {
    let q = question(QuestionType::SelectOne, json!({"choices": ["a", "b", "c"]}));
    assert_eq!(check(&q, json!("a"), json!({})), json!({}));
    assert_eq!(
        check(&q, json!("d"), json!({})),
        json!({"response": ["d is not a valid choice. Valid choices are ['a', 'b', 'c']"]})
    );
}

#[test]
fn test_choice_order_must_cover_choices() {
    let q = question(QuestionType::SelectOne, json!({"choices": ["a", "b", "c"]}));
    assert_eq!(
        check(&q, json!("a"), json!({"choice_order": ["c", "b", "a"]})),
        json!({})
    );
    assert_eq!(
        check(&q, json!("a"), json!({"choice_order": ["c", "d"]})),
        json!({"response_metadata": [
            "choice_order ['c', 'd'] contains choices not in ['a', 'b', 'c']"
        ]})
    );
    assert_eq!(
        check(&q, json!("a"), json!({"choice_order": "c,b,a"})),
        json!({"response_metadata": ["choice_order must be an array"]})
    );
}

#[test]
fn test_select_many() {
    let q = question(QuestionType::SelectMany, json!({"choices": ["a", "b", "c"]}));
    assert_eq!(check(&q, json!(["a", "c"]), json!({})), json!({}));
    assert_eq!(
        check(&q, json!(["a", "z"]), json!({})),
        json!({"response": ["['a', 'z'] contains choices not in ['a', 'b', 'c']"]})
    );
    assert_eq!(
        check(&q, json!("a"), json!({})),
        json!({"response": ["must be an array"]})
    );
}

#[test]
fn test_numeric_and_text() {
    let numeric = question(QuestionType::Numeric, json!({"range": [1, 10]}));
    assert_eq!(check(&numeric, json!(4), json!({})), json!({}));
    assert_eq!(check(&numeric, json!(4.5), json!({})), json!({}));
    assert_eq!(
        check(&numeric, json!("4"), json!({})),
        json!({"response": ["must be float or integer"]})
    );

    let text = question(QuestionType::Text, json!({}));
    assert_eq!(check(&text, json!("hello"), json!({"language": "eng"})), json!({}));
    assert_eq!(
        check(&text, json!(5), json!({"language": 1})),
        json!({
            "response": ["must be a string"],
            "response_metadata": ["language must be a string"]
        })
    );
}

#[test]
fn test_media_requires_url_and_coerces() {
    let q = question(QuestionType::Image, json!({}));
    let mut valid = answer(
        json!("https://example.org/photo.jpg"),
        json!({"format": "image/jpeg", "dimensions": [640, 480], "file_size_mb": 1.2}),
    );
    assert!(validate_answer(&q, &mut valid).is_empty());
    assert!(matches!(valid.response, ResponseValue::Url(_)));

    assert_eq!(
        check(
            &q,
            json!("not a url"),
            json!({"dimensions": [640], "duration_s": "long", "format": 3})
        ),
        json!({
            "response": ["must be a URL"],
            "response_metadata": [
                "format must be a string",
                "dimensions must have a length of 2",
                "duration_s must be integer or float"
            ]
        })
    );
    assert_eq!(
        check(&q, json!("https://example.org/a.jpg"), json!({"dimensions": [1.5, "x"]})),
        json!({"response_metadata": ["dimensions items must be integers"]})
    );
}

#[test]
fn test_geo_point() {
    let q = question(QuestionType::GeoPoint, json!({}));
    assert_eq!(check(&q, json!([1.5, 2.5]), json!({})), json!({}));
    assert_eq!(
        check(&q, json!([1.5]), json!({})),
        json!({"response": ["number of array elements must be between 2 and 4 inclusive"]})
    );
    assert_eq!(
        check(&q, json!(["a", "b"]), json!({})),
        json!({"response": ["array may only contain floats"]})
    );
    assert_eq!(
        check(&q, json!("1.5,2.5"), json!({})),
        json!({"response": ["must be an array"]})
    );
}

#[test]
fn test_temporal_types_coerce_strings() {
    let datetime = question(QuestionType::Datetime, json!({}));
    let mut valid = answer(json!("2021-02-03T04:05:06+00:00"), json!({}));
    assert!(validate_answer(&datetime, &mut valid).is_empty());
    assert!(matches!(valid.response, ResponseValue::DateTime(_)));
    assert_eq!(
        check(&datetime, json!("2021-02-03"), json!({})),
        json!({"response": ["must be an RFC 3339 date-time"]})
    );

    let date = question(QuestionType::Date, json!({}));
    assert_eq!(check(&date, json!("2021-02-03"), json!({})), json!({}));
    assert_eq!(
        check(&date, json!(20210203), json!({})),
        json!({"response": ["must be an RFC 3339 date"]})
    );

    let time = question(QuestionType::Time, json!({}));
    assert_eq!(check(&time, json!("04:05:06"), json!({})), json!({}));
    assert_eq!(
        check(&time, json!("4 o'clock"), json!({})),
        json!({"response": ["must be an RFC 3339 time"]})
    );
}

#[test]
fn test_open_question_uses_declared_type() {
    let q = question(QuestionType::Open, json!({}));
    let metadata = json!({"type": "select_one", "type_options": {"choices": ["a", "b"]}});
    assert_eq!(check(&q, json!("a"), metadata.clone()), json!({}));
    assert_eq!(
        check(&q, json!("invalid"), metadata),
        json!({"response": ["invalid is not a valid choice. Valid choices are ['a', 'b']"]})
    );
}

#[test]
fn test_open_question_declaration_errors() {
    let q = question(QuestionType::Open, json!({}));
    assert_eq!(
        check(&q, json!("a"), json!({})),
        json!({"response_metadata": ["type is required", "type_options is required"]})
    );
    assert_eq!(
        check(&q, json!(3), json!({"type": "numeric", "type_options": {"range": []}})),
        json!({"response_metadata": ["type_options.range must contain exactly 2 items"]})
    );
    let errors = check(&q, json!("a"), json!({"type": "open", "type_options": []}));
    let messages = errors["response_metadata"].as_array().unwrap();
    assert!(messages[0].as_str().unwrap().starts_with("type must be one of ['audio', "));
    assert_eq!(messages[1], json!("type_options must be an object"));
}
