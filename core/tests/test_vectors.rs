//! Verify criteria, URL building and response normalization against JSON
//! test vectors stored in `test-vectors/`.
//!
//! Comparing parsed JSON (not raw strings) for response bodies avoids false
//! negatives from field-ordering differences.

use serde_json::Value;
use zoho_reports::{
    build_criteria, normalize_response, Action, ClientConfig, Filter, HttpResponse,
    ReportsClient, ReportsError,
};

/// Parse the action name used in vectors into `Action`.
fn parse_action(s: &str) -> Action {
    match s {
        "insert" => Action::Insert,
        "update" => Action::Update,
        "delete" => Action::Delete,
        "import" => Action::Import,
        other => panic!("unknown action: {other}"),
    }
}

// ---------------------------------------------------------------------------
// Criteria
// ---------------------------------------------------------------------------

#[test]
fn criteria_test_vectors() {
    let raw = include_str!("../../test-vectors/criteria.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let filter: Filter = serde_json::from_value(case["filter"].clone()).unwrap();
        let expected = case["expected"].as_str();
        assert_eq!(build_criteria(&filter).as_deref(), expected, "{name}");

        if let Some(criteria) = build_criteria(&filter) {
            let clauses = criteria.matches("(\"").count();
            assert_eq!(clauses, filter.len(), "{name}: clause count");
            assert_eq!(
                criteria.matches(" and ").count(),
                filter.len() - 1,
                "{name}: and count"
            );
            assert_eq!(
                criteria.starts_with("(("),
                filter.len() > 1,
                "{name}: outer parentheses"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// URLs
// ---------------------------------------------------------------------------

#[test]
fn url_test_vectors() {
    let raw = include_str!("../../test-vectors/urls.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let config: ClientConfig = serde_json::from_value(vectors["config"].clone()).unwrap();
    let client = ReportsClient::new(config).unwrap();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let action = parse_action(case["action"].as_str().unwrap());
        let table = case["table"].as_str().unwrap();
        assert_eq!(
            client.build_url(table, action),
            case["expected"].as_str().unwrap(),
            "{name}"
        );
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[test]
fn response_test_vectors() {
    let raw = include_str!("../../test-vectors/responses.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let response = HttpResponse {
            status: case["status"].as_u64().unwrap() as u16,
            headers: Vec::new(),
            body: case["body"].as_str().unwrap().to_string(),
        };
        let expected = &case["expected"];
        let result = normalize_response(Ok(response));

        if let Some(ok) = expected.get("ok") {
            assert_eq!(&result.unwrap(), ok, "{name}");
        } else if let Some(api) = expected.get("api") {
            match result {
                Err(ReportsError::Api { status, response }) => {
                    assert_eq!(u64::from(status), api["status"].as_u64().unwrap(), "{name}");
                    assert_eq!(response.unwrap_or(Value::Null), api["response"], "{name}");
                }
                other => panic!("{name}: expected Api error, got {other:?}"),
            }
        } else if let Some(non_json) = expected.get("non_json") {
            match result {
                Err(ReportsError::NonJsonErrorBody { status, body }) => {
                    assert_eq!(u64::from(status), non_json["status"].as_u64().unwrap(), "{name}");
                    assert_eq!(body, non_json["body"].as_str().unwrap(), "{name}");
                }
                other => panic!("{name}: expected NonJsonErrorBody, got {other:?}"),
            }
        } else {
            panic!("{name}: vector has no expectation");
        }
    }
}

#[test]
fn transport_error_vector() {
    let result = normalize_response(Err("dns lookup failed".into()));
    match result {
        Err(ReportsError::Transport(inner)) => assert_eq!(inner.to_string(), "dns lookup failed"),
        other => panic!("expected Transport error, got {other:?}"),
    }
}
