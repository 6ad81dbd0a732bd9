//! Verify build/parse methods against JSON test vectors stored in `test-vectors/`.
//!
//! Each vector file describes inputs, expected requests, simulated responses,
//! and expected parse results. Comparing parsed JSON (not raw strings) avoids
//! false negatives from field-ordering differences.

use std::collections::BTreeMap;

use agenta_core::params::build_generate_body;
use agenta_core::{AgentaClient, ApiError, HttpMethod, HttpRequest, HttpResponse, Parameter};
use serde_json::Value;

const BASE_URL: &str = "http://localhost:8000";

fn client() -> AgentaClient {
    AgentaClient::new(BASE_URL).unwrap()
}

/// Parse the method string from test vectors into `HttpMethod`.
fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

fn simulated(case: &Value) -> HttpResponse {
    let sim = &case["simulated_response"];
    HttpResponse {
        status: sim["status"].as_u64().unwrap() as u16,
        headers: Vec::new(),
        body: sim["body"].as_str().unwrap().to_string(),
    }
}

fn check_request(name: &str, req: &HttpRequest, expected: &Value) {
    assert_eq!(req.method, parse_method(expected["method"].as_str().unwrap()), "{name}: method");
    assert_eq!(
        req.url,
        format!("{BASE_URL}{}", expected["path"].as_str().unwrap()),
        "{name}: url"
    );
    match expected.get("body") {
        Some(body) => {
            let actual: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
            assert_eq!(&actual, body, "{name}: body");
            assert_eq!(
                req.headers,
                vec![("content-type".to_string(), "application/json".to_string())],
                "{name}: headers"
            );
        }
        None => assert!(req.body.is_none(), "{name}: body should be None"),
    }
}

// ---------------------------------------------------------------------------
// List variants
// ---------------------------------------------------------------------------

#[test]
fn list_variants_test_vectors() {
    let raw = include_str!("../../test-vectors/list_variants.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();

        let req = c.build_list_variants(case["input_app"].as_str().unwrap());
        check_request(name, &req, &case["expected_request"]);

        let variants = c.parse_list_variants(simulated(case)).unwrap();
        assert_eq!(
            serde_json::to_value(&variants).unwrap(),
            case["expected_result"],
            "{name}: parsed result"
        );
    }
}

// ---------------------------------------------------------------------------
// Generate
// ---------------------------------------------------------------------------

#[test]
fn generate_test_vectors() {
    let raw = include_str!("../../test-vectors/generate.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let input_values: BTreeMap<String, String> =
            serde_json::from_value(case["input_values"].clone()).unwrap();
        let definitions: Vec<Parameter> =
            serde_json::from_value(case["input_definitions"].clone()).unwrap();
        let optional: Vec<Parameter> =
            serde_json::from_value(case["optional_parameters"].clone()).unwrap();

        let body = build_generate_body(&input_values, &definitions, &optional).unwrap();
        let req = c
            .build_generate(case["path"].as_str().unwrap(), &body)
            .unwrap();
        check_request(name, &req, &case["expected_request"]);
    }
}

// ---------------------------------------------------------------------------
// Variant parameters
// ---------------------------------------------------------------------------

#[test]
fn variant_parameters_test_vectors() {
    let raw = include_str!("../../test-vectors/variant_parameters.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let params = c.parse_variant_parameters(simulated(case)).unwrap();

        let input_names: Vec<&str> = params.input_params.iter().map(|p| p.name.as_str()).collect();
        let expected_inputs: Vec<&str> = case["expected_input_names"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(input_names, expected_inputs, "{name}: input params");

        let defaults: serde_json::Map<String, Value> = params
            .init_opt_params
            .iter()
            .map(|p| (p.name.clone(), p.default.clone().unwrap_or(Value::Null)))
            .collect();
        assert_eq!(
            Value::Object(defaults),
            case["expected_init_opt_defaults"],
            "{name}: optional defaults"
        );
        assert!(
            params.init_opt_params.iter().all(|p| !p.input),
            "{name}: no input in optional params"
        );
    }
}

// ---------------------------------------------------------------------------
// Deletes
// ---------------------------------------------------------------------------

#[test]
fn delete_test_vectors() {
    let raw = include_str!("../../test-vectors/deletes.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let ids: Vec<String> = serde_json::from_value(case["ids"].clone()).unwrap();

        let req = match case["target"].as_str().unwrap() {
            "testsets" => c.build_delete_testsets(&ids).unwrap(),
            "evaluations" => c.build_delete_evaluations(&ids).unwrap(),
            other => panic!("{name}: unknown target: {other}"),
        };
        check_request(name, &req, &case["expected_request"]);

        let result = c.parse_unit(simulated(case));
        if let Some(expected_error) = case.get("expected_error") {
            let err = result.unwrap_err();
            match expected_error.as_str().unwrap() {
                "HttpError" => assert!(
                    matches!(err, ApiError::HttpError { .. }),
                    "{name}: expected HttpError"
                ),
                other => panic!("{name}: unknown expected_error: {other}"),
            }
        } else {
            assert!(result.is_ok(), "{name}: expected success");
        }
    }
}
