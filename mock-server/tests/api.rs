use axum::http::{self, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use mock_server::app;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

/// Send one request through a clone of the router, sharing its state.
async fn send(app: &Router, request: Request<String>) -> axum::response::Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn start_template(app: &Router, app_name: &str) {
    let resp = send(
        app,
        json_request(
            "POST",
            "/api/app_variant/add/from_template/",
            json!({"app_name": app_name, "image_id": "sha256:abc", "image_tag": "agenta/single_prompt:latest"}),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

// --- variants ---

#[tokio::test]
async fn list_variants_empty() {
    let app = app();
    let resp = send(&app, get("/api/app_variant/list_variants/?app_name=qa")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!([]));
}

#[tokio::test]
async fn template_creates_app_with_openapi() {
    let app = app();
    start_template(&app, "qa").await;

    let resp = send(&app, get("/api/app_variant/list_apps/")).await;
    assert_eq!(body_json(resp).await, json!([{"app_name": "qa"}]));

    let resp = send(&app, get("/qa/app/openapi.json")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let doc = body_json(resp).await;
    let props = &doc["components"]["schemas"]["Body_generate_generate_post"]["properties"];
    assert!(props["country"].get("x-parameter").is_none());
    assert_eq!(props["temperature"]["x-parameter"], "float");
    assert_eq!(props["inputs"]["x-parameter"], "dict");
}

#[tokio::test]
async fn starting_same_app_twice_conflicts() {
    let app = app();
    start_template(&app, "qa").await;
    let resp = send(
        &app,
        json_request(
            "POST",
            "/api/app_variant/add/from_template/",
            json!({"app_name": "qa", "image_id": "x", "image_tag": "y"}),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn add_from_previous_requires_existing_base() {
    let app = app();
    let resp = send(
        &app,
        json_request(
            "POST",
            "/api/app_variant/add/from_previous/",
            json!({
                "previous_app_variant": {"app_name": "qa", "variant_name": "app"},
                "new_variant_name": "v2",
                "parameters": {}
            }),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn generate_requires_declared_inputs() {
    let app = app();
    start_template(&app, "qa").await;

    let resp = send(&app, json_request("POST", "/qa/app/generate", json!({"inputs": {}}))).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resp = send(
        &app,
        json_request("POST", "/qa/app/generate", json!({"inputs": {}, "country": "France"})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["received"]["country"], "France");
}

#[tokio::test]
async fn remove_missing_variant_returns_404() {
    let app = app();
    let resp = send(
        &app,
        json_request(
            "DELETE",
            "/api/app_variant/remove_variant/",
            json!({"app_name": "qa", "variant_name": "nope"}),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- templates ---

#[tokio::test]
async fn templates_are_seeded_and_pullable() {
    let app = app();
    let resp = send(&app, get("/api/containers/templates/")).await;
    let templates = body_json(resp).await;
    assert_eq!(templates[0]["image"]["name"], "single_prompt");

    let resp = send(&app, get("/api/containers/templates/single_prompt/images/")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["image_tag"], "agenta/single_prompt:latest");

    let resp = send(&app, get("/api/containers/templates/unknown/images/")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- test sets ---

#[tokio::test]
async fn testset_lifecycle() {
    let app = app();
    let resp = send(
        &app,
        json_request(
            "POST",
            "/api/testsets/qa",
            json!({"name": "capitals", "csvdata": [{"country": "France", "correct_answer": "Paris"}]}),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let id = body_json(resp).await["_id"].as_str().unwrap().to_string();

    let resp = send(&app, get("/api/testsets?app_name=qa")).await;
    assert_eq!(body_json(resp).await.as_array().unwrap().len(), 1);

    let resp = send(&app, get(&format!("/api/testsets/{id}"))).await;
    assert_eq!(body_json(resp).await["csvdata"][0]["country"], "France");

    let resp = send(
        &app,
        json_request("DELETE", "/api/testsets", json!({"testset_ids": [id]})),
    )
    .await;
    assert_eq!(body_json(resp).await, json!([id]));

    let resp = send(&app, get(&format!("/api/testsets/{id}"))).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- evaluations ---

#[tokio::test]
async fn evaluation_needs_known_testset() {
    let app = app();
    let resp = send(
        &app,
        json_request(
            "POST",
            "/api/evaluations",
            json!({
                "app_name": "qa",
                "variants": ["app"],
                "evaluation_type": "auto_exact_match",
                "testset_id": "missing",
                "status": "EVALUATION_INITIALIZED"
            }),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn scenario_update_checks_evaluation_type() {
    let app = app();
    let resp = send(
        &app,
        json_request("POST", "/api/testsets/qa", json!({"name": "t", "csvdata": []})),
    )
    .await;
    let testset_id = body_json(resp).await["_id"].as_str().unwrap().to_string();

    let resp = send(
        &app,
        json_request(
            "POST",
            "/api/evaluations",
            json!({
                "app_name": "qa",
                "variants": ["a", "b"],
                "evaluation_type": "human_a_b_testing",
                "testset_id": testset_id,
                "status": "EVALUATION_INITIALIZED"
            }),
        ),
    )
    .await;
    let evaluation_id = body_json(resp).await["id"].as_str().unwrap().to_string();

    let resp = send(
        &app,
        json_request(
            "POST",
            &format!("/api/evaluations/{evaluation_id}/evaluation_scenario"),
            json!({"inputs": [{"input_name": "country", "input_value": "France"}], "outputs": []}),
        ),
    )
    .await;
    let scenario_id = body_json(resp).await["id"].as_str().unwrap().to_string();

    let uri = |ty: &str| {
        format!("/api/evaluations/{evaluation_id}/evaluation_scenario/{scenario_id}/{ty}")
    };
    let resp = send(&app, json_request("PUT", &uri("auto_exact_match"), json!({"vote": "a"}))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = send(&app, json_request("PUT", &uri("human_a_b_testing"), json!({"vote": "a"}))).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&app, get(&format!("/api/evaluations/{evaluation_id}/results"))).await;
    let results = body_json(resp).await;
    assert_eq!(
        results["votes_data"]["variants_votes_data"]["a"]["number_of_votes"],
        1
    );
    assert_eq!(results["votes_data"]["variants_votes_data"]["a"]["percentage"], 100.0);
}
