//! In-memory stand-in for the Agenta backend.
//!
//! Implements the routes the client consumes with just enough behavior to
//! exercise it end to end. DTOs are declared here independently of the
//! client crate.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

const CREATED_AT: &str = "2024-01-15T10:30:00Z";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VariantRow {
    pub app_name: String,
    pub variant_name: String,
    pub previous_variant_name: Option<String>,
    pub parameters: Map<String, Value>,
    /// Names of the per-call inputs the variant's generate route accepts.
    #[serde(skip)]
    pub input_names: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestsetRow {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub app_name: String,
    pub csvdata: Vec<Map<String, Value>>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvaluationRow {
    pub id: String,
    pub app_name: String,
    pub user: Value,
    pub variants: Vec<String>,
    pub evaluation_type: String,
    pub evaluation_type_settings: Value,
    pub status: String,
    pub testset: Value,
    pub inputs: Vec<String>,
    pub created_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScenarioRow {
    pub id: String,
    pub evaluation_id: String,
    pub inputs: Vec<Value>,
    pub outputs: Vec<Value>,
    pub vote: Option<String>,
    pub score: Option<Value>,
    pub correct_answer: Option<String>,
    pub is_pinned: bool,
    pub note: Option<String>,
}

#[derive(Default)]
pub struct Store {
    variants: Vec<VariantRow>,
    testsets: Vec<TestsetRow>,
    evaluations: Vec<EvaluationRow>,
    scenarios: Vec<ScenarioRow>,
    templates: Vec<Value>,
}

impl Store {
    fn seeded() -> Self {
        Self {
            templates: vec![json!({
                "id": "tmpl-single-prompt",
                "image": {
                    "name": "single_prompt",
                    "title": "Single Prompt",
                    "description": "One prompt, one model call",
                    "size": 1_024_000,
                    "digest": "sha256:0f1e2d",
                    "last_pushed": CREATED_AT,
                    "repo_name": "agenta/single_prompt"
                }
            })],
            ..Self::default()
        }
    }

    fn variant(&self, app_name: &str, variant_name: &str) -> Option<&VariantRow> {
        self.variants
            .iter()
            .find(|v| v.app_name == app_name && v.variant_name == variant_name)
    }
}

pub type Db = Arc<RwLock<Store>>;

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct AppQuery {
    pub app_name: String,
}

#[derive(Deserialize)]
pub struct PreviousVariant {
    pub app_name: String,
    pub variant_name: Option<String>,
}

#[derive(Deserialize)]
pub struct AddFromPrevious {
    pub previous_app_variant: PreviousVariant,
    pub new_variant_name: String,
    pub parameters: Map<String, Value>,
}

#[derive(Deserialize)]
pub struct UpdateParameters {
    pub app_name: String,
    pub variant_name: String,
    pub parameters: Map<String, Value>,
}

#[derive(Deserialize)]
pub struct AppKey {
    pub app_name: String,
}

#[derive(Deserialize)]
pub struct VariantKey {
    pub app_name: String,
    pub variant_name: String,
}

#[derive(Deserialize)]
pub struct FromTemplate {
    pub app_name: String,
    pub image_id: String,
    pub image_tag: String,
    #[serde(default)]
    pub env_vars: Option<BTreeMap<String, String>>,
}

#[derive(Deserialize)]
pub struct TestsetBody {
    pub name: String,
    pub csvdata: Vec<Map<String, Value>>,
}

#[derive(Deserialize)]
pub struct TestsetIds {
    pub testset_ids: Vec<String>,
}

#[derive(Deserialize)]
pub struct NewEvaluation {
    pub app_name: String,
    pub variants: Vec<String>,
    pub evaluation_type: String,
    #[serde(default)]
    pub evaluation_type_settings: Value,
    #[serde(default)]
    pub inputs: Vec<String>,
    pub testset_id: String,
    pub status: String,
}

#[derive(Deserialize)]
pub struct EvaluationPatch {
    pub status: Option<String>,
    pub evaluation_type_settings: Option<Value>,
}

#[derive(Deserialize)]
pub struct EvaluationIds {
    pub evaluations_ids: Vec<String>,
}

#[derive(Deserialize)]
pub struct NewScenario {
    #[serde(default)]
    pub inputs: Vec<Value>,
    #[serde(default)]
    pub outputs: Vec<Value>,
    #[serde(default)]
    pub correct_answer: Option<String>,
}

#[derive(Deserialize)]
pub struct ScenarioPatch {
    pub vote: Option<String>,
    pub score: Option<Value>,
    pub outputs: Option<Vec<Value>>,
    pub correct_answer: Option<String>,
    pub is_pinned: Option<bool>,
    pub note: Option<String>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::seeded()));
    Router::new()
        .route("/api/app_variant/list_variants/", get(list_variants))
        .route("/api/app_variant/list_apps/", get(list_apps))
        .route("/api/app_variant/add/from_previous/", post(add_from_previous))
        .route("/api/app_variant/add/from_template/", post(add_from_template))
        .route(
            "/api/app_variant/update_variant_parameters/",
            put(update_variant_parameters),
        )
        .route("/api/app_variant/remove_app/", delete(remove_app))
        .route("/api/app_variant/remove_variant/", delete(remove_variant))
        .route("/api/containers/templates/", get(list_templates))
        .route("/api/containers/templates/{name}/images/", get(pull_image))
        .route(
            "/api/testsets",
            get(list_testsets).delete(delete_testsets),
        )
        .route(
            "/api/testsets/{key}",
            get(get_testset).post(create_testset).put(update_testset),
        )
        .route(
            "/api/evaluations",
            get(list_evaluations)
                .post(create_evaluation)
                .delete(delete_evaluations),
        )
        .route(
            "/api/evaluations/{id}",
            get(get_evaluation).put(update_evaluation),
        )
        .route(
            "/api/evaluations/{id}/evaluation_scenarios",
            get(list_scenarios),
        )
        .route(
            "/api/evaluations/{id}/evaluation_scenario",
            post(create_scenario),
        )
        .route(
            "/api/evaluations/{id}/evaluation_scenario/{scenario_id}/{evaluation_type}",
            put(update_scenario),
        )
        .route("/api/evaluations/{id}/results", get(evaluation_results))
        .route("/{app}/{variant}/openapi.json", get(openapi))
        .route("/{app}/{variant}/generate", post(generate))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

// ---------------------------------------------------------------------------
// Variants
// ---------------------------------------------------------------------------

async fn list_variants(State(db): State<Db>, Query(q): Query<AppQuery>) -> Json<Vec<VariantRow>> {
    let store = db.read().await;
    Json(
        store
            .variants
            .iter()
            .filter(|v| v.app_name == q.app_name)
            .cloned()
            .collect(),
    )
}

async fn list_apps(State(db): State<Db>) -> Json<Vec<Value>> {
    let store = db.read().await;
    let names: BTreeSet<&str> = store.variants.iter().map(|v| v.app_name.as_str()).collect();
    Json(names.into_iter().map(|name| json!({ "app_name": name })).collect())
}

async fn add_from_previous(
    State(db): State<Db>,
    Json(input): Json<AddFromPrevious>,
) -> Result<Json<VariantRow>, StatusCode> {
    let mut store = db.write().await;
    let previous = input.previous_app_variant;
    let previous_name = previous.variant_name.ok_or(StatusCode::BAD_REQUEST)?;
    let base = store
        .variant(&previous.app_name, &previous_name)
        .ok_or(StatusCode::NOT_FOUND)?
        .clone();
    if store.variant(&previous.app_name, &input.new_variant_name).is_some() {
        return Err(StatusCode::CONFLICT);
    }
    let row = VariantRow {
        app_name: previous.app_name,
        variant_name: input.new_variant_name,
        previous_variant_name: Some(previous_name),
        parameters: input.parameters,
        input_names: base.input_names,
    };
    store.variants.push(row.clone());
    Ok(Json(row))
}

fn template_parameters() -> Map<String, Value> {
    let value = json!({
        "prompt_template": "What is the capital of {country}?",
        "temperature": 0.7,
        "max_tokens": 256,
        "model": "gpt-3.5-turbo",
        "stream": false,
        "inputs": ["country"]
    });
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

async fn add_from_template(
    State(db): State<Db>,
    Json(input): Json<FromTemplate>,
) -> Result<Json<VariantRow>, StatusCode> {
    let mut store = db.write().await;
    if store.variants.iter().any(|v| v.app_name == input.app_name) {
        return Err(StatusCode::CONFLICT);
    }
    debug!(
        app = %input.app_name,
        image = %input.image_id,
        tag = %input.image_tag,
        env_vars = input.env_vars.as_ref().map_or(0, BTreeMap::len),
        "starting template"
    );
    let row = VariantRow {
        app_name: input.app_name,
        variant_name: "app".to_string(),
        previous_variant_name: None,
        parameters: template_parameters(),
        input_names: vec!["country".to_string()],
    };
    store.variants.push(row.clone());
    Ok(Json(row))
}

async fn update_variant_parameters(
    State(db): State<Db>,
    Json(input): Json<UpdateParameters>,
) -> StatusCode {
    let mut store = db.write().await;
    match store
        .variants
        .iter_mut()
        .find(|v| v.app_name == input.app_name && v.variant_name == input.variant_name)
    {
        Some(row) => {
            row.parameters = input.parameters;
            StatusCode::OK
        }
        None => StatusCode::NOT_FOUND,
    }
}

async fn remove_app(State(db): State<Db>, Json(input): Json<AppKey>) -> StatusCode {
    let mut store = db.write().await;
    let before = store.variants.len();
    store.variants.retain(|v| v.app_name != input.app_name);
    if store.variants.len() == before {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    }
}

async fn remove_variant(State(db): State<Db>, Json(input): Json<VariantKey>) -> StatusCode {
    let mut store = db.write().await;
    let before = store.variants.len();
    store
        .variants
        .retain(|v| !(v.app_name == input.app_name && v.variant_name == input.variant_name));
    if store.variants.len() == before {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    }
}

/// `x-parameter` tag for a stored parameter value.
fn x_parameter(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::Array(_) => "dict",
        _ => "text",
    }
}

async fn openapi(
    State(db): State<Db>,
    Path((app, variant)): Path<(String, String)>,
) -> Result<Json<Value>, StatusCode> {
    let store = db.read().await;
    let row = store.variant(&app, &variant).ok_or(StatusCode::NOT_FOUND)?;

    let mut properties = Map::new();
    for name in &row.input_names {
        properties.insert(name.clone(), json!({"title": name, "type": "string"}));
    }
    for (name, value) in &row.parameters {
        properties.insert(
            name.clone(),
            json!({"title": name, "x-parameter": x_parameter(value), "default": value}),
        );
    }

    Ok(Json(json!({
        "openapi": "3.0.2",
        "info": {"title": format!("{app}/{variant}"), "version": "0.1.0"},
        "paths": {
            "/generate": {
                "post": {
                    "requestBody": {
                        "content": {
                            "application/json": {
                                "schema": {"$ref": "#/components/schemas/Body_generate_generate_post"}
                            }
                        },
                        "required": true
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Body_generate_generate_post": {
                    "title": "Body_generate_generate_post",
                    "type": "object",
                    "properties": properties,
                    "required": row.input_names
                }
            }
        }
    })))
}

async fn generate(
    State(db): State<Db>,
    Path((app, variant)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    let store = db.read().await;
    let row = store.variant(&app, &variant).ok_or(StatusCode::NOT_FOUND)?;
    let missing = row
        .input_names
        .iter()
        .any(|name| body.get(name).is_none());
    if missing {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    Ok(Json(json!({
        "output": format!("{app}/{variant} generated"),
        "received": body
    })))
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

async fn list_templates(State(db): State<Db>) -> Json<Vec<Value>> {
    Json(db.read().await.templates.clone())
}

async fn pull_image(
    State(db): State<Db>,
    Path(name): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let store = db.read().await;
    let known = store
        .templates
        .iter()
        .any(|t| t["image"]["name"].as_str() == Some(name.as_str()));
    if !known {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(json!({
        "image_id": format!("sha256:{}", new_id()),
        "image_tag": format!("agenta/{name}:latest")
    })))
}

// ---------------------------------------------------------------------------
// Test sets
// ---------------------------------------------------------------------------

fn testset_summary(row: &TestsetRow) -> Value {
    json!({"_id": row.id, "name": row.name, "created_at": row.created_at})
}

async fn list_testsets(State(db): State<Db>, Query(q): Query<AppQuery>) -> Json<Vec<Value>> {
    let store = db.read().await;
    Json(
        store
            .testsets
            .iter()
            .filter(|t| t.app_name == q.app_name)
            .map(testset_summary)
            .collect(),
    )
}

async fn create_testset(
    State(db): State<Db>,
    Path(app_name): Path<String>,
    Json(input): Json<TestsetBody>,
) -> Json<Value> {
    let row = TestsetRow {
        id: new_id(),
        name: input.name,
        app_name,
        csvdata: input.csvdata,
        created_at: CREATED_AT.to_string(),
        updated_at: CREATED_AT.to_string(),
    };
    let summary = testset_summary(&row);
    db.write().await.testsets.push(row);
    Json(summary)
}

async fn get_testset(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<Json<TestsetRow>, StatusCode> {
    let store = db.read().await;
    store
        .testsets
        .iter()
        .find(|t| t.id == id)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn update_testset(
    State(db): State<Db>,
    Path(id): Path<String>,
    Json(input): Json<TestsetBody>,
) -> Result<Json<Value>, StatusCode> {
    let mut store = db.write().await;
    let row = store
        .testsets
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or(StatusCode::NOT_FOUND)?;
    row.name = input.name;
    row.csvdata = input.csvdata;
    Ok(Json(json!({"_id": row.id, "status": "success"})))
}

async fn delete_testsets(State(db): State<Db>, Json(input): Json<TestsetIds>) -> Json<Vec<String>> {
    let mut store = db.write().await;
    let mut deleted = Vec::new();
    store.testsets.retain(|t| {
        let hit = input.testset_ids.contains(&t.id);
        if hit {
            deleted.push(t.id.clone());
        }
        !hit
    });
    Json(deleted)
}

// ---------------------------------------------------------------------------
// Evaluations
// ---------------------------------------------------------------------------

async fn list_evaluations(
    State(db): State<Db>,
    Query(q): Query<AppQuery>,
) -> Json<Vec<EvaluationRow>> {
    let store = db.read().await;
    Json(
        store
            .evaluations
            .iter()
            .filter(|e| e.app_name == q.app_name)
            .cloned()
            .collect(),
    )
}

async fn create_evaluation(
    State(db): State<Db>,
    Json(input): Json<NewEvaluation>,
) -> Result<Json<EvaluationRow>, StatusCode> {
    let mut store = db.write().await;
    let testset = store
        .testsets
        .iter()
        .find(|t| t.id == input.testset_id)
        .map(|t| json!({"_id": t.id, "name": t.name}))
        .ok_or(StatusCode::NOT_FOUND)?;
    let row = EvaluationRow {
        id: new_id(),
        app_name: input.app_name,
        user: json!({"id": "user-mock", "username": "mock"}),
        variants: input.variants,
        evaluation_type: input.evaluation_type,
        evaluation_type_settings: input.evaluation_type_settings,
        status: input.status,
        testset,
        inputs: input.inputs,
        created_at: CREATED_AT.to_string(),
    };
    store.evaluations.push(row.clone());
    Ok(Json(row))
}

async fn get_evaluation(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<Json<EvaluationRow>, StatusCode> {
    let store = db.read().await;
    store
        .evaluations
        .iter()
        .find(|e| e.id == id)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn update_evaluation(
    State(db): State<Db>,
    Path(id): Path<String>,
    Json(patch): Json<EvaluationPatch>,
) -> Result<Json<EvaluationRow>, StatusCode> {
    let mut store = db.write().await;
    let row = store
        .evaluations
        .iter_mut()
        .find(|e| e.id == id)
        .ok_or(StatusCode::NOT_FOUND)?;
    if let Some(status) = patch.status {
        row.status = status;
    }
    if let Some(settings) = patch.evaluation_type_settings {
        row.evaluation_type_settings = settings;
    }
    Ok(Json(row.clone()))
}

async fn delete_evaluations(
    State(db): State<Db>,
    Json(input): Json<EvaluationIds>,
) -> Json<Vec<String>> {
    let mut store = db.write().await;
    let ids = input.evaluations_ids;
    store.evaluations.retain(|e| !ids.contains(&e.id));
    store.scenarios.retain(|s| !ids.contains(&s.evaluation_id));
    Json(ids)
}

async fn list_scenarios(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ScenarioRow>>, StatusCode> {
    let store = db.read().await;
    if !store.evaluations.iter().any(|e| e.id == id) {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(
        store
            .scenarios
            .iter()
            .filter(|s| s.evaluation_id == id)
            .cloned()
            .collect(),
    ))
}

async fn create_scenario(
    State(db): State<Db>,
    Path(id): Path<String>,
    Json(input): Json<NewScenario>,
) -> Result<Json<ScenarioRow>, StatusCode> {
    let mut store = db.write().await;
    if !store.evaluations.iter().any(|e| e.id == id) {
        return Err(StatusCode::NOT_FOUND);
    }
    let row = ScenarioRow {
        id: new_id(),
        evaluation_id: id,
        inputs: input.inputs,
        outputs: input.outputs,
        vote: None,
        score: None,
        correct_answer: input.correct_answer,
        is_pinned: false,
        note: None,
    };
    store.scenarios.push(row.clone());
    Ok(Json(row))
}

async fn update_scenario(
    State(db): State<Db>,
    Path((id, scenario_id, evaluation_type)): Path<(String, String, String)>,
    Json(patch): Json<ScenarioPatch>,
) -> Result<Json<ScenarioRow>, StatusCode> {
    let mut store = db.write().await;
    let evaluation = store
        .evaluations
        .iter()
        .find(|e| e.id == id)
        .ok_or(StatusCode::NOT_FOUND)?;
    if evaluation.evaluation_type != evaluation_type {
        return Err(StatusCode::BAD_REQUEST);
    }
    let row = store
        .scenarios
        .iter_mut()
        .find(|s| s.id == scenario_id && s.evaluation_id == id)
        .ok_or(StatusCode::NOT_FOUND)?;
    if let Some(vote) = patch.vote {
        row.vote = Some(vote);
    }
    if let Some(score) = patch.score {
        row.score = Some(score);
    }
    if let Some(outputs) = patch.outputs {
        row.outputs = outputs;
    }
    if let Some(answer) = patch.correct_answer {
        row.correct_answer = Some(answer);
    }
    if let Some(pinned) = patch.is_pinned {
        row.is_pinned = pinned;
    }
    if let Some(note) = patch.note {
        row.note = Some(note);
    }
    Ok(Json(row.clone()))
}

async fn evaluation_results(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let store = db.read().await;
    let evaluation = store
        .evaluations
        .iter()
        .find(|e| e.id == id)
        .ok_or(StatusCode::NOT_FOUND)?;
    let scenarios: Vec<&ScenarioRow> = store
        .scenarios
        .iter()
        .filter(|s| s.evaluation_id == id)
        .collect();

    if evaluation.evaluation_type == "human_a_b_testing" {
        let mut votes: BTreeMap<String, u64> = BTreeMap::new();
        for vote in scenarios.iter().filter_map(|s| s.vote.as_ref()) {
            *votes.entry(vote.clone()).or_default() += 1;
        }
        let total = scenarios.len().max(1) as f64;
        let per_variant: Map<String, Value> = evaluation
            .variants
            .iter()
            .map(|name| {
                let count = votes.get(name).copied().unwrap_or(0);
                let percentage = (count as f64 / total * 10_000.0).round() / 100.0;
                (
                    name.clone(),
                    json!({"number_of_votes": count, "percentage": percentage}),
                )
            })
            .collect();
        return Ok(Json(json!({
            "votes_data": {
                "nb_of_rows": scenarios.len(),
                "variants": evaluation.variants,
                "variants_votes_data": per_variant,
                "flag_votes": {
                    "number_of_votes": votes.get("0").copied().unwrap_or(0)
                }
            }
        })));
    }

    let mut scores: BTreeMap<String, u64> = BTreeMap::new();
    for score in scenarios.iter().filter_map(|s| s.score.as_ref()) {
        let key = match score {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        *scores.entry(key).or_default() += 1;
    }
    Ok(Json(json!({ "scores_data": scores })))
}
