//! Stateless HTTP request builder and response parser for the Agenta API.
//!
//! `AgentaClient` holds only the base URL and carries no mutable state
//! between calls. Each backend operation is split into a `build_*` method
//! that produces an `HttpRequest` and a `parse_*` method that consumes an
//! `HttpResponse`. Executing the round-trip is left to a `Transport`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::openapi::parse_openapi_schema;
use crate::params::{normalize_object_defaults, parameters_to_map, split_parameters, GenerateBody};
use crate::types::{
    AddVariantFromPrevious, App, AppTemplate, AppVariantRef, CreateEvaluation, DeleteEvaluations,
    DeleteTestsets, Evaluation, EvaluationResponse, EvaluationScenario,
    EvaluationScenarioResponse, EvaluationType, JsonObject, Parameter, RemoveApp, RemoveVariant,
    Template, TemplateImagePull, Testset, TestsetPayload, TestsetSummary, UpdateVariantParameters,
    Variant, VariantParameters, VariantRecord,
};

const JSON_CONTENT_TYPE: &str = "application/json";

/// Stateless request builder / response parser for the Agenta backend.
#[derive(Debug, Clone)]
pub struct AgentaClient {
    base_url: Url,
}

impl AgentaClient {
    pub fn new(base_url: &str) -> ApiResult<Self> {
        let invalid = |reason: String| ApiError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason,
        };
        let mut url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if url.cannot_be_a_base() {
            return Err(invalid("not a hierarchical URL".to_string()));
        }
        url.set_query(None);
        url.set_fragment(None);
        Ok(Self { base_url: url })
    }

    pub fn from_config(config: &ClientConfig) -> ApiResult<Self> {
        Self::new(&config.base_url)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Join percent-encoded `segments` onto the base path and append `query`.
    ///
    /// A trailing empty segment yields a trailing slash.
    fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> String {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url.into()
    }

    fn request(&self, method: HttpMethod, url: String) -> HttpRequest {
        debug!(method = method.as_str(), url = %url, "built request");
        HttpRequest {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    fn json_request<B: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        url: String,
        body: &B,
    ) -> ApiResult<HttpRequest> {
        let body =
            serde_json::to_string(body).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        let mut request = self.request(method, url);
        request.headers.push(("content-type".to_string(), JSON_CONTENT_TYPE.to_string()));
        request.body = Some(body);
        Ok(request)
    }

    // -----------------------------------------------------------------------
    // Variants
    // -----------------------------------------------------------------------

    pub fn build_list_variants(&self, app_name: &str) -> HttpRequest {
        let url = self.endpoint(
            &["api", "app_variant", "list_variants", ""],
            &[("app_name", app_name)],
        );
        self.request(HttpMethod::Get, url)
    }

    /// An absent, non-list, or empty body yields no variants. Records are
    /// strict: one without a `variant_name` fails the whole list with
    /// `DeserializationError`.
    pub fn parse_list_variants(&self, response: HttpResponse) -> ApiResult<Vec<Variant>> {
        check_status(&response)?;
        if response.body.trim().is_empty() {
            return Ok(Vec::new());
        }
        let body: Value = deserialize(&response.body)?;
        match body {
            Value::Array(items) => items
                .into_iter()
                .map(|item| {
                    serde_json::from_value::<VariantRecord>(item)
                        .map(Variant::from)
                        .map_err(|e| ApiError::DeserializationError(e.to_string()))
                })
                .collect(),
            _ => Ok(Vec::new()),
        }
    }

    /// `path` is the variant's route, e.g. `"my-app/v1"`; `/generate` is appended.
    pub fn build_generate(&self, path: &str, body: &GenerateBody) -> ApiResult<HttpRequest> {
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        segments.push("generate");
        let url = self.endpoint(&segments, &[]);
        self.json_request(HttpMethod::Post, url, body)
    }

    pub fn parse_generate(&self, response: HttpResponse) -> ApiResult<Value> {
        self.parse_json(response)
    }

    pub fn build_get_openapi(&self, app_name: &str, variant: &Variant) -> HttpRequest {
        let url = self.endpoint(&[app_name, variant.source_name(), "openapi.json"], &[]);
        self.request(HttpMethod::Get, url)
    }

    /// Parse `openapi.json` into configuration and input parameters.
    pub fn parse_variant_parameters(&self, response: HttpResponse) -> ApiResult<VariantParameters> {
        let schema: Value = parse_body(&response)?;
        let params = normalize_object_defaults(parse_openapi_schema(&schema)?);
        Ok(split_parameters(params))
    }

    /// Copy `variant.template_variant_name` into a new variant named
    /// `variant.variant_name` with the given parameter defaults.
    pub fn build_add_variant_from_previous(
        &self,
        app_name: &str,
        variant: &Variant,
        parameters: &[Parameter],
    ) -> ApiResult<HttpRequest> {
        let body = AddVariantFromPrevious {
            previous_app_variant: AppVariantRef {
                app_name: app_name.to_string(),
                variant_name: variant.template_variant_name.clone(),
            },
            new_variant_name: variant.variant_name.clone(),
            parameters: parameters_to_map(parameters),
        };
        let url = self.endpoint(&["api", "app_variant", "add", "from_previous", ""], &[]);
        self.json_request(HttpMethod::Post, url, &body)
    }

    pub fn build_update_variant_parameters(
        &self,
        app_name: &str,
        variant: &Variant,
        parameters: &[Parameter],
    ) -> ApiResult<HttpRequest> {
        let body = UpdateVariantParameters {
            app_name: app_name.to_string(),
            variant_name: variant.variant_name.clone(),
            parameters: parameters_to_map(parameters),
        };
        let url = self.endpoint(&["api", "app_variant", "update_variant_parameters", ""], &[]);
        self.json_request(HttpMethod::Put, url, &body)
    }

    pub fn build_remove_app(&self, app_name: &str) -> ApiResult<HttpRequest> {
        let body = RemoveApp {
            app_name: app_name.to_string(),
        };
        let url = self.endpoint(&["api", "app_variant", "remove_app", ""], &[]);
        self.json_request(HttpMethod::Delete, url, &body)
    }

    pub fn build_remove_variant(&self, app_name: &str, variant_name: &str) -> ApiResult<HttpRequest> {
        let body = RemoveVariant {
            app_name: app_name.to_string(),
            variant_name: variant_name.to_string(),
        };
        let url = self.endpoint(&["api", "app_variant", "remove_variant", ""], &[]);
        self.json_request(HttpMethod::Delete, url, &body)
    }

    // -----------------------------------------------------------------------
    // Test sets
    // -----------------------------------------------------------------------

    pub fn build_list_testsets(&self, app_name: &str) -> HttpRequest {
        let url = self.endpoint(&["api", "testsets"], &[("app_name", app_name)]);
        self.request(HttpMethod::Get, url)
    }

    pub fn parse_list_testsets(&self, response: HttpResponse) -> ApiResult<Vec<TestsetSummary>> {
        parse_body(&response)
    }

    pub fn build_create_testset(
        &self,
        app_name: &str,
        name: &str,
        rows: &[JsonObject],
    ) -> ApiResult<HttpRequest> {
        let body = TestsetPayload {
            name: name.to_string(),
            csvdata: rows.to_vec(),
        };
        let url = self.endpoint(&["api", "testsets", app_name], &[]);
        self.json_request(HttpMethod::Post, url, &body)
    }

    pub fn parse_create_testset(&self, response: HttpResponse) -> ApiResult<TestsetSummary> {
        parse_body(&response)
    }

    pub fn build_update_testset(
        &self,
        testset_id: &str,
        name: &str,
        rows: &[JsonObject],
    ) -> ApiResult<HttpRequest> {
        let body = TestsetPayload {
            name: name.to_string(),
            csvdata: rows.to_vec(),
        };
        let url = self.endpoint(&["api", "testsets", testset_id], &[]);
        self.json_request(HttpMethod::Put, url, &body)
    }

    pub fn build_get_testset(&self, testset_id: &str) -> HttpRequest {
        let url = self.endpoint(&["api", "testsets", testset_id], &[]);
        self.request(HttpMethod::Get, url)
    }

    pub fn parse_get_testset(&self, response: HttpResponse) -> ApiResult<Testset> {
        parse_body(&response)
    }

    pub fn build_delete_testsets(&self, ids: &[String]) -> ApiResult<HttpRequest> {
        let body = DeleteTestsets {
            testset_ids: ids.to_vec(),
        };
        let url = self.endpoint(&["api", "testsets"], &[]);
        self.json_request(HttpMethod::Delete, url, &body)
    }

    // -----------------------------------------------------------------------
    // Evaluations
    // -----------------------------------------------------------------------

    pub fn build_list_evaluations(&self, app_name: &str) -> HttpRequest {
        let url = self.endpoint(&["api", "evaluations"], &[("app_name", app_name)]);
        self.request(HttpMethod::Get, url)
    }

    pub fn parse_list_evaluations(&self, response: HttpResponse) -> ApiResult<Vec<Evaluation>> {
        self.parse_list_evaluations_with(response, Evaluation::from)
    }

    /// Like `parse_list_evaluations` with a caller-supplied record mapping.
    pub fn parse_list_evaluations_with<T>(
        &self,
        response: HttpResponse,
        transform: impl FnMut(EvaluationResponse) -> T,
    ) -> ApiResult<Vec<T>> {
        parse_records(&response, transform)
    }

    pub fn build_get_evaluation(&self, evaluation_id: &str) -> HttpRequest {
        let url = self.endpoint(&["api", "evaluations", evaluation_id], &[]);
        self.request(HttpMethod::Get, url)
    }

    pub fn parse_evaluation(&self, response: HttpResponse) -> ApiResult<Evaluation> {
        parse_body::<EvaluationResponse>(&response).map(Evaluation::from)
    }

    pub fn build_create_evaluation(&self, input: &CreateEvaluation) -> ApiResult<HttpRequest> {
        let url = self.endpoint(&["api", "evaluations"], &[]);
        self.json_request(HttpMethod::Post, url, input)
    }

    pub fn build_update_evaluation(&self, evaluation_id: &str, data: &Value) -> ApiResult<HttpRequest> {
        let url = self.endpoint(&["api", "evaluations", evaluation_id], &[]);
        self.json_request(HttpMethod::Put, url, data)
    }

    pub fn build_delete_evaluations(&self, ids: &[String]) -> ApiResult<HttpRequest> {
        let body = DeleteEvaluations {
            evaluations_ids: ids.to_vec(),
        };
        let url = self.endpoint(&["api", "evaluations"], &[]);
        self.json_request(HttpMethod::Delete, url, &body)
    }

    pub fn build_list_evaluation_scenarios(&self, evaluation_id: &str) -> HttpRequest {
        let url = self.endpoint(
            &["api", "evaluations", evaluation_id, "evaluation_scenarios"],
            &[],
        );
        self.request(HttpMethod::Get, url)
    }

    pub fn parse_evaluation_scenarios(
        &self,
        response: HttpResponse,
        evaluation: &Evaluation,
    ) -> ApiResult<Vec<EvaluationScenario>> {
        self.parse_evaluation_scenarios_with(response, |raw| {
            EvaluationScenario::from_response(raw, evaluation)
        })
    }

    pub fn parse_evaluation_scenarios_with<T>(
        &self,
        response: HttpResponse,
        transform: impl FnMut(EvaluationScenarioResponse) -> T,
    ) -> ApiResult<Vec<T>> {
        parse_records(&response, transform)
    }

    pub fn build_update_evaluation_scenario(
        &self,
        evaluation_id: &str,
        scenario_id: &str,
        evaluation_type: EvaluationType,
        data: &Value,
    ) -> ApiResult<HttpRequest> {
        let url = self.endpoint(
            &[
                "api",
                "evaluations",
                evaluation_id,
                "evaluation_scenario",
                scenario_id,
                evaluation_type.as_str(),
            ],
            &[],
        );
        self.json_request(HttpMethod::Put, url, data)
    }

    pub fn build_create_evaluation_scenario(
        &self,
        evaluation_id: &str,
        data: &Value,
    ) -> ApiResult<HttpRequest> {
        let url = self.endpoint(
            &["api", "evaluations", evaluation_id, "evaluation_scenario"],
            &[],
        );
        self.json_request(HttpMethod::Post, url, data)
    }

    pub fn build_evaluation_results(&self, evaluation_id: &str) -> HttpRequest {
        let url = self.endpoint(&["api", "evaluations", evaluation_id, "results"], &[]);
        self.request(HttpMethod::Get, url)
    }

    // -----------------------------------------------------------------------
    // Apps and templates
    // -----------------------------------------------------------------------

    pub fn build_list_apps(&self) -> HttpRequest {
        let url = self.endpoint(&["api", "app_variant", "list_apps", ""], &[]);
        self.request(HttpMethod::Get, url)
    }

    pub fn parse_list_apps(&self, response: HttpResponse) -> ApiResult<Vec<App>> {
        parse_body(&response)
    }

    pub fn build_list_templates(&self) -> HttpRequest {
        let url = self.endpoint(&["api", "containers", "templates", ""], &[]);
        self.request(HttpMethod::Get, url)
    }

    pub fn parse_list_templates(&self, response: HttpResponse) -> ApiResult<Vec<Template>> {
        parse_body(&response)
    }

    pub fn build_pull_template_image(&self, image_name: &str) -> HttpRequest {
        let url = self.endpoint(&["api", "containers", "templates", image_name, "images", ""], &[]);
        self.request(HttpMethod::Get, url)
    }

    pub fn parse_pull_template_image(&self, response: HttpResponse) -> ApiResult<TemplateImagePull> {
        parse_body(&response)
    }

    pub fn build_start_template(&self, template: &AppTemplate) -> ApiResult<HttpRequest> {
        let url = self.endpoint(&["api", "app_variant", "add", "from_template", ""], &[]);
        self.json_request(HttpMethod::Post, url, template)
    }

    // -----------------------------------------------------------------------
    // Shared parsers
    // -----------------------------------------------------------------------

    /// Pass-through parse: the response body as JSON, null when empty.
    pub fn parse_json(&self, response: HttpResponse) -> ApiResult<Value> {
        check_status(&response)?;
        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        deserialize(&response.body)
    }

    /// Status check only; the body is ignored.
    pub fn parse_unit(&self, response: HttpResponse) -> ApiResult<()> {
        check_status(&response)
    }
}

/// Map non-success status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse) -> ApiResult<()> {
    if response.is_success() {
        return Ok(());
    }
    if response.status == 404 {
        return Err(ApiError::NotFound);
    }
    Err(ApiError::HttpError {
        status: response.status,
        body: response.body.clone(),
    })
}

fn deserialize<T: DeserializeOwned>(body: &str) -> ApiResult<T> {
    serde_json::from_str(body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

fn parse_body<T: DeserializeOwned>(response: &HttpResponse) -> ApiResult<T> {
    check_status(response)?;
    deserialize(&response.body)
}

fn parse_records<R: DeserializeOwned, T>(
    response: &HttpResponse,
    transform: impl FnMut(R) -> T,
) -> ApiResult<Vec<T>> {
    let records: Vec<R> = parse_body(response)?;
    Ok(records.into_iter().map(transform).collect())
}
