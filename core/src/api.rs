//! One method per backend operation: build the request, execute it through
//! a `Transport`, parse the response. Errors propagate unchanged.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::cache::{QueryCache, QueryOptions, QueryState, RevalidationPolicy};
use crate::client::AgentaClient;
use crate::config::ClientConfig;
use crate::error::ApiResult;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::params::build_generate_body;
use crate::transport::{Transport, UreqTransport};
use crate::types::{
    App, AppTemplate, CreateEvaluation, Evaluation, EvaluationScenario, EvaluationType,
    JsonObject, Parameter, Template, TemplateImagePull, Testset, TestsetSummary, Variant,
    VariantParameters,
};

/// Test set listing as seen by UI code.
#[derive(Debug, Clone, PartialEq)]
pub struct TestsetsList {
    pub testsets: Option<Vec<TestsetSummary>>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl From<QueryState<Vec<TestsetSummary>>> for TestsetsList {
    fn from(state: QueryState<Vec<TestsetSummary>>) -> Self {
        Self {
            testsets: state.data,
            is_loading: state.is_loading,
            error: state.error,
        }
    }
}

const TESTSETS_LIST_OPTIONS: QueryOptions = QueryOptions {
    revalidate_on_focus: false,
};

#[derive(Debug, Clone)]
pub struct AgentaApi<T = UreqTransport> {
    client: AgentaClient,
    transport: T,
}

impl AgentaApi<UreqTransport> {
    pub fn from_config(config: &ClientConfig) -> ApiResult<Self> {
        Ok(Self::new(
            AgentaClient::from_config(config)?,
            UreqTransport::new(config),
        ))
    }
}

impl<T: Transport> AgentaApi<T> {
    pub fn new(client: AgentaClient, transport: T) -> Self {
        Self { client, transport }
    }

    pub fn client(&self) -> &AgentaClient {
        &self.client
    }

    fn send(&self, request: HttpRequest) -> ApiResult<HttpResponse> {
        self.transport.execute(request)
    }

    fn get_json(&self, url: &str) -> ApiResult<Value> {
        let request = HttpRequest {
            method: HttpMethod::Get,
            url: url.to_string(),
            headers: Vec::new(),
            body: None,
        };
        self.client.parse_json(self.send(request)?)
    }

    // -----------------------------------------------------------------------
    // Variants
    // -----------------------------------------------------------------------

    pub fn fetch_variants(&self, app_name: &str) -> ApiResult<Vec<Variant>> {
        let response = self.send(self.client.build_list_variants(app_name))?;
        self.client.parse_list_variants(response)
    }

    /// Run a variant's generate endpoint at `path` and return its output.
    pub fn call_variant(
        &self,
        input_values: &BTreeMap<String, String>,
        input_definitions: &[Parameter],
        optional_parameters: &[Parameter],
        path: &str,
    ) -> ApiResult<Value> {
        let body = build_generate_body(input_values, input_definitions, optional_parameters)?;
        let response = self.send(self.client.build_generate(path, &body)?)?;
        self.client.parse_generate(response)
    }

    pub fn get_variant_parameters_from_openapi(
        &self,
        app_name: &str,
        variant: &Variant,
    ) -> ApiResult<VariantParameters> {
        let response = self.send(self.client.build_get_openapi(app_name, variant))?;
        self.client.parse_variant_parameters(response)
    }

    pub fn save_new_variant(
        &self,
        app_name: &str,
        variant: &Variant,
        parameters: &[Parameter],
    ) -> ApiResult<()> {
        let request = self
            .client
            .build_add_variant_from_previous(app_name, variant, parameters)?;
        self.client.parse_unit(self.send(request)?)
    }

    pub fn update_variant_params(
        &self,
        app_name: &str,
        variant: &Variant,
        parameters: &[Parameter],
    ) -> ApiResult<()> {
        let request = self
            .client
            .build_update_variant_parameters(app_name, variant, parameters)?;
        self.client.parse_unit(self.send(request)?)
    }

    pub fn remove_app(&self, app_name: &str) -> ApiResult<()> {
        let request = self.client.build_remove_app(app_name)?;
        self.client.parse_unit(self.send(request)?)
    }

    pub fn remove_variant(&self, app_name: &str, variant_name: &str) -> ApiResult<()> {
        let request = self.client.build_remove_variant(app_name, variant_name)?;
        self.client.parse_unit(self.send(request)?)
    }

    // -----------------------------------------------------------------------
    // Test sets
    // -----------------------------------------------------------------------

    /// Cached test set listing; not refetched on window focus.
    pub fn load_testsets_list<P: RevalidationPolicy>(
        &self,
        cache: &mut QueryCache<P>,
        app_name: &str,
    ) -> TestsetsList {
        let request = self.client.build_list_testsets(app_name);
        let key = request.url.clone();
        let state = cache.query(&key, TESTSETS_LIST_OPTIONS, || {
            self.client.parse_json(self.send(request)?)
        });
        TestsetsList::from(state.into_typed::<Vec<TestsetSummary>>())
    }

    pub fn create_new_testset(
        &self,
        app_name: &str,
        name: &str,
        rows: &[JsonObject],
    ) -> ApiResult<TestsetSummary> {
        let request = self.client.build_create_testset(app_name, name, rows)?;
        self.client.parse_create_testset(self.send(request)?)
    }

    pub fn update_testset(&self, testset_id: &str, name: &str, rows: &[JsonObject]) -> ApiResult<Value> {
        let request = self.client.build_update_testset(testset_id, name, rows)?;
        self.client.parse_json(self.send(request)?)
    }

    pub fn load_testset(&self, testset_id: &str) -> ApiResult<Testset> {
        let response = self.send(self.client.build_get_testset(testset_id))?;
        self.client.parse_get_testset(response)
    }

    pub fn delete_testsets(&self, ids: &[String]) -> ApiResult<()> {
        let request = self.client.build_delete_testsets(ids)?;
        self.client.parse_unit(self.send(request)?)
    }

    // -----------------------------------------------------------------------
    // Evaluations
    // -----------------------------------------------------------------------

    pub fn load_evaluations(&self, app_name: &str) -> ApiResult<Vec<Evaluation>> {
        let response = self.send(self.client.build_list_evaluations(app_name))?;
        self.client.parse_list_evaluations(response)
    }

    pub fn load_evaluation(&self, evaluation_id: &str) -> ApiResult<Evaluation> {
        let response = self.send(self.client.build_get_evaluation(evaluation_id))?;
        self.client.parse_evaluation(response)
    }

    pub fn create_evaluation(&self, input: &CreateEvaluation) -> ApiResult<Evaluation> {
        let request = self.client.build_create_evaluation(input)?;
        self.client.parse_evaluation(self.send(request)?)
    }

    pub fn update_evaluation(&self, evaluation_id: &str, data: &Value) -> ApiResult<Value> {
        let request = self.client.build_update_evaluation(evaluation_id, data)?;
        self.client.parse_json(self.send(request)?)
    }

    pub fn delete_evaluations(&self, ids: &[String]) -> ApiResult<()> {
        let request = self.client.build_delete_evaluations(ids)?;
        self.client.parse_unit(self.send(request)?)
    }

    pub fn load_evaluations_scenarios(
        &self,
        evaluation_id: &str,
        evaluation: &Evaluation,
    ) -> ApiResult<Vec<EvaluationScenario>> {
        let response = self.send(self.client.build_list_evaluation_scenarios(evaluation_id))?;
        self.client.parse_evaluation_scenarios(response, evaluation)
    }

    pub fn update_evaluation_scenario(
        &self,
        evaluation_id: &str,
        scenario_id: &str,
        data: &Value,
        evaluation_type: EvaluationType,
    ) -> ApiResult<Value> {
        let request = self.client.build_update_evaluation_scenario(
            evaluation_id,
            scenario_id,
            evaluation_type,
            data,
        )?;
        self.client.parse_json(self.send(request)?)
    }

    pub fn post_evaluation_scenario(&self, evaluation_id: &str, data: &Value) -> ApiResult<Value> {
        let request = self.client.build_create_evaluation_scenario(evaluation_id, data)?;
        self.client.parse_json(self.send(request)?)
    }

    pub fn fetch_evaluation_results(&self, evaluation_id: &str) -> ApiResult<Value> {
        let response = self.send(self.client.build_evaluation_results(evaluation_id))?;
        self.client.parse_json(response)
    }

    // -----------------------------------------------------------------------
    // Apps and templates
    // -----------------------------------------------------------------------

    /// Cached app listing under the cache's default options.
    pub fn fetch_apps<P: RevalidationPolicy>(&self, cache: &mut QueryCache<P>) -> QueryState<Vec<App>> {
        let request = self.client.build_list_apps();
        let key = request.url.clone();
        cache
            .query(&key, QueryOptions::default(), || {
                self.client.parse_json(self.send(request)?)
            })
            .into_typed()
    }

    pub fn get_templates(&self) -> ApiResult<Vec<Template>> {
        let response = self.send(self.client.build_list_templates())?;
        self.client.parse_list_templates(response)
    }

    pub fn pull_template_image(&self, image_name: &str) -> ApiResult<TemplateImagePull> {
        let response = self.send(self.client.build_pull_template_image(image_name))?;
        self.client.parse_pull_template_image(response)
    }

    pub fn start_template(&self, template: &AppTemplate) -> ApiResult<Value> {
        let request = self.client.build_start_template(template)?;
        self.client.parse_json(self.send(request)?)
    }

    /// Window regained focus: refetch cached queries that allow it.
    pub fn window_focused<P: RevalidationPolicy>(&self, cache: &mut QueryCache<P>) -> Vec<String> {
        cache.revalidate_on_focus(|url| self.get_json(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::types::ParamType;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Records requests and replays canned responses in order.
    #[derive(Default)]
    struct ScriptedTransport {
        requests: RefCell<Vec<HttpRequest>>,
        responses: RefCell<VecDeque<HttpResponse>>,
    }

    impl ScriptedTransport {
        fn reply(self, status: u16, body: &str) -> Self {
            self.responses.borrow_mut().push_back(HttpResponse {
                status,
                headers: Vec::new(),
                body: body.to_string(),
            });
            self
        }
    }

    impl Transport for ScriptedTransport {
        fn execute(&self, request: HttpRequest) -> ApiResult<HttpResponse> {
            self.requests.borrow_mut().push(request);
            self.responses
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| ApiError::Transport("connection refused".to_string()))
        }
    }

    fn api(transport: ScriptedTransport) -> AgentaApi<ScriptedTransport> {
        AgentaApi::new(AgentaClient::new("http://localhost:8000").unwrap(), transport)
    }

    #[test]
    fn call_variant_posts_shaped_body() {
        let api = api(ScriptedTransport::default().reply(200, r#""Paris""#));
        let inputs: BTreeMap<String, String> = [("a", "1"), ("b", "2")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let definitions = vec![
            Parameter::input("a"),
            Parameter::optional("b", ParamType::String, None),
        ];
        let optional = vec![Parameter::optional("c", ParamType::String, Some(json!("x")))];

        let output = api
            .call_variant(&inputs, &definitions, &optional, "qa/v1")
            .unwrap();
        assert_eq!(output, json!("Paris"));

        let requests = api.transport.requests.borrow();
        assert_eq!(requests[0].url, "http://localhost:8000/qa/v1/generate");
        let body: Value = serde_json::from_str(requests[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"inputs": {"b": "2"}, "a": "1", "c": "x"}));
    }

    #[test]
    fn transport_failure_propagates() {
        let api = api(ScriptedTransport::default());
        let err = api.fetch_variants("qa").unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[test]
    fn delete_evaluations_resolves_to_unit() {
        let api = api(ScriptedTransport::default().reply(200, r#"["e1"]"#));
        api.delete_evaluations(&["e1".to_string()]).unwrap();
        let requests = api.transport.requests.borrow();
        assert_eq!(requests[0].method, HttpMethod::Delete);
    }

    #[test]
    fn load_testsets_list_exposes_loading_state() {
        let api = api(
            ScriptedTransport::default()
                .reply(200, r#"[{"_id":"t1","name":"capitals","created_at":"2023-07-04"}]"#)
                .reply(503, "unavailable"),
        );
        let mut cache = QueryCache::new();

        let list = api.load_testsets_list(&mut cache, "qa");
        assert!(!list.is_loading);
        assert_eq!(list.testsets.as_ref().unwrap()[0].id, "t1");

        // Second access revalidates; the failure keeps the listing.
        let list = api.load_testsets_list(&mut cache, "qa");
        assert_eq!(list.testsets.as_ref().unwrap().len(), 1);
        assert!(list.error.as_deref().unwrap().contains("503"));
    }

    #[test]
    fn window_focus_refetches_apps_but_not_testsets() {
        let api = api(
            ScriptedTransport::default()
                .reply(200, r#"[{"app_name":"qa"}]"#)
                .reply(200, "[]")
                .reply(200, r#"[{"app_name":"qa"},{"app_name":"chat"}]"#),
        );
        let mut cache = QueryCache::new();
        let apps = api.fetch_apps(&mut cache);
        assert_eq!(apps.data.unwrap().len(), 1);
        api.load_testsets_list(&mut cache, "qa");

        let refreshed = api.window_focused(&mut cache);
        assert_eq!(refreshed, ["http://localhost:8000/api/app_variant/list_apps/"]);
        let key = api.client().build_list_apps().url;
        let apps = cache.peek(&key).into_typed::<Vec<App>>();
        assert_eq!(apps.data.unwrap().len(), 2);
    }
}
