//! Domain DTOs for the Agenta API.
//!
//! Raw records (`*Record`, `*Response`) mirror the backend's snake_case JSON.
//! View models (`Variant`, `Evaluation`, `EvaluationScenario`) use camelCase
//! because they are handed to UI code as-is. Request payloads are one struct
//! per endpoint; the mock-server crate defines its own copies so integration
//! tests catch schema drift.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type JsonObject = Map<String, Value>;

// ---------------------------------------------------------------------------
// Variants and parameters
// ---------------------------------------------------------------------------

/// A variant as consumed by UI code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub variant_name: String,
    /// Variant whose OpenAPI schema describes this one's parameters.
    pub template_variant_name: Option<String>,
    pub persistent: bool,
    pub parameters: Option<JsonObject>,
    pub previous_variant_name: Option<String>,
}

impl Variant {
    /// A variant known only by name, as listed inside an evaluation.
    pub fn named(variant_name: impl Into<String>) -> Self {
        Self {
            variant_name: variant_name.into(),
            template_variant_name: None,
            persistent: true,
            parameters: None,
            previous_variant_name: None,
        }
    }

    /// Name of the variant whose `openapi.json` to read.
    pub fn source_name(&self) -> &str {
        self.template_variant_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.variant_name)
    }
}

/// A variant as returned by `list_variants`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantRecord {
    pub variant_name: String,
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub previous_variant_name: Option<String>,
    #[serde(default)]
    pub parameters: Option<JsonObject>,
}

impl From<VariantRecord> for Variant {
    fn from(record: VariantRecord) -> Self {
        let template = record.previous_variant_name;
        let previous = template.clone().filter(|name| !name.is_empty());
        Self {
            variant_name: record.variant_name,
            template_variant_name: template,
            persistent: true,
            parameters: record.parameters,
            previous_variant_name: previous,
        }
    }
}

/// Declared type of a variant parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
    Array,
    /// A list-valued input (dict of named inputs).
    Object,
}

/// One parameter of a variant's generate endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type", default)]
    pub param_type: ParamType,
    /// `true` for per-call inputs, `false` for configuration with a default.
    #[serde(default)]
    pub input: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "enum", default)]
    pub choices: Vec<Value>,
    #[serde(default)]
    pub minimum: f64,
    #[serde(default = "default_maximum")]
    pub maximum: f64,
}

fn default_maximum() -> f64 {
    1.0
}

impl Parameter {
    pub fn input(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: ParamType::String,
            input: true,
            required: true,
            default: None,
            choices: Vec::new(),
            minimum: 0.0,
            maximum: default_maximum(),
        }
    }

    pub fn optional(name: impl Into<String>, param_type: ParamType, default: Option<Value>) -> Self {
        Self {
            name: name.into(),
            param_type,
            input: false,
            required: false,
            default,
            choices: Vec::new(),
            minimum: 0.0,
            maximum: default_maximum(),
        }
    }
}

/// Parameters of a variant split by their `input` flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariantParameters {
    /// Configuration parameters; these carry the defaults.
    pub init_opt_params: Vec<Parameter>,
    /// Per-call inputs; these have no values yet.
    pub input_params: Vec<Parameter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppVariantRef {
    pub app_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_name: Option<String>,
}

/// Body of `POST /api/app_variant/add/from_previous/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddVariantFromPrevious {
    pub previous_app_variant: AppVariantRef,
    pub new_variant_name: String,
    pub parameters: JsonObject,
}

/// Body of `PUT /api/app_variant/update_variant_parameters/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateVariantParameters {
    pub app_name: String,
    pub variant_name: String,
    pub parameters: JsonObject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveApp {
    pub app_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveVariant {
    pub app_name: String,
    pub variant_name: String,
}

// ---------------------------------------------------------------------------
// Test sets
// ---------------------------------------------------------------------------

/// Body of testset create and update calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestsetPayload {
    pub name: String,
    pub csvdata: Vec<JsonObject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestsetSummary {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Testset {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub csvdata: Vec<JsonObject>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteTestsets {
    pub testset_ids: Vec<String>,
}

// ---------------------------------------------------------------------------
// Evaluations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationType {
    HumanABTesting,
    HumanScoring,
    AutoExactMatch,
    AutoSimilarityMatch,
    AutoRegexTest,
    AutoWebhookTest,
    AutoAiCritique,
    CustomCodeRun,
}

impl EvaluationType {
    pub fn as_str(self) -> &'static str {
        match self {
            EvaluationType::HumanABTesting => "human_a_b_testing",
            EvaluationType::HumanScoring => "human_scoring",
            EvaluationType::AutoExactMatch => "auto_exact_match",
            EvaluationType::AutoSimilarityMatch => "auto_similarity_match",
            EvaluationType::AutoRegexTest => "auto_regex_test",
            EvaluationType::AutoWebhookTest => "auto_webhook_test",
            EvaluationType::AutoAiCritique => "auto_ai_critique",
            EvaluationType::CustomCodeRun => "custom_code_run",
        }
    }
}

impl fmt::Display for EvaluationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationUser {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub username: String,
}

/// An evaluation as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResponse {
    pub id: String,
    #[serde(default)]
    pub user: EvaluationUser,
    #[serde(default)]
    pub variants: Vec<String>,
    pub evaluation_type: EvaluationType,
    #[serde(default)]
    pub evaluation_type_settings: Value,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub testset: Value,
    #[serde(default)]
    pub app_name: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub llm_app_prompt_template: Option<String>,
}

/// View model of an evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub id: String,
    pub created_at: String,
    pub user: EvaluationUser,
    pub variants: Vec<Variant>,
    pub evaluation_type: EvaluationType,
    pub evaluation_type_settings: Value,
    pub status: String,
    pub testset: Value,
    pub app_name: String,
    pub llm_app_prompt_template: Option<String>,
}

/// Body of `POST /api/evaluations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateEvaluation {
    pub app_name: String,
    pub variants: Vec<String>,
    pub evaluation_type: EvaluationType,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub evaluation_type_settings: Value,
    #[serde(default)]
    pub inputs: Vec<String>,
    pub testset_id: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteEvaluations {
    pub evaluations_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioInput {
    pub input_name: String,
    #[serde(default)]
    pub input_value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutput {
    pub variant_name: String,
    #[serde(default)]
    pub variant_output: Value,
}

/// A per-row scenario as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationScenarioResponse {
    pub id: String,
    #[serde(default)]
    pub evaluation_id: String,
    #[serde(default)]
    pub inputs: Vec<ScenarioInput>,
    #[serde(default)]
    pub outputs: Vec<ScenarioOutput>,
    #[serde(default)]
    pub vote: Option<String>,
    #[serde(default)]
    pub score: Option<Value>,
    #[serde(default)]
    pub correct_answer: Option<String>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub note: Option<String>,
}

/// View model of a scenario, carrying its parent evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationScenario {
    pub id: String,
    pub evaluation_id: String,
    pub inputs: Vec<ScenarioInput>,
    pub outputs: Vec<ScenarioOutput>,
    pub vote: Option<String>,
    pub score: Option<Value>,
    pub correct_answer: Option<String>,
    pub is_pinned: bool,
    pub note: Option<String>,
    pub evaluation: Evaluation,
}

// ---------------------------------------------------------------------------
// Apps and templates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub app_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateImage {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub digest: Option<String>,
    #[serde(default)]
    pub last_pushed: Option<String>,
    #[serde(default)]
    pub repo_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub image: TemplateImage,
}

/// Result of pulling a template's image on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateImagePull {
    pub image_id: String,
    pub image_tag: String,
}

/// A template image to instantiate into a new app variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppTemplate {
    pub app_name: String,
    pub image_id: String,
    pub image_tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_vars: Option<BTreeMap<String, String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn variant_record_with_empty_previous_name_maps_to_none() {
        let record: VariantRecord =
            serde_json::from_value(json!({"variant_name": "v1", "previous_variant_name": ""}))
                .unwrap();
        let variant = Variant::from(record);
        assert_eq!(variant.previous_variant_name, None);
        assert_eq!(variant.template_variant_name.as_deref(), Some(""));
        assert_eq!(variant.source_name(), "v1");
        assert!(variant.persistent);
    }

    #[test]
    fn source_name_prefers_template() {
        let mut variant = Variant::named("copy");
        assert_eq!(variant.source_name(), "copy");
        variant.template_variant_name = Some("base".to_string());
        assert_eq!(variant.source_name(), "base");
    }

    #[test]
    fn evaluation_type_serializes_as_wire_name() {
        for ty in [
            EvaluationType::HumanABTesting,
            EvaluationType::AutoAiCritique,
            EvaluationType::CustomCodeRun,
        ] {
            assert_eq!(serde_json::to_value(ty).unwrap(), json!(ty.as_str()));
        }
    }

    #[test]
    fn parameter_fills_defaults_when_fields_missing() {
        let param: Parameter = serde_json::from_value(json!({"name": "temperature"})).unwrap();
        assert_eq!(param.param_type, ParamType::String);
        assert!(!param.input);
        assert_eq!(param.maximum, 1.0);
        assert!(param.choices.is_empty());
    }
}
