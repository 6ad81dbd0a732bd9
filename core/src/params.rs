//! Shaping of variant parameters into request bodies.
//!
//! The generate endpoint takes per-call inputs at the top level of the body,
//! configuration inputs nested under `inputs`, and the variant's optional
//! parameters (prompt, model, temperature, ...) spread at the top level next
//! to them.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::error::{ApiError, ApiResult};
use crate::types::{JsonObject, ParamType, Parameter, VariantParameters};

/// Key under which non-input parameter values are nested.
pub const INPUTS_KEY: &str = "inputs";

/// Body of `POST {path}/generate`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateBody {
    pub inputs: JsonObject,
    #[serde(flatten)]
    pub fields: JsonObject,
    #[serde(skip)]
    collisions: Vec<String>,
}

impl GenerateBody {
    /// Input names that were overwritten by an optional parameter default.
    pub fn collisions(&self) -> &[String] {
        &self.collisions
    }
}

/// Build the generate body from user inputs and the variant's parameters.
///
/// An input whose definition is found and marked non-input is nested under
/// `inputs`; every other input (including ones with no definition) goes to
/// the top level. Optional parameters with a truthy default and a non-object
/// type are then written over the top level.
pub fn build_generate_body(
    input_values: &BTreeMap<String, String>,
    input_definitions: &[Parameter],
    optional_parameters: &[Parameter],
) -> ApiResult<GenerateBody> {
    let mut secondary = JsonObject::new();
    let mut main = JsonObject::new();

    for (key, value) in input_values {
        let definition = input_definitions.iter().find(|param| param.name == *key);
        match definition {
            Some(param) if !param.input => {
                secondary.insert(key.clone(), Value::String(value.clone()));
            }
            _ => {
                main.insert(key.clone(), Value::String(value.clone()));
            }
        }
    }

    let mut collisions = Vec::new();
    for (name, default) in optional_defaults(optional_parameters) {
        if main.insert(name.clone(), default).is_some() {
            warn!(param = %name, "optional parameter default overrides input of the same name");
            collisions.push(name);
        }
    }

    if main.contains_key(INPUTS_KEY) {
        return Err(ApiError::ReservedKey(INPUTS_KEY.to_string()));
    }

    Ok(GenerateBody {
        inputs: secondary,
        fields: main,
        collisions,
    })
}

/// Name → default of every optional parameter that contributes to a
/// generate body.
pub fn optional_defaults(optional_parameters: &[Parameter]) -> JsonObject {
    optional_parameters
        .iter()
        .filter(|param| param.param_type != ParamType::Object)
        .filter_map(|param| match &param.default {
            Some(default) if is_truthy(default) => Some((param.name.clone(), default.clone())),
            _ => None,
        })
        .collect()
}

/// Rewrite `object` defaults from a list of names into `[{name}, ...]`.
///
/// A missing or falsy default becomes an empty list; a scalar default is
/// treated as a single name.
pub fn normalize_object_defaults(params: Vec<Parameter>) -> Vec<Parameter> {
    params
        .into_iter()
        .map(|mut param| {
            if param.param_type == ParamType::Object {
                let names = match param.default.take() {
                    Some(Value::Array(items)) => items,
                    Some(value) if is_truthy(&value) => vec![value],
                    _ => Vec::new(),
                };
                let records = names.into_iter().map(|name| json!({ "name": name })).collect();
                param.default = Some(Value::Array(records));
            }
            param
        })
        .collect()
}

/// Partition parameters by their `input` flag, keeping order.
pub fn split_parameters(params: Vec<Parameter>) -> VariantParameters {
    let (input_params, init_opt_params): (Vec<_>, Vec<_>) =
        params.into_iter().partition(|param| param.input);
    VariantParameters {
        init_opt_params,
        input_params,
    }
}

/// Reduce a parameter list to name → current default. Parameters without a
/// default are left out.
pub fn parameters_to_map(params: &[Parameter]) -> JsonObject {
    params
        .iter()
        .filter_map(|param| Some((param.name.clone(), param.default.clone()?)))
        .collect()
}

/// Whether a default counts as "set" for the generate body.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
