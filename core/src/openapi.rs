//! Extraction of variant parameters from a variant's `openapi.json`.
//!
//! Only the request body of `POST /generate` matters. Properties tagged with
//! `x-parameter` are configuration parameters; untagged properties are the
//! per-call inputs.

use serde_json::Value;

use crate::error::{ApiError, ApiResult};
use crate::types::{ParamType, Parameter};

/// Parse the generate body schema into parameters ordered by name.
///
/// Returns an empty list when the document has no `/generate` request body.
pub fn parse_openapi_schema(schema: &Value) -> ApiResult<Vec<Parameter>> {
    let Some(request_body) = schema.pointer("/paths/~1generate/post/requestBody") else {
        return Ok(Vec::new());
    };

    let reference = request_body
        .pointer("/content/application~1json/schema/$ref")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ApiError::DeserializationError("generate request body has no schema $ref".to_string())
        })?;
    let body_name = reference.rsplit('/').next().unwrap_or(reference);

    let body_schema = schema
        .get("components")
        .and_then(|c| c.get("schemas"))
        .and_then(|s| s.get(body_name))
        .ok_or_else(|| {
            ApiError::DeserializationError(format!("schema {body_name:?} is not defined"))
        })?;

    let required: Vec<&str> = body_schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let Some(properties) = body_schema.get("properties").and_then(Value::as_object) else {
        return Ok(Vec::new());
    };

    Ok(properties
        .iter()
        .map(|(name, property)| {
            let x_parameter = property.get("x-parameter").and_then(Value::as_str);
            Parameter {
                name: name.clone(),
                param_type: x_parameter.map(param_type).unwrap_or(ParamType::String),
                input: x_parameter.is_none(),
                required: required.contains(&name.as_str()),
                default: property.get("default").filter(|v| !v.is_null()).cloned(),
                choices: property
                    .get("enum")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default(),
                minimum: property.get("minimum").and_then(Value::as_f64).unwrap_or(0.0),
                maximum: property.get("maximum").and_then(Value::as_f64).unwrap_or(1.0),
            }
        })
        .collect())
}

fn param_type(x_parameter: &str) -> ParamType {
    match x_parameter {
        "choice" => ParamType::Array,
        "float" => ParamType::Number,
        "int" => ParamType::Integer,
        "bool" => ParamType::Boolean,
        "dict" => ParamType::Object,
        _ => ParamType::String,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(properties: Value, required: Value) -> Value {
        json!({
            "openapi": "3.0.2",
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
                        "required": required
                    }
                }
            }
        })
    }

    #[test]
    fn tagged_properties_are_configuration() {
        let doc = document(
            json!({
                "country": {"title": "Country", "type": "string"},
                "temperature": {"x-parameter": "float", "default": 0.5, "minimum": 0.0, "maximum": 2.0},
                "model": {"x-parameter": "choice", "default": "gpt-3.5-turbo", "enum": ["gpt-3.5-turbo", "gpt-4"]},
                "inputs": {"x-parameter": "dict", "default": ["country"]}
            }),
            json!(["country"]),
        );

        let params = parse_openapi_schema(&doc).unwrap();
        let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["country", "inputs", "model", "temperature"]);

        let country = &params[0];
        assert!(country.input);
        assert!(country.required);
        assert_eq!(country.param_type, ParamType::String);

        let inputs = &params[1];
        assert!(!inputs.input);
        assert_eq!(inputs.param_type, ParamType::Object);

        let model = &params[2];
        assert_eq!(model.param_type, ParamType::Array);
        assert_eq!(model.choices.len(), 2);

        let temperature = &params[3];
        assert_eq!(temperature.param_type, ParamType::Number);
        assert_eq!(temperature.default, Some(json!(0.5)));
        assert_eq!(temperature.maximum, 2.0);
        assert!(!temperature.required);
    }

    #[test]
    fn missing_generate_route_yields_no_parameters() {
        let params = parse_openapi_schema(&json!({"paths": {}})).unwrap();
        assert!(params.is_empty());
    }

    #[test]
    fn dangling_ref_is_an_error() {
        let mut doc = document(json!({}), json!([]));
        doc["components"]["schemas"] = json!({});
        let err = parse_openapi_schema(&doc).unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }
}
