//! Coarse response checks against the documented response shape
//!
//! Only the top-level `type` of the documented schema is compared with the
//! body. Full JSON Schema validation is out of scope; every result carries
//! [`FULL_VALIDATION_NOTE`] so callers do not mistake a pass for a deep check.

use crate::document::ApiDescription;
use crate::error::{DocError, DocResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Advisory appended to every checked response
pub const FULL_VALIDATION_NOTE: &str =
    "Note: Full schema validation was not performed; only the top-level type was checked";

/// Outcome of `validate_response`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// False when the body contradicts the documented top-level type, or no
    /// response is documented for the status
    pub valid: bool,
    pub errors: Vec<String>,
    pub schema: Option<Value>,
    pub expected_status_codes: Vec<String>,
    pub actual_status_code: u16,
    pub response_spec: Option<Value>,
}

impl ApiDescription {
    /// Check `body` against the response documented for `status_code`
    /// (falling back to `default`)
    pub fn validate_response(
        &self,
        path: &str,
        method: &str,
        status_code: u16,
        body: &Value,
    ) -> DocResult<ValidationResult> {
        let (_, operation) = self
            .operation(path, method)
            .ok_or_else(|| DocError::endpoint_not_found(path, method))?;

        let expected_status_codes: Vec<String> = operation.responses.keys().cloned().collect();

        let Some(raw_spec) = operation
            .responses
            .get(&status_code.to_string())
            .or_else(|| operation.responses.get("default"))
        else {
            return Ok(ValidationResult {
                valid: false,
                errors: vec![format!(
                    "No schema defined for status code {} in Swagger documentation",
                    status_code
                )],
                schema: None,
                expected_status_codes,
                actual_status_code: status_code,
                response_spec: None,
            });
        };

        let detail = self.response_detail(raw_spec);
        let mut errors: Vec<String> = detail
            .schema
            .as_ref()
            .and_then(|schema| type_mismatch(schema, body))
            .into_iter()
            .collect();
        let valid = errors.is_empty();
        errors.push(FULL_VALIDATION_NOTE.to_string());

        Ok(ValidationResult {
            valid,
            errors,
            schema: detail.schema,
            expected_status_codes,
            actual_status_code: status_code,
            response_spec: Some(self.resolver().resolve(raw_spec)),
        })
    }
}

fn type_mismatch(schema: &Value, body: &Value) -> Option<String> {
    match schema.get("type").and_then(Value::as_str) {
        Some("object") if !body.is_object() => Some(format!(
            "Expected response to be an object, but got {}",
            json_kind(body)
        )),
        Some("array") if !body.is_array() => Some(format!(
            "Expected response to be an array, but got {}",
            json_kind(body)
        )),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
