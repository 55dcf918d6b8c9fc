//! Endpoint listing and per-operation detail

use crate::document::{read_operation, ApiDescription};
use crate::error::{DocError, DocResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_MEDIA_TYPE: &str = "application/json";

/// One row of `list_endpoints`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSummary {
    pub path: String,
    /// Uppercase HTTP method
    pub method: String,
    pub summary: String,
    pub operation_id: String,
    pub tags: Vec<String>,
}

/// Normalized response entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseDetail {
    pub description: String,
    pub schema: Option<Value>,
    pub examples: Option<Value>,
}

/// Everything the agent needs to call one operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDetail {
    pub summary: String,
    pub description: String,
    pub operation_id: String,
    pub parameters: Vec<Value>,
    pub request_body: Option<Value>,
    pub responses: IndexMap<String, ResponseDetail>,
    pub consumes: Vec<String>,
    pub produces: Vec<String>,
}

impl ApiDescription {
    /// Flatten every path x method into a list, in document order
    pub fn list_endpoints(&self) -> Vec<EndpointSummary> {
        self.operations()
            .map(|(path, method, value)| {
                let operation = read_operation(path, method, value);
                EndpointSummary {
                    path: path.to_string(),
                    method: method.as_str().to_string(),
                    summary: operation.summary.unwrap_or_default(),
                    operation_id: operation.operation_id.unwrap_or_default(),
                    tags: operation.tags,
                }
            })
            .collect()
    }

    /// Detail for one operation
    pub fn endpoint_details(&self, path: &str, method: &str) -> DocResult<OperationDetail> {
        let (_, operation) = self
            .operation(path, method)
            .ok_or_else(|| DocError::endpoint_not_found(path, method))?;

        let parameters = self.merged_parameters(path, &operation.parameters);

        let responses = operation
            .responses
            .iter()
            .map(|(status, response)| (status.clone(), self.response_detail(response)))
            .collect();

        let consumes = operation
            .consumes
            .or_else(|| self.default_consumes().map(|defaults| defaults.to_vec()))
            .unwrap_or_else(|| vec![DEFAULT_MEDIA_TYPE.to_string()]);
        let produces = operation
            .produces
            .or_else(|| self.default_produces().map(|defaults| defaults.to_vec()))
            .unwrap_or_else(|| vec![DEFAULT_MEDIA_TYPE.to_string()]);

        Ok(OperationDetail {
            summary: operation.summary.unwrap_or_default(),
            description: operation.description.unwrap_or_default(),
            operation_id: operation.operation_id.unwrap_or_default(),
            parameters,
            request_body: operation.request_body,
            responses,
            consumes,
            produces,
        })
    }

    /// Normalize a response object from either document flavor
    pub(crate) fn response_detail(&self, response: &Value) -> ResponseDetail {
        let resolver = self.resolver();
        let response = resolver.resolve(response);
        let media = json_media(&response);

        let schema = response
            .get("schema")
            .or_else(|| media.and_then(|m| m.get("schema")))
            .filter(|s| !s.is_null())
            .map(|s| resolver.resolve(s));

        let examples = response
            .get("examples")
            .or_else(|| media.and_then(|m| m.get("examples").or_else(|| m.get("example"))))
            .filter(|e| !e.is_null())
            .cloned();

        ResponseDetail {
            description: response
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            schema,
            examples,
        }
    }

    /// Path-item parameters overlaid by operation parameters with the same name and location
    fn merged_parameters(&self, path: &str, operation_params: &[Value]) -> Vec<Value> {
        let resolver = self.resolver();
        let mut parameters: Vec<Value> = self
            .path_parameters(path)
            .iter()
            .map(|p| resolver.resolve(p))
            .collect();

        for param in operation_params {
            let param = resolver.resolve(param);
            parameters.retain(|existing| !same_parameter(existing, &param));
            parameters.push(param);
        }

        parameters
    }
}

fn same_parameter(a: &Value, b: &Value) -> bool {
    let key = |p: &Value| (p.get("name").cloned(), p.get("in").cloned());
    let (name, location) = key(a);
    name.is_some() && (name, location) == key(b)
}

/// First JSON media type under an OpenAPI 3 `content` map, else the first one
fn json_media(response: &Value) -> Option<&Value> {
    let content = response.get("content")?.as_object()?;
    content
        .iter()
        .find(|(content_type, _)| content_type.contains("json"))
        .or_else(|| content.iter().next())
        .map(|(_, media)| media)
}
