//! Execute MCP tools against the shared API session

use api_client::{ApiRequest, ApiSession, ClientError};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::definitions::*;
use crate::error::ToolError;
use crate::protocol::ToolCallResult;

/// Executor for the five API tools
pub struct ToolExecutor {
    session: Arc<ApiSession>,
}

impl ToolExecutor {
    pub fn new(session: Arc<ApiSession>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<ApiSession> {
        &self.session
    }

    /// Execute a tool by name
    pub async fn execute(
        &self,
        tool_name: &str,
        arguments: Option<Value>,
    ) -> Result<ToolCallResult, ToolError> {
        let args = match arguments {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(ToolError::InvalidArguments(
                    "Arguments must be an object".to_string(),
                ))
            }
        };

        info!("Handling tool call: {}", tool_name);

        match tool_name {
            FETCH_SWAGGER_INFO => self.fetch_swagger_info(&args).await,
            LIST_ENDPOINTS => self.list_endpoints().await,
            GET_ENDPOINT_DETAILS => self.get_endpoint_details(&args).await,
            EXECUTE_API_REQUEST => self.execute_api_request(&args).await,
            VALIDATE_API_RESPONSE => self.validate_api_response(&args).await,
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    async fn fetch_swagger_info(&self, args: &Map<String, Value>) -> Result<ToolCallResult, ToolError> {
        let info = self
            .session
            .fetch_info(string_arg(args, "url"))
            .await
            .map_err(ToolError::failed("fetch Swagger info"))?;
        json_result(&info)
    }

    async fn list_endpoints(&self) -> Result<ToolCallResult, ToolError> {
        let endpoints = self
            .session
            .list_endpoints()
            .await
            .map_err(ToolError::failed("list endpoints"))?;
        json_result(&endpoints)
    }

    async fn get_endpoint_details(
        &self,
        args: &Map<String, Value>,
    ) -> Result<ToolCallResult, ToolError> {
        let (Some(path), Some(method)) = (string_arg(args, "path"), string_arg(args, "method")) else {
            return Err(ToolError::InvalidArguments(
                "Both path and method are required".to_string(),
            ));
        };

        let details = self
            .session
            .endpoint_details(path, method)
            .await
            .map_err(ToolError::failed("get endpoint details"))?;
        json_result(&details)
    }

    async fn execute_api_request(
        &self,
        args: &Map<String, Value>,
    ) -> Result<ToolCallResult, ToolError> {
        let (Some(method), Some(path)) = (string_arg(args, "method"), string_arg(args, "path")) else {
            return Err(ToolError::InvalidArguments(
                "Method and path are required".to_string(),
            ));
        };

        let mut request = ApiRequest::new(method, path);
        if let Some(params) = object_arg(args, "params")? {
            request = request.with_params(params);
        }
        if let Some(headers) = object_arg(args, "headers")? {
            request = request.with_headers(headers);
        }
        if let Some(body) = args.get("body").filter(|body| !body.is_null()) {
            request = request.with_body(body.clone());
        }

        let response = self
            .session
            .execute(&request)
            .await
            .map_err(ToolError::failed("execute API request"))?;
        json_result(&response)
    }

    async fn validate_api_response(
        &self,
        args: &Map<String, Value>,
    ) -> Result<ToolCallResult, ToolError> {
        let path = string_arg(args, "path");
        let method = string_arg(args, "method");
        let status_code = args.get("statusCode").filter(|code| !code.is_null());
        let response_body = args.get("responseBody");

        let missing: Vec<String> = [
            ("path", path.is_none()),
            ("method", method.is_none()),
            ("statusCode", status_code.is_none()),
            ("responseBody", response_body.is_none()),
        ]
        .into_iter()
        .filter(|(_, absent)| *absent)
        .map(|(name, _)| name.to_string())
        .collect();

        let (Some(path), Some(method), Some(status_code), Some(response_body)) =
            (path, method, status_code, response_body)
        else {
            let err = ClientError::ValidationMissingArg(missing);
            error!("{}", err);
            return Err(err.into());
        };

        let status_code = status_code
            .as_u64()
            .and_then(|code| u16::try_from(code).ok())
            .ok_or_else(|| {
                ToolError::InvalidArguments(format!("statusCode must be an HTTP status code, got {}", status_code))
            })?;

        info!(
            "Validating response for {} {} with status {}",
            method.to_uppercase(),
            path,
            status_code
        );

        let body = match response_body {
            Value::String(text) => match serde_json::from_str(text) {
                Ok(parsed) => {
                    debug!("Parsed response body string as JSON");
                    parsed
                }
                Err(e) => {
                    warn!("Response body is a string but not valid JSON: {}", e);
                    response_body.clone()
                }
            },
            other => other.clone(),
        };

        let result = self
            .session
            .validate(path, method, status_code, &body)
            .await
            .map_err(ToolError::failed("validate API response"))?;

        if result.valid {
            info!("Response validation passed");
        } else {
            warn!("Response validation found {} issues", result.errors.len());
            for issue in &result.errors {
                debug!("Validation issue: {}", issue);
            }
        }

        json_result(&result)
    }
}

/// Non-empty string argument
fn string_arg<'a>(args: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

/// Optional object argument; null counts as absent
fn object_arg<'a>(
    args: &'a Map<String, Value>,
    name: &str,
) -> Result<Option<&'a Map<String, Value>>, ToolError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(ToolError::InvalidArguments(format!(
            "{} must be an object",
            name
        ))),
    }
}

fn json_result<T: Serialize>(value: &T) -> Result<ToolCallResult, ToolError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| ToolError::InvalidArguments(format!("Failed to serialize result: {}", e)))?;
    Ok(ToolCallResult::text(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use api_client::ApiConfig;
    use mockito::{Matcher, Server};
    use serde_json::json;

    const DOC: &str = r#"{
        "openapi": "3.0.1",
        "info": {"title": "Pets", "version": "1.0"},
        "paths": {
            "/pets": {"get": {
                "summary": "List pets",
                "responses": {"200": {"description": "ok", "content": {"application/json": {"schema": {"type": "array"}}}}}
            }}
        }
    }"#;

    fn executor(base_url: String) -> ToolExecutor {
        let session = ApiSession::new(ApiConfig::new(base_url)).unwrap();
        ToolExecutor::new(Arc::new(session))
    }

    fn parse(result: &ToolCallResult) -> Value {
        assert!(!result.is_error);
        serde_json::from_str(result.first_text().unwrap()).unwrap()
    }

    async fn loaded(server: &mut Server) -> (ToolExecutor, mockito::Mock) {
        let mock = server
            .mock("GET", "/openapi.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(DOC)
            .create_async()
            .await;
        let executor = executor(server.url());
        let info = executor
            .execute(FETCH_SWAGGER_INFO, Some(json!({"url": "/openapi.json"})))
            .await
            .unwrap();
        assert_eq!(parse(&info)["title"], "Pets");
        (executor, mock)
    }

    #[tokio::test]
    async fn test_unknown_tool_and_bad_arguments() {
        let executor = executor("http://localhost:1".into());

        let err = executor.execute("delete_everything", None).await.unwrap_err();
        assert_eq!(err.to_string(), "Unknown tool: delete_everything");

        let err = executor
            .execute(LIST_ENDPOINTS, Some(json!([1, 2])))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_list_before_fetch_fails() {
        let executor = executor("http://localhost:1".into());
        let err = executor.execute(LIST_ENDPOINTS, None).await.unwrap_err();
        assert!(err.to_string().starts_with("Failed to list endpoints: Swagger documentation not loaded"));
    }

    #[tokio::test]
    async fn test_required_arguments_checked_before_network() {
        let executor = executor("http://localhost:1".into());

        let err = executor
            .execute(GET_ENDPOINT_DETAILS, Some(json!({"path": "/pets"})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Both path and method are required");

        let err = executor
            .execute(EXECUTE_API_REQUEST, Some(json!({"method": "GET", "path": ""})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Method and path are required");

        let err = executor
            .execute(VALIDATE_API_RESPONSE, Some(json!({"path": "/pets", "statusCode": null})))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required parameters for API response validation: method, statusCode, responseBody"
        );
    }

    #[tokio::test]
    async fn test_catalog_tools() {
        let mut server = Server::new_async().await;
        let (executor, _doc) = loaded(&mut server).await;

        let endpoints = parse(&executor.execute(LIST_ENDPOINTS, None).await.unwrap());
        assert_eq!(endpoints[0]["method"], "GET");
        assert_eq!(endpoints[0]["summary"], "List pets");

        let details = executor
            .execute(GET_ENDPOINT_DETAILS, Some(json!({"path": "/pets", "method": "get"})))
            .await
            .unwrap();
        assert_eq!(parse(&details)["summary"], "List pets");

        let err = executor
            .execute(GET_ENDPOINT_DETAILS, Some(json!({"path": "/cats", "method": "get"})))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Failed to get endpoint details:"));
    }

    #[tokio::test]
    async fn test_execute_api_request() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/pets")
            .match_query(Matcher::UrlEncoded("dry_run".into(), "true".into()))
            .match_header("x-trace", "abc")
            .match_body(Matcher::Json(json!({"name": "Rex"})))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": 7}"#)
            .expect(1)
            .create_async()
            .await;

        let executor = executor(server.url());
        let result = executor
            .execute(
                EXECUTE_API_REQUEST,
                Some(json!({
                    "method": "post",
                    "path": "/pets",
                    "params": {"dry_run": true},
                    "headers": {"X-Trace": "abc"},
                    "body": {"name": "Rex"}
                })),
            )
            .await
            .unwrap();

        let response = parse(&result);
        assert_eq!(response["status"], 201);
        assert_eq!(response["body"]["id"], 7);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_validate_parses_string_body() {
        let mut server = Server::new_async().await;
        let (executor, _doc) = loaded(&mut server).await;

        let result = executor
            .execute(
                VALIDATE_API_RESPONSE,
                Some(json!({
                    "path": "/pets",
                    "method": "GET",
                    "statusCode": 200,
                    "responseBody": "[{\"id\": 1}]"
                })),
            )
            .await
            .unwrap();
        assert_eq!(parse(&result)["valid"], true);

        // unparseable strings are validated as-is
        let result = executor
            .execute(
                VALIDATE_API_RESPONSE,
                Some(json!({
                    "path": "/pets",
                    "method": "GET",
                    "statusCode": 200,
                    "responseBody": "not json"
                })),
            )
            .await
            .unwrap();
        let result = parse(&result);
        assert_eq!(result["valid"], false);
        assert!(result["errors"][0].as_str().unwrap().contains("array"));
    }

    #[tokio::test]
    async fn test_validate_rejects_out_of_range_status() {
        let executor = executor("http://localhost:1".into());
        let err = executor
            .execute(
                VALIDATE_API_RESPONSE,
                Some(json!({"path": "/pets", "method": "GET", "statusCode": 70000, "responseBody": {}})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
