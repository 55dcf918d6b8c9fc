//! Execute HTTP requests against the described API

use crate::classify::{find_auth_endpoint, is_authentication_endpoint, is_sign_up_endpoint};
use crate::config::ApiConfig;
use crate::error::{ClientError, Result};
use crate::redact::{masked_body, masked_headers};
use crate::token::TokenStore;
use api_docs::ApiDescription;
use indexmap::map::Entry;
use indexmap::IndexMap;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// A request as the agent describes it
#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    pub method: String,
    /// Path relative to the base URL; a full URL is reduced to its path and query
    pub path: String,
    /// Query parameters, in the order supplied
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
    pub headers: IndexMap<String, String>,
}

impl ApiRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Add query parameters from a JSON object
    pub fn with_params(mut self, params: &Map<String, Value>) -> Self {
        self.params
            .extend(params.iter().map(|(k, v)| (k.clone(), query_value(v))));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Add headers from a JSON object
    pub fn with_headers(mut self, headers: &Map<String, Value>) -> Self {
        self.headers
            .extend(headers.iter().map(|(k, v)| (k.clone(), query_value(v))));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Outcome of one executed request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: IndexMap<String, String>,
    /// Parsed JSON for JSON responses, otherwise the raw text
    pub body: Value,
    pub request_url: String,
    pub request_method: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Join `path` onto `base_url` and append `params`.
///
/// A full URL in `path` is reduced to its path and query; requests always go
/// to the configured base URL.
pub fn build_url(base_url: &str, path: &str, params: &[(String, String)]) -> Result<Url> {
    let mut path = path.to_string();
    if path.starts_with("http://") || path.starts_with("https://") {
        match Url::parse(&path) {
            Ok(full) => {
                path = match full.query() {
                    Some(query) => format!("{}?{}", full.path(), query),
                    None => full.path().to_string(),
                };
                warn!(
                    "Full URL detected in path, using only \"{}\" with the configured base URL",
                    path
                );
            }
            Err(_) => warn!("Invalid URL format in path: {}", path),
        }
    }

    let base = base_url.trim_end_matches('/');
    let joined = if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    };

    let mut url = Url::parse(&joined)
        .map_err(|e| ClientError::Request(format!("Invalid URL {}: {}", joined, e)))?;

    if !params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key, value);
        }
    }

    Ok(url)
}

/// Render a JSON value as a query-string or header value
fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(query_value).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

/// `application/json` or any `+json` media type
pub(crate) fn is_json_content_type(content_type: &str) -> bool {
    let media = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    media == "application/json" || media.ends_with("+json")
}

/// Headers and body actually put on the wire
#[derive(Debug, Default)]
struct Outgoing {
    headers: IndexMap<String, String>,
    body: Option<Value>,
}

impl Outgoing {
    /// Replace any header with the same name, ignoring case
    fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
        self.headers.insert(name.to_string(), value.into());
    }

    fn has_header(&self, name: &str) -> bool {
        self.headers.keys().any(|existing| existing.eq_ignore_ascii_case(name))
    }
}

/// Executes requests for one session
pub(crate) struct RequestExecutor<'a> {
    client: &'a Client,
    config: &'a ApiConfig,
    tokens: &'a TokenStore,
    /// Snapshot of the cached document, used to find a login endpoint
    document: Option<Arc<ApiDescription>>,
}

impl<'a> RequestExecutor<'a> {
    pub(crate) fn new(
        client: &'a Client,
        config: &'a ApiConfig,
        tokens: &'a TokenStore,
        document: Option<Arc<ApiDescription>>,
    ) -> Self {
        Self {
            client,
            config,
            tokens,
            document,
        }
    }

    /// Send `request`; a 401 outside an auth endpoint triggers at most one
    /// token refresh followed by one retry
    pub(crate) async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let method = parse_method(&request.method)?;
        let url = self.url_for(&request.path, &request.params)?;
        let is_auth = is_authentication_endpoint(&request.path);
        let mut outgoing = self.prepare(&method, request, is_auth).await;

        let (response, _) = self.send_once(&method, &url, &request.path, &outgoing).await?;
        if response.status != 401 || is_auth {
            return Ok(response);
        }

        warn!("Received 401 Unauthorized, attempting to refresh token");
        let Some(token) = self.refresh_token().await else {
            return Ok(response);
        };

        outgoing.set_header("Authorization", format!("Bearer {}", token));
        info!("Retrying request with new token");
        let (retry, _) = self.send_once(&method, &url, &request.path, &outgoing).await?;
        Ok(retry)
    }

    fn url_for(&self, path: &str, params: &[(String, String)]) -> Result<Url> {
        let base_url = self.config.base_url.as_deref().ok_or_else(|| {
            ClientError::Config("No base URL configured, cannot build request URL".to_string())
        })?;
        build_url(base_url, path, params)
    }

    async fn prepare(&self, method: &Method, request: &ApiRequest, is_auth: bool) -> Outgoing {
        let mut outgoing = Outgoing::default();
        outgoing.set_header("Accept", "application/json");
        for (name, value) in &request.headers {
            outgoing.set_header(name, value.clone());
        }

        let mut body = request.body.clone().filter(|body| !body.is_null());
        let credentials = &self.config.credentials;

        if is_auth {
            info!(path = %request.path, "Auth endpoint detected, not adding Authorization header");

            if body.is_none() && matches!(*method, Method::POST | Method::PUT) {
                if let Some(login) = credentials.login_body() {
                    if is_sign_up_endpoint(&request.path) {
                        warn!(
                            path = %request.path,
                            "Sign-up endpoint detected, skipping auto-injection of default credentials"
                        );
                    } else {
                        info!("Auto-injecting default credentials for authentication endpoint");
                        body = Some(login);
                    }
                }
            }
        } else if !outgoing.has_header("Authorization") {
            if let Some(token) = self.tokens.get().await {
                info!("Using stored API token for authorization");
                outgoing.set_header("Authorization", format!("Bearer {}", token));
            } else if let Some(key) = credentials.api_key() {
                info!("Using configured API key for authorization");
                outgoing.set_header("Authorization", format!("Bearer {}", key));
            }
        }

        if matches!(*method, Method::POST | Method::PUT | Method::PATCH) {
            if let Some(body) = body {
                outgoing.set_header("Content-Type", "application/json");
                outgoing.body = Some(body);
            }
        }

        outgoing
    }

    /// Log in through the documented auth endpoint and return a freshly
    /// captured token. Failures degrade to `None`.
    async fn refresh_token(&self) -> Option<String> {
        let Some(doc) = self.document.as_deref() else {
            warn!("Swagger documentation not loaded, cannot locate an auth endpoint");
            return None;
        };
        let Some(login_body) = self.config.credentials.login_body() else {
            warn!("No username/password configured, cannot refresh token");
            return None;
        };
        let Some(endpoint) = find_auth_endpoint(doc) else {
            warn!("Could not find suitable auth endpoint to refresh token");
            return None;
        };
        info!("Found auth endpoint: {} {}", endpoint.method, endpoint.path);

        let login = ApiRequest::new(endpoint.method.as_str(), endpoint.path).with_body(login_body);
        let method = parse_method(&login.method).ok()?;
        let url = match self.url_for(&login.path, &login.params) {
            Ok(url) => url,
            Err(e) => {
                warn!("Token refresh failed: {}", e);
                return None;
            }
        };
        let outgoing = self
            .prepare(&method, &login, is_authentication_endpoint(&login.path))
            .await;

        match self.send_once(&method, &url, &login.path, &outgoing).await {
            Ok((response, Some(token))) if response.is_success() => {
                info!("Successfully refreshed token");
                Some(token)
            }
            Ok((response, _)) => {
                warn!(status = response.status, "Token refresh did not yield a new token");
                None
            }
            Err(e) => {
                warn!("Token refresh failed: {}", e);
                None
            }
        }
    }

    /// One round trip; returns the response and any token it delivered
    async fn send_once(
        &self,
        method: &Method,
        url: &Url,
        path: &str,
        outgoing: &Outgoing,
    ) -> Result<(ApiResponse, Option<String>)> {
        info!(method = %method, url = %url, "API request");
        debug!("Request headers: {:?}", masked_headers(&outgoing.headers));

        let mut builder = self.client.request(method.clone(), url.clone());
        for (name, value) in &outgoing.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &outgoing.body {
            debug!("Request body: {}", masked_body(body));
            builder = builder.body(body.to_string());
        }

        let response = builder.send().await?;
        self.process_response(response, method, url, path).await
    }

    async fn process_response(
        &self,
        response: reqwest::Response,
        method: &Method,
        url: &Url,
        path: &str,
    ) -> Result<(ApiResponse, Option<String>)> {
        let status = response.status();
        let headers = collect_headers(response.headers());
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(is_json_content_type)
            .unwrap_or(false);

        let text = response.text().await?;
        let body = if !is_json {
            Value::String(text)
        } else if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| {
                ClientError::Request(format!("Invalid JSON in response from {}: {}", url, e))
            })?
        };

        let captured = if status.is_success() && is_json {
            self.tokens.capture(&body, path).await
        } else {
            None
        };

        debug!(status = status.as_u16(), "Response headers: {:?}", headers);
        if status.is_success() {
            info!(status = status.as_u16(), "API call successful");
        } else {
            warn!(status = status.as_u16(), "API call failed: {}", body);
        }

        let response = ApiResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
            request_url: url.to_string(),
            request_method: method.as_str().to_string(),
        };
        Ok((response, captured))
    }
}

fn parse_method(method: &str) -> Result<Method> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| ClientError::Request(format!("Invalid HTTP method: {}", method)))
}

/// Repeated headers are joined with ", "
fn collect_headers(headers: &HeaderMap) -> IndexMap<String, String> {
    let mut collected: IndexMap<String, String> = IndexMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        match collected.entry(name.as_str().to_string()) {
            Entry::Occupied(mut existing) => {
                let existing = existing.get_mut();
                existing.push_str(", ");
                existing.push_str(&value);
            }
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
        }
    }
    collected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use mockito::{Matcher, Server};
    use serde_json::json;

    struct Fixture {
        client: Client,
        config: ApiConfig,
        tokens: TokenStore,
        doc: Option<Arc<ApiDescription>>,
    }

    impl Fixture {
        fn new(base_url: &str, credentials: Credentials) -> Self {
            let doc = ApiDescription::from_value(
                json!({
                    "openapi": "3.0.0",
                    "paths": {
                        "/auth/login": {"post": {}},
                        "/auth/register": {"post": {}},
                        "/orders": {"get": {}}
                    }
                }),
                format!("{}/openapi.json", base_url),
            )
            .unwrap();

            Self {
                client: Client::new(),
                config: ApiConfig::new(base_url).with_credentials(credentials),
                tokens: TokenStore::new(),
                doc: Some(Arc::new(doc)),
            }
        }

        fn without_document(mut self) -> Self {
            self.doc = None;
            self
        }

        async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
            RequestExecutor::new(&self.client, &self.config, &self.tokens, self.doc.clone())
                .execute(&request)
                .await
        }
    }

    fn full_credentials() -> Credentials {
        Credentials::new(Some("key".into()), Some("u".into()), Some("p".into()))
    }

    #[test]
    fn test_build_url() {
        let url = build_url("http://api.local/v1/", "orders", &[]).unwrap();
        assert_eq!(url.as_str(), "http://api.local/v1/orders");

        let params = vec![
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "x y".to_string()),
        ];
        let url = build_url("http://api.local", "/orders", &params).unwrap();
        assert_eq!(url.as_str(), "http://api.local/orders?b=2&a=x+y");
    }

    #[test]
    fn test_build_url_ignores_foreign_origin() {
        let url = build_url("http://api.local", "https://evil.example/orders?id=1", &[]).unwrap();
        assert_eq!(url.as_str(), "http://api.local/orders?id=1");
    }

    #[test]
    fn test_query_values() {
        assert_eq!(query_value(&json!("raw")), "raw");
        assert_eq!(query_value(&json!(3)), "3");
        assert_eq!(query_value(&json!(true)), "true");
        assert_eq!(query_value(&json!(["a", 1])), "a,1");

        let request = ApiRequest::new("get", "/x")
            .with_params(json!({"z": 1, "a": "b"}).as_object().unwrap());
        assert_eq!(
            request.params,
            vec![("z".to_string(), "1".to_string()), ("a".to_string(), "b".to_string())]
        );
    }

    #[test]
    fn test_json_content_types() {
        assert!(is_json_content_type("application/json; charset=utf-8"));
        assert!(is_json_content_type("application/vnd.api+json"));
        assert!(!is_json_content_type("text/html"));
    }

    #[tokio::test]
    async fn test_stored_token_takes_precedence_over_api_key() {
        let mut server = Server::new_async().await;
        let with_key = server
            .mock("GET", "/orders")
            .match_header("authorization", "Bearer key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .expect(1)
            .create_async()
            .await;
        let login = server
            .mock("POST", "/auth/login")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token": "abc"}"#)
            .expect(1)
            .create_async()
            .await;
        let with_token = server
            .mock("GET", "/orders")
            .match_header("authorization", "Bearer abc")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id": 1}]"#)
            .expect(1)
            .create_async()
            .await;

        let fixture = Fixture::new(&server.url(), full_credentials());

        let first = fixture.execute(ApiRequest::new("GET", "/orders")).await.unwrap();
        assert_eq!(first.body, json!([]));

        let auth = fixture.execute(ApiRequest::new("POST", "/auth/login")).await.unwrap();
        assert_eq!(auth.status, 200);
        assert_eq!(fixture.tokens.get().await.as_deref(), Some("abc"));

        let second = fixture.execute(ApiRequest::new("get", "/orders")).await.unwrap();
        assert_eq!(second.body, json!([{"id": 1}]));
        assert_eq!(second.request_method, "GET");

        with_key.assert_async().await;
        login.assert_async().await;
        with_token.assert_async().await;
    }

    #[tokio::test]
    async fn test_explicit_authorization_header_is_kept() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/orders")
            .match_header("authorization", "Token custom")
            .match_header("accept", "text/plain")
            .with_status(200)
            .with_body("ok")
            .expect(1)
            .create_async()
            .await;

        let fixture = Fixture::new(&server.url(), full_credentials());
        let response = fixture
            .execute(
                ApiRequest::new("GET", "/orders")
                    .with_header("authorization", "Token custom")
                    .with_header("Accept", "text/plain"),
            )
            .await
            .unwrap();

        assert_eq!(response.body, json!("ok"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_401_triggers_one_refresh_and_retry() {
        let mut server = Server::new_async().await;
        let rejected = server
            .mock("GET", "/orders")
            .match_header("authorization", "Bearer key")
            .with_status(401)
            .with_body("expired")
            .expect(1)
            .create_async()
            .await;
        let login = server
            .mock("POST", "/auth/login")
            .match_body(Matcher::Json(json!({"username": "u", "password": "p"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data": {"accessToken": "fresh"}}"#)
            .expect(1)
            .create_async()
            .await;
        let retried = server
            .mock("GET", "/orders")
            .match_header("authorization", "Bearer fresh")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"orders": []}"#)
            .expect(1)
            .create_async()
            .await;

        let fixture = Fixture::new(&server.url(), full_credentials());
        let response = fixture.execute(ApiRequest::new("GET", "/orders")).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, json!({"orders": []}));
        assert_eq!(fixture.tokens.get().await.as_deref(), Some("fresh"));

        rejected.assert_async().await;
        login.assert_async().await;
        retried.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_refresh_returns_original_401() {
        let mut server = Server::new_async().await;
        let rejected = server
            .mock("GET", "/orders")
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": "unauthorized"}"#)
            .expect(1)
            .create_async()
            .await;
        let login = server
            .mock("POST", "/auth/login")
            .with_status(403)
            .expect(1)
            .create_async()
            .await;

        let fixture = Fixture::new(&server.url(), full_credentials());
        let response = fixture.execute(ApiRequest::new("GET", "/orders")).await.unwrap();

        assert_eq!(response.status, 401);
        assert_eq!(response.status_text, "Unauthorized");
        assert_eq!(response.body, json!({"error": "unauthorized"}));
        assert_eq!(fixture.tokens.get().await, None);

        rejected.assert_async().await;
        login.assert_async().await;
    }

    #[tokio::test]
    async fn test_401_without_document_is_returned() {
        let mut server = Server::new_async().await;
        let rejected = server
            .mock("GET", "/orders")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;

        let fixture = Fixture::new(&server.url(), full_credentials()).without_document();
        let response = fixture.execute(ApiRequest::new("GET", "/orders")).await.unwrap();

        assert_eq!(response.status, 401);
        rejected.assert_async().await;
    }

    #[tokio::test]
    async fn test_login_gets_credentials_but_sign_up_does_not() {
        let mut server = Server::new_async().await;
        let login = server
            .mock("POST", "/auth/login")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({"username": "u", "password": "p"})))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;
        let register = server
            .mock("POST", "/auth/register")
            .match_header("authorization", Matcher::Missing)
            .match_header("content-type", Matcher::Missing)
            .match_body(Matcher::Exact(String::new()))
            .with_status(400)
            .expect(1)
            .create_async()
            .await;

        let fixture = Fixture::new(&server.url(), full_credentials());

        let response = fixture.execute(ApiRequest::new("POST", "/auth/login")).await.unwrap();
        assert_eq!(response.status, 200);

        let response = fixture
            .execute(ApiRequest::new("POST", "/auth/register"))
            .await
            .unwrap();
        assert_eq!(response.status, 400);

        login.assert_async().await;
        register.assert_async().await;
    }

    #[tokio::test]
    async fn test_invalid_json_response_is_request_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/orders")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{ not json")
            .create_async()
            .await;

        let fixture = Fixture::new(&server.url(), Credentials::default());
        let err = fixture.execute(ApiRequest::new("GET", "/orders")).await.unwrap_err();
        assert!(matches!(err, ClientError::Request(_)));
    }

    #[tokio::test]
    async fn test_missing_base_url_is_config_error() {
        let fixture = Fixture {
            config: ApiConfig::default(),
            ..Fixture::new("http://unused", Credentials::default())
        };
        let err = fixture.execute(ApiRequest::new("GET", "/orders")).await.unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }
}
