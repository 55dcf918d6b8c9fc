//! Locate and fetch the API description document

use crate::auth::static_auth_header;
use crate::config::ApiConfig;
use crate::error::{ClientError, Result};
use crate::executor::{build_url, is_json_content_type};
use api_docs::ApiDescription;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response};
use tracing::{debug, info, warn};
use url::Url;

/// Paths probed under the base URL, in order
pub const CONVENTIONAL_PATHS: [&str; 15] = [
    "/api-docs",
    "/api-docs.json",
    "/api-docs/swagger.json",
    "/api-docs/v1/swagger.json",
    "/swagger",
    "/swagger.json",
    "/swagger/v1/swagger.json",
    "/swagger-ui",
    "/swagger-ui.json",
    "/swagger-ui/swagger.json",
    "/openapi",
    "/openapi.json",
    "/docs",
    "/docs.json",
    "/docs/swagger.json",
];

/// Finds the document for a configured API
pub struct DocumentResolver<'a> {
    client: &'a Client,
    config: &'a ApiConfig,
}

impl<'a> DocumentResolver<'a> {
    pub fn new(client: &'a Client, config: &'a ApiConfig) -> Self {
        Self { client, config }
    }

    /// Fetch the document from `explicit_url`, else the configured docs URL,
    /// else the first conventional path under the base URL that serves JSON
    pub async fn resolve(&self, explicit_url: Option<&str>) -> Result<ApiDescription> {
        if let Some(url) = explicit_url.filter(|url| !url.is_empty()) {
            return self.resolve_explicit(url).await;
        }

        if let Some(docs_url) = self.config.docs_url.as_deref() {
            info!("Trying to fetch Swagger doc from configured docs URL: {}", docs_url);
            if let Some(doc) = self.fetch_docs_url(docs_url).await {
                return Ok(doc);
            }
        }

        let Some(base_url) = self.config.base_url.as_deref() else {
            return Err(ClientError::Discovery(match &self.config.docs_url {
                Some(docs_url) => format!(
                    "could not fetch {} and no base URL is configured for probing",
                    docs_url
                ),
                None => "no source configured".to_string(),
            }));
        };

        self.probe(base_url).await
    }

    async fn resolve_explicit(&self, url: &str) -> Result<ApiDescription> {
        let target = self.absolute(url)?;
        if is_full_url(url) {
            self.warn_on_foreign_origin(&target);
        } else {
            info!("Path-only URL provided, joined onto base URL: {}", target);
        }

        self.fetch(&target, true).await.map_err(ClientError::Discovery)
    }

    async fn fetch_docs_url(&self, docs_url: &str) -> Option<ApiDescription> {
        let mut candidates = vec![docs_url.to_string()];
        if !docs_url.ends_with(".json") {
            candidates.push(format!("{}.json", docs_url));
        }

        for candidate in candidates {
            let result = match self.absolute(&candidate) {
                Ok(url) => self.fetch(&url, true).await,
                Err(e) => Err(e.to_string()),
            };
            match result {
                Ok(doc) => return Some(doc),
                Err(e) => warn!("Failed to fetch from configured docs URL {}: {}", candidate, e),
            }
        }

        None
    }

    async fn probe(&self, base_url: &str) -> Result<ApiDescription> {
        for path in CONVENTIONAL_PATHS {
            let url = build_url(base_url, path, &[])?;
            info!("Trying to fetch Swagger doc from: {}", url);

            let response = match self.get(&url).await {
                Ok(response) if response.status().is_success() => response,
                Ok(response) => {
                    debug!(status = response.status().as_u16(), url = %url, "Probe missed");
                    continue;
                }
                Err(e) => {
                    debug!("Failed to fetch from {}: {}", url, e);
                    continue;
                }
            };

            let content_type = content_type(&response);
            if !is_json_content_type(&content_type) {
                info!("Found {} but content type is not JSON: {}", url, content_type);
                continue;
            }

            match read_document(response, &url, false).await {
                Ok(doc) => return Ok(doc),
                Err(e) => debug!("Unusable document at {}: {}", url, e),
            }
        }

        Err(ClientError::Discovery(
            "not found at any conventional path, provide an explicit URL".to_string(),
        ))
    }

    /// GET `url`, failing on transport errors and non-success statuses
    async fn fetch(&self, url: &Url, allow_yaml: bool) -> std::result::Result<ApiDescription, String> {
        let response = self.get(url).await.map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("{} {}", status, text));
        }
        read_document(response, url, allow_yaml).await
    }

    async fn get(&self, url: &Url) -> reqwest::Result<Response> {
        let mut request = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/json");
        if let Some(auth) = static_auth_header(&self.config.credentials) {
            request = request.header(auth.name, auth.value);
        }
        request.send().await
    }

    fn absolute(&self, url: &str) -> Result<Url> {
        if is_full_url(url) {
            return Url::parse(url)
                .map_err(|e| ClientError::Discovery(format!("invalid URL {}: {}", url, e)));
        }

        let base_url = self.config.base_url.as_deref().ok_or_else(|| {
            ClientError::Config(format!(
                "relative documentation URL {} needs a configured base URL",
                url
            ))
        })?;
        build_url(base_url, url, &[])
    }

    fn warn_on_foreign_origin(&self, target: &Url) {
        let Some(base) = self
            .config
            .base_url
            .as_deref()
            .and_then(|base| Url::parse(base).ok())
        else {
            return;
        };

        if base.origin() != target.origin() {
            warn!(
                "URL origin {} differs from configured base URL {}",
                target.origin().ascii_serialization(),
                base
            );
            warn!("This URL is used for Swagger docs only, requests still go to the configured base URL");
        }
    }
}

fn is_full_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn content_type(response: &Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

async fn read_document(
    response: Response,
    url: &Url,
    allow_yaml: bool,
) -> std::result::Result<ApiDescription, String> {
    let content_type = content_type(&response);
    let text = response.text().await.map_err(|e| e.to_string())?;

    let path = url.path();
    let is_yaml = allow_yaml
        && (content_type.contains("yaml") || path.ends_with(".yaml") || path.ends_with(".yml"));

    let doc = if is_yaml {
        ApiDescription::parse_yaml(&text, url.as_str())
    } else {
        ApiDescription::parse_json(&text, url.as_str())
    };
    doc.map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use mockito::Server;

    const DOC: &str = r#"{"openapi": "3.0.0", "info": {"title": "Shop"}, "paths": {"/orders": {"get": {}}}}"#;

    async fn resolve(config: &ApiConfig, explicit: Option<&str>) -> Result<ApiDescription> {
        let client = Client::new();
        DocumentResolver::new(&client, config).resolve(explicit).await
    }

    #[tokio::test]
    async fn test_probe_accepts_first_json_response() {
        let mut server = Server::new_async().await;
        let html = server
            .mock("GET", "/swagger")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html></html>")
            .expect(1)
            .create_async()
            .await;
        let openapi = server
            .mock("GET", "/openapi.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(DOC)
            .expect(1)
            .create_async()
            .await;
        let after = server
            .mock("GET", "/docs")
            .expect(0)
            .create_async()
            .await;

        let config = ApiConfig::new(server.url());
        let doc = resolve(&config, None).await.unwrap();

        assert_eq!(doc.source_url(), format!("{}/openapi.json", server.url()));
        assert_eq!(doc.list_endpoints().len(), 1);

        html.assert_async().await;
        openapi.assert_async().await;
        after.assert_async().await;
    }

    #[tokio::test]
    async fn test_probe_exhausted() {
        let server = Server::new_async().await;
        let config = ApiConfig::new(server.url());

        let err = resolve(&config, None).await.unwrap_err();
        assert!(err.to_string().contains("not found at any conventional path"));
    }

    #[tokio::test]
    async fn test_no_source_configured() {
        let err = resolve(&ApiConfig::default(), None).await.unwrap_err();
        match err {
            ClientError::Discovery(message) => assert_eq!(message, "no source configured"),
            other => panic!("expected Discovery, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_docs_url_retries_with_json_suffix() {
        let mut server = Server::new_async().await;
        let plain = server
            .mock("GET", "/v2/api-docs")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;
        let suffixed = server
            .mock("GET", "/v2/api-docs.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(DOC)
            .expect(1)
            .create_async()
            .await;

        let config = ApiConfig::default().with_docs_url(format!("{}/v2/api-docs", server.url()));
        let doc = resolve(&config, None).await.unwrap();

        assert!(doc.source_url().ends_with("/v2/api-docs.json"));
        plain.assert_async().await;
        suffixed.assert_async().await;
    }

    #[tokio::test]
    async fn test_explicit_relative_url_with_credentials() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/spec/openapi.yaml")
            .match_header("authorization", "Bearer secret-key")
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_body("openapi: 3.0.0\npaths:\n  /pets:\n    get: {}\n")
            .expect(1)
            .create_async()
            .await;

        let config = ApiConfig::new(server.url())
            .with_credentials(Credentials::new(Some("secret-key".into()), None, None));
        let doc = resolve(&config, Some("/spec/openapi.yaml")).await.unwrap();

        assert_eq!(doc.list_endpoints()[0].path, "/pets");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_explicit_url_failure_is_reported() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/swagger.json")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let config = ApiConfig::new("http://api.example");
        let err = resolve(&config, Some(&format!("{}/swagger.json", server.url())))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Discovery(ref m) if m.contains("500")));
    }

    #[tokio::test]
    async fn test_relative_explicit_url_needs_base() {
        let err = resolve(&ApiConfig::default(), Some("/swagger.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }
}
