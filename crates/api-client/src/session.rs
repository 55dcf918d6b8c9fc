//! Process-wide API session
//!
//! Holds the two pieces of shared mutable state: the cached document and the
//! stored access token. The document is replaced as a whole behind a lock, so
//! readers always see either the old or the new description. Both are
//! memory-only.

use crate::auth::{resolve_auth_header, AuthHeader};
use crate::config::ApiConfig;
use crate::discovery::DocumentResolver;
use crate::error::{ClientError, Result};
use crate::executor::{ApiRequest, ApiResponse, RequestExecutor};
use crate::token::TokenStore;
use api_docs::{ApiDescription, DocumentInfo, EndpointSummary, OperationDetail, ValidationResult};
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Shared state for every tool call in the process
pub struct ApiSession {
    config: ApiConfig,
    client: Client,
    document: RwLock<Option<Arc<ApiDescription>>>,
    tokens: TokenStore,
}

impl ApiSession {
    /// Create a session; outbound requests use `config.timeout`
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            document: RwLock::new(None),
            tokens: TokenStore::new(),
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Currently cached document, if any
    pub async fn document(&self) -> Option<Arc<ApiDescription>> {
        self.document.read().await.clone()
    }

    /// Replace the cached document
    pub async fn replace_document(&self, doc: ApiDescription) -> Arc<ApiDescription> {
        let doc = Arc::new(doc);
        *self.document.write().await = Some(doc.clone());
        doc
    }

    /// Run discovery and cache the result
    pub async fn discover(&self, explicit_url: Option<&str>) -> Result<Arc<ApiDescription>> {
        let doc = DocumentResolver::new(&self.client, &self.config)
            .resolve(explicit_url)
            .await?;
        info!("Successfully fetched Swagger documentation from {}", doc.source_url());
        Ok(self.replace_document(doc).await)
    }

    /// Discover and summarize the document. A configured docs URL takes
    /// priority over `url`.
    pub async fn fetch_info(&self, url: Option<&str>) -> Result<DocumentInfo> {
        let url = match (&self.config.docs_url, url) {
            (Some(docs_url), Some(url)) => {
                debug!("Ignoring {} in favor of configured docs URL {}", url, docs_url);
                None
            }
            (_, url) => url,
        };

        let doc = self.discover(url).await?;
        Ok(doc.info(self.config.base_url.as_deref()))
    }

    async fn loaded(&self) -> Result<Arc<ApiDescription>> {
        self.document().await.ok_or(ClientError::NotLoaded)
    }

    pub async fn list_endpoints(&self) -> Result<Vec<EndpointSummary>> {
        Ok(self.loaded().await?.list_endpoints())
    }

    pub async fn endpoint_details(&self, path: &str, method: &str) -> Result<OperationDetail> {
        Ok(self.loaded().await?.endpoint_details(path, method)?)
    }

    /// Execute a request against the configured base URL
    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let document = self.document().await;
        RequestExecutor::new(&self.client, &self.config, &self.tokens, document)
            .execute(request)
            .await
    }

    /// Coarse check of a response body against the cached document
    pub async fn validate(
        &self,
        path: &str,
        method: &str,
        status_code: u16,
        body: &Value,
    ) -> Result<ValidationResult> {
        Ok(self
            .loaded()
            .await?
            .validate_response(path, method, status_code, body)?)
    }

    /// Header the document's security declarations call for. Request
    /// execution does not consult this; it uses the stored token or API key.
    pub async fn resolve_auth_header(&self, path: &str, method: &str) -> Option<AuthHeader> {
        let document = self.document().await;
        resolve_auth_header(document.as_deref(), &self.config.credentials, path, method)
    }

    /// Token captured from the last successful login, if any
    pub async fn access_token(&self) -> Option<String> {
        self.tokens.get().await
    }

    /// Forget the cached document and the stored token
    pub async fn reset(&self) {
        *self.document.write().await = None;
        self.tokens.clear().await;
    }
}
