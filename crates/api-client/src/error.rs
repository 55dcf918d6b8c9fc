//! Error types for api-client

use api_docs::DocError;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client error types
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to fetch Swagger documentation: {0}")]
    Discovery(String),

    #[error("Swagger documentation not loaded. Call fetch_swagger_info first.")]
    NotLoaded,

    #[error("{0}")]
    NotFound(String),

    #[error("Missing required parameters for API response validation: {}", .0.join(", "))]
    ValidationMissingArg(Vec<String>),

    #[error("API request failed: {0}")]
    Request(String),
}

impl From<DocError> for ClientError {
    fn from(err: DocError) -> Self {
        match err {
            DocError::EndpointNotFound { .. } => ClientError::NotFound(err.to_string()),
            other => ClientError::Discovery(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Request(err.to_string())
    }
}
