//! Error types for the document model

use thiserror::Error;

/// Result type alias for document operations
pub type DocResult<T> = std::result::Result<T, DocError>;

/// Document error types
#[derive(Error, Debug)]
pub enum DocError {
    #[error("Invalid API description: {0}")]
    InvalidFormat(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Endpoint {method} {path} not found in the Swagger documentation")]
    EndpointNotFound { method: String, path: String },
}

impl DocError {
    pub(crate) fn endpoint_not_found(path: &str, method: &str) -> Self {
        DocError::EndpointNotFound {
            method: method.to_uppercase(),
            path: path.to_string(),
        }
    }
}
