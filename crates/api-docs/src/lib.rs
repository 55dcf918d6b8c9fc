//! # api-docs
//!
//! Swagger 2.0 / OpenAPI 3.x document model for Swagger MCP.
//! Holds a fetched API description and answers read-only questions about it:
//! which endpoints exist, what an operation looks like, which security schemes
//! apply, and whether a response body is shaped the way the document says.

mod types;
mod document;
mod resolver;
mod catalog;
mod validator;
mod error;

pub use types::*;
pub use document::{ApiDescription, DocumentInfo};
pub use resolver::SchemaResolver;
pub use catalog::{EndpointSummary, OperationDetail, ResponseDetail};
pub use validator::{ValidationResult, FULL_VALIDATION_NOTE};
pub use error::{DocError, DocResult};
