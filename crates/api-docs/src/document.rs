//! Cached API description and read-only accessors over it

use crate::error::{DocError, DocResult};
use crate::resolver::SchemaResolver;
use crate::types::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// A fetched Swagger 2.0 / OpenAPI 3.x document together with the URL it came from
#[derive(Debug, Clone)]
pub struct ApiDescription {
    /// Untouched document, used for `$ref` lookups
    root: Value,
    /// Typed view of the parts we reason about
    document: RawDocument,
    /// URL the document was fetched from
    source_url: String,
}

/// Summary returned to the agent after discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    pub title: String,
    pub version: String,
    pub description: String,
    pub swagger_version: String,
    pub servers: Vec<Value>,
    pub path_count: usize,
    pub tag_count: usize,
    pub docs_url: String,
}

impl ApiDescription {
    /// Build from an already-parsed JSON value
    pub fn from_value(root: Value, source_url: impl Into<String>) -> DocResult<Self> {
        if !root.is_object() {
            return Err(DocError::InvalidFormat(
                "document root must be a JSON object".to_string(),
            ));
        }

        let document: RawDocument = serde_json::from_value(root.clone())?;

        debug!(
            "Loaded API description with {} path entries",
            document.paths.len()
        );

        Ok(Self {
            root,
            document,
            source_url: source_url.into(),
        })
    }

    /// Parse a document from JSON
    pub fn parse_json(content: &str, source_url: impl Into<String>) -> DocResult<Self> {
        let root: Value = serde_json::from_str(content)?;
        Self::from_value(root, source_url)
    }

    /// Parse a document from YAML
    pub fn parse_yaml(content: &str, source_url: impl Into<String>) -> DocResult<Self> {
        let content = sanitize_large_numbers(content);
        // Going through serde_yaml::Value lets integer keys such as `200:` become strings
        let yaml: serde_yaml::Value = serde_yaml::from_str(&content)?;
        let root = serde_json::to_value(yaml)?;
        Self::from_value(root, source_url)
    }

    /// URL the document was fetched from
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Resolver for `$ref` pointers into this document
    pub fn resolver(&self) -> SchemaResolver<'_> {
        SchemaResolver::new(&self.root)
    }

    /// Path items keyed by template; `x-` extensions and non-object entries are skipped
    fn path_items(&self) -> impl Iterator<Item = (&str, &Map<String, Value>)> {
        self.document.paths.iter().filter_map(|(path, item)| {
            if path.starts_with("x-") {
                return None;
            }
            item.as_object().map(|item| (path.as_str(), item))
        })
    }

    fn path_item(&self, path: &str) -> Option<&Map<String, Value>> {
        if path.starts_with("x-") {
            return None;
        }
        self.document.paths.get(path).and_then(Value::as_object)
    }

    /// All path templates, in document order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.path_items().map(|(path, _)| path)
    }

    /// Every (path, method, operation) triple, in document order
    pub fn operations(&self) -> impl Iterator<Item = (&str, HttpMethod, &Value)> {
        self.path_items().flat_map(|(path, item)| {
            item.iter().filter_map(move |(key, operation)| {
                HttpMethod::parse(key)
                    .filter(|_| operation.is_object())
                    .map(|method| (path, method, operation))
            })
        })
    }

    /// Whether the document declares `method` on exactly `path`
    pub fn has_operation(&self, path: &str, method: HttpMethod) -> bool {
        self.path_item(path)
            .map(|item| {
                item.iter()
                    .any(|(key, op)| op.is_object() && HttpMethod::parse(key) == Some(method))
            })
            .unwrap_or(false)
    }

    /// Look up an operation; the method is matched case-insensitively
    pub fn operation(&self, path: &str, method: &str) -> Option<(HttpMethod, RawOperation)> {
        let wanted = HttpMethod::parse(method)?;
        let item = self.path_item(path)?;

        item.iter()
            .find(|(key, op)| op.is_object() && HttpMethod::parse(key) == Some(wanted))
            .map(|(_, operation)| (wanted, read_operation(path, wanted, operation)))
    }

    /// Parameters declared on the path item itself
    pub fn path_parameters(&self, path: &str) -> Vec<Value> {
        self.path_item(path)
            .and_then(|item| item.get("parameters"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }

    /// Security requirements in force for an operation: an operation-level list
    /// wins even when empty, otherwise the document-level list applies
    pub fn effective_security(&self, path: &str, method: &str) -> Vec<SecurityRequirement> {
        if let Some((_, operation)) = self.operation(path, method) {
            if let Some(security) = operation.security {
                return security;
            }
        }

        self.document.security.clone().unwrap_or_default()
    }

    /// Look up a named security scheme (`components.securitySchemes`, then
    /// Swagger 2 `securityDefinitions`). `$ref` entries are followed; entries
    /// that do not parse as a scheme are skipped.
    pub fn security_scheme(&self, name: &str) -> Option<SecurityScheme> {
        let declared = self
            .document
            .components
            .as_ref()
            .and_then(|c| c.security_schemes.get(name));

        declared
            .into_iter()
            .chain(self.document.security_definitions.get(name))
            .find_map(|raw| {
                let resolved = self.resolver().resolve(raw);
                match serde_json::from_value::<RawSecurityScheme>(resolved) {
                    Ok(scheme) => Some(SecurityScheme::from_raw(&scheme)),
                    Err(e) => {
                        debug!("Skipping security scheme '{}': {}", name, e);
                        None
                    }
                }
            })
    }

    /// Document-level `consumes` (Swagger 2)
    pub fn default_consumes(&self) -> Option<&[String]> {
        self.document.consumes.as_deref()
    }

    /// Document-level `produces` (Swagger 2)
    pub fn default_produces(&self) -> Option<&[String]> {
        self.document.produces.as_deref()
    }

    /// Summarize the document; `fallback_server` is reported when it declares no servers
    pub fn info(&self, fallback_server: Option<&str>) -> DocumentInfo {
        let info = &self.document.info;
        let text = |key: &str, default: &str| {
            info.get(key)
                .and_then(value_to_text)
                .unwrap_or_else(|| default.to_string())
        };

        let swagger_version = self
            .document
            .swagger
            .as_ref()
            .or(self.document.openapi.as_ref())
            .and_then(value_to_text)
            .unwrap_or_else(|| "Unknown".to_string());

        let servers = if self.document.servers.is_empty() {
            vec![serde_json::json!({ "url": fallback_server })]
        } else {
            self.document.servers.clone()
        };

        DocumentInfo {
            title: text("title", "API Documentation"),
            version: text("version", "Unknown"),
            description: text("description", "No description available"),
            swagger_version,
            servers,
            path_count: self.paths().count(),
            tag_count: self.document.tags.len(),
            docs_url: self.source_url.clone(),
        }
    }
}

/// Fields are read independently, so only a non-object operation comes back empty
pub(crate) fn read_operation(path: &str, method: HttpMethod, value: &Value) -> RawOperation {
    serde_json::from_value(value.clone()).unwrap_or_else(|e| {
        debug!("Operation {} {} has unexpected shape: {}", method, path, e);
        RawOperation::default()
    })
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Clamp integers too large for serde to represent.
/// Some published documents use 19-digit minimum/maximum bounds, which makes
/// serde_yaml fail with "number out of range".
fn sanitize_large_numbers(content: &str) -> String {
    static LARGE_BOUND: once_cell::sync::Lazy<Regex> = once_cell::sync::Lazy::new(|| {
        Regex::new(r"(?m)^(\s*(?:minimum|maximum|exclusiveMinimum|exclusiveMaximum):\s*)(-?\d{16,})")
            .expect("large bound pattern")
    });

    LARGE_BOUND
        .replace_all(content, |caps: &regex::Captures| {
            if caps[2].starts_with('-') {
                format!("{}-2147483648", &caps[1])
            } else {
                format!("{}2147483647", &caps[1])
            }
        })
        .into_owned()
}
