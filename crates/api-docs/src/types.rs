//! Type definitions for cached API descriptions

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// HTTP methods that can appear as operation keys under a path item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Patch,
        HttpMethod::Options,
        HttpMethod::Head,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
        }
    }

    /// Parse a method name or path-item key, ignoring case
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(value))
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where an API key is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    Header,
    Query,
    Cookie,
}

/// Security scheme declared by the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SecurityScheme {
    /// `type: http, scheme: bearer`
    HttpBearer { bearer_format: Option<String> },
    /// `type: http, scheme: basic` (or Swagger 2 `type: basic`)
    HttpBasic,
    /// `type: apiKey`
    ApiKey {
        name: String,
        #[serde(rename = "in")]
        location: ApiKeyLocation,
    },
    /// `type: oauth2`
    OAuth2,
    /// Anything we do not know how to turn into a header
    Other { scheme_type: String },
}

impl SecurityScheme {
    /// Convert a raw scheme object; works for both OpenAPI 3 and Swagger 2 shapes
    pub fn from_raw(raw: &RawSecurityScheme) -> Self {
        match raw.scheme_type.as_str() {
            "http" => match raw.scheme.as_deref().map(str::to_lowercase).as_deref() {
                Some("bearer") => SecurityScheme::HttpBearer {
                    bearer_format: raw.bearer_format.clone(),
                },
                Some("basic") => SecurityScheme::HttpBasic,
                other => SecurityScheme::Other {
                    scheme_type: format!("http/{}", other.unwrap_or("unspecified")),
                },
            },
            "basic" => SecurityScheme::HttpBasic,
            "apiKey" => SecurityScheme::ApiKey {
                name: raw.name.clone().unwrap_or_default(),
                location: match raw.location.as_deref() {
                    Some("query") => ApiKeyLocation::Query,
                    Some("cookie") => ApiKeyLocation::Cookie,
                    _ => ApiKeyLocation::Header,
                },
            },
            "oauth2" => SecurityScheme::OAuth2,
            other => SecurityScheme::Other {
                scheme_type: other.to_string(),
            },
        }
    }
}

/// One security requirement object: scheme name -> scopes
pub type SecurityRequirement = IndexMap<String, Vec<String>>;

// --- Raw Swagger 2 / OpenAPI 3 structures for parsing ---

/// Deserialize one field, treating null or an unexpected shape as absent so a
/// single odd field never discards its neighbours
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Top-level document. Leaves we only pass through stay as `Value`.
///
/// Path items and security schemes are kept raw: path maps carry `x-`
/// extensions and schemes may be `$ref`s, both read on lookup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDocument {
    #[serde(default, deserialize_with = "lenient")]
    pub swagger: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub openapi: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub info: Value,
    #[serde(default, deserialize_with = "lenient")]
    pub servers: Vec<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub paths: IndexMap<String, Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub security: Option<Vec<SecurityRequirement>>,
    #[serde(default, deserialize_with = "lenient")]
    pub components: Option<RawComponents>,
    #[serde(default, deserialize_with = "lenient")]
    pub security_definitions: IndexMap<String, Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub consumes: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    pub produces: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    pub tags: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawComponents {
    #[serde(default, deserialize_with = "lenient")]
    pub security_schemes: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSecurityScheme {
    #[serde(rename = "type")]
    pub scheme_type: String,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(rename = "in", default, deserialize_with = "lenient")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub scheme: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub bearer_format: Option<String>,
}

/// A single operation under a path item
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOperation {
    #[serde(default, deserialize_with = "lenient")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub operation_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub parameters: Vec<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub request_body: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub responses: IndexMap<String, Value>,
    /// `Some(vec![])` means explicitly unauthenticated
    #[serde(default, deserialize_with = "lenient")]
    pub security: Option<Vec<SecurityRequirement>>,
    #[serde(default, deserialize_with = "lenient")]
    pub consumes: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    pub produces: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_method_ignores_case() {
        assert_eq!(HttpMethod::parse("get"), Some(HttpMethod::Get));
        assert_eq!(HttpMethod::parse("PATCH"), Some(HttpMethod::Patch));
        assert_eq!(HttpMethod::parse("Options"), Some(HttpMethod::Options));
        assert_eq!(HttpMethod::parse("trace"), None);
        assert_eq!(HttpMethod::parse("parameters"), None);
    }

    #[test]
    fn test_security_scheme_from_openapi3() {
        let raw: RawSecurityScheme =
            serde_json::from_value(json!({"type": "http", "scheme": "Bearer", "bearerFormat": "JWT"}))
                .unwrap();
        assert_eq!(
            SecurityScheme::from_raw(&raw),
            SecurityScheme::HttpBearer { bearer_format: Some("JWT".to_string()) }
        );

        let raw: RawSecurityScheme =
            serde_json::from_value(json!({"type": "apiKey", "in": "query", "name": "key"})).unwrap();
        assert_eq!(
            SecurityScheme::from_raw(&raw),
            SecurityScheme::ApiKey { name: "key".to_string(), location: ApiKeyLocation::Query }
        );
    }

    #[test]
    fn test_security_scheme_from_swagger2() {
        let raw: RawSecurityScheme = serde_json::from_value(json!({"type": "basic"})).unwrap();
        assert_eq!(SecurityScheme::from_raw(&raw), SecurityScheme::HttpBasic);

        let raw: RawSecurityScheme =
            serde_json::from_value(json!({"type": "http", "scheme": "digest"})).unwrap();
        assert!(matches!(SecurityScheme::from_raw(&raw), SecurityScheme::Other { .. }));
    }

    #[test]
    fn test_operation_fields_are_read_independently() {
        let op: RawOperation = serde_json::from_value(json!({
            "summary": "S",
            "parameters": null,
            "tags": "not-a-list",
            "responses": {"200": {"description": "ok"}}
        }))
        .unwrap();

        assert_eq!(op.summary.as_deref(), Some("S"));
        assert!(op.parameters.is_empty());
        assert!(op.tags.is_empty());
        assert!(op.responses.contains_key("200"));
        assert!(op.security.is_none());
    }
}
