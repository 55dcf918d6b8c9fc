//! Bearer token captured from login responses

use crate::classify::is_authentication_endpoint;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::info;

/// Response fields that may carry a token, in lookup order
pub const TOKEN_FIELDS: [&str; 8] = [
    "accessToken",
    "access_token",
    "token",
    "id_token",
    "jwt",
    "auth_token",
    "api_key",
    "apiKey",
];

/// Locate a token in a login response: top level, then under `data`, then
/// under `body`. Returns the field path and the token.
pub fn find_token(body: &Value) -> Option<(String, &str)> {
    let scopes = [
        (None, Some(body)),
        (Some("data"), body.get("data")),
        (Some("body"), body.get("body")),
    ];

    scopes.into_iter().find_map(|(prefix, scope)| {
        let scope = scope.filter(|s| s.is_object())?;
        TOKEN_FIELDS.iter().find_map(|field| {
            let token = scope.get(*field)?.as_str().filter(|t| !t.is_empty())?;
            let location = match prefix {
                Some(prefix) => format!("{}.{}", prefix, field),
                None => field.to_string(),
            };
            Some((location, token))
        })
    })
}

/// Most recent API access token, shared by every request in the process
#[derive(Debug, Default)]
pub struct TokenStore {
    token: RwLock<Option<String>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    /// Store a token from `body` when `path` is an authentication endpoint.
    /// Returns the captured token; the store is untouched when none is found.
    pub async fn capture(&self, body: &Value, path: &str) -> Option<String> {
        if !is_authentication_endpoint(path) {
            return None;
        }

        let (location, token) = find_token(body)?;
        let token = token.to_string();
        *self.token.write().await = Some(token.clone());
        info!("Stored API authentication token from field '{}'", location);
        Some(token)
    }

    pub async fn clear(&self) {
        *self.token.write().await = None;
    }
}
