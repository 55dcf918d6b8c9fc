//! Connection settings and credentials
//!
//! Values come from a tool-scoped JSON file (`.vscode/mcp.json` by default),
//! falling back per field to process environment variables. A `.env` file in
//! the working directory is loaded into the environment first.

use crate::secret::SecretString;
use base64::{engine::general_purpose::STANDARD, Engine};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Once;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Config file consulted when none is given on the command line
pub const DEFAULT_CONFIG_PATH: &str = ".vscode/mcp.json";
/// Entry under `servers` that holds our settings
pub const DEFAULT_SERVER_NAME: &str = "api-server";
/// Per-request timeout for outbound HTTP
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const BASE_URL_VAR: &str = "API_BASE_URL";
const DOCS_URL_VAR: &str = "API_DOCS_URL";
const API_KEY_VAR: &str = "API_KEY";
const USERNAME_VAR: &str = "API_USERNAME";
const PASSWORD_VAR: &str = "API_PASSWORD";

static ENV_LOADER: Once = Once::new();

/// Load `.env` from the working directory into the process environment, once
pub(crate) fn ensure_env_loaded() {
    ENV_LOADER.call_once(|| {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "Loaded environment file");
        }
    });
}

/// Where the base URL came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    McpJson,
    Environment,
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConfigSource::McpJson => "mcp.json",
            ConfigSource::Environment => "environment",
            ConfigSource::Default => "default",
        };
        write!(f, "{}", name)
    }
}

/// Credentials supplied once at start-up
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    api_key: Option<SecretString>,
    username: Option<String>,
    password: Option<SecretString>,
}

impl Credentials {
    /// Empty strings count as absent
    pub fn new(api_key: Option<String>, username: Option<String>, password: Option<String>) -> Self {
        Self {
            api_key: non_empty(api_key).map(SecretString::new),
            username: non_empty(username),
            password: non_empty(password).map(SecretString::new),
        }
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_ref().map(SecretString::expose)
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Username and password, only when both are configured
    pub fn login(&self) -> Option<(&str, &str)> {
        Some((self.username.as_deref()?, self.password.as_ref()?.expose()))
    }

    /// `base64(username:password)` for an `Authorization: Basic` header
    pub fn basic_token(&self) -> Option<String> {
        let (username, password) = self.login()?;
        Some(STANDARD.encode(format!("{}:{}", username, password)))
    }

    /// `{username, password}` request body for login endpoints
    pub fn login_body(&self) -> Option<Value> {
        let (username, password) = self.login()?;
        Some(json!({ "username": username, "password": password }))
    }
}

/// Resolved configuration for one API
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: Option<String>,
    pub docs_url: Option<String>,
    pub credentials: Credentials,
    pub source: ConfigSource,
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            docs_url: None,
            credentials: Credentials::default(),
            source: ConfigSource::Default,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct McpFile {
    #[serde(default)]
    servers: IndexMap<String, McpServerEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct McpServerEntry {
    #[serde(default)]
    env: IndexMap<String, Value>,
}

impl ApiConfig {
    /// Config pointing at `base_url` with no other settings
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: non_empty(Some(base_url.into())),
            ..Self::default()
        }
    }

    pub fn with_docs_url(mut self, docs_url: impl Into<String>) -> Self {
        self.docs_url = non_empty(Some(docs_url.into()));
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load from `path` (entry `servers.<server_name>.env`) and the environment.
    /// A missing file is fine; a malformed one is logged and ignored.
    pub fn load(path: &Path, server_name: &str) -> Self {
        ensure_env_loaded();
        let file_env = read_server_env(path, server_name);
        Self::from_sources(&file_env, |name| std::env::var(name).ok())
    }

    /// File values win over `env` values, field by field
    fn from_sources(
        file_env: &IndexMap<String, String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let lookup = |name: &str| {
            non_empty(file_env.get(name).cloned()).or_else(|| non_empty(env(name)))
        };

        let source = if non_empty(file_env.get(BASE_URL_VAR).cloned()).is_some() {
            ConfigSource::McpJson
        } else if non_empty(env(BASE_URL_VAR)).is_some() {
            ConfigSource::Environment
        } else {
            ConfigSource::Default
        };

        Self {
            base_url: lookup(BASE_URL_VAR),
            docs_url: lookup(DOCS_URL_VAR),
            credentials: Credentials::new(
                lookup(API_KEY_VAR),
                lookup(USERNAME_VAR),
                lookup(PASSWORD_VAR),
            ),
            source,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Log the start-up banner with secrets masked
    pub fn log_summary(&self) {
        if self.base_url.is_none() {
            warn!("{} not found in configuration", BASE_URL_VAR);
        }
        if self.source == ConfigSource::Default {
            warn!("Some API configuration values missing from config file");
        }

        info!(
            "Base URL: {}",
            self.base_url.as_deref().unwrap_or("[MISSING]")
        );
        info!(
            "Docs URL: {}",
            self.docs_url
                .as_deref()
                .unwrap_or("[NOT SET - using auto-discovery]")
        );
        info!("API key: {}", mask_secret(self.credentials.api_key()));
        info!(
            "Username: {}",
            self.credentials.username().unwrap_or("[MISSING]")
        );
        info!(
            "Password: {}",
            mask_secret(self.credentials.password.as_ref().map(SecretString::expose))
        );
        info!("Source: {}", self.source);
    }
}

/// Keep the first and last two characters; secrets of four characters or
/// fewer are masked entirely
pub fn mask_secret(secret: Option<&str>) -> String {
    let Some(secret) = secret else {
        return "[MISSING]".to_string();
    };

    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }

    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - 4), tail)
}

fn read_server_env(path: &Path, server_name: &str) -> IndexMap<String, String> {
    if !path.exists() {
        debug!(path = %path.display(), "No config file found, using environment");
        return IndexMap::new();
    }

    let parsed = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|contents| serde_json::from_str::<McpFile>(&contents).map_err(|e| e.to_string()));

    match parsed {
        Ok(mut file) => {
            debug!(path = %path.display(), server = server_name, "Loaded config file");
            file.servers
                .swap_remove(server_name)
                .map(|entry| {
                    entry
                        .env
                        .into_iter()
                        .filter_map(|(key, value)| match value {
                            Value::String(s) => Some((key, s)),
                            _ => None,
                        })
                        .collect()
                })
                .unwrap_or_default()
        }
        Err(e) => {
            error!(path = %path.display(), "Error reading config file: {}", e);
            IndexMap::new()
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn file_of(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(Some("abcdefgh")), "ab****gh");
        assert_eq!(mask_secret(Some("abcde")), "ab*de");
        assert_eq!(mask_secret(Some("abcd")), "****");
        assert_eq!(mask_secret(Some("")), "");
        assert_eq!(mask_secret(None), "[MISSING]");
    }

    #[test]
    fn test_file_overrides_environment_per_field() {
        let config = ApiConfig::from_sources(
            &file_of(&[("API_BASE_URL", "http://file"), ("API_KEY", "")]),
            env_of(&[
                ("API_BASE_URL", "http://env"),
                ("API_KEY", "env-key"),
                ("API_USERNAME", "alice"),
            ]),
        );

        assert_eq!(config.base_url.as_deref(), Some("http://file"));
        assert_eq!(config.credentials.api_key(), Some("env-key"));
        assert_eq!(config.credentials.username(), Some("alice"));
        assert!(config.credentials.login().is_none());
        assert_eq!(config.source, ConfigSource::McpJson);
    }

    #[test]
    fn test_source_environment_and_default() {
        let config =
            ApiConfig::from_sources(&IndexMap::new(), env_of(&[("API_BASE_URL", "http://env")]));
        assert_eq!(config.source, ConfigSource::Environment);

        let config = ApiConfig::from_sources(
            &file_of(&[("API_DOCS_URL", "http://docs")]),
            env_of(&[]),
        );
        assert_eq!(config.source, ConfigSource::Default);
        assert_eq!(config.docs_url.as_deref(), Some("http://docs"));
        assert_eq!(config.source.to_string(), "default");
    }

    #[test]
    fn test_credentials_helpers() {
        let creds = Credentials::new(None, Some("user".into()), Some("pass".into()));
        assert_eq!(creds.basic_token().as_deref(), Some("dXNlcjpwYXNz"));
        assert_eq!(
            creds.login_body(),
            Some(json!({"username": "user", "password": "pass"}))
        );

        let debug = format!("{:?}", creds);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("\"pass\""));
    }

    #[test]
    fn test_read_server_env_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mcp.json");
        std::fs::write(
            &path,
            r#"{"servers": {
                "api-server": {"env": {"API_BASE_URL": "http://localhost:8080", "API_KEY": "k", "PORT": 8080}},
                "other": {"env": {"API_BASE_URL": "http://other"}}
            }}"#,
        )
        .unwrap();

        let env = read_server_env(&path, DEFAULT_SERVER_NAME);
        assert_eq!(env.get("API_BASE_URL").map(String::as_str), Some("http://localhost:8080"));
        assert_eq!(env.get("API_KEY").map(String::as_str), Some("k"));
        assert!(!env.contains_key("PORT"));

        let other = read_server_env(&path, "other");
        assert_eq!(other.get("API_BASE_URL").map(String::as_str), Some("http://other"));
    }

    #[test]
    fn test_missing_or_malformed_file_is_ignored() {
        let dir = tempdir().unwrap();
        assert!(read_server_env(&dir.path().join("absent.json"), "api-server").is_empty());

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(read_server_env(&path, "api-server").is_empty());
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mcp.json");
        std::fs::write(
            &path,
            r#"{"servers": {"api-server": {"env": {"API_BASE_URL": "http://from-file"}}}}"#,
        )
        .unwrap();

        let config = ApiConfig::load(&path, "api-server");
        assert_eq!(config.base_url.as_deref(), Some("http://from-file"));
        assert_eq!(config.source, ConfigSource::McpJson);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }
}
