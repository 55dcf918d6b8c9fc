//! # api-client
//!
//! Everything that talks to the described API: configuration and credentials,
//! document discovery, authentication heuristics, the bearer token store and
//! request execution with one-shot 401 recovery.
//!
//! [`ApiSession`] owns the process-wide state (cached document and stored
//! token) and is the entry point for the tool layer.

mod error;
mod secret;
mod config;
mod redact;
mod classify;
mod token;
mod auth;
mod discovery;
mod executor;
mod session;

pub use error::{ClientError, Result};
pub use secret::SecretString;
pub use config::{
    mask_secret, ApiConfig, ConfigSource, Credentials, DEFAULT_CONFIG_PATH, DEFAULT_SERVER_NAME,
    DEFAULT_TIMEOUT_SECS,
};
pub use classify::{find_auth_endpoint, is_authentication_endpoint, is_sign_up_endpoint, AuthEndpoint};
pub use token::{find_token, TokenStore, TOKEN_FIELDS};
pub use auth::{resolve_auth_header, static_auth_header, AuthHeader};
pub use discovery::{DocumentResolver, CONVENTIONAL_PATHS};
pub use executor::{build_url, ApiRequest, ApiResponse};
pub use session::ApiSession;

pub use api_docs;
