//! Authentication header selection

use crate::config::Credentials;
use api_docs::{ApiDescription, ApiKeyLocation, SecurityScheme};
use tracing::debug;

/// A single credential header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeader {
    pub name: String,
    pub value: String,
}

impl AuthHeader {
    fn authorization(value: String) -> Self {
        Self {
            name: "Authorization".to_string(),
            value,
        }
    }

    fn bearer(token: &str) -> Self {
        Self::authorization(format!("Bearer {}", token))
    }
}

/// Config-derived header: bearer API key, else basic username/password
pub fn static_auth_header(credentials: &Credentials) -> Option<AuthHeader> {
    if let Some(key) = credentials.api_key() {
        return Some(AuthHeader::bearer(key));
    }
    credentials
        .basic_token()
        .map(|token| AuthHeader::authorization(format!("Basic {}", token)))
}

/// Header the document's security declarations call for on `method path`.
///
/// Each requirement contributes its first named scheme; the first scheme that
/// can be satisfied from `credentials` wins. Without a document, or when
/// nothing applies, the static header is used.
pub fn resolve_auth_header(
    doc: Option<&ApiDescription>,
    credentials: &Credentials,
    path: &str,
    method: &str,
) -> Option<AuthHeader> {
    let Some(doc) = doc else {
        return static_auth_header(credentials);
    };

    for requirement in doc.effective_security(path, method) {
        let Some(name) = requirement.keys().next() else {
            continue;
        };
        let Some(scheme) = doc.security_scheme(name) else {
            debug!("Security scheme '{}' is not defined", name);
            continue;
        };

        if let Some(header) = header_for_scheme(&scheme, credentials) {
            debug!("Using security scheme '{}' for {} {}", name, method, path);
            return Some(header);
        }
    }

    static_auth_header(credentials)
}

fn header_for_scheme(scheme: &SecurityScheme, credentials: &Credentials) -> Option<AuthHeader> {
    match scheme {
        SecurityScheme::HttpBearer { .. } => credentials.api_key().map(AuthHeader::bearer),
        SecurityScheme::HttpBasic => credentials
            .basic_token()
            .map(|token| AuthHeader::authorization(format!("Basic {}", token))),
        SecurityScheme::ApiKey {
            name,
            location: ApiKeyLocation::Header,
        } => credentials.api_key().map(|key| AuthHeader {
            name: name.clone(),
            value: key.to_string(),
        }),
        _ => None,
    }
}
