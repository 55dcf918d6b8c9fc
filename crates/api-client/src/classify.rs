//! Path heuristics for login and registration endpoints
//!
//! These are plain pattern lists, not inference. Unconventional APIs can be
//! misclassified; the lists stay fixed so behavior is reproducible.

use api_docs::{ApiDescription, HttpMethod};
use once_cell::sync::Lazy;
use regex::Regex;

/// Path fragments that mark an authentication endpoint (substring match)
const AUTH_SEGMENTS: [&str; 10] = [
    "auth", "login", "signin", "sign-in", "signup", "sign-up", "token", "authorize", "oauth",
    "register",
];

/// Authenticated user management that lives under `/auth`
const USER_MANAGEMENT: [&str; 3] = [r"/auth/users/?$", r"/auth/users/\d+/?$", r"/auth/profile/?$"];

/// Path suffixes that mark a sign-up endpoint
const SIGN_UP_SUFFIXES: [&str; 9] = [
    "signup",
    "sign-up",
    "register",
    "auth/signup",
    "auth/sign-up",
    "auth/register",
    "user/create",
    "users/create",
    "account/create",
];

/// Login paths tried, in priority order, when a token has to be refreshed
const LOGIN_PATHS: [&str; 9] = [
    "/auth/login",
    "/auth/signin",
    "/auth/sign-in",
    "/login",
    "/signin",
    "/sign-in",
    "/token",
    "/auth/token",
    "/oauth/token",
];

static AUTH_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    AUTH_SEGMENTS
        .iter()
        .map(|segment| Regex::new(&format!(r"(?i)/{}/?", regex::escape(segment))).expect("auth pattern"))
        .collect()
});

static USER_MANAGEMENT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    USER_MANAGEMENT
        .iter()
        .map(|pattern| Regex::new(&format!("(?i){}", pattern)).expect("user management pattern"))
        .collect()
});

static SIGN_UP_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    SIGN_UP_SUFFIXES
        .iter()
        .map(|suffix| Regex::new(&format!(r"(?i)/{}/?$", regex::escape(suffix))).expect("sign-up pattern"))
        .collect()
});

/// Whether `path` performs login or registration rather than resource access
pub fn is_authentication_endpoint(path: &str) -> bool {
    AUTH_PATTERNS.iter().any(|pattern| pattern.is_match(path))
        && !USER_MANAGEMENT_PATTERNS
            .iter()
            .any(|pattern| pattern.is_match(path))
}

/// Whether `path` registers a new account
pub fn is_sign_up_endpoint(path: &str) -> bool {
    SIGN_UP_PATTERNS.iter().any(|pattern| pattern.is_match(path))
}

/// A login operation found in the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEndpoint {
    pub path: String,
    pub method: HttpMethod,
}

/// First login-like POST operation in the document.
///
/// For each conventional login path, an exact path match is tried before any
/// documented path containing it.
pub fn find_auth_endpoint(doc: &ApiDescription) -> Option<AuthEndpoint> {
    LOGIN_PATHS.iter().find_map(|pattern| {
        if doc.has_operation(pattern, HttpMethod::Post) {
            return Some(pattern.to_string());
        }

        let needle = pattern.trim_start_matches('/');
        doc.paths()
            .find(|path| path.contains(needle) && doc.has_operation(path, HttpMethod::Post))
            .map(str::to_string)
    })
    .map(|path| AuthEndpoint {
        path,
        method: HttpMethod::Post,
    })
}
