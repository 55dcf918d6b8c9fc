//! Masking of credentials in request logs

use indexmap::IndexMap;
use serde_json::Value;

const MASK: &str = "********";

/// Body fields never written to logs in clear
const SENSITIVE_FIELDS: [&str; 6] = ["password", "secret", "token", "key", "apiKey", "api_key"];

/// Headers with any `Authorization` value reduced to its scheme
pub fn masked_headers(headers: &IndexMap<String, String>) -> IndexMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if name.eq_ignore_ascii_case("authorization") {
                mask_authorization(value).to_string()
            } else {
                value.clone()
            };
            (name.clone(), value)
        })
        .collect()
}

fn mask_authorization(value: &str) -> &'static str {
    if value.starts_with("Bearer ") {
        "Bearer [MASKED]"
    } else if value.starts_with("Basic ") {
        "Basic [MASKED]"
    } else {
        "[MASKED]"
    }
}

/// Copy of a JSON body with top-level credential fields masked
pub fn masked_body(body: &Value) -> Value {
    let mut body = body.clone();
    if let Value::Object(map) = &mut body {
        for field in SENSITIVE_FIELDS {
            if let Some(value) = map.get_mut(field) {
                *value = Value::String(MASK.to_string());
            }
        }
    }
    body
}
