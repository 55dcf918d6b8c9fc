//! Credential strings that are wiped from memory on drop

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// API key or password held for the lifetime of the process
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: String) -> Self {
        Self(value)
    }

    /// Clear text; callers must not log it
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_never_shows_value() {
        let secret = SecretString::from("hunter2".to_string());
        assert_eq!(secret.expose(), "hunter2");

        let debug = format!("{:?}", secret.clone());
        assert_eq!(debug, "SecretString([REDACTED])");
    }
}
