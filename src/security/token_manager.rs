//! Registry token handling with masking
//!
//! Tokens are read once when the registry is constructed and kept as
//! [`SecretString`] so they never show up in `Debug` output or logs.

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;

/// Registry token and the environment variable it came from
///
/// # Examples
///
/// ```
/// use release_publisher::security::SecureTokenManager;
/// use secrecy::SecretString;
///
/// let manager = SecureTokenManager::with_token(
///     "CARGO_REGISTRY_TOKEN",
///     SecretString::from("cio-0123456789abcdef"),
/// );
/// assert!(manager.has_token());
/// assert_eq!(manager.mask("auth cio-0123456789abcdef"), "auth cio...def");
/// ```
#[derive(Debug, Clone)]
pub struct SecureTokenManager {
    token_env: String,
    token: Option<SecretString>,
}

impl SecureTokenManager {
    /// Read the token from an explicit environment map
    pub fn from_map(token_env: &str, vars: &HashMap<String, String>) -> Self {
        let token = vars
            .get(token_env)
            .filter(|v| !v.is_empty())
            .map(|v| SecretString::from(v.as_str()));

        Self {
            token_env: token_env.to_string(),
            token,
        }
    }

    pub fn with_token(token_env: &str, token: SecretString) -> Self {
        Self {
            token_env: token_env.to_string(),
            token: Some(token),
        }
    }

    pub fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Environment variable the token was looked up under
    pub fn token_env(&self) -> &str {
        &self.token_env
    }

    /// Masks a token for safe logging
    ///
    /// Shows only the first 3 and last 3 characters.
    /// Tokens shorter than 10 characters are fully masked as "****".
    pub fn mask_token(token: &str) -> String {
        let chars: Vec<char> = token.chars().collect();
        if chars.len() < 10 {
            return "****".to_string();
        }

        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 3..].iter().collect();
        format!("{}...{}", prefix, suffix)
    }

    /// Replace every occurrence of the held token in `text`
    pub fn mask(&self, text: &str) -> String {
        let Some(token) = &self.token else {
            return text.to_string();
        };

        let token_str = token.expose_secret();
        match Regex::new(&regex::escape(token_str)) {
            Ok(regex) => regex
                .replace_all(text, Self::mask_token(token_str).as_str())
                .into_owned(),
            Err(_) => text.to_string(),
        }
    }
}
