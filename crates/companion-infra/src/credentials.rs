//! API key lookup.
//!
//! The key is only ever read from the environment variable named by
//! `provider.api_key_env`, and is kept in a [`SecretString`] from then on.

use secrecy::SecretString;

/// Read the API key from `var`.
///
/// Unset, blank, and non-Unicode values all count as "no credential".
pub fn api_key_from_env(var: &str) -> Option<SecretString> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Some(SecretString::from(value.trim().to_string())),
        Ok(_) => None,
        Err(std::env::VarError::NotPresent) => None,
        Err(std::env::VarError::NotUnicode(_)) => {
            tracing::warn!(var, "API key variable is not valid UTF-8; ignoring it");
            None
        }
    }
}
