//! # Identity API Configuration
//!
//! Connection settings for the identity API, loaded from environment variables.

use crate::constants::{DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TOKEN_SCOPE};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required setting {0} is not set")]
    Missing(&'static str),
    #[error("{name} must be an http(s) URL, got '{value}'")]
    InvalidUrl { name: &'static str, value: String },
    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
}

/// Identity API connection settings
///
/// Required values have no default; `validate` reports the first one missing.
#[derive(Clone, Default)]
pub struct IdentityConfig {
    /// Base URL of the identity API (e.g. `https://id.example.com/api/`)
    pub api_url: String,
    /// Base URL of the token server; the token endpoint is resolved under it
    pub token_url: String,
    /// OAuth client id used for the client-credentials exchange
    pub client_id: String,
    /// OAuth client secret used for the client-credentials exchange
    pub client_secret: String,
    /// Space-separated scopes requested with the token
    pub token_scope: String,
    /// Per-request timeout (seconds)
    pub request_timeout_secs: u64,
    /// Pre-issued bearer token. Skips the token exchange when set
    pub static_token: Option<String>,
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("api_url", &self.api_url)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("token_scope", &self.token_scope)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("static_token", &self.static_token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl IdentityConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            api_url: env_var_or_default_str("IDENTITY_API_URL", ""),
            token_url: env_var_or_default_str("IDENTITY_TOKEN_URL", ""),
            client_id: env_var_or_default_str("IDENTITY_CLIENT_ID", ""),
            client_secret: env_var_or_default_str("IDENTITY_CLIENT_SECRET", ""),
            token_scope: env_var_or_default_str("IDENTITY_TOKEN_SCOPE", DEFAULT_TOKEN_SCOPE),
            request_timeout_secs: env_var_or_default(
                "IDENTITY_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            ),
            static_token: std::env::var("IDENTITY_STATIC_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty()),
        }
    }

    /// Check that every required setting is present
    ///
    /// Token server settings are only required when no static token is configured.
    ///
    /// # Errors
    /// Returns the first missing or malformed setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_url("IDENTITY_API_URL", &self.api_url)?;
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::NotPositive("IDENTITY_REQUEST_TIMEOUT_SECS"));
        }
        if self.static_token.is_some() {
            return Ok(());
        }
        require_url("IDENTITY_TOKEN_URL", &self.token_url)?;
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::Missing("IDENTITY_CLIENT_ID"));
        }
        if self.client_secret.trim().is_empty() {
            return Err(ConfigError::Missing("IDENTITY_CLIENT_SECRET"));
        }
        Ok(())
    }

    /// Get the per-request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn require_url(name: &'static str, value: &str) -> Result<(), ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Missing(name));
    }
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(ConfigError::InvalidUrl {
            name,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> IdentityConfig {
        IdentityConfig {
            api_url: "https://id.example.com/api/".to_string(),
            token_url: "https://id.example.com".to_string(),
            client_id: "reconciler".to_string(),
            client_secret: "hunter2".to_string(),
            token_scope: DEFAULT_TOKEN_SCOPE.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            static_token: None,
        }
    }

    #[test]
    fn test_complete_config_is_valid() {
        assert_eq!(complete().validate(), Ok(()));
    }

    #[test]
    fn test_missing_api_url_is_reported_first() {
        let config = IdentityConfig {
            api_url: String::new(),
            client_secret: String::new(),
            ..complete()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::Missing("IDENTITY_API_URL"))
        );
    }

    #[test]
    fn test_missing_client_secret() {
        let config = IdentityConfig {
            client_secret: "  ".to_string(),
            ..complete()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::Missing("IDENTITY_CLIENT_SECRET"))
        );
    }

    #[test]
    fn test_static_token_skips_token_server_settings() {
        let config = IdentityConfig {
            token_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            static_token: Some("test-token".to_string()),
            ..complete()
        };
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_api_url_must_be_http() {
        let config = IdentityConfig {
            api_url: "id.example.com".to_string(),
            ..complete()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUrl {
                name: "IDENTITY_API_URL",
                ..
            })
        ));
    }

    #[test]
    fn test_zero_request_timeout_is_rejected() {
        let config = IdentityConfig {
            request_timeout_secs: 0,
            static_token: Some("test-token".to_string()),
            ..complete()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::NotPositive("IDENTITY_REQUEST_TIMEOUT_SECS"))
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = IdentityConfig {
            static_token: Some("very-secret-token".to_string()),
            ..complete()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("very-secret-token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_request_timeout_duration() {
        assert_eq!(complete().request_timeout(), Duration::from_secs(30));
    }
}
