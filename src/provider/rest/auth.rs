//! Client-credentials token exchange against the identity token server.

use crate::config::IdentityConfig;
use crate::constants::TOKEN_ENDPOINT_PATH;
use crate::observability::metrics;
use crate::provider::{Operation, RemoteError};
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, info_span, warn, Instrument};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Token endpoint on the token server named by `token_url`
///
/// Any path on the configured URL is replaced, not extended.
pub(crate) fn token_endpoint(token_url: &str) -> String {
    match Url::parse(token_url) {
        Ok(mut url) => {
            url.set_path(TOKEN_ENDPOINT_PATH);
            url.to_string()
        }
        Err(_) => format!("{}/{TOKEN_ENDPOINT_PATH}", token_url.trim_end_matches('/')),
    }
}

/// Exchange the configured client credentials for a bearer token
///
/// # Errors
/// Returns `Status` for a rejected exchange and `InvalidResponse` when the
/// body carries no token.
pub async fn acquire_token(
    http_client: &Client,
    config: &IdentityConfig,
) -> Result<String, RemoteError> {
    let operation = Operation::AcquireToken;
    let url = token_endpoint(&config.token_url);
    let span = info_span!(
        "identity.token.acquire",
        token.url = %url,
        oauth.client_id = %config.client_id
    );

    async move {
        let start = Instant::now();
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("scope", config.token_scope.as_str()),
        ];
        let response = http_client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|source| {
                metrics::increment_api_operation_errors(operation.as_str());
                RemoteError::Transport { operation, source }
            })?;
        metrics::record_api_operation(operation.as_str(), start.elapsed().as_secs_f64());

        let status = response.status();
        if !status.is_success() {
            metrics::increment_api_operation_errors(operation.as_str());
            warn!(status = status.as_u16(), "Token server rejected the client credentials");
            return Err(RemoteError::status(operation, status.as_u16()));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::invalid_response(operation, e.to_string()))?;
        if token.access_token.is_empty() {
            return Err(RemoteError::invalid_response(operation, "empty access token"));
        }
        debug!(expires_in = ?token.expires_in, "Acquired identity API access token");
        Ok(token.access_token)
    }
    .instrument(span)
    .await
}
