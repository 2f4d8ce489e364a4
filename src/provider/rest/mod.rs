//! Identity API REST Client
//!
//! REST implementation of [`ClientApi`] and [`AccountApi`] over `reqwest`.
//!
//! This implementation:
//! - Authenticates with a bearer token from the client-credentials exchange,
//!   or a static token (mock servers, local testing)
//! - Treats every non-success status as [`RemoteError::Status`]
//! - Records one span and one duration sample per API call
//!
//! Paths are resolved under the configured API base URL, e.g. `client`,
//! `client/{id}/secret`, `account/{id}/role/{role}`.

pub mod auth;

use super::{AccountApi, AccountCreation, ClientApi, Operation, RemoteError};
use crate::config::IdentityConfig;
use crate::constants::{
    ACCOUNT_NOT_UNIQUE_MESSAGE, DEFAULT_REQUEST_TIMEOUT_SECS, SYSTEM_PROPERTY_COUNT,
    USERNAME_PROPERTY_INDEX,
};
use crate::model::{Account, AccountStatus, Client, EntityId, Property, Secret};
use crate::observability::metrics;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn, Instrument};

/// Identity API REST client
pub struct IdentityApiRest {
    http_client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl std::fmt::Debug for IdentityApiRest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityApiRest")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Wire structures that differ from the model
// ============================================================================

/// Body of `POST account`. Unlike the model, it carries the password.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateAccountRequest<'a> {
    usernames: &'a [String],
    password: &'a str,
    role: &'a str,
    status: AccountStatus,
}

/// One entry of the `POST account` response array
#[derive(Debug, Deserialize)]
struct AccountCreationMessage {
    #[serde(default)]
    message: Option<String>,
}

/// Account as returned by `GET accounts?Term=`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountRecord {
    id: EntityId,
    #[serde(default)]
    global_id: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    properties: Vec<Property>,
}

impl AccountRecord {
    /// The API manages the first properties itself; the third holds the username
    fn into_account(self) -> Account {
        let username = self
            .properties
            .get(USERNAME_PROPERTY_INDEX)
            .map(|property| property.value.clone())
            .unwrap_or_default();
        let status = if self.status == "Enabled" {
            AccountStatus::Enabled
        } else {
            AccountStatus::Disabled
        };
        Account {
            id: self.id,
            global_id: self.global_id,
            usernames: vec![username],
            password: String::new(),
            role: self.role,
            status,
            properties: self.properties.into_iter().skip(SYSTEM_PROPERTY_COUNT).collect(),
        }
    }
}

impl IdentityApiRest {
    /// Create a client for the configured API, acquiring a token unless a
    /// static one is configured
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built or the token
    /// exchange fails
    pub async fn connect(config: &IdentityConfig) -> Result<Self, RemoteError> {
        let http_client = build_http_client(config.request_timeout())?;

        let access_token = if let Some(token) = &config.static_token {
            debug!("Using static bearer token");
            token.clone()
        } else {
            auth::acquire_token(&http_client, config).await?
        };

        info!(api.url = %config.api_url, "Initialized identity API REST client");
        Ok(Self {
            http_client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            access_token,
        })
    }

    /// Create a client with a known bearer token and the default timeout
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn with_token(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self, RemoteError> {
        Ok(Self {
            http_client: build_http_client(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        })
    }

    /// Build HTTP request with authentication headers
    fn make_request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        self.http_client
            .request(method, url)
            .bearer_auth(&self.access_token)
    }

    /// Send a request and fail on any non-success status
    async fn execute(
        &self,
        operation: Operation,
        request: RequestBuilder,
    ) -> Result<Response, RemoteError> {
        let start = Instant::now();
        let response = request.send().await.map_err(|source| {
            metrics::increment_api_operation_errors(operation.as_str());
            RemoteError::Transport { operation, source }
        })?;
        metrics::record_api_operation(operation.as_str(), start.elapsed().as_secs_f64());

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        metrics::increment_api_operation_errors(operation.as_str());
        let body = response.text().await.unwrap_or_default();
        warn!(%operation, status = status.as_u16(), "Identity API request failed");
        debug!(%operation, body = %body, "Identity API error response");
        Err(RemoteError::status(operation, status.as_u16()))
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        operation: Operation,
        request: RequestBuilder,
    ) -> Result<T, RemoteError> {
        self.execute(operation, request)
            .await?
            .json()
            .await
            .map_err(|e| RemoteError::invalid_response(operation, e.to_string()))
    }
}

fn build_http_client(timeout: Duration) -> Result<reqwest::Client, RemoteError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(RemoteError::HttpClient)
}

#[async_trait]
impl ClientApi for IdentityApiRest {
    async fn create_client(&self, client: &Client) -> Result<Client, RemoteError> {
        let span = info_span!("identity.client.create", client.name = %client.name);
        async move {
            let body = client.without_children();
            let created: Client = self
                .execute_json(
                    Operation::CreateClient,
                    self.make_request(Method::POST, "client").json(&body),
                )
                .await?;
            info!(client.id = created.id, "Created identity client");
            Ok(created)
        }
        .instrument(span)
        .await
    }

    async fn update_client(&self, client: &Client) -> Result<Client, RemoteError> {
        let span = info_span!("identity.client.update", client.id = client.id);
        async move {
            self.execute_json(
                Operation::UpdateClient,
                self.make_request(Method::PUT, "client").json(client),
            )
            .await
        }
        .instrument(span)
        .await
    }

    async fn read_client(&self, id: EntityId) -> Result<Client, RemoteError> {
        let span = info_span!("identity.client.read", client.id = id);
        async move {
            self.execute_json(
                Operation::ReadClient,
                self.make_request(Method::GET, &format!("client/{id}")),
            )
            .await
        }
        .instrument(span)
        .await
    }

    async fn delete_client(&self, id: EntityId) -> Result<(), RemoteError> {
        let span = info_span!("identity.client.delete", client.id = id);
        async move {
            self.execute(
                Operation::DeleteClient,
                self.make_request(Method::DELETE, &format!("client/{id}")),
            )
            .await?;
            info!("Deleted identity client");
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn create_secret(&self, client_id: EntityId) -> Result<Secret, RemoteError> {
        let span = info_span!("identity.secret.create", client.id = client_id);
        async move {
            let secret: Secret = self
                .execute_json(
                    Operation::CreateSecret,
                    self.make_request(Method::PUT, &format!("client/{client_id}/secret")),
                )
                .await?;
            if secret.id == 0 {
                return Err(RemoteError::invalid_response(
                    Operation::CreateSecret,
                    "created secret has no id",
                ));
            }
            debug!(secret.id = secret.id, "Created client secret");
            Ok(secret)
        }
        .instrument(span)
        .await
    }
}

#[async_trait]
impl AccountApi for IdentityApiRest {
    async fn create_account(&self, account: &Account) -> Result<AccountCreation, RemoteError> {
        let span = info_span!("identity.account.create", account.username = %account.username());
        async move {
            let body = CreateAccountRequest {
                usernames: &account.usernames,
                password: &account.password,
                role: &account.role,
                status: AccountStatus::Enabled,
            };
            let response = self
                .execute(
                    Operation::CreateAccount,
                    self.make_request(Method::POST, "account").json(&body),
                )
                .await?;
            let text = response.text().await.map_err(|source| RemoteError::Transport {
                operation: Operation::CreateAccount,
                source,
            })?;
            if text.trim().is_empty() {
                return Ok(AccountCreation::Created);
            }

            let messages: Vec<AccountCreationMessage> =
                serde_json::from_str(&text).map_err(|e| {
                    RemoteError::invalid_response(Operation::CreateAccount, e.to_string())
                })?;
            if messages
                .iter()
                .any(|entry| entry.message.as_deref() == Some(ACCOUNT_NOT_UNIQUE_MESSAGE))
            {
                info!("Account already exists");
                Ok(AccountCreation::AlreadyExists)
            } else {
                Ok(AccountCreation::Created)
            }
        }
        .instrument(span)
        .await
    }

    async fn find_accounts(&self, term: &str) -> Result<Vec<Account>, RemoteError> {
        let span = tracing::debug_span!("identity.account.find", account.term = %term);
        async move {
            let records: Vec<AccountRecord> = self
                .execute_json(
                    Operation::FindAccount,
                    self.make_request(Method::GET, "accounts")
                        .query(&[("Term", term)]),
                )
                .await?;
            Ok(records.into_iter().map(AccountRecord::into_account).collect())
        }
        .instrument(span)
        .await
    }

    async fn set_role(&self, account_id: EntityId, role: &str) -> Result<(), RemoteError> {
        let span = info_span!("identity.account.set_role", account.id = account_id, role = %role);
        async move {
            self.execute(
                Operation::SetRole,
                self.make_request(Method::PUT, &format!("account/{account_id}/role/{role}")),
            )
            .await?;
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn set_account_state(
        &self,
        account_id: EntityId,
        status: AccountStatus,
    ) -> Result<(), RemoteError> {
        let span = info_span!("identity.account.set_state", account.id = account_id, %status);
        async move {
            self.execute(
                Operation::SetAccountState,
                self.make_request(
                    Method::PUT,
                    &format!("account/{account_id}/state/{}", status.path_segment()),
                ),
            )
            .await?;
            info!("Account state changed");
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn put_property(&self, property: &Property) -> Result<(), RemoteError> {
        let span = info_span!(
            "identity.account.put_property",
            account.id = property.account_id,
            property.key = %property.key
        );
        async move {
            self.execute(
                Operation::PutProperty,
                self.make_request(Method::PUT, "account/property").json(property),
            )
            .await?;
            Ok(())
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_account_record_strips_system_properties() {
        let record: AccountRecord = serde_json::from_value(json!({
            "id": 41,
            "globalId": "2f1c",
            "role": "User",
            "status": "Enabled",
            "properties": [
                {"accountId": 41, "key": "tag", "value": "x"},
                {"accountId": 41, "key": "name", "value": "Ada"},
                {"accountId": 41, "key": "email", "value": "ada@example.com"},
                {"accountId": 41, "key": "team", "value": "red"}
            ]
        }))
        .unwrap();

        let account = record.into_account();
        assert_eq!(account.username(), "ada@example.com");
        assert_eq!(account.status, AccountStatus::Enabled);
        assert_eq!(account.properties, vec![Property {
            account_id: 41,
            ..Property::new("team", "red")
        }]);
    }

    #[test]
    fn test_account_record_unknown_status_is_disabled() {
        let record: AccountRecord =
            serde_json::from_value(json!({"id": 1, "status": "Pending"})).unwrap();
        let account = record.into_account();
        assert_eq!(account.status, AccountStatus::Disabled);
        assert_eq!(account.username(), "");
    }

    #[test]
    fn test_create_account_body_carries_password() {
        let account = Account::new("ada@example.com", "pw");
        let body = CreateAccountRequest {
            usernames: &account.usernames,
            password: &account.password,
            role: &account.role,
            status: AccountStatus::Enabled,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["password"], json!("pw"));
        assert_eq!(value["usernames"], json!(["ada@example.com"]));
    }

    #[test]
    fn test_debug_hides_token() {
        let _ = rustls::crypto::ring::default_provider().install_default();
        let api =
            IdentityApiRest::with_token("http://localhost:1234/api/", "secret-token").unwrap();
        let rendered = format!("{api:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("http://localhost:1234/api"));
    }
}
