//! # Provider Modules
//!
//! The remote identity API as seen by the reconciler.
//!
//! The API is split the way it is used:
//! - `ClientApi` for identity clients and their secrets
//! - `AccountApi` for accounts, roles, activation state and properties
//!
//! The REST transport in [`rest`] implements both; tests substitute in-memory
//! fakes. Every non-success status surfaces as [`RemoteError::Status`]; status
//! codes are not interpreted beyond success and failure.

use crate::model::{Account, AccountStatus, Client, EntityId, Property, Secret};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod rest;

/// A remote operation, used to label errors, spans and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    AcquireToken,
    CreateClient,
    UpdateClient,
    ReadClient,
    DeleteClient,
    CreateSecret,
    CreateAccount,
    FindAccount,
    SetRole,
    SetAccountState,
    PutProperty,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AcquireToken => "acquire_token",
            Self::CreateClient => "create_client",
            Self::UpdateClient => "update_client",
            Self::ReadClient => "read_client",
            Self::DeleteClient => "delete_client",
            Self::CreateSecret => "create_secret",
            Self::CreateAccount => "create_account",
            Self::FindAccount => "find_account",
            Self::SetRole => "set_role",
            Self::SetAccountState => "set_account_state",
            Self::PutProperty => "put_property",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("identity API returned status {status} during {operation}")]
    Status { operation: Operation, status: u16 },
    #[error("{operation} request failed: {source}")]
    Transport {
        operation: Operation,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected {operation} response: {message}")]
    InvalidResponse {
        operation: Operation,
        message: String,
    },
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

impl RemoteError {
    pub fn status(operation: Operation, status: u16) -> Self {
        Self::Status { operation, status }
    }

    pub fn invalid_response(operation: Operation, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            operation,
            message: message.into(),
        }
    }

    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::Status { operation, .. }
            | Self::Transport { operation, .. }
            | Self::InvalidResponse { operation, .. } => Some(*operation),
            Self::HttpClient(_) => None,
        }
    }

    /// HTTP status returned by the API, when the failure was a status
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Outcome of an account creation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountCreation {
    Created,
    /// An account with the same username already exists (possibly disabled)
    AlreadyExists,
}

/// Remote operations on identity clients
#[async_trait]
pub trait ClientApi: Send + Sync {
    /// Create a client from its top-level attributes; returns the snapshot with its id
    async fn create_client(&self, client: &Client) -> Result<Client, RemoteError>;

    /// Write a client and its child collections; returns the full snapshot
    async fn update_client(&self, client: &Client) -> Result<Client, RemoteError>;

    async fn read_client(&self, id: EntityId) -> Result<Client, RemoteError>;

    async fn delete_client(&self, id: EntityId) -> Result<(), RemoteError>;

    /// Generate one secret for a client; the value is produced server-side
    async fn create_secret(&self, client_id: EntityId) -> Result<Secret, RemoteError>;
}

/// Remote operations on identity accounts
#[async_trait]
pub trait AccountApi: Send + Sync {
    async fn create_account(&self, account: &Account) -> Result<AccountCreation, RemoteError>;

    /// Search accounts by term (username). Properties the API manages itself
    /// are not included in the returned accounts.
    async fn find_accounts(&self, term: &str) -> Result<Vec<Account>, RemoteError>;

    async fn set_role(&self, account_id: EntityId, role: &str) -> Result<(), RemoteError>;

    async fn set_account_state(
        &self,
        account_id: EntityId,
        status: AccountStatus,
    ) -> Result<(), RemoteError>;

    /// Create a property, or overwrite the value of an existing key
    async fn put_property(&self, property: &Property) -> Result<(), RemoteError>;
}
