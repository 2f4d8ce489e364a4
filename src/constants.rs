//! # Constants
//!
//! Shared constants used throughout the reconciler.
//!
//! These values mirror what the identity API expects and can be overridden via
//! configuration or environment variables where applicable.

/// Default OAuth scopes requested when exchanging client credentials
pub const DEFAULT_TOKEN_SCOPE: &str = "identity-api identity-api-privileged";

/// Token endpoint path, relative to the token server URL
pub const TOKEN_ENDPOINT_PATH: &str = "connect/token";

/// Default per-request timeout for the identity API (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Grant type assigned to clients that do not declare one
pub const DEFAULT_CLIENT_GRANTS: &str = "client_credentials";

// The API rejects client writes without these lifetimes, so every client
// carries them even though nothing in a declaration sets them.

/// Default consent lifetime
pub const DEFAULT_CONSENT_LIFETIME: &str = "30d";
/// Default identity token lifetime
pub const DEFAULT_IDENTITY_TOKEN_LIFETIME: &str = "5m";
/// Default access token lifetime
pub const DEFAULT_ACCESS_TOKEN_LIFETIME: &str = "1h";
/// Default authorization code lifetime
pub const DEFAULT_AUTHORIZATION_CODE_LIFETIME: &str = "5m";
/// Default sliding refresh token lifetime
pub const DEFAULT_SLIDING_REFRESH_TOKEN_LIFETIME: &str = "15d";
/// Default absolute refresh token lifetime
pub const DEFAULT_ABSOLUTE_REFRESH_TOKEN_LIFETIME: &str = "30d";

/// Number of leading account properties the API creates and manages itself
/// (the third one holds the account's username)
pub const SYSTEM_PROPERTY_COUNT: usize = 3;

/// Index of the username among the system-managed account properties
pub const USERNAME_PROPERTY_INDEX: usize = 2;

/// Message the API returns when an account with the same username exists
pub const ACCOUNT_NOT_UNIQUE_MESSAGE: &str = "AccountNotUnique";

/// Default tracing filter for the `identity-sync` binary
pub const DEFAULT_LOG_FILTER: &str = "identity_reconciler=info,identity_sync=info";
