//! # Declarations and State Files
//!
//! The `identity-sync` binary reads the desired state from a YAML declaration
//! file and keeps the reconciled state in a JSON state file. The state file
//! is the `previous` of the next run, so it is rewritten after every entity
//! that was touched, including entities that stopped part way.
//!
//! Declarations carry no ids. Merging a declaration with the previously
//! reconciled entity carries ids over by value:
//!
//! - URLs match on type and value, claims on value
//! - secrets are declared as a count; the oldest existing secrets are kept and
//!   pending ones are added for the remainder
//!
//! Secret values returned at creation are only ever available from the state
//! file. Account passwords are never written to it.

use crate::model::{
    Account, AccountStatus, ChildItem, Claim, Client, ClientUrl, Property, Secret, TokenLifetimes,
    UrlKind,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Desired state as declared by an operator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Declarations {
    pub clients: Vec<ClientDeclaration>,
    pub accounts: Vec<AccountDeclaration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ClientDeclaration {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub scopes: String,
    #[serde(default)]
    pub grants: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub lifetimes: Option<TokenLifetimes>,
    #[serde(default)]
    pub redirect_urls: Vec<String>,
    #[serde(default)]
    pub cors_urls: Vec<String>,
    #[serde(default)]
    pub post_logout_urls: Vec<String>,
    #[serde(default)]
    pub claims: Vec<String>,
    /// Number of secrets the client should have
    #[serde(default)]
    pub secrets: usize,
}

impl ClientDeclaration {
    fn urls_of(&self, kind: UrlKind) -> &[String] {
        match kind {
            UrlKind::Redirect => &self.redirect_urls,
            UrlKind::Cors => &self.cors_urls,
            UrlKind::PostLogout => &self.post_logout_urls,
        }
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AccountDeclaration {
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub properties: Vec<PropertyDeclaration>,
}

impl std::fmt::Debug for AccountDeclaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountDeclaration")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .field("properties", &self.properties)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyDeclaration {
    pub key: String,
    pub value: String,
}

fn default_enabled() -> bool {
    true
}

/// Reconciled entities as last written to the remote system
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciledState {
    pub clients: Vec<Client>,
    pub accounts: Vec<Account>,
}

impl ReconciledState {
    /// Load a state file; a missing file is an empty state
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file {}", path.display()))
    }

    /// # Errors
    /// Returns an error if the state cannot be serialized or written
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize state")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write state file {}", path.display()))
    }

    pub fn client(&self, name: &str) -> Option<&Client> {
        self.clients.iter().find(|client| client.name == name)
    }

    pub fn account(&self, username: &str) -> Option<&Account> {
        self.accounts
            .iter()
            .find(|account| account.username() == username)
    }

    /// Insert or replace a client, keyed by name
    pub fn upsert_client(&mut self, client: Client) {
        match self.clients.iter_mut().find(|c| c.name == client.name) {
            Some(existing) => *existing = client,
            None => self.clients.push(client),
        }
    }

    /// Insert or replace an account, keyed by username
    pub fn upsert_account(&mut self, account: Account) {
        match self
            .accounts
            .iter_mut()
            .find(|a| a.username() == account.username())
        {
            Some(existing) => *existing = account,
            None => self.accounts.push(account),
        }
    }

    pub fn remove_client(&mut self, name: &str) {
        self.clients.retain(|client| client.name != name);
    }

    pub fn remove_account(&mut self, username: &str) {
        self.accounts.retain(|account| account.username() != username);
    }
}

/// Load a YAML declaration file
///
/// # Errors
/// Returns an error if the file cannot be read or is not a valid declaration
pub fn load_declarations(path: &Path) -> Result<Declarations> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read declaration file {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse declaration file {}", path.display()))
}

/// Build the desired client from its declaration and the previously
/// reconciled client, carrying ids over by value
pub fn merge_client(declaration: &ClientDeclaration, previous: Option<&Client>) -> Client {
    let mut client = Client::new(&declaration.name, &declaration.scopes);
    if let Some(display_name) = &declaration.display_name {
        client.display_name.clone_from(display_name);
    }
    if let Some(grants) = &declaration.grants {
        client.grants.clone_from(grants);
    }
    client.enabled = declaration.enabled;
    if let Some(lifetimes) = &declaration.lifetimes {
        client.lifetimes = lifetimes.clone();
    }

    for kind in UrlKind::ALL {
        let known = previous.map_or(&[][..], |previous| previous.urls_of(kind));
        *client.urls_of_mut(kind) = declaration
            .urls_of(kind)
            .iter()
            .map(|value| ClientUrl::with_id(existing_id(known, value), kind, value))
            .collect();
    }

    let known_claims = previous.map_or(&[][..], |previous| previous.claims.as_slice());
    client.claims = declaration
        .claims
        .iter()
        .map(|value| Claim::with_id(existing_id(known_claims, value), value))
        .collect();

    client.secrets = previous
        .map(|previous| {
            let mut live: Vec<Secret> = previous
                .secrets
                .iter()
                .filter(|secret| secret.is_live() && !secret.is_pending())
                .cloned()
                .collect();
            live.sort_by_key(|secret| secret.id);
            live
        })
        .unwrap_or_default();
    client.secrets.truncate(declaration.secrets);
    client
        .secrets
        .resize_with(declaration.secrets, Secret::pending);

    if let Some(previous) = previous {
        client.assign_owner(previous.id);
    }
    client
}

/// Build the desired account from its declaration and the previously
/// reconciled account
pub fn merge_account(declaration: &AccountDeclaration, previous: Option<&Account>) -> Account {
    let mut account = Account::new(&declaration.username, &declaration.password);
    account.role.clone_from(&declaration.role);
    account.status = AccountStatus::Enabled;
    account.properties = declaration
        .properties
        .iter()
        .map(|property| Property::new(&property.key, &property.value))
        .collect();
    if let Some(previous) = previous {
        account.global_id.clone_from(&previous.global_id);
        account.assign_owner(previous.id);
    }
    account
}

/// Id of the live item holding `value`, or unassigned
fn existing_id<T: ChildItem>(known: &[T], value: &str) -> u64 {
    known
        .iter()
        .find(|item| item.is_live() && item.key() == value)
        .map_or(0, ChildItem::id)
}
