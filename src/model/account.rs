//! Identity accounts and their properties.

use super::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Activation state of an account. Accounts are disabled, never destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AccountStatus {
    #[default]
    Enabled,
    Disabled,
}

impl AccountStatus {
    /// Path segment used by the state endpoint
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled => f.write_str("Enabled"),
            Self::Disabled => f.write_str("Disabled"),
        }
    }
}

/// A key/value property attached to an account
///
/// Properties are identified by their key. Changing a key creates a new
/// property; only the value of an existing key can change, and properties are
/// never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    #[serde(default)]
    pub account_id: EntityId,
    pub key: String,
    pub value: String,
}

impl Property {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            account_id: 0,
            key: key.into(),
            value: value.into(),
        }
    }
}

/// An identity account
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(default)]
    pub id: EntityId,
    #[serde(default)]
    pub global_id: String,
    /// The API takes a list; exactly one username is managed here
    pub usernames: Vec<String>,
    /// Write-only. Never read back from the API and never persisted in state.
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub status: AccountStatus,
    #[serde(default)]
    pub properties: Vec<Property>,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("global_id", &self.global_id)
            .field("usernames", &self.usernames)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .field("status", &self.status)
            .field("properties", &self.properties)
            .finish()
    }
}

impl Account {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            id: 0,
            global_id: String::new(),
            usernames: vec![username.into()],
            password: password.into(),
            role: String::new(),
            status: AccountStatus::Enabled,
            properties: Vec::new(),
        }
    }

    /// The managed username, empty when none is declared
    pub fn username(&self) -> &str {
        self.usernames.first().map_or("", String::as_str)
    }

    pub fn property(&self, key: &str) -> Option<&Property> {
        self.properties.iter().find(|property| property.key == key)
    }

    /// Stamp the owning account id on every property
    pub fn assign_owner(&mut self, owner: EntityId) {
        self.id = owner;
        for property in &mut self.properties {
            property.account_id = owner;
        }
    }

    /// Sort properties by key
    pub fn sort_properties(&mut self) {
        self.properties.sort_by(|a, b| a.key.cmp(&b.key));
    }
}
