//! Identity clients and their child collections.

use super::{mask_value, sort_items, ChildItem, Collection, EntityId, ItemId, UNASSIGNED};
use crate::constants::{
    DEFAULT_ABSOLUTE_REFRESH_TOKEN_LIFETIME, DEFAULT_ACCESS_TOKEN_LIFETIME,
    DEFAULT_AUTHORIZATION_CODE_LIFETIME, DEFAULT_CLIENT_GRANTS, DEFAULT_CONSENT_LIFETIME,
    DEFAULT_IDENTITY_TOKEN_LIFETIME, DEFAULT_SLIDING_REFRESH_TOKEN_LIFETIME,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// URL subtype. Partitions the unified URL collection into the three client
/// URL collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UrlKind {
    #[serde(rename = "redirectUri")]
    Redirect,
    #[serde(rename = "corsUri")]
    Cors,
    #[serde(rename = "postLogoutRedirectUri")]
    PostLogout,
}

impl UrlKind {
    pub const ALL: [UrlKind; 3] = [UrlKind::Redirect, UrlKind::Cors, UrlKind::PostLogout];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Redirect => "redirectUri",
            Self::Cors => "corsUri",
            Self::PostLogout => "postLogoutRedirectUri",
        }
    }

    pub fn collection(self) -> Collection {
        match self {
            Self::Redirect => Collection::RedirectUrls,
            Self::Cors => Collection::CorsUrls,
            Self::PostLogout => Collection::PostLogoutUrls,
        }
    }
}

impl fmt::Display for UrlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UrlKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("invalid url type '{s}'"))
    }
}

/// A redirect, CORS or post-logout URL of a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientUrl {
    #[serde(default)]
    pub id: ItemId,
    #[serde(rename = "type")]
    pub kind: UrlKind,
    pub value: String,
    #[serde(default)]
    pub client_id: EntityId,
    #[serde(default)]
    pub deleted: bool,
}

impl ClientUrl {
    pub fn new(kind: UrlKind, value: impl Into<String>) -> Self {
        Self::with_id(UNASSIGNED, kind, value)
    }

    pub fn with_id(id: ItemId, kind: UrlKind, value: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            value: value.into(),
            client_id: 0,
            deleted: false,
        }
    }
}

impl ChildItem for ClientUrl {
    fn id(&self) -> ItemId {
        self.id
    }
    fn set_id(&mut self, id: ItemId) {
        self.id = id;
    }
    fn key(&self) -> &str {
        &self.value
    }
    fn is_deleted(&self) -> bool {
        self.deleted
    }
    fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }
    fn set_owner(&mut self, owner: EntityId) {
        self.client_id = owner;
    }
}

/// A claim granted to a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    #[serde(default)]
    pub id: ItemId,
    pub value: String,
    #[serde(default)]
    pub client_id: EntityId,
    #[serde(default)]
    pub deleted: bool,
}

impl Claim {
    pub fn new(value: impl Into<String>) -> Self {
        Self::with_id(UNASSIGNED, value)
    }

    pub fn with_id(id: ItemId, value: impl Into<String>) -> Self {
        Self {
            id,
            value: value.into(),
            client_id: 0,
            deleted: false,
        }
    }
}

impl ChildItem for Claim {
    fn id(&self) -> ItemId {
        self.id
    }
    fn set_id(&mut self, id: ItemId) {
        self.id = id;
    }
    fn key(&self) -> &str {
        &self.value
    }
    fn is_deleted(&self) -> bool {
        self.deleted
    }
    fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }
    fn set_owner(&mut self, owner: EntityId) {
        self.client_id = owner;
    }
}

/// A client secret
///
/// The value is generated by the remote system when the secret is created and
/// is write-once: it is never sent on creation and never resent afterwards.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    #[serde(default)]
    pub id: ItemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

impl Secret {
    /// A secret that has not been created yet
    pub fn pending() -> Self {
        Self::default()
    }

    /// Reference to an existing secret, without its value
    pub fn reference(id: ItemId, deleted: bool) -> Self {
        Self {
            id,
            value: None,
            deleted,
        }
    }

    /// Copy of this secret safe to put in a write payload
    pub fn redacted(&self) -> Self {
        Self::reference(self.id, self.deleted)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("id", &self.id)
            .field("value", &self.value.as_deref().map(mask_value))
            .field("deleted", &self.deleted)
            .finish()
    }
}

impl ChildItem for Secret {
    fn id(&self) -> ItemId {
        self.id
    }
    fn set_id(&mut self, id: ItemId) {
        self.id = id;
    }
    fn key(&self) -> &str {
        self.value.as_deref().unwrap_or_default()
    }
    fn is_deleted(&self) -> bool {
        self.deleted
    }
    fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }
    fn set_owner(&mut self, _owner: EntityId) {}
}

/// Token lifetimes the identity API requires on every client write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TokenLifetimes {
    pub consent_lifetime: String,
    pub identity_token_lifetime: String,
    pub access_token_lifetime: String,
    pub authorization_code_lifetime: String,
    pub sliding_refresh_token_lifetime: String,
    pub absolute_refresh_token_lifetime: String,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            consent_lifetime: DEFAULT_CONSENT_LIFETIME.to_string(),
            identity_token_lifetime: DEFAULT_IDENTITY_TOKEN_LIFETIME.to_string(),
            access_token_lifetime: DEFAULT_ACCESS_TOKEN_LIFETIME.to_string(),
            authorization_code_lifetime: DEFAULT_AUTHORIZATION_CODE_LIFETIME.to_string(),
            sliding_refresh_token_lifetime: DEFAULT_SLIDING_REFRESH_TOKEN_LIFETIME.to_string(),
            absolute_refresh_token_lifetime: DEFAULT_ABSOLUTE_REFRESH_TOKEN_LIFETIME.to_string(),
        }
    }
}

fn default_grants() -> String {
    DEFAULT_CLIENT_GRANTS.to_string()
}

fn default_enabled() -> bool {
    true
}

/// An identity client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    #[serde(default)]
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    pub scopes: String,
    #[serde(default = "default_grants")]
    pub grants: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(flatten)]
    pub lifetimes: TokenLifetimes,
    #[serde(default)]
    pub redirect_urls: Vec<ClientUrl>,
    #[serde(default)]
    pub cors_urls: Vec<ClientUrl>,
    #[serde(default)]
    pub post_logout_urls: Vec<ClientUrl>,
    #[serde(default)]
    pub claims: Vec<Claim>,
    #[serde(default)]
    pub secrets: Vec<Secret>,
    // Always empty, but the API answers 400 when the field is missing.
    #[serde(default)]
    pub managers: Vec<serde_json::Value>,
}

impl Client {
    pub fn new(name: impl Into<String>, scopes: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: 0,
            display_name: name.clone(),
            name,
            scopes: scopes.into(),
            grants: default_grants(),
            enabled: true,
            lifetimes: TokenLifetimes::default(),
            redirect_urls: Vec::new(),
            cors_urls: Vec::new(),
            post_logout_urls: Vec::new(),
            claims: Vec::new(),
            secrets: Vec::new(),
            managers: Vec::new(),
        }
    }

    /// Copy of the top-level attributes with every child collection emptied
    pub fn without_children(&self) -> Self {
        Self {
            redirect_urls: Vec::new(),
            cors_urls: Vec::new(),
            post_logout_urls: Vec::new(),
            claims: Vec::new(),
            secrets: Vec::new(),
            managers: Vec::new(),
            ..self.clone()
        }
    }

    pub fn urls_of(&self, kind: UrlKind) -> &[ClientUrl] {
        match kind {
            UrlKind::Redirect => &self.redirect_urls,
            UrlKind::Cors => &self.cors_urls,
            UrlKind::PostLogout => &self.post_logout_urls,
        }
    }

    pub fn urls_of_mut(&mut self, kind: UrlKind) -> &mut Vec<ClientUrl> {
        match kind {
            UrlKind::Redirect => &mut self.redirect_urls,
            UrlKind::Cors => &mut self.cors_urls,
            UrlKind::PostLogout => &mut self.post_logout_urls,
        }
    }

    /// The unified URL collection: redirect, then CORS, then post-logout
    pub fn urls(&self) -> Vec<ClientUrl> {
        UrlKind::ALL
            .into_iter()
            .flat_map(|kind| self.urls_of(kind).iter().cloned())
            .collect()
    }

    /// Replace the three URL collections by partitioning `urls` on their type
    pub fn set_urls(&mut self, urls: Vec<ClientUrl>) {
        for kind in UrlKind::ALL {
            self.urls_of_mut(kind).clear();
        }
        for url in urls {
            self.urls_of_mut(url.kind).push(url);
        }
    }

    /// Stamp the owning client id on every URL and claim
    pub fn assign_owner(&mut self, owner: EntityId) {
        self.id = owner;
        for kind in UrlKind::ALL {
            for url in self.urls_of_mut(kind) {
                url.set_owner(owner);
            }
        }
        for claim in &mut self.claims {
            claim.set_owner(owner);
        }
    }

    /// Sort every child collection into canonical order
    pub fn sort_children(&mut self) {
        for kind in UrlKind::ALL {
            sort_items(self.urls_of_mut(kind));
        }
        sort_items(&mut self.claims);
        sort_items(&mut self.secrets);
    }
}
