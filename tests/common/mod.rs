//! Common test utilities
//!
//! Provides rustls setup for the contract tests and an in-memory identity API
//! that behaves like the remote system closely enough for lifecycle tests:
//! it assigns ids, soft-deletes items and can be told to fail.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use identity_reconciler::model::{
    Account, AccountStatus, ChildItem, Claim, Client, ClientUrl, EntityId, Property, Secret,
    UrlKind,
};
use identity_reconciler::provider::{AccountApi, AccountCreation, ClientApi, Operation, RemoteError};
use std::collections::BTreeMap;
use std::sync::{Mutex, Once};

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// This must be called before any async operations that use rustls.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

/// A client with one item in every required collection and one secret
pub fn portal_client() -> Client {
    let mut client = Client::new("portal", "openid profile");
    client.set_urls(vec![
        ClientUrl::new(UrlKind::Redirect, "https://portal.example.com/callback"),
        ClientUrl::new(UrlKind::Cors, "https://portal.example.com"),
        ClientUrl::new(UrlKind::PostLogout, "https://portal.example.com/bye"),
    ]);
    client.claims.push(Claim::new("orders.read"));
    client.secrets.push(Secret::pending());
    client
}

pub fn ada_account() -> Account {
    let mut account = Account::new("ada@example.com", "correct-horse");
    account.role = "User".to_string();
    account.properties = vec![
        Property::new("team", "analytics"),
        Property::new("site", "london"),
    ];
    account
}

#[derive(Debug, Default)]
struct FakeState {
    last_id: u64,
    clients: BTreeMap<EntityId, Client>,
    accounts: Vec<Account>,
    update_calls: usize,
    secret_calls: usize,
    property_puts: usize,
    state_changes: Vec<(EntityId, AccountStatus)>,
    last_payload: Option<Client>,
    fail_secret_call: Option<usize>,
    fail_updates: bool,
    omit_deleted: bool,
}

impl FakeState {
    fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        100 + self.last_id
    }
}

/// In-memory identity API
#[derive(Debug, Default)]
pub struct FakeIdentityApi {
    state: Mutex<FakeState>,
}

impl FakeIdentityApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`th secret creation call (1-based)
    pub fn fail_secret_call(&self, n: usize) {
        self.state.lock().unwrap().fail_secret_call = Some(n);
    }

    pub fn fail_client_updates(&self) {
        self.state.lock().unwrap().fail_updates = true;
    }

    /// Leave soft-deleted items out of returned snapshots
    pub fn omit_deleted_from_snapshots(&self) {
        self.state.lock().unwrap().omit_deleted = true;
    }

    pub fn update_calls(&self) -> usize {
        self.state.lock().unwrap().update_calls
    }

    pub fn secret_calls(&self) -> usize {
        self.state.lock().unwrap().secret_calls
    }

    pub fn property_puts(&self) -> usize {
        self.state.lock().unwrap().property_puts
    }

    pub fn state_changes(&self) -> Vec<(EntityId, AccountStatus)> {
        self.state.lock().unwrap().state_changes.clone()
    }

    pub fn last_payload(&self) -> Option<Client> {
        self.state.lock().unwrap().last_payload.clone()
    }

    /// Stored client, soft-deleted items included
    pub fn stored_client(&self, id: EntityId) -> Option<Client> {
        self.state.lock().unwrap().clients.get(&id).cloned()
    }

    pub fn stored_account(&self, username: &str) -> Option<Account> {
        self.state
            .lock()
            .unwrap()
            .accounts
            .iter()
            .find(|account| account.username() == username)
            .cloned()
    }

    /// Seed an account as if created outside the reconciler
    pub fn insert_account(&self, mut account: Account) -> EntityId {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        account.password.clear();
        account.global_id = format!("gid-{id}");
        account.assign_owner(id);
        state.accounts.push(account);
        id
    }
}

/// Apply sent items onto stored ones: pending items get fresh ids, known ids
/// are overwritten and everything else is kept as stored
fn merge_items<T: ChildItem>(
    stored: &[T],
    sent: &[T],
    owner: EntityId,
    next_id: &mut impl FnMut() -> u64,
) -> Vec<T> {
    let mut merged = stored.to_vec();
    for item in sent {
        let mut item = item.clone();
        item.set_owner(owner);
        if item.is_pending() {
            item.set_id(next_id());
            merged.push(item);
        } else if let Some(existing) = merged.iter_mut().find(|m| m.id() == item.id()) {
            *existing = item;
        } else {
            merged.push(item);
        }
    }
    merged
}

fn snapshot(client: &Client, omit_deleted: bool) -> Client {
    let mut snapshot = client.clone();
    if omit_deleted {
        for kind in UrlKind::ALL {
            snapshot.urls_of_mut(kind).retain(|url| !url.deleted);
        }
        snapshot.claims.retain(|claim| !claim.deleted);
        snapshot.secrets.retain(|secret| !secret.deleted);
    }
    snapshot
}

fn not_found(operation: Operation) -> RemoteError {
    RemoteError::status(operation, 404)
}

#[async_trait]
impl ClientApi for FakeIdentityApi {
    async fn create_client(&self, client: &Client) -> Result<Client, RemoteError> {
        let mut state = self.state.lock().unwrap();
        let mut created = client.without_children();
        created.id = state.next_id();
        state.clients.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_client(&self, client: &Client) -> Result<Client, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.update_calls += 1;
        state.last_payload = Some(client.clone());
        if state.fail_updates {
            return Err(RemoteError::status(Operation::UpdateClient, 500));
        }
        let stored = state
            .clients
            .remove(&client.id)
            .ok_or_else(|| not_found(Operation::UpdateClient))?;

        let mut updated = client.without_children();
        let mut next_id = || state.next_id();
        for kind in UrlKind::ALL {
            *updated.urls_of_mut(kind) = merge_items(
                stored.urls_of(kind),
                client.urls_of(kind),
                client.id,
                &mut next_id,
            );
        }
        updated.claims = merge_items(&stored.claims, &client.claims, client.id, &mut next_id);
        updated.secrets = stored.secrets.clone();
        for sent in client.secrets.iter().filter(|secret| !secret.is_pending()) {
            if let Some(existing) = updated.secrets.iter_mut().find(|s| s.id == sent.id) {
                existing.deleted = sent.deleted;
            }
        }

        let result = snapshot(&updated, state.omit_deleted);
        state.clients.insert(updated.id, updated);
        Ok(result)
    }

    async fn read_client(&self, id: EntityId) -> Result<Client, RemoteError> {
        let state = self.state.lock().unwrap();
        state
            .clients
            .get(&id)
            .map(|client| snapshot(client, state.omit_deleted))
            .ok_or_else(|| not_found(Operation::ReadClient))
    }

    async fn delete_client(&self, id: EntityId) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state
            .clients
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(Operation::DeleteClient))
    }

    async fn create_secret(&self, client_id: EntityId) -> Result<Secret, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.secret_calls += 1;
        if state.fail_secret_call == Some(state.secret_calls) {
            return Err(RemoteError::status(Operation::CreateSecret, 500));
        }
        let id = state.next_id();
        let secret = Secret {
            id,
            value: Some(format!("generated-secret-{id}")),
            deleted: false,
        };
        state
            .clients
            .get_mut(&client_id)
            .ok_or_else(|| not_found(Operation::CreateSecret))?
            .secrets
            .push(secret.clone());
        Ok(secret)
    }
}

#[async_trait]
impl AccountApi for FakeIdentityApi {
    async fn create_account(&self, account: &Account) -> Result<AccountCreation, RemoteError> {
        let mut state = self.state.lock().unwrap();
        if state
            .accounts
            .iter()
            .any(|existing| existing.username() == account.username())
        {
            return Ok(AccountCreation::AlreadyExists);
        }
        let id = state.next_id();
        let mut created = Account::new(account.username(), "");
        created.id = id;
        created.global_id = format!("gid-{id}");
        state.accounts.push(created);
        Ok(AccountCreation::Created)
    }

    async fn find_accounts(&self, term: &str) -> Result<Vec<Account>, RemoteError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .accounts
            .iter()
            .filter(|account| account.username().contains(term))
            .cloned()
            .collect())
    }

    async fn set_role(&self, account_id: EntityId, role: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        let account = state
            .accounts
            .iter_mut()
            .find(|account| account.id == account_id)
            .ok_or_else(|| not_found(Operation::SetRole))?;
        account.role = role.to_string();
        Ok(())
    }

    async fn set_account_state(
        &self,
        account_id: EntityId,
        status: AccountStatus,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.state_changes.push((account_id, status));
        let account = state
            .accounts
            .iter_mut()
            .find(|account| account.id == account_id)
            .ok_or_else(|| not_found(Operation::SetAccountState))?;
        account.status = status;
        Ok(())
    }

    async fn put_property(&self, property: &Property) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.property_puts += 1;
        let account = state
            .accounts
            .iter_mut()
            .find(|account| account.id == property.account_id)
            .ok_or_else(|| not_found(Operation::PutProperty))?;
        match account
            .properties
            .iter_mut()
            .find(|existing| existing.key == property.key)
        {
            Some(existing) => existing.value.clone_from(&property.value),
            None => account.properties.push(property.clone()),
        }
        Ok(())
    }
}
