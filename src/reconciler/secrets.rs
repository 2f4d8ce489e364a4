//! # Secret Lifecycle
//!
//! Secrets are immutable once created. Their value is generated by the remote
//! system, so creation goes through one API call per secret instead of the
//! client update payload, and existing secrets are only ever referenced by id
//! in a payload.

use super::ReconcileError;
use crate::model::{ChildItem, Client, ItemId, Secret};
use crate::observability::metrics;
use crate::provider::ClientApi;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Secret changes between the previously reconciled and the desired state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecretChangeSet {
    /// Pending secrets that need one creation call each
    pub to_create: Vec<Secret>,
    /// Existing secrets kept as they are
    pub untouched: Vec<Secret>,
    /// Secrets to mark deleted, as id references
    pub to_delete: Vec<Secret>,
    retained: Vec<Secret>,
}

impl SecretChangeSet {
    pub fn build(previous: &[Secret], desired: &[Secret]) -> Self {
        // Nothing exists remotely yet, so every declared secret is generated
        // fresh, whatever id it carries.
        if previous.is_empty() {
            let to_create: Vec<Secret> = desired
                .iter()
                .filter(|secret| secret.is_live())
                .map(|_| Secret::pending())
                .collect();
            return Self {
                retained: to_create.clone(),
                to_create,
                ..Self::default()
            };
        }

        let desired_ids: HashSet<ItemId> = desired
            .iter()
            .filter(|secret| !secret.is_pending())
            .map(|secret| secret.id)
            .collect();

        let mut changes = Self {
            to_delete: previous
                .iter()
                .filter(|secret| !secret.is_pending() && !desired_ids.contains(&secret.id))
                .map(|secret| Secret::reference(secret.id, true))
                .collect(),
            ..Self::default()
        };

        for secret in desired {
            match (secret.is_pending(), secret.deleted) {
                (true, false) => {
                    changes.to_create.push(Secret::pending());
                    changes.retained.push(Secret::pending());
                }
                // Never created, nothing to delete
                (true, true) => {}
                (false, true) => {
                    changes.to_delete.push(Secret::reference(secret.id, true));
                    changes.retained.push(secret.clone());
                }
                (false, false) => {
                    changes.untouched.push(secret.clone());
                    changes.retained.push(secret.clone());
                }
            }
        }
        changes
    }

    /// Secret entries for the client update payload: deletions first, then
    /// references to the untouched secrets. Values are never included.
    pub fn payload(&self) -> Vec<Secret> {
        self.to_delete
            .iter()
            .chain(&self.untouched)
            .map(Secret::redacted)
            .collect()
    }

    /// The secrets the local entity keeps after this change, pending ones included
    pub fn retained(&self) -> &[Secret] {
        &self.retained
    }
}

/// Create every pending secret of `client`, one call at a time
///
/// Each created secret has its id, value and deleted flag stamped onto the
/// local entity. Creation stops at the first failure; secrets created before
/// it stay on the entity and nothing is rolled back.
///
/// # Errors
/// - `Remote` when the very first creation fails
/// - `PartialFailure` when a creation fails after at least one success
pub async fn create_pending_secrets(
    api: &dyn ClientApi,
    client: &mut Client,
) -> Result<Vec<ItemId>, ReconcileError> {
    let pending: Vec<usize> = client
        .secrets
        .iter()
        .enumerate()
        .filter(|(_, secret)| secret.is_pending() && secret.is_live())
        .map(|(index, _)| index)
        .collect();

    if pending.is_empty() {
        return Ok(Vec::new());
    }
    debug!(
        client.id = client.id,
        count = pending.len(),
        "Creating pending secrets"
    );

    let mut succeeded = Vec::with_capacity(pending.len());
    for (position, &index) in pending.iter().enumerate() {
        match api.create_secret(client.id).await {
            Ok(created) => {
                let secret = &mut client.secrets[index];
                secret.id = created.id;
                secret.value = created.value;
                secret.deleted = created.deleted;
                succeeded.push(created.id);
                metrics::increment_secrets_created();
            }
            Err(source) if succeeded.is_empty() => {
                return Err(ReconcileError::Remote(source));
            }
            Err(source) => {
                let failed: Vec<Secret> = pending[position..]
                    .iter()
                    .map(|&index| client.secrets[index].clone())
                    .collect();
                warn!(
                    client.id = client.id,
                    created = succeeded.len(),
                    not_created = failed.len(),
                    error = %source,
                    "Secret creation stopped part way; created secrets are kept"
                );
                return Err(ReconcileError::PartialFailure {
                    succeeded,
                    failed,
                    source,
                });
            }
        }
    }

    info!(
        client.id = client.id,
        count = succeeded.len(),
        "Created client secrets"
    );
    Ok(succeeded)
}
