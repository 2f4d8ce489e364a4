//! # Client Planning
//!
//! Turns a previous and a desired client into the single update payload the
//! identity API expects, plus the local copy that correlation will stamp ids
//! onto. Planning is pure; nothing here talks to the remote system.

use super::changeset::ChangeSet;
use super::secrets::SecretChangeSet;
use super::validation::{validate, validate_client_declaration};
use super::ReconcileError;
use crate::model::{Claim, Client, ClientUrl, Collection, EntityId, UrlKind};
use std::collections::BTreeMap;
use std::fmt;

/// Everything a client write needs
#[derive(Debug, Clone)]
pub struct ClientPlan {
    /// Body of the client update: per collection, deletions then desired items
    pub payload: Client,
    /// The desired client in canonical order, with ids still to be correlated
    pub local: Client,
    pub urls: BTreeMap<UrlKind, ChangeSet<ClientUrl>>,
    pub claims: ChangeSet<Claim>,
    pub secrets: SecretChangeSet,
}

impl ClientPlan {
    /// Stamp a newly assigned client id on the payload and the local copy
    pub fn assign_owner(&mut self, owner: EntityId) {
        self.payload.assign_owner(owner);
        self.local.assign_owner(owner);
    }

    /// Soft deletions per collection, empty collections omitted
    pub fn soft_deletions(&self) -> Vec<(Collection, usize)> {
        let mut deletions: Vec<(Collection, usize)> = self
            .urls
            .iter()
            .map(|(kind, changes)| (kind.collection(), changes.to_delete.len()))
            .collect();
        deletions.push((Collection::Claims, self.claims.to_delete.len()));
        deletions.push((Collection::Secrets, self.secrets.to_delete.len()));
        deletions.retain(|(_, count)| *count > 0);
        deletions
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            urls_to_create: self.urls.values().map(|c| c.to_create.len()).sum(),
            urls_to_delete: self.urls.values().map(|c| c.to_delete.len()).sum(),
            claims_to_create: self.claims.to_create.len(),
            claims_to_delete: self.claims.to_delete.len(),
            secrets_to_create: self.secrets.to_create.len(),
            secrets_to_delete: self.secrets.to_delete.len(),
        }
    }
}

/// Counts reported by `plan` and `apply`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlanSummary {
    pub urls_to_create: usize,
    pub urls_to_delete: usize,
    pub claims_to_create: usize,
    pub claims_to_delete: usize,
    pub secrets_to_create: usize,
    pub secrets_to_delete: usize,
}

impl PlanSummary {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "urls +{}/-{}, claims +{}/-{}, secrets +{}/-{}",
            self.urls_to_create,
            self.urls_to_delete,
            self.claims_to_create,
            self.claims_to_delete,
            self.secrets_to_create,
            self.secrets_to_delete
        )
    }
}

/// Plan the first write of a client
///
/// # Errors
/// `Validation` for a malformed declaration, `InvariantViolation` when a
/// required collection is empty.
pub fn plan_create(desired: &Client) -> Result<ClientPlan, ReconcileError> {
    build_plan(None, desired)
}

/// Plan a write from the previously reconciled state to the desired one
///
/// # Errors
/// `Validation` for a malformed declaration or mismatched client ids,
/// `InvariantViolation` when the write would leave a required collection with
/// no non-deleted item.
pub fn plan_update(previous: &Client, desired: &Client) -> Result<ClientPlan, ReconcileError> {
    if previous.id != 0 && desired.id != 0 && previous.id != desired.id {
        return Err(ReconcileError::validation(format!(
            "desired client id {} does not match reconciled client id {}",
            desired.id, previous.id
        )));
    }
    build_plan(Some(previous), desired)
}

fn build_plan(previous: Option<&Client>, desired: &Client) -> Result<ClientPlan, ReconcileError> {
    validate_client_declaration(desired)?;

    let mut local = desired.clone();
    if local.id == 0 {
        local.id = previous.map_or(0, |previous| previous.id);
    }
    local.sort_children();

    let urls: BTreeMap<UrlKind, ChangeSet<ClientUrl>> = UrlKind::ALL
        .into_iter()
        .map(|kind| {
            let before = previous.map_or(&[][..], |previous| previous.urls_of(kind));
            (kind, ChangeSet::build(before, local.urls_of(kind)))
        })
        .collect();
    let claims = ChangeSet::build(
        previous.map_or(&[][..], |previous| previous.claims.as_slice()),
        &local.claims,
    );
    let secrets = SecretChangeSet::build(
        previous.map_or(&[][..], |previous| previous.secrets.as_slice()),
        &local.secrets,
    );

    let mut payload = local.without_children();
    for (kind, changes) in &urls {
        *payload.urls_of_mut(*kind) = changes.payload();
    }
    payload.claims = claims.payload();
    payload.secrets = secrets.payload();

    validate(&payload)?;

    for (kind, changes) in &urls {
        local.urls_of_mut(*kind).clone_from(&changes.to_update);
    }
    local.claims.clone_from(&claims.to_update);
    local.secrets = secrets.retained().to_vec();
    let mut plan = ClientPlan {
        payload,
        local,
        urls,
        claims,
        secrets,
    };
    if plan.local.id != 0 {
        plan.assign_owner(plan.local.id);
    }
    Ok(plan)
}
