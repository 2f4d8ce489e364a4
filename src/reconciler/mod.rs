//! # Reconciler
//!
//! The pure core of reconciliation. Given the previously reconciled state and
//! the desired state of an entity it computes what to write, and after a write
//! it recovers the ids the remote system assigned.
//!
//! - [`changeset`]: per-collection create / update / soft-delete sets
//! - [`secrets`]: write-once secret planning and sequential creation
//! - [`correlate`](mod@correlate): sorted matching of local items to a remote snapshot
//! - [`validation`]: declaration checks and collection invariants
//! - [`plan`]: client update payloads
//! - [`account`]: account role, state and property writes
//!
//! Only [`secrets::create_pending_secrets`] performs I/O; everything else is
//! a pure function over the model.

pub mod account;
pub mod changeset;
pub mod correlate;
mod error;
pub mod plan;
pub mod secrets;
pub mod validation;

pub use account::{plan_account_create, plan_account_update, AccountPlan};
pub use changeset::ChangeSet;
pub use correlate::{correlate, correlate_items};
pub use error::ReconcileError;
pub use plan::{plan_create, plan_update, ClientPlan, PlanSummary};
pub use secrets::{create_pending_secrets, SecretChangeSet};
pub use validation::{validate, validate_account_declaration, validate_client_declaration};

use crate::model::{Account, Client};

/// Put every child collection of a client into canonical order
pub fn normalize(client: &mut Client) {
    client.sort_children();
}

/// Put the properties of an account into key order
pub fn normalize_account(account: &mut Account) {
    account.sort_properties();
}
