//! Account lifecycle. Accounts are never destroyed: deleting one disables it,
//! and creating one whose username already exists re-enables it.

use super::finish;
use crate::model::{Account, AccountStatus};
use crate::observability::metrics;
use crate::provider::{AccountApi, AccountCreation, Operation, RemoteError};
use crate::reconciler::{
    normalize_account, plan_account_create, plan_account_update, AccountPlan, ReconcileError,
};
use std::time::Instant;
use tracing::{info, info_span, Instrument};

/// Reconciles accounts against an [`AccountApi`]
#[derive(Clone, Copy)]
pub struct AccountSync<'a> {
    api: &'a dyn AccountApi,
}

impl std::fmt::Debug for AccountSync<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountSync").finish_non_exhaustive()
    }
}

impl<'a> AccountSync<'a> {
    pub fn new(api: &'a dyn AccountApi) -> Self {
        Self { api }
    }

    /// Create an account, or re-enable the existing one with the same username
    ///
    /// Then sets the role and writes every declared property. On success
    /// `account` carries its id and global id.
    ///
    /// # Errors
    /// `Validation` for a malformed declaration, `Remote` for a failed call or
    /// when the username does not resolve to exactly one account.
    pub async fn create(&self, account: &mut Account) -> Result<AccountPlan, ReconcileError> {
        let span = info_span!(
            "identity.reconcile.account",
            account.username = %account.username(),
            phase = "create"
        );
        let start = Instant::now();
        metrics::increment_reconciliations("account", "create");

        let result = async {
            let plan = plan_account_create(account)?;
            let creation = self.api.create_account(account).await?;

            let found = self.lookup(account.username()).await?;
            account.id = found.id;
            account.global_id = found.global_id;
            account.status = AccountStatus::Enabled;
            if creation == AccountCreation::AlreadyExists {
                info!(account.id = account.id, "Re-enabling existing account");
                self.api
                    .set_account_state(account.id, AccountStatus::Enabled)
                    .await?;
            }

            self.apply(&plan, account).await?;
            Ok::<_, ReconcileError>(plan)
        }
        .instrument(span)
        .await;
        finish("account", "create", start, result)
    }

    /// Apply role and property changes from the previously reconciled account
    ///
    /// # Errors
    /// `Validation` when a property would be deleted or the username changed,
    /// `Remote` for a failed call.
    pub async fn update(
        &self,
        previous: &Account,
        account: &mut Account,
    ) -> Result<AccountPlan, ReconcileError> {
        let span = info_span!(
            "identity.reconcile.account",
            account.id = previous.id,
            phase = "update"
        );
        let start = Instant::now();
        metrics::increment_reconciliations("account", "update");

        let result = async {
            let plan = plan_account_update(previous, account)?;
            if account.id == 0 {
                account.id = previous.id;
                account.global_id.clone_from(&previous.global_id);
            }
            self.apply(&plan, account).await?;
            Ok::<_, ReconcileError>(plan)
        }
        .instrument(span)
        .await;
        finish("account", "update", start, result)
    }

    /// Read an account by username
    ///
    /// Returns `None` when no account has that username or it is not enabled.
    ///
    /// # Errors
    /// Returns `Remote` when the lookup fails or the username is ambiguous.
    pub async fn read(&self, username: &str) -> Result<Option<Account>, ReconcileError> {
        let start = Instant::now();
        metrics::increment_reconciliations("account", "read");

        let result = async {
            let mut matches = self.matching(username).await?;
            if matches.len() > 1 {
                return Err(ReconcileError::from(ambiguous(username)));
            }
            let found = matches
                .pop()
                .filter(|account| account.status == AccountStatus::Enabled)
                .map(|mut account| {
                    normalize_account(&mut account);
                    account
                });
            Ok::<_, ReconcileError>(found)
        }
        .await;
        finish("account", "read", start, result)
    }

    /// Disable an account if it is still active. Returns whether it was disabled.
    ///
    /// # Errors
    /// Returns `Remote` when the lookup or the state change fails.
    pub async fn delete(&self, account: &Account) -> Result<bool, ReconcileError> {
        let start = Instant::now();
        metrics::increment_reconciliations("account", "delete");

        let result = async {
            let Some(active) = self.read_active(account.username()).await? else {
                return Ok(false);
            };
            self.api
                .set_account_state(active.id, AccountStatus::Disabled)
                .await?;
            info!(account.id = active.id, "Disabled account");
            Ok::<_, ReconcileError>(true)
        }
        .await;
        finish("account", "delete", start, result)
    }

    async fn read_active(&self, username: &str) -> Result<Option<Account>, ReconcileError> {
        let matches = self.matching(username).await?;
        Ok(matches
            .into_iter()
            .find(|account| account.status == AccountStatus::Enabled))
    }

    /// Write the planned role, properties and state
    async fn apply(&self, plan: &AccountPlan, account: &mut Account) -> Result<(), ReconcileError> {
        if let Some(role) = &plan.role_change {
            self.api.set_role(account.id, role).await?;
        }
        for property in &plan.properties_to_put {
            let mut property = property.clone();
            property.account_id = account.id;
            self.api.put_property(&property).await?;
        }
        if let Some(status) = plan.state_change {
            self.api.set_account_state(account.id, status).await?;
            account.status = status;
        }
        account.assign_owner(account.id);
        normalize_account(account);
        Ok(())
    }

    /// Resolve a username to exactly one account
    async fn lookup(&self, username: &str) -> Result<Account, RemoteError> {
        let mut matches = self.matching(username).await?;
        match matches.len() {
            0 => Err(RemoteError::invalid_response(
                Operation::FindAccount,
                format!("no accounts found with username '{username}'"),
            )),
            1 => Ok(matches.remove(0)),
            _ => Err(ambiguous(username)),
        }
    }

    /// Search results narrowed to exact username matches
    async fn matching(&self, username: &str) -> Result<Vec<Account>, RemoteError> {
        let accounts = self.api.find_accounts(username).await?;
        Ok(accounts
            .into_iter()
            .filter(|account| account.username() == username)
            .collect())
    }
}

fn ambiguous(username: &str) -> RemoteError {
    RemoteError::invalid_response(
        Operation::FindAccount,
        format!("multiple accounts exist with username '{username}'"),
    )
}
