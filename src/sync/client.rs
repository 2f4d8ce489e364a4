//! Client lifecycle: create, update, read and delete.

use super::finish;
use crate::model::{Client, EntityId, ItemId, Secret};
use crate::observability::metrics;
use crate::provider::ClientApi;
use crate::reconciler::{
    correlate, create_pending_secrets, normalize, plan_create, plan_update, ClientPlan,
    PlanSummary, ReconcileError,
};
use std::time::Instant;
use tracing::{debug, info, info_span, Instrument};

/// Outcome of a successful client write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub client_id: EntityId,
    pub summary: PlanSummary,
    /// Number of URL and claim ids recovered by correlation
    pub ids_assigned: usize,
    pub secrets_created: Vec<ItemId>,
}

/// Reconciles clients against a [`ClientApi`]
#[derive(Clone, Copy)]
pub struct ClientSync<'a> {
    api: &'a dyn ClientApi,
}

impl std::fmt::Debug for ClientSync<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSync").finish_non_exhaustive()
    }
}

impl<'a> ClientSync<'a> {
    pub fn new(api: &'a dyn ClientApi) -> Self {
        Self { api }
    }

    /// Create a client and all of its children
    ///
    /// The bare client is created first; its id is written to `client`
    /// before the children are sent, so it survives a failure of the child
    /// write. On success `client` holds the reconciled state.
    ///
    /// # Errors
    /// Any `ReconcileError`; nothing is written when validation fails.
    pub async fn create(&self, client: &mut Client) -> Result<SyncReport, ReconcileError> {
        let span = info_span!(
            "identity.reconcile.client",
            client.name = %client.name,
            phase = "create"
        );
        let start = Instant::now();
        metrics::increment_reconciliations("client", "create");

        let result = async {
            let mut plan = plan_create(client)?;
            let created = self.api.create_client(&plan.payload).await?;
            client.id = created.id;
            plan.assign_owner(created.id);
            self.write(plan, client).await
        }
        .instrument(span)
        .await;
        finish("client", "create", start, result)
    }

    /// Move a client from its previously reconciled state to `client`
    ///
    /// On success `client` holds the reconciled state, which is the
    /// `previous` of the next run.
    ///
    /// # Errors
    /// Any `ReconcileError`; nothing is written when validation fails.
    pub async fn update(
        &self,
        previous: &Client,
        client: &mut Client,
    ) -> Result<SyncReport, ReconcileError> {
        let span = info_span!(
            "identity.reconcile.client",
            client.id = previous.id,
            phase = "update"
        );
        let start = Instant::now();
        metrics::increment_reconciliations("client", "update");

        let result = async {
            let plan = plan_update(previous, client)?;
            if client.id == 0 {
                client.id = previous.id;
            }
            self.write(plan, client).await
        }
        .instrument(span)
        .await;
        finish("client", "update", start, result)
    }

    /// Read a client in canonical order. Secret values are never returned.
    ///
    /// # Errors
    /// Returns `Remote` when the read fails.
    pub async fn read(&self, id: EntityId) -> Result<Client, ReconcileError> {
        let start = Instant::now();
        metrics::increment_reconciliations("client", "read");

        let result = async {
            let mut client = self.api.read_client(id).await?;
            client.secrets = client.secrets.iter().map(Secret::redacted).collect();
            normalize(&mut client);
            Ok::<_, ReconcileError>(client)
        }
        .await;
        finish("client", "read", start, result)
    }

    /// # Errors
    /// Returns `Remote` when the delete fails.
    pub async fn delete(&self, id: EntityId) -> Result<(), ReconcileError> {
        let start = Instant::now();
        metrics::increment_reconciliations("client", "delete");
        let result = self.api.delete_client(id).await.map_err(ReconcileError::from);
        finish("client", "delete", start, result)
    }

    /// Send the planned payload, correlate ids and create pending secrets
    async fn write(
        &self,
        plan: ClientPlan,
        client: &mut Client,
    ) -> Result<SyncReport, ReconcileError> {
        let summary = plan.summary();
        debug!(%summary, payload = ?plan.payload, "Writing client");

        let snapshot = self.api.update_client(&plan.payload).await?;
        for (collection, count) in plan.soft_deletions() {
            metrics::increment_items_soft_deleted(collection.as_str(), count);
        }

        let mut local = plan.local;
        let ids_assigned = correlate(&mut local, &snapshot)?;
        *client = local;

        let secrets_created = create_pending_secrets(self.api, client).await?;
        info!(client.id = client.id, %summary, "Client reconciled");
        Ok(SyncReport {
            client_id: client.id,
            summary,
            ids_assigned,
            secrets_created,
        })
    }
}
