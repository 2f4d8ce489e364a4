//! Reconciliation errors.

use crate::model::{Collection, ItemId, Secret};
use crate::provider::RemoteError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Malformed or unsupported declaration. Fix the configuration.
    #[error("invalid declaration: {0}")]
    Validation(String),

    /// A required collection would be left without a non-deleted item
    #[error("{collection} must keep at least one non-deleted item")]
    InvariantViolation { collection: Collection },

    /// The snapshot returned after a write does not line up with the local declaration
    #[error("cannot correlate {collection} (local {local:?}, remote {remote:?})")]
    Correlation {
        collection: Collection,
        local: Vec<String>,
        remote: Vec<String>,
    },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Some secrets were created before a later creation failed. Nothing is rolled back.
    #[error(
        "secret creation stopped with {} created and {} not created: {source}",
        .succeeded.len(),
        .failed.len()
    )]
    PartialFailure {
        succeeded: Vec<ItemId>,
        failed: Vec<Secret>,
        #[source]
        source: RemoteError,
    },
}

impl ReconcileError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether re-running the whole reconciliation is a sensible response
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Whether the entity may be left in a mixed state that needs a human
    pub fn needs_operator(&self) -> bool {
        matches!(self, Self::PartialFailure { .. } | Self::Correlation { .. })
    }

    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::InvariantViolation { .. } => "invariant_violation",
            Self::Correlation { .. } => "correlation",
            Self::Remote(_) => "remote",
            Self::PartialFailure { .. } => "partial_failure",
        }
    }
}
