//! # Identity Reconciler
//!
//! Converges identity clients and accounts on an identity-management API
//! from a declarative description of their desired state.
//!
//! The crate is split along the same seams the reconciliation runs through:
//!
//! - [`model`]: typed clients and accounts with their child collections
//! - [`reconciler`]: the pure core. Change sets, secret planning, correlation
//!   of server-assigned ids and invariant validation
//! - [`provider`]: the remote API traits and the REST transport
//! - [`sync`]: lifecycle orchestration (create / read / update / delete) over
//!   an injected API session
//! - [`state`]: desired-state declarations and reconciled-state files used by
//!   the `identity-sync` binary
//! - [`config`] and [`observability`]: environment configuration and metrics

pub mod config;
pub mod constants;
pub mod model;
pub mod observability;
pub mod provider;
pub mod reconciler;
pub mod state;
pub mod sync;

pub use model::{Account, Claim, Client, ClientUrl, Property, Secret, UrlKind};
pub use reconciler::{correlate, plan_create, plan_update, validate, ReconcileError};
