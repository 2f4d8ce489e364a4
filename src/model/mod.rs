//! # Entity Model
//!
//! Typed clients and accounts together with their child collections.
//!
//! Every nested collection item implements [`ChildItem`], which is what the
//! change-set builder and the correlator are written against. Items are
//! ordered canonically by their value (ties broken by id, pending `0` first),
//! so local and remote state are always compared under the same total order.

mod account;
mod client;

pub use account::{Account, AccountStatus, Property};
pub use client::{Claim, Client, ClientUrl, Secret, TokenLifetimes, UrlKind};

use std::cmp::Ordering;
use std::fmt;

/// Identifier the remote system assigns to a child item. `0` until assigned.
pub type ItemId = u64;

/// Identifier the remote system assigns to a client or account. `0` until assigned.
pub type EntityId = u64;

/// Id carried by items the remote system has not created yet
pub const UNASSIGNED: ItemId = 0;

/// Names a child collection in errors, logs and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    RedirectUrls,
    CorsUrls,
    PostLogoutUrls,
    Claims,
    Secrets,
    Properties,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RedirectUrls => "redirect URLs",
            Self::CorsUrls => "CORS URLs",
            Self::PostLogoutUrls => "post-logout URLs",
            Self::Claims => "claims",
            Self::Secrets => "secrets",
            Self::Properties => "properties",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A nested item of an entity that the remote system identifies by a
/// server-assigned id and never hard-deletes
pub trait ChildItem: Clone + fmt::Debug {
    fn id(&self) -> ItemId;

    fn set_id(&mut self, id: ItemId);

    /// Semantic payload used as the correlation key
    fn key(&self) -> &str;

    fn is_deleted(&self) -> bool;

    fn set_deleted(&mut self, deleted: bool);

    /// Stamp the owning entity's id. Items without a back-reference ignore it.
    fn set_owner(&mut self, owner: EntityId);

    fn is_pending(&self) -> bool {
        self.id() == UNASSIGNED
    }

    fn is_live(&self) -> bool {
        !self.is_deleted()
    }
}

/// Canonical order: value ascending, then id ascending
pub fn canonical_order<T: ChildItem>(a: &T, b: &T) -> Ordering {
    a.key().cmp(b.key()).then_with(|| a.id().cmp(&b.id()))
}

/// Sort a collection into canonical order
pub fn sort_items<T: ChildItem>(items: &mut [T]) {
    items.sort_by(canonical_order);
}

/// Number of non-deleted items
pub fn live_count<T: ChildItem>(items: &[T]) -> usize {
    items.iter().filter(|item| item.is_live()).count()
}

/// Render a collection as `id:value` pairs in canonical order, for diagnostics
pub fn describe<'a, T, I>(items: I) -> Vec<String>
where
    T: ChildItem + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut sorted: Vec<&T> = items.into_iter().collect();
    sorted.sort_by(|a, b| canonical_order(*a, *b));
    sorted
        .into_iter()
        .map(|item| format!("{}:{}", item.id(), item.key()))
        .collect()
}

/// Mask a sensitive value for logs, keeping the first and last four characters
pub(crate) fn mask_value(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len().min(4))
    } else {
        let first: String = chars[..4].iter().collect();
        let last: String = chars[chars.len() - 4..].iter().collect();
        format!("{first}...{last}")
    }
}
