//! # Correlation
//!
//! The identity API returns a full snapshot after every client write but does
//! not say which local item became which remote item. Ids are recovered by
//! matching on value:
//!
//! 1. local items that already carry an id are paired with the remote item
//!    holding that id, and their values must agree
//! 2. pending local items and the unclaimed remote items are both sorted by
//!    value and walked in lock-step, copying each remote id across
//!
//! Only non-deleted items take part. Any length or value mismatch is a
//! correlation error carrying both sorted sequences; nothing is retried.

use super::ReconcileError;
use crate::model::{canonical_order, describe, ChildItem, Client, Collection, EntityId, UrlKind};
use std::collections::HashSet;
use tracing::debug;

/// Copy remote ids onto the pending items of one local collection
///
/// Stamps `owner` on every local item and leaves the collection in canonical
/// order. Returns the number of ids assigned.
///
/// # Errors
/// Returns `Correlation` when the non-deleted items on both sides cannot be
/// paired one to one with equal values.
pub fn correlate_items<T: ChildItem>(
    collection: Collection,
    local: &mut Vec<T>,
    remote: &[T],
    owner: EntityId,
) -> Result<usize, ReconcileError> {
    let mismatch = |local: &[T]| ReconcileError::Correlation {
        collection,
        local: describe(local.iter().filter(|item| item.is_live())),
        remote: describe(remote.iter().filter(|item| item.is_live())),
    };

    let live_remote: Vec<&T> = remote.iter().filter(|item| item.is_live()).collect();
    let live_local: Vec<usize> = (0..local.len()).filter(|&i| local[i].is_live()).collect();
    if live_local.len() != live_remote.len() {
        return Err(mismatch(local.as_slice()));
    }

    let mut claimed = HashSet::new();
    let mut pending = Vec::new();
    for &index in &live_local {
        let item = &local[index];
        if item.is_pending() {
            pending.push(index);
            continue;
        }
        let Some(position) = live_remote
            .iter()
            .position(|candidate| candidate.id() == item.id())
        else {
            return Err(mismatch(local.as_slice()));
        };
        if live_remote[position].key() != item.key() || !claimed.insert(position) {
            return Err(mismatch(local.as_slice()));
        }
    }

    let mut unclaimed: Vec<&T> = live_remote
        .iter()
        .enumerate()
        .filter(|(position, _)| !claimed.contains(position))
        .map(|(_, item)| *item)
        .collect();
    unclaimed.sort_by(|a, b| canonical_order(*a, *b));
    pending.sort_by(|&a, &b| local[a].key().cmp(local[b].key()));

    for (&index, remote_item) in pending.iter().zip(&unclaimed) {
        if local[index].key() != remote_item.key() {
            return Err(mismatch(local.as_slice()));
        }
    }
    for (&index, remote_item) in pending.iter().zip(&unclaimed) {
        local[index].set_id(remote_item.id());
    }

    for item in local.iter_mut() {
        item.set_owner(owner);
    }
    local.sort_by(canonical_order);

    if !pending.is_empty() {
        debug!(%collection, assigned = pending.len(), "Correlated pending items");
    }
    Ok(pending.len())
}

/// Assign remote ids to the pending URLs and claims of `local`
///
/// Correlation runs per URL type and for claims. Secrets are not correlated;
/// they get their ids from their own creation calls. The client id is taken
/// from the snapshot when the local copy has none.
///
/// # Errors
/// Returns `Correlation` for the first collection that does not line up.
pub fn correlate(local: &mut Client, snapshot: &Client) -> Result<usize, ReconcileError> {
    let owner = snapshot.id;
    if local.id == 0 {
        local.id = owner;
    }

    let mut assigned = 0;
    for kind in UrlKind::ALL {
        assigned += correlate_items(
            kind.collection(),
            local.urls_of_mut(kind),
            snapshot.urls_of(kind),
            owner,
        )?;
    }
    assigned += correlate_items(Collection::Claims, &mut local.claims, &snapshot.claims, owner)?;
    Ok(assigned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Claim, ClientUrl};

    fn declared() -> Client {
        let mut client = Client::new("portal", "openid");
        client.set_urls(vec![
            ClientUrl::new(UrlKind::Redirect, "https://app/callback"),
            ClientUrl::new(UrlKind::Redirect, "https://app/alt"),
            ClientUrl::new(UrlKind::Cors, "https://app"),
            ClientUrl::new(UrlKind::Cors, "https://admin.app"),
            ClientUrl::new(UrlKind::PostLogout, "https://app/bye"),
        ]);
        client.claims = vec![Claim::new("write"), Claim::new("read"), Claim::new("admin")];
        client
    }

    #[test]
    fn test_lock_step_assigns_ids_in_value_order() {
        let mut local = vec![Claim::new("write"), Claim::new("read")];
        let remote = vec![Claim::with_id(20, "write"), Claim::with_id(10, "read")];
        let assigned = correlate_items(Collection::Claims, &mut local, &remote, 5).unwrap();

        assert_eq!(assigned, 2);
        assert_eq!(local[0], Claim { client_id: 5, ..Claim::with_id(10, "read") });
        assert_eq!(local[1], Claim { client_id: 5, ..Claim::with_id(20, "write") });
    }

    #[test]
    fn test_length_mismatch_reports_both_sequences() {
        let mut local = vec![Claim::new("read")];
        let remote = vec![Claim::with_id(1, "read"), Claim::with_id(2, "write")];
        match correlate_items(Collection::Claims, &mut local, &remote, 5) {
            Err(ReconcileError::Correlation {
                collection,
                local,
                remote,
            }) => {
                assert_eq!(collection, Collection::Claims);
                assert_eq!(local, vec!["0:read"]);
                assert_eq!(remote, vec!["1:read", "2:write"]);
            }
            other => panic!("expected correlation error, got {other:?}"),
        }
    }

    #[test]
    fn test_value_mismatch_is_an_error() {
        let mut local = vec![Claim::new("read")];
        let remote = vec![Claim::with_id(1, "reads")];
        assert!(correlate_items(Collection::Claims, &mut local, &remote, 5).is_err());
        assert!(local[0].is_pending());
    }

    #[test]
    fn test_known_ids_are_matched_by_id() {
        let mut deleted = Claim::with_id(1, "read");
        deleted.deleted = true;
        let mut local = vec![deleted.clone(), Claim::with_id(2, "write"), Claim::new("read")];
        let remote = vec![deleted, Claim::with_id(2, "write"), Claim::with_id(3, "read")];
        correlate_items(Collection::Claims, &mut local, &remote, 5).unwrap();

        let live: Vec<_> = local
            .iter()
            .filter(|c| c.is_live())
            .map(|c| (c.id, c.value.as_str()))
            .collect();
        assert_eq!(live, vec![(3, "read"), (2, "write")]);
        assert!(local.iter().any(|c| c.id == 1 && c.deleted));
    }

    #[test]
    fn test_remote_may_omit_deleted_items() {
        let mut deleted = ClientUrl::with_id(1, UrlKind::Cors, "https://old");
        deleted.deleted = true;
        let mut local = vec![deleted, ClientUrl::new(UrlKind::Cors, "https://new")];
        let remote = vec![ClientUrl::with_id(2, UrlKind::Cors, "https://new")];
        assert_eq!(
            correlate_items(Collection::CorsUrls, &mut local, &remote, 9).unwrap(),
            1
        );
    }

    #[test]
    fn test_known_id_with_changed_value_is_an_error() {
        let mut local = vec![Claim::with_id(2, "write")];
        let remote = vec![Claim::with_id(2, "read")];
        assert!(correlate_items(Collection::Claims, &mut local, &remote, 5).is_err());
    }

    #[test]
    fn test_declaration_order_does_not_change_correlation() {
        let mut snapshot = Client::new("portal", "openid");
        snapshot.id = 9;
        snapshot.set_urls(vec![
            ClientUrl::with_id(14, UrlKind::Redirect, "https://app/alt"),
            ClientUrl::with_id(11, UrlKind::Redirect, "https://app/callback"),
            ClientUrl::with_id(12, UrlKind::Cors, "https://app"),
            ClientUrl::with_id(15, UrlKind::Cors, "https://admin.app"),
            ClientUrl::with_id(13, UrlKind::PostLogout, "https://app/bye"),
        ]);
        snapshot.claims = vec![
            Claim::with_id(21, "read"),
            Claim::with_id(23, "admin"),
            Claim::with_id(22, "write"),
        ];

        let mut forward = declared();
        let mut shuffled = declared();
        shuffled.redirect_urls.reverse();
        shuffled.cors_urls.reverse();
        shuffled.claims.rotate_left(1);

        assert_eq!(correlate(&mut forward, &snapshot).unwrap(), 8);
        assert_eq!(correlate(&mut shuffled, &snapshot).unwrap(), 8);
        assert_eq!(forward, shuffled);
        assert_eq!(forward.id, 9);
        let claims: Vec<_> = forward.claims.iter().map(|c| (c.id, c.value.as_str())).collect();
        assert_eq!(claims, vec![(23, "admin"), (21, "read"), (22, "write")]);
    }
}
