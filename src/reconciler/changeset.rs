//! Per-collection change sets for URLs and claims.

use crate::model::{ChildItem, ItemId};
use std::collections::HashSet;

/// The differences between the previously reconciled and the desired state
/// of one child collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet<T> {
    /// Desired items without an id. Reported only; the remote creates them
    /// from the update payload.
    pub to_create: Vec<T>,
    /// Every desired item, verbatim, except pending items already marked deleted
    pub to_update: Vec<T>,
    /// Previous items absent from the desired state, marked deleted
    pub to_delete: Vec<T>,
}

impl<T: ChildItem> ChangeSet<T> {
    pub fn build(previous: &[T], desired: &[T]) -> Self {
        let desired_ids: HashSet<ItemId> = desired
            .iter()
            .filter(|item| !item.is_pending())
            .map(ChildItem::id)
            .collect();

        let to_delete = previous
            .iter()
            .filter(|item| !item.is_pending() && !desired_ids.contains(&item.id()))
            .map(|item| {
                let mut item = item.clone();
                item.set_deleted(true);
                item
            })
            .collect();

        // Never created, nothing to delete
        let to_update: Vec<T> = desired
            .iter()
            .filter(|item| !(item.is_pending() && item.is_deleted()))
            .cloned()
            .collect();

        Self {
            to_create: to_update
                .iter()
                .filter(|item| item.is_pending())
                .cloned()
                .collect(),
            to_update,
            to_delete,
        }
    }

    /// Items to send: deletions first, then the desired items
    pub fn payload(&self) -> Vec<T> {
        self.to_delete
            .iter()
            .chain(&self.to_update)
            .cloned()
            .collect()
    }

    /// Whether the write carries no creation and no deletion
    pub fn is_unchanged(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Claim, ClientUrl, UrlKind};

    #[test]
    fn test_first_creation_has_no_deletes() {
        let desired = vec![Claim::new("read"), Claim::new("write")];
        let changes = ChangeSet::build(&[], &desired);
        assert_eq!(changes.to_create.len(), 2);
        assert_eq!(changes.to_update, desired);
        assert!(changes.to_delete.is_empty());
        assert_eq!(changes.payload(), desired);
    }

    #[test]
    fn test_removed_items_are_soft_deleted_and_sent_first() {
        let previous = vec![
            ClientUrl::with_id(1, UrlKind::Redirect, "https://a"),
            ClientUrl::with_id(2, UrlKind::Redirect, "https://b"),
        ];
        let desired = vec![ClientUrl::with_id(2, UrlKind::Redirect, "https://b")];
        let changes = ChangeSet::build(&previous, &desired);

        assert_eq!(changes.to_delete.len(), 1);
        assert_eq!(changes.to_delete[0].id, 1);
        assert!(changes.to_delete[0].deleted);

        let payload = changes.payload();
        assert_eq!(payload.len(), 2);
        assert!(payload[0].deleted);
        assert_eq!(payload[1], desired[0]);
    }

    #[test]
    fn test_identical_states_are_unchanged() {
        let state = vec![Claim::with_id(4, "read")];
        let changes = ChangeSet::build(&state, &state);
        assert!(changes.is_unchanged());
        assert_eq!(changes.payload(), state);
    }

    #[test]
    fn test_pending_deleted_items_are_dropped() {
        let mut legacy = Claim::new("legacy");
        legacy.deleted = true;
        let desired = vec![Claim::with_id(4, "read"), legacy];
        let changes = ChangeSet::build(&[Claim::with_id(4, "read")], &desired);

        assert!(changes.to_create.is_empty());
        assert_eq!(changes.to_update, vec![Claim::with_id(4, "read")]);
        assert!(changes.is_unchanged());
    }

    #[test]
    fn test_value_change_keeps_id() {
        let previous = vec![Claim::with_id(4, "read")];
        let desired = vec![Claim::with_id(4, "read:all")];
        let changes = ChangeSet::build(&previous, &desired);
        assert!(changes.to_delete.is_empty());
        assert_eq!(changes.to_update[0].value, "read:all");
    }
}
