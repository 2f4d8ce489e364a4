//! # Validation
//!
//! Two layers run before any remote write:
//!
//! - declaration checks (`ValidationError`): empty or duplicate values that
//!   the correlator cannot disambiguate, missing required attributes
//! - the invariant check (`InvariantViolation`): every required client
//!   collection keeps at least one non-deleted item

use super::ReconcileError;
use crate::model::{live_count, Account, ChildItem, Client, Collection, UrlKind};
use std::collections::HashSet;

/// Check the collection invariants of a client
///
/// Every URL subtype and the claims must keep at least one non-deleted item.
///
/// # Errors
/// Returns `InvariantViolation` naming the first empty collection.
pub fn validate(client: &Client) -> Result<(), ReconcileError> {
    for kind in UrlKind::ALL {
        if live_count(client.urls_of(kind)) == 0 {
            return Err(ReconcileError::InvariantViolation {
                collection: kind.collection(),
            });
        }
    }
    if live_count(&client.claims) == 0 {
        return Err(ReconcileError::InvariantViolation {
            collection: Collection::Claims,
        });
    }
    Ok(())
}

/// Reject client declarations the reconciler cannot handle safely
///
/// # Errors
/// Returns `Validation` for an empty name or scope set, an empty URL or claim
/// value, or two non-deleted items sharing a value within one collection.
pub fn validate_client_declaration(client: &Client) -> Result<(), ReconcileError> {
    if client.name.trim().is_empty() {
        return Err(ReconcileError::validation("client name cannot be empty"));
    }
    if client.scopes.trim().is_empty() {
        return Err(ReconcileError::validation(format!(
            "client '{}' must declare at least one scope",
            client.name
        )));
    }
    for kind in UrlKind::ALL {
        let urls = client.urls_of(kind);
        if let Some(url) = urls.iter().find(|url| url.kind != kind) {
            return Err(ReconcileError::validation(format!(
                "URL '{}' of type {} is filed under {}",
                url.value,
                url.kind,
                kind.collection()
            )));
        }
        check_values(kind.collection(), urls)?;
    }
    check_values(Collection::Claims, &client.claims)?;
    Ok(())
}

/// Reject account declarations the reconciler cannot handle safely
///
/// # Errors
/// Returns `Validation` for a missing username or password, more than one
/// username, an empty property key, or a duplicated property key.
pub fn validate_account_declaration(account: &Account) -> Result<(), ReconcileError> {
    match account.usernames.as_slice() {
        [username] if !username.trim().is_empty() => {}
        [] | [_] => return Err(ReconcileError::validation("account username cannot be empty")),
        _ => {
            return Err(ReconcileError::validation(
                "an account must declare exactly one username",
            ))
        }
    }
    if account.password.is_empty() && account.id == 0 {
        return Err(ReconcileError::validation(format!(
            "account '{}' needs a password to be created",
            account.username()
        )));
    }
    let mut keys = HashSet::new();
    for property in &account.properties {
        if property.key.trim().is_empty() {
            return Err(ReconcileError::validation(format!(
                "account '{}' has a property with an empty key",
                account.username()
            )));
        }
        if !keys.insert(property.key.as_str()) {
            return Err(ReconcileError::validation(format!(
                "property key '{}' is declared more than once",
                property.key
            )));
        }
    }
    Ok(())
}

// Duplicates among non-deleted items make sorted correlation ambiguous.
// A deleted item may share its value with a re-declared one.
fn check_values<T: ChildItem>(collection: Collection, items: &[T]) -> Result<(), ReconcileError> {
    let mut seen = HashSet::new();
    for item in items.iter().filter(|item| item.is_live()) {
        if item.key().trim().is_empty() {
            return Err(ReconcileError::validation(format!(
                "{collection} cannot contain an empty value"
            )));
        }
        if !seen.insert(item.key()) {
            return Err(ReconcileError::validation(format!(
                "'{}' appears more than once in {collection}",
                item.key()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Claim, ClientUrl, Property};

    fn client() -> Client {
        let mut client = Client::new("portal", "openid");
        client.set_urls(vec![
            ClientUrl::new(UrlKind::Redirect, "https://a"),
            ClientUrl::new(UrlKind::Cors, "https://b"),
            ClientUrl::new(UrlKind::PostLogout, "https://c"),
        ]);
        client.claims.push(Claim::new("read"));
        client
    }

    #[test]
    fn test_complete_client_passes() {
        assert!(validate(&client()).is_ok());
        assert!(validate_client_declaration(&client()).is_ok());
    }

    #[test]
    fn test_each_url_kind_is_required() {
        for kind in UrlKind::ALL {
            let mut client = client();
            client.urls_of_mut(kind).clear();
            match validate(&client) {
                Err(ReconcileError::InvariantViolation { collection }) => {
                    assert_eq!(collection, kind.collection());
                }
                other => panic!("expected invariant violation for {kind}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_deleted_items_do_not_count() {
        let mut client = client();
        client.claims[0].deleted = true;
        assert!(matches!(
            validate(&client),
            Err(ReconcileError::InvariantViolation {
                collection: Collection::Claims
            })
        ));
    }

    #[test]
    fn test_duplicate_live_values_rejected() {
        let mut client = client();
        client.claims.push(Claim::new("read"));
        let err = validate_client_declaration(&client).unwrap_err();
        assert!(matches!(err, ReconcileError::Validation(_)));
        assert!(err.to_string().contains("'read' appears more than once in claims"));
    }

    #[test]
    fn test_deleted_duplicate_allowed() {
        let mut client = client();
        let mut old = Claim::with_id(3, "read");
        old.deleted = true;
        client.claims.push(old);
        assert!(validate_client_declaration(&client).is_ok());
    }

    #[test]
    fn test_same_value_in_different_url_kinds_allowed() {
        let mut client = client();
        client.cors_urls.push(ClientUrl::new(UrlKind::Cors, "https://a"));
        assert!(validate_client_declaration(&client).is_ok());
    }

    #[test]
    fn test_misfiled_url_rejected() {
        let mut client = client();
        client.redirect_urls.push(ClientUrl::new(UrlKind::Cors, "https://x"));
        assert!(validate_client_declaration(&client).is_err());
    }

    #[test]
    fn test_empty_values_rejected() {
        let mut client = client();
        client.claims.push(Claim::new(" "));
        assert!(validate_client_declaration(&client).is_err());

        let mut client = self::client();
        client.scopes = String::new();
        assert!(validate_client_declaration(&client).is_err());
    }

    #[test]
    fn test_account_declaration() {
        let mut account = Account::new("ada@example.com", "pw");
        account.properties = vec![Property::new("team", "red")];
        assert!(validate_account_declaration(&account).is_ok());

        account.properties.push(Property::new("team", "blue"));
        assert!(validate_account_declaration(&account).is_err());

        let nameless = Account::new("", "pw");
        assert!(validate_account_declaration(&nameless).is_err());

        let passwordless = Account::new("ada@example.com", "");
        assert!(validate_account_declaration(&passwordless).is_err());
    }
}
