//! Account planning. Accounts have no child collections with server ids;
//! their properties are keyed, written one at a time and never deleted.

use super::validation::validate_account_declaration;
use super::ReconcileError;
use crate::model::{Account, AccountStatus, Property};

/// Remote writes needed to bring an account to its desired state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccountPlan {
    pub role_change: Option<String>,
    pub state_change: Option<AccountStatus>,
    /// New keys and keys whose value changed, ordered by key
    pub properties_to_put: Vec<Property>,
}

impl AccountPlan {
    pub fn is_noop(&self) -> bool {
        self.role_change.is_none()
            && self.state_change.is_none()
            && self.properties_to_put.is_empty()
    }
}

/// Plan the writes that follow the creation of an account
///
/// # Errors
/// Returns `Validation` for a malformed declaration.
pub fn plan_account_create(desired: &Account) -> Result<AccountPlan, ReconcileError> {
    validate_account_declaration(desired)?;

    let mut properties = desired.properties.clone();
    properties.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(AccountPlan {
        role_change: (!desired.role.is_empty()).then(|| desired.role.clone()),
        state_change: (desired.status == AccountStatus::Disabled)
            .then_some(AccountStatus::Disabled),
        properties_to_put: properties,
    })
}

/// Plan the writes from the previously reconciled account to the desired one
///
/// # Errors
/// Returns `Validation` for a malformed declaration, a changed username, or a
/// declaration that drops a property. Properties cannot be deleted.
pub fn plan_account_update(
    previous: &Account,
    desired: &Account,
) -> Result<AccountPlan, ReconcileError> {
    validate_account_declaration(desired)?;

    if previous.username() != desired.username() {
        return Err(ReconcileError::validation(format!(
            "account username cannot change from '{}' to '{}'",
            previous.username(),
            desired.username()
        )));
    }
    if desired.properties.len() < previous.properties.len() {
        return Err(ReconcileError::validation(format!(
            "account '{}' declares {} properties but {} exist; properties cannot be deleted",
            desired.username(),
            desired.properties.len(),
            previous.properties.len()
        )));
    }
    if let Some(dropped) = previous
        .properties
        .iter()
        .find(|property| desired.property(&property.key).is_none())
    {
        return Err(ReconcileError::validation(format!(
            "property '{}' of account '{}' cannot be removed",
            dropped.key,
            desired.username()
        )));
    }

    let mut properties_to_put: Vec<Property> = desired
        .properties
        .iter()
        .filter(|property| {
            previous
                .property(&property.key)
                .map_or(true, |existing| existing.value != property.value)
        })
        .cloned()
        .collect();
    properties_to_put.sort_by(|a, b| a.key.cmp(&b.key));

    Ok(AccountPlan {
        role_change: (previous.role != desired.role && !desired.role.is_empty())
            .then(|| desired.role.clone()),
        state_change: (previous.status != desired.status).then_some(desired.status),
        properties_to_put,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Account {
        let mut account = Account::new("ada@example.com", "pw");
        account.role = "User".to_string();
        account.properties = vec![Property::new("team", "red"), Property::new("site", "pgh")];
        account
    }

    #[test]
    fn test_create_puts_every_property_in_key_order() {
        let plan = plan_account_create(&account()).unwrap();
        assert_eq!(plan.role_change.as_deref(), Some("User"));
        assert_eq!(plan.state_change, None);
        let keys: Vec<&str> = plan.properties_to_put.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["site", "team"]);
    }

    #[test]
    fn test_update_only_sends_changes() {
        let previous = account();
        let mut desired = account();
        desired.properties[0].value = "blue".to_string();
        desired.properties.push(Property::new("floor", "3"));

        let plan = plan_account_update(&previous, &desired).unwrap();
        assert_eq!(plan.role_change, None);
        let keys: Vec<&str> = plan.properties_to_put.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["floor", "team"]);
    }

    #[test]
    fn test_update_of_identical_account_is_noop() {
        assert!(plan_account_update(&account(), &account()).unwrap().is_noop());
    }

    #[test]
    fn test_fewer_properties_is_rejected() {
        let previous = account();
        let mut desired = account();
        desired.properties.pop();
        let err = plan_account_update(&previous, &desired).unwrap_err();
        assert!(err.to_string().contains("properties cannot be deleted"));
    }

    #[test]
    fn test_renamed_property_is_rejected() {
        let previous = account();
        let mut desired = account();
        desired.properties[1].key = "location".to_string();
        assert!(matches!(
            plan_account_update(&previous, &desired),
            Err(ReconcileError::Validation(_))
        ));
    }

    #[test]
    fn test_role_and_state_changes() {
        let previous = account();
        let mut desired = account();
        desired.role = "Admin".to_string();
        desired.status = AccountStatus::Disabled;
        let plan = plan_account_update(&previous, &desired).unwrap();
        assert_eq!(plan.role_change.as_deref(), Some("Admin"));
        assert_eq!(plan.state_change, Some(AccountStatus::Disabled));
    }
}
