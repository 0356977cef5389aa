use std::collections::HashSet;

use thiserror::Error;

use storefront_core::UserId;

use crate::{Permission, Role, permissions_for_role};

/// A resolved principal for authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
    pub permissions: Vec<Permission>,
}

impl Principal {
    /// Build a principal whose permissions come from the static role policy.
    pub fn from_role(user_id: UserId, role: Role) -> Self {
        let permissions = permissions_for_role(&role);
        Self {
            user_id,
            role,
            permissions,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Pure policy check; no IO.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let perms: HashSet<&str> = principal.permissions.iter().map(|p| p.as_str()).collect();

    if perms.contains("*") || perms.contains(required.as_str()) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_wildcard_grants_everything() {
        let admin = Principal::from_role(UserId::new(), Role::ADMIN);
        assert!(authorize(&admin, &Permission::USERS_READ).is_ok());
        assert!(authorize(&admin, &Permission::new("anything.at.all")).is_ok());
    }

    #[test]
    fn shoppers_can_review_but_not_manage_catalog() {
        let user = Principal::from_role(UserId::new(), Role::USER);
        assert!(authorize(&user, &Permission::PRODUCTS_REVIEW).is_ok());

        let err = authorize(&user, &Permission::PRODUCTS_WRITE).unwrap_err();
        assert_eq!(err, AuthzError::Forbidden("products.write".to_string()));
    }
}
