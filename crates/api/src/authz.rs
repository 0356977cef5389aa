//! API-side authorization guard for commands.
//!
//! Checked in the handler before dispatch; aggregates only enforce
//! ownership rules that depend on their own state (vehicle owner).

use storefront_auth::{Permission, authorize};

use crate::app::errors::ApiError;
use crate::context::PrincipalContext;

pub fn require(principal: &PrincipalContext, permission: &Permission) -> Result<(), ApiError> {
    authorize(&principal.principal(), permission)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_auth::Role;
    use storefront_core::UserId;

    #[test]
    fn shoppers_are_denied_catalog_writes() {
        let shopper = PrincipalContext::new(UserId::new(), Role::USER, "a@b.co");
        assert!(matches!(
            require(&shopper, &Permission::PRODUCTS_WRITE),
            Err(ApiError::Forbidden(_))
        ));
        assert!(require(&shopper, &Permission::CHECKOUT).is_ok());
    }

    #[test]
    fn admins_pass_every_check() {
        let admin = PrincipalContext::new(UserId::new(), Role::ADMIN, "root@b.co");
        assert!(require(&admin, &Permission::SALES_READ).is_ok());
    }
}
