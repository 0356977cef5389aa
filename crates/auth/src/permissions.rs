use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Role;

/// Permission identifier (e.g. `"products.review"`).
///
/// The wildcard `"*"` grants everything; admin roles receive it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));

    pub const PRODUCTS_WRITE: Permission = Permission(Cow::Borrowed("products.write"));
    pub const PRODUCTS_REVIEW: Permission = Permission(Cow::Borrowed("products.review"));
    pub const FAVOURITES_WRITE: Permission = Permission(Cow::Borrowed("favourites.write"));
    pub const CHECKOUT: Permission = Permission(Cow::Borrowed("checkout"));
    pub const VEHICLES_WRITE: Permission = Permission(Cow::Borrowed("vehicles.write"));
    pub const ORDERS_WRITE: Permission = Permission(Cow::Borrowed("orders.write"));
    pub const ORDERS_READ_ALL: Permission = Permission(Cow::Borrowed("orders.read_all"));
    pub const TRACKING_WRITE: Permission = Permission(Cow::Borrowed("tracking.write"));
    pub const INVOICES_WRITE: Permission = Permission(Cow::Borrowed("invoices.write"));
    pub const SALES_WRITE: Permission = Permission(Cow::Borrowed("sales.write"));
    pub const SALES_READ: Permission = Permission(Cow::Borrowed("sales.read"));
    pub const USERS_READ: Permission = Permission(Cow::Borrowed("users.read"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static role → permission policy.
///
/// Shoppers may review, favourite, check out, list vehicles and place orders.
/// Catalog management, fulfilment, invoicing, sales and user administration
/// are admin-only.
pub fn permissions_for_role(role: &Role) -> Vec<Permission> {
    if role.is_admin() {
        return vec![Permission::WILDCARD];
    }

    vec![
        Permission::PRODUCTS_REVIEW,
        Permission::FAVOURITES_WRITE,
        Permission::CHECKOUT,
        Permission::VEHICLES_WRITE,
        Permission::ORDERS_WRITE,
    ]
}
