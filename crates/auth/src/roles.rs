use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role identifier used for RBAC.
///
/// Serialized as a bare string (`"user"`, `"admin"`, `"superadmin"`), which is
/// also how it travels inside JWT claims.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const USER: Role = Role(Cow::Borrowed("user"));
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));
    pub const SUPERADMIN: Role = Role(Cow::Borrowed("superadmin"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Parse one of the known roles (case-insensitive).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Self::USER),
            "admin" => Some(Self::ADMIN),
            "superadmin" => Some(Self::SUPERADMIN),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Admin routes accept both `admin` and `superadmin`.
    pub fn is_admin(&self) -> bool {
        *self == Self::ADMIN || *self == Self::SUPERADMIN
    }

    pub fn is_superadmin(&self) -> bool {
        *self == Self::SUPERADMIN
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::USER
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_known_roles_only() {
        assert_eq!(Role::parse("Admin"), Some(Role::ADMIN));
        assert_eq!(Role::parse(" superadmin "), Some(Role::SUPERADMIN));
        assert_eq!(Role::parse("root"), None);
    }

    #[test]
    fn superadmin_counts_as_admin() {
        assert!(Role::SUPERADMIN.is_admin());
        assert!(Role::ADMIN.is_admin());
        assert!(!Role::USER.is_admin());
    }
}
