use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use storefront_auth::{Principal, Role};
use storefront_core::UserId;

use crate::app::errors::ApiError;

/// The authenticated caller (resolved from the bearer token and the user
/// directory).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user_id: UserId,
    role: Role,
    email: String,
}

impl PrincipalContext {
    pub fn new(user_id: UserId, role: Role, email: impl Into<String>) -> Self {
        Self {
            user_id,
            role,
            email: email.into(),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn principal(&self) -> Principal {
        Principal::from_role(self.user_id, self.role.clone())
    }
}

/// Result of bearer authentication, stored in request extensions by
/// `middleware::auth_middleware`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authentication {
    /// No `Authorization` header.
    Anonymous,
    /// A header was sent but the token or its user did not check out.
    Rejected,
    Authenticated(PrincipalContext),
}

#[async_trait]
impl<S> FromRequestParts<S> for PrincipalContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Authentication>() {
            Some(Authentication::Authenticated(principal)) => Ok(principal.clone()),
            Some(Authentication::Rejected) => Err(ApiError::Unauthenticated("Request is not authorized")),
            Some(Authentication::Anonymous) | None => {
                Err(ApiError::Unauthenticated("Authorization token required"))
            }
        }
    }
}

/// An authenticated caller holding `admin` or `superadmin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminContext(pub PrincipalContext);

#[async_trait]
impl<S> FromRequestParts<S> for AdminContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let principal = PrincipalContext::from_request_parts(parts, state).await?;
        if !principal.is_admin() {
            return Err(ApiError::forbidden());
        }
        Ok(Self(principal))
    }
}
