//! `storefront-auth`: accounts, credentials, tokens and role policy.
//!
//! Decoupled from HTTP and storage: the api crate feeds it bearer tokens and
//! the infra crate persists the `User` aggregate's events.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod password;
pub mod permissions;
pub mod roles;
pub mod user;

pub use authorize::{AuthzError, Principal, authorize};
pub use claims::{JwtClaims, TOKEN_TTL_DAYS, TokenValidationError, validate_claims};
pub use jwt::{Hs256Jwt, JwtError};
pub use password::{PasswordHash, ResetToken, validate_password_strength};
pub use permissions::{Permission, permissions_for_role};
pub use roles::Role;
pub use user::{
    AuthProvider, IssuePasswordReset, PasswordReset, PasswordResetIssued, ResetPassword, SignUp,
    SignedUp, User, UserCommand, UserEvent,
};
