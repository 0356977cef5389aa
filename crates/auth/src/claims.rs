use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use storefront_core::UserId;

use crate::Role;

/// Session tokens are valid for three days.
pub const TOKEN_TTL_DAYS: i64 = 3;

/// JWT claims carried by every session token.
///
/// `iat` / `exp` are unix seconds so the standard registered claims line up
/// with what `jsonwebtoken` expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: UserId,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl JwtClaims {
    pub fn new(sub: UserId, role: Role, now: DateTime<Utc>) -> Self {
        Self::with_ttl(sub, role, now, Duration::days(TOKEN_TTL_DAYS))
    }

    pub fn with_ttl(sub: UserId, role: Role, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub,
            role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.iat, 0).single()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,
}

/// Validate the time window of already-decoded claims against `now`.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    let now = now.timestamp();
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_claims_are_valid_for_three_days() {
        let now = Utc::now();
        let claims = JwtClaims::new(UserId::new(), Role::USER, now);

        assert!(validate_claims(&claims, now).is_ok());
        assert!(validate_claims(&claims, now + Duration::days(2)).is_ok());
        assert_eq!(
            validate_claims(&claims, now + Duration::days(3)),
            Err(TokenValidationError::Expired)
        );
    }

    #[test]
    fn claims_from_the_future_are_rejected() {
        let now = Utc::now();
        let claims = JwtClaims::new(UserId::new(), Role::ADMIN, now + Duration::hours(1));
        assert_eq!(validate_claims(&claims, now), Err(TokenValidationError::NotYetValid));
    }

    #[test]
    fn role_serializes_as_plain_string() {
        let claims = JwtClaims::new(UserId::new(), Role::SUPERADMIN, Utc::now());
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["role"], "superadmin");
    }
}
