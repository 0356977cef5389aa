//! Credential hashing and password-reset tokens.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use storefront_core::{DomainError, UserId};

/// bcrypt work factor.
pub const BCRYPT_COST: u32 = 10;
const MIN_PASSWORD_LEN: usize = 8;

/// Reset tokens expire thirty minutes after issue.
pub const RESET_TOKEN_TTL_MINUTES: i64 = 30;

/// bcrypt password hash in its modular crypt form (`$2b$10$...`).
///
/// Hashing and verifying are CPU bound; async callers run them on a blocking
/// thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hash `raw` with a fresh random salt.
    pub fn hash(raw: &str) -> Result<Self, DomainError> {
        bcrypt::hash(raw, BCRYPT_COST)
            .map(Self)
            .map_err(|e| DomainError::InvariantViolation(format!("password hashing failed: {e}")))
    }

    /// Malformed stored hashes never verify.
    pub fn verify(&self, raw: &str) -> bool {
        bcrypt::verify(raw, &self.0).unwrap_or(false)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Password policy: at least 8 characters with a lowercase letter, an
/// uppercase letter, a digit and a symbol.
pub fn validate_password_strength(raw: &str) -> Result<(), DomainError> {
    let long_enough = raw.chars().count() >= MIN_PASSWORD_LEN;
    let lower = raw.chars().any(|c| c.is_lowercase());
    let upper = raw.chars().any(|c| c.is_uppercase());
    let digit = raw.chars().any(|c| c.is_ascii_digit());
    let symbol = raw.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace());

    if long_enough && lower && upper && digit && symbol {
        Ok(())
    } else {
        Err(DomainError::validation("Password not strong enough"))
    }
}

/// One-time password reset token.
///
/// The wire form is `<user id>.<64 hex chars>`; only the SHA-256 digest of the
/// secret part is ever persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetToken {
    user_id: UserId,
    secret: String,
}

impl ResetToken {
    /// 32 random bytes, hex encoded.
    pub fn generate(user_id: UserId) -> Self {
        let bytes: [u8; 32] = rand::random();
        Self {
            user_id,
            secret: hex::encode(bytes),
        }
    }

    pub fn parse(token: &str) -> Result<Self, DomainError> {
        let invalid = || DomainError::validation("Reset token is invalid or has expired");

        let (user_id, secret) = token.trim().split_once('.').ok_or_else(invalid)?;
        let user_id = user_id.parse::<UserId>().map_err(|_| invalid())?;
        if secret.len() != 64 || !secret.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        Ok(Self {
            user_id,
            secret: secret.to_ascii_lowercase(),
        })
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn digest(&self) -> String {
        digest_secret(&self.secret)
    }
}

impl core::fmt::Display for ResetToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.user_id, self.secret)
    }
}

pub(crate) fn digest_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}
