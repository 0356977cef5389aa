//! Process configuration from environment variables.

use std::env;
use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;
use tracing::{info, warn};

const DEV_JWT_SECRET: &str = "storefront-dev-secret-change-me";
const DEFAULT_PAYSTACK_BASE_URL: &str = "https://api.paystack.co";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub jwt_secret: String,
    /// Postgres event store when set; in-memory otherwise.
    pub database_url: Option<String>,
    pub paystack_secret_key: String,
    pub paystack_base_url: String,
    pub paystack_callback_url: Option<String>,
    /// Lets signup self-assign `admin` / `superadmin`.
    pub allow_privileged_signup: bool,
}

impl core::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("jwt_secret", &"<redacted>")
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("paystack_secret_key", &"<redacted>")
            .field("paystack_base_url", &self.paystack_base_url)
            .field("paystack_callback_url", &self.paystack_callback_url)
            .field("allow_privileged_signup", &self.allow_privileged_signup)
            .finish()
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = var("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set, using an insecure development secret");
            DEV_JWT_SECRET.to_string()
        });

        let paystack_secret_key = var("PAYSTACK_SECRET_KEY").unwrap_or_else(|| {
            warn!("PAYSTACK_SECRET_KEY not set, gateway calls will be rejected");
            String::new()
        });

        Ok(Self {
            port: parse_or("PORT", var("PORT"), 8080)?,
            jwt_secret,
            database_url: var("DATABASE_URL"),
            paystack_secret_key,
            paystack_base_url: var("PAYSTACK_BASE_URL")
                .unwrap_or_else(|| DEFAULT_PAYSTACK_BASE_URL.to_string()),
            paystack_callback_url: var("PAYSTACK_CALLBACK_URL"),
            allow_privileged_signup: parse_or("ALLOW_PRIVILEGED_SIGNUP", var("ALLOW_PRIVILEGED_SIGNUP"), false)?,
        })
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match raw {
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.paystack_base_url, "https://api.paystack.co");
        assert!(!cfg.allow_privileged_signup);
    }

    #[test]
    fn explicit_values_win_and_blanks_are_unset() {
        let cfg = config(&[
            ("PORT", "9000"),
            ("JWT_SECRET", "s3cret"),
            ("DATABASE_URL", "  "),
            ("ALLOW_PRIVILEGED_SIGNUP", "true"),
            ("PAYSTACK_CALLBACK_URL", "https://shop.example/callback"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.jwt_secret, "s3cret");
        assert_eq!(cfg.database_url, None);
        assert!(cfg.allow_privileged_signup);
        assert_eq!(cfg.paystack_callback_url.as_deref(), Some("https://shop.example/callback"));
    }

    #[test]
    fn malformed_values_are_errors() {
        let err = config(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let cfg = config(&[("JWT_SECRET", "topsecret")]).unwrap();
        assert!(!format!("{cfg:?}").contains("topsecret"));
    }
}
