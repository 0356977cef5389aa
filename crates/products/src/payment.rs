use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use storefront_core::{DomainError, Entity, UserId};

/// Globally unique transaction token shared with the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentReference(String);

impl PaymentReference {
    /// `paystack_<unix millis>_<random>`.
    ///
    /// The random suffix keeps two checkouts in the same millisecond apart;
    /// actual uniqueness is enforced when the payment intent stream is created.
    pub fn generate(now: DateTime<Utc>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("paystack_{}_{}", now.timestamp_millis(), &suffix[..12]))
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(DomainError::validation("payment reference cannot be empty"));
        }
        if raw.len() > 100 || raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(DomainError::validation("payment reference is malformed"));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for PaymentReference {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    /// Map a gateway transaction status onto ours.
    pub fn from_gateway(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "success" => PaymentStatus::Success,
            "failed" | "abandoned" | "reversed" => PaymentStatus::Failed,
            _ => PaymentStatus::Pending,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl core::str::FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "success" => Ok(PaymentStatus::Success),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(DomainError::validation(format!("unknown payment status '{other}'"))),
        }
    }
}

/// A payment recorded against a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub user: UserId,
    pub amount: u64,
    pub reference: PaymentReference,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl Entity for Payment {
    type Id = PaymentReference;

    fn id(&self) -> &Self::Id {
        &self.reference
    }
}
