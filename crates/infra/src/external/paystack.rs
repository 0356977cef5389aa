//! Paystack payment gateway client.
//!
//! Only the two calls checkout needs: transaction initialisation and
//! verification by reference. Amounts travel in minor units (kobo).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use storefront_products::{PaymentReference, PaymentStatus};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway is not configured")]
    NotConfigured,

    #[error("payment gateway request failed: {0}")]
    Transport(String),

    #[error("payment gateway rejected the request: {0}")]
    Rejected(String),

    #[error("unexpected payment gateway response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitializeTransaction {
    pub email: String,
    /// Minor units.
    pub amount: u64,
    pub reference: PaymentReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InitializedTransaction {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedTransaction {
    pub reference: String,
    /// Raw gateway status (`success`, `abandoned`, ...).
    pub gateway_status: String,
    pub status: PaymentStatus,
    pub amount: Option<u64>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initialize(&self, request: InitializeTransaction) -> Result<InitializedTransaction, GatewayError>;

    async fn verify(&self, reference: &PaymentReference) -> Result<VerifiedTransaction, GatewayError>;
}

#[async_trait]
impl<G> PaymentGateway for std::sync::Arc<G>
where
    G: PaymentGateway + ?Sized,
{
    async fn initialize(&self, request: InitializeTransaction) -> Result<InitializedTransaction, GatewayError> {
        (**self).initialize(request).await
    }

    async fn verify(&self, reference: &PaymentReference) -> Result<VerifiedTransaction, GatewayError> {
        (**self).verify(reference).await
    }
}

/// Paystack response wrapper: `{ status, message, data }`.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    status: bool,
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    reference: String,
    amount: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct PaystackGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl PaystackGateway {
    pub fn new(base_url: impl Into<String>, secret_key: impl Into<String>) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        })
    }

    fn ensure_configured(&self) -> Result<(), GatewayError> {
        if self.secret_key.is_empty() {
            return Err(GatewayError::NotConfigured);
        }
        Ok(())
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
        let http_status = response.status();
        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        if !http_status.is_success() || !body.status {
            warn!(%http_status, message = %body.message, "paystack rejected request");
            return Err(GatewayError::Rejected(body.message));
        }
        body.data
            .ok_or_else(|| GatewayError::Decode("response has no data".to_string()))
    }
}

#[async_trait]
impl PaymentGateway for PaystackGateway {
    #[instrument(skip(self, request), fields(reference = %request.reference.as_str()))]
    async fn initialize(&self, request: InitializeTransaction) -> Result<InitializedTransaction, GatewayError> {
        self.ensure_configured()?;
        let response = self
            .client
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let data: InitializedTransaction = Self::read(response).await?;
        debug!("transaction initialised");
        Ok(data)
    }

    #[instrument(skip(self), fields(reference = %reference.as_str()))]
    async fn verify(&self, reference: &PaymentReference) -> Result<VerifiedTransaction, GatewayError> {
        self.ensure_configured()?;
        let response = self
            .client
            .get(format!("{}/transaction/verify/{}", self.base_url, reference.as_str()))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let data: VerifyData = Self::read(response).await?;
        Ok(VerifiedTransaction {
            status: PaymentStatus::from_gateway(&data.status),
            gateway_status: data.status,
            reference: data.reference,
            amount: data.amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_body_uses_paystack_field_names() {
        let body = serde_json::to_value(InitializeTransaction {
            email: "ada@example.com".to_string(),
            amount: 25_000,
            reference: PaymentReference::parse("paystack_1_abc").unwrap(),
            callback_url: None,
        })
        .unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "email": "ada@example.com",
                "amount": 25_000,
                "reference": "paystack_1_abc"
            })
        );
    }

    #[test]
    fn verify_payload_decodes() {
        let raw = r#"{"status":true,"message":"Verification successful",
            "data":{"status":"abandoned","reference":"paystack_1_abc","amount":500,"currency":"NGN"}}"#;
        let parsed: ApiResponse<VerifyData> = serde_json::from_str(raw).unwrap();
        let data = parsed.data.unwrap();

        assert!(parsed.status);
        assert_eq!(PaymentStatus::from_gateway(&data.status), PaymentStatus::Failed);
        assert_eq!(data.amount, Some(500));
    }

    #[tokio::test]
    async fn unconfigured_gateway_fails_fast() {
        let gateway = PaystackGateway::new("https://api.paystack.co", "").unwrap();
        let reference = PaymentReference::parse("paystack_1_abc").unwrap();

        assert!(matches!(gateway.verify(&reference).await, Err(GatewayError::NotConfigured)));
    }
}
