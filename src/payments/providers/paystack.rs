use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentGateway;
use crate::payments::types::{
    GatewayVerification, InitializePaymentRequest, InitializedPayment, Money, PaymentState,
    WebhookEvent, WebhookVerificationResult,
};
use crate::payments::utils::{verify_hmac_sha512_hex, PaymentHttpClient};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct PaystackConfig {
    pub public_key: Option<String>,
    pub secret_key: String,
    pub webhook_secret: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for PaystackConfig {
    fn default() -> Self {
        Self {
            public_key: None,
            secret_key: String::new(),
            webhook_secret: None,
            base_url: "https://api.paystack.co".to_string(),
            timeout_secs: 30,
        }
    }
}

impl PaystackConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let secret_key =
            std::env::var("PAYSTACK_SECRET_KEY").map_err(|_| PaymentError::ConfigurationError {
                message: "PAYSTACK_SECRET_KEY environment variable is required".to_string(),
            })?;

        Ok(Self {
            public_key: std::env::var("PAYSTACK_PUBLIC_KEY").ok(),
            webhook_secret: std::env::var("PAYSTACK_WEBHOOK_SECRET").ok(),
            base_url: std::env::var("PAYSTACK_BASE_URL")
                .unwrap_or_else(|_| "https://api.paystack.co".to_string()),
            timeout_secs: std::env::var("PAYSTACK_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
            secret_key,
        })
    }
}

pub struct PaystackGateway {
    config: PaystackConfig,
    http: PaymentHttpClient,
}

impl PaystackGateway {
    pub fn new(config: PaystackConfig) -> PaymentResult<Self> {
        if config.secret_key.trim().is_empty() {
            return Err(PaymentError::ConfigurationError {
                message: "paystack secret key is empty".to_string(),
            });
        }
        let http = PaymentHttpClient::new(Duration::from_secs(config.timeout_secs))?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> PaymentResult<Self> {
        Self::new(PaystackConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }
}

#[async_trait]
impl PaymentGateway for PaystackGateway {
    async fn initialize_payment(
        &self,
        request: InitializePaymentRequest,
    ) -> PaymentResult<InitializedPayment> {
        request.amount.validate_positive("amount")?;
        if request.email.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "email is required for paystack initialization".to_string(),
                field: Some("email".to_string()),
            });
        }

        // Paystack takes amounts in minor units; this is the only place the
        // conversion out of major units happens.
        let amount_minor = request.amount.to_minor_units()?;

        let payload = serde_json::json!({
            "email": request.email,
            "amount": amount_minor,
            "currency": request.amount.currency,
            "reference": request.reference,
            "callback_url": request.callback_url,
            "metadata": request.metadata,
        });

        let raw: PaystackEnvelope<PaystackInitializeData> = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/transaction/initialize"),
                Some(&self.config.secret_key),
                Some(&payload),
                &[("Content-Type", "application/json")],
            )
            .await?;

        if !raw.status {
            return Err(PaymentError::ProviderError {
                gateway: "paystack".to_string(),
                message: raw.message,
                provider_code: None,
                retryable: false,
            });
        }
        let data = raw.data;
        info!(reference = %data.reference, "paystack checkout initialized");

        Ok(InitializedPayment {
            authorization_url: data.authorization_url,
            access_code: data.access_code,
            reference: data.reference,
        })
    }

    async fn verify_payment(&self, reference: &str) -> PaymentResult<GatewayVerification> {
        if reference.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "reference is required".to_string(),
                field: Some("reference".to_string()),
            });
        }

        let raw: PaystackEnvelope<PaystackVerifyData> = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!("/transaction/verify/{}", reference)),
                Some(&self.config.secret_key),
                None,
                &[],
            )
            .await?;
        if !raw.status {
            return Err(PaymentError::ProviderError {
                gateway: "paystack".to_string(),
                message: raw.message,
                provider_code: None,
                retryable: false,
            });
        }

        let status = match raw.data.status.as_str() {
            "success" => PaymentState::Success,
            "pending" => PaymentState::Pending,
            "failed" => PaymentState::Failed,
            "abandoned" => PaymentState::Abandoned,
            "reversed" => PaymentState::Reversed,
            _ => PaymentState::Unknown,
        };

        Ok(GatewayVerification {
            status,
            status_text: raw.data.status,
            amount: Money::from_minor_units(raw.data.amount as i64, raw.data.currency),
            paid_at: raw.data.paid_at,
            channel: raw.data.channel,
            gateway_response: raw.data.gateway_response,
            metadata: raw.data.metadata,
        })
    }

    fn name(&self) -> &'static str {
        "paystack"
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> PaymentResult<WebhookVerificationResult> {
        let secret = self
            .config
            .webhook_secret
            .as_deref()
            .unwrap_or(&self.config.secret_key);
        let valid = verify_hmac_sha512_hex(payload, secret, signature);
        Ok(WebhookVerificationResult {
            valid,
            reason: if valid {
                None
            } else {
                Some("invalid paystack signature".to_string())
            },
        })
    }

    fn parse_webhook_event(&self, payload: &[u8]) -> PaymentResult<WebhookEvent> {
        let parsed: JsonValue = serde_json::from_slice(payload).map_err(|e| {
            PaymentError::WebhookVerificationError {
                message: format!("invalid webhook JSON payload: {}", e),
            }
        })?;

        let event_type = parsed
            .get("event")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        let reference = parsed
            .get("data")
            .and_then(|v| v.get("reference"))
            .and_then(|v| v.as_str())
            .map(|v| v.to_string());
        let status = parsed
            .get("data")
            .and_then(|v| v.get("status"))
            .and_then(|v| v.as_str())
            .map(|v| match v {
                "success" => PaymentState::Success,
                "pending" => PaymentState::Pending,
                "failed" => PaymentState::Failed,
                "abandoned" => PaymentState::Abandoned,
                _ => PaymentState::Unknown,
            });

        Ok(WebhookEvent {
            event_type,
            reference,
            status,
            payload: parsed,
            received_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct PaystackEnvelope<T> {
    status: bool,
    message: String,
    data: T,
}

#[derive(Debug, Deserialize)]
struct PaystackInitializeData {
    authorization_url: String,
    access_code: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct PaystackVerifyData {
    amount: u64,
    currency: String,
    status: String,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    paid_at: Option<String>,
    #[serde(default)]
    gateway_response: Option<String>,
    #[serde(default)]
    metadata: JsonValue,
}
