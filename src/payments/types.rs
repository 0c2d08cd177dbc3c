use bigdecimal::{BigDecimal, ToPrimitive};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::payments::error::PaymentError;

/// A monetary amount in **major** currency units.
///
/// The payment gateway speaks in integer minor units (kobo, pesewas,
/// cents); everything else in this service speaks major units. The
/// conversion happens here and nowhere else.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Money {
    pub amount: BigDecimal,
    pub currency: String,
}

impl Money {
    pub fn new(amount: BigDecimal, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }

    /// Minor units per major unit for a currency. Every currency the
    /// gateway supports (NGN, GHS, ZAR, KES, USD) uses two-decimal
    /// subunits.
    pub fn subunit_scale(_currency: &str) -> i64 {
        100
    }

    /// Convert a gateway-reported integer minor-unit amount into major units.
    pub fn from_minor_units(minor: i64, currency: impl Into<String>) -> Self {
        let currency = currency.into();
        let scale = Self::subunit_scale(&currency);
        Self {
            amount: BigDecimal::from(minor) / BigDecimal::from(scale),
            currency,
        }
    }

    /// Convert this amount into the integer minor units the gateway expects.
    ///
    /// Fails if the amount has a fraction smaller than one minor unit, or
    /// does not fit an i64.
    pub fn to_minor_units(&self) -> Result<i64, PaymentError> {
        let scaled = &self.amount * BigDecimal::from(Self::subunit_scale(&self.currency));
        if !scaled.is_integer() {
            return Err(PaymentError::ValidationError {
                message: format!(
                    "amount {} {} is not representable in minor units",
                    self.amount, self.currency
                ),
                field: Some("amount".to_string()),
            });
        }
        scaled.to_i64().ok_or(PaymentError::ValidationError {
            message: "amount out of range".to_string(),
            field: Some("amount".to_string()),
        })
    }

    pub fn validate_positive(&self, field: &str) -> Result<(), PaymentError> {
        if self.amount <= BigDecimal::from(0) {
            return Err(PaymentError::ValidationError {
                message: "amount must be greater than zero".to_string(),
                field: Some(field.to_string()),
            });
        }
        if self.currency.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "currency is required".to_string(),
                field: Some("currency".to_string()),
            });
        }
        Ok(())
    }
}

/// Gateway-reported transaction state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Pending,
    Success,
    Failed,
    Abandoned,
    Reversed,
    Unknown,
}

/// Request to initialize a checkout session with the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializePaymentRequest {
    pub email: String,
    pub amount: Money,
    pub reference: String,
    pub callback_url: Option<String>,
    pub metadata: Option<JsonValue>,
}

/// Result of a successful checkout initialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializedPayment {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

/// Result of verifying a transaction by reference.
///
/// A declined payment is a normal value here (`status != Success`), never
/// an error: errors are reserved for transport and protocol failures, where
/// the true outcome is unknown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayVerification {
    pub status: PaymentState,
    /// Raw gateway status text (e.g. "success", "failed", "abandoned")
    pub status_text: String,
    /// Confirmed amount in major units
    pub amount: Money,
    pub paid_at: Option<String>,
    pub channel: Option<String>,
    /// Gateway's human-readable response, used for denial messages
    pub gateway_response: Option<String>,
    /// Metadata echoed back by the gateway (carries donation/issue ids)
    pub metadata: JsonValue,
}

impl GatewayVerification {
    /// True business success per the gateway
    pub fn is_success(&self) -> bool {
        self.status == PaymentState::Success && self.status_text == "success"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookVerificationResult {
    pub valid: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub event_type: String,
    pub reference: Option<String>,
    pub status: Option<PaymentState>,
    pub payload: JsonValue,
    pub received_at: String,
}
