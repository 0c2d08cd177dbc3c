use crate::payments::error::PaymentResult;
use crate::payments::types::{
    GatewayVerification, InitializePaymentRequest, InitializedPayment, WebhookEvent,
    WebhookVerificationResult,
};
use async_trait::async_trait;

/// Contract for a payment gateway.
///
/// Implementations perform exactly one outbound call per method and never
/// retry internally; retry policy belongs to the caller. Declined payments
/// are represented in the returned [`GatewayVerification`], not as errors.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Initialize a checkout session and obtain the authorization URL the
    /// donor is redirected to.
    async fn initialize_payment(
        &self,
        request: InitializePaymentRequest,
    ) -> PaymentResult<InitializedPayment>;

    /// Verify a transaction by its reference.
    async fn verify_payment(&self, reference: &str) -> PaymentResult<GatewayVerification>;

    fn name(&self) -> &'static str;

    /// Check a webhook payload's signature.
    fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> PaymentResult<WebhookVerificationResult>;

    /// Parse a webhook payload into a normalized event.
    fn parse_webhook_event(&self, payload: &[u8]) -> PaymentResult<WebhookEvent>;
}
