//! Gateway webhook processing
//!
//! Webhooks are an alternative delivery path for the same truth the
//! verification callback carries: the processor verifies the signature,
//! resolves the donation by reference, and hands off to the verification
//! orchestrator. Redelivered events settle on the orchestrator's
//! completed-status short-circuit.

use serde_json::Value as JsonValue;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::database::repository::DonationStore;
use crate::payments::provider::PaymentGateway;
use crate::services::verification::{
    VerificationOrchestrator, VerificationOutcome, VerificationRequest,
};

#[derive(Debug, Error)]
pub enum WebhookProcessorError {
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Missing transaction reference")]
    MissingReference,
    #[error("No donation matches reference {0}")]
    UnknownReference(String),
    #[error("Processing error: {0}")]
    ProcessingError(String),
}

pub struct WebhookProcessor {
    gateway: Arc<dyn PaymentGateway>,
    donations: Arc<dyn DonationStore>,
    orchestrator: Arc<VerificationOrchestrator>,
}

impl WebhookProcessor {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        donations: Arc<dyn DonationStore>,
        orchestrator: Arc<VerificationOrchestrator>,
    ) -> Self {
        Self {
            gateway,
            donations,
            orchestrator,
        }
    }

    pub async fn process_webhook(
        &self,
        signature: Option<&str>,
        payload: &JsonValue,
    ) -> Result<(), WebhookProcessorError> {
        let signature = signature.ok_or(WebhookProcessorError::InvalidSignature)?;

        let payload_bytes = serde_json::to_vec(payload)
            .map_err(|e| WebhookProcessorError::ProcessingError(e.to_string()))?;

        let verification = self
            .gateway
            .verify_webhook(&payload_bytes, signature)
            .map_err(|e| WebhookProcessorError::ProcessingError(e.to_string()))?;

        if !verification.valid {
            error!("Invalid webhook signature");
            return Err(WebhookProcessorError::InvalidSignature);
        }

        let event = self
            .gateway
            .parse_webhook_event(&payload_bytes)
            .map_err(|e| WebhookProcessorError::ProcessingError(e.to_string()))?;

        match event.event_type.as_str() {
            "charge.success" | "charge.failed" => {
                let reference = event
                    .reference
                    .as_deref()
                    .ok_or(WebhookProcessorError::MissingReference)?;
                info!(
                    reference = %reference,
                    event_type = %event.event_type,
                    "processing charge webhook"
                );
                self.settle_by_reference(reference).await
            }
            other => {
                warn!(event_type = %other, "ignoring unhandled webhook event type");
                Ok(())
            }
        }
    }

    /// Resolve the donation for a webhook reference and run the standard
    /// verification flow. The orchestrator re-verifies against the gateway
    /// rather than trusting the webhook body.
    async fn settle_by_reference(&self, reference: &str) -> Result<(), WebhookProcessorError> {
        let donation = self
            .donations
            .find_by_reference(reference)
            .await
            .map_err(|e| WebhookProcessorError::ProcessingError(e.to_string()))?
            .ok_or_else(|| WebhookProcessorError::UnknownReference(reference.to_string()))?;

        let outcome = self
            .orchestrator
            .verify_donation(VerificationRequest {
                reference: Some(reference.to_string()),
                donation_id: Some(donation.id.to_string()),
                issue_id: donation.target_issue_id.map(|id| id.to_string()),
            })
            .await
            .map_err(|e| WebhookProcessorError::ProcessingError(e.to_string()))?;

        match outcome {
            VerificationOutcome::Success {
                donation_id,
                already_settled,
                ..
            } => {
                info!(
                    donation_id = %donation_id,
                    already_settled = already_settled,
                    "webhook settled donation"
                );
            }
            VerificationOutcome::Declined { donation_id, .. } => {
                info!(donation_id = %donation_id, "webhook recorded declined donation");
            }
        }

        Ok(())
    }
}
