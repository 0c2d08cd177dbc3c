#![allow(dead_code)]

//! In-memory, call-counting test doubles for the verification flow.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use givehaven_backend::database::donation_repository::{Donation, NewDonation};
use givehaven_backend::database::error::{DatabaseError, DatabaseErrorKind};
use givehaven_backend::database::issue_repository::Issue;
use givehaven_backend::database::repository::{DonationStore, IssueStore};
use givehaven_backend::payments::error::{PaymentError, PaymentResult};
use givehaven_backend::payments::provider::PaymentGateway;
use givehaven_backend::payments::types::{
    GatewayVerification, InitializePaymentRequest, InitializedPayment, Money, PaymentState,
    WebhookEvent, WebhookVerificationResult,
};

// ============================================================================
// Gateway double
// ============================================================================

/// Gateway double returning a canned verification result and counting calls.
pub struct ScriptedGateway {
    pub verify_result: Mutex<PaymentResult<GatewayVerification>>,
    pub verify_calls: AtomicUsize,
    pub webhook_valid: bool,
}

impl ScriptedGateway {
    pub fn returning(result: PaymentResult<GatewayVerification>) -> Self {
        Self {
            verify_result: Mutex::new(result),
            verify_calls: AtomicUsize::new(0),
            webhook_valid: true,
        }
    }

    pub fn verify_call_count(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn initialize_payment(
        &self,
        request: InitializePaymentRequest,
    ) -> PaymentResult<InitializedPayment> {
        Ok(InitializedPayment {
            authorization_url: "https://checkout.example.com/session".to_string(),
            access_code: "access_test".to_string(),
            reference: request.reference,
        })
    }

    async fn verify_payment(&self, _reference: &str) -> PaymentResult<GatewayVerification> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.verify_result.lock().unwrap().clone()
    }

    fn name(&self) -> &'static str {
        "scripted"
    }

    fn verify_webhook(
        &self,
        _payload: &[u8],
        _signature: &str,
    ) -> PaymentResult<WebhookVerificationResult> {
        Ok(WebhookVerificationResult {
            valid: self.webhook_valid,
            reason: if self.webhook_valid {
                None
            } else {
                Some("invalid signature".to_string())
            },
        })
    }

    fn parse_webhook_event(&self, payload: &[u8]) -> PaymentResult<WebhookEvent> {
        let parsed: serde_json::Value = serde_json::from_slice(payload).map_err(|e| {
            PaymentError::WebhookVerificationError {
                message: e.to_string(),
            }
        })?;
        Ok(WebhookEvent {
            event_type: parsed
                .get("event")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string(),
            reference: parsed
                .get("data")
                .and_then(|v| v.get("reference"))
                .and_then(|v| v.as_str())
                .map(|v| v.to_string()),
            status: None,
            payload: parsed,
            received_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

/// A successful gateway verification of `minor` minor units.
pub fn success_verification(minor: i64, currency: &str) -> GatewayVerification {
    GatewayVerification {
        status: PaymentState::Success,
        status_text: "success".to_string(),
        amount: Money::from_minor_units(minor, currency),
        paid_at: Some("2026-03-01T10:00:00.000Z".to_string()),
        channel: Some("card".to_string()),
        gateway_response: Some("Successful".to_string()),
        metadata: serde_json::json!({}),
    }
}

pub fn failed_verification(message: &str) -> GatewayVerification {
    GatewayVerification {
        status: PaymentState::Failed,
        status_text: "failed".to_string(),
        amount: Money::from_minor_units(0, "NGN"),
        paid_at: None,
        channel: Some("card".to_string()),
        gateway_response: Some(message.to_string()),
        metadata: serde_json::json!({}),
    }
}

pub fn transport_error() -> PaymentError {
    PaymentError::NetworkError {
        message: "connection timed out".to_string(),
    }
}

// ============================================================================
// Donation store double
// ============================================================================

#[derive(Default)]
pub struct InMemoryDonationStore {
    pub donations: Mutex<HashMap<Uuid, Donation>>,
    pub create_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
}

impl InMemoryDonationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_donation(self, donation: Donation) -> Self {
        self.donations
            .lock()
            .unwrap()
            .insert(donation.id, donation);
        self
    }

    pub fn update_call_count(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn status_of(&self, id: Uuid) -> Option<String> {
        self.donations
            .lock()
            .unwrap()
            .get(&id)
            .map(|d| d.status.clone())
    }
}

#[async_trait]
impl DonationStore for InMemoryDonationStore {
    async fn create(&self, donation: NewDonation) -> Result<Donation, DatabaseError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let now = chrono::Utc::now();
        let created = Donation {
            id: Uuid::new_v4(),
            reference: donation.reference,
            amount: donation.amount,
            currency: donation.currency,
            donor_name: donation.donor_name,
            donor_email: donation.donor_email,
            target_issue_id: donation.target_issue_id,
            status: "pending".to_string(),
            message: None,
            created_at: now,
            updated_at: now,
        };
        self.donations
            .lock()
            .unwrap()
            .insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Donation>, DatabaseError> {
        Ok(self.donations.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Donation>, DatabaseError> {
        Ok(self
            .donations
            .lock()
            .unwrap()
            .values()
            .find(|d| d.reference == reference)
            .cloned())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: &str,
        message: Option<&str>,
    ) -> Result<Donation, DatabaseError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let mut donations = self.donations.lock().unwrap();
        let donation = donations
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::not_found("donation", id.to_string()))?;
        donation.status = status.to_string();
        if let Some(message) = message {
            donation.message = Some(message.to_string());
        }
        donation.updated_at = chrono::Utc::now();
        Ok(donation.clone())
    }

    async fn update_status_by_reference(
        &self,
        reference: &str,
        status: &str,
        message: Option<&str>,
    ) -> Result<Donation, DatabaseError> {
        let id = {
            let donations = self.donations.lock().unwrap();
            donations
                .values()
                .find(|d| d.reference == reference)
                .map(|d| d.id)
                .ok_or_else(|| DatabaseError::not_found("donation", reference))?
        };
        self.update_status(id, status, message).await
    }
}

// ============================================================================
// Issue store double
// ============================================================================

#[derive(Default)]
pub struct InMemoryIssueStore {
    pub issues: Mutex<HashMap<Uuid, Issue>>,
    pub delta_calls: AtomicUsize,
    pub fail_deltas: bool,
}

impl InMemoryIssueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_issue(self, issue: Issue) -> Self {
        self.issues.lock().unwrap().insert(issue.id, issue);
        self
    }

    pub fn failing_deltas(mut self) -> Self {
        self.fail_deltas = true;
        self
    }

    pub fn delta_call_count(&self) -> usize {
        self.delta_calls.load(Ordering::SeqCst)
    }

    pub fn raised_amount_of(&self, id: Uuid) -> Option<BigDecimal> {
        self.issues
            .lock()
            .unwrap()
            .get(&id)
            .map(|i| i.raised_amount.clone())
    }
}

#[async_trait]
impl IssueStore for InMemoryIssueStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Issue>, DatabaseError> {
        Ok(self.issues.lock().unwrap().get(&id).cloned())
    }

    async fn apply_raised_amount_delta(
        &self,
        id: Uuid,
        delta: &BigDecimal,
    ) -> Result<Issue, DatabaseError> {
        self.delta_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_deltas {
            return Err(DatabaseError::new(DatabaseErrorKind::Query {
                message: "simulated write failure".to_string(),
            }));
        }
        // The whole read-add-write happens under one lock, mirroring the
        // single-statement increment of the real store.
        let mut issues = self.issues.lock().unwrap();
        let issue = issues
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::not_found("issue", id.to_string()))?;
        issue.raised_amount = &issue.raised_amount + delta;
        issue.updated_at = chrono::Utc::now();
        Ok(issue.clone())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn pending_donation(
    id: Uuid,
    reference: &str,
    amount: i64,
    target_issue_id: Option<Uuid>,
) -> Donation {
    let now = chrono::Utc::now();
    Donation {
        id,
        reference: reference.to_string(),
        amount: BigDecimal::from(amount),
        currency: "NGN".to_string(),
        donor_name: None,
        donor_email: Some("donor@example.org".to_string()),
        target_issue_id,
        status: "pending".to_string(),
        message: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn issue_with_raised(id: Uuid, raised: i64) -> Issue {
    let now = chrono::Utc::now();
    Issue {
        id,
        title: "Roof repairs for the east wing".to_string(),
        summary: None,
        goal_amount: BigDecimal::from(1_000_000),
        raised_amount: BigDecimal::from(raised),
        created_at: now,
        updated_at: now,
    }
}
