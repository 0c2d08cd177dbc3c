//! Donation initiation service
//!
//! Creates the pending donation record and opens a checkout session with
//! the gateway. The record is created before the redirect so the
//! verification callback always has a donation to settle.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::database::donation_repository::NewDonation;
use crate::database::error::DatabaseError;
use crate::database::repository::{DonationStore, IssueStore};
use crate::logging::mask_email;
use crate::payments::error::PaymentError;
use crate::payments::provider::PaymentGateway;
use crate::payments::types::{InitializePaymentRequest, Money};

#[derive(Debug, Clone, Deserialize)]
pub struct InitiateDonationInput {
    pub email: String,
    pub amount: BigDecimal,
    pub currency: Option<String>,
    pub donor_name: Option<String>,
    pub issue_id: Option<Uuid>,
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitiatedDonation {
    pub donation_id: Uuid,
    pub reference: String,
    pub authorization_url: String,
    pub access_code: String,
}

#[derive(Debug, Error)]
pub enum DonationServiceError {
    #[error("Required field '{field}' is missing")]
    MissingField { field: &'static str },

    #[error("Invalid amount: {amount}")]
    InvalidAmount { amount: BigDecimal },

    #[error("Campaign not found: {issue_id}")]
    IssueNotFound { issue_id: Uuid },

    #[error("Gateway error: {0}")]
    Gateway(#[from] PaymentError),

    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),
}

impl From<DonationServiceError> for crate::error::AppError {
    fn from(err: DonationServiceError) -> Self {
        use crate::error::{AppError, AppErrorKind, DomainError, ValidationError};

        match err {
            DonationServiceError::MissingField { field } => {
                AppError::new(AppErrorKind::Validation(ValidationError::MissingField {
                    field: field.to_string(),
                }))
            }
            DonationServiceError::InvalidAmount { amount } => {
                AppError::new(AppErrorKind::Validation(ValidationError::InvalidAmount {
                    amount: amount.to_string(),
                    reason: "amount must be greater than zero".to_string(),
                }))
            }
            DonationServiceError::IssueNotFound { issue_id } => {
                AppError::new(AppErrorKind::Domain(DomainError::IssueNotFound {
                    issue_id: issue_id.to_string(),
                }))
            }
            DonationServiceError::Gateway(e) => AppError::from(e),
            DonationServiceError::Store(e) => AppError::from(e),
        }
    }
}

pub struct DonationService {
    gateway: Arc<dyn PaymentGateway>,
    donations: Arc<dyn DonationStore>,
    issues: Arc<dyn IssueStore>,
    default_currency: String,
}

impl DonationService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        donations: Arc<dyn DonationStore>,
        issues: Arc<dyn IssueStore>,
    ) -> Self {
        Self {
            gateway,
            donations,
            issues,
            default_currency: "NGN".to_string(),
        }
    }

    pub fn with_default_currency(mut self, currency: impl Into<String>) -> Self {
        self.default_currency = currency.into();
        self
    }

    /// Create a pending donation and open a gateway checkout session for it.
    pub async fn initiate_donation(
        &self,
        input: InitiateDonationInput,
    ) -> Result<InitiatedDonation, DonationServiceError> {
        if input.email.trim().is_empty() {
            return Err(DonationServiceError::MissingField { field: "email" });
        }
        if input.amount <= BigDecimal::from(0) {
            return Err(DonationServiceError::InvalidAmount {
                amount: input.amount.clone(),
            });
        }

        let currency = input
            .currency
            .clone()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| self.default_currency.clone());

        // Directed donations must point at an existing campaign.
        if let Some(issue_id) = input.issue_id {
            if self.issues.find_by_id(issue_id).await?.is_none() {
                return Err(DonationServiceError::IssueNotFound { issue_id });
            }
        }

        let reference = format!("ghv_{}", Uuid::new_v4().simple());

        let donation = self
            .donations
            .create(NewDonation {
                reference: reference.clone(),
                amount: input.amount.clone(),
                currency: currency.clone(),
                donor_name: input.donor_name.clone(),
                donor_email: Some(input.email.clone()),
                target_issue_id: input.issue_id,
            })
            .await?;

        let mut metadata = serde_json::json!({ "donation_id": donation.id });
        if let Some(issue_id) = input.issue_id {
            metadata["issue_id"] = serde_json::json!(issue_id);
        }

        let initialized = self
            .gateway
            .initialize_payment(InitializePaymentRequest {
                email: input.email.clone(),
                amount: Money::new(input.amount.clone(), currency),
                reference: reference.clone(),
                callback_url: input.callback_url.clone(),
                metadata: Some(metadata),
            })
            .await?;

        info!(
            donation_id = %donation.id,
            reference = %initialized.reference,
            donor = %mask_email(&input.email),
            amount = %input.amount,
            "donation initiated"
        );

        Ok(InitiatedDonation {
            donation_id: donation.id,
            reference: initialized.reference,
            authorization_url: initialized.authorization_url,
            access_code: initialized.access_code,
        })
    }
}
