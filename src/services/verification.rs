//! Donation Verification Orchestrator
//!
//! Given a payment reference and a donation id, this service determines the
//! true outcome of the payment exactly once, transitions the donation record
//! to its terminal status, and, only on the first successful confirmation,
//! applies the confirmed amount to the targeted campaign's running total.
//!
//! The orchestrator is stateless between invocations and holds no locks;
//! idempotency comes from the completed-status short-circuit and the
//! atomic-increment contract of the issue store.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::database::error::DatabaseError;
use crate::database::repository::{DonationStore, IssueStore};
use crate::payments::error::PaymentError;
use crate::payments::provider::PaymentGateway;

// ============================================================================
// Donation Status State Machine
// ============================================================================

/// Donation record status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DonationStatus {
    /// Created, donor not yet confirmed by the gateway
    Pending,
    /// Gateway confirmed the payment; aggregate applied (or application
    /// failed and was reported)
    Completed,
    /// Gateway denied the payment
    Failed,
}

impl std::fmt::Display for DonationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_db_status())
    }
}

impl DonationStatus {
    /// Get all valid transitions from this status
    pub fn valid_transitions(&self) -> Vec<DonationStatus> {
        match self {
            DonationStatus::Pending => vec![DonationStatus::Completed, DonationStatus::Failed],
            // Terminal states - no valid transitions
            DonationStatus::Completed => vec![],
            DonationStatus::Failed => vec![],
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DonationStatus::Completed | DonationStatus::Failed)
    }

    pub fn from_db_status(status: &str) -> Option<Self> {
        match status.to_lowercase().as_str() {
            "pending" => Some(DonationStatus::Pending),
            "completed" => Some(DonationStatus::Completed),
            "failed" => Some(DonationStatus::Failed),
            _ => None,
        }
    }

    pub fn to_db_status(&self) -> &'static str {
        match self {
            DonationStatus::Pending => "pending",
            DonationStatus::Completed => "completed",
            DonationStatus::Failed => "failed",
        }
    }
}

// ============================================================================
// Request / Outcome Types
// ============================================================================

/// Inbound verification request, as delivered by the gateway callback.
///
/// All fields arrive as untrusted query-string values; validation is the
/// orchestrator's first step.
#[derive(Debug, Clone, Default)]
pub struct VerificationRequest {
    pub reference: Option<String>,
    pub donation_id: Option<String>,
    /// Explicit target campaign; takes precedence over an issue id echoed
    /// in the gateway metadata.
    pub issue_id: Option<String>,
}

/// Final outcome of a verification run, the only source of truth the
/// caller renders from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// Payment confirmed; `amount` is the gateway-confirmed amount in major
    /// units. `already_settled` marks a short-circuited duplicate call that
    /// performed no writes.
    Success {
        donation_id: Uuid,
        amount: BigDecimal,
        already_settled: bool,
    },
    /// Payment denied by the gateway. Terminal: a new attempt needs a new
    /// reference and donation record.
    Declined { donation_id: Uuid, message: String },
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("Missing or invalid parameter: {field}")]
    InvalidInput { field: &'static str },

    #[error("Donation not found: {donation_id}")]
    DonationNotFound { donation_id: String },

    #[error("Gateway verification failed: {0}")]
    Gateway(#[from] PaymentError),

    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),

    /// The donation was marked completed but the campaign total was not
    /// incremented. A retry will short-circuit on the completed donation
    /// and never apply the delta, so this requires operator reconciliation.
    #[error(
        "Donation {donation_id} completed but campaign {issue_id} total was not updated by {amount}: {cause}"
    )]
    AggregateNotApplied {
        donation_id: Uuid,
        issue_id: Uuid,
        amount: BigDecimal,
        cause: DatabaseError,
    },
}

impl VerificationError {
    pub fn is_retryable(&self) -> bool {
        match self {
            VerificationError::InvalidInput { .. } => false,
            VerificationError::DonationNotFound { .. } => false,
            VerificationError::Gateway(e) => e.is_retryable(),
            VerificationError::Store(e) => e.is_retryable(),
            VerificationError::AggregateNotApplied { .. } => false,
        }
    }
}

impl From<VerificationError> for crate::error::AppError {
    fn from(err: VerificationError) -> Self {
        use crate::error::{
            AppError, AppErrorKind, DomainError, InfrastructureError, ValidationError,
        };

        let kind = match err {
            VerificationError::InvalidInput { field } => {
                AppErrorKind::Validation(ValidationError::MissingField {
                    field: field.to_string(),
                })
            }
            VerificationError::DonationNotFound { donation_id } => {
                AppErrorKind::Domain(DomainError::DonationNotFound {
                    donation: donation_id,
                })
            }
            VerificationError::Gateway(e) => return AppError::from(e),
            VerificationError::Store(e) => return AppError::from(e),
            other @ VerificationError::AggregateNotApplied { .. } => {
                AppErrorKind::Infrastructure(InfrastructureError::Database {
                    message: other.to_string(),
                    is_retryable: false,
                })
            }
        };
        AppError::new(kind)
    }
}

pub type VerificationResult<T> = Result<T, VerificationError>;

// ============================================================================
// Orchestrator
// ============================================================================

pub struct VerificationOrchestrator {
    gateway: Arc<dyn PaymentGateway>,
    donations: Arc<dyn DonationStore>,
    issues: Arc<dyn IssueStore>,
}

impl VerificationOrchestrator {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        donations: Arc<dyn DonationStore>,
        issues: Arc<dyn IssueStore>,
    ) -> Self {
        Self {
            gateway,
            donations,
            issues,
        }
    }

    /// Resolve the true outcome of a payment attempt and settle the
    /// donation record accordingly.
    ///
    /// Safe to call repeatedly for the same `(reference, donation_id)`:
    /// once the donation is `completed`, further calls return the stored
    /// amount without touching the gateway or either store.
    pub async fn verify_donation(
        &self,
        request: VerificationRequest,
    ) -> VerificationResult<VerificationOutcome> {
        // Step 1: validate inputs
        let reference = request
            .reference
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(VerificationError::InvalidInput { field: "reference" })?
            .to_string();

        let donation_id = request
            .donation_id
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(VerificationError::InvalidInput {
                field: "donation_id",
            })
            .and_then(|v| {
                Uuid::parse_str(v).map_err(|_| VerificationError::InvalidInput {
                    field: "donation_id",
                })
            })?;

        let explicit_issue_id = match request.issue_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(v) => Some(
                Uuid::parse_str(v)
                    .map_err(|_| VerificationError::InvalidInput { field: "issue_id" })?,
            ),
        };

        // Step 2: short-circuit already-settled donations. This is the
        // idempotency guard against duplicate callbacks and page reloads.
        let donation = self
            .donations
            .find_by_id(donation_id)
            .await?
            .ok_or_else(|| VerificationError::DonationNotFound {
                donation_id: donation_id.to_string(),
            })?;

        if DonationStatus::from_db_status(&donation.status) == Some(DonationStatus::Completed) {
            info!(
                donation_id = %donation_id,
                reference = %reference,
                "donation already completed, skipping verification"
            );
            return Ok(VerificationOutcome::Success {
                donation_id,
                amount: donation.amount,
                already_settled: true,
            });
        }

        // Step 3: ask the gateway for the truth. A transport error here
        // means "unknown", not "denied": the donation stays pending and the
        // error propagates as retryable.
        let verification = self.gateway.verify_payment(&reference).await?;

        if !verification.is_success() {
            // Step 6: business denial is terminal.
            let message = verification
                .gateway_response
                .clone()
                .unwrap_or_else(|| verification.status_text.clone());

            self.donations
                .update_status(
                    donation_id,
                    DonationStatus::Failed.to_db_status(),
                    Some(&message),
                )
                .await?;

            info!(
                donation_id = %donation_id,
                reference = %reference,
                gateway_status = %verification.status_text,
                "donation marked failed"
            );

            return Ok(VerificationOutcome::Declined {
                donation_id,
                message,
            });
        }

        // Step 5a: confirmed amount in major units, converted once at the
        // gateway boundary.
        let confirmed_amount = verification.amount.amount.clone();

        if confirmed_amount != donation.amount {
            // Reportable anomaly, never silently reconciled: the confirmed
            // amount drives the aggregate, the donation row keeps the
            // amount it was created with.
            warn!(
                donation_id = %donation_id,
                reference = %reference,
                recorded = %donation.amount,
                confirmed = %confirmed_amount,
                "gateway-confirmed amount differs from recorded donation amount"
            );
        }

        // Step 5b: the commit point. If this write fails the donation is
        // still pending and the whole run can be retried.
        self.donations
            .update_status(
                donation_id,
                DonationStatus::Completed.to_db_status(),
                verification.gateway_response.as_deref(),
            )
            .await?;

        info!(
            donation_id = %donation_id,
            reference = %reference,
            amount = %confirmed_amount,
            "donation completed"
        );

        // Step 5c: apply the aggregate exactly once, on this first
        // successful confirmation. Explicit parameter beats metadata echo.
        let target_issue_id =
            explicit_issue_id.or_else(|| issue_id_from_metadata(&verification.metadata));

        if let Some(issue_id) = target_issue_id {
            match self
                .issues
                .apply_raised_amount_delta(issue_id, &confirmed_amount)
                .await
            {
                Ok(issue) => {
                    info!(
                        issue_id = %issue_id,
                        donation_id = %donation_id,
                        delta = %confirmed_amount,
                        raised_amount = %issue.raised_amount,
                        "campaign total updated"
                    );
                }
                Err(cause) => {
                    // Known gap: the donation is already completed, so a
                    // retry short-circuits at step 2 and never re-applies
                    // this delta. Surface loudly instead of compensating.
                    error!(
                        issue_id = %issue_id,
                        donation_id = %donation_id,
                        delta = %confirmed_amount,
                        error = %cause,
                        "campaign total NOT updated for completed donation; manual reconciliation required"
                    );
                    return Err(VerificationError::AggregateNotApplied {
                        donation_id,
                        issue_id,
                        amount: confirmed_amount,
                        cause,
                    });
                }
            }
        }

        // Step 5d
        Ok(VerificationOutcome::Success {
            donation_id,
            amount: confirmed_amount,
            already_settled: false,
        })
    }
}

/// Pull a target issue id out of the gateway's echoed metadata, if the
/// initiation put one there.
fn issue_id_from_metadata(metadata: &serde_json::Value) -> Option<Uuid> {
    let raw = metadata.get("issue_id").and_then(|v| v.as_str())?;
    match Uuid::from_str(raw) {
        Ok(id) => Some(id),
        Err(_) => {
            warn!(issue_id = %raw, "ignoring malformed issue_id in gateway metadata");
            None
        }
    }
}
