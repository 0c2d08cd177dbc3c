//! Donation API: initiation, the verification callback, and status lookup

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::database::repository::DonationStore;
use crate::error::AppError;
use crate::middleware::error::{get_request_id_from_headers, json_error_response, ErrorResponse};
use crate::services::donation::{DonationService, InitiateDonationInput};
use crate::services::verification::{
    VerificationOrchestrator, VerificationOutcome, VerificationRequest,
};

#[derive(Clone)]
pub struct DonationApiState {
    pub service: Arc<DonationService>,
    pub orchestrator: Arc<VerificationOrchestrator>,
    pub donations: Arc<dyn DonationStore>,
}

#[derive(Debug, Deserialize)]
pub struct InitiateDonationApiRequest {
    pub email: String,
    pub amount: String,
    pub currency: Option<String>,
    pub donor_name: Option<String>,
    pub issue_id: Option<Uuid>,
    pub callback_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyDonationQuery {
    pub reference: Option<String>,
    /// Alternate name the gateway appends to callback URLs
    pub trxref: Option<String>,
    pub donation_id: Option<String>,
    pub issue_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyDonationResponse {
    pub status: &'static str,
    pub donation_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<BigDecimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub already_settled: bool,
}

#[derive(Debug, Serialize)]
pub struct DonationView {
    pub id: Uuid,
    pub reference: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_issue_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

fn app_error_response(
    err: AppError,
    request_id: Option<String>,
) -> (StatusCode, Json<ErrorResponse>) {
    let err = match request_id {
        Some(req_id) => err.with_request_id(req_id),
        None => err,
    };
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponse::from_app_error(&err)))
}

/// POST /api/donations
pub async fn initiate_donation(
    State(state): State<DonationApiState>,
    headers: axum::http::HeaderMap,
    Json(payload): Json<InitiateDonationApiRequest>,
) -> Result<
    Json<crate::services::donation::InitiatedDonation>,
    (StatusCode, Json<ErrorResponse>),
> {
    let request_id = get_request_id_from_headers(&headers);

    let amount = BigDecimal::from_str(payload.amount.trim()).map_err(|_| {
        json_error_response(
            StatusCode::BAD_REQUEST,
            format!("invalid amount: {}", payload.amount),
            request_id.clone(),
        )
    })?;

    let input = InitiateDonationInput {
        email: payload.email,
        amount,
        currency: payload.currency,
        donor_name: payload.donor_name,
        issue_id: payload.issue_id,
        callback_url: payload.callback_url,
    };

    state
        .service
        .initiate_donation(input)
        .await
        .map(Json)
        .map_err(|e| app_error_response(e.into(), request_id))
}

/// GET /api/donations/verify
///
/// The gateway redirect/callback target. Runs the verification flow and
/// returns the outcome the confirmation page renders from.
pub async fn verify_donation(
    State(state): State<DonationApiState>,
    headers: axum::http::HeaderMap,
    Query(query): Query<VerifyDonationQuery>,
) -> Result<Json<VerifyDonationResponse>, (StatusCode, Json<ErrorResponse>)> {
    let request_id = get_request_id_from_headers(&headers);

    let request = VerificationRequest {
        reference: query.reference.or(query.trxref),
        donation_id: query.donation_id,
        issue_id: query.issue_id,
    };

    let outcome = state
        .orchestrator
        .verify_donation(request)
        .await
        .map_err(|e| app_error_response(e.into(), request_id))?;

    let response = match outcome {
        VerificationOutcome::Success {
            donation_id,
            amount,
            already_settled,
        } => VerifyDonationResponse {
            status: "success",
            donation_id,
            amount: Some(amount),
            message: None,
            already_settled,
        },
        VerificationOutcome::Declined {
            donation_id,
            message,
        } => VerifyDonationResponse {
            status: "failed",
            donation_id,
            amount: None,
            message: Some(message),
            already_settled: false,
        },
    };

    info!(
        donation_id = %response.donation_id,
        status = %response.status,
        "verification callback handled"
    );

    Ok(Json(response))
}

/// GET /api/donations/{id}
pub async fn get_donation(
    State(state): State<DonationApiState>,
    Path(id): Path<Uuid>,
    headers: axum::http::HeaderMap,
) -> Result<Json<DonationView>, (StatusCode, Json<ErrorResponse>)> {
    let request_id = get_request_id_from_headers(&headers);

    let donation = state
        .donations
        .find_by_id(id)
        .await
        .map_err(|e| app_error_response(e.into(), request_id.clone()))?
        .ok_or_else(|| {
            json_error_response(
                StatusCode::NOT_FOUND,
                format!("donation {} not found", id),
                request_id,
            )
        })?;

    Ok(Json(DonationView {
        id: donation.id,
        reference: donation.reference,
        amount: donation.amount,
        currency: donation.currency,
        status: donation.status,
        target_issue_id: donation.target_issue_id,
        message: donation.message,
        created_at: donation.created_at,
    }))
}
