use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::services::webhook_processor::{WebhookProcessor, WebhookProcessorError};

#[derive(Clone)]
pub struct WebhookState {
    pub processor: Arc<WebhookProcessor>,
}

/// POST /webhooks/paystack
pub async fn handle_paystack_webhook(
    State(state): State<WebhookState>,
    headers: axum::http::HeaderMap,
    body: String,
) -> impl IntoResponse {
    info!("Received paystack webhook");

    let signature = headers
        .get("x-paystack-signature")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    if signature.is_none() {
        warn!("Missing webhook signature");
        return (StatusCode::UNAUTHORIZED, "Missing signature").into_response();
    }

    let payload: JsonValue = match serde_json::from_str(&body) {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "Invalid JSON payload");
            return (StatusCode::BAD_REQUEST, "Invalid JSON").into_response();
        }
    };

    // The gateway retries deliveries that don't get a 2xx; processing
    // failures are acknowledged anyway since the verification callback is
    // an independent settlement path.
    match state
        .processor
        .process_webhook(signature.as_deref(), &payload)
        .await
    {
        Ok(_) => {
            info!("Webhook processed successfully");
            (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
        }
        Err(WebhookProcessorError::InvalidSignature) => {
            warn!("Invalid webhook signature");
            (StatusCode::UNAUTHORIZED, "Invalid signature").into_response()
        }
        Err(e) => {
            error!(error = %e, "Webhook processing failed");
            (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
        }
    }
}
