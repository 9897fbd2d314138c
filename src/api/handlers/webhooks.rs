//! Payment provider webhook endpoint.

use crate::{
    billing::{BillingError, Reconciler},
    AppState,
};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// `POST /webhooks/payments`
///
/// Always answers with a well-formed JSON body: 200 `{"received": true}`
/// once an event is handled (including events we ignore or drop), 400 for
/// signature or payload problems, 500 for internal handler failures. The
/// provider's retry machinery keys off that distinction.
#[utoipa::path(
    post,
    path = "/webhooks/payments",
    tag = "webhooks",
    responses(
        (status = 200, description = "Event received and handled"),
        (status = 400, description = "Invalid signature or payload"),
        (status = 500, description = "Handler failure; provider should retry"),
        (status = 501, description = "No payment provider configured"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn payments_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let (Some(provider), Some(catalog)) = (state.billing.as_ref(), state.catalog.as_ref()) else {
        tracing::warn!("payments webhook called but no payment provider is configured");
        return (
            StatusCode::NOT_IMPLEMENTED,
            Json(json!({"error": "no payment provider configured"})),
        )
            .into_response();
    };

    let event = match provider.verify_webhook(&headers, &body) {
        Ok(event) => event,
        Err(BillingError::InvalidSignature) => {
            tracing::warn!("rejected webhook with invalid signature");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "invalid signature"})),
            )
                .into_response();
        }
        Err(e) => {
            tracing::warn!(error = %e, "rejected malformed webhook payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "invalid payload"})),
            )
                .into_response();
        }
    };

    let reconciler = Reconciler::new(&state.db, provider.as_ref(), catalog);
    match reconciler.apply(event).await {
        Ok(()) => (StatusCode::OK, Json(json!({"received": true}))).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "webhook handler failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "internal handler failure"})),
            )
                .into_response()
        }
    }
}
