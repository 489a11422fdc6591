use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
use bazaar_core::{PaymentCallback, PaymentStatus};
use serde::Serialize;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

#[derive(Debug, Serialize)]
pub struct PaymentAck {
    pub order_id: Uuid,
    pub payment_status: PaymentStatus,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/webhooks/payments", post(handle_payment_webhook))
}

/// POST /v1/webhooks/payments
/// Receive payment status updates from the gateway
pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(callback): Json<PaymentCallback>,
) -> Result<Json<PaymentAck>, AppError> {
    let authorized = headers
        .get(WEBHOOK_SECRET_HEADER)
        .is_some_and(|h| bool::from(h.as_bytes().ct_eq(state.webhook_secret.as_bytes())));
    if !authorized {
        tracing::warn!("Rejected payment webhook for order {} with bad secret", callback.order_id);
        return Err(AppError::AuthenticationError("invalid webhook secret".to_string()));
    }

    tracing::info!(
        "Received payment webhook: {:?} for order {}",
        callback.status,
        callback.order_id
    );

    let order = state.engine.apply_payment(&callback).await?;

    Ok(Json(PaymentAck {
        order_id: order.id,
        payment_status: order.payment_status,
    }))
}
