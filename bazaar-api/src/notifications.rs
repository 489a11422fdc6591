use axum::{extract::State, routing::get, Extension, Json, Router};
use bazaar_core::{Actor, Notification};
use bazaar_order::OrderError;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/notifications", get(list_notifications))
}

/// GET /v1/notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let notifications = state
        .notifications
        .list_notifications(actor.user_id)
        .await
        .map_err(OrderError::from)?;
    Ok(Json(notifications))
}
