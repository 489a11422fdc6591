use axum::{
    extract::{Path, State},
    routing::get,
    Extension, Json, Router,
};
use bazaar_core::{Actor, AdminCommissionAccount, SellerAccount, Transaction};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/seller/account", get(seller_account))
        .route("/v1/orders/{id}/transactions", get(order_transactions))
        .route("/v1/admin/commission", get(admin_commission))
}

/// GET /v1/seller/account
pub async fn seller_account(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<SellerAccount>, AppError> {
    Ok(Json(state.engine.seller_account(actor).await?))
}

/// GET /v1/orders/{id}/transactions
pub async fn order_transactions(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    Ok(Json(state.engine.order_transactions(actor, order_id).await?))
}

/// GET /v1/admin/commission
pub async fn admin_commission(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<AdminCommissionAccount>, AppError> {
    Ok(Json(state.engine.admin_account(actor).await?))
}
