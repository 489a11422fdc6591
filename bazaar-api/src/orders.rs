use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use bazaar_core::{Actor, Money, Order, OrderStatus, Tracking};
use bazaar_order::{Checkout, StatusChange};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    pub order_id: Uuid,
    pub total: Money,
    pub currency: String,
    pub status: OrderStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub courier: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub courier: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrackingRequest {
    pub tracking_number: String,
    pub courier: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/orders", post(create_order).get(list_orders))
        .route("/v1/orders/{id}", get(get_order))
        .route("/v1/orders/{id}/status", post(update_status))
        .route("/v1/orders/{id}/cancel", post(cancel_order))
        .route("/v1/orders/{id}/tracking", put(update_tracking))
        .route("/v1/seller/orders", get(list_seller_orders))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/orders
pub async fn create_order(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(checkout): Json<Checkout>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), AppError> {
    match state.engine.place_order(actor, checkout).await {
        Ok(order) => {
            state.metrics.orders_created.inc();
            Ok((
                StatusCode::CREATED,
                Json(CreateOrderResponse {
                    order_id: order.id,
                    total: order.total,
                    currency: state.currency.clone(),
                    status: order.status,
                }),
            ))
        }
        Err(e) => {
            state.metrics.orders_rejected.with_label_values(&[e.code()]).inc();
            Err(e.into())
        }
    }
}

/// POST /v1/orders/{id}/status
pub async fn update_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let tracking = match (req.tracking_number, req.courier) {
        (Some(tracking_number), Some(courier)) => Some(Tracking { tracking_number, courier }),
        (None, None) => None,
        _ => {
            return Err(AppError::ValidationError(
                "tracking_number and courier must be given together".to_string(),
            ))
        }
    };

    let transitioned = state
        .engine
        .change_status(StatusChange {
            order_id,
            actor,
            new_status: req.status,
            tracking,
        })
        .await?;

    if let Some(receipt) = &transitioned.settlement {
        if !receipt.is_noop() {
            state.metrics.settlements.inc();
            state
                .metrics
                .commission_settled
                .inc_by(u64::try_from(receipt.commission.minor()).unwrap_or(0));
        }
    }

    let order = transitioned.order;
    Ok(Json(StatusResponse {
        order_id: order.id,
        status: order.status,
        tracking_number: order.tracking_number,
        courier: order.courier,
    }))
}

/// POST /v1/orders/{id}/cancel
pub async fn cancel_order(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = state.engine.cancel_order(order_id, actor).await?;
    Ok(Json(order))
}

/// PUT /v1/orders/{id}/tracking
pub async fn update_tracking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<TrackingRequest>,
) -> Result<Json<Order>, AppError> {
    let tracking = Tracking {
        tracking_number: req.tracking_number,
        courier: req.courier,
    };
    let order = state.engine.update_tracking(order_id, actor, tracking).await?;
    Ok(Json(order))
}

/// GET /v1/orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.engine.order_for(actor, order_id).await?))
}

/// GET /v1/orders
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.engine.customer_orders(actor).await?))
}

/// GET /v1/seller/orders
pub async fn list_seller_orders(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.engine.seller_orders(actor).await?))
}
