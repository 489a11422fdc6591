use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bazaar_order::OrderError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    AuthenticationError(String),

    #[error("{0}")]
    ValidationError(String),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::AuthenticationError(_) => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::Order(err) => {
                let status = match err {
                    OrderError::Validation(_) => StatusCode::BAD_REQUEST,
                    OrderError::SelfPurchase { .. } | OrderError::Unauthorized(_) => StatusCode::FORBIDDEN,
                    OrderError::NotFound(_) => StatusCode::NOT_FOUND,
                    OrderError::InsufficientStock { .. }
                    | OrderError::InvalidTransition { .. }
                    | OrderError::TrackingClosed { .. } => StatusCode::CONFLICT,
                    OrderError::Settlement { .. } | OrderError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.code())
            }
            AppError::Anyhow(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();

        let error_message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Internal Server Error: {}", self);
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::repository::StoreError;
    use bazaar_core::OrderStatus;
    use uuid::Uuid;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (OrderError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (
                OrderError::SelfPurchase { seller_id: Uuid::new_v4(), product_id: Uuid::new_v4() },
                StatusCode::FORBIDDEN,
            ),
            (
                OrderError::InsufficientStock { product_id: Uuid::new_v4(), requested: 2, available: 1 },
                StatusCode::CONFLICT,
            ),
            (
                OrderError::InvalidTransition { from: OrderStatus::Delivered, to: OrderStatus::Shipped },
                StatusCode::CONFLICT,
            ),
            (
                OrderError::TrackingClosed { order_id: Uuid::new_v4(), status: OrderStatus::Cancelled },
                StatusCode::CONFLICT,
            ),
            (OrderError::NotFound("order".into()), StatusCode::NOT_FOUND),
            (OrderError::Store(StoreError::Backend("pool timed out".into())), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(AppError::from(err).into_response().status(), expected);
        }
    }

    #[test]
    fn test_display_comes_from_inner_error() {
        let err = AppError::from(OrderError::Unauthorized("requires role seller".into()));
        assert_eq!(err.to_string(), "Unauthorized: requires role seller");

        let err = AppError::from(anyhow::anyhow!("boom"));
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
