use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use bazaar_core::{Actor, Role};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::{AppState, AuthConfig};

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: usize,
}

/// Sign a session token valid for `auth.expiration` seconds. Accounts live
/// outside this service; this is used by tooling and tests.
pub fn issue_token(auth: &AuthConfig, user_id: Uuid, role: Role) -> Result<String, AppError> {
    let ttl = i64::try_from(auth.expiration)
        .map_err(|_| AppError::Anyhow(anyhow::anyhow!("token expiration {} out of range", auth.expiration)))?;
    let claims = Claims {
        sub: user_id,
        role,
        exp: (Utc::now() + Duration::seconds(ttl)).timestamp() as usize,
    };

    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(auth.secret.as_bytes()))
        .map_err(|e| AppError::Anyhow(anyhow::anyhow!("Token encoding failed: {}", e)))
}

// ============================================================================
// Authentication Middleware
// ============================================================================

/// Validates the bearer token and makes the caller available to handlers as
/// an `Extension<Actor>`.
pub async fn auth_middleware(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::AuthenticationError("missing bearer token".to_string()))?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        AppError::AuthenticationError("invalid or expired token".to_string())
    })?;

    let actor = Actor {
        user_id: token_data.claims.sub,
        role: token_data.claims.role,
    };
    req.extensions_mut().insert(actor);

    Ok(next.run(req).await)
}
