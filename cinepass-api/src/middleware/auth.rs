use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

const CHECKOUT_ROLES: &[&str] = &["GUEST", "CUSTOMER"];

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CustomerClaims {
    /// Checkout session id
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: String,
    pub exp: usize,
}

impl CustomerClaims {
    pub fn session(&self) -> &str {
        &self.sub
    }
}

pub async fn customer_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::AuthenticationError("Missing bearer token".to_string()))?;

    let token_data = decode::<CustomerClaims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    ).map_err(|e| AppError::AuthenticationError(format!("Invalid token: {}", e)))?;

    if !CHECKOUT_ROLES.contains(&token_data.claims.role.as_str()) {
        return Err(AppError::AuthorizationError(format!(
            "Role {} cannot check out", token_data.claims.role
        )));
    }

    req.extensions_mut().insert(token_data.claims);
    Ok(next.run(req).await)
}
