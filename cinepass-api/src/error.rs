use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cinepass_core::CoreError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),
    #[error("Forbidden: {0}")]
    AuthorizationError(String),
    #[error(transparent)]
    Checkout(#[from] CoreError),
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::AuthenticationError(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::AuthorizationError(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::Checkout(err) => match err {
                CoreError::ValidationError(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                CoreError::DuplicateSubmission => (StatusCode::CONFLICT, "DUPLICATE_SUBMISSION"),
                CoreError::GatewayUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "GATEWAY_UNAVAILABLE"),
                CoreError::ChannelUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "CHANNEL_UNAVAILABLE"),
                CoreError::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
            AppError::InternalServerError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let (message, retryable) = match &self {
            AppError::AuthenticationError(msg) | AppError::AuthorizationError(msg) => (msg.clone(), false),
            AppError::Checkout(err) => {
                if status.is_server_error() {
                    tracing::error!(error = %err, "Checkout failed");
                }
                (err.user_message(), err.is_retryable())
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                ("Internal Server Error".to_string(), false)
            }
        };

        let body = Json(json!({
            "error": message,
            "code": code,
            "retryable": retryable,
        }));

        (status, body).into_response()
    }
}
