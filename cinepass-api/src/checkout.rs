use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use cinepass_catalog::Quote;
use cinepass_core::{CoreError, GatewayType};
use cinepass_order::{Cart, CheckoutResult, Hold};
use cinepass_shared::Masked;
use serde::{Deserialize, Serialize};

use crate::{error::AppError, middleware::auth::CustomerClaims, state::AppState};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldRequest {
    pub showtime_id: i64,
    pub seat_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldsResponse {
    pub holds: Vec<Hold>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseResponse {
    pub released: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitResponse {
    pub released: usize,
    pub handed_off: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayRequest {
    pub payment_method: GatewayType,
    #[serde(default)]
    pub wallet_pin: Option<Masked<String>>,
    /// Balance shown to the customer; only used for the early insufficient-funds check
    #[serde(default)]
    pub wallet_balance: Option<i64>,
}

/// Query parameters the gateways append to the return URL
#[derive(Debug, Default, Deserialize)]
pub struct ReturnParams {
    #[serde(rename = "txnRef")]
    pub txn_ref: Option<String>,
    /// MoMo
    #[serde(rename = "orderId")]
    pub order_id: Option<String>,
    /// ZaloPay
    #[serde(rename = "apptransid")]
    pub app_trans_id: Option<String>,
}

impl ReturnParams {
    pub fn reference(&self) -> Option<&str> {
        [&self.txn_ref, &self.order_id, &self.app_trans_id]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/checkout/holds", post(reserve_seat))
        .route("/v1/checkout/holds/{showtime_id}/{seat_id}", delete(release_seat))
        .route("/v1/checkout/exit", post(exit_checkout))
        .route("/v1/checkout/cart", put(set_cart))
        .route("/v1/checkout/quote", get(get_quote))
        .route("/v1/checkout/pay", post(pay))
        .route("/v1/checkout/return", get(payment_return))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/checkout/holds
pub async fn reserve_seat(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Json(req): Json<HoldRequest>,
) -> Result<Json<HoldsResponse>, AppError> {
    state.checkout.reserve(claims.session(), req.showtime_id, req.seat_id).await?;
    Ok(Json(HoldsResponse { holds: state.checkout.holds().selected(claims.session()) }))
}

/// DELETE /v1/checkout/holds/{showtime_id}/{seat_id}
pub async fn release_seat(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path((showtime_id, seat_id)): Path<(i64, i64)>,
) -> Json<ReleaseResponse> {
    let released = state.checkout.release(claims.session(), showtime_id, seat_id).await;
    Json(ReleaseResponse { released })
}

/// POST /v1/checkout/exit
/// Sent when the customer navigates away from checkout
pub async fn exit_checkout(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
) -> Json<ExitResponse> {
    let handed_off = state.checkout.holds().is_handed_off(claims.session());
    let released = state.checkout.exit(claims.session()).await;
    Json(ExitResponse { released, handed_off })
}

/// PUT /v1/checkout/cart
pub async fn set_cart(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Json(cart): Json<Cart>,
) -> Result<Json<Quote>, AppError> {
    Ok(Json(state.checkout.set_cart(claims.session(), cart)?))
}

/// GET /v1/checkout/quote
pub async fn get_quote(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
) -> Result<Json<Quote>, AppError> {
    Ok(Json(state.checkout.quote(claims.session())?))
}

/// POST /v1/checkout/pay
pub async fn pay(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Json(req): Json<PayRequest>,
) -> Result<Json<CheckoutResult>, AppError> {
    let result = state.checkout
        .pay(claims.session(), req.payment_method, req.wallet_pin, req.wallet_balance)
        .await?;
    Ok(Json(result))
}

/// GET /v1/checkout/return
/// Reconcile after the gateway redirected the customer back
pub async fn payment_return(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Query(params): Query<ReturnParams>,
) -> Result<Json<CheckoutResult>, AppError> {
    let txn_ref = params.reference().ok_or_else(|| {
        CoreError::ValidationError("Missing transaction reference".to_string())
    })?;
    let result = state.checkout.handle_return(claims.session(), txn_ref).await?;
    Ok(Json(result))
}
