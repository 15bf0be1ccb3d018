use async_trait::async_trait;
use cinepass_shared::Masked;
use serde::{Deserialize, Serialize};

use crate::order::Order;
use crate::GatewayError;

/// Payment rails supported at checkout
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum GatewayType {
    #[serde(rename = "MOMO")]
    Momo,
    #[serde(rename = "ZALOPAY")]
    ZaloPay,
    #[serde(rename = "WALLET")]
    Wallet,
}

impl GatewayType {
    /// Redirect gateways hand the customer to an external payment page.
    pub fn is_redirect(&self) -> bool {
        matches!(self, GatewayType::Momo | GatewayType::ZaloPay)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayType::Momo => "MOMO",
            GatewayType::ZaloPay => "ZALOPAY",
            GatewayType::Wallet => "WALLET",
        }
    }
}

impl std::fmt::Display for GatewayType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FoodComboRequest {
    pub food_combo_id: i64,
    pub quantity: u32,
}

/// Body of `POST /orders`.
///
/// Ticket scope (`showtime_id` + `seat_ids`) and food-only scope
/// (`cinema_complex_id`) are mutually exclusive; absent fields are omitted
/// from the wire payload entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub amount: i64,
    pub payment_method: GatewayType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voucher_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub showtime_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seat_ids: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cinema_complex_id: Option<i64>,
    #[serde(default)]
    pub food_combos: Vec<FoodComboRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_pin: Option<Masked<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectResponse {
    pub redirect_url: String,
    #[serde(default)]
    pub txn_ref: Option<String>,
}

/// Response of `POST /orders`: a redirect for MOMO/ZALOPAY, the created order for WALLET.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CreateOrderResponse {
    Redirect(RedirectResponse),
    Created(Order),
}

#[async_trait]
pub trait WalletPinVerifier: Send + Sync {
    /// Check the customer's wallet PIN with the backend
    async fn verify_pin(&self, pin: &Masked<String>) -> Result<bool, GatewayError>;
}
