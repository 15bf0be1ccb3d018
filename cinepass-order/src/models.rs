use chrono::{DateTime, Utc};
use cinepass_core::{GatewayType, Order};
use cinepass_shared::Masked;
use serde::Serialize;

use crate::fulfillment::Ticket;

/// A submitted payment that has not reached a terminal state yet
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PendingTransaction {
    pub txn_ref: Option<String>,
    pub gateway_type: GatewayType,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Result of the wallet PIN step plus the balance known to the client.
///
/// Both are UX short-circuits only; the backend re-checks PIN and balance.
#[derive(Debug, Clone)]
pub struct WalletAuthorization {
    pub pin: Masked<String>,
    pub pin_verified: bool,
    pub balance: i64,
}

#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub method: GatewayType,
    pub wallet: Option<WalletAuthorization>,
}

impl SubmitRequest {
    pub fn redirect(method: GatewayType) -> Self {
        Self { method, wallet: None }
    }

    pub fn wallet(authorization: WalletAuthorization) -> Self {
        Self {
            method: GatewayType::Wallet,
            wallet: Some(authorization),
        }
    }
}

/// What `PaymentOrchestrator::submit` produced
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The customer must continue on the gateway's page
    Redirect {
        redirect_url: String,
        txn_ref: Option<String>,
    },
    /// The order was created synchronously (wallet)
    Completed(Order),
}

/// Terminal or hand-off result reported to the customer
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckoutResult {
    #[serde(rename_all = "camelCase")]
    Redirect {
        redirect_url: String,
        txn_ref: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Confirmed {
        order: Order,
        ticket: Option<Ticket>,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    Indeterminate {
        txn_ref: String,
        message: String,
    },
}
