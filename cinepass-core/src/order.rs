use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::payment::GatewayType;

/// Order status as persisted by the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Paid,
    Used,
    Cancelled,
    Refunded,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderItemType {
    Ticket,
    Food,
}

/// The authoritative record of a paid purchase.
///
/// The backend only persists an order once payment is confirmed, so the
/// existence of an `Order` for a transaction reference is itself the success
/// signal used during reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: i64,
    pub total_amount: i64,
    pub payment_method: GatewayType,
    #[serde(default)]
    pub txn_ref: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,
    #[serde(default)]
    pub showtime: Option<ShowtimeInfo>,
    #[serde(default)]
    pub seats: Vec<String>,
    pub created_at: NaiveDateTime,
}

impl Order {
    pub fn is_food_only(&self) -> bool {
        self.showtime.is_none()
    }

    pub fn item_count(&self, item_type: OrderItemType) -> u32 {
        self.items.iter()
            .filter(|item| item.item_type == item_type)
            .map(|item| item.quantity)
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub item_type: OrderItemType,
    pub name: String,
    pub quantity: u32,
    pub unit_price: i64,
}

/// Screening details attached to ticket orders
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShowtimeInfo {
    pub showtime_id: i64,
    /// Local wall-clock start, ISO-8601 as sent by the backend
    pub start_time: String,
    pub movie_title: String,
    pub cinema_name: String,
    #[serde(default)]
    pub room_type: Option<String>,
}
