use cinepass_catalog::{CatalogError, DiscountEngine, FoodLine, Quote, TicketLine, Voucher};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Checkout contents for one session
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(default)]
    pub showtime_id: Option<i64>,
    #[serde(default)]
    pub tickets: Vec<TicketLine>,
    #[serde(default)]
    pub cinema_complex_id: Option<i64>,
    #[serde(default)]
    pub food: Vec<FoodLine>,
    #[serde(default)]
    pub voucher: Option<Voucher>,
}

impl Cart {
    /// Ticket scope needs both a showtime and at least one seat
    pub fn has_tickets(&self) -> bool {
        self.showtime_id.is_some() && !self.tickets.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_tickets() && self.food.is_empty()
    }

    pub fn seat_ids(&self) -> Vec<i64> {
        self.tickets.iter().map(|t| t.seat_id).collect()
    }

    pub fn quote(&self) -> Result<Quote, CatalogError> {
        DiscountEngine::quote(&self.tickets, &self.food, self.voucher.as_ref())
    }
}

/// Session-scoped cart storage.
///
/// A cart lives from checkout start until reconciliation reaches a terminal
/// state, at which point it is cleared.
#[derive(Default)]
pub struct CartStore {
    carts: Mutex<HashMap<String, Cart>>,
}

impl CartStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, session: &str) -> Option<Cart> {
        self.carts.lock().unwrap_or_else(|e| e.into_inner()).get(session).cloned()
    }

    pub fn put(&self, session: &str, cart: Cart) {
        self.carts.lock().unwrap_or_else(|e| e.into_inner()).insert(session.to_string(), cart);
    }

    pub fn clear(&self, session: &str) -> bool {
        self.carts.lock().unwrap_or_else(|e| e.into_inner()).remove(session).is_some()
    }
}
