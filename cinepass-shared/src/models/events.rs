use serde::{Deserialize, Serialize};

/// Action carried on the realtime seat channel
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatAction {
    Select,
    Deselect,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SeatMessage {
    pub showtime_id: i64,
    pub seat_id: i64,
    pub action: SeatAction,
}

impl SeatMessage {
    pub fn select(showtime_id: i64, seat_id: i64) -> Self {
        Self { showtime_id, seat_id, action: SeatAction::Select }
    }

    pub fn deselect(showtime_id: i64, seat_id: i64) -> Self {
        Self { showtime_id, seat_id, action: SeatAction::Deselect }
    }
}

/// Body of the fallback "payment succeeded" notification
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSucceededNotice {
    pub order_id: i64,
    pub source: String,
    pub timestamp: i64,
}
